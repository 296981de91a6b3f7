// Domain layer: readiness checks, outcomes and the ports the core polls through.

pub mod model;
pub mod ports;
