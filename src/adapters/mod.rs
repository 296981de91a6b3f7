// Adapters layer: the host socket table, the HTTP client and the service manager.

pub mod http;
pub mod service;
pub mod socket_table;
