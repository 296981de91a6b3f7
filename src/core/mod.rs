pub mod cancel;
pub mod plugins;
pub mod waiter;
pub mod workflow;

pub use crate::domain::model::{
    CheckKind, CheckTarget, PluginSpec, PollBudget, PollOutcome, PollStatus, ReadinessCheck,
};
pub use crate::domain::ports::{HttpProbe, ProbeResult, ServiceControl, SocketTable};
pub use crate::utils::error::Result;
