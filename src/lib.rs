pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;
pub use config::WardenConfig;

pub use adapters::{http::ReqwestProbe, service::CommandService, socket_table::SystemSocketTable};
pub use crate::core::{
    cancel::{cancellation, CancelHandle, Cancellation},
    waiter::ReadinessWaiter,
};
pub use domain::model::{PollOutcome, PollStatus, ReadinessCheck};
pub use utils::error::{Result, WardenError};
