pub mod command;
pub mod config;
pub mod consumer;
pub mod error;
pub mod events;
pub mod model;
pub mod monitor;

pub use config::DispatchConfig;
pub use error::{DispatchError, Result};
pub use events::{ErrorSender, HeartbeatSender, JobSender, ResultSender, StatusSender};
pub use model::{
    ErrorEvent, ExecutorType, Heartbeat, JobKey, JobRequest, JobType, ResultEnvelope, ResultEvent,
    SlurmPars, Status, StatusEvent,
};
pub use monitor::{MonitorClient, MonitorStatus};

/// Current crate version, surfaced by each agent binary at startup.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_available() {
        assert!(!VERSION.is_empty());
    }
}
