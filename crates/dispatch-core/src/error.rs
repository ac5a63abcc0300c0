//! Error types shared by the dispatch agents, the submitter and the reporter.

use serde::{Deserialize, Serialize};

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, DispatchError>;

/// Error taxonomy for the dispatch bus.
///
/// Infrastructure errors (broker, monitor, scheduler) are meant to propagate out of a
/// dispatch tick via `?` and be logged by the caller; user-code failures are converted
/// into `ErrorEvent`s instead and never reach this type.
#[derive(Debug, Clone, thiserror::Error, Serialize, Deserialize)]
pub enum DispatchError {
    #[error("monitor unreachable or returned an unparseable response: {0}")]
    Monitor(String),

    #[error("broker publish failed: {0}")]
    Publish(String),

    #[error("broker poll or commit failed: {0}")]
    Poll(String),

    #[error("child exited with code {code}: {stdout}, {stderr}")]
    ChildExecution {
        code: i32,
        stdout: String,
        stderr: String,
    },

    #[error("child timed out after {0}ms")]
    TimeoutMillis(u64),

    #[error("scheduler submission failed: {0}")]
    SchedulerSubmit(String),

    #[error("scheduler output could not be parsed: {0}")]
    SchedulerParse(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("serialization error: {0}")]
    Serde(String),
}

impl From<std::io::Error> for DispatchError {
    fn from(err: std::io::Error) -> Self {
        DispatchError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for DispatchError {
    fn from(err: serde_json::Error) -> Self {
        DispatchError::Serde(err.to_string())
    }
}

impl From<toml::de::Error> for DispatchError {
    fn from(err: toml::de::Error) -> Self {
        DispatchError::Config(err.to_string())
    }
}

impl From<reqwest::Error> for DispatchError {
    fn from(err: reqwest::Error) -> Self {
        DispatchError::Monitor(err.to_string())
    }
}

impl From<rdkafka::error::KafkaError> for DispatchError {
    fn from(err: rdkafka::error::KafkaError) -> Self {
        DispatchError::Publish(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn child_execution_message_leads_with_code() {
        let err = DispatchError::ChildExecution {
            code: 3,
            stdout: "out".into(),
            stderr: "err".into(),
        };
        assert!(err.to_string().starts_with("child exited with code 3"));
    }

    #[test]
    fn timeout_message_reports_millis() {
        let err = DispatchError::TimeoutMillis(1500);
        assert_eq!(err.to_string(), "child timed out after 1500ms");
    }
}
