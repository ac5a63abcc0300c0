//! Wire types shared by every component: the submitter writes a `JobRequest`, the
//! agents stamp it with an `ExecutorType`, and the reporter emits `StatusEvent`,
//! `ResultEvent` and `ErrorEvent` back onto the broker. All of these round-trip through
//! `serde_json` exactly as published.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Opaque caller-supplied identifier, unique per logical job. Doubles as the broker
/// message key for every topic except `TOPIC_HEARTBEAT`.
pub type JobKey = String;

/// Which agent flavor claimed a `JobRequest`. Carried only to let the compute-side
/// reporter decide whether to swallow or re-raise a failed `do_compute()` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutorType {
    #[serde(rename = "WRK_AGNT")]
    WorkerAgent,
    #[serde(rename = "CL_AGNT")]
    ClusterAgent,
}

/// Backend-specific scheduling hints attached to a `JobRequest`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SlurmPars {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources_required: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_type: Option<JobType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mem: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobType {
    Gpu,
    Cpu,
}

/// The `NEW` topic value: a job description as published by the submitter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobRequest {
    pub input_job_id: JobKey,
    pub script: String,
    #[serde(default)]
    pub slurm_pars: SlurmPars,
    pub timestamp: String,
    /// Absent until a dispatching agent claims the record.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executor_type: Option<ExecutorType>,
}

impl JobRequest {
    pub fn new(input_job_id: impl Into<String>, script: impl Into<String>, slurm_pars: SlurmPars) -> Self {
        Self {
            input_job_id: input_job_id.into(),
            script: script.into(),
            slurm_pars,
            timestamp: local_timestamp(),
            executor_type: None,
        }
    }

    /// Returns a copy stamped with the dispatching agent's `ExecutorType`, as the
    /// dispatch loop does immediately after claiming a record.
    pub fn stamped(mut self, executor: ExecutorType) -> Self {
        self.executor_type = Some(executor);
        self
    }
}

/// Lifecycle status carried on `TOPIC_STATUS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Status {
    Submitted,
    Running,
    Done,
    Error,
}

/// The `STATUS` topic value. A `None` at the producer boundary is published as a
/// tombstone (null value) rather than as this struct; see `events::StatusSender::remove`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatusEvent {
    pub status: Status,
    pub cluster: String,
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl StatusEvent {
    pub fn new(status: Status, cluster: impl Into<String>) -> Self {
        Self {
            status,
            cluster: cluster.into(),
            timestamp: local_timestamp(),
            job_id: None,
            node: None,
            error: None,
            message: None,
        }
    }

    pub fn with_job_id(mut self, job_id: impl Into<String>) -> Self {
        self.job_id = Some(job_id.into());
        self
    }

    pub fn with_node(mut self, node: impl Into<String>) -> Self {
        self.node = Some(node.into());
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// Envelope shared by `ResultEvent` and `ErrorEvent`: the user payload plus dispatch
/// metadata, all nested under the `results` key as the original publisher does.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResultEnvelope {
    #[serde(flatten)]
    pub payload: HashMap<String, serde_json::Value>,
    pub timestamp: String,
    pub job_id: String,
    pub node: String,
    pub cluster: String,
}

/// The `DONE` topic value.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResultEvent {
    pub results: ResultEnvelope,
}

/// The `ERROR` topic value: the same envelope as `ResultEvent` plus an `error` field.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorEvent {
    pub results: ResultEnvelope,
    pub error: String,
}

/// The `HEARTBEAT` topic value, keyed by cluster name.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Heartbeat {
    pub timestamp: String,
}

impl Heartbeat {
    pub fn now() -> Self {
        Self {
            timestamp: local_timestamp(),
        }
    }
}

/// `YYYY-MM-DD HH:MM:SS` in local time, matching every timestamp field in this model.
pub fn local_timestamp() -> String {
    chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn executor_type_serializes_to_original_tags() {
        assert_eq!(
            serde_json::to_string(&ExecutorType::WorkerAgent).unwrap(),
            "\"WRK_AGNT\""
        );
        assert_eq!(
            serde_json::to_string(&ExecutorType::ClusterAgent).unwrap(),
            "\"CL_AGNT\""
        );
    }

    #[test]
    fn status_serializes_uppercase() {
        assert_eq!(serde_json::to_string(&Status::Submitted).unwrap(), "\"SUBMITTED\"");
        assert_eq!(serde_json::to_string(&Status::Done).unwrap(), "\"DONE\"");
    }

    #[test]
    fn job_request_round_trips_through_json() {
        let req = JobRequest::new(
            "A1",
            "echo.py",
            SlurmPars {
                resources_required: Some(2),
                job_type: Some(JobType::Gpu),
                mem: None,
            },
        );
        let encoded = serde_json::to_string(&req).unwrap();
        let decoded: JobRequest = serde_json::from_str(&encoded).unwrap();
        assert_eq!(req, decoded);
        assert!(decoded.executor_type.is_none());
    }

    #[test]
    fn stamping_adds_executor_type_without_touching_other_fields() {
        let req = JobRequest::new("A1", "echo.py", SlurmPars::default());
        let stamped = req.clone().stamped(ExecutorType::WorkerAgent);
        assert_eq!(stamped.input_job_id, req.input_job_id);
        assert_eq!(stamped.executor_type, Some(ExecutorType::WorkerAgent));
    }

    #[test]
    fn status_event_omits_absent_optional_fields() {
        let event = StatusEvent::new(Status::Submitted, "c1").with_job_id("abc");
        let encoded = serde_json::to_value(&event).unwrap();
        assert!(encoded.get("node").is_none());
        assert!(encoded.get("error").is_none());
        assert_eq!(encoded["job_id"], "abc");
    }
}
