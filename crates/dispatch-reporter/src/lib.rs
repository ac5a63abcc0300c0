//! The compute-side reporter (§4.C): embedded in the user job program, it reports
//! RUNNING/DONE/ERROR on the process's behalf and, on the worker-agent path, lets the
//! parent observe failures through its own exit code.

pub mod args;

use std::collections::HashMap;

use dispatch_core::command::truncate_utf8;
use dispatch_core::config::DispatchConfig;
use dispatch_core::error::Result;
use dispatch_core::events::{ErrorSender, ResultSender, StatusSender};
use dispatch_core::model::{ExecutorType, JobKey, Status};

use args::ReporterArgs;

const TRACE_LIMIT: usize = 2000;

/// A user-code failure, carrying the message and trace the reporter formats into an
/// `ErrorEvent`. Analogous to catching an exception and reading its traceback.
#[derive(Debug, Clone)]
pub struct ComputeError {
    pub message: String,
    pub trace: String,
}

impl ComputeError {
    pub fn new(message: impl Into<String>, trace: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            trace: trace.into(),
        }
    }

    /// The message prefixed onto the first 2000 bytes of the trace, per §4.C step 4.
    /// The 2000-byte cap applies to the trace excerpt only; the message prefix is not
    /// counted against it (see the truncation note in the design notes).
    fn formatted(&self) -> String {
        format!("{}: {}", self.message, truncate_utf8(&self.trace, TRACE_LIMIT))
    }
}

/// Per-job context collected at construction: the backend id, node, and configured
/// cluster name, plus whatever the dispatching agent forwarded in the config file.
pub struct Reporter {
    job_key: JobKey,
    job_id: String,
    node: String,
    cluster: String,
    executor_type: ExecutorType,
    job_config: Option<serde_json::Value>,
    status: StatusSender,
    result: ResultSender,
    error: ErrorSender,
}

impl Reporter {
    /// Builds a `Reporter` from argv and the resolved config, reading `cfg_file=` if
    /// present and resolving the backend id from `job_id=` or `SLURM_JOB_ID`,
    /// defaulting to `-1` if neither is available.
    pub fn from_args(args: &[String], config: &DispatchConfig) -> Result<Self> {
        let parsed = ReporterArgs::parse(args).ok_or_else(|| {
            dispatch_core::error::DispatchError::Config(
                "reporter requires at least an input_job_id argument".to_string(),
            )
        })?;

        let job_config: Option<serde_json::Value> = match &parsed.cfg_file {
            Some(path) => Some(serde_json::from_str(&std::fs::read_to_string(path)?)?),
            None => None,
        };

        let job_id = parsed
            .job_id
            .or_else(|| std::env::var("SLURM_JOB_ID").ok())
            .unwrap_or_else(|| "-1".to_string());

        let executor_type = job_config
            .as_ref()
            .and_then(|cfg| cfg.get("ExecutorType"))
            .and_then(|v| v.as_str())
            .map(|tag| match tag {
                "WRK_AGNT" => ExecutorType::WorkerAgent,
                _ => ExecutorType::ClusterAgent,
            })
            .unwrap_or(ExecutorType::ClusterAgent);

        let node = gethostname::gethostname().to_string_lossy().into_owned();

        Ok(Self {
            job_key: parsed.input_job_id,
            job_id,
            node,
            cluster: config.cluster_name.clone(),
            executor_type,
            job_config,
            status: StatusSender::new(config)?,
            result: ResultSender::new(config)?,
            error: ErrorSender::new(config)?,
        })
    }

    pub fn job_config(&self) -> Option<&serde_json::Value> {
        self.job_config.as_ref()
    }

    /// Runs `do_compute`, reporting RUNNING before and DONE/ERROR after, per the §4.C
    /// contract. On the worker-agent path a failure is returned to the caller (so
    /// `main` can exit non-zero); on the cluster-agent path it is fully absorbed here.
    pub async fn compute<F>(&self, do_compute: F) -> Result<()>
    where
        F: FnOnce() -> std::result::Result<HashMap<String, serde_json::Value>, ComputeError>,
    {
        self.status
            .send(
                &self.job_key,
                Status::Running,
                Some(self.job_id.clone()),
                Some(self.node.clone()),
                None,
                None,
            )
            .await?;

        match do_compute() {
            Ok(payload) => {
                self.status
                    .send(
                        &self.job_key,
                        Status::Done,
                        Some(self.job_id.clone()),
                        Some(self.node.clone()),
                        None,
                        None,
                    )
                    .await?;
                self.result
                    .send(&self.job_key, self.job_id.clone(), self.node.clone(), payload)
                    .await?;
                self.teardown().await?;
                Ok(())
            }
            Err(compute_err) => {
                let formatted = compute_err.formatted();

                // The Worker Agent's own pool already reports ERROR from the child's
                // non-zero exit code; reporting it here too would double up the STATUS
                // event. Only the Cluster Agent path catches and reports for itself.
                if self.executor_type == ExecutorType::ClusterAgent {
                    self.status
                        .send(
                            &self.job_key,
                            Status::Error,
                            Some(self.job_id.clone()),
                            Some(self.node.clone()),
                            Some(formatted.clone()),
                            None,
                        )
                        .await?;
                    self.error
                        .send(
                            &self.job_key,
                            self.job_id.clone(),
                            self.node.clone(),
                            HashMap::new(),
                            formatted,
                        )
                        .await?;
                }
                self.teardown().await?;

                match self.executor_type {
                    ExecutorType::ClusterAgent => Ok(()),
                    ExecutorType::WorkerAgent => Err(dispatch_core::error::DispatchError::ChildExecution {
                        code: 1,
                        stdout: String::new(),
                        stderr: compute_err.message,
                    }),
                }
            }
        }
    }

    async fn teardown(&self) -> Result<()> {
        self.status.flush().await?;
        self.result.flush().await?;
        self.error.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compute_error_caps_the_trace_excerpt_not_the_message() {
        let long_trace = "x".repeat(3000);
        let err = ComputeError::new("ValueError: boom", long_trace);
        let formatted = err.formatted();
        assert!(formatted.starts_with("ValueError: boom: "));
        // total length exceeds 2000 + message length, but the trace excerpt itself
        // is capped at exactly TRACE_LIMIT bytes.
        let excerpt = &formatted[formatted.len() - TRACE_LIMIT..];
        assert_eq!(excerpt.len(), TRACE_LIMIT);
        assert!(excerpt.chars().all(|c| c == 'x'));
    }

    #[test]
    fn compute_error_does_not_pad_short_traces() {
        let err = ComputeError::new("boom", "short trace");
        assert_eq!(err.formatted(), "boom: short trace");
    }
}
