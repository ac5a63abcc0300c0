//! Publishes `JobRequest`s to the NEW topic, optionally consulting the monitor first
//! to suppress resubmission of jobs whose status is already known (§4.B).

use dispatch_core::config::DispatchConfig;
use dispatch_core::error::Result;
use dispatch_core::events::JobSender;
use dispatch_core::model::{JobKey, JobRequest, SlurmPars};
use dispatch_core::monitor::{MonitorClient, MonitorStatus};

/// The §4.B admission rule in isolation: a known status blocks resubmission unless
/// it is `ERROR` and the caller opted to ignore error statuses.
fn blocks_resubmission(known: &MonitorStatus, ignore_error_status: bool) -> bool {
    !ignore_error_status || known.status != "ERROR"
}

/// Outcome of a single `send` call: the key, whether a NEW record was published, and
/// the monitor-reported status that caused a skip (if any).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendOutcome {
    pub job_key: JobKey,
    pub submitted: bool,
    pub existing_status: Option<String>,
}

pub struct Submitter {
    sender: JobSender,
    monitor: Option<MonitorClient>,
}

impl Submitter {
    pub fn new(config: &DispatchConfig) -> Result<Self> {
        let monitor = config
            .monitor_agent_url
            .as_ref()
            .map(|url| MonitorClient::new(url.clone(), config.monitor_agent_context_path.clone()));

        Ok(Self {
            sender: JobSender::new(config)?,
            monitor,
        })
    }

    /// Publishes a single job, applying the §4.B admission algorithm. `flush` controls
    /// whether the producer is flushed immediately after the publish.
    pub async fn send(
        &self,
        job_key: impl Into<String>,
        script: impl Into<String>,
        slurm_pars: SlurmPars,
        check: bool,
        flush: bool,
        ignore_error_status: bool,
    ) -> Result<SendOutcome> {
        let job_key = job_key.into();

        if check {
            if let Some(monitor) = &self.monitor {
                if let Some(known) = monitor.check_status(&job_key).await? {
                    if blocks_resubmission(&known, ignore_error_status) {
                        return Ok(SendOutcome {
                            job_key,
                            submitted: false,
                            existing_status: Some(known.status),
                        });
                    }
                }
            }
        }

        let request = JobRequest::new(job_key.clone(), script, slurm_pars);
        self.sender.send(&job_key, &request).await?;
        if flush {
            self.sender.flush().await?;
        }

        Ok(SendOutcome {
            job_key,
            submitted: true,
            existing_status: None,
        })
    }

    /// Publishes several jobs, deferring the flush until every key has been queued.
    pub async fn send_many(
        &self,
        jobs: Vec<(String, String, SlurmPars)>,
        check: bool,
        ignore_error_status: bool,
    ) -> Result<Vec<SendOutcome>> {
        let mut outcomes = Vec::with_capacity(jobs.len());
        for (job_key, script, slurm_pars) in jobs {
            outcomes.push(
                self.send(job_key, script, slurm_pars, check, false, ignore_error_status)
                    .await?,
            );
        }
        self.sender.flush().await?;
        Ok(outcomes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dispatch_core::model::JobType;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(server: &MockServer) -> DispatchConfig {
        let mut config = DispatchConfig::default();
        config.bootstrap_servers = "localhost:19092".to_string();
        config.monitor_agent_url = Some(server.uri());
        config.monitor_agent_context_path = "/".to_string();
        config
    }

    #[tokio::test]
    async fn known_non_error_status_blocks_resubmission() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/check/K7/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "K7": {"status": "DONE"}
            })))
            .mount(&server)
            .await;

        let config = config_for(&server);
        let submitter = Submitter::new(&config).unwrap();
        let outcome = submitter
            .send("K7", "job.py", SlurmPars::default(), true, true, false)
            .await
            .unwrap();

        assert!(!outcome.submitted);
        assert_eq!(outcome.existing_status, Some("DONE".to_string()));
    }

    #[test]
    fn error_status_blocks_unless_explicitly_ignored() {
        let error_status = MonitorStatus {
            status: "ERROR".to_string(),
            extra: Default::default(),
        };
        assert!(blocks_resubmission(&error_status, false));
        assert!(!blocks_resubmission(&error_status, true));
    }

    #[test]
    fn non_error_status_always_blocks_regardless_of_the_ignore_flag() {
        let done_status = MonitorStatus {
            status: "DONE".to_string(),
            extra: Default::default(),
        };
        assert!(blocks_resubmission(&done_status, false));
        assert!(blocks_resubmission(&done_status, true));
    }

    #[test]
    fn job_type_round_trips_in_slurm_pars() {
        let pars = SlurmPars {
            resources_required: Some(2),
            job_type: Some(JobType::Cpu),
            mem: None,
        };
        assert_eq!(pars.job_type, Some(JobType::Cpu));
    }
}
