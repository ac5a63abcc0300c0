//! The Worker Agent dispatch loop (`check_queue_submit`, §4.D).

use std::time::Duration;

use dispatch_core::config::DispatchConfig;
use dispatch_core::consumer::NewTopicConsumer;
use dispatch_core::error::{DispatchError, Result};
use dispatch_core::events::StatusSender;
use dispatch_core::model::{ExecutorType, JobRequest, Status};
use uuid::Uuid;

use crate::queue::{DispatchItem, WorkQueue};

const POLL_TIMEOUT: Duration = Duration::from_secs(2);
const MAX_ROUNDS_FACTOR: usize = 4;

/// A short hex token derived from a v4 UUID. Sufficient for log correlation but, like
/// the original tool's time-derived id, not suitable as a globally unique identifier.
pub fn unique_id() -> String {
    let uuid = Uuid::new_v4();
    format!("{:x}", uuid.as_u128() & 0x0FFF_FFFF_FFFF_FFFF)
}

/// Writes the per-dispatch JSON config file under `SHARED_TMP`, persisting it so it
/// outlives this function; the worker task that runs the child owns its cleanup.
fn write_job_config(shared_tmp: &str, job: &JobRequest) -> std::io::Result<std::path::PathBuf> {
    let file = tempfile::Builder::new()
        .prefix("dispatch-")
        .suffix(".json")
        .tempfile_in(shared_tmp)?;
    serde_json::to_writer(&file, job)?;
    let (_, path) = file.keep().map_err(|err| err.error)?;
    Ok(path)
}

/// Builds the runner command line executed as the child's subprocess.
fn build_runner_command(job: &JobRequest, backend_id: &str, cfg_path: &std::path::Path) -> String {
    format!(
        "python {} {} cfg_file={} job_id={}",
        job.script,
        job.input_job_id,
        cfg_path.display(),
        backend_id
    )
}

/// Runs one dispatch tick: polls `TOPIC_NEW` in small bursts until the queue has `W`
/// items queued or `4*W` rounds have elapsed, enqueuing each record, emitting
/// `SUBMITTED`, and committing consumer offsets after every round so a crash mid-tick
/// never leaves an already-dispatched record uncommitted.
pub async fn check_queue_submit(
    consumer: &NewTopicConsumer,
    queue: &WorkQueue,
    status: &StatusSender,
    config: &DispatchConfig,
) -> Result<()> {
    let workers = config.worker_agent_max_workers;
    let budget = (workers / config.slurm_resources_required as usize).max(1);

    for _round in 0..(MAX_ROUNDS_FACTOR * workers) {
        if queue.len() >= workers {
            break;
        }

        let batch = consumer.poll_batch(budget, POLL_TIMEOUT).await?;

        for job in batch {
            let stamped = job.stamped(ExecutorType::WorkerAgent);
            let backend_id = unique_id();
            let cfg_path = write_job_config(&config.shared_tmp, &stamped)
                .map_err(|err| DispatchError::Io(err.to_string()))?;
            let command = build_runner_command(&stamped, &backend_id, &cfg_path);

            queue
                .enqueue(DispatchItem {
                    backend_id: backend_id.clone(),
                    input_job_id: stamped.input_job_id.clone(),
                    command,
                })
                .await;

            status
                .send(
                    &stamped.input_job_id,
                    Status::Submitted,
                    Some(backend_id),
                    None,
                    None,
                    None,
                )
                .await?;
        }

        consumer.commit()?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_id_is_a_hex_string() {
        let id = unique_id();
        assert!(!id.is_empty());
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn unique_id_varies_between_calls() {
        assert_ne!(unique_id(), unique_id());
    }

    #[test]
    fn runner_command_embeds_script_job_id_and_cfg_path() {
        let job = JobRequest::new("A1", "compute.py", dispatch_core::model::SlurmPars::default());
        let path = std::path::Path::new("/tmp/dispatch-xyz.json");
        let command = build_runner_command(&job, "abc123", path);
        assert!(command.contains("compute.py"));
        assert!(command.contains("A1"));
        assert!(command.contains("cfg_file=/tmp/dispatch-xyz.json"));
        assert!(command.contains("job_id=abc123"));
    }
}
