//! The `W` worker tasks that drain the dispatch queue (§4.D): each one runs a single
//! child at a time, reporting its own failures since a successful child already
//! reported `DONE` via the embedded reporter (§4.C).

use std::time::Duration;

use dispatch_core::command::{run_with_timeout, truncate_utf8, TIMEOUT_EXIT_CODE};
use dispatch_core::events::StatusSender;
use dispatch_core::model::Status;

use crate::queue::WorkQueue;

const STDERR_LIMIT: usize = 2000;

/// Runs forever, pulling one item at a time off `queue` and executing it. Intended to
/// be spawned `W` times, one per configured worker slot.
pub async fn run_worker(queue: WorkQueue, status: StatusSender, job_timeout: Duration) {
    loop {
        let item = queue.dequeue().await;
        queue.mark_processing(item.input_job_id.clone()).await;

        let env = [("SLURM_JOB_ID".to_string(), item.backend_id.clone())];
        let outcome = run_with_timeout(&item.command, &env, job_timeout).await;

        queue.unmark_processing(&item.input_job_id).await;

        match outcome {
            Ok(output) if output.exit_code == 0 => {
                // The child's embedded reporter already emitted DONE; nothing to do.
            }
            Ok(output) => {
                let error = format!(
                    "{}: {}, {}",
                    output.exit_code,
                    output.stdout,
                    truncate_utf8(&output.stderr, STDERR_LIMIT)
                );
                report_failure(&status, &item.input_job_id, &item.backend_id, error).await;
            }
            Err(err) => {
                let error = format!(
                    "{}: {}",
                    TIMEOUT_EXIT_CODE,
                    truncate_utf8(&err.to_string(), STDERR_LIMIT)
                );
                report_failure(&status, &item.input_job_id, &item.backend_id, error).await;
            }
        }
    }
}

async fn report_failure(status: &StatusSender, job_key: &str, backend_id: &str, error: String) {
    if let Err(err) = status
        .send(
            &job_key.to_string(),
            Status::Error,
            Some(backend_id.to_string()),
            None,
            Some(error),
            None,
        )
        .await
    {
        tracing::warn!(error = %err, job_key, "failed to publish worker failure status");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_respects_the_stderr_limit() {
        let long = "e".repeat(3000);
        let truncated = truncate_utf8(&long, STDERR_LIMIT);
        assert_eq!(truncated.len(), STDERR_LIMIT);
    }
}
