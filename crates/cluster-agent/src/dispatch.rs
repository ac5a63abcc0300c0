//! The Cluster Agent dispatch loop (§4.E): gate admission on live scheduler capacity
//! and backlog, then hand accepted jobs to `sbatch`.

use std::time::Duration;

use dispatch_core::config::DispatchConfig;
use dispatch_core::consumer::NewTopicConsumer;
use dispatch_core::error::{DispatchError, Result};
use dispatch_core::events::StatusSender;
use dispatch_core::model::{ExecutorType, JobRequest, JobType, Status};
use slurm_probe::{submit, SlurmSubmission};
use tracing::info;

const POLL_TIMEOUT: Duration = Duration::from_secs(2);
const BACKLOG_THRESHOLD: u32 = 1;

fn job_type(config: &DispatchConfig) -> JobType {
    match config.slurm_job_type.as_str() {
        "gpu" => JobType::Gpu,
        _ => JobType::Cpu,
    }
}

fn current_user() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("LOGNAME"))
        .unwrap_or_else(|_| "unknown".to_string())
}

fn write_job_config(shared_tmp: &str, job: &JobRequest) -> std::io::Result<std::path::PathBuf> {
    let file = tempfile::Builder::new()
        .prefix("dispatch-")
        .suffix(".json")
        .tempfile_in(shared_tmp)?;
    serde_json::to_writer(&file, job)?;
    let (_, path) = file.keep().map_err(|err| err.error)?;
    Ok(path)
}

fn build_submission(job: &JobRequest, config: &DispatchConfig, cfg_path: &std::path::Path) -> SlurmSubmission {
    let cpus_per_task = job
        .slurm_pars
        .resources_required
        .unwrap_or(config.slurm_resources_required);
    let partition = config.slurm_partition.clone().unwrap_or_default();
    let output_path = format!("{}/{}-%j.out", config.slurm_out_dir, job.input_job_id);
    let command = format!(
        "python {} {} cfg_file={}",
        job.script,
        job.input_job_id,
        cfg_path.display()
    );

    SlurmSubmission {
        cpus_per_task,
        job_name: job.input_job_id.clone(),
        partition,
        output_path,
        mem: job.slurm_pars.mem.clone(),
        gpu: job.slurm_pars.job_type.unwrap_or_else(|| job_type(config)) == JobType::Gpu,
        command,
    }
}

/// Runs one dispatch tick. Returns early (without touching the broker) when the
/// backlog is already deep, per §4.E.
pub async fn check_queue_submit(
    consumer: &NewTopicConsumer,
    status: &StatusSender,
    config: &DispatchConfig,
) -> Result<()> {
    let free = slurm_probe::probe::idle_capacity(job_type(config), config.slurm_partition.as_deref().unwrap_or(""))
        .await?;
    let waiting = slurm_probe::probe::backlog(&current_user()).await?;

    if waiting > BACKLOG_THRESHOLD {
        info!(waiting, "backlog already deep, skipping tick");
        return Ok(());
    }

    let budget = (free / config.slurm_resources_required).max(1) as usize;
    let batch = consumer.poll_batch(budget, POLL_TIMEOUT).await?;
    if batch.is_empty() {
        return Ok(());
    }

    for job in batch {
        let stamped = job.stamped(ExecutorType::ClusterAgent);
        let cfg_path = write_job_config(&config.shared_tmp, &stamped)
            .map_err(|err| DispatchError::Io(err.to_string()))?;
        let submission = build_submission(&stamped, config, &cfg_path);
        let backend_id = submit(&submission).await?;

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

    consumer.commit()
}

#[cfg(test)]
mod tests {
    use super::*;
    use dispatch_core::model::SlurmPars;

    #[test]
    fn submission_falls_back_to_configured_resources_and_partition() {
        let config = DispatchConfig::default();
        let job = JobRequest::new("A1", "compute.py", SlurmPars::default());
        let path = std::path::Path::new("/tmp/dispatch-abc.json");
        let submission = build_submission(&job, &config, path);
        assert_eq!(submission.cpus_per_task, config.slurm_resources_required);
        assert_eq!(submission.job_name, "A1");
        assert!(submission.command.contains("cfg_file=/tmp/dispatch-abc.json"));
    }

    #[test]
    fn submission_honors_per_job_resource_override_and_gpu_flag() {
        let config = DispatchConfig::default();
        let job = JobRequest::new(
            "A2",
            "compute.py",
            SlurmPars {
                resources_required: Some(8),
                job_type: Some(JobType::Gpu),
                mem: Some("32G".to_string()),
            },
        );
        let path = std::path::Path::new("/tmp/dispatch-def.json");
        let submission = build_submission(&job, &config, path);
        assert_eq!(submission.cpus_per_task, 8);
        assert!(submission.gpu);
        assert_eq!(submission.mem, Some("32G".to_string()));
    }

    #[test]
    fn per_job_cpu_override_wins_over_a_gpu_cluster_default() {
        let mut config = DispatchConfig::default();
        config.slurm_job_type = "gpu".to_string();
        let job = JobRequest::new(
            "A3",
            "compute.py",
            SlurmPars {
                resources_required: None,
                job_type: Some(JobType::Cpu),
                mem: None,
            },
        );
        let path = std::path::Path::new("/tmp/dispatch-ghi.json");
        let submission = build_submission(&job, &config, path);
        assert!(!submission.gpu);
    }
}
