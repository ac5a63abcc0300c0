//! Composes and submits batch jobs to the scheduler (§4.E `submit_batch`).

use std::process::Stdio;

use dispatch_core::error::{DispatchError, Result};
use tokio::process::Command;

/// Scheduler parameters for a single submission, assembled by the caller from the
/// `JobRequest`'s `slurm_pars` and the agent's configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlurmSubmission {
    pub cpus_per_task: u32,
    pub job_name: String,
    pub partition: String,
    pub output_path: String,
    pub mem: Option<String>,
    pub gpu: bool,
    /// The full command line to run under the batch scheduler, e.g.
    /// `python script.py input_job_id cfg_file=/tmp/xyz.json`.
    pub command: String,
}

impl SlurmSubmission {
    /// Builds the `sbatch` argument list for this submission.
    pub fn sbatch_args(&self) -> Vec<String> {
        let mut args = vec![
            format!("--cpus-per-task={}", self.cpus_per_task),
            format!("--job-name={}", self.job_name),
            format!("--partition={}", self.partition),
            format!("--output={}", self.output_path),
        ];
        if let Some(mem) = &self.mem {
            args.push(format!("--mem={mem}"));
        }
        if self.gpu {
            args.push("--gres=gpu".to_string());
        }
        args.push("--wrap".to_string());
        args.push(self.command.clone());
        args
    }
}

/// Submits `submission` via `sbatch`, returning the scheduler-assigned job id.
///
/// The batch-submit command is treated as an opaque, unbounded subprocess: no
/// wall-clock timeout is applied, matching the capacity-probe commands in §5.
pub async fn submit(submission: &SlurmSubmission) -> Result<String> {
    let output = Command::new("sbatch")
        .args(submission.sbatch_args())
        .stdin(Stdio::null())
        .output()
        .await?;

    if !output.status.success() {
        return Err(DispatchError::SchedulerSubmit(
            String::from_utf8_lossy(&output.stderr).trim().to_string(),
        ));
    }

    parse_sbatch_id(&String::from_utf8_lossy(&output.stdout))
}

/// Parses the id out of `sbatch`'s stdout, which conventionally reads
/// `Submitted batch job <id>`.
fn parse_sbatch_id(stdout: &str) -> Result<String> {
    stdout
        .split_whitespace()
        .last()
        .filter(|token| token.chars().all(|c| c.is_ascii_digit()) && !token.is_empty())
        .map(|token| token.to_string())
        .ok_or_else(|| DispatchError::SchedulerParse(format!("unparseable sbatch output: {stdout:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sbatch_args_include_gpu_and_mem_when_present() {
        let submission = SlurmSubmission {
            cpus_per_task: 4,
            job_name: "A1".to_string(),
            partition: "gpu".to_string(),
            output_path: "/tmp/A1-%j.out".to_string(),
            mem: Some("16G".to_string()),
            gpu: true,
            command: "python job.py A1 cfg_file=/tmp/a1.json".to_string(),
        };
        let args = submission.sbatch_args();
        assert!(args.contains(&"--mem=16G".to_string()));
        assert!(args.contains(&"--gres=gpu".to_string()));
        assert!(args.contains(&"--cpus-per-task=4".to_string()));
    }

    #[test]
    fn sbatch_args_omit_mem_and_gpu_when_absent() {
        let submission = SlurmSubmission {
            cpus_per_task: 1,
            job_name: "A2".to_string(),
            partition: "cpu".to_string(),
            output_path: "/tmp/A2-%j.out".to_string(),
            mem: None,
            gpu: false,
            command: "python job.py A2".to_string(),
        };
        let args = submission.sbatch_args();
        assert!(!args.iter().any(|a| a.starts_with("--mem")));
        assert!(!args.contains(&"--gres=gpu".to_string()));
    }

    #[test]
    fn parse_sbatch_id_extracts_trailing_numeric_token() {
        assert_eq!(parse_sbatch_id("Submitted batch job 42\n").unwrap(), "42");
    }

    #[test]
    fn parse_sbatch_id_rejects_unparseable_output() {
        assert!(parse_sbatch_id("sbatch: error: invalid partition\n").is_err());
    }
}
