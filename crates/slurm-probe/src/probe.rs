//! Thin process-invocation adapters over the pure parsers in [`crate::parse`].

use std::process::Stdio;

use dispatch_core::error::Result;
use dispatch_core::model::JobType;
use tokio::process::Command;

use crate::parse::{self, SchedulerState};

async fn run(program: &str, args: &[&str]) -> Result<String> {
    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .output()
        .await?;
    if !output.status.success() {
        tracing::warn!(program, status = ?output.status, "scheduler probe command exited non-zero");
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Idle capacity for `job_type` within `partition`, per §4.E.
pub async fn idle_capacity(job_type: JobType, partition: &str) -> Result<u32> {
    match job_type {
        JobType::Gpu => {
            let out = run("sinfo", &["-o", "%G %.3D %.6t %P"]).await?;
            Ok(parse::parse_idle_gpus(&out, partition))
        }
        JobType::Cpu => {
            let out = run("sinfo", &["-o", "%C %.3D %.6t %P"]).await?;
            Ok(parse::parse_idle_cpus(&out, partition))
        }
    }
}

/// Count of `_CLAG`-suffixed jobs for `user` that are waiting admission, per §4.E.
pub async fn backlog(user: &str) -> Result<u32> {
    let out = run("squeue", &["-o", "%j %R %u"]).await?;
    Ok(parse::parse_backlog(&out, user))
}

/// Current scheduler state for `backend_id`, or `None` if the job is not visible.
pub async fn job_state(backend_id: &str) -> Result<Option<SchedulerState>> {
    let out = run("squeue", &["-o", "%i %R"]).await?;
    Ok(parse::parse_job_state(&out, backend_id))
}
