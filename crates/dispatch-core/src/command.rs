//! Bounded subprocess abstraction (§4.F): spawn a shell command, enforce a wall-clock
//! timeout, and return its exit code plus captured stdout/stderr as strings.

use std::process::Stdio;
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::process::Command;

use crate::error::{DispatchError, Result};

/// Outcome of a bounded subprocess run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

/// The exit code reported when a command is killed for exceeding its timeout. Chosen
/// to be unambiguous against real process exit codes (which are 0-255).
pub const TIMEOUT_EXIT_CODE: i32 = -1;

/// Runs `command` (a full shell command line, interpreted by `/bin/sh -c`) with the
/// given extra environment variables, killing it if it runs longer than `timeout`.
pub async fn run_with_timeout(
    command: &str,
    env: &[(String, String)],
    timeout: Duration,
) -> Result<CommandOutput> {
    let mut cmd = Command::new("/bin/sh");
    cmd.arg("-c")
        .arg(command)
        .envs(env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = cmd.spawn()?;
    let mut stdout_pipe = child.stdout.take().expect("piped stdout");
    let mut stderr_pipe = child.stderr.take().expect("piped stderr");

    let read_stdout = async {
        let mut buf = String::new();
        let _ = stdout_pipe.read_to_string(&mut buf).await;
        buf
    };
    let read_stderr = async {
        let mut buf = String::new();
        let _ = stderr_pipe.read_to_string(&mut buf).await;
        buf
    };

    let run = async {
        let (status, stdout, stderr) = tokio::join!(child.wait(), read_stdout, read_stderr);
        let status = status?;
        Ok::<_, std::io::Error>(CommandOutput {
            exit_code: status.code().unwrap_or(TIMEOUT_EXIT_CODE),
            stdout,
            stderr,
        })
    };

    match tokio::time::timeout(timeout, run).await {
        Ok(result) => result.map_err(DispatchError::from),
        Err(_) => {
            let _ = child.start_kill();
            let _ = child.wait().await;
            Err(DispatchError::TimeoutMillis(timeout.as_millis() as u64))
        }
    }
}

/// Truncates `text` to at most `limit` bytes on a UTF-8 boundary, as the worker does
/// to stderr before embedding it in an `ErrorEvent`.
pub fn truncate_utf8(text: &str, limit: usize) -> &str {
    if text.len() <= limit {
        return text;
    }
    let mut end = limit;
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn captures_stdout_and_exit_code() {
        let out = run_with_timeout("echo hello", &[], Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(out.exit_code, 0);
        assert_eq!(out.stdout.trim(), "hello");
    }

    #[tokio::test]
    async fn nonzero_exit_is_reported_without_erroring() {
        let out = run_with_timeout("exit 3", &[], Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(out.exit_code, 3);
    }

    #[tokio::test]
    async fn passes_environment_variables_to_the_child() {
        let out = run_with_timeout(
            "echo $SLURM_JOB_ID",
            &[("SLURM_JOB_ID".to_string(), "abc123".to_string())],
            Duration::from_secs(5),
        )
        .await
        .unwrap();
        assert_eq!(out.stdout.trim(), "abc123");
    }

    #[tokio::test]
    async fn timeout_kills_the_child_and_errors() {
        let result = run_with_timeout("sleep 10", &[], Duration::from_millis(100)).await;
        assert!(matches!(result, Err(DispatchError::TimeoutMillis(100))));
    }

    #[test]
    fn truncate_utf8_caps_at_byte_limit() {
        let text = "a".repeat(3000);
        let truncated = truncate_utf8(&text, 2000);
        assert_eq!(truncated.len(), 2000);
    }

    #[test]
    fn truncate_utf8_is_a_no_op_under_the_limit() {
        assert_eq!(truncate_utf8("short", 2000), "short");
    }
}
