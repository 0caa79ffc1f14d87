//! Running control and sensor commands

use headroom_host_api::{HostError, HostResult};
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

/// Default limit for a single control or sensor command
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(10);

/// Captured output of a finished command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Run `argv` to completion in its own process group.
///
/// Stdin is closed and both output streams are captured. A non-zero exit,
/// or running past `timeout`, is a `CommandFailed` error; on timeout the
/// whole process group is killed.
pub async fn run_command(argv: &[String], timeout: Duration) -> HostResult<CommandOutput> {
    let Some((program, args)) = argv.split_first() else {
        return Err(HostError::CommandFailed("Empty argv".into()));
    };

    let child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .process_group(0)
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| HostError::CommandFailed(format!("Failed to spawn {}: {}", program, e)))?;

    let pid = child.id();
    debug!(command = %program, pid = ?pid, "Spawned command");

    let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(result) => result?,
        Err(_) => {
            if let Some(pid) = pid {
                kill_group(pid);
            }
            return Err(HostError::CommandFailed(format!(
                "{} timed out after {}s",
                program,
                timeout.as_secs()
            )));
        }
    };

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

    if !output.status.success() {
        let detail = stderr.trim();
        return Err(HostError::CommandFailed(if detail.is_empty() {
            format!("{} exited with {}", program, output.status)
        } else {
            format!("{} exited with {}: {}", program, output.status, detail)
        }));
    }

    Ok(CommandOutput { stdout, stderr })
}

/// Send SIGKILL to the process group led by `pgid`
fn kill_group(pgid: u32) {
    let target = Pid::from_raw(-(pgid as i32)); // Negative for process group

    match signal::kill(target, Signal::SIGKILL) {
        Ok(()) => debug!(pgid, "Sent SIGKILL to process group"),
        // Process already gone
        Err(nix::errno::Errno::ESRCH) => {}
        Err(e) => warn!(pgid, error = %e, "Failed to kill process group"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn captures_stdout() {
        let output = run_command(&argv(&["echo", "1.5 kW"]), DEFAULT_COMMAND_TIMEOUT)
            .await
            .unwrap();
        assert_eq!(output.stdout.trim(), "1.5 kW");
    }

    #[tokio::test]
    async fn non_zero_exit_is_an_error() {
        let result = run_command(&argv(&["false"]), DEFAULT_COMMAND_TIMEOUT).await;
        assert!(matches!(result, Err(HostError::CommandFailed(_))));
    }

    #[tokio::test]
    async fn stderr_is_reported() {
        let result = run_command(
            &argv(&["sh", "-c", "echo relay offline >&2; exit 3"]),
            DEFAULT_COMMAND_TIMEOUT,
        )
        .await;
        match result {
            Err(HostError::CommandFailed(msg)) => assert!(msg.contains("relay offline")),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_program_fails_to_spawn() {
        let result = run_command(
            &argv(&["/nonexistent/headroomd-relay"]),
            DEFAULT_COMMAND_TIMEOUT,
        )
        .await;
        assert!(matches!(result, Err(HostError::CommandFailed(_))));
    }

    #[tokio::test]
    async fn slow_command_times_out() {
        let result = run_command(&argv(&["sleep", "5"]), Duration::from_millis(100)).await;
        match result {
            Err(HostError::CommandFailed(msg)) => assert!(msg.contains("timed out")),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn empty_argv_is_rejected() {
        let result = run_command(&[], DEFAULT_COMMAND_TIMEOUT).await;
        assert!(matches!(result, Err(HostError::CommandFailed(_))));
    }
}
