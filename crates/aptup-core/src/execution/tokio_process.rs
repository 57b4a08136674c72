use std::sync::Mutex;
use std::time::{Duration, SystemTime};

use tokio::io::AsyncReadExt;

use crate::config::ElevationConfig;
use crate::execution::{
    CommandSpec, ExecutionResult, ProcessExecutor, ProcessExitStatus, ProcessOutput,
    ProcessSpawnRequest, ProcessWaitFuture, RunningProcess,
};
use crate::models::{CoreError, CoreErrorKind, UpgradeStep};

pub struct TokioProcessExecutor {
    elevation: ElevationConfig,
}

impl TokioProcessExecutor {
    pub fn new(elevation: ElevationConfig) -> Self {
        Self { elevation }
    }

    fn effective_command(&self, request: &ProcessSpawnRequest) -> CommandSpec {
        if request.requires_elevation && !running_as_root() {
            elevate(&self.elevation, &request.command)
        } else {
            request.command.clone()
        }
    }
}

impl ProcessExecutor for TokioProcessExecutor {
    fn spawn(&self, request: ProcessSpawnRequest) -> ExecutionResult<Box<dyn RunningProcess>> {
        let command = self.effective_command(&request);

        let mut cmd = tokio::process::Command::new(&command.program);
        cmd.args(&command.args);

        for (key, value) in &command.env {
            cmd.env(key, value);
        }

        cmd.stdin(std::process::Stdio::null());
        cmd.stdout(std::process::Stdio::piped());
        cmd.stderr(std::process::Stdio::piped());
        cmd.process_group(0);

        let child = cmd.spawn().map_err(|error| match error.kind() {
            std::io::ErrorKind::NotFound => CoreError::new(
                CoreErrorKind::CommandNotFound,
                format!("{}: {error}", command.program.display()),
            )
            .with_step(request.step),
            _ => process_failure(request.step, format!("failed to spawn process: {error}")),
        })?;

        let pid = child.id();
        let started_at = SystemTime::now();

        Ok(Box::new(TokioRunningProcess {
            child: Mutex::new(Some(child)),
            pid,
            started_at,
            timeout: request.timeout,
            step: request.step,
        }))
    }
}

fn running_as_root() -> bool {
    unsafe { libc::geteuid() == 0 }
}

/// Wraps a command in the elevation mechanism. pkexec scrubs the caller's
/// environment, so requested variables are forwarded through env(1).
pub(crate) fn elevate(elevation: &ElevationConfig, command: &CommandSpec) -> CommandSpec {
    let mut spec = CommandSpec::new(&elevation.command);

    if !command.env.is_empty() {
        spec = spec.arg("env");
        for (key, value) in &command.env {
            spec = spec.arg(format!("{key}={value}"));
        }
    }

    spec = spec.arg(command.program.display().to_string());
    spec.args(command.args.iter().cloned())
}

struct TokioRunningProcess {
    child: Mutex<Option<tokio::process::Child>>,
    pid: Option<u32>,
    started_at: SystemTime,
    timeout: Option<Duration>,
    step: UpgradeStep,
}

impl RunningProcess for TokioRunningProcess {
    fn pid(&self) -> Option<u32> {
        self.pid
    }

    fn wait(self: Box<Self>) -> ProcessWaitFuture {
        let child = self.child.into_inner().ok().flatten();
        let timeout = self.timeout;
        let started_at = self.started_at;
        let step = self.step;
        let pid = self.pid;

        Box::pin(async move {
            let mut child = child.ok_or_else(|| {
                process_failure(step, "child process already consumed".to_string())
            })?;

            let stdout_reader = {
                let mut stdout = child.stdout.take();
                tokio::spawn(async move {
                    let mut buffer = Vec::new();
                    if let Some(mut handle) = stdout.take() {
                        let _ = handle.read_to_end(&mut buffer).await;
                    }
                    buffer
                })
            };
            let stderr_reader = {
                let mut stderr = child.stderr.take();
                tokio::spawn(async move {
                    let mut buffer = Vec::new();
                    if let Some(mut handle) = stderr.take() {
                        let _ = handle.read_to_end(&mut buffer).await;
                    }
                    buffer
                })
            };

            let wait_err = |error: std::io::Error| {
                process_failure(step, format!("failed to wait for process: {error}"))
            };

            // Wait for process exit first, then collect output with a short
            // bounded read window. This avoids hanging forever when descendant
            // processes inherit stdout/stderr fds.
            let status = if let Some(timeout_duration) = timeout {
                match tokio::time::timeout(timeout_duration, child.wait()).await {
                    Ok(result) => result.map_err(wait_err)?,
                    Err(_) => {
                        // A non-root parent cannot signal a root-owned group
                        // (pkexec children), so the kill result must be
                        // checked, not assumed.
                        let mut kill_error = None;
                        if let Some(pid) = pid {
                            let pgid = -(pid as libc::pid_t);
                            if unsafe { libc::kill(pgid, libc::SIGKILL) } != 0 {
                                kill_error = Some(std::io::Error::last_os_error());
                            }
                        }
                        let _ = tokio::time::timeout(Duration::from_secs(1), child.wait()).await;
                        stdout_reader.abort();
                        stderr_reader.abort();
                        let message = match kill_error {
                            Some(error) => {
                                tracing::warn!(%error, pid, "timed-out process could not be killed");
                                format!(
                                    "process timed out after {}ms and could not be killed: {error}",
                                    timeout_duration.as_millis()
                                )
                            }
                            None => format!(
                                "process timed out after {}ms",
                                timeout_duration.as_millis()
                            ),
                        };
                        return Err(CoreError::new(CoreErrorKind::Timeout, message).with_step(step));
                    }
                }
            } else {
                child.wait().await.map_err(wait_err)?
            };

            let read_deadline = Duration::from_millis(250);
            let stdout = match tokio::time::timeout(read_deadline, stdout_reader).await {
                Ok(Ok(buffer)) => buffer,
                _ => Vec::new(),
            };
            let stderr = match tokio::time::timeout(read_deadline, stderr_reader).await {
                Ok(Ok(buffer)) => buffer,
                _ => Vec::new(),
            };

            let finished_at = SystemTime::now();

            let status = match status.code() {
                Some(code) => ProcessExitStatus::ExitCode(code),
                None => ProcessExitStatus::Terminated,
            };

            Ok(ProcessOutput {
                status,
                stdout,
                stderr,
                started_at,
                finished_at,
            })
        })
    }
}

fn process_failure(step: UpgradeStep, message: impl Into<String>) -> CoreError {
    CoreError::new(CoreErrorKind::ProcessFailure, message).with_step(step)
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::elevate;
    use crate::config::ElevationConfig;
    use crate::execution::CommandSpec;

    #[test]
    fn elevation_wraps_command_with_pkexec() {
        let elevation = ElevationConfig::default();
        let command = CommandSpec::new("/usr/bin/apt").arg("-y").arg("update");

        let wrapped = elevate(&elevation, &command);

        assert_eq!(wrapped.program, PathBuf::from("/usr/bin/pkexec"));
        assert_eq!(wrapped.args, vec!["/usr/bin/apt", "-y", "update"]);
        assert!(wrapped.env.is_empty());
    }

    #[test]
    fn elevation_forwards_environment_through_env() {
        let elevation = ElevationConfig::default();
        let command = CommandSpec::new("/usr/bin/apt")
            .arg("-yqq")
            .arg("full-upgrade")
            .env("DEBIAN_FRONTEND", "noninteractive");

        let wrapped = elevate(&elevation, &command);

        assert_eq!(wrapped.program, PathBuf::from("/usr/bin/pkexec"));
        assert_eq!(
            wrapped.args,
            vec![
                "env",
                "DEBIAN_FRONTEND=noninteractive",
                "/usr/bin/apt",
                "-yqq",
                "full-upgrade",
            ]
        );
        assert!(wrapped.env.is_empty());
    }
}
