use std::sync::Arc;
use std::time::Duration;

use crate::apt::fetcher::{AptResult, AptSource};
use crate::config::{CommandLine, CommandsConfig};
use crate::execution::{
    ProcessExecutor, ProcessExitStatus, ProcessOutput, ProcessSpawnRequest, spawn_validated,
};
use crate::models::{CoreError, CoreErrorKind, UpgradeStep};

// pkexec reports authorization problems through its own exit codes: 126 when
// the user dismisses the prompt, 127 when authorization is refused.
const ELEVATION_DISMISSED_EXIT: i32 = 126;
const ELEVATION_REFUSED_EXIT: i32 = 127;

pub struct ProcessAptSource {
    executor: Arc<dyn ProcessExecutor>,
    commands: CommandsConfig,
}

impl ProcessAptSource {
    pub fn new(executor: Arc<dyn ProcessExecutor>, commands: CommandsConfig) -> Self {
        Self { executor, commands }
    }

    fn request(
        &self,
        step: UpgradeStep,
        line: &CommandLine,
        requires_elevation: bool,
    ) -> ProcessSpawnRequest {
        let mut request =
            ProcessSpawnRequest::new(step, line.to_spec()).requires_elevation(requires_elevation);
        if let Some(secs) = line.timeout_secs {
            request = request.timeout(Duration::from_secs(secs));
        }
        request
    }
}

impl AptSource for ProcessAptSource {
    fn refresh_cache(&self) -> AptResult<()> {
        let request = self.request(UpgradeStep::RefreshCache, &self.commands.refresh, true);
        run_and_collect_stdout(self.executor.as_ref(), request).map(|_| ())
    }

    fn list_upgrades_raw(&self) -> AptResult<String> {
        // Listing does not mutate package state and needs no elevation.
        let request = self.request(UpgradeStep::ListUpgrades, &self.commands.list, false);
        run_and_collect_stdout(self.executor.as_ref(), request)
    }

    fn upgrade_all(&self) -> AptResult<()> {
        let request = self.request(UpgradeStep::Install, &self.commands.upgrade, true);
        run_and_collect_stdout(self.executor.as_ref(), request).map(|_| ())
    }
}

pub(crate) fn run_and_collect_stdout(
    executor: &dyn ProcessExecutor,
    request: ProcessSpawnRequest,
) -> AptResult<String> {
    let step = request.step;
    let elevated = request.requires_elevation;

    tracing::debug!(?step, program = %request.command.program.display(), "running command");

    let process = spawn_validated(executor, request)?;

    let handle = tokio::runtime::Handle::current();
    let output: ProcessOutput = handle.block_on(process.wait())?;

    match output.status {
        // Lossy on purpose: a stray non-UTF-8 byte garbles at most one
        // listing line, which the parser already skips.
        ProcessExitStatus::ExitCode(0) => {
            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        }
        ProcessExitStatus::ExitCode(code)
            if elevated && (code == ELEVATION_DISMISSED_EXIT || code == ELEVATION_REFUSED_EXIT) =>
        {
            Err(CoreError::new(
                CoreErrorKind::AuthorizationDenied,
                format!("authorization was refused or dismissed (exit code {code})"),
            )
            .with_step(step))
        }
        ProcessExitStatus::ExitCode(code) => {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(CoreError::new(
                CoreErrorKind::NonZeroExit,
                format!("process exited with code {code}: {stderr}"),
            )
            .with_step(step))
        }
        ProcessExitStatus::Terminated => Err(CoreError::new(
            CoreErrorKind::ProcessFailure,
            "process was terminated by signal",
        )
        .with_step(step)),
    }
}
