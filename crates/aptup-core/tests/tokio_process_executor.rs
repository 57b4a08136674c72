use std::time::Duration;

use aptup_core::config::ElevationConfig;
use aptup_core::execution::{
    CommandSpec, ProcessExitStatus, ProcessSpawnRequest, TokioProcessExecutor, spawn_validated,
};
use aptup_core::models::{CoreErrorKind, UpgradeStep};

fn executor() -> TokioProcessExecutor {
    TokioProcessExecutor::new(ElevationConfig::default())
}

#[tokio::test(flavor = "multi_thread")]
async fn runs_command_and_captures_stdout() {
    let request = ProcessSpawnRequest::new(
        UpgradeStep::ListUpgrades,
        CommandSpec::new("/bin/echo").arg("hello"),
    );

    let process = spawn_validated(&executor(), request).unwrap();
    let output = process.wait().await.unwrap();

    assert_eq!(output.status, ProcessExitStatus::ExitCode(0));
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "hello");
}

#[tokio::test(flavor = "multi_thread")]
async fn reports_nonzero_exit_code() {
    let request = ProcessSpawnRequest::new(
        UpgradeStep::RefreshCache,
        CommandSpec::new("/bin/sh").arg("-c").arg("exit 3"),
    );

    let process = spawn_validated(&executor(), request).unwrap();
    let output = process.wait().await.unwrap();

    assert_eq!(output.status, ProcessExitStatus::ExitCode(3));
}

#[tokio::test(flavor = "multi_thread")]
async fn captures_stderr_separately() {
    let request = ProcessSpawnRequest::new(
        UpgradeStep::RefreshCache,
        CommandSpec::new("/bin/sh")
            .arg("-c")
            .arg("echo out; echo oops >&2; exit 1"),
    );

    let process = spawn_validated(&executor(), request).unwrap();
    let output = process.wait().await.unwrap();

    assert_eq!(output.status, ProcessExitStatus::ExitCode(1));
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "out");
    assert_eq!(String::from_utf8_lossy(&output.stderr).trim(), "oops");
}

#[tokio::test(flavor = "multi_thread")]
async fn missing_binary_is_command_not_found() {
    let request = ProcessSpawnRequest::new(
        UpgradeStep::RefreshCache,
        CommandSpec::new("/nonexistent/definitely-missing-binary"),
    );

    let error = spawn_validated(&executor(), request).map(|_| ()).unwrap_err();

    assert_eq!(error.kind, CoreErrorKind::CommandNotFound);
    assert!(error.message.contains("definitely-missing-binary"));
}

#[tokio::test(flavor = "multi_thread")]
async fn slow_command_times_out() {
    let request = ProcessSpawnRequest::new(
        UpgradeStep::ListUpgrades,
        CommandSpec::new("/bin/sleep").arg("5"),
    )
    .timeout(Duration::from_millis(100));

    let process = spawn_validated(&executor(), request).unwrap();
    let error = process.wait().await.unwrap_err();

    assert_eq!(error.kind, CoreErrorKind::Timeout);
}

#[tokio::test(flavor = "multi_thread")]
async fn passes_environment_to_child() {
    let request = ProcessSpawnRequest::new(
        UpgradeStep::RefreshCache,
        CommandSpec::new("/bin/sh")
            .arg("-c")
            .arg("printf %s \"$DEBIAN_FRONTEND\"")
            .env("DEBIAN_FRONTEND", "noninteractive"),
    );

    let process = spawn_validated(&executor(), request).unwrap();
    let output = process.wait().await.unwrap();

    assert_eq!(output.status, ProcessExitStatus::ExitCode(0));
    assert_eq!(String::from_utf8_lossy(&output.stdout), "noninteractive");
}
