mod render;

use std::io::BufRead;
use std::process::ExitCode;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use aptup_core::apt::{PackageStateFetcher, ProcessAptSource};
use aptup_core::config::Config;
use aptup_core::execution::TokioProcessExecutor;
use aptup_core::models::OrchestratorState;
use aptup_core::orchestrator::{Intent, OrchestratorRuntime, UpgradeOrchestrator};

use render::Renderer;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            eprintln!("failed to initialize async runtime: {error}");
            return ExitCode::FAILURE;
        }
    };

    runtime.block_on(run())
}

async fn run() -> ExitCode {
    let config = Config::load_or_default();

    let executor = Arc::new(TokioProcessExecutor::new(config.elevation.clone()));
    let source = ProcessAptSource::new(executor, config.commands.clone());
    let fetcher = PackageStateFetcher::new(source, config.list_format.clone());
    let orchestrator = Arc::new(UpgradeOrchestrator::new(fetcher));

    let OrchestratorRuntime {
        intents,
        mut notifications,
        handle,
    } = OrchestratorRuntime::spawn(orchestrator);

    let renderer = Renderer::detect();
    for line in renderer.state_lines(&OrchestratorState::Idle) {
        println!("{line}");
    }
    println!("commands: check (c), upgrade (u), quit (q)");

    // Check immediately on startup, like the desktop front-end does.
    let _ = intents.send(Intent::Check);

    let mut input = stdin_lines();
    loop {
        tokio::select! {
            notification = notifications.recv() => {
                let Some(notification) = notification else { break };
                for line in renderer.notification_lines(&notification) {
                    println!("{line}");
                }
            }
            line = input.recv() => {
                match line.as_deref() {
                    None | Some("quit") | Some("q") => {
                        tracing::debug!("shutting down");
                        let _ = intents.send(Intent::Shutdown);
                        break;
                    }
                    Some("check") | Some("c") => {
                        let _ = intents.send(Intent::Check);
                    }
                    Some("upgrade") | Some("u") => {
                        let _ = intents.send(Intent::UpgradeAll);
                    }
                    Some("") => {}
                    Some(other) => {
                        println!("unrecognized command '{other}'; use check, upgrade or quit");
                    }
                }
            }
        }
    }

    let _ = handle.await;
    ExitCode::SUCCESS
}

// Stdin is read on a plain thread; reads cannot be cancelled, so the thread
// just dies with the process after the channel closes.
fn stdin_lines() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();

    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line.trim().to_string()).is_err() {
                break;
            }
        }
    });

    rx
}
