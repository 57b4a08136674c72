use std::io::IsTerminal;

use anstyle::{AnsiColor, Style};

use aptup_core::models::{OrchestratorState, UpgradeRecord};
use aptup_core::orchestrator::Notification;

const INFO: Style = AnsiColor::Green.on_default();
const ERROR: Style = AnsiColor::Red.on_default();
const DETAIL: Style = AnsiColor::BrightBlack.on_default();

#[derive(Clone, Copy, Debug)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn detect() -> Self {
        Self {
            color: std::io::stdout().is_terminal(),
        }
    }

    #[cfg(test)]
    fn plain() -> Self {
        Self { color: false }
    }

    pub fn notification_lines(&self, notification: &Notification) -> Vec<String> {
        match notification {
            Notification::State(state) => self.state_lines(state),
            Notification::Rejected { intent, error } => vec![format!(
                "{} {intent:?} rejected: {error}",
                self.paint(ERROR, "ERROR:")
            )],
        }
    }

    pub fn state_lines(&self, state: &OrchestratorState) -> Vec<String> {
        let info = |message: &str| format!("{} {message}", self.paint(INFO, "INFO:"));

        match state {
            OrchestratorState::Idle => vec![info("idle; type 'check' to look for updates")],
            OrchestratorState::Checking => vec![info("checking for updates ...")],
            OrchestratorState::UpToDate => vec![info("all packages are up to date")],
            OrchestratorState::UpdatesAvailable(records) => {
                let mut lines = vec![info(&format!(
                    "{} upgrade(s) available; type 'upgrade' to install",
                    records.len()
                ))];
                lines.extend(records.iter().map(|record| self.record_line(record)));
                lines
            }
            OrchestratorState::Installing => vec![info("installing updates ...")],
            OrchestratorState::InstallComplete => vec![info("all updates installed")],
            OrchestratorState::Failed(error) => {
                vec![format!("{} {error}", self.paint(ERROR, "ERROR:"))]
            }
        }
    }

    fn record_line(&self, record: &UpgradeRecord) -> String {
        format!(
            "  {} {}",
            record.name,
            self.paint(
                DETAIL,
                &format!("{} -> {}", record.current_version, record.candidate_version)
            )
        )
    }

    fn paint(&self, style: Style, text: &str) -> String {
        if self.color {
            format!("{style}{text}{style:#}")
        } else {
            text.to_string()
        }
    }
}
