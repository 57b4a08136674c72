use crate::models::{CoreError, UpgradeRecord};

/// Orchestrator state machine. Owned exclusively by the orchestrator; the
/// presentation layer only ever reads snapshots.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum OrchestratorState {
    Idle,
    Checking,
    UpToDate,
    UpdatesAvailable(Vec<UpgradeRecord>),
    Installing,
    InstallComplete,
    Failed(CoreError),
}

impl OrchestratorState {
    /// A state-changing operation is in flight.
    pub fn is_busy(&self) -> bool {
        matches!(self, Self::Checking | Self::Installing)
    }
}
