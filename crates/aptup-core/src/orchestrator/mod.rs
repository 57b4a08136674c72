pub mod runtime;

pub use runtime::{Intent, Notification, OrchestratorRuntime};

use std::sync::{Arc, Mutex};

use tokio::sync::{mpsc, watch};

use crate::apt::{AptSource, PackageStateFetcher};
use crate::models::{CoreError, CoreErrorKind, OrchestratorState, UpgradeStep};

pub type OrchestrationResult<T> = Result<T, CoreError>;

/// Owns the upgrade state machine. State is published through a watch
/// channel, so readers only ever see snapshots; every transition is a single
/// atomic check-and-set against the current state.
pub struct UpgradeOrchestrator<S> {
    fetcher: Arc<PackageStateFetcher<S>>,
    state: watch::Sender<OrchestratorState>,
    observers: Mutex<Vec<mpsc::UnboundedSender<OrchestratorState>>>,
}

impl<S: AptSource + 'static> UpgradeOrchestrator<S> {
    pub fn new(fetcher: PackageStateFetcher<S>) -> Self {
        let (state, _) = watch::channel(OrchestratorState::Idle);
        Self {
            fetcher: Arc::new(fetcher),
            state,
            observers: Mutex::new(Vec::new()),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<OrchestratorState> {
        self.state.subscribe()
    }

    /// Registers a lossless observer: every transition is delivered in order.
    /// `subscribe` only guarantees the latest state, which is fine for
    /// polling but loses short-lived states like `Checking` when the
    /// operation finishes quickly.
    pub fn observe(&self) -> mpsc::UnboundedReceiver<OrchestratorState> {
        let (tx, rx) = mpsc::unbounded_channel();
        if let Ok(mut observers) = self.observers.lock() {
            observers.push(tx);
        }
        rx
    }

    pub fn snapshot(&self) -> OrchestratorState {
        self.state.borrow().clone()
    }

    /// Runs refresh-then-list. Returns `OperationInProgress` without touching
    /// state when a check or install is already running; any other failure is
    /// recorded as `Failed` before the error is returned.
    pub async fn check(&self) -> OrchestrationResult<OrchestratorState> {
        self.begin_checking()?;

        let fetcher = self.fetcher.clone();
        let outcome = match tokio::task::spawn_blocking(move || {
            fetcher.refresh_cache()?;
            fetcher.list_upgrades()
        })
        .await
        {
            Ok(result) => result,
            Err(join_error) => Err(CoreError::new(
                CoreErrorKind::ProcessFailure,
                format!("check task failed to complete: {join_error}"),
            )
            .with_step(UpgradeStep::RefreshCache)),
        };

        match outcome {
            Ok(records) if records.is_empty() => Ok(self.publish(OrchestratorState::UpToDate)),
            Ok(records) => {
                tracing::info!(count = records.len(), "upgrades available");
                Ok(self.publish(OrchestratorState::UpdatesAvailable(records)))
            }
            Err(error) => {
                self.publish(OrchestratorState::Failed(error.clone()));
                Err(error)
            }
        }
    }

    /// Installs all available upgrades. Only valid from `UpdatesAvailable`
    /// with a non-empty record list.
    pub async fn install_all(&self) -> OrchestrationResult<OrchestratorState> {
        self.begin_installing()?;

        let fetcher = self.fetcher.clone();
        let outcome = match tokio::task::spawn_blocking(move || fetcher.upgrade_all()).await {
            Ok(result) => result,
            Err(join_error) => Err(CoreError::new(
                CoreErrorKind::ProcessFailure,
                format!("install task failed to complete: {join_error}"),
            )
            .with_step(UpgradeStep::Install)),
        };

        match outcome {
            Ok(()) => Ok(self.publish(OrchestratorState::InstallComplete)),
            Err(error) => {
                self.publish(OrchestratorState::Failed(error.clone()));
                Err(error)
            }
        }
    }

    fn begin_checking(&self) -> OrchestrationResult<()> {
        self.try_transition(|state| match state {
            OrchestratorState::Checking => {
                Err(CoreError::operation_in_progress("a check is already running"))
            }
            OrchestratorState::Installing => {
                Err(CoreError::operation_in_progress("an install is already running"))
            }
            _ => Ok(OrchestratorState::Checking),
        })
    }

    fn begin_installing(&self) -> OrchestrationResult<()> {
        self.try_transition(|state| match state {
            OrchestratorState::Checking => {
                Err(CoreError::operation_in_progress("a check is already running"))
            }
            OrchestratorState::Installing => {
                Err(CoreError::operation_in_progress("an install is already running"))
            }
            OrchestratorState::UpdatesAvailable(records) if !records.is_empty() => {
                Ok(OrchestratorState::Installing)
            }
            other => Err(CoreError::new(
                CoreErrorKind::InvalidInput,
                format!("install requested in state {other:?}; run a check first"),
            )),
        })
    }

    fn try_transition(
        &self,
        decide: impl FnOnce(&OrchestratorState) -> OrchestrationResult<OrchestratorState>,
    ) -> OrchestrationResult<()> {
        let mut outcome = Ok(());
        let mut published = None;
        self.state.send_if_modified(|state| match decide(state) {
            Ok(next) => {
                tracing::debug!(from = ?&*state, to = ?next, "state transition");
                *state = next.clone();
                published = Some(next);
                true
            }
            Err(error) => {
                outcome = Err(error);
                false
            }
        });
        if let Some(state) = published {
            self.notify(&state);
        }
        outcome
    }

    fn publish(&self, next: OrchestratorState) -> OrchestratorState {
        self.state.send_replace(next.clone());
        self.notify(&next);
        next
    }

    fn notify(&self, state: &OrchestratorState) {
        let Ok(mut observers) = self.observers.lock() else {
            return;
        };
        observers.retain(|observer| observer.send(state.clone()).is_ok());
    }
}
