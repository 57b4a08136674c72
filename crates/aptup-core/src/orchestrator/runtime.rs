use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::apt::AptSource;
use crate::models::{CoreError, CoreErrorKind, OrchestratorState};
use crate::orchestrator::UpgradeOrchestrator;

/// User intents consumed by the orchestrator runtime.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Intent {
    Check,
    UpgradeAll,
    Shutdown,
}

/// Notifications emitted toward the presentation layer.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Notification {
    State(OrchestratorState),
    /// An intent was rejected without a state change, e.g. because another
    /// operation was already in flight.
    Rejected { intent: Intent, error: CoreError },
}

/// Message-passing front for the orchestrator: intents in, notifications
/// out. Every state change is forwarded; rejections get their own
/// notification because by definition they leave state untouched.
pub struct OrchestratorRuntime {
    pub intents: mpsc::UnboundedSender<Intent>,
    pub notifications: mpsc::UnboundedReceiver<Notification>,
    pub handle: JoinHandle<()>,
}

impl OrchestratorRuntime {
    pub fn spawn<S: AptSource + 'static>(orchestrator: Arc<UpgradeOrchestrator<S>>) -> Self {
        let (intent_tx, mut intent_rx) = mpsc::unbounded_channel::<Intent>();
        let (notify_tx, notify_rx) = mpsc::unbounded_channel::<Notification>();
        // The lossless observer, not the watch: a fast check publishes
        // `Checking` and its result back to back, and both must reach the
        // presentation layer.
        let mut state_rx = orchestrator.observe();

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    state = state_rx.recv() => {
                        let Some(state) = state else { break };
                        if notify_tx.send(Notification::State(state)).is_err() {
                            break;
                        }
                    }
                    intent = intent_rx.recv() => {
                        match intent {
                            None | Some(Intent::Shutdown) => break,
                            Some(intent) => dispatch(intent, &orchestrator, &notify_tx),
                        }
                    }
                }
            }
        });

        Self {
            intents: intent_tx,
            notifications: notify_rx,
            handle,
        }
    }
}

fn dispatch<S: AptSource + 'static>(
    intent: Intent,
    orchestrator: &Arc<UpgradeOrchestrator<S>>,
    notify_tx: &mpsc::UnboundedSender<Notification>,
) {
    let orchestrator = orchestrator.clone();
    let notify_tx = notify_tx.clone();

    tokio::spawn(async move {
        let outcome = match intent {
            Intent::Check => orchestrator.check().await,
            Intent::UpgradeAll => orchestrator.install_all().await,
            Intent::Shutdown => return,
        };

        // Execution failures already surface through the state channel as
        // `Failed`; only rejections need a dedicated notification.
        if let Err(error) = outcome
            && matches!(
                error.kind,
                CoreErrorKind::OperationInProgress | CoreErrorKind::InvalidInput
            )
        {
            let _ = notify_tx.send(Notification::Rejected { intent, error });
        }
    });
}
