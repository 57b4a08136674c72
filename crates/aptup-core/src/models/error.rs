use thiserror::Error;

use crate::models::UpgradeStep;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum CoreErrorKind {
    /// The user cancelled or failed the elevation prompt.
    AuthorizationDenied,
    /// The target binary (or the elevation command itself) is absent.
    CommandNotFound,
    /// The command ran but exited with a failing code.
    NonZeroExit,
    /// A check or install was requested while one was already running.
    OperationInProgress,
    InvalidInput,
    ProcessFailure,
    Timeout,
}

#[derive(Clone, Debug, Eq, PartialEq, Error)]
#[error("{kind:?}: {message}")]
pub struct CoreError {
    pub step: Option<UpgradeStep>,
    pub kind: CoreErrorKind,
    pub message: String,
}

impl CoreError {
    pub fn new(kind: CoreErrorKind, message: impl Into<String>) -> Self {
        Self {
            step: None,
            kind,
            message: message.into(),
        }
    }

    pub fn with_step(mut self, step: UpgradeStep) -> Self {
        self.step = Some(step);
        self
    }

    pub fn operation_in_progress(message: impl Into<String>) -> Self {
        Self::new(CoreErrorKind::OperationInProgress, message)
    }
}
