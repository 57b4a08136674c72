pub mod error;
pub mod package;
pub mod state;
pub mod step;

pub use error::{CoreError, CoreErrorKind};
pub use package::UpgradeRecord;
pub use state::OrchestratorState;
pub use step::UpgradeStep;
