pub mod fetcher;
pub mod process;

pub use fetcher::{AptResult, AptSource, PackageStateFetcher, parse_upgrade_listing};
pub use process::ProcessAptSource;
