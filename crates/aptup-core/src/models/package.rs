/// A single package's available version transition, parsed from one line of
/// the upgrade listing. Records are immutable once parsed and are replaced
/// wholesale by the next refresh cycle.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct UpgradeRecord {
    pub name: String,
    pub current_version: String,
    pub candidate_version: String,
}
