/// Phase of the upgrade flow a command or error is attributed to.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum UpgradeStep {
    RefreshCache,
    ListUpgrades,
    Install,
}
