use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::execution::CommandSpec;
use crate::models::{CoreError, CoreErrorKind};

/// Runtime configuration. Everything here is policy the underlying package
/// tool changes between versions: the exact command lines, the upgrade
/// listing column format and the elevation command.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub commands: CommandsConfig,
    pub list_format: ListFormat,
    pub elevation: ElevationConfig,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CommandsConfig {
    pub refresh: CommandLine,
    pub list: CommandLine,
    pub upgrade: CommandLine,
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CommandLine {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub env: BTreeMap<String, String>,
    pub timeout_secs: Option<u64>,
}

impl CommandLine {
    pub fn to_spec(&self) -> CommandSpec {
        let mut spec = CommandSpec::new(&self.program).args(self.args.iter().cloned());
        for (key, value) in &self.env {
            spec = spec.env(key, value);
        }
        spec
    }
}

impl Default for CommandsConfig {
    fn default() -> Self {
        let noninteractive: BTreeMap<String, String> = [(
            "DEBIAN_FRONTEND".to_string(),
            "noninteractive".to_string(),
        )]
        .into_iter()
        .collect();

        Self {
            // No default timeouts on the elevated commands: they run as root
            // under pkexec, and a non-root parent cannot kill that process
            // group. Only the unelevated listing gets one.
            refresh: CommandLine {
                program: PathBuf::from("/usr/bin/apt"),
                args: vec!["-y".to_string(), "update".to_string()],
                env: noninteractive.clone(),
                timeout_secs: None,
            },
            list: CommandLine {
                program: PathBuf::from("/usr/bin/apt"),
                args: vec![
                    "-qq".to_string(),
                    "list".to_string(),
                    "--upgradable".to_string(),
                ],
                env: BTreeMap::new(),
                timeout_secs: Some(120),
            },
            upgrade: CommandLine {
                program: PathBuf::from("/usr/bin/apt"),
                args: vec!["-yqq".to_string(), "full-upgrade".to_string()],
                env: noninteractive,
                timeout_secs: None,
            },
        }
    }
}

/// Column format of the upgrade listing. Tool-version-dependent, so it is
/// configuration rather than a hard-coded contract.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ListFormat {
    /// Separates the package name from the suite in the first column.
    pub name_separator: char,
    /// Introduces the currently installed version near the end of the line.
    pub current_version_marker: String,
}

impl Default for ListFormat {
    fn default() -> Self {
        Self {
            name_separator: '/',
            current_version_marker: "upgradable from:".to_string(),
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ElevationConfig {
    pub command: PathBuf,
}

impl Default for ElevationConfig {
    fn default() -> Self {
        Self {
            command: PathBuf::from("/usr/bin/pkexec"),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, CoreError> {
        let contents = std::fs::read_to_string(path).map_err(|error| {
            CoreError::new(
                CoreErrorKind::InvalidInput,
                format!("failed to read config file {}: {error}", path.display()),
            )
        })?;

        serde_json::from_str(&contents).map_err(|error| {
            CoreError::new(
                CoreErrorKind::InvalidInput,
                format!("invalid config file {}: {error}", path.display()),
            )
        })
    }

    /// Loads the first config file found in the usual locations. A missing
    /// file is normal and yields defaults; an unreadable or invalid file is
    /// logged and also yields defaults so a typo never bricks the tool.
    pub fn load_or_default() -> Self {
        for path in candidate_paths() {
            if !path.is_file() {
                continue;
            }
            match Self::load(&path) {
                Ok(config) => {
                    tracing::info!(path = %path.display(), "loaded configuration");
                    return config;
                }
                Err(error) => {
                    tracing::warn!(path = %path.display(), %error, "ignoring bad config file");
                    return Self::default();
                }
            }
        }
        Self::default()
    }
}

fn candidate_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    if let Ok(config_home) = std::env::var("XDG_CONFIG_HOME")
        && !config_home.is_empty()
    {
        paths.push(PathBuf::from(config_home).join("aptup/config.json"));
    }

    if let Ok(home) = std::env::var("HOME")
        && !home.is_empty()
    {
        paths.push(PathBuf::from(home).join(".config/aptup/config.json"));
    }

    paths.push(PathBuf::from("/etc/aptup/config.json"));
    paths
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::{CommandLine, Config};

    #[test]
    fn defaults_match_apt_invocations() {
        let config = Config::default();

        assert_eq!(config.commands.refresh.program, PathBuf::from("/usr/bin/apt"));
        assert_eq!(config.commands.refresh.args, vec!["-y", "update"]);
        assert_eq!(
            config.commands.refresh.env.get("DEBIAN_FRONTEND").map(String::as_str),
            Some("noninteractive")
        );
        assert_eq!(config.commands.list.args, vec!["-qq", "list", "--upgradable"]);
        assert_eq!(config.commands.upgrade.args, vec!["-yqq", "full-upgrade"]);
        assert_eq!(config.list_format.name_separator, '/');
        assert_eq!(config.list_format.current_version_marker, "upgradable from:");
        assert_eq!(config.elevation.command, PathBuf::from("/usr/bin/pkexec"));
    }

    #[test]
    fn only_the_unelevated_listing_has_a_default_timeout() {
        let config = Config::default();

        assert_eq!(config.commands.refresh.timeout_secs, None);
        assert_eq!(config.commands.upgrade.timeout_secs, None);
        assert_eq!(config.commands.list.timeout_secs, Some(120));
    }

    #[test]
    fn partial_config_file_keeps_remaining_defaults() {
        let parsed: Config = serde_json::from_str(
            r#"{"list_format": {"current_version_marker": "atualizavel de:"}}"#,
        )
        .unwrap();

        assert_eq!(parsed.list_format.current_version_marker, "atualizavel de:");
        assert_eq!(parsed.list_format.name_separator, '/');
        assert_eq!(parsed.commands, Config::default().commands);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let parsed = serde_json::from_str::<Config>(r#"{"no_such_field": 1}"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn command_line_converts_to_spec() {
        let line = CommandLine {
            program: PathBuf::from("/usr/bin/apt"),
            args: vec!["-y".to_string(), "update".to_string()],
            env: [("DEBIAN_FRONTEND".to_string(), "noninteractive".to_string())]
                .into_iter()
                .collect(),
            timeout_secs: Some(600),
        };

        let spec = line.to_spec();
        assert_eq!(spec.program, PathBuf::from("/usr/bin/apt"));
        assert_eq!(spec.args, vec!["-y", "update"]);
        assert_eq!(
            spec.env.get("DEBIAN_FRONTEND").map(String::as_str),
            Some("noninteractive")
        );
    }
}
