use crate::config::ListFormat;
use crate::models::{CoreError, UpgradeRecord};

pub type AptResult<T> = Result<T, CoreError>;

/// Raw access to the package tool. The process-backed implementation runs
/// the real commands; tests substitute canned output.
pub trait AptSource: Send + Sync {
    fn refresh_cache(&self) -> AptResult<()>;

    fn list_upgrades_raw(&self) -> AptResult<String>;

    fn upgrade_all(&self) -> AptResult<()>;
}

pub struct PackageStateFetcher<S> {
    source: S,
    format: ListFormat,
}

impl<S: AptSource> PackageStateFetcher<S> {
    pub fn new(source: S, format: ListFormat) -> Self {
        Self { source, format }
    }

    pub fn refresh_cache(&self) -> AptResult<()> {
        self.source.refresh_cache()
    }

    pub fn list_upgrades(&self) -> AptResult<Vec<UpgradeRecord>> {
        let raw = self.source.list_upgrades_raw()?;
        Ok(parse_upgrade_listing(&raw, &self.format))
    }

    pub fn upgrade_all(&self) -> AptResult<()> {
        self.source.upgrade_all()
    }
}

/// Parses `apt -qq list --upgradable` style output, one record per
/// well-formed line. Malformed lines are skipped, never an error: a single
/// garbled line must not fail the whole batch.
pub fn parse_upgrade_listing(output: &str, format: &ListFormat) -> Vec<UpgradeRecord> {
    let mut records = Vec::new();

    for line in output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
    {
        match parse_upgrade_line(line, format) {
            Some(record) => records.push(record),
            None => tracing::debug!(line, "skipping malformed upgrade listing line"),
        }
    }

    records
}

// Expected shape: "name/suite candidate arch [upgradable from: current]"
fn parse_upgrade_line(line: &str, format: &ListFormat) -> Option<UpgradeRecord> {
    let mut fields = line.split_whitespace();

    let spec = fields.next()?;
    let (name, _suite) = spec.split_once(format.name_separator)?;
    if name.is_empty() {
        return None;
    }

    let candidate_version = fields.next()?;

    let marker_pos = line.find(format.current_version_marker.as_str())?;
    let current_version = line[marker_pos + format.current_version_marker.len()..]
        .trim()
        .trim_end_matches(']')
        .trim_end();
    if current_version.is_empty() {
        return None;
    }

    Some(UpgradeRecord {
        name: name.to_string(),
        current_version: current_version.to_string(),
        candidate_version: candidate_version.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use crate::config::ListFormat;

    use super::parse_upgrade_listing;

    const LISTING_FIXTURE: &str =
        include_str!("../../tests/fixtures/apt/list_upgradable.txt");

    #[test]
    fn parses_one_record_per_well_formed_line() {
        let parsed = parse_upgrade_listing(LISTING_FIXTURE, &ListFormat::default());

        assert_eq!(parsed.len(), 4);
        assert_eq!(parsed[0].name, "base-files");
        assert_eq!(parsed[0].candidate_version, "12.4+deb12u6");
        assert_eq!(parsed[0].current_version, "12.4+deb12u5");
        assert_eq!(parsed[3].name, "vim");
        assert_eq!(parsed[3].candidate_version, "2:9.0.1378-2");
        assert_eq!(parsed[3].current_version, "2:9.0.1378-1");
    }

    #[test]
    fn malformed_lines_are_skipped_without_error() {
        let output = "\
firefox-esr/stable-security 115.14.0esr-1~deb12u1 amd64 [upgradable from: 115.13.0esr-1~deb12u1]
completely malformed
libssl3/stable 3.0.14-1~deb12u2 amd64
";
        let parsed = parse_upgrade_listing(output, &ListFormat::default());

        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].name, "firefox-esr");
    }

    #[test]
    fn fully_malformed_output_yields_empty_list() {
        let parsed = parse_upgrade_listing("not parseable at all", &ListFormat::default());
        assert!(parsed.is_empty());
    }

    #[test]
    fn empty_output_yields_empty_list() {
        assert!(parse_upgrade_listing("", &ListFormat::default()).is_empty());
        assert!(parse_upgrade_listing("\n\n  \n", &ListFormat::default()).is_empty());
    }

    #[test]
    fn configured_format_overrides_the_default_columns() {
        let format = ListFormat {
            name_separator: ':',
            current_version_marker: "was:".to_string(),
        };

        let parsed = parse_upgrade_listing("foo:stable 2.0 amd64 [was: 1.0]", &format);

        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].name, "foo");
        assert_eq!(parsed[0].candidate_version, "2.0");
        assert_eq!(parsed[0].current_version, "1.0");
    }

    #[test]
    fn line_without_current_version_is_skipped() {
        let parsed = parse_upgrade_listing(
            "foo/stable 2.0 amd64 [upgradable from: ]",
            &ListFormat::default(),
        );
        assert!(parsed.is_empty());
    }
}
