//! Pipeline configuration.
//!
//! Values come from the CLI (see `main.rs`); `Config::default()` carries the
//! documented defaults so library callers and tests need no flags.

use crate::http::Host;
use chrono::{Datelike, Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Contact address sent to the polite pools of Crossref and OpenAlex
pub const DEFAULT_CONTACT_EMAIL: &str = "journalscope@example.org";

/// Number of publication years covered by a run
const WINDOW_YEARS: i32 = 5;

/// Maximum simultaneous in-flight requests per external host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostLimits {
    pub crossref: usize,
    pub openalex: usize,
    pub orcid: usize,
    pub opencitations: usize,
}

impl HostLimits {
    pub fn for_host(&self, host: Host) -> usize {
        let limit = match host {
            Host::Crossref => self.crossref,
            Host::OpenAlex => self.openalex,
            Host::Orcid => self.orcid,
            Host::OpenCitations => self.opencitations,
        };
        limit.max(1)
    }
}

impl Default for HostLimits {
    fn default() -> Self {
        Self {
            crossref: 5,
            openalex: 10,
            orcid: 3,
            opencitations: 10,
        }
    }
}

/// Runtime configuration shared by every stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Root of the ISSN-keyed store
    pub data_dir: PathBuf,
    /// Contact e-mail for API usage policies
    pub mailto: String,
    /// Attempts per request, including the first
    pub max_attempts: u32,
    /// Per-request timeout
    pub timeout: Duration,
    /// Base of the exponential backoff (`base * 2^attempt`)
    pub backoff_base: Duration,
    pub limits: HostLimits,
    /// Pause between sequential journal-name lookups
    pub lookup_delay: Duration,
    /// Size of the competitor set
    pub top_competitors: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            mailto: DEFAULT_CONTACT_EMAIL.to_string(),
            max_attempts: 3,
            timeout: Duration::from_secs(30),
            backoff_base: Duration::from_secs(1),
            limits: HostLimits::default(),
            lookup_delay: Duration::from_millis(200),
            top_competitors: 10,
        }
    }
}

/// Inclusive range of publication years
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearWindow {
    pub from_year: i32,
    pub until_year: i32,
}

impl YearWindow {
    pub fn new(from_year: i32, until_year: i32) -> Self {
        Self { from_year, until_year }
    }

    /// The last complete calendar year and the four before it.
    pub fn trailing(today: NaiveDate) -> Self {
        let until_year = today.year() - 1;
        Self {
            from_year: until_year - (WINDOW_YEARS - 1),
            until_year,
        }
    }

    pub fn current() -> Self {
        Self::trailing(Local::now().date_naive())
    }

    pub fn contains(&self, year: i32) -> bool {
        year >= self.from_year && year <= self.until_year
    }

    /// `YYYY-01-01` for Crossref's `from-pub-date` filter
    pub fn from_date(&self) -> String {
        format!("{}-01-01", self.from_year)
    }

    /// `YYYY-12-31` for Crossref's `until-pub-date` filter
    pub fn until_date(&self) -> String {
        format!("{}-12-31", self.until_year)
    }
}

/// Per-journal run metadata persisted next to the journal's articles
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalMetadata {
    pub issn: String,
    pub from_year: i32,
    pub until_year: i32,
    pub retrieved_on: String,
}

impl JournalMetadata {
    pub fn new(issn: &str, window: YearWindow) -> Self {
        Self {
            issn: issn.to_string(),
            from_year: window.from_year,
            until_year: window.until_year,
            retrieved_on: Local::now().format("%Y-%m-%d").to_string(),
        }
    }

    pub fn window(&self) -> YearWindow {
        YearWindow::new(self.from_year, self.until_year)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trailing_window() {
        let today = NaiveDate::from_ymd_opt(2025, 3, 14).expect("valid date");
        let window = YearWindow::trailing(today);
        assert_eq!(window, YearWindow::new(2020, 2024));
        assert_eq!(window.from_date(), "2020-01-01");
        assert_eq!(window.until_date(), "2024-12-31");
    }

    #[test]
    fn test_window_is_inclusive() {
        let window = YearWindow::new(2020, 2024);
        assert!(window.contains(2020));
        assert!(window.contains(2024));
        assert!(!window.contains(2019));
        assert!(!window.contains(2025));
    }

    #[test]
    fn test_zero_limit_is_clamped() {
        let limits = HostLimits { orcid: 0, ..HostLimits::default() };
        assert_eq!(limits.for_host(Host::Orcid), 1);
        assert_eq!(limits.for_host(Host::OpenAlex), 10);
    }
}
