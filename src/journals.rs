//! Journal-name resolution by ISSN.
//!
//! Names already known from the competitor ranking are answered locally.
//! Anything else goes to the Crossref journal endpoint, one request at a
//! time with a minimum interval between requests. Results, including
//! misses, are cached for the lifetime of the resolver.

use crate::config::Config;
use crate::fetcher::{FetchOutcome, Fetcher};
use crate::model::{normalize_issn, CompetitorJournal};
use crate::sources::crossref::JournalLookup;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

pub struct JournalNames {
    fetcher: Fetcher,
    mailto: String,
    min_interval: Duration,
    known: HashMap<String, String>,
    cache: Mutex<HashMap<String, Option<String>>>,
    last_request: Mutex<Option<Instant>>,
    lookups: Mutex<usize>,
}

impl JournalNames {
    pub fn new(fetcher: Fetcher, config: &Config) -> Self {
        Self {
            fetcher,
            mailto: config.mailto.clone(),
            min_interval: config.lookup_delay,
            known: HashMap::new(),
            cache: Mutex::new(HashMap::new()),
            last_request: Mutex::new(None),
            lookups: Mutex::new(0),
        }
    }

    /// Seed the fast path from a competitor table
    pub fn with_known<'a>(mut self, competitors: impl IntoIterator<Item = &'a CompetitorJournal>) -> Self {
        for c in competitors {
            let Some(issn) = normalize_issn(&c.issn) else {
                continue;
            };
            if !c.journal.trim().is_empty() {
                self.known.entry(issn).or_insert_with(|| c.journal.trim().to_string());
            }
        }
        self
    }

    /// Name from the competitor table only
    pub fn known(&self, issn: &str) -> Option<&str> {
        let issn = normalize_issn(issn)?;
        self.known.get(&issn).map(String::as_str)
    }

    /// Name of `issn`, from the competitor table or an external lookup.
    ///
    /// Returns `None` when neither knows the journal.
    pub async fn resolve(&self, issn: &str) -> Option<String> {
        let issn = normalize_issn(issn)?;
        if let Some(name) = self.known.get(&issn) {
            return Some(name.clone());
        }

        {
            let cache = self.cache.lock().ok()?;
            if let Some(cached) = cache.get(&issn) {
                debug!(issn = %issn, "Cache hit");
                return cached.clone();
            }
        }

        self.wait_for_rate_limit().await;
        let result = self.lookup(&issn).await;

        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(issn, result.clone());
        }
        result
    }

    /// Number of external lookups issued so far
    pub fn lookups(&self) -> usize {
        self.lookups.lock().map(|n| *n).unwrap_or_default()
    }

    async fn wait_for_rate_limit(&self) {
        let remaining = {
            let last = self.last_request.lock().ok();
            last.and_then(|l| *l)
                .map(|t| self.min_interval.saturating_sub(t.elapsed()))
        };

        if let Some(remaining) = remaining.filter(|r| !r.is_zero()) {
            tokio::time::sleep(remaining).await;
        }

        if let Ok(mut last) = self.last_request.lock() {
            *last = Some(Instant::now());
        }
    }

    async fn lookup(&self, issn: &str) -> Option<String> {
        if let Ok(mut n) = self.lookups.lock() {
            *n += 1;
        }
        let source = JournalLookup {
            issn: issn.to_string(),
            mailto: self.mailto.clone(),
        };
        match self.fetcher.fetch_all(&source).await {
            FetchOutcome::Items(titles) => {
                let title = titles.into_iter().next();
                info!(issn = issn, title = ?title, "Resolved journal name");
                title
            }
            FetchOutcome::NoData => {
                debug!(issn = issn, "Journal has no title");
                None
            }
            FetchOutcome::Failed(e) => {
                warn!(issn = issn, error = %e, "Journal lookup failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::RetryPolicy;
    use crate::http::mock::MockTransport;
    use serde_json::json;
    use std::sync::Arc;

    fn names(mock: Arc<MockTransport>) -> JournalNames {
        let fetcher = Fetcher::new(mock, Default::default(), RetryPolicy { max_attempts: 1, base_delay: Duration::ZERO });
        let config = Config {
            lookup_delay: Duration::ZERO,
            ..Config::default()
        };
        JournalNames::new(fetcher, &config)
    }

    #[tokio::test]
    async fn test_known_names_skip_lookup() {
        let mock = Arc::new(MockTransport::new());
        let table = vec![CompetitorJournal {
            journal: "Surface Science".into(),
            issn: "0039-6028".into(),
            citations: 1,
            references: 0,
            total_score: 1,
        }];
        let names = names(mock.clone()).with_known(&table);

        assert_eq!(names.resolve("00396028").await.as_deref(), Some("Surface Science"));
        assert_eq!(names.known("0039-6028"), Some("Surface Science"));
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn test_lookup_cached_including_misses() {
        let mock = Arc::new(MockTransport::new());
        mock.json("https://api.crossref.org/journals/1111-1111", json!({"message": {"title": "Alpha"}}));
        let names = names(mock.clone());

        assert_eq!(names.resolve("1111-1111").await.as_deref(), Some("Alpha"));
        assert_eq!(names.resolve("1111-1111").await.as_deref(), Some("Alpha"));
        assert_eq!(names.resolve("2222-2222").await, None);
        assert_eq!(names.resolve("2222-2222").await, None);
        assert_eq!(names.resolve("not an issn").await, None);
        assert_eq!(mock.call_count(), 2);
        assert_eq!(names.lookups(), 2);
    }
}
