//! Authorship stage: one OpenAlex lookup per article DOI.
//!
//! Lookups run concurrently (the fetcher caps in-flight requests per host);
//! each task returns its outcome and the coordinating loop records failures.

use crate::config::Config;
use crate::error::Result;
use crate::fetcher::{FetchOutcome, Fetcher};
use crate::ledger::FailureLedger;
use crate::model::{Article, Authorship};
use crate::sources::openalex::WorkAuthorships;
use crate::store::{Artifact, JournalStore, Stage};
use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// Multiplier for buffer_unordered capacity relative to concurrency
const BUFFER_CAPACITY_MULTIPLIER: usize = 2;

/// Authorship rows of a batch of articles plus the stage's failures
#[derive(Debug, Default)]
pub struct AuthorshipBatch {
    pub rows: Vec<Authorship>,
    pub ledger: FailureLedger,
    /// Articles whose work had no authorships
    pub without_authors: usize,
    /// Articles skipped because they carry no DOI
    pub without_doi: usize,
}

/// Count-style progress bar for a concurrent stage
pub fn progress_bar(total: usize, message: &str) -> ProgressBar {
    let pb = ProgressBar::new(total as u64);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}")
    {
        pb.set_style(style.progress_chars("#>-"));
    }
    pb.set_message(message.to_string());
    pb
}

/// Look up the authorships of every article with a DOI.
pub async fn fetch_authorships(fetcher: &Fetcher, config: &Config, articles: &[Article]) -> AuthorshipBatch {
    let mut batch = AuthorshipBatch::default();

    let mut seen = HashSet::new();
    let mut work = Vec::new();
    for article in articles {
        match &article.doi {
            Some(doi) if seen.insert(doi.clone()) => work.push(WorkAuthorships {
                doi: doi.clone(),
                article: article.clone(),
                mailto: config.mailto.clone(),
            }),
            Some(_) => {}
            None => batch.without_doi += 1,
        }
    }

    let concurrency = config.limits.openalex.max(1);
    let pb = progress_bar(work.len(), "Fetching authorships");

    let mut results = stream::iter(work)
        .map(|source| {
            let fetcher = fetcher.clone();
            async move {
                let outcome = fetcher.fetch_all(&source).await;
                (source.doi, outcome)
            }
        })
        .buffer_unordered(concurrency * BUFFER_CAPACITY_MULTIPLIER);

    while let Some((doi, outcome)) = results.next().await {
        match outcome {
            FetchOutcome::Items(rows) => batch.rows.extend(rows),
            FetchOutcome::NoData => {
                debug!(doi = %doi, "Work has no authorships");
                batch.without_authors += 1;
            }
            FetchOutcome::Failed(e) => {
                debug!(doi = %doi, error = %e, "Authorship lookup failed");
                batch.ledger.failed_doi(doi);
            }
        }
        pb.inc(1);
    }
    pb.finish_and_clear();

    info!(
        rows = batch.rows.len(),
        failed = batch.ledger.failed_dois.len(),
        without_doi = batch.without_doi,
        "Authorship lookup complete"
    );
    batch
}

/// Stage entry: load `issn`'s articles, fetch authorships, persist rows and
/// the failed-DOI ledger.
pub async fn run(fetcher: &Fetcher, config: &Config, store: &JournalStore, issn: &str) -> Result<AuthorshipBatch> {
    let articles: Vec<Article> = store.load_records(issn, Artifact::Articles)?;
    info!(issn = issn, articles = articles.len(), "Loaded articles");

    let batch = fetch_authorships(fetcher, config, &articles).await;

    store.save_records(issn, Artifact::Authors, &batch.rows)?;
    store.save_ledger(issn, Stage::Authors, &batch.ledger)?;

    println!(
        "ISSN {}: {} authorship rows, {} failed DOIs, {} works without authors, {} articles without DOI",
        issn,
        batch.rows.len(),
        batch.ledger.failed_dois.len(),
        batch.without_authors,
        batch.without_doi
    );
    Ok(batch)
}

/// Retry the DOIs an earlier authorship run could not fetch.
///
/// Recovered rows are appended to the journal's authorships, deduplicated
/// by `(doi, author_name)`; DOIs that still fail are kept in their own
/// ledger. The original ledger is left untouched for the report.
pub async fn retry_failed(fetcher: &Fetcher, config: &Config, store: &JournalStore, issn: &str) -> Result<AuthorshipBatch> {
    let failed = store.load_ledger(issn, Stage::Authors)?.failed_dois;
    if failed.is_empty() {
        println!("ISSN {}: no failed DOIs to retry", issn);
        return Ok(AuthorshipBatch::default());
    }

    let articles: Vec<Article> = store.load_records(issn, Artifact::Articles)?;
    let retry: Vec<Article> = failed
        .iter()
        .map(|doi| {
            articles
                .iter()
                .find(|a| a.doi.as_deref() == Some(doi.as_str()))
                .cloned()
                .unwrap_or_else(|| Article {
                    doi: Some(doi.clone()),
                    published_date: None,
                    issn: Vec::new(),
                    work_type: None,
                })
        })
        .collect();
    info!(issn = issn, count = retry.len(), "Retrying failed DOIs");

    let batch = fetch_authorships(fetcher, config, &retry).await;

    let mut rows: Vec<Authorship> = store.try_load_records(issn, Artifact::Authors)?.unwrap_or_default();
    let before = rows.len();
    rows.extend(batch.rows.iter().cloned());
    let rows = dedup_authorships(rows);
    if before == rows.len() && !batch.rows.is_empty() {
        warn!(issn = issn, "Retried rows were already present");
    }

    store.save_records(issn, Artifact::Authors, &rows)?;
    store.save_ledger(issn, Stage::RetryDois, &batch.ledger)?;

    println!(
        "ISSN {}: recovered {} authorship rows, {} DOIs still failing, {} rows total",
        issn,
        batch.rows.len(),
        batch.ledger.failed_dois.len(),
        rows.len()
    );
    Ok(batch)
}

/// Keep the first row of every `(doi, author_name)` pair
pub fn dedup_authorships(rows: Vec<Authorship>) -> Vec<Authorship> {
    let mut seen = HashSet::new();
    rows.into_iter()
        .filter(|row| seen.insert((row.doi.clone(), row.author_name.clone())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::RetryPolicy;
    use crate::http::mock::MockTransport;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;

    fn fetcher(mock: Arc<MockTransport>) -> Fetcher {
        Fetcher::new(mock, Default::default(), RetryPolicy { max_attempts: 2, base_delay: Duration::ZERO })
    }

    fn article(doi: Option<&str>) -> Article {
        Article {
            doi: doi.map(str::to_string),
            published_date: Some("2021-01-02".into()),
            issn: vec!["0169-4332".into()],
            work_type: Some("journal-article".into()),
        }
    }

    fn work(names: &[&str]) -> serde_json::Value {
        let authorships: Vec<_> = names
            .iter()
            .map(|n| json!({"author": {"id": format!("https://openalex.org/A{}", n.len()), "display_name": n}}))
            .collect();
        json!({ "authorships": authorships })
    }

    #[tokio::test]
    async fn test_failures_recorded_not_propagated() {
        let mock = Arc::new(MockTransport::new());
        mock.json("https://api.openalex.org/works/doi:10.1/ok", work(&["Ada", "Bob"]));
        mock.status("https://api.openalex.org/works/doi:10.1/down", 503);
        mock.json("https://api.openalex.org/works/doi:10.1/empty", work(&[]));

        let articles = vec![
            article(Some("10.1/ok")),
            article(Some("10.1/down")),
            article(Some("10.1/empty")),
            article(None),
            article(Some("10.1/ok")),
        ];
        let batch = fetch_authorships(&fetcher(mock.clone()), &Config::default(), &articles).await;

        assert_eq!(batch.rows.len(), 2);
        assert!(batch.rows.iter().all(|r| r.issn.as_deref() == Some("0169-4332")));
        assert_eq!(batch.ledger.failed_dois.iter().collect::<Vec<_>>(), vec!["10.1/down"]);
        assert_eq!(batch.without_authors, 1);
        assert_eq!(batch.without_doi, 1);
        // duplicate DOI fetched once, failing DOI twice
        assert_eq!(mock.call_count(), 4);
    }

    #[tokio::test]
    async fn test_retry_recovers_and_dedups() -> Result<()> {
        let dir = TempDir::new()?;
        let store = JournalStore::new(dir.path());
        let issn = "0169-4332";
        store.save_records(issn, Artifact::Articles, &[article(Some("10.1/a")), article(Some("10.1/b"))])?;

        let first = Arc::new(MockTransport::new());
        first.json("https://api.openalex.org/works/doi:10.1/a", work(&["Ada"]));
        first.status("https://api.openalex.org/works/doi:10.1/b", 500);
        run(&fetcher(first), &Config::default(), &store, issn).await?;
        assert_eq!(store.load_ledger(issn, Stage::Authors)?.failed_dois.len(), 1);

        let second = Arc::new(MockTransport::new());
        second.json("https://api.openalex.org/works/doi:10.1/b", work(&["Bea", "Bea"]));
        let batch = retry_failed(&fetcher(second.clone()), &Config::default(), &store, issn).await?;

        assert_eq!(second.call_count(), 1);
        assert!(batch.ledger.failed_dois.is_empty());
        let rows: Vec<Authorship> = store.load_records(issn, Artifact::Authors)?;
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].published_date.as_deref(), Some("2021-01-02"));
        Ok(())
    }
}
