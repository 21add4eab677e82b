//! Article-list stage: every Crossref work of one ISSN inside a year window.

use crate::config::{Config, JournalMetadata, YearWindow};
use crate::error::Result;
use crate::fetcher::{FetchOutcome, Fetcher};
use crate::model::Article;
use crate::sources::crossref::ArticleSearch;
use crate::store::{Artifact, JournalStore};
use tracing::{info, warn};

/// Fetch the article list of `issn`. `NoData` and `Failed` are returned to
/// the caller, which decides which ledger slot they belong in.
pub async fn fetch_articles(fetcher: &Fetcher, config: &Config, issn: &str, window: YearWindow) -> FetchOutcome<Article> {
    info!(
        issn = issn,
        from = %window.from_date(),
        until = %window.until_date(),
        "Fetching articles"
    );

    let search = ArticleSearch {
        issn: issn.to_string(),
        window,
        mailto: config.mailto.clone(),
    };
    let outcome = fetcher.fetch_all(&search).await;

    match &outcome {
        FetchOutcome::Items(articles) => info!(issn = issn, count = articles.len(), "Fetched articles"),
        FetchOutcome::NoData => warn!(issn = issn, "No articles in window"),
        FetchOutcome::Failed(e) => warn!(issn = issn, error = %e, "Article fetch failed"),
    }
    outcome
}

/// Base-journal stage: fetch, persist articles and the journal's metadata.
///
/// A failed fetch aborts the stage; an empty journal is persisted as an
/// empty list.
pub async fn run(fetcher: &Fetcher, config: &Config, store: &JournalStore, issn: &str, window: YearWindow) -> Result<Vec<Article>> {
    let articles = fetch_articles(fetcher, config, issn, window).await.into_result()?;

    store.save_records(issn, Artifact::Articles, &articles)?;
    store.save_document(issn, Artifact::Metadata, &JournalMetadata::new(issn, window))?;

    let without_doi = articles.iter().filter(|a| a.doi.is_none()).count();
    println!(
        "Fetched {} articles for ISSN {} ({}-{}), {} without DOI",
        articles.len(),
        issn,
        window.from_year,
        window.until_year,
        without_doi
    );
    Ok(articles)
}

/// Year window recorded for `issn`, falling back to the current default
pub fn window_for(store: &JournalStore, issn: &str) -> Result<YearWindow> {
    Ok(store
        .try_load_document::<JournalMetadata>(issn, Artifact::Metadata)?
        .map(|m| m.window())
        .unwrap_or_else(YearWindow::current))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::{PageSource, RetryPolicy};
    use crate::http::mock::MockTransport;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;

    fn fetcher(mock: Arc<MockTransport>) -> Fetcher {
        Fetcher::new(mock, Default::default(), RetryPolicy { max_attempts: 2, base_delay: Duration::ZERO })
    }

    #[tokio::test]
    async fn test_run_follows_cursor_and_persists() -> Result<()> {
        let config = Config::default();
        let window = YearWindow::new(2020, 2024);
        let search = ArticleSearch { issn: "0169-4332".into(), window, mailto: config.mailto.clone() };

        let mock = Arc::new(MockTransport::new());
        mock.json(
            &search.url("*")?,
            json!({"message": {"next-cursor": "c2", "items": [{"DOI": "10.1/a", "ISSN": ["0169-4332"]}]}}),
        );
        mock.json(
            &search.url("c2")?,
            json!({"message": {"next-cursor": "c3", "items": [{"ISSN": ["0169-4332"]}]}}),
        );
        mock.json(&search.url("c3")?, json!({"message": {"next-cursor": "c4", "items": []}}));

        let dir = TempDir::new()?;
        let store = JournalStore::new(dir.path());
        let articles = run(&fetcher(mock.clone()), &config, &store, "0169-4332", window).await?;

        assert_eq!(articles.len(), 2);
        assert_eq!(mock.call_count(), 3);
        let saved: Vec<Article> = store.load_records("0169-4332", Artifact::Articles)?;
        assert_eq!(saved, articles);
        assert_eq!(window_for(&store, "0169-4332")?, window);
        Ok(())
    }

    #[tokio::test]
    async fn test_failed_fetch_aborts_stage() -> Result<()> {
        let mock = Arc::new(MockTransport::new());
        mock.status("https://api.crossref.org/works", 502);

        let dir = TempDir::new()?;
        let store = JournalStore::new(dir.path());
        let result = run(&fetcher(mock.clone()), &Config::default(), &store, "0169-4332", YearWindow::new(2020, 2024)).await;

        assert!(result.is_err());
        assert_eq!(mock.call_count(), 2);
        assert!(!store.exists("0169-4332", Artifact::Articles));
        Ok(())
    }
}
