//! Error report, re-derived from whatever the stages persisted.
//!
//! Every input is optional: a stage that never ran contributes zero counts,
//! except a missing competitor set, which reports the whole competitor fetch
//! as failed.

use crate::error::Result;
use crate::ledger::FailureLedger;
use crate::model::{normalize_issn, Article, Authorship, CompetitorJournal};
use crate::resolver::unique_persons;
use crate::store::{Artifact, JournalStore, Stage};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::info;

/// Failures of one stage relative to its input size
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ErrorRate {
    pub total: usize,
    pub failed: usize,
    pub error_percent: f64,
}

impl ErrorRate {
    pub fn new(total: usize, failed: usize) -> Self {
        let error_percent = if total == 0 {
            0.0
        } else {
            round2(failed as f64 * 100.0 / total as f64)
        };
        Self { total, failed, error_percent }
    }

    fn all_failed(total: usize) -> Self {
        Self { total, failed: total, error_percent: 100.0 }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorReport {
    pub issn: String,
    pub articles_fetched: usize,
    /// Failed DOIs of the authorship stage over fetched articles
    pub authors: ErrorRate,
    /// DOIs still failing after a retry run
    pub retry_still_failed: usize,
    /// Failed persons over unique persons
    pub publications: ErrorRate,
    pub authors_without_works: usize,
    pub citations: ErrorRate,
    pub competitors_unresolved_dois: usize,
    /// Failed or empty ISSNs over the competitor set
    pub competitor_articles: ErrorRate,
    pub competitor_authors: BTreeMap<String, ErrorRate>,
}

fn count_records<T: serde::de::DeserializeOwned>(store: &JournalStore, issn: &str, artifact: Artifact) -> Result<usize> {
    Ok(store.try_load_records::<T>(issn, artifact)?.map(|r| r.len()).unwrap_or(0))
}

/// Build the report of `issn` from the store. `expected_competitors` sizes
/// the competitor fetch when no competitor set was stored.
pub fn build(store: &JournalStore, issn: &str, expected_competitors: usize) -> Result<ErrorReport> {
    let articles = count_records::<Article>(store, issn, Artifact::Articles)?;

    let authors_ledger = store.load_ledger(issn, Stage::Authors)?;
    let retry_ledger = store.load_ledger(issn, Stage::RetryDois)?;
    let publications_ledger = store.load_ledger(issn, Stage::Publications)?;
    let citations_ledger = store.load_ledger(issn, Stage::Citations)?;
    let competitors_ledger = store.load_ledger(issn, Stage::Competitors)?;
    let competitor_articles_ledger: FailureLedger = store.load_ledger(issn, Stage::CompetitorArticles)?;

    let persons = store
        .try_load_records::<Authorship>(issn, Artifact::Authors)?
        .map(|rows| unique_persons(&rows).len())
        .unwrap_or(0);

    let top: Option<Vec<CompetitorJournal>> = store.try_load_document(issn, Artifact::TopCompetitors)?;
    let (competitor_articles, competitor_authors) = match top {
        Some(top) => {
            let issns: Vec<String> = top.iter().filter_map(|c| normalize_issn(&c.issn)).collect();
            let rate = ErrorRate::new(issns.len(), competitor_articles_ledger.problem_issns());

            let mut per_competitor = BTreeMap::new();
            for competitor in issns {
                let Ok(total) = count_records::<Article>(store, &competitor, Artifact::Articles) else {
                    continue;
                };
                let failed = store.load_ledger(&competitor, Stage::Authors)?.failed_dois.len();
                per_competitor.insert(competitor, ErrorRate::new(total, failed));
            }
            (rate, per_competitor)
        }
        None => (ErrorRate::all_failed(expected_competitors), BTreeMap::new()),
    };

    Ok(ErrorReport {
        issn: issn.to_string(),
        articles_fetched: articles,
        authors: ErrorRate::new(articles, authors_ledger.failed_dois.len()),
        retry_still_failed: retry_ledger.failed_dois.len(),
        publications: ErrorRate::new(persons, publications_ledger.failed_authors.len()),
        authors_without_works: publications_ledger.no_work_authors.len(),
        citations: ErrorRate::new(articles, citations_ledger.failed_dois.len()),
        competitors_unresolved_dois: competitors_ledger.failed_dois.len(),
        competitor_articles,
        competitor_authors,
    })
}

/// Stage entry: build, persist and print the report.
pub fn run(store: &JournalStore, issn: &str, expected_competitors: usize) -> Result<ErrorReport> {
    let report = build(store, issn, expected_competitors)?;
    let path = store.save_document(issn, Artifact::ErrorReport, &report)?;
    info!(issn = issn, path = %path.display(), "Error report saved");

    println!("Error report for ISSN {}", issn);
    println!("  {:<28} {:>8} {:>8} {:>8}", "stage", "total", "failed", "error %");
    let line = |name: &str, rate: &ErrorRate| {
        println!("  {:<28} {:>8} {:>8} {:>7.2}%", name, rate.total, rate.failed, rate.error_percent);
    };
    println!("  {:<28} {:>8}", "articles", report.articles_fetched);
    line("authors", &report.authors);
    line("author publications", &report.publications);
    line("citations", &report.citations);
    line("competitor articles", &report.competitor_articles);
    for (competitor, rate) in &report.competitor_authors {
        line(&format!("competitor authors {}", competitor), rate);
    }
    println!(
        "  retry still failing: {}, authors without works: {}, unresolved related DOIs: {}",
        report.retry_still_failed, report.authors_without_works, report.competitors_unresolved_dois
    );
    println!("Saved to {}", path.display());
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn article(doi: &str) -> Article {
        Article { doi: Some(doi.into()), published_date: None, issn: vec![], work_type: None }
    }

    #[test]
    fn test_error_rate_rounding() {
        assert_eq!(ErrorRate::new(3, 1).error_percent, 33.33);
        assert_eq!(ErrorRate::new(0, 0).error_percent, 0.0);
    }

    #[test]
    fn test_empty_store_defaults() -> Result<()> {
        let dir = TempDir::new()?;
        let store = JournalStore::new(dir.path());
        let report = build(&store, "0169-4332", 10)?;

        assert_eq!(report.articles_fetched, 0);
        assert_eq!(report.authors, ErrorRate::new(0, 0));
        assert_eq!(report.competitor_articles, ErrorRate { total: 10, failed: 10, error_percent: 100.0 });
        assert!(report.competitor_authors.is_empty());
        Ok(())
    }

    #[test]
    fn test_counts_from_ledgers() -> Result<()> {
        let dir = TempDir::new()?;
        let store = JournalStore::new(dir.path());
        let base = "0169-4332";
        store.save_records(base, Artifact::Articles, &[article("10.1/a"), article("10.1/b"), article("10.1/c"), article("10.1/d")])?;

        let mut authors = FailureLedger::new();
        authors.failed_doi("10.1/a");
        store.save_ledger(base, Stage::Authors, &authors)?;

        let mut comp = FailureLedger::new();
        comp.failed_issn("2222-2222");
        comp.empty_issn("2222-2222");
        store.save_ledger(base, Stage::CompetitorArticles, &comp)?;

        let competitor = |issn: &str| CompetitorJournal { journal: "J".into(), issn: issn.into(), citations: 1, references: 0, total_score: 1 };
        store.save_document(base, Artifact::TopCompetitors, &vec![competitor("1111-1111"), competitor("2222-2222"), competitor("Unknown ISSN")])?;
        store.save_records("1111-1111", Artifact::Articles, &[article("10.5/x"), article("10.5/y")])?;
        let mut comp_authors = FailureLedger::new();
        comp_authors.failed_doi("10.5/y");
        store.save_ledger("1111-1111", Stage::Authors, &comp_authors)?;

        let report = run(&store, base, 10)?;

        assert_eq!(report.articles_fetched, 4);
        assert_eq!(report.authors.error_percent, 25.0);
        assert_eq!(report.competitor_articles, ErrorRate::new(2, 1));
        assert_eq!(report.competitor_authors["1111-1111"], ErrorRate::new(2, 1));
        assert_eq!(report.competitor_authors["2222-2222"], ErrorRate::new(0, 0));
        assert!(store.exists(base, Artifact::ErrorReport));
        Ok(())
    }
}
