//! Competitor journals.
//!
//! The venues of every DOI that cites or is referenced by the base journal
//! are counted and ranked; the top venues become the competitor set whose
//! articles and authors are then collected like the base journal's.

use crate::authors::progress_bar;
use crate::config::{Config, JournalMetadata};
use crate::error::Result;
use crate::fetcher::{FetchOutcome, Fetcher};
use crate::ledger::FailureLedger;
use crate::model::{normalize_issn, split_issns, CitationLink, CompetitorJournal, PublicationCompetitor, WorkRecord};
use crate::sources::{crossref, openalex, Venue};
use crate::store::{Artifact, JournalStore, Stage};
use crate::{articles, authors, resolver};
use futures::stream::{self, StreamExt};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::{debug, info, warn};

/// Venue of `doi`: Crossref first, OpenAlex when Crossref has nothing.
/// The first source that answers wins.
pub async fn resolve_venue(fetcher: &Fetcher, config: &Config, doi: &str) -> Option<Venue> {
    let crossref = crossref::WorkVenueLookup { doi: doi.to_string(), mailto: config.mailto.clone() };
    match fetcher.fetch_all(&crossref).await {
        FetchOutcome::Items(venues) => {
            if let Some(venue) = venues.into_iter().next() {
                return Some(venue);
            }
        }
        FetchOutcome::NoData => {}
        FetchOutcome::Failed(e) => debug!(doi = doi, error = %e, "Crossref venue lookup failed"),
    }

    let openalex = openalex::WorkVenueLookup { doi: doi.to_string(), mailto: config.mailto.clone() };
    match fetcher.fetch_all(&openalex).await {
        FetchOutcome::Items(venues) => venues.into_iter().next(),
        FetchOutcome::NoData => None,
        FetchOutcome::Failed(e) => {
            debug!(doi = doi, error = %e, "OpenAlex venue lookup failed");
            None
        }
    }
}

/// `(journal, issn)` key of a venue, `None` without a valid ISSN
fn venue_key(venue: &Venue) -> Option<(String, String)> {
    let issn = normalize_issn(venue.issn.as_deref()?)?;
    Some((venue.journal.trim().to_string(), issn))
}

/// Count citations and references per venue and rank by their sum.
///
/// Edges whose related DOI has no venue, or a venue without a valid ISSN,
/// are ignored. Ties keep the order of `(journal, issn)`.
pub fn rank_venues(
    citations: &[CitationLink],
    references: &[CitationLink],
    venues: &HashMap<String, Venue>,
) -> Vec<CompetitorJournal> {
    let mut counts: BTreeMap<(String, String), (u64, u64)> = BTreeMap::new();
    for link in citations {
        if let Some(key) = venues.get(&link.related_doi).and_then(venue_key) {
            counts.entry(key).or_default().0 += 1;
        }
    }
    for link in references {
        if let Some(key) = venues.get(&link.related_doi).and_then(venue_key) {
            counts.entry(key).or_default().1 += 1;
        }
    }

    let mut ranking: Vec<CompetitorJournal> = counts
        .into_iter()
        .map(|((journal, issn), (citations, references))| CompetitorJournal {
            journal,
            issn,
            citations,
            references,
            total_score: citations + references,
        })
        .collect();
    ranking.sort_by(|a, b| b.total_score.cmp(&a.total_score));
    ranking
}

/// First `n` venues of `ranking` other than the base journal
pub fn top_competitors(ranking: &[CompetitorJournal], base_issn: &str, n: usize) -> Vec<CompetitorJournal> {
    let base = normalize_issn(base_issn).unwrap_or_else(|| base_issn.to_string());
    ranking.iter().filter(|c| c.issn != base).take(n).cloned().collect()
}

/// Venues where the base journal's authors publish, counted per exploded
/// ISSN. Works without a valid ISSN and the base journal itself are left out.
pub fn rank_by_publications(records: &[WorkRecord], base_issn: &str, n: usize) -> Vec<PublicationCompetitor> {
    let base = normalize_issn(base_issn).unwrap_or_else(|| base_issn.to_string());
    let mut counts: BTreeMap<(String, String), u64> = BTreeMap::new();
    for record in records {
        let journal = record.journal.as_deref().map(str::trim).filter(|j| !j.is_empty()).unwrap_or("Unknown Journal");
        for issn in record.issn.as_deref().map(split_issns).unwrap_or_default() {
            let Some(issn) = normalize_issn(&issn) else { continue };
            if issn != base {
                *counts.entry((journal.to_string(), issn)).or_default() += 1;
            }
        }
    }

    let mut ranking: Vec<PublicationCompetitor> = counts
        .into_iter()
        .map(|((journal, issn), publication_count)| PublicationCompetitor { journal, issn, publication_count })
        .collect();
    ranking.sort_by(|a, b| b.publication_count.cmp(&a.publication_count));
    ranking.truncate(n);
    ranking
}

/// Stage entry: rank venues of `issn` by its authors' publications.
pub fn run_publication_view(store: &JournalStore, issn: &str, n: usize) -> Result<Vec<PublicationCompetitor>> {
    let records: Vec<WorkRecord> = store.load_records(issn, Artifact::AuthorPublications)?;
    let top = rank_by_publications(&records, issn, n);
    let path = store.save_document(issn, Artifact::PublicationCompetitors, &top)?;
    info!(issn = issn, works = records.len(), venues = top.len(), path = %path.display(), "Publication competitors saved");

    println!("ISSN {}: top {} venues by author publications:", issn, top.len());
    for (rank, c) in top.iter().enumerate() {
        println!("  {:>2}. {} ({}) publications={}", rank + 1, c.journal, c.issn, c.publication_count);
    }
    Ok(top)
}

/// ISSNs of the stored competitor set that can be fetched
pub fn competitor_issns(store: &JournalStore, base_issn: &str) -> Result<Vec<String>> {
    let top: Vec<CompetitorJournal> = store.load_document(base_issn, Artifact::TopCompetitors)?;
    let mut seen = BTreeSet::new();
    Ok(top
        .into_iter()
        .filter_map(|c| {
            let Some(issn) = normalize_issn(&c.issn) else {
                debug!(journal = %c.journal, issn = %c.issn, "Skipping competitor without ISSN");
                return None;
            };
            seen.insert(issn.clone()).then_some(issn)
        })
        .collect())
}

/// Stage entry: rank competitor venues of `issn` from its citation graph.
pub async fn run(fetcher: &Fetcher, config: &Config, store: &JournalStore, issn: &str) -> Result<Vec<CompetitorJournal>> {
    let citations: Vec<CitationLink> = store.load_records(issn, Artifact::Citations)?;
    let references: Vec<CitationLink> = store.load_records(issn, Artifact::References)?;

    let dois: BTreeSet<String> = citations
        .iter()
        .chain(references.iter())
        .map(|link| link.related_doi.clone())
        .collect();
    info!(issn = issn, dois = dois.len(), "Resolving venues of related DOIs");

    let mut venues = HashMap::new();
    let mut ledger = FailureLedger::new();
    let pb = progress_bar(dois.len(), "Resolving venues");
    let mut results = stream::iter(dois)
        .map(|doi| async move {
            let venue = resolve_venue(fetcher, config, &doi).await;
            (doi, venue)
        })
        .buffer_unordered((config.limits.crossref + config.limits.openalex).max(1));

    while let Some((doi, venue)) = results.next().await {
        match venue {
            Some(venue) => {
                venues.insert(doi, venue);
            }
            None => ledger.failed_doi(doi),
        }
        pb.inc(1);
    }
    pb.finish_and_clear();

    let ranking = rank_venues(&citations, &references, &venues);
    let top = top_competitors(&ranking, issn, config.top_competitors);

    store.save_document(issn, Artifact::CompetitorRanking, &ranking)?;
    store.save_document(issn, Artifact::TopCompetitors, &top)?;
    store.save_ledger(issn, Stage::Competitors, &ledger)?;

    println!(
        "ISSN {}: {} venues ranked from {} related DOIs ({} unresolved), top {} competitors:",
        issn,
        ranking.len(),
        venues.len() + ledger.failed_dois.len(),
        ledger.failed_dois.len(),
        top.len()
    );
    for (rank, c) in top.iter().enumerate() {
        println!(
            "  {:>2}. {} ({}) citations={} references={} total={}",
            rank + 1,
            c.journal,
            c.issn,
            c.citations,
            c.references,
            c.total_score
        );
    }
    Ok(top)
}

/// Stage entry: fetch the article lists of every competitor of `base_issn`
/// within the base journal's window. Failed and empty competitors are
/// recorded on the base journal's ledger.
pub async fn fetch_competitor_articles(fetcher: &Fetcher, config: &Config, store: &JournalStore, base_issn: &str) -> Result<FailureLedger> {
    let window = articles::window_for(store, base_issn)?;
    let issns = competitor_issns(store, base_issn)?;
    info!(issn = base_issn, competitors = issns.len(), "Fetching competitor articles");

    let mut ledger = FailureLedger::new();
    let mut fetched = 0usize;
    let mut results = stream::iter(issns)
        .map(|issn| async move {
            let outcome = articles::fetch_articles(fetcher, config, &issn, window).await;
            (issn, outcome)
        })
        .buffer_unordered(config.limits.crossref.max(1));

    while let Some((issn, outcome)) = results.next().await {
        match outcome {
            FetchOutcome::Items(list) => {
                store.save_records(&issn, Artifact::Articles, &list)?;
                store.save_document(&issn, Artifact::Metadata, &JournalMetadata::new(&issn, window))?;
                fetched += 1;
            }
            FetchOutcome::NoData => ledger.empty_issn(issn),
            FetchOutcome::Failed(_) => ledger.failed_issn(issn),
        }
    }

    store.save_ledger(base_issn, Stage::CompetitorArticles, &ledger)?;
    println!(
        "ISSN {}: articles fetched for {} competitors, {} empty, {} failed",
        base_issn,
        fetched,
        ledger.empty_issns.len(),
        ledger.failed_issns.len()
    );
    Ok(ledger)
}

/// Stage entry: authorships and author publications of every competitor
/// whose articles were fetched.
pub async fn fetch_competitor_authors(fetcher: &Fetcher, config: &Config, store: &JournalStore, base_issn: &str) -> Result<usize> {
    let window = articles::window_for(store, base_issn)?;
    let mut done = 0;
    for issn in competitor_issns(store, base_issn)? {
        if !store.exists(&issn, Artifact::Articles) {
            warn!(issn = %issn, "No stored articles for competitor, skipping");
            continue;
        }
        authors::run(fetcher, config, store, &issn).await?;
        resolver::run(fetcher, config, store, &issn, window).await?;
        done += 1;
    }
    Ok(done)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::YearWindow;
    use crate::fetcher::RetryPolicy;
    use crate::http::mock::MockTransport;
    use crate::model::Article;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;

    fn fetcher(mock: Arc<MockTransport>) -> Fetcher {
        Fetcher::new(mock, Default::default(), RetryPolicy { max_attempts: 1, base_delay: Duration::ZERO })
    }

    fn link(source: &str, related: &str) -> CitationLink {
        CitationLink { source_doi: source.into(), related_doi: related.into() }
    }

    fn venue(journal: &str, issn: Option<&str>) -> Venue {
        Venue { journal: journal.into(), issn: issn.map(str::to_string) }
    }

    fn competitor(journal: &str, issn: &str, total: u64) -> CompetitorJournal {
        CompetitorJournal { journal: journal.into(), issn: issn.into(), citations: total, references: 0, total_score: total }
    }

    #[test]
    fn test_rank_venues_outer_join() {
        let venues = HashMap::from([
            ("10.2/x".to_string(), venue("Alpha", Some("1111-1111"))),
            ("10.2/y".to_string(), venue("Beta", Some("22222222"))),
            ("10.2/z".to_string(), venue("Gamma", None)),
        ]);
        let citations = vec![link("10.1/a", "10.2/x"), link("10.1/b", "10.2/x"), link("10.1/a", "10.2/unknown")];
        let references = vec![link("10.1/a", "10.2/y"), link("10.1/a", "10.2/x"), link("10.1/a", "10.2/z")];

        let ranking = rank_venues(&citations, &references, &venues);
        assert_eq!(ranking.len(), 2);
        assert_eq!(ranking[0], CompetitorJournal {
            journal: "Alpha".into(),
            issn: "1111-1111".into(),
            citations: 2,
            references: 1,
            total_score: 3,
        });
        assert_eq!(ranking[1].issn, "2222-2222");
        assert_eq!(ranking[1].citations, 0);
    }

    #[test]
    fn test_issnless_venues_take_no_slots() {
        let venues = HashMap::from([
            ("10.2/a".to_string(), venue("Alpha", Some("1111-1111"))),
            ("10.2/n1".to_string(), venue("Nameless One", None)),
            ("10.2/n2".to_string(), venue("Nameless Two", Some(" "))),
            ("10.2/b".to_string(), venue("Beta", Some("2222-2222"))),
        ]);
        let citations = vec![
            link("10.1/a", "10.2/a"),
            link("10.1/b", "10.2/a"),
            link("10.1/c", "10.2/a"),
            link("10.1/a", "10.2/n1"),
            link("10.1/b", "10.2/n1"),
            link("10.1/a", "10.2/n2"),
            link("10.1/b", "10.2/n2"),
            link("10.1/a", "10.2/b"),
        ];

        let ranking = rank_venues(&citations, &[], &venues);
        let top = top_competitors(&ranking, "0169-4332", 2);
        let picked: Vec<_> = top.iter().map(|c| (c.journal.as_str(), c.issn.as_str())).collect();
        assert_eq!(picked, vec![("Alpha", "1111-1111"), ("Beta", "2222-2222")]);
    }

    #[test]
    fn test_top_excludes_base() {
        let ranking = vec![competitor("Base", "0169-4332", 9), competitor("A", "1111-1111", 5), competitor("B", "2222-2222", 3)];
        let top = top_competitors(&ranking, "01694332", 1);
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].journal, "A");
    }

    #[test]
    fn test_publication_view_explodes_issns() -> Result<()> {
        let work = |journal: Option<&str>, issn: Option<&str>| WorkRecord {
            journal: journal.map(str::to_string),
            issn: issn.map(str::to_string),
            ..Default::default()
        };
        let records = vec![
            work(Some("Surface Science"), Some("0039-6028, 1879-2758")),
            work(Some("Surface Science"), Some("0039-6028")),
            work(Some("Base"), Some("0169-4332")),
            work(None, Some("1111-1111")),
            work(Some("Nowhere"), None),
        ];

        let dir = TempDir::new()?;
        let store = JournalStore::new(dir.path());
        store.save_records("0169-4332", Artifact::AuthorPublications, &records)?;
        let top = run_publication_view(&store, "0169-4332", 2)?;

        assert_eq!(top.len(), 2);
        assert_eq!(top[0], PublicationCompetitor { journal: "Surface Science".into(), issn: "0039-6028".into(), publication_count: 2 });
        assert_eq!(top[1].publication_count, 1);
        assert!(top.iter().all(|c| c.issn != "0169-4332"));

        let all = rank_by_publications(&records, "0169-4332", 10);
        assert_eq!(all.len(), 3);
        assert!(all.iter().any(|c| c.journal == "Unknown Journal" && c.issn == "1111-1111"));
        let saved: Vec<PublicationCompetitor> = store.load_document("0169-4332", Artifact::PublicationCompetitors)?;
        assert_eq!(saved, top);
        Ok(())
    }

    #[tokio::test]
    async fn test_venue_falls_back_to_openalex() {
        let mock = Arc::new(MockTransport::new());
        mock.status("https://api.crossref.org/works/10.2/x", 404);
        mock.json(
            "https://api.openalex.org/works/https://doi.org/10.2/x",
            json!({"primary_location": {"source": {"display_name": "Beta", "issn_l": "2222-2222"}}}),
        );
        mock.json("https://api.crossref.org/works/10.2/y", json!({"message": {"container-title": ["Alpha"], "ISSN": ["1111-1111"]}}));

        let fetcher = fetcher(mock.clone());
        let config = Config::default();
        assert_eq!(resolve_venue(&fetcher, &config, "10.2/x").await, Some(venue("Beta", Some("2222-2222"))));
        assert_eq!(resolve_venue(&fetcher, &config, "10.2/y").await, Some(venue("Alpha", Some("1111-1111"))));
        assert_eq!(resolve_venue(&fetcher, &config, "10.2/none").await, None);
        assert_eq!(mock.call_count(), 5);
    }

    #[tokio::test]
    async fn test_competitor_articles_ledger() -> Result<()> {
        let dir = TempDir::new()?;
        let store = JournalStore::new(dir.path());
        let base = "0169-4332";
        let window = YearWindow::new(2019, 2023);
        store.save_document(base, Artifact::Metadata, &JournalMetadata::new(base, window))?;
        store.save_document(base, Artifact::TopCompetitors, &vec![
            competitor("Full", "1111-1111", 5),
            competitor("Empty", "2222-2222", 4),
            competitor("Down", "3333-3333", 3),
            competitor("Nameless", "Unknown ISSN", 2),
            competitor("Blank", " ", 1),
        ])?;

        let mock = Arc::new(MockTransport::new());
        mock.json(
            "https://api.crossref.org/works?filter=issn%3A1111-1111",
            json!({"message": {"next-cursor": null, "items": [{"DOI": "10.5/a", "ISSN": ["1111-1111"]}]}}),
        );
        mock.json("https://api.crossref.org/works?filter=issn%3A2222-2222", json!({"message": {"items": []}}));
        mock.status("https://api.crossref.org/works?filter=issn%3A3333-3333", 503);

        let ledger = fetch_competitor_articles(&fetcher(mock.clone()), &Config::default(), &store, base).await?;

        assert_eq!(mock.call_count(), 3);
        assert_eq!(ledger.empty_issns.iter().collect::<Vec<_>>(), vec!["2222-2222"]);
        assert_eq!(ledger.failed_issns.iter().collect::<Vec<_>>(), vec!["3333-3333"]);
        let saved: Vec<Article> = store.load_records("1111-1111", Artifact::Articles)?;
        assert_eq!(saved.len(), 1);
        assert_eq!(articles::window_for(&store, "1111-1111")?, window);
        assert_eq!(store.load_ledger(base, Stage::CompetitorArticles)?, ledger);
        Ok(())
    }
}
