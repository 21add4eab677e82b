//! Final database generation.
//!
//! Joins the publication corpora of the base journal and its competitors
//! into one denormalized table:
//!
//! 1. concatenate the corpora, tagging each row with its source ISSN
//! 2. count citation and reference edges per DOI
//! 3. explode comma-joined ISSNs into one row each
//! 4. flag every row of an author who published in the base journal
//! 5. resolve journal names per ISSN
//! 6. classify the author's country into a region
//!
//! Gaps (no DOI, no ISSN, unknown journal) stay empty; they never fail the
//! merge.

use crate::competitors::competitor_issns;
use crate::config::Config;
use crate::error::Result;
use crate::fetcher::Fetcher;
use crate::journals::JournalNames;
use crate::model::{normalize_doi, normalize_issn, split_issns, CitationLink, CompetitorJournal, FinalRecord, WorkRecord};
use crate::region::Region;
use crate::store::{Artifact, JournalStore};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use tracing::{info, warn};

/// Publication corpus of one journal
#[derive(Debug, Clone)]
pub struct Corpus {
    pub issn: String,
    pub records: Vec<WorkRecord>,
}

fn final_record(source_issn: &str, work: WorkRecord) -> FinalRecord {
    FinalRecord {
        source_issn: source_issn.to_string(),
        doi: work.doi,
        published_date: work.published_date,
        issn: work.issn,
        journal: work.journal,
        oa_status: work.oa_status,
        work_type: work.work_type,
        author_name: work.author_name,
        author_position: work.author_position,
        orcid: work.orcid,
        affiliation: work.affiliation,
        country: work.country,
        author_id: work.author_id,
        cites: 0,
        referenced: 0,
        journal_author: false,
        region: Region::Other,
    }
}

/// Step 1
pub fn concat(corpora: Vec<Corpus>) -> Vec<FinalRecord> {
    corpora
        .into_iter()
        .flat_map(|corpus| {
            let Corpus { issn, records } = corpus;
            records.into_iter().map(move |work| final_record(&issn, work))
        })
        .collect()
}

/// Number of edges pointing at each related DOI, repeats included
pub fn link_counts(links: &[CitationLink]) -> HashMap<String, u64> {
    let mut counts = HashMap::new();
    for link in links {
        if let Some(doi) = normalize_doi(&link.related_doi) {
            *counts.entry(doi).or_insert(0) += 1;
        }
    }
    counts
}

/// Step 2. Rows without a DOI keep zero on both counts.
pub fn apply_link_counts(rows: &mut [FinalRecord], citations: &[CitationLink], references: &[CitationLink]) {
    let cites = link_counts(citations);
    let referenced = link_counts(references);
    for row in rows.iter_mut() {
        let Some(doi) = row.doi.as_deref().and_then(normalize_doi) else {
            continue;
        };
        row.cites = cites.get(&doi).copied().unwrap_or(0);
        row.referenced = referenced.get(&doi).copied().unwrap_or(0);
    }
}

/// Step 3. A row with `n` ISSNs becomes `n` rows that differ only in `issn`;
/// a row with none is kept once.
pub fn explode_issn(rows: Vec<FinalRecord>) -> Vec<FinalRecord> {
    let mut exploded = Vec::with_capacity(rows.len());
    for row in rows {
        let issns = row.issn.as_deref().map(split_issns).unwrap_or_default();
        if issns.is_empty() {
            exploded.push(FinalRecord { issn: None, ..row });
            continue;
        }
        for issn in issns {
            let issn = normalize_issn(&issn).unwrap_or(issn);
            exploded.push(FinalRecord {
                issn: Some(issn),
                ..row.clone()
            });
        }
    }
    exploded
}

/// Step 4. Membership is decided per author, then broadcast to all their rows.
pub fn flag_journal_authors(rows: &mut [FinalRecord], base_issn: &str) {
    let base = normalize_issn(base_issn).unwrap_or_else(|| base_issn.trim().to_string());
    let members: HashSet<String> = rows
        .iter()
        .filter(|row| row.issn.as_deref() == Some(base.as_str()))
        .filter_map(|row| row.author_id.clone())
        .collect();
    for row in rows.iter_mut() {
        row.journal_author = row.author_id.as_ref().is_some_and(|id| members.contains(id));
    }
}

/// Step 5. Competitor table first, then the row's own journal, then an
/// external lookup for ISSNs still unnamed.
pub async fn resolve_journal_names(rows: &mut [FinalRecord], names: &JournalNames) {
    let pending: BTreeSet<String> = rows
        .iter()
        .filter(|row| row.journal.is_none())
        .filter_map(|row| row.issn.clone())
        .filter(|issn| names.known(issn).is_none())
        .collect();

    let mut looked_up = HashMap::new();
    for issn in pending {
        if let Some(name) = names.resolve(&issn).await {
            looked_up.insert(issn, name);
        }
    }

    for row in rows.iter_mut() {
        let Some(issn) = row.issn.as_deref() else {
            continue;
        };
        if let Some(known) = names.known(issn) {
            row.journal = Some(known.to_string());
        } else if row.journal.is_none() {
            row.journal = looked_up.get(issn).cloned();
        }
    }
}

/// Step 6
pub fn classify_regions(rows: &mut [FinalRecord]) {
    for row in rows.iter_mut() {
        row.region = Region::classify(row.country.as_deref());
    }
}

/// Steps 1-6 over in-memory inputs
pub async fn merge(
    corpora: Vec<Corpus>,
    citations: &[CitationLink],
    references: &[CitationLink],
    base_issn: &str,
    names: &JournalNames,
) -> Vec<FinalRecord> {
    let mut rows = concat(corpora);
    apply_link_counts(&mut rows, citations, references);
    let mut rows = explode_issn(rows);
    flag_journal_authors(&mut rows, base_issn);
    resolve_journal_names(&mut rows, names).await;
    classify_regions(&mut rows);
    rows
}

/// Stage entry: merge everything stored for `base_issn` and its competitors.
///
/// The base journal's publications, edges and competitor set are required.
/// A competitor without resolved publications is skipped with a warning.
pub async fn run(fetcher: &Fetcher, config: &Config, store: &JournalStore, base_issn: &str) -> Result<Vec<FinalRecord>> {
    let mut corpora = vec![Corpus {
        issn: base_issn.to_string(),
        records: store.load_records(base_issn, Artifact::AuthorPublications)?,
    }];
    for issn in competitor_issns(store, base_issn)? {
        match store.try_load_records(&issn, Artifact::AuthorPublications)? {
            Some(records) => corpora.push(Corpus { issn, records }),
            None => warn!(issn = %issn, "Competitor has no resolved publications, skipping"),
        }
    }
    let citations: Vec<CitationLink> = store.load_records(base_issn, Artifact::Citations)?;
    let references: Vec<CitationLink> = store.load_records(base_issn, Artifact::References)?;

    let ranking: Vec<CompetitorJournal> = match store.try_load_document(base_issn, Artifact::CompetitorRanking)? {
        Some(ranking) => ranking,
        None => store.load_document(base_issn, Artifact::TopCompetitors)?,
    };
    let names = JournalNames::new(fetcher.clone(), config).with_known(&ranking);

    info!(
        issn = base_issn,
        corpora = corpora.len(),
        citations = citations.len(),
        references = references.len(),
        "Merging final database"
    );
    let rows = merge(corpora, &citations, &references, base_issn, &names).await;

    store.save_records(base_issn, Artifact::FinalDatabase, &rows)?;
    store.export_csv(base_issn, Artifact::FinalDatabaseCsv, &rows)?;

    let journal_authors: HashSet<&str> = rows
        .iter()
        .filter(|r| r.journal_author)
        .filter_map(|r| r.author_id.as_deref())
        .collect();
    let mut regions: BTreeMap<&str, usize> = BTreeMap::new();
    for row in &rows {
        *regions.entry(row.region.label()).or_insert(0) += 1;
    }
    println!(
        "ISSN {}: final database has {} rows, {} journal authors, {} journal-name lookups",
        base_issn,
        rows.len(),
        journal_authors.len(),
        names.lookups()
    );
    for (region, count) in regions {
        println!("  {:<32} {}", region, count);
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::RetryPolicy;
    use crate::http::mock::MockTransport;
    use crate::model::AuthorPosition;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;

    fn work(doi: Option<&str>, issn: Option<&str>, author_id: Option<&str>) -> WorkRecord {
        WorkRecord {
            doi: doi.map(str::to_string),
            published_date: Some("2021-01-01".into()),
            issn: issn.map(str::to_string),
            journal: None,
            oa_status: Some("gold".into()),
            work_type: Some("journal-article".into()),
            author_name: Some("Ada".into()),
            author_position: Some(AuthorPosition::First),
            orcid: None,
            affiliation: Some("ETH Zurich".into()),
            country: Some("CH".into()),
            author_id: author_id.map(str::to_string),
        }
    }

    fn link(source: &str, related: &str) -> CitationLink {
        CitationLink { source_doi: source.into(), related_doi: related.into() }
    }

    fn names(mock: Arc<MockTransport>, known: &[CompetitorJournal]) -> JournalNames {
        let fetcher = Fetcher::new(mock, Default::default(), RetryPolicy { max_attempts: 1, base_delay: Duration::ZERO });
        let config = Config { lookup_delay: Duration::ZERO, ..Config::default() };
        JournalNames::new(fetcher, &config).with_known(known)
    }

    #[test]
    fn test_explode_issn() {
        let rows = concat(vec![Corpus {
            issn: "0169-4332".into(),
            records: vec![work(Some("10.1/a"), Some("1234-5678, 8765-4321"), Some("A1")), work(None, None, None)],
        }]);
        let exploded = explode_issn(rows.clone());

        assert_eq!(exploded.len(), 3);
        assert_eq!(exploded[0].issn.as_deref(), Some("1234-5678"));
        assert_eq!(exploded[1].issn.as_deref(), Some("8765-4321"));
        assert_eq!(FinalRecord { issn: None, ..exploded[0].clone() }, FinalRecord { issn: None, ..exploded[1].clone() });
        assert_eq!(exploded[2], rows[1]);
    }

    #[test]
    fn test_journal_author_broadcast() {
        let mut rows = explode_issn(concat(vec![Corpus {
            issn: "0169-4332".into(),
            records: vec![
                work(Some("10.1/a"), Some("0169-4332"), Some("X")),
                work(Some("10.1/b"), Some("1111-1111"), Some("X")),
                work(Some("10.1/c"), Some("1111-1111"), Some("Y")),
                work(Some("10.1/d"), Some("0169-4332"), None),
            ],
        }]));
        flag_journal_authors(&mut rows, "01694332");

        let flags: Vec<bool> = rows.iter().map(|r| r.journal_author).collect();
        assert_eq!(flags, vec![true, true, false, false]);
    }

    #[test]
    fn test_citation_counts_keep_multiplicity() {
        let mut rows = concat(vec![Corpus {
            issn: "0169-4332".into(),
            records: vec![work(Some("10.1/B"), None, None), work(Some("10.1/c"), None, None), work(None, None, None)],
        }]);
        let citations = vec![link("10.1/a", "10.1/b"), link("10.1/a", "10.1/c"), link("10.1/a", "https://doi.org/10.1/b")];
        let references = vec![link("10.1/z", "10.1/c")];
        apply_link_counts(&mut rows, &citations, &references);

        assert_eq!((rows[0].cites, rows[0].referenced), (2, 0));
        assert_eq!((rows[1].cites, rows[1].referenced), (1, 1));
        assert_eq!((rows[2].cites, rows[2].referenced), (0, 0));
    }

    #[tokio::test]
    async fn test_merge_resolves_names_and_regions() {
        let mock = Arc::new(MockTransport::new());
        mock.json("https://api.crossref.org/journals/2222-2222", json!({"message": {"title": "Looked Up"}}));
        let known = vec![CompetitorJournal {
            journal: "Competitor".into(),
            issn: "1111-1111".into(),
            citations: 3,
            references: 1,
            total_score: 4,
        }];
        let names = names(mock.clone(), &known);

        let mut own = work(Some("10.1/d"), Some("3333-3333"), Some("Z"));
        own.journal = Some("Own Title".into());
        own.country = Some("cn".into());
        let corpora = vec![
            Corpus { issn: "0169-4332".into(), records: vec![work(Some("10.1/a"), Some("1111-1111, 2222-2222"), Some("X"))] },
            Corpus { issn: "1111-1111".into(), records: vec![own, work(Some("10.1/e"), Some("4444-4444"), None)] },
        ];
        let rows = merge(corpora, &[], &[], "0169-4332", &names).await;

        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0].journal.as_deref(), Some("Competitor"));
        assert_eq!(rows[1].journal.as_deref(), Some("Looked Up"));
        assert_eq!(rows[2].journal.as_deref(), Some("Own Title"));
        assert_eq!(rows[3].journal, None);
        assert_eq!(rows[2].source_issn, "1111-1111");
        assert_eq!(rows[0].region, Region::HighIncome);
        assert_eq!(rows[2].region, Region::China);
        // 2222-2222 and 4444-4444 looked up once each
        assert_eq!(mock.call_count(), 2);
    }

    #[tokio::test]
    async fn test_run_writes_jsonl_and_csv() -> Result<()> {
        let dir = TempDir::new()?;
        let store = JournalStore::new(dir.path());
        let base = "0169-4332";
        store.save_records(base, Artifact::AuthorPublications, &[work(Some("10.1/a"), Some(base), Some("X"))])?;
        store.save_records(base, Artifact::Citations, &[link("10.1/q", "10.1/a")])?;
        store.save_records::<CitationLink>(base, Artifact::References, &[])?;
        let top = vec![
            CompetitorJournal { journal: "Alpha".into(), issn: "1111-1111".into(), citations: 1, references: 0, total_score: 1 },
            CompetitorJournal { journal: "Beta".into(), issn: "2222-2222".into(), citations: 1, references: 0, total_score: 1 },
        ];
        store.save_document(base, Artifact::TopCompetitors, &top)?;
        store.save_records("1111-1111", Artifact::AuthorPublications, &[work(Some("10.2/b"), Some("1111-1111"), Some("X"))])?;

        let mock = Arc::new(MockTransport::new());
        let fetcher = Fetcher::new(mock.clone(), Default::default(), RetryPolicy { max_attempts: 1, base_delay: Duration::ZERO });
        let config = Config { lookup_delay: Duration::ZERO, ..Config::default() };
        let rows = run(&fetcher, &config, &store, base).await?;

        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.journal_author));
        assert_eq!(rows[0].cites, 1);
        assert_eq!(rows[1].journal.as_deref(), Some("Alpha"));
        assert!(store.exists(base, Artifact::FinalDatabaseCsv));
        let saved: Vec<FinalRecord> = store.load_records(base, Artifact::FinalDatabase)?;
        assert_eq!(saved, rows);
        // the base ISSN is not in the competitor table
        assert_eq!(mock.call_count(), 1);
        Ok(())
    }
}
