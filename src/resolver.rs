//! Author publication resolver.
//!
//! Every person is looked up by ORCID first. When the person has no ORCID,
//! or the ORCID fetch fails, their OpenAlex author id is used instead and
//! each returned work is reduced to the authorship matching that id. Works
//! are kept only when their publication year falls inside the window.

use crate::authors::progress_bar;
use crate::config::{Config, YearWindow};
use crate::error::Result;
use crate::fetcher::{FetchOutcome, Fetcher};
use crate::ledger::FailureLedger;
use crate::model::{normalize_doi, normalize_orcid, year_of, AuthorPosition, Authorship, PersonIdentity, WorkRecord};
use crate::sources::openalex::{AuthorWorks, OpenAlexWork};
use crate::sources::orcid::{OrcidWork, OrcidWorks};
use crate::store::{Artifact, JournalStore, Stage};
use futures::stream::{self, StreamExt};
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;
use tracing::{debug, info, warn};

static AUTHOR_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https://openalex\.org/A\d+$").unwrap_or_else(|_| Regex::new(r"$^").expect("Empty regex"))
});

/// Canonical OpenAlex author id, `https://openalex.org/A` followed by digits
pub fn is_valid_author_id(author_id: &str) -> bool {
    AUTHOR_ID.is_match(author_id)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionStatus {
    Resolved,
    NoData,
    Failed,
}

/// Works of one person and how they were obtained
#[derive(Debug)]
pub struct Resolution {
    pub records: Vec<WorkRecord>,
    pub status: ResolutionStatus,
}

impl Resolution {
    fn from_records(records: Vec<WorkRecord>) -> Self {
        let status = if records.is_empty() {
            ResolutionStatus::NoData
        } else {
            ResolutionStatus::Resolved
        };
        Self { records, status }
    }

    fn no_data() -> Self {
        Self {
            records: Vec::new(),
            status: ResolutionStatus::NoData,
        }
    }

    fn failed() -> Self {
        Self {
            records: Vec::new(),
            status: ResolutionStatus::Failed,
        }
    }
}

/// One person per `author_id`, first authorship wins. Rows without an id are
/// dropped since they cannot be joined to a publication history.
pub fn unique_persons(authorships: &[Authorship]) -> Vec<PersonIdentity> {
    let mut seen = HashSet::new();
    authorships
        .iter()
        .filter_map(|row| {
            let author_id = row.author_id.as_ref()?;
            seen.insert(author_id.clone()).then(|| PersonIdentity {
                author_id: Some(author_id.clone()),
                author_name: row.author_name.clone(),
                orcid: row.orcid.clone(),
                affiliation: row.affiliation.clone(),
                country: row.country.clone(),
            })
        })
        .collect()
}

/// Resolve the in-window publications of one person.
pub async fn resolve(fetcher: &Fetcher, config: &Config, person: &PersonIdentity, window: YearWindow) -> Resolution {
    if let Some(orcid) = person.orcid.as_deref().and_then(normalize_orcid) {
        match fetcher.fetch_all(&OrcidWorks { orcid: orcid.clone() }).await {
            FetchOutcome::Items(works) => {
                let records = orcid_records(person, works, window);
                debug!(orcid = %orcid, count = records.len(), "Resolved via ORCID");
                return Resolution::from_records(records);
            }
            FetchOutcome::NoData => {
                debug!(orcid = %orcid, "ORCID record lists no works");
                return Resolution::no_data();
            }
            FetchOutcome::Failed(e) => {
                warn!(orcid = %orcid, error = %e, "ORCID lookup failed, falling back to author id");
            }
        }
    }

    let Some(author_id) = person.author_id.as_deref().filter(|id| is_valid_author_id(id)) else {
        debug!(person = %person.ledger_key(), "No usable ORCID or author id");
        return Resolution::failed();
    };

    match fetcher.fetch_all(&AuthorWorks::for_author_id(author_id, &config.mailto)).await {
        FetchOutcome::Items(works) => {
            let records = openalex_records(person, author_id, works, window);
            debug!(author_id = author_id, count = records.len(), "Resolved via author id");
            Resolution::from_records(records)
        }
        FetchOutcome::NoData => Resolution::no_data(),
        FetchOutcome::Failed(e) => {
            warn!(author_id = author_id, error = %e, "Author works lookup failed");
            Resolution::failed()
        }
    }
}

fn orcid_records(person: &PersonIdentity, works: Vec<OrcidWork>, window: YearWindow) -> Vec<WorkRecord> {
    works
        .into_iter()
        .filter_map(|work| {
            let year = work.year.filter(|y| window.contains(*y))?;
            Some(WorkRecord {
                doi: work.doi.as_deref().and_then(normalize_doi),
                published_date: Some(format!("{}-01-01", year)),
                journal: work.journal,
                work_type: work.work_type,
                ..WorkRecord::for_person(person)
            })
        })
        .collect()
}

fn openalex_records(person: &PersonIdentity, author_id: &str, works: Vec<OpenAlexWork>, window: YearWindow) -> Vec<WorkRecord> {
    works
        .into_iter()
        .filter(|work| {
            work.publication_date
                .as_deref()
                .and_then(year_of)
                .is_some_and(|y| window.contains(y))
        })
        .filter_map(|work| {
            let authorship = work
                .authorships
                .iter()
                .find(|a| a.author.as_ref().and_then(|au| au.id.as_deref()) == Some(author_id))?;
            Some(WorkRecord {
                doi: work.doi.as_deref().and_then(normalize_doi),
                published_date: work.publication_date.clone(),
                issn: work.joined_issn(),
                journal: work.source().and_then(|s| s.display_name.clone()),
                oa_status: Some(work.oa_status()),
                work_type: work.work_type.clone(),
                author_position: authorship.author_position.as_deref().and_then(AuthorPosition::parse),
                ..WorkRecord::for_person(person)
            })
        })
        .collect()
}

/// Publications of every person plus the stage ledger
#[derive(Debug, Default)]
pub struct ResolvedCorpus {
    pub records: Vec<WorkRecord>,
    pub ledger: FailureLedger,
    pub persons: usize,
    pub resolved: usize,
}

/// Resolve many persons concurrently; outcomes are recorded as they arrive.
pub async fn resolve_all(fetcher: &Fetcher, config: &Config, persons: Vec<PersonIdentity>, window: YearWindow) -> ResolvedCorpus {
    let mut corpus = ResolvedCorpus {
        persons: persons.len(),
        ..Default::default()
    };
    let concurrency = (config.limits.orcid + config.limits.openalex).max(1);
    let pb = progress_bar(persons.len(), "Resolving authors");

    let mut results = stream::iter(persons)
        .map(|person| {
            let fetcher = fetcher.clone();
            async move {
                let resolution = resolve(&fetcher, config, &person, window).await;
                (person, resolution)
            }
        })
        .buffer_unordered(concurrency);

    while let Some((person, resolution)) = results.next().await {
        match resolution.status {
            ResolutionStatus::Resolved => {
                corpus.resolved += 1;
                corpus.records.extend(resolution.records);
            }
            ResolutionStatus::NoData => corpus.ledger.no_work_author(person.ledger_key()),
            ResolutionStatus::Failed => corpus.ledger.failed_author(person.ledger_key()),
        }
        pb.inc(1);
    }
    pb.finish_and_clear();
    corpus
}

/// Stage entry: resolve every author of `issn`'s authorships.
pub async fn run(fetcher: &Fetcher, config: &Config, store: &JournalStore, issn: &str, window: YearWindow) -> Result<ResolvedCorpus> {
    let authorships: Vec<Authorship> = store.load_records(issn, Artifact::Authors)?;
    let persons = unique_persons(&authorships);
    info!(issn = issn, authorships = authorships.len(), persons = persons.len(), "Resolving author publications");

    let corpus = resolve_all(fetcher, config, persons, window).await;

    store.save_records(issn, Artifact::AuthorPublications, &corpus.records)?;
    store.save_ledger(issn, Stage::Publications, &corpus.ledger)?;

    println!(
        "ISSN {}: {} authors, {} resolved ({} works), {} without works, {} failed",
        issn,
        corpus.persons,
        corpus.resolved,
        corpus.records.len(),
        corpus.ledger.no_work_authors.len(),
        corpus.ledger.failed_authors.len()
    );
    Ok(corpus)
}

/// Unique authors of a journal and how many of them carry an ORCID
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrcidCoverage {
    pub unique_authors: usize,
    pub with_orcid: usize,
}

impl OrcidCoverage {
    pub fn percent(&self) -> f64 {
        if self.unique_authors == 0 {
            0.0
        } else {
            self.with_orcid as f64 * 100.0 / self.unique_authors as f64
        }
    }
}

pub fn orcid_coverage(authorships: &[Authorship]) -> OrcidCoverage {
    let persons = unique_persons(authorships);
    OrcidCoverage {
        unique_authors: persons.len(),
        with_orcid: persons
            .iter()
            .filter(|p| p.orcid.as_deref().and_then(normalize_orcid).is_some())
            .count(),
    }
}
