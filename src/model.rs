//! Typed entities shared by every stage.
//!
//! API payloads are deserialized into source-specific shapes in `sources::*`
//! and converted into these types at the boundary. Nothing downstream of the
//! fetch stages sees raw JSON.

use crate::region::Region;
use serde::{Deserialize, Serialize};

/// Prefixes stripped from DOIs before they are used as join keys
const DOI_PREFIXES: &[&str] = &[
    "https://doi.org/",
    "http://doi.org/",
    "https://dx.doi.org/",
    "http://dx.doi.org/",
    "doi:",
];

const ORCID_PREFIXES: &[&str] = &["https://orcid.org/", "http://orcid.org/"];

/// Canonical join form of a DOI: trimmed, lowercase, resolver prefix removed.
pub fn normalize_doi(raw: &str) -> Option<String> {
    let mut doi = raw.trim().to_lowercase();
    for prefix in DOI_PREFIXES {
        if let Some(rest) = doi.strip_prefix(prefix) {
            doi = rest.to_string();
            break;
        }
    }
    if doi.is_empty() {
        None
    } else {
        Some(doi)
    }
}

/// Bare ORCID iD (`0000-0002-1825-0097`) from either the bare or URL form.
pub fn normalize_orcid(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let bare = ORCID_PREFIXES
        .iter()
        .find_map(|prefix| trimmed.strip_prefix(prefix))
        .unwrap_or(trimmed)
        .trim_matches('/');
    if bare.is_empty() {
        None
    } else {
        Some(bare.to_string())
    }
}

/// Hyphenated uppercase ISSN (`0169-4332`, `2049-360X`), or `None` when the
/// input is not eight ISSN characters.
pub fn normalize_issn(raw: &str) -> Option<String> {
    let compact: String = raw.trim().chars().filter(|c| *c != '-').collect::<String>().to_ascii_uppercase();
    let valid = compact.len() == 8
        && compact.is_ascii()
        && compact[..7].chars().all(|c| c.is_ascii_digit())
        && compact[7..].chars().all(|c| c.is_ascii_digit() || c == 'X');
    valid.then(|| format!("{}-{}", &compact[..4], &compact[4..]))
}

/// Individual ISSNs of a possibly comma-joined ISSN field
pub fn split_issns(field: &str) -> Vec<String> {
    field
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Year component of `YYYY[-MM[-DD]]`
pub fn year_of(date: &str) -> Option<i32> {
    date.trim().split('-').next().and_then(|y| y.parse().ok())
}

/// Journal article from the article-search API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub doi: Option<String>,
    /// `YYYY-MM-DD`, `YYYY-MM` or `YYYY` depending on what the source knows
    pub published_date: Option<String>,
    #[serde(default)]
    pub issn: Vec<String>,
    #[serde(rename = "type")]
    pub work_type: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthorPosition {
    First,
    Middle,
    Last,
}

impl AuthorPosition {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "first" => Some(Self::First),
            "middle" => Some(Self::Middle),
            "last" => Some(Self::Last),
            _ => None,
        }
    }
}

/// One authorship edge: a person on an article
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Authorship {
    pub doi: String,
    pub published_date: Option<String>,
    /// Comma-joined ISSNs of the article's venue
    pub issn: Option<String>,
    pub oa_status: Option<String>,
    #[serde(rename = "type")]
    pub work_type: Option<String>,
    pub author_name: Option<String>,
    pub author_position: Option<AuthorPosition>,
    pub orcid: Option<String>,
    pub affiliation: Option<String>,
    pub country: Option<String>,
    pub author_id: Option<String>,
}

/// Person behind one or more authorships. Deduplicated persons always carry
/// an `author_id`; a person known only by ORCID has none.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonIdentity {
    pub author_id: Option<String>,
    pub author_name: Option<String>,
    pub orcid: Option<String>,
    pub affiliation: Option<String>,
    pub country: Option<String>,
}

/// A publication in a person's history
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkRecord {
    pub doi: Option<String>,
    pub published_date: Option<String>,
    /// Comma-joined ISSNs; exploded by the merge stage
    pub issn: Option<String>,
    pub journal: Option<String>,
    pub oa_status: Option<String>,
    #[serde(rename = "type")]
    pub work_type: Option<String>,
    pub author_name: Option<String>,
    pub author_position: Option<AuthorPosition>,
    pub orcid: Option<String>,
    pub affiliation: Option<String>,
    pub country: Option<String>,
    pub author_id: Option<String>,
}

impl PersonIdentity {
    /// Identifier used in ledgers: author id, else ORCID, else name
    pub fn ledger_key(&self) -> String {
        self.author_id
            .clone()
            .or_else(|| self.orcid.clone())
            .or_else(|| self.author_name.clone())
            .unwrap_or_default()
    }
}

impl WorkRecord {
    /// Record skeleton carrying the person fields of `person`
    pub fn for_person(person: &PersonIdentity) -> Self {
        Self {
            doi: None,
            published_date: None,
            issn: None,
            journal: None,
            oa_status: None,
            work_type: None,
            author_name: person.author_name.clone(),
            author_position: None,
            orcid: person.orcid.clone(),
            affiliation: person.affiliation.clone(),
            country: person.country.clone(),
            author_id: person.author_id.clone(),
        }
    }
}

/// Directed DOI edge. For citations `related_doi` cites `source_doi`; for
/// references `source_doi` references `related_doi`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CitationLink {
    pub source_doi: String,
    pub related_doi: String,
}

/// Venue ranked by citation/reference linkage to the base journal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompetitorJournal {
    pub journal: String,
    pub issn: String,
    pub citations: u64,
    pub references: u64,
    pub total_score: u64,
}

/// Venue ranked by how many of the base journal's authors' works it published
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicationCompetitor {
    pub journal: String,
    pub issn: String,
    pub publication_count: u64,
}

/// Row of the final denormalized table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalRecord {
    /// ISSN of the journal whose corpus produced the row
    pub source_issn: String,
    pub doi: Option<String>,
    pub published_date: Option<String>,
    /// Single ISSN after explode
    pub issn: Option<String>,
    pub journal: Option<String>,
    pub oa_status: Option<String>,
    #[serde(rename = "type")]
    pub work_type: Option<String>,
    pub author_name: Option<String>,
    pub author_position: Option<AuthorPosition>,
    pub orcid: Option<String>,
    pub affiliation: Option<String>,
    pub country: Option<String>,
    pub author_id: Option<String>,
    pub cites: u64,
    pub referenced: u64,
    pub journal_author: bool,
    pub region: Region,
}
