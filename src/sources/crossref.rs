//! Crossref REST API adapters.
//!
//! - `/works` filtered by ISSN and publication date, cursor-paginated
//! - `/works/{doi}` for the venue of a single DOI
//! - `/journals/{issn}` for a journal title
//!
//! Every request carries `mailto` for the polite pool.

use super::{encode_path, Venue};
use crate::config::YearWindow;
use crate::error::{PipelineError, Result};
use crate::fetcher::{Page, PageSource, Pagination};
use crate::http::Host;
use crate::model::{normalize_doi, Article};
use serde::Deserialize;
use url::Url;

/// Crossref API base URL
const CROSSREF_API_BASE: &str = "https://api.crossref.org";

/// Maximum rows per page accepted by Crossref
const MAX_ROWS: usize = 1000;

/// Article search for one journal within a year window
#[derive(Debug, Clone)]
pub struct ArticleSearch {
    pub issn: String,
    pub window: YearWindow,
    pub mailto: String,
}

impl PageSource for ArticleSearch {
    type Item = Article;

    fn host(&self) -> Host {
        Host::Crossref
    }

    fn pagination(&self) -> Pagination {
        Pagination::Cursor
    }

    fn url(&self, cursor: &str) -> Result<String> {
        let filter = format!(
            "issn:{},from-pub-date:{},until-pub-date:{}",
            self.issn,
            self.window.from_date(),
            self.window.until_date()
        );
        let rows = MAX_ROWS.to_string();
        let url = Url::parse_with_params(
            &format!("{}/works", CROSSREF_API_BASE),
            &[
                ("filter", filter.as_str()),
                ("rows", rows.as_str()),
                ("mailto", self.mailto.as_str()),
                ("cursor", cursor),
            ],
        )
        .map_err(|e| PipelineError::Config(format!("Invalid Crossref URL: {}", e)))?;
        Ok(url.into())
    }

    fn parse(&self, body: &str) -> Result<Page<Article>> {
        let response: CrossrefListResponse = serde_json::from_str(body)
            .map_err(|e| PipelineError::Parse(format!("Failed to parse Crossref works page: {}", e)))?;
        let items = response.message.items.into_iter().map(parse_article).collect();
        Ok(Page {
            items,
            next_cursor: response.message.next_cursor,
        })
    }
}

/// Venue of one DOI
#[derive(Debug, Clone)]
pub struct WorkVenueLookup {
    pub doi: String,
    pub mailto: String,
}

impl PageSource for WorkVenueLookup {
    type Item = Venue;

    fn host(&self) -> Host {
        Host::Crossref
    }

    fn pagination(&self) -> Pagination {
        Pagination::Single
    }

    fn url(&self, _cursor: &str) -> Result<String> {
        Ok(format!(
            "{}/works/{}?mailto={}",
            CROSSREF_API_BASE,
            encode_path(&self.doi),
            urlencoding::encode(&self.mailto)
        ))
    }

    fn parse(&self, body: &str) -> Result<Page<Venue>> {
        let response: CrossrefItemResponse = serde_json::from_str(body)
            .map_err(|e| PipelineError::Parse(format!("Failed to parse Crossref work: {}", e)))?;
        let work = response.message;
        let venue = work.container_title.into_iter().next().map(|journal| Venue {
            journal,
            issn: work.issn.into_iter().next(),
        });
        Ok(Page::last(venue.into_iter().collect()))
    }
}

/// Journal title by ISSN
#[derive(Debug, Clone)]
pub struct JournalLookup {
    pub issn: String,
    pub mailto: String,
}

impl PageSource for JournalLookup {
    type Item = String;

    fn host(&self) -> Host {
        Host::Crossref
    }

    fn pagination(&self) -> Pagination {
        Pagination::Single
    }

    fn url(&self, _cursor: &str) -> Result<String> {
        Ok(format!(
            "{}/journals/{}?mailto={}",
            CROSSREF_API_BASE,
            encode_path(&self.issn),
            urlencoding::encode(&self.mailto)
        ))
    }

    fn parse(&self, body: &str) -> Result<Page<String>> {
        let response: CrossrefJournalResponse = serde_json::from_str(body)
            .map_err(|e| PipelineError::Parse(format!("Failed to parse Crossref journal: {}", e)))?;
        let title = response.message.title.filter(|t| !t.trim().is_empty());
        Ok(Page::last(title.into_iter().collect()))
    }
}

// === Crossref API Response Types ===

#[derive(Debug, Deserialize)]
struct CrossrefListResponse {
    message: CrossrefListMessage,
}

#[derive(Debug, Deserialize)]
struct CrossrefListMessage {
    #[serde(default)]
    items: Vec<CrossrefWork>,
    #[serde(rename = "next-cursor", default)]
    next_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CrossrefItemResponse {
    message: CrossrefWork,
}

#[derive(Debug, Default, Deserialize)]
struct CrossrefWork {
    #[serde(rename = "DOI", default)]
    doi: Option<String>,
    #[serde(rename = "ISSN", default)]
    issn: Vec<String>,
    #[serde(rename = "type", default)]
    work_type: Option<String>,
    #[serde(rename = "container-title", default)]
    container_title: Vec<String>,
    #[serde(rename = "published-print", default)]
    published_print: Option<CrossrefDate>,
    #[serde(rename = "published-online", default)]
    published_online: Option<CrossrefDate>,
}

#[derive(Debug, Deserialize)]
struct CrossrefDate {
    #[serde(rename = "date-parts", default)]
    date_parts: Vec<Vec<Option<i32>>>,
}

#[derive(Debug, Deserialize)]
struct CrossrefJournalResponse {
    message: CrossrefJournal,
}

#[derive(Debug, Deserialize)]
struct CrossrefJournal {
    #[serde(default)]
    title: Option<String>,
}

/// Convert a Crossref work into an `Article`
fn parse_article(work: CrossrefWork) -> Article {
    let published_date = work
        .published_print
        .as_ref()
        .and_then(format_date)
        .or_else(|| work.published_online.as_ref().and_then(format_date));

    Article {
        doi: work.doi.as_deref().and_then(normalize_doi),
        published_date,
        issn: work.issn,
        work_type: work.work_type,
    }
}

/// `[[2021, 3, 7]]` -> `2021-03-07`; partial dates keep what is known
fn format_date(date: &CrossrefDate) -> Option<String> {
    let parts = date.date_parts.first()?;
    let mut known = parts.iter().map_while(|p| *p);
    let year = known.next()?;
    let mut formatted = format!("{:04}", year);
    for part in known.take(2) {
        formatted.push_str(&format!("-{:02}", part));
    }
    Some(formatted)
}
