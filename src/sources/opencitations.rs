//! OpenCitations Index v2 adapter: `/citations/doi:{doi}` and
//! `/references/doi:{doi}`.
//!
//! Ids come back as space-separated lists such as
//! `omid:br/061 doi:10.1016/j.x.2020.1 pmid:123`; the `doi:` token is kept.

use super::encode_path;
use crate::error::{PipelineError, Result};
use crate::fetcher::{Page, PageSource, Pagination};
use crate::http::Host;
use crate::model::{normalize_doi, CitationLink};
use regex::Regex;
use serde::Deserialize;
use std::sync::LazyLock;

/// OpenCitations Index API base URL
const OPENCITATIONS_API_BASE: &str = "https://opencitations.net/index/api/v2";

static DOI_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"doi:(\S+)").unwrap_or_else(|_| Regex::new(r"$^").expect("Empty regex")));

/// Which edge list to fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkKind {
    /// Works citing the DOI
    Citations,
    /// Works the DOI references
    References,
}

impl LinkKind {
    pub fn endpoint(&self) -> &'static str {
        match self {
            LinkKind::Citations => "citations",
            LinkKind::References => "references",
        }
    }
}

/// Edge list of one DOI
#[derive(Debug, Clone)]
pub struct DoiLinks {
    pub doi: String,
    pub kind: LinkKind,
}

impl PageSource for DoiLinks {
    type Item = CitationLink;

    fn host(&self) -> Host {
        Host::OpenCitations
    }

    fn pagination(&self) -> Pagination {
        Pagination::Single
    }

    fn url(&self, _cursor: &str) -> Result<String> {
        Ok(format!(
            "{}/{}/doi:{}",
            OPENCITATIONS_API_BASE,
            self.kind.endpoint(),
            encode_path(&self.doi)
        ))
    }

    fn parse(&self, body: &str) -> Result<Page<CitationLink>> {
        let rows: Vec<OpenCitationsRow> = serde_json::from_str(body)
            .map_err(|e| PipelineError::Parse(format!("Failed to parse OpenCitations response: {}", e)))?;

        let links = rows
            .into_iter()
            .filter_map(|row| match self.kind {
                LinkKind::Citations => row.citing,
                LinkKind::References => row.cited,
            })
            .filter_map(|ids| extract_doi(&ids))
            .map(|related_doi| CitationLink {
                source_doi: self.doi.clone(),
                related_doi,
            })
            .collect();

        Ok(Page::last(links))
    }
}

#[derive(Debug, Deserialize)]
struct OpenCitationsRow {
    #[serde(default)]
    citing: Option<String>,
    #[serde(default)]
    cited: Option<String>,
}

/// DOI from an OpenCitations id list; a bare value is taken as the DOI itself
pub fn extract_doi(ids: &str) -> Option<String> {
    match DOI_TOKEN.captures(ids).and_then(|caps| caps.get(1)) {
        Some(doi) => normalize_doi(doi.as_str()),
        None => normalize_doi(ids),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_doi() {
        assert_eq!(
            extract_doi("omid:br/0612 doi:10.1016/J.X.2020.1 pmid:123").as_deref(),
            Some("10.1016/j.x.2020.1")
        );
        assert_eq!(extract_doi("10.1/plain").as_deref(), Some("10.1/plain"));
        assert_eq!(extract_doi(""), None);
    }

    #[test]
    fn test_parse_citations_and_references() {
        let body = json!([
            {"citing": "omid:br/1 doi:10.2/c1", "cited": "doi:10.1/a"},
            {"citing": "doi:10.2/c1", "cited": "doi:10.1/a"},
            {"citing": null, "cited": "doi:10.1/a"}
        ])
        .to_string();

        let citations = DoiLinks { doi: "10.1/a".into(), kind: LinkKind::Citations };
        assert_eq!(citations.url("*").expect("url"), "https://opencitations.net/index/api/v2/citations/doi:10.1/a");
        let links = citations.parse(&body).expect("parse").items;
        assert_eq!(links.len(), 2);
        assert!(links.iter().all(|l| l.source_doi == "10.1/a" && l.related_doi == "10.2/c1"));

        let references = DoiLinks { doi: "10.1/a".into(), kind: LinkKind::References };
        assert_eq!(references.parse(&body).expect("parse").items.len(), 3);
    }
}
