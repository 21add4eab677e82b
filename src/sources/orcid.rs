//! ORCID public API adapter: `/v3.0/{orcid}/works`.
//!
//! The works endpoint returns grouped summaries. Each summary carries a
//! publication year, a journal title and external ids; there is no ISSN,
//! open-access status or author position.

use crate::error::{PipelineError, Result};
use crate::fetcher::{Page, PageSource, Pagination};
use crate::http::Host;
use serde::Deserialize;

/// ORCID public API base URL
const ORCID_API_BASE: &str = "https://pub.orcid.org/v3.0";

/// Flattened work summary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrcidWork {
    pub year: Option<i32>,
    pub doi: Option<String>,
    pub journal: Option<String>,
    pub work_type: Option<String>,
}

/// Works of one ORCID iD (bare form, `0000-0002-1825-0097`)
#[derive(Debug, Clone)]
pub struct OrcidWorks {
    pub orcid: String,
}

impl PageSource for OrcidWorks {
    type Item = OrcidWork;

    fn host(&self) -> Host {
        Host::Orcid
    }

    fn pagination(&self) -> Pagination {
        Pagination::Single
    }

    fn url(&self, _cursor: &str) -> Result<String> {
        Ok(format!("{}/{}/works", ORCID_API_BASE, urlencoding::encode(&self.orcid)))
    }

    fn parse(&self, body: &str) -> Result<Page<OrcidWork>> {
        let response: OrcidWorksResponse = serde_json::from_str(body)
            .map_err(|e| PipelineError::Parse(format!("Failed to parse ORCID works: {}", e)))?;
        let works = response
            .group
            .into_iter()
            .flat_map(|group| group.work_summary)
            .map(flatten_summary)
            .collect();
        Ok(Page::last(works))
    }
}

// === ORCID API Response Types ===

#[derive(Debug, Deserialize)]
struct OrcidWorksResponse {
    #[serde(default)]
    group: Vec<OrcidGroup>,
}

#[derive(Debug, Deserialize)]
struct OrcidGroup {
    #[serde(rename = "work-summary", default)]
    work_summary: Vec<OrcidSummary>,
}

#[derive(Debug, Deserialize)]
struct OrcidSummary {
    #[serde(rename = "publication-date", default)]
    publication_date: Option<OrcidDate>,
    #[serde(rename = "external-ids", default)]
    external_ids: Option<OrcidExternalIds>,
    #[serde(rename = "journal-title", default)]
    journal_title: Option<OrcidValue>,
    #[serde(rename = "type", default)]
    work_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OrcidDate {
    #[serde(default)]
    year: Option<OrcidValue>,
}

#[derive(Debug, Deserialize)]
struct OrcidValue {
    #[serde(default)]
    value: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OrcidExternalIds {
    #[serde(rename = "external-id", default)]
    external_id: Vec<OrcidExternalId>,
}

#[derive(Debug, Deserialize)]
struct OrcidExternalId {
    #[serde(rename = "external-id-type", default)]
    id_type: Option<String>,
    #[serde(rename = "external-id-value", default)]
    id_value: Option<String>,
}

fn flatten_summary(summary: OrcidSummary) -> OrcidWork {
    let year = summary
        .publication_date
        .and_then(|d| d.year)
        .and_then(|y| y.value)
        .and_then(|v| v.trim().parse().ok());

    let doi = summary.external_ids.and_then(|ids| {
        ids.external_id
            .into_iter()
            .find(|id| id.id_type.as_deref().is_some_and(|t| t.eq_ignore_ascii_case("doi")))
            .and_then(|id| id.id_value)
    });

    OrcidWork {
        year,
        doi,
        journal: summary.journal_title.and_then(|t| t.value),
        work_type: summary.work_type,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_url() {
        let source = OrcidWorks { orcid: "0000-0002-1825-0097".into() };
        assert_eq!(source.url("*").expect("url"), "https://pub.orcid.org/v3.0/0000-0002-1825-0097/works");
    }

    #[test]
    fn test_parse_groups() {
        let body = json!({
            "group": [
                {"work-summary": [{
                    "publication-date": {"year": {"value": "2021"}},
                    "external-ids": {"external-id": [
                        {"external-id-type": "eid", "external-id-value": "2-s2.0-1"},
                        {"external-id-type": "DOI", "external-id-value": "10.1/orc"}
                    ]},
                    "journal-title": {"value": "Surface Science"},
                    "type": "journal-article"
                }]},
                {"work-summary": [{"publication-date": null, "type": "book"}]}
            ]
        });
        let works = OrcidWorks { orcid: "x".into() }.parse(&body.to_string()).expect("parse").items;
        assert_eq!(works.len(), 2);
        assert_eq!(works[0].year, Some(2021));
        assert_eq!(works[0].doi.as_deref(), Some("10.1/orc"));
        assert_eq!(works[0].journal.as_deref(), Some("Surface Science"));
        assert_eq!(works[1].year, None);
        assert_eq!(works[1].doi, None);
    }

    #[test]
    fn test_empty_record() {
        let works = OrcidWorks { orcid: "x".into() }.parse(r#"{"group": []}"#).expect("parse").items;
        assert!(works.is_empty());
    }
}
