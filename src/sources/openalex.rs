//! OpenAlex API adapters.
//!
//! - `/works/doi:{doi}` for the authorships of one article
//! - `/works?filter=author.id:{id}` for an author's works, cursor-paginated
//! - `/works/https://doi.org/{doi}` for the venue of one DOI
//!
//! API Best Practices (per OpenAlex docs):
//! - Use `mailto:email` parameter for polite pool (10 req/s vs 1 req/s)
//! - Use `cursor=*` for exhaustive listings beyond 10k results

use super::{encode_path, Venue};
use crate::error::{PipelineError, Result};
use crate::fetcher::{Page, PageSource, Pagination};
use crate::http::Host;
use crate::model::{Article, AuthorPosition, Authorship};
use serde::Deserialize;

/// OpenAlex API base URL
const OPENALEX_API_BASE: &str = "https://api.openalex.org";

/// Page size for author work listings
const PER_PAGE: usize = 100;

/// Canonical prefix of OpenAlex author identifiers
pub const AUTHOR_ID_PREFIX: &str = "https://openalex.org/A";

/// Authorship rows of one article, looked up by DOI
#[derive(Debug, Clone)]
pub struct WorkAuthorships {
    pub doi: String,
    pub article: Article,
    pub mailto: String,
}

impl PageSource for WorkAuthorships {
    type Item = Authorship;

    fn host(&self) -> Host {
        Host::OpenAlex
    }

    fn pagination(&self) -> Pagination {
        Pagination::Single
    }

    fn url(&self, _cursor: &str) -> Result<String> {
        Ok(format!(
            "{}/works/doi:{}?mailto={}",
            OPENALEX_API_BASE,
            encode_path(&self.doi),
            urlencoding::encode(&self.mailto)
        ))
    }

    fn parse(&self, body: &str) -> Result<Page<Authorship>> {
        let work: OpenAlexWork = serde_json::from_str(body)
            .map_err(|e| PipelineError::Parse(format!("Failed to parse OpenAlex work: {}", e)))?;

        let oa_status = work.oa_status();
        let issn = (!self.article.issn.is_empty()).then(|| self.article.issn.join(", "));

        let rows = work
            .authorships
            .into_iter()
            .map(|authorship| {
                let institution = authorship.institutions.into_iter().next();
                let author = authorship.author.unwrap_or_default();
                Authorship {
                    doi: self.doi.clone(),
                    published_date: self.article.published_date.clone(),
                    issn: issn.clone(),
                    oa_status: Some(oa_status.clone()),
                    work_type: self.article.work_type.clone(),
                    author_name: author.display_name,
                    author_position: authorship.author_position.as_deref().and_then(AuthorPosition::parse),
                    orcid: author.orcid,
                    affiliation: institution.as_ref().and_then(|i| i.display_name.clone()),
                    country: institution.and_then(|i| i.country_code),
                    author_id: author.id,
                }
            })
            .collect();

        Ok(Page::last(rows))
    }
}

/// Every work of one author
#[derive(Debug, Clone)]
pub struct AuthorWorks {
    /// Short id, e.g. `A5023888391`
    pub author_key: String,
    pub mailto: String,
}

impl AuthorWorks {
    /// Listing for a canonical author id (`https://openalex.org/A...`)
    pub fn for_author_id(author_id: &str, mailto: &str) -> Self {
        let author_key = author_id.rsplit('/').next().unwrap_or(author_id).to_string();
        Self {
            author_key,
            mailto: mailto.to_string(),
        }
    }
}

impl PageSource for AuthorWorks {
    type Item = OpenAlexWork;

    fn host(&self) -> Host {
        Host::OpenAlex
    }

    fn pagination(&self) -> Pagination {
        Pagination::Cursor
    }

    fn url(&self, cursor: &str) -> Result<String> {
        Ok(format!(
            "{}/works?filter=author.id:{}&per-page={}&mailto={}&cursor={}",
            OPENALEX_API_BASE,
            urlencoding::encode(&self.author_key),
            PER_PAGE,
            urlencoding::encode(&self.mailto),
            urlencoding::encode(cursor)
        ))
    }

    fn parse(&self, body: &str) -> Result<Page<OpenAlexWork>> {
        let response: OpenAlexListResponse = serde_json::from_str(body)
            .map_err(|e| PipelineError::Parse(format!("Failed to parse OpenAlex listing: {}", e)))?;
        Ok(Page {
            items: response.results,
            next_cursor: response.meta.and_then(|m| m.next_cursor),
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
        Host::OpenAlex
    }

    fn pagination(&self) -> Pagination {
        Pagination::Single
    }

    fn url(&self, _cursor: &str) -> Result<String> {
        Ok(format!(
            "{}/works/https://doi.org/{}?mailto={}",
            OPENALEX_API_BASE,
            encode_path(&self.doi),
            urlencoding::encode(&self.mailto)
        ))
    }

    fn parse(&self, body: &str) -> Result<Page<Venue>> {
        let work: OpenAlexWork = serde_json::from_str(body)
            .map_err(|e| PipelineError::Parse(format!("Failed to parse OpenAlex work: {}", e)))?;
        let venue = work.source().and_then(|source| {
            source.display_name.clone().map(|journal| Venue {
                journal,
                issn: source.issn_l.clone(),
            })
        });
        Ok(Page::last(venue.into_iter().collect()))
    }
}

// === OpenAlex API Response Types ===

#[derive(Debug, Deserialize)]
struct OpenAlexListResponse {
    #[serde(default)]
    meta: Option<OpenAlexMeta>,
    #[serde(default)]
    results: Vec<OpenAlexWork>,
}

#[derive(Debug, Deserialize)]
struct OpenAlexMeta {
    #[serde(default)]
    next_cursor: Option<String>,
}

/// Work as returned by OpenAlex, restricted to the fields the pipeline reads
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OpenAlexWork {
    #[serde(default)]
    pub doi: Option<String>,
    #[serde(default)]
    pub publication_date: Option<String>,
    #[serde(rename = "type", default)]
    pub work_type: Option<String>,
    #[serde(default)]
    pub authorships: Vec<OpenAlexAuthorship>,
    #[serde(default)]
    pub primary_location: Option<OpenAlexLocation>,
    #[serde(default)]
    pub open_access: Option<OpenAlexOpenAccess>,
}

impl OpenAlexWork {
    pub fn source(&self) -> Option<&OpenAlexSource> {
        self.primary_location.as_ref()?.source.as_ref()
    }

    /// Open-access status, `"unknown"` when the work reports none
    pub fn oa_status(&self) -> String {
        self.open_access
            .as_ref()
            .and_then(|oa| oa.oa_status.clone())
            .unwrap_or_else(|| "unknown".to_string())
    }

    /// Venue ISSNs joined with `", "`, `None` when the source lists none
    pub fn joined_issn(&self) -> Option<String> {
        let issns = self.source()?.issn.as_ref()?;
        (!issns.is_empty()).then(|| issns.join(", "))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OpenAlexAuthorship {
    #[serde(default)]
    pub author_position: Option<String>,
    #[serde(default)]
    pub author: Option<OpenAlexAuthor>,
    #[serde(default)]
    pub institutions: Vec<OpenAlexInstitution>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OpenAlexAuthor {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub orcid: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OpenAlexInstitution {
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub country_code: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OpenAlexLocation {
    #[serde(default)]
    pub source: Option<OpenAlexSource>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OpenAlexSource {
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub issn_l: Option<String>,
    #[serde(default)]
    pub issn: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OpenAlexOpenAccess {
    #[serde(default)]
    pub oa_status: Option<String>,
}
