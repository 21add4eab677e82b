//! Endpoint adapters for the external bibliographic APIs.
//!
//! Each adapter implements [`PageSource`](crate::fetcher::PageSource): it owns
//! the URL template, the pagination style and the response shape of one
//! endpoint, and converts the payload into typed items at the boundary.

pub mod crossref;
pub mod openalex;
pub mod opencitations;
pub mod orcid;

use serde::{Deserialize, Serialize};

/// Journal a DOI was published in, as reported by one source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Venue {
    pub journal: String,
    pub issn: Option<String>,
}

/// Percent-encode an identifier for use in a URL path, keeping `/` literal
/// (DOIs are addressed as `prefix/suffix`).
pub(crate) fn encode_path(identifier: &str) -> String {
    urlencoding::encode(identifier).replace("%2F", "/")
}
