//! Failure ledger.
//!
//! Each stage owns one ledger. Concurrent units return their outcome to the
//! coordinating task, which records it here, so the ledger is never shared
//! between tasks. Persisted at stage end; read back only by the report.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FailureLedger {
    pub failed_authors: BTreeSet<String>,
    pub no_work_authors: BTreeSet<String>,
    pub failed_dois: BTreeSet<String>,
    pub failed_issns: BTreeSet<String>,
    pub empty_issns: BTreeSet<String>,
}

impl FailureLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failed_author(&mut self, author_id: impl Into<String>) {
        self.failed_authors.insert(author_id.into());
    }

    pub fn no_work_author(&mut self, author_id: impl Into<String>) {
        self.no_work_authors.insert(author_id.into());
    }

    pub fn failed_doi(&mut self, doi: impl Into<String>) {
        self.failed_dois.insert(doi.into());
    }

    pub fn failed_issn(&mut self, issn: impl Into<String>) {
        self.failed_issns.insert(issn.into());
    }

    pub fn empty_issn(&mut self, issn: impl Into<String>) {
        self.empty_issns.insert(issn.into());
    }

    /// Merge another ledger into this one
    pub fn absorb(&mut self, other: FailureLedger) {
        self.failed_authors.extend(other.failed_authors);
        self.no_work_authors.extend(other.no_work_authors);
        self.failed_dois.extend(other.failed_dois);
        self.failed_issns.extend(other.failed_issns);
        self.empty_issns.extend(other.empty_issns);
    }

    pub fn is_empty(&self) -> bool {
        self.failed_authors.is_empty()
            && self.no_work_authors.is_empty()
            && self.failed_dois.is_empty()
            && self.failed_issns.is_empty()
            && self.empty_issns.is_empty()
    }

    /// ISSNs that failed or came back empty, counted once
    pub fn problem_issns(&self) -> usize {
        self.failed_issns.union(&self.empty_issns).count()
    }
}
