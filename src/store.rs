//! ISSN-keyed artifact store.
//!
//! Every persisted record set belongs to one journal. `JournalStore` maps
//! `(issn, Artifact)` to a file under `<root>/<issn>/`; record lists are JSON
//! lines, single documents are pretty JSON.

use crate::error::{PipelineError, Result};
use crate::ledger::FailureLedger;
use crate::model::normalize_issn;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Pipeline stages that keep a failure ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Authors,
    RetryDois,
    Publications,
    Citations,
    Competitors,
    CompetitorArticles,
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Authors => "authors",
            Stage::RetryDois => "retry_dois",
            Stage::Publications => "publications",
            Stage::Citations => "citations",
            Stage::Competitors => "competitors",
            Stage::CompetitorArticles => "competitor_articles",
        }
    }
}

/// Record kinds kept per journal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Artifact {
    Metadata,
    Articles,
    Authors,
    AuthorPublications,
    Citations,
    References,
    CompetitorRanking,
    TopCompetitors,
    PublicationCompetitors,
    FinalDatabase,
    FinalDatabaseCsv,
    ErrorReport,
    Ledger(Stage),
}

impl Artifact {
    pub fn file_name(&self) -> String {
        match self {
            Artifact::Metadata => "metadata.json".to_string(),
            Artifact::Articles => "articles.jsonl".to_string(),
            Artifact::Authors => "authors.jsonl".to_string(),
            Artifact::AuthorPublications => "author_publications.jsonl".to_string(),
            Artifact::Citations => "citations.jsonl".to_string(),
            Artifact::References => "references.jsonl".to_string(),
            Artifact::CompetitorRanking => "competitors_citations.json".to_string(),
            Artifact::TopCompetitors => "top_competitors.json".to_string(),
            Artifact::PublicationCompetitors => "competitors.json".to_string(),
            Artifact::FinalDatabase => "final_database.jsonl".to_string(),
            Artifact::FinalDatabaseCsv => "final_database.csv".to_string(),
            Artifact::ErrorReport => "error_report.json".to_string(),
            Artifact::Ledger(stage) => format!("ledger_{}.json", stage.name()),
        }
    }
}

/// File-backed store rooted at the configured data directory
#[derive(Debug, Clone)]
pub struct JournalStore {
    root: PathBuf,
}

impl JournalStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Location of `artifact` for `issn`. Rejects keys that are not ISSNs so
    /// no caller can address a path outside the root.
    pub fn path(&self, issn: &str, artifact: Artifact) -> Result<PathBuf> {
        let key = normalize_issn(issn)
            .ok_or_else(|| PipelineError::Validation(format!("Not an ISSN: {:?}", issn)))?;
        Ok(self.root.join(key).join(artifact.file_name()))
    }

    pub fn exists(&self, issn: &str, artifact: Artifact) -> bool {
        self.path(issn, artifact).map(|p| p.exists()).unwrap_or(false)
    }

    /// Write `records` as JSON lines, replacing any previous content
    pub fn save_records<T: Serialize>(&self, issn: &str, artifact: Artifact, records: &[T]) -> Result<PathBuf> {
        let path = self.prepare(issn, artifact)?;
        let mut writer = BufWriter::new(File::create(&path)?);
        for record in records {
            serde_json::to_writer(&mut writer, record)?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;
        info!(path = %path.display(), count = records.len(), "Saved records");
        Ok(path)
    }

    /// Read a JSON-lines artifact. Absence is `MissingInput`.
    pub fn load_records<T: DeserializeOwned>(&self, issn: &str, artifact: Artifact) -> Result<Vec<T>> {
        self.try_load_records(issn, artifact)?
            .ok_or_else(|| self.missing(issn, artifact))
    }

    /// Read a JSON-lines artifact, `None` when it was never written
    pub fn try_load_records<T: DeserializeOwned>(&self, issn: &str, artifact: Artifact) -> Result<Option<Vec<T>>> {
        let path = self.path(issn, artifact)?;
        if !path.exists() {
            debug!(path = %path.display(), "Artifact not found");
            return Ok(None);
        }
        let reader = BufReader::new(File::open(&path)?);
        let mut records = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            records.push(serde_json::from_str(&line)?);
        }
        Ok(Some(records))
    }

    /// Write a single pretty-printed JSON document
    pub fn save_document<T: Serialize>(&self, issn: &str, artifact: Artifact, document: &T) -> Result<PathBuf> {
        let path = self.prepare(issn, artifact)?;
        let content = serde_json::to_string_pretty(document)?;
        std::fs::write(&path, content)?;
        info!(path = %path.display(), "Saved document");
        Ok(path)
    }

    pub fn load_document<T: DeserializeOwned>(&self, issn: &str, artifact: Artifact) -> Result<T> {
        self.try_load_document(issn, artifact)?
            .ok_or_else(|| self.missing(issn, artifact))
    }

    pub fn try_load_document<T: DeserializeOwned>(&self, issn: &str, artifact: Artifact) -> Result<Option<T>> {
        let path = self.path(issn, artifact)?;
        if !path.exists() {
            debug!(path = %path.display(), "Artifact not found");
            return Ok(None);
        }
        let content = std::fs::read_to_string(&path)?;
        Ok(Some(serde_json::from_str(&content)?))
    }

    pub fn save_ledger(&self, issn: &str, stage: Stage, ledger: &FailureLedger) -> Result<PathBuf> {
        self.save_document(issn, Artifact::Ledger(stage), ledger)
    }

    /// Ledger of `stage`, empty when the stage never ran
    pub fn load_ledger(&self, issn: &str, stage: Stage) -> Result<FailureLedger> {
        Ok(self
            .try_load_document(issn, Artifact::Ledger(stage))?
            .unwrap_or_default())
    }

    /// Write `records` as CSV with a header row
    pub fn export_csv<T: Serialize>(&self, issn: &str, artifact: Artifact, records: &[T]) -> Result<PathBuf> {
        let path = self.prepare(issn, artifact)?;
        let mut wtr = csv::WriterBuilder::new().has_headers(true).from_path(&path)?;
        for record in records {
            wtr.serialize(record)?;
        }
        wtr.flush()?;
        info!(path = %path.display(), count = records.len(), "Exported CSV");
        Ok(path)
    }

    fn prepare(&self, issn: &str, artifact: Artifact) -> Result<PathBuf> {
        let path = self.path(issn, artifact)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(path)
    }

    fn missing(&self, issn: &str, artifact: Artifact) -> PipelineError {
        PipelineError::MissingInput(
            self.path(issn, artifact)
                .unwrap_or_else(|_| self.root.join(artifact.file_name())),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CitationLink;
    use tempfile::TempDir;

    #[test]
    fn test_records_roundtrip() -> Result<()> {
        let dir = TempDir::new()?;
        let store = JournalStore::new(dir.path());
        let links = vec![
            CitationLink { source_doi: "10.1/a".into(), related_doi: "10.1/b".into() },
            CitationLink { source_doi: "10.1/a".into(), related_doi: "10.1/b".into() },
        ];

        let path = store.save_records("0169-4332", Artifact::Citations, &links)?;
        assert!(path.ends_with("0169-4332/citations.jsonl"));
        let loaded: Vec<CitationLink> = store.load_records("01694332", Artifact::Citations)?;
        assert_eq!(loaded, links);
        Ok(())
    }

    #[test]
    fn test_missing_input() -> Result<()> {
        let dir = TempDir::new()?;
        let store = JournalStore::new(dir.path());
        let result: Result<Vec<CitationLink>> = store.load_records("0169-4332", Artifact::References);
        assert!(matches!(result, Err(PipelineError::MissingInput(_))));
        assert!(store.load_ledger("0169-4332", Stage::Authors)?.is_empty());
        Ok(())
    }

    #[test]
    fn test_rejects_non_issn_keys() {
        let store = JournalStore::new("/tmp/unused");
        assert!(matches!(
            store.path("../../etc", Artifact::Articles),
            Err(PipelineError::Validation(_))
        ));
        assert!(!store.exists("nope", Artifact::Articles));
    }

    #[test]
    fn test_ledger_roundtrip() -> Result<()> {
        let dir = TempDir::new()?;
        let store = JournalStore::new(dir.path());
        let mut ledger = FailureLedger::new();
        ledger.failed_doi("10.1/x");
        store.save_ledger("0169-4332", Stage::Authors, &ledger)?;
        assert_eq!(store.load_ledger("0169-4332", Stage::Authors)?, ledger);
        assert!(store.exists("0169-4332", Artifact::Ledger(Stage::Authors)));
        Ok(())
    }
}
