//! # journalscope
//!
//! Bibliometric pipeline for a single journal, keyed by ISSN.
//!
//! ## Modules
//!
//! - [`fetcher`] - Rate-limited, retrying, paginated fetcher shared by every stage
//! - [`sources`] - Crossref, OpenAlex, ORCID and OpenCitations endpoint adapters
//! - [`articles`] - Article list of a journal within a year window
//! - [`authors`] - Authorships of every article, plus retry of failed DOIs
//! - [`resolver`] - Author publications via ORCID with OpenAlex fallback
//! - [`citations`] - Citation and reference edges
//! - [`competitors`] - Competitor journal ranking and competitor corpora
//! - [`merge`] - Final denormalized database
//! - [`report`] - Error report over the persisted ledgers
//! - [`store`] - ISSN-keyed artifact store
//! - [`error`] - Custom error types
//!
//! ## Usage
//!
//! ```rust,no_run
//! use journalscope::config::{Config, YearWindow};
//! use journalscope::fetcher::Fetcher;
//! use journalscope::http::HttpTransport;
//! use journalscope::store::JournalStore;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::default();
//!     let fetcher = Fetcher::from_config(Arc::new(HttpTransport::new(&config)?), &config);
//!     let store = JournalStore::new(&config.data_dir);
//!     let articles = journalscope::articles::run(&fetcher, &config, &store, "0169-4332", YearWindow::current()).await?;
//!     println!("Found {} articles", articles.len());
//!     Ok(())
//! }
//! ```

pub mod articles;
pub mod authors;
pub mod citations;
pub mod competitors;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod http;
pub mod journals;
pub mod ledger;
pub mod merge;
pub mod model;
pub mod region;
pub mod report;
pub mod resolver;
pub mod sources;
pub mod store;

pub use error::{PipelineError, Result};
