//! Citation-graph stage: incoming and outgoing DOI edges of every article.

use crate::authors::progress_bar;
use crate::config::Config;
use crate::error::Result;
use crate::fetcher::{FetchOutcome, Fetcher};
use crate::ledger::FailureLedger;
use crate::model::{Article, CitationLink};
use crate::sources::opencitations::{DoiLinks, LinkKind};
use crate::store::{Artifact, JournalStore, Stage};
use futures::stream::{self, StreamExt};
use std::collections::BTreeSet;
use tracing::{debug, info};

/// Edge lists of a journal. Repeat edges are kept.
#[derive(Debug, Default)]
pub struct CitationGraph {
    pub citations: Vec<CitationLink>,
    pub references: Vec<CitationLink>,
    pub ledger: FailureLedger,
}

/// Both edge lists of one DOI; a DOI counts as failed when either fetch fails
async fn fetch_links(fetcher: &Fetcher, doi: String) -> (String, Result<(Vec<CitationLink>, Vec<CitationLink>)>) {
    let citations = DoiLinks { doi: doi.clone(), kind: LinkKind::Citations };
    let references = DoiLinks { doi: doi.clone(), kind: LinkKind::References };
    let (cited_by, refs) = futures::join!(fetcher.fetch_all(&citations), fetcher.fetch_all(&references));

    let result = match (cited_by, refs) {
        (FetchOutcome::Failed(e), _) | (_, FetchOutcome::Failed(e)) => Err(e),
        (cited_by, refs) => cited_by.into_result().and_then(|c| Ok((c, refs.into_result()?))),
    };
    (doi, result)
}

/// Fetch the edges of every distinct DOI in `articles`.
pub async fn fetch_graph(fetcher: &Fetcher, config: &Config, articles: &[Article]) -> CitationGraph {
    let dois: BTreeSet<String> = articles.iter().filter_map(|a| a.doi.clone()).collect();
    let mut graph = CitationGraph::default();
    let pb = progress_bar(dois.len(), "Fetching citations");

    let mut results = stream::iter(dois)
        .map(|doi| fetch_links(fetcher, doi))
        .buffer_unordered(config.limits.opencitations.max(1));

    while let Some((doi, result)) = results.next().await {
        match result {
            Ok((citations, references)) => {
                graph.citations.extend(citations);
                graph.references.extend(references);
            }
            Err(e) => {
                debug!(doi = %doi, error = %e, "Citation lookup failed");
                graph.ledger.failed_doi(doi);
            }
        }
        pb.inc(1);
    }
    pb.finish_and_clear();
    graph
}

/// Stage entry: fetch and persist both edge lists of `issn`'s articles.
pub async fn run(fetcher: &Fetcher, config: &Config, store: &JournalStore, issn: &str) -> Result<CitationGraph> {
    let articles: Vec<Article> = store.load_records(issn, Artifact::Articles)?;
    let without_doi = articles.iter().filter(|a| a.doi.is_none()).count();
    info!(issn = issn, articles = articles.len(), without_doi = without_doi, "Fetching citation graph");

    let graph = fetch_graph(fetcher, config, &articles).await;

    store.save_records(issn, Artifact::Citations, &graph.citations)?;
    store.save_records(issn, Artifact::References, &graph.references)?;
    store.save_ledger(issn, Stage::Citations, &graph.ledger)?;

    println!(
        "ISSN {}: {} citations, {} references, {} failed DOIs, {} articles without DOI",
        issn,
        graph.citations.len(),
        graph.references.len(),
        graph.ledger.failed_dois.len(),
        without_doi
    );
    Ok(graph)
}
