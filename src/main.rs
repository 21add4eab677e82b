//! journalscope - bibliometric pipeline for one journal
//!
//! Each stage reads its input from the ISSN-keyed data directory and writes
//! its output back there, so stages can be run one at a time or all at once.
//!
//! ## Usage
//!
//! ```bash
//! journalscope run 0169-4332
//! echo 0169-4332 | journalscope articles --from-year 2019 --until-year 2023
//! journalscope --mailto me@example.org report 0169-4332
//! ```

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use journalscope::config::{Config, HostLimits, YearWindow, DEFAULT_CONTACT_EMAIL};
use journalscope::fetcher::Fetcher;
use journalscope::http::HttpTransport;
use journalscope::model::{normalize_issn, Authorship};
use journalscope::store::{Artifact, JournalStore};
use journalscope::{articles, authors, citations, competitors, merge, report, resolver};
use std::io::{BufRead, IsTerminal, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, Level};
use tracing_subscriber::{fmt, EnvFilter};

// ============================================================================
// CLI Definition
// ============================================================================

/// Bibliometric pipeline: articles, authors, citations and competitor journals
#[derive(Parser)]
#[command(name = "journalscope")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(flatten)]
    settings: Settings,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct Settings {
    /// Root directory of the per-ISSN data store
    #[arg(long, global = true, default_value = "./data")]
    data_dir: PathBuf,

    /// Contact e-mail sent to the APIs
    #[arg(long, global = true, default_value = DEFAULT_CONTACT_EMAIL)]
    mailto: String,

    /// Attempts per request, including the first
    #[arg(long, global = true, default_value = "3")]
    retries: u32,

    /// Per-request timeout in seconds
    #[arg(long, global = true, default_value = "30")]
    timeout_secs: u64,

    #[arg(long, global = true, default_value = "5")]
    crossref_concurrency: usize,

    #[arg(long, global = true, default_value = "10")]
    openalex_concurrency: usize,

    #[arg(long, global = true, default_value = "3")]
    orcid_concurrency: usize,

    #[arg(long, global = true, default_value = "10")]
    opencitations_concurrency: usize,

    /// Pause between journal-name lookups in milliseconds
    #[arg(long, global = true, default_value = "200")]
    lookup_delay_ms: u64,

    /// Number of competitor journals to keep
    #[arg(long, global = true, default_value = "10")]
    top_competitors: usize,
}

impl Settings {
    fn config(&self) -> Config {
        Config {
            data_dir: self.data_dir.clone(),
            mailto: self.mailto.clone(),
            max_attempts: self.retries.max(1),
            timeout: Duration::from_secs(self.timeout_secs),
            limits: HostLimits {
                crossref: self.crossref_concurrency,
                openalex: self.openalex_concurrency,
                orcid: self.orcid_concurrency,
                opencitations: self.opencitations_concurrency,
            },
            lookup_delay: Duration::from_millis(self.lookup_delay_ms),
            top_competitors: self.top_competitors,
            ..Config::default()
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch the journal's articles within a year window
    Articles {
        /// Journal ISSN (read from stdin when omitted)
        issn: Option<String>,

        /// First publication year (default: five years before last year)
        #[arg(long)]
        from_year: Option<i32>,

        /// Last publication year (default: last calendar year)
        #[arg(long)]
        until_year: Option<i32>,
    },

    /// Fetch the authorships of every article
    Authors { issn: Option<String> },

    /// Retry DOIs whose authorship lookup failed
    RetryDois { issn: Option<String> },

    /// Resolve the publications of every author
    Resolve { issn: Option<String> },

    /// Rank venues by the publications of the journal's authors
    PublicationCompetitors { issn: Option<String> },

    /// Fetch citation and reference edges of every article
    Citations { issn: Option<String> },

    /// Rank competitor journals from the citation graph
    Competitors { issn: Option<String> },

    /// Fetch the articles of every competitor journal
    CompetitorArticles { issn: Option<String> },

    /// Fetch authorships and author publications of every competitor
    CompetitorAuthors { issn: Option<String> },

    /// Build the final database
    Merge { issn: Option<String> },

    /// Summarize failures of every stage
    Report { issn: Option<String> },

    /// Count unique authors and ORCID coverage
    Coverage { issn: Option<String> },

    /// Run every stage in order
    Run {
        issn: Option<String>,

        #[arg(long)]
        from_year: Option<i32>,

        #[arg(long)]
        until_year: Option<i32>,
    },
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.debug { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.to_string()));

    if cli.json_logs {
        fmt().json().with_env_filter(filter).with_writer(std::io::stderr).init();
    } else {
        fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_ids(false)
            .with_writer(std::io::stderr)
            .init();
    }

    let config = cli.settings.config();
    let app = App::new(config)?;

    match cli.command {
        Commands::Articles { issn, from_year, until_year } => {
            let issn = read_issn(issn)?;
            let window = year_window(from_year, until_year)?;
            articles::run(&app.fetcher, &app.config, &app.store, &issn, window)
                .await
                .context("Article stage failed")?;
        }
        Commands::Authors { issn } => {
            let issn = read_issn(issn)?;
            authors::run(&app.fetcher, &app.config, &app.store, &issn)
                .await
                .context("Authorship stage failed")?;
        }
        Commands::RetryDois { issn } => {
            let issn = read_issn(issn)?;
            authors::retry_failed(&app.fetcher, &app.config, &app.store, &issn)
                .await
                .context("DOI retry failed")?;
        }
        Commands::Resolve { issn } => {
            let issn = read_issn(issn)?;
            let window = articles::window_for(&app.store, &issn)?;
            resolver::run(&app.fetcher, &app.config, &app.store, &issn, window)
                .await
                .context("Publication stage failed")?;
        }
        Commands::PublicationCompetitors { issn } => {
            let issn = read_issn(issn)?;
            competitors::run_publication_view(&app.store, &issn, app.config.top_competitors)
                .context("Publication competitor view failed")?;
        }
        Commands::Citations { issn } => {
            let issn = read_issn(issn)?;
            citations::run(&app.fetcher, &app.config, &app.store, &issn)
                .await
                .context("Citation stage failed")?;
        }
        Commands::Competitors { issn } => {
            let issn = read_issn(issn)?;
            competitors::run(&app.fetcher, &app.config, &app.store, &issn)
                .await
                .context("Competitor ranking failed")?;
        }
        Commands::CompetitorArticles { issn } => {
            let issn = read_issn(issn)?;
            competitors::fetch_competitor_articles(&app.fetcher, &app.config, &app.store, &issn)
                .await
                .context("Competitor article stage failed")?;
        }
        Commands::CompetitorAuthors { issn } => {
            let issn = read_issn(issn)?;
            competitors::fetch_competitor_authors(&app.fetcher, &app.config, &app.store, &issn)
                .await
                .context("Competitor author stage failed")?;
        }
        Commands::Merge { issn } => {
            let issn = read_issn(issn)?;
            merge::run(&app.fetcher, &app.config, &app.store, &issn)
                .await
                .context("Merge stage failed")?;
        }
        Commands::Report { issn } => {
            let issn = read_issn(issn)?;
            report::run(&app.store, &issn, app.config.top_competitors).context("Error report failed")?;
        }
        Commands::Coverage { issn } => {
            let issn = read_issn(issn)?;
            coverage(&app.store, &issn)?;
        }
        Commands::Run { issn, from_year, until_year } => {
            let issn = read_issn(issn)?;
            let window = year_window(from_year, until_year)?;
            app.run_all(&issn, window).await?;
        }
    }

    Ok(())
}

// ============================================================================
// Pipeline
// ============================================================================

struct App {
    config: Config,
    fetcher: Fetcher,
    store: JournalStore,
}

impl App {
    fn new(config: Config) -> Result<Self> {
        let transport = HttpTransport::new(&config).context("Failed to build HTTP client")?;
        let fetcher = Fetcher::from_config(Arc::new(transport), &config);
        let store = JournalStore::new(config.data_dir.clone());
        Ok(Self { config, fetcher, store })
    }

    async fn run_all(&self, issn: &str, window: YearWindow) -> Result<()> {
        let (fetcher, config, store) = (&self.fetcher, &self.config, &self.store);
        info!(issn = issn, data_dir = %store.root().display(), "Running full pipeline");

        println!("\n[1/9] Articles");
        articles::run(fetcher, config, store, issn, window).await.context("Article stage failed")?;

        println!("\n[2/9] Authors");
        let batch = authors::run(fetcher, config, store, issn).await.context("Authorship stage failed")?;
        if !batch.ledger.failed_dois.is_empty() {
            println!("\n[2/9] Retrying failed DOIs");
            authors::retry_failed(fetcher, config, store, issn).await.context("DOI retry failed")?;
        }

        println!("\n[3/9] Author publications");
        resolver::run(fetcher, config, store, issn, window).await.context("Publication stage failed")?;
        competitors::run_publication_view(store, issn, config.top_competitors)
            .context("Publication competitor view failed")?;

        println!("\n[4/9] Citations");
        citations::run(fetcher, config, store, issn).await.context("Citation stage failed")?;

        println!("\n[5/9] Competitor journals");
        competitors::run(fetcher, config, store, issn).await.context("Competitor ranking failed")?;

        println!("\n[6/9] Competitor articles");
        competitors::fetch_competitor_articles(fetcher, config, store, issn)
            .await
            .context("Competitor article stage failed")?;

        println!("\n[7/9] Competitor authors");
        competitors::fetch_competitor_authors(fetcher, config, store, issn)
            .await
            .context("Competitor author stage failed")?;

        println!("\n[8/9] Final database");
        merge::run(fetcher, config, store, issn).await.context("Merge stage failed")?;

        println!("\n[9/9] Error report");
        report::run(store, issn, config.top_competitors).context("Error report failed")?;

        println!("\nPipeline complete for ISSN {}", issn);
        Ok(())
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// ISSN from the argument, else from stdin (prompting on a terminal)
fn read_issn(arg: Option<String>) -> Result<String> {
    let raw = match arg {
        Some(issn) => issn,
        None => {
            let stdin = std::io::stdin();
            if stdin.is_terminal() {
                print!("Enter ISSN (e.g. 0169-4332): ");
                std::io::stdout().flush()?;
            }
            let mut line = String::new();
            stdin.lock().read_line(&mut line).context("Failed to read ISSN from stdin")?;
            line
        }
    };
    match normalize_issn(&raw) {
        Some(issn) => Ok(issn),
        None => bail!("Not a valid ISSN: {:?}", raw.trim()),
    }
}

fn year_window(from_year: Option<i32>, until_year: Option<i32>) -> Result<YearWindow> {
    let default = YearWindow::current();
    let window = YearWindow::new(
        from_year.unwrap_or(default.from_year),
        until_year.unwrap_or(default.until_year),
    );
    if window.from_year > window.until_year {
        bail!("Year window is empty: {}-{}", window.from_year, window.until_year);
    }
    Ok(window)
}

fn coverage(store: &JournalStore, issn: &str) -> Result<()> {
    let authorships: Vec<Authorship> = store
        .load_records(issn, Artifact::Authors)
        .context("Run the authors stage first")?;
    let coverage = resolver::orcid_coverage(&authorships);
    println!("ISSN {}: {} unique authors", issn, coverage.unique_authors);
    println!(
        "  with ORCID: {} ({:.2}%)",
        coverage.with_orcid,
        coverage.percent()
    );
    Ok(())
}
