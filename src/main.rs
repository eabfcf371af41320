//! scholarcrawl - Google Scholar topic crawler
//!
//! Crawls Scholar result listings per topic, expands linked authors'
//! bibliographies and appends new papers to per-topic CSV stores.
//!
//! ## Usage
//!
//! ### Crawl
//! ```bash
//! scholarcrawl crawl --topic "Graph Theory" --pages 5
//! ```
//!
//! ### Export for indexing
//! ```bash
//! scholarcrawl export --output ./index.json
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use scholarcrawl::config::{CrawlConfig, DEFAULT_DATA_DIR, DEFAULT_TOPICS};
use scholarcrawl::cookies::CookieManager;
use scholarcrawl::crawler::Crawler;
use scholarcrawl::navigator::PageSession;
use scholarcrawl::pacing::{Pacing, DEFAULT_MAX_DELAY_MS, DEFAULT_MIN_DELAY_MS};
use scholarcrawl::scholar::{HttpFetcher, DEFAULT_SCHOLAR_URL};
use scholarcrawl::{authors, export};
use std::path::PathBuf;
use tracing::{error, info, Level};
use tracing_subscriber::{fmt, EnvFilter};

// ============================================================================
// CLI Definition
// ============================================================================

/// Google Scholar topic crawler
#[derive(Parser)]
#[command(name = "scholarcrawl")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Crawl topics and append new papers to their stores
    Crawl {
        /// Topic to crawl (repeatable; defaults to the built-in topic list)
        #[arg(short, long = "topic")]
        topics: Vec<String>,

        /// Result pages to pass over before collecting
        #[arg(long, default_value_t = 0)]
        start_page: usize,

        /// Maximum result pages to collect per topic
        #[arg(long = "pages", default_value_t = 10)]
        num_pages: usize,

        /// Directory holding the stores and the author ledger
        #[arg(long, default_value = DEFAULT_DATA_DIR)]
        data_dir: PathBuf,

        /// Scholar base URL (e.g., a mirror)
        #[arg(long, default_value = DEFAULT_SCHOLAR_URL)]
        base_url: String,

        /// Proxy URL (e.g., http://127.0.0.1:7890)
        #[arg(long)]
        proxy: Option<String>,

        /// Minimum delay between page loads, in milliseconds
        #[arg(long, default_value_t = DEFAULT_MIN_DELAY_MS)]
        min_delay: u64,

        /// Maximum delay between page loads, in milliseconds
        #[arg(long, default_value_t = DEFAULT_MAX_DELAY_MS)]
        max_delay: u64,

        /// Maximum "Show more" clicks per author profile
        #[arg(long, default_value_t = authors::DEFAULT_MAX_REVEALS)]
        max_reveals: usize,
    },

    /// Export stores as a JSON array of index documents
    Export {
        /// Topic to export (repeatable; defaults to the built-in topic list)
        #[arg(short, long = "topic")]
        topics: Vec<String>,

        /// Directory holding the stores
        #[arg(long, default_value = DEFAULT_DATA_DIR)]
        data_dir: PathBuf,

        /// Output file
        #[arg(short, long, default_value = "./index.json")]
        output: PathBuf,
    },

    /// Manage cookies
    Cookies {
        #[command(subcommand)]
        action: CookieAction,
    },
}

#[derive(Subcommand)]
enum CookieAction {
    /// Clear stored cookies
    Clear,
    /// Show cookie file path
    Path,
    /// Import cookies from a browser JSON export
    Import {
        /// JSON file: [{"name":"NID","value":"xxx","domain":".google.com"},...]
        file: PathBuf,
    },
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.debug { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.to_string()));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .init();

    match cli.command {
        Commands::Crawl {
            topics,
            start_page,
            num_pages,
            data_dir,
            base_url,
            proxy,
            min_delay,
            max_delay,
            max_reveals,
        } => {
            let config = CrawlConfig {
                topics: topics_or_default(topics),
                start_page,
                num_pages,
                data_dir,
                base_url,
                proxy,
                pacing: Pacing::new(min_delay, max_delay).context("Invalid delay bounds")?,
                max_reveals,
            };
            run_crawl(config).await
        }
        Commands::Export {
            topics,
            data_dir,
            output,
        } => run_export(topics_or_default(topics), data_dir, output),
        Commands::Cookies { action } => handle_cookies(action),
    }
}

fn topics_or_default(topics: Vec<String>) -> Vec<String> {
    if topics.is_empty() {
        DEFAULT_TOPICS.iter().map(|t| t.to_string()).collect()
    } else {
        topics
    }
}

// ============================================================================
// Crawl
// ============================================================================

async fn run_crawl(config: CrawlConfig) -> Result<()> {
    let cookies = CookieManager::new().context("Failed to locate cookie file")?;
    let fetcher = HttpFetcher::new(config.proxy.as_deref(), &cookies)
        .context("Failed to build HTTP client")?;

    info!(
        topics = config.topics.len(),
        pages = config.num_pages,
        data_dir = ?config.data_dir,
        "Crawl configured"
    );

    let mut crawler = Crawler::new(PageSession::new(fetcher), config)
        .context("Failed to initialise crawler")?;
    let summary = crawler.run().await;

    println!("\n--- Crawl Summary ---");
    for outcome in &summary.topics {
        match &outcome.result {
            Ok(report) => println!(
                "{:<30} pages={:<3} snippets={:<4} authors={:<3} new={}",
                outcome.topic,
                report.pages,
                report.snippet_records,
                report.authors_expanded,
                report.stored.len()
            ),
            Err(e) => println!("{:<30} FAILED: {}", outcome.topic, e),
        }
    }
    println!("Total new papers: {}", summary.stored());

    if summary.failed() > 0 {
        error!(failed = summary.failed(), "Some topics failed");
    }
    Ok(())
}

// ============================================================================
// Export
// ============================================================================

fn run_export(topics: Vec<String>, data_dir: PathBuf, output: PathBuf) -> Result<()> {
    let documents = export::collect_documents(&data_dir, &topics)
        .with_context(|| format!("Failed to read stores in {:?}", data_dir))?;
    export::write_documents(&output, &documents)
        .with_context(|| format!("Failed to write {:?}", output))?;

    println!("Exported {} documents to {}", documents.len(), output.display());
    Ok(())
}

// ============================================================================
// Cookie Management
// ============================================================================

fn handle_cookies(action: CookieAction) -> Result<()> {
    let manager = CookieManager::new()?;

    match action {
        CookieAction::Clear => {
            manager.clear()?;
            println!("Cookies cleared.");
        }
        CookieAction::Path => {
            println!("Cookie file: {:?}", manager.path());
        }
        CookieAction::Import { file } => {
            let count = manager
                .import(&file)
                .with_context(|| format!("Failed to import cookies from {:?}", file))?;
            println!("Successfully saved {} cookies!", count);
        }
    }

    Ok(())
}
