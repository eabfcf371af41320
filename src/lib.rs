//! # scholarcrawl
//!
//! Google Scholar topic crawler: paginated keyword search, author
//! bibliography expansion and incremental per-topic CSV stores.
//!
//! ## Modules
//!
//! - [`crawler`] - Per-topic orchestration
//! - [`pagination`] - Result-listing state machine
//! - [`authors`] - Author expansion and the crawled-author ledger
//! - [`extract`] - Snippet and detail-page field extraction
//! - [`store`] - Append-only deduplicating CSV stores
//! - [`export`] - Store export as index documents
//! - [`navigator`] - Page navigation abstraction
//! - [`scholar`] - Scholar selectors, URLs and the HTTP fetcher
//! - [`cookies`] - Cookie persistence
//! - [`error`] - Custom error types
//!
//! ## Usage
//!
//! ```rust,no_run
//! use scholarcrawl::config::CrawlConfig;
//! use scholarcrawl::cookies::CookieManager;
//! use scholarcrawl::crawler::Crawler;
//! use scholarcrawl::navigator::PageSession;
//! use scholarcrawl::scholar::HttpFetcher;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = CrawlConfig {
//!         topics: vec!["Graph Theory".into()],
//!         ..Default::default()
//!     };
//!     let fetcher = HttpFetcher::new(None, &CookieManager::new()?)?;
//!     let mut crawler = Crawler::new(PageSession::new(fetcher), config)?;
//!     let summary = crawler.run().await;
//!     println!("Stored {} new papers", summary.stored());
//!     Ok(())
//! }
//! ```

pub mod authors;
pub mod config;
pub mod cookies;
pub mod crawler;
pub mod error;
pub mod export;
pub mod extract;
pub mod navigator;
pub mod pacing;
pub mod pagination;
pub mod record;
pub mod scholar;
pub mod store;

pub use error::{CrawlError, Result};
