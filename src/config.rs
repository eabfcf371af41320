//! Crawl configuration.
//!
//! Built by the CLI from its flags. Defaults: twenty topics, ten pages each,
//! 2-4 s jitter between page loads.

use crate::authors::{DEFAULT_MAX_REVEALS, LEDGER_FILE};
use crate::error::{CrawlError, Result};
use crate::pacing::Pacing;
use crate::pagination::CrawlQuery;
use crate::scholar::DEFAULT_SCHOLAR_URL;
use std::path::PathBuf;

/// Topics crawled when none are given
pub const DEFAULT_TOPICS: &[&str] = &[
    "Machine Learning",
    "Image Processing",
    "Object Detection",
    "Computer Vision",
    "Internet Of Things",
    "Antenna",
    "Science",
    "Maths",
    "Deeplearning",
    "Statistics",
    "Natural Language Processing",
    "Large Language Models",
    "Artificial Intelligence",
    "Neural Networks",
    "Transformers",
    "Quantum Computing",
    "Cryptography",
    "Blockchain",
    "Graph Theory",
    "Cloud Computing",
];

/// Default directory for stores and the author ledger
pub const DEFAULT_DATA_DIR: &str = "data";

/// Default number of result pages collected per topic
pub const DEFAULT_NUM_PAGES: usize = 10;

/// Everything one crawl run needs.
#[derive(Debug, Clone)]
pub struct CrawlConfig {
    pub topics: Vec<String>,
    pub start_page: usize,
    pub num_pages: usize,
    pub data_dir: PathBuf,
    pub base_url: String,
    pub proxy: Option<String>,
    pub pacing: Pacing,
    pub max_reveals: usize,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            topics: DEFAULT_TOPICS.iter().map(|t| t.to_string()).collect(),
            start_page: 0,
            num_pages: DEFAULT_NUM_PAGES,
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            base_url: DEFAULT_SCHOLAR_URL.to_string(),
            proxy: None,
            pacing: Pacing::default(),
            max_reveals: DEFAULT_MAX_REVEALS,
        }
    }
}

impl CrawlConfig {
    /// Reject configurations that cannot produce a meaningful crawl.
    pub fn validate(&self) -> Result<()> {
        if self.topics.iter().all(|t| t.trim().is_empty()) {
            return Err(CrawlError::Config("no topics to crawl".to_string()));
        }
        if self.max_reveals == 0 {
            return Err(CrawlError::Config(
                "max_reveals must be at least 1".to_string(),
            ));
        }
        url::Url::parse(&self.base_url)
            .map_err(|e| CrawlError::Config(format!("Invalid base URL '{}': {}", self.base_url, e)))?;
        Ok(())
    }

    /// One query per non-blank topic, in configured order.
    pub fn queries(&self) -> Vec<CrawlQuery> {
        self.topics
            .iter()
            .map(|t| t.trim())
            .filter(|t| !t.is_empty())
            .map(|t| CrawlQuery::new(t, self.start_page, self.num_pages))
            .collect()
    }

    pub fn ledger_path(&self) -> PathBuf {
        self.data_dir.join(LEDGER_FILE)
    }
}
