//! Crawl orchestration across topics.
//!
//! Per topic: open the store, walk the listing, expand every discovered
//! author, then persist the merged batch. Topics are independent units of
//! work; one failing never stops the rest.

use crate::authors::{AuthorExpander, AuthorLedger, AuthorOutcome};
use crate::config::CrawlConfig;
use crate::error::Result;
use crate::navigator::Navigator;
use crate::pagination::{CrawlQuery, Paginator};
use crate::record::StoredPaper;
use crate::scholar::build_search_url;
use crate::store::PaperStore;
use tracing::{error, info, warn};

/// What one topic produced.
#[derive(Debug, Default)]
pub struct TopicReport {
    pub topic: String,
    pub pages: usize,
    /// Records emitted directly from search snippets
    pub snippet_records: usize,
    /// Records emitted by author expansion
    pub author_records: usize,
    pub authors_expanded: usize,
    pub authors_skipped: usize,
    /// Newly persisted records, tagged with the topic
    pub stored: Vec<StoredPaper>,
}

/// Outcome of one topic within a run.
#[derive(Debug)]
pub struct TopicOutcome {
    pub topic: String,
    pub result: Result<TopicReport>,
}

/// Outcome of a whole run.
#[derive(Debug, Default)]
pub struct CrawlSummary {
    pub topics: Vec<TopicOutcome>,
}

impl CrawlSummary {
    pub fn stored(&self) -> usize {
        self.topics
            .iter()
            .filter_map(|t| t.result.as_ref().ok())
            .map(|r| r.stored.len())
            .sum()
    }

    pub fn failed(&self) -> usize {
        self.topics.iter().filter(|t| t.result.is_err()).count()
    }
}

/// Owns the navigation session and the author ledger for a run.
pub struct Crawler<N> {
    nav: N,
    ledger: AuthorLedger,
    config: CrawlConfig,
    expander: AuthorExpander,
}

impl<N: Navigator> Crawler<N> {
    /// Validate `config` and load the author ledger from its data directory.
    pub fn new(nav: N, config: CrawlConfig) -> Result<Self> {
        config.validate()?;
        let ledger = AuthorLedger::load(config.ledger_path())?;
        Ok(Self::with_ledger(nav, ledger, config))
    }

    pub fn with_ledger(nav: N, ledger: AuthorLedger, config: CrawlConfig) -> Self {
        let expander = AuthorExpander::new(config.pacing, config.max_reveals);
        Self {
            nav,
            ledger,
            config,
            expander,
        }
    }

    pub fn navigator(&self) -> &N {
        &self.nav
    }

    pub fn ledger(&self) -> &AuthorLedger {
        &self.ledger
    }

    /// Crawl every configured topic in order.
    pub async fn run(&mut self) -> CrawlSummary {
        let queries = self.config.queries();
        info!(topics = queries.len(), "Starting crawl");

        let mut summary = CrawlSummary::default();
        for query in &queries {
            let result = self.crawl_topic(query).await;
            match &result {
                Ok(report) => info!(
                    topic = %query.topic,
                    pages = report.pages,
                    stored = report.stored.len(),
                    "Topic complete"
                ),
                Err(e) => error!(topic = %query.topic, error = %e, "Topic failed"),
            }
            summary.topics.push(TopicOutcome {
                topic: query.topic.clone(),
                result,
            });
        }

        info!(
            stored = summary.stored(),
            failed = summary.failed(),
            "Crawl complete"
        );
        summary
    }

    /// Crawl and persist a single topic.
    pub async fn crawl_topic(&mut self, query: &CrawlQuery) -> Result<TopicReport> {
        // Opened first: a corrupt store must not cost a crawl or burn
        // ledger entries whose records could not be saved.
        let mut store = PaperStore::open(&self.config.data_dir, &query.topic)?;
        let search_url = build_search_url(&self.config.base_url, &query.topic)?;

        let listing = Paginator::new(&mut self.nav, query, search_url, self.config.pacing)
            .run()
            .await;

        let mut report = TopicReport {
            topic: query.topic.clone(),
            pages: listing.pages,
            snippet_records: listing.records.len(),
            ..Default::default()
        };
        let mut batch = listing.records;

        for author in &listing.authors {
            match self
                .expander
                .expand(&mut self.nav, &mut self.ledger, author)
                .await
            {
                Ok(AuthorOutcome::AlreadyCrawled) => report.authors_skipped += 1,
                Ok(outcome) => {
                    let records = outcome.into_records();
                    report.authors_expanded += 1;
                    report.author_records += records.len();
                    batch.extend(records);
                }
                Err(e) => {
                    warn!(topic = %query.topic, author = %author.name, error = %e, "Author expansion failed");
                }
            }
        }

        report.stored = store.append(batch)?;
        Ok(report)
    }
}
