//! Page-by-page traversal of one query's result listing.
//!
//! ```text
//! Seeking ──load──▶ Skipping{n} ──Next×n──▶ Collecting{k} ──Next──▶ Collecting{k+1}
//!    │                  │                        │
//!    └──── failure ─────┴──── no Next / budget ──┴──────────▶ Exhausted
//! ```
//!
//! Reaching `Exhausted` is the normal end of a listing, not an error.

use crate::extract::{extract_snippet, AuthorLink};
use crate::navigator::{Locator, Navigator};
use crate::pacing::Pacing;
use crate::record::PaperRecord;
use crate::scholar::css;
use std::collections::HashSet;
use tracing::{debug, error, info, warn};
use url::Url;

/// Scope of one topic's crawl session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlQuery {
    pub topic: String,
    /// Pages to pass over before collecting (resumes an earlier run)
    pub start_page: usize,
    /// Maximum pages to collect
    pub num_pages: usize,
}

impl CrawlQuery {
    pub fn new(topic: impl Into<String>, start_page: usize, num_pages: usize) -> Self {
        Self {
            topic: topic.into(),
            start_page,
            num_pages,
        }
    }
}

/// Position of the pagination state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageState {
    /// Initial query not issued yet
    Seeking,
    /// Passing over pages without extraction
    Skipping { remaining: usize },
    /// Extracting the current page; `collected` pages done so far
    Collecting { collected: usize },
    /// Terminal
    Exhausted,
}

/// Everything gathered from one listing.
#[derive(Debug, Default)]
pub struct Listing {
    /// Records from results without linked authors
    pub records: Vec<PaperRecord>,
    /// Linked authors in first-seen order, unique by profile URL
    pub authors: Vec<AuthorLink>,
    /// Pages actually collected
    pub pages: usize,
    /// Results that could not be extracted at all
    pub skipped: usize,
    seen_profiles: HashSet<String>,
}

impl Listing {
    fn queue_author(&mut self, author: AuthorLink) {
        if self.seen_profiles.insert(author.profile.clone()) {
            self.authors.push(author);
        } else {
            debug!(author = %author.name, "Author already queued");
        }
    }
}

/// Drives a [`Navigator`] through a query's result pages.
pub struct Paginator<'a, N: Navigator + ?Sized> {
    nav: &'a mut N,
    query: &'a CrawlQuery,
    search_url: Url,
    pacing: Pacing,
    state: PageState,
    listing: Listing,
}

impl<'a, N: Navigator + ?Sized> Paginator<'a, N> {
    pub fn new(nav: &'a mut N, query: &'a CrawlQuery, search_url: Url, pacing: Pacing) -> Self {
        Self {
            nav,
            query,
            search_url,
            pacing,
            state: PageState::Seeking,
            listing: Listing::default(),
        }
    }

    pub fn state(&self) -> PageState {
        self.state
    }

    /// Run until `Exhausted` and hand back the listing.
    pub async fn run(mut self) -> Listing {
        while self.state != PageState::Exhausted {
            self.step().await;
        }
        info!(
            topic = %self.query.topic,
            pages = self.listing.pages,
            records = self.listing.records.len(),
            authors = self.listing.authors.len(),
            "Listing exhausted"
        );
        self.listing
    }

    /// Perform one transition.
    pub async fn step(&mut self) -> PageState {
        let state = self.state;
        self.state = match state {
            PageState::Seeking => self.seek().await,
            PageState::Skipping { remaining: 0 } => PageState::Collecting { collected: 0 },
            PageState::Skipping { remaining } => {
                if self.next_page().await {
                    PageState::Skipping {
                        remaining: remaining - 1,
                    }
                } else {
                    PageState::Exhausted
                }
            }
            PageState::Collecting { collected } => {
                self.collect_page();
                let collected = collected + 1;
                if collected >= self.query.num_pages || !self.next_page().await {
                    PageState::Exhausted
                } else {
                    PageState::Collecting { collected }
                }
            }
            PageState::Exhausted => PageState::Exhausted,
        };
        self.state
    }

    async fn seek(&mut self) -> PageState {
        if self.query.num_pages == 0 {
            return PageState::Exhausted;
        }

        info!(topic = %self.query.topic, url = %self.search_url, "Issuing query");
        if let Err(e) = self.nav.load(self.search_url.as_str()).await {
            warn!(topic = %self.query.topic, url = %self.search_url, error = %e, "Query failed to load");
            return PageState::Exhausted;
        }
        self.pacing.pause().await;

        match self.query.start_page {
            0 => PageState::Collecting { collected: 0 },
            n => PageState::Skipping { remaining: n },
        }
    }

    /// Follow the `Next` control. `false` means the listing has ended.
    async fn next_page(&mut self) -> bool {
        let next = match self.nav.find_element(&Locator::link_text(css::NEXT_PAGE)) {
            Ok(next) => next,
            Err(e) => {
                info!(topic = %self.query.topic, reason = %e, "No more pages");
                return false;
            }
        };

        if let Err(e) = self.nav.click(&next).await {
            if e.is_navigation() {
                warn!(topic = %self.query.topic, error = %e, "Failed to open next page");
            } else {
                error!(topic = %self.query.topic, error = %e, "Unexpected failure following Next");
            }
            return false;
        }
        self.pacing.pause().await;
        true
    }

    fn collect_page(&mut self) {
        let page = self.listing.pages + 1;
        let results = match self.nav.find_elements(&Locator::css(css::RESULT)) {
            Ok(results) => results,
            Err(e) => {
                warn!(topic = %self.query.topic, page, error = %e, "Results unreadable");
                Vec::new()
            }
        };

        for result in &results {
            match extract_snippet(result) {
                Ok(snippet) if snippet.authors.is_empty() => self.listing.records.push(snippet.record),
                Ok(snippet) => {
                    for author in snippet.authors {
                        self.listing.queue_author(author);
                    }
                }
                Err(e) => {
                    warn!(topic = %self.query.topic, page, error = %e, "Skipping result");
                    self.listing.skipped += 1;
                }
            }
        }

        self.listing.pages = page;
        info!(topic = %self.query.topic, page, results = results.len(), "Collected page");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::navigator::testing::StaticSite;
    use crate::navigator::PageSession;
    use crate::scholar::fixtures;
    use std::time::Duration;

    const SEARCH: &str = "https://scholar.test/scholar?hl=en&q=graphs";

    fn page_url(n: usize) -> String {
        format!("https://scholar.test/scholar?start={}&q=graphs", n * 10)
    }

    /// `pages` listing pages, two plain results each, chained by `Next`.
    fn site(pages: usize) -> StaticSite {
        let mut site = StaticSite::default();
        for n in 0..pages {
            let results = vec![
                fixtures::result(&format!("P{n}a"), &format!("https://p.test/{n}a"), "X Y - J, 2020", "s"),
                fixtures::result(&format!("P{n}b"), &format!("https://p.test/{n}b"), "X Y - J, 2021", "s"),
            ];
            let next = (n + 1 < pages).then(|| page_url(n + 1));
            let url = if n == 0 { SEARCH.to_string() } else { page_url(n) };
            site = site.page(&url, &fixtures::listing(&results, next.as_deref()));
        }
        site
    }

    async fn crawl(site: StaticSite, query: &CrawlQuery) -> Result<(Listing, Vec<String>)> {
        let mut nav = PageSession::new(site);
        let url = Url::parse(SEARCH).map_err(|e| crate::error::CrawlError::Config(e.to_string()))?;
        let listing = Paginator::new(&mut nav, query, url, Pacing::none()).run().await;
        Ok((listing, nav.fetcher().fetched()))
    }

    #[tokio::test]
    async fn test_stops_when_next_is_absent() -> Result<()> {
        let query = CrawlQuery::new("graphs", 0, 10);
        let (listing, fetched) = crawl(site(3), &query).await?;
        assert_eq!(listing.pages, 3);
        assert_eq!(listing.records.len(), 6);
        assert_eq!(fetched.len(), 3);
        Ok(())
    }

    #[tokio::test]
    async fn test_stops_at_page_budget() -> Result<()> {
        let query = CrawlQuery::new("graphs", 0, 2);
        let (listing, fetched) = crawl(site(5), &query).await?;
        assert_eq!(listing.pages, 2);
        assert_eq!(listing.records[3].title, "P1b");
        // No speculative fetch of page 3
        assert_eq!(fetched.len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_skips_start_pages() -> Result<()> {
        let query = CrawlQuery::new("graphs", 2, 10);
        let (listing, _) = crawl(site(4), &query).await?;
        assert_eq!(listing.pages, 2);
        let titles: Vec<_> = listing.records.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["P2a", "P2b", "P3a", "P3b"]);
        Ok(())
    }

    #[tokio::test]
    async fn test_skipping_past_the_end_collects_nothing() -> Result<()> {
        let query = CrawlQuery::new("graphs", 5, 10);
        let (listing, _) = crawl(site(2), &query).await?;
        assert_eq!(listing.pages, 0);
        assert!(listing.records.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_failed_query_is_exhausted() -> Result<()> {
        let query = CrawlQuery::new("graphs", 0, 3);
        let (listing, fetched) = crawl(StaticSite::default(), &query).await?;
        assert_eq!(listing.pages, 0);
        assert_eq!(fetched, vec![SEARCH.to_string()]);
        Ok(())
    }

    #[tokio::test]
    async fn test_zero_budget_does_not_navigate() -> Result<()> {
        let query = CrawlQuery::new("graphs", 0, 0);
        let (listing, fetched) = crawl(site(1), &query).await?;
        assert_eq!(listing.pages, 0);
        assert!(fetched.is_empty());
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_pauses_after_every_navigation() -> Result<()> {
        let mut nav = PageSession::new(site(3));
        let query = CrawlQuery::new("graphs", 0, 10);
        let url = Url::parse(SEARCH).map_err(|e| crate::error::CrawlError::Config(e.to_string()))?;
        let pacing = Pacing::new(2000, 2000)?;

        let start = tokio::time::Instant::now();
        let listing = Paginator::new(&mut nav, &query, url, pacing).run().await;

        assert_eq!(listing.pages, 3);
        // Initial load plus two page turns
        assert!(start.elapsed() >= Duration::from_secs(6));
        Ok(())
    }

    #[tokio::test]
    async fn test_state_transitions() -> Result<()> {
        let mut nav = PageSession::new(site(2));
        let query = CrawlQuery::new("graphs", 1, 10);
        let url = Url::parse(SEARCH).map_err(|e| crate::error::CrawlError::Config(e.to_string()))?;
        let mut pager = Paginator::new(&mut nav, &query, url, Pacing::none());

        assert_eq!(pager.state(), PageState::Seeking);
        assert_eq!(pager.step().await, PageState::Skipping { remaining: 1 });
        assert_eq!(pager.step().await, PageState::Skipping { remaining: 0 });
        assert_eq!(pager.step().await, PageState::Collecting { collected: 0 });
        assert_eq!(pager.step().await, PageState::Exhausted);
        assert_eq!(pager.step().await, PageState::Exhausted);
        Ok(())
    }

    #[tokio::test]
    async fn test_authors_queued_once_across_pages() -> Result<()> {
        let smith = r#"<a href="/citations?user=S1">A Smith</a> - J, 2020"#;
        let page0 = fixtures::listing(
            &[
                fixtures::result("Linked one", "https://p.test/l1", smith, "s"),
                fixtures::result("Plain", "https://p.test/p", "Z Q - J, 2019", "s"),
            ],
            Some(&page_url(1)),
        );
        let page1 = fixtures::listing(
            &[
                fixtures::result("Linked two", "https://p.test/l2", smith, "s"),
                r#"<div class="gs_r gs_or gs_scl"><div class="gs_a">untitled</div></div>"#.to_string(),
                r#"<div class="gs_r gs_or gs_scl"><h3 class="gs_rt"><span class="gs_ct1">[PDF]</span></h3></div>"#
                    .to_string(),
            ],
            None,
        );
        let site = StaticSite::default()
            .page(SEARCH, &page0)
            .page(&page_url(1), &page1);

        let (listing, _) = crawl(site, &CrawlQuery::new("graphs", 0, 10)).await?;
        assert_eq!(listing.records.len(), 1);
        assert_eq!(listing.records[0].title, "Plain");
        assert_eq!(listing.skipped, 2);
        assert_eq!(
            listing.authors,
            vec![AuthorLink {
                name: "A Smith".into(),
                profile: "https://scholar.test/citations?user=S1".into(),
            }]
        );
        Ok(())
    }
}
