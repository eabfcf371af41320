//! Navigation capability used by every extraction and driver module.
//!
//! The crawl is expressed purely in terms of [`Navigator`]: load a URL, find
//! elements, click them, read their text and attributes. [`PageSession`] is
//! the implementation over a [`PageFetcher`]; it keeps the current page
//! source and re-parses it on demand, so element handles stay `Send` and can
//! be held across suspension points.

use crate::error::{CrawlError, OptionExt, Result};
use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;
use url::Url;

/// How an element is located on a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    /// CSS selector
    Css(String),
    /// Anchor whose visible text equals the given text
    LinkText(String),
    /// Enabled button whose visible text contains the given text
    ButtonText(String),
}

impl Locator {
    pub fn css(selector: &str) -> Self {
        Self::Css(selector.to_string())
    }

    pub fn link_text(text: &str) -> Self {
        Self::LinkText(text.to_string())
    }

    pub fn button_text(text: &str) -> Self {
        Self::ButtonText(text.to_string())
    }

    /// Matching descendants of `scope`, in document order.
    fn select<'a>(&self, scope: ElementRef<'a>) -> Result<Vec<ElementRef<'a>>> {
        match self {
            Self::Css(css) => {
                let selector = parse_selector(css)?;
                Ok(scope.select(&selector).collect())
            }
            Self::LinkText(text) => {
                let anchors = parse_selector("a")?;
                Ok(scope
                    .select(&anchors)
                    .filter(|a| visible_text(*a) == *text)
                    .collect())
            }
            Self::ButtonText(text) => {
                let buttons = parse_selector("button")?;
                Ok(scope
                    .select(&buttons)
                    .filter(|b| b.value().attr("disabled").is_none())
                    .filter(|b| visible_text(*b).contains(text.as_str()))
                    .collect())
            }
        }
    }
}

impl std::fmt::Display for Locator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Css(css) => write!(f, "css `{}`", css),
            Self::LinkText(text) => write!(f, "link `{}`", text),
            Self::ButtonText(text) => write!(f, "button `{}`", text),
        }
    }
}

fn parse_selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| CrawlError::Selector(format!("{}: {}", css, e)))
}

/// Text content with whitespace runs collapsed, as a browser renders it.
fn visible_text(el: ElementRef<'_>) -> String {
    el.text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// A loaded page: its final URL and raw source.
#[derive(Debug)]
pub struct Page {
    url: Url,
    source: String,
}

impl Page {
    pub fn new(url: Url, source: String) -> Self {
        Self { url, source }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Parse the page and run `f` against the element at `index`
    /// (position among all elements in document order).
    fn with_element<T>(&self, index: usize, f: impl FnOnce(ElementRef<'_>) -> T) -> Option<T> {
        let document = Html::parse_document(&self.source);
        let el = document
            .root_element()
            .descendants()
            .filter_map(ElementRef::wrap)
            .nth(index)?;
        Some(f(el))
    }

    /// Locate elements under the element at `scope`, returning their indices.
    fn locate(&self, scope: usize, locator: &Locator) -> Result<Vec<usize>> {
        let document = Html::parse_document(&self.source);
        let all: Vec<ElementRef<'_>> = document
            .root_element()
            .descendants()
            .filter_map(ElementRef::wrap)
            .collect();
        let positions: HashMap<_, usize> =
            all.iter().enumerate().map(|(i, el)| (el.id(), i)).collect();

        let scope_el = all
            .get(scope)
            .copied()
            .ok_or_missing("scope element")?;

        Ok(locator
            .select(scope_el)?
            .into_iter()
            .filter_map(|el| positions.get(&el.id()).copied())
            .collect())
    }
}

/// Handle to one element of a loaded page.
///
/// Handles snapshot the page they were found on; they remain readable after
/// the session navigates elsewhere.
#[derive(Debug, Clone)]
pub struct ElementHandle {
    page: Arc<Page>,
    index: usize,
}

impl ElementHandle {
    fn root(page: Arc<Page>) -> Self {
        Self { page, index: 0 }
    }

    /// URL of the page this element belongs to
    pub fn page_url(&self) -> &Url {
        self.page.url()
    }

    /// Visible text, trimmed and whitespace-collapsed.
    pub fn text(&self) -> String {
        self.page
            .with_element(self.index, visible_text)
            .unwrap_or_default()
    }

    /// Raw attribute value.
    pub fn attribute(&self, name: &str) -> Option<String> {
        self.page
            .with_element(self.index, |el| el.value().attr(name).map(str::to_string))
            .flatten()
    }

    /// Attribute value resolved against the page URL, the way a browser
    /// reports `href`.
    pub fn link(&self, name: &str) -> Option<String> {
        let raw = self.attribute(name)?;
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        self.page.url().join(raw).ok().map(String::from)
    }

    /// First matching descendant.
    pub fn find(&self, locator: &Locator) -> Result<ElementHandle> {
        self.find_all(locator)?
            .into_iter()
            .next()
            .ok_or_missing(&format!("{} on {}", locator, self.page.url()))
    }

    /// All matching descendants in document order.
    pub fn find_all(&self, locator: &Locator) -> Result<Vec<ElementHandle>> {
        Ok(self
            .page
            .locate(self.index, locator)?
            .into_iter()
            .map(|index| ElementHandle {
                page: Arc::clone(&self.page),
                index,
            })
            .collect())
    }
}

/// Exclusive browsing capability over the source site.
#[async_trait]
pub trait Navigator: Send {
    /// Navigate to `url` and wait for its content.
    async fn load(&mut self, url: &str) -> Result<()>;

    /// Follow a clickable element (link or navigable control).
    async fn click(&mut self, element: &ElementHandle) -> Result<()>;

    /// First element on the current page matching `locator`.
    fn find_element(&self, locator: &Locator) -> Result<ElementHandle>;

    /// Every element on the current page matching `locator`.
    fn find_elements(&self, locator: &Locator) -> Result<Vec<ElementHandle>>;

    /// URL of the current page, if any page is loaded.
    fn current_url(&self) -> Option<&Url>;
}

/// Source of raw page HTML.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &Url) -> Result<String>;
}

/// [`Navigator`] over a [`PageFetcher`]: every load or click fetches a
/// fresh page that replaces the current one.
pub struct PageSession<F> {
    fetcher: F,
    current: Option<Arc<Page>>,
}

impl<F: PageFetcher> PageSession<F> {
    pub fn new(fetcher: F) -> Self {
        Self {
            fetcher,
            current: None,
        }
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    fn root(&self) -> Result<ElementHandle> {
        self.current
            .as_ref()
            .map(|page| ElementHandle::root(Arc::clone(page)))
            .ok_or_else(|| CrawlError::navigation("<none>", "no page loaded"))
    }

    async fn open(&mut self, url: Url) -> Result<()> {
        debug!(url = %url, "Loading page");
        let source = self.fetcher.fetch(&url).await?;
        self.current = Some(Arc::new(Page::new(url, source)));
        Ok(())
    }
}

#[async_trait]
impl<F: PageFetcher> Navigator for PageSession<F> {
    async fn load(&mut self, url: &str) -> Result<()> {
        let url = Url::parse(url).map_err(|e| CrawlError::navigation(url, e.to_string()))?;
        self.open(url).await
    }

    async fn click(&mut self, element: &ElementHandle) -> Result<()> {
        let target = element
            .link("href")
            .or_else(|| element.link("data-href"))
            .ok_or_else(|| {
                CrawlError::navigation(element.page_url().as_str(), "element is not navigable")
            })?;
        let url =
            Url::parse(&target).map_err(|e| CrawlError::navigation(&target, e.to_string()))?;
        self.open(url).await
    }

    fn find_element(&self, locator: &Locator) -> Result<ElementHandle> {
        self.root()?.find(locator)
    }

    fn find_elements(&self, locator: &Locator) -> Result<Vec<ElementHandle>> {
        self.root()?.find_all(locator)
    }

    fn current_url(&self) -> Option<&Url> {
        self.current.as_ref().map(|page| page.url())
    }
}


#[cfg(test)]
mod tests {
    use super::testing::StaticSite;
    use super::*;

    const LISTING: &str = r#"<html><body>
        <table><tr class="row"><td><a class="t" href="/paper?id=1">First   paper</a></td></tr>
        <tr class="row"><td><a class="t" href="https://other.org/p2">Second paper</a></td></tr></table>
        <button disabled>Show more</button>
        <button id="more" data-href="/list?page=2"><span>Show more</span></button>
        <a href="/next"><b>Next</b></a>
    </body></html>"#;

    fn session() -> PageSession<StaticSite> {
        PageSession::new(
            StaticSite::default()
                .page("https://site.test/list", LISTING)
                .page("https://site.test/list?page=2", "<p>page two</p>")
                .page("https://site.test/next", "<p>next page</p>"),
        )
    }

    #[tokio::test]
    async fn test_find_and_read_elements() -> Result<()> {
        let mut nav = session();
        nav.load("https://site.test/list").await?;

        // <tr> survives because the whole document is re-parsed
        let rows = nav.find_elements(&Locator::css("tr.row"))?;
        assert_eq!(rows.len(), 2);

        let first = rows[0].find(&Locator::css("a.t"))?;
        assert_eq!(first.text(), "First paper");
        assert_eq!(first.attribute("href").as_deref(), Some("/paper?id=1"));
        assert_eq!(
            first.link("href").as_deref(),
            Some("https://site.test/paper?id=1")
        );

        let second = rows[1].find(&Locator::css("a.t"))?;
        assert_eq!(second.link("href").as_deref(), Some("https://other.org/p2"));
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_element_is_field_missing() -> Result<()> {
        let mut nav = session();
        nav.load("https://site.test/list").await?;
        let err = nav
            .find_element(&Locator::css(".absent"))
            .expect_err("should be missing");
        assert!(matches!(err, CrawlError::FieldMissing(_)));
        Ok(())
    }

    #[tokio::test]
    async fn test_button_locator_skips_disabled() -> Result<()> {
        let mut nav = session();
        nav.load("https://site.test/list").await?;
        let buttons = nav.find_elements(&Locator::button_text("Show more"))?;
        assert_eq!(buttons.len(), 1);
        assert_eq!(buttons[0].attribute("id").as_deref(), Some("more"));

        nav.click(&buttons[0]).await?;
        assert_eq!(
            nav.current_url().map(Url::as_str),
            Some("https://site.test/list?page=2")
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_click_link_text() -> Result<()> {
        let mut nav = session();
        nav.load("https://site.test/list").await?;
        let next = nav.find_element(&Locator::link_text("Next"))?;
        nav.click(&next).await?;
        assert_eq!(nav.find_element(&Locator::css("p"))?.text(), "next page");
        assert_eq!(
            nav.fetcher().fetched(),
            vec!["https://site.test/list", "https://site.test/next"]
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_no_page_loaded() {
        let nav = session();
        let err = nav
            .find_element(&Locator::css("p"))
            .expect_err("nothing loaded");
        assert!(err.is_navigation());
    }

    #[tokio::test]
    async fn test_unknown_page_is_navigation_failure() {
        let mut nav = session();
        let err = nav
            .load("https://site.test/missing")
            .await
            .expect_err("404");
        assert!(err.is_navigation());
        assert!(nav.current_url().is_none());
    }
}
