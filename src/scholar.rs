//! Google Scholar specifics: markup locators, query URLs and the HTTP page
//! fetcher.
//!
//! The fetcher carries the anti-detection measures the crawl depends on:
//! a desktop user agent, browser-like headers, persisted cookies and
//! CAPTCHA detection.

use crate::cookies::{Cookie, CookieManager};
use crate::error::{CrawlError, Result};
use crate::navigator::PageFetcher;
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// Default Google Scholar URL
pub const DEFAULT_SCHOLAR_URL: &str = "https://scholar.google.com";

/// User agent string for requests
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

/// Per-request timeout, standing in for a browser's element wait
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// CSS selectors and control labels of Scholar pages.
pub mod css {
    // Search-results listing
    pub const RESULT: &str = ".gs_r.gs_or.gs_scl";
    pub const RESULT_TITLE: &str = ".gs_rt";
    pub const RESULT_TITLE_LINK: &str = ".gs_rt a";
    pub const RESULT_TYPE: &str = ".gs_ct1";
    pub const RESULT_TYPE_ALT: &str = ".gs_ctg2";
    pub const RESULT_AUTHOR_LINE: &str = ".gs_a";
    pub const RESULT_AUTHOR_LINKS: &str = ".gs_a a";
    pub const RESULT_SNIPPET: &str = ".gs_rs";
    pub const RESULT_DOWNLOAD_LINK: &str = ".gs_or_ggsm a";
    pub const NEXT_PAGE: &str = "Next";

    // Author profile
    pub const SHOW_MORE: &str = "Show more";
    pub const PROFILE_ROW: &str = ".gsc_a_tr";
    pub const PROFILE_PAPER_LINK: &str = ".gsc_a_at";

    // Paper detail page
    pub const DETAIL_TITLE: &str = "#gsc_oci_title";
    pub const DETAIL_TYPE: &str = ".gsc_vcd_title_ggt";
    pub const DETAIL_ROW: &str = ".gs_scl";
    pub const DETAIL_LABEL: &str = ".gsc_oci_field";
    pub const DETAIL_VALUE: &str = ".gsc_oci_value";
    pub const DETAIL_LINK: &str = ".gsc_oci_title_link";
    pub const DETAIL_DOWNLOAD_LINK: &str = ".gsc_oci_title_ggi a";

    // Field table labels
    pub const LABEL_AUTHORS: &str = "Authors";
    pub const LABEL_DESCRIPTION: &str = "Description";
    pub const LABEL_PUBLICATION_DATE: &str = "Publication date";
}

/// Build the Google Scholar search URL for a topic.
pub fn build_search_url(base_url: &str, query: &str) -> Result<Url> {
    let mut url = Url::parse(&format!("{}/scholar", base_url.trim_end_matches('/')))
        .map_err(|e| CrawlError::Config(format!("Invalid base URL: {}", e)))?;

    url.query_pairs_mut()
        .append_pair("hl", "en") // Force English locale for consistent labels
        .append_pair("q", query);

    Ok(url)
}

/// Whether a fetched page is Scholar's bot-check interstitial.
pub fn is_captcha_page(html: &str) -> bool {
    html.contains("Solving the above CAPTCHA")
        || html.contains("unusual traffic")
        || html.contains("gs_captcha_ccl")
}

/// [`PageFetcher`] talking to Scholar over HTTP.
pub struct HttpFetcher {
    client: reqwest::Client,
    cookie_header: String,
}

impl HttpFetcher {
    /// Create a fetcher with an optional proxy and the stored cookies.
    pub fn new(proxy: Option<&str>, cookies: &CookieManager) -> Result<Self> {
        let cookies = cookies.load();
        let cookie_header = build_cookie_header(&cookies);

        if cookie_header.is_empty() {
            warn!("No cookies loaded. Scholar may answer with a CAPTCHA page.");
        } else {
            info!("Loaded {} cookies for Google Scholar", cookies.len());
        }

        Ok(Self {
            client: build_http_client(proxy)?,
            cookie_header,
        })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &Url) -> Result<String> {
        let mut request = self
            .client
            .get(url.as_str())
            .header("Accept", "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8")
            .header("Accept-Language", "en-US,en;q=0.9")
            .header("Cache-Control", "no-cache")
            .header("Pragma", "no-cache")
            .header("Sec-Fetch-Dest", "document")
            .header("Sec-Fetch-Mode", "navigate")
            .header("Sec-Fetch-Site", "none")
            .header("Sec-Fetch-User", "?1")
            .header("Upgrade-Insecure-Requests", "1");

        if !self.cookie_header.is_empty() {
            request = request.header("Cookie", self.cookie_header.as_str());
        }

        let response = request.send().await?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(CrawlError::RateLimited(60));
        }

        if !status.is_success() {
            return Err(CrawlError::navigation(
                url.as_str(),
                format!("HTTP error: {}", status),
            ));
        }

        let html = response.text().await?;
        if is_captcha_page(&html) {
            warn!(url = %url, "CAPTCHA detected");
            return Err(CrawlError::Captcha(url.to_string()));
        }

        debug!(url = %url, bytes = html.len(), "Fetched page");
        Ok(html)
    }
}

/// Build cookie header string from cookie list
fn build_cookie_header(cookies: &[Cookie]) -> String {
    cookies
        .iter()
        .filter(|c| c.is_google())
        .map(|c| format!("{}={}", c.name, c.value))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Build HTTP client with optional proxy
fn build_http_client(proxy: Option<&str>) -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(REQUEST_TIMEOUT)
        .cookie_store(true);

    if let Some(proxy_url) = proxy {
        let proxy = reqwest::Proxy::all(proxy_url).map_err(|e| {
            CrawlError::Config(format!("Invalid proxy URL '{}': {}", proxy_url, e))
        })?;
        builder = builder.proxy(proxy);
    }

    builder
        .build()
        .map_err(|e| CrawlError::Config(format!("Failed to build HTTP client: {}", e)))
}

/// Scholar-shaped HTML for driver tests.
#[cfg(test)]
pub(crate) mod fixtures {
    fn attr(value: &str) -> String {
        value.replace('&', "&amp;")
    }

    /// One search result. `author_line` may contain profile anchors.
    pub fn result(title: &str, href: &str, author_line: &str, snippet: &str) -> String {
        let href = attr(href);
        format!(
            r#"<div class="gs_r gs_or gs_scl"><h3 class="gs_rt"><a href="{href}">{title}</a></h3><div class="gs_a">{author_line}</div><div class="gs_rs">{snippet}</div></div>"#
        )
    }

    /// A results listing, optionally with a `Next` link.
    pub fn listing(results: &[String], next: Option<&str>) -> String {
        let next = next
            .map(|href| format!(r#"<div id="gs_n"><a href="{}"><b>Next</b></a></div>"#, attr(href)))
            .unwrap_or_default();
        format!("<html><body>{}{}</body></html>", results.concat(), next)
    }

    /// An author profile listing paper links, optionally with a reveal button.
    pub fn profile(paper_hrefs: &[&str], show_more: Option<&str>) -> String {
        let rows: String = paper_hrefs
            .iter()
            .enumerate()
            .map(|(i, href)| {
                let href = attr(href);
                format!(
                    r#"<tr class="gsc_a_tr"><td class="gsc_a_t"><a class="gsc_a_at" href="{href}">Paper {i}</a></td></tr>"#
                )
            })
            .collect();
        let button = match show_more {
            Some(href) => format!(
                r#"<button id="gsc_bpf_more" data-href="{}"><span class="gs_lbl">Show more</span></button>"#,
                attr(href)
            ),
            None => r#"<button id="gsc_bpf_more" disabled><span class="gs_lbl">Show more</span></button>"#
                .to_string(),
        };
        format!(
            r#"<html><body><table id="gsc_a_t"><tbody id="gsc_a_b">{rows}</tbody></table>{button}</body></html>"#
        )
    }

    /// A paper detail page.
    pub fn detail(title: &str, authors: &str, date: &str, link: &str) -> String {
        let link = attr(link);
        format!(
            r#"<html><body><div id="gsc_oci_title"><a class="gsc_oci_title_link" href="{link}">{title}</a></div><div id="gsc_oci_table"><div class="gs_scl"><div class="gsc_oci_field">Authors</div><div class="gsc_oci_value">{authors}</div></div><div class="gs_scl"><div class="gsc_oci_field">Publication date</div><div class="gsc_oci_value">{date}</div></div><div class="gs_scl"><div class="gsc_oci_field">Description</div><div class="gsc_oci_value">About {title}.</div></div></div></body></html>"#
        )
    }
}
