//! Best-effort field extraction from Scholar pages.
//!
//! Two modes share one contract: every field is looked up independently and
//! a missing or malformed field becomes the sentinel (or `None` for `year`)
//! without affecting the rest of the record. Only a missing title rejects
//! the whole result.

use crate::error::{CrawlError, Result};
use crate::navigator::{ElementHandle, Locator, Navigator};
use crate::record::{extract_year, PaperRecord};
use crate::scholar::css;
use std::collections::HashMap;
use tracing::debug;

/// An author linked from a search result, with an absolute profile URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorLink {
    pub name: String,
    pub profile: String,
}

/// Output of snippet mode.
///
/// When `authors` is non-empty the record is superseded by author
/// expansion and must not be emitted.
#[derive(Debug, Clone)]
pub struct Snippet {
    pub record: PaperRecord,
    pub authors: Vec<AuthorLink>,
}

/// Read the text of a located element, logging (not failing) when absent.
fn text_of(found: Result<ElementHandle>, field: &str, url: &str) -> Option<String> {
    match found {
        Ok(el) => Some(el.text()).filter(|t| !t.is_empty()),
        Err(e) => {
            debug!(field, url, error = %e, "Field missing");
            None
        }
    }
}

/// Read an element's absolute `href`, logging (not failing) when absent.
fn href_of(found: Result<ElementHandle>, field: &str, url: &str) -> Option<String> {
    match found {
        Ok(el) => {
            let href = el.link("href");
            if href.is_none() {
                debug!(field, url, "Element has no href");
            }
            href
        }
        Err(e) => {
            debug!(field, url, error = %e, "Field missing");
            None
        }
    }
}

/// Remove an embedded type tag such as `[PDF]` from a rendered title.
pub fn strip_type_tag(title: &str, tag: Option<&str>) -> String {
    match tag {
        Some(tag) if !tag.is_empty() && title.contains(tag) => title
            .replace(tag, "")
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" "),
        _ => title.trim().to_string(),
    }
}

/// Split a result's author line (`authors - venue, year - host`) into the
/// author summary and the year found in the venue segment.
pub fn split_author_line(line: &str) -> (String, Option<i32>) {
    let mut parts = line.split(" - ");
    let authors = parts.next().unwrap_or_default().trim().to_string();
    let year = parts
        .next()
        .filter(|venue| venue.trim().chars().count() > 2)
        .and_then(extract_year);
    (authors, year)
}

/// Snippet mode: one entry of a search-results listing.
pub fn extract_snippet(result: &ElementHandle) -> Result<Snippet> {
    let url = result.page_url().to_string();
    let find = |selector: &str| result.find(&Locator::css(selector));

    let title = text_of(find(css::RESULT_TITLE), "title", &url)
        .ok_or_else(|| CrawlError::Extraction(format!("search result without title on {}", url)))?;

    let kind = text_of(find(css::RESULT_TYPE), "type", &url)
        .or_else(|| text_of(find(css::RESULT_TYPE_ALT), "type", &url));
    let title = strip_type_tag(&title, kind.as_deref());
    if title.is_empty() {
        return Err(CrawlError::Extraction(format!(
            "search result title is only a type tag on {}",
            url
        )));
    }

    let (authors, year) = match text_of(find(css::RESULT_AUTHOR_LINE), "authors", &url) {
        Some(line) => {
            let (authors, year) = split_author_line(&line);
            (Some(authors), year)
        }
        None => (None, None),
    };

    let record = PaperRecord::new(title)
        .authors(authors)
        .kind(kind)
        .abstract_text(text_of(find(css::RESULT_SNIPPET), "abstract", &url))
        .link(href_of(find(css::RESULT_TITLE_LINK), "link", &url))
        .paperlink(href_of(find(css::RESULT_DOWNLOAD_LINK), "paperlink", &url))
        .year(year);

    let authors = match result.find_all(&Locator::css(css::RESULT_AUTHOR_LINKS)) {
        Ok(anchors) => anchors
            .into_iter()
            .filter_map(|a| {
                let name = a.text();
                let profile = a.link("href")?;
                (!name.is_empty()).then_some(AuthorLink { name, profile })
            })
            .collect(),
        Err(e) => {
            debug!(url = %url, error = %e, "Author links unreadable");
            Vec::new()
        }
    };

    Ok(Snippet { record, authors })
}

/// Detail mode: the paper page currently loaded in `nav`.
pub fn extract_detail<N: Navigator + ?Sized>(nav: &N) -> Result<PaperRecord> {
    let url = nav
        .current_url()
        .map(|u| u.to_string())
        .unwrap_or_default();
    let find = |selector: &str| nav.find_element(&Locator::css(selector));

    let title = text_of(find(css::DETAIL_TITLE), "title", &url)
        .ok_or_else(|| CrawlError::Extraction(format!("paper page without title: {}", url)))?;

    let fields = field_table(nav, &url);
    let year = fields
        .get(css::LABEL_PUBLICATION_DATE)
        .and_then(|date| extract_year(date));

    Ok(PaperRecord::new(title)
        .authors(fields.get(css::LABEL_AUTHORS).cloned())
        .kind(text_of(find(css::DETAIL_TYPE), "type", &url))
        .abstract_text(fields.get(css::LABEL_DESCRIPTION).cloned())
        .link(href_of(find(css::DETAIL_LINK), "link", &url))
        .paperlink(href_of(find(css::DETAIL_DOWNLOAD_LINK), "paperlink", &url))
        .year(year))
}

/// Label → value pairs of a detail page's field table.
fn field_table<N: Navigator + ?Sized>(nav: &N, url: &str) -> HashMap<String, String> {
    let rows = match nav.find_elements(&Locator::css(css::DETAIL_ROW)) {
        Ok(rows) => rows,
        Err(e) => {
            debug!(url, error = %e, "Field table unreadable");
            return HashMap::new();
        }
    };

    rows.iter()
        .filter_map(|row| {
            let label = row.find(&Locator::css(css::DETAIL_LABEL));
            let value = row.find(&Locator::css(css::DETAIL_VALUE));
            match (label, value) {
                (Ok(label), Ok(value)) => Some((label.text(), value.text())),
                (Err(e), _) | (_, Err(e)) => {
                    debug!(url, error = %e, "Skipping malformed field row");
                    None
                }
            }
        })
        .collect()
}
