//! Paper record model, sentinel handling and identity hashing.

use md5::{Digest, Md5};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Placeholder stored for any field that could not be extracted.
pub const SENTINEL: &str = "unknown";

/// CSV column order for a per-topic store
pub const STORE_COLUMNS: &[&str] = &[
    "id",
    "title",
    "authors",
    "type",
    "abstract",
    "link",
    "paperlink",
    "year",
];

/// A discovered publication, as extracted from a result snippet or a detail page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaperRecord {
    pub title: String,
    /// Author list as rendered by the source
    pub authors: String,
    /// Publication-type tag such as `[PDF]` or `[BOOK]`
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    pub link: String,
    pub paperlink: String,
    pub year: Option<i32>,
}

impl PaperRecord {
    /// Start a record with every optional field set to its sentinel.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            authors: SENTINEL.to_string(),
            kind: SENTINEL.to_string(),
            abstract_text: SENTINEL.to_string(),
            link: SENTINEL.to_string(),
            paperlink: SENTINEL.to_string(),
            year: None,
        }
    }

    pub fn authors(mut self, authors: Option<String>) -> Self {
        self.authors = or_sentinel(authors);
        self
    }

    pub fn kind(mut self, kind: Option<String>) -> Self {
        self.kind = or_sentinel(kind);
        self
    }

    pub fn abstract_text(mut self, text: Option<String>) -> Self {
        self.abstract_text = or_sentinel(text);
        self
    }

    pub fn link(mut self, link: Option<String>) -> Self {
        self.link = or_sentinel(link);
        self
    }

    pub fn paperlink(mut self, link: Option<String>) -> Self {
        self.paperlink = or_sentinel(link);
        self
    }

    pub fn year(mut self, year: Option<i32>) -> Self {
        self.year = year;
        self
    }

    /// Content-derived identity: md5 over `title_authors_link`.
    pub fn fingerprint(&self) -> String {
        let unique = format!("{}_{}_{}", self.title, self.authors, self.link);
        format!("{:x}", Md5::digest(unique.as_bytes()))
    }
}

/// A record as written to (and read back from) a topic store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredPaper {
    pub id: String,
    /// Topic label the record was crawled under
    pub keyword: String,
    pub record: PaperRecord,
}

impl StoredPaper {
    pub fn new(record: PaperRecord, keyword: &str) -> Self {
        Self {
            id: record.fingerprint(),
            keyword: keyword.to_string(),
            record,
        }
    }
}

/// Row layout of a store file. The csv crate cannot serialize flattened
/// structs, so rows go through this mirror of [`StoredPaper`].
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct StoreRow {
    pub id: String,
    pub title: String,
    pub authors: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    pub link: String,
    pub paperlink: String,
    pub year: Option<i32>,
}

impl From<&StoredPaper> for StoreRow {
    fn from(p: &StoredPaper) -> Self {
        let r = &p.record;
        Self {
            id: p.id.clone(),
            title: r.title.clone(),
            authors: r.authors.clone(),
            kind: r.kind.clone(),
            abstract_text: r.abstract_text.clone(),
            link: r.link.clone(),
            paperlink: r.paperlink.clone(),
            year: r.year,
        }
    }
}

impl StoreRow {
    pub fn into_stored(self, keyword: &str) -> StoredPaper {
        StoredPaper {
            id: self.id,
            keyword: keyword.to_string(),
            record: PaperRecord {
                title: self.title,
                authors: self.authors,
                kind: self.kind,
                abstract_text: self.abstract_text,
                link: self.link,
                paperlink: self.paperlink,
                year: self.year,
            },
        }
    }
}

fn or_sentinel(value: Option<String>) -> String {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| SENTINEL.to_string())
}

/// Whether a stored field holds the sentinel placeholder.
pub fn is_sentinel(value: &str) -> bool {
    value == SENTINEL
}

fn year_regex() -> Option<&'static Regex> {
    static YEAR: OnceLock<Option<Regex>> = OnceLock::new();
    YEAR.get_or_init(|| Regex::new(r"\b(19|20)\d{2}\b").ok())
        .as_ref()
}

/// Scan free text for the first 4-digit year in 1900..=2099.
pub fn extract_year(text: &str) -> Option<i32> {
    year_regex()?
        .find(text)
        .and_then(|m| m.as_str().parse().ok())
}
