//! Author expansion: crawl a linked author's whole publication list.
//!
//! Each author gets at most one honest attempt. The name is written to the
//! [`AuthorLedger`] before the profile is opened, so a crash mid-expansion
//! never causes the same bibliography to be retried forever.

use crate::error::Result;
use crate::extract::{extract_detail, AuthorLink};
use crate::navigator::{Locator, Navigator};
use crate::pacing::Pacing;
use crate::record::PaperRecord;
use crate::scholar::css;
use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Default ledger file name inside the data directory
pub const LEDGER_FILE: &str = "authors_scraped.txt";

/// Default ceiling on reveal clicks per profile
pub const DEFAULT_MAX_REVEALS: usize = 500;

/// Durable set of author display names already expanded.
///
/// Append-only, one name per line. Names are a coarse key: two different
/// people sharing a display name share one entry.
#[derive(Debug)]
pub struct AuthorLedger {
    path: PathBuf,
    names: HashSet<String>,
}

impl AuthorLedger {
    /// Read the ledger at `path`; a missing file is an empty ledger.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let names = if path.exists() {
            fs::read_to_string(&path)?
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_string)
                .collect()
        } else {
            debug!("Author ledger not found: {:?}", path);
            HashSet::new()
        };

        info!(authors = names.len(), "Loaded author ledger from {:?}", path);
        Ok(Self { path, names })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name.trim())
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Append `name` durably. Returns `false` if it was already present.
    pub fn record(&mut self, name: &str) -> Result<bool> {
        let name = name.trim();
        if self.names.contains(name) {
            return Ok(false);
        }

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{}", name)?;
        file.flush()?;

        self.names.insert(name.to_string());
        Ok(true)
    }
}

/// Result of one expansion attempt.
#[derive(Debug)]
pub enum AuthorOutcome {
    /// Already in the ledger; nothing was navigated
    AlreadyCrawled,
    /// Expansion ran (possibly yielding nothing)
    Expanded {
        records: Vec<PaperRecord>,
        /// Reveal clicks performed
        reveals: usize,
        /// Paper pages that could not be loaded or extracted
        failed: usize,
    },
}

impl AuthorOutcome {
    /// Records produced by this attempt.
    pub fn into_records(self) -> Vec<PaperRecord> {
        match self {
            Self::AlreadyCrawled => Vec::new(),
            Self::Expanded { records, .. } => records,
        }
    }
}

/// Expands author profiles with a fixed pacing and reveal cap.
#[derive(Debug, Clone, Copy)]
pub struct AuthorExpander {
    pacing: Pacing,
    max_reveals: usize,
}

impl AuthorExpander {
    pub fn new(pacing: Pacing, max_reveals: usize) -> Self {
        Self {
            pacing,
            max_reveals,
        }
    }

    /// Expand one linked author unless the ledger already holds their name.
    pub async fn expand<N: Navigator + ?Sized>(
        &self,
        nav: &mut N,
        ledger: &mut AuthorLedger,
        author: &AuthorLink,
    ) -> Result<AuthorOutcome> {
        if ledger.contains(&author.name) {
            info!(author = %author.name, "Skipping author, papers already scraped");
            return Ok(AuthorOutcome::AlreadyCrawled);
        }

        ledger.record(&author.name)?;
        info!(author = %author.name, profile = %author.profile, "Expanding author");

        if let Err(e) = nav.load(&author.profile).await {
            warn!(author = %author.name, url = %author.profile, error = %e, "Profile failed to load");
            return Ok(AuthorOutcome::Expanded {
                records: Vec::new(),
                reveals: 0,
                failed: 0,
            });
        }
        self.pacing.pause().await;

        let reveals = self.reveal_all(nav, &author.name).await;
        let links = paper_links(nav, &author.name);
        debug!(author = %author.name, papers = links.len(), "Collected paper links");

        let mut records = Vec::with_capacity(links.len());
        let mut failed = 0;
        for link in &links {
            if let Err(e) = nav.load(link).await {
                warn!(author = %author.name, url = %link, error = %e, "Paper page failed to load");
                failed += 1;
                continue;
            }
            self.pacing.pause().await;

            match extract_detail(nav) {
                Ok(record) => records.push(record),
                Err(e) => {
                    warn!(author = %author.name, url = %link, error = %e, "Skipping paper");
                    failed += 1;
                }
            }
        }

        info!(
            author = %author.name,
            papers = records.len(),
            failed,
            reveals,
            "Author expanded"
        );
        Ok(AuthorOutcome::Expanded {
            records,
            reveals,
            failed,
        })
    }

    /// Click the reveal control until it disappears or the cap is hit.
    async fn reveal_all<N: Navigator + ?Sized>(&self, nav: &mut N, author: &str) -> usize {
        let mut reveals = 0;
        loop {
            if reveals >= self.max_reveals {
                warn!(author, cap = self.max_reveals, "Reveal cap reached, list may be truncated");
                break;
            }

            let button = match nav.find_element(&Locator::button_text(css::SHOW_MORE)) {
                Ok(button) => button,
                Err(_) => {
                    debug!(author, reveals, "Show more is no longer available");
                    break;
                }
            };
            if let Err(e) = nav.click(&button).await {
                if e.is_navigation() {
                    info!(author, reveals, reason = %e, "Reveal control stopped responding");
                } else {
                    warn!(author, reveals, error = %e, "Reveal control could not be followed");
                }
                break;
            }
            reveals += 1;
            self.pacing.pause().await;
        }
        reveals
    }
}

impl Default for AuthorExpander {
    fn default() -> Self {
        Self::new(Pacing::default(), DEFAULT_MAX_REVEALS)
    }
}

/// Absolute links of every paper row currently shown on a profile.
fn paper_links<N: Navigator + ?Sized>(nav: &N, author: &str) -> Vec<String> {
    let rows = match nav.find_elements(&Locator::css(css::PROFILE_ROW)) {
        Ok(rows) => rows,
        Err(e) => {
            warn!(author, error = %e, "Profile rows unreadable");
            return Vec::new();
        }
    };

    rows.iter()
        .filter_map(|row| match row.find(&Locator::css(css::PROFILE_PAPER_LINK)) {
            Ok(a) => a.link("href"),
            Err(e) => {
                debug!(author, error = %e, "Error parsing profile row");
                None
            }
        })
        .collect()
}
