//! Cookie jar for Scholar sessions.
//!
//! A browser-issued jar lets the HTTP fetcher pass Scholar's bot checks.
//! Only Google-domain cookies are kept: imports drop everything else, so
//! the jar on disk is exactly what the fetcher will send.

use crate::error::{CrawlError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const COOKIE_FILE: &str = ".scholarcrawl_cookies.json";

/// Cookie entry in the browser-export JSON format
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    pub domain: String,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub secure: bool,
    #[serde(default)]
    pub http_only: bool,
    #[serde(default)]
    pub expires: Option<f64>,
}

impl Cookie {
    /// Whether Scholar will see this cookie.
    pub fn is_google(&self) -> bool {
        self.domain.contains("google") && !self.value.is_empty()
    }
}

/// Persistent cookie jar at `~/.scholarcrawl_cookies.json` by default.
pub struct CookieManager {
    path: PathBuf,
}

impl CookieManager {
    /// Jar in the user's home directory.
    pub fn new() -> Result<Self> {
        let path = dirs::home_dir()
            .map(|home| home.join(COOKIE_FILE))
            .ok_or_else(|| CrawlError::Config("Cannot determine home directory".to_string()))?;
        Ok(Self { path })
    }

    pub fn with_path(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Cookies in the jar. A missing or unreadable jar is empty; the crawl
    /// can still run, Scholar just challenges it sooner.
    pub fn load(&self) -> Vec<Cookie> {
        if !self.path.exists() {
            debug!("Cookie jar not found: {:?}", self.path);
            return Vec::new();
        }

        match read_jar(&self.path) {
            Ok(cookies) => {
                info!(cookies = cookies.len(), "Loaded cookie jar from {:?}", self.path);
                cookies
            }
            Err(e) => {
                warn!(error = %e, "Ignoring unreadable cookie jar {:?}", self.path);
                Vec::new()
            }
        }
    }

    /// Replace the jar with `cookies`.
    pub fn save(&self, cookies: &[Cookie]) -> Result<()> {
        fs::write(&self.path, serde_json::to_string_pretty(cookies)?)?;
        info!(cookies = cookies.len(), "Saved cookie jar to {:?}", self.path);
        Ok(())
    }

    /// Replace the jar with the Google cookies of a browser export.
    ///
    /// Returns the number kept. An export without any is rejected and the
    /// current jar is left alone.
    pub fn import(&self, export: &Path) -> Result<usize> {
        let exported = read_jar(export)?;
        let total = exported.len();
        let kept: Vec<Cookie> = exported.into_iter().filter(Cookie::is_google).collect();

        if kept.is_empty() {
            return Err(CrawlError::Config(format!(
                "{:?} holds no Google cookies ({} others)",
                export, total
            )));
        }
        if kept.len() < total {
            debug!(dropped = total - kept.len(), "Dropped non-Google cookies");
        }

        self.save(&kept)?;
        Ok(kept.len())
    }

    pub fn clear(&self) -> Result<()> {
        if self.path.exists() {
            fs::remove_file(&self.path)?;
            info!("Cleared cookie jar at {:?}", self.path);
        }
        Ok(())
    }
}

fn read_jar(path: &Path) -> Result<Vec<Cookie>> {
    Ok(serde_json::from_str(&fs::read_to_string(path)?)?)
}
