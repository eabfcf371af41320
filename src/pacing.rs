//! Jittered delays between navigations.
//!
//! Scholar rate-limits automated traffic informally; every page load, page
//! turn and reveal click is followed by a pause drawn uniformly from a
//! bounded range.

use crate::error::{CrawlError, Result};
use rand::Rng;
use std::time::Duration;
use tracing::trace;

/// Default lower bound of the pause, in milliseconds
pub const DEFAULT_MIN_DELAY_MS: u64 = 2000;

/// Default upper bound of the pause, in milliseconds
pub const DEFAULT_MAX_DELAY_MS: u64 = 4000;

/// Bounded jitter range for post-navigation pauses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacing {
    min_ms: u64,
    max_ms: u64,
}

impl Pacing {
    pub fn new(min_ms: u64, max_ms: u64) -> Result<Self> {
        if min_ms > max_ms {
            return Err(CrawlError::Config(format!(
                "delay range is empty: {}ms > {}ms",
                min_ms, max_ms
            )));
        }
        Ok(Self { min_ms, max_ms })
    }

    /// No pauses at all. Only meant for scripted sites.
    pub fn none() -> Self {
        Self { min_ms: 0, max_ms: 0 }
    }

    /// Draw the next pause length.
    pub fn next_delay(&self) -> Duration {
        let ms = if self.min_ms == self.max_ms {
            self.min_ms
        } else {
            rand::thread_rng().gen_range(self.min_ms..=self.max_ms)
        };
        Duration::from_millis(ms)
    }

    /// Suspend for a jittered delay.
    pub async fn pause(&self) {
        let delay = self.next_delay();
        if delay.is_zero() {
            return;
        }
        trace!(delay_ms = delay.as_millis() as u64, "Pausing");
        tokio::time::sleep(delay).await;
    }
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            min_ms: DEFAULT_MIN_DELAY_MS,
            max_ms: DEFAULT_MAX_DELAY_MS,
        }
    }
}
