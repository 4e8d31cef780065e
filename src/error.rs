//! Error taxonomy for the scrape pipeline.
//!
//! Only page- and session-level failures live here; they are fatal for the
//! query that hit them. Card-level parse problems are recovered inside the
//! extractor, and teardown hiccups are absorbed by the session manager.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScrapeError {
    /// Chrome could not be launched or the fresh session could not be
    /// configured. No retry; the caller gets the failure as-is.
    #[error("browser session init failed: {0}")]
    SessionInit(String),

    /// A search page failed to load, scroll, or snapshot. A dead page is
    /// not the same thing as an empty one, so this never terminates
    /// pagination silently.
    #[error("navigation failed for {url}: {message}")]
    Navigation { url: String, message: String },

    /// Anything else that broke inside the pipeline or its worker.
    #[error("scrape failed: {0}")]
    Internal(String),
}

impl ScrapeError {
    pub fn navigation(url: &str, err: impl std::fmt::Display) -> Self {
        Self::Navigation {
            url: url.to_string(),
            message: err.to_string(),
        }
    }
}
