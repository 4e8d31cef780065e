//! Search pipeline: pagination over rendered search pages.
//!
//! Drives the page loader and card extractor across increasing page numbers
//! until one of two independent stop conditions fires, then hands the
//! accumulated records back. The whole pipeline is synchronous and blocking;
//! the dispatch bridge keeps it off the service's event loop.

use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;

use crate::browser::BrowserSession;
use crate::error::ScrapeError;
use crate::extract::{self, ProductRecord};
use crate::stealth::StealthConfig;

/// Aggregate handed back to the caller: the original query plus records in
/// page order, then DOM order within a page. Duplicates across pages are
/// possible and accepted; no dedup is performed.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SearchResult {
    pub query: String,
    pub results: Vec<ProductRecord>,
}

/// Why pagination ended. Both variants are normal termination, not errors;
/// callers see an empty result either way, but the distinction matters for
/// logs and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// A page rendered zero product cards: the site ran out.
    PageExhausted,
    /// Cards kept rendering but nothing relevant has accumulated yet.
    NoRelevantResults,
}

#[derive(Debug)]
pub struct SearchOutcome {
    pub records: Vec<ProductRecord>,
    pub stop: StopReason,
}

/// Search URL for one page. Page 1 is the bare search URL; later pages carry
/// the site's pagination parameter.
pub fn search_url(query: &str, page: u32) -> String {
    let what = urlencoding::encode(query);
    if page == 1 {
        format!("{}/search/?what={what}", extract::BASE_URL)
    } else {
        format!("{}/search/?what={what}&PAGEN_1={page}", extract::BASE_URL)
    }
}

/// Walk search pages starting at 1, accumulating relevant records.
///
/// Per page: zero raw cards ends the walk (`PageExhausted`); otherwise the
/// post-filter records are appended, and if the accumulated total across all
/// pages so far is still empty the walk ends (`NoRelevantResults`). That
/// second check runs after every page, not just the first, but it can only
/// ever fire while no match has been seen, so a match-free middle page after
/// earlier hits does not stop the run. There is no upper page bound: a site
/// that serves relevant cards forever keeps this loop alive, which is a
/// deliberate trade-off rather than a capped one.
///
/// `load` is the page-loading seam; navigation failures propagate as fatal
/// for the whole query instead of masquerading as end-of-pagination.
pub fn paginate<F>(query: &str, mut load: F) -> Result<SearchOutcome, ScrapeError>
where
    F: FnMut(&str) -> Result<String, ScrapeError>,
{
    let mut records: Vec<ProductRecord> = Vec::new();
    let mut page: u32 = 1;

    loop {
        let url = search_url(query, page);
        let html = load(&url)?;
        let extraction = extract::extract_cards(&html, query);

        if extraction.raw_cards == 0 {
            info!("🔚 page {page}: no cards rendered, pagination exhausted");
            return Ok(SearchOutcome {
                records,
                stop: StopReason::PageExhausted,
            });
        }

        info!(
            "📄 page {page}: {} cards, {} relevant",
            extraction.raw_cards,
            extraction.records.len()
        );
        records.extend(extraction.records);

        if records.is_empty() {
            info!("🚫 no relevant products accumulated, stopping at page {page}");
            return Ok(SearchOutcome {
                records,
                stop: StopReason::NoRelevantResults,
            });
        }

        page += 1;
    }
}

/// Run one query end-to-end: open an exclusive browser session, paginate,
/// and tear the session down no matter how the walk ended.
pub fn search_products(query: &str) -> Result<SearchResult, ScrapeError> {
    info!("🔥 starting product search for {query:?}");

    let session = BrowserSession::open(&StealthConfig::default())?;
    let outcome = paginate(query, |url| session.load_page(url));
    // Unconditional teardown; a panic inside paginate still kills Chrome
    // when the session unwinds.
    session.close();

    let outcome = outcome?;
    info!(
        "✅ parsed {} products for {query:?} ({:?})",
        outcome.records.len(),
        outcome.stop
    );

    Ok(SearchResult {
        query: query.to_string(),
        results: outcome.records,
    })
}
