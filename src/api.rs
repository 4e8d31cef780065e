//! HTTP boundary for the scrape pipeline.
//!
//! One operation: `GET /search?query=…`. The handler submits the query to
//! the dispatch bridge and awaits the handle; it never blocks on browser
//! work itself. An empty-but-successful result is a 200 with an empty
//! `results` array, always distinguishable from a failure status.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use tracing::error;
use utoipa::IntoParams;

use crate::crawler::SearchResult;
use crate::dispatch::Dispatcher;
use crate::error::ScrapeError;

pub struct AppState {
    pub dispatcher: Dispatcher,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SearchParams {
    /// Search term; also the case-insensitive relevance filter on titles.
    pub query: String,
}

#[utoipa::path(
    get,
    path = "/search",
    tag = "search",
    params(SearchParams),
    responses(
        (status = 200, description = "Products matching the query (possibly none)", body = SearchResult),
        (status = 502, description = "The target site could not be reached"),
        (status = 503, description = "A browser session could not be launched"),
        (status = 500, description = "Internal scrape failure"),
    )
)]
pub async fn search_products(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResult>, (StatusCode, Json<serde_json::Value>)> {
    let handle = state.dispatcher.submit(params.query);

    match handle.wait().await {
        Ok(result) => Ok(Json(result)),
        Err(e) => {
            error!("❌ search failed: {e}");
            Err((
                status_for(&e),
                Json(serde_json::json!({ "error": e.to_string() })),
            ))
        }
    }
}

// Tagged error → status, so the boundary can say more than "500".
fn status_for(err: &ScrapeError) -> StatusCode {
    match err {
        ScrapeError::SessionInit(_) => StatusCode::SERVICE_UNAVAILABLE,
        ScrapeError::Navigation { .. } => StatusCode::BAD_GATEWAY,
        ScrapeError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
