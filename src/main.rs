mod api;
mod browser;
mod crawler;
mod dispatch;
mod error;
mod extract;
mod stealth;

use axum::{routing::get, Router};
use dotenv::dotenv;
use std::env;
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::dispatch::Dispatcher;

#[derive(OpenApi)]
#[openapi(
    paths(api::search_products),
    components(schemas(crawler::SearchResult, extract::ProductRecord)),
    tags(
        (name = "search", description = "Product Search API")
    )
)]
struct ApiDoc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    tracing_subscriber::fmt::init();

    let state = Arc::new(api::AppState {
        dispatcher: Dispatcher::default(),
    });

    let app = Router::new()
        .merge(SwaggerUi::new("/swagger").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/search", get(api::search_products))
        .with_state(state);

    let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port = env::var("PORT").unwrap_or_else(|_| "8000".to_string());

    let listener = tokio::net::TcpListener::bind(format!("{host}:{port}")).await?;
    println!("Listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
