//! Exposition server.
//!
//! Serves the metrics endpoint, where every request triggers exactly one
//! scrape cycle, and redirects every other path to it.

use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use tokio::net::TcpListener;
use tower_http::trace::{DefaultMakeSpan, TraceLayer};
use tracing::{debug, error};

use crate::core::{aggregator::Aggregator, metrics::CONTENT_TYPE};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub aggregator: Aggregator,
    pub metrics_path: Arc<str>,
}

impl AppState {
    pub fn new(aggregator: Aggregator, metrics_path: &str) -> Self {
        Self {
            aggregator,
            metrics_path: Arc::from(metrics_path),
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    let metrics_path = state.metrics_path.to_string();
    Router::new()
        .route(&metrics_path, get(metrics_handler))
        .fallback(redirect_handler)
        .layer(TraceLayer::new_for_http().make_span_with(DefaultMakeSpan::new()))
        .with_state(state)
}

/// Runs one scrape and encodes it. Collector failures only show up in the
/// scrape duration metric; the response is 200 regardless.
async fn metrics_handler(State(state): State<AppState>) -> Response {
    let scrape = state.aggregator.run_scrape_cycle().await;
    debug!(
        "Serving {} samples from {} collectors",
        scrape.samples.len(),
        scrape.outcomes.len()
    );

    match state.aggregator.metrics().render(&scrape.samples) {
        Ok(body) => ([(header::CONTENT_TYPE, CONTENT_TYPE)], body).into_response(),
        Err(e) => {
            error!("Failed to encode metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to encode metrics: {}", e),
            )
                .into_response()
        }
    }
}

async fn redirect_handler(State(state): State<AppState>) -> Response {
    (
        StatusCode::MOVED_PERMANENTLY,
        [(header::LOCATION, state.metrics_path.to_string())],
    )
        .into_response()
}

/// Serves until Ctrl+C is received.
pub async fn serve(listener: TcpListener, state: AppState) -> std::io::Result<()> {
    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for Ctrl+C: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await
}
