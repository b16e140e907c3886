pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::pdf::handlers::handle_pdf;
use crate::scrape::handlers::handle_scrape;
use crate::state::AppState;

/// HTML documents may inline fonts and images.
const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        .route("/pdf", post(handle_pdf))
        .route("/scrape", post(handle_scrape))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(state)
}
