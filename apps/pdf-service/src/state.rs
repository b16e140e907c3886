use std::sync::Arc;

use crate::browser::BrowserEngine;
use crate::config::Config;

/// Shared application state injected into all route handlers via Axum extractors.
/// Immutable; each request launches its own browser session through `engine`.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    /// Pluggable browser backend. Default: ChromiumEngine.
    pub engine: Arc<dyn BrowserEngine>,
}
