//! Headless browser access.
//!
//! The HTTP layer only sees the `BrowserEngine` / `BrowserSession` traits.
//! `ChromiumEngine` is the production backend; tests swap in a fake that
//! records launches and closes.
//!
//! `AppState` holds an `Arc<dyn BrowserEngine>`. Every request launches its
//! own session through `SessionGuard::acquire` and releases it before the
//! handler returns.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use url::Url;

pub mod chromium;
pub mod guard;
pub mod network_idle;

pub use chromium::{ChromiumEngine, LaunchOptions};
pub use guard::SessionGuard;

/// Flags required to run Chromium inside a container: no OS sandbox, no
/// `/dev/shm` backed shared memory, no GPU.
pub const CONTAINER_FLAGS: &[&str] = &[
    "--no-sandbox",
    "--disable-setuid-sandbox",
    "--disable-dev-shm-usage",
    "--disable-gpu",
];

#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("failed to launch browser: {0}")]
    Launch(String),

    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("host unreachable: {0}")]
    Unreachable(String),

    #[error("browser protocol error: {0}")]
    Protocol(String),

    #[error("unexpected browser output: {0}")]
    InvalidOutput(String),
}

/// Launches isolated browser sessions.
#[async_trait]
pub trait BrowserEngine: Send + Sync {
    async fn launch(&self) -> Result<Box<dyn BrowserSession>, BrowserError>;
}

/// One running browser process, owned by a single request.
#[async_trait]
pub trait BrowserSession: Send {
    /// Loads `html` as the document, waits for network quiescence and
    /// prints an A4 PDF with zero margins and backgrounds preserved.
    async fn render_pdf(&mut self, html: &str) -> Result<Vec<u8>, BrowserError>;

    async fn set_user_agent(&mut self, user_agent: &str) -> Result<(), BrowserError>;

    /// Navigates to `url` and waits until at most one request is in flight.
    /// Unbounded; callers apply their own deadline.
    async fn navigate(&mut self, url: &Url) -> Result<(), BrowserError>;

    /// The rendered page's `innerText`, or an empty string without a body.
    async fn visible_text(&mut self) -> Result<String, BrowserError>;

    /// Terminates the browser process. Must be idempotent.
    async fn close(&mut self) -> Result<(), BrowserError>;
}
