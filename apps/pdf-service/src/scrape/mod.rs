//! Public page → visible text.

pub mod handlers;

use std::time::Duration;

use tracing::{info, Instrument};
use url::Url;

use crate::browser::{BrowserEngine, BrowserError, SessionGuard};

/// Navigation bound; exceeding it is reported as a slow page.
pub const NAVIGATION_TIMEOUT: Duration = Duration::from_secs(30);

/// Cap on returned text, sized for the downstream model's input budget.
pub const MAX_TEXT_CHARS: usize = 12_000;

pub const USER_AGENT: &str = "Mozilla/5.0 (compatible; AI-checker-bot/1.0; +https://ai-checker.app)";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidUrl;

/// Accepts only absolute `http` / `https` URLs.
pub fn validate_url(raw: &str) -> Result<Url, InvalidUrl> {
    let url = Url::parse(raw.trim()).map_err(|_| InvalidUrl)?;
    match url.scheme() {
        "http" | "https" if url.has_host() => Ok(url),
        _ => Err(InvalidUrl),
    }
}

/// Keeps the first `max_chars` characters.
pub fn truncate_chars(mut text: String, max_chars: usize) -> String {
    if let Some((cut, _)) = text.char_indices().nth(max_chars) {
        text.truncate(cut);
    }
    text
}

#[derive(Debug, Clone, Copy)]
pub struct ScrapeLimits {
    pub navigation_timeout: Duration,
    /// Bound on all session work, navigation included.
    pub deadline: Duration,
    pub max_chars: usize,
}

impl ScrapeLimits {
    pub fn with_deadline(deadline: Duration) -> Self {
        Self {
            navigation_timeout: NAVIGATION_TIMEOUT,
            deadline,
            max_chars: MAX_TEXT_CHARS,
        }
    }
}

/// Navigates to `url` in a fresh session and returns its visible text.
/// The session is released whatever the outcome.
pub async fn scrape_page(
    engine: &dyn BrowserEngine,
    url: &Url,
    limits: ScrapeLimits,
) -> Result<String, BrowserError> {
    let mut session = SessionGuard::acquire(engine).await?;
    let span = tracing::info_span!("scrape", session_id = %session.id(), url = %url);

    let work = async {
        session.set_user_agent(USER_AGENT).await?;
        match tokio::time::timeout(limits.navigation_timeout, session.navigate(url)).await {
            Ok(navigated) => navigated?,
            Err(_) => return Err(BrowserError::Timeout(limits.navigation_timeout)),
        }
        session.visible_text().await
    };

    let outcome = match tokio::time::timeout(limits.deadline, work)
        .instrument(span)
        .await
    {
        Ok(text) => text,
        Err(_) => Err(BrowserError::Timeout(limits.deadline)),
    };

    session.release().await;

    let text = truncate_chars(outcome?, limits.max_chars);
    info!(chars = text.chars().count(), "page scraped");
    Ok(text)
}
