//! Chromium backend driven over the DevTools protocol via `chromiumoxide`.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::SetUserAgentOverrideParams;
use chromiumoxide::cdp::browser_protocol::page::PrintToPdfParams;
use chromiumoxide::error::CdpError;
use chromiumoxide::Page;
use futures::StreamExt;
use tempfile::TempDir;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use url::Url;

use super::network_idle::{NetworkIdleWatcher, QUIET_WINDOW};
use super::{BrowserEngine, BrowserError, BrowserSession, CONTAINER_FLAGS};

/// A4 in inches, the unit `Page.printToPDF` expects.
const A4_WIDTH_IN: f64 = 8.27;
const A4_HEIGHT_IN: f64 = 11.69;

/// Upper bound for a single DevTools command. Overall request deadlines are
/// enforced by the callers.
const CDP_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const LAUNCH_TIMEOUT: Duration = Duration::from_secs(20);
/// How long a browser that acknowledged `Browser.close` gets to exit.
const EXIT_GRACE: Duration = Duration::from_secs(5);

const BODY_TEXT_JS: &str = "document.body ? document.body.innerText : ''";

#[derive(Debug, Clone, Default)]
pub struct LaunchOptions {
    /// Chromium executable; auto-detected when `None`.
    pub executable: Option<PathBuf>,
    /// Extra command line flags on top of `CONTAINER_FLAGS`.
    pub extra_args: Vec<String>,
}

/// Launches one Chromium process per session.
#[derive(Debug, Clone, Default)]
pub struct ChromiumEngine {
    options: LaunchOptions,
}

impl ChromiumEngine {
    pub fn new(options: LaunchOptions) -> Self {
        Self { options }
    }

    fn browser_config(&self, profile_dir: &TempDir) -> Result<BrowserConfig, BrowserError> {
        // no_sandbox() covers --no-sandbox and --disable-setuid-sandbox
        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .user_data_dir(profile_dir.path())
            .request_timeout(CDP_REQUEST_TIMEOUT)
            .launch_timeout(LAUNCH_TIMEOUT);

        for flag in CONTAINER_FLAGS
            .iter()
            .filter(|f| !matches!(**f, "--no-sandbox" | "--disable-setuid-sandbox"))
        {
            builder = builder.arg(*flag);
        }
        for flag in &self.options.extra_args {
            builder = builder.arg(flag.as_str());
        }
        if let Some(path) = &self.options.executable {
            builder = builder.chrome_executable(path);
        }

        builder.build().map_err(BrowserError::Launch)
    }
}

#[async_trait]
impl BrowserEngine for ChromiumEngine {
    async fn launch(&self) -> Result<Box<dyn BrowserSession>, BrowserError> {
        // Concurrent sessions must not share a profile directory.
        let profile_dir = tempfile::Builder::new()
            .prefix("pdf-service-chromium-")
            .tempdir()
            .map_err(|e| BrowserError::Launch(format!("profile dir: {e}")))?;

        let config = self.browser_config(&profile_dir)?;
        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| BrowserError::Launch(e.to_string()))?;

        // drive the DevTools connection for as long as the session lives
        let event_loop = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("browser event loop error: {e}");
                }
            }
        });

        Ok(Box::new(ChromiumSession {
            browser: Some(browser),
            page: None,
            event_loop,
            _profile_dir: profile_dir,
        }))
    }
}

pub struct ChromiumSession {
    browser: Option<Browser>,
    page: Option<Page>,
    event_loop: JoinHandle<()>,
    /// Removed from disk when the session is dropped.
    _profile_dir: TempDir,
}

impl ChromiumSession {
    /// The session's single page, opened on first use.
    async fn page(&mut self) -> Result<Page, BrowserError> {
        if let Some(page) = &self.page {
            return Ok(page.clone());
        }
        let browser = self
            .browser
            .as_ref()
            .ok_or_else(|| BrowserError::Protocol("session already closed".into()))?;
        let page = browser.new_page("about:blank").await.map_err(map_cdp_error)?;
        self.page = Some(page.clone());
        Ok(page)
    }
}

#[async_trait]
impl BrowserSession for ChromiumSession {
    async fn render_pdf(&mut self, html: &str) -> Result<Vec<u8>, BrowserError> {
        let page = self.page().await?;
        let mut watcher = NetworkIdleWatcher::subscribe(&page)
            .await
            .map_err(map_cdp_error)?;

        page.set_content(html).await.map_err(map_cdp_error)?;
        watcher.wait_for_idle(0, QUIET_WINDOW).await;

        let params = PrintToPdfParams {
            paper_width: Some(A4_WIDTH_IN),
            paper_height: Some(A4_HEIGHT_IN),
            print_background: Some(true),
            margin_top: Some(0.0),
            margin_bottom: Some(0.0),
            margin_left: Some(0.0),
            margin_right: Some(0.0),
            ..Default::default()
        };
        page.pdf(params).await.map_err(map_cdp_error)
    }

    async fn set_user_agent(&mut self, user_agent: &str) -> Result<(), BrowserError> {
        let page = self.page().await?;
        page.execute(SetUserAgentOverrideParams::new(user_agent))
            .await
            .map_err(map_cdp_error)?;
        Ok(())
    }

    async fn navigate(&mut self, url: &Url) -> Result<(), BrowserError> {
        let page = self.page().await?;
        let mut watcher = NetworkIdleWatcher::subscribe(&page)
            .await
            .map_err(map_cdp_error)?;

        page.goto(url.as_str()).await.map_err(map_cdp_error)?;
        watcher.wait_for_idle(1, QUIET_WINDOW).await;
        Ok(())
    }

    async fn visible_text(&mut self) -> Result<String, BrowserError> {
        let page = self.page().await?;
        page.evaluate(BODY_TEXT_JS)
            .await
            .map_err(map_cdp_error)?
            .into_value::<String>()
            .map_err(|e| BrowserError::InvalidOutput(format!("page text: {e}")))
    }

    async fn close(&mut self) -> Result<(), BrowserError> {
        self.page = None;
        let Some(mut browser) = self.browser.take() else {
            return Ok(());
        };

        let outcome = match browser.close().await {
            Ok(_) => {
                reap(&mut browser, EXIT_GRACE).await;
                Ok(())
            }
            Err(e) => {
                warn!("graceful browser close failed, killing process: {e}");
                kill_logged(&mut browser).await;
                Err(map_cdp_error(e))
            }
        };
        self.event_loop.abort();
        outcome
    }
}

impl Drop for ChromiumSession {
    fn drop(&mut self) {
        self.event_loop.abort();
    }
}

/// The exit/kill half of a browser process, split out so the reaping policy
/// can be exercised without Chromium.
#[async_trait]
trait BrowserProcess: Send {
    async fn wait_exit(&mut self) -> io::Result<()>;
    async fn kill(&mut self) -> Option<io::Result<()>>;
}

#[async_trait]
impl BrowserProcess for Browser {
    async fn wait_exit(&mut self) -> io::Result<()> {
        self.wait().await.map(|_| ())
    }

    async fn kill(&mut self) -> Option<io::Result<()>> {
        Browser::kill(self).await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Reaped {
    Exited,
    Killed,
}

/// Waits up to `grace` for the process to exit, then kills it.
async fn reap<P: BrowserProcess + ?Sized>(process: &mut P, grace: Duration) -> Reaped {
    let waited = tokio::time::timeout(grace, process.wait_exit()).await;
    match waited {
        Ok(Ok(())) => Reaped::Exited,
        Ok(Err(e)) => {
            warn!("waiting for browser exit failed, killing process: {e}");
            kill_logged(process).await
        }
        Err(_) => {
            warn!("browser did not exit within {grace:?}, killing process");
            kill_logged(process).await
        }
    }
}

async fn kill_logged<P: BrowserProcess + ?Sized>(process: &mut P) -> Reaped {
    if let Some(Err(e)) = process.kill().await {
        warn!("killing browser failed: {e}");
    }
    Reaped::Killed
}

/// Maps DevTools failures onto the engine-neutral taxonomy. Chromium reports
/// network failures as `net::ERR_*` error text on navigation.
pub(crate) fn map_cdp_error(err: CdpError) -> BrowserError {
    match err {
        CdpError::Timeout => BrowserError::Timeout(CDP_REQUEST_TIMEOUT),
        other => classify_message(other.to_string()),
    }
}

fn classify_message(message: String) -> BrowserError {
    if message.contains("net::ERR_") {
        BrowserError::Unreachable(message)
    } else if message.to_ascii_lowercase().contains("timeout") {
        BrowserError::Timeout(CDP_REQUEST_TIMEOUT)
    } else {
        BrowserError::Protocol(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_net_errors_are_unreachable() {
        let err = classify_message("net::ERR_NAME_NOT_RESOLVED".to_string());
        assert!(matches!(err, BrowserError::Unreachable(_)));
    }

    #[test]
    fn test_timeout_text_is_timeout() {
        let err = classify_message("Navigation Timeout Exceeded".to_string());
        assert!(matches!(err, BrowserError::Timeout(_)));
    }

    #[test]
    fn test_other_errors_are_protocol() {
        let err = classify_message("Target closed".to_string());
        assert!(matches!(err, BrowserError::Protocol(_)));
    }

    #[test]
    fn test_cdp_timeout_variant() {
        assert!(matches!(
            map_cdp_error(CdpError::Timeout),
            BrowserError::Timeout(_)
        ));
    }

    struct StubProcess {
        hang: bool,
        kills: usize,
    }

    #[async_trait]
    impl BrowserProcess for StubProcess {
        async fn wait_exit(&mut self) -> io::Result<()> {
            if self.hang {
                std::future::pending::<()>().await;
            }
            Ok(())
        }

        async fn kill(&mut self) -> Option<io::Result<()>> {
            self.kills += 1;
            Some(Ok(()))
        }
    }

    #[tokio::test]
    async fn test_reap_prompt_exit_does_not_kill() {
        let mut process = StubProcess { hang: false, kills: 0 };
        assert_eq!(reap(&mut process, EXIT_GRACE).await, Reaped::Exited);
        assert_eq!(process.kills, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reap_kills_process_that_never_exits() {
        let mut process = StubProcess { hang: true, kills: 0 };
        let start = tokio::time::Instant::now();
        assert_eq!(reap(&mut process, EXIT_GRACE).await, Reaped::Killed);
        assert_eq!(process.kills, 1);
        assert!(start.elapsed() >= EXIT_GRACE);
    }

    #[test]
    fn test_config_builds_with_overrides() {
        let engine = ChromiumEngine::new(LaunchOptions {
            executable: Some(PathBuf::from("/opt/chromium/chrome")),
            extra_args: vec!["--lang=en-US".to_string()],
        });
        let dir = tempfile::tempdir().unwrap();
        assert!(engine.browser_config(&dir).is_ok());
    }
}
