use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};

const DEFAULT_PORT: u16 = 3001;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;

/// Service configuration loaded from environment variables.
/// Startup fails if `PDF_SERVICE_SECRET` is missing.
#[derive(Debug, Clone)]
pub struct Config {
    /// Shared secret expected in the `x-api-key` header.
    pub api_secret: String,
    pub port: u16,
    /// Overrides Chromium auto-detection when set.
    pub browser_executable: Option<PathBuf>,
    /// Extra Chromium flags, whitespace separated in `BROWSER_EXTRA_ARGS`.
    pub browser_extra_args: Vec<String>,
    /// Upper bound on all browser work done for a single request.
    pub request_timeout: Duration,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_secret = match lookup("PDF_SERVICE_SECRET") {
            Some(secret) if !secret.is_empty() => secret,
            _ => bail!("Required environment variable 'PDF_SERVICE_SECRET' is not set"),
        };

        let port = match lookup("PORT").filter(|p| !p.is_empty()) {
            Some(raw) => raw
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            None => DEFAULT_PORT,
        };

        let request_timeout_secs = match lookup("REQUEST_TIMEOUT_SECS").filter(|t| !t.is_empty()) {
            Some(raw) => raw
                .parse::<u64>()
                .context("REQUEST_TIMEOUT_SECS must be a whole number of seconds")?,
            None => DEFAULT_REQUEST_TIMEOUT_SECS,
        };
        if request_timeout_secs == 0 {
            bail!("REQUEST_TIMEOUT_SECS must be greater than zero");
        }

        Ok(Config {
            api_secret,
            port,
            browser_executable: lookup("BROWSER_EXECUTABLE_PATH")
                .filter(|path| !path.is_empty())
                .map(PathBuf::from),
            browser_extra_args: lookup("BROWSER_EXTRA_ARGS")
                .map(|raw| raw.split_whitespace().map(str::to_string).collect())
                .unwrap_or_default(),
            request_timeout: Duration::from_secs(request_timeout_secs),
            rust_log: lookup("RUST_LOG").unwrap_or_else(|| "info".to_string()),
        })
    }
}
