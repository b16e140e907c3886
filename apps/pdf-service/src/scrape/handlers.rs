use axum::{
    extract::{rejection::JsonRejection, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use crate::auth::require_api_key;
use crate::browser::BrowserError;
use crate::errors::AppError;
use crate::scrape::{scrape_page, validate_url, ScrapeLimits};
use crate::state::AppState;

const URL_REQUIRED: &str = "url field is required";
const INVALID_URL: &str = "Invalid URL — must be a public http or https URL";
const TOO_SLOW: &str = "Page took too long to load. Try a different URL.";
const UNREACHABLE: &str = "Could not reach that URL. Check it is publicly accessible.";
const SCRAPE_FAILED: &str = "Failed to fetch page content";

#[derive(Debug, Deserialize)]
pub struct ScrapeRequestBody {
    #[serde(default)]
    pub url: Option<Value>,
}

#[derive(Debug)]
pub struct ScrapeRequest {
    pub url: Url,
}

impl ScrapeRequest {
    pub fn from_body(body: Result<Json<ScrapeRequestBody>, JsonRejection>) -> Result<Self, AppError> {
        let raw = match body {
            Ok(Json(ScrapeRequestBody {
                url: Some(Value::String(raw)),
            })) if !raw.is_empty() => raw,
            Err(rejection) if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE => {
                return Err(AppError::PayloadTooLarge)
            }
            _ => return Err(AppError::Validation(URL_REQUIRED.to_string())),
        };
        let url = validate_url(&raw).map_err(|_| AppError::Validation(INVALID_URL.to_string()))?;
        Ok(ScrapeRequest { url })
    }
}

#[derive(Debug, Serialize)]
pub struct ScrapeResponse {
    pub text: String,
}

/// POST /scrape
pub async fn handle_scrape(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<ScrapeRequestBody>, JsonRejection>,
) -> Result<Json<ScrapeResponse>, AppError> {
    require_api_key(&state.config, &headers)?;
    let req = ScrapeRequest::from_body(body)?;

    let limits = ScrapeLimits::with_deadline(state.config.request_timeout);
    let text = scrape_page(state.engine.as_ref(), &req.url, limits)
        .await
        .map_err(scrape_error)?;

    Ok(Json(ScrapeResponse { text }))
}

fn scrape_error(err: BrowserError) -> AppError {
    match err {
        BrowserError::Timeout(_) => AppError::Timeout(TOO_SLOW.to_string()),
        BrowserError::Unreachable(cause) => {
            tracing::warn!("scrape target unreachable: {cause}");
            AppError::Unreachable(UNREACHABLE.to_string())
        }
        other => AppError::Generation {
            message: SCRAPE_FAILED,
            cause: other.to_string(),
        },
    }
}
