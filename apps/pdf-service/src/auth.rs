use axum::http::HeaderMap;
use subtle::ConstantTimeEq;

use crate::config::Config;
use crate::errors::AppError;

pub const API_KEY_HEADER: &str = "x-api-key";

/// Compares in constant time so the secret does not leak through timing.
/// A length mismatch still burns one comparison of the expected value.
fn secret_matches(expected: &[u8], provided: &[u8]) -> bool {
    if expected.len() != provided.len() {
        let _ = expected.ct_eq(expected);
        return false;
    }
    expected.ct_eq(provided).into()
}

/// Rejects the request unless `x-api-key` matches the configured secret.
/// Runs before body validation and before any browser work.
pub fn require_api_key(config: &Config, headers: &HeaderMap) -> Result<(), AppError> {
    let provided = headers
        .get(API_KEY_HEADER)
        .map(|v| v.as_bytes())
        .unwrap_or_default();

    if secret_matches(config.api_secret.as_bytes(), provided) {
        Ok(())
    } else {
        Err(AppError::Unauthorized)
    }
}
