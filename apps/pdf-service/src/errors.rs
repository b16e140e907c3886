use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Unauthorized")]
    Unauthorized,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Request body too large")]
    PayloadTooLarge,

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Unreachable: {0}")]
    Unreachable(String),

    /// Browser-side failure. The public message is fixed per endpoint; the
    /// cause is only logged.
    #[error("{message}: {cause}")]
    Generation {
        message: &'static str,
        cause: String,
    },

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
            AppError::Validation(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg),
            AppError::PayloadTooLarge => (
                StatusCode::PAYLOAD_TOO_LARGE,
                "Request body exceeds the 10 MiB limit".to_string(),
            ),
            AppError::Timeout(msg) => (StatusCode::REQUEST_TIMEOUT, msg),
            AppError::Unreachable(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg),
            AppError::Generation { message, cause } => {
                tracing::error!("{message}: {cause}");
                (StatusCode::INTERNAL_SERVER_ERROR, message.to_string())
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An internal server error occurred".to_string(),
                )
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(err: AppError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_unauthorized_shape() {
        let (status, body) = body_json(AppError::Unauthorized).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body, json!({ "error": "Unauthorized" }));
    }

    #[tokio::test]
    async fn test_status_mapping() {
        let cases = [
            (AppError::Validation("bad".into()), StatusCode::UNPROCESSABLE_ENTITY),
            (AppError::PayloadTooLarge, StatusCode::PAYLOAD_TOO_LARGE),
            (AppError::Timeout("slow".into()), StatusCode::REQUEST_TIMEOUT),
            (AppError::Unreachable("gone".into()), StatusCode::UNPROCESSABLE_ENTITY),
        ];
        for (err, expected) in cases {
            let (status, _) = body_json(err).await;
            assert_eq!(status, expected);
        }
    }

    #[tokio::test]
    async fn test_generation_hides_cause() {
        let (status, body) = body_json(AppError::Generation {
            message: "PDF generation failed",
            cause: "chrome crashed at 0xdeadbeef".into(),
        })
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({ "error": "PDF generation failed" }));
    }
}
