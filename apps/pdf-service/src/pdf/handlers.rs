use axum::{
    body::Body,
    extract::{rejection::JsonRejection, State},
    http::{header, HeaderMap, StatusCode},
    response::Response,
    Json,
};
use serde::Deserialize;
use serde_json::Value;

use crate::auth::require_api_key;
use crate::errors::AppError;
use crate::pdf::generate_pdf;
use crate::state::AppState;

const HTML_REQUIRED: &str = "html field is required";
const GENERATION_FAILED: &str = "PDF generation failed";
const CONTENT_DISPOSITION: &str = "attachment; filename=\"resume.pdf\"";

/// Raw body as sent. `html` stays untyped so a wrong type is reported the
/// same way as a missing field.
#[derive(Debug, Deserialize)]
pub struct PdfRequestBody {
    #[serde(default)]
    pub html: Option<Value>,
}

/// Validated request.
#[derive(Debug)]
pub struct PdfRequest {
    pub html: String,
}

impl PdfRequest {
    pub fn from_body(body: Result<Json<PdfRequestBody>, JsonRejection>) -> Result<Self, AppError> {
        match body {
            Ok(Json(PdfRequestBody {
                html: Some(Value::String(html)),
            })) if !html.is_empty() => Ok(PdfRequest { html }),
            Err(rejection) if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE => {
                Err(AppError::PayloadTooLarge)
            }
            _ => Err(AppError::Validation(HTML_REQUIRED.to_string())),
        }
    }
}

/// POST /pdf
pub async fn handle_pdf(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<PdfRequestBody>, JsonRejection>,
) -> Result<Response, AppError> {
    require_api_key(&state.config, &headers)?;
    let req = PdfRequest::from_body(body)?;

    let pdf = generate_pdf(state.engine.as_ref(), &req.html, state.config.request_timeout)
        .await
        .map_err(|e| AppError::Generation {
            message: GENERATION_FAILED,
            cause: e.to_string(),
        })?;

    let response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/pdf")
        .header(header::CONTENT_DISPOSITION, CONTENT_DISPOSITION)
        .body(Body::from(pdf))
        .map_err(|e| AppError::Internal(e.into()))?;
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn body(value: Value) -> Result<Json<PdfRequestBody>, JsonRejection> {
        Ok(Json(serde_json::from_value(value).unwrap()))
    }

    #[test]
    fn test_valid_html_accepted() {
        let req = PdfRequest::from_body(body(json!({ "html": "<p>hi</p>" }))).unwrap();
        assert_eq!(req.html, "<p>hi</p>");
    }

    #[test]
    fn test_missing_html_rejected() {
        let err = PdfRequest::from_body(body(json!({}))).unwrap_err();
        assert!(matches!(err, AppError::Validation(msg) if msg == HTML_REQUIRED));
    }

    #[test]
    fn test_non_string_html_rejected() {
        for value in [json!({ "html": 42 }), json!({ "html": null }), json!({ "html": ["<p>"] })] {
            assert!(PdfRequest::from_body(body(value)).is_err());
        }
    }

    #[test]
    fn test_empty_html_rejected() {
        assert!(PdfRequest::from_body(body(json!({ "html": "" }))).is_err());
    }
}
