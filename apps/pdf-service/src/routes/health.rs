use axum::Json;
use serde_json::{json, Value};

/// GET /health
/// Liveness and warm-up check. No auth, no browser work.
pub async fn health_handler() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
