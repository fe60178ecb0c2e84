use axum::Json;
use serde_json::{json, Value};

/// GET /health — liveness probe, no auth.
pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// GET /ping — minimal liveness probe for load balancers that just want a
/// 200 with no body parsing.
pub async fn ping() -> &'static str {
    "pong"
}
