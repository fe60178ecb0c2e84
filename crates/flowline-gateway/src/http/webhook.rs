use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use flowline_channels::{dispatch_webhook, handle_challenge, MessengerAdapter, WebhookAdapter, WhatsAppAdapter};
use flowline_core::FlowlineError;

use crate::app::AppState;

/// Resolves the configured shared secret and adapter for a `{platform}`
/// path segment. Unknown platforms are rejected as `NotFound` rather than
/// `Unauthorized`, since there is no signature to even attempt to verify.
fn adapter_and_secret(state: &AppState, platform: &str) -> Result<(Box<dyn WebhookAdapter>, String), FlowlineError> {
    match platform {
        "facebook" | "messenger" => {
            let secret = state
                .config
                .platforms
                .facebook_secret
                .clone()
                .ok_or_else(|| FlowlineError::NotFound("no facebook webhook secret configured".to_string()))?;
            Ok((Box::new(MessengerAdapter), secret))
        }
        "whatsapp" => {
            let secret = state
                .config
                .platforms
                .whatsapp_secret
                .clone()
                .ok_or_else(|| FlowlineError::NotFound("no whatsapp webhook secret configured".to_string()))?;
            Ok((Box::new(WhatsAppAdapter), secret))
        }
        other => Err(FlowlineError::NotFound(format!("unknown platform '{other}'"))),
    }
}

/// GET /webhooks/{platform} — the platform's subscription-verification
/// challenge. No signature is involved; the platform proves itself with a
/// shared `hub.verify_token` (left to the deployment's own reverse-proxy
/// config) and expects the `hub.challenge` value echoed back.
pub async fn verify_challenge(
    State(state): State<Arc<AppState>>,
    Path(platform): Path<String>,
    Query(query): Query<HashMap<String, String>>,
) -> Result<String, FlowlineError> {
    let (adapter, _secret) = adapter_and_secret(&state, &platform)?;
    handle_challenge(adapter.as_ref(), &query)
        .ok_or_else(|| FlowlineError::InvalidRequest("missing hub.challenge".to_string()))
}

/// POST /webhooks/{platform} — verifies the HMAC signature **before**
/// anything else touches the body, then hands off to
/// `flowline_channels::dispatch_webhook`.
pub async fn receive_webhook(
    State(state): State<Arc<AppState>>,
    Path(platform): Path<String>,
    headers: HeaderMap,
    body: axum::body::Bytes,
) -> Result<axum::Json<serde_json::Value>, FlowlineError> {
    let (adapter, secret) = adapter_and_secret(&state, &platform)?;
    let signature = headers
        .get("x-hub-signature-256")
        .or_else(|| headers.get("x-signature-256"))
        .and_then(|v| v.to_str().ok());

    let result = dispatch_webhook(adapter.as_ref(), &state.store, &state.orchestrator, &secret, &body, signature).await?;

    Ok(axum::Json(serde_json::json!({
        "ok": true,
        "reply": result.reply_payload,
    })))
}
