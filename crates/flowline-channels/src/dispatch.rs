//! Ties a `WebhookAdapter` to the orchestrator: verify, parse, resolve the
//! business, resolve/create the sending user, hand off to
//! `MessageOrchestrator::handle`, and build the platform's reply payload.

use std::collections::HashMap;

use flowline_engine::{InboundMessage, MessageOrchestrator, Outcome};
use flowline_store::Store;
use once_cell::sync::Lazy;
use uuid::Uuid;

use crate::adapter::WebhookAdapter;
use crate::error::Result;

/// Fixed namespace for deriving a stable internal `UserId` from a platform
/// sender id, so the same Messenger/WhatsApp user always maps to the same
/// user record without a separate lookup table.
static PLATFORM_USER_NAMESPACE: Lazy<Uuid> =
    Lazy::new(|| Uuid::parse_str("5f3a6c9e-6b1f-4e2a-9b3d-2a7c6e8f1a4b").expect("valid namespace uuid"));

fn derive_user_id(business_id: &flowline_core::ids::BusinessId, platform: &str, sender_platform_id: &str) -> flowline_core::ids::UserId {
    let name = format!("{business_id}:{platform}:{sender_platform_id}");
    Uuid::new_v5(&PLATFORM_USER_NAMESPACE, name.as_bytes()).into()
}

/// Outcome of a webhook dispatch, including the payload the deployment's own
/// outbound client should send back through the platform's Send API.
pub struct DispatchResult {
    pub outcome: Outcome,
    pub reply_payload: Option<serde_json::Value>,
}

pub async fn dispatch_webhook(
    adapter: &dyn WebhookAdapter,
    store: &Store,
    orchestrator: &MessageOrchestrator,
    secret: &str,
    body: &[u8],
    signature_header: Option<&str>,
) -> Result<DispatchResult> {
    adapter.verify(secret, body, signature_header)?;
    let event = adapter.parse_event(body)?;
    let business = adapter.resolve_business(store, &event)?;

    let user_id = derive_user_id(&business.business_id, adapter.platform(), &event.sender_platform_id);
    store.get_or_create_user(&user_id)?;

    let mut inbound = InboundMessage::new(business.business_id, user_id, event.sender_platform_id.clone(), event.text);
    inbound.sender_type = flowline_store::SenderType::User;

    let outcome = orchestrator.handle(inbound).await?;

    let reply_payload = match &outcome {
        Outcome::Replied { reply, .. } => Some(adapter.build_reply_payload(&event.sender_platform_id, reply)),
        Outcome::Paused { .. } => None,
    };

    Ok(DispatchResult { outcome, reply_payload })
}

/// Handles the platform's `GET` subscription-verification challenge.
pub fn handle_challenge(adapter: &dyn WebhookAdapter, query: &HashMap<String, String>) -> Option<String> {
    adapter.verification_challenge(query)
}
