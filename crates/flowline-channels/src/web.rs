//! First-party web chat "platform" — no external signature, called
//! directly via business-key-authenticated `POST /message` rather than the
//! generic `/webhooks/{platform}` route.

use std::collections::HashMap;

use flowline_store::{Business, Store};
use serde::Deserialize;

use crate::adapter::WebhookAdapter;
use crate::error::{ChannelError, Result};
use crate::types::NormalizedEvent;

pub struct WebAdapter;

#[derive(Debug, Deserialize)]
pub struct WebMessageBody {
    pub user_id: Option<String>,
    pub session_id: String,
    pub text: String,
}

impl WebhookAdapter for WebAdapter {
    fn platform(&self) -> &'static str {
        "web"
    }

    fn verify(&self, _secret: &str, _body: &[u8], _signature_header: Option<&str>) -> Result<()> {
        Ok(())
    }

    fn parse_event(&self, body: &[u8]) -> Result<NormalizedEvent> {
        let parsed: WebMessageBody =
            serde_json::from_slice(body).map_err(|e| ChannelError::MalformedPayload(e.to_string()))?;
        Ok(NormalizedEvent {
            recipient_platform_id: String::new(),
            sender_platform_id: parsed.user_id.unwrap_or_else(|| parsed.session_id.clone()),
            text: parsed.text,
        })
    }

    /// Not used: the gateway's `POST /message` handler resolves the
    /// business directly from `TenantContext`, not from the payload, since
    /// this channel authenticates with the business's own API key.
    fn resolve_business(&self, _store: &Store, _event: &NormalizedEvent) -> Result<Business> {
        Err(ChannelError::MalformedPayload(
            "web channel resolves the business from TenantContext, not the payload".to_string(),
        ))
    }

    fn verification_challenge(&self, _query: &HashMap<String, String>) -> Option<String> {
        None
    }

    fn build_reply_payload(&self, _recipient_platform_id: &str, reply: &str) -> serde_json::Value {
        serde_json::json!({ "text": reply })
    }
}
