use std::collections::HashMap;

use flowline_auth::verify_hmac_sha256;
use flowline_store::{Business, Store};
use serde::Deserialize;

use crate::adapter::WebhookAdapter;
use crate::error::{ChannelError, Result};
use crate::types::NormalizedEvent;

pub struct MessengerAdapter;

/// Minimal slice of the Messenger `Send API` webhook envelope — only the
/// fields the core reads; the rest of the wire shape is treated as an
/// external, pluggable concern.
#[derive(Debug, Deserialize)]
struct MessengerEnvelope {
    entry: Vec<MessengerEntry>,
}

#[derive(Debug, Deserialize)]
struct MessengerEntry {
    messaging: Vec<MessengerEvent>,
}

#[derive(Debug, Deserialize)]
struct MessengerEvent {
    sender: MessengerParty,
    recipient: MessengerParty,
    message: Option<MessengerMessage>,
}

#[derive(Debug, Deserialize)]
struct MessengerParty {
    id: String,
}

#[derive(Debug, Deserialize)]
struct MessengerMessage {
    text: Option<String>,
}

impl WebhookAdapter for MessengerAdapter {
    fn platform(&self) -> &'static str {
        "messenger"
    }

    fn verify(&self, secret: &str, body: &[u8], signature_header: Option<&str>) -> Result<()> {
        let header = signature_header.ok_or(ChannelError::MissingSignature)?;
        if verify_hmac_sha256(header, body, secret) {
            Ok(())
        } else {
            Err(ChannelError::SignatureMismatch)
        }
    }

    fn parse_event(&self, body: &[u8]) -> Result<NormalizedEvent> {
        let envelope: MessengerEnvelope =
            serde_json::from_slice(body).map_err(|e| ChannelError::MalformedPayload(e.to_string()))?;

        let event = envelope
            .entry
            .into_iter()
            .flat_map(|e| e.messaging)
            .find(|m| m.message.as_ref().and_then(|msg| msg.text.as_ref()).is_some())
            .ok_or_else(|| ChannelError::MalformedPayload("no text message in payload".to_string()))?;

        let text = event
            .message
            .and_then(|m| m.text)
            .ok_or_else(|| ChannelError::MalformedPayload("missing message text".to_string()))?;

        Ok(NormalizedEvent {
            recipient_platform_id: event.recipient.id,
            sender_platform_id: event.sender.id,
            text,
        })
    }

    fn resolve_business(&self, store: &Store, event: &NormalizedEvent) -> Result<Business> {
        // Messenger page IDs are registered as the business name; the exact
        // field a tenant's page id lives in is left to the operator.
        store
            .find_business_by_name(&event.recipient_platform_id)?
            .ok_or_else(|| ChannelError::UnknownRecipient(event.recipient_platform_id.clone()))
    }

    fn verification_challenge(&self, query: &HashMap<String, String>) -> Option<String> {
        query.get("hub.challenge").cloned()
    }

    fn build_reply_payload(&self, recipient_platform_id: &str, reply: &str) -> serde_json::Value {
        serde_json::json!({
            "recipient": { "id": recipient_platform_id },
            "message": { "text": reply },
        })
    }
}
