use std::collections::HashMap;

use flowline_auth::verify_hmac_sha256;
use flowline_store::{Business, Store};
use serde::Deserialize;

use crate::adapter::WebhookAdapter;
use crate::error::{ChannelError, Result};
use crate::types::NormalizedEvent;

pub struct WhatsAppAdapter;

#[derive(Debug, Deserialize)]
struct WhatsAppEnvelope {
    entry: Vec<WhatsAppEntry>,
}

#[derive(Debug, Deserialize)]
struct WhatsAppEntry {
    changes: Vec<WhatsAppChange>,
}

#[derive(Debug, Deserialize)]
struct WhatsAppChange {
    value: WhatsAppValue,
}

#[derive(Debug, Deserialize)]
struct WhatsAppValue {
    metadata: WhatsAppMetadata,
    messages: Vec<WhatsAppMessage>,
}

#[derive(Debug, Deserialize)]
struct WhatsAppMetadata {
    display_phone_number: String,
}

#[derive(Debug, Deserialize)]
struct WhatsAppMessage {
    from: String,
    text: Option<WhatsAppText>,
}

#[derive(Debug, Deserialize)]
struct WhatsAppText {
    body: String,
}

impl WebhookAdapter for WhatsAppAdapter {
    fn platform(&self) -> &'static str {
        "whatsapp"
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
        let envelope: WhatsAppEnvelope =
            serde_json::from_slice(body).map_err(|e| ChannelError::MalformedPayload(e.to_string()))?;

        let change = envelope
            .entry
            .into_iter()
            .flat_map(|e| e.changes)
            .find(|c| !c.value.messages.is_empty())
            .ok_or_else(|| ChannelError::MalformedPayload("no messages in payload".to_string()))?;

        let recipient = change.value.metadata.display_phone_number;
        let message = change
            .value
            .messages
            .into_iter()
            .next()
            .ok_or_else(|| ChannelError::MalformedPayload("empty messages array".to_string()))?;
        let text = message
            .text
            .map(|t| t.body)
            .ok_or_else(|| ChannelError::MalformedPayload("message has no text body".to_string()))?;

        Ok(NormalizedEvent {
            recipient_platform_id: recipient,
            sender_platform_id: message.from,
            text,
        })
    }

    fn resolve_business(&self, store: &Store, event: &NormalizedEvent) -> Result<Business> {
        store
            .find_business_by_phone_number(&event.recipient_platform_id)?
            .ok_or_else(|| ChannelError::UnknownRecipient(event.recipient_platform_id.clone()))
    }

    fn verification_challenge(&self, query: &HashMap<String, String>) -> Option<String> {
        query.get("hub.challenge").cloned()
    }

    fn build_reply_payload(&self, recipient_platform_id: &str, reply: &str) -> serde_json::Value {
        serde_json::json!({
            "messaging_product": "whatsapp",
            "to": recipient_platform_id,
            "type": "text",
            "text": { "body": reply },
        })
    }
}
