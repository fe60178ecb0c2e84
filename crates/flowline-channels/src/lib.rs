pub mod adapter;
pub mod dispatch;
pub mod error;
pub mod messenger;
pub mod types;
pub mod web;
pub mod whatsapp;

pub use adapter::WebhookAdapter;
pub use dispatch::{dispatch_webhook, handle_challenge, DispatchResult};
pub use error::{ChannelError, Result};
pub use messenger::MessengerAdapter;
pub use types::NormalizedEvent;
pub use web::{WebAdapter, WebMessageBody};
pub use whatsapp::WhatsAppAdapter;

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;
    use flowline_core::ids::{BusinessId, TemplateId, UserId};
    use flowline_engine::{MessageOrchestrator, OrchestratorConfig};
    use flowline_llm::MockLlmClient;
    use flowline_store::{Business, Stage, Store, Template, TemplateType};
    use flowline_template::VariableRegistry;
    use hmac::{Hmac, Mac};
    use sha2::Sha256;

    use super::*;

    fn sign(secret: &str, body: &[u8]) -> String {
        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(body);
        format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
    }

    #[test]
    fn messenger_verifies_correct_signature() {
        let adapter = MessengerAdapter;
        let body = br#"{"entry":[]}"#;
        let sig = sign("shh", body);
        assert!(adapter.verify("shh", body, Some(&sig)).is_ok());
    }

    #[test]
    fn messenger_rejects_tampered_body() {
        let adapter = MessengerAdapter;
        let sig = sign("shh", br#"{"entry":[]}"#);
        assert!(adapter.verify("shh", br#"{"entry":[1]}"#, Some(&sig)).is_err());
    }

    #[test]
    fn messenger_parses_sender_recipient_and_text() {
        let adapter = MessengerAdapter;
        let body = br#"{
            "entry": [{
                "messaging": [{
                    "sender": {"id": "user-1"},
                    "recipient": {"id": "page-1"},
                    "message": {"text": "hello there"}
                }]
            }]
        }"#;
        let event = adapter.parse_event(body).unwrap();
        assert_eq!(event.sender_platform_id, "user-1");
        assert_eq!(event.recipient_platform_id, "page-1");
        assert_eq!(event.text, "hello there");
    }

    #[test]
    fn whatsapp_parses_sender_recipient_and_text() {
        let adapter = WhatsAppAdapter;
        let body = br#"{
            "entry": [{
                "changes": [{
                    "value": {
                        "metadata": {"display_phone_number": "15550001111"},
                        "messages": [{"from": "15559998888", "text": {"body": "hi"}}]
                    }
                }]
            }]
        }"#;
        let event = adapter.parse_event(body).unwrap();
        assert_eq!(event.sender_platform_id, "15559998888");
        assert_eq!(event.recipient_platform_id, "15550001111");
        assert_eq!(event.text, "hi");
    }

    #[test]
    fn web_adapter_falls_back_to_session_id_when_no_user_id() {
        let adapter = WebAdapter;
        let body = br#"{"session_id": "sess-1", "text": "hey"}"#;
        let event = adapter.parse_event(body).unwrap();
        assert_eq!(event.sender_platform_id, "sess-1");
    }

    fn make_template(store: &Store, business_id: &BusinessId, ty: TemplateType, content: &str) -> TemplateId {
        let id = TemplateId::new();
        store
            .create_template(
                &Template {
                    template_id: id.clone(),
                    business_id: business_id.clone(),
                    template_name: format!("{:?}", ty),
                    template_type: ty,
                    content: content.to_string(),
                    system_prompt: None,
                    created_at: Utc::now(),
                    updated_at: Utc::now(),
                },
                &[],
            )
            .unwrap();
        id
    }

    #[tokio::test]
    async fn dispatch_webhook_resolves_business_and_replies() {
        let store = Store::open(":memory:", 4, 1_000).unwrap();
        let business_id = BusinessId::new();
        store
            .create_business(&Business {
                business_id: business_id.clone(),
                business_name: "page-1".into(),
                owner_id: UserId::new(),
                internal_api_key: "key".into(),
                business_description: None,
                address: None,
                phone_number: None,
                website: None,
                fallback_reply: None,
                created_at: Utc::now(),
            })
            .unwrap();

        let sel = make_template(&store, &business_id, TemplateType::StageSelection, "Pick a stage for: {user_message}");
        let ext = make_template(&store, &business_id, TemplateType::DataExtraction, "Extract fields from: {user_message}");
        let resp = make_template(&store, &business_id, TemplateType::ResponseGeneration, "Reply to {user_name}: {user_message}");
        store
            .create_stage(&Stage {
                stage_id: flowline_core::ids::StageId::new(),
                business_id: business_id.clone(),
                agent_id: None,
                stage_name: "greeting".into(),
                stage_description: None,
                stage_type: "first_interaction".into(),
                stage_selection_template_id: sel,
                data_extraction_template_id: ext,
                response_generation_template_id: resp,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            })
            .unwrap();

        let llm = Arc::new(MockLlmClient::new(store.clone()));
        let orchestrator = MessageOrchestrator::new(store.clone(), llm, VariableRegistry::seeded(), OrchestratorConfig::default());
        let adapter = MessengerAdapter;

        let body_text = br#"{
            "entry": [{
                "messaging": [{
                    "sender": {"id": "user-1"},
                    "recipient": {"id": "page-1"},
                    "message": {"text": "hello there"}
                }]
            }]
        }"#;
        let sig = sign("shh", body_text);

        let result = dispatch_webhook(&adapter, &store, &orchestrator, "shh", body_text, Some(&sig))
            .await
            .unwrap();

        match result.outcome {
            Outcome::Replied { .. } => assert!(result.reply_payload.is_some()),
            Outcome::Paused { .. } => panic!("expected a reply"),
        }
    }
}
