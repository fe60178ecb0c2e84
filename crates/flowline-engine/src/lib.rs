pub mod circuit_breaker;
pub mod error;
pub mod lease;
pub mod orchestrator;
pub mod stage_select;
pub mod types;

pub use error::{OrchestratorError, Result};
pub use orchestrator::{MessageOrchestrator, OrchestratorConfig};
pub use types::{InboundMessage, Outcome};

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;
    use flowline_core::ids::{BusinessId, StageId, TemplateId, UserId};
    use flowline_llm::MockLlmClient;
    use flowline_store::{Business, Stage, Store, Template, TemplateType};
    use flowline_template::VariableRegistry;

    use super::*;

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

    fn setup() -> (Store, BusinessId) {
        let store = Store::open(":memory:", 4, 1_000).unwrap();
        let business_id = BusinessId::new();
        store
            .create_business(&Business {
                business_id: business_id.clone(),
                business_name: "Acme".into(),
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
                stage_id: StageId::new(),
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

        (store, business_id)
    }

    #[tokio::test]
    async fn handle_produces_a_reply_and_persists_messages() {
        let (store, business_id) = setup();
        let llm = Arc::new(MockLlmClient::new(store.clone()));
        let orchestrator = MessageOrchestrator::new(
            store.clone(),
            llm,
            VariableRegistry::seeded(),
            OrchestratorConfig::default(),
        );

        let inbound = InboundMessage::new(business_id, UserId::new(), "session-1".into(), "hi there".into());
        let outcome = orchestrator.handle(inbound).await.unwrap();

        match outcome {
            Outcome::Replied { reply, conversation_id, stage_id } => {
                assert!(!reply.is_empty());
                assert!(stage_id.is_some());
                let messages = store.list_messages(&conversation_id, None).unwrap();
                assert_eq!(messages.len(), 2);
            }
            Outcome::Paused { .. } => panic!("expected a reply"),
        }
    }

    #[tokio::test]
    async fn paused_ai_control_skips_generation() {
        let (store, business_id) = setup();
        let user_id = UserId::new();
        store
            .set_ai_control(&flowline_store::AiControlSetting {
                business_id: business_id.clone(),
                conversation_id: None,
                user_id: Some(user_id.clone()),
                paused: true,
                expires_at: None,
                updated_at: Utc::now(),
            })
            .unwrap();

        let llm = Arc::new(MockLlmClient::new(store.clone()));
        let orchestrator = MessageOrchestrator::new(
            store.clone(),
            llm,
            VariableRegistry::seeded(),
            OrchestratorConfig::default(),
        );

        let inbound = InboundMessage::new(business_id, user_id, "session-1".into(), "hi".into());
        let outcome = orchestrator.handle(inbound).await.unwrap();

        match outcome {
            Outcome::Paused { conversation_id } => {
                let messages = store.list_messages(&conversation_id, None).unwrap();
                assert_eq!(messages.len(), 1);
            }
            Outcome::Replied { .. } => panic!("expected pause"),
        }
    }

    #[tokio::test]
    async fn stage_selection_miss_keeps_current_stage() {
        let (store, business_id) = setup();
        let llm = Arc::new(MockLlmClient::new(store.clone()).with_response(
            flowline_llm::CallType::Selection,
            "nonexistent, confidence: 0.3",
        ));
        let orchestrator = MessageOrchestrator::new(
            store.clone(),
            llm,
            VariableRegistry::seeded(),
            OrchestratorConfig::default(),
        );

        let inbound = InboundMessage::new(business_id, UserId::new(), "session-1".into(), "hi".into());
        let outcome = orchestrator.handle(inbound).await.unwrap();

        match outcome {
            Outcome::Replied { conversation_id, .. } => {
                let conversation = store.get_conversation(&conversation_id).unwrap();
                let stages = store.list_stages(&conversation.business_id).unwrap();
                assert_eq!(
                    conversation.current_stage_id.unwrap().to_string(),
                    stages[0].stage_id.to_string()
                );
                let extracted = store.list_extracted_data(&conversation_id).unwrap();
                assert!(extracted.iter().any(|e| e.data_type == "stage_selection"));
            }
            Outcome::Paused { .. } => panic!("expected a reply"),
        }
    }
}
