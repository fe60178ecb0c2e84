//! StageMachine — `Bootstrap`, `Transition`, `Current`: picks the initial
//! stage for a fresh conversation, validates and applies stage transitions,
//! and resolves the current stage (bootstrapping lazily if none is set).

use chrono::Utc;
use flowline_core::ids::{BusinessId, ConversationId, StageId, UserId};
use flowline_store::{AuditLog, Conversation, Stage, Store};
use flowline_core::ids::LogId;

use crate::error::{Result, StageMachineError};

pub struct StageMachine {
    store: Store,
}

impl StageMachine {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Picks the `first_interaction` stage, or the oldest stage if none is
    /// flagged, for a business with no prior conversation state.
    pub fn bootstrap(&self, business_id: &BusinessId) -> Result<Stage> {
        let stages = self.store.list_stages(business_id)?;
        if stages.is_empty() {
            return Err(StageMachineError::NoStages(business_id.to_string()));
        }
        let chosen = stages
            .iter()
            .find(|s| s.stage_type == "first_interaction")
            .unwrap_or(&stages[0]);
        Ok(chosen.clone())
    }

    /// Returns the conversation's current stage, bootstrapping (and
    /// persisting the bootstrap choice) when it has none yet.
    pub fn current(&self, conversation: &Conversation) -> Result<Stage> {
        match &conversation.current_stage_id {
            Some(stage_id) => Ok(self.store.get_stage(stage_id)?),
            None => {
                let stage = self.bootstrap(&conversation.business_id)?;
                self.store
                    .set_conversation_stage(&conversation.conversation_id, &stage.stage_id)?;
                Ok(stage)
            }
        }
    }

    /// Validates the transition (business match + optional allow-list),
    /// moves the conversation to `to_stage_id`, and writes the audit trail.
    pub fn transition(
        &self,
        conversation_id: &ConversationId,
        user_id: Option<&UserId>,
        from_stage_id: &StageId,
        to_stage_id: &StageId,
    ) -> Result<Stage> {
        let to_stage = self.store.get_stage(to_stage_id)?;
        let from_stage = self.store.get_stage(from_stage_id)?;
        if to_stage.business_id.to_string() != from_stage.business_id.to_string() {
            return Err(StageMachineError::TransitionNotAllowed {
                from: from_stage_id.to_string(),
                to: to_stage_id.to_string(),
            });
        }

        if let Some(allowed) = self
            .store
            .allowed_transitions(&from_stage.business_id, from_stage_id)?
        {
            if !allowed.iter().any(|s| s.to_string() == to_stage_id.to_string()) {
                return Err(StageMachineError::TransitionNotAllowed {
                    from: from_stage_id.to_string(),
                    to: to_stage_id.to_string(),
                });
            }
        }

        self.store.set_conversation_stage(conversation_id, to_stage_id)?;
        self.store.record_audit_log(&AuditLog {
            log_id: LogId::new(),
            business_id: to_stage.business_id.clone(),
            user_id: user_id.cloned(),
            action_type: "stage_transition".to_string(),
            action_data: serde_json::json!({
                "conversation_id": conversation_id.to_string(),
                "from_stage_id": from_stage_id.to_string(),
                "to_stage_id": to_stage_id.to_string(),
            }),
            created_at: Utc::now(),
        })?;

        Ok(to_stage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowline_core::ids::TemplateId;
    use flowline_store::{Business, TemplateType, Template};

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
        (store, business_id)
    }

    fn make_template(store: &Store, business_id: &BusinessId, ty: TemplateType) -> TemplateId {
        let id = TemplateId::new();
        store
            .create_template(
                &Template {
                    template_id: id.clone(),
                    business_id: business_id.clone(),
                    template_name: format!("{:?}", ty),
                    template_type: ty,
                    content: "hi".into(),
                    system_prompt: None,
                    created_at: Utc::now(),
                    updated_at: Utc::now(),
                },
                &[],
            )
            .unwrap();
        id
    }

    fn make_stage(store: &Store, business_id: &BusinessId, stage_type: &str) -> Stage {
        let sel = make_template(store, business_id, TemplateType::StageSelection);
        let ext = make_template(store, business_id, TemplateType::DataExtraction);
        let resp = make_template(store, business_id, TemplateType::ResponseGeneration);
        let stage = Stage {
            stage_id: StageId::new(),
            business_id: business_id.clone(),
            agent_id: None,
            stage_name: stage_type.to_string(),
            stage_description: None,
            stage_type: stage_type.to_string(),
            stage_selection_template_id: sel,
            data_extraction_template_id: ext,
            response_generation_template_id: resp,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        store.create_stage(&stage).unwrap();
        stage
    }

    #[test]
    fn bootstrap_prefers_first_interaction() {
        let (store, business_id) = setup();
        make_stage(&store, &business_id, "information");
        let first = make_stage(&store, &business_id, "first_interaction");

        let machine = StageMachine::new(store);
        let bootstrapped = machine.bootstrap(&business_id).unwrap();
        assert_eq!(bootstrapped.stage_id.to_string(), first.stage_id.to_string());
    }

    #[test]
    fn bootstrap_falls_back_to_oldest_stage() {
        let (store, business_id) = setup();
        let first = make_stage(&store, &business_id, "information");
        make_stage(&store, &business_id, "transaction");

        let machine = StageMachine::new(store);
        let bootstrapped = machine.bootstrap(&business_id).unwrap();
        assert_eq!(bootstrapped.stage_id.to_string(), first.stage_id.to_string());
    }

    #[test]
    fn bootstrap_errors_with_no_stages() {
        let (store, business_id) = setup();
        let machine = StageMachine::new(store);
        let err = machine.bootstrap(&business_id).unwrap_err();
        assert!(matches!(err, StageMachineError::NoStages(_)));
    }

    #[test]
    fn transition_without_allow_list_is_open() {
        let (store, business_id) = setup();
        let a = make_stage(&store, &business_id, "information");
        let b = make_stage(&store, &business_id, "transaction");
        let conversation_id = ConversationId::new();

        let machine = StageMachine::new(store);
        let result = machine
            .transition(&conversation_id, None, &a.stage_id, &b.stage_id)
            .unwrap();
        assert_eq!(result.stage_id.to_string(), b.stage_id.to_string());
    }

    #[test]
    fn transition_respects_allow_list() {
        let (store, business_id) = setup();
        let a = make_stage(&store, &business_id, "information");
        let b = make_stage(&store, &business_id, "transaction");
        let c = make_stage(&store, &business_id, "closing");
        store
            .create_transition(&flowline_store::StageTransition {
                business_id: business_id.clone(),
                from_stage_id: a.stage_id.clone(),
                to_stage_id: b.stage_id.clone(),
                condition: None,
            })
            .unwrap();
        let conversation_id = ConversationId::new();

        let machine = StageMachine::new(store);
        let err = machine
            .transition(&conversation_id, None, &a.stage_id, &c.stage_id)
            .unwrap_err();
        assert!(matches!(err, StageMachineError::TransitionNotAllowed { .. }));
    }
}
