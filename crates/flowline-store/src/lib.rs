pub mod agent;
pub mod ai_control;
pub mod audit;
pub mod business;
pub mod conversation;
pub mod error;
pub mod llm_call;
pub mod pool;
pub mod schema;
pub mod stage;
pub mod template;
pub mod types;
pub mod user;

use std::sync::Arc;

use chrono::Utc;
use flowline_core::ids::{
    AgentId, BusinessId, ConversationId, StageId, TemplateId, TemplateVariableId, UserId,
};
use tracing::instrument;

pub use error::{Result, StoreError};
pub use types::*;

/// Handle to the persistence layer. Cheap to clone — wraps a pooled
/// connection manager, not a single connection.
#[derive(Clone)]
pub struct Store {
    pool: Arc<pool::Pool>,
}

impl Store {
    pub fn open(path: &str, max_size: u32, acquire_timeout_ms: u64) -> Result<Self> {
        let pool = pool::build_pool(path, max_size, acquire_timeout_ms)?;
        let conn = pool.get().map_err(StoreError::PoolExhausted)?;
        schema::init_db(&conn)?;
        Ok(Self {
            pool: Arc::new(pool),
        })
    }

    fn conn(&self) -> Result<pool::PooledConn> {
        self.pool.get().map_err(StoreError::PoolExhausted)
    }

    // -- Business --------------------------------------------------------

    #[instrument(skip(self, business))]
    pub fn create_business(&self, business: &Business) -> Result<()> {
        business::create_business(&self.conn()?, business)
    }

    pub fn get_business(&self, id: &BusinessId) -> Result<Business> {
        business::get_business(&self.conn()?, id)
    }

    pub fn find_business_by_api_key(&self, api_key: &str) -> Result<Option<Business>> {
        business::find_business_by_api_key(&self.conn()?, api_key)
    }

    pub fn find_business_by_name(&self, name: &str) -> Result<Option<Business>> {
        business::find_business_by_name(&self.conn()?, name)
    }

    pub fn find_business_by_phone_number(&self, phone_number: &str) -> Result<Option<Business>> {
        business::find_business_by_phone_number(&self.conn()?, phone_number)
    }

    pub fn update_business(&self, business: &Business) -> Result<()> {
        business::update_business(&self.conn()?, business)
    }

    // -- User --------------------------------------------------------------

    pub fn create_user(&self, user: &User) -> Result<()> {
        user::create_user(&self.conn()?, user)
    }

    pub fn get_user(&self, id: &UserId) -> Result<User> {
        user::get_user(&self.conn()?, id)
    }

    pub fn find_user(&self, id: &UserId) -> Result<Option<User>> {
        user::find_user(&self.conn()?, id)
    }

    /// Looks up the user, creating a bare record on first sight. Matches the
    /// data model note that users are "created on first interaction if
    /// unknown."
    #[instrument(skip(self))]
    pub fn get_or_create_user(&self, id: &UserId) -> Result<User> {
        let conn = self.conn()?;
        if let Some(user) = user::find_user(&conn, id)? {
            return Ok(user);
        }
        let now = Utc::now();
        let fresh = User {
            user_id: id.clone(),
            first_name: None,
            last_name: None,
            email: None,
            created_at: now,
            updated_at: now,
        };
        user::create_user(&conn, &fresh)?;
        Ok(fresh)
    }

    // -- Agent ---------------------------------------------------------------

    pub fn create_agent(&self, agent: &Agent) -> Result<()> {
        agent::create_agent(&self.conn()?, agent)
    }

    pub fn get_agent(&self, id: &AgentId) -> Result<Agent> {
        agent::get_agent(&self.conn()?, id)
    }

    pub fn list_agents_for_business(&self, business_id: &BusinessId) -> Result<Vec<Agent>> {
        agent::list_agents_for_business(&self.conn()?, business_id)
    }

    // -- Template --------------------------------------------------------

    /// Creates a template and discovers/records its variable usage in one
    /// transaction.
    #[instrument(skip(self, template, variable_names))]
    pub fn create_template(&self, template: &Template, variable_names: &[String]) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        template::create_template(&tx, template)?;
        template::replace_usage(&tx, &template.template_id, variable_names)?;
        tx.commit()?;
        Ok(())
    }

    #[instrument(skip(self, template, variable_names))]
    pub fn update_template(&self, template: &Template, variable_names: &[String]) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        template::update_template(&tx, template)?;
        template::replace_usage(&tx, &template.template_id, variable_names)?;
        tx.commit()?;
        Ok(())
    }

    pub fn get_template(&self, id: &TemplateId) -> Result<Template> {
        template::get_template(&self.conn()?, id)
    }

    /// The business's own `default_`-prefixed template of the given type,
    /// if one is configured. See `Store::resolve_template` for the full
    /// stage-own -> business-default -> global-default chain.
    pub fn find_default_template(
        &self,
        business_id: &BusinessId,
        template_type: TemplateType,
    ) -> Result<Option<Template>> {
        template::find_default_template(&self.conn()?, business_id, template_type)
    }

    /// Resolves the template a phase should render: the stage's own
    /// template id first, then the business's `default_` template of the
    /// same type, then `None` (callers fall back to the compiled-in global
    /// default). Mirrors §4.7 Phase 1 step 1's three-tier fallback.
    pub fn resolve_template(
        &self,
        business_id: &BusinessId,
        stage_template_id: &TemplateId,
        template_type: TemplateType,
    ) -> Result<Option<Template>> {
        match template::get_template(&self.conn()?, stage_template_id) {
            Ok(template) => Ok(Some(template)),
            Err(StoreError::NotFound(_)) => {
                template::find_default_template(&self.conn()?, business_id, template_type)
            }
            Err(e) => Err(e),
        }
    }

    pub fn list_templates(&self, business_id: &BusinessId) -> Result<Vec<Template>> {
        template::list_templates(&self.conn()?, business_id)
    }

    pub fn delete_template(&self, id: &TemplateId) -> Result<()> {
        template::delete_template(&self.conn()?, id)
    }

    pub fn get_or_create_variable(&self, name: &str) -> Result<TemplateVariableId> {
        template::get_or_create_variable(&self.conn()?, name)
    }

    pub fn list_variables(&self) -> Result<Vec<TemplateVariable>> {
        template::list_variables(&self.conn()?)
    }

    // -- Stage -----------------------------------------------------------

    /// Creates a stage after checking the invariant that all three
    /// referenced templates belong to the same business as the stage.
    #[instrument(skip(self, stage))]
    pub fn create_stage(&self, stage: &Stage) -> Result<()> {
        let conn = self.conn()?;
        self.check_stage_templates_owned(&conn, stage)?;
        stage::create_stage(&conn, stage)
    }

    #[instrument(skip(self, stage))]
    pub fn update_stage(&self, stage: &Stage) -> Result<()> {
        let conn = self.conn()?;
        self.check_stage_templates_owned(&conn, stage)?;
        stage::update_stage(&conn, stage)
    }

    fn check_stage_templates_owned(&self, conn: &pool::PooledConn, stage: &Stage) -> Result<()> {
        for (field, template_id) in [
            ("stage_selection_template_id", &stage.stage_selection_template_id),
            ("data_extraction_template_id", &stage.data_extraction_template_id),
            ("response_generation_template_id", &stage.response_generation_template_id),
        ] {
            let template = template::get_template(conn, template_id)?;
            if template.business_id.to_string() != stage.business_id.to_string() {
                return Err(StoreError::InvalidRequest(format!(
                    "{field} {template_id} belongs to a different business than the stage"
                )));
            }
        }
        Ok(())
    }

    pub fn get_stage(&self, id: &StageId) -> Result<Stage> {
        stage::get_stage(&self.conn()?, id)
    }

    pub fn list_stages(&self, business_id: &BusinessId) -> Result<Vec<Stage>> {
        stage::list_stages(&self.conn()?, business_id)
    }

    pub fn delete_stage(&self, id: &StageId) -> Result<()> {
        stage::delete_stage(&self.conn()?, id)
    }

    pub fn create_transition(&self, transition: &StageTransition) -> Result<()> {
        stage::create_transition(&self.conn()?, transition)
    }

    pub fn allowed_transitions(
        &self,
        business_id: &BusinessId,
        from_stage_id: &StageId,
    ) -> Result<Option<Vec<StageId>>> {
        stage::allowed_transitions(&self.conn()?, business_id, from_stage_id)
    }

    // -- Conversation ------------------------------------------------------

    pub fn create_conversation(&self, conversation: &Conversation) -> Result<()> {
        conversation::create_conversation(&self.conn()?, conversation)
    }

    pub fn get_conversation(&self, id: &ConversationId) -> Result<Conversation> {
        conversation::get_conversation(&self.conn()?, id)
    }

    pub fn find_active_conversation(
        &self,
        business_id: &BusinessId,
        user_id: &UserId,
        session_id: &str,
    ) -> Result<Option<Conversation>> {
        conversation::find_active_conversation(&self.conn()?, business_id, user_id, session_id)
    }

    pub fn list_conversations_for_user(
        &self,
        business_id: &BusinessId,
        user_id: &UserId,
    ) -> Result<Vec<Conversation>> {
        conversation::list_conversations_for_user(&self.conn()?, business_id, user_id)
    }

    pub fn set_conversation_stage(&self, id: &ConversationId, stage_id: &StageId) -> Result<()> {
        conversation::set_conversation_stage(&self.conn()?, id, stage_id, Utc::now())
    }

    pub fn touch_conversation(&self, id: &ConversationId) -> Result<()> {
        conversation::touch_conversation(&self.conn()?, id, Utc::now())
    }

    pub fn set_conversation_llm_call(&self, id: &ConversationId, call_id: &CallId) -> Result<()> {
        conversation::set_conversation_llm_call(&self.conn()?, id, &call_id.to_string(), Utc::now())
    }

    pub fn set_conversation_status(&self, id: &ConversationId, status: ConversationStatus) -> Result<()> {
        conversation::set_conversation_status(&self.conn()?, id, status, Utc::now())
    }

    /// Loads the given conversation id, or the most recent active
    /// conversation for (business, user, session), creating a fresh one if
    /// neither exists. Mirrors `get_or_create_user`'s first-sight creation.
    #[instrument(skip(self))]
    pub fn open_or_resume_conversation(
        &self,
        business_id: &BusinessId,
        user_id: &UserId,
        session_id: &str,
        agent_id: Option<AgentId>,
        conversation_id: Option<&ConversationId>,
    ) -> Result<Conversation> {
        if let Some(id) = conversation_id {
            return conversation::get_conversation(&self.conn()?, id);
        }
        if let Some(existing) =
            conversation::find_active_conversation(&self.conn()?, business_id, user_id, session_id)?
        {
            return Ok(existing);
        }
        let now = Utc::now();
        let fresh = Conversation {
            conversation_id: ConversationId::new(),
            business_id: business_id.clone(),
            user_id: user_id.clone(),
            agent_id,
            current_stage_id: None,
            session_id: session_id.to_string(),
            start_time: now,
            last_updated: now,
            status: ConversationStatus::Active,
            conversation_summary: None,
            llm_call_id: None,
        };
        conversation::create_conversation(&self.conn()?, &fresh)?;
        Ok(fresh)
    }

    pub fn append_message(&self, message: &Message) -> Result<()> {
        conversation::append_message(&self.conn()?, message)
    }

    pub fn list_messages(
        &self,
        conversation_id: &ConversationId,
        limit: Option<u32>,
    ) -> Result<Vec<Message>> {
        conversation::list_messages(&self.conn()?, conversation_id, limit)
    }

    pub fn record_extracted_data(&self, extraction: &ExtractedData) -> Result<()> {
        conversation::record_extracted_data(&self.conn()?, extraction)
    }

    pub fn list_extracted_data(&self, conversation_id: &ConversationId) -> Result<Vec<ExtractedData>> {
        conversation::list_extracted_data(&self.conn()?, conversation_id)
    }

    // -- LLM calls / audit / AI control ----------------------------------

    pub fn record_llm_call(&self, call: &LlmCall) -> Result<()> {
        llm_call::record_llm_call(&self.conn()?, call)
    }

    pub fn list_llm_calls(&self, business_id: &BusinessId, limit: u32) -> Result<Vec<LlmCall>> {
        llm_call::list_llm_calls(&self.conn()?, business_id, limit)
    }

    pub fn record_audit_log(&self, log: &AuditLog) -> Result<()> {
        audit::record_audit_log(&self.conn()?, log)
    }

    pub fn list_audit_logs(&self, business_id: &BusinessId, limit: u32) -> Result<Vec<AuditLog>> {
        audit::list_audit_logs(&self.conn()?, business_id, limit)
    }

    pub fn set_ai_control(&self, setting: &AiControlSetting) -> Result<()> {
        ai_control::set_pause(&self.conn()?, setting)
    }

    pub fn is_ai_paused(
        &self,
        business_id: &BusinessId,
        conversation_id: &ConversationId,
        user_id: &UserId,
    ) -> Result<bool> {
        ai_control::is_paused(&self.conn()?, business_id, conversation_id, user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> Store {
        Store::open(":memory:", 4, 1_000).expect("open in-memory store")
    }

    #[test]
    fn create_and_fetch_business() {
        let store = store();
        let owner_id = UserId::new();
        let business = Business {
            business_id: BusinessId::new(),
            business_name: "Acme".into(),
            owner_id,
            internal_api_key: "key-123".into(),
            business_description: None,
            address: None,
            phone_number: None,
            website: None,
            fallback_reply: None,
            created_at: Utc::now(),
        };
        store.create_business(&business).unwrap();
        let fetched = store.get_business(&business.business_id).unwrap();
        assert_eq!(fetched.business_name, "Acme");

        let by_key = store.find_business_by_api_key("key-123").unwrap().unwrap();
        assert_eq!(by_key.business_id.to_string(), business.business_id.to_string());
    }

    #[test]
    fn duplicate_business_name_conflicts() {
        let store = store();
        let business = Business {
            business_id: BusinessId::new(),
            business_name: "Acme".into(),
            owner_id: UserId::new(),
            internal_api_key: "key-1".into(),
            business_description: None,
            address: None,
            phone_number: None,
            website: None,
            fallback_reply: None,
            created_at: Utc::now(),
        };
        store.create_business(&business).unwrap();
        let dup = Business {
            business_id: BusinessId::new(),
            internal_api_key: "key-2".into(),
            ..business
        };
        let err = store.create_business(&dup).unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[test]
    fn get_or_create_user_is_idempotent() {
        let store = store();
        let id = UserId::new();
        let first = store.get_or_create_user(&id).unwrap();
        let second = store.get_or_create_user(&id).unwrap();
        assert_eq!(first.created_at, second.created_at);
    }

    #[test]
    fn template_usage_round_trips() {
        let store = store();
        let business_id = BusinessId::new();
        let business = Business {
            business_id: business_id.clone(),
            business_name: "Acme".into(),
            owner_id: UserId::new(),
            internal_api_key: "key-xyz".into(),
            business_description: None,
            address: None,
            phone_number: None,
            website: None,
            fallback_reply: None,
            created_at: Utc::now(),
        };
        store.create_business(&business).unwrap();

        let template = Template {
            template_id: TemplateId::new(),
            business_id: business_id.clone(),
            template_name: "Greeting".into(),
            template_type: TemplateType::ResponseGeneration,
            content: "Hello {user_name}, welcome to {business_name}".into(),
            system_prompt: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        store
            .create_template(
                &template,
                &["user_name".to_string(), "business_name".to_string()],
            )
            .unwrap();

        let variables = store.list_variables().unwrap();
        let names: Vec<_> = variables.iter().map(|v| v.variable_name.as_str()).collect();
        assert!(names.contains(&"user_name"));
        assert!(names.contains(&"business_name"));
    }

    #[test]
    fn ai_control_resolution_order() {
        let store = store();
        let business_id = BusinessId::new();
        let user_id = UserId::new();
        let conversation_id = ConversationId::new();

        store
            .set_ai_control(&AiControlSetting {
                business_id: business_id.clone(),
                conversation_id: None,
                user_id: None,
                paused: true,
                expires_at: None,
                updated_at: Utc::now(),
            })
            .unwrap();
        assert!(store
            .is_ai_paused(&business_id, &conversation_id, &user_id)
            .unwrap());

        store
            .set_ai_control(&AiControlSetting {
                business_id: business_id.clone(),
                conversation_id: None,
                user_id: Some(user_id.clone()),
                paused: false,
                expires_at: None,
                updated_at: Utc::now(),
            })
            .unwrap();
        assert!(!store
            .is_ai_paused(&business_id, &conversation_id, &user_id)
            .unwrap());
    }
}
