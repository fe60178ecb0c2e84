//! MessageOrchestrator — the three-phase pipeline (stage selection, data
//! extraction, response generation), collapsed into one public entry point
//! with each phase as a private method.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use flowline_core::ids::{ExtractionId, LogId};
use flowline_llm::{CallType, CompletionRequest, LlmClient};
use flowline_stage::StageMachine;
use flowline_store::{
    AuditLog, Conversation, ExtractedData, Message, SenderType, Stage, Store, TemplateType,
};
use flowline_template::{RenderContext, TemplateEngine, VariableRegistry};
use tracing::{instrument, warn};

use crate::circuit_breaker::CircuitBreaker;
use crate::error::{OrchestratorError, Result};
use crate::lease::LeaseRegistry;
use crate::stage_select;
use crate::types::{InboundMessage, Outcome};

const RECENT_MESSAGES: u32 = 10;

pub struct OrchestratorConfig {
    pub lease_timeout: Duration,
    pub circuit_breaker_threshold: u32,
    pub circuit_breaker_window_secs: u64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            lease_timeout: Duration::from_millis(flowline_core::config::DEFAULT_LEASE_TIMEOUT_MS),
            circuit_breaker_threshold: flowline_core::config::DEFAULT_CIRCUIT_BREAKER_THRESHOLD,
            circuit_breaker_window_secs: flowline_core::config::DEFAULT_CIRCUIT_BREAKER_WINDOW_SECS,
        }
    }
}

pub struct MessageOrchestrator {
    store: Store,
    stages: StageMachine,
    templates: TemplateEngine,
    llm: Arc<dyn LlmClient>,
    registry: VariableRegistry,
    leases: LeaseRegistry,
    breaker: CircuitBreaker,
    lease_timeout: Duration,
}

impl MessageOrchestrator {
    pub fn new(store: Store, llm: Arc<dyn LlmClient>, registry: VariableRegistry, config: OrchestratorConfig) -> Self {
        Self {
            stages: StageMachine::new(store.clone()),
            templates: TemplateEngine::new(store.clone()),
            store,
            llm,
            registry,
            leases: LeaseRegistry::new(),
            breaker: CircuitBreaker::new(config.circuit_breaker_threshold, config.circuit_breaker_window_secs),
            lease_timeout: config.lease_timeout,
        }
    }

    #[instrument(skip(self, inbound), fields(business_id = %inbound.business_id, user_id = %inbound.user_id))]
    pub async fn handle(&self, inbound: InboundMessage) -> Result<Outcome> {
        // Acquire (or create) the conversation id first so we can take the
        // lease before doing any other work, so concurrent messages for the same conversation never interleave.
        let conversation = self.store.open_or_resume_conversation(
            &inbound.business_id,
            &inbound.user_id,
            &inbound.session_id,
            inbound.agent_id.clone(),
            inbound.conversation_id.as_ref(),
        )?;

        let _guard = self
            .leases
            .acquire(&conversation.conversation_id, self.lease_timeout)
            .await
            .ok_or_else(|| OrchestratorError::Busy(conversation.conversation_id.to_string()))?;

        self.phase0_prepare(conversation, &inbound).await
    }

    async fn phase0_prepare(&self, conversation: Conversation, inbound: &InboundMessage) -> Result<Outcome> {
        if self.store.is_ai_paused(
            &inbound.business_id,
            &conversation.conversation_id,
            &inbound.user_id,
        )? {
            self.store.append_message(&Message {
                message_id: flowline_core::ids::MessageId::new(),
                conversation_id: conversation.conversation_id.clone(),
                message_content: inbound.text.clone(),
                sender_type: inbound.sender_type,
                created_at: Utc::now(),
            })?;
            return Ok(Outcome::Paused {
                conversation_id: conversation.conversation_id,
            });
        }

        self.store.append_message(&Message {
            message_id: flowline_core::ids::MessageId::new(),
            conversation_id: conversation.conversation_id.clone(),
            message_content: inbound.text.clone(),
            sender_type: inbound.sender_type,
            created_at: Utc::now(),
        })?;

        let stages = self.store.list_stages(&inbound.business_id)?;
        let current_stage = self.stages.current(&conversation)?;
        let recent_messages = self
            .store
            .list_messages(&conversation.conversation_id, Some(RECENT_MESSAGES))?;
        let business = self.store.get_business(&inbound.business_id)?;
        let user = self.store.get_or_create_user(&inbound.user_id)?;
        let agent_type = match current_stage.agent_id.as_ref() {
            Some(agent_id) => self.store.get_agent(agent_id).ok().map(|a| a.agent_name),
            None => None,
        };

        let mut ctx = RenderContext {
            business_id: business.business_id.clone(),
            business_name: business.business_name.clone(),
            business_info: business.business_description.clone().unwrap_or_default(),
            user_id: user.user_id.clone(),
            user_name: user.first_name.clone(),
            conversation_id: conversation.conversation_id.clone(),
            current_stage: Some(current_stage.clone()),
            stages,
            recent_messages,
            user_message: inbound.text.clone(),
            agent_type,
            fields: Vec::new(),
            now: Utc::now(),
            summary_of_last_conversations: conversation.conversation_summary.clone(),
            extra: Default::default(),
        };

        let (stage_after_selection, selection_confidence) =
            self.phase1_stage_selection(&conversation, &current_stage, &mut ctx).await?;
        ctx.current_stage = Some(stage_after_selection.clone());

        self.phase2_data_extraction(&conversation, &stage_after_selection, &mut ctx)
            .await;

        let reply = self
            .phase3_response_generation(&conversation, &stage_after_selection, &ctx, selection_confidence)
            .await?;

        Ok(Outcome::Replied {
            reply,
            conversation_id: conversation.conversation_id,
            stage_id: Some(stage_after_selection.stage_id),
        })
    }

    async fn phase1_stage_selection(
        &self,
        conversation: &Conversation,
        current_stage: &Stage,
        ctx: &mut RenderContext,
    ) -> Result<(Stage, Option<f64>)> {
        // Stage's own template first, then the business's `default_stage_selection`
        // template, then the compiled-in global default (spec §4.7 Phase 1 step 1).
        let (content, system_prompt) = match self.store.resolve_template(
            &conversation.business_id,
            &current_stage.stage_selection_template_id,
            TemplateType::StageSelection,
        )? {
            Some(template) => self.templates.render(&template, ctx, &self.registry),
            None => {
                warn!("stage_selection template missing and no business default configured, using global default");
                flowline_template::render(
                    flowline_core::config::DEFAULT_STAGE_SELECTION_TEMPLATE,
                    None,
                    ctx,
                    &self.registry,
                )
            }
        };

        let (_call_id, outcome) = self
            .llm
            .complete(CompletionRequest {
                business_id: conversation.business_id.clone(),
                system_prompt: system_prompt.unwrap_or_default(),
                user_prompt: content,
                call_type: CallType::Selection,
                model: None,
            })
            .await;

        let raw = match outcome {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "phase 1 (stage selection) failed, keeping current stage");
                self.record_audit(conversation, "stage_selection_failed", serde_json::json!({ "error": e.to_string() }))?;
                return Ok((current_stage.clone(), None));
            }
        };

        let (name, confidence) = stage_select::parse(&raw);
        let canonical = stage_select::canonicalize(&name);
        let matched = ctx
            .stages
            .iter()
            .find(|s| stage_select::canonicalize(&s.stage_name) == canonical);

        let chosen = match matched {
            Some(stage) if stage.stage_id.to_string() != current_stage.stage_id.to_string() => {
                match self.stages.transition(
                    &conversation.conversation_id,
                    Some(&conversation.user_id),
                    &current_stage.stage_id,
                    &stage.stage_id,
                ) {
                    Ok(new_stage) => new_stage,
                    Err(e) => {
                        warn!(error = %e, "stage transition rejected, keeping current stage");
                        current_stage.clone()
                    }
                }
            }
            Some(stage) => stage.clone(),
            None => {
                warn!(candidate = %name, "stage_selection_miss — keeping current stage");
                self.record_audit(
                    conversation,
                    "stage_selection_miss",
                    serde_json::json!({ "candidate": name }),
                )?;
                current_stage.clone()
            }
        };

        self.store.record_extracted_data(&ExtractedData {
            extraction_id: ExtractionId::new(),
            conversation_id: conversation.conversation_id.clone(),
            stage_id: Some(current_stage.stage_id.clone()),
            data_type: "stage_selection".to_string(),
            extracted_data: serde_json::json!({ "stage": name, "confidence": confidence }),
            created_at: Utc::now(),
        })?;

        Ok((chosen, confidence))
    }

    async fn phase2_data_extraction(&self, conversation: &Conversation, stage: &Stage, ctx: &mut RenderContext) {
        let template = match self.store.get_template(&stage.data_extraction_template_id) {
            Ok(t) => t,
            Err(e) => {
                warn!(error = %e, "phase 2 template lookup failed, skipping extraction");
                return;
            }
        };

        ctx.fields = flowline_template::discover_variables(&template.content, template.system_prompt.as_deref())
            .into_iter()
            .filter(|name| !flowline_template::BUILTIN_NAMES.contains(&name.as_str()))
            .collect();

        let (content, system_prompt) = self.templates.render(&template, ctx, &self.registry);

        let (_call_id, outcome) = self
            .llm
            .complete(CompletionRequest {
                business_id: conversation.business_id.clone(),
                system_prompt: system_prompt.unwrap_or_default(),
                user_prompt: content,
                call_type: CallType::Extraction,
                model: None,
            })
            .await;

        let extracted = match outcome {
            Ok(text) => match serde_json::from_str::<serde_json::Value>(&text) {
                Ok(value) => value,
                Err(_) => serde_json::json!({ "raw": text }),
            },
            Err(e) => {
                warn!(error = %e, "phase 2 (data extraction) failed, storing empty extraction");
                if let Err(audit_err) = self.record_audit(
                    conversation,
                    "data_extraction_failed",
                    serde_json::json!({ "error": e.to_string() }),
                ) {
                    warn!(error = %audit_err, "failed to record data_extraction_failed audit entry");
                }
                serde_json::json!({})
            }
        };

        if let Some(object) = extracted.as_object() {
            for (key, value) in object {
                let text = match value {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                ctx.extra.insert(key.clone(), text);
            }
        }

        if let Err(e) = self.store.record_extracted_data(&ExtractedData {
            extraction_id: ExtractionId::new(),
            conversation_id: conversation.conversation_id.clone(),
            stage_id: Some(stage.stage_id.clone()),
            data_type: "data_extraction".to_string(),
            extracted_data: extracted,
            created_at: Utc::now(),
        }) {
            warn!(error = %e, "failed to persist extracted data");
        }
    }

    async fn phase3_response_generation(
        &self,
        conversation: &Conversation,
        stage: &Stage,
        ctx: &RenderContext,
        _selection_confidence: Option<f64>,
    ) -> Result<String> {
        if self.breaker.is_tripped(&conversation.business_id) {
            warn!("circuit breaker open, short-circuiting to fallback reply");
            return Ok(self.fallback_reply(conversation)?);
        }

        let template = self.store.get_template(&stage.response_generation_template_id)?;
        let (content, system_prompt) = self.templates.render(&template, ctx, &self.registry);

        let (call_id, outcome) = self
            .llm
            .complete(CompletionRequest {
                business_id: conversation.business_id.clone(),
                system_prompt: system_prompt.unwrap_or_default(),
                user_prompt: content,
                call_type: CallType::Generation,
                model: None,
            })
            .await;

        let reply = match outcome {
            Ok(text) => {
                self.store
                    .set_conversation_llm_call(&conversation.conversation_id, &call_id)?;
                text
            }
            Err(e) => {
                warn!(error = %e, "phase 3 (response generation) failed, returning fallback reply");
                self.breaker.record_failure(&conversation.business_id);
                self.record_audit(
                    conversation,
                    "response_generation_failed",
                    serde_json::json!({ "error": e.to_string() }),
                )?;
                self.fallback_reply(conversation)?
            }
        };

        self.store.append_message(&Message {
            message_id: flowline_core::ids::MessageId::new(),
            conversation_id: conversation.conversation_id.clone(),
            message_content: reply.clone(),
            sender_type: SenderType::Assistant,
            created_at: Utc::now(),
        })?;
        self.store.touch_conversation(&conversation.conversation_id)?;

        Ok(reply)
    }

    fn fallback_reply(&self, conversation: &Conversation) -> Result<String> {
        let business = self.store.get_business(&conversation.business_id)?;
        Ok(business
            .fallback_reply
            .unwrap_or_else(|| flowline_core::config::DEFAULT_FALLBACK_REPLY.to_string()))
    }

    fn record_audit(&self, conversation: &Conversation, action_type: &str, data: serde_json::Value) -> Result<()> {
        self.store.record_audit_log(&AuditLog {
            log_id: LogId::new(),
            business_id: conversation.business_id.clone(),
            user_id: Some(conversation.user_id.clone()),
            action_type: action_type.to_string(),
            action_data: data,
            created_at: Utc::now(),
        })?;
        Ok(())
    }
}

