use chrono::{DateTime, Utc};
use flowline_core::ids::{
    AgentId, BusinessId, CallId, ConversationId, ExtractionId, LogId, MessageId, StageId,
    TemplateId, TemplateVariableId, UserId,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Business {
    pub business_id: BusinessId,
    pub business_name: String,
    pub owner_id: UserId,
    pub internal_api_key: String,
    pub business_description: Option<String>,
    pub address: Option<String>,
    pub phone_number: Option<String>,
    pub website: Option<String>,
    pub fallback_reply: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub user_id: UserId,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub agent_id: AgentId,
    pub business_id: BusinessId,
    pub agent_name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateVariable {
    pub variable_id: TemplateVariableId,
    pub variable_name: String,
    pub description: Option<String>,
    pub default_value: Option<String>,
    pub example: Option<String>,
    pub category: String,
    pub is_dynamic: bool,
}

/// `template_type` as stored, including the business-level `default_`
/// variants §3 calls out alongside the three bare ones (used when a stage's
/// own template goes missing — see `Store::find_default_template`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateType {
    StageSelection,
    DataExtraction,
    ResponseGeneration,
    DefaultStageSelection,
    DefaultDataExtraction,
    DefaultResponseGeneration,
}

impl TemplateType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TemplateType::StageSelection => "stage_selection",
            TemplateType::DataExtraction => "data_extraction",
            TemplateType::ResponseGeneration => "response_generation",
            TemplateType::DefaultStageSelection => "default_stage_selection",
            TemplateType::DefaultDataExtraction => "default_data_extraction",
            TemplateType::DefaultResponseGeneration => "default_response_generation",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "stage_selection" => Some(TemplateType::StageSelection),
            "data_extraction" => Some(TemplateType::DataExtraction),
            "response_generation" => Some(TemplateType::ResponseGeneration),
            "default_stage_selection" => Some(TemplateType::DefaultStageSelection),
            "default_data_extraction" => Some(TemplateType::DefaultDataExtraction),
            "default_response_generation" => Some(TemplateType::DefaultResponseGeneration),
            _ => None,
        }
    }

    /// The business-scoped `default_` counterpart of a bare template type,
    /// e.g. `StageSelection` -> `DefaultStageSelection`. Fallback lookups
    /// use this to find a business's shared default before reaching for the
    /// global one.
    pub fn default_variant(&self) -> Self {
        match self {
            TemplateType::StageSelection | TemplateType::DefaultStageSelection => {
                TemplateType::DefaultStageSelection
            }
            TemplateType::DataExtraction | TemplateType::DefaultDataExtraction => {
                TemplateType::DefaultDataExtraction
            }
            TemplateType::ResponseGeneration | TemplateType::DefaultResponseGeneration => {
                TemplateType::DefaultResponseGeneration
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Template {
    pub template_id: TemplateId,
    pub business_id: BusinessId,
    pub template_name: String,
    pub template_type: TemplateType,
    pub content: String,
    pub system_prompt: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stage {
    pub stage_id: StageId,
    pub business_id: BusinessId,
    pub agent_id: Option<AgentId>,
    pub stage_name: String,
    pub stage_description: Option<String>,
    pub stage_type: String,
    pub stage_selection_template_id: TemplateId,
    pub data_extraction_template_id: TemplateId,
    pub response_generation_template_id: TemplateId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageTransition {
    pub business_id: BusinessId,
    pub from_stage_id: StageId,
    pub to_stage_id: StageId,
    pub condition: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationStatus {
    Active,
    Paused,
    Completed,
    Error,
}

impl ConversationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConversationStatus::Active => "active",
            ConversationStatus::Paused => "paused",
            ConversationStatus::Completed => "completed",
            ConversationStatus::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "paused" => ConversationStatus::Paused,
            "completed" => ConversationStatus::Completed,
            "error" => ConversationStatus::Error,
            _ => ConversationStatus::Active,
        }
    }

    /// Terminal states signal the orchestrator to stop generating
    /// replies (not enforced by the store itself).
    pub fn is_terminal(&self) -> bool {
        matches!(self, ConversationStatus::Completed | ConversationStatus::Error)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub conversation_id: ConversationId,
    pub business_id: BusinessId,
    pub user_id: UserId,
    pub agent_id: Option<AgentId>,
    pub current_stage_id: Option<StageId>,
    pub session_id: String,
    pub start_time: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
    pub status: ConversationStatus,
    pub conversation_summary: Option<String>,
    pub llm_call_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SenderType {
    User,
    Assistant,
    Staff,
    Ai,
}

impl SenderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SenderType::User => "user",
            SenderType::Assistant => "assistant",
            SenderType::Staff => "staff",
            SenderType::Ai => "ai",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "assistant" => SenderType::Assistant,
            "staff" => SenderType::Staff,
            "ai" => SenderType::Ai,
            _ => SenderType::User,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub message_id: MessageId,
    pub conversation_id: ConversationId,
    pub message_content: String,
    pub sender_type: SenderType,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedData {
    pub extraction_id: ExtractionId,
    pub conversation_id: ConversationId,
    pub stage_id: Option<StageId>,
    pub data_type: String,
    pub extracted_data: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmCall {
    pub call_id: CallId,
    pub business_id: BusinessId,
    pub input_text: String,
    pub response: String,
    pub system_prompt: Option<String>,
    pub call_type: String,
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLog {
    pub log_id: LogId,
    pub business_id: BusinessId,
    pub user_id: Option<UserId>,
    pub action_type: String,
    pub action_data: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiControlSetting {
    pub business_id: BusinessId,
    pub conversation_id: Option<ConversationId>,
    pub user_id: Option<UserId>,
    pub paused: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}
