use flowline_core::ids::{AgentId, BusinessId, ConversationId, StageId, UserId};
use flowline_store::SenderType;

/// A normalized inbound message, the orchestrator's sole entry point
/// payload — every channel adapter (web, Messenger, WhatsApp) translates
/// its platform event into this shape before calling `handle`.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub business_id: BusinessId,
    pub user_id: UserId,
    pub session_id: String,
    pub text: String,
    pub agent_id: Option<AgentId>,
    pub sender_type: SenderType,
    pub conversation_id: Option<ConversationId>,
}

impl InboundMessage {
    pub fn new(business_id: BusinessId, user_id: UserId, session_id: String, text: String) -> Self {
        Self {
            business_id,
            user_id,
            session_id,
            text,
            agent_id: None,
            sender_type: SenderType::User,
            conversation_id: None,
        }
    }
}

/// The result of one `handle` call.
#[derive(Debug, Clone)]
pub enum Outcome {
    /// Phase 3 produced (or degraded to a fallback) a reply.
    Replied {
        reply: String,
        conversation_id: ConversationId,
        stage_id: Option<StageId>,
    },
    /// AI control is paused for this conversation/user/business; the
    /// message was persisted but no reply was generated.
    Paused { conversation_id: ConversationId },
}
