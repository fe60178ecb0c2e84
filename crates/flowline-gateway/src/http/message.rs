use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Extension, Path, Query, State};
use axum::Json;
use flowline_auth::TenantContext;
use flowline_core::ids::{AgentId, ConversationId, UserId};
use flowline_core::FlowlineError;
use flowline_engine::{InboundMessage, Outcome};
use flowline_store::{Conversation, SenderType};
use serde::{Deserialize, Serialize};

use crate::app::AppState;
use crate::http::business::resolve_target_business;

#[derive(Debug, Deserialize)]
pub struct MessageRequest {
    pub business_id: Option<String>,
    pub user_id: String,
    pub message: String,
    pub conversation_id: Option<String>,
    pub agent_id: Option<String>,
    pub sender_type: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub response: String,
    pub conversation_id: String,
}

/// POST /message — the inbound message ingress entry point. Authenticated
/// (and rate-limited) by `require_message_ingress` before this handler
/// runs; everything past that point is the three-phase pipeline in
/// `flowline-engine`.
pub async fn post_message(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<TenantContext>,
    Json(req): Json<MessageRequest>,
) -> Result<Json<MessageResponse>, FlowlineError> {
    let business_id = resolve_target_business(&ctx, req.business_id.as_deref())?;
    let user_id: UserId = req
        .user_id
        .parse()
        .map_err(|_| FlowlineError::InvalidRequest("invalid user_id".to_string()))?;
    state.store.get_or_create_user(&user_id)?;

    let conversation_id = req
        .conversation_id
        .as_deref()
        .map(|s| s.parse::<ConversationId>().map_err(|_| FlowlineError::InvalidRequest("invalid conversation_id".to_string())))
        .transpose()?;
    let agent_id = req
        .agent_id
        .as_deref()
        .map(|s| s.parse::<AgentId>().map_err(|_| FlowlineError::InvalidRequest("invalid agent_id".to_string())))
        .transpose()?;

    // The API body carries no explicit session id (unlike the channel
    // adapters, which derive one from the platform event); fall back to a
    // stable per-user session so repeated calls without `conversation_id`
    // resume the same conversation instead of opening a fresh one each time.
    let session_id = format!("api:{user_id}");
    let mut inbound = InboundMessage::new(business_id, user_id, session_id, req.message);
    inbound.conversation_id = conversation_id;
    inbound.agent_id = agent_id;
    if let Some(sender_type) = req.sender_type.as_deref() {
        inbound.sender_type = SenderType::parse(sender_type);
    }

    let outcome = state.orchestrator.handle(inbound).await?;

    let (response, conversation_id) = match outcome {
        Outcome::Replied { reply, conversation_id, .. } => (reply, conversation_id),
        Outcome::Paused { conversation_id } => (String::new(), conversation_id),
    };

    Ok(Json(MessageResponse {
        response,
        conversation_id: conversation_id.to_string(),
    }))
}

/// GET /conversations/{user_id}?business_id=...
pub async fn list_conversations(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<TenantContext>,
    Path(user_id): Path<String>,
    Query(query): Query<HashMap<String, String>>,
) -> Result<Json<Vec<Conversation>>, FlowlineError> {
    let business_id = resolve_target_business(&ctx, query.get("business_id").map(String::as_str))?;
    let user_id: UserId = user_id
        .parse()
        .map_err(|_| FlowlineError::InvalidRequest("invalid user_id".to_string()))?;
    Ok(Json(state.store.list_conversations_for_user(&business_id, &user_id)?))
}
