use chrono::Utc;
use flowline_core::ids::{AgentId, BusinessId, ConversationId, ExtractionId, MessageId, StageId, UserId};
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use crate::error::{Result, StoreError};
use crate::types::{Conversation, ConversationStatus, ExtractedData, Message, SenderType};

const CONVERSATION_SELECT_SQL: &str = "SELECT conversation_id, business_id, user_id, agent_id, \
     current_stage_id, session_id, start_time, last_updated, status, conversation_summary, \
     llm_call_id FROM conversations";

fn parse_uuid_opt(s: Option<String>) -> Option<Uuid> {
    s.and_then(|s| Uuid::parse_str(&s).ok())
}

fn row_to_conversation(row: &Row<'_>) -> rusqlite::Result<Conversation> {
    let conversation_id: String = row.get(0)?;
    let business_id: String = row.get(1)?;
    let user_id: String = row.get(2)?;
    let agent_id: Option<String> = row.get(3)?;
    let current_stage_id: Option<String> = row.get(4)?;
    let start_time: String = row.get(6)?;
    let last_updated: String = row.get(7)?;
    let status: String = row.get(8)?;
    Ok(Conversation {
        conversation_id: ConversationId(Uuid::parse_str(&conversation_id).unwrap_or_default()),
        business_id: BusinessId(Uuid::parse_str(&business_id).unwrap_or_default()),
        user_id: UserId(Uuid::parse_str(&user_id).unwrap_or_default()),
        agent_id: parse_uuid_opt(agent_id).map(AgentId),
        current_stage_id: parse_uuid_opt(current_stage_id).map(StageId),
        session_id: row.get(5)?,
        start_time: start_time.parse().unwrap_or_else(|_| Utc::now()),
        last_updated: last_updated.parse().unwrap_or_else(|_| Utc::now()),
        status: ConversationStatus::parse(&status),
        conversation_summary: row.get(9)?,
        llm_call_id: row.get(10)?,
    })
}

pub fn create_conversation(conn: &Connection, conversation: &Conversation) -> Result<()> {
    conn.execute(
        "INSERT INTO conversations (conversation_id, business_id, user_id, agent_id, \
         current_stage_id, session_id, start_time, last_updated, status, conversation_summary, \
         llm_call_id) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            conversation.conversation_id.to_string(),
            conversation.business_id.to_string(),
            conversation.user_id.to_string(),
            conversation.agent_id.as_ref().map(|a| a.to_string()),
            conversation.current_stage_id.as_ref().map(|s| s.to_string()),
            conversation.session_id,
            conversation.start_time.to_rfc3339(),
            conversation.last_updated.to_rfc3339(),
            conversation.status.as_str(),
            conversation.conversation_summary,
            conversation.llm_call_id,
        ],
    )?;
    Ok(())
}

pub fn get_conversation(conn: &Connection, id: &ConversationId) -> Result<Conversation> {
    conn.query_row(
        &format!("{CONVERSATION_SELECT_SQL} WHERE conversation_id = ?1"),
        params![id.to_string()],
        row_to_conversation,
    )
    .optional()?
    .ok_or_else(|| StoreError::NotFound(format!("conversation {id}")))
}

/// Finds the active conversation for a (business, user, session) triple, if any.
pub fn find_active_conversation(
    conn: &Connection,
    business_id: &BusinessId,
    user_id: &UserId,
    session_id: &str,
) -> Result<Option<Conversation>> {
    Ok(conn
        .query_row(
            &format!(
                "{CONVERSATION_SELECT_SQL} WHERE business_id = ?1 AND user_id = ?2 \
                 AND session_id = ?3 AND status = 'active' ORDER BY last_updated DESC LIMIT 1"
            ),
            params![business_id.to_string(), user_id.to_string(), session_id],
            row_to_conversation,
        )
        .optional()?)
}

pub fn list_conversations_for_user(
    conn: &Connection,
    business_id: &BusinessId,
    user_id: &UserId,
) -> Result<Vec<Conversation>> {
    let mut stmt = conn.prepare(&format!(
        "{CONVERSATION_SELECT_SQL} WHERE business_id = ?1 AND user_id = ?2 ORDER BY start_time"
    ))?;
    let rows = stmt
        .query_map(
            params![business_id.to_string(), user_id.to_string()],
            row_to_conversation,
        )?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

pub fn set_conversation_stage(
    conn: &Connection,
    id: &ConversationId,
    stage_id: &StageId,
    now: chrono::DateTime<Utc>,
) -> Result<()> {
    let changed = conn.execute(
        "UPDATE conversations SET current_stage_id = ?1, last_updated = ?2 WHERE conversation_id = ?3",
        params![stage_id.to_string(), now.to_rfc3339(), id.to_string()],
    )?;
    if changed == 0 {
        return Err(StoreError::NotFound(format!("conversation {id}")));
    }
    Ok(())
}

pub fn touch_conversation(conn: &Connection, id: &ConversationId, now: chrono::DateTime<Utc>) -> Result<()> {
    conn.execute(
        "UPDATE conversations SET last_updated = ?1 WHERE conversation_id = ?2",
        params![now.to_rfc3339(), id.to_string()],
    )?;
    Ok(())
}

/// Records the last response-generation call and bumps `last_updated`, per
/// Phase 3 step 5.
pub fn set_conversation_llm_call(
    conn: &Connection,
    id: &ConversationId,
    call_id: &str,
    now: chrono::DateTime<Utc>,
) -> Result<()> {
    conn.execute(
        "UPDATE conversations SET llm_call_id = ?1, last_updated = ?2 WHERE conversation_id = ?3",
        params![call_id, now.to_rfc3339(), id.to_string()],
    )?;
    Ok(())
}

pub fn set_conversation_status(
    conn: &Connection,
    id: &ConversationId,
    status: ConversationStatus,
    now: chrono::DateTime<Utc>,
) -> Result<()> {
    let changed = conn.execute(
        "UPDATE conversations SET status = ?1, last_updated = ?2 WHERE conversation_id = ?3",
        params![status.as_str(), now.to_rfc3339(), id.to_string()],
    )?;
    if changed == 0 {
        return Err(StoreError::NotFound(format!("conversation {id}")));
    }
    Ok(())
}

pub fn append_message(conn: &Connection, message: &Message) -> Result<()> {
    conn.execute(
        "INSERT INTO messages (message_id, conversation_id, message_content, sender_type, created_at) \
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            message.message_id.to_string(),
            message.conversation_id.to_string(),
            message.message_content,
            message.sender_type.as_str(),
            message.created_at.to_rfc3339(),
        ],
    )?;
    Ok(())
}

pub fn list_messages(
    conn: &Connection,
    conversation_id: &ConversationId,
    limit: Option<u32>,
) -> Result<Vec<Message>> {
    let sql = match limit {
        Some(n) => format!(
            "SELECT message_id, conversation_id, message_content, sender_type, created_at \
             FROM messages WHERE conversation_id = ?1 ORDER BY created_at DESC LIMIT {n}"
        ),
        None => "SELECT message_id, conversation_id, message_content, sender_type, created_at \
             FROM messages WHERE conversation_id = ?1 ORDER BY created_at"
            .to_string(),
    };
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt
        .query_map(params![conversation_id.to_string()], |row| {
            let message_id: String = row.get(0)?;
            let conversation_id: String = row.get(1)?;
            let sender_type: String = row.get(3)?;
            let created_at: String = row.get(4)?;
            Ok(Message {
                message_id: MessageId(Uuid::parse_str(&message_id).unwrap_or_default()),
                conversation_id: ConversationId(Uuid::parse_str(&conversation_id).unwrap_or_default()),
                message_content: row.get(2)?,
                sender_type: SenderType::parse(&sender_type),
                created_at: created_at.parse().unwrap_or_else(|_| Utc::now()),
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    if limit.is_some() {
        rows.reverse();
    }
    Ok(rows)
}

pub fn record_extracted_data(conn: &Connection, extraction: &ExtractedData) -> Result<()> {
    conn.execute(
        "INSERT INTO extracted_data (extraction_id, conversation_id, stage_id, data_type, \
         extracted_data, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            extraction.extraction_id.to_string(),
            extraction.conversation_id.to_string(),
            extraction.stage_id.as_ref().map(|s| s.to_string()),
            extraction.data_type,
            serde_json::to_string(&extraction.extracted_data)?,
            extraction.created_at.to_rfc3339(),
        ],
    )?;
    Ok(())
}

pub fn list_extracted_data(
    conn: &Connection,
    conversation_id: &ConversationId,
) -> Result<Vec<ExtractedData>> {
    let mut stmt = conn.prepare(
        "SELECT extraction_id, conversation_id, stage_id, data_type, extracted_data, created_at \
         FROM extracted_data WHERE conversation_id = ?1 ORDER BY created_at",
    )?;
    let rows = stmt
        .query_map(params![conversation_id.to_string()], |row| {
            let extraction_id: String = row.get(0)?;
            let conversation_id: String = row.get(1)?;
            let stage_id: Option<String> = row.get(2)?;
            let extracted_data: String = row.get(4)?;
            let created_at: String = row.get(5)?;
            Ok(ExtractedData {
                extraction_id: ExtractionId(Uuid::parse_str(&extraction_id).unwrap_or_default()),
                conversation_id: ConversationId(
                    Uuid::parse_str(&conversation_id).unwrap_or_default(),
                ),
                stage_id: parse_uuid_opt(stage_id).map(StageId),
                data_type: row.get(3)?,
                extracted_data: serde_json::from_str(&extracted_data)
                    .unwrap_or(serde_json::Value::Null),
                created_at: created_at.parse().unwrap_or_else(|_| Utc::now()),
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}
