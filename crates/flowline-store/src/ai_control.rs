use chrono::Utc;
use flowline_core::ids::{BusinessId, ConversationId, UserId};
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::Result;
use crate::types::AiControlSetting;

fn scope_clause(conversation_id: &Option<ConversationId>, user_id: &Option<UserId>) -> &'static str {
    match (conversation_id, user_id) {
        (Some(_), _) => "conversation_id = ?2",
        (None, Some(_)) => "conversation_id IS NULL AND user_id = ?2",
        (None, None) => "conversation_id IS NULL AND user_id IS NULL",
    }
}

/// Upserts the pause setting for exactly one scope (conversation, user, or
/// business-wide). `NULL` composite keys make `INSERT OR REPLACE` unreliable
/// in SQLite, so this deletes any existing row at the same scope first.
pub fn set_pause(conn: &Connection, setting: &AiControlSetting) -> Result<()> {
    let scope_id = setting
        .conversation_id
        .as_ref()
        .map(|c| c.to_string())
        .or_else(|| setting.user_id.as_ref().map(|u| u.to_string()));
    conn.execute(
        &format!(
            "DELETE FROM ai_control_settings WHERE business_id = ?1 AND {}",
            scope_clause(&setting.conversation_id, &setting.user_id)
        ),
        params![setting.business_id.to_string(), scope_id],
    )?;
    conn.execute(
        "INSERT INTO ai_control_settings (business_id, conversation_id, user_id, paused, \
         expires_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            setting.business_id.to_string(),
            setting.conversation_id.as_ref().map(|c| c.to_string()),
            setting.user_id.as_ref().map(|u| u.to_string()),
            setting.paused as i64,
            setting.expires_at.map(|d| d.to_rfc3339()),
            setting.updated_at.to_rfc3339(),
        ],
    )?;
    Ok(())
}

fn row_to_setting(
    business_id: &BusinessId,
    conversation_id: Option<ConversationId>,
    user_id: Option<UserId>,
    row: &rusqlite::Row<'_>,
) -> rusqlite::Result<AiControlSetting> {
    let paused: i64 = row.get(0)?;
    let expires_at: Option<String> = row.get(1)?;
    let updated_at: String = row.get(2)?;
    Ok(AiControlSetting {
        business_id: business_id.clone(),
        conversation_id,
        user_id,
        paused: paused != 0,
        expires_at: expires_at.and_then(|s| s.parse().ok()),
        updated_at: updated_at.parse().unwrap_or_else(|_| Utc::now()),
    })
}

/// Resolves the effective pause state for a conversation using the most
/// specific non-expired setting: conversation scope, then user scope, then
/// business-wide. Returns `false` (not paused) if nothing applies.
pub fn is_paused(
    conn: &Connection,
    business_id: &BusinessId,
    conversation_id: &ConversationId,
    user_id: &UserId,
) -> Result<bool> {
    let now = Utc::now().to_rfc3339();

    let conversation_setting = conn
        .query_row(
            "SELECT paused, expires_at, updated_at FROM ai_control_settings \
             WHERE business_id = ?1 AND conversation_id = ?2 \
             AND (expires_at IS NULL OR expires_at > ?3)",
            params![business_id.to_string(), conversation_id.to_string(), now],
            |row| row_to_setting(business_id, Some(conversation_id.clone()), None, row),
        )
        .optional()?;
    if let Some(setting) = conversation_setting {
        return Ok(setting.paused);
    }

    let user_setting = conn
        .query_row(
            "SELECT paused, expires_at, updated_at FROM ai_control_settings \
             WHERE business_id = ?1 AND conversation_id IS NULL AND user_id = ?2 \
             AND (expires_at IS NULL OR expires_at > ?3)",
            params![business_id.to_string(), user_id.to_string(), now],
            |row| row_to_setting(business_id, None, Some(user_id.clone()), row),
        )
        .optional()?;
    if let Some(setting) = user_setting {
        return Ok(setting.paused);
    }

    let business_setting = conn
        .query_row(
            "SELECT paused, expires_at, updated_at FROM ai_control_settings \
             WHERE business_id = ?1 AND conversation_id IS NULL AND user_id IS NULL \
             AND (expires_at IS NULL OR expires_at > ?2)",
            params![business_id.to_string(), now],
            |row| row_to_setting(business_id, None, None, row),
        )
        .optional()?;

    Ok(business_setting.map(|s| s.paused).unwrap_or(false))
}
