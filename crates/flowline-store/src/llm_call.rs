use chrono::Utc;
use flowline_core::ids::{BusinessId, CallId};
use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::error::Result;
use crate::types::LlmCall;

pub fn record_llm_call(conn: &Connection, call: &LlmCall) -> Result<()> {
    conn.execute(
        "INSERT INTO llm_calls (call_id, business_id, input_text, response, system_prompt, \
         call_type, error, timestamp) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            call.call_id.to_string(),
            call.business_id.to_string(),
            call.input_text,
            call.response,
            call.system_prompt,
            call.call_type,
            call.error,
            call.timestamp.to_rfc3339(),
        ],
    )?;
    Ok(())
}

pub fn list_llm_calls(conn: &Connection, business_id: &BusinessId, limit: u32) -> Result<Vec<LlmCall>> {
    let mut stmt = conn.prepare(
        "SELECT call_id, business_id, input_text, response, system_prompt, call_type, error, \
         timestamp FROM llm_calls WHERE business_id = ?1 ORDER BY timestamp DESC LIMIT ?2",
    )?;
    let rows = stmt
        .query_map(params![business_id.to_string(), limit], |row| {
            let call_id: String = row.get(0)?;
            let business_id: String = row.get(1)?;
            let timestamp: String = row.get(7)?;
            Ok(LlmCall {
                call_id: CallId(Uuid::parse_str(&call_id).unwrap_or_default()),
                business_id: BusinessId(Uuid::parse_str(&business_id).unwrap_or_default()),
                input_text: row.get(2)?,
                response: row.get(3)?,
                system_prompt: row.get(4)?,
                call_type: row.get(5)?,
                error: row.get(6)?,
                timestamp: timestamp.parse().unwrap_or_else(|_| Utc::now()),
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}
