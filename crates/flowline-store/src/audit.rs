use chrono::Utc;
use flowline_core::ids::{BusinessId, LogId, UserId};
use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::error::Result;
use crate::types::AuditLog;

pub fn record_audit_log(conn: &Connection, log: &AuditLog) -> Result<()> {
    conn.execute(
        "INSERT INTO audit_logs (log_id, business_id, user_id, action_type, action_data, created_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            log.log_id.to_string(),
            log.business_id.to_string(),
            log.user_id.as_ref().map(|u| u.to_string()),
            log.action_type,
            serde_json::to_string(&log.action_data)?,
            log.created_at.to_rfc3339(),
        ],
    )?;
    Ok(())
}

pub fn list_audit_logs(conn: &Connection, business_id: &BusinessId, limit: u32) -> Result<Vec<AuditLog>> {
    let mut stmt = conn.prepare(
        "SELECT log_id, business_id, user_id, action_type, action_data, created_at \
         FROM audit_logs WHERE business_id = ?1 ORDER BY created_at DESC LIMIT ?2",
    )?;
    let rows = stmt
        .query_map(params![business_id.to_string(), limit], |row| {
            let log_id: String = row.get(0)?;
            let business_id: String = row.get(1)?;
            let user_id: Option<String> = row.get(2)?;
            let action_data: String = row.get(4)?;
            let created_at: String = row.get(5)?;
            Ok(AuditLog {
                log_id: LogId(Uuid::parse_str(&log_id).unwrap_or_default()),
                business_id: BusinessId(Uuid::parse_str(&business_id).unwrap_or_default()),
                user_id: user_id
                    .and_then(|u| Uuid::parse_str(&u).ok())
                    .map(UserId),
                action_type: row.get(3)?,
                action_data: serde_json::from_str(&action_data).unwrap_or(serde_json::Value::Null),
                created_at: created_at.parse().unwrap_or_else(|_| Utc::now()),
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}
