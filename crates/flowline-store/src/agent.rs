use chrono::Utc;
use flowline_core::ids::{AgentId, BusinessId};
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use crate::error::{Result, StoreError};
use crate::types::Agent;

const AGENT_SELECT_SQL: &str =
    "SELECT agent_id, business_id, agent_name, created_at FROM agents";

fn row_to_agent(row: &Row<'_>) -> rusqlite::Result<Agent> {
    let agent_id: String = row.get(0)?;
    let business_id: String = row.get(1)?;
    let created_at: String = row.get(3)?;
    Ok(Agent {
        agent_id: AgentId(Uuid::parse_str(&agent_id).unwrap_or_default()),
        business_id: BusinessId(Uuid::parse_str(&business_id).unwrap_or_default()),
        agent_name: row.get(2)?,
        created_at: created_at.parse().unwrap_or_else(|_| Utc::now()),
    })
}

pub fn create_agent(conn: &Connection, agent: &Agent) -> Result<()> {
    conn.execute(
        "INSERT INTO agents (agent_id, business_id, agent_name, created_at) \
         VALUES (?1, ?2, ?3, ?4)",
        params![
            agent.agent_id.to_string(),
            agent.business_id.to_string(),
            agent.agent_name,
            agent.created_at.to_rfc3339(),
        ],
    )?;
    Ok(())
}

pub fn get_agent(conn: &Connection, id: &AgentId) -> Result<Agent> {
    conn.query_row(
        &format!("{AGENT_SELECT_SQL} WHERE agent_id = ?1"),
        params![id.to_string()],
        row_to_agent,
    )
    .optional()?
    .ok_or_else(|| StoreError::NotFound(format!("agent {id}")))
}

pub fn list_agents_for_business(conn: &Connection, business_id: &BusinessId) -> Result<Vec<Agent>> {
    let mut stmt =
        conn.prepare(&format!("{AGENT_SELECT_SQL} WHERE business_id = ?1 ORDER BY created_at"))?;
    let rows = stmt
        .query_map(params![business_id.to_string()], row_to_agent)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}
