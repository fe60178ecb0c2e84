use chrono::Utc;
use flowline_core::ids::{AgentId, BusinessId, StageId, TemplateId};
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use crate::error::{Result, StoreError};
use crate::types::{Stage, StageTransition};

const STAGE_SELECT_SQL: &str = "SELECT stage_id, business_id, agent_id, stage_name, \
     stage_description, stage_type, stage_selection_template_id, data_extraction_template_id, \
     response_generation_template_id, created_at, updated_at FROM stages";

fn parse_uuid_opt(s: Option<String>) -> Option<Uuid> {
    s.and_then(|s| Uuid::parse_str(&s).ok())
}

fn row_to_stage(row: &Row<'_>) -> rusqlite::Result<Stage> {
    let stage_id: String = row.get(0)?;
    let business_id: String = row.get(1)?;
    let agent_id: Option<String> = row.get(2)?;
    let sel_tpl: String = row.get(6)?;
    let ext_tpl: String = row.get(7)?;
    let resp_tpl: String = row.get(8)?;
    let created_at: String = row.get(9)?;
    let updated_at: String = row.get(10)?;
    Ok(Stage {
        stage_id: StageId(Uuid::parse_str(&stage_id).unwrap_or_default()),
        business_id: BusinessId(Uuid::parse_str(&business_id).unwrap_or_default()),
        agent_id: parse_uuid_opt(agent_id).map(AgentId),
        stage_name: row.get(3)?,
        stage_description: row.get(4)?,
        stage_type: row.get(5)?,
        stage_selection_template_id: TemplateId(Uuid::parse_str(&sel_tpl).unwrap_or_default()),
        data_extraction_template_id: TemplateId(Uuid::parse_str(&ext_tpl).unwrap_or_default()),
        response_generation_template_id: TemplateId(Uuid::parse_str(&resp_tpl).unwrap_or_default()),
        created_at: created_at.parse().unwrap_or_else(|_| Utc::now()),
        updated_at: updated_at.parse().unwrap_or_else(|_| Utc::now()),
    })
}

pub fn create_stage(conn: &Connection, stage: &Stage) -> Result<()> {
    conn.execute(
        "INSERT INTO stages (stage_id, business_id, agent_id, stage_name, stage_description, \
         stage_type, stage_selection_template_id, data_extraction_template_id, \
         response_generation_template_id, created_at, updated_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            stage.stage_id.to_string(),
            stage.business_id.to_string(),
            stage.agent_id.as_ref().map(|a| a.to_string()),
            stage.stage_name,
            stage.stage_description,
            stage.stage_type,
            stage.stage_selection_template_id.to_string(),
            stage.data_extraction_template_id.to_string(),
            stage.response_generation_template_id.to_string(),
            stage.created_at.to_rfc3339(),
            stage.updated_at.to_rfc3339(),
        ],
    )?;
    Ok(())
}

pub fn update_stage(conn: &Connection, stage: &Stage) -> Result<()> {
    let changed = conn.execute(
        "UPDATE stages SET agent_id = ?1, stage_name = ?2, stage_description = ?3, \
         stage_type = ?4, stage_selection_template_id = ?5, data_extraction_template_id = ?6, \
         response_generation_template_id = ?7, updated_at = ?8 \
         WHERE stage_id = ?9 AND business_id = ?10",
        params![
            stage.agent_id.as_ref().map(|a| a.to_string()),
            stage.stage_name,
            stage.stage_description,
            stage.stage_type,
            stage.stage_selection_template_id.to_string(),
            stage.data_extraction_template_id.to_string(),
            stage.response_generation_template_id.to_string(),
            stage.updated_at.to_rfc3339(),
            stage.stage_id.to_string(),
            stage.business_id.to_string(),
        ],
    )?;
    if changed == 0 {
        return Err(StoreError::NotFound(format!("stage {}", stage.stage_id)));
    }
    Ok(())
}

pub fn get_stage(conn: &Connection, id: &StageId) -> Result<Stage> {
    conn.query_row(
        &format!("{STAGE_SELECT_SQL} WHERE stage_id = ?1"),
        params![id.to_string()],
        row_to_stage,
    )
    .optional()?
    .ok_or_else(|| StoreError::NotFound(format!("stage {id}")))
}

/// Ordered by creation — the first row is the bootstrap fallback when no
/// stage is flagged `first_interaction`.
pub fn list_stages(conn: &Connection, business_id: &BusinessId) -> Result<Vec<Stage>> {
    let mut stmt = conn.prepare(&format!(
        "{STAGE_SELECT_SQL} WHERE business_id = ?1 ORDER BY created_at"
    ))?;
    let rows = stmt
        .query_map(params![business_id.to_string()], row_to_stage)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

pub fn delete_stage(conn: &Connection, id: &StageId) -> Result<()> {
    let referenced: i64 = conn.query_row(
        "SELECT COUNT(*) FROM conversations WHERE current_stage_id = ?1",
        params![id.to_string()],
        |r| r.get(0),
    )?;
    if referenced > 0 {
        return Err(StoreError::Conflict(format!(
            "stage {id} is the current stage of one or more conversations"
        )));
    }
    conn.execute(
        "DELETE FROM stage_transitions WHERE from_stage_id = ?1 OR to_stage_id = ?1",
        params![id.to_string()],
    )?;
    let changed = conn.execute("DELETE FROM stages WHERE stage_id = ?1", params![id.to_string()])?;
    if changed == 0 {
        return Err(StoreError::NotFound(format!("stage {id}")));
    }
    Ok(())
}

pub fn create_transition(conn: &Connection, transition: &StageTransition) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO stage_transitions (business_id, from_stage_id, to_stage_id, condition) \
         VALUES (?1, ?2, ?3, ?4)",
        params![
            transition.business_id.to_string(),
            transition.from_stage_id.to_string(),
            transition.to_stage_id.to_string(),
            transition.condition,
        ],
    )?;
    Ok(())
}

/// `None` means no transitions have been defined for this `from_stage_id` —
/// callers treat that as "any transition is permitted" per the open stage
/// machine default. `Some(set)` lists the stage ids that ARE allowed.
pub fn allowed_transitions(
    conn: &Connection,
    business_id: &BusinessId,
    from_stage_id: &StageId,
) -> Result<Option<Vec<StageId>>> {
    let mut stmt = conn.prepare(
        "SELECT to_stage_id FROM stage_transitions WHERE business_id = ?1 AND from_stage_id = ?2",
    )?;
    let rows = stmt
        .query_map(
            params![business_id.to_string(), from_stage_id.to_string()],
            |row| row.get::<_, String>(0),
        )?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    if rows.is_empty() {
        return Ok(None);
    }
    Ok(Some(
        rows.into_iter()
            .filter_map(|s| Uuid::parse_str(&s).ok())
            .map(StageId)
            .collect(),
    ))
}
