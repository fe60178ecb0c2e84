use chrono::Utc;
use flowline_core::ids::{BusinessId, TemplateId, TemplateVariableId};
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use crate::error::{Result, StoreError};
use crate::types::{Template, TemplateType, TemplateVariable};

const TEMPLATE_SELECT_SQL: &str = "SELECT template_id, business_id, template_name, template_type, \
     content, system_prompt, created_at, updated_at FROM templates";

fn row_to_template(row: &Row<'_>) -> rusqlite::Result<Template> {
    let template_id: String = row.get(0)?;
    let business_id: String = row.get(1)?;
    let template_type: String = row.get(3)?;
    let created_at: String = row.get(6)?;
    let updated_at: String = row.get(7)?;
    Ok(Template {
        template_id: TemplateId(Uuid::parse_str(&template_id).unwrap_or_default()),
        business_id: BusinessId(Uuid::parse_str(&business_id).unwrap_or_default()),
        template_name: row.get(2)?,
        template_type: TemplateType::parse(&template_type).unwrap_or(TemplateType::ResponseGeneration),
        content: row.get(4)?,
        system_prompt: row.get(5)?,
        created_at: created_at.parse().unwrap_or_else(|_| Utc::now()),
        updated_at: updated_at.parse().unwrap_or_else(|_| Utc::now()),
    })
}

pub fn create_template(conn: &Connection, template: &Template) -> Result<()> {
    conn.execute(
        "INSERT INTO templates (template_id, business_id, template_name, template_type, \
         content, system_prompt, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            template.template_id.to_string(),
            template.business_id.to_string(),
            template.template_name,
            template.template_type.as_str(),
            template.content,
            template.system_prompt,
            template.created_at.to_rfc3339(),
            template.updated_at.to_rfc3339(),
        ],
    )?;
    Ok(())
}

pub fn update_template(conn: &Connection, template: &Template) -> Result<()> {
    let changed = conn.execute(
        "UPDATE templates SET template_name = ?1, template_type = ?2, content = ?3, \
         system_prompt = ?4, updated_at = ?5 WHERE template_id = ?6 AND business_id = ?7",
        params![
            template.template_name,
            template.template_type.as_str(),
            template.content,
            template.system_prompt,
            template.updated_at.to_rfc3339(),
            template.template_id.to_string(),
            template.business_id.to_string(),
        ],
    )?;
    if changed == 0 {
        return Err(StoreError::NotFound(format!(
            "template {}",
            template.template_id
        )));
    }
    Ok(())
}

pub fn get_template(conn: &Connection, id: &TemplateId) -> Result<Template> {
    conn.query_row(
        &format!("{TEMPLATE_SELECT_SQL} WHERE template_id = ?1"),
        params![id.to_string()],
        row_to_template,
    )
    .optional()?
    .ok_or_else(|| StoreError::NotFound(format!("template {id}")))
}

/// The business's own `default_`-prefixed template of the given type, if one
/// has been configured. Oldest wins if more than one exists.
pub fn find_default_template(
    conn: &Connection,
    business_id: &BusinessId,
    template_type: TemplateType,
) -> Result<Option<Template>> {
    conn.query_row(
        &format!("{TEMPLATE_SELECT_SQL} WHERE business_id = ?1 AND template_type = ?2 ORDER BY created_at LIMIT 1"),
        params![business_id.to_string(), template_type.default_variant().as_str()],
        row_to_template,
    )
    .optional()
    .map_err(Into::into)
}

pub fn list_templates(conn: &Connection, business_id: &BusinessId) -> Result<Vec<Template>> {
    let mut stmt = conn.prepare(&format!(
        "{TEMPLATE_SELECT_SQL} WHERE business_id = ?1 ORDER BY created_at"
    ))?;
    let rows = stmt
        .query_map(params![business_id.to_string()], row_to_template)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

pub fn delete_template(conn: &Connection, id: &TemplateId) -> Result<()> {
    let in_use: i64 = conn.query_row(
        "SELECT COUNT(*) FROM stages WHERE stage_selection_template_id = ?1 \
         OR data_extraction_template_id = ?1 OR response_generation_template_id = ?1",
        params![id.to_string()],
        |r| r.get(0),
    )?;
    if in_use > 0 {
        return Err(StoreError::Conflict(format!(
            "template {id} is still referenced by one or more stages"
        )));
    }
    conn.execute(
        "DELETE FROM template_variable_usage WHERE template_id = ?1",
        params![id.to_string()],
    )?;
    let changed = conn.execute(
        "DELETE FROM templates WHERE template_id = ?1",
        params![id.to_string()],
    )?;
    if changed == 0 {
        return Err(StoreError::NotFound(format!("template {id}")));
    }
    Ok(())
}

pub fn get_or_create_variable(conn: &Connection, name: &str) -> Result<TemplateVariableId> {
    if let Some(id) = conn
        .query_row(
            "SELECT variable_id FROM template_variables WHERE variable_name = ?1",
            params![name],
            |r| r.get::<_, String>(0),
        )
        .optional()?
    {
        return Ok(TemplateVariableId(
            Uuid::parse_str(&id).unwrap_or_default(),
        ));
    }
    let id = TemplateVariableId::new();
    conn.execute(
        "INSERT INTO template_variables (variable_id, variable_name, category, is_dynamic) \
         VALUES (?1, ?2, 'unknown', 0)",
        params![id.to_string(), name],
    )?;
    Ok(id)
}

/// Rebuild the usage rows for one template from a freshly-discovered variable
/// name set. Idempotent — safe to call on every insert/update.
pub fn replace_usage(conn: &Connection, template_id: &TemplateId, names: &[String]) -> Result<()> {
    conn.execute(
        "DELETE FROM template_variable_usage WHERE template_id = ?1",
        params![template_id.to_string()],
    )?;
    for name in names {
        let variable_id = get_or_create_variable(conn, name)?;
        conn.execute(
            "INSERT OR IGNORE INTO template_variable_usage (template_id, variable_id) \
             VALUES (?1, ?2)",
            params![template_id.to_string(), variable_id.to_string()],
        )?;
    }
    Ok(())
}

pub fn list_variables(conn: &Connection) -> Result<Vec<TemplateVariable>> {
    let mut stmt = conn.prepare(
        "SELECT variable_id, variable_name, description, default_value, example, category, \
         is_dynamic FROM template_variables ORDER BY variable_name",
    )?;
    let rows = stmt
        .query_map([], |row| {
            let variable_id: String = row.get(0)?;
            Ok(TemplateVariable {
                variable_id: TemplateVariableId(Uuid::parse_str(&variable_id).unwrap_or_default()),
                variable_name: row.get(1)?,
                description: row.get(2)?,
                default_value: row.get(3)?,
                example: row.get(4)?,
                category: row.get(5)?,
                is_dynamic: row.get::<_, i64>(6)? != 0,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::init_db;

    fn conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        init_db(&conn).unwrap();
        conn
    }

    #[test]
    fn unknown_variable_is_not_dynamic() {
        let conn = conn();
        let id = get_or_create_variable(&conn, "zzz").unwrap();
        let vars = list_variables(&conn).unwrap();
        let v = vars.iter().find(|v| v.variable_id.to_string() == id.to_string()).unwrap();
        assert_eq!(v.category, "unknown");
        assert!(!v.is_dynamic);
    }

    #[test]
    fn finds_business_default_template() {
        let conn = conn();
        let business_id = BusinessId::new();
        conn.execute(
            "INSERT INTO businesses (business_id, business_name, owner_id, internal_api_key, created_at) \
             VALUES (?1, 'Acme', ?2, 'key', ?3)",
            params![business_id.to_string(), Uuid::new_v4().to_string(), Utc::now().to_rfc3339()],
        )
        .unwrap();

        assert!(find_default_template(&conn, &business_id, TemplateType::StageSelection)
            .unwrap()
            .is_none());

        let default_template = Template {
            template_id: TemplateId::new(),
            business_id: business_id.clone(),
            template_name: "Fallback selector".into(),
            template_type: TemplateType::DefaultStageSelection,
            content: "{available_stages}".into(),
            system_prompt: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        create_template(&conn, &default_template).unwrap();

        let found = find_default_template(&conn, &business_id, TemplateType::StageSelection)
            .unwrap()
            .expect("business default should be found");
        assert_eq!(found.template_id.to_string(), default_template.template_id.to_string());
    }
}
