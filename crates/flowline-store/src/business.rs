use chrono::Utc;
use flowline_core::ids::{BusinessId, UserId};
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use crate::error::{Result, StoreError};
use crate::types::Business;

const BUSINESS_SELECT_SQL: &str = "SELECT business_id, business_name, owner_id, internal_api_key, \
     business_description, address, phone_number, website, fallback_reply, created_at \
     FROM businesses";

fn row_to_business(row: &Row<'_>) -> rusqlite::Result<Business> {
    let business_id: String = row.get(0)?;
    let owner_id: String = row.get(2)?;
    let created_at: String = row.get(9)?;
    Ok(Business {
        business_id: BusinessId(Uuid::parse_str(&business_id).unwrap_or_default()),
        business_name: row.get(1)?,
        owner_id: UserId(Uuid::parse_str(&owner_id).unwrap_or_default()),
        internal_api_key: row.get(3)?,
        business_description: row.get(4)?,
        address: row.get(5)?,
        phone_number: row.get(6)?,
        website: row.get(7)?,
        fallback_reply: row.get(8)?,
        created_at: created_at.parse().unwrap_or_else(|_| Utc::now()),
    })
}

pub fn create_business(conn: &Connection, business: &Business) -> Result<()> {
    let existing: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM businesses WHERE business_name = ?1",
            params![business.business_name],
            |r| r.get(0),
        )
        .optional()?;
    if existing.is_some() {
        return Err(StoreError::Conflict(format!(
            "business name '{}' already in use",
            business.business_name
        )));
    }
    conn.execute(
        "INSERT INTO businesses (business_id, business_name, owner_id, internal_api_key, \
         business_description, address, phone_number, website, fallback_reply, created_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            business.business_id.to_string(),
            business.business_name,
            business.owner_id.to_string(),
            business.internal_api_key,
            business.business_description,
            business.address,
            business.phone_number,
            business.website,
            business.fallback_reply,
            business.created_at.to_rfc3339(),
        ],
    )?;
    Ok(())
}

/// Updates the mutable profile fields of a business (the `POST
/// /api/save-config` surface). `business_name`, `owner_id`, and
/// `internal_api_key` are immutable after creation.
pub fn update_business(conn: &Connection, business: &Business) -> Result<()> {
    let changed = conn.execute(
        "UPDATE businesses SET business_description = ?1, address = ?2, phone_number = ?3, \
         website = ?4, fallback_reply = ?5 WHERE business_id = ?6",
        params![
            business.business_description,
            business.address,
            business.phone_number,
            business.website,
            business.fallback_reply,
            business.business_id.to_string(),
        ],
    )?;
    if changed == 0 {
        return Err(StoreError::NotFound(format!("business {}", business.business_id)));
    }
    Ok(())
}

pub fn get_business(conn: &Connection, id: &BusinessId) -> Result<Business> {
    conn.query_row(
        &format!("{BUSINESS_SELECT_SQL} WHERE business_id = ?1"),
        params![id.to_string()],
        row_to_business,
    )
    .optional()?
    .ok_or_else(|| StoreError::NotFound(format!("business {id}")))
}

pub fn find_business_by_api_key(conn: &Connection, api_key: &str) -> Result<Option<Business>> {
    Ok(conn
        .query_row(
            &format!("{BUSINESS_SELECT_SQL} WHERE internal_api_key = ?1"),
            params![api_key],
            row_to_business,
        )
        .optional()?)
}

pub fn find_business_by_name(conn: &Connection, name: &str) -> Result<Option<Business>> {
    Ok(conn
        .query_row(
            &format!("{BUSINESS_SELECT_SQL} WHERE business_name = ?1"),
            params![name],
            row_to_business,
        )
        .optional()?)
}

/// Used by the WhatsApp webhook adapter to map a platform recipient number
/// to a tenant.
pub fn find_business_by_phone_number(conn: &Connection, phone_number: &str) -> Result<Option<Business>> {
    Ok(conn
        .query_row(
            &format!("{BUSINESS_SELECT_SQL} WHERE phone_number = ?1"),
            params![phone_number],
            row_to_business,
        )
        .optional()?)
}
