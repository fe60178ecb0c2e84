use chrono::Utc;
use flowline_core::ids::UserId;
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use crate::error::{Result, StoreError};
use crate::types::User;

const USER_SELECT_SQL: &str =
    "SELECT user_id, first_name, last_name, email, created_at, updated_at FROM users";

fn row_to_user(row: &Row<'_>) -> rusqlite::Result<User> {
    let user_id: String = row.get(0)?;
    let created_at: String = row.get(4)?;
    let updated_at: String = row.get(5)?;
    Ok(User {
        user_id: UserId(Uuid::parse_str(&user_id).unwrap_or_default()),
        first_name: row.get(1)?,
        last_name: row.get(2)?,
        email: row.get(3)?,
        created_at: created_at.parse().unwrap_or_else(|_| Utc::now()),
        updated_at: updated_at.parse().unwrap_or_else(|_| Utc::now()),
    })
}

pub fn create_user(conn: &Connection, user: &User) -> Result<()> {
    conn.execute(
        "INSERT INTO users (user_id, first_name, last_name, email, created_at, updated_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            user.user_id.to_string(),
            user.first_name,
            user.last_name,
            user.email,
            user.created_at.to_rfc3339(),
            user.updated_at.to_rfc3339(),
        ],
    )?;
    Ok(())
}

pub fn get_user(conn: &Connection, id: &UserId) -> Result<User> {
    conn.query_row(
        &format!("{USER_SELECT_SQL} WHERE user_id = ?1"),
        params![id.to_string()],
        row_to_user,
    )
    .optional()?
    .ok_or_else(|| StoreError::NotFound(format!("user {id}")))
}

/// Returns the user if present, otherwise `None` — callers create the user
/// on first interaction rather than this function doing it implicitly.
pub fn find_user(conn: &Connection, id: &UserId) -> Result<Option<User>> {
    Ok(conn
        .query_row(
            &format!("{USER_SELECT_SQL} WHERE user_id = ?1"),
            params![id.to_string()],
            row_to_user,
        )
        .optional()?)
}
