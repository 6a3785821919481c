use rusqlite::{Connection, OptionalExtension, params};
use tracing::info;
use uuid::Uuid;

use banter_types::models::User;

use crate::error::{ChatError, Result, is_unique_violation};
use crate::models::{Credentials, USER_COLUMNS, now, user_from_row, uuid_at};
use crate::Database;

pub const USERNAME_MIN_LEN: usize = 3;
pub const USERNAME_MAX_LEN: usize = 10;

impl Database {
    /// Create a user. Handles are unique case-insensitively.
    pub fn create_user(&self, username: &str, password_hash: &str) -> Result<User> {
        validate_username(username)?;

        self.with_tx(|tx| {
            if query_user_by_username(tx, username)?.is_some() {
                return Err(ChatError::Conflict("Username has already been taken".into()));
            }

            let id = Uuid::new_v4();
            tx.execute(
                "INSERT INTO users (id, username, password, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![id.to_string(), username, password_hash, now()],
            )
            .map_err(|e| {
                if is_unique_violation(&e) {
                    ChatError::Conflict("Username has already been taken".into())
                } else {
                    e.into()
                }
            })?;

            info!("Created user {} ({})", username, id);
            query_user_by_id(tx, id)?.ok_or_else(|| ChatError::NotFound("User not found.".into()))
        })
    }

    pub fn get_user_by_id(&self, id: Uuid) -> Result<Option<User>> {
        self.with_conn(|conn| Ok(query_user_by_id(conn, id)?))
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        self.with_conn(|conn| Ok(query_user_by_username(conn, username)?))
    }

    pub fn get_credentials(&self, username: &str) -> Result<Option<Credentials>> {
        self.with_conn(|conn| {
            let creds = conn
                .query_row(
                    "SELECT id, username, password FROM users WHERE username = ?1",
                    [username],
                    |row| {
                        Ok(Credentials {
                            id: uuid_at(row, 0)?,
                            username: row.get(1)?,
                            password_hash: row.get(2)?,
                        })
                    },
                )
                .optional()?;
            Ok(creds)
        })
    }

    /// Everyone except `id`, alphabetically.
    pub fn list_users_except(&self, id: Uuid) -> Result<Vec<User>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM users WHERE id <> ?1 ORDER BY username",
                USER_COLUMNS
            ))?;
            let rows = stmt
                .query_map([id.to_string()], user_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }

    /// Ids of every user except `id`; the global-chat notification audience.
    pub fn user_ids_except(&self, id: Uuid) -> Result<Vec<Uuid>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT id FROM users WHERE id <> ?1")?;
            let rows = stmt
                .query_map([id.to_string()], |row| uuid_at(row, 0))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }

    /// Delete a user. Friendships, requests, conversations and messages go
    /// with it via `ON DELETE CASCADE`.
    pub fn delete_user(&self, id: Uuid) -> Result<()> {
        self.with_tx(|tx| {
            let removed = tx.execute("DELETE FROM users WHERE id = ?1", [id.to_string()])?;
            if removed == 0 {
                return Err(ChatError::NotFound("User not found.".into()));
            }
            info!("Deleted user {}", id);
            Ok(())
        })
    }
}

fn validate_username(username: &str) -> Result<()> {
    if username.trim().is_empty() {
        return Err(ChatError::Validation("Username can't be blank".into()));
    }
    let len = username.chars().count();
    if len < USERNAME_MIN_LEN {
        return Err(ChatError::Validation(format!(
            "Username is too short (minimum is {} characters)",
            USERNAME_MIN_LEN
        )));
    }
    if len > USERNAME_MAX_LEN {
        return Err(ChatError::Validation(format!(
            "Username is too long (maximum is {} characters)",
            USERNAME_MAX_LEN
        )));
    }
    Ok(())
}

pub(crate) fn query_user_by_id(conn: &Connection, id: Uuid) -> rusqlite::Result<Option<User>> {
    conn.query_row(
        &format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS),
        [id.to_string()],
        user_from_row,
    )
    .optional()
}

/// Case-insensitive via the column's NOCASE collation.
fn query_user_by_username(conn: &Connection, username: &str) -> rusqlite::Result<Option<User>> {
    conn.query_row(
        &format!("SELECT {} FROM users WHERE username = ?1", USER_COLUMNS),
        [username],
        user_from_row,
    )
    .optional()
}

/// Load a user that an operation refers to, or fail with `NotFound`.
pub(crate) fn require_user(conn: &Connection, id: Uuid) -> Result<User> {
    query_user_by_id(conn, id)?.ok_or_else(|| ChatError::NotFound("User not found.".into()))
}
