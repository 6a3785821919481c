//! Row mapping between SQLite and the shared banter-types models.
//! Ids are TEXT UUIDs and timestamps are RFC 3339 TEXT.

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::Row;
use rusqlite::types::Type;
use uuid::Uuid;

use banter_types::models::{Conversation, FriendRequest, FriendRequestStatus, Message, User};

/// Login material. Never leaves the server.
pub struct Credentials {
    pub id: Uuid,
    pub username: String,
    pub password_hash: String,
}

pub(crate) const USER_COLUMNS: &str = "id, username, created_at";

pub(crate) const FRIEND_REQUEST_COLUMNS: &str =
    "id, sender_id, receiver_id, status, created_at, updated_at";

pub(crate) const CONVERSATION_COLUMNS: &str =
    "id, sender_id, receiver_id, created_at, updated_at";

/// Messages are always read joined to their author (`m` / `u`).
pub(crate) const MESSAGE_SELECT: &str =
    "SELECT m.id, m.user_id, u.username, m.conversation_id, m.body, m.created_at
     FROM messages m
     JOIN users u ON u.id = m.user_id";

/// Timestamp in the storage format. Fixed width, so TEXT ordering is
/// chronological.
pub(crate) fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn uuid_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Uuid> {
    let raw: String = row.get(idx)?;
    raw.parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn opt_uuid_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<Uuid>> {
    match row.get::<_, Option<String>>(idx)? {
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))),
        None => Ok(None),
    }
}

fn time_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub(crate) fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: uuid_at(row, 0)?,
        username: row.get(1)?,
        created_at: time_at(row, 2)?,
    })
}

pub(crate) fn friend_request_from_row(row: &Row<'_>) -> rusqlite::Result<FriendRequest> {
    let raw_status: String = row.get(3)?;
    let status: FriendRequestStatus = raw_status
        .parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(3, Type::Text, Box::new(e)))?;

    Ok(FriendRequest {
        id: uuid_at(row, 0)?,
        sender_id: uuid_at(row, 1)?,
        receiver_id: uuid_at(row, 2)?,
        status,
        created_at: time_at(row, 4)?,
        updated_at: time_at(row, 5)?,
    })
}

pub(crate) fn conversation_from_row(row: &Row<'_>) -> rusqlite::Result<Conversation> {
    Ok(Conversation {
        id: uuid_at(row, 0)?,
        sender_id: uuid_at(row, 1)?,
        receiver_id: uuid_at(row, 2)?,
        created_at: time_at(row, 3)?,
        updated_at: time_at(row, 4)?,
    })
}

pub(crate) fn message_from_row(row: &Row<'_>) -> rusqlite::Result<Message> {
    Ok(Message {
        id: uuid_at(row, 0)?,
        author_id: uuid_at(row, 1)?,
        author_username: row.get(2)?,
        conversation_id: opt_uuid_at(row, 3)?,
        body: row.get(4)?,
        created_at: time_at(row, 5)?,
    })
}
