use rusqlite::{Connection, params};
use tracing::debug;
use uuid::Uuid;

use banter_types::models::{Conversation, Message};

use crate::conversations::require_conversation;
use crate::error::{ChatError, Result};
use crate::friendships::is_friend_in;
use crate::models::{MESSAGE_SELECT, message_from_row, now};
use crate::users::require_user;
use crate::Database;

/// A stored direct message plus what the fan-out needs to route it.
#[derive(Debug, Clone)]
pub struct DirectMessage {
    pub message: Message,
    pub conversation: Conversation,
    pub recipient_id: Uuid,
}

impl Database {
    pub fn post_global_message(&self, author_id: Uuid, body: &str) -> Result<Message> {
        validate_body(body)?;

        self.with_tx(|tx| {
            require_user(tx, author_id)?;
            let id = insert_message(tx, author_id, None, None, body)?;
            debug!("Stored global message {} from {}", id, author_id);
            require_message(tx, id)
        })
    }

    /// Append to a conversation. The author must be a participant and still
    /// be friends with the other participant.
    pub fn post_conversation_message(
        &self,
        author_id: Uuid,
        conversation_id: Uuid,
        body: &str,
    ) -> Result<DirectMessage> {
        self.with_tx(|tx| {
            let conversation = require_conversation(tx, conversation_id)?;
            let recipient_id = conversation.other_participant(author_id).ok_or_else(|| {
                ChatError::Authorization(
                    "You are not allowed to send messages in this conversation.".into(),
                )
            })?;
            if !is_friend_in(tx, author_id, recipient_id)? {
                return Err(ChatError::Authorization(
                    "You are no longer friends with that user.".into(),
                ));
            }
            validate_body(body)?;

            let id = insert_message(tx, author_id, Some(conversation.id), Some(recipient_id), body)?;
            let ts = now();
            tx.execute(
                "UPDATE conversations SET updated_at = ?1 WHERE id = ?2",
                params![ts, conversation.id.to_string()],
            )?;
            debug!("Stored message {} in conversation {}", id, conversation.id);

            Ok(DirectMessage {
                message: require_message(tx, id)?,
                conversation: require_conversation(tx, conversation.id)?,
                recipient_id,
            })
        })
    }

    /// Global chat, oldest first.
    pub fn list_global_messages(&self) -> Result<Vec<Message>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "{} WHERE m.conversation_id IS NULL ORDER BY m.created_at, m.rowid",
                MESSAGE_SELECT
            ))?;
            let rows = stmt
                .query_map([], message_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }

    pub fn list_conversation_messages(&self, conversation_id: Uuid) -> Result<Vec<Message>> {
        self.with_conn(|conn| Ok(query_conversation_messages(conn, conversation_id)?))
    }
}

/// Blank bodies (empty or whitespace only) are refused.
fn validate_body(body: &str) -> Result<()> {
    if body.trim().is_empty() {
        return Err(ChatError::Validation("Body can't be blank".into()));
    }
    Ok(())
}

fn insert_message(
    conn: &Connection,
    author_id: Uuid,
    conversation_id: Option<Uuid>,
    recipient_id: Option<Uuid>,
    body: &str,
) -> rusqlite::Result<Uuid> {
    let id = Uuid::new_v4();
    conn.execute(
        "INSERT INTO messages (id, user_id, conversation_id, recipient_id, body, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            id.to_string(),
            author_id.to_string(),
            conversation_id.map(|c| c.to_string()),
            recipient_id.map(|r| r.to_string()),
            body,
            now()
        ],
    )?;
    Ok(id)
}

fn require_message(conn: &Connection, id: Uuid) -> Result<Message> {
    let message = conn.query_row(
        &format!("{} WHERE m.id = ?1", MESSAGE_SELECT),
        [id.to_string()],
        message_from_row,
    )?;
    Ok(message)
}

pub(crate) fn query_conversation_messages(
    conn: &Connection,
    conversation_id: Uuid,
) -> rusqlite::Result<Vec<Message>> {
    let mut stmt = conn.prepare(&format!(
        "{} WHERE m.conversation_id = ?1 ORDER BY m.created_at, m.rowid",
        MESSAGE_SELECT
    ))?;
    let rows = stmt
        .query_map([conversation_id.to_string()], message_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}
