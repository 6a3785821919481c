use rusqlite::{Connection, OptionalExtension, params};
use tracing::info;
use uuid::Uuid;

use banter_types::models::{Conversation, Message, User};

use crate::error::{ChatError, Result};
use crate::friendships::is_friend_in;
use crate::messages::query_conversation_messages;
use crate::models::{CONVERSATION_COLUMNS, conversation_from_row, now};
use crate::users::require_user;
use crate::Database;

impl Database {
    /// The conversation between `a` and `b`, whichever of them opened it.
    pub fn find_conversation_between(&self, a: Uuid, b: Uuid) -> Result<Option<Conversation>> {
        self.with_conn(|conn| Ok(query_conversation_between(conn, a, b)?))
    }

    /// Return the pair's conversation, creating it with `a` as the initiator
    /// if there is none. Does not check friendship; see
    /// [`Database::open_conversation`].
    pub fn find_or_create_conversation_between(&self, a: Uuid, b: Uuid) -> Result<Conversation> {
        self.with_tx(|tx| find_or_create_in(tx, a, b))
    }

    /// Start (or reopen) a conversation with `other_id`. Only friends may.
    pub fn open_conversation(&self, actor_id: Uuid, other_id: Uuid) -> Result<Conversation> {
        self.with_tx(|tx| {
            require_user(tx, other_id)?;
            if actor_id == other_id || !is_friend_in(tx, actor_id, other_id)? {
                return Err(ChatError::Authorization(
                    "You can only start conversations with friends.".into(),
                ));
            }
            find_or_create_in(tx, actor_id, other_id)
        })
    }

    pub fn get_conversation(&self, id: Uuid) -> Result<Option<Conversation>> {
        self.with_conn(|conn| Ok(query_conversation(conn, id)?))
    }

    /// A conversation as seen by one of its participants: the other user and
    /// the messages, oldest first. Both participants must still be friends.
    pub fn view_conversation(&self, actor_id: Uuid, id: Uuid) -> Result<(Conversation, User, Vec<Message>)> {
        self.with_conn(|conn| {
            let conversation = require_conversation(conn, id)?;
            let other_id = conversation.other_participant(actor_id).ok_or_else(|| {
                ChatError::Authorization("You are not authorized to view that conversation.".into())
            })?;
            if !is_friend_in(conn, actor_id, other_id)? {
                return Err(ChatError::Authorization(
                    "You are no longer friends with that user.".into(),
                ));
            }

            let other = require_user(conn, other_id)?;
            let messages = query_conversation_messages(conn, id)?;
            Ok((conversation, other, messages))
        })
    }

    /// Conversations `user_id` takes part in with someone they are still
    /// friends with, most recently active first.
    pub fn list_conversations(&self, user_id: Uuid) -> Result<Vec<Conversation>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT c.id, c.sender_id, c.receiver_id, c.created_at, c.updated_at
                 FROM conversations c
                 JOIN friendships f
                   ON f.user_id = ?1
                  AND f.friend_id = CASE WHEN c.sender_id = ?1 THEN c.receiver_id ELSE c.sender_id END
                 WHERE c.sender_id = ?1 OR c.receiver_id = ?1
                 ORDER BY c.updated_at DESC",
            )?;
            let rows = stmt
                .query_map([user_id.to_string()], conversation_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }
}

fn find_or_create_in(conn: &Connection, a: Uuid, b: Uuid) -> Result<Conversation> {
    if let Some(existing) = query_conversation_between(conn, a, b)? {
        return Ok(existing);
    }

    let id = Uuid::new_v4();
    let ts = now();
    conn.execute(
        "INSERT INTO conversations (id, sender_id, receiver_id, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?4)",
        params![id.to_string(), a.to_string(), b.to_string(), ts],
    )?;
    info!("Created conversation {} between {} and {}", id, a, b);

    require_conversation(conn, id)
}

pub(crate) fn query_conversation(conn: &Connection, id: Uuid) -> rusqlite::Result<Option<Conversation>> {
    conn.query_row(
        &format!("SELECT {} FROM conversations WHERE id = ?1", CONVERSATION_COLUMNS),
        [id.to_string()],
        conversation_from_row,
    )
    .optional()
}

pub(crate) fn require_conversation(conn: &Connection, id: Uuid) -> Result<Conversation> {
    query_conversation(conn, id)?
        .ok_or_else(|| ChatError::NotFound("Conversation not found.".into()))
}

/// Checks both orderings of the pair.
pub(crate) fn query_conversation_between(
    conn: &Connection,
    a: Uuid,
    b: Uuid,
) -> rusqlite::Result<Option<Conversation>> {
    conn.query_row(
        &format!(
            "SELECT {} FROM conversations
             WHERE (sender_id = ?1 AND receiver_id = ?2) OR (sender_id = ?2 AND receiver_id = ?1)
             LIMIT 1",
            CONVERSATION_COLUMNS
        ),
        params![a.to_string(), b.to_string()],
        conversation_from_row,
    )
    .optional()
}
