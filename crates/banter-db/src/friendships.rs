use rusqlite::{Connection, params};
use tracing::info;
use uuid::Uuid;

use banter_types::models::User;

use crate::conversations::query_conversation_between;
use crate::error::{ChatError, Result};
use crate::models::{now, user_from_row};
use crate::Database;

/// What [`Database::remove_friendship`] cleaned up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FriendshipRemoval {
    pub conversation_id: Option<Uuid>,
    pub messages_deleted: usize,
    pub friend_requests_deleted: usize,
}

impl Database {
    pub fn is_friend(&self, a: Uuid, b: Uuid) -> Result<bool> {
        self.with_conn(|conn| Ok(is_friend_in(conn, a, b)?))
    }

    pub fn list_friends(&self, user_id: Uuid) -> Result<Vec<User>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT u.id, u.username, u.created_at
                 FROM friendships f
                 JOIN users u ON u.id = f.friend_id
                 WHERE f.user_id = ?1
                 ORDER BY u.username",
            )?;
            let rows = stmt
                .query_map([user_id.to_string()], user_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }

    /// Unfriend `friend_id` on behalf of `actor_id`, all or nothing:
    /// both edges, the pair's conversation and its messages, any orphaned
    /// direct messages of the pair, and every friend request between them
    /// whatever its status.
    pub fn remove_friendship(&self, actor_id: Uuid, friend_id: Uuid) -> Result<FriendshipRemoval> {
        self.with_tx(|tx| {
            if !is_friend_in(tx, actor_id, friend_id)? {
                return Err(ChatError::NotFound("Friendship not found.".into()));
            }

            let (a, b) = (actor_id.to_string(), friend_id.to_string());

            tx.execute(
                "DELETE FROM friendships
                 WHERE (user_id = ?1 AND friend_id = ?2) OR (user_id = ?2 AND friend_id = ?1)",
                params![a, b],
            )?;

            let mut messages_deleted = 0;
            let conversation = query_conversation_between(tx, actor_id, friend_id)?;
            if let Some(convo) = &conversation {
                messages_deleted += tx.query_row(
                    "SELECT COUNT(*) FROM messages WHERE conversation_id = ?1",
                    [convo.id.to_string()],
                    |row| row.get::<_, usize>(0),
                )?;
                // Messages follow via ON DELETE CASCADE
                tx.execute("DELETE FROM conversations WHERE id = ?1", [convo.id.to_string()])?;
            }

            // Direct messages that lost their conversation somehow. Global
            // messages have no recipient and are never touched here.
            messages_deleted += tx.execute(
                "DELETE FROM messages
                 WHERE conversation_id IS NULL
                   AND recipient_id IS NOT NULL
                   AND ((user_id = ?1 AND recipient_id = ?2) OR (user_id = ?2 AND recipient_id = ?1))",
                params![a, b],
            )?;

            let friend_requests_deleted = tx.execute(
                "DELETE FROM friend_requests
                 WHERE (sender_id = ?1 AND receiver_id = ?2) OR (sender_id = ?2 AND receiver_id = ?1)",
                params![a, b],
            )?;

            info!(
                "{} unfriended {} ({} messages, {} friend requests removed)",
                actor_id, friend_id, messages_deleted, friend_requests_deleted
            );

            Ok(FriendshipRemoval {
                conversation_id: conversation.map(|c| c.id),
                messages_deleted,
                friend_requests_deleted,
            })
        })
    }
}

pub(crate) fn is_friend_in(conn: &Connection, a: Uuid, b: Uuid) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM friendships WHERE user_id = ?1 AND friend_id = ?2)",
        params![a.to_string(), b.to_string()],
        |row| row.get(0),
    )
}

/// Write both directed edges. Only ever called inside a transaction so the
/// pair lands together or not at all.
pub(crate) fn insert_friend_pair(conn: &Connection, a: Uuid, b: Uuid) -> rusqlite::Result<()> {
    let created_at = now();
    for (user, friend) in [(a, b), (b, a)] {
        conn.execute(
            "INSERT OR IGNORE INTO friendships (id, user_id, friend_id, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                Uuid::new_v4().to_string(),
                user.to_string(),
                friend.to_string(),
                created_at
            ],
        )?;
    }
    Ok(())
}
