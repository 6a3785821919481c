use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id          TEXT PRIMARY KEY,
            username    TEXT NOT NULL COLLATE NOCASE UNIQUE,
            password    TEXT NOT NULL,
            created_at  TEXT NOT NULL
        );

        -- One row per direction; rows always come in mirrored pairs.
        CREATE TABLE IF NOT EXISTS friendships (
            id          TEXT PRIMARY KEY,
            user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            friend_id   TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            created_at  TEXT NOT NULL,
            UNIQUE(user_id, friend_id),
            CHECK(user_id <> friend_id)
        );

        CREATE INDEX IF NOT EXISTS idx_friendships_friend
            ON friendships(friend_id);

        CREATE TABLE IF NOT EXISTS friend_requests (
            id          TEXT PRIMARY KEY,
            sender_id   TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            receiver_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            status      TEXT NOT NULL DEFAULT 'pending'
                        CHECK(status IN ('pending', 'accepted', 'rejected', 'cancelled')),
            created_at  TEXT NOT NULL,
            updated_at  TEXT NOT NULL,
            CHECK(sender_id <> receiver_id)
        );

        -- Not unique: a pair may re-request after a rejection or cancellation.
        CREATE INDEX IF NOT EXISTS idx_friend_requests_pair
            ON friend_requests(sender_id, receiver_id);

        CREATE INDEX IF NOT EXISTS idx_friend_requests_status
            ON friend_requests(status);

        -- At most one pending request per unordered pair.
        CREATE UNIQUE INDEX IF NOT EXISTS idx_friend_requests_one_pending
            ON friend_requests(min(sender_id, receiver_id), max(sender_id, receiver_id))
            WHERE status = 'pending';

        CREATE TABLE IF NOT EXISTS conversations (
            id          TEXT PRIMARY KEY,
            sender_id   TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            receiver_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            created_at  TEXT NOT NULL,
            updated_at  TEXT NOT NULL,
            UNIQUE(sender_id, receiver_id),
            CHECK(sender_id <> receiver_id)
        );

        CREATE INDEX IF NOT EXISTS idx_conversations_receiver
            ON conversations(receiver_id);

        -- conversation_id NULL means global chat. recipient_id is only set on
        -- direct messages.
        CREATE TABLE IF NOT EXISTS messages (
            id              TEXT PRIMARY KEY,
            user_id         TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            conversation_id TEXT REFERENCES conversations(id) ON DELETE CASCADE,
            recipient_id    TEXT REFERENCES users(id) ON DELETE CASCADE,
            body            TEXT NOT NULL CHECK(length(trim(body)) > 0),
            created_at      TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_messages_conversation
            ON messages(conversation_id, created_at);
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
