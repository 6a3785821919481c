//! Friend request state machine.
//!
//! A request starts `pending` and moves exactly once to `accepted`,
//! `rejected` or `cancelled`. There is no uniqueness on (sender, receiver) so
//! a pair can try again after a rejection or cancellation; only one
//! *pending* request may exist per unordered pair. Accepting writes both
//! friendship edges, marks the request, and sweeps up a reverse pending
//! request in the same transaction.

use rusqlite::{Connection, OptionalExtension, params};
use tracing::info;
use uuid::Uuid;

use banter_types::models::{FriendRequest, FriendRequestStatus, User};

use crate::error::{ChatError, Result, is_unique_violation};
use crate::friendships::{insert_friend_pair, is_friend_in};
use crate::models::{FRIEND_REQUEST_COLUMNS, friend_request_from_row, now, uuid_at};
use crate::users::require_user;
use crate::Database;

/// A request together with both parties, as of after the operation.
#[derive(Debug, Clone)]
pub struct FriendRequestChange {
    pub request: FriendRequest,
    pub sender: User,
    pub receiver: User,
    /// Set when accepting also resolved a pending request in the other direction.
    pub reverse_accepted: Option<Uuid>,
}

/// Which side of the request the acting user must be on.
#[derive(Clone, Copy)]
enum Party {
    Sender,
    Receiver,
}

impl Database {
    pub fn send_friend_request(&self, sender_id: Uuid, receiver_id: Uuid) -> Result<FriendRequestChange> {
        if sender_id == receiver_id {
            return Err(ChatError::Validation(
                "You cannot send a friend request to yourself".into(),
            ));
        }

        self.with_tx(|tx| {
            let sender = require_user(tx, sender_id)?;
            let receiver = require_user(tx, receiver_id)?;

            if is_friend_in(tx, sender_id, receiver_id)? {
                return Err(ChatError::Validation(format!(
                    "You are already friends with {}.",
                    receiver.username
                )));
            }

            if pending_between(tx, sender_id, receiver_id)?.is_some() {
                return Err(ChatError::Validation(format!(
                    "You have already sent a friend request to {}.",
                    receiver.username
                )));
            }
            if pending_between(tx, receiver_id, sender_id)?.is_some() {
                return Err(ChatError::Validation(format!(
                    "{} has already sent you a friend request.",
                    receiver.username
                )));
            }

            let id = insert_pending(tx, sender_id, receiver_id)?;
            info!("{} sent a friend request to {} ({})", sender.username, receiver.username, id);

            Ok(FriendRequestChange {
                request: require_request(tx, id)?,
                sender,
                receiver,
                reverse_accepted: None,
            })
        })
    }

    pub fn accept_friend_request(&self, receiver_id: Uuid, request_id: Uuid) -> Result<FriendRequestChange> {
        self.with_tx(|tx| {
            let request = owned_request(tx, request_id, Party::Receiver, receiver_id)?;
            ensure_can_move(&request, FriendRequestStatus::Accepted)?;

            if !is_friend_in(tx, request.sender_id, request.receiver_id)? {
                insert_friend_pair(tx, request.sender_id, request.receiver_id)?;
            }

            transition(tx, request.id, FriendRequestStatus::Accepted)?;

            let reverse = pending_between(tx, request.receiver_id, request.sender_id)?;
            if let Some(reverse_id) = reverse {
                transition(tx, reverse_id, FriendRequestStatus::Accepted)?;
            }

            let change = FriendRequestChange {
                request: require_request(tx, request.id)?,
                sender: require_user(tx, request.sender_id)?,
                receiver: require_user(tx, request.receiver_id)?,
                reverse_accepted: reverse,
            };
            info!(
                "{} accepted the friend request from {} ({})",
                change.receiver.username, change.sender.username, request.id
            );
            Ok(change)
        })
    }

    pub fn reject_friend_request(&self, receiver_id: Uuid, request_id: Uuid) -> Result<FriendRequestChange> {
        self.resolve(Party::Receiver, receiver_id, request_id, FriendRequestStatus::Rejected)
    }

    pub fn cancel_friend_request(&self, sender_id: Uuid, request_id: Uuid) -> Result<FriendRequestChange> {
        self.resolve(Party::Sender, sender_id, request_id, FriendRequestStatus::Cancelled)
    }

    pub fn get_friend_request(&self, request_id: Uuid) -> Result<Option<FriendRequest>> {
        self.with_conn(|conn| Ok(query_request(conn, request_id)?))
    }

    /// Pending requests addressed to `user_id`, oldest first.
    pub fn list_incoming_friend_requests(&self, user_id: Uuid) -> Result<Vec<FriendRequest>> {
        self.list_pending("receiver_id", user_id)
    }

    /// Pending requests sent by `user_id`, oldest first.
    pub fn list_outgoing_friend_requests(&self, user_id: Uuid) -> Result<Vec<FriendRequest>> {
        self.list_pending("sender_id", user_id)
    }

    /// Full request history between two users in either direction.
    pub fn list_friend_requests_between(&self, a: Uuid, b: Uuid) -> Result<Vec<FriendRequest>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM friend_requests
                 WHERE (sender_id = ?1 AND receiver_id = ?2) OR (sender_id = ?2 AND receiver_id = ?1)
                 ORDER BY created_at",
                FRIEND_REQUEST_COLUMNS
            ))?;
            let rows = stmt
                .query_map(params![a.to_string(), b.to_string()], friend_request_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }

    fn list_pending(&self, column: &'static str, user_id: Uuid) -> Result<Vec<FriendRequest>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM friend_requests WHERE {} = ?1 AND status = 'pending' ORDER BY created_at",
                FRIEND_REQUEST_COLUMNS, column
            ))?;
            let rows = stmt
                .query_map([user_id.to_string()], friend_request_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }

    fn resolve(
        &self,
        party: Party,
        actor_id: Uuid,
        request_id: Uuid,
        next: FriendRequestStatus,
    ) -> Result<FriendRequestChange> {
        self.with_tx(|tx| {
            let request = owned_request(tx, request_id, party, actor_id)?;
            ensure_can_move(&request, next)?;
            transition(tx, request.id, next)?;

            info!("Friend request {} {}", request.id, next);
            Ok(FriendRequestChange {
                request: require_request(tx, request.id)?,
                sender: require_user(tx, request.sender_id)?,
                receiver: require_user(tx, request.receiver_id)?,
                reverse_accepted: None,
            })
        })
    }
}

fn query_request(conn: &Connection, id: Uuid) -> rusqlite::Result<Option<FriendRequest>> {
    conn.query_row(
        &format!("SELECT {} FROM friend_requests WHERE id = ?1", FRIEND_REQUEST_COLUMNS),
        [id.to_string()],
        friend_request_from_row,
    )
    .optional()
}

fn require_request(conn: &Connection, id: Uuid) -> Result<FriendRequest> {
    query_request(conn, id)?.ok_or_else(not_found)
}

/// Load a request the actor is on the given side of. Someone else's request
/// is indistinguishable from a missing one.
fn owned_request(conn: &Connection, id: Uuid, party: Party, actor_id: Uuid) -> Result<FriendRequest> {
    let request = require_request(conn, id)?;
    let owner = match party {
        Party::Sender => request.sender_id,
        Party::Receiver => request.receiver_id,
    };
    if owner != actor_id {
        return Err(not_found());
    }
    Ok(request)
}

fn ensure_can_move(request: &FriendRequest, next: FriendRequestStatus) -> Result<()> {
    if request.status.can_transition_to(next) {
        Ok(())
    } else {
        Err(ChatError::AlreadyProcessed)
    }
}

/// Move a pending request to `next`. The status guard lives in the UPDATE
/// itself, so a request resolved concurrently reports `AlreadyProcessed`.
fn transition(conn: &Connection, id: Uuid, next: FriendRequestStatus) -> Result<()> {
    let changed = conn.execute(
        "UPDATE friend_requests SET status = ?1, updated_at = ?2 WHERE id = ?3 AND status = 'pending'",
        params![next.as_str(), now(), id.to_string()],
    )?;
    if changed == 0 {
        return Err(ChatError::AlreadyProcessed);
    }
    Ok(())
}

/// Insert a new pending request. The one-pending-per-pair index turns a
/// request that raced past the checks above into a `Validation` error.
fn insert_pending(conn: &Connection, sender_id: Uuid, receiver_id: Uuid) -> Result<Uuid> {
    let id = Uuid::new_v4();
    conn.execute(
        "INSERT INTO friend_requests (id, sender_id, receiver_id, status, created_at, updated_at)
         VALUES (?1, ?2, ?3, 'pending', ?4, ?4)",
        params![id.to_string(), sender_id.to_string(), receiver_id.to_string(), now()],
    )
    .map_err(|e| {
        if is_unique_violation(&e) {
            ChatError::Validation("A friend request already exists between you and this user".into())
        } else {
            e.into()
        }
    })?;
    Ok(id)
}

/// Id of the pending request from `sender_id` to `receiver_id`, if any.
fn pending_between(conn: &Connection, sender_id: Uuid, receiver_id: Uuid) -> rusqlite::Result<Option<Uuid>> {
    conn.query_row(
        "SELECT id FROM friend_requests
         WHERE sender_id = ?1 AND receiver_id = ?2 AND status = 'pending'
         LIMIT 1",
        params![sender_id.to_string(), receiver_id.to_string()],
        |row| uuid_at(row, 0),
    )
    .optional()
}

fn not_found() -> ChatError {
    ChatError::NotFound("Friend request not found.".into())
}
