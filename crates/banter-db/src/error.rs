//! Error taxonomy for store and state-machine operations.

use thiserror::Error;

/// Errors surfaced by [`crate::Database`] operations.
///
/// The first five variants are caller-facing: their message is the
/// human-readable reason shown to the acting user.
#[derive(Debug, Error)]
pub enum ChatError {
    /// Malformed or duplicate input
    #[error("{0}")]
    Validation(String),

    /// Actor is not a participant, or not a friend
    #[error("{0}")]
    Authorization(String),

    /// Referenced entity is absent or not owned by the actor
    #[error("{0}")]
    NotFound(String),

    /// A transition was attempted on a request that is no longer pending
    #[error("This friend request has already been processed.")]
    AlreadyProcessed,

    /// Uniqueness clash outside the friend-request machine (e.g. usernames)
    #[error("{0}")]
    Conflict(String),

    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("database lock poisoned")]
    LockPoisoned,
}

impl ChatError {
    /// True for errors caused by the request rather than by the server.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, Self::Sqlite(_) | Self::LockPoisoned)
    }
}

pub type Result<T> = std::result::Result<T, ChatError>;

/// Whether `err` is a UNIQUE / PRIMARY KEY constraint failure.
pub(crate) fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                || e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
    )
}
