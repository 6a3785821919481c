pub mod auth;
pub mod chatroom;
pub mod conversations;
pub mod error;
pub mod friend_requests;
pub mod friendships;
pub mod messages;
pub mod middleware;
pub mod render;
pub mod routes;

pub use auth::{AppState, AppStateInner};
pub use error::ApiError;
pub use routes::router;

use banter_db::Database;
use tracing::error;

/// Run a store operation on the blocking pool. SQLite calls never run on the
/// async worker threads.
pub(crate) async fn blocking<F, T>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&Database) -> banter_db::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let db = state.db.clone();
    tokio::task::spawn_blocking(move || f(&db))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Internal
        })?
        .map_err(ApiError::from)
}
