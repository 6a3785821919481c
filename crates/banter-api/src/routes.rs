use axum::{
    Router, middleware,
    routing::{delete, get, post},
};

use crate::auth::{self, AppState};
use crate::middleware::require_auth;
use crate::{chatroom, conversations, friend_requests, friendships, messages};

/// REST routes. `/auth/*` is public, everything else needs a bearer token.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login));

    let protected_routes = Router::new()
        .route("/chatroom", get(chatroom::overview))
        .route("/messages", get(messages::list_global).post(messages::post_global))
        .route(
            "/conversations",
            get(conversations::list).post(conversations::create),
        )
        .route("/conversations/{id}", get(conversations::show))
        .route(
            "/conversations/{id}/messages",
            post(messages::post_to_conversation),
        )
        .route(
            "/friend_requests",
            get(friend_requests::list).post(friend_requests::send),
        )
        .route("/friend_requests/{id}/accept", post(friend_requests::accept))
        .route("/friend_requests/{id}/reject", post(friend_requests::reject))
        .route("/friend_requests/{id}/cancel", post(friend_requests::cancel))
        .route("/friends", get(friendships::list_friends))
        .route("/friendships/{friend_id}", delete(friendships::remove))
        .route("/users/me", delete(auth::delete_me))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}
