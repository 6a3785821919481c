use axum::{Extension, Json, extract::State, response::IntoResponse};

use banter_types::api::{ChatroomView, Claims, FriendRequestLists};

use crate::auth::AppState;
use crate::blocking;
use crate::error::ApiError;

/// Everything the chatroom screen needs: global log, other users, friends,
/// conversations and pending requests.
pub async fn overview(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = claims.sub;
    let view = blocking(&state, move |db| {
        Ok(ChatroomView {
            messages: db.list_global_messages()?,
            users: db.list_users_except(user_id)?,
            friends: db.list_friends(user_id)?,
            conversations: db.list_conversations(user_id)?,
            friend_requests: FriendRequestLists {
                incoming: db.list_incoming_friend_requests(user_id)?,
                outgoing: db.list_outgoing_friend_requests(user_id)?,
            },
        })
    })
    .await?;
    Ok(Json(view))
}
