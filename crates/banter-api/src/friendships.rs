use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use uuid::Uuid;

use banter_db::ChatError;
use banter_types::api::{Claims, NoticeResponse};

use crate::auth::AppState;
use crate::blocking;
use crate::error::ApiError;

pub async fn list_friends(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = claims.sub;
    let friends = blocking(&state, move |db| db.list_friends(user_id)).await?;
    Ok(Json(friends))
}

/// Unfriend. Takes the pair's conversation, DMs and request history with it.
pub async fn remove(
    State(state): State<AppState>,
    Path(friend_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let actor_id = claims.sub;
    let friend = blocking(&state, move |db| {
        let friend = db
            .get_user_by_id(friend_id)?
            .ok_or_else(|| ChatError::NotFound("User not found.".into()))?;
        db.remove_friendship(actor_id, friend.id)?;
        Ok(friend)
    })
    .await?;

    Ok(Json(NoticeResponse {
        notice: format!(
            "{} has been removed from your friends list. All messages and conversations have been deleted.",
            friend.username
        ),
    }))
}
