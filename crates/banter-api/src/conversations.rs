use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use uuid::Uuid;

use banter_types::api::{Claims, ConversationView, CreateConversationRequest};

use crate::auth::AppState;
use crate::blocking;
use crate::error::ApiError;

/// Conversations with current friends, most recently active first.
pub async fn list(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = claims.sub;
    let conversations = blocking(&state, move |db| db.list_conversations(user_id)).await?;
    Ok(Json(conversations))
}

/// Open the conversation with a friend, creating it on first use.
pub async fn create(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateConversationRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let actor_id = claims.sub;
    let conversation = blocking(&state, move |db| db.open_conversation(actor_id, req.user_id)).await?;
    Ok(Json(conversation))
}

pub async fn show(
    State(state): State<AppState>,
    Path(conversation_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let actor_id = claims.sub;
    let (conversation, other_user, messages) =
        blocking(&state, move |db| db.view_conversation(actor_id, conversation_id)).await?;

    Ok(Json(ConversationView {
        conversation,
        other_user,
        messages,
    }))
}
