//! Global chat and direct-message posting. Broadcasts go out only after the
//! store call returned, so a rolled-back write is never published.

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::debug;
use uuid::Uuid;

use banter_types::api::{Claims, PostMessageRequest};

use crate::auth::AppState;
use crate::blocking;
use crate::error::ApiError;

pub async fn list_global(
    State(state): State<AppState>,
    Extension(_claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let messages = blocking(&state, |db| db.list_global_messages()).await?;
    Ok(Json(messages))
}

pub async fn post_global(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<PostMessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let author_id = claims.sub;
    let (message, recipients) = blocking(&state, move |db| {
        let message = db.post_global_message(author_id, &req.body)?;
        let recipients = db.user_ids_except(author_id)?;
        Ok((message, recipients))
    })
    .await?;

    let html = state.renderer.render(&message);
    state
        .dispatcher
        .publish_global_message(&message, html, &recipients)
        .await;

    Ok((StatusCode::CREATED, Json(message)))
}

pub async fn post_to_conversation(
    State(state): State<AppState>,
    Path(conversation_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<PostMessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let author_id = claims.sub;
    let dm = blocking(&state, move |db| {
        db.post_conversation_message(author_id, conversation_id, &req.body)
    })
    .await?;

    let html = state.renderer.render(&dm.message);
    state
        .dispatcher
        .publish_direct_message(&dm.message, dm.conversation.id, dm.recipient_id, html)
        .await;
    debug!("DM {} delivered to conversation {}", dm.message.id, dm.conversation.id);

    Ok((StatusCode::CREATED, Json(dm.message)))
}
