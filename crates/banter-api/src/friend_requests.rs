use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::info;
use uuid::Uuid;

use banter_types::api::{
    Claims, FriendRequestLists, FriendRequestResponse, SendFriendRequestRequest,
};

use crate::auth::AppState;
use crate::blocking;
use crate::error::ApiError;

/// Pending requests the caller received and sent.
pub async fn list(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = claims.sub;
    let lists = blocking(&state, move |db| {
        Ok(FriendRequestLists {
            incoming: db.list_incoming_friend_requests(user_id)?,
            outgoing: db.list_outgoing_friend_requests(user_id)?,
        })
    })
    .await?;
    Ok(Json(lists))
}

pub async fn send(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<SendFriendRequestRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let sender_id = claims.sub;
    let change = blocking(&state, move |db| db.send_friend_request(sender_id, req.receiver_id)).await?;

    state
        .dispatcher
        .notify_friend_request(&change.request, &change.sender.username)
        .await;

    Ok((
        StatusCode::CREATED,
        Json(FriendRequestResponse {
            notice: format!("Friend request sent to {}.", change.receiver.username),
            friend_request: change.request,
        }),
    ))
}

pub async fn accept(
    State(state): State<AppState>,
    Path(request_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let receiver_id = claims.sub;
    let change = blocking(&state, move |db| db.accept_friend_request(receiver_id, request_id)).await?;

    if let Some(reverse) = change.reverse_accepted {
        info!("Reverse friend request {} resolved by accept", reverse);
    }
    state
        .dispatcher
        .notify_friend_request_accepted(&change.request, &change.receiver.username)
        .await;

    Ok(Json(FriendRequestResponse {
        notice: format!("You are now friends with {}!", change.sender.username),
        friend_request: change.request,
    }))
}

pub async fn reject(
    State(state): State<AppState>,
    Path(request_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let receiver_id = claims.sub;
    let change = blocking(&state, move |db| db.reject_friend_request(receiver_id, request_id)).await?;

    Ok(Json(FriendRequestResponse {
        notice: format!("Friend request from {} rejected.", change.sender.username),
        friend_request: change.request,
    }))
}

pub async fn cancel(
    State(state): State<AppState>,
    Path(request_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let sender_id = claims.sub;
    let change = blocking(&state, move |db| db.cancel_friend_request(sender_id, request_id)).await?;

    Ok(Json(FriendRequestResponse {
        notice: "Friend request cancelled.".into(),
        friend_request: change.request,
    }))
}
