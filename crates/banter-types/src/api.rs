use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Conversation, FriendRequest, Message, User};

// -- JWT Claims --

/// JWT claims shared across banter-api (REST middleware) and banter-gateway
/// (WebSocket Identify).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub username: String,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    pub password_confirmation: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionResponse {
    pub user_id: Uuid,
    pub username: String,
    pub token: String,
}

// -- Messages --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PostMessageRequest {
    pub body: String,
}

// -- Friend requests --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendFriendRequestRequest {
    pub receiver_id: Uuid,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FriendRequestResponse {
    pub friend_request: FriendRequest,
    pub notice: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FriendRequestLists {
    pub incoming: Vec<FriendRequest>,
    pub outgoing: Vec<FriendRequest>,
}

// -- Conversations --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateConversationRequest {
    pub user_id: Uuid,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ConversationView {
    pub conversation: Conversation,
    pub other_user: User,
    pub messages: Vec<Message>,
}

// -- Chatroom --

/// Everything the chatroom page shows in one round trip.
#[derive(Debug, Serialize, Deserialize)]
pub struct ChatroomView {
    pub messages: Vec<Message>,
    pub users: Vec<User>,
    pub friends: Vec<User>,
    pub conversations: Vec<Conversation>,
    pub friend_requests: FriendRequestLists,
}

/// Generic acknowledgement for actions that have nothing else to return.
#[derive(Debug, Serialize, Deserialize)]
pub struct NoticeResponse {
    pub notice: String,
}
