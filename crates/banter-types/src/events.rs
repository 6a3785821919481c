use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// A named pub/sub channel.
///
/// Wire names: `global-chat`, `conversation:<id>`, `notifications:<userId>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Topic {
    GlobalChat,
    Conversation(Uuid),
    Notifications(Uuid),
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GlobalChat => f.write_str("global-chat"),
            Self::Conversation(id) => write!(f, "conversation:{}", id),
            Self::Notifications(user_id) => write!(f, "notifications:{}", user_id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid topic '{0}'")]
pub struct InvalidTopic(pub String);

impl FromStr for Topic {
    type Err = InvalidTopic;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "global-chat" {
            return Ok(Self::GlobalChat);
        }
        let invalid = || InvalidTopic(s.to_string());
        let (kind, id) = s.split_once(':').ok_or_else(invalid)?;
        let id: Uuid = id.parse().map_err(|_| invalid())?;
        match kind {
            "conversation" => Ok(Self::Conversation(id)),
            "notifications" => Ok(Self::Notifications(id)),
            _ => Err(invalid()),
        }
    }
}

impl TryFrom<String> for Topic {
    type Error = InvalidTopic;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Topic> for String {
    fn from(topic: Topic) -> Self {
        topic.to_string()
    }
}

/// Rendered message fragment pushed to `global-chat` and `conversation:<id>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatFragment {
    pub html: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Dm,
    Global,
}

/// Events pushed to a user's `notifications:<userId>` topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    FriendRequest {
        message: String,
        friend_request_id: Uuid,
        sender_id: Uuid,
        sender_username: String,
    },

    FriendRequestAccepted {
        message: String,
        receiver_id: Uuid,
        receiver_username: String,
    },

    NewMessage {
        message_type: MessageKind,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        conversation_id: Option<Uuid>,
        sender_id: Uuid,
        sender_username: String,
        message_preview: String,
        message_id: Uuid,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TopicPayload {
    Notification(Notification),
    Fragment(ChatFragment),
}

/// Frames sent FROM server TO client over the gateway WebSocket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayFrame {
    /// Identify succeeded
    Ready { user_id: Uuid, username: String },

    Subscribed { topic: Topic },

    SubscriptionRejected { topic: String, reason: String },

    /// A publish on a topic this connection is subscribed to
    Event { topic: Topic, payload: TopicPayload },
}

/// Commands sent FROM client TO server over the gateway WebSocket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayCommand {
    /// Authenticate the connection; must be the first frame
    Identify { token: String },

    /// Topic names are kept as raw strings so a malformed name can be
    /// reported back instead of failing the whole frame.
    Subscribe { topic: String },

    Unsubscribe { topic: String },
}
