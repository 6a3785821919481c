//! What gets published where when messages are posted and friend requests
//! change state. Callers publish only after their transaction committed.

use tracing::debug;
use uuid::Uuid;

use banter_types::events::{ChatFragment, MessageKind, Notification, Topic, TopicPayload};
use banter_types::models::{FriendRequest, Message};

use crate::dispatcher::Dispatcher;

/// Maximum length, in characters, of `message_preview`.
pub const PREVIEW_LEN: usize = 50;

const OMISSION: &str = "...";

/// Shorten `body` for a notification. Bodies longer than [`PREVIEW_LEN`]
/// are cut and end in `...`, keeping the total at exactly `PREVIEW_LEN`.
pub fn truncate_preview(body: &str) -> String {
    if body.chars().count() <= PREVIEW_LEN {
        return body.to_string();
    }
    let keep = PREVIEW_LEN - OMISSION.len();
    let mut preview: String = body.chars().take(keep).collect();
    preview.push_str(OMISSION);
    preview
}

impl Dispatcher {
    /// Rendered message to `global-chat`, plus a `new_message` notification
    /// to each of `recipients` (everyone but the author) that is connected.
    pub async fn publish_global_message(&self, message: &Message, html: String, recipients: &[Uuid]) {
        self.publish(Topic::GlobalChat, TopicPayload::Fragment(ChatFragment { html }))
            .await;

        let preview = truncate_preview(&message.body);
        let mut notified = 0;
        for &user_id in recipients.iter().filter(|&&id| id != message.author_id) {
            notified += self
                .publish(
                    Topic::Notifications(user_id),
                    TopicPayload::Notification(Notification::NewMessage {
                        message_type: MessageKind::Global,
                        conversation_id: None,
                        sender_id: message.author_id,
                        sender_username: message.author_username.clone(),
                        message_preview: preview.clone(),
                        message_id: message.id,
                    }),
                )
                .await;
        }
        debug!("Fanned out global message {} to {} connections", message.id, notified);
    }

    /// Rendered message to the conversation topic and a `new_message`
    /// notification to the other participant only.
    pub async fn publish_direct_message(
        &self,
        message: &Message,
        conversation_id: Uuid,
        recipient_id: Uuid,
        html: String,
    ) {
        self.publish(
            Topic::Conversation(conversation_id),
            TopicPayload::Fragment(ChatFragment { html }),
        )
        .await;
        self.publish(
            Topic::Notifications(recipient_id),
            TopicPayload::Notification(Notification::NewMessage {
                message_type: MessageKind::Dm,
                conversation_id: Some(conversation_id),
                sender_id: message.author_id,
                sender_username: message.author_username.clone(),
                message_preview: truncate_preview(&message.body),
                message_id: message.id,
            }),
        )
        .await;
    }

    /// Tell the receiver a request arrived.
    pub async fn notify_friend_request(&self, request: &FriendRequest, sender_username: &str) {
        self.publish(
            Topic::Notifications(request.receiver_id),
            TopicPayload::Notification(Notification::FriendRequest {
                message: format!("{} sent you a friend request", sender_username),
                friend_request_id: request.id,
                sender_id: request.sender_id,
                sender_username: sender_username.to_string(),
            }),
        )
        .await;
    }

    /// Tell the original sender their request was accepted.
    pub async fn notify_friend_request_accepted(&self, request: &FriendRequest, receiver_username: &str) {
        self.publish(
            Topic::Notifications(request.sender_id),
            TopicPayload::Notification(Notification::FriendRequestAccepted {
                message: format!("{} accepted your friend request", receiver_username),
                receiver_id: request.receiver_id,
                receiver_username: receiver_username.to_string(),
            }),
        )
        .await;
    }
}
