use uuid::Uuid;

use banter_db::{ChatError, Database};
use banter_types::events::Topic;

/// Decide whether `user_id` may listen on `topic`. Checked when the client
/// subscribes, independently of any publish-side routing.
pub fn authorize_subscription(db: &Database, user_id: Uuid, topic: &Topic) -> Result<(), ChatError> {
    match topic {
        Topic::GlobalChat => Ok(()),
        Topic::Notifications(owner) if *owner == user_id => Ok(()),
        Topic::Notifications(_) => Err(ChatError::Authorization(
            "You can only subscribe to your own notifications.".into(),
        )),
        Topic::Conversation(id) => {
            let conversation = db
                .get_conversation(*id)?
                .ok_or_else(|| ChatError::NotFound("Conversation not found.".into()))?;
            if conversation.has_participant(user_id) {
                Ok(())
            } else {
                Err(ChatError::Authorization(
                    "You are not a participant in that conversation.".into(),
                ))
            }
        }
    }
}
