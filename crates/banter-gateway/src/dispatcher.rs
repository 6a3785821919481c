use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{RwLock, broadcast, mpsc};
use tracing::{debug, warn};
use uuid::Uuid;

use banter_types::events::{GatewayFrame, Topic, TopicPayload};

/// Capacity of the shared broadcast ring. A subscriber further behind than
/// this skips ahead and loses the events in between.
const BROADCAST_CAPACITY: usize = 1024;

/// One publish, serialized once and shared by every connection.
#[derive(Debug, Clone)]
pub struct Published {
    pub topic: Topic,
    pub json: Arc<str>,
}

/// Topic fan-out to connected clients.
///
/// Chat topics (`global-chat`, `conversation:<id>`) go through one shared
/// broadcast ring and each connection filters it down to its subscriptions.
/// `notifications:<user>` never touches that ring: it is delivered straight
/// to the user's own connections, so a burst of notifications cannot push
/// chat events out of the buffer.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    broadcast_tx: broadcast::Sender<Published>,

    /// Per-user targeted send channels: user_id -> (conn_id -> sender)
    user_channels: RwLock<HashMap<Uuid, HashMap<Uuid, mpsc::UnboundedSender<Published>>>>,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        let (broadcast_tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self {
            inner: Arc::new(DispatcherInner {
                broadcast_tx,
                user_channels: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Receiver for the shared chat topics.
    pub fn subscribe(&self) -> broadcast::Receiver<Published> {
        self.inner.broadcast_tx.subscribe()
    }

    /// Register a targeted channel for one connection of `user_id`.
    /// Returns (conn_id, receiver).
    pub async fn register_user_channel(
        &self,
        user_id: Uuid,
    ) -> (Uuid, mpsc::UnboundedReceiver<Published>) {
        let conn_id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner
            .user_channels
            .write()
            .await
            .entry(user_id)
            .or_default()
            .insert(conn_id, tx);
        (conn_id, rx)
    }

    /// Drop one connection's targeted channel. Other connections of the same
    /// user keep theirs.
    pub async fn unregister_user_channel(&self, user_id: Uuid, conn_id: Uuid) {
        let mut channels = self.inner.user_channels.write().await;
        if let Some(conns) = channels.get_mut(&user_id) {
            conns.remove(&conn_id);
            if conns.is_empty() {
                channels.remove(&user_id);
            }
        }
    }

    pub async fn is_connected(&self, user_id: Uuid) -> bool {
        self.inner.user_channels.read().await.contains_key(&user_id)
    }

    /// Best-effort publish. Returns how many connections were handed the
    /// event; never fails the caller. Notifications for users with no open
    /// connection are dropped without being serialized.
    pub async fn publish(&self, topic: Topic, payload: TopicPayload) -> usize {
        match topic {
            Topic::Notifications(user_id) => {
                let channels = self.inner.user_channels.read().await;
                let Some(conns) = channels.get(&user_id) else {
                    debug!("{} is not connected, dropping notification", user_id);
                    return 0;
                };
                let Some(published) = serialize(topic, payload) else {
                    return 0;
                };
                conns
                    .values()
                    .filter(|tx| tx.send(published.clone()).is_ok())
                    .count()
            }
            Topic::GlobalChat | Topic::Conversation(_) => {
                let Some(published) = serialize(topic, payload) else {
                    return 0;
                };
                match self.inner.broadcast_tx.send(published) {
                    Ok(receivers) => receivers,
                    Err(_) => {
                        debug!("No listeners for {}", topic);
                        0
                    }
                }
            }
        }
    }
}

fn serialize(topic: Topic, payload: TopicPayload) -> Option<Published> {
    let frame = GatewayFrame::Event { topic, payload };
    match serde_json::to_string(&frame) {
        Ok(json) => Some(Published {
            topic,
            json: json.into(),
        }),
        Err(e) => {
            warn!("Failed to serialize event for {}: {}", topic, e);
            None
        }
    }
}
