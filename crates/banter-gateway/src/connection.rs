use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use banter_db::Database;
use banter_types::events::{GatewayCommand, GatewayFrame, Topic};

use crate::dispatcher::Dispatcher;
use crate::subscriptions::authorize_subscription;

/// Heartbeat interval: server sends a Ping every 15 seconds.
/// If 2 consecutive Pongs are missed (~30s), the connection is dropped.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// How long a fresh socket has to send `Identify`.
const IDENTIFY_TIMEOUT: Duration = Duration::from_secs(10);

type Subscriptions = Arc<RwLock<HashSet<Topic>>>;

/// Current username of an identified user. A valid signature is not enough:
/// the account may have been deleted since the token was issued.
async fn identified_username(db: Arc<Database>, user_id: Uuid, claimed_username: &str) -> Option<String> {
    match tokio::task::spawn_blocking(move || db.get_user_by_id(user_id)).await {
        Ok(Ok(Some(user))) => Some(user.username),
        Ok(Ok(None)) => {
            warn!("{} ({}) identified with a token for a deleted account", claimed_username, user_id);
            None
        }
        Ok(Err(e)) => {
            error!("Identify lookup failed for {}: {}", user_id, e);
            None
        }
        Err(e) => {
            error!("spawn_blocking join error: {}", e);
            None
        }
    }
}

/// Handle a single WebSocket connection: Identify handshake, then relay
/// published events for the topics this client subscribed to.
pub async fn handle_connection(
    socket: WebSocket,
    dispatcher: Dispatcher,
    db: Arc<Database>,
    jwt_secret: String,
) {
    let (mut sender, mut receiver) = socket.split();

    let (user_id, claimed_username) = match wait_for_identify(&mut receiver, &jwt_secret).await {
        Some(id) => id,
        None => {
            warn!("WebSocket client failed to identify, closing");
            return;
        }
    };

    let Some(username) = identified_username(db.clone(), user_id, &claimed_username).await else {
        return;
    };

    info!("{} ({}) connected to gateway", username, user_id);

    let ready = GatewayFrame::Ready {
        user_id,
        username: username.clone(),
    };
    if !send_frame(&mut sender, &ready).await {
        return;
    }

    run_connection_loop(sender, receiver, dispatcher, db, user_id, &username).await;

    info!("{} ({}) disconnected from gateway", username, user_id);
}

async fn run_connection_loop(
    mut sender: SplitSink<WebSocket, Message>,
    mut receiver: SplitStream<WebSocket>,
    dispatcher: Dispatcher,
    db: Arc<Database>,
    user_id: Uuid,
    username: &str,
) {
    let mut broadcast_rx = dispatcher.subscribe();
    let (conn_id, mut user_rx) = dispatcher.register_user_channel(user_id).await;

    // Replies to Subscribe commands go through the send task so frames are
    // never written from two places.
    let (reply_tx, mut reply_rx) = mpsc::unbounded_channel::<GatewayFrame>();

    let subscriptions: Subscriptions = Arc::new(RwLock::new(HashSet::new()));
    let send_subscriptions = subscriptions.clone();

    let pong_received = Arc::new(AtomicBool::new(true));
    let pong_flag_send = pong_received.clone();
    let pong_flag_recv = pong_received.clone();

    let mut send_task = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await;
        let mut missed_heartbeats: u8 = 0;

        loop {
            tokio::select! {
                result = broadcast_rx.recv() => {
                    let published = match result {
                        Ok(published) => published,
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                            warn!("Broadcast receiver lagged by {} events", n);
                            continue;
                        }
                        Err(_) => break,
                    };

                    let wanted = send_subscriptions
                        .read()
                        .map(|subs| subs.contains(&published.topic))
                        .unwrap_or(false);
                    if !wanted {
                        continue;
                    }

                    if sender.send(Message::Text(published.json.to_string().into())).await.is_err() {
                        break;
                    }
                }
                targeted = user_rx.recv() => {
                    let Some(published) = targeted else { break };
                    let wanted = send_subscriptions
                        .read()
                        .map(|subs| subs.contains(&published.topic))
                        .unwrap_or(false);
                    if !wanted {
                        continue;
                    }

                    if sender.send(Message::Text(published.json.to_string().into())).await.is_err() {
                        break;
                    }
                }
                reply = reply_rx.recv() => {
                    let Some(frame) = reply else { break };
                    if !send_frame(&mut sender, &frame).await {
                        break;
                    }
                }
                _ = heartbeat.tick() => {
                    if pong_flag_send.swap(false, Ordering::Acquire) {
                        missed_heartbeats = 0;
                    } else {
                        missed_heartbeats += 1;
                        if missed_heartbeats >= 2 {
                            warn!("Heartbeat timeout (missed {} pongs), dropping connection", missed_heartbeats);
                            break;
                        }
                    }
                    if sender.send(Message::Ping(Bytes::new())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    let username_recv = username.to_string();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => match serde_json::from_str::<GatewayCommand>(&text) {
                    Ok(cmd) => {
                        handle_command(&db, user_id, cmd, &subscriptions, &reply_tx).await;
                    }
                    Err(e) => {
                        warn!(
                            "{} ({}) bad command: {} -- raw: {}",
                            username_recv,
                            user_id,
                            e,
                            text.chars().take(200).collect::<String>()
                        );
                    }
                },
                Message::Pong(_) => {
                    pong_flag_recv.store(true, Ordering::Release);
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    // Wait for either task to finish
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    dispatcher.unregister_user_channel(user_id, conn_id).await;
}

async fn wait_for_identify(
    receiver: &mut SplitStream<WebSocket>,
    jwt_secret: &str,
) -> Option<(Uuid, String)> {
    use banter_types::api::Claims;
    use jsonwebtoken::{DecodingKey, Validation, decode};

    let identify = async {
        while let Some(Ok(msg)) = receiver.next().await {
            if let Message::Text(text) = msg {
                if let Ok(GatewayCommand::Identify { token }) =
                    serde_json::from_str::<GatewayCommand>(&text)
                {
                    let token_data = decode::<Claims>(
                        &token,
                        &DecodingKey::from_secret(jwt_secret.as_bytes()),
                        &Validation::default(),
                    )
                    .ok()?;

                    return Some((token_data.claims.sub, token_data.claims.username));
                }
            }
        }
        None
    };

    tokio::time::timeout(IDENTIFY_TIMEOUT, identify)
        .await
        .ok()
        .flatten()
}

async fn handle_command(
    db: &Arc<Database>,
    user_id: Uuid,
    cmd: GatewayCommand,
    subscriptions: &Subscriptions,
    reply_tx: &mpsc::UnboundedSender<GatewayFrame>,
) {
    match cmd {
        GatewayCommand::Identify { .. } => {} // Already handled

        GatewayCommand::Subscribe { topic: raw } => {
            let reply = match raw.parse::<Topic>() {
                Ok(topic) => {
                    let db = db.clone();
                    let verdict = tokio::task::spawn_blocking(move || {
                        authorize_subscription(&db, user_id, &topic)
                    })
                    .await;

                    match verdict {
                        Ok(Ok(())) => {
                            if let Ok(mut subs) = subscriptions.write() {
                                subs.insert(topic);
                            }
                            info!("User {} subscribed to {}", user_id, topic);
                            GatewayFrame::Subscribed { topic }
                        }
                        Ok(Err(e)) if e.is_client_error() => {
                            warn!("Subscription rejected: user {} tried to subscribe to {}", user_id, topic);
                            GatewayFrame::SubscriptionRejected {
                                topic: raw,
                                reason: e.to_string(),
                            }
                        }
                        Ok(Err(e)) => {
                            error!("Subscription check failed for {}: {}", topic, e);
                            GatewayFrame::SubscriptionRejected {
                                topic: raw,
                                reason: "Subscription could not be checked.".into(),
                            }
                        }
                        Err(e) => {
                            error!("spawn_blocking join error: {}", e);
                            GatewayFrame::SubscriptionRejected {
                                topic: raw,
                                reason: "Subscription could not be checked.".into(),
                            }
                        }
                    }
                }
                Err(e) => GatewayFrame::SubscriptionRejected {
                    topic: raw,
                    reason: e.to_string(),
                },
            };
            let _ = reply_tx.send(reply);
        }

        GatewayCommand::Unsubscribe { topic } => {
            if let Ok(topic) = topic.parse::<Topic>() {
                if let Ok(mut subs) = subscriptions.write() {
                    subs.remove(&topic);
                }
                debug!("User {} unsubscribed from {}", user_id, topic);
            }
        }
    }
}

/// Serialize and send one frame. Returns false once the socket is unusable.
async fn send_frame(sender: &mut SplitSink<WebSocket, Message>, frame: &GatewayFrame) -> bool {
    let text = match serde_json::to_string(frame) {
        Ok(text) => text,
        Err(e) => {
            error!("Failed to serialize gateway frame: {}", e);
            return true;
        }
    };
    sender.send(Message::Text(text.into())).await.is_ok()
}
