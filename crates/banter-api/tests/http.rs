//! Drives the REST router end to end against an in-memory store and watches
//! what the dispatcher publishes.

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use serde_json::{Value, json};
use tokio::sync::{broadcast, mpsc};
use tower::ServiceExt;
use uuid::Uuid;

use banter_api::auth::create_token;
use banter_api::{AppState, AppStateInner, router};
use banter_db::Database;
use banter_gateway::dispatcher::{Dispatcher, Published};
use banter_types::events::{GatewayFrame, MessageKind, Notification, Topic, TopicPayload};

const SECRET: &str = "test-secret-for-http";

struct Harness {
    app: Router,
    state: AppState,
}

struct Session {
    id: Uuid,
    token: String,
}

fn harness() -> Harness {
    let db = Arc::new(Database::open_in_memory().unwrap());
    let state = AppStateInner::new(db, SECRET.into(), 1, Dispatcher::new());
    Harness {
        app: router(state.clone()),
        state,
    }
}

fn seed_user(h: &Harness, name: &str) -> Session {
    let user = h.state.db.create_user(name, "not-a-real-hash").unwrap();
    Session {
        id: user.id,
        token: create_token(SECRET, user.id, &user.username, 1).unwrap(),
    }
}

async fn call(
    h: &Harness,
    method: Method,
    uri: &str,
    session: Option<&Session>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(s) = session {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", s.token));
    }
    let req = match body {
        Some(b) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(b.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let resp = h.app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

/// What a set of connected clients would be handed: the shared chat stream
/// plus each user's own notification channel.
struct Listener {
    shared: broadcast::Receiver<Published>,
    inboxes: Vec<mpsc::UnboundedReceiver<Published>>,
}

async fn listen(h: &Harness, users: &[&Session]) -> Listener {
    let mut inboxes = vec![];
    for user in users {
        inboxes.push(h.state.dispatcher.register_user_channel(user.id).await.1);
    }
    Listener {
        shared: h.state.dispatcher.subscribe(),
        inboxes,
    }
}

fn event(p: Published) -> Option<(Topic, TopicPayload)> {
    match serde_json::from_str::<GatewayFrame>(&p.json).unwrap() {
        GatewayFrame::Event { topic, payload } => Some((topic, payload)),
        _ => None,
    }
}

impl Listener {
    /// Chat events first, then notifications in registration order.
    fn drain(&mut self) -> Vec<(Topic, TopicPayload)> {
        let mut out = vec![];
        while let Ok(p) = self.shared.try_recv() {
            out.extend(event(p));
        }
        for inbox in &mut self.inboxes {
            while let Ok(p) = inbox.try_recv() {
                out.extend(event(p));
            }
        }
        out
    }
}

async fn befriend(h: &Harness, a: &Session, b: &Session) {
    let (status, body) = call(
        h,
        Method::POST,
        "/friend_requests",
        Some(a),
        Some(json!({ "receiver_id": b.id })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    let id = body["friend_request"]["id"].as_str().unwrap().to_string();

    let (status, _) = call(
        h,
        Method::POST,
        &format!("/friend_requests/{}/accept", id),
        Some(b),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn register_then_login() {
    let h = harness();

    let (status, body) = call(
        &h,
        Method::POST,
        "/auth/register",
        None,
        Some(json!({ "username": "alice", "password": "pw", "password_confirmation": "pw" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["username"], "alice");
    assert!(body["token"].as_str().is_some_and(|t| !t.is_empty()));

    // Handles are case-insensitive
    let (status, _) = call(
        &h,
        Method::POST,
        "/auth/register",
        None,
        Some(json!({ "username": "ALICE", "password": "pw" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = call(
        &h,
        Method::POST,
        "/auth/login",
        None,
        Some(json!({ "username": "Alice", "password": "pw" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let session = Session {
        id: body["user_id"].as_str().unwrap().parse().unwrap(),
        token: body["token"].as_str().unwrap().to_string(),
    };

    let (status, _) = call(&h, Method::GET, "/friends", Some(&session), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = call(
        &h,
        Method::POST,
        "/auth/login",
        None,
        Some(json!({ "username": "alice", "password": "wrong" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Invalid username or password");
}

#[tokio::test]
async fn register_rejects_bad_input() {
    let h = harness();

    let (status, body) = call(
        &h,
        Method::POST,
        "/auth/register",
        None,
        Some(json!({ "username": "bob", "password": "pw", "password_confirmation": "nope" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "Password confirmation doesn't match Password");

    let (status, _) = call(
        &h,
        Method::POST,
        "/auth/register",
        None,
        Some(json!({ "username": "waytoolongname", "password": "pw" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn protected_routes_need_a_token() {
    let h = harness();

    let (status, _) = call(&h, Method::GET, "/chatroom", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let forged = Session {
        id: Uuid::new_v4(),
        token: create_token("some-other-secret", Uuid::new_v4(), "mallory", 1).unwrap(),
    };
    let (status, _) = call(&h, Method::GET, "/chatroom", Some(&forged), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn dm_notifies_only_the_other_participant() {
    let h = harness();
    let a = seed_user(&h, "alice");
    let b = seed_user(&h, "bob");
    befriend(&h, &a, &b).await;

    let (status, convo) = call(
        &h,
        Method::POST,
        "/conversations",
        Some(&a),
        Some(json!({ "user_id": b.id })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let convo_id: Uuid = convo["id"].as_str().unwrap().parse().unwrap();

    let mut rx = listen(&h, &[&a, &b]).await;
    let (status, msg) = call(
        &h,
        Method::POST,
        &format!("/conversations/{}/messages", convo_id),
        Some(&a),
        Some(json!({ "body": "hi" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let message_id: Uuid = msg["id"].as_str().unwrap().parse().unwrap();

    let events = rx.drain();
    let to_b: Vec<&TopicPayload> = events
        .iter()
        .filter(|(t, _)| *t == Topic::Notifications(b.id))
        .map(|(_, p)| p)
        .collect();
    assert_eq!(to_b.len(), 1);
    assert_eq!(
        to_b[0],
        &TopicPayload::Notification(Notification::NewMessage {
            message_type: MessageKind::Dm,
            conversation_id: Some(convo_id),
            sender_id: a.id,
            sender_username: "alice".into(),
            message_preview: "hi".into(),
            message_id,
        })
    );
    assert!(!events.iter().any(|(t, _)| *t == Topic::Notifications(a.id)));
    assert!(events.iter().any(|(t, p)| *t == Topic::Conversation(convo_id)
        && matches!(p, TopicPayload::Fragment(f) if f.html.contains("hi"))));

    let (status, view) = call(
        &h,
        Method::GET,
        &format!("/conversations/{}", convo_id),
        Some(&b),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["other_user"]["username"], "alice");
    assert_eq!(view["messages"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn global_message_preview_is_truncated() {
    let h = harness();
    let a = seed_user(&h, "alice");
    let b = seed_user(&h, "bob");
    let c = seed_user(&h, "carol");

    let mut rx = listen(&h, &[&b, &c]).await;
    let body = "x".repeat(101);
    let (status, msg) = call(
        &h,
        Method::POST,
        "/messages",
        Some(&a),
        Some(json!({ "body": body })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(msg["body"].as_str().unwrap().chars().count(), 101);

    let events = rx.drain();
    assert_eq!(events[0].0, Topic::GlobalChat);
    let mut notified = vec![];
    for (topic, payload) in &events[1..] {
        match payload {
            TopicPayload::Notification(Notification::NewMessage {
                message_type,
                message_preview,
                ..
            }) => {
                assert_eq!(*message_type, MessageKind::Global);
                assert_eq!(message_preview.chars().count(), 50);
                notified.push(*topic);
            }
            other => panic!("unexpected payload {:?}", other),
        }
    }
    notified.sort_by_key(|t| t.to_string());
    let mut expected = vec![Topic::Notifications(b.id), Topic::Notifications(c.id)];
    expected.sort_by_key(|t| t.to_string());
    assert_eq!(notified, expected);

    let (_, log) = call(&h, Method::GET, "/messages", Some(&b), None).await;
    assert_eq!(log[0]["body"].as_str().unwrap(), body);

    let (status, err) = call(
        &h,
        Method::POST,
        "/messages",
        Some(&a),
        Some(json!({ "body": "   " })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(err["error"], "Body can't be blank");
}

#[tokio::test]
async fn friend_request_flow_over_http() {
    let h = harness();
    let a = seed_user(&h, "alice");
    let b = seed_user(&h, "bob");

    let mut rx = listen(&h, &[&a, &b]).await;
    let (status, sent) = call(
        &h,
        Method::POST,
        "/friend_requests",
        Some(&a),
        Some(json!({ "receiver_id": b.id })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(sent["notice"], "Friend request sent to bob.");
    let request_id = sent["friend_request"]["id"].as_str().unwrap().to_string();

    let events = rx.drain();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].0, Topic::Notifications(b.id));

    // Duplicate in the reverse direction
    let (status, err) = call(
        &h,
        Method::POST,
        "/friend_requests",
        Some(&b),
        Some(json!({ "receiver_id": a.id })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(err["error"], "alice has already sent you a friend request.");

    // Only the receiver may accept
    let accept = format!("/friend_requests/{}/accept", request_id);
    let (status, _) = call(&h, Method::POST, &accept, Some(&a), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, accepted) = call(&h, Method::POST, &accept, Some(&b), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(accepted["notice"], "You are now friends with alice!");
    assert_eq!(accepted["friend_request"]["status"], "accepted");

    let events = rx.drain();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].0, Topic::Notifications(a.id));
    assert!(matches!(
        &events[0].1,
        TopicPayload::Notification(Notification::FriendRequestAccepted { receiver_id, .. })
            if *receiver_id == b.id
    ));

    let (status, err) = call(&h, Method::POST, &accept, Some(&b), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(err["error"], "This friend request has already been processed.");

    let (_, friends) = call(&h, Method::GET, "/friends", Some(&a), None).await;
    assert_eq!(friends[0]["username"], "bob");
}

#[tokio::test]
async fn unfriending_removes_conversation_access() {
    let h = harness();
    let a = seed_user(&h, "alice");
    let b = seed_user(&h, "bob");
    let c = seed_user(&h, "carol");
    befriend(&h, &a, &b).await;

    let (_, convo) = call(
        &h,
        Method::POST,
        "/conversations",
        Some(&b),
        Some(json!({ "user_id": a.id })),
    )
    .await;
    let convo_uri = format!("/conversations/{}", convo["id"].as_str().unwrap());

    for body in ["one", "two", "three"] {
        let (status, _) = call(
            &h,
            Method::POST,
            &format!("{}/messages", convo_uri),
            Some(&a),
            Some(json!({ "body": body })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    // Outsiders can neither read nor start a conversation
    let (status, err) = call(&h, Method::GET, &convo_uri, Some(&c), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(err["error"], "You are not authorized to view that conversation.");
    let (status, _) = call(
        &h,
        Method::POST,
        "/conversations",
        Some(&c),
        Some(json!({ "user_id": a.id })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, notice) = call(
        &h,
        Method::DELETE,
        &format!("/friendships/{}", b.id),
        Some(&a),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(notice["notice"].as_str().unwrap().starts_with("bob has been removed"));

    let (status, _) = call(&h, Method::GET, &convo_uri, Some(&a), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(h.state.db.find_conversation_between(a.id, b.id).unwrap().is_none());

    let (_, overview) = call(&h, Method::GET, "/chatroom", Some(&a), None).await;
    assert!(overview["friends"].as_array().unwrap().is_empty());
    assert!(overview["conversations"].as_array().unwrap().is_empty());
    assert_eq!(overview["users"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn deleting_account_invalidates_actions() {
    let h = harness();
    let a = seed_user(&h, "alice");
    let b = seed_user(&h, "bob");
    befriend(&h, &a, &b).await;

    let (status, body) = call(&h, Method::DELETE, "/users/me", Some(&a), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["notice"], "Your account has been deleted.");

    let (_, friends) = call(&h, Method::GET, "/friends", Some(&b), None).await;
    assert!(friends.as_array().unwrap().is_empty());

    // The token still verifies, but the user behind it is gone
    let (status, _) = call(
        &h,
        Method::POST,
        "/messages",
        Some(&a),
        Some(json!({ "body": "ghost" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
