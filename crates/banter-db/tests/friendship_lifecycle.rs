//! End-to-end friendship lifecycle against an in-memory store.

use banter_db::{ChatError, Database};
use uuid::Uuid;

fn users(db: &Database, names: &[&str]) -> Vec<Uuid> {
    names
        .iter()
        .map(|n| db.create_user(n, "hash").unwrap().id)
        .collect()
}

fn make_friends(db: &Database, a: Uuid, b: Uuid) {
    let req = db.send_friend_request(a, b).unwrap();
    db.accept_friend_request(b, req.request.id).unwrap();
}

#[test]
fn friendship_is_never_asymmetric() {
    let db = Database::open_in_memory().unwrap();
    let ids = users(&db, &["alice", "bob", "carol"]);
    let (a, b, c) = (ids[0], ids[1], ids[2]);

    make_friends(&db, a, b);
    let pending = db.send_friend_request(c, a).unwrap();

    for (x, y) in [(a, b), (a, c), (b, c)] {
        assert_eq!(db.is_friend(x, y).unwrap(), db.is_friend(y, x).unwrap());
    }
    assert!(db.is_friend(a, b).unwrap());
    assert!(!db.is_friend(a, c).unwrap());

    db.reject_friend_request(a, pending.request.id).unwrap();
    db.remove_friendship(b, a).unwrap();
    for (x, y) in [(a, b), (a, c), (b, c)] {
        assert!(!db.is_friend(x, y).unwrap());
        assert!(!db.is_friend(y, x).unwrap());
    }
}

#[test]
fn removing_a_friend_wipes_the_pair() {
    let db = Database::open_in_memory().unwrap();
    let ids = users(&db, &["alice", "bob"]);
    let (a, b) = (ids[0], ids[1]);

    // Some rejected history before the accepted request
    let first = db.send_friend_request(b, a).unwrap();
    db.reject_friend_request(a, first.request.id).unwrap();
    make_friends(&db, a, b);

    let convo = db.find_or_create_conversation_between(a, b).unwrap();
    db.post_conversation_message(a, convo.id, "one").unwrap();
    db.post_conversation_message(b, convo.id, "two").unwrap();
    db.post_conversation_message(a, convo.id, "three").unwrap();
    db.post_global_message(a, "public").unwrap();
    assert_eq!(db.list_conversation_messages(convo.id).unwrap().len(), 3);

    let removal = db.remove_friendship(a, b).unwrap();
    assert_eq!(removal.conversation_id, Some(convo.id));
    assert_eq!(removal.messages_deleted, 3);
    assert_eq!(removal.friend_requests_deleted, 2);

    assert!(!db.is_friend(a, b).unwrap());
    assert!(!db.is_friend(b, a).unwrap());
    assert!(db.find_conversation_between(a, b).unwrap().is_none());
    assert!(db.get_conversation(convo.id).unwrap().is_none());
    assert!(db.list_conversation_messages(convo.id).unwrap().is_empty());
    assert!(db.list_friend_requests_between(a, b).unwrap().is_empty());

    // Global chat is not part of the pair's history
    assert_eq!(db.list_global_messages().unwrap().len(), 1);

    // Removing twice is a not-found, not a silent success
    assert!(matches!(db.remove_friendship(b, a), Err(ChatError::NotFound(_))));

    // And the pair can start over
    make_friends(&db, b, a);
    assert!(db.is_friend(a, b).unwrap());
}

#[test]
fn pending_request_blocks_both_directions_until_resolved() {
    let db = Database::open_in_memory().unwrap();
    let ids = users(&db, &["alice", "bob"]);
    let (a, b) = (ids[0], ids[1]);

    let req = db.send_friend_request(a, b).unwrap();
    assert!(matches!(db.send_friend_request(a, b), Err(ChatError::Validation(_))));
    assert!(matches!(db.send_friend_request(b, a), Err(ChatError::Validation(_))));

    db.cancel_friend_request(a, req.request.id).unwrap();
    let again = db.send_friend_request(b, a).unwrap();
    assert_ne!(again.request.id, req.request.id);
}

#[test]
fn deleting_a_user_cascades() {
    let db = Database::open_in_memory().unwrap();
    let ids = users(&db, &["alice", "bob", "carol"]);
    let (a, b, c) = (ids[0], ids[1], ids[2]);

    make_friends(&db, a, b);
    db.send_friend_request(c, a).unwrap();
    let convo = db.open_conversation(a, b).unwrap();
    db.post_conversation_message(b, convo.id, "hey").unwrap();
    db.post_global_message(a, "bye all").unwrap();
    db.post_global_message(c, "still here").unwrap();

    db.delete_user(a).unwrap();

    assert!(db.get_user_by_id(a).unwrap().is_none());
    assert!(db.list_friends(b).unwrap().is_empty());
    assert!(db.get_conversation(convo.id).unwrap().is_none());
    assert!(db.list_outgoing_friend_requests(c).unwrap().is_empty());
    let remaining: Vec<String> = db
        .list_global_messages()
        .unwrap()
        .into_iter()
        .map(|m| m.body)
        .collect();
    assert_eq!(remaining, vec!["still here"]);
}
