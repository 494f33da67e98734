//! Integration tests for the SQLite store.

use chrono::{Duration, TimeZone, Utc};
use parlor_protocol::UserId;
use parlor_store::{NewMessage, SessionRecord, SqliteStore, Store};
use parlor_transport::ConnectionId;

fn session(token: &str, name: &str, user: &str) -> SessionRecord {
    SessionRecord {
        token: token.into(),
        connection_id: ConnectionId::new(1),
        username: name.into(),
        user_id: UserId::from(user),
    }
}

fn base_time() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
}

// =========================================================================
// Sessions
// =========================================================================

#[tokio::test]
async fn test_find_session_after_insert_returns_record() {
    let store = SqliteStore::in_memory().unwrap();
    store.insert_session(session("tok", "alice", "u-a")).await.unwrap();

    let found = store.find_session("tok").await.unwrap();
    assert_eq!(found, Some(session("tok", "alice", "u-a")));
}

#[tokio::test]
async fn test_find_session_unknown_token_returns_none() {
    let store = SqliteStore::in_memory().unwrap();
    assert_eq!(store.find_session("nope").await.unwrap(), None);
}

#[tokio::test]
async fn test_insert_session_duplicate_token_returns_error() {
    let store = SqliteStore::in_memory().unwrap();
    store.insert_session(session("tok", "alice", "u-a")).await.unwrap();
    assert!(store.insert_session(session("tok", "bob", "u-b")).await.is_err());
}

#[tokio::test]
async fn test_update_session_connection_rebinds() {
    let store = SqliteStore::in_memory().unwrap();
    store.insert_session(session("tok", "alice", "u-a")).await.unwrap();

    store
        .update_session_connection("tok", ConnectionId::new(42))
        .await
        .unwrap();

    let found = store.find_session("tok").await.unwrap().unwrap();
    assert_eq!(found.connection_id, ConnectionId::new(42));
}

#[tokio::test]
async fn test_purge_user_removes_session_messages_and_memberships() {
    let store = SqliteStore::in_memory().unwrap();
    let alice = UserId::from("u-a");
    let bob = UserId::from("u-b");
    store.insert_session(session("tok", "alice", "u-a")).await.unwrap();
    store.insert_room_if_absent("dev", "").await.unwrap();
    store.add_membership("dev", &alice).await.unwrap();
    store
        .append_message(NewMessage::to_room(
            alice.clone(),
            "alice",
            "dev",
            "hi",
            base_time(),
        ))
        .await
        .unwrap();
    store
        .append_message(NewMessage::to_room(
            bob.clone(),
            "bob",
            "dev",
            "yo",
            base_time(),
        ))
        .await
        .unwrap();

    store.purge_user("tok", &alice).await.unwrap();

    assert_eq!(store.find_session("tok").await.unwrap(), None);
    assert!(store.rooms_for_user(&alice).await.unwrap().is_empty());
    let history = store.room_history("dev").await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].from_user_id, bob);
}

// =========================================================================
// Rooms
// =========================================================================

#[tokio::test]
async fn test_load_rooms_fresh_store_has_public() {
    let store = SqliteStore::in_memory().unwrap();
    let rooms = store.load_rooms().await.unwrap();
    assert_eq!(rooms.len(), 1);
    assert_eq!(rooms[0].name, "public");
    assert_eq!(rooms[0].password, "");
}

#[tokio::test]
async fn test_insert_room_if_absent_keeps_first_password() {
    let store = SqliteStore::in_memory().unwrap();
    assert!(store.insert_room_if_absent("vip", "secret").await.unwrap());
    assert!(!store.insert_room_if_absent("vip", "other").await.unwrap());

    let rooms = store.load_rooms().await.unwrap();
    let vip = rooms.iter().find(|r| r.name == "vip").unwrap();
    assert_eq!(vip.password, "secret");
}

#[tokio::test]
async fn test_load_rooms_preserves_insertion_order() {
    let store = SqliteStore::in_memory().unwrap();
    store.insert_room_if_absent("zeta", "").await.unwrap();
    store.insert_room_if_absent("alpha", "").await.unwrap();

    let names: Vec<String> = store
        .load_rooms()
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.name)
        .collect();
    assert_eq!(names, vec!["public", "zeta", "alpha"]);
}

#[tokio::test]
async fn test_add_membership_is_idempotent() {
    let store = SqliteStore::in_memory().unwrap();
    let alice = UserId::from("u-a");
    store.add_membership("dev", &alice).await.unwrap();
    store.add_membership("dev", &alice).await.unwrap();
    store.add_membership("ops", &alice).await.unwrap();

    assert_eq!(store.rooms_for_user(&alice).await.unwrap(), vec!["dev", "ops"]);
}

#[tokio::test]
async fn test_delete_room_removes_room_memberships_and_messages() {
    let store = SqliteStore::in_memory().unwrap();
    let alice = UserId::from("u-a");
    store.insert_room_if_absent("dev", "").await.unwrap();
    store.add_membership("dev", &alice).await.unwrap();
    store
        .append_message(NewMessage::to_room(
            alice.clone(),
            "alice",
            "dev",
            "hi",
            base_time(),
        ))
        .await
        .unwrap();

    store.delete_room("dev").await.unwrap();

    assert!(store.load_rooms().await.unwrap().iter().all(|r| r.name != "dev"));
    assert!(store.rooms_for_user(&alice).await.unwrap().is_empty());
    assert!(store.room_history("dev").await.unwrap().is_empty());
}

// =========================================================================
// Messages
// =========================================================================

#[tokio::test]
async fn test_room_history_orders_by_timestamp_then_id() {
    let store = SqliteStore::in_memory().unwrap();
    let alice = UserId::from("u-a");
    let t0 = base_time();

    // Appended out of time order on purpose.
    for (content, ts) in [
        ("second", t0 + Duration::seconds(1)),
        ("first", t0),
        ("third-a", t0 + Duration::seconds(2)),
        ("third-b", t0 + Duration::seconds(2)),
    ] {
        store
            .append_message(NewMessage::to_room(
                alice.clone(),
                "alice",
                "public",
                content,
                ts,
            ))
            .await
            .unwrap();
    }

    let contents: Vec<String> = store
        .room_history("public")
        .await
        .unwrap()
        .into_iter()
        .map(|m| m.content)
        .collect();
    assert_eq!(contents, vec!["first", "second", "third-a", "third-b"]);
}

#[tokio::test]
async fn test_room_history_excludes_private_and_other_rooms() {
    let store = SqliteStore::in_memory().unwrap();
    let alice = UserId::from("u-a");
    let bob = UserId::from("u-b");
    store
        .append_message(NewMessage::to_room(
            alice.clone(),
            "alice",
            "public",
            "hello all",
            base_time(),
        ))
        .await
        .unwrap();
    store
        .append_message(NewMessage::to_room(
            alice.clone(),
            "alice",
            "dev",
            "dev only",
            base_time(),
        ))
        .await
        .unwrap();
    store
        .append_message(NewMessage::private(
            alice.clone(),
            "alice",
            bob,
            "psst",
            base_time(),
        ))
        .await
        .unwrap();

    let history = store.room_history("public").await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].content, "hello all");
    assert_eq!(history[0].timestamp, base_time());
    assert!(!history[0].is_private);
}

#[tokio::test]
async fn test_private_history_includes_both_directions_only() {
    let store = SqliteStore::in_memory().unwrap();
    let alice = UserId::from("u-a");
    let bob = UserId::from("u-b");
    let carol = UserId::from("u-c");
    let t0 = base_time();

    let sends = [
        (&alice, "alice", &bob, "a->b", t0),
        (&bob, "bob", &alice, "b->a", t0 + Duration::seconds(1)),
        (&alice, "alice", &carol, "a->c", t0 + Duration::seconds(2)),
    ];
    for (from, name, to, content, ts) in sends {
        store
            .append_message(NewMessage::private(
                from.clone(),
                name,
                to.clone(),
                content,
                ts,
            ))
            .await
            .unwrap();
    }

    let from_alice: Vec<String> = store
        .private_history(&alice, &bob)
        .await
        .unwrap()
        .into_iter()
        .map(|m| m.content)
        .collect();
    assert_eq!(from_alice, vec!["a->b", "b->a"]);

    let from_bob = store.private_history(&bob, &alice).await.unwrap();
    assert_eq!(from_bob.len(), 2);
    assert_eq!(from_bob[0].to_user_id, Some(bob.clone()));
}

// =========================================================================
// Durability
// =========================================================================

#[tokio::test]
async fn test_reopen_file_store_keeps_rooms_and_sessions() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("chat.db");
    let alice = UserId::from("u-a");

    {
        let store = SqliteStore::open(&path).unwrap();
        store.insert_session(session("tok", "alice", "u-a")).await.unwrap();
        store.insert_room_if_absent("vip", "pw").await.unwrap();
        store.add_membership("vip", &alice).await.unwrap();
    }

    let store = SqliteStore::open(&path).unwrap();
    assert!(store.find_session("tok").await.unwrap().is_some());
    assert_eq!(store.rooms_for_user(&alice).await.unwrap(), vec!["vip"]);
    let rooms = store.load_rooms().await.unwrap();
    assert_eq!(rooms.len(), 2);
    assert_eq!(rooms[0].name, "public");
}
