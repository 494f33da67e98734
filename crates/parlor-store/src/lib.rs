//! Durable storage for Parlor.
//!
//! The store is pure persistence: four tables (sessions, rooms, room
//! memberships, messages) and no business rules beyond what the schema
//! enforces. Everything above it talks to the [`Store`] trait so tests
//! and alternative backends can slot in; [`SqliteStore`] is the
//! production implementation.
//!
//! Every operation is async from the caller's point of view. The SQLite
//! backend runs each call on Tokio's blocking pool.

mod error;
mod migrations;
mod models;
mod sqlite;

pub use error::StoreError;
pub use models::{NewMessage, RoomRecord, SessionRecord, StoredMessage};
pub use sqlite::SqliteStore;

use std::future::Future;

use parlor_protocol::UserId;
use parlor_transport::ConnectionId;

/// The persistence interface the coordination core calls into.
///
/// The returned futures are `Send` so handlers holding a store can run
/// on any worker thread.
pub trait Store: Send + Sync + 'static {
    // -- Sessions --

    /// Persists a freshly issued session.
    fn insert_session(
        &self,
        session: SessionRecord,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Looks up a session by token.
    fn find_session(
        &self,
        token: &str,
    ) -> impl Future<Output = Result<Option<SessionRecord>, StoreError>> + Send;

    /// Records the connection a resumed session is now bound to.
    fn update_session_connection(
        &self,
        token: &str,
        conn_id: ConnectionId,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Deletes the session row, every message the user authored, and every
    /// room membership of the user.
    fn purge_user(
        &self,
        token: &str,
        user_id: &UserId,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    // -- Rooms --

    /// Returns every durable room in insertion order.
    fn load_rooms(
        &self,
    ) -> impl Future<Output = Result<Vec<RoomRecord>, StoreError>> + Send;

    /// Creates the room unless a row with that name already exists.
    /// Returns `true` if a row was inserted.
    fn insert_room_if_absent(
        &self,
        name: &str,
        password: &str,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send;

    /// Deletes a room row, its memberships, and its messages.
    fn delete_room(
        &self,
        name: &str,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Records a membership; existing pairs are left alone.
    fn add_membership(
        &self,
        room: &str,
        user_id: &UserId,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Names of every room the user durably belongs to.
    fn rooms_for_user(
        &self,
        user_id: &UserId,
    ) -> impl Future<Output = Result<Vec<String>, StoreError>> + Send;

    // -- Messages --

    /// Appends a message and returns its row id.
    fn append_message(
        &self,
        message: NewMessage,
    ) -> impl Future<Output = Result<i64, StoreError>> + Send;

    /// Non-private messages of a room, oldest first.
    fn room_history(
        &self,
        room: &str,
    ) -> impl Future<Output = Result<Vec<StoredMessage>, StoreError>> + Send;

    /// Private messages exchanged between two users in either direction,
    /// oldest first.
    fn private_history(
        &self,
        user: &UserId,
        peer: &UserId,
    ) -> impl Future<Output = Result<Vec<StoredMessage>, StoreError>> + Send;
}
