//! Error types for the session layer.

use parlor_room::RoomError;
use parlor_store::StoreError;

/// Errors that can occur while handling a session operation.
///
/// Only the first three are ever shown to a user. The rest are logged
/// and the operation is dropped without a reply.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Another online user already has this display name.
    #[error("username {0:?} is already taken")]
    UsernameTaken(String),

    /// The display name is empty once whitespace is trimmed.
    #[error("username cannot be empty")]
    EmptyName,

    /// The token does not match any stored session.
    #[error("invalid session token")]
    InvalidSession,

    /// The connection has no authenticated user.
    #[error("connection is not logged in")]
    NotLoggedIn,

    /// The user is not allowed to perform this operation.
    #[error("operation not permitted")]
    Unauthorized,

    /// The connection went away while the operation was waiting on the
    /// store.
    #[error("connection closed during operation")]
    ConnectionGone,

    #[error(transparent)]
    Room(#[from] RoomError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
