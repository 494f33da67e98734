//! Error types for the room layer.

use parlor_store::StoreError;

/// Errors that can occur during room operations.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    /// The room is protected and the supplied password does not match.
    #[error("incorrect password for room {0}")]
    WrongPassword(String),

    /// The room name is empty once surrounding whitespace is removed.
    #[error("room name cannot be empty")]
    InvalidName,

    /// The backing write or read failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}
