//! Unified error type for the Parlor server.

use parlor_protocol::ProtocolError;
use parlor_room::RoomError;
use parlor_session::SessionError;
use parlor_store::StoreError;
use parlor_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant generates `From` impls, so the
/// `?` operator converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum ParlorError {
    /// A transport-level error (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// An event could not be encoded or decoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The store failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A room operation was refused or failed.
    #[error(transparent)]
    Room(#[from] RoomError),

    /// A session operation was refused or failed.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// An environment variable held an unusable value.
    #[error("invalid configuration: {0}")]
    Config(String),
}
