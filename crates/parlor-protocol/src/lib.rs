//! Wire protocol for Parlor.
//!
//! This crate defines what clients and the server say to each other:
//!
//! - **Events** ([`ClientEvent`], [`ServerEvent`]) — one JSON text frame
//!   per event, shaped `{"event": "<name>", "data": <payload>}`.
//! - **Records** ([`User`], [`ChatMessage`], [`RoomSummary`], ...) — the
//!   payloads those events carry.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]) — how events become bytes.
//!
//! ```text
//! Transport (frames) → Protocol (events) → Session / Rooms / Messaging
//! ```

mod codec;
mod error;
mod events;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use events::{
    ChatKind, ChatMessage, ChatTarget, ClientEvent, HistoryEntry, OnlineUser,
    PUBLIC_ROOM, RoomSummary, ServerEvent, TypingNotice, User, UserId,
};
