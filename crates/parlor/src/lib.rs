//! # Parlor
//!
//! Real-time chat server. Users log in with a display name, talk in the
//! public room, create or join password-protected rooms, and exchange
//! private messages. History is persisted and replayed on request.
//!
//! The heavy lifting lives in the layer crates; this crate wires them
//! into a WebSocket server and adds the [`MessagingRouter`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::path::Path;
//!
//! use parlor::prelude::*;
//!
//! # async fn run() -> Result<(), ParlorError> {
//! let server = ParlorServer::<SqliteStore>::builder()
//!     .bind("0.0.0.0:3000")
//!     .build(SqliteStore::open(Path::new("chat.db"))?)
//!     .await?;
//! server.run().await
//! # }
//! ```

mod config;
mod error;
mod handler;
mod messaging;
mod server;

pub use config::ServerConfig;
pub use error::ParlorError;
pub use messaging::MessagingRouter;
pub use server::{ParlorServer, ParlorServerBuilder};

pub mod prelude {
    pub use crate::{
        MessagingRouter, ParlorError, ParlorServer, ParlorServerBuilder,
        ServerConfig,
    };
    pub use parlor_protocol::{
        ChatKind, ChatMessage, ChatTarget, ClientEvent, HistoryEntry,
        OnlineUser, PUBLIC_ROOM, RoomSummary, ServerEvent, TypingNotice, User,
        UserId,
    };
    pub use parlor_session::SessionConfig;
    pub use parlor_store::{SqliteStore, Store};
}
