//! Session and presence management for Parlor.
//!
//! This crate owns the lifecycle of a user on a connection:
//!
//! 1. **Login**: a display name becomes a [`User`](parlor_protocol::User)
//!    with a fresh user id and session token
//! 2. **Presence**: who is online, and on which connection
//!    ([`PresenceRegistry`])
//! 3. **Resumption**: a stored token rebinds an identity to a new
//!    connection, evicting a stale one if it is still around
//! 4. **Logout / disconnect**: tearing the identity down again
//!
//! # How it fits in the stack
//!
//! ```text
//! Server (above)          <- routes client events to the coordinator
//!     |
//! Session Layer (this)    <- identity, presence, room subscriptions
//!     |
//! Room / Store (below)    <- room directory and durable rows
//! ```

mod config;
mod coordinator;
mod error;
mod presence;

pub use config::{SessionConfig, generate_token, new_user_id};
pub use coordinator::SessionCoordinator;
pub use error::SessionError;
pub use presence::{PresenceRegistry, Upserted};
