//! Room directory for Parlor.
//!
//! Rooms are durable (the store owns them) but membership checks and
//! password verification run against an in-memory mirror so a join does
//! not need a round trip. The mirror is rebuilt from the store at start
//! and every mutation is written through.
//!
//! # Key types
//!
//! - [`RoomDirectory`] - the mirror plus its write-through operations
//! - [`RoomMeta`] - what callers learn about a single room
//! - [`JoinOutcome`] / [`DeleteOutcome`] - results of membership changes

mod directory;
mod error;

pub use directory::{DeleteOutcome, JoinOutcome, RoomDirectory, RoomMeta};
pub use error::RoomError;
