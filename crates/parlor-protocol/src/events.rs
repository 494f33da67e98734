//! Events and records that travel on the wire.
//!
//! Every frame is adjacently tagged:
//!
//! ```text
//! {"event": "joinRoom", "data": {"roomName": "rust", "password": ""}}
//! {"event": "logout"}
//! ```
//!
//! Event names and field names are camelCase because the browser client
//! reads them directly.

use std::fmt;

use chrono::{DateTime, Utc};
use parlor_transport::ConnectionId;
use serde::{Deserialize, Serialize};

/// Name of the room every user is subscribed to on login. It always
/// exists, is never password-protected, and cannot be deleted.
pub const PUBLIC_ROOM: &str = "public";

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// Stable user identity. Survives reconnects; minted once per login.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    /// Borrows the raw id.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// An authenticated user bound to one live connection.
///
/// Sent only to the owning connection (`loginSuccess`), since it carries
/// the session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// The live connection this user is bound to.
    pub id: ConnectionId,
    /// Display name, unique among online users (exact match).
    pub name: String,
    /// Bearer credential for `resumeSession`.
    pub token: String,
    pub user_id: UserId,
    pub is_admin: bool,
}

/// The public view of a [`User`] used in `updateUserList`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnlineUser {
    pub id: ConnectionId,
    pub name: String,
    pub user_id: UserId,
    pub is_admin: bool,
}

impl From<&User> for OnlineUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            user_id: user.user_id.clone(),
            is_admin: user.is_admin,
        }
    }
}

// ---------------------------------------------------------------------------
// Rooms and chat targets
// ---------------------------------------------------------------------------

/// One entry of `updateRoomList`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSummary {
    pub name: String,
    pub has_password: bool,
}

/// What kind of conversation a [`ChatTarget`] names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatKind {
    Public,
    Room,
    Private,
}

/// A conversation: a room (by name) or a private chat (by peer user id).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTarget {
    #[serde(rename = "type")]
    pub kind: ChatKind,
    pub id: String,
}

impl ChatTarget {
    /// Targets a room by name.
    pub fn room(name: impl Into<String>) -> Self {
        Self {
            kind: ChatKind::Room,
            id: name.into(),
        }
    }

    /// Targets the public room.
    pub fn public() -> Self {
        Self {
            kind: ChatKind::Public,
            id: PUBLIC_ROOM.to_owned(),
        }
    }

    /// Targets a private chat with the given user.
    pub fn private(peer: &UserId) -> Self {
        Self {
            kind: ChatKind::Private,
            id: peer.0.clone(),
        }
    }

    pub fn is_private(&self) -> bool {
        self.kind == ChatKind::Private
    }
}

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

/// A chat message as pushed live (`chatMessage`).
///
/// Exactly one of `to` / `room` is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub from: UserId,
    /// Sender's display name at send time; never corrected afterwards.
    pub from_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<UserId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room: Option<String>,
    pub content: String,
    pub is_private: bool,
    pub timestamp: DateTime<Utc>,
}

/// A replayed message inside `chatHistory`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub from: UserId,
    pub from_name: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

/// Relayed typing indicator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingNotice {
    pub from: UserId,
    pub from_name: String,
    pub target: ChatTarget,
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Client → server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "event",
    content = "data",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum ClientEvent {
    /// Log in with a display name.
    Login(String),
    /// Re-authenticate with a session token from an earlier login.
    ResumeSession(String),
    /// End the session and purge the user's history and memberships.
    Logout,
    /// Join (or implicitly create) a room.
    JoinRoom {
        room_name: String,
        #[serde(default)]
        password: String,
    },
    /// Admin only: delete a room and everything in it.
    DeleteRoom(String),
    /// Replay the full history of a conversation.
    RequestHistory(ChatTarget),
    ChatMessage {
        content: String,
        target: ChatTarget,
    },
    Typing {
        target: ChatTarget,
    },
    StopTyping {
        target: ChatTarget,
    },
}

/// Server → client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "event",
    content = "data",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum ServerEvent {
    LoginSuccess(User),
    LoginError(String),
    /// The same account was resumed on another connection.
    ForceLogout,
    /// The presented session token is unknown; the client should drop it.
    InvalidSession,
    JoinRoomError(String),
    JoinRoomSuccess(String),
    UpdateUserList(Vec<OnlineUser>),
    UpdateRoomList(Vec<RoomSummary>),
    ChatMessage(ChatMessage),
    ChatHistory {
        chat_id: String,
        history: Vec<HistoryEntry>,
    },
    Typing(TypingNotice),
    StopTyping(TypingNotice),
}

// =========================================================================
// Tests
// =========================================================================
