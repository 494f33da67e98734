//! Row types. These map directly to table rows and stay independent of
//! the wire types, which are built from them one layer up.

use chrono::{DateTime, Utc};
use parlor_protocol::UserId;
use parlor_transport::ConnectionId;

/// A row of `sessions`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRecord {
    pub token: String,
    /// Last connection the session was bound to.
    pub connection_id: ConnectionId,
    pub username: String,
    pub user_id: UserId,
}

/// A row of `rooms`. An empty password means the room is open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomRecord {
    pub name: String,
    pub password: String,
}

/// A message about to be appended.
///
/// Build it with [`NewMessage::to_room`] or [`NewMessage::private`]; the
/// constructors guarantee exactly one of `to_user_id` / `room` is set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    pub from_user_id: UserId,
    pub from_user_name: String,
    pub to_user_id: Option<UserId>,
    pub room: Option<String>,
    pub content: String,
    pub is_private: bool,
    pub timestamp: DateTime<Utc>,
}

impl NewMessage {
    pub fn to_room(
        from: UserId,
        from_name: impl Into<String>,
        room: impl Into<String>,
        content: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            from_user_id: from,
            from_user_name: from_name.into(),
            to_user_id: None,
            room: Some(room.into()),
            content: content.into(),
            is_private: false,
            timestamp,
        }
    }

    pub fn private(
        from: UserId,
        from_name: impl Into<String>,
        to: UserId,
        content: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            from_user_id: from,
            from_user_name: from_name.into(),
            to_user_id: Some(to),
            room: None,
            content: content.into(),
            is_private: true,
            timestamp,
        }
    }
}

/// A row of `messages` as read back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredMessage {
    pub id: i64,
    pub from_user_id: UserId,
    pub from_user_name: String,
    pub to_user_id: Option<UserId>,
    pub room: Option<String>,
    pub content: String,
    pub is_private: bool,
    pub timestamp: DateTime<Utc>,
}
