//! The presence registry: who is online, and on which connection.

use std::collections::HashMap;

use parlor_protocol::{OnlineUser, User, UserId};
use parlor_transport::ConnectionId;
use tokio::sync::Mutex;

use crate::SessionError;

/// Outcome of [`PresenceRegistry::upsert`].
#[derive(Debug, Default, PartialEq)]
pub struct Upserted {
    /// Other connections that were online under the same display name.
    pub evicted: Vec<ConnectionId>,
    /// The user the upserted connection held before.
    pub displaced: Option<User>,
}

/// Maps each live connection to its authenticated user.
///
/// Display names are unique among entries. Every read and write takes the
/// one lock, so a name check and the insert that depends on it cannot
/// interleave with another connection's login.
#[derive(Default)]
pub struct PresenceRegistry {
    users: Mutex<HashMap<ConnectionId, User>>,
}

impl PresenceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `user` on its connection unless the display name is
    /// already online (exact, case-sensitive match). Returns the user the
    /// connection held before, if any.
    pub async fn try_register(
        &self,
        user: User,
    ) -> Result<Option<User>, SessionError> {
        let mut users = self.users.lock().await;
        if users.values().any(|u| u.name == user.name) {
            return Err(SessionError::UsernameTaken(user.name));
        }
        Ok(users.insert(user.id, user))
    }

    /// Registers `user`, replacing whatever its connection held and
    /// evicting any other connection registered under the same display
    /// name.
    pub async fn upsert(&self, user: User) -> Upserted {
        let mut users = self.users.lock().await;
        let evicted: Vec<ConnectionId> = users
            .iter()
            .filter(|(conn_id, u)| **conn_id != user.id && u.name == user.name)
            .map(|(conn_id, _)| *conn_id)
            .collect();
        for conn_id in &evicted {
            users.remove(conn_id);
        }
        let displaced = users.insert(user.id, user);
        Upserted { evicted, displaced }
    }

    /// Removes the connection's entry, returning the user it held.
    pub async fn remove(&self, conn_id: ConnectionId) -> Option<User> {
        self.users.lock().await.remove(&conn_id)
    }

    pub async fn get(&self, conn_id: ConnectionId) -> Option<User> {
        self.users.lock().await.get(&conn_id).cloned()
    }

    /// Finds the live connection of a user, if any.
    pub async fn find_by_user_id(&self, user_id: &UserId) -> Option<User> {
        self.users
            .lock()
            .await
            .values()
            .find(|u| &u.user_id == user_id)
            .cloned()
    }

    /// Snapshot of everyone online, ordered by connection id.
    pub async fn online_users(&self) -> Vec<OnlineUser> {
        let users = self.users.lock().await;
        let mut online: Vec<&User> = users.values().collect();
        online.sort_by_key(|u| u.id);
        online.into_iter().map(OnlineUser::from).collect()
    }

    pub async fn len(&self) -> usize {
        self.users.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.users.lock().await.is_empty()
    }
}
