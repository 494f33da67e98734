//! Server-push fan-out: per-connection outbound channels plus named groups.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::{RwLock, mpsc};

use crate::ConnectionId;

/// Delivers outbound events to live connections.
///
/// Cheap to clone; every clone shares the same registry. Emitting to a
/// connection that is not (or no longer) registered is a silent no-op.
pub struct Hub<E> {
    inner: Arc<HubInner<E>>,
}

struct HubInner<E> {
    /// Outbound channel of every registered connection.
    connections: RwLock<HashMap<ConnectionId, mpsc::UnboundedSender<E>>>,

    /// Group name -> subscribed connections.
    groups: RwLock<HashMap<String, HashSet<ConnectionId>>>,
}

impl<E> Clone for Hub<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<E: Clone + Send + 'static> Default for Hub<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Clone + Send + 'static> Hub<E> {
    /// Creates an empty hub.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(HubInner {
                connections: RwLock::new(HashMap::new()),
                groups: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Registers a connection and returns the receiving end of its
    /// outbound channel. Registering the same id twice replaces the
    /// previous channel.
    pub async fn register(
        &self,
        conn_id: ConnectionId,
    ) -> mpsc::UnboundedReceiver<E> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner.connections.write().await.insert(conn_id, tx);
        tracing::debug!(%conn_id, "connection registered with hub");
        rx
    }

    /// Removes a connection and all of its group subscriptions.
    pub async fn unregister(&self, conn_id: ConnectionId) {
        self.inner.connections.write().await.remove(&conn_id);
        self.leave_all(conn_id).await;
        tracing::debug!(%conn_id, "connection unregistered from hub");
    }

    /// Returns `true` while the connection is registered.
    pub async fn is_connected(&self, conn_id: ConnectionId) -> bool {
        self.inner.connections.read().await.contains_key(&conn_id)
    }

    /// Sends an event to one connection. Returns `false` if it was not
    /// delivered (unknown connection or receiver dropped).
    pub async fn emit(&self, conn_id: ConnectionId, event: E) -> bool {
        let connections = self.inner.connections.read().await;
        match connections.get(&conn_id) {
            Some(tx) => tx.send(event).is_ok(),
            None => false,
        }
    }

    /// Sends an event to every registered connection.
    pub async fn broadcast(&self, event: E) {
        let connections = self.inner.connections.read().await;
        for tx in connections.values() {
            let _ = tx.send(event.clone());
        }
    }

    /// Subscribes a registered connection to a group. Unknown connections
    /// are ignored so a late subscribe cannot resurrect a closed socket.
    pub async fn join(&self, conn_id: ConnectionId, group: &str) {
        if !self.is_connected(conn_id).await {
            return;
        }
        self.inner
            .groups
            .write()
            .await
            .entry(group.to_owned())
            .or_default()
            .insert(conn_id);
    }

    /// Unsubscribes a connection from every group it is in.
    pub async fn leave_all(&self, conn_id: ConnectionId) {
        let mut groups = self.inner.groups.write().await;
        groups.retain(|_, members| {
            members.remove(&conn_id);
            !members.is_empty()
        });
    }

    /// Drops a group and all of its subscriptions.
    pub async fn remove_group(&self, group: &str) {
        self.inner.groups.write().await.remove(group);
    }

    /// Returns the connections currently subscribed to a group.
    pub async fn group_members(&self, group: &str) -> Vec<ConnectionId> {
        let groups = self.inner.groups.read().await;
        let mut members: Vec<ConnectionId> = groups
            .get(group)
            .map(|m| m.iter().copied().collect())
            .unwrap_or_default();
        members.sort();
        members
    }

    /// Sends an event to every connection subscribed to `group`.
    pub async fn emit_to_group(&self, group: &str, event: E) {
        self.emit_to_group_except(group, None, event).await;
    }

    /// Sends an event to every subscriber of `group` except `skip`.
    pub async fn emit_to_group_except(
        &self,
        group: &str,
        skip: Option<ConnectionId>,
        event: E,
    ) {
        // Snapshot the members first; never hold both locks at once.
        let members = self.group_members(group).await;
        let connections = self.inner.connections.read().await;
        for conn_id in members {
            if Some(conn_id) == skip {
                continue;
            }
            if let Some(tx) = connections.get(&conn_id) {
                let _ = tx.send(event.clone());
            }
        }
    }
}
