//! The session coordinator: login, resumption, logout, and the room
//! operations that depend on who a connection is.
//!
//! The coordinator owns the presence registry and shares the room
//! directory. Success replies and broadcasts are emitted here through the
//! hub; failures are returned so the caller decides what (if anything)
//! the client sees.

use std::sync::Arc;

use parlor_protocol::{PUBLIC_ROOM, ServerEvent, User};
use parlor_room::{DeleteOutcome, JoinOutcome, RoomDirectory};
use parlor_store::{SessionRecord, Store};
use parlor_transport::{ConnectionId, Hub};

use crate::{
    PresenceRegistry, SessionConfig, SessionError, generate_token, new_user_id,
};

/// Governs identity on every connection.
///
/// ## Lifecycle
///
/// ```text
/// login() ──────────┐
///                   ├──→ [online] ──→ disconnect() ──→ [offline, session kept]
/// resume_session() ─┘        │                               │
///                            │                      resume_session()
///                            ▼
///                        logout() ──→ [session, messages, memberships purged]
/// ```
///
/// Store writes are awaited but their failures are only logged: the
/// in-memory state has already moved on. Store reads that gate a decision
/// (session lookup, membership list) abort the operation on failure.
pub struct SessionCoordinator<S> {
    presence: PresenceRegistry,
    rooms: Arc<RoomDirectory<S>>,
    store: Arc<S>,
    hub: Hub<ServerEvent>,
    config: SessionConfig,
}

impl<S: Store> SessionCoordinator<S> {
    pub fn new(
        store: Arc<S>,
        rooms: Arc<RoomDirectory<S>>,
        hub: Hub<ServerEvent>,
        config: SessionConfig,
    ) -> Self {
        Self {
            presence: PresenceRegistry::new(),
            rooms,
            store,
            hub,
            config,
        }
    }

    pub fn presence(&self) -> &PresenceRegistry {
        &self.presence
    }

    pub fn rooms(&self) -> &RoomDirectory<S> {
        &self.rooms
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn hub(&self) -> &Hub<ServerEvent> {
        &self.hub
    }

    /// The user authenticated on `conn_id`, if any.
    pub async fn current_user(&self, conn_id: ConnectionId) -> Option<User> {
        self.presence.get(conn_id).await
    }

    // =====================================================================
    // Login / resume
    // =====================================================================

    /// Logs `conn_id` in under `name`.
    ///
    /// Mints a user id and token, registers presence, persists the
    /// session, and subscribes the connection to `public`. The caller gets
    /// `loginSuccess`; everyone gets the new user list.
    ///
    /// # Errors
    /// [`SessionError::EmptyName`] for a blank name,
    /// [`SessionError::UsernameTaken`] if the name is already online.
    pub async fn login(
        &self,
        conn_id: ConnectionId,
        name: &str,
    ) -> Result<User, SessionError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(SessionError::EmptyName);
        }

        let user = User {
            id: conn_id,
            name: name.to_owned(),
            token: generate_token(),
            user_id: new_user_id(),
            is_admin: self.config.is_admin(name),
        };
        if let Some(previous) = self.presence.try_register(user.clone()).await? {
            self.release_displaced(conn_id, &previous).await;
        }

        let record = SessionRecord {
            token: user.token.clone(),
            connection_id: conn_id,
            username: user.name.clone(),
            user_id: user.user_id.clone(),
        };
        if let Err(e) = self.store.insert_session(record).await {
            tracing::error!(%conn_id, error = %e, "failed to persist session");
        }

        tracing::info!(%conn_id, user_id = %user.user_id, name = %user.name, "user logged in");

        self.hub.emit(conn_id, ServerEvent::LoginSuccess(user.clone())).await;
        self.broadcast_user_list().await;

        self.hub.join(conn_id, PUBLIC_ROOM).await;
        if let Err(e) = self.rooms.join_room(&user.user_id, PUBLIC_ROOM, "").await {
            tracing::error!(%conn_id, error = %e, "failed to record public membership");
        }
        self.emit_room_list(conn_id).await;

        Ok(user)
    }

    /// Rebinds the identity behind `token` to `conn_id`.
    ///
    /// If the same display name is online on another connection, that
    /// connection receives `forceLogout` and loses its presence entry and
    /// subscriptions before the new connection gets `loginSuccess`. The
    /// connection is then resubscribed to every room the user durably
    /// belongs to.
    ///
    /// # Errors
    /// [`SessionError::InvalidSession`] for an unknown (or empty) token.
    /// [`SessionError::ConnectionGone`] if the connection closed while the
    /// session was being looked up.
    pub async fn resume_session(
        &self,
        conn_id: ConnectionId,
        token: &str,
    ) -> Result<User, SessionError> {
        if token.is_empty() {
            return Err(SessionError::InvalidSession);
        }

        let record = self
            .store
            .find_session(token)
            .await?
            .ok_or(SessionError::InvalidSession)?;
        let mut rooms = self.store.rooms_for_user(&record.user_id).await?;
        if !rooms.iter().any(|r| r == PUBLIC_ROOM) {
            rooms.insert(0, PUBLIC_ROOM.to_owned());
        }

        if !self.hub.is_connected(conn_id).await {
            return Err(SessionError::ConnectionGone);
        }

        let user = User {
            id: conn_id,
            is_admin: self.config.is_admin(&record.username),
            name: record.username,
            token: record.token,
            user_id: record.user_id,
        };

        let upserted = self.presence.upsert(user.clone()).await;
        for stale in upserted.evicted {
            tracing::info!(%stale, %conn_id, user_id = %user.user_id, "evicting stale connection");
            self.hub.emit(stale, ServerEvent::ForceLogout).await;
            self.hub.leave_all(stale).await;
        }
        if let Some(previous) = upserted
            .displaced
            .filter(|previous| previous.user_id != user.user_id)
        {
            self.release_displaced(conn_id, &previous).await;
        }

        if let Err(e) = self.store.update_session_connection(&user.token, conn_id).await {
            tracing::error!(%conn_id, error = %e, "failed to update session connection");
        }

        self.hub.emit(conn_id, ServerEvent::LoginSuccess(user.clone())).await;
        self.broadcast_user_list().await;

        let mut recreated = false;
        for room in &rooms {
            recreated |= self.rooms.restore_member(room, &user.user_id).await;
            self.hub.join(conn_id, room).await;
        }

        if recreated {
            self.broadcast_room_list().await;
        } else {
            self.emit_room_list(conn_id).await;
        }

        tracing::info!(%conn_id, user_id = %user.user_id, rooms = rooms.len(), "session resumed");
        Ok(user)
    }

    // =====================================================================
    // Logout / disconnect
    // =====================================================================

    /// Disconnects and then purges the user's session, authored messages,
    /// and memberships. The connection stays open but leaves every group.
    pub async fn logout(&self, conn_id: ConnectionId) {
        let Some(user) = self.disconnect(conn_id).await else {
            return;
        };

        self.hub.leave_all(conn_id).await;
        if let Err(e) = self.store.purge_user(&user.token, &user.user_id).await {
            tracing::error!(%conn_id, user_id = %user.user_id, error = %e, "failed to purge user");
        }

        tracing::info!(%conn_id, user_id = %user.user_id, "user logged out");
    }

    /// Drops the connection's presence and in-memory memberships, then
    /// tells everyone. Durable rows are untouched. Returns the user that
    /// was removed; a connection with no user is a no-op.
    pub async fn disconnect(&self, conn_id: ConnectionId) -> Option<User> {
        let user = self.presence.remove(conn_id).await?;
        self.rooms.remove_member_everywhere(&user.user_id).await;

        self.broadcast_user_list().await;
        self.broadcast_room_list().await;

        tracing::info!(%conn_id, user_id = %user.user_id, "user went offline");
        Some(user)
    }

    /// Clears the in-memory room state of a user that another identity
    /// replaced on the same connection. Their session row stays
    /// resumable, exactly as after a disconnect.
    async fn release_displaced(&self, conn_id: ConnectionId, previous: &User) {
        self.rooms.remove_member_everywhere(&previous.user_id).await;
        self.hub.leave_all(conn_id).await;
        tracing::info!(%conn_id, user_id = %previous.user_id, "identity replaced on connection");
    }

    // =====================================================================
    // Rooms
    // =====================================================================

    /// Joins the connection's user to `room_name`, creating the room with
    /// `password` if it does not exist.
    ///
    /// # Errors
    /// [`SessionError::NotLoggedIn`] for an anonymous connection, or a
    /// [`SessionError::Room`] carrying the directory's refusal.
    pub async fn join_room(
        &self,
        conn_id: ConnectionId,
        room_name: &str,
        password: &str,
    ) -> Result<JoinOutcome, SessionError> {
        let user = self
            .presence
            .get(conn_id)
            .await
            .ok_or(SessionError::NotLoggedIn)?;

        let outcome = self.rooms.join_room(&user.user_id, room_name, password).await?;
        self.hub.join(conn_id, room_name).await;

        self.broadcast_room_list().await;
        self.hub
            .emit(conn_id, ServerEvent::JoinRoomSuccess(room_name.to_owned()))
            .await;

        Ok(outcome)
    }

    /// Deletes a room. Admins only; `public` can never be deleted.
    ///
    /// Everyone subscribed to the room is dropped from its delivery group
    /// and the new room list goes out to all connections.
    pub async fn delete_room(
        &self,
        conn_id: ConnectionId,
        room_name: &str,
    ) -> Result<DeleteOutcome, SessionError> {
        let user = self
            .presence
            .get(conn_id)
            .await
            .ok_or(SessionError::NotLoggedIn)?;
        if !user.is_admin {
            return Err(SessionError::Unauthorized);
        }

        let outcome = self.rooms.delete_room(room_name).await?;
        if outcome == DeleteOutcome::Deleted {
            self.hub.remove_group(room_name).await;
            self.broadcast_room_list().await;
            tracing::info!(%conn_id, room = room_name, "room deleted by admin");
        }
        Ok(outcome)
    }

    // =====================================================================
    // Broadcasts
    // =====================================================================

    async fn broadcast_user_list(&self) {
        let users = self.presence.online_users().await;
        self.hub.broadcast(ServerEvent::UpdateUserList(users)).await;
    }

    async fn broadcast_room_list(&self) {
        let rooms = self.rooms.list_rooms().await;
        self.hub.broadcast(ServerEvent::UpdateRoomList(rooms)).await;
    }

    async fn emit_room_list(&self, conn_id: ConnectionId) {
        let rooms = self.rooms.list_rooms().await;
        self.hub.emit(conn_id, ServerEvent::UpdateRoomList(rooms)).await;
    }
}
