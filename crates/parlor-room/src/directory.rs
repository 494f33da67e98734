//! The room directory: in-memory room metadata and member sets, written
//! through to the store.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parlor_protocol::{PUBLIC_ROOM, RoomSummary, UserId};
use parlor_store::Store;
use tokio::sync::Mutex;

use crate::RoomError;

/// Public view of a single room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomMeta {
    pub name: String,
    pub has_password: bool,
}

/// Result of a successful [`RoomDirectory::join_room`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOutcome {
    /// The room already existed.
    Joined,
    /// The room did not exist and was created by this join.
    Created,
}

/// Result of a successful [`RoomDirectory::delete_room`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    /// The room is `public` or unknown; nothing changed.
    NoOp,
}

#[derive(Debug)]
struct RoomEntry {
    /// Empty means open.
    password: String,
    members: HashSet<UserId>,
}

impl RoomEntry {
    fn new(password: impl Into<String>) -> Self {
        Self {
            password: password.into(),
            members: HashSet::new(),
        }
    }

    fn meta(&self, name: &str) -> RoomMeta {
        RoomMeta {
            name: name.to_owned(),
            has_password: !self.password.is_empty(),
        }
    }
}

/// Room map plus creation order. `public` is always `order[0]`.
#[derive(Debug)]
struct DirectoryState {
    rooms: HashMap<String, RoomEntry>,
    order: Vec<String>,
}

impl DirectoryState {
    fn with_public() -> Self {
        let mut state = Self {
            rooms: HashMap::new(),
            order: Vec::new(),
        };
        state.insert(PUBLIC_ROOM, String::new());
        state
    }

    /// Inserts a room unless present. Returns `true` if it was new.
    fn insert(&mut self, name: &str, password: String) -> bool {
        if self.rooms.contains_key(name) {
            return false;
        }
        self.rooms.insert(name.to_owned(), RoomEntry::new(password));
        self.order.push(name.to_owned());
        true
    }

    fn remove(&mut self, name: &str) -> bool {
        if self.rooms.remove(name).is_none() {
            return false;
        }
        self.order.retain(|n| n != name);
        true
    }
}

/// Authoritative in-memory mirror of rooms and their members.
///
/// All reads and writes of the mirror go through a single lock, so
/// [`list_rooms`](Self::list_rooms) always sees a consistent snapshot.
/// That lock is never held across a store call.
///
/// Operations that write rooms or memberships (create, join, delete) also
/// take the `writes` gate for their whole duration, mirror update and
/// store call included. A join can therefore never land between a
/// delete's durable write and its mirror removal, and a membership row
/// always points at an existing room row.
pub struct RoomDirectory<S> {
    store: Arc<S>,
    state: Mutex<DirectoryState>,
    writes: Mutex<()>,
}

impl<S: Store> RoomDirectory<S> {
    /// Builds the mirror from the store's rooms. Member sets start empty;
    /// they fill up again as users log in or resume.
    pub async fn load(store: Arc<S>) -> Result<Self, RoomError> {
        let records = store.load_rooms().await?;

        let mut state = DirectoryState::with_public();
        for record in records {
            if record.name == PUBLIC_ROOM {
                continue;
            }
            state.insert(&record.name, record.password);
        }

        tracing::info!(rooms = state.order.len(), "room directory loaded");
        Ok(Self {
            store,
            state: Mutex::new(state),
            writes: Mutex::new(()),
        })
    }

    /// Creates the room if it does not exist yet and returns its metadata.
    ///
    /// An existing room keeps its original password. Concurrent calls for
    /// the same new name converge on one entry; the durable write is an
    /// insert-or-ignore so no duplicate row can appear either.
    pub async fn ensure_room(
        &self,
        name: &str,
        password: &str,
    ) -> Result<RoomMeta, RoomError> {
        let _writes = self.writes.lock().await;
        let (meta, _) = self.ensure_entry(name, password).await?;
        Ok(meta)
    }

    /// Adds `user_id` to the room, creating it with `password` if needed.
    ///
    /// Fails with [`RoomError::WrongPassword`] when the room is protected
    /// and `password` does not match exactly; membership is untouched in
    /// that case. `public` never checks a password.
    pub async fn join_room(
        &self,
        user_id: &UserId,
        name: &str,
        password: &str,
    ) -> Result<JoinOutcome, RoomError> {
        if name.trim().is_empty() {
            return Err(RoomError::InvalidName);
        }

        let _writes = self.writes.lock().await;
        let (_, created) = self.ensure_entry(name, password).await?;

        {
            let mut state = self.state.lock().await;
            if let Some(entry) = state.rooms.get_mut(name) {
                if name != PUBLIC_ROOM
                    && !entry.password.is_empty()
                    && entry.password != password
                {
                    return Err(RoomError::WrongPassword(name.to_owned()));
                }
                entry.members.insert(user_id.clone());
            }
        }
        self.store.add_membership(name, user_id).await?;

        tracing::debug!(room = name, %user_id, created, "joined room");
        Ok(if created {
            JoinOutcome::Created
        } else {
            JoinOutcome::Joined
        })
    }

    /// Deletes a room with its memberships and messages.
    ///
    /// `public` and unknown rooms are a [`DeleteOutcome::NoOp`]. The
    /// durable rows go first; the mirror entry is dropped only once the
    /// store has confirmed.
    pub async fn delete_room(
        &self,
        name: &str,
    ) -> Result<DeleteOutcome, RoomError> {
        let _writes = self.writes.lock().await;
        if name == PUBLIC_ROOM || !self.contains(name).await {
            return Ok(DeleteOutcome::NoOp);
        }

        self.store.delete_room(name).await?;
        self.state.lock().await.remove(name);

        tracing::info!(room = name, "room deleted");
        Ok(DeleteOutcome::Deleted)
    }

    /// Mirror insert plus durable create. Callers hold the `writes` gate.
    async fn ensure_entry(
        &self,
        name: &str,
        password: &str,
    ) -> Result<(RoomMeta, bool), RoomError> {
        let (meta, created) = {
            let mut state = self.state.lock().await;
            let created = state.insert(name, password.to_owned());
            let meta = state.rooms[name].meta(name);
            (meta, created)
        };

        if created {
            tracing::info!(room = name, "room created");
            self.store.insert_room_if_absent(name, password).await?;
        }
        Ok((meta, created))
    }

    /// Every room, `public` first, the rest in creation order.
    pub async fn list_rooms(&self) -> Vec<RoomSummary> {
        let state = self.state.lock().await;
        state
            .order
            .iter()
            .filter_map(|name| {
                state.rooms.get(name).map(|entry| RoomSummary {
                    name: name.clone(),
                    has_password: !entry.password.is_empty(),
                })
            })
            .collect()
    }

    /// Drops `user_id` from every member set. Durable memberships stay.
    pub async fn remove_member_everywhere(&self, user_id: &UserId) {
        let mut state = self.state.lock().await;
        for entry in state.rooms.values_mut() {
            entry.members.remove(user_id);
        }
    }

    /// Re-adds a member from a durable membership row.
    ///
    /// If the mirror lost the room it is recreated open (empty password),
    /// in memory only. Returns `true` when the room had to be recreated.
    pub async fn restore_member(&self, name: &str, user_id: &UserId) -> bool {
        let mut state = self.state.lock().await;
        let recreated = state.insert(name, String::new());
        if recreated {
            tracing::warn!(room = name, %user_id, "restored room missing from directory");
        }
        if let Some(entry) = state.rooms.get_mut(name) {
            entry.members.insert(user_id.clone());
        }
        recreated
    }

    /// Returns `true` if the room is in the mirror.
    pub async fn contains(&self, name: &str) -> bool {
        self.state.lock().await.rooms.contains_key(name)
    }

    /// Returns `true` if `user_id` is in the room's member set.
    pub async fn is_member(&self, name: &str, user_id: &UserId) -> bool {
        self.state
            .lock()
            .await
            .rooms
            .get(name)
            .is_some_and(|entry| entry.members.contains(user_id))
    }

    /// Members of a room, sorted for stable output.
    pub async fn members(&self, name: &str) -> Vec<UserId> {
        let state = self.state.lock().await;
        let mut members: Vec<UserId> = state
            .rooms
            .get(name)
            .map(|entry| entry.members.iter().cloned().collect())
            .unwrap_or_default();
        members.sort_by(|a, b| a.0.cmp(&b.0));
        members
    }

    /// Number of rooms, including `public`.
    pub async fn room_count(&self) -> usize {
        self.state.lock().await.order.len()
    }
}
