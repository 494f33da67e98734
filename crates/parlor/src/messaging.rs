//! Messaging router: persists chat messages and fans them out, replays
//! history, and relays typing indicators.

use std::sync::Arc;

use chrono::{SubsecRound, Utc};
use parlor_protocol::{
    ChatMessage, ChatTarget, HistoryEntry, ServerEvent, TypingNotice, User,
    UserId,
};
use parlor_session::{SessionCoordinator, SessionError};
use parlor_store::{NewMessage, Store, StoredMessage};
use parlor_transport::ConnectionId;

use crate::ParlorError;

/// Routes chat traffic for authenticated connections.
///
/// Room messages are delivered to the room's hub group, not to the room
/// directory's member set: whoever is subscribed to the group receives
/// them, whether or not the directory currently lists them as a member.
pub struct MessagingRouter<S> {
    sessions: Arc<SessionCoordinator<S>>,
}

impl<S: Store> MessagingRouter<S> {
    pub fn new(sessions: Arc<SessionCoordinator<S>>) -> Self {
        Self { sessions }
    }

    /// Persists a message from `conn_id` and delivers it.
    ///
    /// - room / public: to every connection in the room's group
    /// - private: echoed to the sender, pushed to the recipient only if
    ///   they are online. An offline recipient finds it in history later.
    ///
    /// Nothing is delivered unless the write succeeded.
    pub async fn send(
        &self,
        conn_id: ConnectionId,
        content: &str,
        target: &ChatTarget,
    ) -> Result<(), ParlorError> {
        let sender = self.sender(conn_id).await?;
        if content.trim().is_empty() {
            tracing::debug!(%conn_id, "ignoring empty chat message");
            return Ok(());
        }

        // Stored at millisecond precision; keep the live copy identical.
        let timestamp = Utc::now().trunc_subsecs(3);
        let hub = self.sessions.hub();

        if target.is_private() {
            let to = UserId(target.id.clone());
            self.sessions
                .store()
                .append_message(NewMessage::private(
                    sender.user_id.clone(),
                    sender.name.clone(),
                    to.clone(),
                    content,
                    timestamp,
                ))
                .await?;

            let message = ChatMessage {
                from: sender.user_id,
                from_name: sender.name,
                to: Some(to.clone()),
                room: None,
                content: content.to_owned(),
                is_private: true,
                timestamp,
            };

            // Resolved after the write so a recipient who just left is
            // not pushed to.
            let recipient = self.sessions.presence().find_by_user_id(&to).await;
            if let Some(recipient) = recipient.filter(|r| r.id != conn_id) {
                hub.emit(recipient.id, ServerEvent::ChatMessage(message.clone()))
                    .await;
            } else {
                tracing::debug!(%conn_id, to = %to, "private recipient offline");
            }
            hub.emit(conn_id, ServerEvent::ChatMessage(message)).await;
        } else {
            let room = target.id.clone();
            self.sessions
                .store()
                .append_message(NewMessage::to_room(
                    sender.user_id.clone(),
                    sender.name.clone(),
                    room.clone(),
                    content,
                    timestamp,
                ))
                .await?;

            let message = ChatMessage {
                from: sender.user_id,
                from_name: sender.name,
                to: None,
                room: Some(room.clone()),
                content: content.to_owned(),
                is_private: false,
                timestamp,
            };
            hub.emit_to_group(&room, ServerEvent::ChatMessage(message)).await;
        }

        Ok(())
    }

    /// Replays the full history of a conversation to `conn_id`, oldest
    /// first, as `chatHistory { chatId, history }`.
    pub async fn history(
        &self,
        conn_id: ConnectionId,
        target: &ChatTarget,
    ) -> Result<(), ParlorError> {
        let user = self.sender(conn_id).await?;
        let store = self.sessions.store();

        let rows = if target.is_private() {
            store
                .private_history(&user.user_id, &UserId(target.id.clone()))
                .await?
        } else {
            store.room_history(&target.id).await?
        };

        let hub = self.sessions.hub();
        if !hub.is_connected(conn_id).await {
            tracing::debug!(%conn_id, "history ready but connection is gone");
            return Ok(());
        }

        let event = ServerEvent::ChatHistory {
            chat_id: target.id.clone(),
            history: rows.into_iter().map(history_entry).collect(),
        };
        hub.emit(conn_id, event).await;
        Ok(())
    }

    /// Relays a typing indicator. `started` selects `typing` over
    /// `stopTyping`. Nothing is persisted.
    pub async fn typing(
        &self,
        conn_id: ConnectionId,
        target: &ChatTarget,
        started: bool,
    ) -> Result<(), ParlorError> {
        let sender = self.sender(conn_id).await?;
        let notice = TypingNotice {
            from: sender.user_id,
            from_name: sender.name,
            target: target.clone(),
        };
        let event = if started {
            ServerEvent::Typing(notice)
        } else {
            ServerEvent::StopTyping(notice)
        };

        let hub = self.sessions.hub();
        if target.is_private() {
            let peer = UserId(target.id.clone());
            if let Some(recipient) = self.sessions.presence().find_by_user_id(&peer).await {
                hub.emit(recipient.id, event).await;
            }
        } else {
            hub.emit_to_group_except(&target.id, Some(conn_id), event).await;
        }
        Ok(())
    }

    async fn sender(&self, conn_id: ConnectionId) -> Result<User, ParlorError> {
        self.sessions
            .current_user(conn_id)
            .await
            .ok_or(ParlorError::Session(SessionError::NotLoggedIn))
    }
}

fn history_entry(row: StoredMessage) -> HistoryEntry {
    HistoryEntry {
        from: row.from_user_id,
        from_name: row.from_user_name,
        content: row.content,
        timestamp: row.timestamp,
    }
}

#[cfg(test)]
mod tests {
    use parlor_protocol::{ChatKind, PUBLIC_ROOM};
    use parlor_room::RoomDirectory;
    use parlor_session::SessionConfig;
    use parlor_store::SqliteStore;
    use parlor_transport::Hub;
    use tokio::sync::mpsc::UnboundedReceiver;

    use super::*;

    struct Fixture {
        router: MessagingRouter<SqliteStore>,
        sessions: Arc<SessionCoordinator<SqliteStore>>,
        hub: Hub<ServerEvent>,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let rooms = Arc::new(RoomDirectory::load(Arc::clone(&store)).await.unwrap());
        let hub = Hub::new();
        let sessions = Arc::new(SessionCoordinator::new(
            store,
            rooms,
            hub.clone(),
            SessionConfig::default(),
        ));
        Fixture {
            router: MessagingRouter::new(Arc::clone(&sessions)),
            sessions,
            hub,
        }
    }

    /// Registers and logs in a connection, discarding the login traffic.
    async fn login(
        f: &Fixture,
        id: u64,
        name: &str,
    ) -> (User, UnboundedReceiver<ServerEvent>) {
        let conn = ConnectionId::new(id);
        let mut rx = f.hub.register(conn).await;
        let user = f.sessions.login(conn, name).await.unwrap();
        drain(&mut rx);
        (user, rx)
    }

    fn drain(rx: &mut UnboundedReceiver<ServerEvent>) -> Vec<ServerEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    fn chat_messages(events: Vec<ServerEvent>) -> Vec<ChatMessage> {
        events
            .into_iter()
            .filter_map(|e| match e {
                ServerEvent::ChatMessage(m) => Some(m),
                _ => None,
            })
            .collect()
    }

    fn history_of(events: Vec<ServerEvent>) -> (String, Vec<HistoryEntry>) {
        events
            .into_iter()
            .find_map(|e| match e {
                ServerEvent::ChatHistory { chat_id, history } => Some((chat_id, history)),
                _ => None,
            })
            .unwrap()
    }

    // =====================================================================
    // send
    // =====================================================================

    #[tokio::test]
    async fn test_send_public_reaches_every_subscriber() {
        let f = fixture().await;
        let (alice, mut rx_a) = login(&f, 1, "alice").await;
        let (_bob, mut rx_b) = login(&f, 2, "bob").await;

        f.router.send(alice.id, "hello", &ChatTarget::public()).await.unwrap();

        for rx in [&mut rx_a, &mut rx_b] {
            let messages = chat_messages(drain(rx));
            assert_eq!(messages.len(), 1);
            assert_eq!(messages[0].content, "hello");
            assert_eq!(messages[0].from, alice.user_id);
            assert_eq!(messages[0].room.as_deref(), Some(PUBLIC_ROOM));
            assert!(!messages[0].is_private);
        }
    }

    #[tokio::test]
    async fn test_send_room_skips_unsubscribed_connections() {
        let f = fixture().await;
        let (alice, mut rx_a) = login(&f, 1, "alice").await;
        let (_bob, mut rx_b) = login(&f, 2, "bob").await;
        f.sessions.join_room(alice.id, "dev", "").await.unwrap();
        drain(&mut rx_a);
        drain(&mut rx_b);

        f.router.send(alice.id, "dev talk", &ChatTarget::room("dev")).await.unwrap();

        assert_eq!(chat_messages(drain(&mut rx_a)).len(), 1);
        assert!(chat_messages(drain(&mut rx_b)).is_empty());
    }

    #[tokio::test]
    async fn test_send_room_delivers_by_group_not_member_set() {
        let f = fixture().await;
        let (alice, mut rx_a) = login(&f, 1, "alice").await;
        let (bob, mut rx_b) = login(&f, 2, "bob").await;
        f.sessions.join_room(bob.id, "dev", "").await.unwrap();
        // Bookkeeping loses bob, but his connection stays in the group.
        f.sessions.rooms().remove_member_everywhere(&bob.user_id).await;
        drain(&mut rx_b);

        f.router.send(alice.id, "still there?", &ChatTarget::room("dev")).await.unwrap();

        assert_eq!(chat_messages(drain(&mut rx_b)).len(), 1);
        // Alice never joined the group.
        assert!(chat_messages(drain(&mut rx_a)).is_empty());
    }

    #[tokio::test]
    async fn test_send_private_online_reaches_both_parties_only() {
        let f = fixture().await;
        let (alice, mut rx_a) = login(&f, 1, "alice").await;
        let (bob, mut rx_b) = login(&f, 2, "bob").await;
        let (_carol, mut rx_c) = login(&f, 3, "carol").await;

        f.router
            .send(alice.id, "psst", &ChatTarget::private(&bob.user_id))
            .await
            .unwrap();

        let to_bob = chat_messages(drain(&mut rx_b));
        assert_eq!(to_bob.len(), 1);
        assert!(to_bob[0].is_private);
        assert_eq!(to_bob[0].to, Some(bob.user_id.clone()));
        assert_eq!(chat_messages(drain(&mut rx_a)), to_bob);
        assert!(drain(&mut rx_c).is_empty());
    }

    #[tokio::test]
    async fn test_send_private_offline_persists_and_echoes() {
        let f = fixture().await;
        let (alice, mut rx_a) = login(&f, 1, "alice").await;
        let offline = UserId::from("u-offline");

        f.router
            .send(alice.id, "see you", &ChatTarget::private(&offline))
            .await
            .unwrap();

        assert_eq!(chat_messages(drain(&mut rx_a)).len(), 1);
        let rows = f
            .sessions
            .store()
            .private_history(&alice.user_id, &offline)
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].content, "see you");
    }

    #[tokio::test]
    async fn test_send_anonymous_returns_not_logged_in() {
        let f = fixture().await;
        let conn = ConnectionId::new(9);
        let _rx = f.hub.register(conn).await;

        let result = f.router.send(conn, "hi", &ChatTarget::public()).await;

        assert!(matches!(
            result,
            Err(ParlorError::Session(SessionError::NotLoggedIn))
        ));
        assert!(f.sessions.store().room_history(PUBLIC_ROOM).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_send_blank_content_is_ignored() {
        let f = fixture().await;
        let (alice, mut rx_a) = login(&f, 1, "alice").await;

        f.router.send(alice.id, "   ", &ChatTarget::public()).await.unwrap();

        assert!(drain(&mut rx_a).is_empty());
        assert!(f.sessions.store().room_history(PUBLIC_ROOM).await.unwrap().is_empty());
    }

    // =====================================================================
    // history
    // =====================================================================

    #[tokio::test]
    async fn test_history_room_returns_sent_messages_in_order() {
        let f = fixture().await;
        let (alice, mut rx_a) = login(&f, 1, "alice").await;
        for text in ["one", "two", "three"] {
            f.router.send(alice.id, text, &ChatTarget::public()).await.unwrap();
        }
        drain(&mut rx_a);

        f.router.history(alice.id, &ChatTarget::public()).await.unwrap();

        let (chat_id, history) = history_of(drain(&mut rx_a));
        assert_eq!(chat_id, PUBLIC_ROOM);
        let contents: Vec<&str> = history.iter().map(|h| h.content.as_str()).collect();
        assert_eq!(contents, vec!["one", "two", "three"]);
        assert!(history.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
        assert_eq!(history[0].from_name, "alice");
    }

    #[tokio::test]
    async fn test_history_private_includes_both_directions() {
        let f = fixture().await;
        let (alice, mut rx_a) = login(&f, 1, "alice").await;
        let (bob, _rx_b) = login(&f, 2, "bob").await;
        f.router.send(alice.id, "hi bob", &ChatTarget::private(&bob.user_id)).await.unwrap();
        f.router.send(bob.id, "hi alice", &ChatTarget::private(&alice.user_id)).await.unwrap();
        f.router.send(alice.id, "public", &ChatTarget::public()).await.unwrap();
        drain(&mut rx_a);

        let target = ChatTarget::private(&bob.user_id);
        f.router.history(alice.id, &target).await.unwrap();

        let (chat_id, history) = history_of(drain(&mut rx_a));
        assert_eq!(chat_id, bob.user_id.0);
        let contents: Vec<&str> = history.iter().map(|h| h.content.as_str()).collect();
        assert_eq!(contents, vec!["hi bob", "hi alice"]);
    }

    #[tokio::test]
    async fn test_history_live_message_matches_replay() {
        let f = fixture().await;
        let (alice, mut rx_a) = login(&f, 1, "alice").await;
        f.router.send(alice.id, "same", &ChatTarget::public()).await.unwrap();
        let live = chat_messages(drain(&mut rx_a)).remove(0);

        f.router.history(alice.id, &ChatTarget::public()).await.unwrap();

        let (_, history) = history_of(drain(&mut rx_a));
        assert_eq!(history[0].timestamp, live.timestamp);
    }

    #[tokio::test]
    async fn test_history_disconnected_connection_emits_nothing() {
        let f = fixture().await;
        let (alice, _rx_a) = login(&f, 1, "alice").await;
        f.hub.unregister(alice.id).await;

        assert!(f.router.history(alice.id, &ChatTarget::public()).await.is_ok());
    }

    // =====================================================================
    // typing
    // =====================================================================

    #[tokio::test]
    async fn test_typing_room_skips_sender() {
        let f = fixture().await;
        let (alice, mut rx_a) = login(&f, 1, "alice").await;
        let (_bob, mut rx_b) = login(&f, 2, "bob").await;

        f.router.typing(alice.id, &ChatTarget::public(), true).await.unwrap();

        assert!(drain(&mut rx_a).is_empty());
        match drain(&mut rx_b).as_slice() {
            [ServerEvent::Typing(notice)] => {
                assert_eq!(notice.from, alice.user_id);
                assert_eq!(notice.target.kind, ChatKind::Public);
            }
            other => panic!("expected one typing event, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_stop_typing_private_reaches_recipient_only() {
        let f = fixture().await;
        let (alice, mut rx_a) = login(&f, 1, "alice").await;
        let (bob, mut rx_b) = login(&f, 2, "bob").await;
        let (_carol, mut rx_c) = login(&f, 3, "carol").await;

        f.router
            .typing(alice.id, &ChatTarget::private(&bob.user_id), false)
            .await
            .unwrap();

        assert!(matches!(drain(&mut rx_b).as_slice(), [ServerEvent::StopTyping(_)]));
        assert!(drain(&mut rx_a).is_empty());
        assert!(drain(&mut rx_c).is_empty());
    }
}
