//! Per-connection handler: decode client events, dispatch them, and pump
//! hub events back out to the socket.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Register with the hub to get an outbound channel
//!   2. Loop: inbound frame → decode → dispatch, or outbound event → send
//!   3. On exit: mark the user offline and unregister from the hub

use std::sync::Arc;

use parlor_protocol::{ClientEvent, Codec, ServerEvent};
use parlor_room::RoomError;
use parlor_session::SessionError;
use parlor_store::Store;
use parlor_transport::{Connection, ConnectionId, WebSocketConnection};

use crate::server::ServerState;
use crate::ParlorError;

/// Drop guard that takes a connection offline when the handler exits.
///
/// This ensures cleanup happens even if the handler returns early with an
/// error or panics. Since `Drop` is synchronous, the async cleanup runs as
/// a spawned task.
struct ConnectionGuard<S: Store> {
    conn_id: ConnectionId,
    state: Arc<ServerState<S>>,
}

impl<S: Store> Drop for ConnectionGuard<S> {
    fn drop(&mut self) {
        let conn_id = self.conn_id;
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            state.sessions.disconnect(conn_id).await;
            state.hub.unregister(conn_id).await;
            tracing::debug!(%conn_id, "connection cleaned up");
        });
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<S: Store>(
    conn: WebSocketConnection,
    state: Arc<ServerState<S>>,
) -> Result<(), ParlorError> {
    let conn_id = conn.id();
    tracing::debug!(%conn_id, "handling new connection");

    let mut outbound = state.hub.register(conn_id).await;
    let _guard = ConnectionGuard {
        conn_id,
        state: Arc::clone(&state),
    };

    loop {
        tokio::select! {
            inbound = conn.recv() => match inbound {
                Ok(Some(data)) => dispatch(&state, conn_id, &data).await,
                Ok(None) => {
                    tracing::info!(%conn_id, "connection closed cleanly");
                    break;
                }
                Err(e) => {
                    tracing::debug!(%conn_id, error = %e, "recv error");
                    break;
                }
            },
            Some(event) = outbound.recv() => {
                let text = state.codec.encode(&event)?;
                conn.send(&text).await?;
            }
        }
    }

    // _guard drops here → disconnect fires.
    Ok(())
}

/// Decodes one inbound frame and routes it. Malformed frames are dropped.
async fn dispatch<S: Store>(
    state: &ServerState<S>,
    conn_id: ConnectionId,
    data: &[u8],
) {
    let event: ClientEvent = match state.codec.decode(data) {
        Ok(event) => event,
        Err(e) => {
            tracing::debug!(%conn_id, error = %e, "failed to decode client event");
            return;
        }
    };

    let sessions = &state.sessions;
    let result: Result<(), ParlorError> = match event {
        ClientEvent::Login(name) => {
            sessions.login(conn_id, &name).await.map(drop).map_err(Into::into)
        }
        ClientEvent::ResumeSession(token) => sessions
            .resume_session(conn_id, &token)
            .await
            .map(drop)
            .map_err(Into::into),
        ClientEvent::Logout => {
            sessions.logout(conn_id).await;
            Ok(())
        }
        ClientEvent::JoinRoom {
            room_name,
            password,
        } => sessions
            .join_room(conn_id, &room_name, &password)
            .await
            .map(drop)
            .map_err(Into::into),
        ClientEvent::DeleteRoom(room_name) => sessions
            .delete_room(conn_id, &room_name)
            .await
            .map(drop)
            .map_err(Into::into),
        ClientEvent::RequestHistory(target) => {
            state.router.history(conn_id, &target).await
        }
        ClientEvent::ChatMessage { content, target } => {
            state.router.send(conn_id, &content, &target).await
        }
        ClientEvent::Typing { target } => {
            state.router.typing(conn_id, &target, true).await
        }
        ClientEvent::StopTyping { target } => {
            state.router.typing(conn_id, &target, false).await
        }
    };

    if let Err(e) = result {
        match reply_for(&e) {
            Some(reply) => {
                state.hub.emit(conn_id, reply).await;
            }
            None => log_failure(conn_id, &e),
        }
    }
}

/// The event a failure is reported to the client as, if any.
///
/// Only validation failures are answered. Missing authentication and
/// permission failures stay silent.
fn reply_for(err: &ParlorError) -> Option<ServerEvent> {
    let reply = match err {
        ParlorError::Session(SessionError::UsernameTaken(_)) => {
            ServerEvent::LoginError("Username is already taken.".into())
        }
        ParlorError::Session(SessionError::EmptyName) => {
            ServerEvent::LoginError("Username cannot be empty.".into())
        }
        ParlorError::Session(SessionError::InvalidSession) => {
            ServerEvent::InvalidSession
        }
        ParlorError::Session(SessionError::Room(RoomError::WrongPassword(_))) => {
            ServerEvent::JoinRoomError("Incorrect password.".into())
        }
        ParlorError::Session(SessionError::Room(RoomError::InvalidName)) => {
            ServerEvent::JoinRoomError("Room name cannot be empty.".into())
        }
        _ => return None,
    };
    Some(reply)
}

fn log_failure(conn_id: ConnectionId, err: &ParlorError) {
    match err {
        ParlorError::Store(_)
        | ParlorError::Session(SessionError::Store(_))
        | ParlorError::Session(SessionError::Room(RoomError::Store(_)))
        | ParlorError::Room(RoomError::Store(_)) => {
            tracing::error!(%conn_id, error = %err, "store failure, operation aborted");
        }
        _ => {
            tracing::debug!(%conn_id, error = %err, "client event ignored");
        }
    }
}
