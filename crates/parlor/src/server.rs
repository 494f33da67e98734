//! `ParlorServer` builder and server loop.
//!
//! This ties the layers together: transport → protocol → session/room →
//! store, plus the messaging router on top.

use std::sync::Arc;

use parlor_protocol::{JsonCodec, ServerEvent};
use parlor_room::RoomDirectory;
use parlor_session::{SessionConfig, SessionCoordinator};
use parlor_store::Store;
use parlor_transport::{Hub, Transport, WebSocketTransport};

use crate::handler::handle_connection;
use crate::{MessagingRouter, ParlorError};

/// Shared server state passed to each connection handler task.
pub(crate) struct ServerState<S> {
    pub(crate) sessions: Arc<SessionCoordinator<S>>,
    pub(crate) router: MessagingRouter<S>,
    pub(crate) hub: Hub<ServerEvent>,
    pub(crate) codec: JsonCodec,
}

/// Builder for configuring and starting a Parlor server.
///
/// # Example
///
/// ```rust,ignore
/// use parlor::prelude::*;
///
/// let server = ParlorServer::builder()
///     .bind("0.0.0.0:3000")
///     .admin_name("admin")
///     .build(SqliteStore::open(Path::new("chat.db"))?)
///     .await?;
/// server.run().await
/// ```
pub struct ParlorServerBuilder {
    bind_addr: String,
    session_config: SessionConfig,
}

impl ParlorServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:3000".to_string(),
            session_config: SessionConfig::default(),
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Sets the session configuration.
    pub fn session_config(mut self, config: SessionConfig) -> Self {
        self.session_config = config;
        self
    }

    /// Sets the display name that grants admin rights.
    pub fn admin_name(mut self, name: &str) -> Self {
        self.session_config.admin_name = name.to_string();
        self
    }

    /// Loads the room directory from `store` and binds the listener.
    pub async fn build<S: Store>(
        self,
        store: S,
    ) -> Result<ParlorServer<S>, ParlorError> {
        let store = Arc::new(store);
        let rooms = Arc::new(RoomDirectory::load(Arc::clone(&store)).await?);
        let hub = Hub::new();
        let sessions = Arc::new(SessionCoordinator::new(
            store,
            rooms,
            hub.clone(),
            self.session_config,
        ));

        let transport = WebSocketTransport::bind(&self.bind_addr).await?;

        let state = Arc::new(ServerState {
            router: MessagingRouter::new(Arc::clone(&sessions)),
            sessions,
            hub,
            codec: JsonCodec,
        });

        Ok(ParlorServer { transport, state })
    }
}

impl Default for ParlorServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound Parlor server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct ParlorServer<S> {
    transport: WebSocketTransport,
    state: Arc<ServerState<S>>,
}

impl<S: Store> ParlorServer<S> {
    /// Creates a new builder.
    pub fn builder() -> ParlorServerBuilder {
        ParlorServerBuilder::new()
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> Result<std::net::SocketAddr, ParlorError> {
        Ok(self.transport.local_addr()?)
    }

    /// Runs the server accept loop.
    ///
    /// Spawns a handler task for each accepted connection. Runs until the
    /// process is terminated.
    pub async fn run(mut self) -> Result<(), ParlorError> {
        tracing::info!("Parlor server running");

        loop {
            match self.transport.accept().await {
                Ok(conn) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(conn, state).await {
                            tracing::debug!(
                                error = %e,
                                "connection ended with error"
                            );
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}
