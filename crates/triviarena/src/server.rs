//! Server builder and accept loop.
//!
//! Ties the layers together: transport → protocol → session → rooms.
//! The collaborators (document store, question source, token verifier)
//! are injected here, which is also how tests swap them out.

use std::sync::Arc;

use tokio::sync::Mutex;
use triviarena_engine::{QuestionSource, RoomService};
use triviarena_protocol::JsonCodec;
use triviarena_session::{Authenticator, ConnectivityTracker};
use triviarena_store::DocumentStore;
use triviarena_transport::{Transport, WebSocketTransport};

use crate::handler::handle_connection;
use crate::{ServerConfig, TriviarenaError};

/// Shared server state passed to each connection handler task.
pub(crate) struct ServerState<S, Q, A> {
    pub(crate) service: RoomService<S, Q>,
    pub(crate) tracker: Mutex<ConnectivityTracker>,
    pub(crate) auth: A,
    pub(crate) store: Arc<S>,
    pub(crate) codec: JsonCodec,
    pub(crate) config: ServerConfig,
}

/// Builder for configuring and starting a Triviarena server.
///
/// # Example
///
/// ```rust,ignore
/// let server = TriviarenaServer::builder()
///     .config(ServerConfig::from_env()?)
///     .build(store, source, auth)
///     .await?;
/// server.run().await
/// ```
pub struct TriviarenaServerBuilder {
    bind_addr: Option<String>,
    config: ServerConfig,
}

impl TriviarenaServerBuilder {
    pub fn new() -> Self {
        Self {
            bind_addr: None,
            config: ServerConfig::default(),
        }
    }

    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Overrides the bind address (tests bind `127.0.0.1:0`).
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = Some(addr.to_string());
        self
    }

    /// Binds the transport and assembles the server around the given
    /// collaborators.
    pub async fn build<S, Q, A>(
        self,
        store: Arc<S>,
        source: Arc<Q>,
        auth: A,
    ) -> Result<TriviarenaServer<S, Q, A>, TriviarenaError>
    where
        S: DocumentStore,
        Q: QuestionSource,
        A: Authenticator,
    {
        let addr = self
            .bind_addr
            .unwrap_or_else(|| self.config.bind_addr());
        let transport =
            WebSocketTransport::bind(&addr, self.config.allowed_origins()).await?;

        let state = Arc::new(ServerState {
            service: RoomService::new(Arc::clone(&store), source),
            tracker: Mutex::new(ConnectivityTracker::new()),
            auth,
            store,
            codec: JsonCodec,
            config: self.config,
        });

        Ok(TriviarenaServer { transport, state })
    }
}

impl Default for TriviarenaServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A running Triviarena server.
pub struct TriviarenaServer<S, Q, A> {
    transport: WebSocketTransport,
    state: Arc<ServerState<S, Q, A>>,
}

impl<S, Q, A> TriviarenaServer<S, Q, A>
where
    S: DocumentStore,
    Q: QuestionSource,
    A: Authenticator,
{
    pub fn builder() -> TriviarenaServerBuilder {
        TriviarenaServerBuilder::new()
    }

    /// The address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// Runs the accept loop until ctrl-c. Each accepted connection gets
    /// its own handler task.
    pub async fn run(mut self) -> Result<(), TriviarenaError> {
        tracing::info!("Triviarena server running");

        loop {
            tokio::select! {
                accepted = self.transport.accept() => {
                    match accepted {
                        Ok(conn) => {
                            let state = Arc::clone(&self.state);
                            tokio::spawn(async move {
                                if let Err(e) = handle_connection(conn, state).await {
                                    tracing::debug!(error = %e, "connection ended with error");
                                }
                            });
                        }
                        Err(e) => {
                            tracing::error!(error = %e, "accept failed");
                        }
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("shutdown signal received");
                    self.state.service.shutdown_all().await;
                    return Ok(());
                }
            }
        }
    }
}
