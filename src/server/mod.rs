//! SMPP server: accepts connections, runs the pre-bind handshake and hands
//! bound sessions to a [`ServerHandler`].

mod counters;
mod handler;
mod unbound;

use std::collections::HashMap;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock, Weak};

use async_trait::async_trait;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{watch, RwLock, Semaphore};
use tokio_rustls::TlsAcceptor;
use tracing::{debug, error, info, span, warn, Instrument, Level};

use crate::config::ServerConfig;
use crate::session::{BoxedIo, DestroyListener, Session, SessionId};
use crate::telemetry::counters as metrics;
use crate::tls;

pub use counters::{ServerCounters, ServerCountersSnapshot};
pub use handler::ServerHandler;

/// SMPP server. Cheap to clone.
#[derive(Clone)]
pub struct SmppServer {
    inner: Arc<ServerInner>,
}

pub(crate) struct ServerInner {
    config: ServerConfig,

    handler: Arc<dyn ServerHandler>,

    /// TLS acceptor (if TLS enabled)
    tls_acceptor: Option<TlsAcceptor>,

    /// Connection semaphore (limits max connections)
    connection_limit: Arc<Semaphore>,

    /// Session ID generator
    next_session_id: AtomicU64,

    /// Bound (or binding) sessions
    sessions: RwLock<HashMap<SessionId, Session>>,

    counters: ServerCounters,

    shutdown: watch::Sender<bool>,

    local_addr: OnceLock<SocketAddr>,
}

impl SmppServer {
    /// Create a server. Nothing is bound until [`SmppServer::start`].
    pub fn new(config: ServerConfig, handler: Arc<dyn ServerHandler>) -> io::Result<Self> {
        let tls_acceptor = match &config.tls {
            Some(tls_config) => Some(tls::build_acceptor(tls_config)?),
            None => None,
        };
        let (shutdown, _) = watch::channel(false);

        Ok(Self {
            inner: Arc::new(ServerInner {
                connection_limit: Arc::new(Semaphore::new(config.max_connections.max(1))),
                config,
                handler,
                tls_acceptor,
                next_session_id: AtomicU64::new(1),
                sessions: RwLock::new(HashMap::new()),
                counters: ServerCounters::default(),
                shutdown,
                local_addr: OnceLock::new(),
            }),
        })
    }

    pub fn config(&self) -> &ServerConfig {
        &self.inner.config
    }

    /// Bind the listening socket and spawn the accept loop. Returns the
    /// bound address (useful with port 0).
    pub async fn start(&self) -> io::Result<SocketAddr> {
        if *self.inner.shutdown.borrow() {
            return Err(io::Error::new(io::ErrorKind::Other, "server stopped"));
        }
        let listener = TcpListener::bind(self.inner.config.address).await?;
        let address = listener.local_addr()?;
        if self.inner.local_addr.set(address).is_err() {
            return Err(io::Error::new(io::ErrorKind::AddrInUse, "server already started"));
        }

        tokio::spawn(self.inner.clone().run(listener));
        Ok(address)
    }

    /// Stop accepting and destroy every session.
    pub async fn stop(&self) {
        self.inner.shutdown.send_replace(true);

        let sessions: Vec<Session> = self.inner.sessions.read().await.values().cloned().collect();
        if !sessions.is_empty() {
            info!(
                server = %self.inner.config.name,
                count = sessions.len(),
                "closing sessions"
            );
        }
        for session in sessions {
            session.destroy().await;
        }
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.inner.local_addr.get().copied()
    }

    pub fn counters(&self) -> &ServerCounters {
        &self.inner.counters
    }

    pub async fn sessions(&self) -> Vec<Session> {
        self.inner.sessions.read().await.values().cloned().collect()
    }

    pub async fn session(&self, id: SessionId) -> Option<Session> {
        self.inner.sessions.read().await.get(&id).cloned()
    }

    pub async fn session_count(&self) -> usize {
        self.inner.sessions.read().await.len()
    }
}

impl ServerInner {
    async fn run(self: Arc<Self>, listener: TcpListener) {
        info!(
            server = %self.config.name,
            address = ?self.local_addr.get(),
            tls = self.tls_acceptor.is_some(),
            max_connections = self.config.max_connections,
            "server started"
        );

        let mut shutdown_rx = self.shutdown.subscribe();

        loop {
            tokio::select! {
                biased;

                _ = shutdown_rx.wait_for(|stopped| *stopped) => {
                    info!(server = %self.config.name, "server shutting down");
                    break;
                }

                result = listener.accept() => {
                    match result {
                        Ok((stream, peer_addr)) => self.clone().handle_accept(stream, peer_addr),
                        Err(e) => {
                            error!(server = %self.config.name, error = %e, "accept error");
                            metrics::server_connection(&self.config.name, "error");
                        }
                    }
                }
            }
        }

        info!(server = %self.config.name, "server stopped");
    }

    fn handle_accept(self: Arc<Self>, stream: TcpStream, peer_addr: SocketAddr) {
        let permit = match self.connection_limit.clone().try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                warn!(
                    server = %self.config.name,
                    peer = %peer_addr,
                    "connection limit reached, rejecting"
                );
                self.counters.inc_connections_rejected();
                metrics::server_connection(&self.config.name, "limit");
                return;
            }
        };

        let session_id = SessionId(self.next_session_id.fetch_add(1, Ordering::SeqCst));
        let span = span!(
            Level::INFO,
            "conn",
            server = %self.config.name,
            id = %session_id,
            peer = %peer_addr
        );

        if let Err(e) = stream.set_nodelay(true) {
            error!(parent: &span, error = %e, "socket configuration failed");
            return;
        }

        self.counters.inc_connections_accepted();
        metrics::server_connection(&self.config.name, "accepted");
        debug!(parent: &span, "connection accepted");

        tokio::spawn(
            async move {
                let Some(io) = self.handshake(stream).await else {
                    return;
                };
                unbound::serve(self, session_id, io, peer_addr, permit).await;
            }
            .instrument(span),
        );
    }

    /// TLS handshake when configured, bounded by the bind timeout.
    async fn handshake(&self, stream: TcpStream) -> Option<BoxedIo> {
        let Some(acceptor) = &self.tls_acceptor else {
            return Some(Box::new(stream));
        };

        match tokio::time::timeout(self.config.bind_timeout, acceptor.accept(stream)).await {
            Ok(Ok(tls_stream)) => {
                debug!("TLS handshake completed");
                Some(Box::new(tls_stream))
            }
            Ok(Err(e)) => {
                warn!(error = %e, "TLS handshake failed");
                None
            }
            Err(_) => {
                warn!("TLS handshake timeout");
                None
            }
        }
    }

    async fn register(&self, session: Session) {
        self.sessions.write().await.insert(session.id(), session);
        self.counters.inc_sessions_created();
        metrics::server_session_created(&self.config.name);
    }
}

/// Unregisters a session from its server when the session is destroyed.
struct ServerLink(Weak<ServerInner>);

#[async_trait]
impl DestroyListener for ServerLink {
    async fn session_destroyed(&self, session: Session) {
        let Some(server) = self.0.upgrade() else {
            return;
        };
        let removed = server.sessions.write().await.remove(&session.id());
        if removed.is_some() {
            server.counters.inc_sessions_destroyed();
            metrics::server_session_destroyed(&server.config.name);
            server
                .handler
                .on_session_destroyed(session.id(), session)
                .await;
        }
    }
}
