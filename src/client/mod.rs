//! Outbound sessions: connect, optionally wrap in TLS, bind.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::net::TcpStream;
use tracing::{debug, info, warn};

use crate::config::SessionConfig;
use crate::session::{
    framed, BoxedIo, Session, SessionError, SessionHandler, SessionId, SessionObserver,
    SessionParts, SessionRole, SessionState,
};
use crate::tls;

/// Factory for client sessions.
#[derive(Default)]
pub struct SmppClient {
    next_session_id: AtomicU64,
    observers: Vec<Arc<dyn SessionObserver>>,
}

impl SmppClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach an observer to every session this client creates.
    pub fn with_observer(mut self, observer: Arc<dyn SessionObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    /// Connect, bind and return a BOUND session. On any failure the
    /// connection is closed and nothing is left behind.
    pub async fn bind(
        &self,
        config: SessionConfig,
        handler: Arc<dyn SessionHandler>,
    ) -> Result<Session, SessionError> {
        let io = self.connect(&config).await?;
        let session = self.open(config, io, handler);

        match session.bind().await {
            Ok(_) => Ok(session),
            Err(e) => {
                session.destroy().await;
                Err(e)
            }
        }
    }

    /// Connect to `config.host:config.port` within the connect timeout,
    /// performing the TLS handshake if configured.
    pub async fn connect(&self, config: &SessionConfig) -> Result<BoxedIo, SessionError> {
        let address = config.address();
        debug!(session = %config.name, %address, "connecting");

        let stream = match tokio::time::timeout(config.connect_timeout, TcpStream::connect(&address)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(source)) => return Err(SessionError::Connect { address, source }),
            Err(_) => return Err(SessionError::ConnectTimeout(config.connect_timeout)),
        };
        if let Err(e) = stream.set_nodelay(true) {
            warn!(session = %config.name, error = %e, "failed to set TCP_NODELAY");
        }

        let Some(tls_config) = &config.tls else {
            return Ok(Box::new(stream));
        };

        let (connector, server_name) = tls::build_connector(tls_config, &config.host)
            .map_err(|e| SessionError::Tls(e.to_string()))?;
        match tokio::time::timeout(config.connect_timeout, connector.connect(server_name, stream)).await {
            Ok(Ok(tls_stream)) => {
                debug!(session = %config.name, "TLS handshake completed");
                Ok(Box::new(tls_stream))
            }
            Ok(Err(e)) => Err(SessionError::Tls(e.to_string())),
            Err(_) => Err(SessionError::Tls("TLS handshake timeout".into())),
        }
    }

    /// Start an OPEN client session over an already connected transport.
    /// Call [`Session::bind`] next.
    pub fn open(
        &self,
        config: SessionConfig,
        io: BoxedIo,
        handler: Arc<dyn SessionHandler>,
    ) -> Session {
        let id = SessionId(self.next_session_id.fetch_add(1, Ordering::Relaxed) + 1);
        let (reader, writer) = framed(io);
        info!(session = %config.name, %id, "session open");
        Session::spawn(
            SessionParts {
                id,
                role: SessionRole::Client,
                config,
                state: SessionState::Open,
                readable: true,
                handler: Some(handler),
                observers: self.observers.clone(),
                interface_version: None,
                prepared_bind_response: None,
                destroy_listener: None,
                permit: None,
            },
            reader,
            writer,
        )
    }
}
