use async_trait::async_trait;
use tracing::info;

use crate::config::SessionConfig;
use crate::pdu::Pdu;
use crate::session::{ProcessingError, Session, SessionId};

/// Application callbacks for an [`SmppServer`](super::SmppServer).
#[async_trait]
pub trait ServerHandler: Send + Sync + 'static {
    /// Decide whether to accept a bind. `config` was derived from the
    /// server defaults and the bind request and may be adjusted here (window
    /// size, timeouts, name). Returning an error rejects the bind with the
    /// error's status.
    async fn on_bind_requested(
        &self,
        _session_id: SessionId,
        _config: &mut SessionConfig,
        _bind_request: &Pdu,
    ) -> Result<(), ProcessingError> {
        Ok(())
    }

    /// A bind was accepted. The session is in BINDING and reads nothing
    /// until [`Session::server_ready`] sends `prepared_bind_response`.
    async fn on_session_created(
        &self,
        session_id: SessionId,
        session: Session,
        prepared_bind_response: Pdu,
    );

    async fn on_session_destroyed(&self, session_id: SessionId, session: Session) {
        info!(%session_id, name = session.name(), "session destroyed");
    }
}
