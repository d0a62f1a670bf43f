//! Application callbacks for a session.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, error, warn};

use crate::pdu::{Pdu, PduError, RecoverablePduError};

/// Request/response pair delivered for an asynchronous send.
#[derive(Debug, Clone)]
pub struct AsyncResponse {
    pub request: Pdu,
    pub response: Pdu,
    /// Time spent waiting for a window slot.
    pub window_wait_time: Duration,
    /// Time from slot acquisition to the response.
    pub response_time: Duration,
}

/// Callbacks invoked from a session's read path.
///
/// Every method has a default. Callbacks run on the session's reader task,
/// so a slow handler delays further inbound PDUs for that session only.
#[async_trait]
pub trait SessionHandler: Send + Sync + 'static {
    /// A request arrived. The returned PDU, if any, is sent back. Returning
    /// `None` means the handler answers (or drops) the request itself.
    async fn on_request_received(&self, request: Pdu) -> Option<Pdu> {
        request.create_response()
    }

    /// An outstanding request passed its expiry deadline without a response.
    async fn on_request_expired(&self, request: Pdu) {
        warn!(
            command = request.name(),
            sequence = request.sequence(),
            "request expired"
        );
    }

    /// Response to an asynchronous send.
    async fn on_expected_response(&self, response: AsyncResponse) {
        debug!(
            command = response.response.name(),
            sequence = response.response.sequence(),
            status = %response.response.command_status,
            response_ms = response.response_time.as_millis() as u64,
            "response received"
        );
    }

    /// A response nobody was waiting for.
    async fn on_unexpected_response(&self, response: Pdu) {
        warn!(
            command = response.name(),
            sequence = response.sequence(),
            status = %response.command_status,
            "unexpected response"
        );
    }

    /// The read path failed in a way it cannot recover from. The session
    /// closes after this returns.
    async fn on_unrecoverable_error(&self, err: &PduError) {
        error!(error = %err, "unrecoverable PDU error");
    }

    /// A framed PDU could not be decoded. The returned PDU, if any, is sent
    /// back; by default a generic_nack with the error's status for a
    /// request, nothing for a response.
    async fn on_recoverable_error(&self, err: RecoverablePduError) -> Option<Pdu> {
        warn!(
            status = %err.status,
            sequence = err.header.sequence_number,
            reason = %err.reason,
            "recoverable PDU error"
        );
        if err.header.is_response() {
            return None;
        }
        Some(err.generic_nack())
    }

    /// Transport failure not attributable to the codec.
    async fn on_unknown_error(&self, err: &(dyn std::error::Error + Send + Sync)) {
        error!(error = %err, "session error");
    }

    /// The transport closed without the session asking for it.
    async fn on_channel_unexpectedly_closed(&self) {
        warn!("channel unexpectedly closed");
    }
}

/// Acknowledges every request and logs everything else.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultSessionHandler;

impl SessionHandler for DefaultSessionHandler {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdu::{codec::SmppCodec, CommandId, Status};

    #[tokio::test]
    async fn test_default_handler_acknowledges() {
        let handler = DefaultSessionHandler;
        let resp = handler
            .on_request_received(Pdu::enquire_link().with_sequence(9))
            .await
            .unwrap();
        assert_eq!(resp.command_id(), CommandId::EnquireLinkResp);
        assert_eq!(resp.sequence_number, Some(9));
    }

    #[tokio::test]
    async fn test_default_handler_nacks_recoverable_errors() {
        let mut frame = vec![0u8; 16];
        frame[0..4].copy_from_slice(&16u32.to_be_bytes());
        frame[4..8].copy_from_slice(&0x0000_00AAu32.to_be_bytes());
        frame[12..16].copy_from_slice(&77u32.to_be_bytes());
        let err = SmppCodec::decode_frame(&frame).unwrap_err();

        let nack = DefaultSessionHandler.on_recoverable_error(err).await.unwrap();
        assert_eq!(nack.command_id(), CommandId::GenericNack);
        assert_eq!(nack.command_status, Status::INVCMDID);
        assert_eq!(nack.sequence_number, Some(77));
    }

    #[tokio::test]
    async fn test_default_handler_ignores_malformed_responses() {
        // submit_sm_resp whose message_id is not NUL terminated
        let mut frame = vec![0u8; 18];
        frame[0..4].copy_from_slice(&18u32.to_be_bytes());
        frame[4..8].copy_from_slice(&0x8000_0004u32.to_be_bytes());
        frame[12..16].copy_from_slice(&5u32.to_be_bytes());
        frame[16] = b'4';
        frame[17] = b'2';
        let err = SmppCodec::decode_frame(&frame).unwrap_err();
        assert!(err.header.is_response());

        assert!(DefaultSessionHandler.on_recoverable_error(err).await.is_none());
    }
}
