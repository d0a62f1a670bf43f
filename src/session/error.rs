//! Session error types.

use std::time::Duration;

use thiserror::Error;

use crate::pdu::{CommandId, Pdu, PduError, Status};

use super::state::SessionState;
use super::window::WindowError;
use super::SessionRole;

/// Session error types.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to connect to {address}: {source}")]
    Connect {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("connect timed out after {0:?}")]
    ConnectTimeout(Duration),

    #[error("TLS setup failed: {0}")]
    Tls(String),

    #[error("bind rejected with status {status}")]
    BindRejected { status: Status, response: Box<Pdu> },

    #[error("no bind response within {0:?}")]
    BindTimeout(Duration),

    #[error("malformed bind response: {0}")]
    BindResponse(String),

    #[error("no response within {0:?}")]
    ResponseTimeout(Duration),

    #[error("channel closed")]
    ChannelClosed,

    #[error("channel write failed: {0}")]
    ChannelWrite(String),

    #[error("write timed out")]
    WriteTimeout,

    #[error("request rejected with generic_nack ({status})")]
    GenericNack { status: Status, response: Box<Pdu> },

    #[error("expected {expected} but received {actual}")]
    UnexpectedResponseType {
        expected: CommandId,
        actual: CommandId,
        response: Box<Pdu>,
    },

    #[error("window error: {0}")]
    Window(#[from] WindowError),

    #[error("request cancelled")]
    Cancelled,

    #[error("request expired")]
    Expired,

    #[error("invalid state for operation: {0}")]
    InvalidState(SessionState),

    #[error("operation requires a {0} session")]
    WrongRole(SessionRole),

    #[error("invalid PDU: {0}")]
    InvalidPdu(String),

    #[error("PDU error: {0}")]
    Pdu(#[from] PduError),
}

impl SessionError {
    /// Status code carried by a rejection, if any.
    pub fn status(&self) -> Option<Status> {
        match self {
            SessionError::BindRejected { status, .. } | SessionError::GenericNack { status, .. } => {
                Some(*status)
            }
            _ => None,
        }
    }

    /// Whether the error means the transport is gone.
    pub fn is_channel_error(&self) -> bool {
        matches!(
            self,
            SessionError::ChannelClosed
                | SessionError::ChannelWrite(_)
                | SessionError::WriteTimeout
                | SessionError::Io(_)
        )
    }
}

/// Bind rejection raised by a server handler.
#[derive(Debug, Clone, Error)]
#[error("{message} ({status})")]
pub struct ProcessingError {
    pub status: Status,
    pub message: String,
}

impl ProcessingError {
    pub fn new(status: Status, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl From<Status> for ProcessingError {
    fn from(status: Status) -> Self {
        Self {
            status,
            message: status.name().to_string(),
        }
    }
}
