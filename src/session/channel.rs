//! Framed transport shared by a session's senders and its reader task.

use std::time::Duration;

use bytes::Bytes;
use futures::SinkExt;
use tokio::io::{AsyncRead, AsyncWrite, ReadHalf, WriteHalf};
use tokio::sync::{watch, Mutex};
use tokio_util::codec::{FramedRead, FramedWrite};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::pdu::SmppCodec;

use super::error::SessionError;

/// Byte stream a session can run over (plain TCP or TLS).
pub trait Io: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin + 'static> Io for T {}

pub type BoxedIo = Box<dyn Io>;

pub(crate) type PduReader = FramedRead<ReadHalf<BoxedIo>, SmppCodec>;
pub(crate) type PduWriter = FramedWrite<WriteHalf<BoxedIo>, SmppCodec>;

pub(crate) fn framed(io: BoxedIo) -> (PduReader, PduWriter) {
    let (read, write) = tokio::io::split(io);
    (
        FramedRead::new(read, SmppCodec::new()),
        FramedWrite::new(write, SmppCodec::new()),
    )
}

/// Upper bound on flushing pending output during teardown when no write
/// timeout is configured.
pub(crate) const SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

pub(crate) struct Channel {
    writer: Mutex<Option<PduWriter>>,
    write_timeout: Option<Duration>,
    readable: watch::Sender<bool>,
    cancel: CancellationToken,
}

impl Channel {
    pub(crate) fn new(writer: PduWriter, write_timeout: Option<Duration>, readable: bool) -> Self {
        let (readable, _) = watch::channel(readable);
        Self {
            writer: Mutex::new(Some(writer)),
            write_timeout,
            readable,
            cancel: CancellationToken::new(),
        }
    }

    /// Write one encoded PDU. Gives up with [`SessionError::ChannelClosed`]
    /// as soon as the channel is closed, even mid-write.
    pub(crate) async fn send(&self, bytes: Bytes) -> Result<(), SessionError> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(SessionError::ChannelClosed),
            result = self.write(bytes) => result,
        }
    }

    async fn write(&self, bytes: Bytes) -> Result<(), SessionError> {
        let mut guard = self.writer.lock().await;
        let writer = guard.as_mut().ok_or(SessionError::ChannelClosed)?;

        let result = match self.write_timeout {
            Some(limit) => tokio::time::timeout(limit, writer.send(bytes))
                .await
                .map_err(|_| SessionError::WriteTimeout)?,
            None => writer.send(bytes).await,
        };
        result.map_err(|e| SessionError::ChannelWrite(e.to_string()))
    }

    pub(crate) fn set_readable(&self, readable: bool) {
        self.readable.send_replace(readable);
    }

    pub(crate) fn is_readable(&self) -> bool {
        *self.readable.borrow()
    }

    /// Wait until reads are allowed. `false` if the channel closed first.
    pub(crate) async fn wait_readable(&self) -> bool {
        let mut rx = self.readable.subscribe();
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => false,
            r = rx.wait_for(|readable| *readable) => r.is_ok(),
        }
    }

    /// Ask the reader task to stop.
    pub(crate) fn close(&self) {
        self.cancel.cancel();
    }

    pub(crate) fn is_closing(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub(crate) fn token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Flush and shut down the write half, waiting at most the write
    /// timeout (or [`SHUTDOWN_GRACE`]) for a peer that is not reading. Later
    /// sends fail with [`SessionError::ChannelClosed`].
    pub(crate) async fn shutdown_writer(&self) {
        let writer = self.writer.lock().await.take();
        let Some(mut writer) = writer else {
            return;
        };
        let grace = self.write_timeout.unwrap_or(SHUTDOWN_GRACE);
        match tokio::time::timeout(grace, SinkExt::<Bytes>::close(&mut writer)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => debug!(error = %e, "error shutting down writer"),
            Err(_) => debug!(?grace, "peer not reading, dropping unflushed output"),
        }
    }
}
