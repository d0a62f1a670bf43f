//! SMPP session engine.
//!
//! A [`Session`] owns one bound (or binding) connection: its lifecycle
//! state, the outgoing sequence counter, the request [`Window`] and the
//! reader task that feeds inbound PDUs to a [`SessionHandler`]. The same
//! type serves both ends of a connection; [`SessionRole`] decides which of
//! the role-specific operations ([`Session::bind`] or
//! [`Session::server_ready`]) are allowed.
//!
//! Senders may call into a session concurrently. Inbound PDUs are handled
//! one at a time by the reader task, which is also the only place the
//! transport is torn down.

pub mod bind;
mod channel;
mod counters;
mod error;
mod handler;
mod sequence;
mod state;
mod window;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use tokio::sync::{watch, OwnedSemaphorePermit};
use tracing::{debug, error, info, info_span, trace, warn, Instrument, Span};

use crate::config::SessionConfig;
use crate::pdu::{
    version, Body, CommandId, DataSm, Decoded, Pdu, PduError, ShortMessage, SmppCodec,
};
use crate::telemetry::counters as metrics;

pub use channel::{BoxedIo, Io};
pub use counters::{PduCounterSnapshot, SessionCounters, SessionCountersSnapshot, SessionObserver};
pub use error::{ProcessingError, SessionError};
pub use handler::{AsyncResponse, DefaultSessionHandler, SessionHandler};
pub use sequence::{SequenceNumber, MAX_SEQUENCE, MIN_SEQUENCE};
pub use state::SessionState;
pub use window::{CallerState, FailureCause, Window, WindowError, WindowFuture, WindowOutcome};

pub(crate) use channel::{framed, PduReader, PduWriter};

use channel::Channel;
use state::StateCell;

/// Unique session identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which end of the bind this session is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionRole {
    /// We sent the bind.
    Client,
    /// We accepted the bind.
    Server,
}

impl fmt::Display for SessionRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionRole::Client => f.write_str("client"),
            SessionRole::Server => f.write_str("server"),
        }
    }
}

/// Told once when a session is destroyed.
#[async_trait]
pub(crate) trait DestroyListener: Send + Sync {
    async fn session_destroyed(&self, session: Session);
}

/// Everything needed to start a session over an already connected transport.
pub(crate) struct SessionParts {
    pub id: SessionId,
    pub role: SessionRole,
    pub config: SessionConfig,
    pub state: SessionState,
    /// Whether the reader may consume PDUs right away.
    pub readable: bool,
    pub handler: Option<Arc<dyn SessionHandler>>,
    pub observers: Vec<Arc<dyn SessionObserver>>,
    /// Version settled during the bind, if already known.
    pub interface_version: Option<u8>,
    /// Bind response held back until the server application is ready.
    pub prepared_bind_response: Option<Pdu>,
    pub destroy_listener: Option<Arc<dyn DestroyListener>>,
    pub permit: Option<OwnedSemaphorePermit>,
}

struct SessionInner {
    /// Session ID
    id: SessionId,

    role: SessionRole,

    config: SessionConfig,

    /// Lifecycle state
    state: StateCell,

    /// Negotiated interface version (set once bound)
    interface_version: OnceLock<u8>,

    bound_time: OnceLock<DateTime<Utc>>,

    sequence: SequenceNumber,

    window: Window,

    /// Application callbacks; unset on a server session until it is ready
    handler: OnceLock<Arc<dyn SessionHandler>>,

    counters: Option<Arc<SessionCounters>>,

    observers: Vec<Arc<dyn SessionObserver>>,

    channel: Channel,

    /// Set once we initiated the close, so teardown stays quiet
    close_requested: AtomicBool,

    prepared_bind_response: Mutex<Option<Pdu>>,

    destroy_listener: Option<Arc<dyn DestroyListener>>,

    destroyed: AtomicBool,

    /// Flips to true after teardown has finished
    closed: watch::Sender<bool>,

    /// Server connection permit (released on teardown)
    permit: Mutex<Option<OwnedSemaphorePermit>>,

    span: Span,
}

/// Handle to one SMPP session. Cheap to clone.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.inner.id)
            .field("name", &self.inner.config.name)
            .field("role", &self.inner.role)
            .field("state", &self.state())
            .finish()
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl Session {
    /// Start a session: spawns the reader task, and the expiry sweep when
    /// request expiry is configured.
    pub(crate) fn spawn(parts: SessionParts, reader: PduReader, writer: PduWriter) -> Session {
        let config = parts.config;
        let span = info_span!(
            "session",
            id = %parts.id,
            name = %config.name,
            role = %parts.role
        );

        let counters = config
            .counters_enabled
            .then(|| Arc::new(SessionCounters::new()));
        let mut observers = parts.observers;
        if let Some(c) = &counters {
            observers.push(c.clone() as Arc<dyn SessionObserver>);
        }

        let handler = OnceLock::new();
        if let Some(h) = parts.handler {
            let _ = handler.set(h);
        }
        let interface_version = OnceLock::new();
        if let Some(v) = parts.interface_version {
            let _ = interface_version.set(v);
        }

        let (closed, _) = watch::channel(false);
        let session = Session {
            inner: Arc::new(SessionInner {
                id: parts.id,
                role: parts.role,
                state: StateCell::new(parts.state),
                interface_version,
                bound_time: OnceLock::new(),
                sequence: SequenceNumber::new(),
                window: Window::new(config.window_size),
                handler,
                counters,
                observers,
                channel: Channel::new(writer, config.write_timeout, parts.readable),
                close_requested: AtomicBool::new(false),
                prepared_bind_response: Mutex::new(parts.prepared_bind_response),
                destroy_listener: parts.destroy_listener,
                destroyed: AtomicBool::new(false),
                closed,
                permit: Mutex::new(parts.permit),
                span: span.clone(),
                config,
            }),
        };

        tokio::spawn(session.clone().run_reader(reader).instrument(span.clone()));

        if let Some(expiry) = session.inner.config.request_expiry_timeout {
            let period = session.inner.config.window_monitor_interval.unwrap_or(expiry);
            tokio::spawn(session.clone().run_expiry(period).instrument(span));
        }

        session
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn id(&self) -> SessionId {
        self.inner.id
    }

    pub fn name(&self) -> &str {
        &self.inner.config.name
    }

    pub fn role(&self) -> SessionRole {
        self.inner.role
    }

    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    pub fn state(&self) -> SessionState {
        self.inner.state.get()
    }

    pub fn is_open(&self) -> bool {
        self.state() == SessionState::Open
    }

    pub fn is_binding(&self) -> bool {
        self.state() == SessionState::Binding
    }

    pub fn is_bound(&self) -> bool {
        self.state() == SessionState::Bound
    }

    pub fn is_unbinding(&self) -> bool {
        self.state() == SessionState::Unbinding
    }

    pub fn is_closed(&self) -> bool {
        self.state() == SessionState::Closed
    }

    /// Negotiated interface version, or the configured one before the bind
    /// completes.
    pub fn interface_version(&self) -> u8 {
        self.inner
            .interface_version
            .get()
            .copied()
            .unwrap_or(self.inner.config.interface_version)
    }

    /// Optional parameters (TLVs) are part of SMPP 3.4 and later.
    pub fn are_optional_parameters_supported(&self) -> bool {
        self.interface_version() >= version::VERSION_3_4
    }

    /// When the session became bound.
    pub fn bound_time(&self) -> Option<DateTime<Utc>> {
        self.inner.bound_time.get().copied()
    }

    pub fn counters(&self) -> Option<&Arc<SessionCounters>> {
        self.inner.counters.as_ref()
    }

    pub fn has_counters(&self) -> bool {
        self.inner.counters.is_some()
    }

    pub fn window(&self) -> &Window {
        &self.inner.window
    }

    pub fn window_size(&self) -> usize {
        self.inner.window.size()
    }

    pub fn max_window_size(&self) -> usize {
        self.inner.window.max_size()
    }

    /// Outstanding requests ordered by sequence number.
    pub fn request_window_snapshot(&self) -> BTreeMap<u32, WindowFuture> {
        self.inner.window.snapshot()
    }

    /// Allocate the next outgoing sequence number.
    pub fn next_sequence_number(&self) -> u32 {
        self.inner.sequence.next()
    }

    fn handler(&self) -> Arc<dyn SessionHandler> {
        self.inner
            .handler
            .get()
            .cloned()
            .unwrap_or_else(|| Arc::new(DefaultSessionHandler))
    }

    fn require_role(&self, role: SessionRole) -> Result<(), SessionError> {
        if self.inner.role != role {
            return Err(SessionError::WrongRole(role));
        }
        Ok(())
    }

    fn observe(&self, f: impl Fn(&dyn SessionObserver)) {
        for observer in &self.inner.observers {
            f(observer.as_ref());
        }
    }

    // ------------------------------------------------------------------
    // Sending
    // ------------------------------------------------------------------

    /// Send a request through the window.
    ///
    /// Assigns a sequence number if the request has none, then waits up to
    /// the configured window wait timeout for a slot. With `synchronous`
    /// set, also waits up to `timeout` for the outcome; on timeout the entry
    /// is cancelled and [`SessionError::ResponseTimeout`] returned. Without
    /// it, the response is delivered to
    /// [`SessionHandler::on_expected_response`].
    pub async fn send_request_pdu(
        &self,
        mut request: Pdu,
        timeout: Duration,
        synchronous: bool,
    ) -> Result<WindowFuture, SessionError> {
        if self.is_closed() || self.inner.channel.is_closing() {
            return Err(SessionError::ChannelClosed);
        }
        if !request.is_request() || request.command_id().response_id().is_none() {
            return Err(SessionError::InvalidPdu(format!(
                "{} does not take a response",
                request.name()
            )));
        }

        if !request.has_sequence_number() {
            request.set_sequence_number(self.inner.sequence.next());
        }
        let key = request.sequence();
        let encoded = SmppCodec::encode_pdu(&request)?;

        let config = &self.inner.config;
        let future = match self
            .inner
            .window
            .offer(
                key,
                request,
                config.window_wait_timeout,
                config.request_expiry_timeout,
                synchronous,
            )
            .await
        {
            Ok(future) => future,
            Err(e) => {
                if matches!(e, WindowError::OfferTimeout { .. }) {
                    metrics::window_full(self.name());
                }
                debug!(sequence = key, error = %e, "window offer failed");
                return Err(e.into());
            }
        };

        trace!(
            command = future.request().name(),
            sequence = key,
            synchronous,
            "sending request"
        );

        if let Err(e) = self.inner.channel.send(encoded).await {
            warn!(sequence = key, error = %e, "request write failed");
            self.inner
                .window
                .fail(&future, FailureCause::WriteFailed(e.to_string()));
            return Err(e);
        }
        metrics::pdu_sent(self.name(), future.request().name());
        self.observe(|o| o.request_sent(future.request()));

        if synchronous && !future.await_done(timeout).await {
            if self.inner.window.cancel(&future) {
                debug!(sequence = key, ?timeout, "request timed out, cancelled");
                self.observe(|o| o.request_cancelled(future.request()));
            } else {
                // Finished after the caller gave up; the read path already
                // routed it as unexpected (or expired).
                debug!(sequence = key, ?timeout, "request finished after timeout");
            }
            return Err(SessionError::ResponseTimeout(timeout));
        }
        Ok(future)
    }

    /// Send a request and wait up to `timeout` for its response.
    ///
    /// The response must be the request's response type. A generic_nack
    /// becomes [`SessionError::GenericNack`]; anything else is
    /// [`SessionError::UnexpectedResponseType`]. A non-OK status on the
    /// right response type is returned as-is.
    pub async fn send_request_and_get_response(
        &self,
        request: Pdu,
        timeout: Duration,
    ) -> Result<Pdu, SessionError> {
        let expected = request
            .command_id()
            .response_id()
            .ok_or_else(|| SessionError::InvalidPdu(format!("{} has no response", request.name())))?;

        let future = self.send_request_pdu(request, timeout, true).await?;
        match future.outcome() {
            Some(WindowOutcome::Completed(response)) => check_response(expected, response),
            Some(WindowOutcome::Cancelled) => Err(SessionError::Cancelled),
            Some(WindowOutcome::Expired) => Err(SessionError::Expired),
            Some(WindowOutcome::Failed(FailureCause::WriteFailed(e))) => {
                Err(SessionError::ChannelWrite(e))
            }
            Some(WindowOutcome::Failed(_)) => Err(SessionError::ChannelClosed),
            None => Err(SessionError::ResponseTimeout(timeout)),
        }
    }

    /// Send a response. No window bookkeeping.
    pub async fn send_response_pdu(&self, response: Pdu) -> Result<(), SessionError> {
        if !response.is_response() {
            return Err(SessionError::InvalidPdu(format!(
                "{} is not a response",
                response.name()
            )));
        }
        self.send_pdu(response).await
    }

    /// Write any PDU without window bookkeeping, assigning a sequence
    /// number if it has none. Used for responses and for requests that
    /// take no response (outbind, alert_notification).
    pub async fn send_pdu(&self, mut pdu: Pdu) -> Result<(), SessionError> {
        if !pdu.has_sequence_number() {
            pdu.set_sequence_number(self.inner.sequence.next());
        }
        trace!(
            command = pdu.name(),
            sequence = pdu.sequence(),
            status = %pdu.command_status,
            "sending pdu"
        );
        self.inner.channel.send(SmppCodec::encode_pdu(&pdu)?).await?;
        metrics::pdu_sent(self.name(), pdu.name());
        if pdu.is_response() {
            self.observe(|o| o.response_sent(&pdu));
        }
        Ok(())
    }

    pub async fn enquire_link(&self, timeout: Duration) -> Result<Pdu, SessionError> {
        self.send_request_and_get_response(Pdu::enquire_link(), timeout)
            .await
    }

    pub async fn submit(&self, message: ShortMessage, timeout: Duration) -> Result<Pdu, SessionError> {
        self.send_request_and_get_response(Pdu::submit_sm(message), timeout)
            .await
    }

    pub async fn deliver(&self, message: ShortMessage, timeout: Duration) -> Result<Pdu, SessionError> {
        self.send_request_and_get_response(Pdu::deliver_sm(message), timeout)
            .await
    }

    pub async fn data_sm(&self, message: DataSm, timeout: Duration) -> Result<Pdu, SessionError> {
        self.send_request_and_get_response(Pdu::new(Body::DataSm(message)), timeout)
            .await
    }

    // ------------------------------------------------------------------
    // Bind / unbind
    // ------------------------------------------------------------------

    /// Client side bind. Sends the configured bind request and waits up to
    /// the configured bind timeout. On success the session is BOUND with
    /// the negotiated interface version; on any failure it is closed.
    pub async fn bind(&self) -> Result<Pdu, SessionError> {
        self.require_role(SessionRole::Client)?;
        self.inner
            .state
            .advance(SessionState::Binding)
            .map_err(SessionError::InvalidState)?;

        let result = self.exchange_bind().await;
        let bind_type = self.inner.config.bind_type.as_str();
        match &result {
            Ok(response) => {
                let negotiated = bind::negotiated_version_from_response(response);
                let _ = self.inner.interface_version.set(negotiated);
                let _ = self.inner.bound_time.set(Utc::now());
                let _ = self.inner.state.advance(SessionState::Bound);
                metrics::client_bind(self.name(), bind_type, "ok");
                info!(
                    system_id = %self.inner.config.system_id,
                    bind_type,
                    interface_version = format_args!("0x{:02X}", negotiated),
                    "session bound"
                );
            }
            Err(e) => {
                metrics::client_bind(self.name(), bind_type, "failed");
                warn!(error = %e, "bind failed");
                self.close();
            }
        }
        result
    }

    async fn exchange_bind(&self) -> Result<Pdu, SessionError> {
        let config = &self.inner.config;
        let request = bind::build_bind_request(config);

        let response = self
            .send_request_and_get_response(request, config.bind_timeout)
            .await
            .map_err(|e| match e {
                SessionError::ResponseTimeout(t) => SessionError::BindTimeout(t),
                SessionError::GenericNack { status, response } => {
                    SessionError::BindRejected { status, response }
                }
                SessionError::UnexpectedResponseType {
                    expected, actual, ..
                } => SessionError::BindResponse(format!("expected {}, received {}", expected, actual)),
                other => other,
            })?;

        if !response.command_status.is_ok() {
            return Err(SessionError::BindRejected {
                status: response.command_status,
                response: Box::new(response),
            });
        }
        Ok(response)
    }

    /// Server side: install `handler`, send the held-back bind response and
    /// start reading. Until this is called nothing is read from the peer.
    pub async fn server_ready(&self, handler: Arc<dyn SessionHandler>) -> Result<(), SessionError> {
        self.require_role(SessionRole::Server)?;
        let response = lock(&self.inner.prepared_bind_response)
            .take()
            .ok_or(SessionError::InvalidState(self.state()))?;
        let _ = self.inner.handler.set(handler);

        if let Err(e) = self.send_pdu(response).await {
            error!(error = %e, "failed to send bind response");
            self.close();
            return Err(e);
        }

        let _ = self.inner.bound_time.set(Utc::now());
        self.inner
            .state
            .advance(SessionState::Bound)
            .map_err(SessionError::InvalidState)?;
        self.inner.channel.set_readable(true);
        info!(
            system_id = %self.inner.config.system_id,
            interface_version = format_args!("0x{:02X}", self.interface_version()),
            "session ready"
        );
        Ok(())
    }

    /// The bind response a server session will send once ready.
    pub fn prepared_bind_response(&self) -> Option<Pdu> {
        lock(&self.inner.prepared_bind_response).clone()
    }

    /// Send unbind, wait up to `timeout` for unbind_resp, then close. The
    /// session is closed whatever the outcome.
    pub async fn unbind(&self, timeout: Duration) -> Result<(), SessionError> {
        self.inner.close_requested.store(true, Ordering::SeqCst);
        let _ = self.inner.state.advance(SessionState::Unbinding);
        info!("unbinding");

        let result = self
            .send_request_and_get_response(Pdu::unbind(), timeout)
            .await
            .map(|_| ());
        if let Err(e) = &result {
            debug!(error = %e, "unbind did not complete cleanly");
        }
        self.close();
        result
    }

    // ------------------------------------------------------------------
    // Close / destroy
    // ------------------------------------------------------------------

    /// Close the transport. Returns immediately; teardown happens on the
    /// reader task and [`Session::closed`] resolves once it is done.
    /// Repeated calls have no further effect.
    pub fn close(&self) {
        self.inner.close_requested.store(true, Ordering::SeqCst);
        if self.inner.channel.is_closing() {
            return;
        }
        if self.state() == SessionState::Bound {
            let _ = self.inner.state.advance(SessionState::Unbinding);
        }
        debug!(parent: &self.inner.span, "close requested");
        self.inner.channel.close();
    }

    /// Resolves once the session has fully closed.
    pub async fn closed(&self) {
        let mut rx = self.inner.closed.subscribe();
        let _ = rx.wait_for(|closed| *closed).await;
    }

    /// Close, fail every outstanding request and refuse new ones. The
    /// session is unusable afterwards.
    pub async fn destroy(&self) {
        self.close();
        if self.inner.destroyed.swap(true, Ordering::SeqCst) {
            return;
        }
        let failed = self.inner.window.destroy();
        debug!(parent: &self.inner.span, failed = failed.len(), "session destroyed");
        if let Some(listener) = &self.inner.destroy_listener {
            listener.session_destroyed(self.clone()).await;
        }
    }

    pub fn is_destroyed(&self) -> bool {
        self.inner.destroyed.load(Ordering::SeqCst)
    }

    // ------------------------------------------------------------------
    // Read path
    // ------------------------------------------------------------------

    async fn run_reader(self, mut reader: PduReader) {
        loop {
            if !self.inner.channel.wait_readable().await {
                break;
            }

            let next = tokio::select! {
                biased;
                _ = self.inner.channel.token().cancelled() => break,
                next = reader.next() => next,
            };

            match next {
                Some(Ok(Decoded::Pdu(pdu))) => self.dispatch(pdu).await,
                Some(Ok(Decoded::Recoverable(err))) => {
                    if let Some(reply) = self.handler().on_recoverable_error(err).await {
                        if let Err(e) = self.send_pdu(reply).await {
                            warn!(error = %e, "failed to answer undecodable pdu");
                        }
                    }
                }
                Some(Err(e)) => {
                    if !self.inner.close_requested.load(Ordering::SeqCst) {
                        match &e {
                            PduError::Io(io) => self.handler().on_unknown_error(io).await,
                            other => self.handler().on_unrecoverable_error(other).await,
                        }
                    } else {
                        debug!(error = %e, "read error after close requested");
                    }
                    break;
                }
                None => {
                    debug!("peer closed connection");
                    break;
                }
            }
        }
        drop(reader);
        self.teardown().await;
    }

    async fn dispatch(&self, pdu: Pdu) {
        trace!(
            command = pdu.name(),
            sequence = pdu.sequence(),
            status = %pdu.command_status,
            "received pdu"
        );
        metrics::pdu_received(self.name(), pdu.name());

        if pdu.is_request() {
            self.observe(|o| o.request_received(&pdu));
            if pdu.command_id() == CommandId::Unbind {
                self.handle_unbind(pdu).await;
                return;
            }
            if let Some(response) = self.handler().on_request_received(pdu).await {
                if let Err(e) = self.send_pdu(response).await {
                    warn!(error = %e, "failed to send response");
                }
            }
            return;
        }

        let Some(future) = self.inner.window.complete(pdu.sequence(), pdu.clone()) else {
            self.observe(|o| o.response_received(None, &pdu, Duration::ZERO));
            metrics::unexpected_response(self.name());
            self.handler().on_unexpected_response(pdu).await;
            return;
        };

        let response_time = future.response_time();
        self.observe(|o| o.response_received(Some(future.request()), &pdu, response_time));
        metrics::response_duration(self.name(), future.request().name(), response_time.as_secs_f64());

        match future.caller_state() {
            CallerState::Waiting => {}
            CallerState::NotWaiting => {
                let response = AsyncResponse {
                    request: future.request().clone(),
                    response: pdu,
                    window_wait_time: future.window_wait_time(),
                    response_time,
                };
                self.handler().on_expected_response(response).await;
            }
            CallerState::TimedOutWaiting => {
                metrics::unexpected_response(self.name());
                self.handler().on_unexpected_response(pdu).await;
            }
        }
    }

    async fn handle_unbind(&self, request: Pdu) {
        info!("unbind received");
        self.inner.close_requested.store(true, Ordering::SeqCst);
        let _ = self.inner.state.advance(SessionState::Unbinding);
        if let Some(response) = request.create_response() {
            if let Err(e) = self.send_pdu(response).await {
                debug!(error = %e, "failed to send unbind_resp");
            }
        }
        self.close();
    }

    async fn run_expiry(self, period: Duration) {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = self.inner.channel.token().cancelled() => break,
                _ = ticker.tick() => {}
            }

            for future in self.inner.window.cancel_all_expired() {
                let request = future.request().clone();
                warn!(
                    command = request.name(),
                    sequence = request.sequence(),
                    "request expired"
                );
                metrics::request_expired(self.name(), request.name());
                self.observe(|o| o.request_expired(&request));
                self.handler().on_request_expired(request).await;
            }
        }
    }

    async fn teardown(&self) {
        self.inner.channel.close();

        // Waiters are released before the writer is flushed; the flush can
        // stall on a peer that stopped reading.
        let failed = self.inner.window.fail_waiting(FailureCause::ChannelClosed);
        if !failed.is_empty() {
            debug!(count = failed.len(), "failed waiting requests on close");
        }
        self.inner.channel.shutdown_writer().await;

        let _ = self.inner.state.advance(SessionState::Closed);
        lock(&self.inner.permit).take();

        if !self.inner.close_requested.load(Ordering::SeqCst) {
            self.handler().on_channel_unexpectedly_closed().await;
        }
        info!("session closed");
        self.inner.closed.send_replace(true);

        if self.inner.role == SessionRole::Server {
            self.destroy().await;
        }
    }
}

fn check_response(expected: CommandId, response: Pdu) -> Result<Pdu, SessionError> {
    let actual = response.command_id();
    if actual == expected {
        Ok(response)
    } else if actual == CommandId::GenericNack {
        Err(SessionError::GenericNack {
            status: response.command_status,
            response: Box::new(response),
        })
    } else {
        Err(SessionError::UnexpectedResponseType {
            expected,
            actual,
            response: Box::new(response),
        })
    }
}
