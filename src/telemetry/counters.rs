//! OpenTelemetry instruments for session and server events.
//!
//! Every recording function is a no-op until [`init`] is called with a
//! meter, so the engine can record unconditionally. No exporter is set up
//! here; the embedding application owns the meter provider.

use opentelemetry::metrics::{Counter, Histogram, UpDownCounter};
use opentelemetry::KeyValue;
use std::sync::OnceLock;

// ============================================================================
// SERVER METRICS
// ============================================================================

static SERVER_CONNECTIONS_TOTAL: OnceLock<Counter<u64>> = OnceLock::new();
static SERVER_BIND_TIMEOUTS_TOTAL: OnceLock<Counter<u64>> = OnceLock::new();
static SERVER_BINDS_TOTAL: OnceLock<Counter<u64>> = OnceLock::new();
static SERVER_SESSIONS_ACTIVE: OnceLock<UpDownCounter<i64>> = OnceLock::new();

// ============================================================================
// SESSION METRICS
// ============================================================================

static PDU_SENT_TOTAL: OnceLock<Counter<u64>> = OnceLock::new();
static PDU_RECEIVED_TOTAL: OnceLock<Counter<u64>> = OnceLock::new();
static RESPONSE_DURATION: OnceLock<Histogram<f64>> = OnceLock::new();
static REQUESTS_EXPIRED_TOTAL: OnceLock<Counter<u64>> = OnceLock::new();
static UNEXPECTED_RESPONSES_TOTAL: OnceLock<Counter<u64>> = OnceLock::new();
static WINDOW_FULL_TOTAL: OnceLock<Counter<u64>> = OnceLock::new();
static CLIENT_BINDS_TOTAL: OnceLock<Counter<u64>> = OnceLock::new();

/// Register instruments on `meter`. Later calls are ignored.
pub fn init(meter: &opentelemetry::metrics::Meter) {
    let _ = SERVER_CONNECTIONS_TOTAL.set(
        meter
            .u64_counter("smpp_server_connections_total")
            .with_description("Connections accepted or rejected by the server")
            .build(),
    );
    let _ = SERVER_BIND_TIMEOUTS_TOTAL.set(
        meter
            .u64_counter("smpp_server_bind_timeouts_total")
            .with_description("Connections closed for not binding in time")
            .build(),
    );
    let _ = SERVER_BINDS_TOTAL.set(
        meter
            .u64_counter("smpp_server_binds_total")
            .with_description("Inbound bind requests by result")
            .build(),
    );
    let _ = SERVER_SESSIONS_ACTIVE.set(
        meter
            .i64_up_down_counter("smpp_server_sessions_active")
            .with_description("Currently registered server sessions")
            .build(),
    );

    let _ = PDU_SENT_TOTAL.set(
        meter
            .u64_counter("smpp_session_pdu_sent_total")
            .with_description("PDUs written by command")
            .build(),
    );
    let _ = PDU_RECEIVED_TOTAL.set(
        meter
            .u64_counter("smpp_session_pdu_received_total")
            .with_description("PDUs read by command")
            .build(),
    );
    let _ = RESPONSE_DURATION.set(
        meter
            .f64_histogram("smpp_session_response_duration_seconds")
            .with_description("Time from window acceptance to response")
            .build(),
    );
    let _ = REQUESTS_EXPIRED_TOTAL.set(
        meter
            .u64_counter("smpp_session_requests_expired_total")
            .with_description("Requests expired by the window sweep")
            .build(),
    );
    let _ = UNEXPECTED_RESPONSES_TOTAL.set(
        meter
            .u64_counter("smpp_session_unexpected_responses_total")
            .with_description("Responses with no waiting request")
            .build(),
    );
    let _ = WINDOW_FULL_TOTAL.set(
        meter
            .u64_counter("smpp_session_window_full_total")
            .with_description("Sends that timed out waiting for a window slot")
            .build(),
    );
    let _ = CLIENT_BINDS_TOTAL.set(
        meter
            .u64_counter("smpp_client_binds_total")
            .with_description("Outbound bind attempts by result")
            .build(),
    );
}

// ============================================================================
// SERVER RECORDING FUNCTIONS
// ============================================================================

pub fn server_connection(server: &str, result: &str) {
    if let Some(c) = SERVER_CONNECTIONS_TOTAL.get() {
        c.add(1, &[kv("server", server), kv("result", result)]);
    }
}

pub fn server_bind_timeout(server: &str) {
    if let Some(c) = SERVER_BIND_TIMEOUTS_TOTAL.get() {
        c.add(1, &[kv("server", server)]);
    }
}

pub fn server_bind(server: &str, bind_type: &str, result: &str) {
    if let Some(c) = SERVER_BINDS_TOTAL.get() {
        c.add(
            1,
            &[kv("server", server), kv("bind_type", bind_type), kv("result", result)],
        );
    }
}

pub fn server_session_created(server: &str) {
    if let Some(c) = SERVER_SESSIONS_ACTIVE.get() {
        c.add(1, &[kv("server", server)]);
    }
}

pub fn server_session_destroyed(server: &str) {
    if let Some(c) = SERVER_SESSIONS_ACTIVE.get() {
        c.add(-1, &[kv("server", server)]);
    }
}

// ============================================================================
// SESSION RECORDING FUNCTIONS
// ============================================================================

pub fn pdu_sent(session: &str, command: &str) {
    if let Some(c) = PDU_SENT_TOTAL.get() {
        c.add(1, &[kv("session", session), kv("command", command)]);
    }
}

pub fn pdu_received(session: &str, command: &str) {
    if let Some(c) = PDU_RECEIVED_TOTAL.get() {
        c.add(1, &[kv("session", session), kv("command", command)]);
    }
}

pub fn response_duration(session: &str, command: &str, secs: f64) {
    if let Some(h) = RESPONSE_DURATION.get() {
        h.record(secs, &[kv("session", session), kv("command", command)]);
    }
}

pub fn request_expired(session: &str, command: &str) {
    if let Some(c) = REQUESTS_EXPIRED_TOTAL.get() {
        c.add(1, &[kv("session", session), kv("command", command)]);
    }
}

pub fn unexpected_response(session: &str) {
    if let Some(c) = UNEXPECTED_RESPONSES_TOTAL.get() {
        c.add(1, &[kv("session", session)]);
    }
}

pub fn window_full(session: &str) {
    if let Some(c) = WINDOW_FULL_TOTAL.get() {
        c.add(1, &[kv("session", session)]);
    }
}

pub fn client_bind(session: &str, bind_type: &str, result: &str) {
    if let Some(c) = CLIENT_BINDS_TOTAL.get() {
        c.add(
            1,
            &[kv("session", session), kv("bind_type", bind_type), kv("result", result)],
        );
    }
}

fn kv(key: &'static str, value: &str) -> KeyValue {
    KeyValue::new(key, value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_before_init_is_noop() {
        pdu_sent("s", "enquire_link");
        pdu_received("s", "enquire_link_resp");
        response_duration("s", "enquire_link", 0.01);
        server_bind("srv", "transceiver", "ok");
        server_session_destroyed("srv");
    }

    #[test]
    fn test_init_with_noop_meter() {
        let meter = opentelemetry::global::meter("smpp-session-test");
        init(&meter);
        init(&meter);
        server_connection("srv", "accepted");
        client_bind("c", "transceiver", "ok");
    }
}
