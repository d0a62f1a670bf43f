//! Per-session traffic counters and the observer hook that feeds them.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::pdu::{CommandId, Pdu};

/// Receives engine events for one session.
///
/// Called inline on the send and read paths, so implementations should
/// only record and return.
pub trait SessionObserver: Send + Sync {
    fn request_sent(&self, _request: &Pdu) {}

    fn request_received(&self, _request: &Pdu) {}

    fn response_sent(&self, _response: &Pdu) {}

    /// `request` is `None` when nothing was pending under the sequence number.
    fn response_received(&self, _request: Option<&Pdu>, _response: &Pdu, _elapsed: Duration) {}

    fn request_expired(&self, _request: &Pdu) {}

    fn request_cancelled(&self, _request: &Pdu) {}
}

/// Counters for one request type in one direction.
#[derive(Debug, Default)]
pub struct PduCounter {
    request: AtomicU64,
    request_expired: AtomicU64,
    request_cancelled: AtomicU64,
    response: AtomicU64,
    response_ok: AtomicU64,
    response_time_ms: AtomicU64,
}

/// Point-in-time copy of a [`PduCounter`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PduCounterSnapshot {
    pub request: u64,
    pub request_expired: u64,
    pub request_cancelled: u64,
    pub response: u64,
    pub response_ok: u64,
    /// Sum of response times, milliseconds.
    pub response_time_ms: u64,
}

impl PduCounter {
    fn snapshot(&self) -> PduCounterSnapshot {
        PduCounterSnapshot {
            request: self.request.load(Ordering::Relaxed),
            request_expired: self.request_expired.load(Ordering::Relaxed),
            request_cancelled: self.request_cancelled.load(Ordering::Relaxed),
            response: self.response.load(Ordering::Relaxed),
            response_ok: self.response_ok.load(Ordering::Relaxed),
            response_time_ms: self.response_time_ms.load(Ordering::Relaxed),
        }
    }

    fn reset(&self) {
        self.request.store(0, Ordering::Relaxed);
        self.request_expired.store(0, Ordering::Relaxed);
        self.request_cancelled.store(0, Ordering::Relaxed);
        self.response.store(0, Ordering::Relaxed);
        self.response_ok.store(0, Ordering::Relaxed);
        self.response_time_ms.store(0, Ordering::Relaxed);
    }
}

/// Traffic counters for the request types a session exchanges.
#[derive(Debug, Default)]
pub struct SessionCounters {
    tx_submit_sm: PduCounter,
    tx_deliver_sm: PduCounter,
    tx_data_sm: PduCounter,
    tx_enquire_link: PduCounter,
    rx_submit_sm: PduCounter,
    rx_deliver_sm: PduCounter,
    rx_data_sm: PduCounter,
    rx_enquire_link: PduCounter,
    tx_generic_nack: AtomicU64,
    rx_generic_nack: AtomicU64,
    rx_unexpected_response: AtomicU64,
}

/// Point-in-time copy of [`SessionCounters`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionCountersSnapshot {
    pub tx_submit_sm: PduCounterSnapshot,
    pub tx_deliver_sm: PduCounterSnapshot,
    pub tx_data_sm: PduCounterSnapshot,
    pub tx_enquire_link: PduCounterSnapshot,
    pub rx_submit_sm: PduCounterSnapshot,
    pub rx_deliver_sm: PduCounterSnapshot,
    pub rx_data_sm: PduCounterSnapshot,
    pub rx_enquire_link: PduCounterSnapshot,
    pub tx_generic_nack: u64,
    pub rx_generic_nack: u64,
    pub rx_unexpected_response: u64,
}

fn inc(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

impl SessionCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counter for a request type (or its response) sent by us.
    fn tx(&self, command: CommandId) -> Option<&PduCounter> {
        match command {
            CommandId::SubmitSm | CommandId::SubmitSmResp => Some(&self.tx_submit_sm),
            CommandId::DeliverSm | CommandId::DeliverSmResp => Some(&self.tx_deliver_sm),
            CommandId::DataSm | CommandId::DataSmResp => Some(&self.tx_data_sm),
            CommandId::EnquireLink | CommandId::EnquireLinkResp => Some(&self.tx_enquire_link),
            _ => None,
        }
    }

    /// Counter for a request type (or its response) sent by the peer.
    fn rx(&self, command: CommandId) -> Option<&PduCounter> {
        match command {
            CommandId::SubmitSm | CommandId::SubmitSmResp => Some(&self.rx_submit_sm),
            CommandId::DeliverSm | CommandId::DeliverSmResp => Some(&self.rx_deliver_sm),
            CommandId::DataSm | CommandId::DataSmResp => Some(&self.rx_data_sm),
            CommandId::EnquireLink | CommandId::EnquireLinkResp => Some(&self.rx_enquire_link),
            _ => None,
        }
    }

    pub fn snapshot(&self) -> SessionCountersSnapshot {
        SessionCountersSnapshot {
            tx_submit_sm: self.tx_submit_sm.snapshot(),
            tx_deliver_sm: self.tx_deliver_sm.snapshot(),
            tx_data_sm: self.tx_data_sm.snapshot(),
            tx_enquire_link: self.tx_enquire_link.snapshot(),
            rx_submit_sm: self.rx_submit_sm.snapshot(),
            rx_deliver_sm: self.rx_deliver_sm.snapshot(),
            rx_data_sm: self.rx_data_sm.snapshot(),
            rx_enquire_link: self.rx_enquire_link.snapshot(),
            tx_generic_nack: self.tx_generic_nack.load(Ordering::Relaxed),
            rx_generic_nack: self.rx_generic_nack.load(Ordering::Relaxed),
            rx_unexpected_response: self.rx_unexpected_response.load(Ordering::Relaxed),
        }
    }

    pub fn reset(&self) {
        for counter in [
            &self.tx_submit_sm,
            &self.tx_deliver_sm,
            &self.tx_data_sm,
            &self.tx_enquire_link,
            &self.rx_submit_sm,
            &self.rx_deliver_sm,
            &self.rx_data_sm,
            &self.rx_enquire_link,
        ] {
            counter.reset();
        }
        self.tx_generic_nack.store(0, Ordering::Relaxed);
        self.rx_generic_nack.store(0, Ordering::Relaxed);
        self.rx_unexpected_response.store(0, Ordering::Relaxed);
    }
}

impl SessionObserver for SessionCounters {
    fn request_sent(&self, request: &Pdu) {
        if let Some(c) = self.tx(request.command_id()) {
            inc(&c.request);
        }
    }

    fn request_received(&self, request: &Pdu) {
        if let Some(c) = self.rx(request.command_id()) {
            inc(&c.request);
        }
    }

    fn response_sent(&self, response: &Pdu) {
        if response.command_id() == CommandId::GenericNack {
            inc(&self.tx_generic_nack);
            return;
        }
        if let Some(c) = self.rx(response.command_id()) {
            inc(&c.response);
            if response.command_status.is_ok() {
                inc(&c.response_ok);
            }
        }
    }

    fn response_received(&self, request: Option<&Pdu>, response: &Pdu, elapsed: Duration) {
        if response.command_id() == CommandId::GenericNack {
            inc(&self.rx_generic_nack);
        }
        let Some(request) = request else {
            inc(&self.rx_unexpected_response);
            return;
        };
        if let Some(c) = self.tx(request.command_id()) {
            inc(&c.response);
            if response.command_status.is_ok() {
                inc(&c.response_ok);
            }
            c.response_time_ms
                .fetch_add(elapsed.as_millis() as u64, Ordering::Relaxed);
        }
    }

    fn request_expired(&self, request: &Pdu) {
        if let Some(c) = self.tx(request.command_id()) {
            inc(&c.request_expired);
        }
    }

    fn request_cancelled(&self, request: &Pdu) {
        if let Some(c) = self.tx(request.command_id()) {
            inc(&c.request_cancelled);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdu::{Body, ShortMessage, Status};

    #[test]
    fn test_tx_request_and_response() {
        let counters = SessionCounters::new();
        let req = Pdu::submit_sm(ShortMessage::default()).with_sequence(1);
        let resp = req.create_response().unwrap();

        counters.request_sent(&req);
        counters.response_received(Some(&req), &resp, Duration::from_millis(12));

        let snap = counters.snapshot();
        assert_eq!(snap.tx_submit_sm.request, 1);
        assert_eq!(snap.tx_submit_sm.response, 1);
        assert_eq!(snap.tx_submit_sm.response_ok, 1);
        assert_eq!(snap.tx_submit_sm.response_time_ms, 12);
        assert_eq!(snap.rx_submit_sm, PduCounterSnapshot::default());
    }

    #[test]
    fn test_generic_nack_and_unexpected() {
        let counters = SessionCounters::new();
        let nack = Pdu::generic_nack(5, Status::INVCMDID);
        counters.response_received(None, &nack, Duration::ZERO);
        counters.response_sent(&nack);
        counters.response_received(None, &Pdu::new(Body::EnquireLinkResp), Duration::ZERO);

        let snap = counters.snapshot();
        assert_eq!(snap.rx_generic_nack, 1);
        assert_eq!(snap.tx_generic_nack, 1);
        assert_eq!(snap.rx_unexpected_response, 2);
    }

    #[test]
    fn test_reset() {
        let counters = SessionCounters::new();
        counters.request_received(&Pdu::enquire_link());
        counters.request_expired(&Pdu::enquire_link());
        assert_eq!(counters.snapshot().rx_enquire_link.request, 1);
        assert_eq!(counters.snapshot().tx_enquire_link.request_expired, 1);

        counters.reset();
        assert_eq!(counters.snapshot(), SessionCountersSnapshot::default());
    }
}
