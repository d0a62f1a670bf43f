use std::sync::atomic::{AtomicU64, Ordering};

/// Server-wide connection and bind counters.
#[derive(Debug, Default)]
pub struct ServerCounters {
    connections_accepted: AtomicU64,
    connections_rejected: AtomicU64,
    bind_timeouts: AtomicU64,
    bind_requests: AtomicU64,
    sessions_created: AtomicU64,
    sessions_destroyed: AtomicU64,
    sessions_rejected: AtomicU64,
}

/// Point-in-time copy of [`ServerCounters`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServerCountersSnapshot {
    pub connections_accepted: u64,
    /// Refused because the connection limit was reached
    pub connections_rejected: u64,
    pub bind_timeouts: u64,
    pub bind_requests: u64,
    pub sessions_created: u64,
    pub sessions_destroyed: u64,
    /// Binds refused by the server handler
    pub sessions_rejected: u64,
}

impl ServerCountersSnapshot {
    /// Sessions created and not yet destroyed.
    pub fn current_sessions(&self) -> u64 {
        self.sessions_created.saturating_sub(self.sessions_destroyed)
    }
}

impl ServerCounters {
    pub fn inc_connections_accepted(&self) {
        self.connections_accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_connections_rejected(&self) {
        self.connections_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_bind_timeouts(&self) {
        self.bind_timeouts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_bind_requests(&self) {
        self.bind_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_sessions_created(&self) {
        self.sessions_created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_sessions_destroyed(&self) {
        self.sessions_destroyed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_sessions_rejected(&self) {
        self.sessions_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ServerCountersSnapshot {
        ServerCountersSnapshot {
            connections_accepted: self.connections_accepted.load(Ordering::Relaxed),
            connections_rejected: self.connections_rejected.load(Ordering::Relaxed),
            bind_timeouts: self.bind_timeouts.load(Ordering::Relaxed),
            bind_requests: self.bind_requests.load(Ordering::Relaxed),
            sessions_created: self.sessions_created.load(Ordering::Relaxed),
            sessions_destroyed: self.sessions_destroyed.load(Ordering::Relaxed),
            sessions_rejected: self.sessions_rejected.load(Ordering::Relaxed),
        }
    }

    pub fn reset(&self) {
        for c in [
            &self.connections_accepted,
            &self.connections_rejected,
            &self.bind_timeouts,
            &self.bind_requests,
            &self.sessions_created,
            &self.sessions_destroyed,
            &self.sessions_rejected,
        ] {
            c.store(0, Ordering::Relaxed);
        }
    }
}
