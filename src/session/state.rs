//! Session lifecycle state.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

use tracing::debug;

/// Lifecycle of one session. States only ever move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum SessionState {
    Initial = 0,
    Open = 1,
    Binding = 2,
    Bound = 3,
    Unbinding = 4,
    Closed = 5,
}

impl SessionState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => SessionState::Initial,
            1 => SessionState::Open,
            2 => SessionState::Binding,
            3 => SessionState::Bound,
            4 => SessionState::Unbinding,
            _ => SessionState::Closed,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SessionState::Initial => "INITIAL",
            SessionState::Open => "OPEN",
            SessionState::Binding => "BINDING",
            SessionState::Bound => "BOUND",
            SessionState::Unbinding => "UNBINDING",
            SessionState::Closed => "CLOSED",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Atomically updated session state.
#[derive(Debug)]
pub(crate) struct StateCell {
    value: AtomicU8,
}

impl StateCell {
    pub(crate) fn new(initial: SessionState) -> Self {
        Self {
            value: AtomicU8::new(initial as u8),
        }
    }

    pub(crate) fn get(&self) -> SessionState {
        SessionState::from_u8(self.value.load(Ordering::SeqCst))
    }

    /// Move forward to `to`. Returns the previous state on success, or the
    /// current state if `to` is not ahead of it.
    pub(crate) fn advance(&self, to: SessionState) -> Result<SessionState, SessionState> {
        let result = self
            .value
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| {
                (to as u8 > current).then_some(to as u8)
            })
            .map(SessionState::from_u8)
            .map_err(SessionState::from_u8);

        if let Ok(from) = result {
            debug!(from = %from, to = %to, "session state transition");
        }
        result
    }
}
