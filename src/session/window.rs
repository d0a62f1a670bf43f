//! Bounded set of outstanding requests keyed by sequence number.
//!
//! Every outbound request holds one slot (a semaphore permit) from the
//! moment it is offered until it reaches a terminal outcome. An entry is
//! terminated by whoever removes it from the map, so each sequence number
//! sees exactly one of complete / cancel / fail / expire.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::sync::{watch, OwnedSemaphorePermit, Semaphore};
use tracing::trace;

use crate::pdu::Pdu;

/// Window error.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WindowError {
    #[error("sequence number {0} is already pending")]
    DuplicateKey(u32),

    #[error("no window slot for sequence number {key} within {waited:?}")]
    OfferTimeout { key: u32, waited: Duration },

    #[error("window destroyed")]
    Destroyed,
}

/// Whether anyone is awaiting an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CallerState {
    /// A caller is blocked on the entry and will observe completion itself.
    Waiting = 0,
    /// Asynchronous send; completion goes to the session handler.
    NotWaiting = 1,
    /// The caller gave up waiting; a late response is unexpected.
    TimedOutWaiting = 2,
}

impl CallerState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => CallerState::Waiting,
            1 => CallerState::NotWaiting,
            _ => CallerState::TimedOutWaiting,
        }
    }
}

/// Why an entry was failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureCause {
    ChannelClosed,
    WriteFailed(String),
    Destroyed,
}

impl fmt::Display for FailureCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureCause::ChannelClosed => f.write_str("channel closed"),
            FailureCause::WriteFailed(e) => write!(f, "write failed: {}", e),
            FailureCause::Destroyed => f.write_str("window destroyed"),
        }
    }
}

/// Terminal outcome of an entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WindowOutcome {
    Completed(Pdu),
    Cancelled,
    Failed(FailureCause),
    Expired,
}

struct Entry {
    key: u32,
    request: Pdu,
    offered_at: Instant,
    accepted_at: Instant,
    expire_at: Option<Instant>,
    caller: AtomicU8,
    done_at: Mutex<Option<Instant>>,
    outcome: watch::Sender<Option<WindowOutcome>>,
}

/// Handle on one outstanding request.
#[derive(Clone)]
pub struct WindowFuture {
    entry: Arc<Entry>,
}

impl fmt::Debug for WindowFuture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WindowFuture")
            .field("key", &self.entry.key)
            .field("request", &self.entry.request.name())
            .field("caller", &self.caller_state())
            .field("done", &self.is_done())
            .finish()
    }
}

impl WindowFuture {
    pub fn key(&self) -> u32 {
        self.entry.key
    }

    pub fn request(&self) -> &Pdu {
        &self.entry.request
    }

    pub fn caller_state(&self) -> CallerState {
        CallerState::from_u8(self.entry.caller.load(Ordering::SeqCst))
    }

    pub fn is_done(&self) -> bool {
        self.entry.outcome.borrow().is_some()
    }

    pub fn outcome(&self) -> Option<WindowOutcome> {
        self.entry.outcome.borrow().clone()
    }

    /// The response, if the entry completed.
    pub fn response(&self) -> Option<Pdu> {
        match &*self.entry.outcome.borrow() {
            Some(WindowOutcome::Completed(pdu)) => Some(pdu.clone()),
            _ => None,
        }
    }

    /// Time spent waiting for a window slot.
    pub fn window_wait_time(&self) -> Duration {
        self.entry.accepted_at - self.entry.offered_at
    }

    /// Time from slot acquisition to terminal outcome (so far, if pending).
    pub fn response_time(&self) -> Duration {
        let done_at = lock(&self.entry.done_at).unwrap_or_else(Instant::now);
        done_at.saturating_duration_since(self.entry.accepted_at)
    }

    pub fn expire_at(&self) -> Option<Instant> {
        self.entry.expire_at
    }

    /// Wait up to `timeout` for a terminal outcome. On timeout the caller
    /// state becomes [`CallerState::TimedOutWaiting`] and `false` is
    /// returned; the entry itself stays in the window.
    ///
    /// The caller state is switched under the outcome lock, so an outcome
    /// that lands afterwards always observes `TimedOutWaiting` and one that
    /// landed before makes this return `true`.
    pub async fn await_done(&self, timeout: Duration) -> bool {
        let mut rx = self.entry.outcome.subscribe();
        let done = matches!(
            tokio::time::timeout(timeout, rx.wait_for(|o| o.is_some())).await,
            Ok(Ok(_))
        );
        if done {
            return true;
        }
        let mut timed_out = false;
        self.entry.outcome.send_if_modified(|outcome| {
            if outcome.is_none() {
                self.entry
                    .caller
                    .store(CallerState::TimedOutWaiting as u8, Ordering::SeqCst);
                timed_out = true;
            }
            false
        });
        !timed_out
    }

    fn finish(&self, outcome: WindowOutcome) {
        *lock(&self.entry.done_at) = Some(Instant::now());
        self.entry.outcome.send_replace(Some(outcome));
    }

    fn same_entry(&self, other: &WindowFuture) -> bool {
        Arc::ptr_eq(&self.entry, &other.entry)
    }
}

struct Slot {
    future: WindowFuture,
    _permit: OwnedSemaphorePermit,
}

/// Request window.
pub struct Window {
    max_size: usize,
    slots: Arc<Semaphore>,
    pending: Mutex<BTreeMap<u32, Slot>>,
}

impl fmt::Debug for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Window")
            .field("size", &self.size())
            .field("max_size", &self.max_size)
            .finish()
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl Window {
    /// A window holding at most `max_size` (at least 1) outstanding requests.
    pub fn new(max_size: usize) -> Self {
        let max_size = max_size.max(1);
        Self {
            max_size,
            slots: Arc::new(Semaphore::new(max_size)),
            pending: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn size(&self) -> usize {
        lock(&self.pending).len()
    }

    pub fn free_size(&self) -> usize {
        self.slots.available_permits()
    }

    pub fn contains(&self, key: u32) -> bool {
        lock(&self.pending).contains_key(&key)
    }

    /// Register `request` under `key`, waiting up to `acquire_timeout` for a
    /// free slot. A zero timeout fails immediately when the window is full.
    pub async fn offer(
        &self,
        key: u32,
        request: Pdu,
        acquire_timeout: Duration,
        expire_timeout: Option<Duration>,
        synchronous: bool,
    ) -> Result<WindowFuture, WindowError> {
        if self.slots.is_closed() {
            return Err(WindowError::Destroyed);
        }
        if self.contains(key) {
            return Err(WindowError::DuplicateKey(key));
        }

        let offered_at = Instant::now();
        let permit = if acquire_timeout.is_zero() {
            self.slots.clone().try_acquire_owned().map_err(|e| match e {
                tokio::sync::TryAcquireError::Closed => WindowError::Destroyed,
                tokio::sync::TryAcquireError::NoPermits => WindowError::OfferTimeout {
                    key,
                    waited: Duration::ZERO,
                },
            })?
        } else {
            match tokio::time::timeout(acquire_timeout, self.slots.clone().acquire_owned()).await {
                Ok(Ok(permit)) => permit,
                Ok(Err(_)) => return Err(WindowError::Destroyed),
                Err(_) => {
                    return Err(WindowError::OfferTimeout {
                        key,
                        waited: acquire_timeout,
                    })
                }
            }
        };

        let accepted_at = Instant::now();
        let caller = if synchronous {
            CallerState::Waiting
        } else {
            CallerState::NotWaiting
        };
        let (outcome, _) = watch::channel(None);
        let future = WindowFuture {
            entry: Arc::new(Entry {
                key,
                request,
                offered_at,
                accepted_at,
                expire_at: expire_timeout.map(|t| accepted_at + t),
                caller: AtomicU8::new(caller as u8),
                done_at: Mutex::new(None),
                outcome,
            }),
        };

        let mut pending = lock(&self.pending);
        if self.slots.is_closed() {
            return Err(WindowError::Destroyed);
        }
        if pending.contains_key(&key) {
            return Err(WindowError::DuplicateKey(key));
        }
        pending.insert(
            key,
            Slot {
                future: future.clone(),
                _permit: permit,
            },
        );
        trace!(key, size = pending.len(), "window offer accepted");
        Ok(future)
    }

    fn remove(&self, key: u32) -> Option<WindowFuture> {
        lock(&self.pending).remove(&key).map(|slot| slot.future)
    }

    fn remove_entry(&self, future: &WindowFuture) -> bool {
        let mut pending = lock(&self.pending);
        match pending.get(&future.key()) {
            Some(slot) if slot.future.same_entry(future) => {
                pending.remove(&future.key());
                true
            }
            _ => false,
        }
    }

    /// Complete the entry for `key` with `response`. `None` if nothing is
    /// pending under that key.
    pub fn complete(&self, key: u32, response: Pdu) -> Option<WindowFuture> {
        let future = self.remove(key)?;
        future.finish(WindowOutcome::Completed(response));
        Some(future)
    }

    /// Cancel a pending entry. No-op if it already reached an outcome.
    pub fn cancel(&self, future: &WindowFuture) -> bool {
        if !self.remove_entry(future) {
            return false;
        }
        future.finish(WindowOutcome::Cancelled);
        true
    }

    /// Fail a pending entry. No-op if it already reached an outcome.
    pub fn fail(&self, future: &WindowFuture, cause: FailureCause) -> bool {
        if !self.remove_entry(future) {
            return false;
        }
        future.finish(WindowOutcome::Failed(cause));
        true
    }

    /// Fail every entry a caller is actively waiting on.
    pub fn fail_waiting(&self, cause: FailureCause) -> Vec<WindowFuture> {
        self.drain_where(|f| f.caller_state() == CallerState::Waiting, |_| {
            WindowOutcome::Failed(cause.clone())
        })
    }

    /// Fail every entry.
    pub fn fail_all(&self, cause: FailureCause) -> Vec<WindowFuture> {
        self.drain_where(|_| true, |_| WindowOutcome::Failed(cause.clone()))
    }

    /// Expire every entry whose deadline has passed.
    pub fn cancel_all_expired(&self) -> Vec<WindowFuture> {
        let now = Instant::now();
        self.drain_where(
            |f| f.expire_at().is_some_and(|at| at <= now),
            |_| WindowOutcome::Expired,
        )
    }

    fn drain_where(
        &self,
        select: impl Fn(&WindowFuture) -> bool,
        outcome: impl Fn(&WindowFuture) -> WindowOutcome,
    ) -> Vec<WindowFuture> {
        let removed: Vec<WindowFuture> = {
            let mut pending = lock(&self.pending);
            let keys: Vec<u32> = pending
                .iter()
                .filter(|(_, slot)| select(&slot.future))
                .map(|(key, _)| *key)
                .collect();
            keys.into_iter()
                .filter_map(|key| pending.remove(&key).map(|slot| slot.future))
                .collect()
        };

        for future in &removed {
            future.finish(outcome(future));
        }
        removed
    }

    /// Outstanding entries ordered by sequence number.
    pub fn snapshot(&self) -> BTreeMap<u32, WindowFuture> {
        lock(&self.pending)
            .iter()
            .map(|(key, slot)| (*key, slot.future.clone()))
            .collect()
    }

    /// Refuse further offers and fail everything outstanding.
    pub fn destroy(&self) -> Vec<WindowFuture> {
        self.slots.close();
        self.fail_all(FailureCause::Destroyed)
    }

    pub fn is_destroyed(&self) -> bool {
        self.slots.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdu::{Body, Pdu};

    const LONG: Duration = Duration::from_secs(5);

    fn request(seq: u32) -> Pdu {
        Pdu::enquire_link().with_sequence(seq)
    }

    fn response(seq: u32) -> Pdu {
        Pdu::new(Body::EnquireLinkResp).with_sequence(seq)
    }

    #[tokio::test]
    async fn test_offer_and_complete() {
        let window = Window::new(2);
        let future = window.offer(1, request(1), LONG, None, false).await.unwrap();
        assert_eq!(window.size(), 1);
        assert_eq!(future.caller_state(), CallerState::NotWaiting);

        let completed = window.complete(1, response(1)).unwrap();
        assert!(completed.is_done());
        assert_eq!(future.response(), Some(response(1)));
        assert_eq!(window.size(), 0);
        assert_eq!(window.free_size(), 2);
    }

    #[tokio::test]
    async fn test_duplicate_key_rejected() {
        let window = Window::new(4);
        window.offer(7, request(7), LONG, None, false).await.unwrap();
        let err = window.offer(7, request(7), LONG, None, false).await.unwrap_err();
        assert_eq!(err, WindowError::DuplicateKey(7));

        window.complete(7, response(7)).unwrap();
        assert!(window.offer(7, request(7), LONG, None, false).await.is_ok());
    }

    #[tokio::test]
    async fn test_full_window_times_out() {
        let window = Window::new(1);
        window.offer(1, request(1), LONG, None, false).await.unwrap();
        let err = window
            .offer(2, request(2), Duration::from_millis(20), None, false)
            .await
            .unwrap_err();
        assert!(matches!(err, WindowError::OfferTimeout { key: 2, .. }));

        let err = window.offer(3, request(3), Duration::ZERO, None, false).await.unwrap_err();
        assert!(matches!(err, WindowError::OfferTimeout { key: 3, .. }));
    }

    #[tokio::test]
    async fn test_blocked_offer_proceeds_after_completion() {
        let window = Arc::new(Window::new(1));
        window.offer(1, request(1), LONG, None, false).await.unwrap();

        let blocked = {
            let window = window.clone();
            tokio::spawn(async move { window.offer(2, request(2), LONG, None, false).await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!blocked.is_finished());

        window.complete(1, response(1)).unwrap();
        let second = blocked.await.unwrap().unwrap();
        assert_eq!(second.key(), 2);
        assert!(second.window_wait_time() >= Duration::from_millis(10));
    }

    #[tokio::test]
    async fn test_await_done_timeout_marks_caller() {
        let window = Window::new(1);
        let future = window.offer(1, request(1), LONG, None, true).await.unwrap();
        assert_eq!(future.caller_state(), CallerState::Waiting);

        assert!(!future.await_done(Duration::from_millis(10)).await);
        assert_eq!(future.caller_state(), CallerState::TimedOutWaiting);

        assert!(window.cancel(&future));
        assert_eq!(future.outcome(), Some(WindowOutcome::Cancelled));
        assert!(window.complete(1, response(1)).is_none());
    }

    #[tokio::test]
    async fn test_await_done_after_outcome_keeps_caller_waiting() {
        let window = Window::new(1);
        let future = window.offer(1, request(1), LONG, None, true).await.unwrap();
        window.complete(1, response(1)).unwrap();

        assert!(future.await_done(Duration::ZERO).await);
        assert_eq!(future.caller_state(), CallerState::Waiting);
    }

    #[tokio::test]
    async fn test_completion_after_timeout_sees_timed_out_caller() {
        let window = Window::new(1);
        let future = window.offer(1, request(1), LONG, None, true).await.unwrap();
        assert!(!future.await_done(Duration::from_millis(5)).await);

        let completed = window.complete(1, response(1)).unwrap();
        assert_eq!(completed.caller_state(), CallerState::TimedOutWaiting);
        assert!(!window.cancel(&future));
    }

    #[tokio::test]
    async fn test_single_terminal_outcome() {
        let window = Window::new(1);
        let future = window.offer(1, request(1), LONG, None, false).await.unwrap();
        window.complete(1, response(1)).unwrap();

        assert!(!window.cancel(&future));
        assert!(!window.fail(&future, FailureCause::ChannelClosed));
        assert_eq!(future.outcome(), Some(WindowOutcome::Completed(response(1))));
    }

    #[tokio::test]
    async fn test_fail_waiting_leaves_async_entries() {
        let window = Window::new(4);
        let sync = window.offer(1, request(1), LONG, None, true).await.unwrap();
        let async_ = window.offer(2, request(2), LONG, None, false).await.unwrap();

        let failed = window.fail_waiting(FailureCause::ChannelClosed);
        assert_eq!(failed.len(), 1);
        assert_eq!(
            sync.outcome(),
            Some(WindowOutcome::Failed(FailureCause::ChannelClosed))
        );
        assert!(!async_.is_done());
        assert_eq!(window.snapshot().keys().copied().collect::<Vec<_>>(), vec![2]);
    }

    #[tokio::test]
    async fn test_expiry() {
        let window = Window::new(4);
        let short = window
            .offer(1, request(1), LONG, Some(Duration::from_millis(5)), false)
            .await
            .unwrap();
        window.offer(2, request(2), LONG, None, false).await.unwrap();

        tokio::time::sleep(Duration::from_millis(20)).await;
        let expired = window.cancel_all_expired();
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].key(), 1);
        assert_eq!(short.outcome(), Some(WindowOutcome::Expired));
        assert_eq!(window.size(), 1);
    }

    #[tokio::test]
    async fn test_destroy_fails_everything_and_refuses_offers() {
        let window = Window::new(2);
        let future = window.offer(1, request(1), LONG, None, false).await.unwrap();
        assert_eq!(window.destroy().len(), 1);
        assert_eq!(
            future.outcome(),
            Some(WindowOutcome::Failed(FailureCause::Destroyed))
        );
        assert_eq!(
            window.offer(2, request(2), LONG, None, false).await.unwrap_err(),
            WindowError::Destroyed
        );
    }
}
