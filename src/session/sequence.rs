//! Outgoing sequence number allocation.

use std::sync::atomic::{AtomicU32, Ordering};

/// Lowest sequence number ever generated.
pub const MIN_SEQUENCE: u32 = 0x0000_0001;
/// Highest sequence number ever generated; the next one wraps to [`MIN_SEQUENCE`].
pub const MAX_SEQUENCE: u32 = 0x7FFF_FFFF;

/// 31-bit wrapping sequence number generator.
///
/// Only values in `MIN_SEQUENCE..=MAX_SEQUENCE` are produced. Inbound PDUs
/// carrying 0 or values above `MAX_SEQUENCE` are still accepted elsewhere;
/// some peers send them.
#[derive(Debug)]
pub struct SequenceNumber {
    value: AtomicU32,
}

impl Default for SequenceNumber {
    fn default() -> Self {
        Self::new()
    }
}

impl SequenceNumber {
    pub fn new() -> Self {
        Self::starting_at(MIN_SEQUENCE)
    }

    /// Start from `initial`, clamped into the generated range.
    pub fn starting_at(initial: u32) -> Self {
        let initial = if (MIN_SEQUENCE..=MAX_SEQUENCE).contains(&initial) {
            initial
        } else {
            MIN_SEQUENCE
        };
        Self {
            value: AtomicU32::new(initial),
        }
    }

    /// Take the next sequence number.
    pub fn next(&self) -> u32 {
        // fetch_update only fails if the closure returns None
        match self.value.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |v| {
            Some(if v >= MAX_SEQUENCE { MIN_SEQUENCE } else { v + 1 })
        }) {
            Ok(previous) | Err(previous) => previous,
        }
    }

    /// The value the next call to [`next`](Self::next) will return.
    pub fn peek(&self) -> u32 {
        self.value.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.value.store(MIN_SEQUENCE, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[test]
    fn test_starts_at_one() {
        let seq = SequenceNumber::new();
        assert_eq!(seq.next(), 1);
        assert_eq!(seq.next(), 2);
        assert_eq!(seq.peek(), 3);
    }

    #[test]
    fn test_wraps_to_one() {
        let seq = SequenceNumber::starting_at(MAX_SEQUENCE);
        assert_eq!(seq.next(), MAX_SEQUENCE);
        assert_eq!(seq.next(), 1);
    }

    #[test]
    fn test_out_of_range_start_is_clamped() {
        assert_eq!(SequenceNumber::starting_at(0).next(), 1);
        assert_eq!(SequenceNumber::starting_at(0x8000_0000).next(), 1);
    }

    #[test]
    fn test_unique_under_concurrency() {
        let seq = Arc::new(SequenceNumber::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let seq = seq.clone();
                std::thread::spawn(move || (0..1000).map(|_| seq.next()).collect::<Vec<_>>())
            })
            .collect();

        let mut seen = HashSet::new();
        for h in handles {
            for v in h.join().unwrap() {
                assert!(seen.insert(v), "duplicate sequence number {}", v);
            }
        }
        assert_eq!(seen.len(), 8000);
    }
}
