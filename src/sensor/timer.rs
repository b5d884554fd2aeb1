//! Timer service contract and session generations.

use std::fmt;
use std::time::Duration;

/// Session generation number.
///
/// Every start attempt and every stop moves the session to a new epoch.
/// A timeout carries the epoch it was scheduled in and is ignored if the
/// session has moved on, so a cancellation that races with delivery is
/// harmless.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SessionEpoch(u64);

impl SessionEpoch {
    pub fn from_raw(value: u64) -> Self {
        Self(value)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }

    /// The epoch following this one.
    pub fn next(&self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

impl fmt::Display for SessionEpoch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "epoch-{}", self.0)
    }
}

/// Opaque handle to a scheduled timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle(u64);

impl TimerHandle {
    pub fn from_raw(value: u64) -> Self {
        Self(value)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

/// One-shot timer scheduling offered by the host.
///
/// When a scheduled timer fires, the host must call
/// [`SensorSession::on_timeout`](super::SensorSession::on_timeout) with the
/// epoch it was scheduled for, on the same serialized thread that delivers
/// sensor callbacks.
pub trait TimerService: Send {
    /// Schedule a timeout for `epoch` after `delay`.
    fn schedule_after(&mut self, delay: Duration, epoch: SessionEpoch) -> TimerHandle;

    /// Cancel a scheduled timeout. Cancelling an already fired or already
    /// cancelled handle is a no-op.
    fn cancel(&mut self, handle: TimerHandle);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_epoch_next_is_monotonic() {
        let first = SessionEpoch::default();
        let second = first.next();
        let third = second.next();
        assert!(first < second);
        assert!(second < third);
        assert_eq!(third.as_u64(), 2);
    }

    #[test]
    fn test_epoch_display() {
        assert_eq!(SessionEpoch::from_raw(12).to_string(), "epoch-12");
    }

    #[test]
    fn test_timer_handle_raw() {
        assert_eq!(TimerHandle::from_raw(9).as_u64(), 9);
    }
}
