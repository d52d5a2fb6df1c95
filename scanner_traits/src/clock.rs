use std::thread;
use std::time::{Duration, Instant};

/// Monotonic clock abstraction used for all engine timing (pre-arm delays,
/// trigger windows, settle sleeps, recovery backoff).
///
/// Injecting the clock keeps the advance protocol and scan loop testable
/// without real-time waits where a test provides its own implementation.
pub trait Clock {
    fn now(&self) -> Instant;
    fn sleep(&self, d: Duration);

    /// Milliseconds elapsed since `epoch`, saturating at 0 on underflow.
    fn ms_since(&self, epoch: Instant) -> u64 {
        self.now().saturating_duration_since(epoch).as_millis() as u64
    }
}

/// Real-time monotonic clock backed by `std::time::Instant`.
#[derive(Debug, Default, Clone, Copy)]
pub struct MonotonicClock;

impl MonotonicClock {
    #[inline]
    pub fn new() -> Self {
        Self
    }
}

impl Clock for MonotonicClock {
    #[inline]
    fn now(&self) -> Instant {
        Instant::now()
    }

    #[inline]
    fn sleep(&self, d: Duration) {
        if d.is_zero() {
            return;
        }
        thread::sleep(d);
    }
}
