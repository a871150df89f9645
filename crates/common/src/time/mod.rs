//! Wall-clock abstraction.
//!
//! Credential expiry is stored as epoch milliseconds, so services read time
//! through [`Clock`] instead of calling [`SystemTime::now`] directly. Tests
//! swap in [`MockClock`] and move time by hand.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Source of wall-clock time.
pub trait Clock: Send + Sync {
    /// Current system time.
    fn system_time(&self) -> SystemTime;

    /// Milliseconds since the UNIX epoch.
    fn millis_since_epoch(&self) -> u64 {
        u64::try_from(self.system_time().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis())
            .unwrap_or(u64::MAX)
    }
}

impl<T: Clock + ?Sized> Clock for Arc<T> {
    fn system_time(&self) -> SystemTime {
        (**self).system_time()
    }
}

/// Real system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn system_time(&self) -> SystemTime {
        SystemTime::now()
    }
}

/// Manually driven clock for deterministic tests.
///
/// Clones share the same underlying time.
///
/// ```
/// use std::time::Duration;
///
/// use authwire_common::time::{Clock, MockClock};
///
/// let clock = MockClock::at_millis(1_000);
/// clock.advance(Duration::from_secs(5));
/// assert_eq!(clock.millis_since_epoch(), 6_000);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MockClock {
    millis: Arc<AtomicU64>,
}

impl MockClock {
    /// Create a clock frozen at the UNIX epoch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a clock frozen at `millis` since the epoch.
    pub fn at_millis(millis: u64) -> Self {
        Self { millis: Arc::new(AtomicU64::new(millis)) }
    }

    /// Move the clock forward.
    pub fn advance(&self, duration: Duration) {
        let step = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        self.millis.fetch_add(step, Ordering::SeqCst);
    }

    /// Jump to an absolute epoch-millisecond value.
    pub fn set_millis(&self, millis: u64) {
        self.millis.store(millis, Ordering::SeqCst);
    }
}

impl Clock for MockClock {
    fn system_time(&self) -> SystemTime {
        UNIX_EPOCH + Duration::from_millis(self.millis.load(Ordering::SeqCst))
    }

    fn millis_since_epoch(&self) -> u64 {
        self.millis.load(Ordering::SeqCst)
    }
}
