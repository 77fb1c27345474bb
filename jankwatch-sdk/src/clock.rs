//! Time sources.
//!
//! Spans and frames share one monotonic nanosecond timeline. Wall-clock
//! milliseconds are only used to label records for display.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

/// A monotonic clock plus a wall-clock reading for display.
pub trait Clock: Send + Sync + std::fmt::Debug {
    /// Monotonic time in nanoseconds. Never decreases.
    fn now_nanos(&self) -> u64;

    /// Milliseconds since the Unix epoch.
    fn wall_millis(&self) -> u64;

    /// Capture both readings together.
    fn anchor(&self) -> ClockAnchor {
        ClockAnchor {
            monotonic_nanos: self.now_nanos(),
            wall_millis: self.wall_millis(),
        }
    }
}

/// A monotonic reading paired with the wall-clock time it corresponds to.
///
/// Lets monotonic frame timestamps be rendered as wall-clock milliseconds
/// without consulting a clock again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ClockAnchor {
    pub monotonic_nanos: u64,
    pub wall_millis: u64,
}

impl ClockAnchor {
    /// Wall-clock milliseconds for a monotonic timestamp.
    pub fn wall_millis_at(&self, monotonic_nanos: u64) -> u64 {
        if monotonic_nanos >= self.monotonic_nanos {
            self.wall_millis + (monotonic_nanos - self.monotonic_nanos) / 1_000_000
        } else {
            self.wall_millis
                .saturating_sub((self.monotonic_nanos - monotonic_nanos) / 1_000_000)
        }
    }
}

/// Origin of the process-wide monotonic timeline.
static ORIGIN: OnceLock<Instant> = OnceLock::new();

/// Process clock: `Instant` for monotonic time, `SystemTime` for display.
///
/// Every instance measures from the same process-wide origin, so an event
/// source can stamp frames with its own `SystemClock` and still share the
/// timeline of the bus's spans.
#[derive(Debug, Clone)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: *ORIGIN.get_or_init(Instant::now),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_nanos(&self) -> u64 {
        self.origin.elapsed().as_nanos() as u64
    }

    fn wall_millis(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

/// A clock that only moves when told to. Used for replay and tests.
#[derive(Debug, Default)]
pub struct ManualClock {
    nanos: AtomicU64,
    wall_epoch_millis: u64,
}

impl ManualClock {
    /// Start at `nanos` with the wall clock at the Unix epoch.
    pub fn new(nanos: u64) -> Self {
        Self::with_wall_epoch(nanos, 0)
    }

    /// Start at `nanos`; monotonic zero maps to `wall_epoch_millis`.
    pub fn with_wall_epoch(nanos: u64, wall_epoch_millis: u64) -> Self {
        Self {
            nanos: AtomicU64::new(nanos),
            wall_epoch_millis,
        }
    }

    /// Jump to `nanos`. Moving backwards is ignored.
    pub fn set(&self, nanos: u64) {
        self.nanos.fetch_max(nanos, Ordering::SeqCst);
    }

    pub fn advance(&self, nanos: u64) {
        self.nanos.fetch_add(nanos, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_nanos(&self) -> u64 {
        self.nanos.load(Ordering::SeqCst)
    }

    fn wall_millis(&self) -> u64 {
        self.wall_epoch_millis + self.now_nanos() / 1_000_000
    }
}
