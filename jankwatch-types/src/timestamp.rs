//! Timestamps with an explicit precision tag.
//!
//! Span boundaries come from a monotonic nanosecond clock, while values
//! that passed through a wall clock only carry millisecond resolution.
//! Both are represented by the same value type; the tag decides how
//! comparisons and differences treat the sub-millisecond digits.

use core::cmp::Ordering;
use core::time::Duration;

const NANOS_PER_MILLI: u64 = 1_000_000;

/// Resolution a [`Timestamp`] was captured with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Precision {
    /// Only whole milliseconds are meaningful.
    Millis,
    /// Every nanosecond digit is meaningful.
    #[default]
    Nanos,
}

/// A point in time, stored as nanoseconds plus the precision it was
/// captured with.
///
/// Ordering compares at millisecond resolution first, then the raw
/// nanoseconds, then the precision tag, so it stays consistent with `Eq`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Timestamp {
    nanos: u64,
    precision: Precision,
}

impl Timestamp {
    /// Create a nanosecond-precise timestamp.
    pub const fn from_nanos(nanos: u64) -> Self {
        Self {
            nanos,
            precision: Precision::Nanos,
        }
    }

    /// Create a millisecond-precise timestamp.
    pub const fn from_millis(millis: u64) -> Self {
        Self {
            nanos: millis * NANOS_PER_MILLI,
            precision: Precision::Millis,
        }
    }

    /// Raw nanosecond value.
    pub const fn as_nanos(&self) -> u64 {
        self.nanos
    }

    /// Value in whole milliseconds (truncated).
    pub const fn as_millis(&self) -> u64 {
        self.nanos / NANOS_PER_MILLI
    }

    pub const fn precision(&self) -> Precision {
        self.precision
    }

    /// True when both timestamps carry nanosecond digits.
    const fn both_precise(&self, other: &Timestamp) -> bool {
        matches!(
            (self.precision, other.precision),
            (Precision::Nanos, Precision::Nanos)
        )
    }

    /// Signed difference `self - other` in nanoseconds.
    ///
    /// Exact when both sides are nanosecond-precise. Otherwise only the
    /// millisecond digits are compared, since the coarser side cannot
    /// resolve anything finer.
    pub fn diff(&self, other: &Timestamp) -> i64 {
        if self.both_precise(other) {
            self.nanos as i64 - other.nanos as i64
        } else {
            (self.as_millis() as i64 - other.as_millis() as i64) * NANOS_PER_MILLI as i64
        }
    }

    /// Duration elapsed from `earlier` to `self`, saturating at zero.
    pub fn duration_since(&self, earlier: &Timestamp) -> Duration {
        Duration::from_nanos(self.diff(earlier).max(0) as u64)
    }

    /// The later of the two timestamps, in nanoseconds.
    ///
    /// Equivalent to `max(self, other).as_nanos()` under this type's order.
    pub fn later_nanos(&self, other: &Timestamp) -> u64 {
        self.later_of(other).nanos
    }

    /// The later of the two timestamps.
    pub fn later_of(&self, other: &Timestamp) -> Timestamp {
        if self < other {
            *other
        } else {
            *self
        }
    }
}

impl Ord for Timestamp {
    fn cmp(&self, other: &Self) -> Ordering {
        self.as_millis()
            .cmp(&other.as_millis())
            .then_with(|| self.nanos.cmp(&other.nanos))
            .then_with(|| self.precision.cmp(&other.precision))
    }
}

impl PartialOrd for Timestamp {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl From<Duration> for Timestamp {
    fn from(d: Duration) -> Self {
        Self::from_nanos(d.as_nanos() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precise_diff_keeps_sub_millisecond_digits() {
        let a = Timestamp::from_nanos(5_000_250);
        let b = Timestamp::from_nanos(2_000_100);
        assert_eq!(a.diff(&b), 3_000_150);
        assert_eq!(b.diff(&a), -3_000_150);
    }

    #[test]
    fn test_mixed_precision_diff_uses_milliseconds() {
        let precise = Timestamp::from_nanos(5_900_000);
        let coarse = Timestamp::from_millis(2);
        // 5.9ms truncates to 5ms
        assert_eq!(precise.diff(&coarse), 3_000_000);
    }

    #[test]
    fn test_ordering_compares_millis_first() {
        let a = Timestamp::from_nanos(1_999_999);
        let b = Timestamp::from_millis(2);
        assert!(a < b);

        let c = Timestamp::from_nanos(2_000_001);
        assert!(b < c);
    }

    #[test]
    fn test_equal_nanos_different_precision_are_ordered_not_equal() {
        let coarse = Timestamp::from_millis(3);
        let precise = Timestamp::from_nanos(3_000_000);
        assert_ne!(coarse, precise);
        assert!(coarse < precise);
    }

    #[test]
    fn test_later_of_picks_the_larger() {
        let a = Timestamp::from_nanos(10);
        let b = Timestamp::from_nanos(20);
        assert_eq!(a.later_of(&b), b);
        assert_eq!(b.later_of(&a), b);
        assert_eq!(a.later_nanos(&b), 20);
    }

    #[test]
    fn test_duration_since_saturates() {
        let a = Timestamp::from_nanos(100);
        let b = Timestamp::from_nanos(400);
        assert_eq!(b.duration_since(&a), Duration::from_nanos(300));
        assert_eq!(a.duration_since(&b), Duration::ZERO);
    }

    #[test]
    fn test_accessors() {
        let t = Timestamp::from_millis(1500);
        assert_eq!(t.as_nanos(), 1_500_000_000);
        assert_eq!(t.as_millis(), 1500);
        assert_eq!(t.precision(), Precision::Millis);
        assert_eq!(Timestamp::default().precision(), Precision::Nanos);
    }
}
