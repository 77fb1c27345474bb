//! Per-frame data: the classified event kept in history buffers and the
//! clipped record reported back to callers.

use crate::Timestamp;

/// One platform-reported render cycle after classification.
///
/// All timestamps are on the monotonic clock in nanoseconds. Events are
/// immutable once built; `is_frozen` always implies `is_slow`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FrameEvent {
    start_nanos: u64,
    end_nanos: u64,
    duration_nanos: u64,
    delay_nanos: u64,
    expected_duration_nanos: u64,
    is_slow: bool,
    is_frozen: bool,
}

impl FrameEvent {
    /// Create a classified frame event.
    ///
    /// `end_nanos` is raised to `start_nanos` if it lies before it, and a
    /// frozen frame is always marked slow.
    pub fn new(
        start_nanos: u64,
        end_nanos: u64,
        duration_nanos: u64,
        expected_duration_nanos: u64,
        is_slow: bool,
        is_frozen: bool,
    ) -> Self {
        Self {
            start_nanos,
            end_nanos: end_nanos.max(start_nanos),
            duration_nanos,
            delay_nanos: duration_nanos.saturating_sub(expected_duration_nanos),
            expected_duration_nanos,
            is_slow: is_slow || is_frozen,
            is_frozen,
        }
    }

    pub fn start_nanos(&self) -> u64 {
        self.start_nanos
    }

    pub fn end_nanos(&self) -> u64 {
        self.end_nanos
    }

    /// CPU time spent producing the frame.
    pub fn duration_nanos(&self) -> u64 {
        self.duration_nanos
    }

    /// Time spent beyond the frame budget, zero for on-time frames.
    pub fn delay_nanos(&self) -> u64 {
        self.delay_nanos
    }

    /// Refresh-rate derived budget in effect when the frame was produced.
    pub fn expected_duration_nanos(&self) -> u64 {
        self.expected_duration_nanos
    }

    pub fn is_slow(&self) -> bool {
        self.is_slow
    }

    pub fn is_frozen(&self) -> bool {
        self.is_frozen
    }

    /// Slow or frozen.
    pub fn is_jank(&self) -> bool {
        self.is_slow || self.is_frozen
    }
}

/// A frame as reported inside a span, clipped to the span boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FrameRecord {
    /// Wall-clock start of the (clipped) frame, for display only.
    pub start_millis: u64,
    pub duration_nanos: u64,
    pub delay_nanos: u64,
    pub is_slow: bool,
    pub is_frozen: bool,
}

impl FrameRecord {
    /// The wall-clock start, tagged as millisecond-precise.
    pub fn start_timestamp(&self) -> Timestamp {
        Timestamp::from_millis(self.start_millis)
    }
}
