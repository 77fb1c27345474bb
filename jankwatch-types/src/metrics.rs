//! Aggregated jank metrics for one span.

use alloc::vec::Vec;

use crate::{FrameRecord, Timestamp};

/// Jank metrics for a closed span.
///
/// Produced once per span by the aggregator. `total_frame_count` covers
/// observed jank frames, a synthesized pending frame (if any) and an
/// interpolated estimate for the silent part of the span.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WindowMetrics {
    /// Observed + pending + interpolated frames.
    pub total_frame_count: u64,

    /// Slow frames that are not frozen.
    pub slow_frame_count: u64,

    pub frozen_frame_count: u64,

    /// Summed delay of slow (non-frozen) frames.
    pub slow_frame_delay_nanos: u64,

    /// Summed delay of frozen frames.
    pub frozen_frame_delay_nanos: u64,

    /// Sum of the clipped durations of all records.
    pub total_duration_nanos: u64,

    /// Number of synthesized frames for work still in flight at span end (0 or 1).
    pub pending_frame_count: u64,

    /// Frames estimated for span time that produced no platform events.
    pub interpolated_frame_count: u64,

    /// Length of the span the metrics were computed for.
    pub span_duration_nanos: u64,

    /// Per-frame records in the order they were visited.
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Vec::is_empty"))]
    pub frames: Vec<FrameRecord>,
}

impl WindowMetrics {
    /// Create empty metrics.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record and fold it into the counters.
    ///
    /// Frozen frames count towards the frozen totals only; slow frames
    /// towards the slow totals. On-time records add duration but no counts.
    pub fn add_frame(&mut self, record: FrameRecord) {
        self.total_duration_nanos += record.duration_nanos;
        if record.is_frozen {
            self.frozen_frame_count += 1;
            self.frozen_frame_delay_nanos += record.delay_nanos;
        } else if record.is_slow {
            self.slow_frame_count += 1;
            self.slow_frame_delay_nanos += record.delay_nanos;
        }
        self.frames.push(record);
    }

    /// Slow plus frozen frames.
    pub fn slow_frozen_count(&self) -> u64 {
        self.slow_frame_count + self.frozen_frame_count
    }

    /// Slow plus frozen delay.
    pub fn total_delay_nanos(&self) -> u64 {
        self.slow_frame_delay_nanos + self.frozen_frame_delay_nanos
    }

    /// Total delay in seconds.
    pub fn delay_seconds(&self) -> f64 {
        self.total_delay_nanos() as f64 / 1e9
    }

    /// True when nothing at all was counted.
    pub fn is_empty(&self) -> bool {
        self.total_frame_count == 0 && self.frames.is_empty()
    }

    /// Earliest wall-clock start among the per-frame records.
    pub fn first_frame_start(&self) -> Option<Timestamp> {
        self.frames.iter().map(FrameRecord::start_timestamp).min()
    }

    /// Drop the per-frame list, keeping the counters.
    pub fn without_frames(mut self) -> Self {
        self.frames = Vec::new();
        self
    }
}
