//! Slow/frozen classification of raw frame notifications.

use jankwatch_types::{FrameEvent, NANOS_PER_SECOND};

use crate::config::JankConfig;
use crate::error::JankError;

/// A frame notification as delivered by the platform event source.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RawFrame {
    pub start_nanos: u64,
    pub end_nanos: u64,
    /// CPU time spent producing the frame.
    pub duration_nanos: u64,
    pub refresh_rate_hz: f32,
}

impl RawFrame {
    pub fn new(start_nanos: u64, end_nanos: u64, duration_nanos: u64, refresh_rate_hz: f32) -> Self {
        Self {
            start_nanos,
            end_nanos,
            duration_nanos,
            refresh_rate_hz,
        }
    }

    /// Reject notifications that would corrupt a history buffer.
    pub fn validate(&self) -> Result<(), JankError> {
        if self.end_nanos < self.start_nanos {
            return Err(JankError::MalformedEvent(format!(
                "end {} precedes start {}",
                self.end_nanos, self.start_nanos
            )));
        }
        if !self.refresh_rate_hz.is_finite() || self.refresh_rate_hz <= 0.0 {
            return Err(JankError::MalformedEvent(format!(
                "refresh rate {} is not positive",
                self.refresh_rate_hz
            )));
        }
        Ok(())
    }
}

/// True if `duration_nanos` exceeds `budget_nanos`.
pub fn is_slow(duration_nanos: u64, budget_nanos: u64) -> bool {
    duration_nanos > budget_nanos
}

/// True if `duration_nanos` exceeds the frozen threshold.
pub fn is_frozen(duration_nanos: u64, threshold_nanos: u64) -> bool {
    duration_nanos > threshold_nanos
}

/// Frame budget for a refresh rate, `round(1e9 / rate)`.
pub fn expected_duration_nanos(refresh_rate_hz: f32) -> u64 {
    (NANOS_PER_SECOND as f64 / refresh_rate_hz as f64).round() as u64
}

/// Turns validated raw frames into classified [`FrameEvent`]s.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Classifier {
    frozen_threshold_nanos: u64,
    slow_grace_hz: f64,
}

impl Classifier {
    pub fn new(config: &JankConfig) -> Self {
        Self {
            frozen_threshold_nanos: config.frozen_threshold_nanos,
            slow_grace_hz: config.slow_grace_hz,
        }
    }

    pub fn frozen_threshold_nanos(&self) -> u64 {
        self.frozen_threshold_nanos
    }

    /// Budget a frame must exceed to count as slow.
    ///
    /// Uses `1e9 / (rate - grace)` so frames that only overshoot the exact
    /// budget by rounding noise stay on time. Rates at or below the grace
    /// margin fall back to the exact budget.
    pub fn slow_budget_nanos(&self, refresh_rate_hz: f32) -> u64 {
        let rate = refresh_rate_hz as f64 - self.slow_grace_hz;
        if rate > 0.0 {
            (NANOS_PER_SECOND as f64 / rate) as u64
        } else {
            expected_duration_nanos(refresh_rate_hz)
        }
    }

    /// Classify a frame whose timestamps have already been normalised.
    pub fn classify(&self, start_nanos: u64, end_nanos: u64, raw: &RawFrame) -> FrameEvent {
        let expected = expected_duration_nanos(raw.refresh_rate_hz);
        let frozen = is_frozen(raw.duration_nanos, self.frozen_threshold_nanos);
        let slow =
            frozen || is_slow(raw.duration_nanos, self.slow_budget_nanos(raw.refresh_rate_hz));
        FrameEvent::new(start_nanos, end_nanos, raw.duration_nanos, expected, slow, frozen)
    }

    /// Re-derive flags for a duration clipped out of a larger frame.
    ///
    /// Compares against the frame's exact budget. The frozen threshold does
    /// not depend on the budget, and frozen always implies slow.
    pub fn classify_clipped(&self, clipped_nanos: u64, expected_nanos: u64) -> (bool, bool) {
        let frozen = is_frozen(clipped_nanos, self.frozen_threshold_nanos);
        let slow = frozen || is_slow(clipped_nanos, expected_nanos);
        (slow, frozen)
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(&JankConfig::default())
    }
}
