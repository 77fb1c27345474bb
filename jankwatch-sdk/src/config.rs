//! Tunables for classification, buffering and interpolation.

use std::time::Duration;

use jankwatch_types::{DEFAULT_FRAME_DURATION_NANOS, FROZEN_FRAME_THRESHOLD_NANOS};

/// Default history capacity: 30s of frames at 120Hz.
pub const DEFAULT_MAX_EVENTS: usize = 3600;

/// Refresh-rate grace margin used for the slow threshold.
///
/// Most frames take a hair longer than the exact budget; computing the
/// slow threshold as `1e9 / (rate - grace)` keeps those from being
/// classified as slow.
pub const DEFAULT_SLOW_GRACE_HZ: f64 = 1.0;

/// Configuration shared by a bus and the observers registered with it.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct JankConfig {
    /// Maximum events a single span buffers before dropping new ones.
    pub max_events: usize,

    /// Frames longer than this are frozen.
    pub frozen_threshold_nanos: u64,

    /// Frame budget assumed before any frame has been seen.
    pub default_frame_duration_nanos: u64,

    /// Grace margin subtracted from the refresh rate for the slow threshold.
    pub slow_grace_hz: f64,
}

impl Default for JankConfig {
    fn default() -> Self {
        Self {
            max_events: DEFAULT_MAX_EVENTS,
            frozen_threshold_nanos: FROZEN_FRAME_THRESHOLD_NANOS,
            default_frame_duration_nanos: DEFAULT_FRAME_DURATION_NANOS,
            slow_grace_hz: DEFAULT_SLOW_GRACE_HZ,
        }
    }
}

impl JankConfig {
    /// Create a builder for configuring collection.
    pub fn builder() -> JankConfigBuilder {
        JankConfigBuilder::new()
    }
}

/// Builder for [`JankConfig`].
#[derive(Debug, Default)]
pub struct JankConfigBuilder {
    max_events: Option<usize>,
    frozen_threshold: Option<Duration>,
    default_frame_duration: Option<Duration>,
    slow_grace_hz: Option<f64>,
}

impl JankConfigBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the per-span history capacity.
    ///
    /// Defaults to 3600 events.
    pub fn max_events(mut self, max_events: usize) -> Self {
        self.max_events = Some(max_events);
        self
    }

    /// Set the frozen frame threshold.
    ///
    /// Defaults to 700ms.
    pub fn frozen_threshold(mut self, threshold: Duration) -> Self {
        self.frozen_threshold = Some(threshold);
        self
    }

    /// Set the frame budget assumed before any frame arrives.
    ///
    /// Defaults to one 60Hz frame.
    pub fn default_frame_duration(mut self, duration: Duration) -> Self {
        self.default_frame_duration = Some(duration);
        self
    }

    /// Set the refresh-rate grace margin for the slow threshold.
    pub fn slow_grace_hz(mut self, grace: f64) -> Self {
        self.slow_grace_hz = Some(grace);
        self
    }

    /// Build the configuration.
    ///
    /// A zero default frame duration would make interpolation divide by
    /// zero, so it falls back to the 60Hz budget.
    pub fn build(self) -> JankConfig {
        let defaults = JankConfig::default();
        let default_frame_duration_nanos = self
            .default_frame_duration
            .map(|d| d.as_nanos() as u64)
            .filter(|nanos| *nanos > 0)
            .unwrap_or(defaults.default_frame_duration_nanos);

        JankConfig {
            max_events: self.max_events.unwrap_or(defaults.max_events),
            frozen_threshold_nanos: self
                .frozen_threshold
                .map(|d| d.as_nanos() as u64)
                .unwrap_or(defaults.frozen_threshold_nanos),
            default_frame_duration_nanos,
            slow_grace_hz: self
                .slow_grace_hz
                .filter(|g| g.is_finite() && *g >= 0.0)
                .unwrap_or(defaults.slow_grace_hz),
        }
    }
}
