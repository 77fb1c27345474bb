//! # jankwatch-sdk
//!
//! Attribute slow and frozen frames to caller-chosen spans.
//!
//! A platform [`EventSource`] reports every rendered frame to a
//! [`FrameEventBus`], which classifies it and broadcasts it to every
//! registered observer. A [`SpanObserver`] buffers the jank frames it sees
//! between `start` and `stop`, then clips them to its window and fills in
//! frames the platform never reported.
//!
//! ## Quick Start
//!
//! ```rust
//! use jankwatch_sdk::{FrameEventBus, ManualSource, RawFrame, SurfaceId, SurfaceLifecycle};
//!
//! // Any EventSource works; ManualSource is driven by hand
//! let source = ManualSource::new();
//! let bus = FrameEventBus::new(source.clone());
//!
//! // Tell the bus which surface is on screen
//! bus.surface_available(SurfaceId::new(1));
//!
//! let span = bus.span_observer();
//! span.start();
//!
//! // The source reports a 40ms frame on a 60Hz display
//! source.emit(RawFrame::new(1_000, 40_001_000, 40_000_000, 60.0));
//!
//! // No metrics is a valid outcome, e.g. when the surface cannot render
//! if let Some(metrics) = span.stop() {
//!     println!("{} slow, {} frozen", metrics.slow_frame_count, metrics.frozen_frame_count);
//! }
//! ```
//!
//! ## Features
//!
//! - **Broadcast delivery**: every observer sees every frame; registration
//!   changes never block delivery
//! - **Bounded memory**: each span buffers at most `max_events` jank frames
//! - **Exact clipping**: frames straddling a span boundary count only their
//!   overlap
//! - **Interpolation**: span time with no frames still counts towards the
//!   total frame count
//! - **No surprises**: misuse and missing instrumentation yield an absent
//!   result, never a panic

mod aggregator;
mod buffer;
mod bus;
mod classify;
mod clock;
mod config;
mod error;
mod observer;
mod source;

pub use aggregator::{SpanWindow, WindowAggregator};
pub use buffer::{FrameHistoryBuffer, RangeFrom};
pub use bus::{FrameEventBus, FrameEventBusBuilder, FrameObserver, ObserverId};
pub use classify::{expected_duration_nanos, is_frozen, is_slow, Classifier, RawFrame};
pub use clock::{Clock, ClockAnchor, ManualClock, SystemClock};
pub use config::{JankConfig, JankConfigBuilder, DEFAULT_MAX_EVENTS, DEFAULT_SLOW_GRACE_HZ};
pub use error::{JankError, SourceError};
pub use observer::SpanObserver;
pub use source::{EventSource, FrameSink, ManualSource, SourceCall, SurfaceId, SurfaceLifecycle};

// Re-export types for convenience
pub use jankwatch_types::{
    FrameEvent, FrameRecord, Precision, Timestamp, WindowMetrics, DEFAULT_FRAME_DURATION_NANOS,
    FROZEN_FRAME_THRESHOLD_NANOS,
};
