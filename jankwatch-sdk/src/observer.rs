//! Span observers: caller-facing start/stop recording sessions.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use jankwatch_types::{FrameEvent, Timestamp, WindowMetrics};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, trace, warn};

use crate::aggregator::{SpanWindow, WindowAggregator};
use crate::buffer::FrameHistoryBuffer;
use crate::bus::{FrameEventBus, FrameObserver, ObserverId};
use crate::error::JankError;

/// The per-span frame sink registered with the bus.
struct SpanRecorder {
    buffer: FrameHistoryBuffer,
    /// Held for reading across each delivery; `stop` takes it for writing
    /// so no frame lands after the span has closed.
    recording: RwLock<bool>,
    last_known_frame_duration_nanos: AtomicU64,
}

impl FrameObserver for SpanRecorder {
    fn on_frame(&self, event: &FrameEvent) {
        let recording = self.recording.read();
        if !*recording || self.buffer.is_full() {
            return;
        }
        self.last_known_frame_duration_nanos
            .store(event.expected_duration_nanos(), Ordering::Relaxed);
        if !event.is_jank() {
            return;
        }
        if let Err(err) = self.buffer.append(*event) {
            trace!(%err, "dropping frame");
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Recording,
}

impl Phase {
    fn name(self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::Recording => "recording",
        }
    }
}

#[derive(Debug)]
struct SpanState {
    phase: Phase,
    registration: Option<ObserverId>,
    start_nanos: Option<u64>,
    finish_nanos: Option<u64>,
}

/// One caller-visible recording session.
///
/// `start` begins buffering slow and frozen frames from the bus; `stop`
/// closes the span and returns its [`WindowMetrics`]. A stopped observer
/// can be started again, which discards the previous span's frames.
///
/// Misuse never panics or errors: a second `start` while recording is
/// ignored, and `stop` without a running span returns `None`. `stop` also
/// returns `None` when the bus could not attach instrumentation for the
/// span.
pub struct SpanObserver {
    bus: FrameEventBus,
    recorder: Arc<SpanRecorder>,
    state: Mutex<SpanState>,
}

impl SpanObserver {
    pub fn new(bus: FrameEventBus) -> Self {
        let config = bus.config();
        let recorder = SpanRecorder {
            buffer: FrameHistoryBuffer::new(config.max_events),
            recording: RwLock::new(false),
            last_known_frame_duration_nanos: AtomicU64::new(config.default_frame_duration_nanos),
        };
        Self {
            bus,
            recorder: Arc::new(recorder),
            state: Mutex::new(SpanState {
                phase: Phase::Idle,
                registration: None,
                start_nanos: None,
                finish_nanos: None,
            }),
        }
    }

    /// Begin recording. A no-op, with a warning, if already recording.
    pub fn start(&self) {
        let mut state = self.state.lock();
        if state.phase == Phase::Recording {
            let err = JankError::InvalidStateTransition {
                from: state.phase.name(),
                action: "start",
            };
            warn!(%err, "ignoring start");
            return;
        }

        self.recorder.buffer.clear();
        state.start_nanos = Some(self.bus.clock().now_nanos());
        state.finish_nanos = None;
        *self.recorder.recording.write() = true;

        state.registration = match self.bus.register_observer(self.recorder.clone()) {
            Ok(id) => Some(id),
            Err(err) => {
                // Already reported by the bus; the span will yield no metrics
                debug!(%err, "span started without instrumentation");
                *self.recorder.recording.write() = false;
                None
            }
        };
        state.phase = Phase::Recording;
    }

    /// Close the span and compute its metrics.
    ///
    /// Returns `None` if the span is not recording or had no
    /// instrumentation. Calling `stop` again returns `None`.
    pub fn stop(&self) -> Option<WindowMetrics> {
        let mut state = self.state.lock();
        if state.phase != Phase::Recording {
            let err = JankError::InvalidStateTransition {
                from: state.phase.name(),
                action: "stop",
            };
            debug!(%err, "ignoring stop");
            return None;
        }

        let anchor = self.bus.clock().anchor();
        let now = Timestamp::from_nanos(anchor.monotonic_nanos);
        let start = state.start_nanos.map_or(now, Timestamp::from_nanos);
        // A span never finishes before it started, whatever the clock did
        let finish_nanos = now.later_nanos(&start);
        state.finish_nanos = Some(finish_nanos);
        state.phase = Phase::Idle;
        *self.recorder.recording.write() = false;

        let id = state.registration.take()?;
        self.bus.unregister_observer(id);

        let window = SpanWindow {
            start_nanos: start.as_nanos(),
            finish_nanos,
            last_known_frame_duration_nanos: self
                .recorder
                .last_known_frame_duration_nanos
                .load(Ordering::Relaxed),
            last_known_event_start_nanos: self.bus.last_known_event_start_nanos(),
            anchor,
        };
        let metrics = WindowAggregator::new(*self.bus.classifier())
            .aggregate(&self.recorder.buffer, &window);
        debug!(
            total = metrics.total_frame_count,
            slow = metrics.slow_frame_count,
            frozen = metrics.frozen_frame_count,
            "span closed"
        );
        Some(metrics)
    }

    pub fn is_recording(&self) -> bool {
        self.state.lock().phase == Phase::Recording
    }

    /// When the current or last span started.
    pub fn start_timestamp(&self) -> Option<Timestamp> {
        self.state.lock().start_nanos.map(Timestamp::from_nanos)
    }

    /// When the last span finished; `None` while recording.
    pub fn finish_timestamp(&self) -> Option<Timestamp> {
        self.state.lock().finish_nanos.map(Timestamp::from_nanos)
    }

    /// Number of jank frames buffered for the current span.
    pub fn buffered_frames(&self) -> usize {
        self.recorder.buffer.len()
    }
}

impl Drop for SpanObserver {
    fn drop(&mut self) {
        if let Some(id) = self.state.get_mut().registration.take() {
            self.bus.unregister_observer(id);
        }
    }
}

impl fmt::Debug for SpanObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpanObserver")
            .field("state", &*self.state.lock())
            .field("buffered", &self.buffered_frames())
            .finish()
    }
}
