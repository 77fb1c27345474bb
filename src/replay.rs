//! Drive the SDK with a recorded trace.
//!
//! Records are applied in order against a [`ManualClock`]: span boundaries
//! and vsyncs move the clock to their `at_ns`, frames to their end time.
//! Frames reach the bus through a [`ManualSource`], so they only count
//! while a surface is shown and at least one span is open, exactly as
//! with a live platform source.

use std::collections::BTreeMap;
use std::sync::Arc;

use jankwatch_sdk::{
    FrameEventBus, JankConfig, ManualClock, ManualSource, SpanObserver, SurfaceId,
    SurfaceLifecycle, WindowMetrics,
};
use tracing::{debug, warn};

use crate::trace::TraceRecord;

/// Outcome of one named span.
#[derive(Debug, Clone, PartialEq)]
pub struct SpanResult {
    pub name: String,
    pub start_nanos: u64,
    pub finish_nanos: u64,
    /// `None` when no metrics were available for the span.
    pub metrics: Option<WindowMetrics>,
}

/// Counters over the whole replay.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayStats {
    pub records: usize,
    pub frames: usize,
    /// Frames accepted by the bus (attached surface, well-formed).
    pub frames_delivered: usize,
    /// Spans still open at the end of the trace, closed at the last timestamp.
    pub unterminated_spans: usize,
}

/// A replay session.
pub struct Replay {
    source: Arc<ManualSource>,
    clock: Arc<ManualClock>,
    bus: FrameEventBus,
    open: BTreeMap<String, SpanObserver>,
    results: Vec<SpanResult>,
    stats: ReplayStats,
}

impl Replay {
    pub fn new(config: JankConfig) -> Self {
        let source = ManualSource::new();
        let clock = Arc::new(ManualClock::new(0));
        let bus = FrameEventBus::builder(source.clone())
            .config(config)
            .clock(clock.clone())
            .build();
        Self {
            source,
            clock,
            bus,
            open: BTreeMap::new(),
            results: Vec::new(),
            stats: ReplayStats::default(),
        }
    }

    /// Replay a whole trace and close any spans left open.
    pub fn run(config: JankConfig, records: &[TraceRecord]) -> (Vec<SpanResult>, ReplayStats) {
        let mut replay = Self::new(config);
        for record in records {
            replay.apply(record);
        }
        replay.finish()
    }

    pub fn apply(&mut self, record: &TraceRecord) {
        self.stats.records += 1;
        self.clock.set(record.at_nanos());

        match record {
            TraceRecord::Frame { .. } => {
                self.stats.frames += 1;
                if let Some(frame) = record.raw_frame() {
                    self.stats.frames_delivered += self.source.emit(frame);
                }
            }
            TraceRecord::SurfaceShown { surface } => {
                self.bus.surface_available(SurfaceId::new(*surface));
            }
            TraceRecord::SurfaceHidden { surface } => {
                self.bus.surface_unavailable(SurfaceId::new(*surface));
            }
            TraceRecord::SpanStart { name, .. } => {
                let bus = &self.bus;
                self.open
                    .entry(name.clone())
                    .or_insert_with(|| bus.span_observer())
                    .start();
                debug!(span = %name, "span started");
            }
            TraceRecord::SpanStop { name, .. } => match self.open.remove(name) {
                Some(span) => self.close(name.clone(), span),
                None => warn!(span = %name, "stop for a span that is not open"),
            },
            TraceRecord::Vsync { at_ns } => {
                self.source.set_last_known_start(Some(*at_ns));
            }
        }
    }

    /// Close spans still open and return everything collected.
    pub fn finish(mut self) -> (Vec<SpanResult>, ReplayStats) {
        let open = std::mem::take(&mut self.open);
        for (name, span) in open {
            warn!(span = %name, "span never stopped; closing at end of trace");
            self.stats.unterminated_spans += 1;
            self.close(name, span);
        }
        (self.results, self.stats)
    }

    fn close(&mut self, name: String, span: SpanObserver) {
        let metrics = span.stop();
        if metrics.is_none() {
            warn!(span = %name, "no metrics available");
        }
        self.results.push(SpanResult {
            name,
            start_nanos: span.start_timestamp().map_or(0, |t| t.as_nanos()),
            finish_nanos: span.finish_timestamp().map_or(0, |t| t.as_nanos()),
            metrics,
        });
    }
}
