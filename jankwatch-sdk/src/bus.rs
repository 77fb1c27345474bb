//! The frame event bus: classification and fan-out to registered observers.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;
use jankwatch_types::FrameEvent;
use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::classify::{Classifier, RawFrame};
use crate::clock::{Clock, SystemClock};
use crate::config::JankConfig;
use crate::error::JankError;
use crate::observer::SpanObserver;
use crate::source::{EventSource, FrameSink, SurfaceId, SurfaceLifecycle};

/// Receives every classified frame while registered with a bus.
///
/// Called on the source's delivery context; implementations must be quick
/// and must not call back into the bus's registration methods.
pub trait FrameObserver: Send + Sync {
    fn on_frame(&self, event: &FrameEvent);
}

/// Registration handle returned by [`FrameEventBus::register_observer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObserverId(u64);

impl fmt::Display for ObserverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "observer#{}", self.0)
    }
}

type Registry = Vec<(ObserverId, Arc<dyn FrameObserver>)>;

/// Surface bookkeeping, guarded by one lock that also serializes
/// registration changes.
#[derive(Debug, Default)]
struct Tracking {
    current: Option<SurfaceId>,
    attached: BTreeSet<SurfaceId>,
}

/// Timestamps of the last accepted frame, used to normalise the next one.
#[derive(Debug, Default)]
struct LastFrame {
    start_nanos: Option<u64>,
    end_nanos: u64,
}

pub(crate) struct BusShared {
    config: JankConfig,
    classifier: Classifier,
    source: Arc<dyn EventSource>,
    clock: Arc<dyn Clock>,
    /// Copy-on-write: delivery loads a snapshot without locking.
    observers: ArcSwap<Registry>,
    tracking: Mutex<Tracking>,
    last_frame: Mutex<LastFrame>,
    next_id: AtomicU64,
    unavailable_logged: AtomicBool,
}

impl BusShared {
    /// Validate, normalise, classify and broadcast one frame.
    pub(crate) fn on_frame(&self, raw: RawFrame) -> bool {
        if let Err(err) = raw.validate() {
            debug!(?raw, %err, "dropping frame");
            return false;
        }

        let (start, end) = {
            let mut last = self.last_frame.lock();
            // A frame cannot start before the previous one ended
            let start = raw.start_nanos.max(last.end_nanos);
            if last.start_nanos == Some(start) {
                trace!(start, "dropping duplicate frame");
                return false;
            }
            let end = start + (raw.end_nanos - raw.start_nanos);
            last.start_nanos = Some(start);
            last.end_nanos = end;
            (start, end)
        };

        let event = self.classifier.classify(start, end, &raw);
        if event.is_jank() {
            trace!(
                start,
                duration = event.duration_nanos(),
                frozen = event.is_frozen(),
                "jank frame"
            );
        }

        let observers = self.observers.load();
        for (_, observer) in observers.iter() {
            observer.on_frame(&event);
        }
        true
    }

    fn sink(self: &Arc<Self>) -> FrameSink {
        FrameSink {
            bus: Arc::downgrade(self),
        }
    }

    fn report_unavailable(&self, err: &JankError) {
        if !self.unavailable_logged.swap(true, Ordering::Relaxed) {
            warn!(%err, "frame instrumentation unavailable; spans will report no metrics");
        } else {
            debug!(%err, "frame instrumentation still unavailable");
        }
    }
}

/// Fans classified frames out to every registered observer.
///
/// The bus owns no frame history; each observer buffers what it needs.
/// It attaches to the event source when the first observer registers
/// and detaches when the last one leaves.
///
/// # Example
///
/// ```rust
/// use jankwatch_sdk::{FrameEventBus, ManualSource, RawFrame, SurfaceId, SurfaceLifecycle};
///
/// let source = ManualSource::new();
/// let bus = FrameEventBus::new(source.clone());
/// bus.surface_available(SurfaceId::new(1));
///
/// let span = bus.span_observer();
/// span.start();
/// source.emit(RawFrame::new(1_000, 41_001_000, 41_000_000, 60.0));
///
/// if let Some(metrics) = span.stop() {
///     println!("slow frames: {}", metrics.slow_frame_count);
/// }
/// ```
#[derive(Clone)]
pub struct FrameEventBus {
    shared: Arc<BusShared>,
}

impl FrameEventBus {
    /// Create a bus over `source` with default configuration and the
    /// system clock.
    pub fn new(source: Arc<dyn EventSource>) -> Self {
        Self::builder(source).build()
    }

    /// Create a builder for configuring the bus.
    pub fn builder(source: Arc<dyn EventSource>) -> FrameEventBusBuilder {
        FrameEventBusBuilder::new(source)
    }

    pub fn config(&self) -> &JankConfig {
        &self.shared.config
    }

    pub fn classifier(&self) -> &Classifier {
        &self.shared.classifier
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.shared.clock
    }

    /// A new span observer bound to this bus.
    pub fn span_observer(&self) -> SpanObserver {
        SpanObserver::new(self.clone())
    }

    /// Register an observer for every classified frame.
    ///
    /// The first registration attaches the source to the current surface
    /// (if one is known). If that attachment fails the observer is not
    /// registered and `InstrumentationUnavailable` is returned.
    pub fn register_observer(
        &self,
        observer: Arc<dyn FrameObserver>,
    ) -> Result<ObserverId, JankError> {
        let mut tracking = self.shared.tracking.lock();
        let id = ObserverId(self.shared.next_id.fetch_add(1, Ordering::Relaxed));

        if self.shared.observers.load().is_empty() {
            if let Some(surface) = tracking.current {
                if !tracking.attached.contains(&surface) {
                    if let Err(err) = self.shared.source.attach(surface, self.shared.sink()) {
                        let err = JankError::unavailable(surface, &err);
                        self.shared.report_unavailable(&err);
                        return Err(err);
                    }
                    debug!(%surface, "attached frame source");
                    tracking.attached.insert(surface);
                }
            }
        }

        self.shared.observers.rcu(|current| {
            let mut next = Registry::clone(current);
            next.push((id, observer.clone()));
            next
        });
        debug!(%id, "observer registered");
        Ok(id)
    }

    /// Remove an observer. Unknown ids are ignored and return `false`.
    ///
    /// Removing the last observer detaches the source from every surface.
    pub fn unregister_observer(&self, id: ObserverId) -> bool {
        let mut tracking = self.shared.tracking.lock();

        let before = self.shared.observers.load_full();
        if !before.iter().any(|(existing, _)| *existing == id) {
            return false;
        }
        let remaining: Registry = before
            .iter()
            .filter(|(existing, _)| *existing != id)
            .cloned()
            .collect();
        let now_empty = remaining.is_empty();
        self.shared.observers.store(Arc::new(remaining));
        debug!(%id, "observer unregistered");

        if now_empty {
            let surfaces: Vec<SurfaceId> = tracking.attached.iter().copied().collect();
            for surface in surfaces {
                self.detach(&mut tracking, surface);
            }
        }
        true
    }

    pub fn observer_count(&self) -> usize {
        self.shared.observers.load().len()
    }

    /// True while the source is attached to at least one surface.
    pub fn is_engaged(&self) -> bool {
        !self.shared.tracking.lock().attached.is_empty()
    }

    pub fn current_surface(&self) -> Option<SurfaceId> {
        self.shared.tracking.lock().current
    }

    /// Start time of the most recently scheduled frame, `None` if unknown.
    pub fn last_known_event_start_nanos(&self) -> Option<u64> {
        self.shared.source.last_known_start_nanos()
    }

    /// A delivery endpoint for this bus, as handed to sources on attach.
    pub fn sink(&self) -> FrameSink {
        self.shared.sink()
    }

    /// Deliver a frame directly, bypassing the source.
    pub fn deliver(&self, frame: RawFrame) -> bool {
        self.shared.on_frame(frame)
    }

    fn detach(&self, tracking: &mut Tracking, surface: SurfaceId) {
        if !tracking.attached.remove(&surface) {
            return;
        }
        match self.shared.source.detach(surface) {
            Ok(()) => debug!(%surface, "detached frame source"),
            Err(err) => debug!(%surface, %err, "failed to detach frame source"),
        }
    }
}

impl SurfaceLifecycle for FrameEventBus {
    fn surface_available(&self, surface: SurfaceId) {
        let mut tracking = self.shared.tracking.lock();
        if tracking.current == Some(surface) {
            return;
        }
        tracking.current = Some(surface);

        if self.shared.observers.load().is_empty() || tracking.attached.contains(&surface) {
            return;
        }
        match self.shared.source.attach(surface, self.shared.sink()) {
            Ok(()) => {
                debug!(%surface, "attached frame source");
                tracking.attached.insert(surface);
            }
            Err(err) => self
                .shared
                .report_unavailable(&JankError::unavailable(surface, &err)),
        }
    }

    fn surface_unavailable(&self, surface: SurfaceId) {
        let mut tracking = self.shared.tracking.lock();
        self.detach(&mut tracking, surface);
        if tracking.current == Some(surface) {
            tracking.current = None;
        }
    }
}

impl fmt::Debug for FrameEventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameEventBus")
            .field("config", &self.shared.config)
            .field("observers", &self.observer_count())
            .finish()
    }
}

/// Builder for [`FrameEventBus`].
#[derive(Debug)]
pub struct FrameEventBusBuilder {
    source: Arc<dyn EventSource>,
    config: Option<JankConfig>,
    clock: Option<Arc<dyn Clock>>,
}

impl FrameEventBusBuilder {
    pub fn new(source: Arc<dyn EventSource>) -> Self {
        Self {
            source,
            config: None,
            clock: None,
        }
    }

    /// Set the configuration. Defaults to [`JankConfig::default`].
    pub fn config(mut self, config: JankConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the clock spans read their boundaries from.
    ///
    /// Must share its timeline with the source's frame timestamps.
    /// Defaults to [`SystemClock`].
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn build(self) -> FrameEventBus {
        let config = self.config.unwrap_or_default();
        FrameEventBus {
            shared: Arc::new(BusShared {
                classifier: Classifier::new(&config),
                config,
                source: self.source,
                clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock::new())),
                observers: ArcSwap::from_pointee(Vec::new()),
                tracking: Mutex::new(Tracking::default()),
                last_frame: Mutex::new(LastFrame::default()),
                next_id: AtomicU64::new(0),
                unavailable_logged: AtomicBool::new(false),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{ManualSource, SourceCall};

    const MS: u64 = 1_000_000;

    #[derive(Default)]
    struct Collecting {
        events: Mutex<Vec<FrameEvent>>,
    }

    impl FrameObserver for Collecting {
        fn on_frame(&self, event: &FrameEvent) {
            self.events.lock().push(*event);
        }
    }

    impl Collecting {
        fn count(&self) -> usize {
            self.events.lock().len()
        }
    }

    fn frame(start_ms: u64, duration_ms: u64) -> RawFrame {
        RawFrame::new(
            start_ms * MS,
            (start_ms + duration_ms) * MS,
            duration_ms * MS,
            60.0,
        )
    }

    fn bus_with_surface() -> (Arc<ManualSource>, FrameEventBus) {
        let source = ManualSource::new();
        let bus = FrameEventBus::new(source.clone());
        bus.surface_available(SurfaceId::new(1));
        (source, bus)
    }

    #[test]
    fn test_first_registration_attaches_last_detaches() {
        let (source, bus) = bus_with_surface();
        assert!(!source.is_attached(), "no observers yet");

        let a = bus.register_observer(Arc::new(Collecting::default())).unwrap();
        let b = bus.register_observer(Arc::new(Collecting::default())).unwrap();
        assert!(bus.is_engaged());
        assert_eq!(source.calls(), vec![SourceCall::Attach(SurfaceId::new(1))]);

        assert!(bus.unregister_observer(a));
        assert!(bus.is_engaged(), "one observer remains");

        assert!(bus.unregister_observer(b));
        assert!(!bus.is_engaged());
        assert_eq!(
            source.calls(),
            vec![
                SourceCall::Attach(SurfaceId::new(1)),
                SourceCall::Detach(SurfaceId::new(1))
            ]
        );
    }

    #[test]
    fn test_every_observer_receives_every_frame() {
        let (source, bus) = bus_with_surface();
        let a = Arc::new(Collecting::default());
        let b = Arc::new(Collecting::default());
        bus.register_observer(a.clone()).unwrap();
        bus.register_observer(b.clone()).unwrap();

        source.emit(frame(0, 10));
        source.emit(frame(20, 40));

        assert_eq!(a.count(), 2);
        assert_eq!(b.count(), 2);
    }

    #[test]
    fn test_unregistered_observer_stops_receiving() {
        let (source, bus) = bus_with_surface();
        let a = Arc::new(Collecting::default());
        let b = Arc::new(Collecting::default());
        let id_a = bus.register_observer(a.clone()).unwrap();
        bus.register_observer(b.clone()).unwrap();

        source.emit(frame(0, 10));
        bus.unregister_observer(id_a);
        source.emit(frame(20, 10));

        assert_eq!(a.count(), 1);
        assert_eq!(b.count(), 2);
    }

    #[test]
    fn test_unknown_id_unregisters_quietly() {
        let (_source, bus) = bus_with_surface();
        let id = bus.register_observer(Arc::new(Collecting::default())).unwrap();
        assert!(bus.unregister_observer(id));
        assert!(!bus.unregister_observer(id));
    }

    #[test]
    fn test_classification_is_applied_before_fan_out() {
        let (source, bus) = bus_with_surface();
        let observer = Arc::new(Collecting::default());
        bus.register_observer(observer.clone()).unwrap();

        source.emit(frame(0, 10));
        source.emit(frame(100, 40));
        source.emit(frame(200, 800));

        let events = observer.events.lock();
        assert!(!events[0].is_slow());
        assert!(events[1].is_slow() && !events[1].is_frozen());
        assert!(events[2].is_frozen());
        assert_eq!(events[1].expected_duration_nanos(), 16_666_667);
        assert_eq!(events[1].delay_nanos(), 40 * MS - 16_666_667);
    }

    #[test]
    fn test_malformed_frames_are_dropped() {
        let (source, bus) = bus_with_surface();
        let observer = Arc::new(Collecting::default());
        bus.register_observer(observer.clone()).unwrap();

        assert_eq!(source.emit(RawFrame::new(100, 50, 10, 60.0)), 0);
        assert_eq!(source.emit(RawFrame::new(0, 10, 10, 0.0)), 0);
        assert_eq!(observer.count(), 0);

        assert_eq!(source.emit(frame(0, 10)), 1);
        assert_eq!(observer.count(), 1);
    }

    #[test]
    fn test_overlapping_frame_is_pushed_after_previous_end() {
        let (source, bus) = bus_with_surface();
        let observer = Arc::new(Collecting::default());
        bus.register_observer(observer.clone()).unwrap();

        source.emit(frame(0, 30));
        source.emit(frame(20, 10));

        let events = observer.events.lock();
        assert_eq!(events[1].start_nanos(), 30 * MS);
        assert_eq!(events[1].end_nanos(), 40 * MS);
    }

    #[test]
    fn test_duplicate_start_is_dropped() {
        let (source, bus) = bus_with_surface();
        let observer = Arc::new(Collecting::default());
        bus.register_observer(observer.clone()).unwrap();

        source.emit(RawFrame::new(10 * MS, 10 * MS, 0, 60.0));
        // Normalises to the same start as the previous frame
        source.emit(RawFrame::new(5 * MS, 8 * MS, 3 * MS, 60.0));

        assert_eq!(observer.count(), 1);
    }

    #[test]
    fn test_attach_failure_rejects_registration() {
        let (source, bus) = bus_with_surface();
        source.fail_attach(true);

        let err = bus
            .register_observer(Arc::new(Collecting::default()))
            .unwrap_err();
        assert!(matches!(err, JankError::InstrumentationUnavailable { .. }));
        assert_eq!(bus.observer_count(), 0);

        // The next registration retries
        source.fail_attach(false);
        assert!(bus.register_observer(Arc::new(Collecting::default())).is_ok());
        assert!(bus.is_engaged());
    }

    #[test]
    fn test_unavailable_warning_is_latched() {
        let (source, bus) = bus_with_surface();
        source.fail_attach(true);
        assert!(!bus.shared.unavailable_logged.load(Ordering::Relaxed));

        assert!(bus.register_observer(Arc::new(Collecting::default())).is_err());
        assert!(bus.shared.unavailable_logged.load(Ordering::Relaxed));

        // Second failure goes through the latched path and leaves it set
        assert!(bus.register_observer(Arc::new(Collecting::default())).is_err());
        assert!(bus.shared.unavailable_logged.load(Ordering::Relaxed));
        assert_eq!(
            source.calls(),
            vec![
                SourceCall::Attach(SurfaceId::new(1)),
                SourceCall::Attach(SurfaceId::new(1))
            ]
        );

        // Each bus has its own latch
        let other = FrameEventBus::new(source.clone());
        assert!(!other.shared.unavailable_logged.load(Ordering::Relaxed));
    }

    #[test]
    fn test_registration_without_surface_attaches_later() {
        let source = ManualSource::new();
        let bus = FrameEventBus::new(source.clone());
        let observer = Arc::new(Collecting::default());
        bus.register_observer(observer.clone()).unwrap();
        assert!(!bus.is_engaged());

        bus.surface_available(SurfaceId::new(9));
        assert!(bus.is_engaged());
        source.emit(frame(0, 40));
        assert_eq!(observer.count(), 1);
    }

    #[test]
    fn test_surface_switch_keeps_observers() {
        let (source, bus) = bus_with_surface();
        let observer = Arc::new(Collecting::default());
        bus.register_observer(observer.clone()).unwrap();
        source.emit(frame(0, 40));

        bus.surface_unavailable(SurfaceId::new(1));
        assert!(!bus.is_engaged());
        assert_eq!(bus.current_surface(), None);

        bus.surface_available(SurfaceId::new(2));
        source.emit(frame(100, 40));

        assert_eq!(observer.count(), 2);
        assert_eq!(source.attached(), vec![SurfaceId::new(2)]);
    }

    #[test]
    fn test_hiding_unknown_surface_is_harmless() {
        let (source, bus) = bus_with_surface();
        bus.surface_unavailable(SurfaceId::new(5));
        assert_eq!(bus.current_surface(), Some(SurfaceId::new(1)));
        assert!(source.calls().is_empty());
    }

    #[test]
    fn test_last_known_start_comes_from_source() {
        let (source, bus) = bus_with_surface();
        assert_eq!(bus.last_known_event_start_nanos(), None);
        source.set_last_known_start(Some(123));
        assert_eq!(bus.last_known_event_start_nanos(), Some(123));
    }

    #[test]
    fn test_concurrent_registration_during_delivery() {
        use std::thread;

        let (source, bus) = bus_with_surface();
        let anchor = Arc::new(Collecting::default());
        bus.register_observer(anchor.clone()).unwrap();

        let producer = {
            let source = source.clone();
            thread::spawn(move || {
                for i in 0..500u64 {
                    source.emit(frame(i * 50, 20));
                }
            })
        };

        let churn = {
            let bus = bus.clone();
            thread::spawn(move || {
                for _ in 0..200 {
                    let id = bus
                        .register_observer(Arc::new(Collecting::default()))
                        .unwrap();
                    bus.unregister_observer(id);
                }
            })
        };

        producer.join().unwrap();
        churn.join().unwrap();

        assert_eq!(anchor.count(), 500);
        assert_eq!(bus.observer_count(), 1);
    }
}
