//! Collaborator interfaces: the platform event source and host lifecycle.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::bus::BusShared;
use crate::classify::RawFrame;
use crate::error::SourceError;

/// Identifies a trackable surface (window, view, layer).
///
/// The bus never owns the surface; the handle is only meaningful between
/// `surface_available` and `surface_unavailable` for that id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct SurfaceId(u64);

impl SurfaceId {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    pub const fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SurfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "surface#{}", self.0)
    }
}

/// A platform that produces per-frame render notifications.
///
/// The bus calls [`attach`](Self::attach) when its observer set becomes
/// non-empty (or a surface appears while observers exist) and
/// [`detach`](Self::detach) when it empties. Between the two the source
/// must call [`FrameSink::deliver`] exactly once per frame, with
/// non-decreasing end times, from a single delivery context.
pub trait EventSource: Send + Sync + fmt::Debug {
    /// Start delivering frames rendered on `surface` to `sink`.
    fn attach(&self, surface: SurfaceId, sink: FrameSink) -> Result<(), SourceError>;

    /// Stop delivering frames for `surface`.
    fn detach(&self, surface: SurfaceId) -> Result<(), SourceError>;

    /// Start time of the most recently scheduled frame, if the platform
    /// exposes it. Used to extrapolate work still in flight at span end.
    fn last_known_start_nanos(&self) -> Option<u64> {
        None
    }
}

/// Host notifications about the current trackable surface.
pub trait SurfaceLifecycle {
    /// `surface` is shown and becomes the current surface.
    fn surface_available(&self, surface: SurfaceId);

    /// `surface` is hidden or destroyed.
    fn surface_unavailable(&self, surface: SurfaceId);
}

/// Delivery endpoint handed to an [`EventSource`] on attach.
///
/// Holds only a weak reference to the bus: a source that outlives the bus
/// keeps a sink whose deliveries are ignored.
#[derive(Clone)]
pub struct FrameSink {
    pub(crate) bus: Weak<BusShared>,
}

impl FrameSink {
    /// Hand one frame notification to the bus.
    ///
    /// Returns `false` if the bus is gone or the frame was dropped as
    /// malformed or duplicate.
    pub fn deliver(&self, frame: RawFrame) -> bool {
        match self.bus.upgrade() {
            Some(bus) => bus.on_frame(frame),
            None => false,
        }
    }
}

impl fmt::Debug for FrameSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameSink")
            .field("connected", &(self.bus.strong_count() > 0))
            .finish()
    }
}

/// A call made by the bus on a [`ManualSource`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceCall {
    Attach(SurfaceId),
    Detach(SurfaceId),
}

/// An [`EventSource`] driven by the caller.
///
/// Frames pushed with [`emit`](Self::emit) go to every attached surface's
/// sink. Records the attach/detach calls it receives, and can be told to
/// refuse attachment to simulate a surface that cannot render.
#[derive(Debug, Default)]
pub struct ManualSource {
    sinks: Mutex<BTreeMap<SurfaceId, FrameSink>>,
    calls: Mutex<Vec<SourceCall>>,
    last_start: Mutex<Option<u64>>,
    fail_attach: AtomicBool,
}

impl ManualSource {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make subsequent `attach` calls fail.
    pub fn fail_attach(&self, fail: bool) {
        self.fail_attach.store(fail, Ordering::SeqCst);
    }

    /// Set the value reported by `last_known_start_nanos`.
    pub fn set_last_known_start(&self, nanos: Option<u64>) {
        *self.last_start.lock() = nanos;
    }

    /// Push a frame to every attached sink. Returns how many accepted it.
    pub fn emit(&self, frame: RawFrame) -> usize {
        let sinks: Vec<FrameSink> = self.sinks.lock().values().cloned().collect();
        sinks.iter().filter(|sink| sink.deliver(frame)).count()
    }

    pub fn attached(&self) -> Vec<SurfaceId> {
        self.sinks.lock().keys().copied().collect()
    }

    pub fn is_attached(&self) -> bool {
        !self.sinks.lock().is_empty()
    }

    pub fn calls(&self) -> Vec<SourceCall> {
        self.calls.lock().clone()
    }
}

impl EventSource for ManualSource {
    fn attach(&self, surface: SurfaceId, sink: FrameSink) -> Result<(), SourceError> {
        self.calls.lock().push(SourceCall::Attach(surface));
        if self.fail_attach.load(Ordering::SeqCst) {
            return Err(SourceError::NotRenderCapable(surface.to_string()));
        }
        self.sinks.lock().insert(surface, sink);
        Ok(())
    }

    fn detach(&self, surface: SurfaceId) -> Result<(), SourceError> {
        self.calls.lock().push(SourceCall::Detach(surface));
        self.sinks.lock().remove(&surface);
        Ok(())
    }

    fn last_known_start_nanos(&self) -> Option<u64> {
        *self.last_start.lock()
    }
}
