//! Bounded, end-time ordered frame history for a single span.

use std::collections::BTreeMap;
use std::ops::Bound;

use jankwatch_types::FrameEvent;
use parking_lot::RwLock;

use crate::error::JankError;

/// Storage key: end time first, insertion sequence to break ties.
type EventKey = (u64, u64);

#[derive(Debug, Default)]
struct BufferState {
    events: BTreeMap<EventKey, FrameEvent>,
    next_seq: u64,
}

/// Thread-safe ordered set of frame events, keyed by end time.
///
/// The producer side appends from the delivery thread while the span owner
/// reads at stop time. Once `capacity` events are stored, further appends
/// are dropped until the next [`clear`](Self::clear): a span left running
/// indefinitely keeps its earliest data and bounded memory rather than
/// evicting what it already has.
#[derive(Debug)]
pub struct FrameHistoryBuffer {
    state: RwLock<BufferState>,
    capacity: usize,
}

impl FrameHistoryBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            state: RwLock::new(BufferState::default()),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.state.read().events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.read().events.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.len() >= self.capacity
    }

    /// Insert an event in end-time order.
    ///
    /// Returns `CapacityExceeded` without storing anything when full.
    pub fn append(&self, event: FrameEvent) -> Result<(), JankError> {
        let mut state = self.state.write();
        if state.events.len() >= self.capacity {
            return Err(JankError::CapacityExceeded {
                capacity: self.capacity,
            });
        }
        let seq = state.next_seq;
        state.next_seq += 1;
        state.events.insert((event.end_nanos(), seq), event);
        Ok(())
    }

    /// Drop every stored event.
    pub fn clear(&self) {
        let mut state = self.state.write();
        state.events.clear();
        state.next_seq = 0;
    }

    /// Events with `end_nanos >= timestamp`, in ascending end order.
    ///
    /// The iterator is lazy: each step takes the read lock just long enough
    /// to fetch the next key after its cursor, so appends are never held
    /// up by a long read. It yields at least the matching events present at
    /// call time; events appended concurrently may or may not show up.
    pub fn range_from(&self, timestamp: u64) -> RangeFrom<'_> {
        RangeFrom {
            buffer: self,
            from: timestamp,
            cursor: Bound::Included((timestamp, 0)),
        }
    }

    /// Copy of all stored events in end order.
    pub fn snapshot(&self) -> Vec<FrameEvent> {
        self.state.read().events.values().copied().collect()
    }
}

/// Lazy ascending iterator returned by [`FrameHistoryBuffer::range_from`].
#[derive(Debug, Clone)]
pub struct RangeFrom<'a> {
    buffer: &'a FrameHistoryBuffer,
    from: u64,
    cursor: Bound<EventKey>,
}

impl RangeFrom<'_> {
    /// Rewind to the first event at or after the starting timestamp.
    pub fn restart(&mut self) {
        self.cursor = Bound::Included((self.from, 0));
    }
}

impl Iterator for RangeFrom<'_> {
    type Item = FrameEvent;

    fn next(&mut self) -> Option<FrameEvent> {
        let state = self.buffer.state.read();
        let (key, event) = state
            .events
            .range((self.cursor, Bound::Unbounded))
            .next()?;
        self.cursor = Bound::Excluded(*key);
        Some(*event)
    }
}
