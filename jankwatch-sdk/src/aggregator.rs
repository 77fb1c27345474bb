//! Window aggregation: clip buffered frames to a span, extrapolate a
//! pending frame and interpolate frames for silent time.

use jankwatch_types::{FrameEvent, FrameRecord, WindowMetrics};
use tracing::trace;

use crate::buffer::FrameHistoryBuffer;
use crate::classify::Classifier;
use crate::clock::ClockAnchor;

/// The scalar inputs of one aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpanWindow {
    pub start_nanos: u64,
    pub finish_nanos: u64,
    /// Frame budget used for interpolation when no event was visited.
    pub last_known_frame_duration_nanos: u64,
    /// Start of the most recently scheduled frame, if the source knows it.
    pub last_known_event_start_nanos: Option<u64>,
    /// Maps monotonic record starts to wall-clock milliseconds.
    pub anchor: ClockAnchor,
}

impl SpanWindow {
    pub fn duration_nanos(&self) -> u64 {
        self.finish_nanos.saturating_sub(self.start_nanos)
    }
}

/// Computes [`WindowMetrics`] for a span from a frame history.
///
/// Stateless apart from the classification thresholds: the same buffer
/// contents and window always produce the same result.
#[derive(Debug, Clone, Copy, Default)]
pub struct WindowAggregator {
    classifier: Classifier,
}

impl WindowAggregator {
    pub fn new(classifier: Classifier) -> Self {
        Self { classifier }
    }

    /// Aggregate the events of `buffer` that can overlap `window`.
    pub fn aggregate(&self, buffer: &FrameHistoryBuffer, window: &SpanWindow) -> WindowMetrics {
        self.aggregate_events(buffer.range_from(window.start_nanos), window)
    }

    /// Aggregate from any end-ordered event sequence.
    ///
    /// Events ending before the span are skipped; iteration stops at the
    /// first event that starts after the span finishes.
    pub fn aggregate_events<I>(&self, events: I, window: &SpanWindow) -> WindowMetrics
    where
        I: IntoIterator<Item = FrameEvent>,
    {
        let mut metrics = WindowMetrics::new();
        let (start, finish) = (window.start_nanos, window.finish_nanos);
        if finish <= start {
            return metrics;
        }
        let span_nanos = finish - start;
        metrics.span_duration_nanos = span_nanos;

        let mut frame_duration_nanos = window.last_known_frame_duration_nanos;
        for event in events {
            if event.end_nanos() < start {
                continue;
            }
            if event.start_nanos() > finish {
                break;
            }
            if let Some(record) = self.clip(&event, window, span_nanos) {
                metrics.add_frame(record);
            }
            frame_duration_nanos = event.expected_duration_nanos();
        }
        let observed = metrics.frames.len() as u64;

        let mut effective_span_nanos = span_nanos;
        if let Some(pending_start) = window.last_known_event_start_nanos {
            if pending_start < finish {
                let pending_nanos = finish - pending_start;
                if let Some(record) = self.pending_record(pending_start, pending_nanos, frame_duration_nanos, window) {
                    trace!(pending_nanos, "synthesized pending frame");
                    metrics.add_frame(record);
                    metrics.pending_frame_count = 1;
                    effective_span_nanos = effective_span_nanos.saturating_sub(pending_nanos);
                }
            }
        }

        // Clipped durations include the pending record, so its window is
        // taken out of the silent time twice.
        let non_rendered_nanos = effective_span_nanos.saturating_sub(metrics.total_duration_nanos);
        if non_rendered_nanos > 0 && frame_duration_nanos > 0 {
            metrics.interpolated_frame_count = non_rendered_nanos.div_ceil(frame_duration_nanos);
        }

        metrics.total_frame_count =
            observed + metrics.pending_frame_count + metrics.interpolated_frame_count;
        metrics
    }

    /// The part of `event` inside the window, or `None` if they do not overlap.
    fn clip(&self, event: &FrameEvent, window: &SpanWindow, span_nanos: u64) -> Option<FrameRecord> {
        let (start, finish) = (window.start_nanos, window.finish_nanos);
        let (frame_start, frame_end) = (event.start_nanos(), event.end_nanos());

        if frame_start >= start && frame_end <= finish {
            return Some(FrameRecord {
                start_millis: window.anchor.wall_millis_at(frame_start),
                duration_nanos: event.duration_nanos(),
                delay_nanos: event.delay_nanos(),
                is_slow: event.is_slow(),
                is_frozen: event.is_frozen(),
            });
        }

        let straddles_start = start > frame_start && start < frame_end;
        let straddles_finish = finish > frame_start && finish < frame_end;
        if !straddles_start && !straddles_finish {
            return None;
        }

        let expected = event.expected_duration_nanos();
        let duration_before_span = start.saturating_sub(frame_start);
        let delay_before_span = duration_before_span.saturating_sub(expected);
        let delay_within_span = event
            .delay_nanos()
            .saturating_sub(delay_before_span)
            .min(span_nanos);

        let clipped_start = start.max(frame_start);
        let clipped_nanos = finish.min(frame_end) - clipped_start;
        let (is_slow, is_frozen) = self.classifier.classify_clipped(clipped_nanos, expected);

        Some(FrameRecord {
            start_millis: window.anchor.wall_millis_at(clipped_start),
            duration_nanos: clipped_nanos,
            delay_nanos: delay_within_span,
            is_slow,
            is_frozen,
        })
    }

    /// A synthetic record for work still running at span end, if it is
    /// already slow.
    fn pending_record(
        &self,
        pending_start: u64,
        pending_nanos: u64,
        frame_duration_nanos: u64,
        window: &SpanWindow,
    ) -> Option<FrameRecord> {
        let (is_slow, is_frozen) = self
            .classifier
            .classify_clipped(pending_nanos, frame_duration_nanos);
        is_slow.then(|| FrameRecord {
            start_millis: window.anchor.wall_millis_at(pending_start),
            duration_nanos: pending_nanos,
            delay_nanos: pending_nanos.saturating_sub(frame_duration_nanos),
            is_slow,
            is_frozen,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jankwatch_types::DEFAULT_FRAME_DURATION_NANOS;

    const MS: u64 = 1_000_000;
    const SECOND: u64 = 1_000 * MS;
    const BUDGET: u64 = 16_666_667;

    fn jank(start: u64, duration: u64) -> FrameEvent {
        let frozen = duration > 700 * MS;
        FrameEvent::new(start, start + duration, duration, BUDGET, true, frozen)
    }

    fn window(start: u64, finish: u64) -> SpanWindow {
        SpanWindow {
            start_nanos: start,
            finish_nanos: finish,
            last_known_frame_duration_nanos: DEFAULT_FRAME_DURATION_NANOS,
            last_known_event_start_nanos: None,
            anchor: ClockAnchor::default(),
        }
    }

    fn aggregate(events: Vec<FrameEvent>, window: &SpanWindow) -> WindowMetrics {
        WindowAggregator::default().aggregate_events(events, window)
    }

    #[test]
    fn test_contained_frames_keep_duration_and_classification() {
        let events = vec![jank(10 * MS, 40 * MS), jank(100 * MS, 800 * MS), jank(950 * MS, 30 * MS)];
        let metrics = aggregate(events.clone(), &window(0, SECOND));

        assert_eq!(metrics.total_duration_nanos, 870 * MS);
        assert_eq!(metrics.frames.len(), 3);
        for (record, event) in metrics.frames.iter().zip(&events) {
            assert_eq!(record.duration_nanos, event.duration_nanos());
            assert_eq!(record.delay_nanos, event.delay_nanos());
            assert_eq!(record.is_slow, event.is_slow());
            assert_eq!(record.is_frozen, event.is_frozen());
        }
        assert_eq!(metrics.slow_frame_count, 2);
        assert_eq!(metrics.frozen_frame_count, 1);
    }

    #[test]
    fn test_frame_straddling_span_start_is_clipped() {
        let start = SECOND;
        let event = jank(start - 10 * MS, 15 * MS);
        let metrics = aggregate(vec![event], &window(start, start + SECOND));

        assert_eq!(metrics.frames.len(), 1);
        let record = metrics.frames[0];
        assert_eq!(record.duration_nanos, 5 * MS);
        assert!(!record.is_slow);
        assert_eq!(metrics.slow_frame_count, 0);
    }

    #[test]
    fn test_clipped_delay_excludes_time_before_span() {
        let start = SECOND;
        // 100ms frame, 60ms of it before the span
        let event = jank(start - 60 * MS, 100 * MS);
        let metrics = aggregate(vec![event], &window(start, start + SECOND));

        let record = metrics.frames[0];
        assert_eq!(record.duration_nanos, 40 * MS);
        assert_eq!(record.delay_nanos, (100 * MS - BUDGET) - (60 * MS - BUDGET));
        assert!(record.is_slow);
    }

    #[test]
    fn test_frame_straddling_span_finish_is_clipped() {
        let metrics = aggregate(vec![jank(990 * MS, 30 * MS)], &window(0, SECOND));
        assert_eq!(metrics.frames[0].duration_nanos, 10 * MS);
        assert!(!metrics.frames[0].is_slow);
    }

    #[test]
    fn test_clipped_frame_can_stay_frozen() {
        let metrics = aggregate(vec![jank(0, 2 * SECOND)], &window(100 * MS, 900 * MS));
        let record = metrics.frames[0];
        assert_eq!(record.duration_nanos, 800 * MS);
        assert!(record.is_frozen && record.is_slow);
        assert_eq!(record.delay_nanos, 800 * MS);
        assert_eq!(metrics.frozen_frame_count, 1);
    }

    #[test]
    fn test_empty_buffer_interpolates_whole_span() {
        let metrics = aggregate(vec![], &window(0, SECOND));
        assert_eq!(metrics.total_frame_count, 60);
        assert_eq!(metrics.interpolated_frame_count, 60);
        assert!(metrics.frames.is_empty());
    }

    #[test]
    fn test_interpolation_rounds_up() {
        let mut w = window(0, SECOND);
        w.last_known_frame_duration_nanos = 16_666_666;
        // 1e9 / 16_666_666 is just over 60
        assert_eq!(aggregate(vec![], &w).total_frame_count, 61);
    }

    #[test]
    fn test_pending_frame_is_synthesized() {
        let finish = 2 * SECOND;
        let mut w = window(finish - SECOND, finish);
        w.last_known_frame_duration_nanos = 16 * MS;
        w.last_known_event_start_nanos = Some(finish - 100 * MS);

        let metrics = aggregate(vec![], &w);
        assert_eq!(metrics.pending_frame_count, 1);
        assert_eq!(metrics.frames.len(), 1);
        let pending = metrics.frames[0];
        assert_eq!(pending.duration_nanos, 100 * MS);
        assert_eq!(pending.delay_nanos, 84 * MS);
        assert!(pending.is_slow && !pending.is_frozen);
        assert_eq!(metrics.slow_frame_count, 1);

        // Silent time: 1s - 100ms pending window - 100ms pending duration
        assert_eq!(metrics.interpolated_frame_count, 50);
        assert_eq!(metrics.total_frame_count, 51);
    }

    #[test]
    fn test_pending_window_is_subtracted_twice_near_boundary() {
        // A pending frame covering the whole span leaves no silent time at
        // all, even though the span itself was only partly accounted for.
        let mut w = window(SECOND, 2 * SECOND);
        w.last_known_frame_duration_nanos = 16 * MS;
        w.last_known_event_start_nanos = Some(1_500 * MS);

        let metrics = aggregate(vec![], &w);
        assert_eq!(metrics.pending_frame_count, 1);
        assert_eq!(metrics.interpolated_frame_count, 0);
        assert_eq!(metrics.total_frame_count, 1);
    }

    #[test]
    fn test_short_pending_frame_is_not_synthesized() {
        let mut w = window(0, SECOND);
        w.last_known_event_start_nanos = Some(SECOND - 5 * MS);

        let metrics = aggregate(vec![], &w);
        assert_eq!(metrics.pending_frame_count, 0);
        assert_eq!(metrics.interpolated_frame_count, 60);
    }

    #[test]
    fn test_pending_start_after_finish_is_ignored() {
        let mut w = window(0, SECOND);
        w.last_known_event_start_nanos = Some(2 * SECOND);
        assert_eq!(aggregate(vec![], &w).pending_frame_count, 0);
    }

    #[test]
    fn test_inverted_window_yields_zero() {
        let metrics = aggregate(vec![jank(0, 40 * MS)], &window(SECOND, SECOND));
        assert_eq!(metrics, WindowMetrics::new());

        let metrics = aggregate(vec![jank(0, 40 * MS)], &window(SECOND, 0));
        assert_eq!(metrics.total_frame_count, 0);
    }

    #[test]
    fn test_events_outside_window_behave_like_empty_buffer() {
        let events = vec![jank(0, 40 * MS), jank(5 * SECOND, 40 * MS)];
        let metrics = aggregate(events, &window(SECOND, 2 * SECOND));

        assert!(metrics.frames.is_empty());
        assert_eq!(metrics.interpolated_frame_count, 60);
    }

    #[test]
    fn test_frame_budget_follows_last_visited_event() {
        let event = FrameEvent::new(0, 40 * MS, 40 * MS, 8_333_333, true, false);
        let metrics = aggregate(vec![event], &window(0, SECOND));

        // 960ms of silence at 120Hz
        assert_eq!(metrics.interpolated_frame_count, (960 * MS).div_ceil(8_333_333));
        assert_eq!(metrics.total_frame_count, 1 + metrics.interpolated_frame_count);
    }

    #[test]
    fn test_aggregate_reads_buffer_from_span_start() {
        let buffer = FrameHistoryBuffer::new(16);
        buffer.append(jank(0, 40 * MS)).unwrap();
        buffer.append(jank(SECOND + 100 * MS, 40 * MS)).unwrap();

        let metrics = WindowAggregator::default().aggregate(&buffer, &window(SECOND, 2 * SECOND));
        assert_eq!(metrics.frames.len(), 1);
        assert_eq!(metrics.slow_frame_count, 1);
        assert_eq!(metrics.total_duration_nanos, 40 * MS);
    }

    #[test]
    fn test_records_carry_wall_clock_starts() {
        let mut w = window(SECOND, 2 * SECOND);
        w.anchor = ClockAnchor {
            monotonic_nanos: 2 * SECOND,
            wall_millis: 1_700_000_000_000,
        };
        let metrics = aggregate(vec![jank(1_500 * MS, 40 * MS)], &w);
        assert_eq!(metrics.frames[0].start_millis, 1_700_000_000_000 - 500);
    }
}
