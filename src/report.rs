//! JSON report of a replay.

use std::fs;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use jankwatch_sdk::{Timestamp, WindowMetrics};
use serde::Serialize;

use crate::replay::{ReplayStats, SpanResult};

/// The report written by the `jankwatch` binary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub spans: Vec<SpanReport>,
    pub summary: Summary,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpanReport {
    pub name: String,
    pub start_ns: u64,
    pub finish_ns: u64,
    pub duration_ns: u64,
    /// Wall-clock start of the earliest jank frame, if any.
    pub first_jank_ms: Option<u64>,
    /// `null` when no metrics were available.
    pub metrics: Option<WindowMetrics>,
}

/// Totals across all spans that produced metrics.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Summary {
    pub spans: usize,
    pub spans_without_metrics: usize,
    pub total_frames: u64,
    pub slow_frames: u64,
    pub frozen_frames: u64,
    pub total_delay_ns: u64,
    pub records: usize,
    pub frames_replayed: usize,
    pub frames_delivered: usize,
    pub unterminated_spans: usize,
}

impl Report {
    /// Build a report. With `spans_only` the per-frame lists are dropped.
    pub fn new(results: Vec<SpanResult>, stats: ReplayStats, spans_only: bool) -> Self {
        let mut summary = Summary {
            spans: results.len(),
            records: stats.records,
            frames_replayed: stats.frames,
            frames_delivered: stats.frames_delivered,
            unterminated_spans: stats.unterminated_spans,
            ..Summary::default()
        };

        let spans = results
            .into_iter()
            .map(|result| {
                match &result.metrics {
                    Some(m) => {
                        summary.total_frames += m.total_frame_count;
                        summary.slow_frames += m.slow_frame_count;
                        summary.frozen_frames += m.frozen_frame_count;
                        summary.total_delay_ns += m.total_delay_nanos();
                    }
                    None => summary.spans_without_metrics += 1,
                }
                let start = Timestamp::from_nanos(result.start_nanos);
                let finish = Timestamp::from_nanos(result.finish_nanos);
                let first_jank_ms = result
                    .metrics
                    .as_ref()
                    .and_then(WindowMetrics::first_frame_start)
                    .map(|t| t.as_millis());
                let metrics = if spans_only {
                    result.metrics.map(WindowMetrics::without_frames)
                } else {
                    result.metrics
                };
                SpanReport {
                    name: result.name,
                    start_ns: result.start_nanos,
                    finish_ns: result.finish_nanos,
                    duration_ns: finish.duration_since(&start).as_nanos() as u64,
                    first_jank_ms,
                    metrics,
                }
            })
            .collect();

        Self { spans, summary }
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("failed to serialize report")
    }

    /// Write the report to `path`, or stdout when `None`.
    pub fn write(&self, path: Option<&Path>) -> Result<()> {
        let json = self.to_json()?;
        match path {
            Some(path) => fs::write(path, json + "\n")
                .with_context(|| format!("failed to write report to {}", path.display())),
            None => {
                let mut stdout = std::io::stdout().lock();
                writeln!(stdout, "{json}").context("failed to write report")
            }
        }
    }
}
