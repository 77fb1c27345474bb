//! The JSON-lines frame trace format.
//!
//! One record per line, tagged by `type`:
//!
//! ```text
//! {"type":"surface_shown","surface":1}
//! {"type":"span_start","name":"scroll","at_ns":1000000000}
//! {"type":"frame","start_ns":1100000000,"end_ns":1140000000,"duration_ns":40000000,"refresh_rate":60.0}
//! {"type":"vsync","at_ns":1900000000}
//! {"type":"span_stop","name":"scroll","at_ns":2000000000}
//! {"type":"surface_hidden","surface":1}
//! ```
//!
//! Blank lines and lines starting with `#` are skipped.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::{Context, Result};
use jankwatch_sdk::RawFrame;
use serde::{Deserialize, Serialize};

/// One line of a trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TraceRecord {
    /// A frame finished rendering.
    Frame {
        start_ns: u64,
        end_ns: u64,
        duration_ns: u64,
        refresh_rate: f32,
    },
    SurfaceShown { surface: u64 },
    SurfaceHidden { surface: u64 },
    SpanStart { name: String, at_ns: u64 },
    SpanStop { name: String, at_ns: u64 },
    /// The platform scheduled a frame that has not been reported yet.
    Vsync { at_ns: u64 },
}

impl TraceRecord {
    /// Monotonic time at which the record takes effect.
    pub fn at_nanos(&self) -> u64 {
        match self {
            TraceRecord::Frame { end_ns, .. } => *end_ns,
            TraceRecord::SpanStart { at_ns, .. }
            | TraceRecord::SpanStop { at_ns, .. }
            | TraceRecord::Vsync { at_ns } => *at_ns,
            TraceRecord::SurfaceShown { .. } | TraceRecord::SurfaceHidden { .. } => 0,
        }
    }

    /// The frame notification this record carries, if any.
    pub fn raw_frame(&self) -> Option<RawFrame> {
        match *self {
            TraceRecord::Frame {
                start_ns,
                end_ns,
                duration_ns,
                refresh_rate,
            } => Some(RawFrame::new(start_ns, end_ns, duration_ns, refresh_rate)),
            _ => None,
        }
    }
}

/// Parse a trace from any reader.
pub fn parse_trace<R: BufRead>(reader: R) -> Result<Vec<TraceRecord>> {
    let mut records = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line_no = index + 1;
        let line = line.with_context(|| format!("failed to read trace line {line_no}"))?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let record = serde_json::from_str(line)
            .with_context(|| format!("invalid trace record on line {line_no}"))?;
        records.push(record);
    }
    Ok(records)
}

/// Load a trace file.
pub fn load_trace(path: &Path) -> Result<Vec<TraceRecord>> {
    let file = File::open(path)
        .with_context(|| format!("failed to open trace {}", path.display()))?;
    parse_trace(BufReader::new(file))
        .with_context(|| format!("failed to parse trace {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};

    #[test]
    fn test_parse_all_record_types() {
        let input = r#"
# recorded on a 60Hz panel
{"type":"surface_shown","surface":1}
{"type":"span_start","name":"scroll","at_ns":1000}
{"type":"frame","start_ns":1100,"end_ns":1140,"duration_ns":40,"refresh_rate":60.0}
{"type":"vsync","at_ns":1900}
{"type":"span_stop","name":"scroll","at_ns":2000}
{"type":"surface_hidden","surface":1}
"#;
        let records = parse_trace(Cursor::new(input)).unwrap();
        assert_eq!(records.len(), 6);
        assert_eq!(records[0], TraceRecord::SurfaceShown { surface: 1 });
        assert_eq!(
            records[1],
            TraceRecord::SpanStart {
                name: "scroll".to_string(),
                at_ns: 1000
            }
        );
        assert_eq!(records[2].raw_frame(), Some(RawFrame::new(1100, 1140, 40, 60.0)));
        assert_eq!(records[2].at_nanos(), 1140);
        assert_eq!(records[3], TraceRecord::Vsync { at_ns: 1900 });
    }

    #[test]
    fn test_error_names_line() {
        let input = "{\"type\":\"vsync\",\"at_ns\":1}\n\n{\"type\":\"teleport\"}\n";
        let err = parse_trace(Cursor::new(input)).unwrap_err();
        assert!(err.to_string().contains("line 3"), "got: {err}");
    }

    #[test]
    fn test_missing_field_is_an_error() {
        let input = r#"{"type":"frame","start_ns":1}"#;
        assert!(parse_trace(Cursor::new(input)).is_err());
    }

    #[test]
    fn test_load_trace_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"type":"surface_shown","surface":7}}"#).unwrap();
        let records = load_trace(file.path()).unwrap();
        assert_eq!(records, vec![TraceRecord::SurfaceShown { surface: 7 }]);
    }

    #[test]
    fn test_load_missing_trace() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_trace(&dir.path().join("none.jsonl")).unwrap_err();
        assert!(err.to_string().contains("failed to open trace"));
    }
}
