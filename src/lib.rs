//! # jankwatch
//!
//! Replay recorded frame traces through the jankwatch SDK and report slow
//! and frozen frames per span.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐    ┌──────────────┐    ┌──────────────────────────┐    ┌──────────┐
//! │  trace   │───▶│    replay    │───▶│ jankwatch-sdk            │───▶│  report  │
//! │ (JSONL)  │    │ ManualSource │    │ bus → spans → aggregator │    │  (JSON)  │
//! └──────────┘    │ ManualClock  │    └──────────────────────────┘    └──────────┘
//!                 └──────────────┘
//!                        ▲
//!                 ┌──────┴──────┐
//!                 │  settings   │◀── TOML file, JANKWATCH_* env, CLI flags
//!                 └─────────────┘
//! ```
//!
//! - **[`trace`]**: the JSON-lines trace format ([`TraceRecord`])
//! - **[`replay`]**: applies records to a bus driven by a manual source and clock
//! - **[`report`]**: per-span metrics plus summary totals, serialized as JSON
//! - **[`settings`]**: collection tunables from file and environment
//! - **[`duration`]**: human-readable durations ("700ms", "60hz")
//!
//! ## Usage
//!
//! ```bash
//! jankwatch --trace session.jsonl
//! jankwatch --trace session.jsonl --config jankwatch.toml --output report.json --spans-only
//! ```
//!
//! ### As a library
//!
//! ```
//! use jankwatch::{Replay, Report, TraceRecord};
//! use jankwatch_sdk::JankConfig;
//!
//! let records = vec![
//!     TraceRecord::SurfaceShown { surface: 1 },
//!     TraceRecord::SpanStart { name: "scroll".into(), at_ns: 0 },
//!     TraceRecord::Frame {
//!         start_ns: 100_000_000,
//!         end_ns: 140_000_000,
//!         duration_ns: 40_000_000,
//!         refresh_rate: 60.0,
//!     },
//!     TraceRecord::SpanStop { name: "scroll".into(), at_ns: 1_000_000_000 },
//! ];
//!
//! let (results, stats) = Replay::run(JankConfig::default(), &records);
//! let report = Report::new(results, stats, false);
//! assert_eq!(report.summary.slow_frames, 1);
//! ```

pub mod duration;
pub mod replay;
pub mod report;
pub mod settings;
pub mod trace;

pub use replay::{Replay, ReplayStats, SpanResult};
pub use report::{Report, SpanReport, Summary};
pub use settings::Settings;
pub use trace::{load_trace, parse_trace, TraceRecord};
