//! # jankwatch-types
//!
//! Core types for attributing rendering jank to caller-chosen spans.
//! Shared between the SDK that collects frames and any tool that consumes
//! the resulting metrics.
//!
//! ## Design Goals
//!
//! - **Zero required dependencies**: core types work without any serialization framework
//! - **Optional serialization**: enable the `serde` feature for JSON and friends
//! - **Immutable events**: a classified [`FrameEvent`] never changes after creation
//!
//! ## Features
//!
//! - `std` (default): Standard library support
//! - `serde`: serialization via serde
//!
//! ## Example
//!
//! ```rust
//! use jankwatch_types::{FrameRecord, WindowMetrics};
//!
//! let mut metrics = WindowMetrics::new();
//! metrics.add_frame(FrameRecord {
//!     start_millis: 1_703_160_000_000,
//!     duration_nanos: 40_000_000,
//!     delay_nanos: 23_333_333,
//!     is_slow: true,
//!     is_frozen: false,
//! });
//!
//! assert_eq!(metrics.slow_frame_count, 1);
//! ```

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod frame;
mod metrics;
mod timestamp;

pub use frame::*;
pub use metrics::*;
pub use timestamp::*;

/// Frames longer than this are frozen regardless of refresh rate.
pub const FROZEN_FRAME_THRESHOLD_NANOS: u64 = 700_000_000;

/// Nominal 60Hz frame budget, `round(1e9 / 60)`.
pub const DEFAULT_FRAME_DURATION_NANOS: u64 = 16_666_667;

/// Nanoseconds in one second.
pub const NANOS_PER_SECOND: u64 = 1_000_000_000;
