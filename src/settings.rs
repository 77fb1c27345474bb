//! Replay settings: an optional TOML file plus `JANKWATCH_*` overrides.
//!
//! ```toml
//! max_events = 3600
//! frozen_threshold = "700ms"
//! default_frame_duration = "60hz"
//! slow_grace_hz = 1.0
//! spans_only = false
//! ```

use std::path::Path;

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use jankwatch_sdk::JankConfig;
use serde::Deserialize;

use crate::duration::{parse_duration, parse_frame_budget};

/// Environment variable prefix, e.g. `JANKWATCH_MAX_EVENTS=120`.
pub const ENV_PREFIX: &str = "JANKWATCH";

/// Settings as read from file and environment. Durations stay strings
/// until [`Settings::jank_config`] so errors can name the bad value.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub max_events: Option<usize>,
    pub frozen_threshold: Option<String>,
    pub default_frame_duration: Option<String>,
    pub slow_grace_hz: Option<f64>,
    pub spans_only: bool,
}

impl Settings {
    /// Load settings from `path` (if given) with environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }
        let config = builder
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()
            .with_context(|| match path {
                Some(path) => format!("failed to load settings from {}", path.display()),
                None => "failed to load settings from environment".to_string(),
            })?;

        config
            .try_deserialize()
            .context("invalid settings")
    }

    /// Build the SDK configuration, parsing duration strings.
    pub fn jank_config(&self) -> Result<JankConfig> {
        let mut builder = JankConfig::builder();
        if let Some(max_events) = self.max_events {
            builder = builder.max_events(max_events);
        }
        if let Some(threshold) = &self.frozen_threshold {
            let threshold = parse_duration(threshold).context("invalid frozen_threshold")?;
            builder = builder.frozen_threshold(threshold);
        }
        if let Some(budget) = &self.default_frame_duration {
            let budget = parse_frame_budget(budget).context("invalid default_frame_duration")?;
            builder = builder.default_frame_duration(budget);
        }
        if let Some(grace) = self.slow_grace_hz {
            builder = builder.slow_grace_hz(grace);
        }
        Ok(builder.build())
    }
}
