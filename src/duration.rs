//! Human-readable durations and frame budgets for settings and CLI flags.

use std::time::Duration;

use anyhow::{bail, Context, Result};

/// Unit suffix to nanoseconds multiplier (longer suffixes first so "ms"
/// is not read as "s")
const UNITS: &[(&str, f64)] = &[
    ("ns", 1.0),
    ("µs", 1_000.0),
    ("us", 1_000.0),
    ("ms", 1_000_000.0),
    ("s", 1_000_000_000.0),
];

/// Parse durations like "700ms", "16.6ms", "1.5s" or "250µs".
pub fn parse_duration(s: &str) -> Result<Duration> {
    let s = s.trim();
    let Some((value, multiplier)) = UNITS
        .iter()
        .find_map(|(suffix, multiplier)| s.strip_suffix(suffix).map(|v| (v, *multiplier)))
    else {
        bail!("unknown duration format: {s:?} (expected a unit such as ms or s)");
    };

    let value: f64 = value
        .trim()
        .parse()
        .with_context(|| format!("invalid number in duration {s:?}"))?;
    if !value.is_finite() || value < 0.0 {
        bail!("duration must be a non-negative number: {s:?}");
    }
    Ok(Duration::from_nanos((value * multiplier).round() as u64))
}

/// Parse a frame budget given either as a duration ("16.6ms") or as a
/// refresh rate ("120hz").
pub fn parse_frame_budget(s: &str) -> Result<Duration> {
    let trimmed = s.trim();
    let lower = trimmed.to_ascii_lowercase();
    if let Some(rate) = lower.strip_suffix("hz") {
        let rate: f64 = rate
            .trim()
            .parse()
            .with_context(|| format!("invalid refresh rate {trimmed:?}"))?;
        if !rate.is_finite() || rate <= 0.0 {
            bail!("refresh rate must be positive: {trimmed:?}");
        }
        return Ok(Duration::from_nanos((1e9 / rate).round() as u64));
    }
    parse_duration(trimmed)
}

/// Format a duration for display.
pub fn format_duration(d: Duration) -> String {
    let nanos = d.as_nanos();
    match nanos {
        0 => "0ns".to_string(),
        1..=999 => format!("{nanos}ns"),
        1_000..=999_999 => format!("{:.2}µs", nanos as f64 / 1e3),
        1_000_000..=999_999_999 => format!("{:.2}ms", nanos as f64 / 1e6),
        _ => format!("{:.2}s", d.as_secs_f64()),
    }
}
