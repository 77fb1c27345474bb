//! Error types for frame collection.
//!
//! None of these escape the public start/stop surface: each is handled
//! where it occurs and at most turns into an absent span result.

use thiserror::Error;

use crate::source::SurfaceId;

/// Errors raised while collecting and classifying frames.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum JankError {
    /// The platform event source could not be attached to a surface.
    #[error("instrumentation unavailable for {surface}: {reason}")]
    InstrumentationUnavailable { surface: SurfaceId, reason: String },

    /// A span was started twice or stopped without being started.
    #[error("cannot {action} a span that is {from}")]
    InvalidStateTransition {
        from: &'static str,
        action: &'static str,
    },

    /// A frame notification failed validation and was dropped.
    #[error("malformed frame event: {0}")]
    MalformedEvent(String),

    /// A history buffer is full; the event was dropped.
    #[error("frame history full ({capacity} events)")]
    CapacityExceeded { capacity: usize },
}

/// Errors reported by an [`EventSource`](crate::EventSource) implementation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SourceError {
    /// The surface cannot produce frame notifications.
    #[error("surface is not render capable: {0}")]
    NotRenderCapable(String),

    /// The platform refused to install or remove the listener.
    #[error("listener registration failed: {0}")]
    Registration(String),
}

impl JankError {
    pub(crate) fn unavailable(surface: SurfaceId, err: &SourceError) -> Self {
        JankError::InstrumentationUnavailable {
            surface,
            reason: err.to_string(),
        }
    }
}
