//! Ingestion lifecycle states.

use serde::Serialize;
use std::fmt;

/// State of the ingestion pipeline.
///
/// ```text
/// Starting ─► Running ─► Draining ─► Stopped
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IngestState {
    /// Recovering snapshots, reading the checkpoint, subscribing.
    Starting,
    /// Processing messages.
    Running,
    /// Shutdown requested; releasing the subscription.
    Draining,
    /// Terminal.
    Stopped,
}

impl IngestState {
    /// Whether new messages are being processed.
    #[must_use]
    pub const fn is_running(self) -> bool {
        matches!(self, Self::Running)
    }
}

impl fmt::Display for IngestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Starting => write!(f, "starting"),
            Self::Running => write!(f, "running"),
            Self::Draining => write!(f, "draining"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}
