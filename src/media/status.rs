/// Resolution status of a referenced video
///
/// This module defines the states an index entry moves through.
use serde::{Deserialize, Serialize};
use std::fmt;

/// Represents the current state of a video in the reference index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaStatus {
    /// Referenced but not yet resolved
    #[default]
    Pending,

    // ===== Terminal States =====
    /// Downloaded to the video directory
    Downloaded,

    /// Removed, private, blocked or otherwise permanently unavailable
    Unavailable,

    // ===== Retryable State =====
    /// Resolution failed for an unclassified reason; reset by a retry request
    Failed,
}

impl MediaStatus {
    /// Returns true if no further resolution is attempted
    ///
    /// Outcomes recorded against a terminal entry are ignored.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Downloaded | Self::Unavailable)
    }

    /// Returns true if the entry is waiting for a resolution attempt
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }

}

impl fmt::Display for MediaStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pending => "pending",
            Self::Downloaded => "downloaded",
            Self::Unavailable => "unavailable",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}
