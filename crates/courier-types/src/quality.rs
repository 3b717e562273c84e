//! Connection quality flag and update source

use serde::{Deserialize, Serialize};
use std::fmt;

/// How the session's position is currently being produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionQuality {
    /// Real positions from the live feed
    Live,
    /// Locally interpolated positions
    Simulated,
    /// Nothing is producing positions
    #[default]
    Disconnected,
}

impl ConnectionQuality {
    /// Badge text for the tracking view
    pub fn label(&self) -> &'static str {
        match self {
            Self::Live => "Live",
            Self::Simulated | Self::Disconnected => "Connecting…",
        }
    }
}

impl fmt::Display for ConnectionQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Live => write!(f, "live"),
            Self::Simulated => write!(f, "simulated"),
            Self::Disconnected => write!(f, "disconnected"),
        }
    }
}

/// Producer of a position update
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpdateSource {
    /// Live feed adapter
    Live,
    /// Position simulator
    Simulated,
}

impl From<UpdateSource> for ConnectionQuality {
    fn from(source: UpdateSource) -> Self {
        match source {
            UpdateSource::Live => Self::Live,
            UpdateSource::Simulated => Self::Simulated,
        }
    }
}
