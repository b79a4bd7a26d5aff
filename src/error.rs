//! Error types for the simulator.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while configuring or driving simulations.
///
/// Conditions that are part of normal simulation (exhausted repair bandwidth,
/// an unavailable rack, a stripe that cannot be repaired yet) are modelled as
/// state, never as errors.
#[derive(Debug, Error)]
pub enum SimError {
    /// Erasure code parameters violate `k >= 1`, `n > k`, or the LRC layout.
    #[error("Invalid erasure code parameters: {0}")]
    InvalidParameters(String),

    /// Not enough racks to spread a stripe across distinct failure domains.
    #[error("Not enough racks for placement: need {required}, have {available}")]
    InsufficientRacks {
        /// Racks required by one stripe.
        required: usize,
        /// Racks in the topology.
        available: usize,
    },

    /// Not enough nodes inside a rack for hierarchical placement.
    #[error("Not enough nodes per rack for placement: need {required}, have {available}")]
    InsufficientNodes {
        /// Nodes required inside one rack.
        required: usize,
        /// Nodes per rack in the topology.
        available: usize,
    },

    /// A code type / placement combination that cannot be honoured.
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// Any other invalid configuration value.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The configuration file could not be read.
    #[error("Failed to read config {path}: {source}")]
    ConfigRead {
        /// Path that was requested.
        path: PathBuf,
        /// Underlying IO error.
        source: std::io::Error,
    },

    /// The configuration file is not valid TOML for [`crate::SimConfig`].
    #[error("Failed to parse config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// A batch worker task panicked or was cancelled.
    #[error("Trial worker failed: {0}")]
    Worker(String),

    /// Terminal or log file IO.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
