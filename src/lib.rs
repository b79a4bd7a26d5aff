//! Erasure-coded data center reliability simulator
//!
//! Discrete-event Monte Carlo simulation of disk, node and rack failures in
//! an erasure-coded storage cluster. Trials model bandwidth-limited repairs,
//! transient outages and correlated rack failures, and report data loss,
//! blocked-time and single-chunk-repair statistics.

pub mod config;
pub mod erasure;
pub mod error;
pub mod simulation;
pub mod storage;
pub mod ui;

pub use config::SimConfig;
pub use erasure::{ErasureCodeConfig, ErasureScheme};
pub use error::SimError;
pub use simulation::{BatchRunner, BatchSummary, SimResult, Simulator};
pub use storage::Cluster;
pub use ui::Dashboard;

/// Result type used throughout the library
pub type Result<T> = std::result::Result<T, SimError>;
