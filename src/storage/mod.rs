//! Storage topology module
//!
//! Models the failure-domain hierarchy of a data center (disk in node in
//! rack), the per-device state machines and clocks, stripe placement and the
//! repair bandwidth budgets.

pub mod clock;
pub mod cluster;
pub mod device;
pub mod disk;
pub mod network;
pub mod placement;

pub use clock::DeviceClock;
pub use cluster::{Cluster, DataLossReport};
pub use device::{Device, DeviceKind, DeviceState};
pub use disk::{ChunkRef, Disk};
pub use network::NetworkManager;
pub use placement::generate_placement;

/// Unique identifier for a disk
pub type DiskId = usize;

/// Unique identifier for a node
pub type NodeId = usize;

/// Unique identifier for a rack
pub type RackId = usize;

/// Unique identifier for a stripe
pub type StripeId = usize;
