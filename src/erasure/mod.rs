//! Erasure code models
//!
//! The simulator never encodes bytes. A scheme only answers the questions
//! the repair scheduler and the data-loss check ask: which failure patterns
//! a stripe survives, and which chunks must be read to rebuild a lost one.

pub mod config;
pub mod lrc;
pub mod reed_solomon;

pub use config::{ChunkPlacement, CodeType, ErasureCodeConfig};
pub use lrc::LocalReconstructionCode;
pub use reed_solomon::ReedSolomon;

/// Role of a chunk inside a stripe, resolved by its offset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkRole {
    /// Data chunk belonging to a local group (RS data chunks use group 0)
    Data(usize),
    /// Local parity protecting one local group
    LocalParity(usize),
    /// Global parity protecting the whole stripe
    GlobalParity,
    /// Offset outside the configured layout
    NotDefined,
}

/// Chunks to read when rebuilding one lost chunk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepairPlan {
    /// Offsets the rebuild may read from
    pub sources: Vec<usize>,
    /// How many of `sources` must be read
    pub reads: usize,
}

/// Trait for erasure coding schemes
///
/// Offsets are positions inside a stripe, `0..total_chunks()`. Slices of
/// unavailable offsets always include the chunk being repaired.
pub trait ErasureScheme: std::fmt::Debug + Send + Sync {
    /// Get total number of chunks per stripe (N)
    fn total_chunks(&self) -> usize;

    /// Get the number of data chunks per stripe (K)
    fn data_chunks(&self) -> usize;

    /// Get the number of parity chunks per stripe
    fn parity_chunks(&self) -> usize {
        self.total_chunks() - self.data_chunks()
    }

    /// Largest number of chunk losses that is always survivable
    fn fault_tolerance(&self) -> usize;

    /// Role of the chunk stored at `offset`
    fn chunk_role(&self, offset: usize) -> ChunkRole;

    /// Whether a stripe can be decoded with `unavailable` chunks missing
    fn can_recover(&self, unavailable: &[usize]) -> bool;

    /// Which chunks a rebuild of `lost` reads, given the current losses
    fn repair_plan(&self, lost: usize, unavailable: &[usize]) -> RepairPlan;
}
