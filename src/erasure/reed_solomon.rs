//! Reed-Solomon (MDS) stripe model
//!
//! Any `k` of the `n` chunks reconstruct the stripe, so a stripe survives
//! as long as no more than `n - k` chunks are missing at once.

use crate::erasure::{ChunkRole, ErasureScheme, RepairPlan};

/// RS(n, k) code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReedSolomon {
    n: usize,
    k: usize,
}

impl ReedSolomon {
    /// Create a new RS(n, k) model. Parameters are checked by
    /// [`crate::erasure::ErasureCodeConfig::validate`].
    pub fn new(n: usize, k: usize) -> Self {
        Self { n, k }
    }
}

impl ErasureScheme for ReedSolomon {
    fn total_chunks(&self) -> usize {
        self.n
    }

    fn data_chunks(&self) -> usize {
        self.k
    }

    fn fault_tolerance(&self) -> usize {
        self.n - self.k
    }

    fn chunk_role(&self, offset: usize) -> ChunkRole {
        if offset < self.k {
            ChunkRole::Data(0)
        } else if offset < self.n {
            ChunkRole::GlobalParity
        } else {
            ChunkRole::NotDefined
        }
    }

    fn can_recover(&self, unavailable: &[usize]) -> bool {
        unavailable.len() <= self.n - self.k
    }

    fn repair_plan(&self, _lost: usize, unavailable: &[usize]) -> RepairPlan {
        RepairPlan {
            sources: (0..self.n).filter(|o| !unavailable.contains(o)).collect(),
            reads: self.k,
        }
    }
}
