//! Locally repairable code (LRC) stripe model
//!
//! A stripe of `n` chunks holds `k` data chunks split into `l` local groups,
//! one local parity per group and `n - k - l` global parities. A single loss
//! inside a group is rebuilt from that group alone; anything beyond one loss
//! per group has to be absorbed by the global parities.

use crate::erasure::{ChunkRole, ErasureScheme, RepairPlan};
use crate::error::SimError;
use crate::Result;

/// LRC stripe layout with per-group data offsets
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalReconstructionCode {
    n: usize,
    k: usize,
    groups: Vec<Vec<usize>>,
    local_parity: Vec<usize>,
    global_parity: Vec<usize>,
}

impl LocalReconstructionCode {
    /// Build an LRC model, checking that the offsets partition `0..n`.
    pub fn new(
        n: usize,
        k: usize,
        groups: Vec<Vec<usize>>,
        local_parity: Vec<usize>,
        global_parity: Vec<usize>,
    ) -> Result<Self> {
        if groups.is_empty() {
            return Err(SimError::InvalidParameters(
                "LRC needs at least one local group".to_string(),
            ));
        }
        if groups.len() != local_parity.len() {
            return Err(SimError::InvalidParameters(format!(
                "LRC has {} local groups but {} local parities",
                groups.len(),
                local_parity.len()
            )));
        }
        let data_count: usize = groups.iter().map(Vec::len).sum();
        if data_count != k {
            return Err(SimError::InvalidParameters(format!(
                "LRC groups hold {} data chunks, expected k = {}",
                data_count, k
            )));
        }

        let mut seen = vec![false; n];
        let all_offsets = groups
            .iter()
            .flatten()
            .chain(local_parity.iter())
            .chain(global_parity.iter());
        for &offset in all_offsets {
            if offset >= n {
                return Err(SimError::InvalidParameters(format!(
                    "LRC offset {} is outside a stripe of {} chunks",
                    offset, n
                )));
            }
            if seen[offset] {
                return Err(SimError::InvalidParameters(format!(
                    "LRC offset {} is assigned twice",
                    offset
                )));
            }
            seen[offset] = true;
        }
        if let Some(missing) = seen.iter().position(|s| !s) {
            return Err(SimError::InvalidParameters(format!(
                "LRC offset {} has no role",
                missing
            )));
        }

        Ok(Self {
            n,
            k,
            groups,
            local_parity,
            global_parity,
        })
    }

    /// Number of local groups (L)
    pub fn local_groups(&self) -> usize {
        self.groups.len()
    }

    /// Data chunks plus the local parity of `group`
    fn group_members(&self, group: usize) -> impl Iterator<Item = usize> + '_ {
        self.groups[group]
            .iter()
            .copied()
            .chain(std::iter::once(self.local_parity[group]))
    }
}

impl ErasureScheme for LocalReconstructionCode {
    fn total_chunks(&self) -> usize {
        self.n
    }

    fn data_chunks(&self) -> usize {
        self.k
    }

    fn fault_tolerance(&self) -> usize {
        self.global_parity.len() + 1
    }

    fn chunk_role(&self, offset: usize) -> ChunkRole {
        if let Some(group) = self.local_parity.iter().position(|&o| o == offset) {
            return ChunkRole::LocalParity(group);
        }
        if self.global_parity.contains(&offset) {
            return ChunkRole::GlobalParity;
        }
        match self.groups.iter().position(|g| g.contains(&offset)) {
            Some(group) => ChunkRole::Data(group),
            None => ChunkRole::NotDefined,
        }
    }

    fn can_recover(&self, unavailable: &[usize]) -> bool {
        // Each group repairs one of its own losses; the rest needs globals.
        let mut excess = 0;
        for group in 0..self.groups.len() {
            let lost = self
                .group_members(group)
                .filter(|o| unavailable.contains(o))
                .count();
            excess += lost.saturating_sub(1);
        }
        excess += self
            .global_parity
            .iter()
            .filter(|o| unavailable.contains(o))
            .count();
        excess <= self.global_parity.len()
    }

    fn repair_plan(&self, lost: usize, unavailable: &[usize]) -> RepairPlan {
        if let ChunkRole::Data(group) | ChunkRole::LocalParity(group) = self.chunk_role(lost) {
            let others: Vec<usize> = self.group_members(group).filter(|&o| o != lost).collect();
            if others.iter().all(|o| !unavailable.contains(o)) {
                let reads = others.len();
                return RepairPlan {
                    sources: others,
                    reads,
                };
            }
        }

        RepairPlan {
            sources: (0..self.n).filter(|o| !unavailable.contains(o)).collect(),
            reads: self.k,
        }
    }
}
