//! Erasure code configuration.

use crate::erasure::{ErasureScheme, LocalReconstructionCode, ReedSolomon};
use crate::error::SimError;
use crate::Result;
use serde::Deserialize;

/// Family of erasure code protecting each stripe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodeType {
    /// Reed-Solomon
    #[default]
    Rs,
    /// Locally repairable code
    Lrc,
}

/// How the chunks of one stripe are spread over failure domains
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkPlacement {
    /// Every chunk in a different rack
    #[default]
    Flat,
    /// Several chunks per rack, on distinct nodes, bounded by the code's
    /// fault tolerance
    Hierarchical,
}

/// Erasure code parameters: stripe width `n`, data chunks `k`, and for LRC
/// the group layout.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ErasureCodeConfig {
    pub code_type: CodeType,
    pub placement: ChunkPlacement,
    pub n: usize,
    pub k: usize,
    /// Number of local groups (LRC only)
    pub l: usize,
    /// Data chunk offsets of every local group (LRC only)
    pub lrc_data_groups: Vec<Vec<usize>>,
    /// Local parity offset of every local group (LRC only)
    pub lrc_local_parity: Vec<usize>,
    /// Global parity offsets (LRC only)
    pub lrc_global_parity: Vec<usize>,
}

impl Default for ErasureCodeConfig {
    fn default() -> Self {
        Self::rs(9, 6)
    }
}

impl ErasureCodeConfig {
    /// Flat RS(n, k)
    pub fn rs(n: usize, k: usize) -> Self {
        Self {
            code_type: CodeType::Rs,
            placement: ChunkPlacement::Flat,
            n,
            k,
            l: 0,
            lrc_data_groups: Vec::new(),
            lrc_local_parity: Vec::new(),
            lrc_global_parity: Vec::new(),
        }
    }

    /// Flat LRC with an explicit group layout; `l` is the number of groups
    pub fn lrc(
        n: usize,
        k: usize,
        data_groups: Vec<Vec<usize>>,
        local_parity: Vec<usize>,
        global_parity: Vec<usize>,
    ) -> Self {
        Self {
            code_type: CodeType::Lrc,
            placement: ChunkPlacement::Flat,
            n,
            k,
            l: data_groups.len(),
            lrc_data_groups: data_groups,
            lrc_local_parity: local_parity,
            lrc_global_parity: global_parity,
        }
    }

    /// Same parameters with a different placement policy
    pub fn with_placement(mut self, placement: ChunkPlacement) -> Self {
        self.placement = placement;
        self
    }

    /// `k >= 1`, `n > k`, and `l > 0` for LRC
    pub fn is_valid(&self) -> bool {
        if self.k < 1 || self.n <= self.k {
            return false;
        }
        !(self.code_type == CodeType::Lrc && self.l == 0)
    }

    /// Validate the parameters, describing the first violation
    pub fn validate(&self) -> Result<()> {
        if self.k < 1 {
            return Err(SimError::InvalidParameters("k must be at least 1".into()));
        }
        if self.n <= self.k {
            return Err(SimError::InvalidParameters(format!(
                "n ({}) must be greater than k ({})",
                self.n, self.k
            )));
        }
        if self.code_type == CodeType::Lrc && self.l == 0 {
            return Err(SimError::InvalidParameters(
                "LRC needs at least one local group".into(),
            ));
        }
        Ok(())
    }

    /// Build the scheme model used by placement, repair and loss checks
    pub fn build_scheme(&self) -> Result<Box<dyn ErasureScheme>> {
        self.validate()?;
        match self.code_type {
            CodeType::Rs => Ok(Box::new(ReedSolomon::new(self.n, self.k))),
            CodeType::Lrc => {
                if self.l != self.lrc_data_groups.len() {
                    return Err(SimError::InvalidParameters(format!(
                        "l = {} but {} data groups were given",
                        self.l,
                        self.lrc_data_groups.len()
                    )));
                }
                let lrc = LocalReconstructionCode::new(
                    self.n,
                    self.k,
                    self.lrc_data_groups.clone(),
                    self.lrc_local_parity.clone(),
                    self.lrc_global_parity.clone(),
                )?;
                Ok(Box::new(lrc))
            }
        }
    }
}
