//! Simulation configuration
//!
//! Every section has defaults reproducing the reference scenario: 32 racks
//! of 32 single-disk nodes holding 340000 RS(9, 6) stripes over a ten-year
//! mission. A TOML file only needs the values it overrides.

use crate::erasure::ErasureCodeConfig;
use crate::error::SimError;
use crate::simulation::FailureModel;
use crate::Result;
use serde::Deserialize;
use std::path::Path;

/// Complete configuration of a simulation batch
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub datacenter: DatacenterConfig,
    pub network: NetworkConfig,
    pub erasure_code: ErasureCodeConfig,
    pub failures: FailureModel,
    pub running: RunningConfig,
    pub batch: BatchConfig,
}

/// Topology and workload
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct DatacenterConfig {
    pub racks: usize,
    pub nodes_per_rack: usize,
    pub disks_per_node: usize,
    pub stripes: usize,
    /// GB; informational
    pub disk_capacity: u64,
    /// MB
    pub chunk_size: f64,
    /// Hours
    pub mission_time: f64,
}

impl Default for DatacenterConfig {
    fn default() -> Self {
        Self {
            racks: 32,
            nodes_per_rack: 32,
            disks_per_node: 1,
            stripes: 340_000,
            disk_capacity: 1024,
            chunk_size: 256.0,
            mission_time: 87_600.0,
        }
    }
}

impl DatacenterConfig {
    pub fn nodes(&self) -> usize {
        self.racks * self.nodes_per_rack
    }

    pub fn disks(&self) -> usize {
        self.nodes() * self.disks_per_node
    }
}

/// Repair bandwidth, MB/s
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Model bandwidth contention between repairs
    pub enabled: bool,
    pub max_cross_rack_bandwidth: f64,
    pub max_intra_rack_bandwidth: f64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_cross_rack_bandwidth: 125.0,
            max_intra_rack_bandwidth: 125.0,
        }
    }
}

/// Which failure processes the engine drives
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RunningConfig {
    /// Re-failures of nodes come from an external trace instead of draws
    pub use_trace: bool,
    /// Rack failures are cluster-wide power outages
    pub use_power_outage: bool,
    /// Model node and rack transient failures
    pub enable_transient_failure: bool,
}

/// Monte Carlo batch settings
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    pub trials: usize,
    /// Parallel workers; 0 picks the number of available cores
    pub workers: usize,
    pub seed: u64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            trials: 100,
            workers: 0,
            seed: 42,
        }
    }
}

impl BatchConfig {
    /// Worker count with 0 resolved to the available parallelism
    pub fn effective_workers(&self) -> usize {
        if self.workers > 0 {
            return self.workers;
        }
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    }
}

impl SimConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| SimError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content)
    }

    /// Load configuration from a TOML string
    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Check everything a trial relies on before any trial runs
    pub fn validate(&self) -> Result<()> {
        let dc = &self.datacenter;
        if dc.racks == 0 || dc.nodes_per_rack == 0 || dc.disks_per_node == 0 {
            return Err(SimError::InvalidConfig(
                "racks, nodes_per_rack and disks_per_node must be positive".into(),
            ));
        }
        if !(dc.chunk_size > 0.0) {
            return Err(SimError::InvalidConfig("chunk_size must be positive".into()));
        }
        if !(dc.mission_time > 0.0) {
            return Err(SimError::InvalidConfig("mission_time must be positive".into()));
        }
        if !(self.network.max_cross_rack_bandwidth > 0.0)
            || !(self.network.max_intra_rack_bandwidth > 0.0)
        {
            return Err(SimError::InvalidConfig(
                "repair bandwidths must be positive".into(),
            ));
        }
        if self.batch.trials == 0 {
            return Err(SimError::InvalidConfig("trials must be positive".into()));
        }

        self.erasure_code.validate()?;
        self.failures.validate()
    }

    /// Total chunks placed per trial
    pub fn chunk_count(&self) -> usize {
        self.datacenter.stripes * self.erasure_code.n
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::erasure::{ChunkPlacement, CodeType};
    use crate::simulation::Lifetime;

    #[test]
    fn test_defaults_match_reference_scenario() {
        let config = SimConfig::default();
        assert_eq!(config.datacenter.racks, 32);
        assert_eq!(config.datacenter.nodes_per_rack, 32);
        assert_eq!(config.datacenter.disks(), 1024);
        assert_eq!(config.chunk_count(), 340_000 * 9);
        assert_eq!(config.erasure_code, ErasureCodeConfig::rs(9, 6));
        assert!(config.network.enabled);
        assert_eq!(config.failures.rack_repair, Lifetime::weibull(1.0, 24.0, 10.0));
        assert!(!config.running.enable_transient_failure);
        config.validate().unwrap();
    }

    #[test]
    fn test_parse_overrides() {
        let config = SimConfig::parse(
            r#"
            [datacenter]
            racks = 20
            stripes = 1000

            [network]
            enabled = false

            [erasure_code]
            code_type = "lrc"
            placement = "hierarchical"
            n = 16
            k = 12
            l = 2
            lrc_data_groups = [[0, 1, 2, 3, 4, 5], [8, 9, 10, 11, 12, 13]]
            lrc_local_parity = [6, 14]
            lrc_global_parity = [7, 15]

            [failures]
            disk_fail = { kind = "constant", value = 100.0 }

            [running]
            enable_transient_failure = true

            [batch]
            trials = 8
            seed = 7
            "#,
        )
        .unwrap();

        assert_eq!(config.datacenter.racks, 20);
        assert_eq!(config.datacenter.nodes_per_rack, 32);
        assert!(!config.network.enabled);
        assert_eq!(config.erasure_code.code_type, CodeType::Lrc);
        assert_eq!(config.erasure_code.placement, ChunkPlacement::Hierarchical);
        assert_eq!(config.failures.disk_fail, Lifetime::constant(100.0));
        assert!(config.running.enable_transient_failure);
        assert_eq!(config.batch.trials, 8);
        config.validate().unwrap();
    }

    #[test]
    fn test_parse_error() {
        let err = SimConfig::parse("[datacenter]\nracks = \"many\"").unwrap_err();
        assert!(matches!(err, SimError::ConfigParse(_)));
    }

    #[test]
    fn test_missing_file() {
        let err = SimConfig::from_file(Path::new("/nonexistent/ecdc.toml")).unwrap_err();
        assert!(matches!(err, SimError::ConfigRead { .. }));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = SimConfig::default();
        config.datacenter.racks = 0;
        assert!(config.validate().is_err());

        let mut config = SimConfig::default();
        config.network.max_cross_rack_bandwidth = 0.0;
        assert!(config.validate().is_err());

        let mut config = SimConfig::default();
        config.erasure_code = ErasureCodeConfig::rs(6, 6);
        assert!(matches!(
            config.validate(),
            Err(SimError::InvalidParameters(_))
        ));
    }

    #[test]
    fn test_effective_workers() {
        let batch = BatchConfig {
            workers: 3,
            ..BatchConfig::default()
        };
        assert_eq!(batch.effective_workers(), 3);
        assert!(BatchConfig::default().effective_workers() >= 1);
    }
}
