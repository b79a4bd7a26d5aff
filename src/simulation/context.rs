//! Per-simulator state shared by the engine and the placement generator
//!
//! Each [`Simulator`](crate::Simulator) owns exactly one context, so trials
//! running on different workers never share topology, network or RNG state.

use crate::config::{RunningConfig, SimConfig};
use crate::erasure::ChunkPlacement;
use crate::simulation::{FailureDistribution, FailureModel, Lifetime};
use crate::storage::{generate_placement, Cluster, NetworkManager};
use crate::Result;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Topology, bandwidth budgets, lifetimes and randomness of one simulator
#[derive(Debug)]
pub struct SimContext {
    pub cluster: Cluster,
    pub network: NetworkManager,
    pub failures: FailureModel,
    pub running: RunningConfig,
    /// Hours
    pub mission_time: f64,
    /// MB
    pub chunk_size: f64,
    pub rng: ChaCha8Rng,
    base_seed: u64,
}

impl SimContext {
    /// Build the topology and network from `config`; nothing is placed
    /// until [`SimContext::reset`]
    pub fn new(config: &SimConfig) -> Result<Self> {
        let dc = &config.datacenter;
        let scheme = config.erasure_code.build_scheme()?;
        let cluster = Cluster::new(dc.racks, dc.nodes_per_rack, dc.disks_per_node, scheme);
        let network = NetworkManager::new(
            config.network.enabled,
            dc.racks,
            config.network.max_cross_rack_bandwidth,
            config.network.max_intra_rack_bandwidth,
        );

        Ok(Self {
            cluster,
            network,
            failures: config.failures.clone(),
            running: config.running,
            mission_time: dc.mission_time,
            chunk_size: dc.chunk_size,
            rng: ChaCha8Rng::seed_from_u64(config.batch.seed),
            base_seed: config.batch.seed,
        })
    }

    /// Fresh state for `trial`: reseed, reset devices and budgets, then
    /// regenerate the placement of `stripes` stripes
    pub fn reset(&mut self, trial: u64, placement: ChunkPlacement, stripes: usize) -> Result<()> {
        self.rng = ChaCha8Rng::seed_from_u64(self.base_seed);
        self.rng.set_stream(trial);

        self.cluster.reset(0.0);
        self.network.reset();
        generate_placement(&mut self.cluster, placement, stripes, &mut self.rng)
    }

    /// `now` plus one draw from `lifetime`
    pub fn next_time(&mut self, lifetime: Lifetime, now: f64) -> f64 {
        now + lifetime.draw(&mut self.rng)
    }
}
