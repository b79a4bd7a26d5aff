//! Simulation module: discrete-event trials and Monte Carlo batches
//!
//! A [`Simulator`] owns everything one trial touches. Each trial starts from
//! a fresh topology and placement, drives the [`EventManager`] until the
//! mission horizon or the first data loss, and reports a [`SimResult`].

pub mod batch;
pub mod context;
pub mod engine;
pub mod event;
pub mod failure;
pub mod recovery;

pub use batch::{BatchRunner, BatchSummary, TrialUpdate};
pub use context::SimContext;
pub use engine::{EventManager, EventOutcome};
pub use event::{Event, EventHeap, EventKind};
pub use failure::{FailureDistribution, FailureModel, Lifetime, Weibull};
pub use recovery::{repair_hours, RepairScheduler, RepairStats};

use crate::config::SimConfig;
use crate::erasure::ChunkPlacement;
use crate::Result;
use tracing::{debug, info, instrument};

/// Outcome of one trial
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SimResult {
    pub trial: u64,
    /// Whether the trial ended early because a stripe became undecodable
    pub data_loss: bool,
    /// Undecodable stripes, plus stripes still on delayed repair
    pub failed_stripes: usize,
    /// Crashed chunks of undecodable stripes, plus stripes on delayed repair
    pub lost_chunks: usize,
    pub blocked_ratio: f64,
    pub single_chunk_repair_ratio: f64,
    /// Hours; the loss time, or the mission horizon
    pub end_time: f64,
}

/// Runs trials of one configuration
#[derive(Debug)]
pub struct Simulator {
    ctx: SimContext,
    engine: EventManager,
    placement: ChunkPlacement,
    stripes: usize,
}

impl Simulator {
    /// Validate `config` and build the topology it describes
    pub fn new(config: &SimConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            ctx: SimContext::new(config)?,
            engine: EventManager::new(),
            placement: config.erasure_code.placement,
            stripes: config.datacenter.stripes,
        })
    }

    pub fn context(&self) -> &SimContext {
        &self.ctx
    }

    pub fn context_mut(&mut self) -> &mut SimContext {
        &mut self.ctx
    }

    pub fn engine(&self) -> &EventManager {
        &self.engine
    }

    /// Engine access, e.g. to inject events from a failure trace after
    /// [`Simulator::reset`]
    pub fn engine_mut(&mut self) -> &mut EventManager {
        &mut self.engine
    }

    /// Rebuild state for `trial` and draw its first events
    pub fn reset(&mut self, trial: u64) -> Result<()> {
        self.ctx.reset(trial, self.placement, self.stripes)?;
        self.engine.reset(&mut self.ctx);
        Ok(())
    }

    /// Process the next event batch of the current trial
    pub fn step(&mut self, now: f64) -> EventOutcome {
        self.engine.handle_next_event(&mut self.ctx, now)
    }

    /// Run `trial` from a fresh state
    #[instrument(skip(self))]
    pub fn run_trial(&mut self, trial: u64) -> Result<SimResult> {
        self.reset(trial)?;
        Ok(self.run_reset_trial(trial))
    }

    /// Drive the already reset state until mission end or data loss
    pub fn run_reset_trial(&mut self, trial: u64) -> SimResult {
        let mission = self.ctx.mission_time;
        let mut now = 0.0;

        loop {
            let outcome = self.step(now);
            if outcome.kind == EventKind::MissionEnd || outcome.time > mission {
                break;
            }
            now = outcome.time;

            if !matches!(outcome.kind, EventKind::DiskFail | EventKind::NodeFail) {
                continue;
            }
            let report = self.ctx.cluster.check_data_loss();
            if report.is_loss() {
                let delayed = self.engine.delayed_len();
                let result = SimResult {
                    trial,
                    data_loss: true,
                    failed_stripes: report.failed_stripes + delayed,
                    lost_chunks: report.lost_chunks + delayed,
                    blocked_ratio: self.ctx.cluster.blocked_ratio(now),
                    single_chunk_repair_ratio: self.engine.repair_stats().single_chunk_repair_ratio(),
                    end_time: now,
                };
                debug!(
                    time = now,
                    failed_stripes = report.failed_stripes,
                    lost_chunks = report.lost_chunks,
                    delayed,
                    "data loss"
                );
                info!(
                    time = now,
                    failed_stripes = result.failed_stripes,
                    "trial ended with data loss"
                );
                return result;
            }
        }

        info!("trial reached mission end without data loss");
        SimResult {
            trial,
            data_loss: false,
            failed_stripes: 0,
            lost_chunks: 0,
            blocked_ratio: self.ctx.cluster.blocked_ratio(mission),
            single_chunk_repair_ratio: self.engine.repair_stats().single_chunk_repair_ratio(),
            end_time: mission,
        }
    }
}
