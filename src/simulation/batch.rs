//! Monte Carlo batches
//!
//! Trials are independent, so a batch splits them over blocking tokio tasks,
//! each owning its own [`Simulator`]. Every trial reseeds from the batch seed
//! and its own index, which keeps results identical for any worker count.

use crate::config::SimConfig;
use crate::error::SimError;
use crate::simulation::{SimResult, Simulator};
use crate::Result;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Progress message sent after every finished trial
#[derive(Debug, Clone)]
pub struct TrialUpdate {
    pub result: SimResult,
    /// Trials finished so far, this one included
    pub completed: usize,
    pub total: usize,
}

/// Pause and cancel switches shared between a batch and its observers
#[derive(Debug, Default)]
pub struct BatchControl {
    paused: AtomicBool,
    cancelled: AtomicBool,
    completed: AtomicUsize,
}

impl BatchControl {
    /// Flip the pause switch, returning the new state
    pub fn toggle_pause(&self) -> bool {
        !self.paused.fetch_xor(true, Ordering::SeqCst)
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    /// Workers stop before their next trial
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }
}

/// Aggregate statistics over finished trials
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchSummary {
    pub trials: usize,
    pub data_loss_trials: usize,
    pub total_failed_stripes: usize,
    pub total_lost_chunks: usize,
    blocked_ratio_sum: f64,
    single_chunk_ratio_sum: f64,
}

impl BatchSummary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_results<'a>(results: impl IntoIterator<Item = &'a SimResult>) -> Self {
        let mut summary = Self::new();
        for result in results {
            summary.record(result);
        }
        summary
    }

    /// Fold one trial into the totals
    pub fn record(&mut self, result: &SimResult) {
        self.trials += 1;
        if result.data_loss {
            self.data_loss_trials += 1;
        }
        self.total_failed_stripes += result.failed_stripes;
        self.total_lost_chunks += result.lost_chunks;
        self.blocked_ratio_sum += result.blocked_ratio;
        self.single_chunk_ratio_sum += result.single_chunk_repair_ratio;
    }

    /// Share of trials that lost data
    pub fn loss_probability(&self) -> f64 {
        self.mean(self.data_loss_trials as f64)
    }

    /// Half-width of the 95% normal-approximation interval around
    /// [`BatchSummary::loss_probability`]
    pub fn confidence_95(&self) -> f64 {
        if self.trials == 0 {
            return 0.0;
        }
        let p = self.loss_probability();
        1.96 * (p * (1.0 - p) / self.trials as f64).sqrt()
    }

    pub fn mean_failed_stripes(&self) -> f64 {
        self.mean(self.total_failed_stripes as f64)
    }

    pub fn mean_lost_chunks(&self) -> f64 {
        self.mean(self.total_lost_chunks as f64)
    }

    pub fn mean_blocked_ratio(&self) -> f64 {
        self.mean(self.blocked_ratio_sum)
    }

    pub fn mean_single_chunk_repair_ratio(&self) -> f64 {
        self.mean(self.single_chunk_ratio_sum)
    }

    fn mean(&self, total: f64) -> f64 {
        if self.trials == 0 {
            0.0
        } else {
            total / self.trials as f64
        }
    }
}

impl std::fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Trials:                   {}", self.trials)?;
        writeln!(f, "Trials with data loss:    {}", self.data_loss_trials)?;
        writeln!(
            f,
            "Loss probability:         {:.6} ± {:.6}",
            self.loss_probability(),
            self.confidence_95()
        )?;
        writeln!(f, "Mean failed stripes:      {:.3}", self.mean_failed_stripes())?;
        writeln!(f, "Mean lost chunks:         {:.3}", self.mean_lost_chunks())?;
        writeln!(f, "Mean blocked ratio:       {:.3e}", self.mean_blocked_ratio())?;
        write!(
            f,
            "Single-chunk repair ratio: {:.4}",
            self.mean_single_chunk_repair_ratio()
        )
    }
}

/// Runs the trials of one configuration in parallel
#[derive(Debug)]
pub struct BatchRunner {
    config: Arc<SimConfig>,
    control: Arc<BatchControl>,
}

impl BatchRunner {
    pub fn new(config: SimConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(config),
            control: Arc::new(BatchControl::default()),
        })
    }

    /// Shared pause/cancel switches
    pub fn control(&self) -> Arc<BatchControl> {
        Arc::clone(&self.control)
    }

    /// Run every trial of the batch. Each result is also sent on `progress`
    /// when given. Returns the summary and the results ordered by trial.
    pub async fn run(
        &self,
        progress: Option<mpsc::UnboundedSender<TrialUpdate>>,
    ) -> Result<(BatchSummary, Vec<SimResult>)> {
        let total = self.config.batch.trials;
        let workers = self.config.batch.effective_workers().clamp(1, total.max(1));
        info!(trials = total, workers, seed = self.config.batch.seed, "starting batch");

        let mut handles = Vec::with_capacity(workers);
        for worker in 0..workers {
            let config = Arc::clone(&self.config);
            let control = Arc::clone(&self.control);
            let progress = progress.clone();
            handles.push(tokio::task::spawn_blocking(move || {
                run_worker(&config, &control, worker, workers, progress)
            }));
        }

        let mut results = Vec::with_capacity(total);
        for handle in handles {
            let worker_results = handle
                .await
                .map_err(|e| SimError::Worker(e.to_string()))??;
            results.extend(worker_results);
        }
        results.sort_by_key(|r| r.trial);

        let summary = BatchSummary::from_results(&results);
        info!(
            trials = summary.trials,
            data_loss_trials = summary.data_loss_trials,
            loss_probability = summary.loss_probability(),
            "batch finished"
        );
        Ok((summary, results))
    }
}

/// Trials `worker, worker + workers, ...` on one thread
fn run_worker(
    config: &SimConfig,
    control: &BatchControl,
    worker: usize,
    workers: usize,
    progress: Option<mpsc::UnboundedSender<TrialUpdate>>,
) -> Result<Vec<SimResult>> {
    let total = config.batch.trials;
    let mut simulator = Simulator::new(config)?;
    let mut results = Vec::new();

    for trial in (worker..total).step_by(workers) {
        while control.is_paused() && !control.is_cancelled() {
            std::thread::sleep(Duration::from_millis(50));
        }
        if control.is_cancelled() {
            debug!(worker, "worker cancelled");
            break;
        }

        let result = simulator.run_trial(trial as u64)?;
        let completed = control.completed.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(tx) = &progress {
            // a closed dashboard does not stop the batch
            let _ = tx.send(TrialUpdate {
                result: result.clone(),
                completed,
                total,
            });
        }
        results.push(result);
    }
    Ok(results)
}
