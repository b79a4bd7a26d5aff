//! Bandwidth-constrained disk repair scheduling
//!
//! A crashed disk is rebuilt by reading chunks of every stripe it hosts. The
//! whole cross-rack bandwidth pool is held by one repair job at a time, so a
//! repair that cannot start waits in a queue until bandwidth and its rack are
//! back. Stripes that have too many unavailable chunks to be rebuilt right now
//! are tracked as delayed until the stripe recovers.

use crate::simulation::{Event, EventHeap, EventKind, SimContext};
use crate::storage::{Cluster, DeviceState, DiskId, StripeId};
use std::collections::BTreeMap;
use tracing::{debug, trace};

/// Wait queue, delayed-repair bookkeeping and repair counters of one trial
#[derive(Debug, Default)]
pub struct RepairScheduler {
    /// Disks whose repair could not start, earliest first
    wait_queue: EventHeap,
    /// disk -> stripes that could not be rebuilt when its repair started
    delayed: BTreeMap<DiskId, Vec<StripeId>>,
    stats: RepairStats,
}

/// Counters over every repair scheduled in a trial
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RepairStats {
    /// Stripes visited by repair jobs
    pub repair_stripes: usize,
    /// Of those, stripes missing exactly one chunk
    pub single_chunk_stripes: usize,
    /// Stripes ever put on the delayed list
    pub delayed_stripes: usize,
    /// Repair jobs started
    pub jobs: usize,
}

impl RepairStats {
    /// Share of repaired stripes that were missing a single chunk
    pub fn single_chunk_repair_ratio(&self) -> f64 {
        if self.repair_stripes == 0 {
            return 0.0;
        }
        self.single_chunk_stripes as f64 / self.repair_stripes as f64
    }
}

/// Hours needed to move `chunks` chunks of `chunk_size` MB at `bandwidth` MB/s
pub fn repair_hours(chunks: usize, chunk_size: f64, bandwidth: f64) -> f64 {
    if chunks == 0 || bandwidth <= 0.0 {
        return 0.0;
    }
    chunks as f64 * chunk_size / bandwidth / 3600.0
}

impl RepairScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.wait_queue.clear();
        self.delayed.clear();
        self.stats = RepairStats::default();
    }

    pub fn stats(&self) -> RepairStats {
        self.stats
    }

    /// Disks waiting for bandwidth or their rack
    pub fn waiting(&self) -> usize {
        self.wait_queue.len()
    }

    /// Stripes currently on a delayed list
    pub fn delayed_len(&self) -> usize {
        self.delayed.values().map(Vec::len).sum()
    }

    pub fn delayed_stripes_of(&self, disk: DiskId) -> Option<&[StripeId]> {
        self.delayed.get(&disk).map(Vec::as_slice)
    }

    /// Forget the delayed stripes recorded for `disk`
    pub fn clear_delayed(&mut self, disk: DiskId) {
        self.delayed.remove(&disk);
    }

    /// Drop delayed stripes that could be rebuilt again, and disks left
    /// without any
    pub fn recheck_delayed(&mut self, cluster: &Cluster) {
        let scheme = cluster.scheme();
        self.delayed.retain(|_, stripes| {
            stripes.retain(|&stripe| !scheme.can_recover(&cluster.unavailable_offsets(stripe)));
            !stripes.is_empty()
        });
    }

    /// Retry queued repairs while the head of the queue could start
    pub fn release_waiting(&mut self, ctx: &mut SimContext, events: &mut EventHeap, now: f64) {
        while let Some(head) = self.wait_queue.peek() {
            let Some(&disk) = head.devices.first() else {
                self.wait_queue.pop();
                continue;
            };
            let Some(rack) = ctx.cluster.rack_of_disk(disk) else {
                self.wait_queue.pop();
                continue;
            };

            let rack_normal = ctx.cluster.rack_state(rack) == Some(DeviceState::Normal);
            let bandwidth_free = !ctx.network.enabled()
                || (ctx.network.avail_cross_rack() > 0.0
                    && ctx.network.avail_intra_rack(rack).unwrap_or(0.0) > 0.0);
            if !(rack_normal && bandwidth_free) {
                break;
            }

            self.wait_queue.pop();
            if ctx.cluster.disk_state(disk) == Some(DeviceState::Crashed) {
                trace!(disk, "retrying queued repair");
                self.schedule_disk_repair(ctx, events, disk, now);
            }
        }
    }

    /// Start the repair of a crashed disk, or queue it if it cannot start.
    ///
    /// The completion event carries the cross-rack bandwidth the job took.
    pub fn schedule_disk_repair(
        &mut self,
        ctx: &mut SimContext,
        events: &mut EventHeap,
        disk: DiskId,
        now: f64,
    ) {
        let Some(rack) = ctx.cluster.rack_of_disk(disk) else {
            return;
        };
        if !ctx.network.cross_rack_available()
            || ctx.cluster.rack_state(rack) != Some(DeviceState::Normal)
        {
            trace!(disk, rack, "repair queued");
            self.wait_queue
                .push(Event::single(now, EventKind::DiskFail, disk));
            return;
        }

        let cluster = &ctx.cluster;
        let scheme = cluster.scheme();
        let chunks = cluster.disk(disk).map(|d| d.chunks()).unwrap_or_default();

        let mut cross_rack_download = 0;
        let mut to_delay = Vec::new();
        for chunk in chunks {
            let Some(location) = cluster.stripe_location(chunk.stripe) else {
                continue;
            };

            let mut unavailable = Vec::new();
            let mut crashed = 0;
            let mut alive_in_rack = Vec::new();
            for (offset, &member) in location.iter().enumerate() {
                match cluster.disk_state(member) {
                    Some(DeviceState::Normal) => {
                        if cluster.rack_of_disk(member) == Some(rack) {
                            alive_in_rack.push(offset);
                        }
                    }
                    Some(DeviceState::Crashed) => {
                        crashed += 1;
                        unavailable.push(offset);
                    }
                    _ => unavailable.push(offset),
                }
            }

            self.stats.repair_stripes += 1;
            if crashed == 1 {
                self.stats.single_chunk_stripes += 1;
            }

            if !scheme.can_recover(&unavailable) {
                to_delay.push(chunk.stripe);
                continue;
            }

            let plan = scheme.repair_plan(chunk.offset, &unavailable);
            let local = plan
                .sources
                .iter()
                .filter(|offset| alive_in_rack.contains(offset))
                .count();
            cross_rack_download += plan.reads.saturating_sub(local);
        }

        let (bandwidth, carried) = if ctx.network.enabled() {
            let taken = ctx.network.take_cross_rack();
            (taken, taken)
        } else {
            (ctx.network.max_cross_rack(), 0.0)
        };
        let duration = repair_hours(cross_rack_download, ctx.chunk_size, bandwidth);
        events.push(Event::repair(now + duration, disk, carried));
        self.stats.jobs += 1;

        debug!(
            disk,
            cross_rack_download,
            bandwidth,
            duration,
            delayed = to_delay.len(),
            "disk repair scheduled"
        );

        if !to_delay.is_empty() {
            self.stats.delayed_stripes += to_delay.len();
            self.delayed.insert(disk, to_delay);
        }
    }
}
