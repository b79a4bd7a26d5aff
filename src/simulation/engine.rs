//! Discrete-event engine
//!
//! [`EventManager`] owns the event heap and the repair scheduler. Each call
//! to [`EventManager::handle_next_event`] advances the simulation by one
//! (coalesced) event and reports what happened so the trial loop can decide
//! whether to check for data loss.

use crate::simulation::{Event, EventHeap, EventKind, RepairScheduler, RepairStats, SimContext};
use crate::storage::{DeviceState, DiskId, NodeId, RackId};
use tracing::trace;

/// What one engine step did
#[derive(Debug, Clone, PartialEq)]
pub struct EventOutcome {
    pub time: f64,
    pub kind: EventKind,
    /// Devices touched. For node failures these are the disks that crashed.
    pub devices: Vec<usize>,
}

impl EventOutcome {
    fn mission_end(time: f64) -> Self {
        Self {
            time,
            kind: EventKind::MissionEnd,
            devices: Vec::new(),
        }
    }
}

/// Event queue and handlers of one trial
#[derive(Debug, Default)]
pub struct EventManager {
    events: EventHeap,
    repairs: RepairScheduler,
}

impl EventManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Draw the first failure of every device
    pub fn reset(&mut self, ctx: &mut SimContext) {
        self.events.clear();
        self.repairs.reset();

        for disk in 0..ctx.cluster.disk_count() {
            let at = ctx.next_time(ctx.failures.disk_fail, 0.0);
            if at <= ctx.mission_time {
                self.events.push(Event::single(at, EventKind::DiskFail, disk));
            }
        }

        for node in 0..ctx.cluster.node_count() {
            let at = ctx.next_time(ctx.failures.node_fail, 0.0);
            self.events.push(Event::single(at, EventKind::NodeFail, node));
            if ctx.running.enable_transient_failure {
                let at = ctx.next_time(ctx.failures.node_transient_fail, 0.0);
                self.events
                    .push(Event::single(at, EventKind::NodeTransientFail, node));
            }
        }

        if ctx.running.enable_transient_failure {
            if ctx.running.use_power_outage {
                self.schedule_power_outage(ctx, all_racks(ctx), 0.0);
            } else {
                for rack in 0..ctx.cluster.rack_count() {
                    let at = ctx.next_time(ctx.failures.rack_fail, 0.0);
                    self.events.push(Event::single(at, EventKind::RackFail, rack));
                }
            }
        }

        trace!(events = self.events.len(), "event stream initialised");
    }

    /// Queue an externally supplied event, e.g. from a failure trace
    pub fn schedule(&mut self, event: Event) {
        self.events.push(event);
    }

    pub fn pending_events(&self) -> usize {
        self.events.len()
    }

    pub fn repairs(&self) -> &RepairScheduler {
        &self.repairs
    }

    pub fn repair_stats(&self) -> RepairStats {
        self.repairs.stats()
    }

    /// Stripes still waiting on a delayed repair
    pub fn delayed_len(&self) -> usize {
        self.repairs.delayed_len()
    }

    /// Process the next event batch
    pub fn handle_next_event(&mut self, ctx: &mut SimContext, now: f64) -> EventOutcome {
        self.repairs.recheck_delayed(&ctx.cluster);
        self.repairs.release_waiting(ctx, &mut self.events, now);

        let Some(event) = self.events.pop_coalesced() else {
            return EventOutcome::mission_end(f64::INFINITY);
        };
        if event.time > ctx.mission_time {
            trace!(time = event.time, "next event is past the mission");
            return EventOutcome::mission_end(event.time);
        }

        trace!(
            time = event.time,
            kind = %event.kind,
            device_kind = ?event.device_kind(),
            devices = ?event.devices,
            "dispatching event"
        );
        let time = event.time;
        let kind = event.kind;
        let devices = match kind {
            EventKind::DiskFail => self.on_disk_fail(ctx, &event.devices, time),
            EventKind::DiskRepair => self.on_disk_repair(ctx, &event, time),
            EventKind::NodeFail => self.on_node_fail(ctx, &event.devices, time),
            EventKind::NodeTransientFail => self.on_node_transient_fail(ctx, &event.devices, time),
            EventKind::NodeTransientRepair => {
                self.on_node_transient_repair(ctx, &event.devices, time)
            }
            EventKind::RackFail => self.on_rack_fail(ctx, &event.devices, time),
            EventKind::RackRepair => self.on_rack_repair(ctx, &event.devices, time),
            EventKind::MissionEnd => return EventOutcome::mission_end(time),
        };

        EventOutcome {
            time,
            kind,
            devices,
        }
    }

    // ----- handlers -----

    fn on_disk_fail(&mut self, ctx: &mut SimContext, disks: &[DiskId], now: f64) -> Vec<usize> {
        for &disk in disks {
            self.crash_disk(ctx, disk, now);
        }
        disks.to_vec()
    }

    fn on_disk_repair(&mut self, ctx: &mut SimContext, event: &Event, now: f64) -> Vec<usize> {
        for &disk in &event.devices {
            if ctx.cluster.repair_disk(disk, now) {
                let at = ctx.next_time(ctx.failures.disk_fail, now);
                self.events.push(Event::single(at, EventKind::DiskFail, disk));
            }

            let Some(node) = ctx.cluster.node_of_disk(disk) else {
                continue;
            };
            if ctx.cluster.node_state(node) == Some(DeviceState::Crashed)
                && ctx.cluster.repair_node(node, now)
                && !ctx.running.use_trace
            {
                let at = ctx.next_time(ctx.failures.node_fail, now);
                self.events.push(Event::single(at, EventKind::NodeFail, node));
            }
        }

        if ctx.network.enabled() {
            for &bandwidth in &event.bandwidth {
                ctx.network.release_cross_rack(bandwidth);
            }
        }
        event.devices.clone()
    }

    fn on_node_fail(&mut self, ctx: &mut SimContext, nodes: &[NodeId], now: f64) -> Vec<usize> {
        let mut crashed = Vec::new();
        for &node in nodes {
            if !ctx.cluster.fail_node(node, now) {
                continue;
            }
            for disk in ctx.cluster.disks_of_node(node) {
                if self.crash_disk(ctx, disk, now) {
                    crashed.push(disk);
                }
            }
        }
        crashed
    }

    fn on_node_transient_fail(
        &mut self,
        ctx: &mut SimContext,
        nodes: &[NodeId],
        now: f64,
    ) -> Vec<usize> {
        for &node in nodes {
            if ctx.cluster.offline_node(node, now) {
                for disk in ctx.cluster.disks_of_node(node) {
                    ctx.cluster.offline_disk(disk, now);
                }
            }
            let at = ctx.next_time(ctx.failures.node_transient_repair, now);
            self.events
                .push(Event::single(at, EventKind::NodeTransientRepair, node));
        }
        nodes.to_vec()
    }

    fn on_node_transient_repair(
        &mut self,
        ctx: &mut SimContext,
        nodes: &[NodeId],
        now: f64,
    ) -> Vec<usize> {
        for &node in nodes {
            // a node under a failed rack comes back with the rack
            let rack_up = ctx
                .cluster
                .rack_of_node(node)
                .and_then(|rack| ctx.cluster.rack_state(rack))
                == Some(DeviceState::Normal);
            if rack_up && ctx.cluster.online_node(node, now) {
                for disk in ctx.cluster.disks_of_node(node) {
                    ctx.cluster.online_disk(disk, now);
                }
            }
            if !ctx.running.use_trace {
                let at = ctx.next_time(ctx.failures.node_transient_fail, now);
                self.events
                    .push(Event::single(at, EventKind::NodeTransientFail, node));
            }
        }
        nodes.to_vec()
    }

    fn on_rack_fail(&mut self, ctx: &mut SimContext, racks: &[RackId], now: f64) -> Vec<usize> {
        for &rack in racks {
            if !ctx.cluster.offline_rack(rack, now) {
                continue;
            }
            for node in ctx.cluster.nodes_of_rack(rack) {
                if ctx.cluster.offline_node(node, now) {
                    for disk in ctx.cluster.disks_of_node(node) {
                        ctx.cluster.offline_disk(disk, now);
                    }
                }
            }
        }

        if ctx.running.use_power_outage {
            let at = ctx.next_time(ctx.failures.rack_repair, now);
            self.events
                .push(Event::new(at, EventKind::RackRepair, racks.to_vec()));
        } else {
            for &rack in racks {
                let at = ctx.next_time(ctx.failures.rack_repair, now);
                self.events.push(Event::single(at, EventKind::RackRepair, rack));
            }
        }
        racks.to_vec()
    }

    fn on_rack_repair(&mut self, ctx: &mut SimContext, racks: &[RackId], now: f64) -> Vec<usize> {
        for &rack in racks {
            if !ctx.cluster.online_rack(rack, now) {
                continue;
            }
            for node in ctx.cluster.nodes_of_rack(rack) {
                if ctx.cluster.online_node(node, now) {
                    for disk in ctx.cluster.disks_of_node(node) {
                        ctx.cluster.online_disk(disk, now);
                    }
                }
            }
        }

        if ctx.running.use_power_outage {
            self.schedule_power_outage(ctx, racks.to_vec(), now);
        } else {
            for &rack in racks {
                let at = ctx.next_time(ctx.failures.rack_fail, now);
                self.events.push(Event::single(at, EventKind::RackFail, rack));
            }
        }
        racks.to_vec()
    }

    // ----- helpers -----

    /// Crash one disk and start its repair; false if it was already crashed
    fn crash_disk(&mut self, ctx: &mut SimContext, disk: DiskId, now: f64) -> bool {
        if ctx.cluster.disk_state(disk) == Some(DeviceState::Crashed) {
            return false;
        }
        self.repairs.clear_delayed(disk);
        if !ctx.cluster.fail_disk(disk, now) {
            return false;
        }
        self.repairs
            .schedule_disk_repair(ctx, &mut self.events, disk, now);
        true
    }

    /// One correlated failure of every rack in `racks`
    fn schedule_power_outage(&mut self, ctx: &mut SimContext, racks: Vec<RackId>, now: f64) {
        let at = ctx.next_time(ctx.failures.rack_fail, now);
        self.events.push(Event::new(at, EventKind::RackFail, racks));
    }
}

fn all_racks(ctx: &SimContext) -> Vec<RackId> {
    (0..ctx.cluster.rack_count()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimConfig;
    use crate::simulation::{FailureModel, Lifetime};

    /// 9 racks x 2 nodes x 1 disk, RS(9, 6), deterministic lifetimes
    fn config(failures: FailureModel) -> SimConfig {
        let mut config = SimConfig::default();
        config.datacenter.racks = 9;
        config.datacenter.nodes_per_rack = 2;
        config.datacenter.stripes = 10;
        config.datacenter.mission_time = 1000.0;
        config.failures = failures;
        config
    }

    fn quiet() -> FailureModel {
        FailureModel::constant(1.0e9)
    }

    fn started(config: &SimConfig) -> (SimContext, EventManager) {
        let mut ctx = SimContext::new(config).unwrap();
        ctx.reset(0, config.erasure_code.placement, config.datacenter.stripes)
            .unwrap();
        let mut engine = EventManager::new();
        engine.reset(&mut ctx);
        (ctx, engine)
    }

    #[test]
    fn test_reset_skips_disk_failures_past_mission() {
        let (_, engine) = started(&config(quiet()));
        // 18 node failures only
        assert_eq!(engine.pending_events(), 18);
    }

    #[test]
    fn test_reset_with_transient_failures() {
        let mut config = config(quiet());
        config.running.enable_transient_failure = true;
        let (_, engine) = started(&config);
        assert_eq!(engine.pending_events(), 18 + 18 + 9);

        config.running.use_power_outage = true;
        let (_, engine) = started(&config);
        assert_eq!(engine.pending_events(), 18 + 18 + 1);
    }

    #[test]
    fn test_empty_queue_ends_mission() {
        let mut ctx = SimContext::new(&config(quiet())).unwrap();
        let mut engine = EventManager::new();
        let outcome = engine.handle_next_event(&mut ctx, 0.0);
        assert_eq!(outcome.kind, EventKind::MissionEnd);
        assert_eq!(outcome.time, f64::INFINITY);
    }

    #[test]
    fn test_disk_fail_and_repair_return_bandwidth() {
        let (mut ctx, mut engine) = started(&config(quiet()));
        engine.schedule(Event::single(5.0, EventKind::DiskFail, 3));

        let outcome = engine.handle_next_event(&mut ctx, 0.0);
        assert_eq!(outcome.kind, EventKind::DiskFail);
        assert_eq!(outcome.devices, vec![3]);
        assert_eq!(ctx.cluster.disk_state(3), Some(DeviceState::Crashed));
        assert_eq!(ctx.network.avail_cross_rack(), 0.0);

        let outcome = engine.handle_next_event(&mut ctx, outcome.time);
        assert_eq!(outcome.kind, EventKind::DiskRepair);
        assert!(outcome.time >= 5.0);
        assert_eq!(ctx.cluster.disk_state(3), Some(DeviceState::Normal));
        assert_eq!(ctx.network.avail_cross_rack(), 125.0);
    }

    #[test]
    fn test_node_fail_cascades_and_node_repairs() {
        let mut config = config(quiet());
        config.datacenter.disks_per_node = 2;
        let (mut ctx, mut engine) = started(&config);
        engine.schedule(Event::single(1.0, EventKind::NodeFail, 0));

        let outcome = engine.handle_next_event(&mut ctx, 0.0);
        assert_eq!(outcome.kind, EventKind::NodeFail);
        assert_eq!(outcome.devices, vec![0, 1]);
        assert_eq!(ctx.cluster.node_state(0), Some(DeviceState::Crashed));
        // second disk waits for the bandwidth held by the first
        assert_eq!(engine.repairs().waiting(), 1);

        let mut now = outcome.time;
        while ctx.cluster.node_state(0) != Some(DeviceState::Normal) {
            let outcome = engine.handle_next_event(&mut ctx, now);
            assert_eq!(outcome.kind, EventKind::DiskRepair);
            now = outcome.time;
        }
        assert!(ctx.cluster.all_disks_normal(0));
        assert_eq!(engine.repairs().waiting(), 0);
    }

    #[test]
    fn test_transient_node_failure_round_trip() {
        let mut failures = quiet();
        failures.node_transient_repair = Lifetime::constant(2.0);
        let (mut ctx, mut engine) = started(&config(failures));
        engine.schedule(Event::single(10.0, EventKind::NodeTransientFail, 4));

        let outcome = engine.handle_next_event(&mut ctx, 0.0);
        assert_eq!(outcome.kind, EventKind::NodeTransientFail);
        assert_eq!(ctx.cluster.node_state(4), Some(DeviceState::Unavailable));
        assert_eq!(ctx.cluster.disk_state(4), Some(DeviceState::Unavailable));

        let outcome = engine.handle_next_event(&mut ctx, outcome.time);
        assert_eq!(outcome.kind, EventKind::NodeTransientRepair);
        assert_eq!(outcome.time, 12.0);
        assert_eq!(ctx.cluster.disk_state(4), Some(DeviceState::Normal));
        assert_eq!(ctx.cluster.disk(4).unwrap().device().unavailable_time_at(12.0), 2.0);
    }

    #[test]
    fn test_rack_fail_cascades_offline() {
        let mut failures = quiet();
        failures.rack_repair = Lifetime::constant(24.0);
        let (mut ctx, mut engine) = started(&config(failures));
        ctx.cluster.fail_disk(3, 0.0);
        engine.schedule(Event::single(50.0, EventKind::RackFail, 1));

        engine.handle_next_event(&mut ctx, 0.0);
        assert_eq!(ctx.cluster.rack_state(1), Some(DeviceState::Unavailable));
        assert_eq!(ctx.cluster.node_state(2), Some(DeviceState::Unavailable));
        assert_eq!(ctx.cluster.disk_state(2), Some(DeviceState::Unavailable));
        // crashed disks stay crashed
        assert_eq!(ctx.cluster.disk_state(3), Some(DeviceState::Crashed));

        let outcome = engine.handle_next_event(&mut ctx, 50.0);
        assert_eq!(outcome.kind, EventKind::RackRepair);
        assert_eq!(outcome.time, 74.0);
        assert_eq!(ctx.cluster.rack_state(1), Some(DeviceState::Normal));
        assert_eq!(ctx.cluster.disk_state(2), Some(DeviceState::Normal));
    }

    #[test]
    fn test_transient_repair_waits_for_rack() {
        let mut failures = quiet();
        failures.rack_repair = Lifetime::constant(24.0);
        failures.node_transient_repair = Lifetime::constant(2.0);
        let (mut ctx, mut engine) = started(&config(failures));
        engine.schedule(Event::single(50.0, EventKind::RackFail, 1));
        engine.schedule(Event::single(60.0, EventKind::NodeTransientFail, 2));

        let outcome = engine.handle_next_event(&mut ctx, 0.0);
        assert_eq!(outcome.kind, EventKind::RackFail);
        let outcome = engine.handle_next_event(&mut ctx, outcome.time);
        assert_eq!(outcome.kind, EventKind::NodeTransientFail);

        let outcome = engine.handle_next_event(&mut ctx, outcome.time);
        assert_eq!(outcome.kind, EventKind::NodeTransientRepair);
        assert_eq!(outcome.time, 62.0);
        assert_eq!(ctx.cluster.rack_state(1), Some(DeviceState::Unavailable));
        assert_eq!(ctx.cluster.node_state(2), Some(DeviceState::Unavailable));
        assert_eq!(ctx.cluster.disk_state(2), Some(DeviceState::Unavailable));

        let outcome = engine.handle_next_event(&mut ctx, outcome.time);
        assert_eq!(outcome.kind, EventKind::RackRepair);
        assert_eq!(outcome.time, 74.0);
        assert_eq!(ctx.cluster.node_state(2), Some(DeviceState::Normal));
        assert_eq!(ctx.cluster.disk_state(2), Some(DeviceState::Normal));
        let downtime = ctx.cluster.disk(2).unwrap().device().unavailable_time_at(74.0);
        assert_eq!(downtime, 24.0);
    }

    #[test]
    fn test_trace_mode_skips_transient_refail() {
        let mut failures = quiet();
        failures.node_transient_repair = Lifetime::constant(2.0);
        let mut config = config(failures);
        config.running.use_trace = true;
        let (mut ctx, mut engine) = started(&config);
        engine.schedule(Event::single(10.0, EventKind::NodeTransientFail, 4));
        assert_eq!(engine.pending_events(), 19);

        let outcome = engine.handle_next_event(&mut ctx, 0.0);
        assert_eq!(outcome.kind, EventKind::NodeTransientFail);
        // the repair replaces the consumed failure
        assert_eq!(engine.pending_events(), 19);

        let outcome = engine.handle_next_event(&mut ctx, outcome.time);
        assert_eq!(outcome.kind, EventKind::NodeTransientRepair);
        assert_eq!(ctx.cluster.node_state(4), Some(DeviceState::Normal));
        assert_eq!(engine.pending_events(), 18);

        let outcome = engine.handle_next_event(&mut ctx, outcome.time);
        assert_eq!(outcome.kind, EventKind::MissionEnd);
    }

    #[test]
    fn test_trace_mode_skips_node_refail() {
        let mut config = config(quiet());
        config.running.use_trace = true;
        let (mut ctx, mut engine) = started(&config);
        engine.schedule(Event::single(1.0, EventKind::NodeFail, 0));

        let outcome = engine.handle_next_event(&mut ctx, 0.0);
        assert_eq!(outcome.kind, EventKind::NodeFail);
        assert_eq!(engine.pending_events(), 19);

        let outcome = engine.handle_next_event(&mut ctx, outcome.time);
        assert_eq!(outcome.kind, EventKind::DiskRepair);
        assert_eq!(ctx.cluster.node_state(0), Some(DeviceState::Normal));
        // only the disk's next failure was drawn
        assert_eq!(engine.pending_events(), 19);

        // without a trace the repaired node draws its next failure too
        config.running.use_trace = false;
        let (mut ctx, mut engine) = started(&config);
        engine.schedule(Event::single(1.0, EventKind::NodeFail, 0));
        let outcome = engine.handle_next_event(&mut ctx, 0.0);
        engine.handle_next_event(&mut ctx, outcome.time);
        assert_eq!(engine.pending_events(), 20);
    }

    #[test]
    fn test_power_outage_is_cluster_wide() {
        let mut failures = quiet();
        failures.rack_fail = Lifetime::constant(100.0);
        failures.rack_repair = Lifetime::constant(10.0);
        let mut config = config(failures);
        config.running.enable_transient_failure = true;
        config.running.use_power_outage = true;
        let (mut ctx, mut engine) = started(&config);

        let outcome = engine.handle_next_event(&mut ctx, 0.0);
        assert_eq!(outcome.kind, EventKind::RackFail);
        assert_eq!(outcome.devices.len(), 9);
        assert!((0..9).all(|r| ctx.cluster.rack_state(r) == Some(DeviceState::Unavailable)));

        let outcome = engine.handle_next_event(&mut ctx, outcome.time);
        assert_eq!(outcome.kind, EventKind::RackRepair);
        assert_eq!(outcome.time, 110.0);
        assert!((0..9).all(|r| ctx.cluster.rack_state(r) == Some(DeviceState::Normal)));
    }

    #[test]
    fn test_event_past_mission_does_not_mutate() {
        let (mut ctx, mut engine) = started(&config(quiet()));
        engine.schedule(Event::single(5000.0, EventKind::DiskFail, 0));
        let outcome = engine.handle_next_event(&mut ctx, 0.0);
        assert_eq!(outcome.kind, EventKind::MissionEnd);
        assert_eq!(outcome.time, 5000.0);
        assert_eq!(ctx.cluster.disk_state(0), Some(DeviceState::Normal));
    }
}
