//! Cluster topology for the simulator
//!
//! Racks, nodes and disks live in flat vectors indexed by id. Rack `r` owns
//! the contiguous node range `r * nodes_per_rack ..`, and node `n` owns the
//! disk range `n * disks_per_node ..`. The cluster also owns the stripe
//! placement map and the set of crashed disks, and answers the data-loss and
//! blocked-time queries the trial orchestrator asks after each event.

use crate::erasure::ErasureScheme;
use crate::storage::{Device, DeviceState, Disk, DiskId, NodeId, RackId, StripeId};
use std::collections::{BTreeSet, HashSet};
use std::ops::Range;

/// Racks, nodes, disks and stripe placement of one simulated data center
#[derive(Debug)]
pub struct Cluster {
    racks: Vec<Device>,
    nodes: Vec<Device>,
    disks: Vec<Disk>,
    nodes_per_rack: usize,
    disks_per_node: usize,
    /// stripe id -> disk of every chunk, by offset
    stripes: Vec<Vec<DiskId>>,
    /// Currently crashed disks
    failed_disks: BTreeSet<DiskId>,
    scheme: Box<dyn ErasureScheme>,
}

/// Result of a data-loss evaluation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DataLossReport {
    /// Stripes that can no longer be decoded
    pub failed_stripes: usize,
    /// Crashed chunks belonging to those stripes
    pub lost_chunks: usize,
}

impl DataLossReport {
    pub fn is_loss(&self) -> bool {
        self.failed_stripes > 0
    }
}

impl Cluster {
    /// Create a cluster with every device normal and no stripes placed
    pub fn new(
        racks: usize,
        nodes_per_rack: usize,
        disks_per_node: usize,
        scheme: Box<dyn ErasureScheme>,
    ) -> Self {
        let node_count = racks * nodes_per_rack;
        Self {
            racks: vec![Device::new(); racks],
            nodes: vec![Device::new(); node_count],
            disks: vec![Disk::new(); node_count * disks_per_node],
            nodes_per_rack,
            disks_per_node,
            stripes: Vec::new(),
            failed_disks: BTreeSet::new(),
            scheme,
        }
    }

    /// Erasure code protecting every stripe
    pub fn scheme(&self) -> &dyn ErasureScheme {
        self.scheme.as_ref()
    }

    pub fn rack_count(&self) -> usize {
        self.racks.len()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn disk_count(&self) -> usize {
        self.disks.len()
    }

    pub fn nodes_per_rack(&self) -> usize {
        self.nodes_per_rack
    }

    pub fn disks_per_node(&self) -> usize {
        self.disks_per_node
    }

    pub fn stripe_count(&self) -> usize {
        self.stripes.len()
    }

    /// Total number of placed chunks
    pub fn chunk_count(&self) -> usize {
        self.stripes.iter().map(Vec::len).sum()
    }

    // ----- hierarchy -----

    pub fn node_of_disk(&self, disk: DiskId) -> Option<NodeId> {
        (disk < self.disks.len()).then(|| disk / self.disks_per_node)
    }

    pub fn rack_of_node(&self, node: NodeId) -> Option<RackId> {
        (node < self.nodes.len()).then(|| node / self.nodes_per_rack)
    }

    pub fn rack_of_disk(&self, disk: DiskId) -> Option<RackId> {
        self.node_of_disk(disk).and_then(|node| self.rack_of_node(node))
    }

    /// Disks of `node`; empty for an unknown node
    pub fn disks_of_node(&self, node: NodeId) -> Range<DiskId> {
        if node >= self.nodes.len() {
            return 0..0;
        }
        node * self.disks_per_node..(node + 1) * self.disks_per_node
    }

    /// Nodes of `rack`; empty for an unknown rack
    pub fn nodes_of_rack(&self, rack: RackId) -> Range<NodeId> {
        if rack >= self.racks.len() {
            return 0..0;
        }
        rack * self.nodes_per_rack..(rack + 1) * self.nodes_per_rack
    }

    /// Disks of every node in `rack`
    pub fn disks_of_rack(&self, rack: RackId) -> Range<DiskId> {
        let nodes = self.nodes_of_rack(rack);
        nodes.start * self.disks_per_node..nodes.end * self.disks_per_node
    }

    // ----- state queries -----

    pub fn disk(&self, disk: DiskId) -> Option<&Disk> {
        self.disks.get(disk)
    }

    pub fn node(&self, node: NodeId) -> Option<&Device> {
        self.nodes.get(node)
    }

    pub fn rack(&self, rack: RackId) -> Option<&Device> {
        self.racks.get(rack)
    }

    pub fn disk_state(&self, disk: DiskId) -> Option<DeviceState> {
        self.disks.get(disk).map(Disk::state)
    }

    pub fn node_state(&self, node: NodeId) -> Option<DeviceState> {
        self.nodes.get(node).map(Device::state)
    }

    pub fn rack_state(&self, rack: RackId) -> Option<DeviceState> {
        self.racks.get(rack).map(Device::state)
    }

    /// Currently crashed disks, in id order
    pub fn failed_disks(&self) -> impl Iterator<Item = DiskId> + '_ {
        self.failed_disks.iter().copied()
    }

    pub fn failed_disk_count(&self) -> usize {
        self.failed_disks.len()
    }

    // ----- disk transitions -----

    pub fn fail_disk(&mut self, disk: DiskId, now: f64) -> bool {
        let changed = self
            .disks
            .get_mut(disk)
            .is_some_and(|d| d.device_mut().fail(now));
        if changed {
            self.failed_disks.insert(disk);
        }
        changed
    }

    pub fn repair_disk(&mut self, disk: DiskId, now: f64) -> bool {
        let changed = self
            .disks
            .get_mut(disk)
            .is_some_and(|d| d.device_mut().repair(now));
        if changed {
            self.failed_disks.remove(&disk);
        }
        changed
    }

    pub fn offline_disk(&mut self, disk: DiskId, now: f64) -> bool {
        self.disks
            .get_mut(disk)
            .is_some_and(|d| d.device_mut().offline(now))
    }

    pub fn online_disk(&mut self, disk: DiskId, now: f64) -> bool {
        self.disks
            .get_mut(disk)
            .is_some_and(|d| d.device_mut().online(now))
    }

    // ----- node transitions -----

    pub fn fail_node(&mut self, node: NodeId, now: f64) -> bool {
        self.nodes.get_mut(node).is_some_and(|n| n.fail(now))
    }

    /// Repair a crashed node; refused while any of its disks is not normal
    pub fn repair_node(&mut self, node: NodeId, now: f64) -> bool {
        if !self.all_disks_normal(node) {
            return false;
        }
        self.nodes.get_mut(node).is_some_and(|n| n.repair(now))
    }

    pub fn offline_node(&mut self, node: NodeId, now: f64) -> bool {
        self.nodes.get_mut(node).is_some_and(|n| n.offline(now))
    }

    pub fn online_node(&mut self, node: NodeId, now: f64) -> bool {
        self.nodes.get_mut(node).is_some_and(|n| n.online(now))
    }

    /// Whether every disk of `node` is normal
    pub fn all_disks_normal(&self, node: NodeId) -> bool {
        self.disks_of_node(node)
            .all(|disk| self.disk_state(disk) == Some(DeviceState::Normal))
    }

    // ----- rack transitions -----

    pub fn offline_rack(&mut self, rack: RackId, now: f64) -> bool {
        self.racks.get_mut(rack).is_some_and(|r| r.offline(now))
    }

    pub fn online_rack(&mut self, rack: RackId, now: f64) -> bool {
        self.racks.get_mut(rack).is_some_and(|r| r.online(now))
    }

    // ----- placement -----

    /// Record a new stripe whose chunk at offset `i` lives on `disks[i]`
    pub(crate) fn place_stripe(&mut self, disks: Vec<DiskId>) -> StripeId {
        let stripe = self.stripes.len();
        for (offset, &disk) in disks.iter().enumerate() {
            self.disks[disk].add_chunk(stripe, offset);
        }
        self.stripes.push(disks);
        stripe
    }

    /// Disks holding each chunk of `stripe`, by offset
    pub fn stripe_location(&self, stripe: StripeId) -> Option<&[DiskId]> {
        self.stripes.get(stripe).map(Vec::as_slice)
    }

    /// Offsets of `stripe` whose disk is not normal
    pub fn unavailable_offsets(&self, stripe: StripeId) -> Vec<usize> {
        self.offsets_where(stripe, |state| state != DeviceState::Normal)
    }

    /// Offsets of `stripe` whose disk is crashed
    pub fn crashed_offsets(&self, stripe: StripeId) -> Vec<usize> {
        self.offsets_where(stripe, |state| state == DeviceState::Crashed)
    }

    fn offsets_where(&self, stripe: StripeId, pred: impl Fn(DeviceState) -> bool) -> Vec<usize> {
        self.stripe_location(stripe)
            .unwrap_or_default()
            .iter()
            .enumerate()
            .filter(|&(_, &disk)| self.disk_state(disk).is_some_and(&pred))
            .map(|(offset, _)| offset)
            .collect()
    }

    // ----- trial lifecycle -----

    /// Every device back to normal with fresh clocks; placement cleared
    pub fn reset(&mut self, now: f64) {
        for rack in &mut self.racks {
            rack.reset(now);
        }
        for node in &mut self.nodes {
            node.reset(now);
        }
        for disk in &mut self.disks {
            disk.reset(now);
        }
        self.stripes.clear();
        self.failed_disks.clear();
    }

    // ----- metrics -----

    /// Evaluate every stripe touched by a crashed disk against the scheme
    pub fn check_data_loss(&self) -> DataLossReport {
        let mut report = DataLossReport::default();
        let mut visited = HashSet::new();

        for &disk in &self.failed_disks {
            for chunk in self.disks[disk].chunks() {
                if !visited.insert(chunk.stripe) {
                    continue;
                }
                let crashed = self.crashed_offsets(chunk.stripe);
                if !self.scheme.can_recover(&crashed) {
                    report.failed_stripes += 1;
                    report.lost_chunks += crashed.len();
                }
            }
        }
        report
    }

    /// Share of chunk-time spent unavailable up to `now`.
    /// Each disk's downtime is weighted by the chunks it hosts.
    pub fn blocked_ratio(&self, now: f64) -> f64 {
        let chunks = self.chunk_count();
        if now <= 0.0 || chunks == 0 {
            return 0.0;
        }
        let blocked: f64 = self
            .disks
            .iter()
            .map(|disk| disk.device().unavailable_time_at(now) * disk.chunk_count() as f64)
            .sum();
        blocked / (chunks as f64 * now)
    }
}
