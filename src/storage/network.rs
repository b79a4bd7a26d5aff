//! Repair bandwidth budgets
//!
//! Bandwidths are in MB/s. One cross-rack pool is shared by the whole
//! cluster and is held exclusively by a single repair job at a time; each
//! rack also has its own intra-rack budget.

use crate::storage::RackId;

/// Tracks available cross-rack and intra-rack repair bandwidth
#[derive(Debug, Clone)]
pub struct NetworkManager {
    enabled: bool,
    max_cross_rack: f64,
    avail_cross_rack: f64,
    max_intra_rack: Vec<f64>,
    avail_intra_rack: Vec<f64>,
}

impl NetworkManager {
    /// Create a manager for `racks` racks with full budgets
    pub fn new(enabled: bool, racks: usize, max_cross_rack: f64, max_intra_rack: f64) -> Self {
        Self {
            enabled,
            max_cross_rack,
            avail_cross_rack: max_cross_rack,
            max_intra_rack: vec![max_intra_rack; racks],
            avail_intra_rack: vec![max_intra_rack; racks],
        }
    }

    /// Whether bandwidth contention is modelled
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn max_cross_rack(&self) -> f64 {
        self.max_cross_rack
    }

    pub fn avail_cross_rack(&self) -> f64 {
        self.avail_cross_rack
    }

    /// Set the available cross-rack bandwidth; ignored above the maximum
    pub fn update_avail_cross_rack(&mut self, bandwidth: f64) -> bool {
        if bandwidth <= self.max_cross_rack {
            self.avail_cross_rack = bandwidth;
            true
        } else {
            false
        }
    }

    /// Hand the whole available cross-rack pool to one repair job
    pub fn take_cross_rack(&mut self) -> f64 {
        std::mem::replace(&mut self.avail_cross_rack, 0.0)
    }

    /// Return bandwidth held by a finished repair job
    pub fn release_cross_rack(&mut self, bandwidth: f64) -> bool {
        self.update_avail_cross_rack(self.avail_cross_rack + bandwidth)
    }

    /// Whether a new repair job could get cross-rack bandwidth right now
    pub fn cross_rack_available(&self) -> bool {
        !self.enabled || self.avail_cross_rack > 0.0
    }

    pub fn max_intra_rack(&self, rack: RackId) -> Option<f64> {
        self.max_intra_rack.get(rack).copied()
    }

    pub fn avail_intra_rack(&self, rack: RackId) -> Option<f64> {
        self.avail_intra_rack.get(rack).copied()
    }

    /// Set a rack's available intra-rack bandwidth; ignored above its
    /// maximum or for unknown racks
    pub fn update_avail_intra_rack(&mut self, rack: RackId, bandwidth: f64) -> bool {
        match (self.max_intra_rack.get(rack), self.avail_intra_rack.get_mut(rack)) {
            (Some(&max), Some(avail)) if bandwidth <= max => {
                *avail = bandwidth;
                true
            }
            _ => false,
        }
    }

    /// Restore every budget to its maximum
    pub fn reset(&mut self) {
        self.avail_cross_rack = self.max_cross_rack;
        self.avail_intra_rack.clone_from(&self.max_intra_rack);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exclusive_cross_rack_use() {
        let mut network = NetworkManager::new(true, 4, 125.0, 250.0);
        assert!(network.cross_rack_available());

        let held = network.take_cross_rack();
        assert_eq!(held, 125.0);
        assert_eq!(network.avail_cross_rack(), 0.0);
        assert!(!network.cross_rack_available());

        assert!(network.release_cross_rack(held));
        assert_eq!(network.avail_cross_rack(), 125.0);
    }

    #[test]
    fn test_no_double_credit() {
        let mut network = NetworkManager::new(true, 1, 125.0, 125.0);
        assert!(!network.release_cross_rack(125.0));
        assert_eq!(network.avail_cross_rack(), 125.0);
        assert!(!network.update_avail_cross_rack(200.0));
        assert!(network.update_avail_cross_rack(50.0));
        assert_eq!(network.avail_cross_rack(), 50.0);
    }

    #[test]
    fn test_intra_rack_budget() {
        let mut network = NetworkManager::new(true, 2, 125.0, 100.0);
        assert_eq!(network.avail_intra_rack(1), Some(100.0));
        assert_eq!(network.avail_intra_rack(2), None);

        assert!(network.update_avail_intra_rack(1, 0.0));
        assert!(!network.update_avail_intra_rack(1, 101.0));
        assert!(!network.update_avail_intra_rack(5, 1.0));
        assert_eq!(network.avail_intra_rack(1), Some(0.0));

        network.take_cross_rack();
        network.reset();
        assert_eq!(network.avail_intra_rack(1), Some(100.0));
        assert_eq!(network.avail_cross_rack(), 125.0);
    }

    #[test]
    fn test_disabled_network_never_contends() {
        let mut network = NetworkManager::new(false, 1, 125.0, 125.0);
        network.update_avail_cross_rack(0.0);
        assert!(network.cross_rack_available());
    }
}
