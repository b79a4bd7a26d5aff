//! Device state machine shared by disks, nodes and racks
//!
//! Every transition is guarded by the current state and reports whether it
//! took effect, so repeated or stale events never double-count downtime.

use crate::storage::DeviceClock;

/// State of a physical device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceState {
    /// Device is serving its chunks
    Normal,
    /// Device is temporarily offline; its data is intact
    Unavailable,
    /// Device has failed permanently and needs a repair
    Crashed,
}

impl std::fmt::Display for DeviceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceState::Normal => write!(f, "Normal"),
            DeviceState::Unavailable => write!(f, "Unavailable"),
            DeviceState::Crashed => write!(f, "Crashed"),
        }
    }
}

/// Level of the failure-domain hierarchy a device belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceKind {
    Rack,
    Node,
    Disk,
}

impl std::fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceKind::Rack => write!(f, "rack"),
            DeviceKind::Node => write!(f, "node"),
            DeviceKind::Disk => write!(f, "disk"),
        }
    }
}

/// A rack, node or disk: its state plus its clock
#[derive(Debug, Clone)]
pub struct Device {
    state: DeviceState,
    clock: DeviceClock,
}

impl Device {
    /// Create a new normal device
    pub fn new() -> Self {
        Self {
            state: DeviceState::Normal,
            clock: DeviceClock::new(0.0),
        }
    }

    /// Get the device's current state
    pub fn state(&self) -> DeviceState {
        self.state
    }

    pub fn clock(&self) -> &DeviceClock {
        &self.clock
    }

    pub fn is_normal(&self) -> bool {
        self.state == DeviceState::Normal
    }

    pub fn is_crashed(&self) -> bool {
        self.state == DeviceState::Crashed
    }

    /// Permanent failure. An unavailable device keeps its open window.
    pub fn fail(&mut self, now: f64) -> bool {
        if self.state == DeviceState::Crashed {
            return false;
        }
        self.clock.advance(now, false);
        if self.state == DeviceState::Normal {
            self.clock.mark_unavailable(now);
        }
        self.state = DeviceState::Crashed;
        self.clock.begin_repair(now);
        true
    }

    /// Transient failure, only from Normal
    pub fn offline(&mut self, now: f64) -> bool {
        if self.state != DeviceState::Normal {
            return false;
        }
        self.clock.advance(now, false);
        self.clock.mark_unavailable(now);
        self.state = DeviceState::Unavailable;
        true
    }

    /// End of a transient failure, only from Unavailable
    pub fn online(&mut self, now: f64) -> bool {
        if self.state != DeviceState::Unavailable {
            return false;
        }
        self.clock.advance(now, false);
        self.clock.mark_available(now);
        self.state = DeviceState::Normal;
        true
    }

    /// Repair completion, only from Crashed
    pub fn repair(&mut self, now: f64) -> bool {
        if self.state != DeviceState::Crashed {
            return false;
        }
        self.clock.finish_repair(now);
        self.state = DeviceState::Normal;
        true
    }

    /// Back to Normal with a fresh clock
    pub fn reset(&mut self, now: f64) {
        self.state = DeviceState::Normal;
        self.clock.reset(now);
    }

    /// Cumulative downtime as of `now`, including an open window
    pub fn unavailable_time_at(&self, now: f64) -> f64 {
        self.clock
            .unavailable_time_at(now, self.state != DeviceState::Normal)
    }
}

impl Default for Device {
    fn default() -> Self {
        Self::new()
    }
}
