//! Per-device time bookkeeping
//!
//! All times are simulation hours.

/// Running, repair and downtime accounting for one physical device
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeviceClock {
    /// Time the device has been running since creation or its last repair
    local_time: f64,
    /// Simulation time at which the current epoch started
    global_time: f64,
    /// Length of the current repair episode
    repair_time: f64,
    /// When the current repair episode started
    repair_start: f64,
    /// Last time `advance` was called
    last_update: f64,
    /// When the current unavailability window opened
    unavailable_start: f64,
    /// Cumulative closed unavailability
    unavailable_time: f64,
}

impl DeviceClock {
    /// Create a clock whose epoch starts at `now`
    pub fn new(now: f64) -> Self {
        Self {
            global_time: now,
            last_update: now,
            ..Self::default()
        }
    }

    /// Restore the initial values for a new trial
    pub fn reset(&mut self, now: f64) {
        *self = Self::new(now);
    }

    /// Move the clock forward to `now`; `crashed` keeps the repair episode
    /// length current.
    pub fn advance(&mut self, now: f64, crashed: bool) {
        self.local_time += (now - self.last_update).max(0.0);
        self.last_update = now;
        self.repair_time = if crashed { now - self.repair_start } else { 0.0 };
    }

    /// Open an unavailability window
    pub fn mark_unavailable(&mut self, now: f64) {
        self.unavailable_start = now;
    }

    /// Close the unavailability window, adding its length to the total
    pub fn mark_available(&mut self, now: f64) {
        self.unavailable_time += (now - self.unavailable_start).max(0.0);
    }

    /// Start a repair episode
    pub fn begin_repair(&mut self, now: f64) {
        self.repair_start = now;
        self.repair_time = 0.0;
    }

    /// Close the repair episode and start a fresh measurement epoch
    pub fn finish_repair(&mut self, now: f64) {
        self.mark_available(now);
        self.global_time = now;
        self.last_update = now;
        self.local_time = 0.0;
        self.repair_time = 0.0;
    }

    pub fn local_time(&self) -> f64 {
        self.local_time
    }

    pub fn global_time(&self) -> f64 {
        self.global_time
    }

    pub fn repair_time(&self) -> f64 {
        self.repair_time
    }

    pub fn repair_start(&self) -> f64 {
        self.repair_start
    }

    pub fn unavailable_start(&self) -> f64 {
        self.unavailable_start
    }

    /// Cumulative downtime over closed windows
    pub fn unavailable_time(&self) -> f64 {
        self.unavailable_time
    }

    /// Cumulative downtime as of `now`, counting an open window if `down`
    pub fn unavailable_time_at(&self, now: f64, down: bool) -> f64 {
        if down {
            self.unavailable_time + (now - self.unavailable_start).max(0.0)
        } else {
            self.unavailable_time
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unavailable_window() {
        let mut clock = DeviceClock::new(0.0);
        clock.mark_unavailable(10.0);
        assert_eq!(clock.unavailable_time_at(15.0, true), 5.0);
        assert_eq!(clock.unavailable_time(), 0.0);

        clock.mark_available(18.0);
        assert_eq!(clock.unavailable_time(), 8.0);
        assert_eq!(clock.unavailable_time_at(30.0, false), 8.0);
    }

    #[test]
    fn test_repair_epoch() {
        let mut clock = DeviceClock::new(0.0);
        clock.advance(100.0, false);
        assert_eq!(clock.local_time(), 100.0);

        clock.mark_unavailable(100.0);
        clock.begin_repair(100.0);
        clock.advance(104.0, true);
        assert_eq!(clock.repair_time(), 4.0);

        clock.finish_repair(110.0);
        assert_eq!(clock.unavailable_time(), 10.0);
        assert_eq!(clock.local_time(), 0.0);
        assert_eq!(clock.repair_time(), 0.0);
        assert_eq!(clock.global_time(), 110.0);
    }

    #[test]
    fn test_reset() {
        let mut clock = DeviceClock::new(0.0);
        clock.mark_unavailable(1.0);
        clock.mark_available(3.0);
        clock.reset(0.0);
        assert_eq!(clock, DeviceClock::new(0.0));
    }
}
