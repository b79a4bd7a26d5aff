//! Simulation events and the time-ordered event heap

use crate::storage::DeviceKind;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// What happened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    NodeFail,
    NodeTransientFail,
    NodeTransientRepair,
    DiskFail,
    DiskRepair,
    RackFail,
    RackRepair,
    MissionEnd,
}

impl EventKind {
    /// Device class the event's ids refer to
    pub fn device_kind(self) -> Option<DeviceKind> {
        match self {
            EventKind::NodeFail | EventKind::NodeTransientFail | EventKind::NodeTransientRepair => {
                Some(DeviceKind::Node)
            }
            EventKind::DiskFail | EventKind::DiskRepair => Some(DeviceKind::Disk),
            EventKind::RackFail | EventKind::RackRepair => Some(DeviceKind::Rack),
            EventKind::MissionEnd => None,
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            EventKind::NodeFail => "NodeFail",
            EventKind::NodeTransientFail => "NodeTransientFail",
            EventKind::NodeTransientRepair => "NodeTransientRepair",
            EventKind::DiskFail => "DiskFail",
            EventKind::DiskRepair => "DiskRepair",
            EventKind::RackFail => "RackFail",
            EventKind::RackRepair => "RackRepair",
            EventKind::MissionEnd => "MissionEnd",
        };
        f.write_str(name)
    }
}

/// A scheduled event, possibly covering a batch of devices
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub time: f64,
    pub kind: EventKind,
    pub devices: Vec<usize>,
    /// Bandwidth to credit back, one entry per carried allocation
    /// (repair completions only)
    pub bandwidth: Vec<f64>,
}

impl Event {
    pub fn new(time: f64, kind: EventKind, devices: Vec<usize>) -> Self {
        Self {
            time,
            kind,
            devices,
            bandwidth: Vec::new(),
        }
    }

    pub fn single(time: f64, kind: EventKind, device: usize) -> Self {
        Self::new(time, kind, vec![device])
    }

    /// Repair completion carrying the bandwidth it holds
    pub fn repair(time: f64, disk: usize, bandwidth: f64) -> Self {
        Self {
            time,
            kind: EventKind::DiskRepair,
            devices: vec![disk],
            bandwidth: vec![bandwidth],
        }
    }

    pub fn device_kind(&self) -> Option<DeviceKind> {
        self.kind.device_kind()
    }

    /// Fold a same-time, same-kind event into this one
    fn absorb(&mut self, other: Event) {
        self.devices.extend(other.devices);
        self.bandwidth.extend(other.bandwidth);
    }
}

struct Entry {
    event: Event,
    seq: u64,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    // BinaryHeap is a max-heap: earliest time, then lowest seq, is greatest
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .event
            .time
            .total_cmp(&self.event.time)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Min-heap of events by time; equal times pop in insertion order
#[derive(Default)]
pub struct EventHeap {
    heap: BinaryHeap<Entry>,
    next_seq: u64,
}

impl EventHeap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: Event) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Entry { event, seq });
    }

    pub fn pop(&mut self) -> Option<Event> {
        self.heap.pop().map(|entry| entry.event)
    }

    pub fn peek(&self) -> Option<&Event> {
        self.heap.peek().map(|entry| &entry.event)
    }

    /// Pop the earliest event merged with every queued event of the same
    /// time and kind
    pub fn pop_coalesced(&mut self) -> Option<Event> {
        let mut event = self.pop()?;
        // a same-time event of another kind may sit in front of more
        // matches, so set those aside and put them back afterwards
        let mut skipped = Vec::new();
        while let Some(next) = self.heap.peek() {
            if next.event.time != event.time {
                break;
            }
            let Some(entry) = self.heap.pop() else { break };
            if entry.event.kind == event.kind {
                event.absorb(entry.event);
            } else {
                skipped.push(entry);
            }
        }
        self.heap.extend(skipped);
        Some(event)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn clear(&mut self) {
        self.heap.clear();
        self.next_seq = 0;
    }
}

impl std::fmt::Debug for EventHeap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventHeap")
            .field("len", &self.heap.len())
            .field("next", &self.peek())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pop_order() {
        let mut heap = EventHeap::new();
        for time in [1.0, 6.0, 2.0] {
            heap.push(Event::single(time, EventKind::DiskFail, 0));
        }
        assert_eq!(heap.len(), 3);
        assert_eq!(heap.pop().unwrap().time, 1.0);
        assert_eq!(heap.pop().unwrap().time, 2.0);
        assert_eq!(heap.peek().unwrap().time, 6.0);
    }

    #[test]
    fn test_non_decreasing_times() {
        let mut heap = EventHeap::new();
        let times = [5.5, 0.1, 9.0, 3.3, 3.3, 7.2, 0.0, 12.0, 1.5];
        for (i, &time) in times.iter().enumerate() {
            heap.push(Event::single(time, EventKind::NodeFail, i));
        }
        let mut last = f64::NEG_INFINITY;
        while let Some(event) = heap.pop() {
            assert!(event.time >= last);
            last = event.time;
        }
        assert!(heap.is_empty());
    }

    #[test]
    fn test_ties_pop_in_insertion_order() {
        let mut heap = EventHeap::new();
        heap.push(Event::single(4.0, EventKind::NodeFail, 1));
        heap.push(Event::single(4.0, EventKind::DiskFail, 2));
        heap.push(Event::single(4.0, EventKind::RackFail, 3));

        let kinds: Vec<EventKind> = std::iter::from_fn(|| heap.pop()).map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![EventKind::NodeFail, EventKind::DiskFail, EventKind::RackFail]
        );
    }

    #[test]
    fn test_coalesce_same_time_and_kind() {
        let mut heap = EventHeap::new();
        heap.push(Event::repair(2.0, 1, 125.0));
        heap.push(Event::single(2.0, EventKind::DiskFail, 9));
        heap.push(Event::repair(2.0, 4, 0.0));
        heap.push(Event::repair(3.0, 5, 10.0));

        let batch = heap.pop_coalesced().unwrap();
        assert_eq!(batch.kind, EventKind::DiskRepair);
        assert_eq!(batch.devices, vec![1, 4]);
        assert_eq!(batch.bandwidth, vec![125.0, 0.0]);

        let next = heap.pop_coalesced().unwrap();
        assert_eq!(next.kind, EventKind::DiskFail);
        assert_eq!(next.devices, vec![9]);
        assert_eq!(heap.pop_coalesced().unwrap().time, 3.0);
        assert!(heap.pop_coalesced().is_none());
    }

    #[test]
    fn test_device_kind() {
        assert_eq!(EventKind::DiskRepair.device_kind(), Some(DeviceKind::Disk));
        assert_eq!(EventKind::RackFail.device_kind(), Some(DeviceKind::Rack));
        assert_eq!(EventKind::MissionEnd.device_kind(), None);
    }
}
