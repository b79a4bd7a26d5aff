//! Disks: a device plus the stripe chunks it hosts.

use crate::storage::{Device, DeviceState, StripeId};

/// One chunk hosted by a disk: its stripe and its offset in that stripe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkRef {
    pub stripe: StripeId,
    pub offset: usize,
}

/// A disk and the chunks placed on it
#[derive(Debug, Clone, Default)]
pub struct Disk {
    device: Device,
    chunks: Vec<ChunkRef>,
}

impl Disk {
    /// Create a new normal, empty disk
    pub fn new() -> Self {
        Self::default()
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut Device {
        &mut self.device
    }

    pub fn state(&self) -> DeviceState {
        self.device.state()
    }

    /// Chunks hosted on this disk, in placement order
    pub fn chunks(&self) -> &[ChunkRef] {
        &self.chunks
    }

    /// Get the number of chunks stored on this disk
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    pub(crate) fn add_chunk(&mut self, stripe: StripeId, offset: usize) {
        self.chunks.push(ChunkRef { stripe, offset });
    }

    /// Normal state, fresh clock, no chunks
    pub fn reset(&mut self, now: f64) {
        self.device.reset(now);
        self.chunks.clear();
    }
}
