//! Stripe placement generator
//!
//! Assigns every stripe of a trial to a set of disks spread across failure
//! domains. Placement is rebuilt on every trial reset.

use crate::erasure::ChunkPlacement;
use crate::error::SimError;
use crate::storage::{Cluster, DiskId, NodeId, RackId};
use crate::Result;
use rand::seq::index;
use rand::Rng;
use tracing::debug;

/// Place `stripes` stripes on `cluster` using `policy`.
///
/// The cluster must have been reset first; chunks are appended to the disks'
/// membership lists.
pub fn generate_placement<R: Rng + ?Sized>(
    cluster: &mut Cluster,
    policy: ChunkPlacement,
    stripes: usize,
    rng: &mut R,
) -> Result<()> {
    if cluster.disks_per_node() == 0 || cluster.nodes_per_rack() == 0 {
        return Err(SimError::InvalidConfig(
            "topology has no disks to place chunks on".into(),
        ));
    }

    match policy {
        ChunkPlacement::Flat => place_flat(cluster, stripes, rng)?,
        ChunkPlacement::Hierarchical => place_hierarchical(cluster, stripes, rng)?,
    }

    debug!(
        ?policy,
        stripes = cluster.stripe_count(),
        chunks = cluster.chunk_count(),
        "placement generated"
    );
    Ok(())
}

/// One chunk per rack, `n` distinct racks per stripe
fn place_flat<R: Rng + ?Sized>(cluster: &mut Cluster, stripes: usize, rng: &mut R) -> Result<()> {
    let width = cluster.scheme().total_chunks();
    let racks = cluster.rack_count();
    if racks < width {
        return Err(SimError::InsufficientRacks {
            required: width,
            available: racks,
        });
    }

    for _ in 0..stripes {
        let disks: Vec<DiskId> = index::sample(rng, racks, width)
            .into_iter()
            .map(|rack| random_disk_in_rack(cluster, rack, rng))
            .collect();
        cluster.place_stripe(disks);
    }
    Ok(())
}

/// At most `fault_tolerance` chunks per rack, each on its own node.
/// Offsets are assigned in order so neighbouring chunks share a rack.
fn place_hierarchical<R: Rng + ?Sized>(
    cluster: &mut Cluster,
    stripes: usize,
    rng: &mut R,
) -> Result<()> {
    let width = cluster.scheme().total_chunks();
    let per_rack = cluster.scheme().fault_tolerance().min(width);
    if per_rack == 0 {
        return Err(SimError::Unsupported(
            "hierarchical placement needs a code tolerating at least one failure".into(),
        ));
    }

    let racks_needed = width.div_ceil(per_rack);
    if cluster.rack_count() < racks_needed {
        return Err(SimError::InsufficientRacks {
            required: racks_needed,
            available: cluster.rack_count(),
        });
    }
    if cluster.nodes_per_rack() < per_rack {
        return Err(SimError::InsufficientNodes {
            required: per_rack,
            available: cluster.nodes_per_rack(),
        });
    }

    for _ in 0..stripes {
        let mut disks = Vec::with_capacity(width);
        for (slot, rack) in index::sample(rng, cluster.rack_count(), racks_needed)
            .into_iter()
            .enumerate()
        {
            let chunks_here = per_rack.min(width - slot * per_rack);
            let first_node = cluster.nodes_of_rack(rack).start;
            for node in index::sample(rng, cluster.nodes_per_rack(), chunks_here) {
                disks.push(random_disk_in_node(cluster, first_node + node, rng));
            }
        }
        cluster.place_stripe(disks);
    }
    Ok(())
}

fn random_disk_in_rack<R: Rng + ?Sized>(cluster: &Cluster, rack: RackId, rng: &mut R) -> DiskId {
    let disks = cluster.disks_of_rack(rack);
    rng.gen_range(disks)
}

fn random_disk_in_node<R: Rng + ?Sized>(cluster: &Cluster, node: NodeId, rng: &mut R) -> DiskId {
    let disks = cluster.disks_of_node(node);
    rng.gen_range(disks)
}
