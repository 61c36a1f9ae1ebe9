//! Splitting a mesh into Morton-range partitions on disk
//!
//! The grid is cut into `n` consecutive Morton ranges of `G³ / n` cells. With
//! `n` a power of 8 every range is an axis-aligned cube, so each partition
//! gets a world-space box and receives every triangle whose bounding box
//! touches it. Triangles on a boundary go to all partitions they touch.

pub mod buffer;

pub use buffer::{BBoxBuffer, DEFAULT_BATCH_SIZE};

use crate::error::{Result, SvoError};
use crate::geometry::AaBox;
use crate::io::reader::{TriReader, DEFAULT_BLOCK_SIZE};
use crate::io::{TriInfo, TripInfo};
use crate::morton;
use glam::{UVec3, Vec3};
use std::fs;
use tracing::{debug, info, warn};

/// Number of partitions needed to keep one partition's occupancy grid under `memory_limit_mb`
///
/// The in-core requirement is one byte per cell. It is divided by 8 until it
/// fits, so the result is always a power of 8.
///
/// # Example
///
/// ```
/// use svo::partition::estimate_partitions;
///
/// assert_eq!(estimate_partitions(1024, 2048), 1); // 1024 MB fits
/// assert_eq!(estimate_partitions(1024, 512), 8);
/// assert_eq!(estimate_partitions(4096, 100), 4096);
/// ```
pub fn estimate_partitions(gridsize: u32, memory_limit_mb: u64) -> usize {
    let required = morton::cell_count(gridsize) / 1024 / 1024;
    debug!("in-core voxelization would need {} MB", required);
    if required <= memory_limit_mb {
        return 1;
    }
    let mut partitions = 1usize;
    let mut per_partition = required;
    while per_partition > memory_limit_mb {
        per_partition /= 8;
        partitions *= 8;
    }
    info!(
        "using {} partitions of {} MB each",
        partitions, per_partition
    );
    partitions
}

/// Grid-space box covering Morton range `[start, start + len)`
pub fn grid_box(start: u64, len: u64) -> AaBox<UVec3> {
    AaBox::new(
        morton::decode_vec(start),
        morton::decode_vec(start + len - 1),
    )
}

/// World-space box of a grid box; the max corner covers the whole last cell
pub fn world_box(grid: &AaBox<UVec3>, origin: Vec3, unit: f32) -> AaBox<Vec3> {
    AaBox::new(
        origin + grid.min.as_vec3() * unit,
        origin + (grid.max + UVec3::ONE).as_vec3() * unit,
    )
}

/// Owns the files of one split and deletes them when dropped
///
/// Holding this value for the duration of a build guarantees the partition
/// files are removed on every exit path, including errors.
#[derive(Debug)]
pub struct PartitionFiles {
    info: TripInfo,
    keep: bool,
}

impl PartitionFiles {
    pub fn new(info: TripInfo) -> Self {
        Self { info, keep: false }
    }

    pub fn info(&self) -> &TripInfo {
        &self.info
    }

    /// Leave the files on disk when this guard drops
    pub fn keep(&mut self) {
        self.keep = true;
    }

    /// Disarm the guard and hand back the manifest
    pub fn into_info(mut self) -> TripInfo {
        self.keep = true;
        self.info.clone()
    }
}

impl Drop for PartitionFiles {
    fn drop(&mut self) {
        if self.keep {
            return;
        }
        match self.info.remove_files() {
            Ok(()) => debug!("removed partition files for {}", self.info.base.display()),
            Err(e) => warn!("failed to remove partition files: {}", e),
        }
    }
}

/// Split the mesh described by `tri` into `n_partitions` partition files
///
/// Writes the `.trip` manifest and returns a guard owning every file written.
pub fn partition(
    tri: &TriInfo,
    n_partitions: usize,
    gridsize: u32,
    batch_size: usize,
) -> Result<PartitionFiles> {
    let cells = morton::cell_count(gridsize);
    if n_partitions == 0
        || !(n_partitions as u64).is_power_of_two()
        || (n_partitions as u64).trailing_zeros() % 3 != 0
        || n_partitions as u64 > cells
    {
        return Err(SvoError::Config(format!(
            "partition count {n_partitions} must be a power of 8 no larger than {cells}"
        )));
    }

    // the guard covers every file that may appear, even if we fail midway
    let mut files = PartitionFiles::new(TripInfo::from_tri(tri, gridsize, vec![0; n_partitions]));

    let counts = if n_partitions == 1 {
        partition_one(tri, files.info())?
    } else {
        partition_many(tri, files.info(), n_partitions, gridsize, batch_size)?
    };

    files.info.part_tricounts = counts;
    files.info.write()?;
    info!(
        "partitioned {} triangles into {} partitions ({} stored)",
        tri.n_triangles,
        n_partitions,
        files.info.part_tricounts.iter().sum::<u64>()
    );
    Ok(files)
}

/// A single partition is the whole mesh: copy the sidecar as-is
fn partition_one(tri: &TriInfo, trip: &TripInfo) -> Result<Vec<u64>> {
    let src = tri.data_path();
    let dst = trip.partition_path(0);
    if !src.exists() {
        return Err(SvoError::MissingFile(src));
    }
    fs::copy(&src, &dst).map_err(|e| SvoError::file(&dst, e))?;
    Ok(vec![tri.n_triangles])
}

fn partition_many(
    tri: &TriInfo,
    trip: &TripInfo,
    n_partitions: usize,
    gridsize: u32,
    batch_size: usize,
) -> Result<Vec<u64>> {
    let unit = (tri.bbox.max.x - tri.bbox.min.x) / gridsize as f32;
    let morton_part = morton::cell_count(gridsize) / n_partitions as u64;

    let mut buffers: Vec<BBoxBuffer> = (0..n_partitions)
        .map(|i| {
            let grid = grid_box(i as u64 * morton_part, morton_part);
            let world = world_box(&grid, tri.bbox.min, unit);
            debug!(
                "partition {}: morton [{}, {}), grid {} to {}, world {} to {}",
                i,
                i as u64 * morton_part,
                (i as u64 + 1) * morton_part,
                grid.min,
                grid.max,
                world.min,
                world.max
            );
            BBoxBuffer::new(trip.partition_path(i), world, tri.format, batch_size)
        })
        .collect();

    let reader = TriReader::open(tri.data_path(), tri.n_triangles, tri.format, DEFAULT_BLOCK_SIZE)?;
    for t in reader {
        let t = t?;
        let bbox = t.bbox();
        for buffer in buffers.iter_mut() {
            buffer.process(&t, &bbox)?;
        }
    }

    buffers.into_iter().map(BBoxBuffer::finish).collect()
}
