//! End-to-end build: partition, voxelize, build the octree
//!
//! Partitions are processed in index order, which is also Morton order, so
//! the voxels handed to the builder never go backwards. Partitions without
//! triangles are skipped; the builder pads over them when the next voxel
//! arrives or at finalize.

use crate::config::BuildConfig;
use crate::error::{Result, SvoError};
use crate::io::reader::TriReader;
use crate::io::{octree_base, TriInfo, TripInfo};
use crate::morton;
use crate::octree::{BuilderOptions, OctreeBuilder};
use crate::partition::{estimate_partitions, partition};
use crate::report::BuildReport;
use crate::voxelize::{VoxelGrid, Voxelizer};
use std::time::Instant;
use tracing::{debug, info};

/// Progress after one partition has been handled
#[derive(Debug, Clone, Copy)]
pub struct PartitionProgress {
    pub index: usize,
    pub total: usize,
    /// Triangles in this partition
    pub triangles: u64,
    /// Cells this partition filled
    pub voxels: u64,
}

/// Build the octree described by `config`
pub fn build_svo(config: &BuildConfig) -> Result<BuildReport> {
    build_svo_with_progress(config, |_| {})
}

/// Build the octree described by `config`, calling `progress` after every partition
pub fn build_svo_with_progress<F>(config: &BuildConfig, mut progress: F) -> Result<BuildReport>
where
    F: FnMut(&PartitionProgress),
{
    let started = Instant::now();
    config.validate()?;

    let tri = TriInfo::read(&config.input)?;
    if !tri.files_exist() {
        return Err(SvoError::MissingFile(tri.data_path()));
    }
    let gridsize = config.gridsize;
    let unit = (tri.bbox.max.x - tri.bbox.min.x) / gridsize as f32;
    if !(unit > 0.0 && unit.is_finite()) {
        return Err(SvoError::header(
            &config.input,
            format!("bounding box {} to {} has no extent", tri.bbox.min, tri.bbox.max),
        ));
    }
    let binary = tri.format.is_geometry_only();
    info!(
        "building {} from {} triangles at gridsize {} ({}{})",
        config.input.display(),
        tri.n_triangles,
        gridsize,
        config.method,
        if binary { ", binary" } else { "" }
    );

    let mut report = BuildReport {
        input: config.input.clone(),
        gridsize,
        method: config.method,
        color: config.color,
        binary,
        generate_levels: config.generate_levels && !binary,
        n_triangles: tri.n_triangles,
        ..Default::default()
    };

    // partition
    let timer = Instant::now();
    let n_partitions = estimate_partitions(gridsize, config.memory_limit_mb);
    let mut files = partition(&tri, n_partitions, gridsize, config.batch_size)?;
    if config.keep_partitions {
        files.keep();
    }
    let trip = TripInfo::read(files.info().header_path())?;
    trip.require_files()?;
    report.n_partitions = trip.n_partitions();
    report.timings.partitioning = timer.elapsed().as_secs_f64();

    // voxelize and build, one partition at a time
    let mut builder = OctreeBuilder::create(
        octree_base(&tri.base, gridsize),
        gridsize,
        BuilderOptions {
            binary,
            generate_levels: config.generate_levels,
        },
    )?;
    let voxelizer = Voxelizer::new(config.method, unit, tri.bbox.min)
        .with_interpolation(config.interpolation);
    let morton_part = morton::cell_count(gridsize) / trip.n_partitions() as u64;
    let mut grid = VoxelGrid::new(0, morton_part, !binary, config.sparseness);

    for (index, &count) in trip.part_tricounts.iter().enumerate() {
        let start = index as u64 * morton_part;
        let mut step = PartitionProgress {
            index,
            total: trip.n_partitions(),
            triangles: count,
            voxels: 0,
        };
        if count == 0 {
            debug!("partition {} is empty, skipping", index);
            report.empty_partitions += 1;
            progress(&step);
            continue;
        }

        let timer = Instant::now();
        grid.reset(start);
        let reader = TriReader::open(trip.partition_path(index), count, trip.format, config.block_size)?;
        step.voxels = voxelizer.voxelize(reader, &mut grid)?;
        if !grid.is_sparse() {
            report.dense_partitions += 1;
        }
        report.timings.voxelizing += timer.elapsed().as_secs_f64();

        let timer = Instant::now();
        grid.drain(|voxel| builder.add_voxel(&config.color.apply(voxel, gridsize)))?;
        report.timings.building += timer.elapsed().as_secs_f64();

        report.triangles_processed += count;
        report.voxels_filled += step.voxels;
        progress(&step);
    }

    let timer = Instant::now();
    let octree = builder.finalize()?;
    report.timings.building += timer.elapsed().as_secs_f64();
    drop(files);

    report.output = octree.header_path();
    report.n_nodes = octree.n_nodes;
    report.n_data = octree.n_data;
    report.timings.total = started.elapsed().as_secs_f64();
    info!(
        "wrote {}: {} voxels, {} nodes, {} data records in {:.2}s",
        report.output.display(),
        report.voxels_filled,
        report.n_nodes,
        report.n_data,
        report.timings.total
    );
    Ok(report)
}
