//! Build statistics returned by the pipeline

use crate::voxelize::{ColorMode, VoxelizeMethod};
use serde::Serialize;
use std::path::PathBuf;

/// Wall-clock seconds spent per stage
#[derive(Debug, Clone, Default, Serialize)]
pub struct StageTimings {
    pub partitioning: f64,
    pub voxelizing: f64,
    pub building: f64,
    pub total: f64,
}

/// What one build did and how long it took
#[derive(Debug, Clone, Default, Serialize)]
pub struct BuildReport {
    pub input: PathBuf,
    /// `.octree` header written
    pub output: PathBuf,
    pub gridsize: u32,
    pub method: VoxelizeMethod,
    pub color: ColorMode,
    /// Geometry-only input, built without payload
    pub binary: bool,
    pub generate_levels: bool,
    pub n_partitions: usize,
    /// Partitions with no triangles, never voxelized
    pub empty_partitions: usize,
    /// Partitions whose side list overflowed into a dense scan
    pub dense_partitions: usize,
    pub n_triangles: u64,
    /// Triangles read back from partitions, boundary duplicates included
    pub triangles_processed: u64,
    pub voxels_filled: u64,
    pub n_nodes: u64,
    pub n_data: u64,
    pub timings: StageTimings,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serializes_as_json() {
        let mut report = BuildReport {
            gridsize: 64,
            method: VoxelizeMethod::Huang,
            color: ColorMode::Linear,
            ..Default::default()
        };
        report.timings.building = 1.5;
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["gridsize"], 64);
        assert_eq!(json["method"], "huang");
        assert_eq!(json["color"], "linear");
        assert_eq!(json["timings"]["building"], 1.5);
    }
}
