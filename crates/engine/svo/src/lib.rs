//! Out-of-core sparse voxel octree construction
//!
//! A triangle mesh stored as a `.tri` header plus binary records is turned
//! into a sparse voxel octree on disk without ever holding the whole grid in
//! memory:
//!
//! 1. [`partition`] splits the mesh into Morton-range cubes sized to a memory budget
//! 2. [`voxelize`] fills the cells each partition's triangles touch
//! 3. [`octree`] streams the filled cells, in Morton order, into nodes and data records
//!
//! [`build_svo`] runs all three with a [`BuildConfig`] and returns a [`BuildReport`].

pub mod config;
pub mod error;
pub mod geometry;
pub mod io;
pub mod morton;
pub mod octree;
pub mod partition;
pub mod pipeline;
pub mod report;
pub mod voxel;
pub mod voxelize;

pub use config::BuildConfig;
pub use error::{Result, SvoError};
pub use geometry::{AaBox, Triangle};
pub use io::{OctreeInfo, OctreeReader, TriFormat, TriInfo, TriReader, TriWriter, TripInfo};
pub use octree::{BuilderOptions, Node, OctreeBuilder};
pub use pipeline::{build_svo, build_svo_with_progress, PartitionProgress};
pub use report::{BuildReport, StageTimings};
pub use voxel::VoxelData;
pub use voxelize::{ColorMode, Interpolation, VoxelGrid, VoxelizeMethod, Voxelizer};

// Re-export glam for convenience
pub use glam;
