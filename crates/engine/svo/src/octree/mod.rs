//! Sparse voxel octree nodes and the streaming builder

pub mod builder;
pub mod node;

pub use builder::{find_power_of_8, max_depth, BuilderOptions, OctreeBuilder, BINARY_DATA};
pub use node::{Node, NOCHILD, NODATA, NODE_RECORD_SIZE};
