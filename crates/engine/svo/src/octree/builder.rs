//! Streaming bottom-up octree construction
//!
//! Voxels arrive in Morton order. One small buffer per depth collects
//! siblings; as soon as a buffer holds 8 nodes they are written out and
//! replaced by their parent one level up. Only non-null children reach disk,
//! so the node file is a post-order dump with the root last.
//!
//! Gaps between voxels are closed by [`OctreeBuilder::fast_add_empty`], which
//! drops a single null placeholder at the shallowest depth the gap allows
//! instead of adding every empty leaf.

use super::node::{Node, NODATA};
use crate::error::{Result, SvoError};
use crate::io::{OctreeInfo, OctreeWriter};
use crate::morton;
use crate::voxel::VoxelData;
use glam::Vec3;
use std::path::PathBuf;
use tracing::{debug, warn};

/// Data index every leaf refers to in binary mode
pub const BINARY_DATA: u64 = 1;

/// `floor(log8(n))` for `n > 0`
#[inline]
pub fn find_power_of_8(n: u64) -> u32 {
    debug_assert!(n > 0);
    (63 - n.leading_zeros()) / 3
}

/// Tree depth of a grid: `log2(gridlength)`
pub fn max_depth(gridlength: u32) -> Result<u32> {
    if gridlength == 0 || !gridlength.is_power_of_two() || gridlength > morton::MAX_COORD + 1 {
        return Err(SvoError::Config(format!(
            "gridsize {gridlength} must be a power of 2 between 1 and {}",
            morton::MAX_COORD + 1
        )));
    }
    Ok(gridlength.trailing_zeros())
}

/// What goes into the data file besides the null record
#[derive(Debug, Clone, Copy, Default)]
pub struct BuilderOptions {
    /// Occupancy only: one shared white record, no per-voxel payload
    pub binary: bool,
    /// Give every interior node the average of its children
    pub generate_levels: bool,
}

/// Incremental octree writer fed in non-decreasing Morton order
pub struct OctreeBuilder {
    writer: OctreeWriter,
    gridlength: u32,
    maxdepth: usize,
    buffers: Vec<Vec<Node>>,
    current_morton: u64,
    max_morton: u64,
    binary: bool,
    generate_levels: bool,
    n_voxels: u64,
    n_empty: u64,
}

impl OctreeBuilder {
    /// Create the node and data files for `<base>.octree*`
    pub fn create(base: impl Into<PathBuf>, gridlength: u32, options: BuilderOptions) -> Result<Self> {
        let maxdepth = max_depth(gridlength)? as usize;
        let mut writer = OctreeWriter::create(base)?;

        writer.write_data(&VoxelData::default())?;
        if options.binary {
            writer.write_data(&VoxelData::new(0, Vec3::ZERO, Vec3::ONE))?;
        }
        let generate_levels = options.generate_levels && !options.binary;
        if options.generate_levels && options.binary {
            warn!("level generation needs voxel payload; skipping it for binary voxelization");
        }

        Ok(Self {
            writer,
            gridlength,
            maxdepth,
            buffers: (0..=maxdepth).map(|_| Vec::with_capacity(8)).collect(),
            current_morton: 0,
            max_morton: morton::cell_count(gridlength) - 1,
            binary: options.binary,
            generate_levels,
            n_voxels: 0,
            n_empty: 0,
        })
    }

    /// Next Morton code the builder expects
    pub fn current_morton(&self) -> u64 {
        self.current_morton
    }

    pub fn is_binary(&self) -> bool {
        self.binary
    }

    /// Voxels added so far
    pub fn n_voxels(&self) -> u64 {
        self.n_voxels
    }

    /// Finest-level cells covered so far, filled or padded
    pub fn cells_accounted(&self) -> u64 {
        self.n_voxels + self.n_empty
    }

    /// Add one filled cell; in binary mode the payload is ignored
    ///
    /// Codes must not decrease. Any gap since the previous voxel is padded
    /// with empty cells first.
    pub fn add_voxel(&mut self, voxel: &VoxelData) -> Result<()> {
        let code = voxel.morton;
        if code > self.max_morton {
            return Err(SvoError::MortonOverflow {
                code,
                max: self.max_morton,
            });
        }
        if code < self.current_morton {
            return Err(SvoError::MortonOrder {
                expected: self.current_morton,
                got: code,
            });
        }
        if code > self.current_morton {
            self.fast_add_empty(code - self.current_morton)?;
        }

        let node = if self.binary {
            Node::leaf(BINARY_DATA)
        } else {
            Node {
                data: self.writer.write_data(voxel)?,
                data_cache: *voxel,
                ..Node::leaf(NODATA)
            }
        };
        self.buffers[self.maxdepth].push(node);
        self.refine(self.maxdepth)?;

        self.current_morton += 1;
        self.n_voxels += 1;
        Ok(())
    }

    /// Pad `budget` empty cells, one placeholder per aligned run
    pub fn fast_add_empty(&mut self, budget: u64) -> Result<()> {
        let remaining = self.max_morton - self.current_morton + 1;
        if budget > remaining {
            return Err(SvoError::MortonOverflow {
                code: self.current_morton + budget - 1,
                max: self.max_morton,
            });
        }
        let mut budget = budget;
        while budget > 0 {
            let depth = self.best_fill_depth(budget);
            let run = 1u64 << (3 * (self.maxdepth - depth));
            self.buffers[depth].push(Node::default());
            self.refine(depth)?;
            self.current_morton += run;
            self.n_empty += run;
            budget -= run;
        }
        Ok(())
    }

    /// Shallowest depth whose run fits `budget` without skipping past an open buffer
    fn best_fill_depth(&self, budget: u64) -> usize {
        let by_budget = self.maxdepth.saturating_sub(find_power_of_8(budget) as usize);
        let deepest_open = self
            .buffers
            .iter()
            .rposition(|b| !b.is_empty())
            .unwrap_or(0);
        by_budget.max(deepest_open)
    }

    /// Group full buffers upwards from `depth` until one is not full
    fn refine(&mut self, depth: usize) -> Result<()> {
        for d in (0..=depth).rev() {
            if self.buffers[d].len() != 8 {
                break;
            }
            if d == 0 {
                return Err(SvoError::Invariant(
                    "root level received more than one node".to_string(),
                ));
            }
            let parent = if self.buffers[d].iter().all(Node::is_null) {
                Node::default()
            } else {
                self.group_nodes(d)?
            };
            self.buffers[d - 1].push(parent);
            self.buffers[d].clear();
        }
        Ok(())
    }

    /// Write the non-null nodes of buffer `d` and build their parent
    fn group_nodes(&mut self, d: usize) -> Result<Node> {
        let mut parent = Node::default();
        let mut first = true;
        for (octant, child) in self.buffers[d].iter().enumerate() {
            if child.is_null() {
                continue;
            }
            let pos = self.writer.write_node(child)?;
            if first {
                parent.children_base = pos;
                first = false;
            }
            parent.children_offset[octant] = (pos - parent.children_base) as i8;
        }

        if self.generate_levels {
            let mut color = Vec3::ZERO;
            let mut normal = Vec3::ZERO;
            let mut morton = None;
            let mut count = 0.0;
            for child in self.buffers[d].iter().filter(|c| !c.is_null()) {
                color += child.data_cache.color;
                normal += child.data_cache.normal;
                morton.get_or_insert(child.data_cache.morton);
                count += 1.0;
            }
            let average = VoxelData::new(
                morton.unwrap_or_default(),
                (normal / count).normalize_or_zero(),
                color / count,
            );
            parent.data = self.writer.write_data(&average)?;
            parent.data_cache = average;
        }
        Ok(parent)
    }

    /// Pad every cell after the last voxel; afterwards the whole grid is accounted for
    pub fn pad_to_end(&mut self) -> Result<()> {
        if self.current_morton <= self.max_morton {
            self.fast_add_empty(self.max_morton - self.current_morton + 1)?;
        }
        Ok(())
    }

    /// Pad the rest of the grid, write the root and the header
    pub fn finalize(mut self) -> Result<OctreeInfo> {
        self.pad_to_end()?;
        let cells = morton::cell_count(self.gridlength);
        if self.cells_accounted() != cells {
            return Err(SvoError::Invariant(format!(
                "{} of {} cells accounted for at finalize",
                self.cells_accounted(),
                cells
            )));
        }
        if self.buffers[0].len() != 1 || self.buffers[1..].iter().any(|b| !b.is_empty()) {
            return Err(SvoError::Invariant(format!(
                "unbalanced buffers at finalize: {:?}",
                self.buffers.iter().map(Vec::len).collect::<Vec<_>>()
            )));
        }
        let root = self.buffers[0][0];
        self.writer.write_node(&root)?;
        debug!(
            "octree complete: {} voxels, {} padded cells, {} nodes, {} data records",
            self.n_voxels,
            self.n_empty,
            self.writer.n_nodes(),
            self.writer.n_data()
        );
        self.writer.finish(self.gridlength)
    }
}
