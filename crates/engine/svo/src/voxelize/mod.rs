//! Per-partition voxelization
//!
//! A partition is a cube of grid cells covering one Morton range. Each
//! triangle's grid bounding box is clamped to that cube and scanned in x/y/z
//! order; every cell the chosen test accepts is claimed by the first triangle
//! that reaches it. Filled cells land in a dense one-byte-per-cell occupancy
//! array, and also in a side list so the builder does not have to rescan the
//! whole partition.
//!
//! # Sparseness
//!
//! Without payload (geometry-only input) the side list only holds Morton
//! codes and is capped at `sparseness%` of the partition's occupancy bytes.
//! Crossing the cap drops the list and the builder falls back to scanning the
//! dense array. Payload builds always keep the list, since colors and normals
//! live there.

pub mod color;
pub mod huang;
pub mod schwarz;

pub use color::{ColorMode, Interpolation};
pub use huang::HuangTest;
pub use schwarz::SchwarzTest;

use crate::error::{Result, SvoError};
use crate::geometry::{AaBox, Triangle};
use crate::morton;
use crate::partition::grid_box;
use crate::voxel::VoxelData;
use glam::{UVec3, Vec3};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info};

const EMPTY_VOXEL: u8 = 0;
const FULL_VOXEL: u8 = 1;

/// Triangle/cell overlap predicate, set up once per triangle
pub trait CellTest {
    /// Whether grid cell `cell` is touched by the triangle
    fn overlaps(&self, cell: UVec3) -> bool;
}

/// Which overlap test decides occupancy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VoxelizeMethod {
    /// Vertex spheres, edge cylinders and a face slab; thick surfaces
    Huang,
    /// Plane plus three projected edge tests; minimal conservative surfaces
    #[default]
    Schwarz,
}

impl FromStr for VoxelizeMethod {
    type Err = SvoError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "huang" | "thick" => Ok(VoxelizeMethod::Huang),
            "schwarz" | "tight" => Ok(VoxelizeMethod::Schwarz),
            other => Err(SvoError::Config(format!(
                "unknown voxelization method '{other}' (expected huang or schwarz)"
            ))),
        }
    }
}

impl fmt::Display for VoxelizeMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VoxelizeMethod::Huang => write!(f, "huang"),
            VoxelizeMethod::Schwarz => write!(f, "schwarz"),
        }
    }
}

enum SideList {
    Codes(Vec<u64>),
    Voxels(Vec<VoxelData>),
    /// Abandoned; read the occupancy array instead
    Dense,
}

/// Occupancy of one partition plus the list of what was filled
///
/// Allocated once per build and [`reset`](Self::reset) for every partition.
pub struct VoxelGrid {
    morton_start: u64,
    len: u64,
    bbox: AaBox<UVec3>,
    occupancy: Vec<u8>,
    side: SideList,
    max_side_codes: usize,
    payload: bool,
    n_filled: u64,
}

impl VoxelGrid {
    /// Grid for Morton range `[morton_start, morton_start + len)`
    ///
    /// `payload` keeps a [`VoxelData`] per filled cell; otherwise only codes
    /// are kept, up to `sparseness` percent of the occupancy bytes.
    pub fn new(morton_start: u64, len: u64, payload: bool, sparseness: f64) -> Self {
        let side_bytes = (len as f64 * sparseness / 100.0) as u64;
        let max_side_codes = (side_bytes / std::mem::size_of::<u64>() as u64) as usize;
        let side = if payload {
            SideList::Voxels(Vec::new())
        } else {
            SideList::Codes(Vec::new())
        };
        Self {
            morton_start,
            len,
            bbox: grid_box(morton_start, len),
            occupancy: vec![EMPTY_VOXEL; len as usize],
            side,
            max_side_codes,
            payload,
            n_filled: 0,
        }
    }

    /// Reuse the allocation for the partition starting at `morton_start`
    pub fn reset(&mut self, morton_start: u64) {
        self.morton_start = morton_start;
        self.bbox = grid_box(morton_start, self.len);
        self.occupancy.fill(EMPTY_VOXEL);
        self.side = if self.payload {
            match std::mem::replace(&mut self.side, SideList::Dense) {
                SideList::Voxels(mut v) => {
                    v.clear();
                    SideList::Voxels(v)
                }
                _ => SideList::Voxels(Vec::new()),
            }
        } else {
            match std::mem::replace(&mut self.side, SideList::Dense) {
                SideList::Codes(mut c) => {
                    c.clear();
                    SideList::Codes(c)
                }
                _ => SideList::Codes(Vec::new()),
            }
        };
        self.n_filled = 0;
    }

    pub fn morton_start(&self) -> u64 {
        self.morton_start
    }

    /// Cells in the partition
    pub fn cell_count(&self) -> u64 {
        self.len
    }

    /// Grid-space cube of this partition
    pub fn bbox(&self) -> &AaBox<UVec3> {
        &self.bbox
    }

    pub fn n_filled(&self) -> u64 {
        self.n_filled
    }

    /// Whether filled cells are still tracked in the side list
    pub fn is_sparse(&self) -> bool {
        !matches!(self.side, SideList::Dense)
    }

    pub fn is_filled(&self, code: u64) -> bool {
        self.occupancy[(code - self.morton_start) as usize] != EMPTY_VOXEL
    }

    /// Claim cell `code`; `payload` is only evaluated when the cell was free
    /// and this grid keeps payloads. Returns false if the cell was taken.
    pub fn fill(&mut self, code: u64, payload: impl FnOnce() -> VoxelData) -> bool {
        let slot = &mut self.occupancy[(code - self.morton_start) as usize];
        if *slot != EMPTY_VOXEL {
            return false;
        }
        *slot = FULL_VOXEL;
        self.n_filled += 1;

        match &mut self.side {
            SideList::Voxels(voxels) => voxels.push(payload()),
            SideList::Codes(codes) => {
                if codes.len() >= self.max_side_codes {
                    info!(
                        "side list for partition at {} passed {} entries, scanning occupancy instead",
                        self.morton_start, self.max_side_codes
                    );
                    self.side = SideList::Dense;
                } else {
                    codes.push(code);
                }
            }
            SideList::Dense => {}
        }
        true
    }

    /// Hand every filled cell to `sink` in increasing Morton order
    ///
    /// Cells from the dense fallback carry the white, normal-less payload.
    pub fn drain<F>(&mut self, mut sink: F) -> Result<()>
    where
        F: FnMut(VoxelData) -> Result<()>,
    {
        match &mut self.side {
            SideList::Voxels(voxels) => {
                voxels.sort_unstable_by_key(|v| v.morton);
                for v in voxels.drain(..) {
                    sink(v)?;
                }
            }
            SideList::Codes(codes) => {
                codes.sort_unstable();
                for code in codes.drain(..) {
                    sink(VoxelData::filled(code))?;
                }
            }
            SideList::Dense => {
                debug!("scanning {} cells of dense occupancy", self.len);
                for (i, _) in self
                    .occupancy
                    .iter()
                    .enumerate()
                    .filter(|&(_, &o)| o != EMPTY_VOXEL)
                {
                    sink(VoxelData::filled(self.morton_start + i as u64))?;
                }
            }
        }
        Ok(())
    }
}

/// Voxelization parameters shared by every partition of one build
#[derive(Debug, Clone, Copy)]
pub struct Voxelizer {
    pub method: VoxelizeMethod,
    pub interpolation: Interpolation,
    /// Edge length of one cell in world units
    pub unit: f32,
    /// World position of grid cell (0, 0, 0)'s min corner
    pub origin: Vec3,
}

impl Voxelizer {
    pub fn new(method: VoxelizeMethod, unit: f32, origin: Vec3) -> Self {
        Self {
            method,
            interpolation: Interpolation::default(),
            unit,
            origin,
        }
    }

    pub fn with_interpolation(mut self, interpolation: Interpolation) -> Self {
        self.interpolation = interpolation;
        self
    }

    /// Voxelize every triangle of `triangles` into `grid`; returns cells newly filled
    pub fn voxelize<I>(&self, triangles: I, grid: &mut VoxelGrid) -> Result<u64>
    where
        I: IntoIterator<Item = Result<Triangle>>,
    {
        let mut filled = 0;
        let mut n_triangles = 0u64;
        for t in triangles {
            filled += self.voxelize_triangle(&t?, grid);
            n_triangles += 1;
        }
        debug!(
            "partition at {}: {} triangles filled {} cells (sparse: {})",
            grid.morton_start(),
            n_triangles,
            filled,
            grid.is_sparse()
        );
        Ok(filled)
    }

    /// Fill the cells of `grid` that triangle `t` touches; returns cells newly filled
    pub fn voxelize_triangle(&self, t: &Triangle, grid: &mut VoxelGrid) -> u64 {
        let local = t.translated(-self.origin);
        let Some(cells) = self.cell_range(&local.bbox(), grid.bbox()) else {
            return 0;
        };
        match self.method {
            VoxelizeMethod::Huang => self.scan(&HuangTest::new(&local, self.unit), &local, &cells, grid),
            VoxelizeMethod::Schwarz => {
                self.scan(&SchwarzTest::new(&local, self.unit), &local, &cells, grid)
            }
        }
    }

    /// Grid cells covered by `bbox`, clamped to `part`; `None` when disjoint
    fn cell_range(&self, bbox: &AaBox<Vec3>, part: &AaBox<UVec3>) -> Option<AaBox<UVec3>> {
        let lo = (bbox.min / self.unit).floor();
        let hi = (bbox.max / self.unit).floor();
        let part_lo = part.min.as_vec3();
        let part_hi = part.max.as_vec3();
        if hi.cmplt(part_lo).any() || lo.cmpgt(part_hi).any() {
            return None;
        }
        Some(AaBox::new(
            lo.clamp(part_lo, part_hi).as_uvec3(),
            hi.clamp(part_lo, part_hi).as_uvec3(),
        ))
    }

    fn scan<T: CellTest>(&self, test: &T, t: &Triangle, cells: &AaBox<UVec3>, grid: &mut VoxelGrid) -> u64 {
        let mut filled = 0;
        for x in cells.min.x..=cells.max.x {
            for y in cells.min.y..=cells.max.y {
                for z in cells.min.z..=cells.max.z {
                    let cell = UVec3::new(x, y, z);
                    let code = morton::encode_vec(cell);
                    if grid.is_filled(code) || !test.overlaps(cell) {
                        continue;
                    }
                    let center = (cell.as_vec3() + 0.5) * self.unit;
                    let claimed = grid.fill(code, || {
                        VoxelData::new(code, t.normal, self.interpolation.color_at(t, center))
                    });
                    if claimed {
                        filled += 1;
                    }
                }
            }
        }
        filled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corner_triangle() -> Triangle {
        Triangle::new(Vec3::ZERO, Vec3::X, Vec3::Y)
    }

    fn collect(grid: &mut VoxelGrid) -> Vec<VoxelData> {
        let mut out = Vec::new();
        grid.drain(|v| {
            out.push(v);
            Ok(())
        })
        .unwrap();
        out
    }

    #[test]
    fn test_methods_on_two_grid() {
        let mut grid = VoxelGrid::new(0, 8, true, 10.0);
        let tight = Voxelizer::new(VoxelizeMethod::Schwarz, 0.5, Vec3::ZERO);
        assert_eq!(tight.voxelize_triangle(&corner_triangle(), &mut grid), 4);
        let codes: Vec<u64> = collect(&mut grid).iter().map(|v| v.morton).collect();
        assert_eq!(codes, vec![0, 1, 2, 3]);

        grid.reset(0);
        let thick = Voxelizer::new(VoxelizeMethod::Huang, 0.5, Vec3::ZERO);
        assert_eq!(thick.voxelize_triangle(&corner_triangle(), &mut grid), 3);
        let codes: Vec<u64> = collect(&mut grid).iter().map(|v| v.morton).collect();
        assert_eq!(codes, vec![0, 1, 2]);
    }

    #[test]
    fn test_first_triangle_wins() {
        let mut grid = VoxelGrid::new(0, 8, true, 10.0);
        let v = Voxelizer::new(VoxelizeMethod::Schwarz, 0.5, Vec3::ZERO);
        let red = corner_triangle().with_color(Vec3::X);
        let blue = corner_triangle().with_color(Vec3::Z);
        assert_eq!(v.voxelize([Ok(red), Ok(blue)], &mut grid).unwrap(), 4);
        assert!(collect(&mut grid).iter().all(|v| v.color == Vec3::X));
    }

    #[test]
    fn test_uniform_color_survives_both_schemes() {
        let color = Vec3::new(0.9, 0.1, 0.4);
        let t = Triangle::new(Vec3::new(0.1, 0.2, 0.3), Vec3::new(3.8, 0.4, 1.9), Vec3::new(1.2, 3.7, 2.6))
            .with_color(color);
        for interpolation in [Interpolation::Flat, Interpolation::Barycentric] {
            for method in [VoxelizeMethod::Huang, VoxelizeMethod::Schwarz] {
                let mut grid = VoxelGrid::new(0, 64, true, 10.0);
                Voxelizer::new(method, 1.0, Vec3::ZERO)
                    .with_interpolation(interpolation)
                    .voxelize_triangle(&t, &mut grid);
                let voxels = collect(&mut grid);
                assert!(!voxels.is_empty());
                assert!(voxels.iter().all(|v| v.color == color));
            }
        }
    }

    #[test]
    fn test_clamped_to_partition() {
        // second octant of a 4-grid: cells x in 2..4, y and z in 0..2
        let mut grid = VoxelGrid::new(8, 8, false, 100.0);
        let big = Triangle::new(Vec3::new(0.0, 0.0, 0.5), Vec3::new(4.0, 0.0, 0.5), Vec3::new(0.0, 4.0, 0.5));
        let v = Voxelizer::new(VoxelizeMethod::Schwarz, 1.0, Vec3::ZERO);
        v.voxelize_triangle(&big, &mut grid);
        let voxels = collect(&mut grid);
        assert!(!voxels.is_empty());
        for voxel in &voxels {
            assert!((8..16).contains(&voxel.morton));
            assert_eq!(voxel.color, Vec3::ONE);
        }

        let outside = Triangle::new(Vec3::splat(3.0), Vec3::splat(3.5), Vec3::new(3.0, 3.5, 3.0));
        assert_eq!(v.voxelize_triangle(&outside, &mut grid), 0);
    }

    #[test]
    fn test_origin_offset() {
        let mut grid = VoxelGrid::new(0, 8, true, 10.0);
        let offset = Vec3::new(-5.0, 2.0, 7.0);
        let v = Voxelizer::new(VoxelizeMethod::Schwarz, 0.5, offset);
        assert_eq!(v.voxelize_triangle(&corner_triangle().translated(offset), &mut grid), 4);
    }

    #[test]
    fn test_side_list_overflow_falls_back_to_dense() {
        // 64 cells at 12.5% is 8 bytes: room for one code
        let t = Triangle::new(Vec3::new(0.0, 0.0, 0.5), Vec3::new(4.0, 0.0, 0.5), Vec3::new(0.0, 4.0, 0.5));
        let v = Voxelizer::new(VoxelizeMethod::Schwarz, 1.0, Vec3::ZERO);

        let mut sparse = VoxelGrid::new(0, 64, false, 1000.0);
        v.voxelize_triangle(&t, &mut sparse);
        assert!(sparse.is_sparse());

        let mut dense = VoxelGrid::new(0, 64, false, 12.5);
        v.voxelize_triangle(&t, &mut dense);
        assert!(!dense.is_sparse());
        assert_eq!(dense.n_filled(), sparse.n_filled());

        let a = collect(&mut sparse);
        let b = collect(&mut dense);
        assert_eq!(a, b);
        assert!(a.windows(2).all(|w| w[0].morton < w[1].morton));

        // reset restores the side list
        dense.reset(0);
        assert!(dense.is_sparse());
        assert_eq!(dense.n_filled(), 0);
    }

    #[test]
    fn test_payload_ignores_sparseness() {
        let t = Triangle::new(Vec3::new(0.0, 0.0, 0.5), Vec3::new(4.0, 0.0, 0.5), Vec3::new(0.0, 4.0, 0.5));
        let mut grid = VoxelGrid::new(0, 64, true, 0.0);
        Voxelizer::new(VoxelizeMethod::Huang, 1.0, Vec3::ZERO).voxelize_triangle(&t, &mut grid);
        assert!(grid.is_sparse());
        assert!(collect(&mut grid).iter().all(|v| v.normal == Vec3::Z));
    }

    #[test]
    fn test_method_parsing() {
        assert_eq!("huang".parse::<VoxelizeMethod>().unwrap(), VoxelizeMethod::Huang);
        assert_eq!("Tight".parse::<VoxelizeMethod>().unwrap(), VoxelizeMethod::Schwarz);
        assert!("fast".parse::<VoxelizeMethod>().is_err());
    }
}
