//! Tight conservative voxelization by separating axes
//!
//! A cell overlaps the triangle when it overlaps the triangle's plane and its
//! projections onto the XY, YZ and ZX planes overlap the projected triangle.
//! Each projected test is three 2D edge functions, offset so the cell corner
//! that reaches furthest across the edge is the one tested.

use super::CellTest;
use crate::geometry::Triangle;
use glam::{UVec3, Vec2, Vec3};

/// 2D edge functions for one projection plane
struct Projection {
    /// Component indices of the 2D axes
    axes: (usize, usize),
    normals: [Vec2; 3],
    offsets: [f32; 3],
}

impl Projection {
    fn new(vertices: &[Vec3; 3], edges: &[Vec3; 3], axes: (usize, usize), flip: bool, unit: f32) -> Self {
        let (a, b) = axes;
        let mut normals = [Vec2::ZERO; 3];
        let mut offsets = [0.0; 3];
        for i in 0..3 {
            let mut n = Vec2::new(-edges[i][b], edges[i][a]);
            if flip {
                n = -n;
            }
            let v = Vec2::new(vertices[i][a], vertices[i][b]);
            normals[i] = n;
            offsets[i] = -n.dot(v) + (unit * n.x).max(0.0) + (unit * n.y).max(0.0);
        }
        Self {
            axes,
            normals,
            offsets,
        }
    }

    fn overlaps(&self, p: Vec3) -> bool {
        let p = Vec2::new(p[self.axes.0], p[self.axes.1]);
        self.normals
            .iter()
            .zip(&self.offsets)
            .all(|(n, d)| n.dot(p) + d >= 0.0)
    }
}

/// Per-triangle setup for the tight test, in grid-local coordinates
pub struct SchwarzTest {
    unit: f32,
    normal: Vec3,
    d1: f32,
    d2: f32,
    projections: [Projection; 3],
}

impl SchwarzTest {
    pub fn new(t: &Triangle, unit: f32) -> Self {
        let vertices = t.vertices();
        let edges = [
            vertices[1] - vertices[0],
            vertices[2] - vertices[1],
            vertices[0] - vertices[2],
        ];
        let normal = edges[0].cross(edges[1]).normalize_or_zero();

        let critical = Vec3::select(normal.cmpgt(Vec3::ZERO), Vec3::splat(unit), Vec3::ZERO);
        let delta = Vec3::splat(unit);
        let d1 = normal.dot(critical - vertices[0]);
        let d2 = normal.dot((delta - critical) - vertices[0]);

        Self {
            unit,
            normal,
            d1,
            d2,
            projections: [
                Projection::new(&vertices, &edges, (0, 1), normal.z < 0.0, unit),
                Projection::new(&vertices, &edges, (1, 2), normal.x < 0.0, unit),
                Projection::new(&vertices, &edges, (2, 0), normal.y < 0.0, unit),
            ],
        }
    }
}

impl CellTest for SchwarzTest {
    fn overlaps(&self, cell: UVec3) -> bool {
        let p = cell.as_vec3() * self.unit;
        let np = self.normal.dot(p);
        if (np + self.d1) * (np + self.d2) > 0.0 {
            return false;
        }
        self.projections.iter().all(|proj| proj.overlaps(p))
    }
}
