//! Thick voxelization by primitive tests
//!
//! A cell is filled when its center lies in a sphere around a vertex, in a
//! cylinder around an edge, or inside the triangle's slab. Sphere and cylinder
//! radius is half a voxel. This over-covers near edges and corners but leaves
//! no 6-connected gaps in the surface.

use super::CellTest;
use crate::geometry::Triangle;
use glam::{UVec3, Vec3};

struct Edge {
    start: Vec3,
    dir: Vec3,
    len2: f32,
}

/// Per-triangle setup for the thick test, in grid-local coordinates
pub struct HuangTest {
    unit: f32,
    radius2: f32,
    vertices: [Vec3; 3],
    edges: [Edge; 3],
    /// Unit plane normal; zero for a degenerate triangle
    normal: Vec3,
    plane_d: f32,
    thickness: f32,
    /// `normal x edge_i`, pointing into the triangle for a counter-clockwise winding
    edge_normals: [Vec3; 3],
}

impl HuangTest {
    pub fn new(t: &Triangle, unit: f32) -> Self {
        let vertices = t.vertices();
        let edge = |a: Vec3, b: Vec3| Edge {
            start: a,
            dir: b - a,
            len2: (b - a).length_squared(),
        };
        let edges = [
            edge(vertices[0], vertices[1]),
            edge(vertices[1], vertices[2]),
            edge(vertices[2], vertices[0]),
        ];

        let raw = (vertices[1] - vertices[0]).cross(vertices[2] - vertices[1]);
        let normal = raw.normalize_or_zero();
        let half = unit * 0.5;
        // the cell's half diagonal projected on the normal
        let thickness = half * normal.abs().max_element();

        Self {
            unit,
            radius2: half * half,
            vertices,
            normal,
            plane_d: -normal.dot(vertices[0]),
            thickness,
            edge_normals: [
                normal.cross(edges[0].dir),
                normal.cross(edges[1].dir),
                normal.cross(edges[2].dir),
            ],
            edges,
        }
    }

    fn in_sphere(&self, p: Vec3) -> bool {
        self.vertices
            .iter()
            .any(|&v| (p - v).length_squared() <= self.radius2)
    }

    fn in_cylinder(&self, p: Vec3) -> bool {
        self.edges.iter().any(|e| {
            if e.len2 <= 0.0 {
                return false;
            }
            let t = (p - e.start).dot(e.dir) / e.len2;
            if !(0.0..=1.0).contains(&t) {
                return false;
            }
            (p - e.start - e.dir * t).length_squared() <= self.radius2
        })
    }

    fn in_slab(&self, p: Vec3) -> bool {
        if self.normal == Vec3::ZERO {
            return false;
        }
        if (self.normal.dot(p) + self.plane_d).abs() > self.thickness {
            return false;
        }
        let inside = |i: usize| self.edge_normals[i].dot(p - self.edges[i].start) <= 0.0;
        let first = inside(0);
        inside(1) == first && inside(2) == first
    }
}

impl CellTest for HuangTest {
    fn overlaps(&self, cell: UVec3) -> bool {
        let center = (cell.as_vec3() + 0.5) * self.unit;
        self.in_sphere(center) || self.in_cylinder(center) || self.in_slab(center)
    }
}
