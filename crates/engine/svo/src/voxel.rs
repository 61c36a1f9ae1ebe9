//! Payload of one filled grid cell

use crate::io::{read_f32_le, read_u64_le};
use glam::Vec3;

/// Size of one serialized [`VoxelData`] record: morton `u64`, color and normal `3 x f32`
pub const VOXEL_RECORD_SIZE: usize = 32;

/// Morton code plus the color and normal sampled for that cell
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct VoxelData {
    pub morton: u64,
    pub color: Vec3,
    pub normal: Vec3,
}

impl VoxelData {
    pub fn new(morton: u64, normal: Vec3, color: Vec3) -> Self {
        Self {
            morton,
            color,
            normal,
        }
    }

    /// White voxel with no normal, used where only occupancy is known
    pub fn filled(morton: u64) -> Self {
        Self::new(morton, Vec3::ZERO, Vec3::ONE)
    }

    pub fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.morton.to_le_bytes());
        for c in self.color.to_array().into_iter().chain(self.normal.to_array()) {
            out.extend_from_slice(&c.to_le_bytes());
        }
    }

    /// Decode one record; `bytes` must hold at least [`VOXEL_RECORD_SIZE`] bytes
    pub fn decode(bytes: &[u8]) -> Self {
        let vec = |offset: usize| {
            Vec3::new(
                read_f32_le(bytes, offset),
                read_f32_le(bytes, offset + 4),
                read_f32_le(bytes, offset + 8),
            )
        };
        Self {
            morton: read_u64_le(bytes, 0),
            color: vec(8),
            normal: vec(20),
        }
    }
}
