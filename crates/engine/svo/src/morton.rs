//! Morton encoding (Z-order curve) for grid cells
//!
//! Bit `i` of `x` lands on bit `3i` of the code, `y` on `3i + 1` and `z` on
//! `3i + 2`. The same order is used everywhere a code is produced or consumed,
//! so the lowest three bits of a code are also the octant index inside the
//! parent cell (`x | y << 1 | z << 2`).

use glam::UVec3;

/// Number of bits each axis may use (64 / 3)
pub const AXIS_BITS: u32 = 21;

/// Largest coordinate that can be encoded on one axis
pub const MAX_COORD: u32 = (1 << AXIS_BITS) - 1;

/// Spread the low 21 bits of `v` so they occupy every third bit
fn spread_bits(v: u32) -> u64 {
    let mut x = v as u64 & 0x1f_ffff;
    x = (x | (x << 32)) & 0x001f_0000_0000_ffff;
    x = (x | (x << 16)) & 0x001f_0000_ff00_00ff;
    x = (x | (x << 8)) & 0x100f_00f0_0f00_f00f;
    x = (x | (x << 4)) & 0x10c3_0c30_c30c_30c3;
    x = (x | (x << 2)) & 0x1249_2492_4924_9249;
    x
}

/// Gather every third bit of `code` back into a 21-bit value
fn compact_bits(code: u64) -> u32 {
    let mut x = code & 0x1249_2492_4924_9249;
    x = (x | (x >> 2)) & 0x10c3_0c30_c30c_30c3;
    x = (x | (x >> 4)) & 0x100f_00f0_0f00_f00f;
    x = (x | (x >> 8)) & 0x001f_0000_ff00_00ff;
    x = (x | (x >> 16)) & 0x001f_0000_0000_ffff;
    x = (x | (x >> 32)) & 0x1f_ffff;
    x as u32
}

/// Encode grid coordinates into a Morton code
///
/// Coordinates above [`MAX_COORD`] are truncated to their low 21 bits.
///
/// # Example
///
/// ```
/// use svo::morton;
///
/// assert_eq!(morton::encode(1, 0, 0), 1);
/// assert_eq!(morton::encode(0, 1, 0), 2);
/// assert_eq!(morton::encode(0, 0, 1), 4);
/// assert_eq!(morton::decode(morton::encode(5, 9, 3)), (5, 9, 3));
/// ```
#[inline]
pub fn encode(x: u32, y: u32, z: u32) -> u64 {
    spread_bits(x) | (spread_bits(y) << 1) | (spread_bits(z) << 2)
}

/// Decode a Morton code back into grid coordinates
#[inline]
pub fn decode(code: u64) -> (u32, u32, u32) {
    (
        compact_bits(code),
        compact_bits(code >> 1),
        compact_bits(code >> 2),
    )
}

#[inline]
pub fn encode_vec(pos: UVec3) -> u64 {
    encode(pos.x, pos.y, pos.z)
}

#[inline]
pub fn decode_vec(code: u64) -> UVec3 {
    let (x, y, z) = decode(code);
    UVec3::new(x, y, z)
}

/// Number of cells in a cubic grid of side `gridlength`
#[inline]
pub fn cell_count(gridlength: u32) -> u64 {
    let g = gridlength as u64;
    g * g * g
}

/// Map a Morton code to an RGB ramp over the grid, one channel per axis
pub fn to_rgb(code: u64, gridlength: u32) -> [f32; 3] {
    let (x, y, z) = decode(code);
    let g = gridlength as f32;
    [x as f32 / g, y as f32 / g, z as f32 / g]
}
