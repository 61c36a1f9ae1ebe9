//! Octree node and its on-disk record

use crate::io::read_u64_le;
use crate::voxel::VoxelData;

/// Offset value marking an absent child
pub const NOCHILD: i8 = -1;

/// Data index meaning "no payload"; record 0 of every data file is a null voxel
pub const NODATA: u64 = 0;

/// Size of one serialized node: `children_base u64`, `8 x i8` offsets, `data u64`
pub const NODE_RECORD_SIZE: usize = 24;

/// One octree node
///
/// Children of a node are written back to back, so their positions are stored
/// as `children_base` plus a signed byte per octant. The octant index is the
/// low three bits of the child's Morton code (`x | y << 1 | z << 2`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Node {
    pub children_base: u64,
    pub children_offset: [i8; 8],
    pub data: u64,
    /// Payload kept in memory so parents can average it; never serialized
    pub data_cache: VoxelData,
}

impl Default for Node {
    fn default() -> Self {
        Self {
            children_base: 0,
            children_offset: [NOCHILD; 8],
            data: NODATA,
            data_cache: VoxelData::default(),
        }
    }
}

impl Node {
    /// Leaf pointing at data record `data`
    pub fn leaf(data: u64) -> Self {
        Self {
            data,
            ..Self::default()
        }
    }

    pub fn has_child(&self, octant: usize) -> bool {
        self.children_offset[octant] != NOCHILD
    }

    /// Absolute node index of the child in `octant`
    pub fn child_pos(&self, octant: usize) -> Option<u64> {
        if self.has_child(octant) {
            Some(self.children_base + self.children_offset[octant] as u64)
        } else {
            None
        }
    }

    pub fn child_count(&self) -> usize {
        (0..8).filter(|&i| self.has_child(i)).count()
    }

    pub fn is_leaf(&self) -> bool {
        self.children_offset == [NOCHILD; 8]
    }

    pub fn has_data(&self) -> bool {
        self.data != NODATA
    }

    /// A leaf without payload: the single canonical empty node
    pub fn is_null(&self) -> bool {
        self.is_leaf() && !self.has_data()
    }

    pub fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.children_base.to_le_bytes());
        out.extend(self.children_offset.iter().map(|&o| o as u8));
        out.extend_from_slice(&self.data.to_le_bytes());
    }

    /// Decode one record; `bytes` must hold at least [`NODE_RECORD_SIZE`] bytes
    pub fn decode(bytes: &[u8]) -> Self {
        let mut children_offset = [NOCHILD; 8];
        for (slot, &b) in children_offset.iter_mut().zip(&bytes[8..16]) {
            *slot = b as i8;
        }
        Self {
            children_base: read_u64_le(bytes, 0),
            children_offset,
            data: read_u64_le(bytes, 16),
            data_cache: VoxelData::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_null() {
        let n = Node::default();
        assert!(n.is_leaf());
        assert!(n.is_null());
        assert_eq!(n.child_count(), 0);
        assert!(!Node::leaf(1).is_null());
    }

    #[test]
    fn test_child_positions() {
        let mut n = Node::default();
        n.children_base = 40;
        n.children_offset[2] = 0;
        n.children_offset[5] = 1;
        assert_eq!(n.child_pos(2), Some(40));
        assert_eq!(n.child_pos(5), Some(41));
        assert_eq!(n.child_pos(0), None);
        assert_eq!(n.child_count(), 2);
        assert!(!n.is_leaf());
    }

    #[test]
    fn test_record_layout() {
        let mut n = Node::leaf(7);
        n.children_base = 3;
        n.children_offset[1] = 4;
        let mut bytes = Vec::new();
        n.encode(&mut bytes);
        assert_eq!(bytes.len(), NODE_RECORD_SIZE);
        assert_eq!(bytes[8], 0xff);
        assert_eq!(bytes[9], 4);
        assert_eq!(Node::decode(&bytes), n);
    }
}
