// Input/Output: headers, triangle records and octree files

pub mod header;
pub mod octree;
pub mod reader;
pub mod tri;
pub mod trip;

use crate::error::{Result, SvoError};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

// Re-export main types and functions
pub use octree::{octree_base, OctreeInfo, OctreeReader, OctreeWriter};
pub use reader::TriReader;
pub use tri::{TriFormat, TriInfo, TriWriter};
pub use trip::TripInfo;

/// Append `suffix` to a base path without touching its existing extension
pub(crate) fn with_suffix(base: &Path, suffix: &str) -> PathBuf {
    let mut s: OsString = base.as_os_str().to_owned();
    s.push(suffix);
    PathBuf::from(s)
}

/// Base name of a header file: the path with its extension stripped
pub(crate) fn base_of(header: &Path) -> PathBuf {
    header.with_extension("")
}

pub(crate) fn read_text(path: &Path) -> Result<String> {
    if !path.exists() {
        return Err(SvoError::MissingFile(path.to_path_buf()));
    }
    fs::read_to_string(path).map_err(|e| SvoError::file(path, e))
}

pub(crate) fn write_text(path: &Path, text: &str) -> Result<()> {
    fs::write(path, text).map_err(|e| SvoError::file(path, e))
}

pub(crate) fn read_f32_le(bytes: &[u8], offset: usize) -> f32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&bytes[offset..offset + 4]);
    f32::from_le_bytes(raw)
}

pub(crate) fn read_u64_le(bytes: &[u8], offset: usize) -> u64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&bytes[offset..offset + 8]);
    u64::from_le_bytes(raw)
}
