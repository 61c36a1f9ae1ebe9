//! Octree output files
//!
//! # File Format
//!
//! ```text
//! <base>.octree        text header, written once after everything else
//!   #octreeheader 1
//!   gridlength <G>
//!   n_nodes <N>
//!   n_data <D>
//!   END
//!
//! <base>.octreenodes   N node records, 24 bytes each (little-endian)
//!   children_base  u64
//!   offsets        8 x i8   (-1 = no child)
//!   data           u64      (0 = no payload)
//!
//! <base>.octreedata    D voxel records, 32 bytes each (little-endian)
//!   morton         u64
//!   color          3 x f32
//!   normal         3 x f32
//! ```
//!
//! The root is the last node record. Data record 0 is always the null voxel.

use super::header::{parse_header, Field};
use super::{base_of, read_text, with_suffix, write_text};
use crate::error::{Result, SvoError};
use crate::octree::node::{Node, NODE_RECORD_SIZE};
use crate::voxel::{VoxelData, VOXEL_RECORD_SIZE};
use std::fmt::Write as _;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

pub const OCTREE_MAGIC: &str = "#octreeheader";
pub const OCTREE_VERSION: u32 = 1;

/// Contents of a `.octree` header
#[derive(Debug, Clone, PartialEq)]
pub struct OctreeInfo {
    pub version: u32,
    pub base: PathBuf,
    pub gridlength: u32,
    pub n_nodes: u64,
    pub n_data: u64,
}

impl OctreeInfo {
    pub fn header_path(&self) -> PathBuf {
        with_suffix(&self.base, ".octree")
    }

    pub fn nodes_path(&self) -> PathBuf {
        with_suffix(&self.base, ".octreenodes")
    }

    pub fn data_path(&self) -> PathBuf {
        with_suffix(&self.base, ".octreedata")
    }

    pub fn files_exist(&self) -> bool {
        self.header_path().exists() && self.nodes_path().exists() && self.data_path().exists()
    }

    /// Parse a `.octree` header file
    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = read_text(path)?;
        let header =
            parse_header(&text, OCTREE_MAGIC).map_err(|m| SvoError::header(path, m))?;

        let mut info = OctreeInfo {
            version: header.version,
            base: base_of(path),
            gridlength: 0,
            n_nodes: 0,
            n_data: 0,
        };
        for field in &header.fields {
            info.apply_field(field, path)
                .map_err(|m| SvoError::header(path, m))?;
        }
        Ok(info)
    }

    fn apply_field(&mut self, field: &Field<'_>, path: &Path) -> std::result::Result<(), String> {
        match field.key {
            "gridlength" => self.gridlength = field.value(0)?,
            "n_nodes" => self.n_nodes = field.value(0)?,
            "n_data" => self.n_data = field.value(0)?,
            other => tracing::debug!(
                "unrecognized keyword [{}] in {}, skipping",
                other,
                path.display()
            ),
        }
        Ok(())
    }

    pub fn to_header_string(&self) -> String {
        let mut s = String::new();
        let _ = writeln!(s, "{} {}", OCTREE_MAGIC, self.version);
        let _ = writeln!(s, "gridlength {}", self.gridlength);
        let _ = writeln!(s, "n_nodes {}", self.n_nodes);
        let _ = writeln!(s, "n_data {}", self.n_data);
        let _ = writeln!(s, "END");
        s
    }

    pub fn write(&self) -> Result<()> {
        write_text(&self.header_path(), &self.to_header_string())
    }
}

/// Base name of the octree built from `tri_base` at `gridsize`
pub fn octree_base(tri_base: &Path, gridsize: u32) -> PathBuf {
    with_suffix(tri_base, &format!("_{gridsize}"))
}

/// Append-only writer for the node and data files
///
/// Both files are created up front and released when the writer drops, also
/// on error paths. The header is written by [`finish`](Self::finish) only.
pub struct OctreeWriter {
    base: PathBuf,
    nodes: BufWriter<File>,
    data: BufWriter<File>,
    n_nodes: u64,
    n_data: u64,
    scratch: Vec<u8>,
}

impl OctreeWriter {
    pub fn create(base: impl Into<PathBuf>) -> Result<Self> {
        let base = base.into();
        let nodes_path = with_suffix(&base, ".octreenodes");
        let data_path = with_suffix(&base, ".octreedata");
        let nodes = File::create(&nodes_path).map_err(|e| SvoError::file(&nodes_path, e))?;
        let data = File::create(&data_path).map_err(|e| SvoError::file(&data_path, e))?;
        Ok(Self {
            base,
            nodes: BufWriter::new(nodes),
            data: BufWriter::new(data),
            n_nodes: 0,
            n_data: 0,
            scratch: Vec::with_capacity(VOXEL_RECORD_SIZE),
        })
    }

    /// Append a node and return its index in the node file
    pub fn write_node(&mut self, node: &Node) -> Result<u64> {
        self.scratch.clear();
        node.encode(&mut self.scratch);
        self.nodes.write_all(&self.scratch)?;
        self.n_nodes += 1;
        Ok(self.n_nodes - 1)
    }

    /// Append a voxel record and return its index in the data file
    pub fn write_data(&mut self, voxel: &VoxelData) -> Result<u64> {
        self.scratch.clear();
        voxel.encode(&mut self.scratch);
        self.data.write_all(&self.scratch)?;
        self.n_data += 1;
        Ok(self.n_data - 1)
    }

    pub fn n_nodes(&self) -> u64 {
        self.n_nodes
    }

    pub fn n_data(&self) -> u64 {
        self.n_data
    }

    /// Flush both files and write the header with the final counts
    pub fn finish(mut self, gridlength: u32) -> Result<OctreeInfo> {
        self.nodes.flush()?;
        self.data.flush()?;
        let info = OctreeInfo {
            version: OCTREE_VERSION,
            base: self.base,
            gridlength,
            n_nodes: self.n_nodes,
            n_data: self.n_data,
        };
        info.write()?;
        Ok(info)
    }
}

/// Loads a finished octree back from disk
pub struct OctreeReader {
    pub info: OctreeInfo,
}

impl OctreeReader {
    /// Open an octree from its `.octree` header
    pub fn open(header: impl AsRef<Path>) -> Result<Self> {
        let info = OctreeInfo::read(header)?;
        for path in [info.nodes_path(), info.data_path()] {
            if !path.exists() {
                return Err(SvoError::MissingFile(path));
            }
        }
        Ok(Self { info })
    }

    pub fn read_nodes(&self) -> Result<Vec<Node>> {
        let bytes = read_records(&self.info.nodes_path(), NODE_RECORD_SIZE, self.info.n_nodes)?;
        Ok(bytes.chunks_exact(NODE_RECORD_SIZE).map(Node::decode).collect())
    }

    pub fn read_data(&self) -> Result<Vec<VoxelData>> {
        let bytes = read_records(&self.info.data_path(), VOXEL_RECORD_SIZE, self.info.n_data)?;
        Ok(bytes
            .chunks_exact(VOXEL_RECORD_SIZE)
            .map(VoxelData::decode)
            .collect())
    }

    /// The root is always the last node written
    pub fn read_root(&self) -> Result<Node> {
        self.read_nodes()?
            .pop()
            .ok_or_else(|| SvoError::Invariant("octree has no nodes".to_string()))
    }
}

fn read_records(path: &Path, record_size: usize, count: u64) -> Result<Vec<u8>> {
    let bytes = fs::read(path).map_err(|e| SvoError::file(path, e))?;
    let expected = record_size as u64 * count;
    if bytes.len() as u64 != expected {
        return Err(SvoError::Invariant(format!(
            "{} holds {} bytes, header promises {}",
            path.display(),
            bytes.len(),
            expected
        )));
    }
    Ok(bytes)
}
