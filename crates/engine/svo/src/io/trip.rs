//! Partition manifest: a `.trip` header plus one `.tripdata` sidecar per partition
//!
//! # File Format
//!
//! ```text
//! <base>.trip
//!   #trip 1
//!   gridsize <G>
//!   n_triangles <N>
//!   bbox <minx> <miny> <minz> <maxx> <maxy> <maxz>
//!   geo_only <0|1>
//!   n_partitions <P>
//!   0 <triangles in partition 0>
//!   ...
//!   <P-1> <triangles in partition P-1>
//!   END
//!
//! <base>_<i>.tripdata   triangle records, same layout as `.tridata`
//! ```
//!
//! Partition counts may add up to more than `n_triangles`: a triangle that
//! straddles a partition boundary is stored in every partition it touches.

use super::header::{parse_header, Field};
use super::tri::{format_bbox, parse_bbox, TriFormat, TriInfo};
use super::{base_of, read_text, with_suffix, write_text};
use crate::error::{Result, SvoError};
use crate::geometry::AaBox;
use glam::Vec3;
use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub const TRIP_MAGIC: &str = "#trip";
pub const TRIP_VERSION: u32 = 1;

/// Contents of a `.trip` header
#[derive(Debug, Clone, PartialEq)]
pub struct TripInfo {
    pub version: u32,
    pub base: PathBuf,
    pub gridsize: u32,
    pub n_triangles: u64,
    pub format: TriFormat,
    pub bbox: AaBox<Vec3>,
    pub part_tricounts: Vec<u64>,
}

impl TripInfo {
    /// Manifest for `tri` split into `part_tricounts.len()` partitions
    pub fn from_tri(tri: &TriInfo, gridsize: u32, part_tricounts: Vec<u64>) -> Self {
        let base = partition_base(&tri.base, gridsize, part_tricounts.len());
        Self {
            version: TRIP_VERSION,
            base,
            gridsize,
            n_triangles: tri.n_triangles,
            format: tri.format,
            bbox: tri.bbox,
            part_tricounts,
        }
    }

    pub fn n_partitions(&self) -> usize {
        self.part_tricounts.len()
    }

    pub fn header_path(&self) -> PathBuf {
        with_suffix(&self.base, ".trip")
    }

    pub fn partition_path(&self, index: usize) -> PathBuf {
        partition_path(&self.base, index)
    }

    /// Check the header and every partition file that should hold triangles
    ///
    /// Empty partitions never create a file, so they are not required.
    pub fn files_exist(&self) -> bool {
        self.header_path().exists()
            && self
                .part_tricounts
                .iter()
                .enumerate()
                .filter(|&(_, &count)| count > 0)
                .all(|(i, _)| self.partition_path(i).exists())
    }

    /// Same as [`files_exist`](Self::files_exist) but names the first missing file
    pub fn require_files(&self) -> Result<()> {
        let header = self.header_path();
        if !header.exists() {
            return Err(SvoError::MissingFile(header));
        }
        for (i, &count) in self.part_tricounts.iter().enumerate() {
            let path = self.partition_path(i);
            if count > 0 && !path.exists() {
                return Err(SvoError::MissingFile(path));
            }
        }
        Ok(())
    }

    /// Parse a `.trip` header file
    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = read_text(path)?;
        let header = parse_header(&text, TRIP_MAGIC).map_err(|m| SvoError::header(path, m))?;

        let mut info = TripInfo {
            version: header.version,
            base: base_of(path),
            gridsize: 0,
            n_triangles: 0,
            format: TriFormat::Full,
            bbox: AaBox::new(Vec3::ZERO, Vec3::ONE),
            part_tricounts: Vec::new(),
        };
        for field in &header.fields {
            info.apply_field(field, path)
                .map_err(|m| SvoError::header(path, m))?;
        }
        Ok(info)
    }

    fn apply_field(&mut self, field: &Field<'_>, path: &Path) -> std::result::Result<(), String> {
        match field.key {
            "gridsize" => self.gridsize = field.value(0)?,
            "n_triangles" => self.n_triangles = field.value(0)?,
            "bbox" => self.bbox = parse_bbox(field)?,
            "geo_only" => self.format = TriFormat::from_geo_only(field.value::<u8>(0)? != 0),
            "n_partitions" => self.part_tricounts = vec![0; field.value(0)?],
            key => match key.parse::<usize>() {
                Ok(index) => {
                    let slot = self.part_tricounts.get_mut(index).ok_or_else(|| {
                        format!("partition index {index} outside n_partitions")
                    })?;
                    *slot = field.value(0)?;
                }
                Err(_) => tracing::debug!(
                    "unrecognized keyword [{}] in {}, skipping",
                    key,
                    path.display()
                ),
            },
        }
        Ok(())
    }

    pub fn to_header_string(&self) -> String {
        let mut s = String::new();
        let _ = writeln!(s, "{} {}", TRIP_MAGIC, self.version);
        let _ = writeln!(s, "gridsize {}", self.gridsize);
        let _ = writeln!(s, "n_triangles {}", self.n_triangles);
        let _ = writeln!(s, "bbox {}", format_bbox(&self.bbox));
        let _ = writeln!(s, "geo_only {}", u8::from(self.format.is_geometry_only()));
        let _ = writeln!(s, "n_partitions {}", self.n_partitions());
        for (i, count) in self.part_tricounts.iter().enumerate() {
            let _ = writeln!(s, "{i} {count}");
        }
        let _ = writeln!(s, "END");
        s
    }

    pub fn write(&self) -> Result<()> {
        write_text(&self.header_path(), &self.to_header_string())
    }

    /// Delete the header and all partition files, ignoring ones that are already gone
    pub fn remove_files(&self) -> Result<()> {
        let paths = std::iter::once(self.header_path())
            .chain((0..self.n_partitions()).map(|i| self.partition_path(i)));
        for path in paths {
            match fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(SvoError::file(path, e)),
            }
        }
        Ok(())
    }
}

/// Base name shared by the manifest and partition files of one split
pub fn partition_base(tri_base: &Path, gridsize: u32, n_partitions: usize) -> PathBuf {
    with_suffix(tri_base, &format!("_{gridsize}_{n_partitions}"))
}

pub fn partition_path(base: &Path, index: usize) -> PathBuf {
    with_suffix(base, &format!("_{index}.tripdata"))
}
