//! Mesh-intermediate format: a `.tri` text header plus a `.tridata` sidecar
//!
//! # File Format
//!
//! ```text
//! <base>.tri
//!   #tri 1
//!   ntriangles <N>
//!   geo_only <0|1>
//!   bbox <minx> <miny> <minz> <maxx> <maxy> <maxz>
//!   END
//!
//! <base>.tridata  (N fixed-size little-endian records, no padding)
//!   v0 v1 v2                         9 x f32
//!   normal                           3 x f32   (full records only)
//!   color0 color1 color2             9 x f32   (full records only)
//! ```

use super::header::{parse_header, Field};
use super::{base_of, read_f32_le, read_text, with_suffix, write_text};
use crate::error::{Result, SvoError};
use crate::geometry::{face_normal, AaBox, Triangle};
use glam::Vec3;
use serde::Serialize;
use std::fmt::Write as _;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

pub const TRI_MAGIC: &str = "#tri";
pub const TRI_VERSION: u32 = 1;

/// Layout of one triangle record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TriFormat {
    /// Vertices, face normal and three vertex colors
    #[default]
    Full,
    /// Vertices only
    GeometryOnly,
}

impl TriFormat {
    pub fn from_geo_only(geo_only: bool) -> Self {
        if geo_only {
            TriFormat::GeometryOnly
        } else {
            TriFormat::Full
        }
    }

    pub fn is_geometry_only(self) -> bool {
        self == TriFormat::GeometryOnly
    }

    /// Number of `f32` values per record
    pub const fn floats(self) -> usize {
        match self {
            TriFormat::Full => 21,
            TriFormat::GeometryOnly => 9,
        }
    }

    /// Record size in bytes
    pub const fn record_size(self) -> usize {
        self.floats() * 4
    }

    /// Append the record for `t` to `out`
    pub fn encode(self, t: &Triangle, out: &mut Vec<u8>) {
        let mut push = |v: Vec3| {
            for c in v.to_array() {
                out.extend_from_slice(&c.to_le_bytes());
            }
        };
        push(t.v0);
        push(t.v1);
        push(t.v2);
        if self == TriFormat::Full {
            push(t.normal);
            for color in t.colors {
                push(color);
            }
        }
    }

    /// Decode one record; `bytes` must hold at least [`record_size`](Self::record_size) bytes
    pub fn decode(self, bytes: &[u8]) -> Triangle {
        let vec = |i: usize| {
            Vec3::new(
                read_f32_le(bytes, i * 12),
                read_f32_le(bytes, i * 12 + 4),
                read_f32_le(bytes, i * 12 + 8),
            )
        };
        let (v0, v1, v2) = (vec(0), vec(1), vec(2));
        match self {
            TriFormat::Full => Triangle {
                v0,
                v1,
                v2,
                normal: vec(3),
                colors: [vec(4), vec(5), vec(6)],
            },
            TriFormat::GeometryOnly => Triangle {
                v0,
                v1,
                v2,
                normal: face_normal(v0, v1, v2),
                colors: [Vec3::ONE; 3],
            },
        }
    }
}

/// Write a batch of triangles in one call
pub fn write_records<W: Write>(
    out: &mut W,
    triangles: &[Triangle],
    format: TriFormat,
    scratch: &mut Vec<u8>,
) -> io::Result<()> {
    scratch.clear();
    scratch.reserve(triangles.len() * format.record_size());
    for t in triangles {
        format.encode(t, scratch);
    }
    out.write_all(scratch)
}

/// Contents of a `.tri` header
#[derive(Debug, Clone, PartialEq)]
pub struct TriInfo {
    pub version: u32,
    pub base: PathBuf,
    pub n_triangles: u64,
    pub format: TriFormat,
    pub bbox: AaBox<Vec3>,
}

impl TriInfo {
    pub fn new(
        base: impl Into<PathBuf>,
        n_triangles: u64,
        format: TriFormat,
        bbox: AaBox<Vec3>,
    ) -> Self {
        Self {
            version: TRI_VERSION,
            base: base.into(),
            n_triangles,
            format,
            bbox,
        }
    }

    pub fn header_path(&self) -> PathBuf {
        with_suffix(&self.base, ".tri")
    }

    pub fn data_path(&self) -> PathBuf {
        with_suffix(&self.base, ".tridata")
    }

    /// Check that both the header and its triangle sidecar are on disk
    pub fn files_exist(&self) -> bool {
        self.header_path().exists() && self.data_path().exists()
    }

    /// Parse a `.tri` header file
    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = read_text(path)?;
        let header = parse_header(&text, TRI_MAGIC).map_err(|m| SvoError::header(path, m))?;

        let mut info = TriInfo::new(
            base_of(path),
            0,
            TriFormat::Full,
            AaBox::new(Vec3::ZERO, Vec3::ONE),
        );
        info.version = header.version;
        for field in &header.fields {
            info.apply_field(field, path)
                .map_err(|m| SvoError::header(path, m))?;
        }
        Ok(info)
    }

    fn apply_field(&mut self, field: &Field<'_>, path: &Path) -> std::result::Result<(), String> {
        match field.key {
            "ntriangles" => self.n_triangles = field.value(0)?,
            "geo_only" => self.format = TriFormat::from_geo_only(field.value::<u8>(0)? != 0),
            "bbox" => self.bbox = parse_bbox(field)?,
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
        let _ = writeln!(s, "{} {}", TRI_MAGIC, self.version);
        let _ = writeln!(s, "ntriangles {}", self.n_triangles);
        let _ = writeln!(s, "geo_only {}", u8::from(self.format.is_geometry_only()));
        let _ = writeln!(s, "bbox {}", format_bbox(&self.bbox));
        let _ = writeln!(s, "END");
        s
    }

    /// Write the `.tri` header next to the sidecar
    pub fn write(&self) -> Result<()> {
        write_text(&self.header_path(), &self.to_header_string())
    }
}

pub(crate) fn parse_bbox(field: &Field<'_>) -> std::result::Result<AaBox<Vec3>, String> {
    let min = Vec3::new(field.value(0)?, field.value(1)?, field.value(2)?);
    let max = Vec3::new(field.value(3)?, field.value(4)?, field.value(5)?);
    if !min.cmple(max).all() {
        return Err(format!("bbox min {min} exceeds max {max}"));
    }
    Ok(AaBox { min, max })
}

pub(crate) fn format_bbox(bbox: &AaBox<Vec3>) -> String {
    format!(
        "{} {} {} {} {} {}",
        bbox.min.x, bbox.min.y, bbox.min.z, bbox.max.x, bbox.max.y, bbox.max.z
    )
}

/// Streams triangles into a `.tridata` sidecar and writes the header on finish
pub struct TriWriter {
    base: PathBuf,
    format: TriFormat,
    out: BufWriter<File>,
    n_triangles: u64,
    scratch: Vec<u8>,
}

impl TriWriter {
    pub fn create(base: impl Into<PathBuf>, format: TriFormat) -> Result<Self> {
        let base = base.into();
        let data_path = with_suffix(&base, ".tridata");
        let file = File::create(&data_path).map_err(|e| SvoError::file(&data_path, e))?;
        Ok(Self {
            base,
            format,
            out: BufWriter::new(file),
            n_triangles: 0,
            scratch: Vec::with_capacity(format.record_size()),
        })
    }

    pub fn write(&mut self, t: &Triangle) -> Result<()> {
        self.scratch.clear();
        self.format.encode(t, &mut self.scratch);
        self.out.write_all(&self.scratch)?;
        self.n_triangles += 1;
        Ok(())
    }

    pub fn count(&self) -> u64 {
        self.n_triangles
    }

    /// Flush the sidecar and write the header describing it
    pub fn finish(mut self, bbox: AaBox<Vec3>) -> Result<TriInfo> {
        self.out.flush()?;
        let info = TriInfo::new(self.base, self.n_triangles, self.format, bbox);
        info.write()?;
        Ok(info)
    }
}
