//! Batched per-partition triangle sink

use crate::error::{Result, SvoError};
use crate::geometry::{AaBox, Triangle};
use crate::io::tri::{write_records, TriFormat};
use glam::Vec3;
use std::fs::File;
use std::path::{Path, PathBuf};

/// Default number of triangles collected before one batched write
pub const DEFAULT_BATCH_SIZE: usize = 8192;

/// Collects the triangles that touch one partition box and writes them in batches
///
/// The output file is only created by the first write, so a partition that
/// receives no triangles leaves nothing on disk. A batch size of zero writes
/// every triangle as soon as it arrives. The pending list grows with what
/// arrives instead of reserving a whole batch up front. Pending triangles
/// are flushed on [`finish`](Self::finish), or on drop as a last resort.
pub struct BBoxBuffer {
    path: PathBuf,
    bbox_world: AaBox<Vec3>,
    format: TriFormat,
    batch_size: usize,
    pending: Vec<Triangle>,
    file: Option<File>,
    scratch: Vec<u8>,
    n_triangles: u64,
}

impl BBoxBuffer {
    pub fn new(
        path: impl Into<PathBuf>,
        bbox_world: AaBox<Vec3>,
        format: TriFormat,
        batch_size: usize,
    ) -> Self {
        Self {
            path: path.into(),
            bbox_world,
            format,
            batch_size,
            pending: Vec::new(),
            file: None,
            scratch: Vec::new(),
            n_triangles: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn bbox(&self) -> &AaBox<Vec3> {
        &self.bbox_world
    }

    /// Triangles accepted so far, written or pending
    pub fn n_triangles(&self) -> u64 {
        self.n_triangles
    }

    /// Keep `t` if its bounding box touches this partition; returns whether it was kept
    pub fn process(&mut self, t: &Triangle, t_bbox: &AaBox<Vec3>) -> Result<bool> {
        if !t_bbox.overlaps(&self.bbox_world) {
            return Ok(false);
        }
        self.pending.push(*t);
        self.n_triangles += 1;
        if self.pending.len() >= self.batch_size {
            self.flush()?;
        }
        Ok(true)
    }

    /// Write all pending triangles, opening the file if this is the first write
    pub fn flush(&mut self) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let file = match self.file.take() {
            Some(file) => file,
            None => File::create(&self.path).map_err(|e| SvoError::file(&self.path, e))?,
        };
        let file = self.file.insert(file);
        write_records(file, &self.pending, self.format, &mut self.scratch)
            .map_err(|e| SvoError::file(&self.path, e))?;
        self.pending.clear();
        Ok(())
    }

    /// Flush and close, returning the number of triangles stored
    pub fn finish(mut self) -> Result<u64> {
        self.flush()?;
        Ok(self.n_triangles)
    }
}

impl Drop for BBoxBuffer {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            tracing::warn!("failed to flush partition buffer {}: {}", self.path.display(), e);
        }
    }
}
