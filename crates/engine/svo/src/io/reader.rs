//! Sequential block reader over a triangle record sidecar

use super::tri::TriFormat;
use crate::error::{Result, SvoError};
use crate::geometry::Triangle;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

/// Default number of triangles loaded per refill
pub const DEFAULT_BLOCK_SIZE: usize = 8192;

/// Forward-only reader handing out triangles one at a time
///
/// Records are loaded in blocks of at most `block_size` triangles, so memory
/// stays bounded no matter how large the sidecar is. A short read is an error,
/// never a partial result.
pub struct TriReader {
    path: PathBuf,
    file: File,
    format: TriFormat,
    block_size: usize,
    /// Records still on disk
    unread: u64,
    block: Vec<Triangle>,
    cursor: usize,
    bytes: Vec<u8>,
}

impl TriReader {
    /// Open a sidecar holding exactly `n_triangles` records
    pub fn open(
        path: impl AsRef<Path>,
        n_triangles: u64,
        format: TriFormat,
        block_size: usize,
    ) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            return Err(SvoError::MissingFile(path));
        }
        let file = File::open(&path).map_err(|e| SvoError::file(&path, e))?;
        let block_size = block_size.max(1);
        Ok(Self {
            path,
            file,
            format,
            block_size,
            unread: n_triangles,
            block: Vec::with_capacity(block_size.min(n_triangles as usize)),
            cursor: 0,
            bytes: Vec::new(),
        })
    }

    pub fn has_next(&self) -> bool {
        self.cursor < self.block.len() || self.unread > 0
    }

    /// Return the next triangle; calling this past the end is an error
    pub fn read_next(&mut self) -> Result<Triangle> {
        if self.cursor == self.block.len() {
            if self.unread == 0 {
                return Err(SvoError::Invariant(format!(
                    "read past the last triangle of {}",
                    self.path.display()
                )));
            }
            self.refill()?;
        }
        let t = self.block[self.cursor];
        self.cursor += 1;
        Ok(t)
    }

    /// Load `min(unread, block_size)` records in a single read
    fn refill(&mut self) -> Result<()> {
        let count = self.unread.min(self.block_size as u64) as usize;
        let format = self.format;
        let record = format.record_size();

        // a failed read leaves the reader exhausted
        self.unread -= count as u64;
        self.block.clear();
        self.cursor = 0;

        self.bytes.resize(count * record, 0);
        self.file
            .read_exact(&mut self.bytes)
            .map_err(|e| SvoError::file(&self.path, e))?;
        self.block
            .extend(self.bytes.chunks_exact(record).map(|chunk| format.decode(chunk)));
        Ok(())
    }
}

impl Iterator for TriReader {
    type Item = Result<Triangle>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.has_next() {
            Some(self.read_next())
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::AaBox;
    use crate::io::tri::TriWriter;
    use glam::Vec3;

    fn write_mesh(dir: &Path, count: usize, format: TriFormat) -> PathBuf {
        let mut writer = TriWriter::create(dir.join("mesh"), format).unwrap();
        for i in 0..count {
            let o = Vec3::splat(i as f32);
            writer
                .write(&Triangle::new(o, o + Vec3::X, o + Vec3::Y))
                .unwrap();
        }
        writer
            .finish(AaBox::new(Vec3::ZERO, Vec3::splat(count as f32 + 1.0)))
            .unwrap()
            .data_path()
    }

    #[test]
    fn test_reads_across_block_boundaries() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_mesh(dir.path(), 10, TriFormat::Full);

        let mut reader = TriReader::open(&path, 10, TriFormat::Full, 3).unwrap();
        let mut seen = 0;
        while reader.has_next() {
            let t = reader.read_next().unwrap();
            assert_eq!(t.v0, Vec3::splat(seen as f32));
            seen += 1;
        }
        assert_eq!(seen, 10);
    }

    #[test]
    fn test_read_past_end_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_mesh(dir.path(), 1, TriFormat::GeometryOnly);

        let mut reader = TriReader::open(&path, 1, TriFormat::GeometryOnly, 16).unwrap();
        assert!(reader.read_next().is_ok());
        assert!(!reader.has_next());
        assert!(matches!(reader.read_next(), Err(SvoError::Invariant(_))));
    }

    #[test]
    fn test_short_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_mesh(dir.path(), 2, TriFormat::Full);

        // header claims more records than the sidecar holds
        let reader = TriReader::open(&path, 5, TriFormat::Full, 8).unwrap();
        let results: Vec<_> = reader.collect();
        assert_eq!(results.len(), 1);
        assert!(results[0].is_err());
    }

    #[test]
    fn test_zero_triangles() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_mesh(dir.path(), 0, TriFormat::Full);
        let mut reader = TriReader::open(&path, 0, TriFormat::Full, 0).unwrap();
        assert!(!reader.has_next());
        assert!(reader.next().is_none());
    }
}
