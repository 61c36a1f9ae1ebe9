//! Error types shared by every pipeline stage

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while converting, partitioning, voxelizing or building
#[derive(Debug, Error)]
pub enum SvoError {
    /// I/O failure with no file to blame
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// I/O failure on a known file
    #[error("I/O error on {path}: {source}")]
    File {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A `.tri`, `.trip` or `.octree` header that does not parse
    #[error("Invalid header {path}: {message}")]
    Header { path: PathBuf, message: String },

    /// An input header or sidecar that is not on disk
    #[error("Missing file: {0}")]
    MissingFile(PathBuf),

    /// Unusable build settings
    #[error("Configuration error: {0}")]
    Config(String),

    /// A voxel reached the builder after a higher Morton code
    #[error("Voxel out of order: got morton code {got}, expected at least {expected}")]
    MortonOrder { expected: u64, got: u64 },

    /// A Morton code past the last cell of the grid
    #[error("Voxel outside grid: morton code {code} exceeds {max}")]
    MortonOverflow { code: u64, max: u64 },

    /// Builder state that should be impossible
    #[error("Octree invariant violated: {0}")]
    Invariant(String),
}

impl SvoError {
    /// Wrap an `io::Error` with the path it happened on
    pub fn file(path: impl Into<PathBuf>, source: io::Error) -> Self {
        SvoError::File {
            path: path.into(),
            source,
        }
    }

    pub fn header(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        SvoError::Header {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Result type alias for SVO operations that may fail
pub type Result<T> = std::result::Result<T, SvoError>;
