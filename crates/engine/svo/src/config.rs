//! Build configuration

use crate::error::{Result, SvoError};
use crate::io::reader::DEFAULT_BLOCK_SIZE;
use crate::octree::max_depth;
use crate::partition::DEFAULT_BATCH_SIZE;
use crate::voxelize::{ColorMode, Interpolation, VoxelizeMethod};
use std::path::PathBuf;
use std::str::FromStr;

pub const DEFAULT_GRIDSIZE: u32 = 1024;
pub const DEFAULT_MEMORY_LIMIT_MB: u64 = 2048;
pub const DEFAULT_SPARSENESS: f64 = 10.0;

/// Everything one octree build needs to know
///
/// ```
/// use svo::{BuildConfig, ColorMode};
///
/// let config = BuildConfig::new("bunny.tri")
///     .with_gridsize(512)
///     .with_color(ColorMode::Normal)
///     .with_levels(true);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct BuildConfig {
    /// `.tri` header of the input mesh
    pub input: PathBuf,
    /// Cells per axis, a power of 2
    pub gridsize: u32,
    /// Memory budget for one partition's occupancy grid
    pub memory_limit_mb: u64,
    /// Side list cap as a percentage of a partition's occupancy bytes
    pub sparseness: f64,
    pub generate_levels: bool,
    pub color: ColorMode,
    pub method: VoxelizeMethod,
    pub interpolation: Interpolation,
    /// Triangles per batched write while partitioning
    pub batch_size: usize,
    /// Triangles per read while streaming a partition
    pub block_size: usize,
    /// Leave the partition files on disk after the build
    pub keep_partitions: bool,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            input: PathBuf::new(),
            gridsize: DEFAULT_GRIDSIZE,
            memory_limit_mb: DEFAULT_MEMORY_LIMIT_MB,
            sparseness: DEFAULT_SPARSENESS,
            generate_levels: false,
            color: ColorMode::default(),
            method: VoxelizeMethod::default(),
            interpolation: Interpolation::default(),
            batch_size: DEFAULT_BATCH_SIZE,
            block_size: DEFAULT_BLOCK_SIZE,
            keep_partitions: false,
        }
    }
}

impl BuildConfig {
    pub fn new(input: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            ..Default::default()
        }
    }

    /// Defaults overridden by `SVO_GRIDSIZE`, `SVO_MEMORY_LIMIT`, `SVO_SPARSENESS` and `SVO_COLOR`
    pub fn from_env(input: impl Into<PathBuf>) -> Result<Self> {
        Self::from_lookup(input, |key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with a custom variable source
    pub fn from_lookup<F>(input: impl Into<PathBuf>, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let config = Self::new(input).with_lookup(lookup)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply the `SVO_*` environment variables without validating the result
    ///
    /// For callers that layer more overrides on top and validate at the end.
    pub fn with_env(self) -> Result<Self> {
        self.with_lookup(|key| std::env::var(key).ok())
    }

    /// Apply `SVO_*` overrides from `lookup`; only unparsable values are errors
    pub fn with_lookup<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = parse_var(&lookup, "SVO_GRIDSIZE")? {
            self.gridsize = v;
        }
        if let Some(v) = parse_var(&lookup, "SVO_MEMORY_LIMIT")? {
            self.memory_limit_mb = v;
        }
        if let Some(v) = parse_var(&lookup, "SVO_SPARSENESS")? {
            self.sparseness = v;
        }
        if let Some(v) = lookup("SVO_COLOR") {
            self.color = v.parse()?;
        }
        Ok(self)
    }

    pub fn with_gridsize(mut self, gridsize: u32) -> Self {
        self.gridsize = gridsize;
        self
    }

    pub fn with_memory_limit(mut self, megabytes: u64) -> Self {
        self.memory_limit_mb = megabytes;
        self
    }

    pub fn with_sparseness(mut self, percent: f64) -> Self {
        self.sparseness = percent;
        self
    }

    pub fn with_levels(mut self, generate_levels: bool) -> Self {
        self.generate_levels = generate_levels;
        self
    }

    pub fn with_color(mut self, color: ColorMode) -> Self {
        self.color = color;
        self
    }

    pub fn with_method(mut self, method: VoxelizeMethod) -> Self {
        self.method = method;
        self
    }

    pub fn with_interpolation(mut self, interpolation: Interpolation) -> Self {
        self.interpolation = interpolation;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_keep_partitions(mut self, keep: bool) -> Self {
        self.keep_partitions = keep;
        self
    }

    /// Reject settings the build cannot run with
    pub fn validate(&self) -> Result<()> {
        max_depth(self.gridsize)?;
        if self.memory_limit_mb <= 1 {
            return Err(SvoError::Config(format!(
                "memory limit must be more than 1 MB, got {}",
                self.memory_limit_mb
            )));
        }
        if !(0.0..=100.0).contains(&self.sparseness) {
            return Err(SvoError::Config(format!(
                "sparseness must be a percentage between 0 and 100, got {}",
                self.sparseness
            )));
        }
        if self.block_size == 0 {
            return Err(SvoError::Config("read block size must be positive".to_string()));
        }
        Ok(())
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| SvoError::Config(format!("{key}: cannot parse '{raw}'"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = BuildConfig::new("mesh.tri");
        assert_eq!(config.gridsize, 1024);
        assert_eq!(config.memory_limit_mb, 2048);
        assert_eq!(config.sparseness, 10.0);
        assert_eq!(config.color, ColorMode::FromModel);
        assert!(!config.generate_levels);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation() {
        let base = BuildConfig::new("mesh.tri");
        assert!(base.clone().with_gridsize(1000).validate().is_err());
        assert!(base.clone().with_gridsize(0).validate().is_err());
        assert!(base.clone().with_gridsize(1).validate().is_ok());
        assert!(base.clone().with_memory_limit(1).validate().is_err());
        assert!(base.clone().with_memory_limit(2).validate().is_ok());
        assert!(base.clone().with_sparseness(-1.0).validate().is_err());
        assert!(base.clone().with_sparseness(f64::NAN).validate().is_err());
        assert!(base.with_sparseness(0.0).validate().is_ok());
    }

    #[test]
    fn test_env_overrides() {
        let config = BuildConfig::from_lookup(
            "mesh.tri",
            lookup(&[
                ("SVO_GRIDSIZE", "256"),
                ("SVO_MEMORY_LIMIT", " 64 "),
                ("SVO_SPARSENESS", "2.5"),
                ("SVO_COLOR", "linear-by-morton"),
            ]),
        )
        .unwrap();
        assert_eq!(config.gridsize, 256);
        assert_eq!(config.memory_limit_mb, 64);
        assert_eq!(config.sparseness, 2.5);
        assert_eq!(config.color, ColorMode::Linear);
    }

    #[test]
    fn test_env_errors() {
        let bad_number = BuildConfig::from_lookup("m.tri", lookup(&[("SVO_GRIDSIZE", "big")]));
        assert!(matches!(bad_number, Err(SvoError::Config(_))));
        let bad_color = BuildConfig::from_lookup("m.tri", lookup(&[("SVO_COLOR", "plaid")]));
        assert!(matches!(bad_color, Err(SvoError::Config(_))));
        let not_pow2 = BuildConfig::from_lookup("m.tri", lookup(&[("SVO_GRIDSIZE", "300")]));
        assert!(matches!(not_pow2, Err(SvoError::Config(_))));
    }

    #[test]
    fn test_flags_can_fix_bad_env() {
        let env = lookup(&[("SVO_GRIDSIZE", "300"), ("SVO_SPARSENESS", "5")]);
        let config = BuildConfig::new("m.tri").with_lookup(&env).unwrap();
        assert_eq!(config.gridsize, 300);
        assert!(config.validate().is_err());

        let config = config.with_gridsize(256);
        assert!(config.validate().is_ok());
        assert_eq!(config.sparseness, 5.0);

        let bad_number = BuildConfig::new("m.tri").with_lookup(lookup(&[("SVO_MEMORY_LIMIT", "lots")]));
        assert!(matches!(bad_number, Err(SvoError::Config(_))));
    }
}
