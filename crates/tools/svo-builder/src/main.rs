//! svo_builder - build a sparse voxel octree from a `.tri` mesh
//!
//! Settings come from the `SVO_*` environment variables first, then from the
//! command line. Log verbosity follows `RUST_LOG` when it is set.

use anyhow::Context;
use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::path::PathBuf;
use svo::{build_svo_with_progress, BuildConfig, BuildReport, ColorMode, Interpolation, VoxelizeMethod};
use tracing_subscriber::EnvFilter;

/// Out-of-core sparse voxel octree builder
#[derive(Parser)]
#[command(name = "svo_builder")]
#[command(about = "Voxelize a .tri mesh into a sparse voxel octree", long_about = None)]
struct Cli {
    /// Input mesh header (.tri)
    input: PathBuf,

    /// Voxel grid side length, a power of two (default: 1024)
    #[arg(short = 's', long)]
    gridsize: Option<u32>,

    /// Memory budget for one partition in megabytes (default: 2048)
    #[arg(short = 'l', long)]
    memory_limit: Option<u64>,

    /// Percent of a partition's cells kept in the sparse side list (default: 10)
    #[arg(long)]
    sparseness: Option<f64>,

    /// Store averaged data in interior nodes
    #[arg(long)]
    levels: bool,

    /// Voxel coloring: model, fixed, linear or normal
    #[arg(short, long)]
    color: Option<ColorMode>,

    /// Occupancy test: schwarz (tight) or huang (thick)
    #[arg(short, long, default_value = "schwarz")]
    method: VoxelizeMethod,

    /// Color sampling inside a triangle: barycentric or flat
    #[arg(long, default_value = "barycentric")]
    interpolation: Interpolation,

    /// Triangles buffered per partition before flushing to disk
    #[arg(long)]
    batch_size: Option<usize>,

    /// Leave the .trip partition files next to the input
    #[arg(long)]
    keep_partitions: bool,

    /// Write a JSON build report to this path
    #[arg(long)]
    report: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn to_config(&self) -> anyhow::Result<BuildConfig> {
        let mut config = BuildConfig::new(&self.input)
            .with_env()
            .context("invalid SVO_* environment")?;
        if let Some(gridsize) = self.gridsize {
            config = config.with_gridsize(gridsize);
        }
        if let Some(limit) = self.memory_limit {
            config = config.with_memory_limit(limit);
        }
        if let Some(sparseness) = self.sparseness {
            config = config.with_sparseness(sparseness);
        }
        if let Some(color) = self.color {
            config = config.with_color(color);
        }
        if let Some(batch_size) = self.batch_size {
            config = config.with_batch_size(batch_size);
        }
        let config = config
            .with_levels(self.levels)
            .with_method(self.method)
            .with_interpolation(self.interpolation)
            .with_keep_partitions(self.keep_partitions);
        config.validate()?;
        Ok(config)
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    // bad settings print usage and exit non-zero, like a bad flag would
    let config = match cli.to_config() {
        Ok(config) => config,
        Err(e) => Cli::command()
            .error(ErrorKind::ValueValidation, format!("{e:#}"))
            .exit(),
    };
    println!("SVO Builder");
    println!("===========");
    println!("Input: {}", config.input.display());
    println!("Grid: {0}x{0}x{0}", config.gridsize);
    println!("Memory limit: {} MB", config.memory_limit_mb);
    println!("Method: {}", config.method);
    println!("Color: {}", config.color);
    println!();

    let progress = ProgressBar::new(0);
    progress.set_style(
        ProgressStyle::with_template(
            "{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} partitions, {msg}",
        )?
        .progress_chars("=> "),
    );
    progress.set_message("partitioning");
    let report = build_svo_with_progress(&config, |p| {
        progress.set_length(p.total as u64);
        progress.set_position(p.index as u64 + 1);
        progress.set_message(format!("{} triangles, {} voxels", p.triangles, p.voxels));
    })
    .with_context(|| format!("failed to build octree from {}", config.input.display()))?;
    progress.finish_and_clear();

    print_summary(&report);

    if let Some(path) = &cli.report {
        let json = serde_json::to_string_pretty(&report)?;
        fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))?;
        tracing::info!("report written to {}", path.display());
    }

    Ok(())
}

fn print_summary(report: &BuildReport) {
    println!("✓ Octree written to {}", report.output.display());
    println!(
        "  {} partitions ({} empty, {} dense)",
        report.n_partitions, report.empty_partitions, report.dense_partitions
    );
    println!(
        "  {} triangles read, {} voxelized",
        report.n_triangles, report.triangles_processed
    );
    println!(
        "  {} voxels, {} nodes, {} data records",
        report.voxels_filled, report.n_nodes, report.n_data
    );
    if report.binary {
        println!("  geometry only: all voxels share one data record");
    }
    let t = &report.timings;
    println!(
        "  partitioning {:.2}s, voxelizing {:.2}s, building {:.2}s, total {:.2}s",
        t.partitioning, t.voxelizing, t.building, t.total
    );
}
