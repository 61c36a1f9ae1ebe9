//! tri_convert - turn an OBJ mesh into a `.tri` file for svo_builder

mod convert;

use clap::Parser;
use std::path::PathBuf;
use svo::TriFormat;
use tracing_subscriber::EnvFilter;

/// OBJ to .tri converter
#[derive(Parser)]
#[command(name = "tri_convert")]
#[command(about = "Convert an OBJ mesh into .tri/.tridata files", long_about = None)]
struct Cli {
    /// Input mesh (.obj)
    input: PathBuf,

    /// Output base path, without extension (default: input path without extension)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Write vertices only, dropping normals and colors
    #[arg(long)]
    geometry_only: bool,

    /// Ignore normals stored in the file and use face normals
    #[arg(long)]
    recompute_normals: bool,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let mut triangles = convert::load_obj(&cli.input, cli.recompute_normals)?;
    tracing::info!("loaded {} triangles from {}", triangles.len(), cli.input.display());

    let bbox = convert::fit_to_cube(&mut triangles)?;
    let base = cli.output.unwrap_or_else(|| cli.input.with_extension(""));
    let format = TriFormat::from_geo_only(cli.geometry_only);

    let info = convert::write_tri(base, &triangles, format, bbox)?;
    println!("✓ Wrote {} triangles to {}", info.n_triangles, info.header_path().display());
    println!("  bbox: {} to {}", info.bbox.min, info.bbox.max);
    Ok(())
}
