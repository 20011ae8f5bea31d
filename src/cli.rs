//! Command-line interface components.

pub mod commands;

use crate::config::default_workers;
use crate::constants::{DEFAULT_VARIABLE, WORKERS_ENV_VAR};
use crate::models::TargetLocation;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "ensemble-extract")]
#[command(about = "Interpolate gridded climate model output onto point locations and aggregate winter means")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only log warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Interpolate every source file of the given experiments onto the target locations
    #[cfg_attr(
        not(feature = "netcdf"),
        command(
            about = "Interpolate every source file of the given experiments onto the target locations (unavailable: built without the `netcdf` feature)"
        )
    )]
    Interpolate(InterpolateArgs),

    /// Compute (or load) the winter mean cube of each experiment
    Aggregate(AggregateArgs),
}

#[derive(clap::Args, Debug)]
pub struct InterpolateArgs {
    /// Root directory holding <PROJECT>/<EXPERIMENT>/*.nc
    #[arg(short, long, value_name = "DIR")]
    pub source: PathBuf,

    /// Root directory receiving <PROJECT>/<EXPERIMENT>/*.parquet
    #[arg(short, long, value_name = "DIR")]
    pub output: PathBuf,

    /// Project directory name
    #[arg(short, long, default_value = "CMIP5")]
    pub project: String,

    /// Experiments to process (comma separated or repeated)
    #[arg(short, long = "experiment", value_delimiter = ',', required = true)]
    pub experiments: Vec<String>,

    /// Target location as LAT,LON (repeatable)
    #[arg(short, long = "location", value_name = "LAT,LON", allow_hyphen_values = true, value_parser = parse_location)]
    pub locations: Vec<TargetLocation>,

    /// CSV file with lat/lon columns, appended after --location values
    #[arg(long, value_name = "CSV")]
    pub locations_file: Option<PathBuf>,

    /// Variable to interpolate
    #[arg(long, default_value = DEFAULT_VARIABLE)]
    pub variable: String,

    /// Worker pool size [default: CPUs - 1]
    #[arg(short = 'j', long, env = WORKERS_ENV_VAR)]
    pub workers: Option<usize>,

    /// Reinterpolate files whose output already exists
    #[arg(short, long)]
    pub force: bool,
}

impl InterpolateArgs {
    /// Configured worker count, never below one
    pub fn worker_count(&self) -> usize {
        self.workers.unwrap_or_else(default_workers).max(1)
    }
}

#[derive(clap::Args, Debug)]
pub struct AggregateArgs {
    /// Directory holding one subdirectory of per-file arrays per experiment
    #[arg(short, long, value_name = "DIR")]
    pub data: PathBuf,

    /// Experiments to aggregate (comma separated or repeated)
    #[arg(short, long = "experiment", value_delimiter = ',', required = true)]
    pub experiments: Vec<String>,

    /// Recompute cubes even when a cache file exists
    #[arg(short, long)]
    pub force: bool,
}

impl Args {
    pub fn log_level(&self) -> &'static str {
        if self.verbose {
            "debug"
        } else if self.quiet {
            "warn"
        } else {
            "info"
        }
    }
}

fn parse_location(value: &str) -> Result<TargetLocation, String> {
    TargetLocation::parse(value).map_err(|e| e.to_string())
}
