//! Ensemble Extract Library
//!
//! Interpolates gridded climate model output (NetCDF) onto a fixed set of
//! point locations and aggregates the results into winter mean temperature
//! cubes per experiment.
//!
//! This library provides tools for:
//! - Discovering source files per project and experiment, with resume
//! - Normalising rectilinear and curvilinear grid conventions
//! - Cropping grids to the targets and triangulated linear interpolation
//! - Running one file per worker on a bounded pool
//! - Seasonal filtering, grouping and caching of per-model means

pub mod aggregate;
pub mod cli;
pub mod config;
pub mod constants;
pub mod error;
pub mod grid;
pub mod models;
pub mod processor;
pub mod reader;

pub use aggregate::Aggregator;
pub use config::InterpolationConfig;
pub use error::{ExtractError, Result};
pub use grid::{GridError, SourceGrid};
pub use models::{
    BatchReport, ExperimentReport, ModelIdentity, SeasonalCube, TargetLocation, TargetLocations,
    TaskOutcome, WorkUnit,
};
pub use processor::InterpolationProcessor;
pub use reader::{GridReader, InMemoryReader, ReadError, default_reader};
