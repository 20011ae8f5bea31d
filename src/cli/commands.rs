//! Command implementations for the ensemble extractor CLI
//!
//! Sets up logging, turns parsed arguments into configuration and runs the
//! interpolation or aggregation stage with a console summary.

use crate::aggregate::Aggregator;
use crate::cli::{AggregateArgs, Args, Command, InterpolateArgs};
use crate::config::{InterpolationConfig, load_locations_csv};
use crate::constants::LOG_TARGET;
use crate::models::{SeasonalCube, TargetLocations};
use crate::processor::InterpolationProcessor;
use crate::reader::default_reader;

use anyhow::{Context, Result};
use colored::*;
use std::collections::HashMap;
use std::time::Instant;
use tokio::task;
use tracing::{debug, info};

/// Run the selected command
///
/// Returns `Ok(false)` when the run completed but some files failed.
pub async fn run(args: Args) -> Result<bool> {
    setup_logging(&args)?;
    debug!("Command line arguments: {:?}", args);

    match args.command {
        Command::Interpolate(interp) => run_interpolate(interp).await,
        Command::Aggregate(agg) => run_aggregate(agg).await,
    }
}

fn setup_logging(args: &Args) -> Result<()> {
    use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

    let log_level = args.log_level();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{}={}", LOG_TARGET, log_level)));

    if args.quiet {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_level(true)
                    .with_writer(std::io::stderr)
                    .compact(),
            )
            .try_init()
            .context("Failed to initialise logging")?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_level(true)
                    .with_timer(fmt::time::uptime())
                    .with_writer(std::io::stderr),
            )
            .try_init()
            .context("Failed to initialise logging")?;
    }

    debug!("Logging initialized at level: {}", log_level);
    Ok(())
}

fn collect_locations(args: &InterpolateArgs) -> Result<TargetLocations> {
    let mut locations = args.locations.clone();
    if let Some(path) = &args.locations_file {
        locations.extend(load_locations_csv(path)?);
    }
    Ok(TargetLocations::new(locations)?)
}

async fn run_interpolate(args: InterpolateArgs) -> Result<bool> {
    let locations = collect_locations(&args)?;

    let config = InterpolationConfig::new(&args.source, &args.output, &args.project)
        .with_experiments(args.experiments.iter().cloned())
        .with_variable(&args.variable)
        .with_workers(args.worker_count())
        .with_force_reprocess(args.force);

    info!(
        "Interpolating {} experiments of {} onto {} locations",
        config.experiments.len(),
        config.project,
        locations.len()
    );

    let reader = default_reader()?;
    let processor = InterpolationProcessor::new(config, locations, reader)?;
    let report = processor.process().await?;

    Ok(report.is_success())
}

async fn run_aggregate(args: AggregateArgs) -> Result<bool> {
    let start_time = Instant::now();
    let AggregateArgs {
        data,
        experiments,
        force,
    } = args;

    println!("{}", "Starting winter aggregation".bright_green().bold());
    println!("  {} {}", "Data:".bright_cyan(), data.display());

    let cubes = task::spawn_blocking(move || {
        let mut aggregator = Aggregator::new(data);
        let cubes = aggregator.load_winter_averages(&experiments, force)?;
        Ok::<_, crate::ExtractError>((experiments, cubes, aggregator.recomputations()))
    })
    .await
    .context("Aggregation task failed")??;

    let (experiments, cubes, recomputations) = cubes;
    print_cubes(&experiments, &cubes);
    println!(
        "  {} {} computed, {} loaded from cache in {}ms",
        "Cubes:".bright_cyan(),
        recomputations.to_string().bright_white(),
        experiments.len().saturating_sub(recomputations).to_string().bright_white(),
        start_time.elapsed().as_millis().to_string().bright_white()
    );

    Ok(true)
}

fn print_cubes(experiments: &[String], cubes: &HashMap<String, SeasonalCube>) {
    println!("\n{}", "Winter Averages".bright_green().bold());
    for experiment in experiments {
        let Some(cube) = cubes.get(experiment) else {
            continue;
        };
        let span = match (cube.years.first(), cube.years.last()) {
            (Some(first), Some(last)) => format!("{}-{}", first, last),
            _ => "no winter data".to_string(),
        };
        println!(
            "  {} {} models, {} locations, {}",
            format!("{}:", experiment).bright_cyan(),
            cube.models.len().to_string().bright_white(),
            cube.locations.len().to_string().bright_white(),
            span
        );
    }
}
