//! Parallel interpolation engine.
//!
//! Orchestrates the interpolation workflow for every configured experiment:
//! discover source files, skip those already done, then fan the remaining
//! units out to a bounded pool of blocking workers.

pub mod discovery;
pub mod worker;
pub mod writer;

#[cfg(test)]
pub mod tests;

use self::discovery::{FileDiscovery, SourceFile};

use crate::config::InterpolationConfig;
use crate::error::{ExtractError, Result};
use crate::models::{BatchReport, ExperimentReport, TargetLocations, TaskOutcome, WorkUnit};
use crate::reader::GridReader;

use colored::*;
use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use std::time::Instant;
use tokio::task;
use tracing::{debug, error, info};

/// Interpolates every source file of the configured experiments
pub struct InterpolationProcessor {
    config: InterpolationConfig,
    locations: Arc<TargetLocations>,
    reader: Arc<dyn GridReader>,
    show_progress: bool,
}

impl InterpolationProcessor {
    pub fn new(
        config: InterpolationConfig,
        locations: TargetLocations,
        reader: Arc<dyn GridReader>,
    ) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            config,
            locations: Arc::new(locations),
            reader,
            show_progress: true,
        })
    }

    /// Enable or disable the progress bar and console summary
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// Main processing entry point
    ///
    /// A missing experiment directory aborts the run. Per-file failures are
    /// captured in the report and do not stop other files.
    pub async fn process(&self) -> Result<BatchReport> {
        let start_time = Instant::now();
        let mut report = BatchReport::default();

        if self.show_progress {
            println!(
                "{}",
                "Starting ensemble interpolation".bright_green().bold()
            );
            println!(
                "  {} {}",
                "Project:".bright_cyan(),
                self.config.project
            );
            println!(
                "  {} {}",
                "Locations:".bright_cyan(),
                self.locations.len()
            );
            println!(
                "  {} {}",
                "Workers:".bright_cyan(),
                self.config.workers
            );
        }

        for experiment in &self.config.experiments {
            report.experiments.push(self.process_experiment(experiment).await?);
        }

        report.processing_time_ms = start_time.elapsed().as_millis();

        if self.show_progress {
            print_summary(&report);
        }

        Ok(report)
    }

    /// Interpolate the pending files of one experiment
    pub async fn process_experiment(&self, experiment: &str) -> Result<ExperimentReport> {
        let source_dir = self.config.experiment_source_dir(experiment);
        let discovery = FileDiscovery::new(
            source_dir.clone(),
            self.config.experiment_output_dir(experiment),
        );

        let plan = discovery.plan(self.config.force_reprocess).await?;

        info!(
            "{} ({} sources, {} to process)",
            experiment,
            plan.sources.len(),
            plan.pending.len()
        );

        let sources_found = plan.sources.len();
        let to_process = plan.pending.len();
        let units = self.work_units(plan.pending);
        let outcomes = self.dispatch(experiment, units).await;

        Ok(ExperimentReport {
            experiment: experiment.to_string(),
            source_dir,
            sources_found,
            to_process,
            outcomes,
        })
    }

    fn work_units(&self, pending: Vec<SourceFile>) -> Vec<WorkUnit> {
        pending
            .into_iter()
            .enumerate()
            .map(|(id, file)| WorkUnit {
                id,
                source: file.source,
                output: file.output,
                variable: self.config.variable.clone(),
                locations: Arc::clone(&self.locations),
                overwrite: self.config.force_reprocess,
            })
            .collect()
    }

    /// Run units on the worker pool, serially below two workers
    async fn dispatch(&self, experiment: &str, units: Vec<WorkUnit>) -> Vec<TaskOutcome> {
        if units.is_empty() {
            return Vec::new();
        }

        let pb = self.progress_bar(units.len() as u64, experiment);
        let workers = self.config.workers;

        let mut outcomes = if workers < 2 {
            debug!("Running {} units serially", units.len());
            let mut outcomes = Vec::with_capacity(units.len());
            for unit in units {
                outcomes.push(run_unit(Arc::clone(&self.reader), unit, &pb).await);
            }
            outcomes
        } else {
            debug!("Running {} units on {} workers", units.len(), workers);
            stream::iter(units)
                .map(|unit| run_unit(Arc::clone(&self.reader), unit, &pb))
                .buffer_unordered(workers)
                .collect::<Vec<_>>()
                .await
        };

        pb.finish_with_message(format!("{} done", experiment));

        outcomes.sort_by_key(|o| o.unit_id);
        outcomes
    }

    fn progress_bar(&self, len: u64, experiment: &str) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }

        let pb = ProgressBar::new(len);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        pb.set_message(experiment.to_string());
        pb
    }
}

/// Run one unit on a blocking thread and capture its result
async fn run_unit(reader: Arc<dyn GridReader>, unit: WorkUnit, pb: &ProgressBar) -> TaskOutcome {
    let unit_id = unit.id;
    let source = unit.source.clone();
    let output = unit.output.clone();

    let result = match task::spawn_blocking(move || worker::process_unit(reader.as_ref(), &unit)).await {
        Ok(result) => result,
        Err(e) => Err(ExtractError::TaskFailed {
            path: source.clone(),
            reason: e.to_string(),
        }),
    };

    pb.inc(1);

    match &result {
        Ok(rows) => debug!("Successfully processed {} ({} timesteps)", source.display(), rows),
        Err(e) => error!("Failed to process {}: {}", source.display(), e),
    }

    TaskOutcome {
        unit_id,
        source,
        output,
        result,
    }
}

fn print_summary(report: &BatchReport) {
    println!("\n{}", "Interpolation Summary".bright_green().bold());
    println!(
        "  {} {}ms",
        "Time elapsed:".bright_cyan(),
        report.processing_time_ms.to_string().bright_white()
    );

    for experiment in &report.experiments {
        println!(
            "  {} {} processed, {} skipped",
            format!("{}:", experiment.experiment).bright_cyan(),
            experiment.files_processed().to_string().bright_white(),
            experiment.files_skipped().to_string().bright_white()
        );
        for failure in experiment.failures() {
            if let Err(e) = &failure.result {
                println!(
                    "    {} [{}] {}",
                    "failed".bright_red(),
                    e.stage(),
                    failure.source.display()
                );
            }
        }
    }

    if report.files_failed() > 0 {
        println!(
            "  {} {}",
            "Files failed:".bright_red(),
            report.files_failed().to_string().bright_red().bold()
        );
    }
    println!(
        "  {} {}",
        "Files processed:".bright_cyan(),
        report.files_processed().to_string().bright_white().bold()
    );
}
