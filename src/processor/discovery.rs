//! Source file discovery for one experiment
//!
//! Lists the NetCDF files of an experiment directory, maps each to its
//! per-file array output and selects the ones that still need work.

use crate::constants::{ARRAY_EXTENSION, SOURCE_EXTENSIONS};
use crate::error::{ExtractError, Result};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// A source file paired with the array it produces
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub source: PathBuf,
    pub output: PathBuf,
}

/// Outcome of scanning one experiment directory
#[derive(Debug, Clone, Default)]
pub struct DiscoveryPlan {
    /// Every source file found, sorted by path
    pub sources: Vec<SourceFile>,
    /// The subset whose output must be (re)computed
    pub pending: Vec<SourceFile>,
}

impl DiscoveryPlan {
    pub fn skipped(&self) -> usize {
        self.sources.len() - self.pending.len()
    }
}

/// File discovery for one `<project>/<experiment>` directory
#[derive(Debug)]
pub struct FileDiscovery {
    source_dir: PathBuf,
    output_dir: PathBuf,
}

impl FileDiscovery {
    pub fn new(source_dir: PathBuf, output_dir: PathBuf) -> Self {
        Self {
            source_dir,
            output_dir,
        }
    }

    /// All source files in the experiment directory, sorted by path
    ///
    /// Only the directory itself is scanned; subdirectories are ignored.
    pub async fn discover_sources(&self) -> Result<Vec<PathBuf>> {
        if !fs::try_exists(&self.source_dir).await? {
            return Err(ExtractError::SourceNotFound {
                path: self.source_dir.clone(),
            });
        }

        debug!("Searching for source files in: {}", self.source_dir.display());

        let mut files = Vec::new();
        let mut dir = fs::read_dir(&self.source_dir).await?;

        while let Some(entry) = dir.next_entry().await? {
            let path = entry.path();
            if entry.file_type().await?.is_file() && is_source_file(&path) {
                files.push(path);
            }
        }

        files.sort();
        debug!("Found {} source files", files.len());

        Ok(files)
    }

    /// Output array path for a source file: same stem, array extension
    pub fn output_path_for(&self, source: &Path) -> PathBuf {
        let mut name = source
            .file_stem()
            .unwrap_or(source.as_os_str())
            .to_os_string();
        name.push(".");
        name.push(ARRAY_EXTENSION);
        self.output_dir.join(name)
    }

    /// Discover sources and select those whose output is missing
    ///
    /// With `force` every source is selected.
    pub async fn plan(&self, force: bool) -> Result<DiscoveryPlan> {
        let mut plan = DiscoveryPlan::default();

        for source in self.discover_sources().await? {
            let file = SourceFile {
                output: self.output_path_for(&source),
                source,
            };

            if force || !fs::try_exists(&file.output).await? {
                plan.pending.push(file.clone());
            } else {
                debug!("Skipping {}: output exists", file.source.display());
            }
            plan.sources.push(file);
        }

        Ok(plan)
    }
}

/// Check if a path carries a NetCDF extension
fn is_source_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| SOURCE_EXTENSIONS.contains(&ext))
}
