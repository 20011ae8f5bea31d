//! Error handling integration tests

use super::{constant_grid, create_experiment, test_locations};
use crate::config::InterpolationConfig;
use crate::error::ExtractError;
use crate::processor::InterpolationProcessor;
use crate::reader::InMemoryReader;
use ndarray::{ArrayD, IxDyn};
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;

#[tokio::test]
async fn test_missing_experiment_directory() {
    let temp_dir = TempDir::new().unwrap();
    let source_root = temp_dir.path().join("esgf");
    fs::create_dir_all(source_root.join("CMIP5")).unwrap();

    let config = InterpolationConfig::new(&source_root, temp_dir.path().join("out"), "CMIP5")
        .with_experiments(["historical"]);
    let processor = InterpolationProcessor::new(config, test_locations(), Arc::new(InMemoryReader::new()))
        .unwrap()
        .with_progress(false);

    match processor.process().await.unwrap_err() {
        ExtractError::SourceNotFound { path } => {
            assert_eq!(path, source_root.join("CMIP5").join("historical"));
        }
        other => panic!("Expected SourceNotFound error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_failing_file_does_not_stop_batch() {
    let temp_dir = TempDir::new().unwrap();
    let source_root = temp_dir.path().join("esgf");
    let output_root = temp_dir.path().join("out");

    let mut broken = constant_grid(1.0, 2);
    broken.values = ArrayD::zeros(IxDyn(&[2, 3, 3]));

    let mut reader = InMemoryReader::new();
    let paths = create_experiment(
        &source_root,
        "CMIP5",
        "historical",
        &[
            ("tas_Amon_A_historical_r1i1p1_X.nc", constant_grid(270.0, 2)),
            ("tas_Amon_B_historical_r1i1p1_X.nc", broken),
            ("tas_Amon_C_historical_r1i1p1_X.nc", constant_grid(271.0, 2)),
        ],
        &mut reader,
    );

    let config = InterpolationConfig::new(&source_root, &output_root, "CMIP5")
        .with_experiments(["historical"])
        .with_workers(3);
    let report = InterpolationProcessor::new(config, test_locations(), Arc::new(reader))
        .unwrap()
        .with_progress(false)
        .process()
        .await
        .unwrap();

    assert!(!report.is_success());
    assert_eq!(report.files_processed(), 2);
    assert_eq!(report.files_failed(), 1);

    let failure = report.experiments[0].failures().next().unwrap();
    assert_eq!(failure.source, paths[1]);
    assert_eq!(failure.unit_id, 1);
    match &failure.result {
        Err(ExtractError::Reshape { path, unit_id, .. }) => {
            assert_eq!(path, &paths[1]);
            assert_eq!(*unit_id, 1);
        }
        other => panic!("Expected Reshape error, got {:?}", other),
    }
    assert!(!failure.output.exists());
}

#[tokio::test]
async fn test_unreadable_file_is_a_load_failure() {
    let temp_dir = TempDir::new().unwrap();
    let source_root = temp_dir.path().join("esgf");
    let dir = source_root.join("CMIP5").join("rcp45");
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("tas_Amon_A_rcp45_r1i1p1_X.nc"), "garbage").unwrap();

    let config = InterpolationConfig::new(&source_root, temp_dir.path().join("out"), "CMIP5")
        .with_experiments(["rcp45"])
        .with_workers(1);
    let report = InterpolationProcessor::new(config, test_locations(), Arc::new(InMemoryReader::new()))
        .unwrap()
        .with_progress(false)
        .process()
        .await
        .unwrap();

    assert_eq!(report.files_failed(), 1);
    let failure = report.experiments[0].failures().next().unwrap();
    assert_eq!(failure.result.as_ref().unwrap_err().stage(), "load");
}

#[tokio::test]
async fn test_force_reprocess_rewrites_outputs() {
    let temp_dir = TempDir::new().unwrap();
    let source_root = temp_dir.path().join("esgf");
    let output_root = temp_dir.path().join("out");

    let mut reader = InMemoryReader::new();
    create_experiment(
        &source_root,
        "CMIP5",
        "historical",
        &[("tas_Amon_A_historical_r1i1p1_X.nc", constant_grid(270.0, 2))],
        &mut reader,
    );
    let reader = Arc::new(reader);

    let config = InterpolationConfig::new(&source_root, &output_root, "CMIP5")
        .with_experiments(["historical"])
        .with_workers(1);

    InterpolationProcessor::new(config.clone(), test_locations(), reader.clone())
        .unwrap()
        .with_progress(false)
        .process()
        .await
        .unwrap();

    let forced = InterpolationProcessor::new(config.with_force_reprocess(true), test_locations(), reader.clone())
        .unwrap()
        .with_progress(false)
        .process()
        .await
        .unwrap();

    assert!(forced.is_success());
    assert_eq!(forced.files_processed(), 1);
    assert_eq!(reader.reads(), 2);
}

#[test]
fn test_empty_experiment_list_is_rejected() {
    let config = InterpolationConfig::new("/esgf", "/out", "CMIP5");
    let result = InterpolationProcessor::new(config, test_locations(), Arc::new(InMemoryReader::new()));
    assert!(matches!(result, Err(ExtractError::Configuration { .. })));
}
