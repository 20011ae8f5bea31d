//! Application constants for the ensemble extractor
//!
//! File naming conventions, the seasonal month set and the date epoch used
//! throughout the interpolation and aggregation stages.

// =============================================================================
// Source discovery
// =============================================================================

/// File extensions accepted as gridded source files (case sensitive)
pub const SOURCE_EXTENSIONS: &[&str] = &["nc", "nc4"];

/// Names of the coordinate variables read from every source file
pub const LATITUDE_VARIABLE: &str = "lat";
pub const LONGITUDE_VARIABLE: &str = "lon";
pub const TIME_VARIABLE: &str = "time";

/// Default variable to interpolate (near-surface air temperature)
pub const DEFAULT_VARIABLE: &str = "tas";

// =============================================================================
// Output layout
// =============================================================================

/// Extension of per-file interpolated arrays
pub const ARRAY_EXTENSION: &str = "parquet";

/// Column holding the raw time offset in a per-file array
pub const TIME_COLUMN: &str = "time";

/// Prefix of the per-location value columns (`loc_0`, `loc_1`, ...)
pub const LOCATION_COLUMN_PREFIX: &str = "loc_";

/// Name of the seasonal cube cache artifact inside an experiment directory
pub const CACHE_FILE_NAME: &str = "winter.parquet";

/// Suffix appended to an output path while it is being written
pub const PARTIAL_SUFFIX: &str = "partial";

// =============================================================================
// Aggregation
// =============================================================================

/// Months kept by the seasonal filter. March is included on purpose.
pub const WINTER_MONTHS: &[u32] = &[12, 1, 2, 3];

/// Epoch of the time axis: offsets count days after this date
pub const EPOCH_YEAR: i32 = 1949;
pub const EPOCH_MONTH: u32 = 12;
pub const EPOCH_DAY: u32 = 1;

// =============================================================================
// Runtime
// =============================================================================

/// Environment variable overriding the worker count
pub const WORKERS_ENV_VAR: &str = "INTERP_CPUS";

/// Module target used for the default log filter
pub const LOG_TARGET: &str = "ensemble_extract";
