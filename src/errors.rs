//! Centralized error handling for dl_wind
//!
//! Every fallible operation in the crate returns [`Result`], so callers can tell
//! a missing variable apart from a shape mismatch or a failed cross-check.

use thiserror::Error;

/// Main error type for dl_wind operations
#[derive(Debug, Error)]
pub enum DlWindError {
    /// NetCDF library errors
    #[error("NetCDF error: {0}")]
    NetCDF(#[from] netcdf::Error),

    /// I/O operation errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Site configuration file could not be parsed
    #[error("Configuration parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// Array shape errors raised by ndarray
    #[error("Array error: {0}")]
    Array(#[from] ndarray::ShapeError),

    /// Invalid glob pattern for input discovery
    #[error("Invalid file pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    /// A required variable is absent from a scan
    #[error("Variable '{var}' not found in {source_name}")]
    MissingVariable { var: String, source_name: String },

    /// Arrays that must line up do not
    #[error("Shape mismatch: {message}")]
    ShapeMismatch { message: String },

    /// A file's own wind speed disagrees with its wind components
    #[error(
        "Derived wind speed inconsistent with components: {mismatches} of {checked} cells exceed \
         tolerance {tolerance:e} (max deviation {max_deviation:e}, first at index {first_index})"
    )]
    InconsistentDerivedField {
        mismatches: usize,
        checked: usize,
        max_deviation: f64,
        tolerance: f64,
        first_index: usize,
    },

    /// Concatenation was asked to combine zero scans
    #[error("Cannot combine an empty batch of scans")]
    EmptyBatch,

    /// Time units string could not be understood
    #[error("Invalid time units '{units}': {reason}")]
    InvalidTimeUnits { units: String, reason: String },

    /// Calendar other than the Gregorian family
    #[error("Unsupported calendar '{calendar}'")]
    UnsupportedCalendar { calendar: String },

    /// Time offset that cannot be turned into a timestamp
    #[error("Invalid time value {value}")]
    InvalidTimeValue { value: f64 },

    /// Invalid configuration value
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// Thread pool configuration error
    #[error("Thread pool error: {0}")]
    ThreadPoolError(String),

    /// A file pattern matched nothing
    #[error("No input files match '{pattern}'")]
    NoInputFiles { pattern: String },
}

impl DlWindError {
    pub(crate) fn missing_variable(var: &str, source_name: &str) -> Self {
        Self::MissingVariable {
            var: var.to_string(),
            source_name: source_name.to_string(),
        }
    }

    pub(crate) fn shape_mismatch(message: impl Into<String>) -> Self {
        Self::ShapeMismatch {
            message: message.into(),
        }
    }
}

/// Result type alias for dl_wind operations
pub type Result<T> = std::result::Result<T, DlWindError>;
