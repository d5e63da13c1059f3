//! dl_wind: wind derivation from Doppler lidar NetCDF scans
//!
//! A Rust library for turning Doppler lidar radial-velocity scans (ARM-style
//! `.cdf`/`.nc` files) into quality-controlled horizontal wind components,
//! wind speed and per-gate turbulence profiles.
//!
//! ## Key Features
//!
//! - **Explicit QC policies**: `keep-only-zero` or `reject-only-one`, never implied
//! - **Site name maps**: per-site variable names from presets or JSON files
//! - **Batch concatenation**: scans joined along time with range-axis checks
//! - **Wind projection**: whole-array decomposition of radial velocity by azimuth
//! - **Cross-checks**: a file's own wind speed against its u/v components
//! - **Profiles**: parallel per-gate statistics over time
//!
//! ## Module Organization
//!
//! - [`qc`]: QC policies and masking
//! - [`scan`]: scans and their concatenation
//! - [`wind`]: wind projection and derived-speed verification
//! - [`time_axis`]: time-unit parsing and calendar-aware decoding
//! - [`names`]: per-site variable naming
//! - [`reader`]: NetCDF reading and input discovery
//! - [`profile`]: per-gate reductions and turbulence profiles
//! - [`metadata`]: file inspection
//! - [`netcdf_io`]: writing wind products
//! - [`parallel`]: thread-pool configuration
//! - [`errors`]: centralized error handling
//!
//! ## Usage
//!
//! ```rust,no_run
//! use dl_wind::prelude::*;
//! use std::path::PathBuf;
//!
//! let names = SitePreset::ArmDopplerLidar.names();
//! let paths = vec![PathBuf::from("sgpdlfptS5.b1.20230403.000000.cdf")];
//! let scans = dl_wind::reader::read_scans(&paths, &names).unwrap();
//! let series = concatenate_scans(&scans).unwrap();
//! let product = derive_wind(&series, QcPolicy::KeepOnlyZero).unwrap();
//! println!("{} valid cells", product.field.valid_count());
//! ```

pub mod cli;
pub mod errors;
pub mod metadata;
pub mod names;
pub mod netcdf_io;
pub mod parallel;
pub mod profile;
pub mod qc;
pub mod reader;
pub mod scan;
pub mod time_axis;
pub mod wind;

pub use errors::*;
pub use names::*;
pub use qc::*;
pub use scan::*;
pub use wind::*;

pub mod prelude {
    //! Commonly used imports for convenience
    pub use crate::errors::{DlWindError, Result};
    pub use crate::names::{SitePreset, VariableNameMap};
    pub use crate::netcdf_io::{write_wind_product, WindProductWriter};
    pub use crate::parallel::ParallelConfig;
    pub use crate::profile::{reduce_over_time, FieldSummary, ProfileStatistic, TurbulenceProfile};
    pub use crate::qc::{apply_qc, QcPolicy, DEFAULT_FILL_VALUE};
    pub use crate::scan::{concatenate_scans, CombinedSeries, Scan};
    pub use crate::time_axis::{decode_times, Calendar, TimeUnits};
    pub use crate::wind::{
        derive_wind, project_wind, verify_derived_speed, SpeedCheck, WindField, WindProduct,
    };
}
