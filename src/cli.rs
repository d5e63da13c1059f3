//! Defines command-line interface options using `clap` for the dl-wind application.

use crate::names::SitePreset;
use crate::qc::QcPolicy;
use crate::wind::DEFAULT_SPEED_TOLERANCE;
use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

/// A CLI tool for deriving winds from Doppler lidar NetCDF files
#[derive(Parser, Debug)]
#[command(
    version,
    name = "dl-wind",
    about = "Quality-controlled wind components and profiles from Doppler lidar scans"
)]
pub struct Args {
    /// Enable debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true, default_value_t = false)]
    pub verbose: bool,

    /// Number of threads for profile reductions. Defaults to the number of CPU cores.
    #[arg(short = 't', long, global = true)]
    pub threads: Option<usize>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List attributes, dimensions and variables of a file
    Inspect {
        /// Path to the NetCDF file
        file: PathBuf,

        /// Describe one variable in detail
        #[arg(long)]
        describe: Option<String>,

        /// Check that the mapped variable names exist in the file
        #[arg(long)]
        check: bool,

        #[command(flatten)]
        names: NameArgs,
    },

    /// Combine scans, apply QC and derive wind components
    Wind {
        /// Scan files, combined in the order given
        #[arg(
            long,
            num_args = 1..,
            conflicts_with = "pattern",
            required_unless_present = "pattern"
        )]
        files: Vec<PathBuf>,

        /// Glob pattern for scan files, combined in sorted order
        #[arg(long)]
        pattern: Option<String>,

        /// Which QC codes are accepted
        #[arg(long, default_value_t = QcPolicy::KeepOnlyZero)]
        qc_policy: QcPolicy,

        /// Write the wind product to this NetCDF file
        #[arg(long)]
        output: Option<PathBuf>,

        /// Compute and print the per-gate turbulence profile
        #[arg(long)]
        turbulence: bool,

        #[command(flatten)]
        names: NameArgs,
    },

    /// Check a file's wind speed against its own u/v components
    VerifySpeed {
        /// Path to the NetCDF file
        file: PathBuf,

        /// Absolute tolerance in m/s
        #[arg(long, default_value_t = DEFAULT_SPEED_TOLERANCE)]
        tolerance: f64,

        #[command(flatten)]
        names: NameArgs,
    },

    /// Summarise a pre-derived time-height variable such as U, Phi or Theta
    Field {
        /// Path to the NetCDF file
        file: PathBuf,

        /// Variable to summarise
        #[arg(long)]
        var: String,

        #[arg(long, default_value = "time")]
        time_var: String,

        #[arg(long, default_value = "height")]
        height_var: String,
    },
}

/// Selection of the variable names used by a site
#[derive(ClapArgs, Debug, Clone)]
pub struct NameArgs {
    /// Built-in naming preset: 'arm' or 'sta'
    #[arg(long, default_value = "arm")]
    pub site: SitePreset,

    /// JSON file overriding individual variable names
    #[arg(long)]
    pub names: Option<PathBuf>,
}
