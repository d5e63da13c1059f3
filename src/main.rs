//! Entry point for the dl-wind application.
//! Handles CLI parsing, logging setup, and dispatches inspection, wind derivation and checks.

use clap::Parser;
use dl_wind::cli::{Args, Command, NameArgs};
use dl_wind::prelude::*;
use dl_wind::{metadata, reader};
use std::path::PathBuf;
use tracing::{error, warn};
use tracing_subscriber::{fmt, EnvFilter};

fn main() {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    fmt().with_env_filter(filter).with_target(false).init();

    if let Err(e) = run(args) {
        error!("{e}");
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<()> {
    ParallelConfig::new(args.threads).setup_global_pool()?;

    match args.command {
        Command::Inspect {
            file,
            describe,
            check,
            names,
        } => {
            let nc = netcdf::open(&file)?;
            println!("Successfully opened NetCDF file: {}", file.display());
            match describe {
                Some(var) => metadata::describe_variable(&nc, &var)?,
                None => metadata::print_metadata(&nc)?,
            }
            if check {
                metadata::print_variable_check(&nc, &resolve_names(&names)?);
            }
        }

        Command::Wind {
            files,
            pattern,
            qc_policy,
            output,
            turbulence,
            names,
        } => {
            let names = resolve_names(&names)?;
            let paths: Vec<PathBuf> = match pattern {
                Some(pattern) => reader::discover_files(&pattern)?,
                None => files,
            };

            let scans = reader::read_scans(&paths, &names)?;
            let series = concatenate_scans(&scans)?;
            drop(scans);

            let product = derive_wind(&series, qc_policy)?;
            let timestamps = product.timestamps()?;
            if let (Some(start), Some(end)) = (timestamps.first(), timestamps.last()) {
                println!(
                    "\n Time span: {} to {}",
                    start.format("%Y-%m-%d %H:%M:%S"),
                    end.format("%H:%M:%S")
                );
            }
            println!(" Profiles: {}  Gates: {}", product.time.len(), product.range.len());
            println!(" QC policy: {qc_policy} ({} cells rejected)", product.qc_rejected);
            FieldSummary::from_values(product.field.speed.iter())?.print("wind speed (m/s)");

            let profile = turbulence.then(|| TurbulenceProfile::from_product(&product));
            if let Some(profile) = &profile {
                profile.print_table();
            }

            if let Some(output) = output {
                write_wind_product(&product, profile.as_ref(), &output)?;
                println!("\n✅ Saved result to {}", output.display());
            }
        }

        Command::VerifySpeed {
            file,
            tolerance,
            names,
        } => {
            let names = resolve_names(&names)?;
            match reader::verify_file_speed(&file, &names, tolerance) {
                Ok(check) => println!(
                    "✅ '{}' matches sqrt({}^2 + {}^2): {} checked, {} skipped, max dev {:e}",
                    names.wind_speed,
                    names.eastward_wind,
                    names.northward_wind,
                    check.checked,
                    check.skipped,
                    check.max_deviation
                ),
                Err(e @ DlWindError::InconsistentDerivedField { .. }) => {
                    warn!("{e}");
                    println!("⚠ Wind speed does not match its components");
                    println!("  Check the variable names and units");
                    std::process::exit(2);
                }
                Err(e) => return Err(e),
            }
        }

        Command::Field {
            file,
            var,
            time_var,
            height_var,
        } => {
            let nc = netcdf::open(&file)?;
            let source = file.display().to_string();
            let field = reader::read_time_height_field(&nc, &var, &time_var, &height_var, &source)?;
            println!(
                " {} over {} times x {} heights{}",
                field.name,
                field.time.len(),
                field.height.len(),
                field.units.as_deref().map(|u| format!(" [{u}]")).unwrap_or_default()
            );
            FieldSummary::from_values(field.values.iter())?.print(&field.name);
            let label = format!("{} mean over time", field.name);
            let profile = reduce_over_time(field.values.view(), ProfileStatistic::Mean);
            println!("\n {label}");
            for (height, value) in field.height.iter().zip(profile.iter()) {
                println!("   {height:>10.1} m  {value:>10.3}");
            }
        }
    }

    Ok(())
}

fn resolve_names(args: &NameArgs) -> Result<VariableNameMap> {
    let base = args.site.names();
    match &args.names {
        Some(path) => VariableNameMap::from_json_file(path, base),
        None => Ok(base),
    }
}
