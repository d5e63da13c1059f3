//! Reading lidar variables from NetCDF files
//!
//! Every variable is looked up through a [`VariableNameMap`]; a missing name is
//! reported as [`DlWindError::MissingVariable`] rather than guessed. Files are
//! opened for the duration of one call and closed when the handle drops, on
//! success and on error alike.

use crate::errors::{DlWindError, Result};
use crate::names::VariableNameMap;
use crate::qc::DEFAULT_FILL_VALUE;
use crate::scan::Scan;
use crate::time_axis::Calendar;
use crate::wind::{verify_derived_speed, SpeedCheck};
use glob::glob;
use ndarray::{Array, Array1, Array2, ArrayD, Dimension};
use netcdf::{AttributeValue, File, Variable};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// A pre-derived `[time, height]` product such as `U`, `Phi` or `Theta`
#[derive(Debug, Clone)]
pub struct TimeHeightField {
    pub name: String,
    pub units: Option<String>,
    pub time: Array1<f64>,
    pub time_units: Option<String>,
    pub height: Array1<f64>,
    /// Values with fill cells replaced by NaN
    pub values: Array2<f64>,
}

/// Expands a glob pattern into a sorted list of files
///
/// # Errors
///
/// Returns an error for an invalid pattern or when nothing matches.
pub fn discover_files(pattern: &str) -> Result<Vec<PathBuf>> {
    let mut paths: Vec<PathBuf> = glob(pattern)?.filter_map(std::result::Result::ok).collect();
    paths.sort();

    if paths.is_empty() {
        return Err(DlWindError::NoInputFiles {
            pattern: pattern.to_string(),
        });
    }
    debug!("Pattern '{pattern}' matched {} files", paths.len());
    Ok(paths)
}

/// Opens one file and reads it as a [`Scan`]
///
/// # Errors
///
/// Returns an error if the file cannot be opened or a required variable is
/// missing or misshapen.
pub fn open_scan(path: &Path, names: &VariableNameMap) -> Result<Scan> {
    let file = netcdf::open(path)?;
    read_scan(&file, names, &path.display().to_string())
}

/// Reads scans in the given order
///
/// # Errors
///
/// Stops at the first file that fails to read.
pub fn read_scans(paths: &[PathBuf], names: &VariableNameMap) -> Result<Vec<Scan>> {
    paths
        .iter()
        .map(|path| {
            info!("Reading: {}", path.display());
            open_scan(path, names)
        })
        .collect()
}

/// Reads the five scan variables (plus elevation when named) from an open file
///
/// # Errors
///
/// - [`DlWindError::MissingVariable`] when a named variable is absent
/// - [`DlWindError::ShapeMismatch`] when radial velocity is not `[time, range]`
///   or azimuth is neither scalar nor per time step
/// - time units errors when the time variable has no usable `units` attribute
pub fn read_scan(file: &File, names: &VariableNameMap, source: &str) -> Result<Scan> {
    let time_var = variable(file, &names.time, source)?;
    let time = Array1::from(time_var.get_values::<f64, _>(..)?);
    let time_units =
        string_attribute(&time_var, "units").ok_or_else(|| DlWindError::InvalidTimeUnits {
            units: String::new(),
            reason: format!("'{}' in {source} has no units attribute", names.time),
        })?;
    let calendar = Calendar::parse(string_attribute(&time_var, "calendar").as_deref())?;

    let range = Array1::from(variable(file, &names.range, source)?.get_values::<f64, _>(..)?);
    let shape = (time.len(), range.len());

    let azimuth = read_per_time(file, &names.azimuth, source, time.len())?;

    let velocity_var = variable(file, &names.radial_velocity, source)?;
    let fill_value = fill_value(&velocity_var).unwrap_or(DEFAULT_FILL_VALUE);
    let radial_velocity = read_time_range(&velocity_var, source, shape)?;

    let qc_var = variable(file, &names.qc_radial_velocity, source)?;
    let qc_shape = dimension_lengths(&qc_var);
    if qc_shape != [shape.0, shape.1] {
        return Err(DlWindError::shape_mismatch(format!(
            "{source}: '{}' is {qc_shape:?}, expected [time, range] = {shape:?}",
            qc_var.name()
        )));
    }
    let qc_radial_velocity = Array2::from_shape_vec(shape, qc_var.get_values::<i32, _>(..)?)?;

    let mut scan = Scan::new(source, time, range, azimuth, radial_velocity, qc_radial_velocity)?
        .with_time_units(time_units, calendar)
        .with_fill_value(fill_value);

    if let Some(elevation_name) = &names.elevation {
        let elevation = read_per_time(file, elevation_name, source, scan.time_len())?;
        scan = scan.with_elevation(elevation)?;
    }

    debug!(
        "{source}: {} profiles x {} gates, fill value {fill_value}",
        scan.time_len(),
        scan.range_len()
    );
    Ok(scan)
}

/// Reads a file's own eastward, northward and speed variables, fill cells as NaN
///
/// # Errors
///
/// Returns [`DlWindError::MissingVariable`] if any of the three names is absent.
pub fn read_derived_speed(
    file: &File,
    names: &VariableNameMap,
    source: &str,
) -> Result<(ArrayD<f64>, ArrayD<f64>, ArrayD<f64>)> {
    let [east, north, speed] = names.derived_variables();
    Ok((
        read_field(file, east, source)?,
        read_field(file, north, source)?,
        read_field(file, speed, source)?,
    ))
}

/// Opens a file and checks its wind speed against its own components
///
/// # Errors
///
/// Returns [`DlWindError::InconsistentDerivedField`] when the check fails, and
/// read errors as for [`read_derived_speed`].
pub fn verify_file_speed(
    path: &Path,
    names: &VariableNameMap,
    tolerance: f64,
) -> Result<SpeedCheck> {
    let source = path.display().to_string();
    let (u, v, speed) = {
        let file = netcdf::open(path)?;
        read_derived_speed(&file, names, &source)?
    };
    info!(
        "{source}: '{}' {:?}, '{}' {:?}, '{}' {:?}",
        names.eastward_wind,
        u.shape(),
        names.northward_wind,
        v.shape(),
        names.wind_speed,
        speed.shape()
    );
    verify_derived_speed(u.view(), v.view(), speed.view(), tolerance)
}

/// Reads a `[time, height]` variable with its coordinate axes
///
/// A variable stored as `[height, time]` is transposed.
///
/// # Errors
///
/// Returns an error if any variable is missing or the shapes disagree.
pub fn read_time_height_field(
    file: &File,
    var_name: &str,
    time_name: &str,
    height_name: &str,
    source: &str,
) -> Result<TimeHeightField> {
    let time_var = variable(file, time_name, source)?;
    let time = Array1::from(time_var.get_values::<f64, _>(..)?);
    let time_units = string_attribute(&time_var, "units");
    let height = Array1::from(variable(file, height_name, source)?.get_values::<f64, _>(..)?);

    let var = variable(file, var_name, source)?;
    let units = string_attribute(&var, "units");
    let field_shape = dimension_lengths(&var);
    let fill = fill_value(&var);
    let raw = var.get_values::<f64, _>(..)?;

    let values = match field_shape.as_slice() {
        [t, h] if (*t, *h) == (time.len(), height.len()) => Array2::from_shape_vec((*t, *h), raw)?,
        [h, t] if (*h, *t) == (height.len(), time.len()) => {
            debug!("{source}: '{var_name}' stored as [height, time], transposing");
            Array2::from_shape_vec((*h, *t), raw)?.reversed_axes().as_standard_layout().into_owned()
        }
        _ => {
            return Err(DlWindError::shape_mismatch(format!(
                "{source}: '{var_name}' is {field_shape:?}, \
                 expected [{time_name}, {height_name}] = [{}, {}]",
                time.len(),
                height.len()
            )))
        }
    };

    Ok(TimeHeightField {
        name: var_name.to_string(),
        units,
        time,
        time_units,
        height,
        values: mask_fill(values, fill),
    })
}

/// Reads a whole variable as `f64`, fill cells as NaN
///
/// # Errors
///
/// Returns [`DlWindError::MissingVariable`] if the variable is absent.
pub fn read_field(file: &File, name: &str, source: &str) -> Result<ArrayD<f64>> {
    let var = variable(file, name, source)?;
    let data = ArrayD::from_shape_vec(dimension_lengths(&var), var.get_values::<f64, _>(..)?)?;
    Ok(mask_fill(data, fill_value(&var)))
}

fn variable<'f>(file: &'f File, name: &str, source: &str) -> Result<Variable<'f>> {
    file.variable(name)
        .ok_or_else(|| DlWindError::missing_variable(name, source))
}

fn dimension_lengths(var: &Variable<'_>) -> Vec<usize> {
    var.dimensions().iter().map(netcdf::Dimension::len).collect()
}

/// Reads a scalar or `[time]` angle variable as one value per time step
fn read_per_time(file: &File, name: &str, source: &str, time_len: usize) -> Result<Array1<f64>> {
    let var = variable(file, name, source)?;
    let fill = fill_value(&var);
    let values = var.get_values::<f64, _>(..)?;

    let dims = dimension_lengths(&var);

    let per_time = match dims.as_slice() {
        [] if values.len() == 1 => Array1::from_elem(time_len, values[0]),
        [len] if *len == time_len => Array1::from(values),
        shape => {
            return Err(DlWindError::shape_mismatch(format!(
                "{source}: '{name}' is {shape:?}, expected a scalar or [time] = [{time_len}]"
            )))
        }
    };
    Ok(mask_fill(per_time, fill))
}

fn read_time_range(var: &Variable<'_>, source: &str, shape: (usize, usize)) -> Result<Array2<f64>> {
    let var_shape = dimension_lengths(var);
    if var_shape != [shape.0, shape.1] {
        return Err(DlWindError::shape_mismatch(format!(
            "{source}: '{}' is {var_shape:?}, expected [time, range] = {shape:?}",
            var.name()
        )));
    }
    Ok(Array2::from_shape_vec(shape, var.get_values::<f64, _>(..)?)?)
}

fn mask_fill<D: Dimension>(data: Array<f64, D>, fill: Option<f64>) -> Array<f64, D> {
    match fill {
        Some(fill) => data.mapv_into(|v| if v == fill { f64::NAN } else { v }),
        None => data,
    }
}

/// `_FillValue`, falling back to `missing_value`
fn fill_value(var: &Variable<'_>) -> Option<f64> {
    numeric_attribute(var, "_FillValue").or_else(|| numeric_attribute(var, "missing_value"))
}

fn numeric_attribute(var: &Variable<'_>, name: &str) -> Option<f64> {
    let value = var.attribute(name)?.value().ok()?;
    match value {
        AttributeValue::Double(v) => Some(v),
        AttributeValue::Float(v) => Some(f64::from(v)),
        AttributeValue::Int(v) => Some(f64::from(v)),
        AttributeValue::Short(v) => Some(f64::from(v)),
        AttributeValue::Doubles(v) => v.first().copied(),
        AttributeValue::Floats(v) => v.first().map(|&x| f64::from(x)),
        AttributeValue::Ints(v) => v.first().map(|&x| f64::from(x)),
        AttributeValue::Shorts(v) => v.first().map(|&x| f64::from(x)),
        _ => {
            warn!("Ignoring non-numeric '{name}' attribute on '{}'", var.name());
            None
        }
    }
}

fn string_attribute(var: &Variable<'_>, name: &str) -> Option<String> {
    match var.attribute(name)?.value().ok()? {
        AttributeValue::Str(s) => Some(s),
        AttributeValue::Strs(v) => v.into_iter().next(),
        _ => None,
    }
}
