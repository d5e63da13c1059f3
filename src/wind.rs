//! Horizontal wind components from radial velocity
//!
//! The projection is a pure whole-array transform: QC-masked radial velocity
//! is multiplied by the cosine and sine of the beam azimuth. Masked cells are
//! NaN and stay NaN through the arithmetic, so no separate mask is carried.

use crate::errors::{DlWindError, Result};
use crate::qc::{apply_qc, rejected_count, QcPolicy};
use crate::scan::CombinedSeries;
use crate::time_axis::{decode_times, Calendar};
use chrono::{DateTime, Utc};
use ndarray::{Array1, Array2, ArrayView2, ArrayViewD, Axis, Ix1, Ix2, Zip};
use tracing::{debug, info};

/// Absolute tolerance used when checking a file's wind speed against its components
pub const DEFAULT_SPEED_TOLERANCE: f64 = 1e-6;

/// Derived wind vectors addressed by `[time_index, range_index]`
#[derive(Debug, Clone, PartialEq)]
pub struct WindField {
    pub eastward: Array2<f64>,
    pub northward: Array2<f64>,
    pub speed: Array2<f64>,
}

impl WindField {
    /// `(time, range)` shape shared by all three arrays
    #[must_use]
    pub fn dim(&self) -> (usize, usize) {
        self.speed.dim()
    }

    /// Number of cells with a finite speed
    #[must_use]
    pub fn valid_count(&self) -> usize {
        self.speed.iter().filter(|v| v.is_finite()).count()
    }
}

/// Wind field together with the axes a plot needs
#[derive(Debug, Clone)]
pub struct WindProduct {
    pub time: Array1<f64>,
    pub time_units: String,
    pub calendar: Calendar,
    pub range: Array1<f64>,
    pub field: WindField,
    pub qc_policy: QcPolicy,
    /// Cells removed by the QC policy, before fill-value masking
    pub qc_rejected: usize,
    pub sources: Vec<String>,
}

impl WindProduct {
    /// Decodes the time axis into UTC timestamps
    ///
    /// # Errors
    ///
    /// Returns an error if the units or calendar cannot be decoded.
    pub fn timestamps(&self) -> Result<Vec<DateTime<Utc>>> {
        decode_times(self.time.view(), &self.time_units, self.calendar)
    }
}

/// Summary of a successful derived-speed cross-check
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpeedCheck {
    /// Cells where all three inputs were finite
    pub checked: usize,
    /// Cells skipped because an input was missing
    pub skipped: usize,
    pub max_deviation: f64,
}

/// Expands an azimuth given as a scalar, per time step `[t]`, or per cell
/// `[t, r]` to the `[t, r]` shape of the radial velocity.
///
/// # Errors
///
/// Returns [`DlWindError::ShapeMismatch`] if the azimuth cannot be laid over `shape`.
pub fn broadcast_azimuth(
    azimuth: ArrayViewD<'_, f64>,
    shape: (usize, usize),
) -> Result<Array2<f64>> {
    let mismatch = || {
        DlWindError::shape_mismatch(format!(
            "azimuth of shape {:?} cannot be broadcast to [time, range] = {shape:?}",
            azimuth.shape()
        ))
    };

    match azimuth.ndim() {
        0 => {
            let angle = azimuth.iter().next().copied().ok_or_else(mismatch)?;
            Ok(Array2::from_elem(shape, angle))
        }
        1 => {
            let per_time = azimuth.view().into_dimensionality::<Ix1>()?;
            if per_time.len() != shape.0 {
                return Err(mismatch());
            }
            let column = per_time.insert_axis(Axis(1));
            let expanded = column.broadcast(shape).ok_or_else(mismatch)?;
            Ok(expanded.to_owned())
        }
        2 => {
            let per_cell = azimuth.view().into_dimensionality::<Ix2>()?;
            if per_cell.dim() != shape {
                return Err(mismatch());
            }
            Ok(per_cell.to_owned())
        }
        _ => Err(mismatch()),
    }
}

/// Projects quality-controlled radial velocity onto eastward and northward components.
///
/// `eastward = v·cos(θ)`, `northward = v·sin(θ)` with θ the azimuth in radians,
/// and `speed = sqrt(eastward² + northward²)`. The output has the shape of
/// `radial_velocity`; cells failing QC or equal to `fill_value` are NaN.
///
/// # Errors
///
/// Returns [`DlWindError::ShapeMismatch`] if the QC flags or azimuth do not fit
/// the radial velocity.
pub fn project_wind(
    radial_velocity: ArrayView2<'_, f64>,
    azimuth_deg: ArrayViewD<'_, f64>,
    qc_flags: ArrayView2<'_, i32>,
    fill_value: f64,
    policy: QcPolicy,
) -> Result<WindField> {
    let velocity = apply_qc(radial_velocity, qc_flags, fill_value, policy)?;
    let theta = broadcast_azimuth(azimuth_deg, velocity.dim())?.mapv_into(f64::to_radians);

    let eastward = Zip::from(&velocity)
        .and(&theta)
        .map_collect(|&v, &t| v * t.cos());
    let northward = Zip::from(&velocity)
        .and(&theta)
        .map_collect(|&v, &t| v * t.sin());
    let speed = Zip::from(&eastward)
        .and(&northward)
        .map_collect(|&u, &v| (u * u + v * v).sqrt());

    Ok(WindField {
        eastward,
        northward,
        speed,
    })
}

/// Derives the wind field of a combined batch of scans
///
/// # Errors
///
/// Propagates shape errors from [`project_wind`].
pub fn derive_wind(series: &CombinedSeries, policy: QcPolicy) -> Result<WindProduct> {
    let field = project_wind(
        series.radial_velocity.view(),
        series.azimuth.view().into_dyn(),
        series.qc_radial_velocity.view(),
        series.fill_value,
        policy,
    )?;

    let qc_rejected = rejected_count(series.qc_radial_velocity.view(), policy);
    let (times, gates) = field.dim();
    info!(
        "Derived wind for {times} profiles x {gates} gates: {} valid cells, \
         {qc_rejected} rejected by {policy}",
        field.valid_count()
    );

    Ok(WindProduct {
        time: series.time.clone(),
        time_units: series.time_units.clone(),
        calendar: series.calendar,
        range: series.range.clone(),
        field,
        qc_policy: policy,
        qc_rejected,
        sources: series.sources.clone(),
    })
}

/// Checks that a reported wind speed equals `sqrt(u² + v²)` within an absolute tolerance.
///
/// Cells missing both a computed speed (non-finite `u` or `v`) and a reported
/// speed are skipped. A cell where only one side is missing counts as a
/// mismatch with infinite deviation.
///
/// # Errors
///
/// - [`DlWindError::ShapeMismatch`] if the three arrays differ in shape
/// - [`DlWindError::InvalidConfig`] for a negative or non-finite tolerance
/// - [`DlWindError::InconsistentDerivedField`] if any checked cell deviates by
///   more than `tolerance`; this points at swapped variable names or units
pub fn verify_derived_speed(
    u: ArrayViewD<'_, f64>,
    v: ArrayViewD<'_, f64>,
    reported_speed: ArrayViewD<'_, f64>,
    tolerance: f64,
) -> Result<SpeedCheck> {
    if u.shape() != v.shape() || u.shape() != reported_speed.shape() {
        return Err(DlWindError::shape_mismatch(format!(
            "u {:?}, v {:?} and speed {:?} must have the same shape",
            u.shape(),
            v.shape(),
            reported_speed.shape()
        )));
    }
    if !tolerance.is_finite() || tolerance < 0.0 {
        return Err(DlWindError::InvalidConfig {
            message: format!("speed tolerance must be a non-negative number, got {tolerance}"),
        });
    }

    let mut checked = 0;
    let mut skipped = 0;
    let mut mismatches = 0;
    let mut max_deviation = 0.0_f64;
    let mut first_index = None;

    let cells = u.iter().zip(v.iter()).zip(reported_speed.iter());
    for (index, ((&east, &north), &reported)) in cells.enumerate() {
        let has_components = east.is_finite() && north.is_finite();
        if !has_components && !reported.is_finite() {
            skipped += 1;
            continue;
        }
        checked += 1;
        let deviation = if has_components && reported.is_finite() {
            ((east * east + north * north).sqrt() - reported).abs()
        } else {
            f64::INFINITY
        };
        max_deviation = max_deviation.max(deviation);
        if deviation > tolerance {
            mismatches += 1;
            first_index.get_or_insert(index);
        }
    }

    debug!(
        "Speed check: {checked} cells compared, {skipped} skipped, \
         max deviation {max_deviation:e}"
    );

    match first_index {
        Some(first_index) => Err(DlWindError::InconsistentDerivedField {
            mismatches,
            checked,
            max_deviation,
            tolerance,
            first_index,
        }),
        None => Ok(SpeedCheck {
            checked,
            skipped,
            max_deviation,
        }),
    }
}
