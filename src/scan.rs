//! Scans and their concatenation along time
//!
//! A [`Scan`] is the in-memory snapshot of one lidar file. Scans of a batch
//! share one range axis and are joined end to end into a [`CombinedSeries`]
//! in the order given; nothing here sorts by timestamp.

use crate::errors::{DlWindError, Result};
use crate::qc::DEFAULT_FILL_VALUE;
use crate::time_axis::{decode_times, Calendar, TimeUnits};
use chrono::{DateTime, Utc};
use ndarray::{concatenate, Array1, Array2, ArrayView1, ArrayView2, Axis};
use tracing::{debug, info, warn};

/// Units assumed for scans built without an explicit time units string
pub const UNIX_EPOCH_SECONDS: &str = "seconds since 1970-01-01 00:00:00 0:00";

/// One file's worth of lidar measurements
#[derive(Debug, Clone)]
pub struct Scan {
    /// Where the scan came from, used in log and error messages
    pub source: String,
    /// Time offsets, one per profile
    pub time: Array1<f64>,
    pub time_units: String,
    pub calendar: Calendar,
    /// Range gate centres in metres
    pub range: Array1<f64>,
    /// Beam azimuth in degrees clockwise from north, one per profile
    pub azimuth: Array1<f64>,
    /// Beam elevation in degrees, one per profile
    pub elevation: Option<Array1<f64>>,
    /// Radial velocity `[time, range]` in m/s
    pub radial_velocity: Array2<f64>,
    /// QC codes `[time, range]`
    pub qc_radial_velocity: Array2<i32>,
    pub fill_value: f64,
}

impl Scan {
    /// Builds a scan after checking that every array lines up with `time` and `range`.
    ///
    /// # Errors
    ///
    /// Returns [`DlWindError::ShapeMismatch`] if the azimuth length differs from
    /// the time length, or if either 2-D array is not `[time, range]`.
    pub fn new(
        source: impl Into<String>,
        time: Array1<f64>,
        range: Array1<f64>,
        azimuth: Array1<f64>,
        radial_velocity: Array2<f64>,
        qc_radial_velocity: Array2<i32>,
    ) -> Result<Self> {
        let source = source.into();
        let expected = (time.len(), range.len());

        if azimuth.len() != time.len() {
            return Err(DlWindError::shape_mismatch(format!(
                "{source}: azimuth has {} values for {} time steps",
                azimuth.len(),
                time.len()
            )));
        }
        if radial_velocity.dim() != expected {
            return Err(DlWindError::shape_mismatch(format!(
                "{source}: radial velocity is {:?}, expected [time, range] = {expected:?}",
                radial_velocity.dim()
            )));
        }
        if qc_radial_velocity.dim() != expected {
            return Err(DlWindError::shape_mismatch(format!(
                "{source}: QC flags are {:?}, expected [time, range] = {expected:?}",
                qc_radial_velocity.dim()
            )));
        }

        Ok(Self {
            source,
            time,
            time_units: UNIX_EPOCH_SECONDS.to_string(),
            calendar: Calendar::Standard,
            range,
            azimuth,
            elevation: None,
            radial_velocity,
            qc_radial_velocity,
            fill_value: DEFAULT_FILL_VALUE,
        })
    }

    #[must_use]
    pub fn with_time_units(mut self, units: impl Into<String>, calendar: Calendar) -> Self {
        self.time_units = units.into();
        self.calendar = calendar;
        self
    }

    #[must_use]
    pub fn with_fill_value(mut self, fill_value: f64) -> Self {
        self.fill_value = fill_value;
        self
    }

    /// Attaches per-profile beam elevation
    ///
    /// # Errors
    ///
    /// Returns [`DlWindError::ShapeMismatch`] if the length differs from the time length.
    pub fn with_elevation(mut self, elevation: Array1<f64>) -> Result<Self> {
        if elevation.len() != self.time.len() {
            return Err(DlWindError::shape_mismatch(format!(
                "{}: elevation has {} values for {} time steps",
                self.source,
                elevation.len(),
                self.time.len()
            )));
        }
        self.elevation = Some(elevation);
        Ok(self)
    }

    #[must_use]
    pub fn time_len(&self) -> usize {
        self.time.len()
    }

    #[must_use]
    pub fn range_len(&self) -> usize {
        self.range.len()
    }
}

/// Scans joined along the time axis
#[derive(Debug, Clone)]
pub struct CombinedSeries {
    pub time: Array1<f64>,
    /// Units of `time`; those of the first scan
    pub time_units: String,
    pub calendar: Calendar,
    pub range: Array1<f64>,
    pub azimuth: Array1<f64>,
    /// Present only when every scan carried elevation
    pub elevation: Option<Array1<f64>>,
    pub radial_velocity: Array2<f64>,
    pub qc_radial_velocity: Array2<i32>,
    /// Fill sentinel of the first scan; later scans' fill cells are rewritten to it
    pub fill_value: f64,
    /// Time length of each input scan, in input order
    pub scan_lengths: Vec<usize>,
    pub sources: Vec<String>,
}

impl CombinedSeries {
    #[must_use]
    pub fn time_len(&self) -> usize {
        self.time.len()
    }

    #[must_use]
    pub fn range_len(&self) -> usize {
        self.range.len()
    }

    /// Decodes the time axis into UTC timestamps for axis labelling
    ///
    /// # Errors
    ///
    /// Returns an error if the units or calendar cannot be decoded.
    pub fn decode_timestamps(&self) -> Result<Vec<DateTime<Utc>>> {
        decode_times(self.time.view(), &self.time_units, self.calendar)
    }
}

/// Concatenates scans along time, preserving their order.
///
/// # Errors
///
/// - [`DlWindError::EmptyBatch`] when `scans` is empty
/// - [`DlWindError::ShapeMismatch`] when range axes differ in length or value
/// - time unit errors when scans use different units that cannot be parsed
pub fn concatenate_scans(scans: &[Scan]) -> Result<CombinedSeries> {
    let first = scans.first().ok_or(DlWindError::EmptyBatch)?;

    for scan in &scans[1..] {
        if scan.range_len() != first.range_len() {
            return Err(DlWindError::shape_mismatch(format!(
                "range axis of {} has {} gates, {} has {}",
                scan.source,
                scan.range_len(),
                first.source,
                first.range_len()
            )));
        }
        if scan.range != first.range {
            return Err(DlWindError::shape_mismatch(format!(
                "range axis of {} differs in value from {}",
                scan.source, first.source
            )));
        }
    }

    if let Some(other) = scans.iter().find(|s| s.calendar != first.calendar) {
        warn!(
            "{} uses the {} calendar, {} uses {}; decoding the combined series as {}",
            other.source,
            other.calendar.as_str(),
            first.source,
            first.calendar.as_str(),
            first.calendar.as_str()
        );
    }

    let time = combine_time_axes(scans)?;

    let azimuth_views: Vec<ArrayView1<'_, f64>> = scans.iter().map(|s| s.azimuth.view()).collect();
    let azimuth = concatenate(Axis(0), &azimuth_views)?;

    let elevation = if scans.iter().all(|s| s.elevation.is_some()) {
        let views: Vec<ArrayView1<'_, f64>> =
            scans.iter().filter_map(|s| s.elevation.as_ref().map(|e| e.view())).collect();
        Some(concatenate(Axis(0), &views)?)
    } else {
        if scans.iter().any(|s| s.elevation.is_some()) {
            warn!("Only some scans carry elevation; dropping it from the combined series");
        }
        None
    };

    let fill_value = first.fill_value;
    let velocity_parts: Vec<Array2<f64>> = scans
        .iter()
        .map(|s| {
            if fill_sentinels_match(s.fill_value, fill_value) {
                s.radial_velocity.clone()
            } else {
                let own_fill = s.fill_value;
                s.radial_velocity.mapv(|v| if v == own_fill { fill_value } else { v })
            }
        })
        .collect();
    let velocity_views: Vec<ArrayView2<'_, f64>> =
        velocity_parts.iter().map(|v| v.view()).collect();
    let radial_velocity = concatenate(Axis(0), &velocity_views)?;

    let qc_views: Vec<ArrayView2<'_, i32>> =
        scans.iter().map(|s| s.qc_radial_velocity.view()).collect();
    let qc_radial_velocity = concatenate(Axis(0), &qc_views)?;

    let scan_lengths: Vec<usize> = scans.iter().map(Scan::time_len).collect();
    info!(
        "Combined {} scans into {} profiles x {} gates",
        scans.len(),
        time.len(),
        first.range_len()
    );

    Ok(CombinedSeries {
        time,
        time_units: first.time_units.clone(),
        calendar: first.calendar,
        range: first.range.clone(),
        azimuth,
        elevation,
        radial_velocity,
        qc_radial_velocity,
        fill_value,
        scan_lengths,
        sources: scans.iter().map(|s| s.source.clone()).collect(),
    })
}

fn fill_sentinels_match(a: f64, b: f64) -> bool {
    a == b || (a.is_nan() && b.is_nan())
}

/// Joins the time axes, re-expressing offsets in the first scan's units when
/// scans declare different epochs
fn combine_time_axes(scans: &[Scan]) -> Result<Array1<f64>> {
    let first = &scans[0];
    let uniform = scans.iter().all(|s| s.time_units == first.time_units);

    if uniform {
        let views: Vec<ArrayView1<'_, f64>> = scans.iter().map(|s| s.time.view()).collect();
        return Ok(concatenate(Axis(0), &views)?);
    }

    let target = TimeUnits::parse(&first.time_units)?;
    let mut rebased = Vec::with_capacity(scans.len());
    for scan in scans {
        if scan.time_units == first.time_units {
            rebased.push(scan.time.clone());
        } else {
            debug!(
                "Rebasing time of {} from '{}' to '{}'",
                scan.source, scan.time_units, first.time_units
            );
            rebased.push(TimeUnits::parse(&scan.time_units)?.rebase(scan.time.view(), &target));
        }
    }
    let views: Vec<ArrayView1<'_, f64>> = rebased.iter().map(|e| e.view()).collect();
    Ok(concatenate(Axis(0), &views)?)
}
