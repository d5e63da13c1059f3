//! Quality-control masking of lidar measurements
//!
//! Instrument files carry an integer QC code next to each measurement. Sites
//! disagree on what the non-zero codes mean, so the pass rule is always an
//! explicit [`QcPolicy`] chosen by the caller.

use crate::errors::{DlWindError, Result};
use ndarray::{Array, ArrayView, Dimension, Zip};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Fill sentinel used by the ARM lidar products when a file does not declare one
pub const DEFAULT_FILL_VALUE: f64 = -9999.0;

/// QC flag value that every policy accepts
pub const QC_GOOD: i32 = 0;

/// Rule deciding which QC codes let a measurement through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QcPolicy {
    /// Pass iff the flag is 0
    KeepOnlyZero,
    /// Pass iff the flag is not 1, so codes 2 and 4 are kept
    RejectOnlyOne,
}

impl QcPolicy {
    /// Get the string representation of the policy
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::KeepOnlyZero => "keep-only-zero",
            Self::RejectOnlyOne => "reject-only-one",
        }
    }

    /// Whether a measurement carrying `flag` survives this policy
    #[must_use]
    pub const fn passes(self, flag: i32) -> bool {
        match self {
            Self::KeepOnlyZero => flag == QC_GOOD,
            Self::RejectOnlyOne => flag != 1,
        }
    }

    /// Masks a single value: NaN when the flag fails or the value is the fill sentinel
    #[must_use]
    pub fn mask(self, value: f64, flag: i32, fill_value: f64) -> f64 {
        if value == fill_value || !self.passes(flag) {
            f64::NAN
        } else {
            value
        }
    }
}

impl fmt::Display for QcPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QcPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "keep-only-zero" | "zero" => Ok(Self::KeepOnlyZero),
            "reject-only-one" | "not-one" => Ok(Self::RejectOnlyOne),
            other => Err(format!(
                "Unknown QC policy '{other}': expected 'keep-only-zero' or 'reject-only-one'"
            )),
        }
    }
}

/// Applies quality control to an array of measurements.
///
/// `qc_flags` must have the shape of `values` or broadcast to it. Cells whose
/// flag fails `policy`, or whose value equals `fill_value` exactly, become NaN.
/// A fully masked result is valid and not an error.
///
/// # Errors
///
/// Returns [`DlWindError::ShapeMismatch`] when the flags cannot be broadcast
/// to the shape of the values.
pub fn apply_qc<D: Dimension>(
    values: ArrayView<'_, f64, D>,
    qc_flags: ArrayView<'_, i32, D>,
    fill_value: f64,
    policy: QcPolicy,
) -> Result<Array<f64, D>> {
    let flags = qc_flags.broadcast(values.raw_dim()).ok_or_else(|| {
        DlWindError::shape_mismatch(format!(
            "QC flags of shape {:?} do not match values of shape {:?}",
            qc_flags.shape(),
            values.shape()
        ))
    })?;

    Ok(Zip::from(&values)
        .and(&flags)
        .map_collect(|&value, &flag| policy.mask(value, flag, fill_value)))
}

/// Counts the cells of `flags` that fail `policy`
#[must_use]
pub fn rejected_count<D: Dimension>(flags: ArrayView<'_, i32, D>, policy: QcPolicy) -> usize {
    flags.iter().filter(|&&flag| !policy.passes(flag)).count()
}
