//! Per-gate reductions over the time axis
//!
//! Time-height fields are reduced column by column: each range gate gets one
//! value computed from its finite cells. Gates are processed in parallel on
//! the Rayon pool configured through [`crate::parallel::ParallelConfig`].

use crate::errors::{DlWindError, Result};
use crate::wind::WindProduct;
use ndarray::{Array1, ArrayView2, Axis};
use rayon::prelude::*;
use tracing::debug;

/// Supported reductions over time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileStatistic {
    /// Arithmetic mean
    Mean,
    /// Population standard deviation
    StdDev,
    /// Minimum value
    Min,
    /// Maximum value
    Max,
}

impl ProfileStatistic {
    /// Get the string representation of the statistic
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Mean => "mean",
            Self::StdDev => "std",
            Self::Min => "minimum",
            Self::Max => "maximum",
        }
    }

    fn apply(self, values: &[f64]) -> f64 {
        if values.is_empty() {
            return f64::NAN;
        }
        match self {
            Self::Mean => mean(values),
            Self::StdDev => {
                let m = mean(values);
                let variance =
                    values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
                variance.sqrt()
            }
            Self::Min => values.iter().copied().fold(f64::INFINITY, f64::min),
            Self::Max => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        }
    }
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Reduces a `[time, range]` array to one value per range gate.
///
/// Non-finite cells are skipped; a gate without any finite cell yields NaN.
#[must_use]
pub fn reduce_over_time(data: ArrayView2<'_, f64>, statistic: ProfileStatistic) -> Array1<f64> {
    let columns: Vec<Vec<f64>> = data
        .axis_iter(Axis(1))
        .map(|column| column.iter().copied().filter(|v| v.is_finite()).collect())
        .collect();

    debug!(
        "Computing {} over time for {} gates across {} threads",
        statistic.as_str(),
        columns.len(),
        rayon::current_num_threads()
    );

    let reduced: Vec<f64> = columns
        .par_iter()
        .map(|values| statistic.apply(values))
        .collect();
    Array1::from(reduced)
}

/// Number of finite cells per range gate
#[must_use]
pub fn valid_counts(data: ArrayView2<'_, f64>) -> Array1<usize> {
    data.map_axis(Axis(0), |column| column.iter().filter(|v| v.is_finite()).count())
}

/// Variability of the wind components at each range gate
#[derive(Debug, Clone)]
pub struct TurbulenceProfile {
    pub range: Array1<f64>,
    /// Standard deviation over time of the eastward component
    pub eastward_std: Array1<f64>,
    /// Standard deviation over time of the northward component
    pub northward_std: Array1<f64>,
    /// Mean wind speed over time
    pub mean_speed: Array1<f64>,
    pub valid_counts: Array1<usize>,
}

impl TurbulenceProfile {
    /// Computes the profile of a derived wind product
    #[must_use]
    pub fn from_product(product: &WindProduct) -> Self {
        let field = &product.field;
        Self {
            range: product.range.clone(),
            eastward_std: reduce_over_time(field.eastward.view(), ProfileStatistic::StdDev),
            northward_std: reduce_over_time(field.northward.view(), ProfileStatistic::StdDev),
            mean_speed: reduce_over_time(field.speed.view(), ProfileStatistic::Mean),
            valid_counts: valid_counts(field.speed.view()),
        }
    }

    /// Print the profile as a table, one row per gate
    pub fn print_table(&self) {
        println!("\n Turbulence Profile");
        println!("====================");
        println!(
            "   {:>10}  {:>12}  {:>12}  {:>12}  {:>8}",
            "range (m)", "std u (m/s)", "std v (m/s)", "mean |V|", "valid"
        );
        for (i, range) in self.range.iter().enumerate() {
            println!(
                "   {:>10.1}  {:>12.3}  {:>12.3}  {:>12.3}  {:>8}",
                range,
                self.eastward_std[i],
                self.northward_std[i],
                self.mean_speed[i],
                self.valid_counts[i]
            );
        }
    }
}

/// Summary statistics over the finite cells of a field
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldSummary {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
    pub valid: usize,
    pub total: usize,
}

impl FieldSummary {
    /// Summarises every finite value of `values`
    ///
    /// # Errors
    ///
    /// Returns [`DlWindError::InvalidConfig`] if the field has no cells at all.
    pub fn from_values<'a>(values: impl IntoIterator<Item = &'a f64>) -> Result<Self> {
        let mut total = 0;
        let finite: Vec<f64> = values
            .into_iter()
            .inspect(|_| total += 1)
            .copied()
            .filter(|v| v.is_finite())
            .collect();

        if total == 0 {
            return Err(DlWindError::InvalidConfig {
                message: "cannot summarise an empty field".to_string(),
            });
        }

        Ok(Self {
            min: ProfileStatistic::Min.apply(&finite),
            max: ProfileStatistic::Max.apply(&finite),
            mean: ProfileStatistic::Mean.apply(&finite),
            std_dev: ProfileStatistic::StdDev.apply(&finite),
            valid: finite.len(),
            total,
        })
    }

    /// Print the summary under a heading
    pub fn print(&self, label: &str) {
        println!("\n Summary for {label}");
        println!("================================");
        println!("   Min: {:.3}", self.min);
        println!("   Max: {:.3}", self.max);
        println!("   Mean: {:.3}", self.mean);
        println!("   Std Dev: {:.3}", self.std_dev);
        println!("   Valid cells: {} / {}", self.valid, self.total);
    }
}
