//! Writing derived wind products to NetCDF
//!
//! The output is a plain `[time, range]` file that plotting tools can read
//! directly: coordinate variables for both axes, the three wind arrays with
//! NaN written as `_FillValue`, and an optional turbulence profile over range.

use crate::errors::Result;
use crate::profile::TurbulenceProfile;
use crate::qc::DEFAULT_FILL_VALUE;
use crate::wind::WindProduct;
use chrono::Utc;
use ndarray::Array2;
use netcdf::{create, FileMut};
use std::{fs, path::Path};
use tracing::info;

/// Writes a [`WindProduct`] to a new NetCDF file
pub struct WindProductWriter<'a> {
    output_path: &'a Path,
    fill_value: f64,
}

impl<'a> WindProductWriter<'a> {
    /// Create a new writer; NaN cells are stored as [`DEFAULT_FILL_VALUE`]
    #[must_use]
    pub fn new(output_path: &'a Path) -> Self {
        Self {
            output_path,
            fill_value: DEFAULT_FILL_VALUE,
        }
    }

    #[must_use]
    pub fn with_fill_value(mut self, fill_value: f64) -> Self {
        self.fill_value = fill_value;
        self
    }

    /// Write the product, replacing any existing file at the output path
    ///
    /// # Errors
    ///
    /// Returns an error if the old file cannot be removed or any NetCDF call fails.
    pub fn write(
        &self,
        product: &WindProduct,
        turbulence: Option<&TurbulenceProfile>,
    ) -> Result<()> {
        if self.output_path.exists() {
            fs::remove_file(self.output_path)?;
        }

        let mut file = create(self.output_path)?;
        file.add_dimension("time", product.time.len())?;
        file.add_dimension("range", product.range.len())?;

        {
            let mut time_var = file.add_variable::<f64>("time", &["time"])?;
            time_var.put_attribute("units", product.time_units.as_str())?;
            time_var.put_attribute("calendar", product.calendar.as_str())?;
            time_var.put_attribute("long_name", "Time offset")?;
            time_var.put_values(&product.time.to_vec(), ..)?;
        }

        {
            let mut range_var = file.add_variable::<f64>("range", &["range"])?;
            range_var.put_attribute("units", "m")?;
            range_var.put_attribute("long_name", "Distance from lidar to centre of range gate")?;
            range_var.put_values(&product.range.to_vec(), ..)?;
        }

        let field = &product.field;
        self.put_time_range(
            &mut file,
            "eastward_wind",
            "Eastward wind component",
            &field.eastward,
        )?;
        self.put_time_range(
            &mut file,
            "northward_wind",
            "Northward wind component",
            &field.northward,
        )?;
        self.put_time_range(&mut file, "wind_speed", "Horizontal wind speed", &field.speed)?;

        if let Some(profile) = turbulence {
            self.put_range_profile(
                &mut file,
                "eastward_wind_std",
                "Standard deviation over time of the eastward wind component",
                &profile.eastward_std.to_vec(),
            )?;
            self.put_range_profile(
                &mut file,
                "northward_wind_std",
                "Standard deviation over time of the northward wind component",
                &profile.northward_std.to_vec(),
            )?;
        }

        file.add_attribute("qc_policy", product.qc_policy.as_str())?;
        file.add_attribute("qc_rejected_cells", product.qc_rejected as i64)?;
        file.add_attribute("source_scans", product.sources.join(", "))?;
        file.add_attribute(
            "history",
            format!("Created by dl-wind on {}", Utc::now().to_rfc3339()),
        )?;

        info!("Wrote wind product to {}", self.output_path.display());
        Ok(())
    }

    fn put_time_range(
        &self,
        file: &mut FileMut,
        name: &str,
        long_name: &str,
        data: &Array2<f64>,
    ) -> Result<()> {
        let values: Vec<f64> = data.iter().map(|&v| self.encode(v)).collect();
        let mut var = file.add_variable::<f64>(name, &["time", "range"])?;
        var.put_attribute("_FillValue", self.fill_value)?;
        var.put_attribute("units", "m/s")?;
        var.put_attribute("long_name", long_name)?;
        var.put_values(&values, ..)?;
        Ok(())
    }

    fn put_range_profile(
        &self,
        file: &mut FileMut,
        name: &str,
        long_name: &str,
        data: &[f64],
    ) -> Result<()> {
        let values: Vec<f64> = data.iter().map(|&v| self.encode(v)).collect();
        let mut var = file.add_variable::<f64>(name, &["range"])?;
        var.put_attribute("_FillValue", self.fill_value)?;
        var.put_attribute("units", "m/s")?;
        var.put_attribute("long_name", long_name)?;
        var.put_values(&values, ..)?;
        Ok(())
    }

    fn encode(&self, value: f64) -> f64 {
        if value.is_finite() {
            value
        } else {
            self.fill_value
        }
    }
}

/// Writes a wind product, and optionally its turbulence profile, to `output_path`
///
/// # Errors
///
/// See [`WindProductWriter::write`].
pub fn write_wind_product(
    product: &WindProduct,
    turbulence: Option<&TurbulenceProfile>,
    output_path: &Path,
) -> Result<()> {
    WindProductWriter::new(output_path).write(product, turbulence)
}
