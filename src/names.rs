//! Per-site variable naming
//!
//! Instrument sites and product versions name the same quantity differently
//! (`Vhm` vs `wind_speed`, `height` vs `range`, `um`/`vm` vs `u`/`v`). Readers
//! never guess: they look up every variable through a [`VariableNameMap`]
//! built from a [`SitePreset`] and optionally overridden by a JSON file.

use crate::errors::{DlWindError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::str::FromStr;

/// Names of the variables read from one site's files
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableNameMap {
    pub time: String,
    pub range: String,
    pub azimuth: String,
    pub elevation: Option<String>,
    pub radial_velocity: String,
    pub qc_radial_velocity: String,
    pub eastward_wind: String,
    pub northward_wind: String,
    pub wind_speed: String,
}

/// Built-in naming conventions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SitePreset {
    /// ARM `dlfpt` b1 stare/PPI files (`.cdf`)
    #[default]
    ArmDopplerLidar,
    /// Site profiler `.sta.nc` files with `um`/`vm`/`Vhm`
    StaProfile,
}

impl SitePreset {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ArmDopplerLidar => "arm",
            Self::StaProfile => "sta",
        }
    }

    /// The variable names this preset stands for
    #[must_use]
    pub fn names(self) -> VariableNameMap {
        match self {
            Self::ArmDopplerLidar => VariableNameMap {
                time: "time".to_string(),
                range: "range".to_string(),
                azimuth: "azimuth".to_string(),
                elevation: Some("elevation".to_string()),
                radial_velocity: "radial_velocity".to_string(),
                qc_radial_velocity: "qc_radial_velocity".to_string(),
                eastward_wind: "u".to_string(),
                northward_wind: "v".to_string(),
                wind_speed: "wind_speed".to_string(),
            },
            Self::StaProfile => VariableNameMap {
                time: "time".to_string(),
                range: "height".to_string(),
                azimuth: "azimuth".to_string(),
                elevation: Some("elevation".to_string()),
                radial_velocity: "radial_velocity".to_string(),
                qc_radial_velocity: "qc_radial_velocity".to_string(),
                eastward_wind: "um".to_string(),
                northward_wind: "vm".to_string(),
                wind_speed: "Vhm".to_string(),
            },
        }
    }
}

impl FromStr for SitePreset {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "arm" | "arm-dlfpt" | "dlfpt" => Ok(Self::ArmDopplerLidar),
            "sta" | "sta-profile" => Ok(Self::StaProfile),
            other => Err(format!("Unknown site preset '{other}': expected 'arm' or 'sta'")),
        }
    }
}

/// Field-by-field overrides as they appear in a site configuration file.
/// An empty `elevation` string disables elevation reading.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct NameOverrides {
    time: Option<String>,
    range: Option<String>,
    azimuth: Option<String>,
    elevation: Option<String>,
    radial_velocity: Option<String>,
    qc_radial_velocity: Option<String>,
    eastward_wind: Option<String>,
    northward_wind: Option<String>,
    wind_speed: Option<String>,
}

impl VariableNameMap {
    /// Applies the overrides in a JSON document on top of `self`
    ///
    /// # Errors
    ///
    /// Returns an error if the document is not valid JSON, names an unknown
    /// field, or sets a required name to an empty string.
    pub fn with_json_overrides(mut self, json: &str) -> Result<Self> {
        let overrides: NameOverrides = serde_json::from_str(json)?;

        let required = [
            (&mut self.time, overrides.time, "time"),
            (&mut self.range, overrides.range, "range"),
            (&mut self.azimuth, overrides.azimuth, "azimuth"),
            (&mut self.radial_velocity, overrides.radial_velocity, "radial_velocity"),
            (&mut self.qc_radial_velocity, overrides.qc_radial_velocity, "qc_radial_velocity"),
            (&mut self.eastward_wind, overrides.eastward_wind, "eastward_wind"),
            (&mut self.northward_wind, overrides.northward_wind, "northward_wind"),
            (&mut self.wind_speed, overrides.wind_speed, "wind_speed"),
        ];
        for (slot, value, field) in required {
            if let Some(value) = value {
                if value.trim().is_empty() {
                    return Err(DlWindError::InvalidConfig {
                        message: format!("'{field}' must not be empty"),
                    });
                }
                *slot = value;
            }
        }

        if let Some(elevation) = overrides.elevation {
            self.elevation = (!elevation.trim().is_empty()).then_some(elevation);
        }

        Ok(self)
    }

    /// Loads a site configuration file layered over `base`
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_json_file(path: &Path, base: Self) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        base.with_json_overrides(&text)
    }

    /// Variables a scan must provide
    #[must_use]
    pub fn scan_variables(&self) -> Vec<&str> {
        let mut names = vec![
            self.time.as_str(),
            self.range.as_str(),
            self.azimuth.as_str(),
            self.radial_velocity.as_str(),
            self.qc_radial_velocity.as_str(),
        ];
        if let Some(elevation) = &self.elevation {
            names.push(elevation.as_str());
        }
        names
    }

    /// Variables holding a file's own wind decomposition
    #[must_use]
    pub fn derived_variables(&self) -> [&str; 3] {
        [
            self.eastward_wind.as_str(),
            self.northward_wind.as_str(),
            self.wind_speed.as_str(),
        ]
    }
}

impl Default for VariableNameMap {
    fn default() -> Self {
        SitePreset::default().names()
    }
}
