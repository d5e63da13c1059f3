//! Integration tests for dl_wind
//!
//! Small NetCDF files are written to a temporary directory in the layouts the
//! readers expect, then pushed through reading, concatenation, wind
//! derivation, writing and the derived-speed check.

use dl_wind::prelude::*;
use dl_wind::wind::DEFAULT_SPEED_TOLERANCE;
use dl_wind::{metadata, reader};
use netcdf::AttributeValue;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const RANGE: [f32; 3] = [0.0, 30.0, 60.0];

/// Writes an ARM-style scan with `[time, range]` radial velocity and QC flags
fn create_arm_scan(
    path: &Path,
    time_units: &str,
    time: &[f64],
    azimuth: &[f32],
    velocity: &[f32],
    qc: &[i32],
) -> Result<()> {
    let mut file = netcdf::create(path)?;
    file.add_dimension("time", time.len())?;
    file.add_dimension("range", RANGE.len())?;

    let mut time_var = file.add_variable::<f64>("time", &["time"])?;
    time_var.put_attribute("units", time_units)?;
    time_var.put_values(time, ..)?;

    let mut range_var = file.add_variable::<f32>("range", &["range"])?;
    range_var.put_attribute("units", "m")?;
    range_var.put_values(&RANGE, ..)?;

    let mut azimuth_var = file.add_variable::<f32>("azimuth", &["time"])?;
    azimuth_var.put_attribute("units", "degree")?;
    azimuth_var.put_values(azimuth, ..)?;

    let elevation = vec![60.0_f32; time.len()];
    let mut elevation_var = file.add_variable::<f32>("elevation", &["time"])?;
    elevation_var.put_values(&elevation, ..)?;

    let mut velocity_var = file.add_variable::<f32>("radial_velocity", &["time", "range"])?;
    velocity_var.put_attribute("_FillValue", -9999.0_f32)?;
    velocity_var.put_attribute("units", "m/s")?;
    velocity_var.put_values(velocity, ..)?;

    let mut qc_var = file.add_variable::<i32>("qc_radial_velocity", &["time", "range"])?;
    qc_var.put_values(qc, ..)?;

    Ok(())
}

fn first_scan(dir: &TempDir) -> Result<PathBuf> {
    let path = dir.path().join("sgpdlfptS5.b1.20230403.000000.cdf");
    create_arm_scan(
        &path,
        "seconds since 2023-04-03 00:00:00 0:00",
        &[0.0, 1.0, 2.0, 3.0],
        &[0.0, 90.0, 180.0, 270.0],
        &[
            5.0, 5.0, -9999.0, //
            5.0, 5.0, 5.0, //
            5.0, 5.0, 5.0, //
            5.0, 5.0, 5.0,
        ],
        &[
            0, 0, 0, //
            0, 1, 0, //
            0, 2, 0, //
            4, 0, 0,
        ],
    )?;
    Ok(path)
}

fn second_scan(dir: &TempDir) -> Result<PathBuf> {
    let path = dir.path().join("sgpdlfptS5.b1.20230403.010000.cdf");
    create_arm_scan(
        &path,
        "seconds since 2023-04-03 01:00:00 0:00",
        &[0.0, 1.0],
        &[45.0, 45.0],
        &[2.0, 2.0, 2.0, 2.0, 2.0, 2.0],
        &[0; 6],
    )?;
    Ok(path)
}

/// Writes a profiler file with `um`, `vm` and `Vhm` over `[time, height]`
fn create_sta_file(path: &Path, speed: &[f64]) -> Result<()> {
    let mut file = netcdf::create(path)?;
    file.add_dimension("time", 2)?;
    file.add_dimension("height", 2)?;

    let mut time_var = file.add_variable::<f64>("time", &["time"])?;
    time_var.put_attribute("units", "seconds since 1970-01-01 00:00:00")?;
    time_var.put_values(&[1_680_480_000.0, 1_680_480_600.0], ..)?;

    let mut height_var = file.add_variable::<f64>("height", &["height"])?;
    height_var.put_values(&[100.0, 200.0], ..)?;

    for (name, values) in [
        ("um", [3.0, -6.0, 0.0, -9999.0]),
        ("vm", [4.0, 8.0, 2.0, -9999.0]),
    ] {
        let mut var = file.add_variable::<f64>(name, &["time", "height"])?;
        var.put_attribute("_FillValue", -9999.0_f64)?;
        var.put_values(&values, ..)?;
    }

    let mut speed_var = file.add_variable::<f64>("Vhm", &["time", "height"])?;
    speed_var.put_attribute("_FillValue", -9999.0_f64)?;
    speed_var.put_values(speed, ..)?;

    Ok(())
}

#[test]
fn test_read_arm_scan() -> Result<()> {
    let dir = TempDir::new()?;
    let path = first_scan(&dir)?;

    let scan = reader::open_scan(&path, &SitePreset::ArmDopplerLidar.names())?;

    assert_eq!(scan.time_len(), 4);
    assert_eq!(scan.range_len(), 3);
    assert_eq!(scan.fill_value, -9999.0);
    assert_eq!(scan.time_units, "seconds since 2023-04-03 00:00:00 0:00");
    assert_eq!(scan.calendar, Calendar::Standard);
    assert_eq!(scan.azimuth.to_vec(), vec![0.0, 90.0, 180.0, 270.0]);
    assert_eq!(scan.range.to_vec(), vec![0.0, 30.0, 60.0]);
    assert_eq!(scan.radial_velocity[[0, 2]], -9999.0);
    assert_eq!(scan.qc_radial_velocity[[3, 0]], 4);
    assert_eq!(scan.elevation.as_ref().map(|e| e.len()), Some(4));
    Ok(())
}

#[test]
fn test_missing_variable_is_reported() -> Result<()> {
    let dir = TempDir::new()?;
    let path = first_scan(&dir)?;

    let mut names = SitePreset::ArmDopplerLidar.names();
    names.radial_velocity = "doppler_velocity".to_string();

    match reader::open_scan(&path, &names) {
        Err(DlWindError::MissingVariable { var, source_name }) => {
            assert_eq!(var, "doppler_velocity");
            assert!(source_name.ends_with("000000.cdf"));
        }
        other => panic!("Expected MissingVariable, got {other:?}"),
    }

    let file = netcdf::open(&path)?;
    let missing = metadata::missing_variables(&file, &names);
    assert!(missing.contains(&"doppler_velocity".to_string()));
    assert!(missing.contains(&"wind_speed".to_string()));
    assert!(!missing.contains(&"azimuth".to_string()));
    Ok(())
}

#[test]
fn test_discover_files_sorts_and_rejects_empty_patterns() -> Result<()> {
    let dir = TempDir::new()?;
    let second = second_scan(&dir)?;
    let first = first_scan(&dir)?;

    let pattern = format!("{}/sgpdlfpt*.cdf", dir.path().display());
    assert_eq!(reader::discover_files(&pattern)?, vec![first, second]);

    let nothing = format!("{}/*.nc", dir.path().display());
    assert!(matches!(
        reader::discover_files(&nothing),
        Err(DlWindError::NoInputFiles { .. })
    ));
    Ok(())
}

#[test]
fn test_batch_to_wind_product() -> Result<()> {
    let dir = TempDir::new()?;
    let paths = vec![first_scan(&dir)?, second_scan(&dir)?];
    let names = SitePreset::ArmDopplerLidar.names();

    let scans = reader::read_scans(&paths, &names)?;
    let series = concatenate_scans(&scans)?;
    assert_eq!(series.radial_velocity.dim(), (6, 3));
    assert_eq!(series.time.to_vec(), vec![0.0, 1.0, 2.0, 3.0, 3600.0, 3601.0]);
    assert_eq!(series.scan_lengths, vec![4, 2]);

    let strict = derive_wind(&series, QcPolicy::KeepOnlyZero)?;
    assert_eq!(strict.qc_rejected, 3);
    // Azimuth 0 points east
    assert!((strict.field.eastward[[0, 0]] - 5.0).abs() < 1e-9);
    // Azimuth 90 points north
    assert!(strict.field.eastward[[1, 0]].abs() < 1e-9);
    assert!((strict.field.northward[[1, 0]] - 5.0).abs() < 1e-9);
    assert!(strict.field.speed[[0, 2]].is_nan());
    assert!(strict.field.speed[[1, 1]].is_nan());
    assert!(strict.field.speed[[2, 1]].is_nan());
    assert!(strict.field.speed[[3, 0]].is_nan());
    assert!((strict.field.speed[[5, 2]] - 2.0).abs() < 1e-9);

    let lenient = derive_wind(&series, QcPolicy::RejectOnlyOne)?;
    assert_eq!(lenient.qc_rejected, 1);
    assert!((lenient.field.speed[[2, 1]] - 5.0).abs() < 1e-9);
    assert!((lenient.field.speed[[3, 0]] - 5.0).abs() < 1e-9);
    assert!(lenient.field.speed[[1, 1]].is_nan());
    assert!(lenient.field.speed[[0, 2]].is_nan());

    let stamps = strict.timestamps()?;
    assert_eq!(stamps[4].format("%H:%M:%S").to_string(), "01:00:00");
    Ok(())
}

#[test]
fn test_write_wind_product() -> Result<()> {
    let dir = TempDir::new()?;
    let paths = vec![first_scan(&dir)?, second_scan(&dir)?];
    let scans = reader::read_scans(&paths, &SitePreset::ArmDopplerLidar.names())?;
    let product = derive_wind(&concatenate_scans(&scans)?, QcPolicy::KeepOnlyZero)?;
    let profile = TurbulenceProfile::from_product(&product);

    let output = dir.path().join("wind.nc");
    write_wind_product(&product, Some(&profile), &output)?;
    // A second write replaces the first
    write_wind_product(&product, Some(&profile), &output)?;

    let file = netcdf::open(&output)?;
    assert_eq!(file.dimension("time").map(|d| d.len()), Some(6));
    assert_eq!(file.dimension("range").map(|d| d.len()), Some(3));

    let speed = file
        .variable("wind_speed")
        .expect("wind_speed written")
        .get_values::<f64, _>(..)?;
    assert_eq!(speed.len(), 18);
    assert!((speed[0] - 5.0).abs() < 1e-9);
    assert_eq!(speed[2], -9999.0);

    let time = file.variable("time").expect("time written");
    assert_eq!(time.get_values::<f64, _>(..)?[5], 3601.0);
    match time.attribute("units").map(|a| a.value()) {
        Some(Ok(AttributeValue::Str(units))) => {
            assert_eq!(units, "seconds since 2023-04-03 00:00:00 0:00");
        }
        other => panic!("Unexpected time units attribute: {other:?}"),
    }

    assert!(file.variable("eastward_wind_std").is_some());
    assert!(file.variable("northward_wind_std").is_some());

    match file.attribute("qc_policy").map(|a| a.value()) {
        Some(Ok(AttributeValue::Str(policy))) => assert_eq!(policy, "keep-only-zero"),
        other => panic!("Unexpected qc_policy attribute: {other:?}"),
    }

    // The written file reads back through the generic field reader with NaN for fill
    let speed_field = reader::read_field(&file, "wind_speed", "wind.nc")?;
    assert_eq!(speed_field.shape(), &[6, 3]);
    assert!(speed_field[[0, 2]].is_nan());
    Ok(())
}

#[test]
fn test_verify_file_speed() -> Result<()> {
    let dir = TempDir::new()?;
    let names = SitePreset::StaProfile.names();

    let consistent = dir.path().join("sa2.sta.nc");
    create_sta_file(&consistent, &[5.0, 10.0, 2.0, -9999.0])?;
    let check = reader::verify_file_speed(&consistent, &names, DEFAULT_SPEED_TOLERANCE)?;
    assert_eq!(check.checked, 3);
    assert_eq!(check.skipped, 1);

    let inconsistent = dir.path().join("bad.sta.nc");
    create_sta_file(&inconsistent, &[5.0, 10.0, 20.0, -9999.0])?;
    assert!(matches!(
        reader::verify_file_speed(&inconsistent, &names, DEFAULT_SPEED_TOLERANCE),
        Err(DlWindError::InconsistentDerivedField { mismatches: 1, .. })
    ));

    // ARM names are absent from a profiler file
    assert!(matches!(
        reader::verify_file_speed(&consistent, &SitePreset::ArmDopplerLidar.names(), 1e-6),
        Err(DlWindError::MissingVariable { .. })
    ));
    Ok(())
}

#[test]
fn test_read_time_height_field() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("profile.nc");
    {
        let mut file = netcdf::create(&path)?;
        file.add_dimension("time", 3)?;
        file.add_dimension("height", 2)?;

        let mut time_var = file.add_variable::<f64>("time", &["time"])?;
        time_var.put_attribute("units", "hours since 2023-04-03")?;
        time_var.put_values(&[0.0, 1.0, 2.0], ..)?;

        let mut height_var = file.add_variable::<f64>("height", &["height"])?;
        height_var.put_values(&[100.0, 200.0], ..)?;

        let mut u = file.add_variable::<f64>("U", &["time", "height"])?;
        u.put_attribute("units", "m/s")?;
        u.put_attribute("_FillValue", -9999.0_f64)?;
        u.put_values(&[1.0, 10.0, 2.0, 20.0, 3.0, -9999.0], ..)?;

        // Stored height-major
        let mut theta = file.add_variable::<f64>("Theta", &["height", "time"])?;
        theta.put_values(&[290.0, 291.0, 292.0, 280.0, 281.0, 282.0], ..)?;
    }

    let file = netcdf::open(&path)?;

    let u = reader::read_time_height_field(&file, "U", "time", "height", "profile.nc")?;
    assert_eq!(u.values.dim(), (3, 2));
    assert_eq!(u.units.as_deref(), Some("m/s"));
    assert_eq!(u.time_units.as_deref(), Some("hours since 2023-04-03"));
    assert_eq!(u.values[[2, 0]], 3.0);
    assert!(u.values[[2, 1]].is_nan());

    let mean = reduce_over_time(u.values.view(), ProfileStatistic::Mean);
    assert!((mean[0] - 2.0).abs() < 1e-12);
    assert!((mean[1] - 15.0).abs() < 1e-12);

    let theta = reader::read_time_height_field(&file, "Theta", "time", "height", "profile.nc")?;
    assert_eq!(theta.values.dim(), (3, 2));
    assert_eq!(theta.values[[0, 1]], 280.0);
    assert_eq!(theta.values[[2, 0]], 292.0);

    assert!(matches!(
        reader::read_time_height_field(&file, "Phi", "time", "height", "profile.nc"),
        Err(DlWindError::MissingVariable { .. })
    ));
    Ok(())
}

#[test]
fn test_site_names_from_json_file() -> Result<()> {
    let dir = TempDir::new()?;
    let config = dir.path().join("site.json");
    std::fs::write(&config, r#"{ "radial_velocity": "doppler_velocity", "elevation": "" }"#)?;

    let names = VariableNameMap::from_json_file(&config, SitePreset::ArmDopplerLidar.names())?;
    assert_eq!(names.radial_velocity, "doppler_velocity");
    assert_eq!(names.elevation, None);

    let missing = dir.path().join("absent.json");
    assert!(matches!(
        VariableNameMap::from_json_file(&missing, SitePreset::ArmDopplerLidar.names()),
        Err(DlWindError::Io(_))
    ));
    Ok(())
}

#[test]
fn test_scalar_azimuth_and_missing_value_fill() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("stare.cdf");
    {
        let mut file = netcdf::create(&path)?;
        file.add_dimension("time", 3)?;
        file.add_dimension("range", RANGE.len())?;

        let mut time_var = file.add_variable::<f64>("time", &["time"])?;
        time_var.put_attribute("units", "seconds since 2023-04-03 00:00:00 0:00")?;
        time_var.put_values(&[0.0, 1.0, 2.0], ..)?;

        let mut range_var = file.add_variable::<f32>("range", &["range"])?;
        range_var.put_values(&RANGE, ..)?;

        // One fixed beam direction for the whole file
        let mut azimuth_var = file.add_variable::<f32>("azimuth", &[])?;
        azimuth_var.put_values(&[90.0_f32], ..)?;

        let mut velocity_var = file.add_variable::<f32>("radial_velocity", &["time", "range"])?;
        velocity_var.put_attribute("missing_value", -999.0_f32)?;
        velocity_var.put_values(
            &[
                4.0, -999.0, 4.0, //
                4.0, 4.0, 4.0, //
                -999.0, 4.0, 4.0,
            ],
            ..,
        )?;

        let mut qc_var = file.add_variable::<i32>("qc_radial_velocity", &["time", "range"])?;
        qc_var.put_values(&[0; 9], ..)?;
    }

    let mut names = SitePreset::ArmDopplerLidar.names();
    names.elevation = None;
    let scan = reader::open_scan(&path, &names)?;

    assert_eq!(scan.azimuth.len(), scan.time_len());
    assert_eq!(scan.azimuth.to_vec(), vec![90.0, 90.0, 90.0]);
    assert_eq!(scan.fill_value, -999.0);
    assert!(scan.elevation.is_none());

    let product = derive_wind(&concatenate_scans(&[scan])?, QcPolicy::KeepOnlyZero)?;
    assert_eq!(product.qc_rejected, 0);
    assert!(product.field.speed[[0, 1]].is_nan());
    assert!(product.field.speed[[2, 0]].is_nan());
    assert!(product.field.eastward[[1, 1]].abs() < 1e-9);
    assert!((product.field.northward[[1, 1]] - 4.0).abs() < 1e-9);
    assert_eq!(product.field.valid_count(), 7);
    Ok(())
}
