//! File inspection for lidar NetCDF files
//!
//! Listing what a file actually contains is the first step when a new site's
//! naming convention has to be captured in a [`VariableNameMap`].

use crate::errors::{DlWindError, Result};
use crate::names::VariableNameMap;
use netcdf::{AttributeValue, File, Variable};

/// Information about one variable of a file
#[derive(Debug, Clone)]
pub struct VariableInfo {
    pub name: String,
    pub data_type: String,
    pub dimensions: Vec<String>,
    pub shape: Vec<usize>,
    pub units: Option<String>,
}

impl VariableInfo {
    fn from_variable(var: &Variable<'_>) -> Self {
        let units = var.attribute("units").and_then(|a| match a.value().ok()? {
            AttributeValue::Str(s) => Some(s),
            _ => None,
        });
        Self {
            name: var.name().to_string(),
            data_type: format!("{:?}", var.vartype()).to_lowercase(),
            dimensions: var.dimensions().iter().map(|d| d.name().to_string()).collect(),
            shape: var.dimensions().iter().map(netcdf::Dimension::len).collect(),
            units,
        }
    }
}

/// Variables of a file, sorted by name
#[must_use]
pub fn list_variables(file: &File) -> Vec<VariableInfo> {
    let mut variables: Vec<VariableInfo> = file
        .variables()
        .map(|v| VariableInfo::from_variable(&v))
        .collect();
    variables.sort_by(|a, b| a.name.cmp(&b.name));
    variables
}

/// Names from `names` that `file` does not contain
#[must_use]
pub fn missing_variables(file: &File, names: &VariableNameMap) -> Vec<String> {
    names
        .scan_variables()
        .into_iter()
        .chain(names.derived_variables())
        .filter(|name| file.variable(name).is_none())
        .map(str::to_string)
        .collect()
}

/// Prints global attributes, dimensions and variables of a file.
///
/// # Errors
///
/// Returns an error if a global attribute cannot be read.
pub fn print_metadata(file: &File) -> Result<()> {
    println!("\n===== Global Attributes =====");
    for attr in file.attributes() {
        println!("- {}: {}", attr.name(), format_attribute(&attr.value()?));
    }

    println!("\n===== Dimensions =====");
    let mut dimensions: Vec<_> = file.dimensions().collect();
    dimensions.sort_by(|a, b| a.name().cmp(&b.name()));
    for dim in dimensions {
        let unlimited = if dim.is_unlimited() { " (unlimited)" } else { "" };
        println!("- {} = {}{}", dim.name(), dim.len(), unlimited);
    }

    println!("\n===== Variables =====");
    for info in list_variables(file) {
        let dims: Vec<String> = info
            .dimensions
            .iter()
            .zip(&info.shape)
            .map(|(name, len)| format!("{name}[{len}]"))
            .collect();
        match &info.units {
            Some(units) => println!(
                "- {} ({}) {} [{units}]",
                info.name,
                dims.join(", "),
                info.data_type
            ),
            None => println!("- {} ({}) {}", info.name, dims.join(", "), info.data_type),
        }
    }

    Ok(())
}

/// Describes one variable: type, dimensions, shape and every attribute.
///
/// # Errors
///
/// Returns [`DlWindError::MissingVariable`] if the variable does not exist.
pub fn describe_variable(file: &File, var_name: &str) -> Result<()> {
    let var = file
        .variable(var_name)
        .ok_or_else(|| DlWindError::missing_variable(var_name, "file"))?;
    let info = VariableInfo::from_variable(&var);

    println!("\n Variable Description: {var_name}");
    println!("={}", "=".repeat(var_name.len() + 23));
    println!(" Data type: {}", info.data_type);

    if info.dimensions.is_empty() {
        println!(" Dimensions: (scalar)");
    } else {
        println!(" Dimensions: [{}]", info.dimensions.join(", "));
        let shape: Vec<String> = info.shape.iter().map(ToString::to_string).collect();
        println!(" Shape: ({})", shape.join(" x "));
    }

    let attributes: Vec<_> = var.attributes().collect();
    if attributes.is_empty() {
        println!("\n  Attributes: (none)");
    } else {
        println!("\n  Attributes:");
        for attr in attributes {
            match attr.value() {
                Ok(value) => println!("   - {}: {}", attr.name(), format_attribute(&value)),
                Err(e) => println!("   - {}: (error reading value: {e})", attr.name()),
            }
        }
    }

    println!("\n Total elements: {}", info.shape.iter().product::<usize>());
    Ok(())
}

/// Prints which of the mapped variables are present in a file
pub fn print_variable_check(file: &File, names: &VariableNameMap) {
    let missing = missing_variables(file, names);
    println!("\n Variable Check");
    println!("================");
    for name in names.scan_variables().into_iter().chain(names.derived_variables()) {
        let mark = if missing.iter().any(|m| m == name) { "missing" } else { "ok" };
        println!("   {name:<24} {mark}");
    }
    if missing.is_empty() {
        println!("\n✅ All mapped variables present");
    } else {
        println!("\n⚠ {} mapped variable(s) missing: {}", missing.len(), missing.join(", "));
    }
}

fn format_attribute(value: &AttributeValue) -> String {
    match value {
        AttributeValue::Str(s) => format!("\"{s}\""),
        AttributeValue::Strs(ss) => format!("{ss:?}"),
        AttributeValue::Float(f) => f.to_string(),
        AttributeValue::Floats(fs) => format!("{fs:?}"),
        AttributeValue::Double(d) => d.to_string(),
        AttributeValue::Doubles(ds) => format!("{ds:?}"),
        AttributeValue::Int(i) => i.to_string(),
        AttributeValue::Ints(is) => format!("{is:?}"),
        AttributeValue::Short(s) => s.to_string(),
        AttributeValue::Shorts(ss) => format!("{ss:?}"),
        other => format!("{other:?}"),
    }
}
