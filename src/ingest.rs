// SPDX-FileCopyrightText: 2026 Santhosh Shyamsundar, Prabhu S., and Studio Tyto
// SPDX-License-Identifier: MIT
//! Spec-sheet ingestion.
//!
//! Turns a supplier datasheet (JSON or CSV) into a [`NormalizedSpec`]: a
//! material family plus a list of named property values. Only the target
//! builder consumes it.

use crate::error::SpecError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One property line of a datasheet.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SpecProperty {
    pub name: String,
    pub value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conditions: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tol: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl SpecProperty {
    pub fn new(name: &str, value: f64) -> Self {
        SpecProperty {
            name: name.to_string(),
            value: Some(value),
            ..Default::default()
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NormalizedSpec {
    pub material_family: Option<String>,
    /// File stem of the datasheet.
    pub grade: Option<String>,
    pub properties: Vec<SpecProperty>,
    /// Lines that could not be read as numbers.
    pub unparsed: Vec<String>,
}

/// Source of normalized specs.
pub trait ISpecSource: Send + Sync {
    fn read(&self, path: &Path) -> Result<NormalizedSpec, SpecError>;
}

/// Reads `.json` and `.csv` datasheets. PDF is rejected.
#[derive(Clone, Copy, Debug, Default)]
pub struct SpecReader;

impl ISpecSource for SpecReader {
    fn read(&self, path: &Path) -> Result<NormalizedSpec, SpecError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();
        if ext != "json" && ext != "csv" {
            return Err(SpecError::Unsupported(format!(
                "{} (.{ext} text extraction is not available)",
                path.display()
            )));
        }
        let text = std::fs::read_to_string(path).map_err(|source| SpecError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut spec = if ext == "json" {
            parse_json(&text)
        } else {
            parse_csv(&text)
        }
        .map_err(|detail| SpecError::Parse {
            path: path.to_path_buf(),
            detail,
        })?;
        if spec.grade.is_none() {
            spec.grade = path.file_stem().map(|s| s.to_string_lossy().into_owned());
        }
        Ok(spec)
    }
}

/// Structured `{material_family, properties: [...]}` or a flat
/// `{"property": value}` object.
pub fn parse_json(text: &str) -> Result<NormalizedSpec, String> {
    let raw: serde_json::Value = serde_json::from_str(text).map_err(|e| e.to_string())?;
    let obj = raw
        .as_object()
        .ok_or_else(|| "top level must be a JSON object".to_string())?;
    if obj.get("properties").map_or(false, |p| p.is_array()) {
        return serde_json::from_value(raw).map_err(|e| e.to_string());
    }

    let mut spec = NormalizedSpec::default();
    for (name, value) in obj {
        if name == "material_family" {
            spec.material_family = value.as_str().map(str::to_string);
            continue;
        }
        match number(value) {
            Some(v) => spec.properties.push(SpecProperty::new(name, v)),
            None => spec.unparsed.push(name.clone()),
        }
    }
    Ok(spec)
}

fn number(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// `property,value[,conditions]` rows with an optional header line.
pub fn parse_csv(text: &str) -> Result<NormalizedSpec, String> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.trim_start_matches('\u{feff}').as_bytes());
    let mut spec = NormalizedSpec::default();
    let mut first = true;

    for record in reader.records() {
        let record = record.map_err(|e| e.to_string())?;
        if record.iter().all(str::is_empty) {
            continue;
        }
        if std::mem::take(&mut first) {
            let key = record.get(0).unwrap_or("").to_lowercase();
            if key.contains("property") || key.contains("name") {
                continue;
            }
        }
        let line = record.position().map_or(0, |p| p.line());
        let (Some(name), Some(value)) = (record.get(0), record.get(1)) else {
            return Err(format!("line {line}: expected at least two fields"));
        };
        if name.is_empty() {
            continue;
        }
        match value.parse::<f64>() {
            Ok(v) => spec.properties.push(SpecProperty {
                conditions: record.get(2).filter(|c| !c.is_empty()).map(str::to_string),
                ..SpecProperty::new(name, v)
            }),
            Err(_) => spec.unparsed.push(name.to_string()),
        }
    }
    Ok(spec)
}
