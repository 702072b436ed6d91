// SPDX-FileCopyrightText: 2026 Santhosh Shyamsundar, Prabhu S., and Studio Tyto
// SPDX-License-Identifier: MIT
//
// Target constraints derived from a normalized spec.

use crate::ingest::NormalizedSpec;
use crate::physics_kernel::PredictedProperties;
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Desired value of one predicted property.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct TargetConstraint {
    pub value: f64,
    pub tol: Option<f64>,
    pub weight: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl TargetConstraint {
    pub fn new(value: f64) -> Self {
        TargetConstraint {
            value,
            tol: None,
            weight: 1.0,
            notes: None,
        }
    }

    /// Explicit tolerance, else 10% of |value|.
    pub fn tolerance(&self) -> f64 {
        self.tol.unwrap_or(0.1 * self.value.abs())
    }
}

/// Constraints keyed by prediction column (e.g. `E_GPa`).
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct TargetSet(pub BTreeMap<String, TargetConstraint>);

impl TargetSet {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &TargetConstraint)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn get(&self, key: &str) -> Option<&TargetConstraint> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: &str, constraint: TargetConstraint) {
        self.0.insert(key.to_string(), constraint);
    }

    /// (key, (pred − t)/t) for targets with t ≠ 0, worst first.
    pub fn normalized_errors(&self, pred: &PredictedProperties) -> Vec<(String, f64)> {
        let mut errors: Vec<(String, f64)> = self
            .iter()
            .filter(|(_, t)| t.value.abs() > 1e-9)
            .filter_map(|(key, t)| pred.get(key).map(|p| (key.to_string(), (p - t.value) / t.value)))
            .collect();
        errors.sort_by(|a, b| b.1.abs().total_cmp(&a.1.abs()));
        errors
    }

    /// Logs the three worst offenders.
    pub fn preflight(&self, label: &str, pred: &PredictedProperties) {
        for (key, err) in self.normalized_errors(pred).into_iter().take(3) {
            debug!("Pre-flight {label}: '{key}' has normalized error {:+.1}%", err * 100.0);
        }
    }
}

/// Human property name -> (condition substring, prediction key).
pub const PROPERTY_MAP: &[(&str, Option<&str>, &str)] = &[
    ("Melt Mass-Flow Rate (MFR)", None, "MFI_g10min"),
    ("Tensile Strength at Yield", None, "sigma_y_MPa"),
    ("Flexural Modulus", Some("ISO 178"), "E_GPa"),
    ("Notched Izod Impact Strength", Some("-20"), "Izod_m20_kJm2"),
    ("Notched Izod Impact Strength", Some("23"), "Izod_23_kJm2"),
    ("Heat Deflection Temperature", None, "HDT_C"),
    ("Density", None, "rho_gcc"),
    ("Elongation at Yield", None, "eps_y_pct"),
    ("Gardner Impact", None, "Gardner_J"),
];

/// Maps spec properties onto prediction keys.
///
/// Conditional mappings match when `conditions` or `test_method` contains
/// the substring. Unmapped or non-numeric properties are dropped.
pub fn build_targets_constraints(spec: &NormalizedSpec) -> TargetSet {
    let mut targets = TargetSet::default();
    for prop in &spec.properties {
        let Some(value) = prop.value else { continue };
        let constraint = TargetConstraint {
            value,
            tol: prop.tol,
            weight: prop.weight.unwrap_or(1.0),
            notes: prop.notes.clone(),
        };

        if PredictedProperties::KEYS.contains(&prop.name.as_str()) {
            targets.insert(&prop.name, constraint);
            continue;
        }
        let conditions = prop.conditions.as_deref().unwrap_or("");
        let method = prop.test_method.as_deref().unwrap_or("");
        for (name, needle, key) in PROPERTY_MAP {
            if *name != prop.name {
                continue;
            }
            if let Some(needle) = needle {
                if !conditions.contains(needle) && !method.contains(needle) {
                    continue;
                }
            }
            targets.insert(key, constraint.clone());
        }
    }
    targets
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::SpecProperty;

    #[test]
    fn test_conditional_mapping() {
        let spec = NormalizedSpec {
            properties: vec![
                SpecProperty {
                    conditions: Some("-20 °C".into()),
                    ..SpecProperty::new("Notched Izod Impact Strength", 6.0)
                },
                SpecProperty {
                    test_method: Some("ISO 180/1A, 23 °C".into()),
                    weight: Some(2.0),
                    ..SpecProperty::new("Notched Izod Impact Strength", 40.0)
                },
                // Wrong test standard, dropped.
                SpecProperty {
                    conditions: Some("ASTM D790".into()),
                    ..SpecProperty::new("Flexural Modulus", 1.3)
                },
                SpecProperty::new("Density", 0.905),
                SpecProperty::new("HDT_C", 90.0),
                SpecProperty::new("Colour index", 3.0),
            ],
            ..Default::default()
        };
        let targets = build_targets_constraints(&spec);
        assert_eq!(targets.len(), 4);
        assert_eq!(targets.get("Izod_m20_kJm2").unwrap().value, 6.0);
        assert_eq!(targets.get("Izod_23_kJm2").unwrap().weight, 2.0);
        assert_eq!(targets.get("rho_gcc").unwrap().value, 0.905);
        assert_eq!(targets.get("HDT_C").unwrap().value, 90.0);
        assert!(targets.get("E_GPa").is_none());
    }

    #[test]
    fn test_default_tolerance() {
        assert!((TargetConstraint::new(-20.0).tolerance() - 2.0).abs() < 1e-12);
        let explicit = TargetConstraint {
            tol: Some(0.5),
            ..TargetConstraint::new(10.0)
        };
        assert_eq!(explicit.tolerance(), 0.5);
    }
}
