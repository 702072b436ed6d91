// SPDX-FileCopyrightText: 2026 Santhosh Shyamsundar, Prabhu S., and Studio Tyto
// SPDX-License-Identifier: MIT
//! Run, batch and processing-lever configuration.
//!
//! Everything here is read once at start-up and handed to the components
//! that need it by reference (or `Arc` across workers).

use crate::error::CatalogError;
use crate::optimization::Focus;
use crate::science::sustainability::Goals;
use crate::tensors::ProcessConditions;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

/// Parameters of one closed-loop optimization run.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RunConfig {
    pub iterations: usize,
    /// DOE rows requested per (elastomer, filler set).
    pub initial_points: usize,
    /// Fraction of each iteration drawn uniformly at random.
    pub explore_ratio: f64,
    pub candidates_per_iteration: usize,
    pub focus: Focus,
    pub goals: Option<Goals>,
    /// Derived from the run id when absent.
    pub seed: Option<u64>,
    pub eval_timeout_s: u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        RunConfig {
            iterations: 30,
            initial_points: 30,
            explore_ratio: 0.25,
            candidates_per_iteration: 4,
            focus: Focus::None,
            goals: None,
            seed: None,
            eval_timeout_s: 120,
        }
    }
}

impl RunConfig {
    pub fn eval_timeout(&self) -> Duration {
        Duration::from_secs(self.eval_timeout_s)
    }

    /// (exploit, explore) counts for one iteration.
    pub fn split(&self) -> (usize, usize) {
        let n = self.candidates_per_iteration;
        let explore = ((n as f64) * self.explore_ratio.clamp(0.0, 1.0)).floor() as usize;
        (n - explore.min(n), explore.min(n))
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BatchConfig {
    pub workers: usize,
    /// Skip specs whose output already holds a completion marker.
    pub resume: bool,
}

impl Default for BatchConfig {
    fn default() -> Self {
        BatchConfig {
            workers: 4,
            resume: false,
        }
    }
}

/// Inclusive bounds of one process variable.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct LeverRange {
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LeverSection {
    levers: Vec<LeverSpec>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LeverSpec {
    variable: Option<String>,
    range: Option<Vec<f64>>,
}

/// Process-variable bounds keyed by the internal variable name.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ProcessingLevers {
    pub ranges: BTreeMap<String, LeverRange>,
}

fn internal_name(human: &str) -> Option<&'static str> {
    match human {
        "Screw speed" => Some("N_rps"),
        "Melt temp" | "Melt temp profile" => Some("Tm_C"),
        "Feed rate" => Some("Q_kgh"),
        // Torque stands in for specific energy.
        "Specific energy" => Some("Torque_Nm"),
        _ => None,
    }
}

impl Default for ProcessingLevers {
    fn default() -> Self {
        let mut ranges = BTreeMap::new();
        ranges.insert("N_rps".to_string(), LeverRange { min: 2.5, max: 8.33 });
        ranges.insert("Tm_C".to_string(), LeverRange { min: 200.0, max: 240.0 });
        ranges.insert("Q_kgh".to_string(), LeverRange { min: 1.0, max: 10.0 });
        ranges.insert("Torque_Nm".to_string(), LeverRange { min: 50.0, max: 250.0 });
        ProcessingLevers { ranges }
    }
}

impl ProcessingLevers {
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let text = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text).map_err(|source| CatalogError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Screw speed arrives in rpm and is stored in rev/s. When a variable
    /// is declared twice the wider range wins.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        // Sections hold `{"levers": [{"variable", "range"}]}`; anything else is skipped.
        let file: BTreeMap<String, serde_json::Value> = serde_json::from_str(text)?;
        let sections = file
            .into_values()
            .filter_map(|v| serde_json::from_value::<LeverSection>(v).ok());
        let mut ranges: BTreeMap<String, LeverRange> = BTreeMap::new();
        for section in sections {
            for spec in &section.levers {
                let Some(name) = spec.variable.as_deref().and_then(internal_name) else {
                    continue;
                };
                let Some([lo, hi]) = spec.range.as_deref().and_then(|r| <[f64; 2]>::try_from(r).ok())
                else {
                    continue;
                };
                let (mut lo, mut hi) = if name == "N_rps" { (lo / 60.0, hi / 60.0) } else { (lo, hi) };
                if let Some(existing) = ranges.get(name) {
                    lo = lo.min(existing.min);
                    hi = hi.max(existing.max);
                }
                ranges.insert(name.to_string(), LeverRange { min: lo, max: hi });
            }
        }
        Ok(ProcessingLevers { ranges })
    }

    /// Clamps every lever-controlled variable of `process` into its range.
    pub fn clamp(&self, process: &ProcessConditions) -> ProcessConditions {
        let mut out = process.clone();
        for (name, range) in &self.ranges {
            if let Some(value) = out.get(name) {
                out.set(name, value.max(range.min).min(range.max));
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LEVERS: &str = r#"{
        "extrusion": {"levers": [
            {"variable": "Screw speed", "range": [150, 600]},
            {"variable": "Melt temp", "range": [200, 230]},
            {"variable": "Feed rate", "range": [2, 12]},
            {"variable": "Vent vacuum", "range": [0, 1]}
        ]},
        "profile": {"levers": [
            {"variable": "Melt temp profile", "range": [190, 225]},
            {"variable": "Specific energy", "range": [60]}
        ]},
        "notes": {},
        "version": "2"
    }"#;

    #[test]
    fn test_lever_mapping_and_rpm_conversion() {
        let levers = ProcessingLevers::from_json(LEVERS).unwrap();
        assert_eq!(levers.ranges["N_rps"], LeverRange { min: 2.5, max: 10.0 });
        assert_eq!(levers.ranges["Tm_C"], LeverRange { min: 190.0, max: 230.0 });
        assert_eq!(levers.ranges["Q_kgh"], LeverRange { min: 2.0, max: 12.0 });
        // Malformed range and unknown variables are skipped.
        assert!(!levers.ranges.contains_key("Torque_Nm"));
        assert_eq!(levers.ranges.len(), 3);
    }

    #[test]
    fn test_clamp_only_touches_levers() {
        let levers = ProcessingLevers::from_json(LEVERS).unwrap();
        let process = ProcessConditions {
            n_rps: 12.0,
            tm_c: 260.0,
            q_kgh: 5.0,
            torque_nm: 900.0,
            ..Default::default()
        };
        let clamped = levers.clamp(&process);
        assert_eq!(clamped.n_rps, 10.0);
        assert_eq!(clamped.tm_c, 230.0);
        assert_eq!(clamped.q_kgh, 5.0);
        assert_eq!(clamped.torque_nm, 900.0);
        assert_eq!(ProcessingLevers::default().clamp(&process).torque_nm, 250.0);
    }

    #[test]
    fn test_run_config_split_and_defaults() {
        let cfg: RunConfig = serde_json::from_str(r#"{"iterations": 3, "focus": "bio-based"}"#).unwrap();
        assert_eq!(cfg.iterations, 3);
        assert_eq!(cfg.focus, Focus::BioBased);
        assert_eq!(cfg.initial_points, 30);
        assert_eq!(cfg.split(), (3, 1));
        let all_explore = RunConfig {
            explore_ratio: 1.7,
            ..Default::default()
        };
        assert_eq!(all_explore.split(), (0, 4));
        assert_eq!(RunConfig::default().eval_timeout(), Duration::from_secs(120));
    }
}
