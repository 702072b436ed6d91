// SPDX-FileCopyrightText: 2026 Santhosh Shyamsundar, Prabhu S., and Studio Tyto
// SPDX-License-Identifier: MIT
//! Candidate Scores
//!
//! The scalar the optimizer sees is `composite_weight` (higher = better).
//! When the evaluator leaves it out, it is rebuilt from the other fields:
//! `consistency × (1 − realism_penalty) × confidence_factor`, clamped to [0, 1].

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Evaluator self-assessment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Confidence {
    High,
    Medium,
    Low,
    /// The evaluation itself failed.
    Error,
}

impl Confidence {
    pub fn factor(self) -> f64 {
        match self {
            Confidence::High => 1.0,
            Confidence::Medium => 0.65,
            Confidence::Low | Confidence::Error => 0.35,
        }
    }

    /// Case-insensitive. Unknown labels are treated as `Low`.
    pub fn parse(label: &str) -> Confidence {
        match label.trim().to_lowercase().as_str() {
            "high" => Confidence::High,
            "medium" => Confidence::Medium,
            "error" => Confidence::Error,
            _ => Confidence::Low,
        }
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Confidence::High => "High",
            Confidence::Medium => "Medium",
            Confidence::Low => "Low",
            Confidence::Error => "Error",
        };
        f.write_str(s)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvalStatus {
    Success,
    Failed,
}

// Conservative defaults for fields the evaluator did not provide.
const DEFAULT_CONSISTENCY: f64 = 0.5;
const DEFAULT_REALISM_PENALTY: f64 = 0.5;

/// Composite weight rebuilt from partial evaluator output.
pub fn fallback_weight(
    consistency: Option<f64>,
    realism_penalty: Option<f64>,
    confidence: Option<Confidence>,
) -> f64 {
    let c = consistency.unwrap_or(DEFAULT_CONSISTENCY);
    let p = realism_penalty.unwrap_or(DEFAULT_REALISM_PENALTY);
    let factor = confidence.unwrap_or(Confidence::Low).factor();
    (c * (1.0 - p) * factor).clamp(0.0, 1.0)
}

/// Final evaluation of one candidate.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Score {
    pub consistency: f64,
    pub realism_penalty: f64,
    pub confidence: Confidence,
    pub confidence_factor: f64,
    pub composite_weight: f64,
    pub status: EvalStatus,
    /// Per-property plausibility; `None` when not scored.
    #[serde(default)]
    pub property_scores: BTreeMap<String, Option<f64>>,
    #[serde(default)]
    pub flags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl Score {
    /// Penalized score kept for a candidate whose evaluation failed.
    pub fn failed<'a>(target_keys: impl IntoIterator<Item = &'a str>, reason: &str) -> Self {
        Score {
            consistency: 0.1,
            realism_penalty: 0.1,
            confidence: Confidence::Error,
            confidence_factor: Confidence::Error.factor(),
            composite_weight: 0.0,
            status: EvalStatus::Failed,
            property_scores: target_keys.into_iter().map(|k| (k.to_string(), None)).collect(),
            flags: Vec::new(),
            notes: Some(reason.to_string()),
        }
    }

    pub fn is_failed(&self) -> bool {
        self.status == EvalStatus::Failed
    }

    /// Value handed to the minimizing optimizer.
    pub fn objective(&self) -> f64 {
        -self.composite_weight
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confidence_factors() {
        assert_eq!(Confidence::parse("HIGH").factor(), 1.0);
        assert_eq!(Confidence::parse("medium").factor(), 0.65);
        assert_eq!(Confidence::parse("unsure").factor(), 0.35);
        assert_eq!(Confidence::parse("Error"), Confidence::Error);
    }

    #[test]
    fn test_fallback_weight_arithmetic() {
        assert!((fallback_weight(Some(0.8), Some(0.25), Some(Confidence::Medium)) - 0.39).abs() < 1e-12);
        // All defaults: 0.5 · 0.5 · 0.35
        assert!((fallback_weight(None, None, None) - 0.0875).abs() < 1e-12);
        assert_eq!(fallback_weight(Some(1.0), Some(1.0), Some(Confidence::High)), 0.0);
        assert_eq!(fallback_weight(Some(3.0), Some(-1.0), Some(Confidence::High)), 1.0);
    }

    #[test]
    fn test_failed_score_shape() {
        let s = Score::failed(["E_GPa", "HDT_C"], "timeout");
        assert!(s.is_failed());
        assert_eq!(s.composite_weight, 0.0);
        assert_eq!(s.objective(), 0.0);
        assert_eq!(s.property_scores.get("E_GPa"), Some(&None));
        let json = serde_json::to_value(&s).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["confidence"], "Error");
    }
}
