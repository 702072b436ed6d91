// SPDX-FileCopyrightText: 2026 Santhosh Shyamsundar, Prabhu S., and Studio Tyto
// SPDX-License-Identifier: MIT
//
// IEvaluator Trait: Candidate Scoring Interface

//! The loop treats scoring as a black box behind [`IEvaluator`]. The
//! response is deliberately all-optional: partial answers are filled in by
//! the adapter's fallback rather than rejected.

use super::reward::Score;
use super::targets::TargetSet;
use crate::error::EvaluationError;
use crate::physics_kernel::PredictedProperties;
use crate::tensors::{FormulationRow, ProcessConditions};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Everything an evaluator may look at for one candidate.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EvalRequest {
    pub run_id: String,
    pub candidate_id: String,
    pub formulation: FormulationRow,
    pub process: ProcessConditions,
    pub predictions: PredictedProperties,
    pub targets: TargetSet,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_scores: Option<Score>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct PropertyScore {
    pub score: f64,
    #[serde(default)]
    pub notes: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EvalResponse {
    pub consistency: Option<f64>,
    pub realism_penalty: Option<f64>,
    /// "High" / "Medium" / "Low"
    pub confidence: Option<String>,
    pub composite_weight: Option<f64>,
    pub property_scores: BTreeMap<String, PropertyScore>,
    pub notes: Option<String>,
}

impl EvalResponse {
    /// Rejects values outside [0, 1] and non-finite numbers.
    pub fn validate(&self) -> Result<(), EvaluationError> {
        let unit = [
            ("consistency", self.consistency),
            ("realism_penalty", self.realism_penalty),
            ("composite_weight", self.composite_weight),
        ];
        for (name, value) in unit {
            if let Some(v) = value {
                if !(0.0..=1.0).contains(&v) {
                    return Err(EvaluationError::Malformed(format!("{name} = {v} is outside [0, 1]")));
                }
            }
        }
        for (key, ps) in &self.property_scores {
            if !ps.score.is_finite() {
                return Err(EvaluationError::Malformed(format!("score for {key} is not finite")));
            }
        }
        Ok(())
    }
}

/// Scoring collaborator. Called from a helper thread with a bounded wait.
pub trait IEvaluator: Send + Sync {
    fn evaluate(&self, request: &EvalRequest) -> Result<EvalResponse, EvaluationError>;

    /// Label recorded with each evaluation.
    fn name(&self) -> &'static str {
        "external"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_response_parses() {
        let r: EvalResponse = serde_json::from_str(r#"{"consistency": 0.7, "confidence": "High"}"#).unwrap();
        assert_eq!(r.consistency, Some(0.7));
        assert!(r.composite_weight.is_none());
        assert!(r.validate().is_ok());
    }

    #[test]
    fn test_out_of_range_is_malformed() {
        let r = EvalResponse {
            realism_penalty: Some(1.4),
            ..Default::default()
        };
        assert!(matches!(r.validate(), Err(EvaluationError::Malformed(_))));
        let nan = EvalResponse {
            consistency: Some(f64::NAN),
            ..Default::default()
        };
        assert!(nan.validate().is_err());
    }
}
