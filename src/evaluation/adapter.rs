// SPDX-FileCopyrightText: 2026 Santhosh Shyamsundar, Prabhu S., and Studio Tyto
// SPDX-License-Identifier: MIT
//! Evaluation Feedback Adapter
//!
//! Wraps an [`IEvaluator`] with a bounded wait, the numeric fallback and
//! the guardrail penalty. Never fails: an unusable evaluation becomes a
//! penalized score with `status = failed`.

use super::guardrails::GuardrailEngine;
use super::reward::{fallback_weight, Confidence, EvalStatus, Score};
use super::traits::{EvalRequest, EvalResponse, IEvaluator};
use crate::error::EvaluationError;
use log::warn;
use serde::Serialize;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{mpsc, Arc};
use std::time::Duration;

/// What is kept of an evaluation that could not be used.
#[derive(Clone, Debug, Serialize)]
pub struct FailedEvaluation {
    pub candidate_id: String,
    pub error: String,
    /// The evaluator's answer as received, when there was one.
    pub raw_response: Option<serde_json::Value>,
    pub request: EvalRequest,
}

/// A score plus, for failed evaluations, the failure record.
#[derive(Clone, Debug)]
pub struct Evaluation {
    pub score: Score,
    pub failure: Option<FailedEvaluation>,
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

pub struct EvaluationAdapter {
    evaluator: Arc<dyn IEvaluator>,
    timeout: Duration,
    guardrails: GuardrailEngine,
}

impl EvaluationAdapter {
    pub fn new(evaluator: Arc<dyn IEvaluator>, timeout: Duration) -> Self {
        EvaluationAdapter {
            evaluator,
            timeout,
            guardrails: GuardrailEngine::new(),
        }
    }

    pub fn evaluator_name(&self) -> &'static str {
        self.evaluator.name()
    }

    /// Runs the evaluator on a helper thread and waits at most `timeout`.
    /// The response is not validated.
    ///
    /// A timed-out call is abandoned; its thread finishes on its own and
    /// the late answer is dropped.
    fn receive(&self, request: &EvalRequest) -> Result<EvalResponse, EvaluationError> {
        let (tx, rx) = mpsc::channel();
        let evaluator = Arc::clone(&self.evaluator);
        let req = request.clone();
        std::thread::Builder::new()
            .name(format!("eval-{}", request.candidate_id))
            .spawn(move || {
                let result = panic::catch_unwind(AssertUnwindSafe(|| evaluator.evaluate(&req)))
                    .unwrap_or_else(|p| {
                        Err(EvaluationError::Collaborator(format!(
                            "evaluator panicked: {}",
                            panic_message(p.as_ref())
                        )))
                    });
                tx.send(result).ok();
            })
            .map_err(|e| EvaluationError::Collaborator(format!("could not start evaluator: {e}")))?;

        match rx.recv_timeout(self.timeout) {
            Ok(result) => result,
            Err(mpsc::RecvTimeoutError::Timeout) => Err(EvaluationError::Timeout(self.timeout)),
            Err(mpsc::RecvTimeoutError::Disconnected) => Err(EvaluationError::Disconnected),
        }
    }

    /// Evaluator answer, validated.
    pub fn call(&self, request: &EvalRequest) -> Result<EvalResponse, EvaluationError> {
        let response = self.receive(request)?;
        response.validate()?;
        Ok(response)
    }

    /// Scores one candidate.
    pub fn evaluate(&self, request: &EvalRequest) -> Score {
        self.assess(request).score
    }

    /// Scores one candidate and keeps the failure record of an unusable
    /// evaluation.
    pub fn assess(&self, request: &EvalRequest) -> Evaluation {
        let (error, raw_response) = match self.receive(request) {
            Ok(response) => match response.validate() {
                Ok(()) => {
                    return Evaluation {
                        score: self.score_response(request, response),
                        failure: None,
                    }
                }
                Err(e) => (e, serde_json::to_value(&response).ok()),
            },
            Err(e) => (e, None),
        };
        warn!("Evaluation failed for {}: {error}", request.candidate_id);
        Evaluation {
            score: Score::failed(request.targets.iter().map(|(k, _)| k), &error.to_string()),
            failure: Some(FailedEvaluation {
                candidate_id: request.candidate_id.clone(),
                error: error.to_string(),
                raw_response,
                request: request.clone(),
            }),
        }
    }

    /// Fills gaps with the fallback and applies guardrails.
    pub fn score_response(&self, request: &EvalRequest, response: EvalResponse) -> Score {
        let confidence = response.confidence.as_deref().map(Confidence::parse);
        let weight = match response.composite_weight {
            Some(w) => w,
            None => {
                let w = fallback_weight(response.consistency, response.realism_penalty, confidence);
                warn!(
                    "Evaluator gave no composite weight for {}; fallback weight {w:.4}",
                    request.candidate_id
                );
                w
            }
        };

        let violations = self
            .guardrails
            .check(&request.formulation, Some(&request.predictions));
        let confidence = confidence.unwrap_or(Confidence::Low);
        Score {
            consistency: response.consistency.unwrap_or(0.5),
            realism_penalty: response.realism_penalty.unwrap_or(0.5),
            confidence,
            confidence_factor: confidence.factor(),
            composite_weight: self.guardrails.penalize(weight, &violations),
            status: EvalStatus::Success,
            property_scores: response
                .property_scores
                .iter()
                .map(|(k, v)| (k.clone(), Some(v.score)))
                .collect(),
            flags: violations.iter().map(|v| v.flag.to_string()).collect(),
            notes: response.notes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluation::targets::{TargetConstraint, TargetSet};
    use crate::physics_kernel::PredictedProperties;
    use crate::tensors::{Component, FormulationRow, ProcessConditions};

    struct Fixed(EvalResponse);

    impl IEvaluator for Fixed {
        fn evaluate(&self, _: &EvalRequest) -> Result<EvalResponse, EvaluationError> {
            Ok(self.0.clone())
        }
    }

    struct Slow;

    impl IEvaluator for Slow {
        fn evaluate(&self, _: &EvalRequest) -> Result<EvalResponse, EvaluationError> {
            std::thread::sleep(Duration::from_millis(500));
            Ok(EvalResponse::default())
        }
    }

    struct Panicking;

    impl IEvaluator for Panicking {
        fn evaluate(&self, _: &EvalRequest) -> Result<EvalResponse, EvaluationError> {
            panic!("evaluator crashed")
        }
    }

    fn request(el: f64, izod_m20: f64) -> EvalRequest {
        let mut targets = TargetSet::default();
        targets.insert("E_GPa", TargetConstraint::new(1.0));
        EvalRequest {
            run_id: "run".into(),
            candidate_id: "iter_01_cand_00".into(),
            formulation: FormulationRow {
                base_a: Component::new("PP", 100.0 - el),
                elastomer: Component::new("POE", el),
                ..Default::default()
            },
            process: ProcessConditions::default(),
            predictions: PredictedProperties {
                e_gpa: 1.0,
                mfi_g10min: 20.0,
                sigma_y_mpa: 25.0,
                izod_23_kjm2: izod_m20,
                izod_m20_kjm2: izod_m20,
                hdt_c: 80.0,
                shrink_pct: None,
                rho_gcc: 0.9,
                eps_y_pct: 10.0,
                gardner_j: 10.0,
                xc: 0.45,
                phi_el: el / 100.0,
                phi_f_talc: 0.0,
                phi_f_caco3: 0.0,
                phi_f_biofiber: 0.0,
                phi_f_biochar: 0.0,
            },
            targets,
            previous_scores: None,
        }
    }

    fn adapter(e: impl IEvaluator + 'static, timeout_ms: u64) -> EvaluationAdapter {
        EvaluationAdapter::new(Arc::new(e), Duration::from_millis(timeout_ms))
    }

    #[test]
    fn test_missing_weight_uses_fallback() {
        let a = adapter(
            Fixed(EvalResponse {
                consistency: Some(0.8),
                realism_penalty: Some(0.25),
                confidence: Some("Medium".into()),
                ..Default::default()
            }),
            1_000,
        );
        let s = a.evaluate(&request(15.0, 5.0));
        assert_eq!(s.status, EvalStatus::Success);
        assert!((s.composite_weight - 0.39).abs() < 1e-12);
        assert!(s.flags.is_empty());
    }

    #[test]
    fn test_guardrail_halves_reported_weight() {
        let a = adapter(
            Fixed(EvalResponse {
                composite_weight: Some(0.6),
                confidence: Some("High".into()),
                ..Default::default()
            }),
            1_000,
        );
        let s = a.evaluate(&request(2.0, 30.0));
        assert_eq!(s.flags, vec!["unrealistic_izod_without_elastomer".to_string()]);
        assert!((s.composite_weight - 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_timeout_yields_failed_score() {
        let s = adapter(Slow, 20).evaluate(&request(15.0, 5.0));
        assert!(s.is_failed());
        assert_eq!(s.composite_weight, 0.0);
        assert_eq!(s.consistency, 0.1);
        assert_eq!(s.confidence, Confidence::Error);
        assert_eq!(s.property_scores.get("E_GPa"), Some(&None));
    }

    #[test]
    fn test_malformed_and_panicking_evaluators_fail() {
        let bad = adapter(
            Fixed(EvalResponse {
                composite_weight: Some(7.0),
                ..Default::default()
            }),
            1_000,
        );
        assert!(matches!(bad.call(&request(15.0, 5.0)), Err(EvaluationError::Malformed(_))));
        assert!(bad.evaluate(&request(15.0, 5.0)).is_failed());

        let crashed = adapter(Panicking, 1_000);
        match crashed.call(&request(15.0, 5.0)) {
            Err(EvaluationError::Collaborator(msg)) => assert!(msg.contains("evaluator crashed"), "{msg}"),
            other => panic!("expected a collaborator error, got {other:?}"),
        }
    }

    #[test]
    fn test_failure_record_keeps_raw_response_and_error() {
        let bad = adapter(
            Fixed(EvalResponse {
                composite_weight: Some(7.0),
                notes: Some("overconfident".into()),
                ..Default::default()
            }),
            1_000,
        );
        let eval = bad.assess(&request(15.0, 5.0));
        assert!(eval.score.is_failed());
        let failure = eval.failure.unwrap();
        assert_eq!(failure.candidate_id, "iter_01_cand_00");
        assert!(failure.error.contains("composite_weight"), "{}", failure.error);
        let raw = failure.raw_response.unwrap();
        assert_eq!(raw["composite_weight"], 7.0);
        assert_eq!(raw["notes"], "overconfident");

        let timed_out = adapter(Slow, 20).assess(&request(15.0, 5.0)).failure.unwrap();
        assert!(timed_out.raw_response.is_none());
        assert!(timed_out.error.contains("did not answer"), "{}", timed_out.error);

        let ok = adapter(
            Fixed(EvalResponse {
                composite_weight: Some(0.6),
                ..Default::default()
            }),
            1_000,
        )
        .assess(&request(15.0, 5.0));
        assert!(ok.failure.is_none());
    }
}
