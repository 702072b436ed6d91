// SPDX-FileCopyrightText: 2026 Santhosh Shyamsundar, Prabhu S., and Studio Tyto
// SPDX-License-Identifier: MIT
//
// Deterministic in-process evaluator: scores predictions by their
// weighted relative deviation from the targets.

use super::traits::{EvalRequest, EvalResponse, IEvaluator, PropertyScore};
use crate::error::EvaluationError;
use crate::physics_kernel::PredictedProperties;

/// Weight used for targets that carry none.
const DEFAULT_DEVIATION_WEIGHT: f64 = 0.1;

#[derive(Clone, Copy, Debug, Default)]
pub struct TargetDeviationEvaluator;

impl TargetDeviationEvaluator {
    /// 0.1 per failed sanity bound.
    fn realism_penalty(p: &PredictedProperties) -> f64 {
        let checks = [
            (0.0..=0.6).contains(&p.phi_el),
            (0.5..=3.0).contains(&p.rho_gcc),
            p.e_gpa > 0.0,
            p.mfi_g10min > 0.0,
        ];
        checks.iter().filter(|ok| !**ok).count() as f64 * 0.1
    }
}

impl IEvaluator for TargetDeviationEvaluator {
    fn evaluate(&self, request: &EvalRequest) -> Result<EvalResponse, EvaluationError> {
        let pred = &request.predictions;
        let mut sum_sq = 0.0;
        let mut scored = 0usize;
        let mut within = 0usize;
        let mut response = EvalResponse::default();

        for (key, target) in request.targets.iter() {
            let Some(value) = pred.get(key) else { continue };
            scored += 1;
            let tol = target.tolerance();
            let err = value - target.value;
            if err.abs() <= tol {
                within += 1;
            }
            if target.value != 0.0 {
                let w = if target.weight > 0.0 { target.weight } else { DEFAULT_DEVIATION_WEIGHT };
                sum_sq += w * (err / target.value).powi(2);
            }
            response.property_scores.insert(
                key.to_string(),
                PropertyScore {
                    score: (1.0 - err.abs() / tol.max(1e-9)).max(0.0),
                    notes: format!("predicted {value:.4} vs target {:.4}", target.value),
                },
            );
        }

        let hit_rate = if scored > 0 { within as f64 / scored as f64 } else { 0.0 };
        let confidence = if hit_rate >= 0.75 {
            "High"
        } else if hit_rate >= 0.4 {
            "Medium"
        } else {
            "Low"
        };

        response.consistency = Some(1.0 / (1.0 + sum_sq.sqrt()));
        response.realism_penalty = Some(Self::realism_penalty(pred));
        response.confidence = Some(confidence.to_string());
        response.notes = Some(format!("{within}/{scored} targets within tolerance"));
        Ok(response)
    }

    fn name(&self) -> &'static str {
        "target-deviation"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluation::targets::{TargetConstraint, TargetSet};
    use crate::tensors::{FormulationRow, ProcessConditions};

    fn request(pred: PredictedProperties, targets: TargetSet) -> EvalRequest {
        EvalRequest {
            run_id: "r".into(),
            candidate_id: "c".into(),
            formulation: FormulationRow::default(),
            process: ProcessConditions::default(),
            predictions: pred,
            targets,
            previous_scores: None,
        }
    }

    fn pred() -> PredictedProperties {
        PredictedProperties {
            e_gpa: 1.2,
            mfi_g10min: 20.0,
            sigma_y_mpa: 25.0,
            izod_23_kjm2: 8.0,
            izod_m20_kjm2: 4.0,
            hdt_c: 80.0,
            shrink_pct: None,
            rho_gcc: 0.95,
            eps_y_pct: 10.0,
            gardner_j: 10.0,
            xc: 0.45,
            phi_el: 0.15,
            phi_f_talc: 0.0,
            phi_f_caco3: 0.0,
            phi_f_biofiber: 0.0,
            phi_f_biochar: 0.0,
        }
    }

    #[test]
    fn test_exact_hit_scores_high() {
        let mut targets = TargetSet::default();
        targets.insert("E_GPa", TargetConstraint::new(1.2));
        targets.insert("HDT_C", TargetConstraint::new(80.0));
        let r = TargetDeviationEvaluator.evaluate(&request(pred(), targets)).unwrap();
        assert_eq!(r.consistency, Some(1.0));
        assert_eq!(r.realism_penalty, Some(0.0));
        assert_eq!(r.confidence.as_deref(), Some("High"));
        assert_eq!(r.property_scores["E_GPa"].score, 1.0);
        assert!(r.composite_weight.is_none());
    }

    #[test]
    fn test_deviation_and_realism() {
        let mut p = pred();
        p.rho_gcc = 4.0;
        p.phi_el = 0.7;
        let mut targets = TargetSet::default();
        // 50% high with weight 1: deviation 0.5
        targets.insert("E_GPa", TargetConstraint::new(0.8));
        let r = TargetDeviationEvaluator.evaluate(&request(p, targets)).unwrap();
        assert!((r.consistency.unwrap() - 1.0 / 1.5).abs() < 1e-12);
        assert!((r.realism_penalty.unwrap() - 0.2).abs() < 1e-12);
        assert_eq!(r.confidence.as_deref(), Some("Low"));
        assert_eq!(r.property_scores["E_GPa"].score, 0.0);
    }
}
