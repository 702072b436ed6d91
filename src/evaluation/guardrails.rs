// SPDX-FileCopyrightText: 2026 Santhosh Shyamsundar, Prabhu S., and Studio Tyto
// SPDX-License-Identifier: MIT
//! Plausibility Guardrails
//!
//! Physics sanity checks applied after scoring. Any violation flags the
//! candidate and halves its composite weight (once, however many flags).

use crate::physics_kernel::PredictedProperties;
use crate::tensors::formulation::SUM_TOLERANCE;
use crate::tensors::{FormulationRow, Role};
use serde::{Deserialize, Serialize};

pub const FLAG_IZOD_WITHOUT_ELASTOMER: &str = "unrealistic_izod_without_elastomer";
pub const FLAG_INVALID_RECIPE_SUM: &str = "invalid_recipe_sum";

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PlausibilityLimits {
    /// Cold impact above this needs real toughening (kJ/m²)
    pub max_izod_m20_without_elastomer: f64,
    /// Elastomer level below which the recipe counts as untoughened (wt%)
    pub min_elastomer_wtpct: f64,
    pub penalty_factor: f64,
}

impl Default for PlausibilityLimits {
    fn default() -> Self {
        PlausibilityLimits {
            max_izod_m20_without_elastomer: 25.0,
            min_elastomer_wtpct: 5.0,
            penalty_factor: 0.5,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct GuardrailViolation {
    pub flag: &'static str,
    pub actual_value: f64,
    pub limit: f64,
}

pub struct GuardrailEngine {
    limits: PlausibilityLimits,
}

impl Default for GuardrailEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl GuardrailEngine {
    pub fn new() -> Self {
        GuardrailEngine {
            limits: PlausibilityLimits::default(),
        }
    }

    pub fn with_limits(limits: PlausibilityLimits) -> Self {
        GuardrailEngine { limits }
    }

    pub fn check(&self, row: &FormulationRow, pred: Option<&PredictedProperties>) -> Vec<GuardrailViolation> {
        let mut violations = Vec::new();

        if let Some(p) = pred {
            let el = row.elastomer.wt_pct;
            if p.izod_m20_kjm2 > self.limits.max_izod_m20_without_elastomer
                && el < self.limits.min_elastomer_wtpct
            {
                violations.push(GuardrailViolation {
                    flag: FLAG_IZOD_WITHOUT_ELASTOMER,
                    actual_value: p.izod_m20_kjm2,
                    limit: self.limits.max_izod_m20_without_elastomer,
                });
            }
        }

        let total = row.total_wt();
        let negative = Role::ALL.iter().any(|r| row.wt(*r) < 0.0);
        if (total - 100.0).abs() > SUM_TOLERANCE || negative {
            violations.push(GuardrailViolation {
                flag: FLAG_INVALID_RECIPE_SUM,
                actual_value: total,
                limit: 100.0,
            });
        }
        violations
    }

    /// Weight after the one-off penalty.
    pub fn penalize(&self, weight: f64, violations: &[GuardrailViolation]) -> f64 {
        if violations.is_empty() {
            weight
        } else {
            weight * self.limits.penalty_factor
        }
    }
}
