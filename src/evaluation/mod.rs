// SPDX-FileCopyrightText: 2026 Santhosh Shyamsundar, Prabhu S., and Studio Tyto
// SPDX-License-Identifier: MIT
//! Candidate evaluation: targets, the evaluator seam, fallback scoring
//! and plausibility guardrails.

pub mod adapter;
pub mod guardrails;
pub mod local;
pub mod reward;
pub mod targets;
pub mod traits;

pub use adapter::{Evaluation, EvaluationAdapter, FailedEvaluation};
pub use guardrails::GuardrailEngine;
pub use local::TargetDeviationEvaluator;
pub use reward::{fallback_weight, Confidence, EvalStatus, Score};
pub use targets::{build_targets_constraints, TargetConstraint, TargetSet};
pub use traits::{EvalRequest, EvalResponse, IEvaluator, PropertyScore};
