// SPDX-FileCopyrightText: 2026 Santhosh Shyamsundar, Prabhu S., and Studio Tyto
// SPDX-License-Identifier: MIT
//
// Polyform — Closed-Loop Polymer Formulation Engine
// DOE, physics forward model, surrogate-guided search and batch execution
//
#![recursion_limit = "256"]

pub mod artifacts;
pub mod batch;
pub mod config;
pub mod error;
pub mod evaluation;
pub mod formulas;
pub mod ingest;
pub mod optimization;
pub mod orchestrator;
pub mod physics_kernel;
pub mod pipeline;
pub mod science;
pub mod tensors;
#[cfg(test)]
pub mod tests_physics;

// Re-export core types
pub use batch::{BatchExecutor, BatchSummary, ISpecRunner};
pub use config::{BatchConfig, ProcessingLevers, RunConfig};
pub use evaluation::{EvaluationAdapter, IEvaluator, Score, TargetSet};
pub use optimization::{DoeGenerator, Focus, GaussianProcessOptimizer, Rebalancer, SequentialOptimizer};
pub use orchestrator::{Candidate, EngineContext, OptimizationLoop, RunOutcome};
pub use physics_kernel::{PhysicsConfig, PhysicsKernel, PredictedProperties};
pub use tensors::{FormulationRow, ProcessConditions, SearchSpace};
