// SPDX-FileCopyrightText: 2026 Santhosh Shyamsundar, Prabhu S., and Studio Tyto
// SPDX-License-Identifier: MIT
//
// OptimizationLoop: the closed formulation loop for one target set.

// ============================================================================
// DOE -> predict -> evaluate -> tell, then ask -> re-balance -> predict ->
// evaluate -> tell for a fixed number of iterations.
// ============================================================================

use crate::artifacts::{self, ArtifactStore, RunLog};
use crate::config::{ProcessingLevers, RunConfig};
use crate::error::RunError;
use crate::evaluation::{
    EvalRequest, EvaluationAdapter, FailedEvaluation, IEvaluator, Score, TargetDeviationEvaluator, TargetSet,
};
use crate::optimization::bayesian::GpSettings;
use crate::optimization::{
    DoeConfig, DoeGenerator, GaussianProcessOptimizer, Rebalancer, SequentialOptimizer,
};
use crate::physics_kernel::{PhysicsConfig, PhysicsKernel, PredictedProperties};
use crate::science::compatibility::CompatibilityRules;
use crate::science::materials::{IngredientCatalog, IngredientLibrary};
use crate::science::sustainability::{filter_pools_by_goals, Goals, SustainabilityGoals};
use crate::tensors::{Dimension, FormulationRow, ProcessConditions, SearchSpace};
use log::{info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

/// Compatibilizer level given to every DOE row before the warm start.
const WARM_START_COMPAT_WTPCT: f64 = 1.5;

/// Read-only inputs shared by every run (and every batch worker).
pub struct EngineContext {
    pub library: IngredientLibrary,
    pub catalog: IngredientCatalog,
    pub rules: CompatibilityRules,
    pub physics: PhysicsConfig,
    pub levers: ProcessingLevers,
    pub evaluator: Arc<dyn IEvaluator>,
}

impl EngineContext {
    pub fn new(
        library: IngredientLibrary,
        rules: CompatibilityRules,
        physics: PhysicsConfig,
        levers: ProcessingLevers,
        evaluator: Arc<dyn IEvaluator>,
    ) -> Self {
        let catalog = IngredientCatalog::from_library(&library);
        EngineContext {
            library,
            catalog,
            rules,
            physics,
            levers,
            evaluator,
        }
    }

    /// Built-in library, rules, model and levers with the local evaluator.
    pub fn builtin() -> Self {
        Self::new(
            IngredientLibrary::builtin(),
            CompatibilityRules::builtin(),
            PhysicsConfig::default(),
            ProcessingLevers::default(),
            Arc::new(TargetDeviationEvaluator),
        )
    }
}

/// One scored (formulation, process) pair. Never mutated after scoring.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Candidate {
    pub id: String,
    /// 0 for the warm start.
    pub iteration: usize,
    pub formulation: FormulationRow,
    pub process: ProcessConditions,
    pub prediction: Option<PredictedProperties>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prediction_error: Option<String>,
    pub score: Score,
    pub fingerprint: String,
    /// Optimizer coordinates, in search-space order.
    pub point: Vec<f64>,
}

impl Candidate {
    /// Only predicted candidates inform the optimizer.
    pub fn observable(&self) -> bool {
        self.prediction.is_some()
    }
}

/// `summaries/summary_<run>.json`
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: String,
    /// Higher is better.
    pub best_score: Option<f64>,
    pub best_parameters: BTreeMap<String, f64>,
    pub search_space: Vec<Dimension>,
    pub max_iterations: usize,
    pub n_initial_points: usize,
    pub n_warm_start: usize,
    pub n_filtered_out: usize,
    pub n_observations: usize,
}

/// Entry of `recommendations.json`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Recommendation {
    pub rank: usize,
    pub candidate: String,
    pub formulation: FormulationRow,
    pub process: ProcessConditions,
    pub predicted_properties: Option<PredictedProperties>,
    pub scores: Score,
}

#[derive(Debug)]
pub struct RunOutcome {
    pub summary: RunSummary,
    pub candidates: Vec<Candidate>,
}

impl RunOutcome {
    /// Best `k` predicted candidates by composite weight; ties keep run order.
    pub fn top_k(&self, k: usize) -> Vec<Recommendation> {
        let mut ranked: Vec<&Candidate> = self.candidates.iter().filter(|c| c.observable()).collect();
        ranked.sort_by(|a, b| b.score.composite_weight.total_cmp(&a.score.composite_weight));
        ranked
            .into_iter()
            .take(k)
            .enumerate()
            .map(|(i, c)| Recommendation {
                rank: i + 1,
                candidate: c.id.clone(),
                formulation: c.formulation.clone(),
                process: c.process.clone(),
                predicted_properties: c.prediction.clone(),
                scores: c.score.clone(),
            })
            .collect()
    }
}

pub struct OptimizationLoop<'a> {
    ctx: &'a EngineContext,
    config: &'a RunConfig,
    adapter: EvaluationAdapter,
    log: Option<&'a RunLog>,
}

impl<'a> OptimizationLoop<'a> {
    pub fn new(ctx: &'a EngineContext, config: &'a RunConfig) -> Self {
        OptimizationLoop {
            ctx,
            config,
            adapter: EvaluationAdapter::new(Arc::clone(&ctx.evaluator), config.eval_timeout()),
            log: None,
        }
    }

    /// Mirrors milestones into a run log.
    pub fn with_log(mut self, log: &'a RunLog) -> Self {
        self.log = Some(log);
        self
    }

    fn note(&self, message: &str) {
        info!("{message}");
        if let Some(log) = self.log {
            log.line(message);
        }
    }

    /// Goals from the config; bio focus without goals implies compostable.
    fn active_goals(&self) -> Goals {
        match &self.config.goals {
            Some(g) => g.clone(),
            None if self.config.focus.is_bio() => Goals {
                sustainability: SustainabilityGoals { compostable: true },
                recycling_stream: None,
            },
            None => Goals::default(),
        }
    }

    pub fn run(&self, targets: &TargetSet, out_dir: &Path) -> Result<RunOutcome, RunError> {
        let run_id = artifacts::new_run_id();
        let seed = self
            .config
            .seed
            .unwrap_or_else(|| artifacts::seed_from_run_id(&run_id));
        let store = ArtifactStore::new(out_dir, &run_id);
        let space = SearchSpace::formulation_default(self.config.focus.as_str());
        if space.is_empty() {
            return Err(RunError::EmptySearchSpace);
        }
        self.note(&format!("Run {run_id}: focus={}, seed={seed}", self.config.focus));

        // 1. Candidate generation from goal-filtered pools
        let pools = filter_pools_by_goals(&self.active_goals(), &self.ctx.library, None);
        let doe = DoeGenerator::new(&self.ctx.catalog, &self.ctx.rules).generate(
            &pools,
            &DoeConfig {
                n: self.config.initial_points,
                seed,
                focus: self.config.focus,
                ..Default::default()
            },
        );
        if doe.is_empty() {
            return Err(RunError::NoCandidates);
        }
        store.write_doe(
            &doe,
            &serde_json::json!({
                "run_id": run_id,
                "initial_doe_focus": self.config.focus.as_str(),
                "n_initial_candidates": self.config.initial_points,
                "total": doe.len(),
            }),
        )?;
        self.note(&format!("Generated {} initial candidates", doe.len()));

        // 2. Default levers for the warm start
        let warm_process = ProcessConditions::default();
        let warm_rows: Vec<FormulationRow> = doe
            .iter()
            .map(|row| {
                let mut r = Rebalancer::rebalance(row, &[("compat_wtpct", WARM_START_COMPAT_WTPCT)]);
                r.extra.insert(
                    "mode".to_string(),
                    serde_json::Value::from(format!("focus_{}", self.config.focus)),
                );
                r
            })
            .collect();
        let template = warm_rows[0].clone();

        // 3. Predict and evaluate the warm start
        let mut candidates = Vec::with_capacity(warm_rows.len());
        for (j, row) in warm_rows.iter().enumerate() {
            let point = point_of(&space, row, &warm_process);
            let (cand, failure) =
                self.assess(&run_id, &format!("doe_{j:04}"), 0, row.clone(), warm_process.clone(), point, targets);
            if let Some(failure) = &failure {
                self.quarantine(&store, &cand, failure)?;
            }
            candidates.push(cand);
        }
        store.write_initial_evaluations(&candidates)?;

        // 4. Tell the in-bounds, predicted rows
        let mut optimizer =
            GaussianProcessOptimizer::new(space.clone(), GpSettings { explore_ratio: 0.0, ..Default::default() }, seed);
        let observable: Vec<&Candidate> = candidates.iter().filter(|c| c.observable()).collect();
        let in_bounds: Vec<&Candidate> = observable.iter().copied().filter(|c| space.contains(&c.point)).collect();
        let n_filtered_out = observable.len() - in_bounds.len();
        if n_filtered_out > 0 {
            warn!("Filtered out {n_filtered_out} initial points that were outside the optimizer's search space.");
        }
        if in_bounds.is_empty() {
            return Err(RunError::NoValidWarmStart);
        }
        let xs: Vec<Vec<f64>> = in_bounds.iter().map(|c| c.point.clone()).collect();
        let ys: Vec<f64> = in_bounds.iter().map(|c| c.score.objective()).collect();
        optimizer.tell(&xs, &ys)?;
        let n_warm_start = xs.len();
        self.note(&format!("Optimizer updated with {n_warm_start} initial DOE results"));

        // 5. Iterate
        let (n_exploit, n_explore) = self.config.split();
        let mut explore_rng = StdRng::seed_from_u64(seed.wrapping_add(1));
        for i in 1..=self.config.iterations {
            let mut points = optimizer.ask(n_exploit);
            points.extend((0..n_explore).map(|_| space.sample(&mut explore_rng)));

            let mut batch_x = Vec::with_capacity(points.len());
            let mut batch_y = Vec::with_capacity(points.len());
            for (j, point) in points.into_iter().enumerate() {
                let id = format!("iter_{i:02}_cand_{:02}", j + 1);
                let (row, process) = self.materialize(&space, &template, &point, &id);
                let (cand, failure) = self.assess(&run_id, &id, i, row, process, point, targets);

                match &failure {
                    Some(failure) => self.quarantine(&store, &cand, failure)?,
                    None => {
                        store.write_candidate(&cand)?;
                    }
                }
                if cand.observable() {
                    batch_x.push(cand.point.clone());
                    batch_y.push(cand.score.objective());
                }
                candidates.push(cand);
            }

            optimizer.tell(&batch_x, &batch_y)?;
            self.note(&format!(
                "Iteration {i}/{}: told {} results ({n_exploit} exploit, {n_explore} explore)",
                self.config.iterations,
                batch_x.len()
            ));
        }

        // 6. Summary
        let (best_score, best_parameters) = match optimizer.best() {
            Some((x, y)) => (
                Some(-y),
                space
                    .names()
                    .into_iter()
                    .map(str::to_string)
                    .zip(x.iter().copied())
                    .collect(),
            ),
            None => (None, BTreeMap::new()),
        };
        let summary = RunSummary {
            run_id: run_id.clone(),
            best_score,
            best_parameters,
            search_space: space.dimensions.clone(),
            max_iterations: self.config.iterations,
            n_initial_points: self.config.initial_points,
            n_warm_start,
            n_filtered_out,
            n_observations: optimizer.observations().len(),
        };
        store.write_summary(&summary)?;
        self.note(&format!("Run {run_id} finished; best score {best_score:?}"));
        Ok(RunOutcome { summary, candidates })
    }

    /// Persists a failed evaluation under `failed_evaluations/<run>/`.
    fn quarantine(
        &self,
        store: &ArtifactStore,
        cand: &Candidate,
        failure: &FailedEvaluation,
    ) -> Result<(), RunError> {
        let dir = store.write_candidate(cand)?;
        let moved = store.quarantine(&dir, failure)?;
        warn!("Evaluation of {} failed; artifacts moved to {}", cand.id, moved.display());
        Ok(())
    }

    /// Splits an optimizer point into a re-balanced recipe and clamped process.
    fn materialize(
        &self,
        space: &SearchSpace,
        template: &FormulationRow,
        point: &[f64],
        id: &str,
    ) -> (FormulationRow, ProcessConditions) {
        let mut wt_vars = Vec::new();
        let mut process = ProcessConditions::default();
        for (dim, value) in space.dimensions.iter().zip(point) {
            if dim.name.ends_with("_wtpct") {
                wt_vars.push((dim.name.as_str(), *value));
            } else {
                process.set(&dim.name, *value);
            }
        }
        let process = self.ctx.levers.clamp(&process);
        let mut row = Rebalancer::rebalance(template, &wt_vars);
        row.extra
            .insert("mode".to_string(), serde_json::Value::from("bo_suggested"));
        row.extra
            .insert("candidate".to_string(), serde_json::Value::from(id));
        (row, process)
    }

    /// Predicts and scores one candidate. Returns the failure record when
    /// the evaluation was unusable.
    #[allow(clippy::too_many_arguments)]
    fn assess(
        &self,
        run_id: &str,
        id: &str,
        iteration: usize,
        row: FormulationRow,
        process: ProcessConditions,
        point: Vec<f64>,
        targets: &TargetSet,
    ) -> (Candidate, Option<FailedEvaluation>) {
        let fingerprint = artifacts::fingerprint(&(&row, &process));
        match PhysicsKernel::predict(&row, &process, &self.ctx.physics, &self.ctx.catalog) {
            Ok(pred) => {
                targets.preflight(id, &pred);
                let request = EvalRequest {
                    run_id: run_id.to_string(),
                    candidate_id: id.to_string(),
                    formulation: row.clone(),
                    process: process.clone(),
                    predictions: pred.clone(),
                    targets: targets.clone(),
                    previous_scores: None,
                };
                let evaluation = self.adapter.assess(&request);
                let cand = Candidate {
                    id: id.to_string(),
                    iteration,
                    formulation: row,
                    process,
                    prediction: Some(pred),
                    prediction_error: None,
                    score: evaluation.score,
                    fingerprint,
                    point,
                };
                (cand, evaluation.failure)
            }
            Err(e) => {
                warn!("Could not compute properties for {id}: {e}");
                let cand = Candidate {
                    id: id.to_string(),
                    iteration,
                    formulation: row,
                    process,
                    prediction: None,
                    prediction_error: Some(e.to_string()),
                    score: Score::failed(targets.iter().map(|(k, _)| k), &format!("prediction failed: {e}")),
                    fingerprint,
                    point,
                };
                (cand, None)
            }
        }
    }
}

/// Optimizer coordinates of a recipe under the given process.
pub fn point_of(space: &SearchSpace, row: &FormulationRow, process: &ProcessConditions) -> Vec<f64> {
    space
        .dimensions
        .iter()
        .map(|d| {
            crate::tensors::Role::from_column(&d.name)
                .map(|r| row.wt(r))
                .or_else(|| process.get(&d.name))
                .unwrap_or(f64::NAN)
        })
        .collect()
}
