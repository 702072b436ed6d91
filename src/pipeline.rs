// SPDX-FileCopyrightText: 2026 Santhosh Shyamsundar, Prabhu S., and Studio Tyto
// SPDX-License-Identifier: MIT
//! Single-spec pipeline: datasheet -> targets -> optimization loop ->
//! ranked recommendations, all inside one output directory.

use crate::artifacts::{self, write_json, RunLog};
use crate::config::RunConfig;
use crate::error::RunError;
use crate::evaluation::{build_targets_constraints, TargetSet};
use crate::ingest::{ISpecSource, SpecReader};
use crate::orchestrator::{EngineContext, OptimizationLoop, Recommendation};
use instant::Instant;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Written last; its presence marks a completed run.
pub const COMPLETION_MARKER: &str = "recommendations.json";

/// Recommendations kept per spec.
pub const DEFAULT_TOP_K: usize = 5;

#[derive(Debug, Serialize, Deserialize)]
struct RunMeta {
    spec_file: String,
    spec_sha256: Option<String>,
    status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    started_at: String,
    finished_at: String,
    elapsed_s: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RecommendationSummary {
    pub candidates_considered: usize,
    pub best_score: Option<f64>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Recommendations {
    pub summary: RecommendationSummary,
    pub topk: Vec<Recommendation>,
}

/// Runs one spec with the built-in datasheet reader.
pub fn run_single(
    spec_path: &Path,
    out_dir: &Path,
    ctx: &EngineContext,
    config: &RunConfig,
) -> Result<Recommendations, RunError> {
    run_single_with(&SpecReader, spec_path, out_dir, ctx, config)
}

/// Runs one spec. `meta.json` is written whatever the outcome; the
/// completion marker only on success.
pub fn run_single_with(
    source: &dyn ISpecSource,
    spec_path: &Path,
    out_dir: &Path,
    ctx: &EngineContext,
    config: &RunConfig,
) -> Result<Recommendations, RunError> {
    artifacts::ensure_dir(out_dir)?;
    let log = RunLog::create(&out_dir.join("run.log"))?;
    let started_at = artifacts::now_rfc3339();
    let clock = Instant::now();
    log.line(&format!("Spec: {}", spec_path.display()));

    let result = execute(source, spec_path, out_dir, ctx, config, &log);

    let error = match &result {
        Ok(recs) => {
            log.line(&format!(
                "Completed: {} candidates, best score {:?}",
                recs.summary.candidates_considered, recs.summary.best_score
            ));
            None
        }
        Err(e) => {
            warn!("Spec {} failed: {e}", spec_path.display());
            log.line(&format!("FAILED: {e}"));
            Some(e.to_string())
        }
    };
    let meta = RunMeta {
        spec_file: spec_path.display().to_string(),
        spec_sha256: artifacts::sha256_file(spec_path).ok(),
        status: if error.is_none() { "success" } else { "failed" }.to_string(),
        error,
        started_at,
        finished_at: artifacts::now_rfc3339(),
        elapsed_s: clock.elapsed().as_secs_f64(),
    };
    write_json(&out_dir.join("meta.json"), &meta)?;
    result
}

fn execute(
    source: &dyn ISpecSource,
    spec_path: &Path,
    out_dir: &Path,
    ctx: &EngineContext,
    config: &RunConfig,
    log: &RunLog,
) -> Result<Recommendations, RunError> {
    // 1. Normalize the datasheet
    let spec = source.read(spec_path)?;
    write_json(&out_dir.join("normalized_spec.json"), &spec)?;
    log.line(&format!(
        "Normalized spec: {} properties, {} unparsed lines",
        spec.properties.len(),
        spec.unparsed.len()
    ));

    // 2. Targets
    let targets: TargetSet = build_targets_constraints(&spec);
    if targets.is_empty() {
        warn!("No recognized target properties in {}", spec_path.display());
    }
    write_json(&out_dir.join("targets.json"), &targets)?;
    log.line(&format!("Targets: {}", targets.len()));

    // 3. Optimize
    let outcome = OptimizationLoop::new(ctx, config)
        .with_log(log)
        .run(&targets, out_dir)?;

    // 4. Rank
    let recs = Recommendations {
        summary: RecommendationSummary {
            candidates_considered: outcome.candidates.len(),
            best_score: outcome.summary.best_score,
        },
        topk: outcome.top_k(DEFAULT_TOP_K),
    };
    write_json(&out_dir.join(COMPLETION_MARKER), &recs)?;
    info!(
        "Wrote {} recommendations for {}",
        recs.topk.len(),
        spec_path.display()
    );
    Ok(recs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::test_dirs;
    use std::fs;

    fn config() -> RunConfig {
        RunConfig {
            iterations: 1,
            initial_points: 4,
            seed: Some(11),
            ..Default::default()
        }
    }

    fn read_meta(dir: &Path) -> RunMeta {
        serde_json::from_str(&fs::read_to_string(dir.join("meta.json")).unwrap()).unwrap()
    }

    #[test]
    fn test_json_spec_produces_recommendations() {
        let dir = test_dirs::unique("pipeline-ok");
        let spec = dir.join("grade.json");
        fs::write(
            &spec,
            r#"{"material_family": "PP copolymer", "properties": [
                {"name": "Melt Mass-Flow Rate (MFR)", "value": 25},
                {"name": "Heat Deflection Temperature", "value": 75},
                {"name": "Density", "value": 0.92}
            ]}"#,
        )
        .unwrap();
        let out = dir.join("out");
        let recs = run_single(&spec, &out, &EngineContext::builtin(), &config()).unwrap();

        assert!(!recs.topk.is_empty());
        assert!(recs.topk.len() <= DEFAULT_TOP_K);
        assert!(recs.summary.best_score.is_some());
        assert!(out.join(COMPLETION_MARKER).exists());
        assert!(out.join("normalized_spec.json").exists());
        assert!(out.join("targets.json").exists());
        assert!(fs::read_to_string(out.join("run.log")).unwrap().contains("Completed"));

        let meta = read_meta(&out);
        assert_eq!(meta.status, "success");
        assert!(meta.error.is_none());
        assert_eq!(meta.spec_sha256, Some(artifacts::sha256_file(&spec).unwrap()));
        fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_unsupported_spec_fails_without_marker() {
        let dir = test_dirs::unique("pipeline-pdf");
        let spec = dir.join("sheet.pdf");
        fs::write(&spec, b"%PDF-1.4").unwrap();
        let out = dir.join("out");
        let err = run_single(&spec, &out, &EngineContext::builtin(), &config()).unwrap_err();

        assert!(matches!(err, RunError::Spec(_)));
        assert!(!out.join(COMPLETION_MARKER).exists());
        let meta = read_meta(&out);
        assert_eq!(meta.status, "failed");
        assert!(meta.error.unwrap().contains("unsupported"));
        fs::remove_dir_all(dir).ok();
    }
}
