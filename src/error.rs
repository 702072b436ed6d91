// SPDX-FileCopyrightText: 2026 Santhosh Shyamsundar, Prabhu S., and Studio Tyto
// SPDX-License-Identifier: MIT
//! Error taxonomy for the formulation engine.
//!
//! One enum per concern. Library code returns these and propagates with `?`;
//! only the binaries collapse them into `anyhow::Error`.

use std::path::PathBuf;
use thiserror::Error;

/// Loading the ingredient library, compatibility rules or lever files.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Per-row failures of the forward model. Never fatal for a run.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PredictionError {
    #[error("model parameter `{0}` is missing")]
    MissingParameter(String),
    #[error("`{quantity}` evaluated to a non-finite value ({value})")]
    NonFinite { quantity: &'static str, value: f64 },
    #[error("`{quantity}` is outside its domain: {detail}")]
    Domain {
        quantity: &'static str,
        detail: String,
    },
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum OptimizerError {
    #[error("search space has no dimensions")]
    EmptySpace,
    #[error("point has {got} coordinates, search space has {expected}")]
    DimensionMismatch { expected: usize, got: usize },
    #[error("tell() received {points} points but {values} objective values")]
    LengthMismatch { points: usize, values: usize },
    #[error("non-finite objective or coordinate in observation {index}")]
    NonFinite { index: usize },
}

#[derive(Debug, Error)]
pub enum EvaluationError {
    #[error("evaluator did not answer within {0:?}")]
    Timeout(std::time::Duration),
    #[error("malformed evaluator response: {0}")]
    Malformed(String),
    #[error("evaluator failed: {0}")]
    Collaborator(String),
    #[error("evaluator worker disconnected")]
    Disconnected,
}

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("i/o error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serialize {path}: {source}")]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl ArtifactError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ArtifactError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Spec ingestion failures.
#[derive(Debug, Error)]
pub enum SpecError {
    #[error("failed to read spec {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse spec {path}: {detail}")]
    Parse { path: PathBuf, detail: String },
    #[error("unsupported spec format: {0}")]
    Unsupported(String),
}

/// Errors that abort a single optimization run.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("No valid initial points found within the defined search space.")]
    NoValidWarmStart,
    #[error("search space is empty")]
    EmptySearchSpace,
    #[error("candidate generator produced no formulations")]
    NoCandidates,
    #[error(transparent)]
    Spec(#[from] SpecError),
    #[error(transparent)]
    Artifact(#[from] ArtifactError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Optimizer(#[from] OptimizerError),
    #[error(transparent)]
    Prediction(#[from] PredictionError),
}

#[derive(Debug, Error)]
pub enum BatchError {
    #[error("i/o error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to scan {path}: {source}")]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },
}
