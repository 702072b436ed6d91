// SPDX-FileCopyrightText: 2026 Santhosh Shyamsundar, Prabhu S., and Studio Tyto
// SPDX-License-Identifier: MIT
//! Batch Executor
//!
//! Runs one pipeline per spec file on a bounded pool of worker threads.
//! Each spec writes into `<out>/.tmp_<pid>/<name>` and is promoted to
//! `<out>/<name>` only when it succeeds, so a final directory is either
//! complete or absent. Failed runs move to `<out>/failed/<name>_<pid>`.
//!
//! Specs run as threads of this process, not as child processes. A panic
//! is caught per spec, but an abort or stack overflow ends the whole
//! batch. Evaluator threads abandoned after a timeout keep running until
//! their evaluator returns.

use crate::config::{BatchConfig, RunConfig};
use crate::error::{BatchError, RunError};
use crate::orchestrator::EngineContext;
use crate::pipeline::{self, COMPLETION_MARKER};
use log::{error, info, warn};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{mpsc, Arc, Mutex};
use walkdir::WalkDir;

const SPEC_EXTENSIONS: [&str; 3] = ["csv", "json", "pdf"];

/// Runs a single spec into an output directory.
pub trait ISpecRunner: Send + Sync {
    fn run(&self, spec: &Path, out_dir: &Path) -> Result<(), RunError>;
}

/// The full optimization pipeline.
pub struct PipelineRunner {
    ctx: Arc<EngineContext>,
    config: RunConfig,
}

impl PipelineRunner {
    pub fn new(ctx: Arc<EngineContext>, config: RunConfig) -> Self {
        PipelineRunner { ctx, config }
    }
}

impl ISpecRunner for PipelineRunner {
    fn run(&self, spec: &Path, out_dir: &Path) -> Result<(), RunError> {
        pipeline::run_single(spec, out_dir, &self.ctx, &self.config).map(|_| ())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub processed: usize,
    pub skipped: usize,
    pub failed: usize,
}

struct Job {
    spec: PathBuf,
    name: String,
}

/// Spec files directly inside `dir`, sorted by file name.
pub fn discover_specs(dir: &Path) -> Result<Vec<PathBuf>, BatchError> {
    let mut specs = Vec::new();
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|source| BatchError::Walk {
            path: dir.to_path_buf(),
            source,
        })?;
        if !entry.file_type().is_file() || entry.file_name().to_string_lossy().starts_with('.') {
            continue;
        }
        let ext = entry
            .path()
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        if SPEC_EXTENSIONS.contains(&ext.as_str()) {
            specs.push(entry.into_path());
        }
    }
    Ok(specs)
}

/// `spec.csv` -> `spec_csv`.
pub fn output_name(spec: &Path) -> String {
    spec.file_name()
        .map(|n| n.to_string_lossy().replace('.', "_"))
        .unwrap_or_else(|| "spec".to_string())
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> BatchError + '_ {
    move |source| BatchError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn copy_tree(src: &Path, dst: &Path) -> Result<(), BatchError> {
    for entry in WalkDir::new(src) {
        let entry = entry.map_err(|source| BatchError::Walk {
            path: src.to_path_buf(),
            source,
        })?;
        let rel = entry.path().strip_prefix(src).unwrap_or(entry.path());
        let target = dst.join(rel);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target).map_err(io_err(&target))?;
        } else {
            fs::copy(entry.path(), &target).map_err(io_err(&target))?;
        }
    }
    Ok(())
}

/// Replaces `final_dir` with `tmp_dir`. Falls back to copy + rename when a
/// plain rename is not possible.
pub fn promote(tmp_dir: &Path, final_dir: &Path) -> Result<(), BatchError> {
    if final_dir.exists() {
        fs::remove_dir_all(final_dir).map_err(io_err(final_dir))?;
    }
    if fs::rename(tmp_dir, final_dir).is_ok() {
        return Ok(());
    }

    let mut partial = final_dir.as_os_str().to_owned();
    partial.push(".partial");
    let partial = PathBuf::from(partial);
    if partial.exists() {
        fs::remove_dir_all(&partial).map_err(io_err(&partial))?;
    }
    let copied = copy_tree(tmp_dir, &partial)
        .and_then(|_| fs::rename(&partial, final_dir).map_err(io_err(final_dir)));
    if let Err(e) = copied {
        fs::remove_dir_all(&partial).ok();
        return Err(e);
    }
    fs::remove_dir_all(tmp_dir).ok();
    Ok(())
}

pub struct BatchExecutor {
    runner: Arc<dyn ISpecRunner>,
    config: BatchConfig,
}

impl BatchExecutor {
    pub fn new(runner: Arc<dyn ISpecRunner>, config: BatchConfig) -> Self {
        BatchExecutor { runner, config }
    }

    pub fn run(&self, spec_dir: &Path, out_dir: &Path) -> Result<BatchSummary, BatchError> {
        let specs = discover_specs(spec_dir)?;
        fs::create_dir_all(out_dir).map_err(io_err(out_dir))?;
        let mut summary = BatchSummary::default();

        // 1. Resume filter
        let mut jobs = Vec::new();
        for spec in specs {
            let name = output_name(&spec);
            if self.config.resume && out_dir.join(&name).join(COMPLETION_MARKER).exists() {
                info!("Skipping {} (already complete)", spec.display());
                summary.skipped += 1;
                continue;
            }
            jobs.push(Job { spec, name });
        }
        if jobs.is_empty() {
            info!("Batch: nothing to do ({} skipped)", summary.skipped);
            return Ok(summary);
        }

        let pid = std::process::id();
        let tmp_root = out_dir.join(format!(".tmp_{pid}"));
        fs::create_dir_all(&tmp_root).map_err(io_err(&tmp_root))?;

        // 2. Workers
        let n_jobs = jobs.len();
        let n_workers = self.config.workers.clamp(1, n_jobs);
        info!("Batch: {n_jobs} specs on {n_workers} workers");
        let (job_tx, job_rx) = mpsc::channel::<Job>();
        let job_rx = Arc::new(Mutex::new(job_rx));
        let (result_tx, result_rx) = mpsc::channel::<(Job, Result<(), String>)>();

        let mut handles = Vec::with_capacity(n_workers);
        for i in 0..n_workers {
            let rx = Arc::clone(&job_rx);
            let tx = result_tx.clone();
            let runner = Arc::clone(&self.runner);
            let tmp_root = tmp_root.clone();
            let spawned = std::thread::Builder::new()
                .name(format!("spec-worker-{i}"))
                .spawn(move || loop {
                    let job = match rx.lock() {
                        Ok(guard) => match guard.recv() {
                            Ok(job) => job,
                            Err(_) => break,
                        },
                        Err(_) => break,
                    };
                    let work_dir = tmp_root.join(&job.name);
                    let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                        runner.run(&job.spec, &work_dir)
                    }));
                    let result = match outcome {
                        Ok(Ok(())) => Ok(()),
                        Ok(Err(e)) => Err(e.to_string()),
                        Err(_) => Err("worker panicked".to_string()),
                    };
                    if tx.send((job, result)).is_err() {
                        break;
                    }
                });
            match spawned {
                Ok(h) => handles.push(h),
                Err(e) => error!("Could not start spec-worker-{i}: {e}"),
            }
        }
        drop(result_tx);

        for job in jobs {
            if let Err(mpsc::SendError(job)) = job_tx.send(job) {
                error!("No worker available for {}", job.spec.display());
            }
        }
        drop(job_tx);

        // 3. Promote or quarantine as results arrive
        let mut received = 0;
        for (job, result) in result_rx {
            received += 1;
            let work_dir = tmp_root.join(&job.name);
            match result {
                Ok(()) => match promote(&work_dir, &out_dir.join(&job.name)) {
                    Ok(()) => {
                        info!("Completed {}", job.spec.display());
                        summary.processed += 1;
                    }
                    Err(e) => {
                        error!("Could not promote {}: {e}", job.spec.display());
                        self.quarantine(out_dir, &work_dir, &job.name, pid);
                        summary.failed += 1;
                    }
                },
                Err(e) => {
                    error!("Spec {} failed: {e}", job.spec.display());
                    self.quarantine(out_dir, &work_dir, &job.name, pid);
                    summary.failed += 1;
                }
            }
        }
        for h in handles {
            h.join().ok();
        }
        summary.failed += n_jobs - received;

        // Only succeeds when empty.
        fs::remove_dir(&tmp_root).ok();
        info!(
            "Batch complete: {} processed, {} skipped, {} failed",
            summary.processed, summary.skipped, summary.failed
        );
        Ok(summary)
    }

    fn quarantine(&self, out_dir: &Path, work_dir: &Path, name: &str, pid: u32) {
        if !work_dir.exists() {
            return;
        }
        let failed_root = out_dir.join("failed");
        let dest = failed_root.join(format!("{name}_{pid}"));
        let moved = fs::create_dir_all(&failed_root).and_then(|_| {
            if dest.exists() {
                fs::remove_dir_all(&dest)?;
            }
            fs::rename(work_dir, &dest)
        });
        if let Err(e) = moved {
            warn!("Left failed output of {name} at {}: {e}", work_dir.display());
        }
    }
}
