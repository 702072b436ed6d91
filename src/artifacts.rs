// SPDX-FileCopyrightText: 2026 Santhosh Shyamsundar, Prabhu S., and Studio Tyto
// SPDX-License-Identifier: MIT
//! Run Artifacts
//!
//! Everything a run leaves on disk goes through here: run identifiers,
//! content hashes, atomic JSON writes, the per-run log and the candidate
//! directory layout.
//!
//! ```text
//! <root>/formulations/initial_doe_<run>.json
//! <root>/formulations/doe_run_metadata.json
//! <root>/compounded/run_<run>_iter_<ii>_cand_<jj>/{formulation,process,prediction,evaluation}.json
//! <root>/failed_evaluations/<run>/<candidate>/
//! <root>/summaries/summary_<run>.json
//! ```

use crate::error::ArtifactError;
use crate::orchestrator::Candidate;
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Timestamp identifier, e.g. `20261017_142501_337`.
pub fn new_run_id() -> String {
    Utc::now().format("%Y%m%d_%H%M%S_%3f").to_string()
}

/// Reproducible seed from the digits of a run id.
pub fn seed_from_run_id(run_id: &str) -> u64 {
    let digits: String = run_id.chars().filter(char::is_ascii_digit).take(19).collect();
    digits.parse::<u64>().unwrap_or(0) % (u32::MAX as u64)
}

pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

pub fn sha256_file(path: &Path) -> Result<String, ArtifactError> {
    let bytes = fs::read(path).map_err(|e| ArtifactError::io(path, e))?;
    Ok(sha256_hex(&bytes))
}

/// Content hash of any serializable value (its compact JSON).
pub fn fingerprint<T: Serialize>(value: &T) -> String {
    match serde_json::to_vec(value) {
        Ok(bytes) => sha256_hex(&bytes),
        Err(_) => "unhashable".to_string(),
    }
}

pub fn ensure_dir(path: &Path) -> Result<(), ArtifactError> {
    fs::create_dir_all(path).map_err(|e| ArtifactError::io(path, e))
}

/// Pretty JSON written to `<path>.tmp` and renamed into place.
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), ArtifactError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        ensure_dir(parent)?;
    }
    let bytes = serde_json::to_vec_pretty(value).map_err(|source| ArtifactError::Serialize {
        path: path.to_path_buf(),
        source,
    })?;
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    fs::write(&tmp, bytes).map_err(|e| ArtifactError::io(&tmp, e))?;
    fs::rename(&tmp, path).map_err(|e| {
        fs::remove_file(&tmp).ok();
        ArtifactError::io(path, e)
    })
}

/// Append-only, timestamped log inside a run directory.
pub struct RunLog {
    path: PathBuf,
    file: Mutex<File>,
}

impl RunLog {
    pub fn create(path: &Path) -> Result<Self, ArtifactError> {
        if let Some(parent) = path.parent() {
            ensure_dir(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| ArtifactError::io(path, e))?;
        Ok(RunLog {
            path: path.to_path_buf(),
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Best effort; a failed log write never fails the run.
    pub fn line(&self, message: &str) {
        if let Ok(mut f) = self.file.lock() {
            writeln!(f, "[{}] {message}", now_rfc3339()).ok();
        }
    }
}

/// Per-candidate artifact files.
#[derive(Serialize)]
struct EvaluationRecord<'a> {
    candidate: &'a str,
    fingerprint: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    prediction_error: Option<&'a str>,
    score: &'a crate::evaluation::Score,
}

/// Directory layout of one run.
pub struct ArtifactStore {
    root: PathBuf,
    run_id: String,
}

impl ArtifactStore {
    pub fn new(root: &Path, run_id: &str) -> Self {
        ArtifactStore {
            root: root.to_path_buf(),
            run_id: run_id.to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn formulations_dir(&self) -> PathBuf {
        self.root.join("formulations")
    }

    pub fn compounded_dir(&self) -> PathBuf {
        self.root.join("compounded")
    }

    pub fn summaries_dir(&self) -> PathBuf {
        self.root.join("summaries")
    }

    pub fn candidate_dir(&self, candidate_id: &str) -> PathBuf {
        self.compounded_dir()
            .join(format!("run_{}_{candidate_id}", self.run_id))
    }

    pub fn write_doe<T: Serialize + ?Sized>(&self, rows: &T, metadata: &serde_json::Value) -> Result<PathBuf, ArtifactError> {
        let path = self
            .formulations_dir()
            .join(format!("initial_doe_{}.json", self.run_id));
        write_json(&path, rows)?;
        write_json(&self.formulations_dir().join("doe_run_metadata.json"), metadata)?;
        Ok(path)
    }

    pub fn write_initial_evaluations(&self, candidates: &[Candidate]) -> Result<PathBuf, ArtifactError> {
        let path = self
            .compounded_dir()
            .join(format!("initial_evaluated_{}.json", self.run_id));
        write_json(&path, candidates)?;
        Ok(path)
    }

    /// Writes the four candidate files and returns the directory.
    pub fn write_candidate(&self, candidate: &Candidate) -> Result<PathBuf, ArtifactError> {
        let dir = self.candidate_dir(&candidate.id);
        ensure_dir(&dir)?;
        write_json(&dir.join("formulation.json"), &candidate.formulation)?;
        write_json(&dir.join("process.json"), &candidate.process)?;
        write_json(&dir.join("prediction.json"), &candidate.prediction)?;
        write_json(
            &dir.join("evaluation.json"),
            &EvaluationRecord {
                candidate: &candidate.id,
                fingerprint: &candidate.fingerprint,
                prediction_error: candidate.prediction_error.as_deref(),
                score: &candidate.score,
            },
        )?;
        Ok(dir)
    }

    /// Moves a candidate directory to `failed_evaluations/<run>/` with the
    /// failure record (raw evaluator answer and error) as `payload.json`.
    pub fn quarantine<T: Serialize + ?Sized>(&self, candidate_dir: &Path, payload: &T) -> Result<PathBuf, ArtifactError> {
        write_json(&candidate_dir.join("payload.json"), payload)?;
        let failed_root = self.root.join("failed_evaluations").join(&self.run_id);
        ensure_dir(&failed_root)?;
        let name = candidate_dir
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "candidate".into());
        let dest = failed_root.join(name);
        fs::rename(candidate_dir, &dest).map_err(|e| ArtifactError::io(&dest, e))?;
        Ok(dest)
    }

    pub fn write_summary<T: Serialize + ?Sized>(&self, summary: &T) -> Result<PathBuf, ArtifactError> {
        let path = self
            .summaries_dir()
            .join(format!("summary_{}.json", self.run_id));
        write_json(&path, summary)?;
        Ok(path)
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_json_is_atomic() {
        let dir = test_dirs::unique("atomic");
        let path = dir.join("nested").join("out.json");
        write_json(&path, &serde_json::json!({"a": 1})).unwrap();
        let back: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(back["a"], 1);
        assert!(!dir.join("nested").join("out.json.tmp").exists());
        fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_hashes_and_seed() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(seed_from_run_id("20261017_142501_337"), 20261017142501337 % (u32::MAX as u64));
        assert_eq!(seed_from_run_id("x"), 0);
        assert_eq!(fingerprint(&[1, 2]), fingerprint(&[1, 2]));
        assert_ne!(fingerprint(&[1, 2]), fingerprint(&[2, 1]));
    }

    #[test]
    fn test_run_log_appends_lines() {
        let dir = test_dirs::unique("runlog");
        let log = RunLog::create(&dir.join("run.log")).unwrap();
        log.line("first");
        log.line("second");
        let text = fs::read_to_string(log.path()).unwrap();
        assert_eq!(text.lines().count(), 2);
        assert!(text.lines().nth(1).unwrap().ends_with("] second"));
        fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_quarantine_moves_directory() {
        let root = test_dirs::unique("quarantine");
        let store = ArtifactStore::new(&root, "r1");
        let dir = store.candidate_dir("iter_01_cand_01");
        ensure_dir(&dir).unwrap();
        write_json(&dir.join("formulation.json"), &serde_json::json!({})).unwrap();
        let failure = serde_json::json!({
            "error": "malformed evaluator response: composite_weight = 7 is outside [0, 1]",
            "raw_response": {"composite_weight": 7.0},
        });
        let dest = store.quarantine(&dir, &failure).unwrap();
        assert!(!dir.exists());
        assert!(dest.join("formulation.json").exists());
        let saved: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(dest.join("payload.json")).unwrap()).unwrap();
        assert_eq!(saved["raw_response"]["composite_weight"], 7.0);
        assert!(saved["error"].as_str().unwrap().contains("malformed"));
        assert!(dest.starts_with(root.join("failed_evaluations").join("r1")));
        fs::remove_dir_all(root).ok();
    }
}
