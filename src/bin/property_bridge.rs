// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Santhosh Shyamsundar, Prabhu S., and Studio Tyto

//! Property Bridge
//! Predicts a DOE JSON file into a predictions file for external tooling.
//! A `.csv` output gets one flat line per row, anything else full JSON.
//!
//! property_bridge --doe initial_doe.json [--output predictions.csv]
//!                 [--model model.json] [--library library.json] [--process process.json]

use anyhow::{bail, Context, Result};
use instant::Instant;
use polyform_core::artifacts::write_json;
use polyform_core::physics_kernel::{ModelParameters, PhysicsConfig, PhysicsKernel, PredictedRow};
use polyform_core::science::materials::{IngredientCatalog, IngredientLibrary};
use polyform_core::tensors::{FormulationRow, ProcessConditions};
use serde::Serialize;
use serde_json::json;
use std::env;
use simplelog::{ColorChoice, Config, LevelFilter, TermLogger, TerminalMode};
use std::path::Path;

// --- Output Record (CSV) ---
#[derive(Serialize)]
struct BridgeOutput<'a> {
    base_a: &'a str,
    base_a_wtpct: f64,
    base_b: &'a str,
    base_b_wtpct: f64,
    elastomer: &'a str,
    elastomer_wtpct: f64,
    filler: &'a str,
    filler_wtpct: f64,
    talc_wtpct: f64,
    compat_wtpct: f64,
    stabilizer_wtpct: f64,
    e_gpa: Option<f64>,
    mfi_g10min: Option<f64>,
    sigma_y_mpa: Option<f64>,
    izod_23_kjm2: Option<f64>,
    izod_m20_kjm2: Option<f64>,
    hdt_c: Option<f64>,
    rho_gcc: Option<f64>,
    xc: Option<f64>,
    error: Option<&'a str>,
}

impl<'a> From<&'a PredictedRow> for BridgeOutput<'a> {
    fn from(r: &'a PredictedRow) -> Self {
        let p = r.prediction.as_ref();
        BridgeOutput {
            base_a: r.row.base_a.name().unwrap_or(""),
            base_a_wtpct: r.row.base_a.wt_pct,
            base_b: r.row.base_b.name().unwrap_or(""),
            base_b_wtpct: r.row.base_b.wt_pct,
            elastomer: r.row.elastomer.name().unwrap_or(""),
            elastomer_wtpct: r.row.elastomer.wt_pct,
            filler: r.row.filler.name().unwrap_or(""),
            filler_wtpct: r.row.filler.wt_pct,
            talc_wtpct: r.row.talc.wt_pct,
            compat_wtpct: r.row.compatibilizer.wt_pct,
            stabilizer_wtpct: r.row.stabilizer.wt_pct,
            e_gpa: p.map(|p| p.e_gpa),
            mfi_g10min: p.map(|p| p.mfi_g10min),
            sigma_y_mpa: p.map(|p| p.sigma_y_mpa),
            izod_23_kjm2: p.map(|p| p.izod_23_kjm2),
            izod_m20_kjm2: p.map(|p| p.izod_m20_kjm2),
            hdt_c: p.map(|p| p.hdt_c),
            rho_gcc: p.map(|p| p.rho_gcc),
            xc: p.map(|p| p.xc),
            error: r.error.as_deref(),
        }
    }
}

fn write_csv(path: &str, rows: &[PredictedRow]) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path).with_context(|| format!("opening {path}"))?;
    for r in rows {
        wtr.serialize(BridgeOutput::from(r))?;
    }
    wtr.flush()?;
    Ok(())
}

fn read_json<T: serde::de::DeserializeOwned>(path: &str) -> Result<T> {
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {path}"))?;
    serde_json::from_str(&text).with_context(|| format!("parsing {path}"))
}

fn init_logging() {
    let level = std::env::var("RUST_LOG")
        .ok()
        .and_then(|v| v.parse::<LevelFilter>().ok())
        .unwrap_or(LevelFilter::Info);
    let _ = TermLogger::init(level, Config::default(), TerminalMode::Stderr, ColorChoice::Auto);
}

fn main() -> Result<()> {
    init_logging();

    let args: Vec<String> = env::args().collect();
    let mut doe_path = "";
    let mut output_path = "predictions.csv";
    let mut model_path: Option<&str> = None;
    let mut library_path: Option<&str> = None;
    let mut process_path: Option<&str> = None;

    let mut i = 1;
    while i < args.len() {
        let value = args.get(i + 1).map(String::as_str);
        match (args[i].as_str(), value) {
            ("--doe", Some(v)) => doe_path = v,
            ("--output", Some(v)) => output_path = v,
            ("--model", Some(v)) => model_path = Some(v),
            ("--library", Some(v)) => library_path = Some(v),
            ("--process", Some(v)) => process_path = Some(v),
            (flag, _) => {
                eprintln!("ignoring argument {flag}");
                i += 1;
                continue;
            }
        }
        i += 2;
    }

    if doe_path.is_empty() {
        println!("{}", json!({"error": "No DOE file"}));
        bail!("--doe is required");
    }

    let rows: Vec<FormulationRow> = read_json(doe_path)?;
    let process = match process_path {
        Some(p) => read_json::<ProcessConditions>(p)?,
        None => ProcessConditions::default(),
    };
    let library = match library_path {
        Some(p) => IngredientLibrary::load(Path::new(p))?,
        None => IngredientLibrary::builtin(),
    };
    let catalog = IngredientCatalog::from_library(&library);
    let cfg = match model_path {
        Some(p) => PhysicsConfig::from_model(&ModelParameters::load(Path::new(p))?)?,
        None => PhysicsConfig::default(),
    };

    let start = Instant::now();
    let predicted = PhysicsKernel::predict_rows(&rows, &process, &cfg, &catalog);
    let elapsed_ns = start.elapsed().as_nanos();

    if !predicted.is_empty() {
        let avg_ns = elapsed_ns as f64 / predicted.len() as f64;
        println!("KERNEL_LATENCY_NS:{avg_ns:.4}");
    }
    let failed = predicted.iter().filter(|r| r.prediction.is_none()).count();

    if output_path.to_lowercase().ends_with(".csv") {
        write_csv(output_path, &predicted)?;
    } else {
        write_json(Path::new(output_path), &predicted)?;
    }
    println!(
        "Bridge export complete: {output_path} ({} rows, {failed} without predictions)",
        predicted.len()
    );
    Ok(())
}
