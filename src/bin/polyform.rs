// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Santhosh Shyamsundar, Prabhu S., and Studio Tyto

//! polyform: command-line front end of the formulation engine.
//!
//! ```text
//! polyform optimize --spec grade.json --out runs/grade
//! polyform batch --spec-dir specs/ --out-dir runs/ --workers 4 --resume
//! polyform doe -n 30 --focus recycled > doe.json
//! polyform predict --formulations doe.json --process process.json
//! ```

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use polyform_core::batch::{BatchExecutor, PipelineRunner};
use polyform_core::config::{BatchConfig, ProcessingLevers, RunConfig};
use polyform_core::evaluation::TargetDeviationEvaluator;
use polyform_core::optimization::{DoeConfig, DoeGenerator, Focus};
use polyform_core::orchestrator::EngineContext;
use polyform_core::physics_kernel::{ModelParameters, PhysicsConfig, PhysicsKernel};
use polyform_core::pipeline;
use polyform_core::science::compatibility::CompatibilityRules;
use polyform_core::science::materials::{IngredientCatalog, IngredientLibrary};
use polyform_core::science::sustainability::Goals;
use polyform_core::tensors::{FormulationRow, ProcessConditions};
use simplelog::{ColorChoice, Config, LevelFilter, TermLogger, TerminalMode};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "polyform", version, about = "Closed-loop polymer formulation optimizer")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Optimize formulations against one datasheet.
    Optimize {
        #[arg(long)]
        spec: PathBuf,
        #[arg(long)]
        out: PathBuf,
        #[command(flatten)]
        run: RunArgs,
        #[command(flatten)]
        engine: EngineArgs,
    },
    /// Optimize every datasheet in a directory.
    Batch {
        #[arg(long)]
        spec_dir: PathBuf,
        #[arg(long)]
        out_dir: PathBuf,
        #[arg(long, default_value_t = 4)]
        workers: usize,
        /// Skip specs that already have recommendations.
        #[arg(long)]
        resume: bool,
        #[command(flatten)]
        run: RunArgs,
        #[command(flatten)]
        engine: EngineArgs,
    },
    /// Generate an initial design of experiments.
    Doe {
        #[arg(short = 'n', long, default_value_t = 30)]
        n: usize,
        #[arg(long, default_value_t = 42)]
        seed: u64,
        #[arg(long, default_value = "none")]
        focus: Focus,
        #[arg(long)]
        elastomer_family: Option<String>,
        #[arg(long)]
        use_intune: bool,
        /// Write here instead of stdout.
        #[arg(long)]
        out: Option<PathBuf>,
        #[command(flatten)]
        engine: EngineArgs,
    },
    /// Predict properties for a JSON array of formulations.
    Predict {
        #[arg(long)]
        formulations: PathBuf,
        /// Process conditions JSON; extruder defaults when absent.
        #[arg(long)]
        process: Option<PathBuf>,
        #[arg(long)]
        out: Option<PathBuf>,
        #[command(flatten)]
        engine: EngineArgs,
    },
}

#[derive(Args)]
struct RunArgs {
    #[arg(long, default_value_t = 30)]
    iterations: usize,
    #[arg(long, default_value_t = 30)]
    initial_points: usize,
    #[arg(long, default_value_t = 0.25)]
    explore_ratio: f64,
    #[arg(long, default_value_t = 4)]
    candidates_per_iteration: usize,
    #[arg(long, default_value = "none")]
    focus: Focus,
    /// Goals as inline JSON or a path to a JSON file.
    #[arg(long)]
    goals: Option<String>,
    #[arg(long)]
    seed: Option<u64>,
    #[arg(long, default_value_t = 120)]
    eval_timeout_s: u64,
}

impl RunArgs {
    fn into_config(self) -> Result<RunConfig> {
        let goals = match self.goals {
            Some(g) => Some(parse_goals(&g)?),
            None => None,
        };
        Ok(RunConfig {
            iterations: self.iterations,
            initial_points: self.initial_points,
            explore_ratio: self.explore_ratio,
            candidates_per_iteration: self.candidates_per_iteration,
            focus: self.focus,
            goals,
            seed: self.seed,
            eval_timeout_s: self.eval_timeout_s,
        })
    }
}

#[derive(Args)]
struct EngineArgs {
    /// Ingredient library JSON (built-in library when absent).
    #[arg(long)]
    library: Option<PathBuf>,
    /// Compatibility rules JSON.
    #[arg(long)]
    rules: Option<PathBuf>,
    /// Physics model parameters JSON.
    #[arg(long)]
    model: Option<PathBuf>,
    /// Processing lever ranges JSON.
    #[arg(long)]
    levers: Option<PathBuf>,
}

impl EngineArgs {
    fn library(&self) -> Result<IngredientLibrary> {
        match &self.library {
            Some(p) => IngredientLibrary::load(p).with_context(|| format!("loading library {}", p.display())),
            None => Ok(IngredientLibrary::builtin()),
        }
    }

    fn rules(&self) -> Result<CompatibilityRules> {
        match &self.rules {
            Some(p) => CompatibilityRules::load(p).with_context(|| format!("loading rules {}", p.display())),
            None => Ok(CompatibilityRules::builtin()),
        }
    }

    fn physics(&self) -> Result<PhysicsConfig> {
        match &self.model {
            Some(p) => {
                let model = ModelParameters::load(p)?;
                Ok(PhysicsConfig::from_model(&model).with_context(|| format!("resolving model {}", p.display()))?)
            }
            None => Ok(PhysicsConfig::default()),
        }
    }

    fn context(&self) -> Result<EngineContext> {
        let levers = match &self.levers {
            Some(p) => ProcessingLevers::load(p)?,
            None => ProcessingLevers::default(),
        };
        Ok(EngineContext::new(
            self.library()?,
            self.rules()?,
            self.physics()?,
            levers,
            Arc::new(TargetDeviationEvaluator),
        ))
    }
}

fn parse_goals(arg: &str) -> Result<Goals> {
    let text = if arg.trim_start().starts_with('{') {
        arg.to_string()
    } else {
        std::fs::read_to_string(arg).with_context(|| format!("reading goals {arg}"))?
    };
    serde_json::from_str(&text).context("parsing goals")
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}

fn emit<T: serde::Serialize>(value: &T, out: Option<&Path>) -> Result<()> {
    match out {
        Some(path) => polyform_core::artifacts::write_json(path, value)?,
        None => println!("{}", serde_json::to_string_pretty(value)?),
    }
    Ok(())
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

    match Cli::parse().command {
        Command::Optimize { spec, out, run, engine } => {
            let ctx = engine.context()?;
            let recs = pipeline::run_single(&spec, &out, &ctx, &run.into_config()?)?;
            println!("{}", serde_json::to_string_pretty(&recs.summary)?);
        }
        Command::Batch {
            spec_dir,
            out_dir,
            workers,
            resume,
            run,
            engine,
        } => {
            let runner = PipelineRunner::new(Arc::new(engine.context()?), run.into_config()?);
            let summary = BatchExecutor::new(Arc::new(runner), BatchConfig { workers, resume })
                .run(&spec_dir, &out_dir)?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
            if summary.failed > 0 {
                bail!("{} of the specs failed", summary.failed);
            }
        }
        Command::Doe {
            n,
            seed,
            focus,
            elastomer_family,
            use_intune,
            out,
            engine,
        } => {
            let library = engine.library()?;
            let catalog = IngredientCatalog::from_library(&library);
            let rules = engine.rules()?;
            let rows = DoeGenerator::new(&catalog, &rules).generate(
                &library,
                &DoeConfig {
                    n,
                    seed,
                    focus,
                    elastomer_family,
                    use_intune,
                },
            );
            if rows.is_empty() {
                bail!("no formulations generated for focus '{focus}'");
            }
            emit(&rows, out.as_deref())?;
        }
        Command::Predict {
            formulations,
            process,
            out,
            engine,
        } => {
            let rows: Vec<FormulationRow> = read_json(&formulations)?;
            let process = match process {
                Some(p) => read_json::<ProcessConditions>(&p)?,
                None => ProcessConditions::default(),
            };
            let catalog = IngredientCatalog::from_library(&engine.library()?);
            let predicted = PhysicsKernel::predict_rows(&rows, &process, &engine.physics()?, &catalog);
            emit(&predicted, out.as_deref())?;
        }
    }
    Ok(())
}
