// SPDX-FileCopyrightText: 2026 Santhosh Shyamsundar, Prabhu S., and Studio Tyto
// SPDX-License-Identifier: MIT

//! Design-of-Experiments Candidate Generator
//!
//! Samples random, compatibility-screened recipes from (goal-filtered)
//! ingredient pools. For every eligible elastomer and filler set it draws
//! up to `n` accepted recipes within a budget of `20·n` attempts.

use crate::science::compatibility::{evaluate_formulation, CompatEntry, CompatibilityRules};
use crate::science::cost::{round_to, CostEngine};
use crate::science::materials::{Ingredient, IngredientCatalog, IngredientLibrary};
use crate::tensors::{Component, FormulationRow};
use log::{debug, warn};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const DEFAULT_ELASTOMER_RANGE: [f64; 2] = [8.0, 18.0];
const DEFAULT_FILLER_RANGE: [f64; 2] = [0.0, 15.0];
const NUCLEATOR_PPM: f64 = 800.0;

/// Which slice of the library a run concentrates on.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Focus {
    #[default]
    None,
    Recycled,
    BioBased,
    Biopolyester,
}

impl Focus {
    pub fn as_str(self) -> &'static str {
        match self {
            Focus::None => "none",
            Focus::Recycled => "recycled",
            Focus::BioBased => "bio-based",
            Focus::Biopolyester => "biopolyester",
        }
    }

    pub fn is_bio(self) -> bool {
        matches!(self, Focus::BioBased | Focus::Biopolyester)
    }
}

impl fmt::Display for Focus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Focus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Focus::None),
            "recycled" => Ok(Focus::Recycled),
            "bio-based" => Ok(Focus::BioBased),
            "biopolyester" => Ok(Focus::Biopolyester),
            other => Err(format!(
                "unknown focus `{other}` (expected none, recycled, bio-based or biopolyester)"
            )),
        }
    }
}

#[derive(Clone, Debug)]
pub struct DoeConfig {
    /// Accepted recipes requested per (elastomer, filler set).
    pub n: usize,
    pub seed: u64,
    pub focus: Focus,
    pub elastomer_family: Option<String>,
    pub use_intune: bool,
}

impl Default for DoeConfig {
    fn default() -> Self {
        Self {
            n: 30,
            seed: 42,
            focus: Focus::None,
            elastomer_family: None,
            use_intune: false,
        }
    }
}

/// Pools after focus filtering.
#[derive(Clone, Debug, Default)]
struct Pools {
    bases: Vec<Ingredient>,
    elastomers: Vec<Ingredient>,
    compat: Vec<Ingredient>,
    all_minerals: Vec<Ingredient>,
    minerals: Vec<Ingredient>,
    fibers: Vec<Ingredient>,
    bio_extenders: Vec<Ingredient>,
    bio_fillers: Vec<Ingredient>,
    stabilizers: Vec<Ingredient>,
    nucleators: Vec<Ingredient>,
}

fn kind_in(item: &Ingredient, kinds: &[&str]) -> bool {
    kinds.contains(&item.kind())
}

impl Pools {
    fn focused(lib: &IngredientLibrary, focus: Focus) -> Self {
        let mut p = Pools {
            bases: lib.base_resins.clone(),
            elastomers: lib.elastomers.clone(),
            compat: lib.compatibilizers.clone(),
            all_minerals: lib.mineral_fillers.clone(),
            minerals: lib.mineral_fillers.clone(),
            fibers: lib.fibrous_fillers.clone(),
            bio_extenders: lib.bio_extenders.clone(),
            bio_fillers: lib.bio_fillers.clone(),
            stabilizers: lib.stabilizers.clone(),
            nucleators: lib.nucleators.clone(),
        };
        match focus {
            Focus::None => {}
            Focus::Recycled => {
                p.bases.retain(|b| {
                    b.kind().to_lowercase().contains("rpp") || b.name.to_lowercase().contains("rpp")
                });
                if p.bases.is_empty() {
                    warn!("No 'recycled' base resins found for focus=recycled. Check library.");
                }
            }
            Focus::BioBased => {
                p.bases.retain(Ingredient::is_bio);
                p.minerals.retain(Ingredient::is_bio);
                p.fibers.retain(Ingredient::is_bio);
                p.bio_extenders.retain(Ingredient::is_bio);
                p.bio_fillers.retain(Ingredient::is_bio);
                if p.bases.is_empty() {
                    warn!("No 'bio-based' base resins found for focus=bio-based. Check library.");
                }
            }
            Focus::Biopolyester => {
                p.bases.retain(|b| kind_in(b, &["PLA", "PHA", "PHB"]));
                p.elastomers.retain(|e| kind_in(e, &["PBAT"]));
                p.minerals.retain(|m| kind_in(m, &["Talc", "CaCO3"]));
                p.fibers.retain(|f| kind_in(f, &["BioFiber"]));
                p.bio_fillers.retain(|b| kind_in(b, &["Biochar", "Cellulose"]));
                if p.bases.is_empty() {
                    warn!("No PLA/PHA/PHB base resins found for focus=biopolyester.");
                }
                if p.elastomers.is_empty() {
                    warn!("No PBAT elastomer found for focus=biopolyester.");
                }
            }
        }
        p
    }

    fn chosen_elastomers(&self, family: Option<&str>) -> Vec<Ingredient> {
        let Some(fam) = family.filter(|f| !f.is_empty()) else {
            return self.elastomers.clone();
        };
        let matched: Vec<Ingredient> = self
            .elastomers
            .iter()
            .filter(|e| {
                e.name.to_lowercase().contains(&fam.to_lowercase())
                    || e.kind().contains(&fam.to_uppercase())
            })
            .cloned()
            .collect();
        if matched.is_empty() {
            self.elastomers.clone()
        } else {
            matched
        }
    }

    /// Labeled filler pools. A filler-less set is used when none exist.
    fn filler_sets(&self, focus: Focus) -> Vec<(&'static str, Vec<Ingredient>)> {
        let mut sets = Vec::new();
        if focus.is_bio() {
            let pool: Vec<Ingredient> = self
                .fibers
                .iter()
                .chain(&self.bio_extenders)
                .chain(&self.bio_fillers)
                .chain(&self.minerals)
                .cloned()
                .collect();
            if !pool.is_empty() {
                sets.push(("BioBased", pool));
            }
        } else {
            if !self.minerals.is_empty() {
                sets.push(("Mineral", self.minerals.clone()));
            }
            if !self.fibers.is_empty() {
                sets.push(("Fiber", self.fibers.clone()));
            }
        }
        if sets.is_empty() {
            sets.push(("", Vec::new()));
        }
        sets
    }
}

fn uniform(rng: &mut StdRng, lo: f64, hi: f64) -> f64 {
    if hi > lo {
        rng.gen_range(lo..hi)
    } else {
        lo
    }
}

pub struct DoeGenerator<'a> {
    catalog: &'a IngredientCatalog,
    rules: &'a CompatibilityRules,
}

impl<'a> DoeGenerator<'a> {
    pub fn new(catalog: &'a IngredientCatalog, rules: &'a CompatibilityRules) -> Self {
        Self { catalog, rules }
    }

    /// Generates screened recipes. Every returned row sums to 100 wt%.
    pub fn generate(&self, library: &IngredientLibrary, config: &DoeConfig) -> Vec<FormulationRow> {
        let focus = config.focus;
        let pools = Pools::focused(library, focus);
        let elastomers = pools.chosen_elastomers(config.elastomer_family.as_deref());
        let filler_sets = pools.filler_sets(focus);
        let mut rng = StdRng::seed_from_u64(config.seed);
        let mut rows = Vec::new();

        for elastomer in &elastomers {
            for (label, filler_pool) in &filler_sets {
                let compatible_bases: Vec<&Ingredient> = match elastomer.kind.as_deref() {
                    Some(t) if !t.is_empty() => pools
                        .bases
                        .iter()
                        .filter(|b| b.compatibility.elastomer_types.iter().any(|e| e == t))
                        .collect(),
                    _ => pools.bases.iter().collect(),
                };
                if compatible_bases.is_empty() {
                    warn!(
                        "No compatible base resins found for elastomer '{}' in the current pool (focus='{}'). Skipping this elastomer.",
                        elastomer.name, focus
                    );
                    continue;
                }

                let max_attempts = config.n * 20;
                let mut generated = 0;
                let mut attempts = 0;
                while generated < config.n && attempts < max_attempts {
                    attempts += 1;
                    if let Some(row) = self.attempt(
                        &mut rng,
                        &pools,
                        elastomer,
                        label,
                        filler_pool,
                        &compatible_bases,
                        config,
                    ) {
                        generated += 1;
                        rows.push(row);
                    }
                }
                if generated < config.n {
                    warn!(
                        "Reached max attempts ({max_attempts}) for elastomer '{}' and filler '{label}'. Generated {generated}/{} candidates.",
                        elastomer.name, config.n
                    );
                }
            }
        }
        rows
    }

    #[allow(clippy::too_many_arguments)]
    fn attempt(
        &self,
        rng: &mut StdRng,
        pools: &Pools,
        elastomer: &Ingredient,
        label: &str,
        filler_pool: &[Ingredient],
        bases: &[&Ingredient],
        config: &DoeConfig,
    ) -> Option<FormulationRow> {
        // 1. Base pair, distinct when possible
        let base_a = *bases.choose(rng)?;
        let mut base_b = *bases.choose(rng)?;
        if base_b.name == base_a.name && bases.len() > 1 {
            let others: Vec<&Ingredient> = bases
                .iter()
                .copied()
                .filter(|b| b.name != base_a.name)
                .collect();
            base_b = others.choose(rng).copied().unwrap_or(base_b);
        }

        // 2. Elastomer and filler within their declared ranges
        let [e_lo, e_hi] = elastomer.range_wt_pct.unwrap_or(DEFAULT_ELASTOMER_RANGE);
        let mut elast_wt = uniform(rng, e_lo, e_hi);
        let filler = filler_pool.choose(rng);
        let filler_wt = match filler {
            Some(f) => {
                let [lo, hi] = f.range_wt_pct.unwrap_or(DEFAULT_FILLER_RANGE);
                uniform(rng, lo, hi)
            }
            None => 0.0,
        };

        // 3. A little talc alongside bio fillers
        let mut talc: Option<&Ingredient> = None;
        let mut talc_wt = 0.0;
        if label == "BioBased" {
            talc = pools.all_minerals.iter().find(|m| m.name.contains("Talc"));
            if talc.is_some() {
                talc_wt = uniform(rng, 0.0, 8.0);
            }
        }

        // 4. Compatibilizer family follows the focus
        let comp_key = if config.focus.is_bio() { "PLA-g-MAH" } else { "PP-g-MAH" };
        let comp = pools.compat.iter().find(|c| c.name.contains(comp_key));
        let comp_wt = match comp {
            Some(_) if label == "BioBased" => uniform(rng, 1.5, 3.0),
            Some(_) => uniform(rng, 0.5, 2.0),
            None => 0.0,
        };

        let intune = pools.compat.iter().find(|c| c.name.contains("INTUNE"));
        let mut intune_wt = 0.0;
        if config.use_intune && intune.is_some() {
            intune_wt = uniform(rng, 0.0, 3.0);
            elast_wt *= uniform(rng, 0.85, 0.95);
        }

        let stab = pools.stabilizers.first();
        let stab_wt = if stab.is_some() { uniform(rng, 0.2, 0.5) } else { 0.0 };

        let nuc = pools
            .nucleators
            .iter()
            .find(|n| n.name.contains("HPN") || n.name.contains("Hyperform"));

        // 5. Bases take the remainder of the rounded additives
        let elast_wt = round_to(elast_wt, 2);
        let filler_wt = round_to(filler_wt, 2);
        let talc_wt = round_to(talc_wt, 2);
        let comp_wt = round_to(comp_wt, 2);
        let intune_wt = round_to(intune_wt, 2);
        let stab_wt = round_to(stab_wt, 2);
        let non_base = elast_wt + filler_wt + talc_wt + comp_wt + intune_wt + stab_wt;
        if non_base > 100.0 {
            return None;
        }
        let remaining = 100.0 - non_base;
        let base_a_wt = round_to(rng.gen::<f64>() * remaining, 2).min(remaining);
        let base_b_wt = remaining - base_a_wt;

        fn name_of(i: Option<&Ingredient>) -> &str {
            i.map(|i| i.name.as_str()).unwrap_or("")
        }
        let mut row = FormulationRow {
            base_a: Component::new(&base_a.name, base_a_wt),
            base_b: Component::new(&base_b.name, base_b_wt),
            elastomer: Component::new(&elastomer.name, elast_wt),
            filler: Component::new(name_of(filler), filler_wt),
            filler_set: label.to_string(),
            talc: Component::new(name_of(talc), talc_wt),
            compatibilizer: Component::new(name_of(comp), comp_wt),
            intune: Component::new(if intune_wt > 0.0 { name_of(intune) } else { "" }, intune_wt),
            stabilizer: Component::new(name_of(stab), stab_wt),
            nucleator: nuc.map(|n| n.name.clone()),
            nucleator_ppm: Some(if nuc.is_some() { NUCLEATOR_PPM } else { 0.0 }),
            ..Default::default()
        };

        // 6. Compatibility screen over the ingredients actually present
        let mut entries = Vec::new();
        let mut push = |item: Option<&Ingredient>, wt: f64, is_compat: bool| {
            if let Some(item) = item {
                if wt > 0.0 {
                    entries.push(CompatEntry::from_ingredient(item, is_compat));
                }
            }
        };
        push(Some(base_a), base_a_wt, false);
        push(Some(base_b), base_b_wt, false);
        push(Some(elastomer), elast_wt, false);
        push(filler, filler_wt, false);
        push(talc, talc_wt, false);
        push(comp, comp_wt, true);
        push(intune, intune_wt, true);

        let verdict = evaluate_formulation(&entries, self.rules);
        if !verdict.ok {
            debug!("Skipping blocked formulation. Reason: {}", verdict.reasons.join("; "));
            return None;
        }
        row.compat_score = Some(round_to(verdict.score, 3));
        row.compat_notes = Some(
            verdict
                .reasons
                .iter()
                .take(3)
                .cloned()
                .collect::<Vec<_>>()
                .join("; "),
        );
        row.metrics = Some(CostEngine::compute(&row, self.catalog));
        Some(row)
    }
}
