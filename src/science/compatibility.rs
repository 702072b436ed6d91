// SPDX-FileCopyrightText: 2026 Santhosh Shyamsundar, Prabhu S., and Studio Tyto
// SPDX-License-Identifier: MIT
//! Pairwise ingredient compatibility scoring.
//!
//! Every unordered pair of ingredients in a recipe is scored on chemistry
//! (family pair matrix, optionally boosted by a compatibilizer) and on
//! processing (melt-flow ratio, melt-temperature overlap, drying mismatch).
//! The recipe score is the worst pair. A blocked pair rejects the recipe.

use crate::error::CatalogError;
use crate::science::materials::Ingredient;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PairRule {
    pub score: Option<f64>,
    pub block: bool,
    pub note: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct CompatibilizerSuggestion {
    pub boost_to: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ProcessingRules {
    pub mfr_ratio_max: f64,
    #[serde(rename = "melt_T_overlap_good")]
    pub melt_t_overlap_good: f64,
    #[serde(rename = "melt_T_overlap_min")]
    pub melt_t_overlap_min: f64,
    pub drying_mismatch_penalty: f64,
}

impl Default for ProcessingRules {
    fn default() -> Self {
        Self {
            mfr_ratio_max: 10.0,
            melt_t_overlap_good: 60.0,
            melt_t_overlap_min: 100.0,
            drying_mismatch_penalty: 0.1,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Thresholds {
    pub doe_hard_block_threshold: f64,
    pub needs_compat_threshold: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            doe_hard_block_threshold: 0.15,
            needs_compat_threshold: 0.5,
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CompatibilityRules {
    pub pair_matrix: HashMap<String, PairRule>,
    pub compatibilizer_suggestions: HashMap<String, CompatibilizerSuggestion>,
    pub processing_rules: ProcessingRules,
    pub thresholds: Thresholds,
}

impl CompatibilityRules {
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let text = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| CatalogError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Rules covering the families of the built-in library.
    pub fn builtin() -> Self {
        let mut pair_matrix = HashMap::new();
        let mut rule = |a: &str, b: &str, score: f64, block: bool, note: Option<&str>| {
            pair_matrix.insert(
                format!("{a}::{b}"),
                PairRule {
                    score: Some(score),
                    block,
                    note: note.map(str::to_string),
                },
            );
        };
        rule("polyolefin/pp", "polyolefin/poe", 0.85, false, None);
        rule("polyolefin/pp", "filler/mineral", 0.7, false, None);
        rule("polyolefin/poe", "filler/mineral", 0.7, false, None);
        rule("polyolefin/pp", "additive/antioxidant", 0.9, false, None);
        rule("polyolefin/poe", "additive/antioxidant", 0.9, false, None);
        rule("filler/mineral", "additive/antioxidant", 0.8, false, None);
        rule(
            "polyolefin/pp",
            "polyester/pla",
            0.1,
            true,
            Some("immiscible without reactive compatibilization"),
        );
        rule("polyester/pla", "polyester/pbat", 0.4, false, None);

        let mut compatibilizer_suggestions = HashMap::new();
        compatibilizer_suggestions.insert(
            "polyester/pla::polyester/pbat".to_string(),
            CompatibilizerSuggestion { boost_to: 0.75 },
        );

        Self {
            pair_matrix,
            compatibilizer_suggestions,
            processing_rules: ProcessingRules::default(),
            thresholds: Thresholds::default(),
        }
    }

    fn pair(&self, fa: &str, fb: &str) -> Option<&PairRule> {
        self.pair_matrix
            .get(&format!("{fa}::{fb}"))
            .or_else(|| self.pair_matrix.get(&format!("{fb}::{fa}")))
    }

    fn suggestion(&self, fa: &str, fb: &str) -> Option<&CompatibilizerSuggestion> {
        self.compatibilizer_suggestions
            .get(&format!("{fa}::{fb}"))
            .or_else(|| self.compatibilizer_suggestions.get(&format!("{fb}::{fa}")))
    }
}

/// One ingredient as seen by the scorer.
#[derive(Clone, Debug, PartialEq)]
pub struct CompatEntry {
    pub chem_family: String,
    pub mfr: Option<f64>,
    pub tm_c: Option<f64>,
    pub needs_drying: bool,
    pub is_compatibilizer: bool,
}

impl CompatEntry {
    pub fn from_ingredient(item: &Ingredient, is_compatibilizer: bool) -> Self {
        let family = item.chem_family.clone().unwrap_or_default();
        Self {
            needs_drying: family.to_lowercase().contains("polyester"),
            chem_family: family,
            mfr: item.mfr_range.map(|[lo, hi]| 0.5 * (lo + hi)),
            tm_c: item.tm_c,
            is_compatibilizer,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct CompatibilityVerdict {
    pub score: f64,
    pub ok: bool,
    pub reasons: Vec<String>,
}

/// 1.0 when either MFR is unknown or zero, falling to 0 at `max_ratio`.
pub fn mfr_ratio_score(a: Option<f64>, b: Option<f64>, max_ratio: f64) -> f64 {
    let (a, b) = match (a, b) {
        (Some(a), Some(b)) if a != 0.0 && b != 0.0 => (a, b),
        _ => return 1.0,
    };
    let r = a.max(b) / a.min(b).max(1e-9);
    if r >= max_ratio {
        return 0.0;
    }
    (1.0 - r.log2() / max_ratio.log2()).max(0.0)
}

pub fn melt_overlap_score(ta: Option<f64>, tb: Option<f64>, good: f64, min: f64) -> f64 {
    let (ta, tb) = match (ta, tb) {
        (Some(a), Some(b)) => (a, b),
        _ => return 1.0,
    };
    let gap = (ta - tb).abs();
    let overlap = good - gap;
    if overlap <= 0.0 {
        return if gap > min { 0.0 } else { 0.3 };
    }
    (overlap / good).min(1.0)
}

/// Returns (score, blocked, note).
pub fn chemistry_score(
    fa: &str,
    fb: &str,
    rules: &CompatibilityRules,
    has_compat: bool,
) -> (f64, bool, Option<String>) {
    let entry = rules.pair(fa, fb);
    let mut score = entry
        .and_then(|e| e.score)
        .unwrap_or(if fa == fb { 1.0 } else { 0.2 });
    let block = entry.map(|e| e.block).unwrap_or(false);
    if !block && has_compat {
        if let Some(s) = rules.suggestion(fa, fb) {
            score = score.max(s.boost_to.min(1.0));
        }
    }
    (score, block, entry.and_then(|e| e.note.clone()))
}

pub fn pair_process_score(a: &CompatEntry, b: &CompatEntry, rules: &ProcessingRules) -> f64 {
    let s1 = mfr_ratio_score(a.mfr, b.mfr, rules.mfr_ratio_max);
    let s2 = melt_overlap_score(
        a.tm_c,
        b.tm_c,
        rules.melt_t_overlap_good,
        rules.melt_t_overlap_min,
    );
    let mut s = s1.min(s2);
    if a.needs_drying != b.needs_drying {
        s = (s - rules.drying_mismatch_penalty).max(0.0);
    }
    s
}

/// Scores a recipe. Stops at the first blocked pair.
pub fn evaluate_formulation(
    ingredients: &[CompatEntry],
    rules: &CompatibilityRules,
) -> CompatibilityVerdict {
    let has_compat = ingredients.iter().any(|i| i.is_compatibilizer);
    let th = &rules.thresholds;
    let mut reasons = Vec::new();
    let mut worst: f64 = 1.0;

    for (i, a) in ingredients.iter().enumerate() {
        for b in &ingredients[i + 1..] {
            let (fa, fb) = (a.chem_family.as_str(), b.chem_family.as_str());
            let (c_score, blocked, note) = chemistry_score(fa, fb, rules, has_compat);
            if blocked || c_score < th.doe_hard_block_threshold {
                reasons.push(format!(
                    "BLOCK: {fa} ↔ {fb} ({})",
                    note.as_deref().unwrap_or("chemistry")
                ));
                return CompatibilityVerdict {
                    score: 0.0,
                    ok: false,
                    reasons,
                };
            }
            let p_score = pair_process_score(a, b, &rules.processing_rules);
            worst = worst.min(c_score.min(p_score));
            if c_score < th.needs_compat_threshold && !has_compat {
                reasons.push(format!("Penalty: {fa} ↔ {fb} benefits from compatibilizer"));
            }
        }
    }

    CompatibilityVerdict {
        score: worst,
        ok: true,
        reasons,
    }
}
