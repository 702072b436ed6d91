// SPDX-FileCopyrightText: 2026 Santhosh Shyamsundar, Prabhu S., and Studio Tyto
// SPDX-License-Identifier: MIT
use crate::science::materials::IngredientCatalog;
use crate::tensors::{FormulationRow, MixMetrics, Role};

pub struct CostEngine;

impl CostEngine {
    /// Mass-weighted cost, emission factor and biogenic mass fraction of a
    /// recipe. Unknown ingredients contribute nothing.
    pub fn compute(row: &FormulationRow, catalog: &IngredientCatalog) -> MixMetrics {
        let mut cost = 0.0;
        let mut ef = 0.0;
        let mut bio = 0.0;

        for role in Role::ALL {
            let component = row.component(role);
            let mass_frac = component.wt_pct / 100.0;
            let Some(item) = component.name().and_then(|n| catalog.get(n)) else {
                continue;
            };
            cost += mass_frac * item.cost_usd_per_kg.unwrap_or(0.0);
            ef += mass_frac * item.ef_kgco2e_per_kg.unwrap_or(0.0);
            bio += mass_frac * item.sustainability.bio_content_pct.unwrap_or(0.0) / 100.0;
        }

        MixMetrics {
            est_cost_usd_per_kg: round_to(cost, 3),
            est_ef_kgco2e_per_kg: round_to(ef, 3),
            est_biogenic_mass_frac: round_to(bio, 3),
        }
    }
}

pub fn round_to(x: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (x * scale).round() / scale
}
