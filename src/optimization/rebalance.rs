// SPDX-FileCopyrightText: 2026 Santhosh Shyamsundar, Prabhu S., and Studio Tyto
// SPDX-License-Identifier: MIT
//
// Projects optimizer proposals onto complete recipes.

use crate::tensors::{FormulationRow, Role};
use log::warn;

/// Base column that absorbs the shortfall or excess.
const PRIMARY_BASE: Role = Role::BaseA;

pub struct Rebalancer;

impl Rebalancer {
    /// Copies `template`, overwrites the optimized `_wtpct` columns and
    /// moves `100 − Σ` onto the primary base resin.
    ///
    /// Unknown column names are ignored. When the optimized columns alone
    /// exceed 100 the returned row is left unbalanced and marked
    /// `mode = "bo_suggested"`; scoring penalizes it downstream.
    pub fn rebalance(template: &FormulationRow, optimized: &[(&str, f64)]) -> FormulationRow {
        let mut row = template.clone();
        let mut optimized_total = 0.0;
        for (column, value) in optimized {
            if let Some(role) = Role::from_column(column) {
                row.set_wt(role, *value);
                optimized_total += *value;
            }
        }

        let adjustment = 100.0 - row.total_wt();
        let primary = row.wt(PRIMARY_BASE) + adjustment;
        row.set_wt(PRIMARY_BASE, primary);

        if optimized_total > 100.0 || primary < 0.0 {
            warn!(
                "Optimized components sum to {optimized_total:.3} wt%; {} is {primary:.3} after re-balancing",
                PRIMARY_BASE.column()
            );
            row.extra
                .insert("mode".to_string(), serde_json::Value::from("bo_suggested"));
        }
        row
    }
}
