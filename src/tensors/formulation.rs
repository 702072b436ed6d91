// SPDX-FileCopyrightText: 2026 Santhosh Shyamsundar, Prabhu S., and Studio Tyto
// SPDX-License-Identifier: MIT
//
// Formulation rows and process conditions.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Tolerance for the weight-percent sum of a balanced recipe.
pub const SUM_TOLERANCE: f64 = 1e-6;

/// Component roles in a recipe, in their canonical column order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    BaseA,
    BaseB,
    Elastomer,
    Filler,
    Talc,
    Compatibilizer,
    Intune,
    Stabilizer,
}

impl Role {
    pub const ALL: [Role; 8] = [
        Role::BaseA,
        Role::BaseB,
        Role::Elastomer,
        Role::Filler,
        Role::Talc,
        Role::Compatibilizer,
        Role::Intune,
        Role::Stabilizer,
    ];

    /// Weight-percent column name, e.g. `elastomer_wtpct`.
    pub fn column(self) -> &'static str {
        match self {
            Role::BaseA => "baseA_wtpct",
            Role::BaseB => "baseB_wtpct",
            Role::Elastomer => "elastomer_wtpct",
            Role::Filler => "filler_wtpct",
            Role::Talc => "talc_wtpct",
            Role::Compatibilizer => "compat_wtpct",
            Role::Intune => "intune_wtpct",
            Role::Stabilizer => "stabilizer_wtpct",
        }
    }

    pub fn from_column(column: &str) -> Option<Role> {
        Role::ALL.iter().copied().find(|r| r.column() == column)
    }

    pub fn is_base(self) -> bool {
        matches!(self, Role::BaseA | Role::BaseB)
    }
}

/// An ingredient slot: identifier plus weight percent.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct Component {
    pub name: Option<String>,
    pub wt_pct: f64,
}

impl Component {
    pub fn new(name: &str, wt_pct: f64) -> Self {
        Self {
            name: if name.is_empty() {
                None
            } else {
                Some(name.to_string())
            },
            wt_pct,
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

/// Estimated economics and footprint of a recipe (per kg of compound).
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct MixMetrics {
    pub est_cost_usd_per_kg: f64,
    #[serde(rename = "est_ef_kgCO2e_per_kg")]
    pub est_ef_kgco2e_per_kg: f64,
    pub est_biogenic_mass_frac: f64,
}

/// One recipe. Weight percents of all roles sum to 100 once balanced.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FormulationRow {
    pub base_a: Component,
    pub base_b: Component,
    pub elastomer: Component,
    pub filler: Component,
    /// Filler pool label ("Mineral", "Fiber", "BioBased" or empty).
    pub filler_set: String,
    pub talc: Component,
    pub compatibilizer: Component,
    pub intune: Component,
    pub stabilizer: Component,
    pub nucleator: Option<String>,
    pub nucleator_ppm: Option<f64>,

    pub compat_score: Option<f64>,
    pub compat_notes: Option<String>,
    pub metrics: Option<MixMetrics>,

    /// Provenance only (generator mode, source iteration, ...).
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl FormulationRow {
    pub fn component(&self, role: Role) -> &Component {
        match role {
            Role::BaseA => &self.base_a,
            Role::BaseB => &self.base_b,
            Role::Elastomer => &self.elastomer,
            Role::Filler => &self.filler,
            Role::Talc => &self.talc,
            Role::Compatibilizer => &self.compatibilizer,
            Role::Intune => &self.intune,
            Role::Stabilizer => &self.stabilizer,
        }
    }

    pub fn component_mut(&mut self, role: Role) -> &mut Component {
        match role {
            Role::BaseA => &mut self.base_a,
            Role::BaseB => &mut self.base_b,
            Role::Elastomer => &mut self.elastomer,
            Role::Filler => &mut self.filler,
            Role::Talc => &mut self.talc,
            Role::Compatibilizer => &mut self.compatibilizer,
            Role::Intune => &mut self.intune,
            Role::Stabilizer => &mut self.stabilizer,
        }
    }

    pub fn wt(&self, role: Role) -> f64 {
        self.component(role).wt_pct
    }

    pub fn set_wt(&mut self, role: Role, wt_pct: f64) {
        self.component_mut(role).wt_pct = wt_pct;
    }

    pub fn total_wt(&self) -> f64 {
        Role::ALL.iter().map(|r| self.wt(*r)).sum()
    }

    pub fn is_balanced(&self) -> bool {
        (self.total_wt() - 100.0).abs() <= SUM_TOLERANCE
            && Role::ALL.iter().all(|r| self.wt(*r) >= 0.0)
    }

    /// Column-name -> weight-percent view, in canonical order.
    pub fn wt_columns(&self) -> Vec<(&'static str, f64)> {
        Role::ALL.iter().map(|r| (r.column(), self.wt(*r))).collect()
    }
}

/// Twin-screw compounding conditions.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ProcessConditions {
    /// Screw speed (rev/s)
    #[serde(rename = "N_rps")]
    pub n_rps: f64,
    /// Melt temperature (°C)
    #[serde(rename = "Tm_C")]
    pub tm_c: f64,
    /// Feed rate (kg/h)
    #[serde(rename = "Q_kgh")]
    pub q_kgh: f64,
    /// Motor torque (N·m)
    #[serde(rename = "Torque_Nm")]
    pub torque_nm: f64,
    /// Residence time (s)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tau_s: Option<f64>,
    /// Vent vacuum (bar absolute)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pvac_bar_abs: Option<f64>,
    #[serde(rename = "K_knead", default, skip_serializing_if = "Option::is_none")]
    pub k_knead: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nucleator_ppm: Option<f64>,
}

impl Default for ProcessConditions {
    fn default() -> Self {
        Self {
            n_rps: 5.0,
            tm_c: 220.0,
            q_kgh: 5.0,
            torque_nm: 50.0,
            tau_s: None,
            pvac_bar_abs: None,
            k_knead: None,
            nucleator_ppm: None,
        }
    }
}

impl ProcessConditions {
    pub const VARIABLES: [&'static str; 4] = ["N_rps", "Tm_C", "Q_kgh", "Torque_Nm"];

    pub fn get(&self, name: &str) -> Option<f64> {
        match name {
            "N_rps" => Some(self.n_rps),
            "Tm_C" => Some(self.tm_c),
            "Q_kgh" => Some(self.q_kgh),
            "Torque_Nm" => Some(self.torque_nm),
            "tau_s" => self.tau_s,
            "pvac_bar_abs" => self.pvac_bar_abs,
            "K_knead" => self.k_knead,
            "nucleator_ppm" => self.nucleator_ppm,
            _ => None,
        }
    }

    /// Returns false for unknown variable names.
    pub fn set(&mut self, name: &str, value: f64) -> bool {
        match name {
            "N_rps" => self.n_rps = value,
            "Tm_C" => self.tm_c = value,
            "Q_kgh" => self.q_kgh = value,
            "Torque_Nm" => self.torque_nm = value,
            "tau_s" => self.tau_s = Some(value),
            "pvac_bar_abs" => self.pvac_bar_abs = Some(value),
            "K_knead" => self.k_knead = Some(value),
            "nucleator_ppm" => self.nucleator_ppm = Some(value),
            _ => return false,
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_columns_round_trip() {
        for role in Role::ALL {
            assert_eq!(Role::from_column(role.column()), Some(role));
        }
        assert_eq!(Role::from_column("N_rps"), None);
    }

    #[test]
    fn test_balance_check() {
        let mut row = FormulationRow::default();
        row.base_a = Component::new("PP", 85.0);
        row.elastomer = Component::new("POE", 15.0);
        assert!(row.is_balanced());
        row.set_wt(Role::Filler, 1.0);
        assert!(!row.is_balanced());
    }

    #[test]
    fn test_process_serde_names() {
        let p: ProcessConditions =
            serde_json::from_str(r#"{"N_rps": 6, "Tm_C": 230, "Q_kgh": 8, "Torque_Nm": 120, "tau_s": 30}"#)
                .unwrap();
        assert_eq!(p.get("Torque_Nm"), Some(120.0));
        assert_eq!(p.tau_s, Some(30.0));
        assert_eq!(p.pvac_bar_abs, None);
        let back = serde_json::to_value(&p).unwrap();
        assert!(back.get("pvac_bar_abs").is_none());
        assert_eq!(back["N_rps"], 6.0);
    }
}
