// SPDX-FileCopyrightText: 2026 Santhosh Shyamsundar, Prabhu S., and Studio Tyto
// SPDX-License-Identifier: MIT
//
// PhysicsKernel: twin-screw compounding forward model.

// ============================================================================
// PhysicsKernel: Formulation + Process -> Predicted Properties
// ============================================================================
// All property arithmetic lives here and in `formulas`. The kernel is pure:
// identical inputs give bit-identical outputs, and nothing is cached.
// ============================================================================

use crate::error::{CatalogError, PredictionError};
use crate::formulas;
use crate::science::materials::IngredientCatalog;
use crate::tensors::{FormulationRow, ProcessConditions};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

/// Mixing constants not exposed as fitted parameters.
const LAMBDA_VISC: f64 = 1.0;
const SIGMA_IF: f64 = 5.0;
const A_COMP: f64 = 0.8;

/// Process defaults applied when a run does not set them.
const DEFAULT_TAU_S: f64 = 45.0;
const DEFAULT_PVAC_BAR_ABS: f64 = 0.1;
const DEFAULT_K_KNEAD: f64 = 5.0;

/// Raw model file: `{"parameters": {"known_materials", "physical_constants", "priors"}}`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelParameters {
    pub parameters: ParameterGroups,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ParameterGroups {
    pub known_materials: BTreeMap<String, f64>,
    pub physical_constants: BTreeMap<String, f64>,
    /// Prior ranges; the kernel uses their midpoints.
    pub priors: BTreeMap<String, serde_json::Value>,
}

impl ModelParameters {
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

    /// Flattens the groups: known materials, then constants, then prior
    /// midpoints. Later groups override earlier ones. Malformed priors are skipped.
    pub fn resolve(&self) -> HashMap<String, f64> {
        let mut all = HashMap::new();
        for (k, v) in &self.parameters.known_materials {
            all.insert(k.clone(), *v);
        }
        for (k, v) in &self.parameters.physical_constants {
            all.insert(k.clone(), *v);
        }
        for (k, v) in &self.parameters.priors {
            if let Some([lo, hi]) = v.as_array().and_then(|a| match a.as_slice() {
                [lo, hi] => Some([lo.as_f64()?, hi.as_f64()?]),
                _ => None,
            }) {
                all.insert(k.clone(), 0.5 * (lo + hi));
            }
        }
        all
    }
}

/// Resolved, typed model parameters.
///
/// Densities and the gearbox efficiency are optional: the kernel substitutes
/// fixed fallbacks when they are absent (or zero, for the volume mixing).
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct PhysicsConfig {
    // Component densities (g/cm³)
    pub rho_pp: Option<f64>,
    pub rho_el: Option<f64>,
    pub rho_talc: Option<f64>,
    pub rho_caco3: Option<f64>,
    pub rho_biofiber: Option<f64>,
    pub rho_biochar: Option<f64>,

    // Extruder
    pub gear_eff: Option<f64>,
    pub patm_bar: f64,
    pub k_gamma: f64,

    // Degradation dose
    pub a1: f64,
    pub a2: f64,
    pub shear0: f64,
    pub m: f64,
    pub nu: f64,
    pub beta: f64,
    pub tref_c: f64,
    pub kappa: f64,
    pub k_d: f64,
    pub alpha_mfi: f64,

    // Dispersion
    pub kc: f64,
    pub klambda: f64,
    pub dmin_um: f64,
    pub d0_um: f64,
    pub kd: f64,

    // Crystallinity & matrix
    pub xc0: f64,
    pub alpha_n: f64,
    pub c50_ppm: f64,
    pub alpha_el: f64,
    pub em0_gpa: f64,
    pub beta_c: f64,
    pub br: f64,
    pub p_rub: f64,

    // Halpin–Tsai fillers
    pub ef_talc_gpa: f64,
    pub ar_talc: f64,
    pub ef_caco3_gpa: f64,
    pub ar_caco3: f64,
    pub ef_biofiber_gpa: f64,
    pub ar_biofiber: f64,
    pub ef_biochar_gpa: f64,
    pub ar_biochar: f64,

    // Yield
    pub sigma_y0_mpa: f64,
    pub gamma_c: f64,
    pub ky: f64,
    pub delta_um: f64,
    pub ky2: f64,

    // Impact
    pub chi: f64,
    pub imax_kjm2: f64,
    pub k_i: f64,
    pub k_t: f64,
    pub t0_c: f64,

    // HDT
    pub h0_c: f64,
    pub h1: f64,
    pub h2: f64,
    pub h3: f64,

    // Elongation & Gardner
    pub eps0_pct: f64,
    pub k_eps_e: f64,
    pub k_eps_el: f64,
    pub g0_j: f64,
    pub g1_j_per_phi: f64,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            // iPP homopolymer / POE / mineral and bio fillers
            rho_pp: Some(0.905),
            rho_el: Some(0.87),
            rho_talc: Some(2.70),
            rho_caco3: Some(2.71),
            rho_biofiber: Some(1.45),
            rho_biochar: Some(1.80),

            gear_eff: Some(0.9),
            patm_bar: 1.013,
            k_gamma: 20.0,

            // Dose calibrated on 26 mm co-rotating runs at 220 °C
            a1: 1.0,
            a2: 0.5,
            shear0: 100.0,
            m: 0.5,
            nu: 0.5,
            beta: 0.02,
            tref_c: 220.0,
            kappa: 0.1,
            k_d: 0.5,
            alpha_mfi: 3.4,

            kc: 20.0,
            klambda: 1.0,
            dmin_um: 0.3,
            d0_um: 2.0,
            kd: 0.05,

            xc0: 0.45,
            alpha_n: 0.03,
            c50_ppm: 500.0,
            alpha_el: 0.3,
            em0_gpa: 1.6,
            beta_c: 2.0,
            br: 1.5,
            p_rub: 1.2,

            ef_talc_gpa: 60.0,
            ar_talc: 10.0,
            ef_caco3_gpa: 35.0,
            ar_caco3: 1.5,
            ef_biofiber_gpa: 20.0,
            ar_biofiber: 15.0,
            ef_biochar_gpa: 10.0,
            ar_biochar: 2.0,

            sigma_y0_mpa: 33.0,
            gamma_c: 1.5,
            ky: 1.2,
            delta_um: 0.5,
            ky2: 0.1,

            chi: 0.5,
            imax_kjm2: 60.0,
            k_i: 0.8,
            k_t: 0.15,
            t0_c: -10.0,

            h0_c: 60.0,
            h1: 20.0,
            h2: 30.0,
            h3: 40.0,

            eps0_pct: 12.0,
            k_eps_e: 3.0,
            k_eps_el: 20.0,
            g0_j: 2.0,
            g1_j_per_phi: 60.0,
        }
    }
}

impl PhysicsConfig {
    pub fn from_model(model: &ModelParameters) -> Result<Self, PredictionError> {
        Self::from_parameter_map(&model.resolve())
    }

    /// Builds the config from flat parameter names as they appear in model
    /// files (`rho_PP`, `Tref_C`, `Ef_talc_GPa`, ...).
    pub fn from_parameter_map(p: &HashMap<String, f64>) -> Result<Self, PredictionError> {
        let req = |name: &str| -> Result<f64, PredictionError> {
            p.get(name)
                .copied()
                .ok_or_else(|| PredictionError::MissingParameter(name.to_string()))
        };
        let opt = |name: &str| p.get(name).copied();

        Ok(Self {
            rho_pp: opt("rho_PP"),
            rho_el: opt("rho_el"),
            rho_talc: opt("rho_talc"),
            rho_caco3: opt("rho_caco3"),
            rho_biofiber: opt("rho_biofiber"),
            rho_biochar: opt("rho_biochar"),
            gear_eff: opt("gear_eff"),
            patm_bar: req("patm_bar")?,
            k_gamma: req("k_gamma")?,
            a1: req("a1")?,
            a2: req("a2")?,
            shear0: req("shear0")?,
            m: req("m")?,
            nu: req("nu")?,
            beta: req("beta")?,
            tref_c: req("Tref_C")?,
            kappa: req("kappa")?,
            k_d: req("kD")?,
            alpha_mfi: req("alpha_MFI")?,
            kc: req("kc")?,
            klambda: req("klambda")?,
            dmin_um: req("dmin_um")?,
            d0_um: req("d0_um")?,
            kd: req("kd")?,
            xc0: req("Xc0")?,
            alpha_n: req("alpha_n")?,
            c50_ppm: req("c50_ppm")?,
            alpha_el: req("alpha_el")?,
            em0_gpa: req("Em0_GPa")?,
            beta_c: req("beta_c")?,
            br: req("br")?,
            p_rub: req("pRub")?,
            ef_talc_gpa: req("Ef_talc_GPa")?,
            ar_talc: req("AR_talc")?,
            ef_caco3_gpa: req("Ef_caco3_GPa")?,
            ar_caco3: req("AR_caco3")?,
            ef_biofiber_gpa: req("Ef_biofiber_GPa")?,
            ar_biofiber: req("AR_biofiber")?,
            ef_biochar_gpa: req("Ef_biochar_GPa")?,
            ar_biochar: req("AR_biochar")?,
            sigma_y0_mpa: req("sigma_y0_MPa")?,
            gamma_c: req("gamma_c")?,
            ky: req("ky")?,
            delta_um: req("delta_um")?,
            ky2: req("ky2")?,
            chi: req("chi")?,
            imax_kjm2: req("Imax_kJm2")?,
            k_i: req("kI")?,
            k_t: req("kT")?,
            t0_c: req("T0_C")?,
            h0_c: req("H0_C")?,
            h1: req("h1")?,
            h2: req("h2")?,
            h3: req("h3")?,
            eps0_pct: req("eps0_pct")?,
            k_eps_e: req("k_eps_E")?,
            k_eps_el: req("k_eps_el")?,
            g0_j: req("G0_J")?,
            g1_j_per_phi: req("G1_J_per_phi")?,
        })
    }
}

/// Model outputs for one (formulation, process) pair.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct PredictedProperties {
    #[serde(rename = "E_GPa")]
    pub e_gpa: f64,
    #[serde(rename = "MFI_g10min")]
    pub mfi_g10min: f64,
    #[serde(rename = "sigma_y_MPa")]
    pub sigma_y_mpa: f64,
    #[serde(rename = "Izod_23_kJm2")]
    pub izod_23_kjm2: f64,
    #[serde(rename = "Izod_m20_kJm2")]
    pub izod_m20_kjm2: f64,
    #[serde(rename = "HDT_C")]
    pub hdt_c: f64,
    /// Not modelled.
    #[serde(rename = "Shrink_pct")]
    pub shrink_pct: Option<f64>,
    pub rho_gcc: f64,
    pub eps_y_pct: f64,
    #[serde(rename = "Gardner_J")]
    pub gardner_j: f64,
    #[serde(rename = "Xc")]
    pub xc: f64,
    pub phi_el: f64,
    pub phi_f_talc: f64,
    pub phi_f_caco3: f64,
    pub phi_f_biofiber: f64,
    pub phi_f_biochar: f64,
}

impl PredictedProperties {
    pub const KEYS: [&'static str; 16] = [
        "E_GPa",
        "MFI_g10min",
        "sigma_y_MPa",
        "Izod_23_kJm2",
        "Izod_m20_kJm2",
        "HDT_C",
        "Shrink_pct",
        "rho_gcc",
        "eps_y_pct",
        "Gardner_J",
        "Xc",
        "phi_el",
        "phi_f_talc",
        "phi_f_caco3",
        "phi_f_biofiber",
        "phi_f_biochar",
    ];

    /// Lookup by output column name.
    pub fn get(&self, key: &str) -> Option<f64> {
        match key {
            "E_GPa" => Some(self.e_gpa),
            "MFI_g10min" => Some(self.mfi_g10min),
            "sigma_y_MPa" => Some(self.sigma_y_mpa),
            "Izod_23_kJm2" => Some(self.izod_23_kjm2),
            "Izod_m20_kJm2" => Some(self.izod_m20_kjm2),
            "HDT_C" => Some(self.hdt_c),
            "Shrink_pct" => self.shrink_pct,
            "rho_gcc" => Some(self.rho_gcc),
            "eps_y_pct" => Some(self.eps_y_pct),
            "Gardner_J" => Some(self.gardner_j),
            "Xc" => Some(self.xc),
            "phi_el" => Some(self.phi_el),
            "phi_f_talc" => Some(self.phi_f_talc),
            "phi_f_caco3" => Some(self.phi_f_caco3),
            "phi_f_biofiber" => Some(self.phi_f_biofiber),
            "phi_f_biochar" => Some(self.phi_f_biochar),
            _ => None,
        }
    }

    fn ensure_finite(&self) -> Result<(), PredictionError> {
        for key in Self::KEYS {
            if let Some(value) = self.get(key) {
                if !value.is_finite() {
                    return Err(PredictionError::NonFinite {
                        quantity: key,
                        value,
                    });
                }
            }
        }
        Ok(())
    }
}

/// Volume fractions of every recipe constituent.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct VolumeFractions {
    pub pp: f64,
    pub el: f64,
    pub talc: f64,
    pub caco3: f64,
    pub biofiber: f64,
    pub biochar: f64,
    pub compat: f64,
    pub stab: f64,
}

/// Weight percents grouped by constituent class.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
struct ClassWeights {
    pp: f64,
    el: f64,
    talc: f64,
    caco3: f64,
    biofiber: f64,
    biochar: f64,
    compat: f64,
    stab: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum FillerFamily {
    Talc,
    CaCO3,
    BioFiber,
    Biochar,
}

/// Catalog type first, then name heuristics.
fn classify_filler(name: &str, catalog: &IngredientCatalog) -> Option<FillerFamily> {
    if catalog.is_type(name, &["BioFiber", "Cellulose"]) {
        return Some(FillerFamily::BioFiber);
    }
    if catalog.is_type(name, &["Biochar"]) {
        return Some(FillerFamily::Biochar);
    }
    let lower = name.to_lowercase();
    if lower.contains("talc") {
        Some(FillerFamily::Talc)
    } else if lower.contains("caco3") || lower.contains("calcium carbonate") {
        Some(FillerFamily::CaCO3)
    } else {
        None
    }
}

/// Mass -> volume mixing over all constituents. Missing or zero densities
/// take fixed fallbacks.
fn wt_to_phi(w: &ClassWeights, cfg: &PhysicsConfig, rho_compat: f64, rho_stab: f64) -> VolumeFractions {
    let or = |rho: Option<f64>, fallback: f64| rho.filter(|r| *r != 0.0).unwrap_or(fallback);
    let vol = |wt: f64, rho: f64| formulas::safe_div(wt / 100.0, rho, 1e-12);

    let v_pp = vol(w.pp, or(cfg.rho_pp, 0.905));
    let v_el = vol(w.el, or(cfg.rho_el, 0.87));
    let v_ta = vol(w.talc, or(cfg.rho_talc, 2.70));
    let v_ca = vol(w.caco3, or(cfg.rho_caco3, 2.70));
    let v_bf = vol(w.biofiber, or(cfg.rho_biofiber, 1.45));
    let v_bc = vol(w.biochar, or(cfg.rho_biochar, 1.80));
    let v_comp = vol(w.compat, or(Some(rho_compat), 0.92));
    let v_stab = vol(w.stab, or(Some(rho_stab), 1.0));

    let v_sum = (v_pp + v_el + v_ta + v_ca + v_bf + v_bc + v_comp + v_stab).max(1e-12);
    VolumeFractions {
        pp: v_pp / v_sum,
        el: v_el / v_sum,
        talc: v_ta / v_sum,
        caco3: v_ca / v_sum,
        biofiber: v_bf / v_sum,
        biochar: v_bc / v_sum,
        compat: v_comp / v_sum,
        stab: v_stab / v_sum,
    }
}

pub struct PhysicsKernel;

impl PhysicsKernel {
    /// Runs the full forward model for one recipe.
    pub fn predict(
        row: &FormulationRow,
        process: &ProcessConditions,
        cfg: &PhysicsConfig,
        catalog: &IngredientCatalog,
    ) -> Result<PredictedProperties, PredictionError> {
        // 1. Class weights, with the filler routed by family
        let mut w = ClassWeights {
            pp: row.base_a.wt_pct + row.base_b.wt_pct,
            el: row.elastomer.wt_pct,
            compat: row.compatibilizer.wt_pct,
            stab: row.stabilizer.wt_pct,
            ..Default::default()
        };
        if let Some(name) = row.filler.name() {
            match classify_filler(name, catalog) {
                Some(FillerFamily::BioFiber) => w.biofiber += row.filler.wt_pct,
                Some(FillerFamily::Biochar) => w.biochar += row.filler.wt_pct,
                Some(FillerFamily::Talc) => w.talc += row.filler.wt_pct,
                Some(FillerFamily::CaCO3) => w.caco3 += row.filler.wt_pct,
                None => {}
            }
        }
        w.talc += row.talc.wt_pct;
        let nuc_ppm = row.nucleator_ppm.or(process.nucleator_ppm).unwrap_or(0.0);

        // 2. Base-resin melt flow (log mixing)
        let mfi_a = catalog.mfr_midpoint(row.base_a.name());
        let mfi_b = catalog.mfr_midpoint(row.base_b.name());
        if w.pp > 1e-6 && (mfi_a <= 0.0 || mfi_b <= 0.0) {
            return Err(PredictionError::Domain {
                quantity: "MFI_in",
                detail: format!("base resin MFR midpoints must be positive (A={mfi_a}, B={mfi_b})"),
            });
        }
        let mfi_in = formulas::log_blend_mfi(row.base_a.wt_pct, mfi_a, row.base_b.wt_pct, mfi_b);

        // 3. Volume fractions
        let rho_compat = catalog.density(row.compatibilizer.name(), 0.92);
        let rho_stab = catalog.density(row.stabilizer.name(), 1.0);
        let phi = wt_to_phi(&w, cfg, rho_compat, rho_stab);

        // 4. Energy input and shear
        let tau_s = process.tau_s.unwrap_or(DEFAULT_TAU_S);
        let pvac = process.pvac_bar_abs.unwrap_or(DEFAULT_PVAC_BAR_ABS);
        let k_knead = process.k_knead.unwrap_or(DEFAULT_K_KNEAD);
        let sei = formulas::specific_energy_kwh_per_kg(
            process.torque_nm,
            process.n_rps,
            cfg.gear_eff.unwrap_or(0.9),
            process.q_kgh,
        );
        let shear_rate = cfg.k_gamma * process.n_rps;

        // 5. Degradation dose
        let dose = formulas::degradation_dose(
            sei,
            shear_rate,
            formulas::residence_minutes(tau_s),
            process.tm_c,
            pvac,
            cfg.a1,
            cfg.a2,
            cfg.shear0,
            cfg.m,
            cfg.nu,
            cfg.beta,
            cfg.tref_c,
            cfg.kappa,
            cfg.patm_bar,
        );

        // 6. Chain scission and melt flow
        let mw_out = formulas::mw_after_dose(cfg.k_d, dose);
        let mfi = formulas::mfi_after_scission(mfi_in, mw_out, cfg.alpha_mfi);

        // 7. Dispersion
        let sc = formulas::compatibilizer_coverage(cfg.kc, phi.compat, A_COMP);
        let psi = formulas::viscosity_ratio_factor(cfg.klambda, LAMBDA_VISC);
        let phi_stress = formulas::breakup_stress(sc, psi, k_knead, shear_rate, SIGMA_IF);
        let dr_um = formulas::droplet_radius_um(cfg.dmin_um, cfg.d0_um, cfg.kd, sei, phi_stress);

        // 8. Crystallinity and matrix modulus
        let xc = formulas::crystallinity(cfg.xc0, cfg.alpha_n, nuc_ppm, cfg.c50_ppm, cfg.alpha_el, phi.el);
        let em = cfg.em0_gpa * (1.0 + cfg.beta_c * (xc - cfg.xc0));
        let erub = em * (1.0 - cfg.br * phi.el).powf(cfg.p_rub);

        // 9. Filler reinforcement
        let e_gpa = erub
            * formulas::halpin_tsai_factor(cfg.ef_talc_gpa, erub, cfg.ar_talc, phi.talc)
            * formulas::halpin_tsai_factor(cfg.ef_caco3_gpa, erub, cfg.ar_caco3, phi.caco3)
            * formulas::halpin_tsai_factor(cfg.ef_biofiber_gpa, erub, cfg.ar_biofiber, phi.biofiber)
            * formulas::halpin_tsai_factor(cfg.ef_biochar_gpa, erub, cfg.ar_biochar, phi.biochar);

        // 10. Strength and toughness
        let sigma_y = cfg.sigma_y0_mpa
            * (1.0 + cfg.gamma_c * (xc - cfg.xc0))
            * (1.0 - cfg.ky * phi.el * (dr_um / (dr_um + cfg.delta_um)))
            * (1.0 + cfg.ky2 * sc);
        let pi_d = (-cfg.chi * dose).exp();
        let core = formulas::toughening_core(cfg.k_i, phi.el, sc, dr_um);
        let izod_23 = pi_d * 1.0 * cfg.imax_kjm2 * core;
        let izod_m20 = pi_d * formulas::low_temperature_factor(cfg.k_t, cfg.t0_c) * cfg.imax_kjm2 * core;

        // 11. Thermal, density, elongation, falling-weight impact
        let hdt = cfg.h0_c + cfg.h1 * e_gpa.max(1e-6).ln() + cfg.h2 * xc - cfg.h3 * phi.el;
        let rho = phi.pp * cfg.rho_pp.unwrap_or(0.9)
            + phi.el * cfg.rho_el.unwrap_or(0.86)
            + phi.talc * cfg.rho_talc.unwrap_or(2.7)
            + phi.caco3 * cfg.rho_caco3.unwrap_or(2.71)
            + phi.biofiber * cfg.rho_biofiber.unwrap_or(1.45)
            + phi.biochar * cfg.rho_biochar.unwrap_or(1.8)
            + phi.compat * rho_compat
            + phi.stab * rho_stab;
        let eps_y = (cfg.eps0_pct - cfg.k_eps_e * e_gpa + cfg.k_eps_el * phi.el).max(0.1);
        let gardner = cfg.g0_j + cfg.g1_j_per_phi * phi.el;

        let props = PredictedProperties {
            e_gpa,
            mfi_g10min: mfi,
            sigma_y_mpa: sigma_y,
            izod_23_kjm2: izod_23,
            izod_m20_kjm2: izod_m20,
            hdt_c: hdt,
            shrink_pct: None,
            rho_gcc: rho,
            eps_y_pct: eps_y,
            gardner_j: gardner,
            xc,
            phi_el: phi.el,
            phi_f_talc: phi.talc,
            phi_f_caco3: phi.caco3,
            phi_f_biofiber: phi.biofiber,
            phi_f_biochar: phi.biochar,
        };
        props.ensure_finite()?;
        Ok(props)
    }

    /// Predicts a table of rows under shared process conditions.
    ///
    /// A failing row is logged and kept without predictions.
    pub fn predict_rows(
        rows: &[FormulationRow],
        process: &ProcessConditions,
        cfg: &PhysicsConfig,
        catalog: &IngredientCatalog,
    ) -> Vec<PredictedRow> {
        rows.iter()
            .enumerate()
            .map(|(i, row)| match Self::predict(row, process, cfg, catalog) {
                Ok(p) => PredictedRow {
                    row: row.clone(),
                    process: process.clone(),
                    prediction: Some(p),
                    error: None,
                },
                Err(e) => {
                    log::warn!("Could not compute properties for row {i}: {e}");
                    PredictedRow {
                        row: row.clone(),
                        process: process.clone(),
                        prediction: None,
                        error: Some(e.to_string()),
                    }
                }
            })
            .collect()
    }
}

/// A row with its (possibly missing) predictions.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct PredictedRow {
    pub row: FormulationRow,
    pub process: ProcessConditions,
    pub prediction: Option<PredictedProperties>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::science::materials::{Ingredient, IngredientLibrary};
    use crate::tensors::Component;

    fn default_model_json() -> serde_json::Value {
        serde_json::json!({
            "parameters": {
                "known_materials": {
                    "rho_PP": 0.905, "rho_el": 0.87, "rho_talc": 2.70, "rho_caco3": 2.71,
                    "rho_biofiber": 1.45, "rho_biochar": 1.80,
                    "Ef_talc_GPa": 60.0, "AR_talc": 10.0, "Ef_caco3_GPa": 35.0, "AR_caco3": 1.5,
                    "Ef_biofiber_GPa": 20.0, "AR_biofiber": 15.0, "Ef_biochar_GPa": 10.0, "AR_biochar": 2.0
                },
                "physical_constants": { "patm_bar": 1.013, "gear_eff": 0.9, "Tref_C": 220.0 },
                "priors": {
                    "k_gamma": [15, 25], "a1": [0.5, 1.5], "a2": [0.25, 0.75], "shear0": [100, 100],
                    "m": [0.4, 0.6], "nu": [0.4, 0.6], "beta": [0.01, 0.03], "kappa": [0.05, 0.15],
                    "kD": [0.25, 0.75], "alpha_MFI": [3.0, 3.8], "kc": [10, 30], "klambda": [0.5, 1.5],
                    "dmin_um": [0.2, 0.4], "d0_um": [1.5, 2.5], "kd": [0.04, 0.06], "Xc0": [0.40, 0.50],
                    "alpha_n": [0.02, 0.04], "c50_ppm": [400, 600], "alpha_el": [0.2, 0.4],
                    "Em0_GPa": [1.4, 1.8], "beta_c": [1.5, 2.5], "br": [1.0, 2.0], "pRub": [1.0, 1.4],
                    "sigma_y0_MPa": [30, 36], "gamma_c": [1.0, 2.0], "ky": [1.0, 1.4],
                    "delta_um": [0.4, 0.6], "ky2": [0.05, 0.15], "chi": [0.4, 0.6], "Imax_kJm2": [50, 70],
                    "kI": [0.6, 1.0], "kT": [0.1, 0.2], "T0_C": [-15, -5], "H0_C": [55, 65],
                    "h1": [15, 25], "h2": [25, 35], "h3": [35, 45], "eps0_pct": [10, 14],
                    "k_eps_E": [2, 4], "k_eps_el": [15, 25], "G0_J": [1, 3], "G1_J_per_phi": [50, 70],
                    "bad_prior": [1, 2, 3]
                }
            }
        })
    }

    fn reference_row() -> FormulationRow {
        FormulationRow {
            base_a: Component::new("Generic PP", 85.0),
            elastomer: Component::new("POE", 15.0),
            ..Default::default()
        }
    }

    #[test]
    fn test_model_file_resolves_to_default_config() {
        let model: ModelParameters = serde_json::from_value(default_model_json()).unwrap();
        let resolved = model.resolve();
        assert!(!resolved.contains_key("bad_prior"));
        let cfg = PhysicsConfig::from_model(&model).unwrap();
        let def = PhysicsConfig::default();
        assert!((cfg.k_gamma - def.k_gamma).abs() < 1e-12);
        assert!((cfg.xc0 - def.xc0).abs() < 1e-12);
        assert!((cfg.t0_c - def.t0_c).abs() < 1e-12);
        assert_eq!(cfg.rho_pp, Some(0.905));
    }

    #[test]
    fn test_missing_parameter_is_reported() {
        let mut model: ModelParameters = serde_json::from_value(default_model_json()).unwrap();
        model.parameters.priors.remove("kc");
        assert_eq!(
            PhysicsConfig::from_model(&model),
            Err(PredictionError::MissingParameter("kc".into()))
        );
    }

    #[test]
    fn test_filler_classification() {
        let lib = IngredientLibrary {
            fibrous_fillers: vec![Ingredient {
                kind: Some("BioFiber".into()),
                ..Ingredient::named("Hemp Talc-free")
            }],
            ..Default::default()
        };
        let catalog = IngredientCatalog::from_library(&lib);
        // Catalog type wins over the name.
        assert_eq!(classify_filler("Hemp Talc-free", &catalog), Some(FillerFamily::BioFiber));
        assert_eq!(classify_filler("Jetfine Talc", &catalog), Some(FillerFamily::Talc));
        assert_eq!(classify_filler("Calcium Carbonate 3um", &catalog), Some(FillerFamily::CaCO3));
        assert_eq!(classify_filler("Glass fiber", &catalog), None);
    }

    #[test]
    fn test_unclassified_filler_is_ignored() {
        let catalog = IngredientCatalog::default();
        let cfg = PhysicsConfig::default();
        let process = ProcessConditions::default();
        let mut row = reference_row();
        let base = PhysicsKernel::predict(&row, &process, &cfg, &catalog).unwrap();
        row.filler = Component::new("Glass fiber", 10.0);
        let with_glass = PhysicsKernel::predict(&row, &process, &cfg, &catalog).unwrap();
        assert_eq!(base, with_glass);
    }

    #[test]
    fn test_zero_flow_means_no_degradation() {
        let catalog = IngredientCatalog::default();
        let cfg = PhysicsConfig::default();
        let process = ProcessConditions {
            q_kgh: 0.0,
            ..Default::default()
        };
        let p = PhysicsKernel::predict(&reference_row(), &process, &cfg, &catalog).unwrap();
        assert!((p.mfi_g10min - 25.0).abs() < 1e-9, "MFI unchanged: {}", p.mfi_g10min);
    }

    #[test]
    fn test_non_finite_output_is_an_error() {
        let catalog = IngredientCatalog::default();
        let cfg = PhysicsConfig::default();
        // Elastomer fraction large enough that (1 - br·φ_el) < 0 under a fractional power.
        let row = FormulationRow {
            base_a: Component::new("PP", 10.0),
            elastomer: Component::new("POE", 90.0),
            ..Default::default()
        };
        let err = PhysicsKernel::predict(&row, &ProcessConditions::default(), &cfg, &catalog)
            .unwrap_err();
        assert!(matches!(err, PredictionError::NonFinite { .. }), "{err:?}");
    }

    #[test]
    fn test_predict_rows_keeps_failed_rows() {
        let catalog = IngredientCatalog::default();
        let cfg = PhysicsConfig::default();
        let bad = FormulationRow {
            base_a: Component::new("PP", 10.0),
            elastomer: Component::new("POE", 90.0),
            ..Default::default()
        };
        let out = PhysicsKernel::predict_rows(
            &[reference_row(), bad],
            &ProcessConditions::default(),
            &cfg,
            &catalog,
        );
        assert_eq!(out.len(), 2);
        assert!(out[0].prediction.is_some());
        assert!(out[1].prediction.is_none());
        assert!(out[1].error.is_some());
    }

    #[test]
    fn test_nucleator_raises_crystallinity() {
        let catalog = IngredientCatalog::default();
        let cfg = PhysicsConfig::default();
        let mut row = reference_row();
        let process = ProcessConditions::default();
        let plain = PhysicsKernel::predict(&row, &process, &cfg, &catalog).unwrap();
        row.nucleator_ppm = Some(800.0);
        let nucleated = PhysicsKernel::predict(&row, &process, &cfg, &catalog).unwrap();
        assert!(nucleated.xc > plain.xc);
        assert!(nucleated.e_gpa > plain.e_gpa);
        // Process-level nucleator applies only when the row has no value.
        let process_nuc = ProcessConditions {
            nucleator_ppm: Some(800.0),
            ..Default::default()
        };
        assert_eq!(reference_row().nucleator_ppm, None);
        let via_process = PhysicsKernel::predict(&reference_row(), &process_nuc, &cfg, &catalog).unwrap();
        assert_eq!(via_process.xc, nucleated.xc);

        // An explicit 0 ppm in the row wins over the process value.
        let mut zero = reference_row();
        zero.nucleator_ppm = Some(0.0);
        let explicit_zero = PhysicsKernel::predict(&zero, &process_nuc, &cfg, &catalog).unwrap();
        assert_eq!(explicit_zero.xc, plain.xc);
    }
}
