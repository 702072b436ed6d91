// SPDX-FileCopyrightText: 2026 Santhosh Shyamsundar, Prabhu S., and Studio Tyto
// SPDX-License-Identifier: MIT
//! Scalar Formulas for Twin-Screw Polymer Compounding
//!
//! Pure functions on `f64` values. The property predictor in
//! `physics_kernel` composes these into the full forward model.
//!
//! References:
//! - Halpin & Kardos (1976): Halpin–Tsai composite modulus
//! - Grace (1982) / Wu (1987): droplet breakup in blend dispersion
//! - Bremner & Rudin (1990): melt-flow / molecular-weight scaling

// ============================================================================
// NUMERIC GUARDS
// ============================================================================

/// Division with the denominator replaced by `eps` when |b| <= eps.
pub fn safe_div(a: f64, b: f64, eps: f64) -> f64 {
    a / if b.abs() > eps { b } else { eps }
}

// ============================================================================
// BLENDING
// ============================================================================

/// Logarithmic mixing rule for the melt-flow index of a two-resin blend.
///
/// ln MFI = (w_a / w) ln MFI_a + (w_b / w) ln MFI_b, with w = w_a + w_b.
///
/// Falls back to 25 g/10 min when the blend carries no resin.
pub fn log_blend_mfi(w_a: f64, mfi_a: f64, w_b: f64, mfi_b: f64) -> f64 {
    let total = w_a + w_b;
    if total > 1e-6 {
        ((w_a / total) * mfi_a.ln() + (w_b / total) * mfi_b.ln()).exp()
    } else {
        25.0
    }
}

// ============================================================================
// EXTRUSION ENERGETICS
// ============================================================================

/// Specific energy input in kWh/kg.
///
/// P = T · 2π · N · η_gear; SEI = P / (Q / 3600) / 3.6e6.
/// Zero flow gives zero SEI.
pub fn specific_energy_kwh_per_kg(torque_nm: f64, n_rps: f64, gear_eff: f64, q_kgh: f64) -> f64 {
    let power_w = torque_nm * 2.0 * std::f64::consts::PI * n_rps * gear_eff;
    let flow_kgs = q_kgh / 3600.0;
    let sei_j_per_kg = if flow_kgs > 1e-9 {
        power_w / flow_kgs
    } else {
        0.0
    };
    sei_j_per_kg / 3.6e6
}

/// Residence time expressed in the unit the dose equation was fitted with.
///
/// Input is seconds; the fitted exponent assumes minutes.
pub fn residence_minutes(tau_s: f64) -> f64 {
    tau_s / 60.0
}

/// Thermomechanical degradation dose.
///
/// D = SEI · (a1 + a2 (γ̇/γ̇0)^m) · τ^ν · exp(β (T − T_ref)) · exp(−κ (p_atm − p_vac))
#[allow(clippy::too_many_arguments)]
pub fn degradation_dose(
    sei: f64,
    shear_rate: f64,
    tau_min: f64,
    tm_c: f64,
    pvac_bar_abs: f64,
    a1: f64,
    a2: f64,
    shear0: f64,
    m: f64,
    nu: f64,
    beta: f64,
    tref_c: f64,
    kappa: f64,
    patm_bar: f64,
) -> f64 {
    sei * (a1 + a2 * (shear_rate / shear0).powf(m))
        * tau_min.powf(nu)
        * (beta * (tm_c - tref_c)).exp()
        * (-kappa * (patm_bar - pvac_bar_abs)).exp()
}

/// Reference weight-average molecular weight of the virgin resin (g/mol).
pub const MW_REFERENCE: f64 = 350_000.0;

/// Chain scission: Mw_out = Mw_ref / (1 + k_D · D).
pub fn mw_after_dose(k_d: f64, dose: f64) -> f64 {
    MW_REFERENCE / (1.0 + k_d * dose)
}

/// MFI_out = MFI_in · (Mw_ref / Mw_out)^α.
pub fn mfi_after_scission(mfi_in: f64, mw_out: f64, alpha_mfi: f64) -> f64 {
    mfi_in * (MW_REFERENCE / mw_out).powf(alpha_mfi)
}

// ============================================================================
// BLEND MORPHOLOGY
// ============================================================================

/// Interfacial coverage by compatibilizer: Sc = 1 − exp(−k_c φ_comp A).
pub fn compatibilizer_coverage(kc: f64, phi_comp: f64, a_comp: f64) -> f64 {
    1.0 - (-kc * phi_comp * a_comp).exp()
}

/// Viscosity-ratio penalty on breakup: Ψ = exp(−k_λ (λ − 1)²).
pub fn viscosity_ratio_factor(klambda: f64, lambda_visc: f64) -> f64 {
    (-klambda * (lambda_visc - 1.0).powi(2)).exp()
}

/// Dimensionless breakup stress Φ = Sc Ψ K γ̇ / σ.
pub fn breakup_stress(sc: f64, psi: f64, k_knead: f64, shear_rate: f64, sigma_if: f64) -> f64 {
    (sc * psi * k_knead * shear_rate) / sigma_if.max(1e-6)
}

/// Dispersed-phase radius (µm) relaxing from d0 toward d_min.
pub fn droplet_radius_um(dmin_um: f64, d0_um: f64, kd: f64, sei: f64, phi_stress: f64) -> f64 {
    dmin_um + (d0_um - dmin_um) * (-kd * sei * phi_stress).exp()
}

// ============================================================================
// CRYSTALLINITY & STIFFNESS
// ============================================================================

/// Xc = Xc0 + α_n ln(1 + c/c50) − α_el φ_el
pub fn crystallinity(xc0: f64, alpha_n: f64, c_nuc_ppm: f64, c50_ppm: f64, alpha_el: f64, phi_el: f64) -> f64 {
    xc0 + alpha_n * (1.0 + c_nuc_ppm / c50_ppm).ln() - alpha_el * phi_el
}

/// Halpin–Tsai reinforcement factor E_c / E_m for one filler.
///
/// η = (E_f/E_m − 1) / (E_f/E_m + 2·AR); factor = (1 + ηφ) / (1 − ηφ).
/// A zero denominator yields 1 (no reinforcement).
pub fn halpin_tsai_factor(ef_gpa: f64, em_gpa: f64, aspect_ratio: f64, phi: f64) -> f64 {
    let ratio = ef_gpa / em_gpa;
    let eta = (ratio - 1.0) / (ratio + 2.0 * aspect_ratio);
    let denom = 1.0 - eta * phi;
    if denom != 0.0 {
        (1.0 + eta * phi) / denom
    } else {
        1.0
    }
}

// ============================================================================
// TOUGHNESS
// ============================================================================

/// Saturating toughening core 1 − exp(−k_I φ_el Sc / max(d, 1e-3)).
pub fn toughening_core(k_i: f64, phi_el: f64, sc: f64, dr_um: f64) -> f64 {
    1.0 - (-k_i * (phi_el * sc / dr_um.max(1e-3))).exp()
}

/// Logistic ductile-to-brittle factor evaluated at −20 °C.
pub fn low_temperature_factor(k_t: f64, t0_c: f64) -> f64 {
    1.0 / (1.0 + (k_t * (t0_c - (-20.0))).exp())
}
