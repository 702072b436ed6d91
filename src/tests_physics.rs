// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Santhosh Shyamsundar, Prabhu S., and Studio Tyto

//! Physics Kernel Regression Tests
//!
//! Reference recipes with independently computed property values, plus
//! purity checks on the forward model.

use crate::physics_kernel::{PhysicsConfig, PhysicsKernel, PredictedProperties};
use crate::science::materials::{Ingredient, IngredientCatalog, IngredientLibrary};
use crate::tensors::{Component, FormulationRow, ProcessConditions};

fn assert_close(label: &str, got: f64, want: f64) {
    let tol = 1e-9 * want.abs().max(1.0);
    assert!(
        (got - want).abs() <= tol,
        "{label}: got {got}, want {want} (|diff| = {})",
        (got - want).abs()
    );
}

fn check(pred: &PredictedProperties, expected: &[(&str, f64)]) {
    for (key, want) in expected {
        let got = pred.get(key).unwrap_or_else(|| panic!("no output {key}"));
        assert_close(key, got, *want);
    }
}

fn resin(name: &str, mfr: f64) -> Ingredient {
    Ingredient {
        mfr_range: Some([mfr, mfr]),
        ..Ingredient::named(name)
    }
}

#[test]
fn test_unfilled_impact_copolymer_reference() {
    println!(" PP + 15% POE, default extruder settings");
    let row = FormulationRow {
        base_a: Component::new("Generic PP", 85.0),
        elastomer: Component::new("POE", 15.0),
        ..Default::default()
    };
    let pred = PhysicsKernel::predict(
        &row,
        &ProcessConditions::default(),
        &PhysicsConfig::default(),
        &IngredientCatalog::default(),
    )
    .unwrap();

    check(
        &pred,
        &[
            ("E_GPa", 1.0560698372079467),
            ("MFI_g10min", 42.34174815405246),
            ("sigma_y_MPa", 26.126200818128353),
            ("HDT_C", 66.9912577159454),
            ("rho_gcc", 0.8995715509854327),
            ("eps_y_pct", 11.93376135384317),
            ("Gardner_J", 11.305912596401027),
            ("Xc", 0.4034704370179949),
            ("phi_el", 0.15509854327335046),
        ],
    );
    // No compatibilizer, so no interfacial coverage and no toughening.
    assert_eq!(pred.izod_23_kjm2, 0.0);
    assert_eq!(pred.izod_m20_kjm2, 0.0);
    assert!(pred.shrink_pct.is_none());
}

#[test]
fn test_filled_compatibilized_blend_reference() {
    println!(" Two-resin blend with talc, compatibilizer and nucleator");
    let library = IngredientLibrary {
        base_resins: vec![resin("PP-12", 12.0), resin("PP-30", 30.0)],
        ..Default::default()
    };
    let catalog = IngredientCatalog::from_library(&library);
    let row = FormulationRow {
        base_a: Component::new("PP-12", 50.0),
        base_b: Component::new("PP-30", 22.7),
        elastomer: Component::new("POE", 12.0),
        talc: Component::new("Talc", 10.0),
        compatibilizer: Component::new("Unlisted MAH", 2.0),
        stabilizer: Component::new("Unlisted AO", 0.3),
        nucleator_ppm: Some(800.0),
        ..Default::default()
    };
    let process = ProcessConditions {
        n_rps: 6.0,
        tm_c: 230.0,
        q_kgh: 8.0,
        torque_nm: 120.0,
        ..Default::default()
    };
    let pred = PhysicsKernel::predict(&row, &process, &PhysicsConfig::default(), &catalog).unwrap();

    check(
        &pred,
        &[
            ("E_GPa", 1.2451151928275483),
            ("MFI_g10min", 47.78467483001989),
            ("sigma_y_MPa", 29.665802380908026),
            ("Izod_23_kJm2", 1.3081086470493064),
            ("Izod_m20_kJm2", 0.23863240513359388),
            ("HDT_C", 72.00626442546911),
            ("rho_gcc", 0.9670773770055195),
            ("eps_y_pct", 11.014963350079089),
            ("Gardner_J", 10.250926785685202),
            ("Xc", 0.4374107094223971),
            ("phi_el", 0.1375154464280867),
        ],
    );
    assert!(pred.phi_f_talc > 0.0);
    assert_eq!(pred.phi_f_caco3, 0.0);
}

#[test]
fn test_prediction_is_pure() {
    let row = FormulationRow {
        base_a: Component::new("Generic PP", 80.0),
        elastomer: Component::new("POE", 12.0),
        talc: Component::new("Talc", 6.5),
        compatibilizer: Component::new("PP-g-MAH", 1.5),
        ..Default::default()
    };
    let before = row.clone();
    let process = ProcessConditions::default();
    let cfg = PhysicsConfig::default();
    let catalog = IngredientCatalog::from_library(&IngredientLibrary::builtin());

    let a = PhysicsKernel::predict(&row, &process, &cfg, &catalog).unwrap();
    let b = PhysicsKernel::predict(&row, &process, &cfg, &catalog).unwrap();
    for key in PredictedProperties::KEYS {
        let (x, y) = (a.get(key), b.get(key));
        assert_eq!(x.map(f64::to_bits), y.map(f64::to_bits), "{key} differs between calls");
    }
    assert_eq!(row, before);
}

#[test]
fn test_more_elastomer_trades_stiffness_for_toughness() {
    let cfg = PhysicsConfig::default();
    let catalog = IngredientCatalog::default();
    let predict = |el: f64| {
        let row = FormulationRow {
            base_a: Component::new("PP", 98.0 - el),
            elastomer: Component::new("POE", el),
            compatibilizer: Component::new("MAH", 2.0),
            ..Default::default()
        };
        PhysicsKernel::predict(&row, &ProcessConditions::default(), &cfg, &catalog).unwrap()
    };
    let low = predict(8.0);
    let high = predict(18.0);
    assert!(high.e_gpa < low.e_gpa);
    assert!(high.izod_23_kjm2 > low.izod_23_kjm2);
    assert!(high.gardner_j > low.gardner_j);
    assert!(high.izod_m20_kjm2 < high.izod_23_kjm2);
}
