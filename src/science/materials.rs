// SPDX-FileCopyrightText: 2026 Santhosh Shyamsundar, Prabhu S., and Studio Tyto
// SPDX-License-Identifier: MIT
//
// Ingredient definitions and the name-keyed catalog built from a library file.

use crate::error::CatalogError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

/// Default melt-flow range assumed for resins without catalog data (g/10 min).
pub const DEFAULT_MFR_RANGE: [f64; 2] = [10.0, 40.0];

/// Sustainability metadata of an ingredient.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SustainabilityProfile {
    pub origin: Option<String>, // "bio-based" | "fossil" | "recycled"
    pub bio_content_pct: Option<f64>,
}

/// Which elastomer chemistries a base resin accepts.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CompatibilityProfile {
    pub elastomer_types: Vec<String>,
}

/// One library entry. Everything but `name` may be absent.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Ingredient {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub chem_family: Option<String>,
    pub family: Option<String>,
    pub density_gcc: Option<f64>,
    pub mfr_range: Option<[f64; 2]>,
    #[serde(rename = "Tm_C")]
    pub tm_c: Option<f64>,
    pub range_wt_pct: Option<[f64; 2]>,
    pub cost_usd_per_kg: Option<f64>,
    #[serde(rename = "ef_kgCO2e_per_kg")]
    pub ef_kgco2e_per_kg: Option<f64>,
    pub recycling_stream: Option<String>,
    pub sustainability: SustainabilityProfile,
    pub compatibility: CompatibilityProfile,

    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl Ingredient {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn kind(&self) -> &str {
        self.kind.as_deref().unwrap_or("")
    }

    pub fn mfr_midpoint(&self) -> f64 {
        let [lo, hi] = self.mfr_range.unwrap_or(DEFAULT_MFR_RANGE);
        0.5 * (lo + hi)
    }

    /// Bio origin declared, or "bio" in the name or type.
    pub fn is_bio(&self) -> bool {
        if self.sustainability.origin.as_deref() == Some("bio-based") {
            return true;
        }
        let name = self.name.to_lowercase();
        let kind = self.kind().to_lowercase();
        name.contains("bio") || kind.contains("bio")
    }

    pub fn needs_drying(&self) -> bool {
        self.chem_family
            .as_deref()
            .map(|f| f.contains("polyester"))
            .unwrap_or(false)
    }
}

/// The pooled library file: pool name -> ingredient list.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct IngredientLibrary {
    pub base_resins: Vec<Ingredient>,
    pub elastomers: Vec<Ingredient>,
    pub compatibilizers: Vec<Ingredient>,
    pub mineral_fillers: Vec<Ingredient>,
    pub fibrous_fillers: Vec<Ingredient>,
    pub bio_extenders: Vec<Ingredient>,
    pub bio_fillers: Vec<Ingredient>,
    pub stabilizers: Vec<Ingredient>,
    pub nucleators: Vec<Ingredient>,

    /// Pools this crate does not interpret are kept verbatim.
    #[serde(flatten)]
    pub other: BTreeMap<String, serde_json::Value>,
}

impl IngredientLibrary {
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

    /// Pools in a fixed order.
    pub fn pools(&self) -> [(&'static str, &Vec<Ingredient>); 9] {
        [
            ("base_resins", &self.base_resins),
            ("elastomers", &self.elastomers),
            ("compatibilizers", &self.compatibilizers),
            ("mineral_fillers", &self.mineral_fillers),
            ("fibrous_fillers", &self.fibrous_fillers),
            ("bio_extenders", &self.bio_extenders),
            ("bio_fillers", &self.bio_fillers),
            ("stabilizers", &self.stabilizers),
            ("nucleators", &self.nucleators),
        ]
    }

    pub fn pools_mut(&mut self) -> [&mut Vec<Ingredient>; 9] {
        [
            &mut self.base_resins,
            &mut self.elastomers,
            &mut self.compatibilizers,
            &mut self.mineral_fillers,
            &mut self.fibrous_fillers,
            &mut self.bio_extenders,
            &mut self.bio_fillers,
            &mut self.stabilizers,
            &mut self.nucleators,
        ]
    }

    /// A small PP compounding library used when no library file is given.
    pub fn builtin() -> Self {
        let resin = |name: &str, kind: &str, mfr: [f64; 2], cost: f64, ef: f64, stream: &str| Ingredient {
            name: name.into(),
            kind: Some(kind.into()),
            chem_family: Some("polyolefin/pp".into()),
            density_gcc: Some(0.905),
            mfr_range: Some(mfr),
            tm_c: Some(165.0),
            cost_usd_per_kg: Some(cost),
            ef_kgco2e_per_kg: Some(ef),
            recycling_stream: Some(stream.into()),
            sustainability: SustainabilityProfile {
                origin: Some(if kind == "rPP" { "recycled" } else { "fossil" }.into()),
                bio_content_pct: Some(0.0),
            },
            compatibility: CompatibilityProfile {
                elastomer_types: vec!["POE".into(), "EPDM".into()],
            },
            ..Default::default()
        };
        let additive = |name: &str, kind: &str, family: &str, rho: f64, range: [f64; 2], cost: f64, ef: f64| Ingredient {
            name: name.into(),
            kind: Some(kind.into()),
            chem_family: Some(family.into()),
            density_gcc: Some(rho),
            range_wt_pct: Some(range),
            cost_usd_per_kg: Some(cost),
            ef_kgco2e_per_kg: Some(ef),
            recycling_stream: Some("any".into()),
            ..Default::default()
        };

        let mut elastomer = additive("POE-8150", "POE", "polyolefin/poe", 0.868, [8.0, 18.0], 2.6, 2.1);
        elastomer.mfr_range = Some([0.5, 1.0]);
        elastomer.tm_c = Some(55.0);
        elastomer.recycling_stream = Some("pp".into());

        Self {
            base_resins: vec![
                resin("PP-H 12MFR", "PP", [10.0, 14.0], 1.35, 1.7, "pp"),
                resin("PP-C 30MFR", "PP", [25.0, 35.0], 1.45, 1.8, "pp"),
                resin("rPP Post-Consumer", "rPP", [15.0, 25.0], 1.10, 0.6, "pp"),
            ],
            elastomers: vec![elastomer],
            compatibilizers: vec![additive(
                "PP-g-MAH", "Compatibilizer", "polyolefin/pp", 0.91, [0.5, 3.0], 3.2, 2.5,
            )],
            mineral_fillers: vec![
                additive("Talc HAR", "Talc", "filler/mineral", 2.70, [0.0, 15.0], 0.45, 0.2),
                additive("CaCO3 Fine", "CaCO3", "filler/mineral", 2.71, [0.0, 15.0], 0.25, 0.1),
            ],
            stabilizers: vec![additive(
                "AO-1010/168", "Stabilizer", "additive/antioxidant", 1.05, [0.2, 0.5], 6.0, 4.0,
            )],
            nucleators: vec![additive(
                "Hyperform HPN-20E", "Nucleator", "additive/nucleator", 1.0, [0.0, 0.1], 40.0, 5.0,
            )],
            ..Default::default()
        }
    }
}

/// Flat name -> ingredient lookup. Built once per run and shared read-only.
#[derive(Clone, Debug, Default)]
pub struct IngredientCatalog {
    items: HashMap<String, Ingredient>,
}

impl IngredientCatalog {
    /// Later duplicates override earlier ones.
    pub fn from_library(library: &IngredientLibrary) -> Self {
        let mut items = HashMap::new();
        for (_, pool) in library.pools() {
            for item in pool {
                if !item.name.is_empty() {
                    items.insert(item.name.clone(), item.clone());
                }
            }
        }
        Self { items }
    }

    pub fn get(&self, name: &str) -> Option<&Ingredient> {
        self.items.get(name)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn density(&self, name: Option<&str>, fallback: f64) -> f64 {
        name.and_then(|n| self.items.get(n))
            .and_then(|i| i.density_gcc)
            .unwrap_or(fallback)
    }

    pub fn is_type(&self, name: &str, types: &[&str]) -> bool {
        self.items
            .get(name)
            .and_then(|i| i.kind.as_deref())
            .map(|k| types.contains(&k.trim()))
            .unwrap_or(false)
    }

    /// Midpoint of the catalog melt-flow range, [10, 40] when unknown.
    pub fn mfr_midpoint(&self, name: Option<&str>) -> f64 {
        match name.and_then(|n| self.items.get(n)) {
            Some(item) => item.mfr_midpoint(),
            None => 0.5 * (DEFAULT_MFR_RANGE[0] + DEFAULT_MFR_RANGE[1]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_parses_unknown_fields_and_pools() {
        let json = r#"{
            "base_resins": [{"name": "PP-A", "type": "PP", "mfr_range": [10, 20], "grade_code": "X1"}],
            "elastomers": [{"name": "POE-1", "type": "POE", "sustainability": {"origin": "fossil"}}],
            "processing_aids": [{"name": "Wax"}]
        }"#;
        let lib: IngredientLibrary = serde_json::from_str(json).unwrap();
        assert_eq!(lib.base_resins[0].kind(), "PP");
        assert_eq!(lib.base_resins[0].extra["grade_code"], "X1");
        assert!(lib.other.contains_key("processing_aids"));
        assert_eq!(lib.base_resins[0].mfr_midpoint(), 15.0);
    }

    #[test]
    fn test_catalog_lookups_and_fallbacks() {
        let catalog = IngredientCatalog::from_library(&IngredientLibrary::builtin());
        assert_eq!(catalog.density(Some("PP-g-MAH"), 0.92), 0.91);
        assert_eq!(catalog.density(Some("unknown"), 0.92), 0.92);
        assert_eq!(catalog.density(None, 1.0), 1.0);
        assert!(catalog.is_type("Talc HAR", &["Talc"]));
        assert!(!catalog.is_type("Talc HAR", &["BioFiber", "Cellulose"]));
        assert_eq!(catalog.mfr_midpoint(Some("missing")), 25.0);
        assert_eq!(catalog.mfr_midpoint(Some("PP-H 12MFR")), 12.0);
    }

    #[test]
    fn test_later_duplicate_overrides() {
        let mut lib = IngredientLibrary::default();
        lib.base_resins.push(Ingredient {
            density_gcc: Some(0.9),
            ..Ingredient::named("Dup")
        });
        lib.stabilizers.push(Ingredient {
            density_gcc: Some(1.2),
            ..Ingredient::named("Dup")
        });
        let catalog = IngredientCatalog::from_library(&lib);
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.density(Some("Dup"), 0.0), 1.2);
    }

    #[test]
    fn test_bio_detection() {
        let mut pla = Ingredient::named("PLA 4032D");
        assert!(!pla.is_bio());
        pla.sustainability.origin = Some("bio-based".into());
        assert!(pla.is_bio());
        assert!(Ingredient::named("BioChar 200").is_bio());
    }
}
