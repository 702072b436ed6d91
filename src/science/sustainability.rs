// SPDX-FileCopyrightText: 2026 Santhosh Shyamsundar, Prabhu S., and Studio Tyto
// SPDX-License-Identifier: MIT
//
// End-of-life goals and the ingredient pool pre-filter they imply.

use crate::science::materials::{Ingredient, IngredientLibrary};
use serde::{Deserialize, Serialize};

/// Chemical families admissible in a compostable compound (prefix match).
pub const COMPOSTABLE_FAMILIES: [&str; 5] = [
    "polyester/pla",
    "polyester/pha-phb",
    "polyester/pbat",
    "filler/",
    "additive/",
];

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SustainabilityGoals {
    pub compostable: bool,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Goals {
    pub sustainability: SustainabilityGoals,
    pub recycling_stream: Option<String>,
}

impl Goals {
    fn allows(&self, item: &Ingredient, target_stream: &str) -> bool {
        if self.sustainability.compostable {
            let family = item
                .chem_family
                .as_deref()
                .unwrap_or("none")
                .to_lowercase();
            COMPOSTABLE_FAMILIES.iter().any(|f| family.starts_with(f))
        } else {
            let stream = item
                .recycling_stream
                .as_deref()
                .unwrap_or("none")
                .to_lowercase();
            stream.contains(target_stream) || stream == "any"
        }
    }
}

/// Keeps only ingredients compatible with the end-of-life goal.
///
/// Compostable goals filter by chemical family; otherwise every ingredient
/// must belong to the target recycling stream (default `pp`) or to `any`.
pub fn filter_pools_by_goals(
    goals: &Goals,
    library: &IngredientLibrary,
    target_stream: Option<&str>,
) -> IngredientLibrary {
    let stream = target_stream
        .or(goals.recycling_stream.as_deref())
        .unwrap_or("pp")
        .to_lowercase();
    let mut filtered = library.clone();
    for pool in filtered.pools_mut() {
        pool.retain(|item| goals.allows(item, &stream));
    }
    filtered
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(name: &str, family: Option<&str>, stream: Option<&str>) -> Ingredient {
        Ingredient {
            chem_family: family.map(str::to_string),
            recycling_stream: stream.map(str::to_string),
            ..Ingredient::named(name)
        }
    }

    fn library() -> IngredientLibrary {
        IngredientLibrary {
            base_resins: vec![
                item("PP", Some("polyolefin/pp"), Some("PP")),
                item("PLA", Some("polyester/pla"), Some("Compostable")),
            ],
            mineral_fillers: vec![item("Talc", Some("filler/mineral"), Some("any"))],
            stabilizers: vec![item("AO", None, None)],
            ..Default::default()
        }
    }

    #[test]
    fn test_recycling_stream_filter() {
        let out = filter_pools_by_goals(&Goals::default(), &library(), None);
        let bases: Vec<&str> = out.base_resins.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(bases, vec!["PP"]);
        assert_eq!(out.mineral_fillers.len(), 1);
        assert!(out.stabilizers.is_empty(), "missing stream counts as 'none'");
    }

    #[test]
    fn test_compostable_filter() {
        let goals = Goals {
            sustainability: SustainabilityGoals { compostable: true },
            recycling_stream: None,
        };
        let out = filter_pools_by_goals(&goals, &library(), None);
        let bases: Vec<&str> = out.base_resins.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(bases, vec!["PLA"]);
        assert_eq!(out.mineral_fillers.len(), 1);
        assert!(out.stabilizers.is_empty());
    }
}
