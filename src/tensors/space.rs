// SPDX-FileCopyrightText: 2026 Santhosh Shyamsundar, Prabhu S., and Studio Tyto
// SPDX-License-Identifier: MIT
//
// Bounded continuous search space shared by the optimizer, the re-balancer
// and process clamping.

use crate::error::OptimizerError;
use rand::Rng;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Dimension {
    pub name: String,
    pub low: f64,
    pub high: f64,
}

impl Dimension {
    pub fn new(name: &str, low: f64, high: f64) -> Self {
        Self {
            name: name.to_string(),
            low,
            high,
        }
    }

    pub fn span(&self) -> f64 {
        self.high - self.low
    }

    /// Inclusive on both ends.
    pub fn contains(&self, x: f64) -> bool {
        x >= self.low && x <= self.high
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct SearchSpace {
    pub dimensions: Vec<Dimension>,
}

impl SearchSpace {
    pub fn new(dimensions: Vec<Dimension>) -> Result<Self, OptimizerError> {
        if dimensions.is_empty() {
            return Err(OptimizerError::EmptySpace);
        }
        Ok(Self { dimensions })
    }

    /// The formulation/process space explored by the optimization loop.
    /// Bio-focused runs allow more elastomer.
    pub fn formulation_default(focus: &str) -> Self {
        let elastomer_high = if focus.contains("bio") { 30.0 } else { 18.0 };
        let elastomer_low = if focus.contains("bio") { 10.0 } else { 8.0 };
        Self {
            dimensions: vec![
                Dimension::new("elastomer_wtpct", elastomer_low, elastomer_high),
                Dimension::new("filler_wtpct", 0.0, 20.0),
                Dimension::new("compat_wtpct", 0.5, 3.0),
                Dimension::new("N_rps", 2.5, 8.33),
                Dimension::new("Tm_C", 200.0, 240.0),
                Dimension::new("Q_kgh", 1.0, 10.0),
                Dimension::new("Torque_Nm", 50.0, 250.0),
            ],
        }
    }

    pub fn len(&self) -> usize {
        self.dimensions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dimensions.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.dimensions.iter().map(|d| d.name.as_str()).collect()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.dimensions.iter().position(|d| d.name == name)
    }

    pub fn check_point(&self, point: &[f64]) -> Result<(), OptimizerError> {
        if point.len() != self.len() {
            return Err(OptimizerError::DimensionMismatch {
                expected: self.len(),
                got: point.len(),
            });
        }
        Ok(())
    }

    pub fn contains(&self, point: &[f64]) -> bool {
        point.len() == self.len()
            && self
                .dimensions
                .iter()
                .zip(point)
                .all(|(d, x)| d.contains(*x))
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<f64> {
        self.dimensions
            .iter()
            .map(|d| {
                if d.span() > 0.0 {
                    rng.gen_range(d.low..=d.high)
                } else {
                    d.low
                }
            })
            .collect()
    }

    /// Maps a point into the unit hypercube. Degenerate dimensions map to 0.
    pub fn normalize(&self, point: &[f64]) -> Vec<f64> {
        self.dimensions
            .iter()
            .zip(point)
            .map(|(d, x)| {
                let span = d.span();
                if span > 0.0 {
                    (x - d.low) / span
                } else {
                    0.0
                }
            })
            .collect()
    }

    pub fn denormalize(&self, unit: &[f64]) -> Vec<f64> {
        self.dimensions
            .iter()
            .zip(unit)
            .map(|(d, u)| d.low + u.clamp(0.0, 1.0) * d.span())
            .collect()
    }

    pub fn clamp(&self, point: &[f64]) -> Vec<f64> {
        self.dimensions
            .iter()
            .zip(point)
            .map(|(d, x)| x.clamp(d.low, d.high))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_empty_space_is_rejected() {
        assert_eq!(SearchSpace::new(vec![]), Err(OptimizerError::EmptySpace));
    }

    #[test]
    fn test_bounds_are_inclusive() {
        let space = SearchSpace::formulation_default("none");
        let lows: Vec<f64> = space.dimensions.iter().map(|d| d.low).collect();
        let highs: Vec<f64> = space.dimensions.iter().map(|d| d.high).collect();
        assert!(space.contains(&lows));
        assert!(space.contains(&highs));
        let mut outside = lows.clone();
        outside[6] = 49.99;
        assert!(!space.contains(&outside));
        assert!(!space.contains(&lows[..3]));
    }

    #[test]
    fn test_bio_focus_widens_elastomer() {
        let space = SearchSpace::formulation_default("bio-based");
        assert_eq!(space.dimensions[0].low, 10.0);
        assert_eq!(space.dimensions[0].high, 30.0);
    }

    #[test]
    fn test_samples_stay_in_bounds() {
        let space = SearchSpace::formulation_default("none");
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let p = space.sample(&mut rng);
            assert!(space.contains(&p), "sample escaped bounds: {:?}", p);
            let back = space.denormalize(&space.normalize(&p));
            for (a, b) in p.iter().zip(&back) {
                assert!((a - b).abs() < 1e-9);
            }
        }
    }
}
