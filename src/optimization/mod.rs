// SPDX-FileCopyrightText: 2026 Santhosh Shyamsundar, Prabhu S., and Studio Tyto
// SPDX-License-Identifier: MIT
//! Sequential model-based optimization.
//!
//! The loop driver only sees [`SequentialOptimizer`]: `ask` proposes points,
//! `tell` absorbs (point, objective) observations, `best` returns the
//! minimum so far. Objectives are minimized; callers negate rewards.

pub mod bayesian;
pub mod doe;
pub mod rebalance;

pub use bayesian::GaussianProcessOptimizer;
pub use doe::{DoeConfig, DoeGenerator, Focus};
pub use rebalance::Rebalancer;

use crate::error::OptimizerError;
use crate::tensors::SearchSpace;
use rand::rngs::StdRng;
use rand::SeedableRng;

/// One observed point and its (minimized) objective value.
#[derive(Clone, Debug, PartialEq)]
pub struct Observation {
    pub point: Vec<f64>,
    pub value: f64,
}

pub trait SequentialOptimizer: Send {
    fn space(&self) -> &SearchSpace;

    /// Proposes `n` points inside the search space.
    fn ask(&mut self, n: usize) -> Vec<Vec<f64>>;

    /// Appends observations. Either all are accepted or none.
    fn tell(&mut self, points: &[Vec<f64>], values: &[f64]) -> Result<(), OptimizerError>;

    fn observations(&self) -> &[Observation];

    /// Point with the lowest value; ties go to the earliest observation.
    fn best(&self) -> Option<(&[f64], f64)> {
        best_observation(self.observations()).map(|o| (o.point.as_slice(), o.value))
    }
}

/// First observation holding the minimum value.
pub fn best_observation(observations: &[Observation]) -> Option<&Observation> {
    let mut best: Option<&Observation> = None;
    for obs in observations {
        match best {
            Some(b) if obs.value >= b.value => {}
            _ => best = Some(obs),
        }
    }
    best
}

/// Checks a `tell` batch without touching any state.
pub fn validate_batch(
    space: &SearchSpace,
    points: &[Vec<f64>],
    values: &[f64],
) -> Result<(), OptimizerError> {
    if points.len() != values.len() {
        return Err(OptimizerError::LengthMismatch {
            points: points.len(),
            values: values.len(),
        });
    }
    for (index, (p, v)) in points.iter().zip(values).enumerate() {
        space.check_point(p)?;
        if !v.is_finite() || p.iter().any(|x| !x.is_finite()) {
            return Err(OptimizerError::NonFinite { index });
        }
    }
    Ok(())
}

/// Uniform random proposals. Baseline for the surrogate-guided optimizer.
pub struct RandomSearchOptimizer {
    space: SearchSpace,
    observations: Vec<Observation>,
    rng: StdRng,
}

impl RandomSearchOptimizer {
    pub fn new(space: SearchSpace, seed: u64) -> Self {
        Self {
            space,
            observations: Vec::new(),
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl SequentialOptimizer for RandomSearchOptimizer {
    fn space(&self) -> &SearchSpace {
        &self.space
    }

    fn ask(&mut self, n: usize) -> Vec<Vec<f64>> {
        (0..n).map(|_| self.space.sample(&mut self.rng)).collect()
    }

    fn tell(&mut self, points: &[Vec<f64>], values: &[f64]) -> Result<(), OptimizerError> {
        validate_batch(&self.space, points, values)?;
        self.observations
            .extend(points.iter().zip(values).map(|(p, v)| Observation {
                point: p.clone(),
                value: *v,
            }));
        Ok(())
    }

    fn observations(&self) -> &[Observation] {
        &self.observations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tensors::Dimension;

    fn unit_cube(d: usize) -> SearchSpace {
        SearchSpace::new((0..d).map(|i| Dimension::new(&format!("x{i}"), 0.0, 1.0)).collect())
            .unwrap()
    }

    #[test]
    fn test_best_prefers_first_on_ties() {
        let obs = vec![
            Observation { point: vec![0.1], value: 2.0 },
            Observation { point: vec![0.2], value: -1.0 },
            Observation { point: vec![0.3], value: -1.0 },
        ];
        assert_eq!(best_observation(&obs).unwrap().point, vec![0.2]);
        assert!(best_observation(&[]).is_none());
    }

    #[test]
    fn test_tell_rejects_bad_batches_atomically() {
        let mut opt = RandomSearchOptimizer::new(unit_cube(2), 1);
        let err = opt.tell(&[vec![0.1, 0.2]], &[1.0, 2.0]).unwrap_err();
        assert_eq!(err, OptimizerError::LengthMismatch { points: 1, values: 2 });
        let err = opt
            .tell(&[vec![0.1, 0.2], vec![0.3]], &[1.0, 2.0])
            .unwrap_err();
        assert_eq!(err, OptimizerError::DimensionMismatch { expected: 2, got: 1 });
        let err = opt.tell(&[vec![0.1, 0.2]], &[f64::NAN]).unwrap_err();
        assert_eq!(err, OptimizerError::NonFinite { index: 0 });
        assert!(opt.observations().is_empty());
    }

    #[test]
    fn test_random_search_ask_tell_best() {
        let mut opt = RandomSearchOptimizer::new(unit_cube(3), 42);
        let points = opt.ask(5);
        assert_eq!(points.len(), 5);
        let values = [0.5, -0.2, 0.9, -0.7, 0.1];
        opt.tell(&points, &values).unwrap();
        assert_eq!(opt.observations().len(), 5);
        let (best, value) = opt.best().unwrap();
        assert_eq!(value, -0.7);
        assert_eq!(best, points[3].as_slice());
    }
}
