// SPDX-FileCopyrightText: 2026 Santhosh Shyamsundar, Prabhu S., and Studio Tyto
// SPDX-License-Identifier: MIT
//! Gaussian-process optimizer with Expected Improvement.
//!
//! Surrogate: Matérn 5/2 kernel with ARD lengthscales (per-dimension spread
//! of the training inputs, floored at 0.01) on inputs scaled to the unit
//! cube, standardized targets, Cholesky fit over every observation. The
//! training set is sorted before fitting, so the order of `tell` calls does
//! not change what `ask` proposes.
//!
//! `ask(n)` splits the batch: `floor(n · explore_ratio)` uniform random
//! points, the rest maximize EI over random candidates. Several exploit
//! points in one batch are spread with the constant-liar heuristic.
//! Until `n_initial` observations exist every proposal is random.

use super::{validate_batch, Observation, SequentialOptimizer};
use crate::error::OptimizerError;
use crate::tensors::SearchSpace;
use nalgebra::{DMatrix, DVector};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::cmp::Ordering;

const DEFAULT_CANDIDATES: usize = 1000;
const DEFAULT_NOISE_VAR: f64 = 1e-6;

#[derive(Clone, Debug)]
pub struct GpSettings {
    /// Observations required before the surrogate is used.
    pub n_initial: usize,
    /// Random candidates scored per EI maximization.
    pub n_candidates: usize,
    pub noise_variance: f64,
    /// Fraction of each batch drawn uniformly at random, in [0, 1].
    pub explore_ratio: f64,
}

impl Default for GpSettings {
    fn default() -> Self {
        Self {
            n_initial: 5,
            n_candidates: DEFAULT_CANDIDATES,
            noise_variance: DEFAULT_NOISE_VAR,
            explore_ratio: 0.25,
        }
    }
}

pub struct GaussianProcessOptimizer {
    space: SearchSpace,
    settings: GpSettings,
    observations: Vec<Observation>,
    rng: StdRng,
}

impl GaussianProcessOptimizer {
    pub fn new(space: SearchSpace, settings: GpSettings, seed: u64) -> Self {
        Self {
            space,
            settings,
            observations: Vec::new(),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// (exploit, explore) counts for a batch of `n`.
    pub fn split(&self, n: usize) -> (usize, usize) {
        let ratio = self.settings.explore_ratio.clamp(0.0, 1.0);
        let n_explore = ((n as f64) * ratio).floor() as usize;
        (n - n_explore, n_explore)
    }

    fn propose_exploit(&mut self, n: usize) -> Vec<Vec<f64>> {
        if n == 0 {
            return Vec::new();
        }
        if self.observations.len() < self.settings.n_initial {
            return (0..n).map(|_| self.space.sample(&mut self.rng)).collect();
        }

        let mut sorted: Vec<&Observation> = self.observations.iter().collect();
        sorted.sort_by(|a, b| canonical_order(a, b));
        let mut x: Vec<Vec<f64>> = sorted.iter().map(|o| self.space.normalize(&o.point)).collect();
        let mut y: Vec<f64> = sorted.iter().map(|o| o.value).collect();
        let liar = y.iter().copied().fold(f64::INFINITY, f64::min);

        let mut out = Vec::with_capacity(n);
        for _ in 0..n {
            let unit = match fit_gp(&x, &y, self.settings.noise_variance) {
                Some(model) => optimize_acquisition(
                    &model,
                    self.space.len(),
                    self.settings.n_candidates,
                    &mut self.rng,
                ),
                None => {
                    log::warn!("GP fit failed; falling back to a random proposal");
                    let p = self.space.sample(&mut self.rng);
                    self.space.normalize(&p)
                }
            };
            // Pending point pretends to have hit the incumbent.
            x.push(unit.clone());
            y.push(liar);
            out.push(self.space.denormalize(&unit));
        }
        out
    }
}

impl SequentialOptimizer for GaussianProcessOptimizer {
    fn space(&self) -> &SearchSpace {
        &self.space
    }

    fn ask(&mut self, n: usize) -> Vec<Vec<f64>> {
        let (n_exploit, n_explore) = self.split(n);
        let mut points = self.propose_exploit(n_exploit);
        for _ in 0..n_explore {
            points.push(self.space.sample(&mut self.rng));
        }
        points
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

/// Value first, then coordinates; total over f64.
fn canonical_order(a: &Observation, b: &Observation) -> Ordering {
    a.value.total_cmp(&b.value).then_with(|| {
        a.point
            .iter()
            .zip(&b.point)
            .map(|(p, q)| p.total_cmp(q))
            .find(|o| o.is_ne())
            .unwrap_or(Ordering::Equal)
    })
}

// ---------------------------------------------------------------------------
// Surrogate
// ---------------------------------------------------------------------------

struct GpModel {
    cholesky: nalgebra::linalg::Cholesky<f64, nalgebra::Dyn>,
    alpha: DVector<f64>,
    x_train: Vec<Vec<f64>>,
    lengthscales: Vec<f64>,
    /// Best standardized target.
    f_best: f64,
}

/// σ² (1 + √5 r + 5/3 r²) exp(−√5 r), σ² = 1.
fn matern52(x1: &[f64], x2: &[f64], lengthscales: &[f64]) -> f64 {
    let r_sq: f64 = x1
        .iter()
        .zip(x2)
        .zip(lengthscales)
        .map(|((a, b), l)| ((a - b) / l).powi(2))
        .sum();
    let sqrt5_r = 5f64.sqrt() * r_sq.sqrt();
    (1.0 + sqrt5_r + 5.0 / 3.0 * r_sq) * (-sqrt5_r).exp()
}

fn fit_gp(x_train: &[Vec<f64>], y_train: &[f64], noise_var: f64) -> Option<GpModel> {
    let n = y_train.len();
    if n == 0 {
        return None;
    }

    let y_mean = y_train.iter().sum::<f64>() / n as f64;
    let y_var = if n > 1 {
        y_train.iter().map(|y| (y - y_mean).powi(2)).sum::<f64>() / (n - 1) as f64
    } else {
        1.0
    };
    let y_std = y_var.sqrt().max(1e-10);
    let y_standardized: Vec<f64> = y_train.iter().map(|y| (y - y_mean) / y_std).collect();
    let f_best = y_standardized.iter().copied().fold(f64::INFINITY, f64::min);

    let d = x_train[0].len();
    let lengthscales: Vec<f64> = (0..d)
        .map(|j| {
            let mean_j = x_train.iter().map(|x| x[j]).sum::<f64>() / n as f64;
            let var_j = x_train.iter().map(|x| (x[j] - mean_j).powi(2)).sum::<f64>() / n as f64;
            var_j.sqrt().max(0.01)
        })
        .collect();

    let k = DMatrix::from_fn(n, n, |i, j| {
        let v = matern52(&x_train[i], &x_train[j], &lengthscales);
        if i == j {
            v + noise_var
        } else {
            v
        }
    });
    let cholesky = nalgebra::linalg::Cholesky::new(k)?;
    let alpha = cholesky.solve(&DVector::from_column_slice(&y_standardized));

    Some(GpModel {
        cholesky,
        alpha,
        x_train: x_train.to_vec(),
        lengthscales,
        f_best,
    })
}

/// Posterior (mean, std) in standardized units.
fn predict(model: &GpModel, x: &[f64]) -> (f64, f64) {
    let k_star = DVector::from_fn(model.x_train.len(), |i, _| {
        matern52(x, &model.x_train[i], &model.lengthscales)
    });
    let mean = k_star.dot(&model.alpha);
    let v = model.cholesky.solve(&k_star);
    let var = (1.0 - k_star.dot(&v)).max(0.0);
    (mean, var.sqrt())
}

fn norm_pdf(x: f64) -> f64 {
    const INV_SQRT_2PI: f64 = 0.398_942_280_401_432_7;
    INV_SQRT_2PI * (-0.5 * x * x).exp()
}

/// Hart rational approximation.
fn norm_cdf(x: f64) -> f64 {
    if x < -8.0 {
        return 0.0;
    }
    if x > 8.0 {
        return 1.0;
    }
    let t = 1.0 / (1.0 + 0.231_641_9 * x.abs());
    let poly = t
        * (0.319_381_530
            + t * (-0.356_563_782 + t * (1.781_477_937 + t * (-1.821_255_978 + t * 1.330_274_429))));
    let cdf = 1.0 - norm_pdf(x.abs()) * poly;
    if x >= 0.0 {
        cdf
    } else {
        1.0 - cdf
    }
}

/// EI for minimization.
fn expected_improvement(mean: f64, std: f64, f_best: f64) -> f64 {
    if std < 1e-12 {
        return (f_best - mean).max(0.0);
    }
    let z = (f_best - mean) / std;
    ((f_best - mean) * norm_cdf(z) + std * norm_pdf(z)).max(0.0)
}

fn optimize_acquisition(model: &GpModel, d: usize, n_candidates: usize, rng: &mut StdRng) -> Vec<f64> {
    let mut best_ei = f64::NEG_INFINITY;
    let mut best_x = vec![0.5; d];
    for _ in 0..n_candidates.max(1) {
        let x: Vec<f64> = (0..d).map(|_| rng.gen::<f64>()).collect();
        let (mean, std) = predict(model, &x);
        let ei = expected_improvement(mean, std, model.f_best);
        if ei > best_ei {
            best_ei = ei;
            best_x = x;
        }
    }
    best_x
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tensors::Dimension;

    fn cube(d: usize) -> SearchSpace {
        SearchSpace::new((0..d).map(|i| Dimension::new(&format!("x{i}"), 0.0, 1.0)).collect())
            .unwrap()
    }

    fn quadratic(p: &[f64]) -> f64 {
        p.iter().map(|x| (x - 0.3).powi(2)).sum()
    }

    #[test]
    fn test_norm_cdf_reference_values() {
        assert!((norm_cdf(0.0) - 0.5).abs() < 1e-7);
        assert!((norm_cdf(1.96) - 0.975).abs() < 1e-4);
        assert!((norm_cdf(-1.0) - 0.158_655_25).abs() < 1e-5);
    }

    #[test]
    fn test_expected_improvement_floors() {
        assert_eq!(expected_improvement(1.0, 0.0, 0.5), 0.0);
        assert_eq!(expected_improvement(0.2, 0.0, 0.5), 0.3);
        assert!(expected_improvement(0.5, 1.0, 0.5) > 0.0);
    }

    #[test]
    fn test_gp_interpolates_training_data() {
        let x = vec![vec![0.1], vec![0.5], vec![0.9]];
        let y = vec![1.0, -1.0, 2.0];
        let model = fit_gp(&x, &y, 1e-6).unwrap();
        let (m_mid, s_mid) = predict(&model, &[0.5]);
        // Standardized target of the middle point is the minimum.
        assert!((m_mid - model.f_best).abs() < 1e-3, "mean {m_mid} vs {}", model.f_best);
        assert!(s_mid < 1e-2);
    }

    #[test]
    fn test_ask_five_tell_five_end_to_end() {
        let mut opt = GaussianProcessOptimizer::new(cube(3), GpSettings::default(), 7);
        let points = opt.ask(5);
        assert_eq!(points.len(), 5);
        assert!(points.iter().all(|p| opt.space().contains(p)));
        let values: Vec<f64> = points.iter().map(|p| quadratic(p)).collect();
        opt.tell(&points, &values).unwrap();
        assert_eq!(opt.observations().len(), 5);

        let min_idx = values
            .iter()
            .enumerate()
            .fold(0, |best, (i, v)| if *v < values[best] { i } else { best });
        let (best, value) = opt.best().unwrap();
        assert_eq!(value, values[min_idx]);
        assert_eq!(best, points[min_idx].as_slice());
    }

    #[test]
    fn test_surrogate_phase_proposes_in_bounds_batches() {
        let settings = GpSettings {
            n_candidates: 200,
            explore_ratio: 0.25,
            ..Default::default()
        };
        let mut opt = GaussianProcessOptimizer::new(cube(2), settings, 11);
        for _ in 0..3 {
            let pts = opt.ask(4);
            let vals: Vec<f64> = pts.iter().map(|p| quadratic(p)).collect();
            opt.tell(&pts, &vals).unwrap();
        }
        assert_eq!(opt.split(4), (3, 1));
        let batch = opt.ask(4);
        assert_eq!(batch.len(), 4);
        assert!(batch.iter().all(|p| opt.space().contains(p)));
        // Constant liar spreads the exploit points.
        assert_ne!(batch[0], batch[1]);
    }

    #[test]
    fn test_explore_ratio_is_clamped() {
        let opt = GaussianProcessOptimizer::new(
            cube(1),
            GpSettings {
                explore_ratio: 3.0,
                ..Default::default()
            },
            0,
        );
        assert_eq!(opt.split(4), (0, 4));
        let opt = GaussianProcessOptimizer::new(
            cube(1),
            GpSettings {
                explore_ratio: -1.0,
                ..Default::default()
            },
            0,
        );
        assert_eq!(opt.split(4), (4, 0));
    }

    #[test]
    fn test_best_is_order_insensitive() {
        let space = cube(3);
        let mut rng = StdRng::seed_from_u64(3);
        let points: Vec<Vec<f64>> = (0..8).map(|_| space.sample(&mut rng)).collect();
        let values: Vec<f64> = points.iter().map(|p| quadratic(p)).collect();

        let mut forward = GaussianProcessOptimizer::new(space.clone(), GpSettings::default(), 1);
        forward.tell(&points, &values).unwrap();

        let mut rev_points = points.clone();
        rev_points.reverse();
        let mut rev_values = values.clone();
        rev_values.reverse();
        let mut backward = GaussianProcessOptimizer::new(space, GpSettings::default(), 1);
        for (p, v) in rev_points.iter().zip(&rev_values) {
            backward.tell(std::slice::from_ref(p), &[*v]).unwrap();
        }

        assert_eq!(forward.best().unwrap(), backward.best().unwrap());
    }

    #[test]
    fn test_tell_order_does_not_change_proposals() {
        let space = cube(2);
        // Good region first, so a recency window would drop it.
        let points: Vec<Vec<f64>> = (0..150)
            .map(|i| {
                let t = i as f64 / 150.0;
                if i < 50 {
                    vec![0.2 + 0.002 * (i % 10) as f64, 0.2 + 0.002 * (i / 10) as f64]
                } else {
                    vec![(0.37 * i as f64).fract(), 0.5 + 0.5 * t]
                }
            })
            .collect();
        let values: Vec<f64> = points
            .iter()
            .map(|p| (p[0] - 0.2).powi(2) + (p[1] - 0.2).powi(2))
            .collect();
        let settings = GpSettings {
            n_candidates: 200,
            explore_ratio: 0.0,
            ..Default::default()
        };

        let mut forward = GaussianProcessOptimizer::new(space.clone(), settings.clone(), 3);
        forward.tell(&points, &values).unwrap();

        let mut backward = GaussianProcessOptimizer::new(space, settings, 3);
        for (p, v) in points.iter().zip(&values).rev() {
            backward.tell(std::slice::from_ref(p), &[*v]).unwrap();
        }

        assert_eq!(forward.ask(2), backward.ask(2));
        assert_eq!(forward.observations().len(), 150);
    }
}
