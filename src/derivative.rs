//! Rate-of-change detection from a fitted smooth.
//!
//! The first derivative of the smooth is evaluated on a regular time grid by
//! central finite differences of the spline basis. The confidence band is
//! simultaneous, not pointwise: the critical value is the empirical quantile
//! of the maximum standardized deviation across the whole grid, taken over
//! seeded multivariate-normal simulations of coefficient deviations. A grid
//! point is a significant increase iff its lower bound exceeds zero, a
//! significant decrease iff its upper bound is below zero; contiguous runs
//! are merged into periods of rapid change.

use crate::error::{EcoError, Result};
use crate::gam::GamFit;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

/// Direction of a significant change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    /// Derivative confidence band entirely above zero
    Increasing,
    /// Derivative confidence band entirely below zero
    Decreasing,
}

/// A contiguous period of significant change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeInterval {
    /// First grid time of the run
    pub start: f64,
    /// Last grid time of the run
    pub end: f64,
    /// Direction of change over the run
    pub direction: Direction,
}

/// Configuration for the derivative band.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DerivativeConfig {
    /// Number of grid points across the fitted range
    pub n_grid: usize,
    /// Simultaneous coverage level of the band
    pub level: f64,
    /// Number of coefficient simulations for the critical value
    pub n_sim: usize,
    /// Seed for the simulation draws
    pub seed: u64,
}

impl Default for DerivativeConfig {
    fn default() -> Self {
        Self {
            n_grid: 200,
            level: 0.95,
            n_sim: 10_000,
            seed: 42,
        }
    }
}

/// First derivative of a fitted smooth with a simultaneous confidence band.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DerivativeBand {
    /// Grid times
    pub times: Vec<f64>,
    /// Derivative estimate at each grid time
    pub estimate: Vec<f64>,
    /// Simultaneous lower bound
    pub lower: Vec<f64>,
    /// Simultaneous upper bound
    pub upper: Vec<f64>,
    /// Coverage level of the band
    pub level: f64,
    /// Critical multiplier applied to the pointwise standard errors
    pub critical_value: f64,
}

impl DerivativeBand {
    /// Significance classification of one grid point.
    ///
    /// `Some(direction)` iff zero lies outside `[lower, upper]`.
    pub fn classify(&self, idx: usize) -> Option<Direction> {
        if self.lower[idx] > 0.0 {
            Some(Direction::Increasing)
        } else if self.upper[idx] < 0.0 {
            Some(Direction::Decreasing)
        } else {
            None
        }
    }

    /// Contiguous significant runs as (start, end, direction) intervals.
    pub fn significant_intervals(&self) -> Vec<ChangeInterval> {
        let mut intervals = Vec::new();
        let mut current: Option<(usize, Direction)> = None;

        for idx in 0..self.times.len() {
            let class = self.classify(idx);
            match (&current, class) {
                (None, Some(dir)) => current = Some((idx, dir)),
                (Some((start, dir)), Some(new_dir)) if *dir != new_dir => {
                    intervals.push(ChangeInterval {
                        start: self.times[*start],
                        end: self.times[idx - 1],
                        direction: *dir,
                    });
                    current = Some((idx, new_dir));
                }
                (Some((start, dir)), None) => {
                    intervals.push(ChangeInterval {
                        start: self.times[*start],
                        end: self.times[idx - 1],
                        direction: *dir,
                    });
                    current = None;
                }
                _ => {}
            }
        }
        if let Some((start, dir)) = current {
            intervals.push(ChangeInterval {
                start: self.times[start],
                end: *self.times.last().unwrap(),
                direction: dir,
            });
        }

        intervals
    }
}

/// Compute the derivative band for a fitted smooth.
pub fn derivative_band(fit: &GamFit, config: &DerivativeConfig) -> Result<DerivativeBand> {
    if config.n_grid < 2 {
        return Err(EcoError::InvalidConfig(format!(
            "derivative grid needs at least 2 points, got {}",
            config.n_grid
        )));
    }
    if !(0.0..1.0).contains(&config.level) || config.level <= 0.0 {
        return Err(EcoError::InvalidConfig(format!(
            "band level must be in (0, 1), got {}",
            config.level
        )));
    }
    if config.n_sim < 100 {
        return Err(EcoError::InvalidConfig(format!(
            "simultaneous band needs at least 100 simulations, got {}",
            config.n_sim
        )));
    }

    let (t_min, t_max) = fit.basis.range();
    let range = t_max - t_min;
    let h = range * 1e-5;
    let n_grid = config.n_grid;

    // Grid pulled inward by h so the finite-difference stencil never clamps
    let times: Vec<f64> = (0..n_grid)
        .map(|i| t_min + h + (range - 2.0 * h) * i as f64 / (n_grid - 1) as f64)
        .collect();

    let nb = fit.basis.n_basis();
    let beta = nalgebra::DVector::from_column_slice(&fit.coefficients);

    // Finite-difference derivative design: (B(t+h) - B(t-h)) / 2h
    let mut deriv_design = nalgebra::DMatrix::zeros(n_grid, nb);
    for (i, &t) in times.iter().enumerate() {
        let fwd = fit.basis.evaluate(t + h);
        let bwd = fit.basis.evaluate(t - h);
        for j in 0..nb {
            deriv_design[(i, j)] = (fwd[j] - bwd[j]) / (2.0 * h);
        }
    }

    let estimate_vec = &deriv_design * &beta;
    let estimate: Vec<f64> = estimate_vec.iter().cloned().collect();

    // Pointwise standard errors from the coefficient covariance
    let vb = fit.coef_covariance.to_dmatrix();
    let xv = &deriv_design * &vb;
    let se: Vec<f64> = (0..n_grid)
        .map(|i| {
            let var: f64 = (0..nb).map(|j| xv[(i, j)] * deriv_design[(i, j)]).sum();
            var.max(0.0).sqrt()
        })
        .collect();

    // Cholesky of the coefficient covariance; a small ridge rescues the
    // positive-semidefinite case produced by heavy smoothing
    let chol = nalgebra::Cholesky::new(vb.clone()).or_else(|| {
        let max_diag = (0..nb).map(|i| vb[(i, i)]).fold(0.0_f64, f64::max);
        let ridge = nalgebra::DMatrix::identity(nb, nb) * (max_diag * 1e-8 + 1e-12);
        nalgebra::Cholesky::new(&vb + ridge)
    });
    let chol = chol.ok_or_else(|| {
        EcoError::SingularFit("coefficient covariance is not positive definite".into())
    })?;
    let l = chol.l();

    // Max-|standardized deviation| statistic over seeded coefficient draws
    let mut rng = StdRng::seed_from_u64(config.seed);
    let std_normal = Normal::new(0.0, 1.0).unwrap();
    let mut max_stats = Vec::with_capacity(config.n_sim);
    for _ in 0..config.n_sim {
        let u = nalgebra::DVector::from_iterator(
            nb,
            (0..nb).map(|_| std_normal.sample(&mut rng)),
        );
        let dev = &deriv_design * (&l * u);
        let stat = (0..n_grid)
            .map(|i| {
                if se[i] > 0.0 {
                    (dev[i] / se[i]).abs()
                } else {
                    0.0
                }
            })
            .fold(0.0_f64, f64::max);
        max_stats.push(stat);
    }
    max_stats.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let q_idx = ((config.level * config.n_sim as f64).ceil() as usize)
        .clamp(1, config.n_sim)
        - 1;
    let critical_value = max_stats[q_idx];

    let lower: Vec<f64> = estimate
        .iter()
        .zip(&se)
        .map(|(&e, &s)| e - critical_value * s)
        .collect();
    let upper: Vec<f64> = estimate
        .iter()
        .zip(&se)
        .map(|(&e, &s)| e + critical_value * s)
        .collect();

    Ok(DerivativeBand {
        times,
        estimate,
        lower,
        upper,
        level: config.level,
        critical_value,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gam::{fit_smooth, GamConfig};

    fn fit_linear_up() -> GamFit {
        let t: Vec<f64> = (0..60).map(|i| i as f64 * 10.0).collect();
        let y: Vec<f64> = t.iter().map(|&ti| 0.02 * ti).collect();
        fit_smooth(&t, &y, &GamConfig::default()).unwrap()
    }

    fn fit_flat() -> GamFit {
        let t: Vec<f64> = (0..60).map(|i| i as f64 * 10.0).collect();
        // Alternating wiggle around a constant; far above any basis frequency
        let y: Vec<f64> = (0..60)
            .map(|i| 1.0 + if i % 2 == 0 { 0.001 } else { -0.001 })
            .collect();
        fit_smooth(&t, &y, &GamConfig::default()).unwrap()
    }

    // ============== Band construction ==============

    #[test]
    fn test_linear_trend_positive_derivative() {
        let fit = fit_linear_up();
        let band = derivative_band(&fit, &DerivativeConfig::default()).unwrap();
        // Estimated slope near 0.02 everywhere
        for &e in &band.estimate {
            assert!((e - 0.02).abs() < 0.01, "derivative {e} far from 0.02");
        }
    }

    #[test]
    fn test_linear_trend_flagged_increasing() {
        let fit = fit_linear_up();
        let band = derivative_band(&fit, &DerivativeConfig::default()).unwrap();
        let intervals = band.significant_intervals();
        assert!(!intervals.is_empty());
        assert!(intervals
            .iter()
            .all(|iv| iv.direction == Direction::Increasing));
    }

    #[test]
    fn test_flat_series_no_significant_change() {
        let fit = fit_flat();
        let band = derivative_band(&fit, &DerivativeConfig::default()).unwrap();
        let n_sig = (0..band.times.len())
            .filter(|&i| band.classify(i).is_some())
            .count();
        assert_eq!(n_sig, 0, "flat series should show no significant change");
    }

    #[test]
    fn test_classification_matches_band_sign() {
        let fit = fit_linear_up();
        let band = derivative_band(&fit, &DerivativeConfig::default()).unwrap();
        for i in 0..band.times.len() {
            let zero_outside = band.lower[i] > 0.0 || band.upper[i] < 0.0;
            assert_eq!(band.classify(i).is_some(), zero_outside);
        }
    }

    #[test]
    fn test_band_contains_estimate() {
        let fit = fit_linear_up();
        let band = derivative_band(&fit, &DerivativeConfig::default()).unwrap();
        for i in 0..band.times.len() {
            assert!(band.lower[i] <= band.estimate[i]);
            assert!(band.estimate[i] <= band.upper[i]);
        }
    }

    #[test]
    fn test_band_reproducible_with_seed() {
        let fit = fit_linear_up();
        let a = derivative_band(&fit, &DerivativeConfig::default()).unwrap();
        let b = derivative_band(&fit, &DerivativeConfig::default()).unwrap();
        assert_eq!(a.critical_value, b.critical_value);
        assert_eq!(a.lower, b.lower);
    }

    #[test]
    fn test_simultaneous_wider_than_pointwise() {
        // The simultaneous critical value must exceed the pointwise
        // normal quantile (1.96 at 95%)
        let fit = fit_linear_up();
        let band = derivative_band(&fit, &DerivativeConfig::default()).unwrap();
        assert!(
            band.critical_value > 1.96,
            "simultaneous critical value {} should exceed 1.96",
            band.critical_value
        );
    }

    // ============== Interval extraction ==============

    #[test]
    fn test_intervals_merge_contiguous_runs() {
        let band = DerivativeBand {
            times: vec![0.0, 1.0, 2.0, 3.0, 4.0],
            estimate: vec![1.0, 1.0, 0.0, -1.0, -1.0],
            lower: vec![0.5, 0.5, -0.5, -1.5, -1.5],
            upper: vec![1.5, 1.5, 0.5, -0.5, -0.5],
            level: 0.95,
            critical_value: 2.5,
        };
        let intervals = band.significant_intervals();
        assert_eq!(intervals.len(), 2);
        assert_eq!(intervals[0].direction, Direction::Increasing);
        assert_eq!(intervals[0].start, 0.0);
        assert_eq!(intervals[0].end, 1.0);
        assert_eq!(intervals[1].direction, Direction::Decreasing);
        assert_eq!(intervals[1].start, 3.0);
        assert_eq!(intervals[1].end, 4.0);
    }

    #[test]
    fn test_interval_spans_to_last_grid_point() {
        let band = DerivativeBand {
            times: vec![0.0, 1.0, 2.0],
            estimate: vec![1.0, 1.0, 1.0],
            lower: vec![0.5, 0.5, 0.5],
            upper: vec![1.5, 1.5, 1.5],
            level: 0.95,
            critical_value: 2.5,
        };
        let intervals = band.significant_intervals();
        assert_eq!(intervals.len(), 1);
        assert_eq!(intervals[0].end, 2.0);
    }

    // ============== Validation ==============

    #[test]
    fn test_rejects_bad_config() {
        let fit = fit_linear_up();
        let mut config = DerivativeConfig::default();
        config.n_grid = 1;
        assert!(derivative_band(&fit, &config).is_err());

        let mut config = DerivativeConfig::default();
        config.level = 1.5;
        assert!(derivative_band(&fit, &config).is_err());

        let mut config = DerivativeConfig::default();
        config.n_sim = 10;
        assert!(derivative_band(&fit, &config).is_err());
    }
}
