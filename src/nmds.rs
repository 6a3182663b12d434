//! Non-metric multidimensional scaling.
//!
//! Minimizes Kruskal's stress-1 between embedding distances and a monotone
//! (isotonic) transform of the input dissimilarities. The optimization is a
//! simple gradient descent restarted from several seeded random
//! configurations; the best-stress configuration wins. Non-convergence is
//! reported through the `converged` flag with the best-found solution, never
//! silently.

use crate::error::{EcoError, Result};
use crate::matrix::EcoMatrix;
use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Configuration for an NMDS run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NmdsConfig {
    /// Number of embedding dimensions
    pub n_dims: usize,
    /// Number of random restarts; the best-stress solution is kept
    pub n_restarts: usize,
    /// Maximum gradient iterations per restart
    pub max_iter: usize,
    /// Convergence tolerance on the change in stress between iterations
    pub tolerance: f64,
    /// Base random seed; restart r uses `seed + r`
    pub seed: u64,
}

impl Default for NmdsConfig {
    fn default() -> Self {
        Self {
            n_dims: 2,
            n_restarts: 20,
            max_iter: 300,
            tolerance: 1e-7,
            seed: 42,
        }
    }
}

/// Result of an NMDS fit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NmdsResult {
    /// Sample scores, n × n_dims
    pub scores: EcoMatrix,
    /// Final Kruskal stress-1 of the winning restart
    pub stress: f64,
    /// Iterations used by the winning restart
    pub n_iterations: usize,
    /// Whether the winning restart's stress plateaued below tolerance
    pub converged: bool,
    /// Index of the winning restart
    pub best_restart: usize,
}

/// Pool-adjacent-violators isotonic regression (non-decreasing fit).
fn isotonic_regression(y: &[f64]) -> Vec<f64> {
    let n = y.len();
    if n == 0 {
        return Vec::new();
    }

    // Blocks of (weighted mean, count)
    let mut means: Vec<f64> = Vec::with_capacity(n);
    let mut counts: Vec<usize> = Vec::with_capacity(n);

    for &v in y {
        means.push(v);
        counts.push(1);
        while means.len() > 1 {
            let k = means.len();
            if means[k - 2] <= means[k - 1] {
                break;
            }
            let merged_count = counts[k - 2] + counts[k - 1];
            let merged_mean = (means[k - 2] * counts[k - 2] as f64
                + means[k - 1] * counts[k - 1] as f64)
                / merged_count as f64;
            means.truncate(k - 1);
            counts.truncate(k - 1);
            *means.last_mut().unwrap() = merged_mean;
            *counts.last_mut().unwrap() = merged_count;
        }
    }

    let mut out = Vec::with_capacity(n);
    for (m, c) in means.iter().zip(counts.iter()) {
        out.extend(std::iter::repeat(*m).take(*c));
    }
    out
}

struct SingleRun {
    coords: Vec<Vec<f64>>,
    stress: f64,
    n_iterations: usize,
    converged: bool,
}

/// One gradient-descent run from a seeded random configuration.
fn nmds_single(
    dissim: &EcoMatrix,
    n_dims: usize,
    max_iter: usize,
    tolerance: f64,
    rng: &mut StdRng,
) -> SingleRun {
    let n = dissim.nrows();
    let d = n_dims;
    let learning_rate = 0.05;

    let mut coords: Vec<Vec<f64>> = (0..n)
        .map(|_| (0..d).map(|_| rng.gen_range(-1.0..1.0)).collect())
        .collect();

    // Upper-triangle pairs and their rank order by input dissimilarity
    let n_pairs = n * (n - 1) / 2;
    let mut orig = Vec::with_capacity(n_pairs);
    let mut pair_indices = Vec::with_capacity(n_pairs);
    for i in 0..n {
        for j in (i + 1)..n {
            orig.push(dissim[(i, j)]);
            pair_indices.push((i, j));
        }
    }
    let mut sort_order: Vec<usize> = (0..n_pairs).collect();
    sort_order.sort_by(|&a, &b| orig[a].partial_cmp(&orig[b]).unwrap());

    let mut prev_stress = f64::MAX;
    let mut converged = false;
    let mut n_iterations = 0;
    let mut embed = vec![0.0; n_pairs];
    let mut disparities = vec![0.0; n_pairs];

    for iter in 0..max_iter {
        n_iterations = iter + 1;

        for (idx, &(i, j)) in pair_indices.iter().enumerate() {
            let mut d2 = 0.0;
            for k in 0..d {
                let diff = coords[i][k] - coords[j][k];
                d2 += diff * diff;
            }
            embed[idx] = d2.sqrt();
        }

        // Monotone disparities: PAVA over embedding distances in rank order
        let sorted_embed: Vec<f64> = sort_order.iter().map(|&i| embed[i]).collect();
        let iso = isotonic_regression(&sorted_embed);
        for (rank, &orig_idx) in sort_order.iter().enumerate() {
            disparities[orig_idx] = iso[rank];
        }

        // Kruskal stress-1
        let mut num = 0.0;
        let mut den = 0.0;
        for idx in 0..n_pairs {
            let diff = embed[idx] - disparities[idx];
            num += diff * diff;
            den += embed[idx] * embed[idx];
        }
        let stress = if den > 0.0 { (num / den).sqrt() } else { 0.0 };

        if (prev_stress - stress).abs() < tolerance {
            converged = true;
            prev_stress = stress;
            break;
        }
        prev_stress = stress;

        for (idx, &(i, j)) in pair_indices.iter().enumerate() {
            let ed = embed[idx];
            if ed < 1e-15 {
                continue;
            }
            let scale = learning_rate * (disparities[idx] - ed) / ed;
            for k in 0..d {
                let diff = coords[i][k] - coords[j][k];
                let delta = scale * diff;
                coords[i][k] += delta;
                coords[j][k] -= delta;
            }
        }
    }

    SingleRun {
        coords,
        stress: prev_stress,
        n_iterations,
        converged,
    }
}

/// Fit NMDS to a symmetric pairwise dissimilarity matrix.
///
/// Restarts `config.n_restarts` times from distinct seeded configurations
/// and keeps the lowest-stress solution.
pub fn nmds(dissim: &EcoMatrix, config: &NmdsConfig) -> Result<NmdsResult> {
    let n = dissim.nrows();
    if dissim.ncols() != n {
        return Err(EcoError::InvalidConfig(format!(
            "nmds requires a square dissimilarity matrix, got {}x{}",
            n,
            dissim.ncols()
        )));
    }
    if n < 3 {
        return Err(EcoError::InvalidConfig(format!(
            "nmds requires at least 3 samples, got {n}"
        )));
    }
    if config.n_dims == 0 {
        return Err(EcoError::InvalidConfig("nmds n_dims must be > 0".into()));
    }
    if config.n_restarts == 0 {
        return Err(EcoError::InvalidConfig("nmds n_restarts must be > 0".into()));
    }

    let mut best: Option<(usize, SingleRun)> = None;
    for restart in 0..config.n_restarts {
        let mut rng = StdRng::seed_from_u64(config.seed.wrapping_add(restart as u64));
        let run = nmds_single(
            dissim,
            config.n_dims,
            config.max_iter,
            config.tolerance,
            &mut rng,
        );
        debug!(
            "nmds restart {restart}: stress {:.6} after {} iterations (converged: {})",
            run.stress, run.n_iterations, run.converged
        );
        let better = match &best {
            Some((_, b)) => run.stress < b.stress,
            None => true,
        };
        if better {
            best = Some((restart, run));
        }
    }

    let (best_restart, run) = best.unwrap();
    let scores = EcoMatrix::from_rows(&run.coords).unwrap();

    Ok(NmdsResult {
        scores,
        stress: run.stress,
        n_iterations: run.n_iterations,
        converged: run.converged,
        best_restart,
    })
}
