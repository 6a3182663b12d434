//! Model-based ordination: Bayesian latent-variable count regression.
//!
//! Taxa counts are modelled on the log scale as taxon intercept + optional
//! per-sample row effect + inner product of latent sample scores and taxon
//! loadings. The posterior is explored by random-walk Metropolis within
//! Gibbs; posterior-mean scores are the ordination, posterior-mean loadings
//! the per-taxon axis contributions. A fixed seed makes chains
//! bit-reproducible.
//!
//! Identification follows the usual latent-factor constraint: loadings form
//! a lower-triangular matrix with positive diagonal.

use crate::error::{EcoError, Result};
use crate::matrix::EcoMatrix;
use crate::numeric::ln_gamma;
use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

/// Count likelihood family.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum CountFamily {
    /// Poisson with log link
    Poisson,
    /// Negative binomial with log link and per-taxon dispersion
    NegBinomial,
}

/// Configuration for the latent-variable model sampler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LvmConfig {
    /// Number of latent factors (2 for ordination plots)
    pub n_latent: usize,
    /// Count likelihood family
    pub family: CountFamily,
    /// Whether to include per-sample row effects absorbing effort differences
    pub row_effects: bool,
    /// Burn-in iterations discarded before accumulation
    pub n_burnin: usize,
    /// Post-burn-in iterations
    pub n_samples: usize,
    /// Keep every `thin`-th post-burn-in iteration
    pub thin: usize,
    /// Random-walk proposal standard deviation
    pub proposal_sd: f64,
    /// Random seed for the chain
    pub seed: u64,
}

impl Default for LvmConfig {
    fn default() -> Self {
        Self {
            n_latent: 2,
            family: CountFamily::NegBinomial,
            row_effects: true,
            n_burnin: 2000,
            n_samples: 8000,
            thin: 10,
            proposal_sd: 0.15,
            seed: 42,
        }
    }
}

/// Result of the latent-variable ordination.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LvmResult {
    /// Posterior-mean sample scores, n × n_latent
    pub scores: EcoMatrix,
    /// Posterior-mean taxon loadings, p × n_latent
    pub loadings: EcoMatrix,
    /// Posterior-mean taxon intercepts
    pub intercepts: Vec<f64>,
    /// Posterior-mean row effects (empty when disabled)
    pub row_effects: Vec<f64>,
    /// Posterior-mean per-taxon dispersions (empty for Poisson)
    pub dispersions: Vec<f64>,
    /// Acceptance rate of score proposals
    pub acceptance_scores: f64,
    /// Acceptance rate of taxon-parameter proposals
    pub acceptance_taxa: f64,
    /// Posterior mean deviance (-2 log-likelihood)
    pub mean_deviance: f64,
    /// Number of posterior draws retained
    pub n_kept: usize,
}

/// Log-likelihood of one count under the linear predictor `eta`.
fn count_ln_lik(y: f64, eta: f64, family: CountFamily, dispersion: f64) -> f64 {
    // Clamp eta so exp() cannot overflow during early chain wandering
    let eta = eta.clamp(-30.0, 30.0);
    let mu = eta.exp();
    match family {
        CountFamily::Poisson => y * eta - mu - ln_gamma(y + 1.0),
        CountFamily::NegBinomial => {
            let phi = dispersion;
            ln_gamma(y + phi) - ln_gamma(phi) - ln_gamma(y + 1.0)
                + phi * (phi / (phi + mu)).ln()
                + y * (mu / (phi + mu)).ln()
        }
    }
}

/// Weak normal prior used for intercepts, loadings, and row effects.
fn ln_prior_weak(x: f64) -> f64 {
    // N(0, 10^2), constant terms dropped
    -0.5 * x * x / 100.0
}

/// Standard-normal prior for latent scores (constant terms dropped).
fn ln_prior_score(x: f64) -> f64 {
    -0.5 * x * x
}

struct ChainState {
    /// Latent scores, n × k (row-major for cheap per-sample access)
    z: Vec<Vec<f64>>,
    /// Loadings, p × k, lower-triangular with positive diagonal
    lambda: Vec<Vec<f64>>,
    /// Taxon intercepts
    beta0: Vec<f64>,
    /// Row effects (zeros when disabled)
    alpha: Vec<f64>,
    /// Per-taxon NB dispersion (unused for Poisson)
    phi: Vec<f64>,
}

impl ChainState {
    fn eta(&self, i: usize, j: usize) -> f64 {
        let mut e = self.beta0[j] + self.alpha[i];
        for k in 0..self.lambda[j].len() {
            e += self.z[i][k] * self.lambda[j][k];
        }
        e
    }

    /// Log-likelihood contribution of sample row i.
    fn row_ln_lik(&self, counts: &EcoMatrix, i: usize, family: CountFamily) -> f64 {
        (0..counts.ncols())
            .map(|j| count_ln_lik(counts[(i, j)], self.eta(i, j), family, self.phi[j]))
            .sum()
    }

    /// Log-likelihood contribution of taxon column j.
    fn col_ln_lik(&self, counts: &EcoMatrix, j: usize, family: CountFamily) -> f64 {
        (0..counts.nrows())
            .map(|i| count_ln_lik(counts[(i, j)], self.eta(i, j), family, self.phi[j]))
            .sum()
    }

    fn total_ln_lik(&self, counts: &EcoMatrix, family: CountFamily) -> f64 {
        (0..counts.nrows())
            .map(|i| self.row_ln_lik(counts, i, family))
            .sum()
    }
}

/// Fit the latent-variable ordination by MCMC.
///
/// Counts must be non-negative; the table constructor already guarantees
/// this for matrices taken from an `AssemblageTable`.
pub fn lvm_ordination(counts: &EcoMatrix, config: &LvmConfig) -> Result<LvmResult> {
    let (n, p) = counts.shape();
    if n == 0 || p == 0 {
        return Err(EcoError::InvalidConfig(
            "lvm requires a non-empty count matrix".into(),
        ));
    }
    if config.n_latent == 0 || config.n_latent > p {
        return Err(EcoError::InvalidConfig(format!(
            "n_latent must be in [1, {p}], got {}",
            config.n_latent
        )));
    }
    if config.thin == 0 || config.n_samples == 0 {
        return Err(EcoError::InvalidConfig(
            "n_samples and thin must be positive".into(),
        ));
    }
    if config.proposal_sd <= 0.0 {
        return Err(EcoError::InvalidConfig(
            "proposal_sd must be positive".into(),
        ));
    }

    let k = config.n_latent;
    let family = config.family;
    let mut rng = StdRng::seed_from_u64(config.seed);
    let proposal = Normal::new(0.0, config.proposal_sd).unwrap();

    // Initialize: scores and off-diagonal loadings near zero, positive
    // diagonal loadings, intercepts at log row-mean counts.
    let mut state = ChainState {
        z: (0..n)
            .map(|_| (0..k).map(|_| 0.1 * proposal.sample(&mut rng)).collect())
            .collect(),
        lambda: (0..p)
            .map(|j| {
                (0..k)
                    .map(|l| {
                        if l > j {
                            0.0
                        } else if l == j {
                            1.0
                        } else {
                            0.1 * proposal.sample(&mut rng)
                        }
                    })
                    .collect()
            })
            .collect(),
        beta0: (0..p)
            .map(|j| {
                let col_mean =
                    counts.column(j).iter().sum::<f64>() / n as f64;
                (col_mean.max(0.1)).ln()
            })
            .collect(),
        alpha: vec![0.0; n],
        phi: vec![1.0; p],
    };

    let total_iter = config.n_burnin + config.n_samples;

    // Posterior accumulators
    let mut sum_z = vec![vec![0.0; k]; n];
    let mut sum_lambda = vec![vec![0.0; k]; p];
    let mut sum_beta0 = vec![0.0; p];
    let mut sum_alpha = vec![0.0; n];
    let mut sum_phi = vec![0.0; p];
    let mut sum_deviance = 0.0;
    let mut n_kept = 0usize;

    let mut score_accept = 0u64;
    let mut score_total = 0u64;
    let mut taxa_accept = 0u64;
    let mut taxa_total = 0u64;

    for iter in 0..total_iter {
        // --- Update latent scores, one coordinate at a time ---
        for i in 0..n {
            for l in 0..k {
                let old = state.z[i][l];
                let cur_ll = state.row_ln_lik(counts, i, family) + ln_prior_score(old);
                state.z[i][l] = old + proposal.sample(&mut rng);
                let new_ll =
                    state.row_ln_lik(counts, i, family) + ln_prior_score(state.z[i][l]);
                score_total += 1;
                if (new_ll - cur_ll).exp() > rng.gen::<f64>() {
                    score_accept += 1;
                } else {
                    state.z[i][l] = old;
                }
            }
        }

        // --- Update taxon parameters: intercept, free loadings, dispersion ---
        for j in 0..p {
            // Intercept
            let old = state.beta0[j];
            let cur_ll = state.col_ln_lik(counts, j, family) + ln_prior_weak(old);
            state.beta0[j] = old + proposal.sample(&mut rng);
            let new_ll = state.col_ln_lik(counts, j, family) + ln_prior_weak(state.beta0[j]);
            taxa_total += 1;
            if (new_ll - cur_ll).exp() > rng.gen::<f64>() {
                taxa_accept += 1;
            } else {
                state.beta0[j] = old;
            }

            // Loadings: lower triangle only; diagonal kept positive
            for l in 0..k.min(j + 1) {
                let old = state.lambda[j][l];
                let cur_ll = state.col_ln_lik(counts, j, family) + ln_prior_weak(old);
                let cand = old + proposal.sample(&mut rng);
                if l == j && cand <= 0.0 {
                    taxa_total += 1;
                    continue;
                }
                state.lambda[j][l] = cand;
                let new_ll =
                    state.col_ln_lik(counts, j, family) + ln_prior_weak(cand);
                taxa_total += 1;
                if (new_ll - cur_ll).exp() > rng.gen::<f64>() {
                    taxa_accept += 1;
                } else {
                    state.lambda[j][l] = old;
                }
            }

            // NB dispersion, random walk on the log scale
            if family == CountFamily::NegBinomial {
                let old = state.phi[j];
                let cur_ll = state.col_ln_lik(counts, j, family) + ln_prior_weak(old.ln());
                let cand = (old.ln() + proposal.sample(&mut rng)).exp();
                state.phi[j] = cand;
                let new_ll = state.col_ln_lik(counts, j, family) + ln_prior_weak(cand.ln());
                // Jacobian of the log-scale walk
                let log_ratio = new_ll - cur_ll + cand.ln() - old.ln();
                taxa_total += 1;
                if log_ratio.exp() > rng.gen::<f64>() {
                    taxa_accept += 1;
                } else {
                    state.phi[j] = old;
                }
            }
        }

        // --- Update row effects ---
        if config.row_effects {
            for i in 0..n {
                let old = state.alpha[i];
                let cur_ll = state.row_ln_lik(counts, i, family) + ln_prior_weak(old);
                state.alpha[i] = old + proposal.sample(&mut rng);
                let new_ll =
                    state.row_ln_lik(counts, i, family) + ln_prior_weak(state.alpha[i]);
                if (new_ll - cur_ll).exp() <= rng.gen::<f64>() {
                    state.alpha[i] = old;
                }
            }
        }

        // --- Accumulate posterior draws ---
        if iter >= config.n_burnin && (iter - config.n_burnin) % config.thin == 0 {
            for i in 0..n {
                for l in 0..k {
                    sum_z[i][l] += state.z[i][l];
                }
                sum_alpha[i] += state.alpha[i];
            }
            for j in 0..p {
                for l in 0..k {
                    sum_lambda[j][l] += state.lambda[j][l];
                }
                sum_beta0[j] += state.beta0[j];
                sum_phi[j] += state.phi[j];
            }
            sum_deviance += -2.0 * state.total_ln_lik(counts, family);
            n_kept += 1;
        }

        if iter % 1000 == 0 {
            debug!(
                "lvm chain iteration {iter}/{total_iter}, score acceptance {:.2}",
                score_accept as f64 / score_total.max(1) as f64
            );
        }
    }

    let w = 1.0 / n_kept as f64;
    let scores = EcoMatrix::from_rows(
        &sum_z
            .iter()
            .map(|row| row.iter().map(|&v| v * w).collect())
            .collect::<Vec<_>>(),
    )
    .unwrap();
    let loadings = EcoMatrix::from_rows(
        &sum_lambda
            .iter()
            .map(|row| row.iter().map(|&v| v * w).collect())
            .collect::<Vec<_>>(),
    )
    .unwrap();

    Ok(LvmResult {
        scores,
        loadings,
        intercepts: sum_beta0.iter().map(|&v| v * w).collect(),
        row_effects: if config.row_effects {
            sum_alpha.iter().map(|&v| v * w).collect()
        } else {
            Vec::new()
        },
        dispersions: if family == CountFamily::NegBinomial {
            sum_phi.iter().map(|&v| v * w).collect()
        } else {
            Vec::new()
        },
        acceptance_scores: score_accept as f64 / score_total.max(1) as f64,
        acceptance_taxa: taxa_accept as f64 / taxa_total.max(1) as f64,
        mean_deviance: sum_deviance * w,
        n_kept,
    })
}
