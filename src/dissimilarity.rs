//! Dissimilarity measures between assemblage samples.
//!
//! Pairwise matrices are symmetric with a zero diagonal; the upper triangle
//! is computed (in parallel when the `parallel` feature is enabled) and
//! mirrored. The distance-from-start extraction verifies the reference-row
//! ordering assumption instead of trusting it.

use crate::dataset::AssemblageTable;
use crate::error::{ensure_aligned, EcoError, Result};
use crate::iter_maybe_parallel;
use crate::matrix::EcoMatrix;
use crate::numeric::NUMERICAL_EPS;
#[cfg(feature = "parallel")]
use rayon::iter::ParallelIterator;
use serde::{Deserialize, Serialize};

/// Dissimilarity metric between two samples (rows).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Dissimilarity {
    /// Euclidean distance on the (possibly transformed) values
    Euclidean,
    /// Bray-Curtis: sum |x - y| / sum (x + y)
    BrayCurtis,
    /// Jaccard distance on presence/absence
    Jaccard,
    /// Euclidean distance between unit-normalized rows
    Chord,
    /// Chi-square distance (weights rare taxa up, per-row profiles)
    ChiSquare,
}

/// Distance between two rows under a metric that needs no matrix-wide state.
fn row_distance(x: &[f64], y: &[f64], metric: Dissimilarity) -> f64 {
    match metric {
        Dissimilarity::Euclidean => x
            .iter()
            .zip(y)
            .map(|(&a, &b)| (a - b) * (a - b))
            .sum::<f64>()
            .sqrt(),
        Dissimilarity::BrayCurtis => {
            let mut num = 0.0;
            let mut den = 0.0;
            for (&a, &b) in x.iter().zip(y) {
                num += (a - b).abs();
                den += a + b;
            }
            if den > NUMERICAL_EPS {
                num / den
            } else {
                0.0
            }
        }
        Dissimilarity::Jaccard => {
            let mut shared = 0usize;
            let mut either = 0usize;
            for (&a, &b) in x.iter().zip(y) {
                let pa = a > 0.0;
                let pb = b > 0.0;
                if pa || pb {
                    either += 1;
                    if pa && pb {
                        shared += 1;
                    }
                }
            }
            if either == 0 {
                0.0
            } else {
                1.0 - shared as f64 / either as f64
            }
        }
        Dissimilarity::Chord => {
            let nx: f64 = x.iter().map(|&a| a * a).sum::<f64>().sqrt();
            let ny: f64 = y.iter().map(|&b| b * b).sum::<f64>().sqrt();
            if nx <= NUMERICAL_EPS || ny <= NUMERICAL_EPS {
                return 0.0;
            }
            x.iter()
                .zip(y)
                .map(|(&a, &b)| {
                    let d = a / nx - b / ny;
                    d * d
                })
                .sum::<f64>()
                .sqrt()
        }
        // Chi-square is handled in `pairwise` because it needs column totals.
        Dissimilarity::ChiSquare => f64::NAN,
    }
}

/// Compute the symmetric n×n pairwise dissimilarity matrix over rows.
pub fn pairwise(data: &EcoMatrix, metric: Dissimilarity) -> EcoMatrix {
    let (n, p) = data.shape();
    if n == 0 || p == 0 {
        return EcoMatrix::zeros(n, n);
    }

    let rows = data.rows();

    // Chi-square profiles: x_j / rowsum, weighted by grand total / colsum.
    let chi_ctx: Option<(Vec<Vec<f64>>, Vec<f64>, f64)> = if metric == Dissimilarity::ChiSquare {
        let col_sums: Vec<f64> = (0..p).map(|j| data.column(j).iter().sum()).collect();
        let grand: f64 = col_sums.iter().sum();
        let profiles: Vec<Vec<f64>> = rows
            .iter()
            .map(|r| {
                let total: f64 = r.iter().sum();
                if total > NUMERICAL_EPS {
                    r.iter().map(|&v| v / total).collect()
                } else {
                    vec![0.0; p]
                }
            })
            .collect();
        Some((profiles, col_sums, grand))
    } else {
        None
    };

    let upper_triangle: Vec<(usize, usize, f64)> = iter_maybe_parallel!(0..n)
        .flat_map(|i| {
            ((i + 1)..n)
                .map(|j| {
                    let dist = match &chi_ctx {
                        Some((profiles, col_sums, grand)) => {
                            let mut sum = 0.0;
                            for k in 0..p {
                                if col_sums[k] > NUMERICAL_EPS {
                                    let d = profiles[i][k] - profiles[j][k];
                                    sum += d * d / col_sums[k];
                                }
                            }
                            (grand * sum).sqrt()
                        }
                        None => row_distance(&rows[i], &rows[j], metric),
                    };
                    (i, j, dist)
                })
                .collect::<Vec<_>>()
        })
        .collect();

    let mut out = EcoMatrix::zeros(n, n);
    for (i, j, dist) in upper_triangle {
        out[(i, j)] = dist;
        out[(j, i)] = dist;
    }

    out
}

/// Per-sample dissimilarity to the fixed oldest reference sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartDistances {
    /// Id of the reference sample (row 0)
    pub reference_id: String,
    /// Year of the reference sample, exposed so callers can verify it
    pub reference_year: f64,
    /// Sample ids in row order
    pub ids: Vec<String>,
    /// Dissimilarity of each sample to the reference; index 0 is 0 exactly
    pub distances: Vec<f64>,
}

/// Compute each sample's dissimilarity to the oldest sample.
///
/// `values` is the (possibly transformed) matrix row-aligned with `table`.
/// Row 0 must hold the minimum year; any other arrangement is an
/// [`EcoError::OrderingViolation`] naming the offending samples so the
/// caller can `sorted_by_year()` first.
pub fn distance_from_start(
    table: &AssemblageTable,
    values: &EcoMatrix,
    metric: Dissimilarity,
) -> Result<StartDistances> {
    ensure_aligned("assemblage table vs value matrix", table.n_samples(), values.nrows())?;

    let n = table.n_samples();
    if n == 0 {
        return Err(EcoError::InvalidConfig(
            "distance_from_start requires at least one sample".into(),
        ));
    }

    let oldest = table.oldest_row().unwrap_or(0);
    if oldest != 0 {
        let first = &table.samples()[0];
        let actual = &table.samples()[oldest];
        return Err(EcoError::OrderingViolation(format!(
            "row 0 holds sample '{}' (year {}) but the oldest sample is '{}' (year {}); \
             sort the table by year before computing distance from start",
            first.id, first.year, actual.id, actual.year
        )));
    }

    let full = pairwise(values, metric);
    let mut distances = full.column(0).to_vec();
    // Zero exactly by construction for the reference itself
    distances[0] = 0.0;

    let reference = &table.samples()[0];
    Ok(StartDistances {
        reference_id: reference.id.clone(),
        reference_year: reference.year,
        ids: table.samples().iter().map(|s| s.id.clone()).collect(),
        distances,
    })
}
