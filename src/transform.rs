//! Count-matrix transforms applied before dissimilarity and ordination.
//!
//! Each transform maps the samples × taxa matrix to a new matrix of the same
//! shape, preserving row and column order. Rows with zero total are left as
//! zeros rather than producing NaN.

use crate::matrix::EcoMatrix;
use serde::{Deserialize, Serialize};

/// Transform applied to raw counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Transform {
    /// Raw counts unchanged
    None,
    /// Per-row proportions (each row divided by its total)
    Proportion,
    /// Square root of proportions
    Hellinger,
    /// ln(1 + x)
    Log1p,
    /// Per-row Euclidean normalization
    ChordNorm,
}

/// Apply a transform, producing a new matrix of identical shape.
pub fn apply(counts: &EcoMatrix, transform: Transform) -> EcoMatrix {
    let (n, p) = counts.shape();
    let mut out = EcoMatrix::zeros(n, p);

    match transform {
        Transform::None => {
            for j in 0..p {
                for i in 0..n {
                    out[(i, j)] = counts[(i, j)];
                }
            }
        }
        Transform::Proportion | Transform::Hellinger => {
            for i in 0..n {
                let total = counts.row_sum(i);
                if total <= 0.0 {
                    continue;
                }
                for j in 0..p {
                    let prop = counts[(i, j)] / total;
                    out[(i, j)] = if transform == Transform::Hellinger {
                        prop.sqrt()
                    } else {
                        prop
                    };
                }
            }
        }
        Transform::Log1p => {
            for j in 0..p {
                for i in 0..n {
                    out[(i, j)] = counts[(i, j)].ln_1p();
                }
            }
        }
        Transform::ChordNorm => {
            for i in 0..n {
                let norm: f64 = (0..p)
                    .map(|j| counts[(i, j)] * counts[(i, j)])
                    .sum::<f64>()
                    .sqrt();
                if norm <= 0.0 {
                    continue;
                }
                for j in 0..p {
                    out[(i, j)] = counts[(i, j)] / norm;
                }
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counts_2x3() -> EcoMatrix {
        // sample 0: [2, 3, 5], sample 1: [0, 0, 0]
        EcoMatrix::from_column_major(vec![2.0, 0.0, 3.0, 0.0, 5.0, 0.0], 2, 3).unwrap()
    }

    #[test]
    fn test_proportion_rows_sum_to_one() {
        let out = apply(&counts_2x3(), Transform::Proportion);
        assert!((out.row_sum(0) - 1.0).abs() < 1e-12);
        assert!((out[(0, 0)] - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_zero_row_stays_zero() {
        for t in [
            Transform::Proportion,
            Transform::Hellinger,
            Transform::ChordNorm,
        ] {
            let out = apply(&counts_2x3(), t);
            for j in 0..3 {
                assert_eq!(out[(1, j)], 0.0, "zero row must stay zero under {t:?}");
            }
        }
    }

    #[test]
    fn test_hellinger_is_sqrt_of_proportion() {
        let out = apply(&counts_2x3(), Transform::Hellinger);
        assert!((out[(0, 2)] - 0.5_f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_chord_norm_unit_length() {
        let out = apply(&counts_2x3(), Transform::ChordNorm);
        let len: f64 = (0..3).map(|j| out[(0, j)] * out[(0, j)]).sum::<f64>().sqrt();
        assert!((len - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_log1p_of_zero_is_zero() {
        let out = apply(&counts_2x3(), Transform::Log1p);
        assert_eq!(out[(1, 0)], 0.0);
        assert!((out[(0, 0)] - 3.0_f64.ln()).abs() < 1e-12);
    }

    #[test]
    fn test_none_is_identity() {
        let m = counts_2x3();
        assert_eq!(apply(&m, Transform::None), m);
    }
}
