//! Cubic B-spline basis with difference penalty.
//!
//! The basis carries its knot vector so fitted smooths can be evaluated at
//! arbitrary new points (prediction grids, finite-difference derivative
//! stencils), not just the original observations. Knots are uniformly spaced
//! and extended beyond the data range; for order k and `nknots` interior
//! knots the basis has `nknots + k` functions.

use crate::error::{EcoError, Result};
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

/// A B-spline basis over a fixed interval.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BSplineBasis {
    knots: Vec<f64>,
    order: usize,
    n_basis: usize,
    t_min: f64,
    t_max: f64,
}

impl BSplineBasis {
    /// Build a cubic (order 4) basis with `n_basis` functions on [t_min, t_max].
    pub fn cubic(t_min: f64, t_max: f64, n_basis: usize) -> Result<Self> {
        Self::with_order(t_min, t_max, n_basis, 4)
    }

    /// Build a basis of the given order.
    ///
    /// `n_basis` must allow at least 2 interior knots (`n_basis >= order + 2`)
    /// and the interval must be non-degenerate.
    pub fn with_order(t_min: f64, t_max: f64, n_basis: usize, order: usize) -> Result<Self> {
        if !(t_min < t_max) {
            return Err(EcoError::InvalidConfig(format!(
                "spline interval must satisfy t_min < t_max, got [{t_min}, {t_max}]"
            )));
        }
        if order < 2 {
            return Err(EcoError::InvalidConfig(format!(
                "spline order must be at least 2, got {order}"
            )));
        }
        if n_basis < order + 2 {
            return Err(EcoError::InvalidConfig(format!(
                "basis dimension {n_basis} too small for order {order}; need at least {}",
                order + 2
            )));
        }

        let nknots = n_basis - order;
        let dt = (t_max - t_min) / (nknots - 1) as f64;

        let mut knots = Vec::with_capacity(nknots + 2 * order);
        for i in 0..order {
            knots.push(t_min - (order - i) as f64 * dt);
        }
        for i in 0..nknots {
            knots.push(t_min + i as f64 * dt);
        }
        for i in 1..=order {
            knots.push(t_max + i as f64 * dt);
        }

        Ok(Self {
            knots,
            order,
            n_basis,
            t_min,
            t_max,
        })
    }

    /// Number of basis functions.
    pub fn n_basis(&self) -> usize {
        self.n_basis
    }

    /// Interval the basis was built on.
    pub fn range(&self) -> (f64, f64) {
        (self.t_min, self.t_max)
    }

    /// Evaluate all basis functions at one point.
    ///
    /// Points are clamped into the basis interval; extrapolation is not
    /// meaningful for stratigraphic smooths.
    pub fn evaluate(&self, t: f64) -> Vec<f64> {
        let t_val = t.clamp(self.t_min, self.t_max);
        let knots = &self.knots;
        let order = self.order;

        // Index of t_max in the knot vector: the last interior knot
        let t_max_knot_idx = order + (self.n_basis - order) - 1;

        let mut b = vec![0.0; knots.len() - 1];
        for j in 0..(knots.len() - 1) {
            // Half-open intervals except the last interior one, which is
            // closed so t_max itself gets support
            let in_interval = if j == t_max_knot_idx - 1 {
                t_val >= knots[j] && t_val <= knots[j + 1]
            } else {
                t_val >= knots[j] && t_val < knots[j + 1]
            };
            if in_interval {
                b[j] = 1.0;
                break;
            }
        }

        for k in 2..=order {
            let mut b_new = vec![0.0; knots.len() - k];
            for j in 0..(knots.len() - k) {
                let d1 = knots[j + k - 1] - knots[j];
                let d2 = knots[j + k] - knots[j + 1];

                let left = if d1.abs() > 1e-10 {
                    (t_val - knots[j]) / d1 * b[j]
                } else {
                    0.0
                };
                let right = if d2.abs() > 1e-10 {
                    (knots[j + k] - t_val) / d2 * b[j + 1]
                } else {
                    0.0
                };
                b_new[j] = left + right;
            }
            b = b_new;
        }

        b.truncate(self.n_basis);
        b
    }

    /// Design matrix: one row per evaluation point, one column per basis fn.
    pub fn design_matrix(&self, ts: &[f64]) -> DMatrix<f64> {
        let n = ts.len();
        let mut mat = DMatrix::zeros(n, self.n_basis);
        for (i, &t) in ts.iter().enumerate() {
            for (j, v) in self.evaluate(t).into_iter().enumerate() {
                mat[(i, j)] = v;
            }
        }
        mat
    }
}

/// Difference matrix of the given order for the P-spline penalty.
pub fn difference_matrix(n: usize, order: usize) -> DMatrix<f64> {
    if order == 0 {
        return DMatrix::identity(n, n);
    }

    let mut d = DMatrix::zeros(n - 1, n);
    for i in 0..(n - 1) {
        d[(i, i)] = -1.0;
        d[(i, i + 1)] = 1.0;
    }

    let mut result = d;
    for _ in 1..order {
        if result.nrows() <= 1 {
            break;
        }
        let rows = result.nrows() - 1;
        let cols = result.ncols();
        let mut d_next = DMatrix::zeros(rows, cols);
        for i in 0..rows {
            for j in 0..cols {
                d_next[(i, j)] = -result[(i, j)] + result[(i + 1, j)];
            }
        }
        result = d_next;
    }

    result
}

/// Penalty matrix DᵀD for a difference penalty of the given order.
pub fn difference_penalty(n_basis: usize, order: usize) -> DMatrix<f64> {
    let d = difference_matrix(n_basis, order);
    d.transpose() * d
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uniform_grid(n: usize) -> Vec<f64> {
        (0..n).map(|i| i as f64 / (n - 1) as f64).collect()
    }

    // ============== Basis evaluation ==============

    #[test]
    fn test_cubic_basis_partition_of_unity() {
        let basis = BSplineBasis::cubic(0.0, 1.0, 12).unwrap();
        for &t in &uniform_grid(50) {
            let sum: f64 = basis.evaluate(t).iter().sum();
            assert!(
                (sum - 1.0).abs() < 1e-10,
                "partition of unity failed at t = {t}: sum = {sum}"
            );
        }
    }

    #[test]
    fn test_basis_non_negative() {
        let basis = BSplineBasis::cubic(0.0, 1.0, 10).unwrap();
        for &t in &uniform_grid(50) {
            for v in basis.evaluate(t) {
                assert!(v >= -1e-10);
            }
        }
    }

    #[test]
    fn test_basis_supports_endpoints() {
        let basis = BSplineBasis::cubic(-5.0, 5.0, 8).unwrap();
        let at_min: f64 = basis.evaluate(-5.0).iter().sum();
        let at_max: f64 = basis.evaluate(5.0).iter().sum();
        assert!((at_min - 1.0).abs() < 1e-10);
        assert!((at_max - 1.0).abs() < 1e-10);
    }

    #[test]
    fn test_basis_clamps_outside_range() {
        let basis = BSplineBasis::cubic(0.0, 1.0, 8).unwrap();
        assert_eq!(basis.evaluate(-2.0), basis.evaluate(0.0));
        assert_eq!(basis.evaluate(3.0), basis.evaluate(1.0));
    }

    #[test]
    fn test_design_matrix_shape() {
        let basis = BSplineBasis::cubic(0.0, 1.0, 9).unwrap();
        let ts = uniform_grid(30);
        let mat = basis.design_matrix(&ts);
        assert_eq!(mat.nrows(), 30);
        assert_eq!(mat.ncols(), 9);
    }

    #[test]
    fn test_basis_rejects_degenerate_interval() {
        assert!(BSplineBasis::cubic(1.0, 1.0, 8).is_err());
        assert!(BSplineBasis::cubic(2.0, 1.0, 8).is_err());
    }

    #[test]
    fn test_basis_rejects_tiny_dimension() {
        assert!(BSplineBasis::cubic(0.0, 1.0, 5).is_err());
        assert!(BSplineBasis::cubic(0.0, 1.0, 6).is_ok());
    }

    // ============== Difference penalty ==============

    #[test]
    fn test_difference_matrix_first_order() {
        let d = difference_matrix(5, 1);
        assert_eq!(d.nrows(), 4);
        assert_eq!(d.ncols(), 5);
        let x = nalgebra::DVector::from_vec(vec![1.0, 2.0, 3.0, 4.0, 5.0]);
        let dx = &d * x;
        for i in 0..4 {
            assert!((dx[i] - 1.0).abs() < 1e-10);
        }
    }

    #[test]
    fn test_second_order_penalty_annihilates_lines() {
        // A second-order penalty must not penalize linear coefficient vectors
        let p = difference_penalty(6, 2);
        let line = nalgebra::DVector::from_vec(vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0]);
        let quad_form = (line.transpose() * &p * &line)[(0, 0)];
        assert!(quad_form.abs() < 1e-10);
    }

    #[test]
    fn test_penalty_positive_semidefinite() {
        let p = difference_penalty(8, 2);
        let v = nalgebra::DVector::from_vec(vec![1.0, -2.0, 3.0, 0.5, -1.0, 2.0, -0.5, 1.5]);
        let quad_form = (v.transpose() * &p * &v)[(0, 0)];
        assert!(quad_form >= -1e-10);
    }
}
