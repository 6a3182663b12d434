//! Baseline confidence ellipse in 2-d ordination space.
//!
//! The reference period's embedded points define a bivariate normal
//! confidence region: mean vector plus covariance matrix, scaled by the
//! chi-squared quantile for 2 degrees of freedom. Every sample is then
//! scored by its distance to the region's centroid and to its boundary.
//!
//! Boundary semantics are closed-disk: a point inside *or on* the ellipse
//! has boundary distance exactly 0.0. The Mahalanobis containment test is
//! authoritative for the zero branch; the polygon-segment scan is used only
//! for strictly-outside points, so vertex sampling can never produce a
//! spurious small positive distance on the boundary itself.

use crate::error::{ensure_aligned, EcoError, Result};
use crate::matrix::EcoMatrix;
use crate::numeric::{chi_square_quantile_2df, NUMERICAL_EPS};
use serde::{Deserialize, Serialize};

/// Number of boundary vertices used for polygon output and distance scans.
pub const DEFAULT_POLYGON_VERTICES: usize = 100;

/// A fitted bivariate confidence ellipse.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfidenceEllipse {
    centroid: [f64; 2],
    cov: [[f64; 2]; 2],
    inv_cov: [[f64; 2]; 2],
    /// Squared Mahalanobis radius of the boundary
    radius2: f64,
    level: f64,
}

/// Per-sample distances to the baseline region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistanceRecord {
    /// Sample id the record belongs to
    pub id: String,
    /// Euclidean distance to the ellipse centroid
    pub dist_to_centroid: f64,
    /// Distance to the ellipse boundary; exactly 0.0 inside or on it
    pub dist_to_boundary: f64,
}

impl ConfidenceEllipse {
    /// Fit the ellipse to the rows of `embedding` listed in `reference_rows`.
    ///
    /// Requires a 2-column embedding, at least 3 reference points, and a
    /// non-degenerate reference covariance.
    pub fn fit(embedding: &EcoMatrix, reference_rows: &[usize], level: f64) -> Result<Self> {
        if embedding.ncols() != 2 {
            return Err(EcoError::UnsupportedDimension(embedding.ncols()));
        }
        if reference_rows.len() < 3 {
            return Err(EcoError::InsufficientReference {
                found: reference_rows.len(),
                needed: 3,
            });
        }
        if !(0.0..1.0).contains(&level) || level <= 0.0 {
            return Err(EcoError::InvalidConfig(format!(
                "confidence level must be in (0, 1), got {level}"
            )));
        }
        for &r in reference_rows {
            if r >= embedding.nrows() {
                return Err(EcoError::InvalidConfig(format!(
                    "reference row {r} out of bounds for embedding with {} rows",
                    embedding.nrows()
                )));
            }
        }

        let m = reference_rows.len() as f64;
        let mut centroid = [0.0; 2];
        for &r in reference_rows {
            centroid[0] += embedding[(r, 0)];
            centroid[1] += embedding[(r, 1)];
        }
        centroid[0] /= m;
        centroid[1] /= m;

        let mut sxx = 0.0;
        let mut sxy = 0.0;
        let mut syy = 0.0;
        for &r in reference_rows {
            let dx = embedding[(r, 0)] - centroid[0];
            let dy = embedding[(r, 1)] - centroid[1];
            sxx += dx * dx;
            sxy += dx * dy;
            syy += dy * dy;
        }
        let denom = m - 1.0;
        let cov = [[sxx / denom, sxy / denom], [sxy / denom, syy / denom]];

        let det = cov[0][0] * cov[1][1] - cov[0][1] * cov[1][0];
        // Scale-invariant degeneracy test: a tight but genuinely 2-d cluster
        // must pass, exactly collinear or coincident points must not
        let trace = cov[0][0] + cov[1][1];
        if det <= NUMERICAL_EPS * (trace * trace).max(f64::MIN_POSITIVE) {
            return Err(EcoError::SingularFit(
                "reference covariance is degenerate (collinear or coincident points)".into(),
            ));
        }
        let inv_cov = [
            [cov[1][1] / det, -cov[0][1] / det],
            [-cov[1][0] / det, cov[0][0] / det],
        ];

        Ok(Self {
            centroid,
            cov,
            inv_cov,
            radius2: chi_square_quantile_2df(level),
            level,
        })
    }

    /// The ellipse centroid (mean of the reference points).
    pub fn centroid(&self) -> [f64; 2] {
        self.centroid
    }

    /// The confidence level the ellipse was fitted at.
    pub fn level(&self) -> f64 {
        self.level
    }

    /// Squared Mahalanobis distance from the centroid.
    pub fn mahalanobis2(&self, point: [f64; 2]) -> f64 {
        let dx = point[0] - self.centroid[0];
        let dy = point[1] - self.centroid[1];
        dx * (self.inv_cov[0][0] * dx + self.inv_cov[0][1] * dy)
            + dy * (self.inv_cov[1][0] * dx + self.inv_cov[1][1] * dy)
    }

    /// Whether the point lies inside or on the ellipse (closed disk).
    pub fn contains(&self, point: [f64; 2]) -> bool {
        self.mahalanobis2(point) <= self.radius2 + NUMERICAL_EPS
    }

    /// Principal-axis decomposition of the 2×2 covariance:
    /// (half-axis 1, half-axis 2, rotation angle).
    fn axes(&self) -> (f64, f64, f64) {
        let a = self.cov[0][0];
        let b = self.cov[0][1];
        let c = self.cov[1][1];
        let trace_half = (a + c) / 2.0;
        let disc = ((a - c) / 2.0 * ((a - c) / 2.0) + b * b).sqrt();
        let l1 = trace_half + disc;
        let l2 = (trace_half - disc).max(0.0);
        let theta = 0.5 * (2.0 * b).atan2(a - c);
        (
            (l1 * self.radius2).sqrt(),
            (l2 * self.radius2).sqrt(),
            theta,
        )
    }

    /// The boundary as an ordered closed polygon.
    pub fn polygon(&self, n_vertices: usize) -> Vec<[f64; 2]> {
        let (a1, a2, theta) = self.axes();
        let (sin_t, cos_t) = theta.sin_cos();
        (0..n_vertices)
            .map(|i| {
                let t = 2.0 * std::f64::consts::PI * i as f64 / n_vertices as f64;
                let x = a1 * t.cos();
                let y = a2 * t.sin();
                [
                    self.centroid[0] + x * cos_t - y * sin_t,
                    self.centroid[1] + x * sin_t + y * cos_t,
                ]
            })
            .collect()
    }

    /// Euclidean distance from a point to the centroid.
    pub fn distance_to_centroid(&self, point: [f64; 2]) -> f64 {
        let dx = point[0] - self.centroid[0];
        let dy = point[1] - self.centroid[1];
        (dx * dx + dy * dy).sqrt()
    }

    /// Distance from a point to the ellipse boundary.
    ///
    /// Exactly 0.0 for points inside or on the ellipse; otherwise the
    /// minimum distance to any segment of the boundary polygon at
    /// [`DEFAULT_POLYGON_VERTICES`] resolution.
    pub fn distance_to_boundary(&self, point: [f64; 2]) -> f64 {
        if self.contains(point) {
            return 0.0;
        }
        let polygon = self.polygon(DEFAULT_POLYGON_VERTICES);
        min_distance_to_polygon(point, &polygon)
    }
}

/// Distance from a point to the segment (a, b).
fn point_segment_distance(p: [f64; 2], a: [f64; 2], b: [f64; 2]) -> f64 {
    let ab = [b[0] - a[0], b[1] - a[1]];
    let ap = [p[0] - a[0], p[1] - a[1]];
    let len2 = ab[0] * ab[0] + ab[1] * ab[1];
    let t = if len2 > NUMERICAL_EPS {
        ((ap[0] * ab[0] + ap[1] * ab[1]) / len2).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let closest = [a[0] + t * ab[0], a[1] + t * ab[1]];
    let dx = p[0] - closest[0];
    let dy = p[1] - closest[1];
    (dx * dx + dy * dy).sqrt()
}

/// Minimum distance from a point to a closed polygon's segments.
pub fn min_distance_to_polygon(point: [f64; 2], polygon: &[[f64; 2]]) -> f64 {
    let n = polygon.len();
    (0..n)
        .map(|i| point_segment_distance(point, polygon[i], polygon[(i + 1) % n]))
        .fold(f64::INFINITY, f64::min)
}

/// Distance records for every embedded sample against a fitted ellipse.
///
/// `ids` must be row-aligned with `embedding`; the lengths are enforced so a
/// reordered metadata table cannot silently misjoin.
pub fn baseline_distances(
    embedding: &EcoMatrix,
    ids: &[String],
    ellipse: &ConfidenceEllipse,
) -> Result<Vec<DistanceRecord>> {
    if embedding.ncols() != 2 {
        return Err(EcoError::UnsupportedDimension(embedding.ncols()));
    }
    ensure_aligned("sample ids vs embedding rows", ids.len(), embedding.nrows())?;

    Ok((0..embedding.nrows())
        .map(|i| {
            let point = [embedding[(i, 0)], embedding[(i, 1)]];
            DistanceRecord {
                id: ids[i].clone(),
                dist_to_centroid: ellipse.distance_to_centroid(point),
                dist_to_boundary: ellipse.distance_to_boundary(point),
            }
        })
        .collect())
}
