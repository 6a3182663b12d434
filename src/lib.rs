//! # ecostrat-core
//!
//! Core algorithms for quantifying ecological change through time from
//! stratigraphic assemblage counts (fossil pollen, diatoms, and similar
//! palaeoecological records).
//!
//! This crate provides pure Rust implementations of the standard
//! change-through-time workflow:
//! - Assemblage tables joined by explicit sample id (metadata + taxa counts)
//! - Count transforms (proportion, Hellinger, log, chord)
//! - Dissimilarity matrices (Bray-Curtis, Jaccard, chord, chi-square,
//!   Euclidean) and distance from the oldest reference sample
//! - Ordination: non-metric multidimensional scaling with multi-restart
//!   stress minimization, and Bayesian latent-variable count ordination
//! - Baseline confidence ellipses with centroid and boundary distances
//! - Trend models: OLS/GLS with AR residuals, exhaustive AICc model
//!   comparison, penalized regression splines of distance on time
//! - Rate-of-change detection from smooth derivatives with simultaneous
//!   confidence bands
//! - Principal curves summarizing assemblage change along one trajectory
//!
//! ## Data Layout
//!
//! Matrices are column-major `f64` stored in flat vectors behind
//! [`matrix::EcoMatrix`]: samples are rows, taxa (or axes) are columns.
//! Every stage output is row-aligned with its input table and carries the
//! sample ids needed to verify the join.
//!
//! ## Reproducibility
//!
//! Every stochastic stage (NMDS restarts, the MCMC sampler, the
//! simultaneous-band simulation) takes an explicit seed; re-running with
//! the same seed and inputs reproduces outputs exactly.

#![allow(clippy::needless_range_loop)]
#![allow(clippy::too_many_arguments)]

pub mod parallel;

pub mod cache;
pub mod dataset;
pub mod derivative;
pub mod dissimilarity;
pub mod ellipse;
pub mod error;
pub mod gam;
pub mod lvm;
pub mod matrix;
pub mod nmds;
pub mod numeric;
pub mod pipeline;
pub mod prcurve;
pub mod spline;
pub mod transform;
pub mod trend;

// Re-export commonly used items
pub use error::{EcoError, Result};
pub use matrix::EcoMatrix;
pub use numeric::{DEFAULT_CONVERGENCE_TOL, NUMERICAL_EPS};

// Data model
pub use dataset::{AssemblageTable, Period, PeriodBounds, SampleMeta};
pub use transform::Transform;

// Dissimilarity and ordination
pub use dissimilarity::{distance_from_start, pairwise, Dissimilarity, StartDistances};
pub use lvm::{lvm_ordination, CountFamily, LvmConfig, LvmResult};
pub use nmds::{nmds, NmdsConfig, NmdsResult};

// Baseline geometry
pub use ellipse::{baseline_distances, ConfidenceEllipse, DistanceRecord};

// Trend and change detection
pub use derivative::{derivative_band, ChangeInterval, DerivativeBand, DerivativeConfig, Direction};
pub use gam::{fit_smooth, GamConfig, GamFit};
pub use trend::{
    compare_models, fit_trend, lrt_correlation, Correlation, LrtResult, ModelComparison,
    ModelRow, TermSet, TrendFit,
};

// Principal curves
pub use prcurve::{principal_curve, PrincipalCurve, PrincipalCurveConfig};

// Orchestration
pub use pipeline::{
    run_baseline_analysis, run_change_analysis, BaselineAnalysis, BaselineRecord,
    ChangeAnalysis, PipelineConfig,
};
