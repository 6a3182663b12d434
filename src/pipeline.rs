//! Linear batch orchestration of the analysis stages.
//!
//! Each stage is a pure function of its inputs plus an explicit seed; the
//! pipeline merely chains them and joins their outputs by sample id. Two
//! entry points cover the two halves of the workflow: the baseline analysis
//! (transform → ordination → reference ellipse → distance records) and the
//! change analysis (distance measure → penalized smooth → derivative band →
//! significant intervals).

use crate::dataset::{AssemblageTable, Period, PeriodBounds};
use crate::derivative::{derivative_band, ChangeInterval, DerivativeBand, DerivativeConfig};
use crate::dissimilarity::{pairwise, Dissimilarity};
use crate::ellipse::{ConfidenceEllipse, DEFAULT_POLYGON_VERTICES};
use crate::error::{ensure_aligned, Result};
use crate::gam::{fit_smooth, GamConfig, GamFit};
use crate::nmds::{nmds, NmdsConfig, NmdsResult};
use crate::transform::{apply, Transform};
use serde::{Deserialize, Serialize};

/// Configuration constants for one analysis run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Year thresholds splitting the record into periods
    pub period_bounds: PeriodBounds,
    /// Which period defines the baseline
    pub reference_period: Period,
    /// Confidence level of the baseline ellipse
    pub confidence_level: f64,
    /// Count transform applied before dissimilarity
    pub transform: Transform,
    /// Dissimilarity metric
    pub metric: Dissimilarity,
    /// Ordination settings (carries its own seed)
    pub nmds: NmdsConfig,
    /// Smooth-trend settings
    pub gam: GamConfig,
    /// Derivative-band settings (carries its own seed)
    pub derivative: DerivativeConfig,
}

impl PipelineConfig {
    /// Default settings with every stochastic stage seeded from one value.
    pub fn seeded(period_bounds: PeriodBounds, reference_period: Period, seed: u64) -> Self {
        Self {
            period_bounds,
            reference_period,
            confidence_level: 0.95,
            transform: Transform::Hellinger,
            metric: Dissimilarity::BrayCurtis,
            nmds: NmdsConfig {
                seed,
                ..NmdsConfig::default()
            },
            gam: GamConfig::default(),
            derivative: DerivativeConfig {
                seed: seed.wrapping_add(1),
                ..DerivativeConfig::default()
            },
        }
    }
}

/// One row of the joined metadata + embedding + distance table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaselineRecord {
    /// Sample id
    pub id: String,
    /// Site identifier
    pub site: String,
    /// Sample year
    pub year: f64,
    /// Sample depth
    pub depth: f64,
    /// Period classification under the configured bounds
    pub period: Period,
    /// First ordination axis
    pub axis1: f64,
    /// Second ordination axis
    pub axis2: f64,
    /// Euclidean distance to the baseline centroid
    pub dist_to_centroid: f64,
    /// Distance to the baseline ellipse boundary (0 inside or on it)
    pub dist_to_boundary: f64,
}

/// Output of the baseline half of the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaselineAnalysis {
    /// The ordination the ellipse was fitted in
    pub ordination: NmdsResult,
    /// The fitted reference ellipse
    pub ellipse: ConfidenceEllipse,
    /// Ellipse boundary polygon for the presentation layer
    pub ellipse_polygon: Vec<[f64; 2]>,
    /// Joined per-sample records
    pub records: Vec<BaselineRecord>,
}

/// Output of the change half of the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeAnalysis {
    /// The fitted smooth of distance on time
    pub fit: GamFit,
    /// Derivative with simultaneous confidence band
    pub band: DerivativeBand,
    /// Periods of significant change
    pub intervals: Vec<ChangeInterval>,
}

/// Transform counts, ordinate, fit the reference ellipse, and join the
/// per-sample distance records.
pub fn run_baseline_analysis(
    table: &AssemblageTable,
    config: &PipelineConfig,
) -> Result<BaselineAnalysis> {
    let transformed = apply(table.counts(), config.transform);
    let dissim = pairwise(&transformed, config.metric);
    let ordination = nmds(&dissim, &config.nmds)?;

    let reference_rows = table.period_rows(&config.period_bounds, config.reference_period);
    let ellipse = ConfidenceEllipse::fit(
        &ordination.scores,
        &reference_rows,
        config.confidence_level,
    )?;

    ensure_aligned(
        "assemblage table vs ordination scores",
        table.n_samples(),
        ordination.scores.nrows(),
    )?;

    let periods = table.periods(&config.period_bounds);
    let records: Vec<BaselineRecord> = table
        .samples()
        .iter()
        .enumerate()
        .map(|(i, sample)| {
            let point = [ordination.scores[(i, 0)], ordination.scores[(i, 1)]];
            BaselineRecord {
                id: sample.id.clone(),
                site: sample.site.clone(),
                year: sample.year,
                depth: sample.depth,
                period: periods[i],
                axis1: point[0],
                axis2: point[1],
                dist_to_centroid: ellipse.distance_to_centroid(point),
                dist_to_boundary: ellipse.distance_to_boundary(point),
            }
        })
        .collect();

    let ellipse_polygon = ellipse.polygon(DEFAULT_POLYGON_VERTICES);

    Ok(BaselineAnalysis {
        ordination,
        ellipse,
        ellipse_polygon,
        records,
    })
}

/// Fit the smooth trend of a distance measure on time and extract the
/// periods of significant change.
pub fn run_change_analysis(
    time: &[f64],
    distance: &[f64],
    gam_config: &GamConfig,
    derivative_config: &DerivativeConfig,
) -> Result<ChangeAnalysis> {
    let fit = fit_smooth(time, distance, gam_config)?;
    let band = derivative_band(&fit, derivative_config)?;
    let intervals = band.significant_intervals();

    Ok(ChangeAnalysis {
        fit,
        band,
        intervals,
    })
}
