//! Linear trend models for distance measures over time.
//!
//! The mean structure is `distance ~ time`, optionally crossed with a group
//! factor. Residuals are either independent (OLS) or follow a low-order
//! autoregressive process (GLS with AR(1)/AR(2) correlation estimated by
//! profile likelihood). Model comparison enumerates every sub-model of the
//! full interaction specification that respects marginality and ranks them
//! by AICc; ties within two units are flagged as equivalently supported
//! rather than silently resolved.

use crate::error::{ensure_aligned, EcoError, Result};
use crate::numeric::{acf, chi_square_sf};
use log::debug;
use nalgebra::{Cholesky, DMatrix, DVector};
use serde::{Deserialize, Serialize};

/// Which fixed-effect terms enter the mean structure.
///
/// The intercept is always included. Marginality is enforced at
/// construction: the interaction requires both main effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermSet {
    /// Linear time effect
    pub time: bool,
    /// Group main effect
    pub group: bool,
    /// Time × group interaction
    pub interaction: bool,
}

impl TermSet {
    /// Validate marginality: an interaction without both main effects is
    /// statistically meaningless and rejected.
    pub fn new(time: bool, group: bool, interaction: bool) -> Result<Self> {
        if interaction && !(time && group) {
            return Err(EcoError::InvalidConfig(
                "interaction term requires both main effects (marginality)".into(),
            ));
        }
        Ok(Self {
            time,
            group,
            interaction,
        })
    }

    /// Human-readable model formula.
    pub fn formula(&self) -> String {
        let mut terms = Vec::new();
        if self.time {
            terms.push("time");
        }
        if self.group {
            terms.push("group");
        }
        if self.interaction {
            terms.push("time:group");
        }
        if terms.is_empty() {
            "distance ~ 1".to_string()
        } else {
            format!("distance ~ {}", terms.join(" + "))
        }
    }

    /// All marginality-respecting sub-models of the full specification.
    ///
    /// With a group factor: intercept-only, time, group, time + group, and
    /// the full interaction model. Without one: intercept-only and time.
    pub fn candidates(has_group: bool) -> Vec<TermSet> {
        let mut out = Vec::new();
        for &time in &[false, true] {
            for &group in &[false, true] {
                if group && !has_group {
                    continue;
                }
                for &interaction in &[false, true] {
                    if let Ok(terms) = TermSet::new(time, group, interaction) {
                        out.push(terms);
                    }
                }
            }
        }
        out
    }
}

/// Residual correlation structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Correlation {
    /// Independent residuals (OLS)
    Independence,
    /// First-order autoregressive residuals
    Ar1,
    /// Second-order autoregressive residuals
    Ar2,
}

/// A fitted trend model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendFit {
    /// Terms in the mean structure
    pub terms: TermSet,
    /// Coefficient estimates, aligned with `coef_names`
    pub coefficients: Vec<f64>,
    /// Names of the design columns
    pub coef_names: Vec<String>,
    /// Fitted values
    pub fitted: Vec<f64>,
    /// Raw residuals
    pub residuals: Vec<f64>,
    /// Residual variance estimate
    pub sigma2: f64,
    /// Residual correlation structure
    pub correlation: Correlation,
    /// Estimated correlation parameters (phi), empty for independence
    pub cor_params: Vec<f64>,
    /// Maximum (profile) ML log-likelihood
    pub log_lik: f64,
    /// REML log-likelihood at the same parameters
    pub log_lik_reml: f64,
    /// Number of estimated parameters (fixed effects + correlation + sigma)
    pub n_params: usize,
    /// Akaike information criterion (ML)
    pub aic: f64,
    /// Small-sample corrected AIC
    pub aicc: f64,
}

impl TrendFit {
    /// Residual autocorrelation function, for the usual lag diagnostics.
    pub fn residual_acf(&self, max_lag: usize) -> Vec<f64> {
        acf(&self.residuals, max_lag)
    }
}

/// One row of the ranked model-comparison table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelRow {
    /// Terms of this candidate
    pub terms: TermSet,
    /// Formula string for reporting
    pub formula: String,
    /// AICc of the candidate
    pub aicc: f64,
    /// AICc difference to the best candidate
    pub delta: f64,
    /// Akaike weight within the candidate set
    pub weight: f64,
    /// True when delta <= 2: equivalently supported, not distinguishable
    pub equivalent: bool,
    /// Coefficients of the candidate
    pub coefficients: Vec<f64>,
    /// Design column names
    pub coef_names: Vec<String>,
    /// ML log-likelihood
    pub log_lik: f64,
    /// Parameter count entering the criterion
    pub n_params: usize,
}

/// Ranked comparison across all marginality-respecting candidates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelComparison {
    /// Rows sorted by ascending AICc
    pub rows: Vec<ModelRow>,
}

impl ModelComparison {
    /// The best-supported model row.
    pub fn best(&self) -> &ModelRow {
        &self.rows[0]
    }

    /// Rows within two AICc units of the best (including the best itself).
    pub fn equivalent_set(&self) -> Vec<&ModelRow> {
        self.rows.iter().filter(|r| r.equivalent).collect()
    }
}

/// Likelihood-ratio comparison of two nested correlation structures.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LrtResult {
    /// Twice the log-likelihood difference
    pub statistic: f64,
    /// Degrees of freedom (difference in correlation parameters)
    pub df: usize,
    /// Chi-squared p-value
    pub p_value: f64,
}

/// Build the design matrix for a term set.
///
/// Groups are dummy-coded against the first level; the interaction crosses
/// time with each dummy.
fn design_matrix(
    time: &[f64],
    group: Option<&[usize]>,
    terms: &TermSet,
) -> Result<(DMatrix<f64>, Vec<String>)> {
    let n = time.len();
    let n_levels = match group {
        Some(g) => {
            ensure_aligned("time vs group labels", n, g.len())?;
            g.iter().max().map_or(1, |&m| m + 1)
        }
        None => 1,
    };
    if (terms.group || terms.interaction) && (group.is_none() || n_levels < 2) {
        return Err(EcoError::InvalidConfig(
            "group terms require a group factor with at least 2 levels".into(),
        ));
    }

    let mut cols: Vec<Vec<f64>> = vec![vec![1.0; n]];
    let mut names = vec!["(Intercept)".to_string()];

    if terms.time {
        cols.push(time.to_vec());
        names.push("time".to_string());
    }
    if terms.group {
        let g = group.unwrap();
        for level in 1..n_levels {
            cols.push(g.iter().map(|&gi| if gi == level { 1.0 } else { 0.0 }).collect());
            names.push(format!("group{level}"));
        }
    }
    if terms.interaction {
        let g = group.unwrap();
        for level in 1..n_levels {
            cols.push(
                time.iter()
                    .zip(g)
                    .map(|(&t, &gi)| if gi == level { t } else { 0.0 })
                    .collect(),
            );
            names.push(format!("time:group{level}"));
        }
    }

    let p = cols.len();
    let mut x = DMatrix::zeros(n, p);
    for (j, col) in cols.iter().enumerate() {
        for (i, &v) in col.iter().enumerate() {
            x[(i, j)] = v;
        }
    }
    Ok((x, names))
}

/// AR correlation matrix on the observation index.
///
/// AR(1): rho_k = phi^k. AR(2): Yule-Walker recursion from (phi1, phi2).
fn ar_correlation(n: usize, params: &[f64]) -> Option<DMatrix<f64>> {
    let rho: Vec<f64> = match params {
        [] => {
            let mut rho = vec![0.0; n];
            rho[0] = 1.0;
            rho
        }
        [phi] => (0..n).map(|k| phi.powi(k as i32)).collect(),
        [phi1, phi2] => {
            // Stationarity triangle
            if phi1 + phi2 >= 1.0 || phi2 - phi1 >= 1.0 || phi2.abs() >= 1.0 {
                return None;
            }
            let mut rho = vec![0.0; n];
            rho[0] = 1.0;
            if n > 1 {
                rho[1] = phi1 / (1.0 - phi2);
            }
            for k in 2..n {
                rho[k] = phi1 * rho[k - 1] + phi2 * rho[k - 2];
            }
            rho
        }
        _ => return None,
    };

    let mut v = DMatrix::zeros(n, n);
    for i in 0..n {
        for j in 0..n {
            v[(i, j)] = rho[(i as isize - j as isize).unsigned_abs()];
        }
    }
    Some(v)
}

struct GlsSolve {
    beta: DVector<f64>,
    fitted: DVector<f64>,
    rss_w: f64,
    ln_det_l: f64,
    ln_det_xtx_w: f64,
}

/// Whitened least squares under a fixed correlation matrix.
fn gls_solve(
    x: &DMatrix<f64>,
    y: &DVector<f64>,
    cor_params: &[f64],
) -> Result<Option<GlsSolve>> {
    let n = x.nrows();
    let Some(v) = ar_correlation(n, cor_params) else {
        return Ok(None);
    };
    let Some(chol_v) = Cholesky::new(v) else {
        return Ok(None);
    };
    let l = chol_v.l();
    let ln_det_l: f64 = (0..n).map(|i| l[(i, i)].ln()).sum();

    let x_w = l
        .solve_lower_triangular(x)
        .ok_or_else(|| EcoError::SingularFit("correlation whitening failed".into()))?;
    let y_w = l
        .solve_lower_triangular(y)
        .ok_or_else(|| EcoError::SingularFit("correlation whitening failed".into()))?;

    let xtx = x_w.transpose() * &x_w;
    let chol_xtx = Cholesky::new(xtx.clone()).ok_or_else(|| {
        EcoError::SingularFit(
            "design matrix is rank-deficient (perfectly collinear terms)".into(),
        )
    })?;
    let ln_det_xtx_w = 2.0 * {
        let lx = chol_xtx.l();
        (0..x.ncols()).map(|i| lx[(i, i)].ln()).sum::<f64>()
    };

    let beta = chol_xtx.solve(&(x_w.transpose() * &y_w));
    let fitted = x * &beta;
    let resid_w = &y_w - &x_w * &beta;
    let rss_w: f64 = resid_w.iter().map(|r| r * r).sum();

    Ok(Some(GlsSolve {
        beta,
        fitted,
        rss_w,
        ln_det_l,
        ln_det_xtx_w,
    }))
}

/// Gaussian profile ML log-likelihood.
fn ml_log_lik(n: usize, rss_w: f64, ln_det_l: f64) -> f64 {
    let n = n as f64;
    let sigma2 = (rss_w / n).max(1e-300);
    -0.5 * n * ((2.0 * std::f64::consts::PI * sigma2).ln() + 1.0) - ln_det_l
}

/// Gaussian REML log-likelihood.
fn reml_log_lik(n: usize, p: usize, rss_w: f64, ln_det_l: f64, ln_det_xtx_w: f64) -> f64 {
    let nf = (n - p) as f64;
    let sigma2 = (rss_w / nf).max(1e-300);
    -0.5 * nf * ((2.0 * std::f64::consts::PI * sigma2).ln() + 1.0)
        - ln_det_l
        - 0.5 * ln_det_xtx_w
}

/// Candidate correlation parameter grids for the profile search.
fn correlation_grid(correlation: Correlation) -> Vec<Vec<f64>> {
    match correlation {
        Correlation::Independence => vec![Vec::new()],
        Correlation::Ar1 => (-18..=18)
            .map(|i| vec![i as f64 * 0.05])
            .collect(),
        Correlation::Ar2 => {
            let mut grid = Vec::new();
            for i in -9..=9 {
                for j in -9..=9 {
                    let phi1 = i as f64 * 0.1;
                    let phi2 = j as f64 * 0.1;
                    if phi1 + phi2 < 1.0 && phi2 - phi1 < 1.0 && phi2.abs() < 1.0 {
                        grid.push(vec![phi1, phi2]);
                    }
                }
            }
            grid
        }
    }
}

/// Fit a trend model with the given terms and correlation structure.
///
/// Correlation parameters are estimated by profiling the REML likelihood
/// over a grid inside the stationary region; fixed effects come from the
/// GLS solve at the profiled optimum.
pub fn fit_trend(
    time: &[f64],
    y: &[f64],
    group: Option<&[usize]>,
    terms: TermSet,
    correlation: Correlation,
) -> Result<TrendFit> {
    ensure_aligned("time vs response", time.len(), y.len())?;
    let n = time.len();
    let (x, coef_names) = design_matrix(time, group, &terms)?;
    let p = x.ncols();
    if n <= p + 2 {
        return Err(EcoError::InvalidConfig(format!(
            "{n} observations cannot support {p} fixed effects plus variance parameters"
        )));
    }

    let y_vec = DVector::from_column_slice(y);

    let mut best: Option<(Vec<f64>, GlsSolve, f64)> = None;
    for params in correlation_grid(correlation) {
        let Some(solve) = gls_solve(&x, &y_vec, &params)? else {
            continue;
        };
        let reml = reml_log_lik(n, p, solve.rss_w, solve.ln_det_l, solve.ln_det_xtx_w);
        let better = match &best {
            Some((_, _, best_reml)) => reml > *best_reml,
            None => true,
        };
        if better {
            best = Some((params, solve, reml));
        }
    }

    let (cor_params, solve, log_lik_reml) = best.ok_or_else(|| {
        EcoError::SingularFit("no admissible correlation parameters produced a fit".into())
    })?;
    let log_lik = ml_log_lik(n, solve.rss_w, solve.ln_det_l);
    debug!(
        "trend fit {}: cor {:?} params {:?}, logLik {:.3}",
        terms.formula(),
        correlation,
        cor_params,
        log_lik
    );

    let fitted: Vec<f64> = solve.fitted.iter().cloned().collect();
    let residuals: Vec<f64> = y.iter().zip(&fitted).map(|(&o, &f)| o - f).collect();
    let sigma2 = solve.rss_w / (n - p) as f64;

    // Fixed effects + correlation parameters + residual variance
    let k = p + cor_params.len() + 1;
    let aic = -2.0 * log_lik + 2.0 * k as f64;
    let aicc = if n > k + 1 {
        aic + (2 * k * (k + 1)) as f64 / (n - k - 1) as f64
    } else {
        f64::INFINITY
    };

    Ok(TrendFit {
        terms,
        coefficients: solve.beta.iter().cloned().collect(),
        coef_names,
        fitted,
        residuals,
        sigma2,
        correlation,
        cor_params,
        log_lik,
        log_lik_reml,
        n_params: k,
        aic,
        aicc,
    })
}

/// Likelihood-ratio test of a correlation structure against a simpler one.
///
/// Both fits must share the same fixed-effects terms; the comparison uses
/// the REML likelihoods, which are valid when only the covariance differs.
pub fn lrt_correlation(null: &TrendFit, alternative: &TrendFit) -> Result<LrtResult> {
    if null.terms != alternative.terms {
        return Err(EcoError::InvalidConfig(
            "likelihood-ratio comparison of correlation structures requires \
             identical fixed effects"
                .into(),
        ));
    }
    let df = alternative
        .cor_params
        .len()
        .saturating_sub(null.cor_params.len());
    if df == 0 {
        return Err(EcoError::InvalidConfig(
            "alternative model has no extra correlation parameters".into(),
        ));
    }
    let statistic = (2.0 * (alternative.log_lik_reml - null.log_lik_reml)).max(0.0);
    Ok(LrtResult {
        statistic,
        df,
        p_value: chi_square_sf(statistic, df as f64),
    })
}

/// Exhaustive marginality-respecting subset comparison ranked by AICc.
///
/// All candidates are fit by ML-comparable criteria under the same
/// correlation structure. Rows with AICc within 2 of the best are flagged
/// `equivalent`.
pub fn compare_models(
    time: &[f64],
    y: &[f64],
    group: Option<&[usize]>,
    correlation: Correlation,
) -> Result<ModelComparison> {
    let candidates = TermSet::candidates(group.is_some());
    let mut rows = Vec::with_capacity(candidates.len());

    for terms in candidates {
        let fit = fit_trend(time, y, group, terms, correlation)?;
        rows.push(ModelRow {
            terms,
            formula: terms.formula(),
            aicc: fit.aicc,
            delta: 0.0,
            weight: 0.0,
            equivalent: false,
            coefficients: fit.coefficients,
            coef_names: fit.coef_names,
            log_lik: fit.log_lik,
            n_params: fit.n_params,
        });
    }

    rows.sort_by(|a, b| a.aicc.partial_cmp(&b.aicc).unwrap());
    let best_aicc = rows[0].aicc;
    for row in &mut rows {
        row.delta = row.aicc - best_aicc;
        row.equivalent = row.delta <= 2.0;
    }
    let total_weight: f64 = rows.iter().map(|r| (-0.5 * r.delta).exp()).sum();
    for row in &mut rows {
        row.weight = (-0.5 * row.delta).exp() / total_weight;
    }

    Ok(ModelComparison { rows })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn time_grid(n: usize) -> Vec<f64> {
        (0..n).map(|i| i as f64).collect()
    }

    /// Deterministic pseudo-noise in [-0.5, 0.5].
    fn wiggle(i: usize) -> f64 {
        ((i * 37 + 11) % 100) as f64 / 100.0 - 0.5
    }

    // ============== Term sets and marginality ==============

    #[test]
    fn test_term_set_rejects_interaction_without_mains() {
        assert!(TermSet::new(true, false, true).is_err());
        assert!(TermSet::new(false, true, true).is_err());
        assert!(TermSet::new(false, false, true).is_err());
        assert!(TermSet::new(true, true, true).is_ok());
    }

    #[test]
    fn test_candidates_respect_marginality() {
        for terms in TermSet::candidates(true) {
            if terms.interaction {
                assert!(terms.time && terms.group);
            }
        }
    }

    #[test]
    fn test_candidate_counts() {
        assert_eq!(TermSet::candidates(true).len(), 5);
        assert_eq!(TermSet::candidates(false).len(), 2);
    }

    #[test]
    fn test_formula_strings() {
        assert_eq!(TermSet::new(false, false, false).unwrap().formula(), "distance ~ 1");
        assert_eq!(
            TermSet::new(true, true, true).unwrap().formula(),
            "distance ~ time + group + time:group"
        );
    }

    // ============== OLS ==============

    #[test]
    fn test_ols_recovers_slope() {
        let t = time_grid(30);
        let y: Vec<f64> = t.iter().enumerate().map(|(i, &ti)| 2.0 + 0.5 * ti + 0.01 * wiggle(i)).collect();
        let terms = TermSet::new(true, false, false).unwrap();
        let fit = fit_trend(&t, &y, None, terms, Correlation::Independence).unwrap();
        assert!((fit.coefficients[0] - 2.0).abs() < 0.05);
        assert!((fit.coefficients[1] - 0.5).abs() < 0.01);
    }

    #[test]
    fn test_ols_interaction_recovers_group_slopes() {
        let n = 40;
        let t = time_grid(n);
        let group: Vec<usize> = (0..n).map(|i| i % 2).collect();
        // Group 0: slope 0.2; group 1: slope 0.8
        let y: Vec<f64> = t
            .iter()
            .zip(&group)
            .enumerate()
            .map(|(i, (&ti, &g))| {
                let slope = if g == 0 { 0.2 } else { 0.8 };
                1.0 + slope * ti + 0.01 * wiggle(i)
            })
            .collect();
        let terms = TermSet::new(true, true, true).unwrap();
        let fit = fit_trend(&t, &y, Some(&group), terms, Correlation::Independence).unwrap();
        // time coefficient ~ 0.2, interaction ~ 0.6
        let time_idx = fit.coef_names.iter().position(|n| n == "time").unwrap();
        let inter_idx = fit
            .coef_names
            .iter()
            .position(|n| n == "time:group1")
            .unwrap();
        assert!((fit.coefficients[time_idx] - 0.2).abs() < 0.02);
        assert!((fit.coefficients[inter_idx] - 0.6).abs() < 0.02);
    }

    #[test]
    fn test_collinear_design_is_singular_fit() {
        let n = 20;
        let t = time_grid(n);
        // All samples in one group level makes the dummy constant -> collinear
        let group = vec![1usize; n];
        let y: Vec<f64> = t.iter().map(|&ti| ti).collect();
        let terms = TermSet::new(true, true, false).unwrap();
        let err = fit_trend(&t, &y, Some(&group), terms, Correlation::Independence).unwrap_err();
        assert!(matches!(err, EcoError::SingularFit(_)));
    }

    // ============== GLS / AR structures ==============

    #[test]
    fn test_ar1_detects_persistence() {
        let n = 60;
        let t = time_grid(n);
        let mut e = 0.0;
        let y: Vec<f64> = (0..n)
            .map(|i| {
                e = 0.8 * e + wiggle(i) * 0.4;
                0.1 * t[i] + e
            })
            .collect();
        let terms = TermSet::new(true, false, false).unwrap();
        let fit = fit_trend(&t, &y, None, terms, Correlation::Ar1).unwrap();
        assert_eq!(fit.cor_params.len(), 1);
        assert!(
            fit.cor_params[0] > 0.3,
            "expected positive AR(1) estimate, got {}",
            fit.cor_params[0]
        );
    }

    #[test]
    fn test_lrt_requires_same_fixed_effects() {
        let t = time_grid(30);
        let y: Vec<f64> = t.iter().enumerate().map(|(i, &ti)| 0.1 * ti + wiggle(i)).collect();
        let with_time = TermSet::new(true, false, false).unwrap();
        let intercept = TermSet::new(false, false, false).unwrap();
        let a = fit_trend(&t, &y, None, with_time, Correlation::Independence).unwrap();
        let b = fit_trend(&t, &y, None, intercept, Correlation::Ar1).unwrap();
        assert!(lrt_correlation(&a, &b).is_err());
    }

    #[test]
    fn test_lrt_ar1_vs_independence() {
        let n = 60;
        let t = time_grid(n);
        let mut e = 0.0;
        let y: Vec<f64> = (0..n)
            .map(|i| {
                e = 0.85 * e + wiggle(i) * 0.3;
                e
            })
            .collect();
        let terms = TermSet::new(true, false, false).unwrap();
        let null = fit_trend(&t, &y, None, terms, Correlation::Independence).unwrap();
        let alt = fit_trend(&t, &y, None, terms, Correlation::Ar1).unwrap();
        let lrt = lrt_correlation(&null, &alt).unwrap();
        assert_eq!(lrt.df, 1);
        assert!(lrt.statistic >= 0.0);
        assert!((0.0..=1.0).contains(&lrt.p_value));
        // Strong persistence should be detected
        assert!(lrt.p_value < 0.05, "p = {}", lrt.p_value);
    }

    #[test]
    fn test_ar2_fit_runs() {
        let n = 50;
        let t = time_grid(n);
        let y: Vec<f64> = (0..n).map(|i| 0.05 * t[i] + wiggle(i)).collect();
        let terms = TermSet::new(true, false, false).unwrap();
        let fit = fit_trend(&t, &y, None, terms, Correlation::Ar2).unwrap();
        assert_eq!(fit.cor_params.len(), 2);
    }

    // ============== Model comparison ==============

    #[test]
    fn test_compare_models_prefers_true_structure() {
        let n = 60;
        let t = time_grid(n);
        let group: Vec<usize> = (0..n).map(|i| i % 2).collect();
        // Strong interaction signal
        let y: Vec<f64> = t
            .iter()
            .zip(&group)
            .enumerate()
            .map(|(i, (&ti, &g))| {
                let slope = if g == 0 { 0.0 } else { 1.0 };
                slope * ti + 0.2 * wiggle(i)
            })
            .collect();
        let comparison =
            compare_models(&t, &y, Some(&group), Correlation::Independence).unwrap();
        assert_eq!(comparison.rows.len(), 5);
        assert!(comparison.best().terms.interaction);
        // Weights sum to one
        let total: f64 = comparison.rows.iter().map(|r| r.weight).sum();
        assert!((total - 1.0).abs() < 1e-10);
    }

    #[test]
    fn test_compare_models_no_interaction_without_mains() {
        let n = 40;
        let t = time_grid(n);
        let group: Vec<usize> = (0..n).map(|i| i % 2).collect();
        let y: Vec<f64> = (0..n).map(|i| wiggle(i)).collect();
        let comparison =
            compare_models(&t, &y, Some(&group), Correlation::Independence).unwrap();
        for row in &comparison.rows {
            if row.terms.interaction {
                assert!(row.terms.time && row.terms.group);
            }
        }
    }

    #[test]
    fn test_compare_models_delta_ordering() {
        let n = 40;
        let t = time_grid(n);
        let y: Vec<f64> = t.iter().enumerate().map(|(i, &ti)| 0.3 * ti + wiggle(i)).collect();
        let comparison = compare_models(&t, &y, None, Correlation::Independence).unwrap();
        assert_eq!(comparison.rows[0].delta, 0.0);
        assert!(comparison.rows[0].equivalent);
        for w in comparison.rows.windows(2) {
            assert!(w[0].aicc <= w[1].aicc);
        }
    }

    #[test]
    fn test_residual_acf_diagnostic() {
        let t = time_grid(40);
        let y: Vec<f64> = t.iter().enumerate().map(|(i, &ti)| 0.1 * ti + wiggle(i)).collect();
        let terms = TermSet::new(true, false, false).unwrap();
        let fit = fit_trend(&t, &y, None, terms, Correlation::Independence).unwrap();
        let r = fit.residual_acf(5);
        assert_eq!(r.len(), 6);
        assert!((r[0] - 1.0).abs() < 1e-12);
    }
}
