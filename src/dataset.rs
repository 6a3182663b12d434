//! Sample metadata and the joined assemblage table.
//!
//! The table keys every row by an explicit sample id and validates alignment
//! between metadata and counts at construction, so downstream stages can rely
//! on row order without re-checking it at every join.

use crate::error::{ensure_aligned, EcoError, Result};
use crate::matrix::EcoMatrix;
use serde::{Deserialize, Serialize};

/// Metadata for one sample (one stratigraphic level).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleMeta {
    /// Unique sample identifier, the join key across all derived tables
    pub id: String,
    /// Site or core the sample was taken from
    pub site: String,
    /// Calendar year (negative for BCE-style scales)
    pub year: f64,
    /// Sample depth, monotonically related to year
    pub depth: f64,
}

/// Period classification derived from a sample's year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Period {
    /// Older than the first boundary
    Before,
    /// Between the two boundaries
    During,
    /// Younger than the second boundary
    After,
}

/// The two year thresholds splitting the record into three periods.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PeriodBounds {
    /// Boundary between `Before` and `During`
    pub older: f64,
    /// Boundary between `During` and `After`
    pub younger: f64,
}

impl PeriodBounds {
    /// Validate that the boundaries are ordered.
    pub fn new(older: f64, younger: f64) -> Result<Self> {
        if older >= younger {
            return Err(EcoError::InvalidConfig(format!(
                "period bounds must satisfy older < younger, got {older} >= {younger}"
            )));
        }
        Ok(Self { older, younger })
    }

    /// Classify a year. Years exactly on a boundary fall into the later period.
    pub fn classify(&self, year: f64) -> Period {
        if year < self.older {
            Period::Before
        } else if year < self.younger {
            Period::During
        } else {
            Period::After
        }
    }
}

/// Joined metadata + taxa + counts table: one row per sample.
///
/// Invariant: `samples.len() == counts.nrows()` and
/// `taxa.len() == counts.ncols()`, sample ids unique, counts non-negative.
/// All four are checked at construction; the struct is immutable afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssemblageTable {
    samples: Vec<SampleMeta>,
    taxa: Vec<String>,
    counts: EcoMatrix,
}

impl AssemblageTable {
    /// Build a table, validating metadata/counts alignment, taxa alignment,
    /// id uniqueness, and count non-negativity.
    pub fn new(samples: Vec<SampleMeta>, taxa: Vec<String>, counts: EcoMatrix) -> Result<Self> {
        ensure_aligned("sample metadata vs count matrix rows", samples.len(), counts.nrows())?;
        ensure_aligned("taxa names vs count matrix columns", taxa.len(), counts.ncols())?;

        let mut seen = std::collections::HashSet::with_capacity(samples.len());
        for s in &samples {
            if !seen.insert(s.id.as_str()) {
                return Err(EcoError::DuplicateSampleId(s.id.clone()));
            }
        }

        for j in 0..counts.ncols() {
            for &v in counts.column(j) {
                if v < 0.0 || !v.is_finite() {
                    return Err(EcoError::InvalidConfig(format!(
                        "count matrix contains invalid value {v}; counts must be finite and non-negative"
                    )));
                }
            }
        }

        Ok(Self {
            samples,
            taxa,
            counts,
        })
    }

    /// Sample metadata in row order.
    pub fn samples(&self) -> &[SampleMeta] {
        &self.samples
    }

    /// Taxa names in column order.
    pub fn taxa(&self) -> &[String] {
        &self.taxa
    }

    /// The samples × taxa count matrix.
    pub fn counts(&self) -> &EcoMatrix {
        &self.counts
    }

    /// Number of samples.
    pub fn n_samples(&self) -> usize {
        self.samples.len()
    }

    /// Number of taxa.
    pub fn n_taxa(&self) -> usize {
        self.taxa.len()
    }

    /// Years in row order.
    pub fn years(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.year).collect()
    }

    /// Period label per row under the given bounds.
    pub fn periods(&self, bounds: &PeriodBounds) -> Vec<Period> {
        self.samples
            .iter()
            .map(|s| bounds.classify(s.year))
            .collect()
    }

    /// Row indices belonging to a period.
    pub fn period_rows(&self, bounds: &PeriodBounds, period: Period) -> Vec<usize> {
        self.samples
            .iter()
            .enumerate()
            .filter(|(_, s)| bounds.classify(s.year) == period)
            .map(|(i, _)| i)
            .collect()
    }

    /// Row index of the oldest sample (minimum year).
    pub fn oldest_row(&self) -> Option<usize> {
        self.samples
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| a.year.partial_cmp(&b.year).unwrap())
            .map(|(i, _)| i)
    }

    /// Return a copy of the table with rows sorted by ascending year.
    ///
    /// Dissimilarity-from-start requires the oldest sample in row 0; callers
    /// that cannot guarantee input order use this before that stage.
    pub fn sorted_by_year(&self) -> Self {
        let mut order: Vec<usize> = (0..self.samples.len()).collect();
        order.sort_by(|&a, &b| {
            self.samples[a]
                .year
                .partial_cmp(&self.samples[b].year)
                .unwrap()
        });

        let samples: Vec<SampleMeta> = order.iter().map(|&i| self.samples[i].clone()).collect();
        let n = samples.len();
        let p = self.taxa.len();
        let mut counts = EcoMatrix::zeros(n, p);
        for (new_i, &old_i) in order.iter().enumerate() {
            for j in 0..p {
                counts[(new_i, j)] = self.counts[(old_i, j)];
            }
        }

        Self {
            samples,
            taxa: self.taxa.clone(),
            counts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(id: &str, year: f64) -> SampleMeta {
        SampleMeta {
            id: id.to_string(),
            site: "core1".to_string(),
            year,
            depth: 100.0 - year / 10.0,
        }
    }

    fn small_table() -> AssemblageTable {
        let samples = vec![meta("s1", 1850.0), meta("s2", 1900.0), meta("s3", 1950.0)];
        let taxa = vec!["Pinus".to_string(), "Quercus".to_string()];
        let counts =
            EcoMatrix::from_column_major(vec![10.0, 8.0, 2.0, 5.0, 6.0, 12.0], 3, 2).unwrap();
        AssemblageTable::new(samples, taxa, counts).unwrap()
    }

    // ============== Construction validation ==============

    #[test]
    fn test_new_valid() {
        let table = small_table();
        assert_eq!(table.n_samples(), 3);
        assert_eq!(table.n_taxa(), 2);
    }

    #[test]
    fn test_new_rejects_misaligned_metadata() {
        let samples = vec![meta("s1", 1850.0), meta("s2", 1900.0)];
        let taxa = vec!["Pinus".to_string()];
        let counts = EcoMatrix::from_column_major(vec![1.0, 2.0, 3.0], 3, 1).unwrap();
        let err = AssemblageTable::new(samples, taxa, counts).unwrap_err();
        assert!(matches!(err, EcoError::AlignmentMismatch { .. }));
    }

    #[test]
    fn test_new_rejects_duplicate_ids() {
        let samples = vec![meta("s1", 1850.0), meta("s1", 1900.0)];
        let taxa = vec!["Pinus".to_string()];
        let counts = EcoMatrix::from_column_major(vec![1.0, 2.0], 2, 1).unwrap();
        let err = AssemblageTable::new(samples, taxa, counts).unwrap_err();
        assert!(matches!(err, EcoError::DuplicateSampleId(_)));
    }

    #[test]
    fn test_new_rejects_negative_counts() {
        let samples = vec![meta("s1", 1850.0)];
        let taxa = vec!["Pinus".to_string()];
        let counts = EcoMatrix::from_column_major(vec![-1.0], 1, 1).unwrap();
        assert!(AssemblageTable::new(samples, taxa, counts).is_err());
    }

    // ============== Period classification ==============

    #[test]
    fn test_period_bounds_ordering() {
        assert!(PeriodBounds::new(1900.0, 1850.0).is_err());
        assert!(PeriodBounds::new(1850.0, 1900.0).is_ok());
    }

    #[test]
    fn test_period_classify() {
        let bounds = PeriodBounds::new(1880.0, 1920.0).unwrap();
        assert_eq!(bounds.classify(1800.0), Period::Before);
        assert_eq!(bounds.classify(1880.0), Period::During);
        assert_eq!(bounds.classify(1900.0), Period::During);
        assert_eq!(bounds.classify(1920.0), Period::After);
        assert_eq!(bounds.classify(2000.0), Period::After);
    }

    #[test]
    fn test_period_rows() {
        let table = small_table();
        let bounds = PeriodBounds::new(1875.0, 1925.0).unwrap();
        assert_eq!(table.period_rows(&bounds, Period::Before), vec![0]);
        assert_eq!(table.period_rows(&bounds, Period::During), vec![1]);
        assert_eq!(table.period_rows(&bounds, Period::After), vec![2]);
    }

    // ============== Ordering helpers ==============

    #[test]
    fn test_oldest_row() {
        let table = small_table();
        assert_eq!(table.oldest_row(), Some(0));
    }

    #[test]
    fn test_sorted_by_year_reorders_counts_with_metadata() {
        let samples = vec![meta("s3", 1950.0), meta("s1", 1850.0), meta("s2", 1900.0)];
        let taxa = vec!["Pinus".to_string()];
        let counts = EcoMatrix::from_column_major(vec![30.0, 10.0, 20.0], 3, 1).unwrap();
        let table = AssemblageTable::new(samples, taxa, counts).unwrap();

        let sorted = table.sorted_by_year();
        assert_eq!(sorted.samples()[0].id, "s1");
        assert_eq!(sorted.counts()[(0, 0)], 10.0);
        assert_eq!(sorted.samples()[2].id, "s3");
        assert_eq!(sorted.counts()[(2, 0)], 30.0);
    }
}
