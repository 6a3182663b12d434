//! Error types for the analysis pipeline.
//!
//! Structural problems (misaligned tables, degenerate reference groups,
//! singular design matrices) fail fast with a typed error. Iterative fits
//! that merely fail to converge do *not* error: their results carry a
//! `converged` flag alongside the best-found state.

use thiserror::Error;

/// Errors raised by pipeline stages on structurally invalid input.
#[derive(Debug, Error)]
pub enum EcoError {
    /// Two row-aligned inputs disagree in length. Joining them would silently
    /// misattribute rows, so this is always fatal.
    #[error("row alignment mismatch for {what}: expected {expected} rows, found {found}")]
    AlignmentMismatch {
        /// Which pair of inputs disagreed
        what: &'static str,
        /// Row count of the authoritative side
        expected: usize,
        /// Row count of the offending side
        found: usize,
    },

    /// Sample identifiers must be unique within a table.
    #[error("duplicate sample id: {0}")]
    DuplicateSampleId(String),

    /// The designated reference row is not the one the caller assumed
    /// (e.g. row 0 is not the oldest sample).
    #[error("ordering violation: {0}")]
    OrderingViolation(String),

    /// Ellipse geometry is only defined for 2-dimensional embeddings.
    #[error("unsupported embedding dimension {0}: ellipse geometry requires exactly 2")]
    UnsupportedDimension(usize),

    /// The reference group is too small to estimate its covariance.
    #[error("insufficient reference group: {found} points, need at least {needed}")]
    InsufficientReference {
        /// Points available in the reference group
        found: usize,
        /// Minimum required
        needed: usize,
    },

    /// A regression or covariance fit hit a numerical singularity
    /// (collinear terms, non-positive-definite covariance).
    #[error("singular fit: {0}")]
    SingularFit(String),

    /// A configuration value is outside its valid range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The disk cache could not be written.
    #[error("cache error for {path}: {source}")]
    Cache {
        /// Cache file involved
        path: String,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, EcoError>;

/// Check that two row-aligned inputs have equal length.
///
/// Used at every join seam between metadata and derived matrices.
pub fn ensure_aligned(what: &'static str, expected: usize, found: usize) -> Result<()> {
    if expected == found {
        Ok(())
    } else {
        Err(EcoError::AlignmentMismatch {
            what,
            expected,
            found,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_aligned_ok() {
        assert!(ensure_aligned("meta vs counts", 5, 5).is_ok());
    }

    #[test]
    fn test_ensure_aligned_mismatch() {
        let err = ensure_aligned("meta vs counts", 5, 4).unwrap_err();
        match err {
            EcoError::AlignmentMismatch {
                expected, found, ..
            } => {
                assert_eq!(expected, 5);
                assert_eq!(found, 4);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_error_display() {
        let err = EcoError::InsufficientReference {
            found: 2,
            needed: 3,
        };
        let msg = err.to_string();
        assert!(msg.contains("2"));
        assert!(msg.contains("3"));
    }
}
