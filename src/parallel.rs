//! Feature-gated parallel iteration.
//!
//! Pairwise dissimilarity matrices and multi-restart ordinations are
//! embarrassingly parallel over rows or restarts. With the `parallel` feature
//! enabled these macros dispatch to rayon; otherwise they fall back to
//! sequential iterators so the crate builds on targets where rayon is
//! unwanted.

/// Conditionally parallel iteration over owned iterables (ranges, Vecs).
///
/// Expands to `into_par_iter()` with the `parallel` feature, `into_iter()`
/// without it.
#[macro_export]
macro_rules! iter_maybe_parallel {
    ($expr:expr) => {{
        #[cfg(feature = "parallel")]
        {
            use rayon::iter::IntoParallelIterator;

            IntoParallelIterator::into_par_iter($expr)
        }
        #[cfg(not(feature = "parallel"))]
        {
            IntoIterator::into_iter($expr)
        }
    }};
}

/// Conditionally parallel reference iteration over slices.
///
/// Expands to `par_iter()` with the `parallel` feature, `iter()` without it.
#[macro_export]
macro_rules! slice_maybe_parallel {
    ($expr:expr) => {{
        #[cfg(feature = "parallel")]
        {
            use rayon::prelude::*;
            $expr.par_iter()
        }
        #[cfg(not(feature = "parallel"))]
        {
            $expr.iter()
        }
    }};
}

// Re-export macros at module level
pub use iter_maybe_parallel;
pub use slice_maybe_parallel;
