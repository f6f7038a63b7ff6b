//! Statistical fits behind the distribution overlays and cluster maps.
//!
//! - [`ecdf`]: empirical CDF by rank / n
//! - [`histogram`]: density-normalised histogram bins
//! - [`gmm`]: 1-D Gaussian mixture fitted by expectation-maximization
//! - [`weibull`]: two-parameter Weibull (location fixed at zero) by MLE
//! - [`kmeans`]: k-means++ clustering for the label column
//!
//! Density and CDF evaluation is delegated to `statrs`.

pub mod ecdf;
pub mod gmm;
pub mod histogram;
pub mod kmeans;
pub mod weibull;

use thiserror::Error;

/// Errors from fitting a model to data.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FitError {
    #[error("need at least {needed} values, got {got}")]
    InsufficientData { needed: usize, got: usize },

    #[error("input contains non-finite values")]
    NonFinite,

    #[error("all values must be strictly positive")]
    NonPositive,

    #[error("only {distinct} distinct values for {components} components")]
    TooFewDistinct { distinct: usize, components: usize },

    #[error("component count must be at least 1")]
    ZeroComponents,

    #[error("points have inconsistent dimensions")]
    RaggedPoints,

    #[error("did not converge after {iterations} iterations")]
    NoConvergence { iterations: usize },

    #[error("invalid distribution parameters: {0}")]
    Distribution(String),
}

/// `points` evenly spaced values covering `[lo, hi]` (inclusive).
pub fn linspace(lo: f64, hi: f64, points: usize) -> Vec<f64> {
    match points {
        0 => Vec::new(),
        1 => vec![lo],
        _ => {
            let step = (hi - lo) / (points - 1) as f64;
            (0..points)
                .map(|i| if i == points - 1 { hi } else { lo + i as f64 * step })
                .collect()
        }
    }
}

/// `(min, max)` of a non-empty slice; `None` when empty.
pub fn min_max(values: &[f64]) -> Option<(f64, f64)> {
    let first = *values.first()?;
    Some(
        values
            .iter()
            .fold((first, first), |(lo, hi), &v| (lo.min(v), hi.max(v))),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linspace_hits_both_ends() {
        let v = linspace(1.0, 2.0, 5);
        assert_eq!(v, vec![1.0, 1.25, 1.5, 1.75, 2.0]);
        assert_eq!(linspace(3.0, 4.0, 1), vec![3.0]);
        assert!(linspace(0.0, 1.0, 0).is_empty());
    }

    #[test]
    fn min_max_of_slice() {
        assert_eq!(min_max(&[3.0, -1.0, 2.0]), Some((-1.0, 3.0)));
        assert_eq!(min_max(&[]), None);
    }
}
