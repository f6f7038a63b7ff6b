//! Empirical cumulative distribution function.

/// Sorted sample values with their cumulative probabilities.
#[derive(Debug, Clone, PartialEq)]
pub struct EmpiricalCdf {
    /// Finite sample values, ascending. Duplicates are kept.
    pub values: Vec<f64>,
    /// `probs[i] = (i + 1) / n`.
    pub probs: Vec<f64>,
}

/// Computes the ECDF by sorting and assigning rank / n.
///
/// Non-finite values are dropped first, so a column with missing entries
/// can be passed straight in. Each sorted value keeps its own rank, which
/// matches a post-step staircase where ties form a vertical jump.
///
/// # Examples
///
/// ```
/// use mech_maps::stats::ecdf::empirical_cdf;
///
/// let cdf = empirical_cdf(&[3.0, 1.0, f64::NAN, 2.0]);
/// assert_eq!(cdf.values, vec![1.0, 2.0, 3.0]);
/// assert_eq!(*cdf.probs.last().unwrap(), 1.0);
/// ```
pub fn empirical_cdf(data: &[f64]) -> EmpiricalCdf {
    let mut values: Vec<f64> = data.iter().copied().filter(|v| v.is_finite()).collect();
    values.sort_by(f64::total_cmp);

    let n = values.len();
    let probs = (1..=n).map(|i| i as f64 / n as f64).collect();
    EmpiricalCdf { values, probs }
}

impl EmpiricalCdf {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// F_n(x): fraction of samples ≤ x.
    pub fn evaluate(&self, x: f64) -> f64 {
        if self.values.is_empty() {
            return 0.0;
        }
        let count = self.values.partition_point(|&v| v <= x);
        count as f64 / self.values.len() as f64
    }

    /// Polyline of the post-step staircase, starting at probability 0.
    pub fn step_points(&self) -> Vec<(f64, f64)> {
        let mut pts = Vec::with_capacity(self.values.len() * 2);
        let mut prev = 0.0;
        for (&v, &p) in self.values.iter().zip(&self.probs) {
            pts.push((v, prev));
            pts.push((v, p));
            prev = p;
        }
        pts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn ties_keep_separate_ranks() {
        let cdf = empirical_cdf(&[2.0, 1.0, 2.0, 4.0]);
        assert_eq!(cdf.values, vec![1.0, 2.0, 2.0, 4.0]);
        assert_eq!(cdf.probs, vec![0.25, 0.5, 0.75, 1.0]);
        assert_eq!(cdf.evaluate(2.0), 0.75);
        assert_eq!(cdf.evaluate(0.0), 0.0);
        assert_eq!(cdf.evaluate(9.0), 1.0);
    }

    #[test]
    fn empty_and_single() {
        assert!(empirical_cdf(&[f64::NAN]).is_empty());
        let one = empirical_cdf(&[5.0]);
        assert_eq!(one.probs, vec![1.0]);
        assert_eq!(one.step_points(), vec![(5.0, 0.0), (5.0, 1.0)]);
    }

    proptest! {
        #[test]
        fn monotone_and_ends_at_one(
            data in proptest::collection::vec(-1e3_f64..1e3, 1..=200)
        ) {
            let cdf = empirical_cdf(&data);
            prop_assert_eq!(cdf.len(), data.len());
            for w in cdf.probs.windows(2) {
                prop_assert!(w[1] >= w[0]);
            }
            for w in cdf.values.windows(2) {
                prop_assert!(w[1] >= w[0]);
            }
            prop_assert_eq!(*cdf.probs.last().unwrap(), 1.0);
        }
    }
}
