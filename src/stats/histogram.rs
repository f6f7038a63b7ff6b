//! Density-normalised histograms.

/// One histogram bar.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bin {
    pub left: f64,
    pub right: f64,
    pub count: usize,
    /// `count / (n · width)`; the bar areas sum to 1.
    pub density: f64,
}

/// Equal-width bins over `[min, max]` of the finite values.
///
/// The last bin is closed on the right so the maximum is counted. When all
/// values coincide, a single bin of width 1 centred on the value is used.
/// Returns an empty vector when there are no finite values or `bins == 0`.
pub fn density_histogram(data: &[f64], bins: usize) -> Vec<Bin> {
    let values: Vec<f64> = data.iter().copied().filter(|v| v.is_finite()).collect();
    let Some((lo, hi)) = super::min_max(&values) else {
        return Vec::new();
    };
    if bins == 0 {
        return Vec::new();
    }

    let n = values.len() as f64;
    if hi - lo <= 0.0 {
        return vec![Bin {
            left: lo - 0.5,
            right: lo + 0.5,
            count: values.len(),
            density: 1.0,
        }];
    }

    let width = (hi - lo) / bins as f64;
    let mut counts = vec![0usize; bins];
    for &v in &values {
        let idx = (((v - lo) / width) as usize).min(bins - 1);
        counts[idx] += 1;
    }

    counts
        .into_iter()
        .enumerate()
        .map(|(i, count)| {
            let left = lo + i as f64 * width;
            let right = if i == bins - 1 { hi } else { left + width };
            Bin {
                left,
                right,
                count,
                density: count as f64 / (n * width),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn area_sums_to_one() {
        let data: Vec<f64> = (0..97).map(|i| (i as f64 * 0.37).sin() * 3.0).collect();
        let bins = density_histogram(&data, 30);
        assert_eq!(bins.len(), 30);
        let area: f64 = bins.iter().map(|b| b.density * (b.right - b.left)).sum();
        assert_relative_eq!(area, 1.0, epsilon = 1e-9);
        assert_eq!(bins.iter().map(|b| b.count).sum::<usize>(), 97);
    }

    #[test]
    fn max_lands_in_last_bin() {
        let bins = density_histogram(&[0.0, 1.0, 2.0, 3.0], 3);
        assert_eq!(bins.iter().map(|b| b.count).collect::<Vec<_>>(), vec![1, 1, 2]);
        assert_eq!(bins[2].right, 3.0);
    }

    #[test]
    fn degenerate_inputs() {
        let one = density_histogram(&[2.0, 2.0, f64::NAN], 30);
        assert_eq!(one.len(), 1);
        assert_eq!(one[0].count, 2);
        assert_eq!(one[0].left, 1.5);
        assert!(density_histogram(&[], 30).is_empty());
        assert!(density_histogram(&[1.0, 2.0], 0).is_empty());
    }
}
