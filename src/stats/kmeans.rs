//! K-means clustering of property vectors (e.g. hardness and modulus) into
//! phase labels.

use super::FitError;
use crate::rng::SimpleRng;

/// K-means configuration.
#[derive(Debug, Clone)]
pub struct KMeans {
    k: usize,
    max_iter: usize,
    restarts: usize,
    seed: u64,
    standardize: bool,
}

/// Result of a k-means fit.
#[derive(Debug, Clone)]
pub struct KMeansFit {
    /// One centroid per cluster, in the original feature units.
    pub centroids: Vec<Vec<f64>>,
    /// Cluster index of each input point.
    pub labels: Vec<usize>,
    /// Sum of squared distances to the assigned centroid, in the space the
    /// clustering ran in (standardized when enabled).
    pub inertia: f64,
    /// Lloyd iterations of the winning restart.
    pub iterations: usize,
}

impl KMeans {
    pub fn new(k: usize) -> Self {
        Self {
            k,
            max_iter: 300,
            restarts: 10,
            seed: 0,
            standardize: true,
        }
    }

    /// Maximum Lloyd iterations per restart (default 300).
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    /// Number of k-means++ restarts; the lowest inertia wins (default 10).
    pub fn with_restarts(mut self, restarts: usize) -> Self {
        self.restarts = restarts.max(1);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Z-score every feature before clustering (default true).
    ///
    /// Hardness in GPa and modulus in GPa differ by two orders of magnitude,
    /// so unscaled distances would be dominated by modulus.
    pub fn with_standardize(mut self, standardize: bool) -> Self {
        self.standardize = standardize;
        self
    }

    /// Cluster `points` (one row per sample, one column per feature).
    ///
    /// Labels are renumbered so that cluster 0 has the smallest centroid in
    /// the first feature, making label colours stable between runs.
    pub fn fit(&self, points: &[Vec<f64>]) -> Result<KMeansFit, FitError> {
        if self.k == 0 {
            return Err(FitError::ZeroComponents);
        }
        if points.len() < self.k {
            return Err(FitError::InsufficientData {
                needed: self.k,
                got: points.len(),
            });
        }
        let dim = points[0].len();
        if dim == 0 || points.iter().any(|p| p.len() != dim) {
            return Err(FitError::RaggedPoints);
        }
        if points.iter().flatten().any(|v| !v.is_finite()) {
            return Err(FitError::NonFinite);
        }

        let (offset, scale) = if self.standardize {
            feature_moments(points)
        } else {
            (vec![0.0; dim], vec![1.0; dim])
        };
        let data: Vec<Vec<f64>> = points
            .iter()
            .map(|p| {
                p.iter()
                    .zip(offset.iter().zip(&scale))
                    .map(|(v, (o, s))| (v - o) / s)
                    .collect()
            })
            .collect();

        let mut rng = SimpleRng::new(self.seed);
        let mut best: Option<(Vec<Vec<f64>>, Vec<usize>, f64, usize)> = None;
        for restart in 0..self.restarts {
            let init = plus_plus_init(&data, self.k, &mut rng);
            let (centroids, labels, inertia, iterations) = lloyd(&data, init, self.max_iter);
            log::debug!("k-means restart {restart}: inertia {inertia:.6} after {iterations} iterations");
            if best.as_ref().map_or(true, |b| inertia < b.2) {
                best = Some((centroids, labels, inertia, iterations));
            }
        }
        let Some((centroids, labels, inertia, iterations)) = best else {
            return Err(FitError::NoConvergence { iterations: 0 });
        };

        // Back to original units, then relabel by first-feature order.
        let centroids: Vec<Vec<f64>> = centroids
            .into_iter()
            .map(|c| {
                c.iter()
                    .zip(offset.iter().zip(&scale))
                    .map(|(v, (o, s))| v * s + o)
                    .collect()
            })
            .collect();
        let mut order: Vec<usize> = (0..self.k).collect();
        order.sort_by(|&a, &b| centroids[a][0].total_cmp(&centroids[b][0]));
        let mut rank = vec![0usize; self.k];
        for (new, &old) in order.iter().enumerate() {
            rank[old] = new;
        }

        Ok(KMeansFit {
            centroids: order.iter().map(|&j| centroids[j].clone()).collect(),
            labels: labels.iter().map(|&l| rank[l]).collect(),
            inertia,
            iterations,
        })
    }
}

impl KMeansFit {
    /// Index of the nearest centroid (original units, unscaled distance).
    pub fn predict(&self, point: &[f64]) -> usize {
        nearest(&self.centroids, point).0
    }

    /// Number of points per cluster.
    pub fn cluster_sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0; self.centroids.len()];
        for &l in &self.labels {
            sizes[l] += 1;
        }
        sizes
    }
}

/// Per-feature mean and standard deviation; constant features get scale 1.
fn feature_moments(points: &[Vec<f64>]) -> (Vec<f64>, Vec<f64>) {
    let dim = points[0].len();
    let n = points.len() as f64;
    let mut mean = vec![0.0; dim];
    for p in points {
        for (m, v) in mean.iter_mut().zip(p) {
            *m += v / n;
        }
    }
    let mut sd = vec![0.0; dim];
    for p in points {
        for ((s, v), m) in sd.iter_mut().zip(p).zip(&mean) {
            *s += (v - m).powi(2) / n;
        }
    }
    let sd = sd
        .into_iter()
        .map(|v| if v > 0.0 { v.sqrt() } else { 1.0 })
        .collect();
    (mean, sd)
}

fn sq_dist(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

fn nearest(centroids: &[Vec<f64>], point: &[f64]) -> (usize, f64) {
    let mut best = 0;
    let mut best_dist = f64::MAX;
    for (j, c) in centroids.iter().enumerate() {
        let d = sq_dist(point, c);
        if d < best_dist {
            best_dist = d;
            best = j;
        }
    }
    (best, best_dist)
}

/// k-means++ seeding: each new centroid is drawn with probability
/// proportional to its squared distance from the nearest chosen one.
fn plus_plus_init(data: &[Vec<f64>], k: usize, rng: &mut SimpleRng) -> Vec<Vec<f64>> {
    let mut centroids = vec![data[rng.below(data.len())].clone()];
    let mut dist: Vec<f64> = data.iter().map(|p| sq_dist(p, &centroids[0])).collect();

    while centroids.len() < k {
        let total: f64 = dist.iter().sum();
        let idx = if total > 0.0 {
            let mut target = rng.next_f64() * total;
            let mut chosen = data.len() - 1;
            for (i, d) in dist.iter().enumerate() {
                if target < *d {
                    chosen = i;
                    break;
                }
                target -= d;
            }
            chosen
        } else {
            rng.below(data.len())
        };
        let c = data[idx].clone();
        for (d, p) in dist.iter_mut().zip(data) {
            *d = d.min(sq_dist(p, &c));
        }
        centroids.push(c);
    }
    centroids
}

/// Lloyd iterations until assignments stop changing.
fn lloyd(
    data: &[Vec<f64>],
    mut centroids: Vec<Vec<f64>>,
    max_iter: usize,
) -> (Vec<Vec<f64>>, Vec<usize>, f64, usize) {
    let k = centroids.len();
    let dim = data[0].len();
    let mut labels = vec![usize::MAX; data.len()];
    let mut iterations = 0;

    for iter in 0..max_iter {
        iterations = iter + 1;
        let mut changed = false;
        for (label, p) in labels.iter_mut().zip(data) {
            let (best, _) = nearest(&centroids, p);
            if *label != best {
                *label = best;
                changed = true;
            }
        }
        if !changed {
            break;
        }

        let mut sums = vec![vec![0.0; dim]; k];
        let mut counts = vec![0usize; k];
        for (&l, p) in labels.iter().zip(data) {
            counts[l] += 1;
            for (s, v) in sums[l].iter_mut().zip(p) {
                *s += v;
            }
        }
        for j in 0..k {
            // Empty clusters keep their previous centroid.
            if counts[j] > 0 {
                for d in 0..dim {
                    centroids[j][d] = sums[j][d] / counts[j] as f64;
                }
            }
        }
    }

    let inertia = labels
        .iter()
        .zip(data)
        .map(|(&l, p)| sq_dist(p, &centroids[l]))
        .sum();
    (centroids, labels, inertia, iterations)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blobs() -> Vec<Vec<f64>> {
        let mut rng = SimpleRng::new(11);
        let mut pts = Vec::new();
        for &(h, e) in &[(3.0, 150.0), (6.0, 210.0), (9.0, 180.0)] {
            for _ in 0..40 {
                pts.push(vec![rng.gauss(h, 0.3), rng.gauss(e, 5.0)]);
            }
        }
        pts
    }

    #[test]
    fn separates_three_phases_in_order() {
        let fit = KMeans::new(3).fit(&blobs()).unwrap();
        assert_eq!(fit.cluster_sizes(), vec![40, 40, 40]);
        assert!((fit.centroids[0][0] - 3.0).abs() < 0.3);
        assert!((fit.centroids[1][0] - 6.0).abs() < 0.3);
        assert!((fit.centroids[2][0] - 9.0).abs() < 0.3);
        assert!((fit.centroids[1][1] - 210.0).abs() < 5.0);
        assert!(fit.labels[..40].iter().all(|&l| l == 0));
        assert!(fit.labels[80..].iter().all(|&l| l == 2));
        assert_eq!(fit.predict(&[6.1, 205.0]), 1);
    }

    #[test]
    fn same_seed_is_reproducible() {
        let pts = blobs();
        let a = KMeans::new(3).with_seed(5).fit(&pts).unwrap();
        let b = KMeans::new(3).with_seed(5).fit(&pts).unwrap();
        assert_eq!(a.labels, b.labels);
        assert_eq!(a.inertia, b.inertia);
    }

    #[test]
    fn unscaled_clustering_follows_dominant_feature() {
        // Without standardisation the modulus spread dominates.
        let pts = vec![
            vec![1.0, 100.0],
            vec![9.0, 101.0],
            vec![1.0, 300.0],
            vec![9.0, 301.0],
        ];
        let fit = KMeans::new(2)
            .with_standardize(false)
            .with_restarts(3)
            .fit(&pts)
            .unwrap();
        assert_eq!(fit.labels[0], fit.labels[1]);
        assert_eq!(fit.labels[2], fit.labels[3]);
        assert_ne!(fit.labels[0], fit.labels[2]);
    }

    #[test]
    fn rejects_bad_input() {
        assert_eq!(KMeans::new(0).fit(&[vec![1.0]]).unwrap_err(), FitError::ZeroComponents);
        assert!(matches!(
            KMeans::new(3).fit(&[vec![1.0], vec![2.0]]).unwrap_err(),
            FitError::InsufficientData { .. }
        ));
        assert_eq!(
            KMeans::new(1).fit(&[vec![1.0], vec![2.0, 3.0]]).unwrap_err(),
            FitError::RaggedPoints
        );
        assert_eq!(
            KMeans::new(1).fit(&[vec![f64::NAN]]).unwrap_err(),
            FitError::NonFinite
        );
    }

    #[test]
    fn identical_points_do_not_panic() {
        let pts = vec![vec![2.0, 2.0]; 5];
        let fit = KMeans::new(2).fit(&pts).unwrap();
        assert_eq!(fit.labels.len(), 5);
        assert_eq!(fit.inertia, 0.0);
    }
}
