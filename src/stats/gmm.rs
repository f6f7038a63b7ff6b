//! Expectation-Maximization (EM) fitting of a 1-D Gaussian Mixture Model,
//! used to deconvolve a property histogram into overlapping phases.
//!
//! # Example
//!
//! ```
//! use mech_maps::stats::gmm::GaussianMixture;
//!
//! let mut data = Vec::new();
//! for i in 0..50 {
//!     data.push(0.0 + (i as f64 - 25.0) * 0.02);
//!     data.push(5.0 + (i as f64 - 25.0) * 0.02);
//! }
//!
//! let fit = GaussianMixture::new(2).fit(&data).unwrap();
//! assert!((fit.means()[0] - 0.0).abs() < 0.5);
//! assert!((fit.means()[1] - 5.0).abs() < 0.5);
//! ```

use statrs::distribution::{Continuous, Normal};

use super::{linspace, FitError};

/// Configuration for a 1-D Gaussian mixture fit.
#[derive(Debug, Clone)]
pub struct GaussianMixture {
    k: usize,
    max_iter: usize,
    tol: f64,
    reg_covar: f64,
}

/// A fitted mixture. Components are ordered by ascending mean.
#[derive(Debug, Clone)]
pub struct MixtureFit {
    weights: Vec<f64>,
    means: Vec<f64>,
    variances: Vec<f64>,
    components: Vec<Normal>,
    mean_log_likelihood: f64,
    n_samples: usize,
    iterations: usize,
    converged: bool,
}

/// Mixture densities evaluated over a range.
#[derive(Debug, Clone)]
pub struct MixtureCurves {
    pub x: Vec<f64>,
    /// `components[j][i]` is the weighted density of component `j` at `x[i]`.
    pub components: Vec<Vec<f64>>,
    /// Total mixture density at each `x[i]`.
    pub total: Vec<f64>,
}

impl GaussianMixture {
    /// Create a new 1-D mixture with `k` components.
    pub fn new(k: usize) -> Self {
        Self {
            k,
            max_iter: 100,
            tol: 1e-3,
            reg_covar: 1e-6,
        }
    }

    /// Set the maximum number of EM iterations (default 100).
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    /// Set the convergence tolerance on the change of the mean per-sample
    /// log-likelihood (default 1e-3).
    pub fn with_tolerance(mut self, tol: f64) -> Self {
        self.tol = tol;
        self
    }

    /// Set the non-negative regularisation added to every variance (default 1e-6).
    pub fn with_reg_covar(mut self, reg_covar: f64) -> Self {
        self.reg_covar = reg_covar;
        self
    }

    /// Fit the mixture with k-means initialisation followed by EM.
    pub fn fit(&self, data: &[f64]) -> Result<MixtureFit, FitError> {
        let k = self.k;
        if k == 0 {
            return Err(FitError::ZeroComponents);
        }
        if data.len() < k {
            return Err(FitError::InsufficientData {
                needed: k,
                got: data.len(),
            });
        }
        if data.iter().any(|v| !v.is_finite()) {
            return Err(FitError::NonFinite);
        }
        let distinct = count_distinct(data);
        if distinct < k {
            return Err(FitError::TooFewDistinct {
                distinct,
                components: k,
            });
        }

        let assignments = kmeans_1d(data, k);
        let mut resp: Vec<Vec<f64>> = assignments
            .iter()
            .map(|&a| (0..k).map(|j| if j == a { 1.0 } else { 0.0 }).collect())
            .collect();

        let (mut weights, mut means, mut variances) = self.m_step(data, &resp);
        let mut prev_ll = f64::NEG_INFINITY;
        let mut mean_ll = f64::NEG_INFINITY;
        let mut converged = false;
        let mut iterations = 0;

        for iter in 0..self.max_iter {
            iterations = iter + 1;

            // E-step
            let components = build_components(&means, &variances)?;
            mean_ll = e_step(data, &weights, &components, &mut resp);

            // M-step
            (weights, means, variances) = self.m_step(data, &resp);

            if (mean_ll - prev_ll).abs() < self.tol {
                converged = true;
                break;
            }
            prev_ll = mean_ll;
        }

        if converged {
            log::debug!("GMM (k={k}) converged after {iterations} iterations");
        } else {
            log::warn!(
                "GMM (k={k}) did not converge after {iterations} iterations; \
                 consider raising max_iter or the tolerance"
            );
        }

        // Order components by mean so "Component 1" is always the lowest.
        let mut order: Vec<usize> = (0..k).collect();
        order.sort_by(|&a, &b| means[a].total_cmp(&means[b]));
        let weights: Vec<f64> = order.iter().map(|&j| weights[j]).collect();
        let means: Vec<f64> = order.iter().map(|&j| means[j]).collect();
        let variances: Vec<f64> = order.iter().map(|&j| variances[j]).collect();
        let components = build_components(&means, &variances)?;

        let mut fit = MixtureFit {
            weights,
            means,
            variances,
            components,
            mean_log_likelihood: mean_ll,
            n_samples: data.len(),
            iterations,
            converged,
        };
        fit.mean_log_likelihood =
            data.iter().map(|&x| fit.score_samples(x)).sum::<f64>() / data.len() as f64;
        Ok(fit)
    }

    /// Update parameters from responsibilities (M-step).
    ///
    /// A component whose responsibilities have all but vanished is re-seeded
    /// on the sample worst covered by the surviving means, with the pooled
    /// variance and a one-sample weight.
    fn m_step(&self, data: &[f64], resp: &[Vec<f64>]) -> (Vec<f64>, Vec<f64>, Vec<f64>) {
        let n = data.len() as f64;
        let mut weights = vec![0.0; self.k];
        let mut means = vec![0.0; self.k];
        let mut variances = vec![0.0; self.k];
        let mut empty = Vec::new();
        for j in 0..self.k {
            let nk: f64 = resp.iter().map(|r| r[j]).sum();
            if nk < f64::EPSILON {
                empty.push(j);
                continue;
            }
            let mean = resp.iter().zip(data).map(|(r, &x)| r[j] * x).sum::<f64>() / nk;
            let var = resp
                .iter()
                .zip(data)
                .map(|(r, &x)| r[j] * (x - mean).powi(2))
                .sum::<f64>()
                / nk;
            weights[j] = nk / n;
            means[j] = mean;
            variances[j] = var + self.reg_covar;
        }
        if !empty.is_empty() {
            let pooled = sample_variance(data) + self.reg_covar;
            let mut live: Vec<f64> = (0..self.k)
                .filter(|j| !empty.contains(j))
                .map(|j| means[j])
                .collect();
            for &j in &empty {
                let seed = farthest_point(data, &live);
                log::debug!("GMM component {j} emptied; re-seeding at {seed}");
                weights[j] = 1.0 / n;
                means[j] = seed;
                variances[j] = pooled;
                live.push(seed);
            }
        }
        let total: f64 = weights.iter().sum();
        for w in &mut weights {
            *w /= total;
        }
        (weights, means, variances)
    }
}

/// Compute posterior responsibilities in place; returns the mean log-likelihood.
fn e_step(data: &[f64], weights: &[f64], components: &[Normal], resp: &mut [Vec<f64>]) -> f64 {
    let mut total_ll = 0.0;
    for (x, r) in data.iter().zip(resp.iter_mut()) {
        for (j, slot) in r.iter_mut().enumerate() {
            *slot = weights[j].ln() + components[j].ln_pdf(*x);
        }
        let norm = log_sum_exp(r);
        for slot in r.iter_mut() {
            *slot = (*slot - norm).exp();
        }
        total_ll += norm;
    }
    total_ll / data.len() as f64
}

fn build_components(means: &[f64], variances: &[f64]) -> Result<Vec<Normal>, FitError> {
    means
        .iter()
        .zip(variances)
        .map(|(&m, &v)| Normal::new(m, v.sqrt()).map_err(|e| FitError::Distribution(e.to_string())))
        .collect()
}

fn log_sum_exp(values: &[f64]) -> f64 {
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if max == f64::NEG_INFINITY {
        return max;
    }
    max + values.iter().map(|v| (v - max).exp()).sum::<f64>().ln()
}

fn count_distinct(data: &[f64]) -> usize {
    let mut sorted = data.to_vec();
    sorted.sort_by(f64::total_cmp);
    sorted.dedup();
    sorted.len()
}

/// Hard 1-D k-means assignments, seeded at evenly spaced quantiles of the
/// distinct values. Needs at least `k` distinct values.
fn kmeans_1d(data: &[f64], k: usize) -> Vec<usize> {
    let n = data.len();
    let mut distinct = data.to_vec();
    distinct.sort_by(f64::total_cmp);
    distinct.dedup();
    let m = distinct.len();

    let mut centers: Vec<f64> = (0..k)
        .map(|j| distinct[((2 * j + 1) * m / (2 * k)).min(m - 1)])
        .collect();

    let mut assignments = vec![0usize; n];
    for _ in 0..100 {
        let mut changed = false;
        for (a, &x) in assignments.iter_mut().zip(data) {
            let best = nearest(&centers, x);
            if *a != best {
                *a = best;
                changed = true;
            }
        }
        let mut sums = vec![0.0; k];
        let mut counts = vec![0usize; k];
        for (&a, &x) in assignments.iter().zip(data) {
            sums[a] += x;
            counts[a] += 1;
        }
        for j in 0..k {
            if counts[j] > 0 {
                centers[j] = sums[j] / counts[j] as f64;
            }
        }
        for j in 0..k {
            if counts[j] == 0 {
                let others: Vec<f64> = (0..k).filter(|&i| i != j).map(|i| centers[i]).collect();
                centers[j] = farthest_point(data, &others);
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }
    assignments
}

/// The sample farthest from its nearest center.
fn farthest_point(data: &[f64], centers: &[f64]) -> f64 {
    let gap = |x: f64| centers.iter().map(|c| (x - c).abs()).fold(f64::INFINITY, f64::min);
    data.iter()
        .copied()
        .max_by(|a, b| gap(*a).total_cmp(&gap(*b)))
        .unwrap_or(0.0)
}

fn sample_variance(data: &[f64]) -> f64 {
    let n = data.len() as f64;
    let mean = data.iter().sum::<f64>() / n;
    data.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n
}

fn nearest(centers: &[f64], x: f64) -> usize {
    centers
        .iter()
        .enumerate()
        .min_by(|a, b| (x - a.1).abs().total_cmp(&(x - b.1).abs()))
        .map_or(0, |(j, _)| j)
}

impl MixtureFit {
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    pub fn means(&self) -> &[f64] {
        &self.means
    }

    pub fn variances(&self) -> &[f64] {
        &self.variances
    }

    pub fn num_components(&self) -> usize {
        self.means.len()
    }

    pub fn converged(&self) -> bool {
        self.converged
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    /// Mean per-sample log-likelihood of the training data.
    pub fn mean_log_likelihood(&self) -> f64 {
        self.mean_log_likelihood
    }

    /// Log of the total mixture density at `x`.
    pub fn score_samples(&self, x: f64) -> f64 {
        log_sum_exp(&self.weighted_log_densities(x))
    }

    /// Posterior probability of each component at `x`.
    pub fn predict_proba(&self, x: f64) -> Vec<f64> {
        let logs = self.weighted_log_densities(x);
        let norm = log_sum_exp(&logs);
        if norm == f64::NEG_INFINITY {
            return vec![1.0 / logs.len() as f64; logs.len()];
        }
        logs.iter().map(|l| (l - norm).exp()).collect()
    }

    /// Most probable component at `x`.
    pub fn predict(&self, x: f64) -> usize {
        self.predict_proba(x)
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map_or(0, |(j, _)| j)
    }

    /// Total and per-component weighted densities at `points` positions in `[lo, hi]`.
    ///
    /// Component curves are `responsibility · total`, so they always sum to
    /// the total curve.
    pub fn curves(&self, lo: f64, hi: f64, points: usize) -> MixtureCurves {
        let x = linspace(lo, hi, points);
        let k = self.num_components();
        let mut components = vec![Vec::with_capacity(points); k];
        let mut total = Vec::with_capacity(points);
        for &xi in &x {
            let pdf = self.score_samples(xi).exp();
            for (curve, r) in components.iter_mut().zip(self.predict_proba(xi)) {
                curve.push(r * pdf);
            }
            total.push(pdf);
        }
        MixtureCurves {
            x,
            components,
            total,
        }
    }

    /// Bayesian Information Criterion over the training data.
    pub fn bic(&self) -> f64 {
        let n = self.n_samples as f64;
        -2.0 * self.mean_log_likelihood * n + self.num_params() as f64 * n.ln()
    }

    /// Akaike Information Criterion over the training data.
    pub fn aic(&self) -> f64 {
        -2.0 * self.mean_log_likelihood * self.n_samples as f64 + 2.0 * self.num_params() as f64
    }

    // means + variances + weights (with sum=1 constraint)
    fn num_params(&self) -> usize {
        3 * self.num_components() - 1
    }

    fn weighted_log_densities(&self, x: f64) -> Vec<f64> {
        self.weights
            .iter()
            .zip(&self.components)
            .map(|(w, c)| w.ln() + c.ln_pdf(x))
            .collect()
    }
}
