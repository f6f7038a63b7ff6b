//! Two-parameter Weibull fit (location fixed at zero) by maximum likelihood.
//!
//! The shape parameter is found by Newton-Raphson on the profile
//! log-likelihood; the scale follows in closed form.
//!
//! # Reference
//! Lawless (2003), *Statistical Models and Methods for Lifetime Data*, 2nd ed.

use statrs::distribution::{Continuous, ContinuousCDF, Weibull};

use super::{linspace, FitError};

/// Maximum Newton-Raphson iterations.
const MAX_ITER: usize = 100;

/// Convergence tolerance for Newton-Raphson.
const TOL: f64 = 1e-10;

/// A fitted Weibull distribution.
#[derive(Debug, Clone)]
pub struct WeibullFit {
    /// Shape parameter (beta).
    pub shape: f64,
    /// Scale parameter (eta).
    pub scale: f64,
    /// Log-likelihood at the fitted parameters.
    pub log_likelihood: f64,
    /// Number of Newton-Raphson iterations used.
    pub iterations: usize,
    dist: Weibull,
}

/// Fit a Weibull distribution with location zero to positive data.
///
/// Given values t_1, ..., t_n, the MLE for eta given beta is
/// `eta_hat = (sum(t_i^beta) / n)^(1/beta)`, and beta solves
///
/// ```text
/// f(beta) = n/beta + sum(ln(t_i))
///         - n * sum(t_i^beta * ln(t_i)) / sum(t_i^beta) = 0
/// ```
///
/// starting from beta_0 = 1.2.
///
/// Non-finite values are rejected rather than skipped; drop missing values
/// before calling.
pub fn fit_weibull(data: &[f64]) -> Result<WeibullFit, FitError> {
    let n = data.len();
    if n < 2 {
        return Err(FitError::InsufficientData { needed: 2, got: n });
    }
    if data.iter().any(|t| !t.is_finite()) {
        return Err(FitError::NonFinite);
    }
    if data.iter().any(|&t| t <= 0.0) {
        return Err(FitError::NonPositive);
    }

    // Working in t / max(t) keeps t^beta from overflowing for large beta;
    // the scale is multiplied back at the end.
    let t_max = data.iter().copied().fold(f64::MIN_POSITIVE, f64::max);
    let scaled: Vec<f64> = data.iter().map(|t| t / t_max).collect();
    let ln_t: Vec<f64> = scaled.iter().map(|t| t.ln()).collect();
    let sum_ln_t: f64 = ln_t.iter().sum();
    let n_f = n as f64;

    // f'(beta) = -n/beta^2 - n * [S2*S0 - S1^2] / S0^2
    // where S0 = sum(t_i^beta), S1 = sum(t_i^beta * ln t_i), S2 = sum(t_i^beta * ln^2 t_i)
    let mut beta = 1.2_f64;
    let mut iterations = 0;
    let mut converged = false;

    for iter in 0..MAX_ITER {
        iterations = iter + 1;

        let (mut s0, mut s1, mut s2) = (0.0_f64, 0.0_f64, 0.0_f64);
        for (&t, &lt) in scaled.iter().zip(&ln_t) {
            let t_beta = t.powf(beta);
            s0 += t_beta;
            s1 += t_beta * lt;
            s2 += t_beta * lt * lt;
        }
        if s0 == 0.0 {
            break;
        }

        let f_val = n_f / beta + sum_ln_t - n_f * s1 / s0;
        let f_prime = -n_f / (beta * beta) - n_f * (s2 * s0 - s1 * s1) / (s0 * s0);
        if f_prime.abs() < 1e-30 {
            break;
        }

        let delta = f_val / f_prime;
        beta -= delta;
        if beta <= 0.0 {
            beta = 0.01;
        }
        if !beta.is_finite() {
            break;
        }
        if delta.abs() < TOL {
            converged = true;
            break;
        }
    }

    if !converged {
        return Err(FitError::NoConvergence { iterations });
    }

    let s0: f64 = scaled.iter().map(|t| t.powf(beta)).sum();
    let eta = (s0 / n_f).powf(1.0 / beta) * t_max;
    if !eta.is_finite() || eta <= 0.0 {
        return Err(FitError::NoConvergence { iterations });
    }

    let dist = Weibull::new(beta, eta).map_err(|e| FitError::Distribution(e.to_string()))?;
    let log_likelihood = data.iter().map(|&t| dist.ln_pdf(t)).sum();
    log::debug!("Weibull fit: shape {beta:.4}, scale {eta:.4} after {iterations} iterations");

    Ok(WeibullFit {
        shape: beta,
        scale: eta,
        log_likelihood,
        iterations,
        dist,
    })
}

impl WeibullFit {
    pub fn cdf(&self, x: f64) -> f64 {
        self.dist.cdf(x)
    }

    pub fn pdf(&self, x: f64) -> f64 {
        self.dist.pdf(x)
    }

    /// `(x, F(x))` at `points` evenly spaced positions in `[lo, hi]`.
    pub fn curve(&self, lo: f64, hi: f64, points: usize) -> Vec<(f64, f64)> {
        linspace(lo, hi, points)
            .into_iter()
            .map(|x| (x, self.cdf(x)))
            .collect()
    }
}
