//! Binomial GLM fitting by iteratively reweighted least squares.
//!
//! Fisher scoring with the logit link:
//!   beta <- beta + (X'WX)^{-1} X'(y - mu),  W = diag(mu (1 - mu))
//! A near-singular information matrix gets one ridge retry; designs with
//! sparse categorical interactions are routinely rank-deficient and the
//! jitter keeps the search moving rather than aborting the run.
//!
//! Perfect or quasi-perfect separation (fitted probabilities saturating at
//! 0 or 1) is expected with these data; it is reported as a warning and
//! flagged on the fit, and the best-available coefficients are returned.

use std::collections::HashMap;

use statrs::distribution::{ContinuousCDF, Normal};

use palatal_table::Table;

use crate::design::{build_design, ColRecipe, CovariateValue};
use crate::error::ModelError;
use crate::formula::ModelSpec;
use crate::linalg::{dot, Cholesky, Matrix};

/// Configuration for the IRLS fitter.
#[derive(Debug, Clone)]
pub struct FitConfig {
    /// Maximum Fisher scoring iterations.
    pub max_iter: usize,
    /// Convergence tolerance on the largest coefficient update.
    pub tol: f64,
    /// Ridge added to the information diagonal when factorization fails.
    pub ridge: f64,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            max_iter: 30,
            tol: 1e-8,
            ridge: 1e-6,
        }
    }
}

/// An immutable fitted binomial GLM.
#[derive(Debug, Clone)]
pub struct GlmFit {
    /// The term set that produced this fit.
    pub spec: ModelSpec,
    /// Coefficient labels, `(Intercept)` first.
    pub names: Vec<String>,
    /// Estimates on the log-odds scale.
    pub beta: Vec<f64>,
    /// Standard errors.
    pub se: Vec<f64>,
    /// Wald z-values.
    pub z: Vec<f64>,
    /// Two-sided normal p-values.
    pub p_values: Vec<f64>,
    /// Covariance of the estimates, (X'WX)^{-1} at convergence.
    pub cov: Matrix,
    /// Residual deviance.
    pub deviance: f64,
    /// Akaike information criterion: deviance + 2 * n_coefficients.
    pub aic: f64,
    pub n_obs: usize,
    pub iterations: usize,
    pub converged: bool,
    /// Fitted probabilities saturated at 0/1 (perfect or quasi-perfect
    /// separation). Non-fatal; coefficients are still usable for AIC
    /// comparison.
    pub separation: bool,
    pub(crate) recipes: Vec<ColRecipe>,
}

impl GlmFit {
    /// The design row at a named covariate setting, in coefficient order.
    pub fn x_row_at(
        &self,
        values: &HashMap<String, CovariateValue>,
    ) -> Result<Vec<f64>, ModelError> {
        self.recipes.iter().map(|r| r.eval_at(values)).collect()
    }

    /// The linear predictor eta at a named covariate setting.
    pub fn eta_at(&self, values: &HashMap<String, CovariateValue>) -> Result<f64, ModelError> {
        Ok(dot(&self.x_row_at(values)?, &self.beta))
    }
}

/// Fit a binomial GLM for `spec` over `table`.
pub fn fit_binomial(
    table: &Table,
    spec: &ModelSpec,
    config: &FitConfig,
) -> Result<GlmFit, ModelError> {
    let design = build_design(table, spec)?;
    let n = design.x.nrows();
    let p = design.x.ncols();
    let y = &design.y;

    let mut beta = vec![0.0; p];
    let mut converged = false;
    let mut iterations = 0;
    let mut mu = vec![0.5; n];

    for iter in 0..config.max_iter {
        iterations = iter + 1;

        let eta = design.x.mat_vec(&beta);
        mu = eta.iter().map(|&e| inv_logit(e)).collect();

        let w: Vec<f64> = mu.iter().map(|&m| (m * (1.0 - m)).max(1e-10)).collect();
        let residuals: Vec<f64> = y.iter().zip(mu.iter()).map(|(&yi, &mi)| yi - mi).collect();
        let score = design.x.xtv(&residuals);
        let info = design.x.xtwx(&w);

        let delta = solve_with_ridge(&info, &score, config.ridge)?;

        let mut max_change = 0.0_f64;
        for (b, d) in beta.iter_mut().zip(delta.iter()) {
            *b += d;
            max_change = max_change.max(d.abs());
        }

        if max_change < config.tol {
            converged = true;
            break;
        }
    }

    // Final fitted values and covariance at the returned estimates.
    let eta = design.x.mat_vec(&beta);
    mu = eta.iter().map(|&e| inv_logit(e)).collect();
    let w: Vec<f64> = mu.iter().map(|&m| (m * (1.0 - m)).max(1e-10)).collect();
    let info = design.x.xtwx(&w);
    let cov = inverse_with_ridge(&info, config.ridge)?;

    let separation = mu.iter().any(|&m| m < 1e-7 || m > 1.0 - 1e-7);
    if separation {
        tracing::warn!(
            "fitted probabilities saturate at 0/1 for '{}' (quasi-perfect separation); \
             estimates returned as-is",
            spec.formula()
        );
    }
    if !converged {
        tracing::warn!(
            "IRLS did not converge in {} iterations for '{}'; returning current estimates",
            config.max_iter,
            spec.formula()
        );
    }

    let se: Vec<f64> = cov.diag().iter().map(|&v| v.max(0.0).sqrt()).collect();
    let normal = Normal::new(0.0, 1.0).expect("unit normal");
    let z: Vec<f64> = beta
        .iter()
        .zip(se.iter())
        .map(|(&b, &s)| if s > 1e-30 { b / s } else { 0.0 })
        .collect();
    let p_values: Vec<f64> = z.iter().map(|&zi| 2.0 * (1.0 - normal.cdf(zi.abs()))).collect();

    let deviance = binomial_deviance(y, &mu);
    let aic = deviance + 2.0 * p as f64;

    tracing::debug!(
        "fit '{}': deviance={:.3} aic={:.3} iter={} converged={}",
        spec.formula(),
        deviance,
        aic,
        iterations,
        converged
    );

    Ok(GlmFit {
        spec: spec.clone(),
        names: design.names,
        beta,
        se,
        z,
        p_values,
        cov,
        deviance,
        aic,
        n_obs: n,
        iterations,
        converged,
        separation,
        recipes: design.recipes,
    })
}

/// The inverse-logit transform: exp(eta) / (1 + exp(eta)).
/// Strictly increasing, bounded in (0, 1), exactly 0.5 at eta = 0.
#[inline]
pub fn inv_logit(eta: f64) -> f64 {
    1.0 / (1.0 + (-eta).exp())
}

/// -2 * log-likelihood of the binomial fit.
fn binomial_deviance(y: &[f64], mu: &[f64]) -> f64 {
    let mut ll = 0.0;
    for (&yi, &mi) in y.iter().zip(mu.iter()) {
        let m = mi.clamp(1e-10, 1.0 - 1e-10);
        ll += yi * m.ln() + (1.0 - yi) * (1.0 - m).ln();
    }
    -2.0 * ll
}

fn solve_with_ridge(info: &Matrix, rhs: &[f64], ridge: f64) -> Result<Vec<f64>, ModelError> {
    match Cholesky::factor(info) {
        Ok(chol) => Ok(chol.solve(rhs)),
        Err(_) => {
            let jittered = add_ridge(info, ridge);
            let chol = Cholesky::factor(&jittered)?;
            Ok(chol.solve(rhs))
        }
    }
}

fn inverse_with_ridge(info: &Matrix, ridge: f64) -> Result<Matrix, ModelError> {
    match Cholesky::factor(info) {
        Ok(chol) => Ok(chol.inverse()),
        Err(_) => {
            let jittered = add_ridge(info, ridge);
            let chol = Cholesky::factor(&jittered)?;
            Ok(chol.inverse())
        }
    }
}

fn add_ridge(a: &Matrix, ridge: f64) -> Matrix {
    let mut out = a.clone();
    for j in 0..out.ncols() {
        out.set(j, j, out.get(j, j) + ridge);
    }
    out
}
