//! Human-readable and serializable summaries of fitted models.

use serde::Serialize;

use crate::emmeans::Contrast;
use crate::glm::GlmFit;
use crate::stepwise::StepwiseResult;

/// One coefficient row of a model summary.
#[derive(Debug, Clone, Serialize)]
pub struct CoefRow {
    pub name: String,
    pub estimate: f64,
    pub se: f64,
    pub z: f64,
    pub p: f64,
}

/// A serializable snapshot of a fitted model.
#[derive(Debug, Clone, Serialize)]
pub struct FitSummary {
    pub formula: String,
    pub coefficients: Vec<CoefRow>,
    pub deviance: f64,
    pub aic: f64,
    pub n_obs: usize,
    pub iterations: usize,
    pub converged: bool,
    pub separation: bool,
    /// Term labels dropped during stepwise selection, in drop order.
    pub dropped_terms: Vec<String>,
}

impl FitSummary {
    pub fn from_fit(fit: &GlmFit) -> Self {
        let coefficients = fit
            .names
            .iter()
            .zip(fit.beta.iter())
            .zip(fit.se.iter())
            .zip(fit.z.iter())
            .zip(fit.p_values.iter())
            .map(|((((name, &estimate), &se), &z), &p)| CoefRow {
                name: name.clone(),
                estimate,
                se,
                z,
                p,
            })
            .collect();
        Self {
            formula: fit.spec.formula(),
            coefficients,
            deviance: fit.deviance,
            aic: fit.aic,
            n_obs: fit.n_obs,
            iterations: fit.iterations,
            converged: fit.converged,
            separation: fit.separation,
            dropped_terms: Vec::new(),
        }
    }

    pub fn from_stepwise(result: &StepwiseResult) -> Self {
        let mut summary = Self::from_fit(&result.fit);
        summary.dropped_terms = result.path.iter().map(|s| s.dropped.clone()).collect();
        summary
    }
}

impl std::fmt::Display for FitSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Model: {}", self.formula)?;
        writeln!(
            f,
            "n = {}, deviance = {:.3}, AIC = {:.3}{}{}",
            self.n_obs,
            self.deviance,
            self.aic,
            if self.converged { "" } else { " [not converged]" },
            if self.separation { " [separation]" } else { "" },
        )?;
        if !self.dropped_terms.is_empty() {
            writeln!(f, "Dropped by stepwise: {}", self.dropped_terms.join(", "))?;
        }
        writeln!(
            f,
            "{:<28} {:>10} {:>10} {:>8} {:>8}",
            "Coefficient", "Estimate", "Std.Err", "z", "p"
        )?;
        for row in &self.coefficients {
            writeln!(
                f,
                "{:<28} {:>10.4} {:>10.4} {:>8.3} {:>8.4}",
                row.name, row.estimate, row.se, row.z, row.p
            )?;
        }
        Ok(())
    }
}

/// A serializable contrast row.
#[derive(Debug, Clone, Serialize)]
pub struct ContrastRow {
    pub contrast: String,
    pub estimate: f64,
    pub se: f64,
    pub z: f64,
    pub p_adjusted: f64,
}

impl ContrastRow {
    pub fn from_contrast(c: &Contrast) -> Self {
        Self {
            contrast: format!("{} - {}", c.lhs, c.rhs),
            estimate: c.estimate,
            se: c.se,
            z: c.z,
            p_adjusted: c.p_adjusted,
        }
    }
}

/// Render a contrast table.
pub fn format_contrasts(rows: &[ContrastRow]) -> String {
    use std::fmt::Write;
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<36} {:>10} {:>10} {:>8} {:>8}",
        "Contrast", "Estimate", "Std.Err", "z", "p(adj)"
    );
    for row in rows {
        let _ = writeln!(
            out,
            "{:<36} {:>10.4} {:>10.4} {:>8.3} {:>8.4}",
            row.contrast, row.estimate, row.se, row.z, row.p_adjusted
        );
    }
    out
}
