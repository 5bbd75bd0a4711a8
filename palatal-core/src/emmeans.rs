//! Estimated marginal means, pairwise contrasts, and predicted probabilities.
//!
//! Marginal means are computed on the link (log-odds) scale at a reference
//! grid: the named factors run over all their level combinations, other
//! factors sit at their reference level, and numeric covariates at their
//! table mean. Contrast p-values can be Tukey-adjusted for the family of
//! all pairwise comparisons; with infinite degrees of freedom this uses
//! the studentized range distribution of k standard normals, evaluated by
//! numeric integration.

use std::collections::HashMap;

use statrs::distribution::{Continuous, ContinuousCDF, Normal};

use palatal_table::{Column, Table};

use crate::design::CovariateValue;
use crate::error::ModelError;
use crate::glm::{inv_logit, GlmFit};
use crate::linalg::{dot, Matrix};

/// Multiple-comparison adjustment for pairwise contrasts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Adjustment {
    /// Unadjusted two-sided normal p-values.
    None,
    /// Tukey honestly-significant-difference family.
    Tukey,
}

/// One cell of the reference grid.
#[derive(Debug, Clone)]
pub struct EmmCell {
    /// Level names, parallel to the grid's factors.
    pub levels: Vec<String>,
    /// Marginal mean on the link scale.
    pub eta: f64,
    pub se: f64,
    /// Observations in the table with this factor combination.
    pub n_obs: usize,
    x: Vec<f64>,
}

impl EmmCell {
    pub fn label(&self) -> String {
        self.levels.join(" ")
    }
}

/// A reference grid of estimated marginal means.
#[derive(Debug, Clone)]
pub struct EmmGrid {
    pub factors: Vec<String>,
    pub cells: Vec<EmmCell>,
    cov: Matrix,
}

/// One pairwise difference of marginal means.
#[derive(Debug, Clone)]
pub struct Contrast {
    pub lhs: String,
    pub rhs: String,
    /// Difference on the link scale.
    pub estimate: f64,
    pub se: f64,
    pub z: f64,
    pub p_adjusted: f64,
}

/// Compute the marginal means of `fit` over all combinations of `factors`.
///
/// Combinations with zero observations in `table` are omitted from the
/// grid (and logged), never synthesized.
pub fn estimated_marginal_means(
    table: &Table,
    fit: &GlmFit,
    factors: &[&str],
) -> Result<EmmGrid, ModelError> {
    let mut level_sets: Vec<Vec<String>> = Vec::with_capacity(factors.len());
    let mut code_sets: Vec<&[u32]> = Vec::with_capacity(factors.len());
    for &name in factors {
        let (levels, codes) = table.factor(name)?;
        level_sets.push(levels.to_vec());
        code_sets.push(codes);
    }

    let baseline = baseline_values(table, fit, factors)?;

    // All level-index combinations, first factor slowest.
    let mut combos: Vec<Vec<usize>> = vec![Vec::new()];
    for levels in &level_sets {
        let mut next = Vec::with_capacity(combos.len() * levels.len());
        for combo in &combos {
            for li in 0..levels.len() {
                let mut extended = combo.clone();
                extended.push(li);
                next.push(extended);
            }
        }
        combos = next;
    }

    let mut cells = Vec::new();
    for combo in combos {
        let n_obs = (0..table.n_rows())
            .filter(|&row| {
                combo
                    .iter()
                    .zip(code_sets.iter())
                    .all(|(&li, codes)| codes[row] == li as u32)
            })
            .count();

        let levels: Vec<String> = combo
            .iter()
            .zip(level_sets.iter())
            .map(|(&li, levels)| levels[li].clone())
            .collect();

        if n_obs == 0 {
            tracing::warn!(
                "no observations for combination [{}]; omitting it from the grid",
                levels.join(", ")
            );
            continue;
        }

        let mut values = baseline.clone();
        for (name, level) in factors.iter().zip(levels.iter()) {
            values.insert(name.to_string(), CovariateValue::Level(level.clone()));
        }

        let x = fit.x_row_at(&values)?;
        let eta = dot(&x, &fit.beta);
        let se = fit.cov.quad_form(&x).max(0.0).sqrt();
        cells.push(EmmCell {
            levels,
            eta,
            se,
            n_obs,
            x,
        });
    }

    Ok(EmmGrid {
        factors: factors.iter().map(|s| s.to_string()).collect(),
        cells,
        cov: fit.cov.clone(),
    })
}

/// All pairwise differences between grid cells, in grid order.
pub fn pairwise_contrasts(grid: &EmmGrid, adjustment: Adjustment) -> Vec<Contrast> {
    let k = grid.cells.len();
    let normal = Normal::new(0.0, 1.0).expect("unit normal");

    let mut contrasts = Vec::with_capacity(k.saturating_sub(1) * k / 2);
    for i in 0..k {
        for j in (i + 1)..k {
            let a = &grid.cells[i];
            let b = &grid.cells[j];
            let estimate = a.eta - b.eta;

            let d: Vec<f64> = a.x.iter().zip(b.x.iter()).map(|(&xi, &xj)| xi - xj).collect();
            let se = grid.cov.quad_form(&d).max(0.0).sqrt();
            let z = if se > 1e-30 { estimate / se } else { 0.0 };

            let p_adjusted = match adjustment {
                Adjustment::Tukey if k >= 2 => {
                    1.0 - studentized_range_cdf(z.abs() * std::f64::consts::SQRT_2, k)
                }
                _ => 2.0 * (1.0 - normal.cdf(z.abs())),
            };

            contrasts.push(Contrast {
                lhs: a.label(),
                rhs: b.label(),
                estimate,
                se,
                z,
                p_adjusted: p_adjusted.clamp(0.0, 1.0),
            });
        }
    }
    contrasts
}

/// Predicted probability of the non-reference outcome at a named covariate
/// setting: the inverse logit of the model's linear predictor.
pub fn predicted_probability(
    fit: &GlmFit,
    values: &[(&str, CovariateValue)],
) -> Result<f64, ModelError> {
    let map: HashMap<String, CovariateValue> = values
        .iter()
        .map(|(name, v)| (name.to_string(), v.clone()))
        .collect();
    Ok(inv_logit(fit.eta_at(&map)?))
}

/// Reference values for every column the model touches: factors at their
/// reference level, numeric covariates at their table mean. Columns in
/// `grid_factors` are filled in per grid cell by the caller.
fn baseline_values(
    table: &Table,
    fit: &GlmFit,
    grid_factors: &[&str],
) -> Result<HashMap<String, CovariateValue>, ModelError> {
    let mut values = HashMap::new();
    for name in table.names() {
        if grid_factors.contains(&name.as_str()) || name == fit.spec.outcome.as_str() {
            continue;
        }
        match table.column(name)? {
            Column::Factor { levels, .. } => {
                if let Some(reference) = levels.first() {
                    values.insert(name.clone(), CovariateValue::Level(reference.clone()));
                }
            }
            Column::Numeric(data) => {
                let mean = if data.is_empty() {
                    0.0
                } else {
                    data.iter().sum::<f64>() / data.len() as f64
                };
                values.insert(name.clone(), CovariateValue::Value(mean));
            }
        }
    }
    Ok(values)
}

/// CDF of the studentized range of `k` independent standard normals
/// (infinite degrees of freedom):
///   P(Q < q) = k * Integral phi(z) * [Phi(z) - Phi(z - q)]^{k-1} dz
/// evaluated with composite Simpson over z in [-8, q + 8].
fn studentized_range_cdf(q: f64, k: usize) -> f64 {
    if q <= 0.0 {
        return 0.0;
    }
    let normal = Normal::new(0.0, 1.0).expect("unit normal");
    let integrand = |z: f64| -> f64 {
        let inner = (normal.cdf(z) - normal.cdf(z - q)).max(0.0);
        normal.pdf(z) * inner.powi(k as i32 - 1)
    };

    let lo = -8.0;
    let hi = q + 8.0;
    let steps = 2000usize; // even
    let h = (hi - lo) / steps as f64;
    let mut sum = integrand(lo) + integrand(hi);
    for i in 1..steps {
        let z = lo + i as f64 * h;
        sum += integrand(z) * if i % 2 == 1 { 4.0 } else { 2.0 };
    }
    (k as f64 * sum * h / 3.0).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formula::{ModelSpec, Term};
    use crate::glm::{fit_binomial, FitConfig};

    fn factor(levels: &[&str], codes: &[u32]) -> Column {
        Column::Factor {
            levels: levels.iter().map(|s| s.to_string()).collect(),
            codes: codes.to_vec(),
        }
    }

    fn study_table() -> Table {
        // cluster x stress cells with varying palatalization rates; the
        // (fl, atonic) cell is deliberately empty.
        let mut cluster = Vec::new();
        let mut stress = Vec::new();
        let mut outcome = Vec::new();
        let cells: &[(u32, u32, usize, usize)] = &[
            (0, 0, 7, 10),
            (0, 1, 3, 10),
            (1, 0, 6, 10),
            (1, 1, 2, 10),
            (2, 0, 5, 10),
        ];
        for &(c, s, k, n) in cells {
            for i in 0..n {
                cluster.push(c);
                stress.push(s);
                outcome.push(u32::from(i < k));
            }
        }
        Table::new(
            vec!["cluster".into(), "stress".into(), "outcome".into()],
            vec![
                factor(&["pl", "kl", "fl"], &cluster),
                factor(&["tonic", "atonic"], &stress),
                factor(&["preservation", "palatalization"], &outcome),
            ],
        )
    }

    #[test]
    fn test_grid_omits_empty_combination() {
        let table = study_table();
        let spec = ModelSpec::new(
            "outcome",
            vec![Term::main("cluster"), Term::main("stress")],
        );
        let fit = fit_binomial(&table, &spec, &FitConfig::default()).unwrap();
        let grid = estimated_marginal_means(&table, &fit, &["cluster", "stress"]).unwrap();

        // 3 x 2 combinations minus the empty (fl, atonic) cell.
        assert_eq!(grid.cells.len(), 5);
        assert!(grid
            .cells
            .iter()
            .all(|c| !(c.levels == vec!["fl", "atonic"])));
        assert!(grid.cells.iter().all(|c| c.n_obs > 0));
        assert!(grid.cells.iter().all(|c| c.se.is_finite() && c.se > 0.0));
    }

    #[test]
    fn test_grid_etas_match_one_factor_cell_log_odds() {
        // With a saturated one-factor model, marginal means equal the
        // per-level empirical log-odds.
        let table = study_table();
        let spec = ModelSpec::new("outcome", vec![Term::main("stress")]);
        let fit = fit_binomial(&table, &spec, &FitConfig::default()).unwrap();
        let grid = estimated_marginal_means(&table, &fit, &["stress"]).unwrap();

        // tonic: 18/30 palatalized, atonic: 5/20.
        let tonic = (18.0_f64 / 12.0).ln();
        let atonic = (5.0_f64 / 15.0).ln();
        assert!((grid.cells[0].eta - tonic).abs() < 1e-6);
        assert!((grid.cells[1].eta - atonic).abs() < 1e-6);
    }

    #[test]
    fn test_tukey_with_two_means_equals_unadjusted() {
        let table = study_table();
        let spec = ModelSpec::new("outcome", vec![Term::main("stress")]);
        let fit = fit_binomial(&table, &spec, &FitConfig::default()).unwrap();
        let grid = estimated_marginal_means(&table, &fit, &["stress"]).unwrap();

        let tukey = pairwise_contrasts(&grid, Adjustment::Tukey);
        let plain = pairwise_contrasts(&grid, Adjustment::None);
        assert_eq!(tukey.len(), 1);
        assert!((tukey[0].p_adjusted - plain[0].p_adjusted).abs() < 1e-5);
    }

    #[test]
    fn test_tukey_adjustment_is_conservative() {
        let table = study_table();
        let spec = ModelSpec::new(
            "outcome",
            vec![Term::main("cluster"), Term::main("stress")],
        );
        let fit = fit_binomial(&table, &spec, &FitConfig::default()).unwrap();
        let grid = estimated_marginal_means(&table, &fit, &["cluster", "stress"]).unwrap();

        let tukey = pairwise_contrasts(&grid, Adjustment::Tukey);
        let plain = pairwise_contrasts(&grid, Adjustment::None);
        assert_eq!(tukey.len(), 10); // C(5, 2)
        for (t, u) in tukey.iter().zip(plain.iter()) {
            assert!(t.p_adjusted >= u.p_adjusted - 1e-9);
            assert!((0.0..=1.0).contains(&t.p_adjusted));
        }
    }

    #[test]
    fn test_studentized_range_cdf_k2_matches_normal() {
        // For k = 2, P(Q >= |z| * sqrt(2)) is the two-sided normal test.
        let normal = Normal::new(0.0, 1.0).unwrap();
        for &z in &[0.5, 1.0, 1.96, 3.0] {
            let p_range = 1.0 - studentized_range_cdf(z * std::f64::consts::SQRT_2, 2);
            let p_normal = 2.0 * (1.0 - normal.cdf(z));
            assert!(
                (p_range - p_normal).abs() < 1e-5,
                "z={z}: {p_range} vs {p_normal}"
            );
        }
    }

    #[test]
    fn test_predicted_probability() {
        let table = study_table();
        let spec = ModelSpec::new("outcome", vec![Term::main("stress")]);
        let fit = fit_binomial(&table, &spec, &FitConfig::default()).unwrap();

        let p = predicted_probability(&fit, &[("stress", CovariateValue::level("tonic"))])
            .unwrap();
        assert!((p - 0.6).abs() < 1e-6); // 18/30 palatalized under tonic
        assert!((0.0..=1.0).contains(&p));
    }
}
