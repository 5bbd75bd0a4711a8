//! Backward stepwise term elimination guided by AIC.
//!
//! Greedy local search: each round refits the model once per droppable
//! term (terms marginal to a retained interaction are never candidates),
//! removes the drop with the lowest AIC if it beats the current model,
//! and stops when no removal improves the criterion. Ties keep the
//! earliest candidate in declared term order, so the search is
//! deterministic for a given term ordering.

use palatal_table::Table;

use crate::error::ModelError;
use crate::glm::{fit_binomial, FitConfig, GlmFit};

/// One elimination round.
#[derive(Debug, Clone)]
pub struct StepwiseStep {
    /// Label of the dropped term.
    pub dropped: String,
    pub aic_before: f64,
    pub aic_after: f64,
}

/// The reduced model and the path taken to reach it.
#[derive(Debug)]
pub struct StepwiseResult {
    pub fit: GlmFit,
    pub path: Vec<StepwiseStep>,
}

/// Backward-eliminate terms from `fit` until AIC stops improving.
///
/// A model with zero candidate terms (intercept-only, or every term
/// shielded by marginality) is returned unchanged.
pub fn stepwise_select(
    table: &Table,
    fit: GlmFit,
    config: &FitConfig,
) -> Result<StepwiseResult, ModelError> {
    let mut current = fit;
    let mut path = Vec::new();

    loop {
        let candidates = current.spec.droppable_terms();
        if candidates.is_empty() {
            break;
        }

        let mut best: Option<(usize, GlmFit)> = None;
        for index in candidates {
            let reduced_spec = current.spec.without_term(index);
            let reduced = fit_binomial(table, &reduced_spec, config)?;
            tracing::debug!(
                "  drop {} -> AIC {:.3}",
                current.spec.terms[index].label(),
                reduced.aic
            );
            // Strict inequality keeps the earliest candidate on ties.
            let improves = match &best {
                Some((_, b)) => reduced.aic < b.aic,
                None => true,
            };
            if improves {
                best = Some((index, reduced));
            }
        }

        let (index, reduced) = best.expect("candidates were non-empty");
        if reduced.aic < current.aic {
            let step = StepwiseStep {
                dropped: current.spec.terms[index].label(),
                aic_before: current.aic,
                aic_after: reduced.aic,
            };
            tracing::info!(
                "stepwise: drop {} (AIC {:.3} -> {:.3})",
                step.dropped,
                step.aic_before,
                step.aic_after
            );
            path.push(step);
            current = reduced;
        } else {
            break;
        }
    }

    tracing::info!(
        "stepwise: retained '{}' (AIC {:.3})",
        current.spec.formula(),
        current.aic
    );
    Ok(StepwiseResult { fit: current, path })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formula::{ModelSpec, Term};
    use palatal_table::{Column, Table};

    fn factor(levels: &[&str], codes: &[u32]) -> Column {
        Column::Factor {
            levels: levels.iter().map(|s| s.to_string()).collect(),
            codes: codes.to_vec(),
        }
    }

    /// Outcome depends on stress; noise is balanced so its coefficient is
    /// exactly zero and dropping it buys the full 2-point AIC penalty.
    fn stress_plus_noise_table() -> Table {
        let mut stress = Vec::new();
        let mut noise = Vec::new();
        let mut outcome = Vec::new();
        for s in 0..2u32 {
            for x in 0..2u32 {
                for i in 0..10 {
                    stress.push(s);
                    noise.push(x);
                    // 8/10 palatalized under tonic stress, 2/10 under atonic,
                    // identical across noise levels.
                    let threshold = if s == 0 { 8 } else { 2 };
                    outcome.push(u32::from(i < threshold));
                }
            }
        }
        Table::new(
            vec!["stress".into(), "noise".into(), "outcome".into()],
            vec![
                factor(&["tonic", "atonic"], &stress),
                factor(&["a", "b"], &noise),
                factor(&["preservation", "palatalization"], &outcome),
            ],
        )
    }

    #[test]
    fn test_drops_null_term_keeps_real_one() {
        let table = stress_plus_noise_table();
        let spec = ModelSpec::new(
            "outcome",
            vec![Term::main("stress"), Term::main("noise")],
        );
        let config = FitConfig::default();
        let fit = fit_binomial(&table, &spec, &config).unwrap();
        let result = stepwise_select(&table, fit, &config).unwrap();

        assert_eq!(
            result.fit.spec.terms,
            vec![Term::main("stress")],
            "noise should be eliminated, stress retained"
        );
        assert_eq!(result.path.len(), 1);
        assert_eq!(result.path[0].dropped, "noise");
        assert!(result.path[0].aic_after < result.path[0].aic_before);
    }

    #[test]
    fn test_zero_candidates_returns_model_unchanged() {
        let table = stress_plus_noise_table();
        let spec = ModelSpec::new("outcome", Vec::new());
        let config = FitConfig::default();
        let fit = fit_binomial(&table, &spec, &config).unwrap();
        let aic = fit.aic;

        let result = stepwise_select(&table, fit, &config).unwrap();
        assert!(result.path.is_empty());
        assert_eq!(result.fit.aic, aic);
        assert!(result.fit.spec.terms.is_empty());
    }

    #[test]
    fn test_marginality_shields_main_effects() {
        let table = stress_plus_noise_table();
        let spec = ModelSpec::factorial("outcome", &["stress", "noise"]);
        let config = FitConfig::default();
        let fit = fit_binomial(&table, &spec, &config).unwrap();
        let result = stepwise_select(&table, fit, &config).unwrap();

        // The interaction goes first; only then do the mains become
        // candidates. Stress must survive to the end.
        assert!(result
            .fit
            .spec
            .terms
            .contains(&Term::main("stress")));
        assert!(!result
            .fit
            .spec
            .terms
            .contains(&Term::interaction(&["stress", "noise"])));
    }

    #[test]
    fn test_aic_never_increases_along_path() {
        let table = stress_plus_noise_table();
        let spec = ModelSpec::factorial("outcome", &["stress", "noise"]);
        let config = FitConfig::default();
        let fit = fit_binomial(&table, &spec, &config).unwrap();
        let result = stepwise_select(&table, fit, &config).unwrap();

        for step in &result.path {
            assert!(step.aic_after < step.aic_before);
        }
    }
}
