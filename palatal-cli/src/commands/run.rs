//! The full analysis pipeline.
//!
//! palatal run --input tokens.csv --output-prefix out
//!
//! Load -> derive word types -> dedupe -> drop hapaxes -> factorial model
//! with stepwise reduction -> oral-transmission subset with recoded outcome
//! and a reduced model -> marginal means and Tukey contrasts -> report.

use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use tracing::info;

use palatal_core::emmeans::{
    estimated_marginal_means, pairwise_contrasts, predicted_probability, Adjustment,
};
use palatal_core::summary::{format_contrasts, ContrastRow, FitSummary};
use palatal_core::{fit_binomial, stepwise_select, CovariateValue, FitConfig, GlmFit, ModelSpec};
use palatal_table::derive::{
    dedupe, derive_type, filter_multi_instance, grouped_counts, recode_outcome, subset_by_level,
    GroupCount,
};
use palatal_table::{load_csv, Column, Schema, Table};

use crate::report;

/// Predictors of the full factorial model, in term order.
const PREDICTORS: &[&str] = &[
    "cluster",
    "stress",
    "log_freq",
    "ffc",
    "prec_context",
    "fol_context",
    "transmission",
];

/// Representative FFC values for the predicted-probability table.
const FFC_GRID: &[f64] = &[0.1, 0.5, 1.0];

#[derive(Args)]
pub struct RunArgs {
    /// Input token CSV file
    #[arg(long)]
    input: String,

    /// Output file prefix (writes <prefix>.html, optionally <prefix>.json)
    #[arg(long)]
    output_prefix: String,

    /// Predictors excluded from the oral-subset model, comma-separated.
    /// The source analysis dropped fol_context as imbalanced across levels;
    /// the exclusion is a modeling judgment, so it stays configurable.
    #[arg(long, default_value = "fol_context")]
    subset_drop: String,

    /// Also save a JSON sidecar with all model summaries
    #[arg(long, default_value = "false")]
    save_json: bool,
}

/// Everything the report and the JSON sidecar need.
#[derive(Serialize)]
pub struct AnalysisBundle {
    pub n_tokens: usize,
    pub n_types: usize,
    pub n_analysis: usize,
    pub n_oral: usize,
    pub full_model: FitSummary,
    pub subset_model: FitSummary,
    pub contrasts: Vec<ContrastRow>,
    pub predicted: Vec<(f64, f64)>,
    pub cluster_outcome: Vec<GroupCount>,
    pub transmission_outcome: Vec<GroupCount>,
}

pub fn run(args: RunArgs) -> Result<()> {
    info!("=== Cluster palatalization analysis ===");
    info!("Input: {}", args.input);

    let table = load_csv(Path::new(&args.input), &Schema::cluster_tokens())
        .with_context(|| format!("failed to load {}", args.input))?;
    info!("Loaded {} token rows", table.n_rows());

    // Collapse tokens to one representative row per (word, cluster) type
    // and keep only words attested more than once.
    let typed = derive_type(&table)?;
    let deduped = dedupe(&typed, "type")?;
    let analysis = filter_multi_instance(&deduped)?;
    info!(
        "{} word types, {} multi-instance types enter the analysis",
        deduped.n_rows(),
        analysis.n_rows()
    );

    let config = FitConfig::default();

    // Full factorial model over the whole analysis table.
    let full_spec = ModelSpec::factorial("outcome", PREDICTORS);
    info!("Fitting '{}'", full_spec.formula());
    let full_fit = fit_binomial(&analysis, &full_spec, &config)?;
    let full = stepwise_select(&analysis, full_fit, &config)?;

    // Oral-transmission subset: learned/written words did not undergo the
    // change vernacularly, so transmission is structurally confounded with
    // the filter and leaves the model along with the configured drops.
    let dropped: HashSet<&str> = args.subset_drop.split(',').map(str::trim).collect();
    let subset_predictors: Vec<&str> = PREDICTORS
        .iter()
        .copied()
        .filter(|p| *p != "transmission" && !dropped.contains(p))
        .collect();

    let oral = subset_by_level(&analysis, "transmission", "oral")?;
    let recoded = recode_outcome(
        &oral,
        "outcome",
        "outcome_bin",
        &[("palatalization", 0.0), ("preservation", 1.0)],
    )?;
    let subset_spec = ModelSpec::factorial("outcome_bin", &subset_predictors);
    info!("Fitting oral subset '{}'", subset_spec.formula());
    let subset_fit = fit_binomial(&recoded, &subset_spec, &config)?;
    let subset = stepwise_select(&recoded, subset_fit, &config)?;

    // Post-hoc: marginal means over the factors the reduced full model
    // retained, with Tukey-adjusted pairwise contrasts.
    let emm_factors = retained_factors(&analysis, &full.fit);
    let contrasts = if emm_factors.is_empty() {
        info!("No factors retained by stepwise; skipping contrasts");
        Vec::new()
    } else {
        let names: Vec<&str> = emm_factors.iter().map(String::as_str).collect();
        let grid = estimated_marginal_means(&analysis, &full.fit, &names)?;
        pairwise_contrasts(&grid, Adjustment::Tukey)
            .iter()
            .map(ContrastRow::from_contrast)
            .collect()
    };

    // Predicted palatalization-avoidance probabilities at representative
    // FFC values, other covariates at reference/mean.
    let predicted = predicted_over_ffc(&recoded, &subset.fit)?;

    let cluster_outcome = grouped_counts(&analysis, &["cluster", "outcome"])?;
    let transmission_outcome = grouped_counts(&analysis, &["transmission", "outcome"])?;

    let bundle = AnalysisBundle {
        n_tokens: table.n_rows(),
        n_types: deduped.n_rows(),
        n_analysis: analysis.n_rows(),
        n_oral: oral.n_rows(),
        full_model: FitSummary::from_stepwise(&full),
        subset_model: FitSummary::from_stepwise(&subset),
        contrasts,
        predicted,
        cluster_outcome,
        transmission_outcome,
    };

    print_results(&bundle);

    let charts = chart_data(&analysis, &recoded, &subset.fit)?;
    let html = report::build_report(&args.input, &bundle, &charts);
    let html_path = format!("{}.html", args.output_prefix);
    std::fs::write(&html_path, html).with_context(|| format!("failed to write {html_path}"))?;
    info!("Report written to {html_path}");

    if args.save_json {
        let json_path = format!("{}.json", args.output_prefix);
        let json = serde_json::to_string_pretty(&bundle)?;
        std::fs::write(&json_path, json)
            .with_context(|| format!("failed to write {json_path}"))?;
        info!("JSON sidecar written to {json_path}");
    }

    Ok(())
}

/// Factor columns appearing in the reduced model's retained terms,
/// in predictor order.
fn retained_factors(table: &Table, fit: &GlmFit) -> Vec<String> {
    let mut used: Vec<String> = Vec::new();
    for term in &fit.spec.terms {
        for column in term.columns() {
            let is_factor = matches!(table.column(column), Ok(Column::Factor { .. }));
            if is_factor && !used.contains(column) {
                used.push(column.clone());
            }
        }
    }
    // Keep predictor order deterministic regardless of term order.
    let mut ordered: Vec<String> = PREDICTORS
        .iter()
        .filter(|p| used.iter().any(|u| u == *p))
        .map(|p| p.to_string())
        .collect();
    for u in used {
        if !ordered.contains(&u) {
            ordered.push(u);
        }
    }
    ordered
}

/// Predicted P(preservation) over the FFC grid, when the subset model
/// retained FFC; other covariates sit at reference levels / means.
fn predicted_over_ffc(table: &Table, fit: &GlmFit) -> Result<Vec<(f64, f64)>> {
    let uses_ffc = fit
        .spec
        .terms
        .iter()
        .any(|t| t.columns().contains(&"ffc".to_string()));
    if !uses_ffc {
        info!("Subset model does not retain ffc; skipping predicted probabilities");
        return Ok(Vec::new());
    }

    let mut out = Vec::with_capacity(FFC_GRID.len());
    for &ffc in FFC_GRID {
        let mut values = baseline_covariates(table, fit)?;
        values.push(("ffc", CovariateValue::Value(ffc)));
        let p = predicted_probability(fit, &values)?;
        out.push((ffc, p));
    }
    Ok(out)
}

/// Series for the report charts: observed oral-subset (ffc, outcome)
/// points, a fitted probability curve over the observed FFC range, and
/// log_freq values split by outcome.
fn chart_data(
    analysis: &Table,
    recoded: &Table,
    fit: &GlmFit,
) -> Result<report::ChartData> {
    let ffc = recoded.numeric("ffc")?;
    let outcome_bin = recoded.numeric("outcome_bin")?;
    let ffc_points: Vec<(f64, f64)> = ffc
        .iter()
        .zip(outcome_bin.iter())
        .map(|(&x, &y)| (x, y))
        .collect();

    let uses_ffc = fit
        .spec
        .terms
        .iter()
        .any(|t| t.columns().contains(&"ffc".to_string()));
    let mut ffc_curve = Vec::new();
    if uses_ffc && !ffc.is_empty() {
        let lo = ffc.iter().cloned().fold(f64::INFINITY, f64::min);
        let hi = ffc.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        for i in 0..=100 {
            let x = lo + (hi - lo) * (i as f64) / 100.0;
            let mut values = baseline_covariates(recoded, fit)?;
            values.push(("ffc", CovariateValue::Value(x)));
            ffc_curve.push((x, predicted_probability(fit, &values)?));
        }
    }

    let (outcome_levels, outcome_codes) = analysis.factor("outcome")?;
    let log_freq = analysis.numeric("log_freq")?;
    let mut logfreq_by_outcome: Vec<(String, Vec<f64>)> = outcome_levels
        .iter()
        .map(|l| (l.clone(), Vec::new()))
        .collect();
    for (&code, &value) in outcome_codes.iter().zip(log_freq.iter()) {
        logfreq_by_outcome[code as usize].1.push(value);
    }
    logfreq_by_outcome.retain(|(_, values)| !values.is_empty());

    Ok(report::ChartData {
        ffc_points,
        ffc_curve,
        logfreq_by_outcome,
    })
}

/// Reference covariate settings for every table column: factors at their
/// reference level, numeric columns at their mean.
fn baseline_covariates<'a>(
    table: &'a Table,
    fit: &GlmFit,
) -> Result<Vec<(&'a str, CovariateValue)>> {
    let mut values = Vec::new();
    for name in table.names() {
        if name == fit.spec.outcome.as_str() || name == "ffc" {
            continue;
        }
        match table.column(name)? {
            Column::Factor { levels, .. } => {
                if let Some(reference) = levels.first() {
                    values.push((name.as_str(), CovariateValue::Level(reference.clone())));
                }
            }
            Column::Numeric(data) => {
                let mean = if data.is_empty() {
                    0.0
                } else {
                    data.iter().sum::<f64>() / data.len() as f64
                };
                values.push((name.as_str(), CovariateValue::Value(mean)));
            }
        }
    }
    Ok(values)
}

fn print_results(bundle: &AnalysisBundle) {
    println!("=== Data ===");
    println!(
        "tokens: {}   word types: {}   analyzed (multi-instance): {}   oral subset: {}",
        bundle.n_tokens, bundle.n_types, bundle.n_analysis, bundle.n_oral
    );

    println!("\n=== Full-table model (stepwise-reduced) ===");
    println!("{}", bundle.full_model);

    println!("=== Oral-subset model (stepwise-reduced) ===");
    println!("{}", bundle.subset_model);

    if !bundle.contrasts.is_empty() {
        println!("=== Tukey-adjusted pairwise contrasts ===");
        println!("{}", format_contrasts(&bundle.contrasts));
    }

    if !bundle.predicted.is_empty() {
        println!("=== Predicted P(preservation) by FFC (oral subset) ===");
        for (ffc, p) in &bundle.predicted {
            println!("FFC = {ffc:.1}: {:.1}%", p * 100.0);
        }
    }
}
