//! End-to-end pipeline tests over generated token files.

use std::io::Write;
use std::path::PathBuf;

use palatal_core::emmeans::{estimated_marginal_means, pairwise_contrasts, Adjustment};
use palatal_core::{fit_binomial, stepwise_select, FitConfig, ModelSpec};
use palatal_table::derive::{
    dedupe, derive_type, filter_multi_instance, grouped_counts, recode_outcome, subset_by_level,
};
use palatal_table::{load_csv, Schema};

const HEADER: &str =
    "word,cluster,stress,log_freq,ffc,prec_context,fol_context,transmission,outcome,hapax";

/// Deterministic 200-token file: 100 distinct (word, cluster) pairs, each
/// appearing twice, hapax evenly split yes/no by pair.
fn write_tokens() -> (tempfile::TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tokens.csv");
    let mut f = std::fs::File::create(&path).unwrap();
    writeln!(f, "{HEADER}").unwrap();

    let clusters = ["pl", "kl", "fl"];
    for pair in 0..100 {
        let word = format!("w{pair:03}");
        let cluster = clusters[pair % 3];
        let stress = if pair % 2 == 0 { "tonic" } else { "atonic" };
        let log_freq = 1.0 + (pair % 7) as f64 * 0.5;
        let ffc = (pair % 10) as f64 / 10.0;
        let prec = if pair % 4 == 0 { "unfav" } else { "fav" };
        let fol = if pair % 5 == 0 { "unfav" } else { "fav" };
        let transmission = if pair % 3 == 0 { "learned" } else { "oral" };
        // Palatalization is favored by low FFC.
        let outcome = if ffc < 0.5 { "palatalization" } else { "preservation" };
        let hapax = if pair % 2 == 0 { "yes" } else { "no" };

        for _ in 0..2 {
            writeln!(
                f,
                "{word},{cluster},{stress},{log_freq},{ffc},{prec},{fol},{transmission},{outcome},{hapax}"
            )
            .unwrap();
        }
    }
    (dir, path)
}

#[test]
fn test_dedupe_and_filter_row_counts() {
    let (_dir, path) = write_tokens();
    let table = load_csv(&path, &Schema::cluster_tokens()).unwrap();
    assert_eq!(table.n_rows(), 200);

    let typed = derive_type(&table).unwrap();
    let deduped = dedupe(&typed, "type").unwrap();
    // One representative per distinct (word, cluster) pair.
    assert_eq!(deduped.n_rows(), 100);

    let filtered = filter_multi_instance(&deduped).unwrap();
    // Hapax is split evenly across the 100 pairs.
    assert_eq!(filtered.n_rows(), 50);
}

#[test]
fn test_grouped_counts_sum_to_table_size() {
    let (_dir, path) = write_tokens();
    let table = load_csv(&path, &Schema::cluster_tokens()).unwrap();
    let counts = grouped_counts(&table, &["cluster", "outcome"]).unwrap();
    let total: usize = counts.iter().map(|g| g.count).sum();
    assert_eq!(total, table.n_rows());
}

#[test]
fn test_full_pipeline_runs() {
    let (_dir, path) = write_tokens();
    let table = load_csv(&path, &Schema::cluster_tokens()).unwrap();
    let typed = derive_type(&table).unwrap();
    let deduped = dedupe(&typed, "type").unwrap();
    let analysis = filter_multi_instance(&deduped).unwrap();

    let config = FitConfig::default();

    // Full-table model with interactions, then stepwise reduction.
    let spec = ModelSpec::factorial("outcome", &["cluster", "stress", "ffc"]);
    let fit = fit_binomial(&analysis, &spec, &config).unwrap();
    let reduced = stepwise_select(&analysis, fit, &config).unwrap();
    assert!(reduced.fit.aic.is_finite());

    // Oral-transmission subset, recoded outcome, reduced model.
    let oral = subset_by_level(&analysis, "transmission", "oral").unwrap();
    let recoded = recode_outcome(
        &oral,
        "outcome",
        "outcome_bin",
        &[("palatalization", 0.0), ("preservation", 1.0)],
    )
    .unwrap();
    let subset_spec = ModelSpec::factorial("outcome_bin", &["cluster", "ffc"]);
    let subset_fit = fit_binomial(&recoded, &subset_spec, &config).unwrap();
    let subset_reduced = stepwise_select(&recoded, subset_fit, &config).unwrap();

    // FFC fully determines the outcome in this synthetic file, so the
    // retained model must still involve it.
    assert!(subset_reduced
        .fit
        .spec
        .terms
        .iter()
        .any(|t| t.columns().contains(&"ffc".to_string())));

    // Post-hoc grid and contrasts on the full-table model's factors.
    let grid = estimated_marginal_means(&analysis, &reduced.fit, &["cluster", "stress"]).unwrap();
    assert!(!grid.cells.is_empty());
    let contrasts = pairwise_contrasts(&grid, Adjustment::Tukey);
    let k = grid.cells.len();
    assert_eq!(contrasts.len(), k * (k - 1) / 2);
    for c in &contrasts {
        assert!((0.0..=1.0).contains(&c.p_adjusted));
    }
}
