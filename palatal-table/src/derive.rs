//! Pure table transformations run ahead of model fitting.
//!
//! All functions return a new table and leave their input unmodified.
//! Row order is always preserved.

use std::collections::HashMap;

use crate::error::TableError;
use crate::table::{Column, Table};

/// Append a `type` factor column computed as `word + "_" + cluster`.
///
/// The composite key is injective over distinct (word, cluster) pairs,
/// so deduplicating on it collapses tokens to word types. Levels are
/// interned in first-encounter order.
pub fn derive_type(table: &Table) -> Result<Table, TableError> {
    let (word_levels, word_codes) = table.factor("word")?;
    let (cluster_levels, cluster_codes) = table.factor("cluster")?;

    let mut levels: Vec<String> = Vec::new();
    let mut seen: HashMap<String, u32> = HashMap::new();
    let mut codes = Vec::with_capacity(table.n_rows());

    for (&w, &c) in word_codes.iter().zip(cluster_codes.iter()) {
        let key = format!("{}_{}", word_levels[w as usize], cluster_levels[c as usize]);
        let code = *seen.entry(key.clone()).or_insert_with(|| {
            levels.push(key);
            (levels.len() - 1) as u32
        });
        codes.push(code);
    }

    Ok(table.with_column("type", Column::Factor { levels, codes }))
}

/// Keep the first row per distinct level of `key`, in input order.
///
/// Idempotent: running it twice gives the same table as running it once.
pub fn dedupe(table: &Table, key: &str) -> Result<Table, TableError> {
    let (_, codes) = table.factor(key)?;

    let mut seen = vec![false; codes.iter().map(|&c| c as usize + 1).max().unwrap_or(0)];
    let mut keep = Vec::new();
    for (row, &code) in codes.iter().enumerate() {
        if !seen[code as usize] {
            seen[code as usize] = true;
            keep.push(row);
        }
    }

    tracing::debug!(
        "dedupe on '{}': {} rows -> {} word types",
        key,
        table.n_rows(),
        keep.len()
    );
    Ok(table.select_rows(&keep))
}

/// Keep only rows whose `hapax` value is "no" (words attested more than once).
pub fn filter_multi_instance(table: &Table) -> Result<Table, TableError> {
    subset_by_level(table, "hapax", "no")
}

/// Keep only rows where the factor `column` equals `level`.
pub fn subset_by_level(table: &Table, column: &str, level: &str) -> Result<Table, TableError> {
    let target = table.level_code(column, level)?;
    let (_, codes) = table.factor(column)?;
    let keep: Vec<usize> = codes
        .iter()
        .enumerate()
        .filter(|(_, &c)| c == target)
        .map(|(row, _)| row)
        .collect();
    Ok(table.select_rows(&keep))
}

/// Append a numeric column recoding the factor `column` through an explicit
/// level-to-value mapping. A level outside the mapping is an
/// `UnmappedLevel` error, not a silent NaN.
pub fn recode_outcome(
    table: &Table,
    column: &str,
    new_name: &str,
    mapping: &[(&str, f64)],
) -> Result<Table, TableError> {
    let (levels, codes) = table.factor(column)?;

    // Resolve the mapping once against the level table.
    let mut by_code: Vec<Option<f64>> = vec![None; levels.len()];
    for (level, value) in mapping {
        if let Some(i) = levels.iter().position(|l| l == level) {
            by_code[i] = Some(*value);
        }
    }

    let mut values = Vec::with_capacity(table.n_rows());
    for &code in codes {
        match by_code[code as usize] {
            Some(v) => values.push(v),
            None => {
                return Err(TableError::UnmappedLevel {
                    column: column.to_string(),
                    value: levels[code as usize].clone(),
                })
            }
        }
    }

    Ok(table.with_column(new_name, Column::Numeric(values)))
}

/// Count of rows for one combination of grouping-column levels.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct GroupCount {
    /// Level names, parallel to the grouping columns.
    pub levels: Vec<String>,
    pub count: usize,
}

/// Counts of rows per distinct combination of the grouping columns' values,
/// ordered by the columns' declared level order (first column slowest).
/// Combinations with zero observations are not synthesized. Counts sum to
/// the table's row count.
pub fn grouped_counts(table: &Table, group_columns: &[&str]) -> Result<Vec<GroupCount>, TableError> {
    let mut factors = Vec::with_capacity(group_columns.len());
    for &name in group_columns {
        factors.push(table.factor(name)?);
    }

    let mut counts: HashMap<Vec<u32>, usize> = HashMap::new();
    for row in 0..table.n_rows() {
        let key: Vec<u32> = factors.iter().map(|(_, codes)| codes[row]).collect();
        *counts.entry(key).or_insert(0) += 1;
    }

    let mut keys: Vec<Vec<u32>> = counts.keys().cloned().collect();
    keys.sort();

    Ok(keys
        .into_iter()
        .map(|key| {
            let levels = key
                .iter()
                .zip(factors.iter())
                .map(|(&code, (levels, _))| levels[code as usize].clone())
                .collect();
            let count = counts[&key];
            GroupCount { levels, count }
        })
        .collect())
}
