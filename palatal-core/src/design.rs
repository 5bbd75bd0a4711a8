//! Design-matrix construction from a table and a term set.
//!
//! Factors are treatment-coded against their declared reference level
//! (one indicator per non-reference level); numeric columns enter as-is;
//! interaction columns are element-wise products of their constituents'
//! coded columns. Each design column keeps a recipe of how it was built,
//! so the same coding can be re-evaluated at arbitrary covariate settings
//! for marginal means and predicted probabilities.

use std::collections::HashMap;

use palatal_table::{Column, Table};

use crate::error::ModelError;
use crate::formula::ModelSpec;
use crate::linalg::Matrix;

/// A covariate setting for evaluating the linear predictor off-sample.
#[derive(Debug, Clone, PartialEq)]
pub enum CovariateValue {
    /// A factor level, by name.
    Level(String),
    /// A numeric value.
    Value(f64),
}

impl CovariateValue {
    pub fn level(s: &str) -> Self {
        CovariateValue::Level(s.to_string())
    }
}

/// One multiplicative part of a design column.
#[derive(Debug, Clone)]
enum Part {
    /// Indicator for `column == level`.
    Indicator { column: String, level: String },
    /// The numeric value of `column`.
    Numeric { column: String },
}

/// How one design column is computed. An empty part list is the intercept.
#[derive(Debug, Clone)]
pub struct ColRecipe {
    parts: Vec<Part>,
}

impl ColRecipe {
    fn label(&self) -> String {
        if self.parts.is_empty() {
            return "(Intercept)".to_string();
        }
        self.parts
            .iter()
            .map(|p| match p {
                Part::Indicator { column, level } => format!("{column}[{level}]"),
                Part::Numeric { column } => column.clone(),
            })
            .collect::<Vec<_>>()
            .join(":")
    }

    /// Evaluate the column for every table row.
    fn eval_table(&self, table: &Table) -> Result<Vec<f64>, ModelError> {
        let n = table.n_rows();
        let mut out = vec![1.0; n];
        for part in &self.parts {
            match part {
                Part::Indicator { column, level } => {
                    let code = table.level_code(column, level)?;
                    let (_, codes) = table.factor(column)?;
                    for (o, &c) in out.iter_mut().zip(codes.iter()) {
                        if c != code {
                            *o = 0.0;
                        }
                    }
                }
                Part::Numeric { column } => {
                    let values = table.numeric(column)?;
                    for (o, &v) in out.iter_mut().zip(values.iter()) {
                        *o *= v;
                    }
                }
            }
        }
        Ok(out)
    }

    /// Evaluate the column at a named covariate setting. Every column the
    /// recipe touches must be present in `values`.
    pub fn eval_at(&self, values: &HashMap<String, CovariateValue>) -> Result<f64, ModelError> {
        let mut out = 1.0;
        for part in &self.parts {
            match part {
                Part::Indicator { column, level } => match values.get(column) {
                    Some(CovariateValue::Level(l)) => {
                        if l != level {
                            return Ok(0.0);
                        }
                    }
                    Some(CovariateValue::Value(_)) | None => {
                        return Err(ModelError::MissingCovariate(column.clone()))
                    }
                },
                Part::Numeric { column } => match values.get(column) {
                    Some(CovariateValue::Value(v)) => out *= v,
                    Some(CovariateValue::Level(_)) | None => {
                        return Err(ModelError::MissingCovariate(column.clone()))
                    }
                },
            }
        }
        Ok(out)
    }
}

/// A built design: response vector, model matrix, and per-column recipes.
#[derive(Debug, Clone)]
pub struct Design {
    pub x: Matrix,
    pub y: Vec<f64>,
    pub names: Vec<String>,
    pub recipes: Vec<ColRecipe>,
}

/// Build the treatment-coded design matrix for `spec` over `table`.
pub fn build_design(table: &Table, spec: &ModelSpec) -> Result<Design, ModelError> {
    if table.n_rows() == 0 {
        return Err(ModelError::EmptyTable);
    }

    let y = encode_outcome(table, &spec.outcome)?;

    let mut recipes = vec![ColRecipe { parts: Vec::new() }];
    for term in &spec.terms {
        // Per-column bases, then their cartesian product.
        let mut bases: Vec<Vec<Part>> = Vec::new();
        for column in term.columns() {
            bases.push(column_basis(table, column)?);
        }
        let mut combos: Vec<Vec<Part>> = vec![Vec::new()];
        for basis in &bases {
            let mut next = Vec::with_capacity(combos.len() * basis.len());
            for combo in &combos {
                for part in basis {
                    let mut extended = combo.clone();
                    extended.push(part.clone());
                    next.push(extended);
                }
            }
            combos = next;
        }
        recipes.extend(combos.into_iter().map(|parts| ColRecipe { parts }));
    }

    let names = recipes.iter().map(ColRecipe::label).collect();

    let n = table.n_rows();
    let p = recipes.len();
    let mut x = Matrix::zeros(n, p);
    for (j, recipe) in recipes.iter().enumerate() {
        let col = recipe.eval_table(table)?;
        for (i, v) in col.into_iter().enumerate() {
            x.set(i, j, v);
        }
    }

    Ok(Design { x, y, names, recipes })
}

/// The coded columns a single table column contributes to a term.
fn column_basis(table: &Table, column: &str) -> Result<Vec<Part>, ModelError> {
    match table.column(column)? {
        Column::Factor { levels, .. } => Ok(levels
            .iter()
            .skip(1) // reference level carries no indicator
            .map(|level| Part::Indicator {
                column: column.to_string(),
                level: level.clone(),
            })
            .collect()),
        Column::Numeric(_) => Ok(vec![Part::Numeric {
            column: column.to_string(),
        }]),
    }
}

/// Encode the outcome as 0/1. A two-level factor codes its reference level
/// (level 0, "preservation" in the cluster schema) as 0; a numeric column
/// must already be 0/1.
fn encode_outcome(table: &Table, outcome: &str) -> Result<Vec<f64>, ModelError> {
    match table.column(outcome)? {
        Column::Factor { levels, codes } => {
            if levels.len() != 2 {
                return Err(ModelError::NonBinaryOutcome {
                    column: outcome.to_string(),
                    reason: format!("{} levels", levels.len()),
                });
            }
            Ok(codes.iter().map(|&c| if c == 0 { 0.0 } else { 1.0 }).collect())
        }
        Column::Numeric(values) => {
            for &v in values {
                if v != 0.0 && v != 1.0 {
                    return Err(ModelError::NonBinaryOutcome {
                        column: outcome.to_string(),
                        reason: format!("non-0/1 value {v}"),
                    });
                }
            }
            Ok(values.clone())
        }
    }
}
