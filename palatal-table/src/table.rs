//! Immutable column-typed tables and the CSV loader.
//!
//! A `Table` stores each column either as a factor (interned level codes)
//! or as numeric values. Every transformation returns a new table; nothing
//! mutates in place after loading.

use std::path::Path;

use csv::ReaderBuilder;

use crate::error::TableError;
use crate::schema::{ColumnKind, Schema};

/// One typed column.
#[derive(Debug, Clone)]
pub enum Column {
    /// Categorical column: `codes[r]` indexes into `levels`.
    /// `levels[0]` is the reference level.
    Factor { levels: Vec<String>, codes: Vec<u32> },
    /// Floating-point column.
    Numeric(Vec<f64>),
}

impl Column {
    fn len(&self) -> usize {
        match self {
            Column::Factor { codes, .. } => codes.len(),
            Column::Numeric(values) => values.len(),
        }
    }
}

/// An immutable table with named, typed columns.
#[derive(Debug, Clone)]
pub struct Table {
    names: Vec<String>,
    columns: Vec<Column>,
    n_rows: usize,
}

impl Table {
    /// Build a table from parallel (name, column) pairs.
    /// All columns must have the same length.
    pub fn new(names: Vec<String>, columns: Vec<Column>) -> Self {
        assert_eq!(names.len(), columns.len());
        let n_rows = columns.first().map_or(0, Column::len);
        for col in &columns {
            assert_eq!(col.len(), n_rows, "ragged columns");
        }
        Self {
            names,
            columns,
            n_rows,
        }
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn col_index(&self, name: &str) -> Result<usize, TableError> {
        self.names
            .iter()
            .position(|n| n == name)
            .ok_or_else(|| TableError::UnknownColumn(name.to_string()))
    }

    pub fn column(&self, name: &str) -> Result<&Column, TableError> {
        Ok(&self.columns[self.col_index(name)?])
    }

    pub fn column_at(&self, index: usize) -> &Column {
        &self.columns[index]
    }

    /// Numeric column values, or an error if the column is categorical.
    pub fn numeric(&self, name: &str) -> Result<&[f64], TableError> {
        match self.column(name)? {
            Column::Numeric(values) => Ok(values),
            Column::Factor { .. } => Err(TableError::WrongColumnKind {
                column: name.to_string(),
                expected: "numeric",
            }),
        }
    }

    /// Factor levels and codes, or an error if the column is numeric.
    pub fn factor(&self, name: &str) -> Result<(&[String], &[u32]), TableError> {
        match self.column(name)? {
            Column::Factor { levels, codes } => Ok((levels, codes)),
            Column::Numeric(_) => Err(TableError::WrongColumnKind {
                column: name.to_string(),
                expected: "factor",
            }),
        }
    }

    /// The level code for a named level of a factor column.
    pub fn level_code(&self, name: &str, level: &str) -> Result<u32, TableError> {
        let (levels, _) = self.factor(name)?;
        levels
            .iter()
            .position(|l| l == level)
            .map(|i| i as u32)
            .ok_or_else(|| TableError::UnknownLevel {
                column: name.to_string(),
                level: level.to_string(),
            })
    }

    /// The level string of a factor cell.
    pub fn level_at(&self, name: &str, row: usize) -> Result<&str, TableError> {
        let (levels, codes) = self.factor(name)?;
        Ok(&levels[codes[row] as usize])
    }

    /// New table keeping `rows` (by index, in the given order).
    pub fn select_rows(&self, rows: &[usize]) -> Table {
        let columns = self
            .columns
            .iter()
            .map(|col| match col {
                Column::Factor { levels, codes } => Column::Factor {
                    levels: levels.clone(),
                    codes: rows.iter().map(|&r| codes[r]).collect(),
                },
                Column::Numeric(values) => {
                    Column::Numeric(rows.iter().map(|&r| values[r]).collect())
                }
            })
            .collect();
        Table {
            names: self.names.clone(),
            columns,
            n_rows: rows.len(),
        }
    }

    /// New table with an extra column appended.
    pub fn with_column(&self, name: &str, column: Column) -> Table {
        assert_eq!(column.len(), self.n_rows, "column length mismatch");
        let mut names = self.names.clone();
        let mut columns = self.columns.clone();
        names.push(name.to_string());
        columns.push(column);
        Table {
            names,
            columns,
            n_rows: self.n_rows,
        }
    }
}

/// Load a delimited file with a header row against a schema.
///
/// Every schema column must appear in the header (extra file columns are
/// ignored). Fails with `TableError::DataFormat` on a missing header, a row
/// with the wrong field count, an unparseable numeric cell, or a closed
/// factor value outside its vocabulary. Line numbers in errors are
/// 1-based file lines including the header.
pub fn load_csv(path: &Path, schema: &Schema) -> Result<Table, TableError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)?;

    let headers = reader.headers()?.clone();
    if headers.is_empty() || (headers.len() == 1 && headers[0].trim().is_empty()) {
        return Err(TableError::DataFormat {
            line: 1,
            reason: "missing header row".to_string(),
        });
    }
    let n_fields = headers.len();

    // Map each schema column to its position in the file.
    let field_index: Vec<usize> = schema
        .columns
        .iter()
        .map(|spec| {
            headers
                .iter()
                .position(|h| h.trim() == spec.name)
                .ok_or_else(|| TableError::DataFormat {
                    line: 1,
                    reason: format!("column '{}' not found in header", spec.name),
                })
        })
        .collect::<Result<_, _>>()?;

    // Accumulators, one per schema column.
    let mut builders: Vec<ColumnBuilder> = schema
        .columns
        .iter()
        .map(|spec| match &spec.kind {
            ColumnKind::Factor { levels, open } => ColumnBuilder::Factor {
                levels: levels.clone(),
                open: *open,
                codes: Vec::new(),
            },
            ColumnKind::Numeric => ColumnBuilder::Numeric(Vec::new()),
        })
        .collect();

    let mut n_rows = 0usize;
    for (i, record) in reader.records().enumerate() {
        let line = i + 2;
        let record = record?;
        if record.len() != n_fields {
            return Err(TableError::DataFormat {
                line,
                reason: format!("expected {} fields, found {}", n_fields, record.len()),
            });
        }

        for (spec, (&fi, builder)) in schema
            .columns
            .iter()
            .zip(field_index.iter().zip(builders.iter_mut()))
        {
            let cell = record[fi].trim();
            builder.push(&spec.name, cell, line)?;
        }
        n_rows += 1;
    }

    tracing::debug!("loaded {} rows x {} columns", n_rows, schema.columns.len());

    let names = schema.columns.iter().map(|s| s.name.clone()).collect();
    let columns = builders.into_iter().map(ColumnBuilder::finish).collect();
    Ok(Table::new(names, columns))
}

enum ColumnBuilder {
    Factor {
        levels: Vec<String>,
        open: bool,
        codes: Vec<u32>,
    },
    Numeric(Vec<f64>),
}

impl ColumnBuilder {
    fn push(&mut self, name: &str, cell: &str, line: usize) -> Result<(), TableError> {
        match self {
            ColumnBuilder::Factor { levels, open, codes } => {
                match levels.iter().position(|l| l == cell) {
                    Some(code) => codes.push(code as u32),
                    None if *open => {
                        levels.push(cell.to_string());
                        codes.push((levels.len() - 1) as u32);
                    }
                    None => {
                        return Err(TableError::DataFormat {
                            line,
                            reason: format!(
                                "value '{}' is not a level of column '{}'",
                                cell, name
                            ),
                        });
                    }
                }
            }
            ColumnBuilder::Numeric(values) => {
                let v: f64 = cell.parse().map_err(|_| TableError::DataFormat {
                    line,
                    reason: format!("non-numeric value '{}' in column '{}'", cell, name),
                })?;
                values.push(v);
            }
        }
        Ok(())
    }

    fn finish(self) -> Column {
        match self {
            ColumnBuilder::Factor { levels, codes, .. } => Column::Factor { levels, codes },
            ColumnBuilder::Numeric(values) => Column::Numeric(values),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ColumnSpec;
    use std::io::Write;

    fn write_file(contents: &str) -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokens.csv");
        let mut f = std::fs::File::create(&path).unwrap();
        write!(f, "{contents}").unwrap();
        (dir, path)
    }

    fn tiny_schema() -> Schema {
        Schema::new(vec![
            ColumnSpec::open_factor("word"),
            ColumnSpec::factor("cluster", &["pl", "kl", "fl"]),
            ColumnSpec::numeric("ffc"),
        ])
    }

    #[test]
    fn test_load_csv() {
        let (_dir, path) = write_file("word,cluster,ffc\nplanus,pl,0.8\nclavis,kl,0.3\n");
        let table = load_csv(&path, &tiny_schema()).unwrap();

        assert_eq!(table.n_rows(), 2);
        assert_eq!(table.numeric("ffc").unwrap(), &[0.8, 0.3]);
        assert_eq!(table.level_at("cluster", 1).unwrap(), "kl");

        // Open factor vocabulary grows in encounter order.
        let (levels, codes) = table.factor("word").unwrap();
        assert_eq!(levels, &["planus".to_string(), "clavis".to_string()]);
        assert_eq!(codes, &[0, 1]);
    }

    #[test]
    fn test_load_csv_extra_file_columns_ignored() {
        let (_dir, path) = write_file("note,word,cluster,ffc\nx,planus,pl,0.8\n");
        let table = load_csv(&path, &tiny_schema()).unwrap();
        assert_eq!(table.n_cols(), 3);
        assert_eq!(table.n_rows(), 1);
    }

    #[test]
    fn test_load_csv_missing_column() {
        let (_dir, path) = write_file("word,cluster\nplanus,pl\n");
        let err = load_csv(&path, &tiny_schema()).unwrap_err();
        assert!(matches!(err, TableError::DataFormat { line: 1, .. }));
    }

    #[test]
    fn test_load_csv_missing_header() {
        let (_dir, path) = write_file("");
        let err = load_csv(&path, &tiny_schema()).unwrap_err();
        assert!(matches!(err, TableError::DataFormat { .. }));
    }

    #[test]
    fn test_load_csv_wrong_field_count() {
        let (_dir, path) = write_file("word,cluster,ffc\nplanus,pl\n");
        let err = load_csv(&path, &tiny_schema()).unwrap_err();
        match err {
            TableError::DataFormat { line, .. } => assert_eq!(line, 2),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_load_csv_bad_numeric() {
        let (_dir, path) = write_file("word,cluster,ffc\nplanus,pl,high\n");
        let err = load_csv(&path, &tiny_schema()).unwrap_err();
        match err {
            TableError::DataFormat { line, reason } => {
                assert_eq!(line, 2);
                assert!(reason.contains("non-numeric"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_load_csv_unknown_level() {
        let (_dir, path) = write_file("word,cluster,ffc\nplanus,gr,0.5\n");
        let err = load_csv(&path, &tiny_schema()).unwrap_err();
        assert!(matches!(err, TableError::DataFormat { line: 2, .. }));
    }

    #[test]
    fn test_select_rows() {
        let (_dir, path) =
            write_file("word,cluster,ffc\nplanus,pl,0.8\nclavis,kl,0.3\nflamma,fl,0.9\n");
        let table = load_csv(&path, &tiny_schema()).unwrap();
        let subset = table.select_rows(&[2, 0]);
        assert_eq!(subset.n_rows(), 2);
        assert_eq!(subset.level_at("word", 0).unwrap(), "flamma");
        assert_eq!(subset.numeric("ffc").unwrap(), &[0.9, 0.8]);
        // Original untouched.
        assert_eq!(table.n_rows(), 3);
    }

    #[test]
    fn test_with_column() {
        let (_dir, path) = write_file("word,cluster,ffc\nplanus,pl,0.8\n");
        let table = load_csv(&path, &tiny_schema()).unwrap();
        let extended = table.with_column("y", Column::Numeric(vec![1.0]));
        assert_eq!(extended.n_cols(), 4);
        assert_eq!(table.n_cols(), 3);
    }
}
