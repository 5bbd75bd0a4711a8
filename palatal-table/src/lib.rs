//! palatal-table: typed in-memory tables for the cluster token dataset.
//!
//! Loads a delimited token file against a declared schema, and provides
//! the pure table transformations the analysis pipeline runs before any
//! model fitting: type derivation, deduplication to word types, hapax
//! filtering, subsetting, outcome recoding, and grouped counts.

pub mod derive;
pub mod error;
pub mod schema;
pub mod table;

pub use error::TableError;
pub use schema::{ColumnKind, ColumnSpec, Schema};
pub use table::{load_csv, Column, Table};
