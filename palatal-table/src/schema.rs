//! Column schemas with explicit factor vocabularies and reference levels.
//!
//! Factor levels are declared in a fixed order and the first level is the
//! reference level for treatment coding. Nothing in the pipeline relies on
//! alphabetical or insertion order, so coefficient signs are reproducible
//! across runs and inputs.

/// How a column is typed when loading.
#[derive(Debug, Clone)]
pub enum ColumnKind {
    /// Unordered categorical column. `levels[0]` is the reference level.
    /// Open factors accept unseen values and grow their vocabulary in
    /// first-encounter order; closed factors reject them as a format error.
    Factor { levels: Vec<String>, open: bool },
    /// Floating-point column. Non-numeric text is a format error;
    /// no imputation is performed.
    Numeric,
}

/// One column declaration.
#[derive(Debug, Clone)]
pub struct ColumnSpec {
    pub name: String,
    pub kind: ColumnKind,
}

impl ColumnSpec {
    pub fn numeric(name: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: ColumnKind::Numeric,
        }
    }

    /// Closed factor with a fixed vocabulary; the first level is the reference.
    pub fn factor(name: &str, levels: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            kind: ColumnKind::Factor {
                levels: levels.iter().map(|s| s.to_string()).collect(),
                open: false,
            },
        }
    }

    /// Open factor whose vocabulary is built in first-encounter order.
    pub fn open_factor(name: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: ColumnKind::Factor {
                levels: Vec::new(),
                open: true,
            },
        }
    }
}

/// An ordered set of column declarations.
#[derive(Debug, Clone)]
pub struct Schema {
    pub columns: Vec<ColumnSpec>,
}

impl Schema {
    pub fn new(columns: Vec<ColumnSpec>) -> Self {
        Self { columns }
    }

    pub fn column(&self, name: &str) -> Option<&ColumnSpec> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// The schema of the annotated cluster token dataset.
    ///
    /// Reference levels: `cluster`=pl, `stress`=tonic, `prec_context`=fav,
    /// `fol_context`=fav, `transmission`=oral, `outcome`=preservation,
    /// `hapax`=no. The outcome reference must stay `preservation`; the
    /// worked probabilities in the analysis depend on that coding.
    pub fn cluster_tokens() -> Self {
        Self::new(vec![
            ColumnSpec::open_factor("word"),
            ColumnSpec::factor("cluster", &["pl", "kl", "fl"]),
            ColumnSpec::factor("stress", &["tonic", "atonic"]),
            ColumnSpec::numeric("log_freq"),
            ColumnSpec::numeric("ffc"),
            ColumnSpec::factor("prec_context", &["fav", "unfav"]),
            ColumnSpec::factor("fol_context", &["fav", "unfav"]),
            ColumnSpec::factor("transmission", &["oral", "learned"]),
            ColumnSpec::factor("outcome", &["preservation", "palatalization"]),
            ColumnSpec::factor("hapax", &["no", "yes"]),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cluster_tokens_schema() {
        let schema = Schema::cluster_tokens();
        assert_eq!(schema.columns.len(), 10);

        let outcome = schema.column("outcome").unwrap();
        match &outcome.kind {
            ColumnKind::Factor { levels, open } => {
                assert_eq!(levels[0], "preservation", "outcome reference level");
                assert!(!open);
            }
            _ => panic!("outcome must be a factor"),
        }
    }

    #[test]
    fn test_word_is_open() {
        let schema = Schema::cluster_tokens();
        match &schema.column("word").unwrap().kind {
            ColumnKind::Factor { open, .. } => assert!(open),
            _ => panic!("word must be a factor"),
        }
    }
}
