//! Explicit, enumerable model terms.
//!
//! A model is specified as an outcome column plus an ordered list of terms,
//! each term being the set of table columns it involves. Stepwise selection
//! walks this data structure directly; there is no formula-string parsing
//! and no runtime reflection. Term order is significant: it is the
//! deterministic tie-break order during elimination.

use serde::Serialize;

/// One model term: a main effect (one column) or an interaction
/// (two or more columns, crossed).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Term {
    columns: Vec<String>,
}

impl Term {
    /// Main effect of a single column.
    pub fn main(column: &str) -> Self {
        Self {
            columns: vec![column.to_string()],
        }
    }

    /// Interaction of two or more columns. Column order within a term is
    /// normalized (sorted) so `a:b` and `b:a` are the same term.
    pub fn interaction(columns: &[&str]) -> Self {
        assert!(columns.len() >= 2, "interactions need at least two columns");
        let mut columns: Vec<String> = columns.iter().map(|s| s.to_string()).collect();
        columns.sort();
        Self { columns }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn order(&self) -> usize {
        self.columns.len()
    }

    /// Display label, e.g. `cluster` or `cluster:stress`.
    pub fn label(&self) -> String {
        self.columns.join(":")
    }

    /// Whether this term is marginal to `other`: a strict subset of its
    /// columns. A marginal term may not be dropped while the containing
    /// term is retained.
    pub fn is_marginal_to(&self, other: &Term) -> bool {
        self != other && self.columns.iter().all(|c| other.columns.contains(c))
    }
}

/// An outcome column plus an ordered term set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelSpec {
    pub outcome: String,
    pub terms: Vec<Term>,
}

impl ModelSpec {
    pub fn new(outcome: &str, terms: Vec<Term>) -> Self {
        Self {
            outcome: outcome.to_string(),
            terms,
        }
    }

    /// All main effects of `predictors` followed by all pairwise
    /// interactions, in the given order.
    pub fn factorial(outcome: &str, predictors: &[&str]) -> Self {
        let mut terms: Vec<Term> = predictors.iter().map(|p| Term::main(p)).collect();
        for i in 0..predictors.len() {
            for j in (i + 1)..predictors.len() {
                terms.push(Term::interaction(&[predictors[i], predictors[j]]));
            }
        }
        Self::new(outcome, terms)
    }

    /// A copy with the term at `index` removed.
    pub fn without_term(&self, index: usize) -> Self {
        let mut terms = self.terms.clone();
        terms.remove(index);
        Self {
            outcome: self.outcome.clone(),
            terms,
        }
    }

    /// Indices of terms eligible for removal: terms that are not marginal
    /// to any other retained term.
    pub fn droppable_terms(&self) -> Vec<usize> {
        (0..self.terms.len())
            .filter(|&i| {
                !self
                    .terms
                    .iter()
                    .any(|other| self.terms[i].is_marginal_to(other))
            })
            .collect()
    }

    /// R-style display, e.g. `outcome ~ cluster + stress + cluster:stress`.
    pub fn formula(&self) -> String {
        if self.terms.is_empty() {
            return format!("{} ~ 1", self.outcome);
        }
        let rhs: Vec<String> = self.terms.iter().map(Term::label).collect();
        format!("{} ~ {}", self.outcome, rhs.join(" + "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interaction_order_normalized() {
        assert_eq!(
            Term::interaction(&["stress", "cluster"]),
            Term::interaction(&["cluster", "stress"])
        );
    }

    #[test]
    fn test_marginality() {
        let main = Term::main("cluster");
        let inter = Term::interaction(&["cluster", "stress"]);
        assert!(main.is_marginal_to(&inter));
        assert!(!inter.is_marginal_to(&main));
        assert!(!main.is_marginal_to(&main));
    }

    #[test]
    fn test_factorial() {
        let spec = ModelSpec::factorial("outcome", &["cluster", "stress", "ffc"]);
        // 3 main effects + 3 pairwise interactions.
        assert_eq!(spec.terms.len(), 6);
        assert_eq!(
            spec.formula(),
            "outcome ~ cluster + stress + ffc + cluster:stress + cluster:ffc + ffc:stress"
        );
    }

    #[test]
    fn test_droppable_respects_marginality() {
        let spec = ModelSpec::factorial("outcome", &["cluster", "stress"]);
        // Only the interaction may be dropped while it is present.
        assert_eq!(spec.droppable_terms(), vec![2]);

        let mains_only = spec.without_term(2);
        assert_eq!(mains_only.droppable_terms(), vec![0, 1]);
    }

    #[test]
    fn test_intercept_only_formula() {
        let spec = ModelSpec::new("outcome", Vec::new());
        assert_eq!(spec.formula(), "outcome ~ 1");
        assert!(spec.droppable_terms().is_empty());
    }
}
