//! palatal-core: statistical pipeline for the cluster palatalization study.
//!
//! Implements the modeling half of the analysis: explicit term sets and
//! treatment-coded design matrices, binomial GLM fitting by Fisher scoring,
//! backward stepwise selection by AIC, estimated marginal means with
//! Tukey-adjusted pairwise contrasts, and predicted probabilities.

pub mod design;
pub mod emmeans;
pub mod error;
pub mod formula;
pub mod glm;
pub mod linalg;
pub mod stepwise;
pub mod summary;

pub use design::CovariateValue;
pub use emmeans::{
    estimated_marginal_means, pairwise_contrasts, predicted_probability, Adjustment, Contrast,
    EmmGrid,
};
pub use error::ModelError;
pub use formula::{ModelSpec, Term};
pub use glm::{fit_binomial, inv_logit, FitConfig, GlmFit};
pub use stepwise::{stepwise_select, StepwiseResult};
