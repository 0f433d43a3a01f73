//! Probability scoring
//!
//! Apply a make-probability model to the feature table.

pub mod logistic;
pub mod scorer;

pub use logistic::LogisticModel;
pub use scorer::{FeatureVector, ProbabilityModel, ProbabilityScorer, ScoredShot, FEATURE_NAMES};
