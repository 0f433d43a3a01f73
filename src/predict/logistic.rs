//! Logistic make-probability model loaded from JSON
//!
//! The file holds an intercept and one weight per feature column:
//!
//! ```json
//! { "intercept": -0.4, "coefficients": { "rolling_percent": 1.1, "spot_y": -0.03 } }
//! ```
//!
//! Columns without a weight contribute nothing.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::predict::scorer::{FeatureVector, ProbabilityModel};
use crate::{HoopsError, Result};

/// Logistic function for probability calculation
#[inline]
fn logistic(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Serialized weights
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticWeights {
    pub intercept: f64,
    pub coefficients: BTreeMap<String, f64>,
}

/// Linear logit over the feature vector
#[derive(Debug, Clone)]
pub struct LogisticModel {
    intercept: f64,
    weights: [f64; FeatureVector::DIM],
    columns: Vec<String>,
}

impl LogisticModel {
    pub fn from_weights(weights: LogisticWeights) -> Result<Self> {
        if !weights.intercept.is_finite() {
            return Err(HoopsError::Config(format!(
                "model intercept is not finite: {}",
                weights.intercept
            )));
        }

        let mut dense = [0.0; FeatureVector::DIM];
        let mut missing = Vec::new();
        for (name, weight) in &weights.coefficients {
            match FeatureVector::index_of(name) {
                Some(i) if weight.is_finite() => dense[i] = *weight,
                Some(_) => {
                    return Err(HoopsError::Config(format!(
                        "model weight for {} is not finite",
                        name
                    )))
                }
                None => missing.push(name.clone()),
            }
        }
        if !missing.is_empty() {
            return Err(HoopsError::FeatureMismatch(format!(
                "model weights reference missing columns: {}",
                missing.join(", ")
            )));
        }

        Ok(LogisticModel {
            intercept: weights.intercept,
            weights: dense,
            columns: weights.coefficients.into_keys().collect(),
        })
    }

    /// Load weights from a JSON file. A missing file means no model.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            log::warn!("No model file at {}", path.display());
            return Err(HoopsError::ModelUnavailable);
        }
        let content = std::fs::read_to_string(path)?;
        let weights: LogisticWeights = serde_json::from_str(&content)?;
        let model = Self::from_weights(weights)?;
        log::info!(
            "Loaded logistic model from {} ({} weighted columns)",
            path.display(),
            model.columns.len()
        );
        Ok(model)
    }

    pub fn logit(&self, features: &FeatureVector) -> f64 {
        self.intercept
            + self
                .weights
                .iter()
                .zip(features.values())
                .map(|(w, x)| w * x)
                .sum::<f64>()
    }
}

impl ProbabilityModel for LogisticModel {
    fn predict_probability(&self, features: &FeatureVector) -> f64 {
        logistic(self.logit(features))
    }

    fn name(&self) -> &str {
        "logistic"
    }

    fn required_features(&self) -> Option<Vec<String>> {
        Some(self.columns.clone())
    }
}
