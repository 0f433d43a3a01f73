//! Shot probability scoring
//!
//! The make-probability model is an injected capability. The scorer builds
//! the fixed feature vector for every row, validates it, and only then asks
//! the model for a probability.

use serde::Serialize;

use crate::features::FeatureRow;
use crate::{HoopsError, Result, Side};

/// Column names of the model feature vector, in order
pub const FEATURE_NAMES: [&str; FeatureVector::DIM] = [
    "spot_x",
    "spot_y",
    "shot_defense_coded",
    "initial_percentage",
    "init_expected",
    "spot_total_percentage",
    "game_percentage",
    "season_total_percentage",
    "rolling_percent",
    "season_last_5_percent",
    "home",
    "game_team_percentage",
    "team_spread",
    "rolling_points_team",
    "is_opponent",
    "point_value",
    "opponent_expected_rate",
];

/// Ordered model input for one shot
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureVector {
    values: [f64; FeatureVector::DIM],
}

impl FeatureVector {
    /// Number of features
    pub const DIM: usize = 17;

    pub fn from_row(row: &FeatureRow) -> Self {
        let flag = |b: bool| if b { 1.0 } else { 0.0 };
        FeatureVector {
            values: [
                row.spot_x,
                row.spot_y,
                row.shot_defense_coded as f64,
                row.initial_percentage,
                row.init_expected,
                row.spot_total_percentage,
                row.game_percentage,
                row.season_total_percentage,
                row.rolling_percent,
                row.season_last_5_percent,
                flag(row.location_flag),
                row.game_team_percentage,
                row.team_spread as f64,
                row.rolling_points_team as f64,
                flag(row.is_opponent()),
                row.point_value as f64,
                row.opponent_expected_rate,
            ],
        }
    }

    /// Create from a flat vector
    pub fn from_slice(v: &[f64]) -> Option<Self> {
        let values: [f64; Self::DIM] = v.try_into().ok()?;
        Some(FeatureVector { values })
    }

    pub fn values(&self) -> &[f64; Self::DIM] {
        &self.values
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        Self::index_of(name).map(|i| self.values[i])
    }

    pub fn index_of(name: &str) -> Option<usize> {
        FEATURE_NAMES.iter().position(|n| *n == name)
    }

    /// Every feature must be a finite number
    pub fn validate(&self) -> Result<()> {
        match self.values.iter().position(|v| !v.is_finite()) {
            Some(i) => Err(HoopsError::FeatureMismatch(format!(
                "feature '{}' is not numeric ({})",
                FEATURE_NAMES[i], self.values[i]
            ))),
            None => Ok(()),
        }
    }
}

/// Make-probability model contract
pub trait ProbabilityModel: Send + Sync {
    /// Probability in [0, 1] that the shot is made
    fn predict_probability(&self, features: &FeatureVector) -> f64;

    fn name(&self) -> &str {
        "model"
    }

    /// Feature columns the model reads. `None` means the standard vector.
    fn required_features(&self) -> Option<Vec<String>> {
        None
    }
}

impl<F> ProbabilityModel for F
where
    F: Fn(&FeatureVector) -> f64 + Send + Sync,
{
    fn predict_probability(&self, features: &FeatureVector) -> f64 {
        self(features)
    }

    fn name(&self) -> &str {
        "closure"
    }
}

/// A feature row with its model output
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredShot {
    #[serde(flatten)]
    pub features: FeatureRow,
    pub probability_of_make: f64,
    pub expected_points: f64,
    pub game_label: String,
}

impl ScoredShot {
    pub fn side(&self) -> Side {
        self.features.side
    }

    pub fn point_value(&self) -> u8 {
        self.features.point_value
    }
}

/// Applies a probability model to feature rows
#[derive(Default)]
pub struct ProbabilityScorer {
    model: Option<Box<dyn ProbabilityModel>>,
}

impl ProbabilityScorer {
    pub fn new(model: Box<dyn ProbabilityModel>) -> Self {
        ProbabilityScorer { model: Some(model) }
    }

    pub fn with_model<M: ProbabilityModel + 'static>(model: M) -> Self {
        Self::new(Box::new(model))
    }

    /// A scorer with no model; every call to `score` fails
    pub fn unavailable() -> Self {
        Self::default()
    }

    /// Score every row.
    ///
    /// All feature vectors are validated before the model is invoked, so a
    /// bad row fails the whole batch without any partial output.
    pub fn score(&self, rows: Vec<FeatureRow>) -> Result<Vec<ScoredShot>> {
        let model = self.model.as_deref().ok_or(HoopsError::ModelUnavailable)?;
        check_required_features(model)?;

        let vectors = rows
            .iter()
            .map(|row| {
                let v = FeatureVector::from_row(row);
                v.validate().map_err(|e| match e {
                    HoopsError::FeatureMismatch(msg) => HoopsError::FeatureMismatch(format!(
                        "{} in game {} play {}",
                        msg, row.game_id.0, row.play_sequence
                    )),
                    other => other,
                })?;
                Ok(v)
            })
            .collect::<Result<Vec<_>>>()?;

        let scored = rows
            .into_iter()
            .zip(&vectors)
            .map(|(row, vector)| {
                let p = model.predict_probability(vector);
                if !p.is_finite() || !(0.0..=1.0).contains(&p) {
                    return Err(HoopsError::ModelOutput {
                        game_id: row.game_id,
                        play_sequence: row.play_sequence,
                        value: p,
                    });
                }
                let game_label = row.game_label();
                let expected_points = p * row.point_value as f64;
                Ok(ScoredShot {
                    features: row,
                    probability_of_make: p,
                    expected_points,
                    game_label,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        log::info!("Scored {} shots with {}", scored.len(), model.name());
        Ok(scored)
    }
}

fn check_required_features(model: &dyn ProbabilityModel) -> Result<()> {
    if let Some(required) = model.required_features() {
        let missing: Vec<_> = required
            .iter()
            .filter(|name| FeatureVector::index_of(name).is_none())
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(HoopsError::FeatureMismatch(format!(
                "model {} requires missing columns: {}",
                model.name(),
                missing.join(", ")
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::SpotCatalog;
    use crate::features::FeatureBuilder;
    use crate::{GameId, PlayerId, ShotEvent};
    use chrono::NaiveDate;

    fn rows() -> Vec<FeatureRow> {
        let events = vec![
            ShotEvent {
                game_id: GameId(3),
                player_id: PlayerId(11),
                play_sequence: 1,
                shot_spot: "LC3".to_string(),
                shot_defense: "GUARDED".to_string(),
                made: true,
                point_value: 3,
                location_flag: false,
                season: 2024,
                opponent_name: "Hillcrest".to_string(),
                game_date: NaiveDate::from_ymd_opt(2024, 2, 9).unwrap(),
            },
            ShotEvent {
                game_id: GameId(3),
                player_id: PlayerId(0),
                play_sequence: 2,
                shot_spot: "PNT".to_string(),
                shot_defense: "OPEN".to_string(),
                made: false,
                point_value: 2,
                location_flag: false,
                season: 2024,
                opponent_name: "Hillcrest".to_string(),
                game_date: NaiveDate::from_ymd_opt(2024, 2, 9).unwrap(),
            },
        ];
        FeatureBuilder::new(SpotCatalog::standard(), "Eagles")
            .build(&events)
            .unwrap()
    }

    struct NeedsColumn;

    impl ProbabilityModel for NeedsColumn {
        fn predict_probability(&self, _features: &FeatureVector) -> f64 {
            0.5
        }

        fn required_features(&self) -> Option<Vec<String>> {
            Some(vec!["spot_x".to_string(), "shot_clock".to_string()])
        }
    }

    #[test]
    fn test_feature_vector_layout() {
        let rows = rows();
        let v = FeatureVector::from_row(&rows[0]);
        assert_eq!(v.values().len(), FeatureVector::DIM);
        assert_eq!(v.get("spot_x"), Some(-22.0));
        assert_eq!(v.get("shot_defense_coded"), Some(1.0));
        assert_eq!(v.get("home"), Some(0.0));
        assert_eq!(v.get("is_opponent"), Some(0.0));
        assert_eq!(v.get("point_value"), Some(3.0));
        assert_eq!(v.get("shot_clock"), None);

        let opp = FeatureVector::from_row(&rows[1]);
        assert_eq!(opp.get("is_opponent"), Some(1.0));
        assert_eq!(opp.get("opponent_expected_rate"), Some(1.16));
    }

    #[test]
    fn test_scores_expected_points() {
        let scorer = ProbabilityScorer::with_model(|_: &FeatureVector| 0.4);
        let scored = scorer.score(rows()).unwrap();

        assert_eq!(scored.len(), 2);
        assert!((scored[0].expected_points - 1.2).abs() < 1e-12);
        assert!((scored[1].expected_points - 0.8).abs() < 1e-12);
        assert_eq!(scored[0].game_label, "Hillcrest 2024-02-09");
    }

    #[test]
    fn test_missing_model() {
        let err = ProbabilityScorer::unavailable().score(rows()).unwrap_err();
        assert!(matches!(err, HoopsError::ModelUnavailable));
    }

    #[test]
    fn test_model_requiring_missing_column() {
        let err = ProbabilityScorer::with_model(NeedsColumn)
            .score(rows())
            .unwrap_err();
        assert!(matches!(err, HoopsError::FeatureMismatch(_)));
    }

    #[test]
    fn test_non_numeric_feature_blocks_model() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let scorer = ProbabilityScorer::with_model(move |_: &FeatureVector| {
            counter.fetch_add(1, Ordering::SeqCst);
            0.5
        });

        let mut rows = rows();
        rows[1].rolling_percent = f64::NAN;
        let err = scorer.score(rows).unwrap_err();

        assert!(matches!(err, HoopsError::FeatureMismatch(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_out_of_range_probability() {
        let scorer = ProbabilityScorer::with_model(|_: &FeatureVector| 1.5);
        assert!(matches!(
            scorer.score(rows()),
            Err(HoopsError::ModelOutput { .. })
        ));
    }

    #[test]
    fn test_from_slice() {
        assert!(FeatureVector::from_slice(&[0.0; 16]).is_none());
        let v = FeatureVector::from_slice(&[1.0; FeatureVector::DIM]).unwrap();
        assert_eq!(v.get("team_spread"), Some(1.0));
    }
}
