//! Court location catalog
//!
//! Every shot is logged against a spot code. The catalog fixes the point
//! value of each spot, its court coordinates, and the league-average
//! expected points per attempt used as the prior for opponent shots.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::{HoopsError, Result};

/// A discrete court location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShotSpot {
    pub code: String,
    pub name: String,
    pub point_value: u8,
    /// Lateral offset from the rim in feet (negative = left)
    pub x: f64,
    /// Distance out from the baseline in feet
    pub y: f64,
    /// Opponent expected points per attempt from this spot
    pub opponent_expected_rate: f64,
}

impl ShotSpot {
    fn new(code: &str, name: &str, point_value: u8, x: f64, y: f64, rate: f64) -> Self {
        ShotSpot {
            code: code.to_string(),
            name: name.to_string(),
            point_value,
            x,
            y,
            opponent_expected_rate: rate,
        }
    }

    /// Prior make probability for an opponent attempt from this spot
    pub fn opponent_initial_percentage(&self) -> f64 {
        if self.point_value == 0 {
            0.0
        } else {
            self.opponent_expected_rate / self.point_value as f64
        }
    }
}

/// Lookup of spot codes
#[derive(Debug, Clone)]
pub struct SpotCatalog {
    spots: HashMap<String, ShotSpot>,
}

impl SpotCatalog {
    /// Build a catalog from explicit spots, rejecting bad point values and
    /// duplicate codes
    pub fn from_spots(spots: Vec<ShotSpot>) -> Result<Self> {
        let mut map = HashMap::with_capacity(spots.len());
        for spot in spots {
            if !(1..=3).contains(&spot.point_value) {
                return Err(HoopsError::Config(format!(
                    "Spot {} has point value {}, expected 1, 2 or 3",
                    spot.code, spot.point_value
                )));
            }
            if !spot.opponent_expected_rate.is_finite() || spot.opponent_expected_rate < 0.0 {
                return Err(HoopsError::Config(format!(
                    "Spot {} has invalid opponent expected rate {}",
                    spot.code, spot.opponent_expected_rate
                )));
            }
            let code = spot.code.to_uppercase();
            if map.insert(code.clone(), spot).is_some() {
                return Err(HoopsError::Config(format!("Duplicate spot code: {}", code)));
            }
        }
        Ok(SpotCatalog { spots: map })
    }

    /// The built-in half-court layout
    pub fn standard() -> Self {
        let spots = vec![
            ShotSpot::new("LC3", "Left corner three", 3, -22.0, 3.0, 1.14),
            ShotSpot::new("LW3", "Left wing three", 3, -16.5, 17.0, 1.05),
            ShotSpot::new("TK3", "Top of key three", 3, 0.0, 24.0, 1.02),
            ShotSpot::new("RW3", "Right wing three", 3, 16.5, 17.0, 1.05),
            ShotSpot::new("RC3", "Right corner three", 3, 22.0, 3.0, 1.14),
            ShotSpot::new("LB2", "Left baseline two", 2, -14.0, 4.0, 0.80),
            ShotSpot::new("LE2", "Left elbow", 2, -8.0, 15.0, 0.82),
            ShotSpot::new("TK2", "Top of key two", 2, 0.0, 17.0, 0.80),
            ShotSpot::new("RE2", "Right elbow", 2, 8.0, 15.0, 0.82),
            ShotSpot::new("RB2", "Right baseline two", 2, 14.0, 4.0, 0.80),
            ShotSpot::new("PNT", "Paint", 2, 0.0, 5.0, 1.16),
            ShotSpot::new("FT", "Free throw", 1, 0.0, 15.0, 0.72),
        ];
        let spots = spots
            .into_iter()
            .map(|s| (s.code.clone(), s))
            .collect();
        SpotCatalog { spots }
    }

    /// Catalog from config overrides, falling back to the standard layout
    pub fn from_config(spots: &[ShotSpot]) -> Result<Self> {
        if spots.is_empty() {
            Ok(Self::standard())
        } else {
            Self::from_spots(spots.to_vec())
        }
    }

    pub fn get(&self, code: &str) -> Option<&ShotSpot> {
        self.spots
            .get(code)
            .or_else(|| self.spots.get(&code.trim().to_uppercase()))
    }

    pub fn len(&self) -> usize {
        self.spots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spots.is_empty()
    }

    /// All spots sorted by code
    pub fn all(&self) -> Vec<&ShotSpot> {
        let mut spots: Vec<_> = self.spots.values().collect();
        spots.sort_by(|a, b| a.code.cmp(&b.code));
        spots
    }
}

impl Default for SpotCatalog {
    fn default() -> Self {
        Self::standard()
    }
}
