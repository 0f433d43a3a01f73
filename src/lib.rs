//! Basketball expected-points analytics
//!
//! Turns logged shot events into per-shot contextual features, scores them
//! through a make-probability model, and simulates game outcomes from the
//! scored shots.

pub mod data;
pub mod features;
pub mod pipeline;
pub mod predict;
pub mod simulate;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::data::spots::ShotSpot;

/// Unique identifier for a game
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GameId(pub i64);

impl fmt::Display for GameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Game({})", self.0)
    }
}

/// Identifier for a tracked player. `0` marks an opponent-team event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PlayerId(pub i64);

impl PlayerId {
    pub const OPPONENT: PlayerId = PlayerId(0);

    pub fn is_opponent(&self) -> bool {
        *self == Self::OPPONENT
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_opponent() {
            write!(f, "Opponent")
        } else {
            write!(f, "Player({})", self.0)
        }
    }
}

/// Defensive pressure on a shot
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ShotDefense {
    Open,
    Guarded,
    HeavilyGuarded,
}

impl ShotDefense {
    /// Ordinal encoding fed to the model
    pub fn code(&self) -> u8 {
        match self {
            ShotDefense::Open => 0,
            ShotDefense::Guarded => 1,
            ShotDefense::HeavilyGuarded => 2,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ShotDefense::Open => "OPEN",
            ShotDefense::Guarded => "GUARDED",
            ShotDefense::HeavilyGuarded => "HEAVILY_GUARDED",
        }
    }

    /// Parse the stored label; accepts spaces or underscores, any case
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_uppercase().replace(' ', "_").as_str() {
            "OPEN" => Some(ShotDefense::Open),
            "GUARDED" => Some(ShotDefense::Guarded),
            "HEAVILY_GUARDED" => Some(ShotDefense::HeavilyGuarded),
            _ => None,
        }
    }
}

impl fmt::Display for ShotDefense {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Which side of the game a shot belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Side {
    Tracked,
    Opponent,
}

impl Side {
    pub fn of(player: PlayerId) -> Self {
        if player.is_opponent() {
            Side::Opponent
        } else {
            Side::Tracked
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Tracked => write!(f, "Tracked"),
            Side::Opponent => write!(f, "OPPONENT"),
        }
    }
}

/// A single logged shot attempt, as read from the event store.
///
/// `shot_defense` is kept as the stored text; it is validated and encoded by
/// the feature builder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShotEvent {
    pub game_id: GameId,
    pub player_id: PlayerId,
    pub play_sequence: i64,
    pub shot_spot: String,
    pub shot_defense: String,
    pub made: bool,
    pub point_value: u8,
    /// True when the game was played at home
    pub location_flag: bool,
    pub season: i32,
    pub opponent_name: String,
    pub game_date: NaiveDate,
}

impl ShotEvent {
    pub fn side(&self) -> Side {
        Side::of(self.player_id)
    }

    pub fn actual_points(&self) -> u32 {
        if self.made {
            self.point_value as u32
        } else {
            0
        }
    }
}

/// Per-player, per-game box score row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameSummary {
    pub game_id: GameId,
    pub player_id: PlayerId,
    pub season: i32,
    pub opponent_name: String,
    pub game_date: NaiveDate,
    pub location_flag: bool,
    pub points: u32,
    pub fgm: u32,
    pub fga: u32,
    pub three_pm: u32,
    pub three_pa: u32,
    pub ftm: u32,
    pub fta: u32,
    #[serde(default)]
    pub offensive_rebounds: u32,
    #[serde(default)]
    pub defensive_rebounds: u32,
    #[serde(default)]
    pub assists: u32,
    #[serde(default)]
    pub steals: u32,
    #[serde(default)]
    pub blocks: u32,
    #[serde(default)]
    pub turnovers: u32,
    #[serde(default)]
    pub fouls: u32,
}

/// Label used to pick a single game: opponent name followed by the date
pub fn game_label(opponent_name: &str, game_date: NaiveDate) -> String {
    format!("{} {}", opponent_name, game_date.format("%Y-%m-%d"))
}

/// Application-wide errors
#[derive(Debug, Error)]
pub enum HoopsError {
    #[error("Data shape error: {0}")]
    DataShape(String),

    #[error("No probability model available - set data.model_path in the config")]
    ModelUnavailable,

    #[error("Feature mismatch: {0}")]
    FeatureMismatch(String),

    #[error("Model returned invalid probability {value} for game {game_id} play {play_sequence}")]
    ModelOutput {
        game_id: GameId,
        play_sequence: i64,
        value: f64,
    },

    #[error("Invalid parameter: {0}")]
    Validation(String),

    #[error("Game not found: {0}")]
    GameNotFound(String),

    #[error("Simulation cancelled after {completed} of {requested} trials")]
    Cancelled { completed: usize, requested: usize },

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, HoopsError>;

/// Application configuration loaded from config.toml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub team: TeamConfig,
    pub data: DataConfig,
    pub features: FeatureConfig,
    pub simulation: SimulationConfig,
    /// Overrides the built-in spot catalog when non-empty
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub spots: Vec<ShotSpot>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamConfig {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    pub database_path: String,
    pub model_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureConfig {
    /// Prior make probability for tracked-team shots with no history
    pub default_initial_percentage: f64,
    /// Row count of the trailing per-season window
    pub last_n_window: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    pub trials: usize,
    pub standard_deviation: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            team: TeamConfig {
                name: "HOME".to_string(),
            },
            data: DataConfig {
                database_path: "data/hoops.db".to_string(),
                model_path: "model/shot_model.json".to_string(),
            },
            features: FeatureConfig {
                default_initial_percentage: 0.33,
                last_n_window: 5,
            },
            simulation: SimulationConfig {
                trials: 1000,
                standard_deviation: 0.1,
                seed: None,
            },
            spots: Vec::new(),
        }
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            HoopsError::Config(format!("Failed to read config file {}: {}", path, e))
        })?;
        toml::from_str(&content)
            .map_err(|e| HoopsError::Config(format!("Failed to parse config: {}", e)))
    }

    pub fn save(&self, path: &str) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| HoopsError::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defense_labels() {
        assert_eq!(ShotDefense::from_label("open"), Some(ShotDefense::Open));
        assert_eq!(
            ShotDefense::from_label("Heavily Guarded"),
            Some(ShotDefense::HeavilyGuarded)
        );
        assert_eq!(ShotDefense::from_label("ZONE"), None);
        assert_eq!(ShotDefense::HeavilyGuarded.code(), 2);
    }

    #[test]
    fn test_side_from_player() {
        assert_eq!(Side::of(PlayerId(0)), Side::Opponent);
        assert_eq!(Side::of(PlayerId(12)), Side::Tracked);
    }

    #[test]
    fn test_game_label() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();
        assert_eq!(game_label("Lakeside", date), "Lakeside 2024-01-05");
    }

    #[test]
    fn test_config_roundtrip_through_toml() {
        let config = Config::default();
        let text = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&text).unwrap();
        assert_eq!(parsed.team.name, "HOME");
        assert_eq!(parsed.simulation.trials, 1000);
        assert!(parsed.simulation.seed.is_none());
        assert!(parsed.spots.is_empty());
    }
}
