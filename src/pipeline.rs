//! End-to-end flow: season filter, feature build, scoring, game selection
//! and simulation.

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::AtomicBool;

use crate::features::FeatureBuilder;
use crate::predict::{ProbabilityScorer, ScoredShot};
use crate::simulate::{OutcomeSimulator, SimulationParams, SimulationSummary};
use crate::{game_label, GameId, GameSummary, HoopsError, Result, ShotEvent, Side};

/// A game known from the box-score rows
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GameEntry {
    pub game_id: GameId,
    pub label: String,
    pub season: i32,
    pub opponent_name: String,
    pub game_date: NaiveDate,
    pub home: bool,
}

/// Distinct games, ordered by date
#[derive(Debug, Clone, Default)]
pub struct GameCatalog {
    games: Vec<GameEntry>,
}

impl GameCatalog {
    pub fn from_summaries(summaries: &[GameSummary]) -> Self {
        let mut by_id: BTreeMap<GameId, GameEntry> = BTreeMap::new();
        for row in summaries {
            by_id.entry(row.game_id).or_insert_with(|| GameEntry {
                game_id: row.game_id,
                label: game_label(&row.opponent_name, row.game_date),
                season: row.season,
                opponent_name: row.opponent_name.clone(),
                game_date: row.game_date,
                home: row.location_flag,
            });
        }

        let mut games: Vec<GameEntry> = by_id.into_values().collect();
        games.sort_by_key(|g| (g.game_date, g.game_id));
        GameCatalog { games }
    }

    pub fn games(&self) -> &[GameEntry] {
        &self.games
    }

    pub fn season(&self, season: i32) -> Vec<&GameEntry> {
        self.games.iter().filter(|g| g.season == season).collect()
    }

    pub fn len(&self) -> usize {
        self.games.len()
    }

    pub fn is_empty(&self) -> bool {
        self.games.is_empty()
    }

    /// Look up a game by its label. Matching ignores case and surrounding
    /// whitespace.
    pub fn resolve(&self, label: &str) -> Result<&GameEntry> {
        let wanted = label.trim();
        self.games
            .iter()
            .find(|g| g.label.eq_ignore_ascii_case(wanted))
            .ok_or_else(|| HoopsError::GameNotFound(label.to_string()))
    }
}

/// Scored shots of one game split by side, in play order
#[derive(Debug, Clone, Default)]
pub struct GameShots {
    pub tracked: Vec<ScoredShot>,
    pub opponent: Vec<ScoredShot>,
}

impl GameShots {
    pub fn split(shots: impl IntoIterator<Item = ScoredShot>) -> Self {
        let (tracked, opponent) = shots
            .into_iter()
            .partition(|s| s.side() == Side::Tracked);
        GameShots { tracked, opponent }
    }

    pub fn len(&self) -> usize {
        self.tracked.len() + self.opponent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn expected_tracked(&self) -> f64 {
        self.tracked.iter().map(|s| s.expected_points).sum()
    }

    pub fn expected_opponent(&self) -> f64 {
        self.opponent.iter().map(|s| s.expected_points).sum()
    }

    pub fn actual_tracked(&self) -> u32 {
        self.tracked.iter().map(|s| s.features.actual_points).sum()
    }

    pub fn actual_opponent(&self) -> u32 {
        self.opponent.iter().map(|s| s.features.actual_points).sum()
    }
}

/// Owns a feature builder and scorer and drives them in order
pub struct Pipeline {
    builder: FeatureBuilder,
    scorer: ProbabilityScorer,
}

impl Pipeline {
    pub fn new(builder: FeatureBuilder, scorer: ProbabilityScorer) -> Self {
        Pipeline { builder, scorer }
    }

    /// Build features and score every shot of the season (or all seasons)
    pub fn score(&self, events: &[ShotEvent], season: Option<i32>) -> Result<Vec<ScoredShot>> {
        let rows = self.builder.build_season(events, season)?;
        self.scorer.score(rows)
    }

    /// Keep the shots of one game.
    ///
    /// The label must name a game in the catalog. A known game with no logged
    /// shots yields empty sides rather than an error.
    pub fn select_game(
        scored: Vec<ScoredShot>,
        catalog: &GameCatalog,
        label: &str,
    ) -> Result<GameShots> {
        let game = catalog.resolve(label)?;
        let shots: Vec<ScoredShot> = scored
            .into_iter()
            .filter(|s| s.features.game_id == game.game_id)
            .collect();
        log::debug!("Selected {} shots for {}", shots.len(), game.label);
        Ok(GameShots::split(shots))
    }

    /// Score the season, select one game and simulate it
    pub fn simulate(
        &self,
        events: &[ShotEvent],
        catalog: &GameCatalog,
        season: Option<i32>,
        label: &str,
        params: SimulationParams,
    ) -> Result<SimulationSummary> {
        let cancel = AtomicBool::new(false);
        self.simulate_cancellable(events, catalog, season, label, params, &cancel)
    }

    pub fn simulate_cancellable(
        &self,
        events: &[ShotEvent],
        catalog: &GameCatalog,
        season: Option<i32>,
        label: &str,
        params: SimulationParams,
        cancel: &AtomicBool,
    ) -> Result<SimulationSummary> {
        // Parameters and the game label are checked before any work
        let simulator = OutcomeSimulator::new(params)?;
        catalog.resolve(label)?;

        let scored = self.score(events, season)?;
        let game = Self::select_game(scored, catalog, label)?;
        simulator.run_cancellable(&game.tracked, &game.opponent, cancel)
    }
}
