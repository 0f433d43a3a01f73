//! Box-score efficiency and per-spot shooting breakdowns

use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

use crate::features::window::ratio;
use crate::predict::ScoredShot;
use crate::{GameId, GameSummary, PlayerId, Side};

/// Season shooting efficiency for one player
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerEfficiency {
    pub player_id: PlayerId,
    pub season: i32,
    pub games: usize,
    pub points: u32,
    pub fgm: u32,
    pub fga: u32,
    pub three_pm: u32,
    pub three_pa: u32,
    pub ftm: u32,
    pub fta: u32,
    pub rebounds: u32,
    pub assists: u32,
    pub turnovers: u32,
}

impl PlayerEfficiency {
    pub fn new(player_id: PlayerId, season: i32) -> Self {
        PlayerEfficiency {
            player_id,
            season,
            games: 0,
            points: 0,
            fgm: 0,
            fga: 0,
            three_pm: 0,
            three_pa: 0,
            ftm: 0,
            fta: 0,
            rebounds: 0,
            assists: 0,
            turnovers: 0,
        }
    }

    /// Add one game's box score
    pub fn update(&mut self, row: &GameSummary) {
        self.games += 1;
        self.points += row.points;
        self.fgm += row.fgm;
        self.fga += row.fga;
        self.three_pm += row.three_pm;
        self.three_pa += row.three_pa;
        self.ftm += row.ftm;
        self.fta += row.fta;
        self.rebounds += row.offensive_rebounds + row.defensive_rebounds;
        self.assists += row.assists;
        self.turnovers += row.turnovers;
    }

    pub fn field_goal_pct(&self) -> f64 {
        ratio(self.fgm as f64, self.fga as f64)
    }

    pub fn three_point_pct(&self) -> f64 {
        ratio(self.three_pm as f64, self.three_pa as f64)
    }

    pub fn free_throw_pct(&self) -> f64 {
        ratio(self.ftm as f64, self.fta as f64)
    }

    /// (FGM + 0.5 * 3PM) / FGA
    pub fn effective_fg_pct(&self) -> f64 {
        ratio(self.fgm as f64 + 0.5 * self.three_pm as f64, self.fga as f64)
    }

    /// PTS / (2 * (FGA + 0.44 * FTA))
    pub fn true_shooting_pct(&self) -> f64 {
        ratio(
            self.points as f64,
            2.0 * (self.fga as f64 + 0.44 * self.fta as f64),
        )
    }

    /// Points per field goal attempt
    pub fn points_per_shot(&self) -> f64 {
        ratio(self.points as f64, self.fga as f64)
    }

    pub fn points_per_game(&self) -> f64 {
        ratio(self.points as f64, self.games as f64)
    }

    pub fn assist_turnover_ratio(&self) -> f64 {
        ratio(self.assists as f64, self.turnovers as f64)
    }
}

/// Aggregate box scores into per-player season lines, ordered by season
/// then player
pub fn player_efficiency(summaries: &[GameSummary]) -> Vec<PlayerEfficiency> {
    let mut lines: HashMap<(i32, PlayerId), PlayerEfficiency> = HashMap::new();
    let mut seen: HashMap<(i32, PlayerId), Vec<GameId>> = HashMap::new();

    for row in summaries {
        let key = (row.season, row.player_id);
        let games = seen.entry(key).or_default();
        if games.contains(&row.game_id) {
            log::warn!(
                "Skipping duplicate box score for {} in game {}",
                row.player_id,
                row.game_id.0
            );
            continue;
        }
        games.push(row.game_id);
        lines
            .entry(key)
            .or_insert_with(|| PlayerEfficiency::new(row.player_id, row.season))
            .update(row);
    }

    let mut result: Vec<_> = lines.into_values().collect();
    result.sort_by_key(|e| (e.season, e.player_id));
    result
}

/// Shooting from one spot, with model expectation against actual output
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SpotBreakdown {
    pub shot_spot: String,
    pub makes: u32,
    pub attempts: u32,
    pub actual_points: u32,
    pub expected_points: f64,
}

impl SpotBreakdown {
    pub fn percentage(&self) -> f64 {
        ratio(self.makes as f64, self.attempts as f64)
    }

    /// Actual minus expected points
    pub fn points_over_expected(&self) -> f64 {
        self.actual_points as f64 - self.expected_points
    }
}

/// Shot-chart data: per-spot totals for one side's scored shots
pub fn spot_breakdown(shots: &[ScoredShot], side: Side) -> Vec<SpotBreakdown> {
    let mut spots: BTreeMap<&str, SpotBreakdown> = BTreeMap::new();
    for shot in shots.iter().filter(|s| s.side() == side) {
        let f = &shot.features;
        let entry = spots
            .entry(f.shot_spot.as_str())
            .or_insert_with(|| SpotBreakdown {
                shot_spot: f.shot_spot.clone(),
                ..SpotBreakdown::default()
            });
        entry.attempts += 1;
        if f.made {
            entry.makes += 1;
        }
        entry.actual_points += f.actual_points;
        entry.expected_points += shot.expected_points;
    }
    spots.into_values().collect()
}
