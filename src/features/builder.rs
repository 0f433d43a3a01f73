//! Per-shot feature table
//!
//! Enriches every logged shot with contextual shooting statistics computed
//! over the full history passed in: spot/defense totals, in-game running
//! totals, a trailing row window per player season, and the running score of
//! each side.

use chrono::NaiveDate;
use serde::Serialize;

use crate::data::spots::{ShotSpot, SpotCatalog};
use crate::features::window::{
    forward_fill, group_totals, running_sum, running_totals, shift_within, trailing_totals,
};
use crate::{
    game_label, Config, GameId, HoopsError, PlayerId, Result, ShotDefense, ShotEvent, Side,
};

/// Default prior make probability for tracked-team shots
pub const DEFAULT_INITIAL_PERCENTAGE: f64 = 0.33;

/// Default size of the trailing per-season window, in rows
pub const DEFAULT_LAST_N_WINDOW: usize = 5;

/// A shot with every computed feature column
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureRow {
    // === Source event ===
    pub game_id: GameId,
    pub player_id: PlayerId,
    pub play_sequence: i64,
    pub shot_spot: String,
    pub shot_defense: ShotDefense,
    pub made: bool,
    pub point_value: u8,
    pub location_flag: bool,
    pub season: i32,
    pub opponent_name: String,
    pub game_date: NaiveDate,

    // === Spot catalog ===
    pub spot_x: f64,
    pub spot_y: f64,
    pub opponent_expected_rate: f64,

    // === Priors ===
    pub initial_percentage: f64,
    pub init_expected: f64,

    // === Player at this spot and defense, all games ===
    pub spot_total_makes: u32,
    pub spot_total_attempts: u32,
    pub spot_total_percentage: f64,

    // === Player at this spot and defense, this game ===
    pub game_makes: u32,
    pub game_attempts: u32,
    pub game_percentage: f64,

    // === Player in this game (keyed with game_id, see DESIGN.md) ===
    pub season_total_makes: u32,
    pub season_total_attempts: u32,
    pub season_total_percentage: f64,

    pub shot_defense_coded: u8,

    // === Running in-game totals for this player and defense ===
    pub game_rolling_makes: u32,
    pub game_rolling_attempts: u32,
    pub rolling_percent: f64,

    // === Trailing rows in the player's season ===
    pub season_last_5: u32,
    pub season_last_5_attempts: u32,
    pub season_last_5_percent: f64,

    // === Score context ===
    pub actual_points: u32,
    pub side: Side,
    pub team: String,
    pub rolling_points_team: u32,
    pub game_team_makes: u32,
    pub game_team_attempts: u32,
    pub game_team_percentage: f64,
    pub last_rolling_points_team_tracked: u32,
    pub last_rolling_points_team_opponent: u32,
    pub team_spread: i64,
}

impl FeatureRow {
    pub fn game_label(&self) -> String {
        game_label(&self.opponent_name, self.game_date)
    }

    pub fn is_opponent(&self) -> bool {
        self.side == Side::Opponent
    }
}

/// A source row after validation against the spot catalog
struct CheckedShot<'a> {
    event: &'a ShotEvent,
    defense: ShotDefense,
    spot: &'a ShotSpot,
}

/// Builds the feature table from raw shot events
#[derive(Debug, Clone)]
pub struct FeatureBuilder {
    catalog: SpotCatalog,
    team_name: String,
    default_initial_percentage: f64,
    last_n_window: usize,
}

impl FeatureBuilder {
    pub fn new(catalog: SpotCatalog, team_name: impl Into<String>) -> Self {
        FeatureBuilder {
            catalog,
            team_name: team_name.into(),
            default_initial_percentage: DEFAULT_INITIAL_PERCENTAGE,
            last_n_window: DEFAULT_LAST_N_WINDOW,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let features = &config.features;
        if features.last_n_window == 0 {
            return Err(HoopsError::Config(
                "features.last_n_window must be at least 1".to_string(),
            ));
        }
        let p = features.default_initial_percentage;
        if !(0.0..=1.0).contains(&p) {
            return Err(HoopsError::Config(format!(
                "features.default_initial_percentage must be between 0 and 1, got {}",
                p
            )));
        }
        let catalog = SpotCatalog::from_config(&config.spots)?;
        Ok(Self::new(catalog, config.team.name.clone())
            .with_initial_percentage(config.features.default_initial_percentage)
            .with_last_n_window(config.features.last_n_window))
    }

    pub fn with_initial_percentage(mut self, p: f64) -> Self {
        self.default_initial_percentage = p;
        self
    }

    /// Trailing window size in rows; values below one are raised to one
    pub fn with_last_n_window(mut self, n: usize) -> Self {
        self.last_n_window = n.max(1);
        self
    }

    /// Build features for the events of one season, or all of them
    pub fn build_season(
        &self,
        events: &[ShotEvent],
        season: Option<i32>,
    ) -> Result<Vec<FeatureRow>> {
        match season {
            Some(season) => {
                let filtered: Vec<ShotEvent> = events
                    .iter()
                    .filter(|e| e.season == season)
                    .cloned()
                    .collect();
                self.build(&filtered)
            }
            None => self.build(events),
        }
    }

    /// Build one feature row per event.
    ///
    /// Input order does not matter: rows are sorted by
    /// `(game_id, play_sequence)` before any window is computed, and the
    /// output is in that order.
    pub fn build(&self, events: &[ShotEvent]) -> Result<Vec<FeatureRow>> {
        let mut shots = self.validate(events)?;
        shots.sort_by_key(|s| (s.event.game_id, s.event.play_sequence));

        if let Some(pair) = shots.windows(2).find(|w| {
            w[0].event.game_id == w[1].event.game_id
                && w[0].event.play_sequence == w[1].event.play_sequence
        }) {
            return Err(HoopsError::DataShape(format!(
                "duplicate play_sequence {} in game {}",
                pair[0].event.play_sequence, pair[0].event.game_id.0
            )));
        }

        let made: Vec<bool> = shots.iter().map(|s| s.event.made).collect();
        let sides: Vec<Side> = shots.iter().map(|s| s.event.side()).collect();
        let actual_points: Vec<u32> = shots.iter().map(|s| s.event.actual_points()).collect();

        // === Whole-group totals ===
        let spot_keys: Vec<_> = shots
            .iter()
            .map(|s| (s.event.player_id, s.spot.code.as_str(), s.defense, s.event.season))
            .collect();
        let spot_totals = group_totals(&spot_keys, &made);

        let game_keys: Vec<_> = shots
            .iter()
            .map(|s| {
                (
                    s.event.game_id,
                    s.event.player_id,
                    s.spot.code.as_str(),
                    s.defense,
                    s.event.season,
                )
            })
            .collect();
        let game_totals = group_totals(&game_keys, &made);

        let season_keys: Vec<_> = shots
            .iter()
            .map(|s| (s.event.game_id, s.event.player_id, s.event.season))
            .collect();
        let season_totals = group_totals(&season_keys, &made);

        let game_team_keys: Vec<_> = shots
            .iter()
            .zip(&sides)
            .map(|(s, side)| {
                (
                    s.event.game_id,
                    *side,
                    s.event.season,
                    s.spot.code.as_str(),
                    s.defense,
                )
            })
            .collect();
        let game_team_totals = group_totals(&game_team_keys, &made);

        // === Ordered windows ===
        let rolling_keys: Vec<_> = shots
            .iter()
            .map(|s| (s.event.game_id, s.event.player_id, s.event.season, s.defense))
            .collect();
        let rolling = running_totals(&rolling_keys, &made);

        let last_n_keys: Vec<_> = shots
            .iter()
            .map(|s| (s.event.player_id, s.event.season))
            .collect();
        let last_n = trailing_totals(&last_n_keys, &made, self.last_n_window);

        let team_keys: Vec<_> = shots
            .iter()
            .zip(&sides)
            .map(|(s, side)| (s.event.game_id, s.event.season, *side))
            .collect();
        let rolling_points = running_sum(&team_keys, &actual_points);

        // === Previous score per side, carried forward across the table ===
        let last_tracked = self.previous_side_score(&shots, &sides, &rolling_points, Side::Tracked);
        let last_opponent =
            self.previous_side_score(&shots, &sides, &rolling_points, Side::Opponent);

        let rows = shots
            .iter()
            .enumerate()
            .map(|(i, s)| {
                let e = s.event;
                let point_value = e.point_value as f64;
                let initial_percentage = if e.player_id.is_opponent() {
                    s.spot.opponent_initial_percentage()
                } else {
                    self.default_initial_percentage
                };
                FeatureRow {
                    game_id: e.game_id,
                    player_id: e.player_id,
                    play_sequence: e.play_sequence,
                    shot_spot: s.spot.code.clone(),
                    shot_defense: s.defense,
                    made: e.made,
                    point_value: e.point_value,
                    location_flag: e.location_flag,
                    season: e.season,
                    opponent_name: e.opponent_name.clone(),
                    game_date: e.game_date,
                    spot_x: s.spot.x,
                    spot_y: s.spot.y,
                    opponent_expected_rate: s.spot.opponent_expected_rate,
                    initial_percentage,
                    init_expected: initial_percentage * point_value,
                    spot_total_makes: spot_totals[i].makes,
                    spot_total_attempts: spot_totals[i].attempts,
                    spot_total_percentage: spot_totals[i].percentage(),
                    game_makes: game_totals[i].makes,
                    game_attempts: game_totals[i].attempts,
                    game_percentage: game_totals[i].percentage(),
                    season_total_makes: season_totals[i].makes,
                    season_total_attempts: season_totals[i].attempts,
                    season_total_percentage: season_totals[i].percentage(),
                    shot_defense_coded: s.defense.code(),
                    game_rolling_makes: rolling[i].makes,
                    game_rolling_attempts: rolling[i].attempts,
                    rolling_percent: rolling[i].percentage(),
                    season_last_5: last_n[i].makes,
                    season_last_5_attempts: last_n[i].attempts,
                    season_last_5_percent: last_n[i].percentage(),
                    actual_points: actual_points[i],
                    side: sides[i],
                    team: self.team_label(sides[i]),
                    rolling_points_team: rolling_points[i],
                    game_team_makes: game_team_totals[i].makes,
                    game_team_attempts: game_team_totals[i].attempts,
                    game_team_percentage: game_team_totals[i].percentage(),
                    last_rolling_points_team_tracked: last_tracked[i],
                    last_rolling_points_team_opponent: last_opponent[i],
                    team_spread: rolling_points[i] as i64 - last_opponent[i] as i64,
                }
            })
            .collect::<Vec<_>>();

        log::debug!(
            "Built {} feature rows across {} games",
            rows.len(),
            count_games(&rows)
        );

        Ok(rows)
    }

    /// The previous running score of `side` within the game, defined on that
    /// side's rows, then forward-filled over the whole table with leading
    /// gaps set to zero.
    fn previous_side_score(
        &self,
        shots: &[CheckedShot<'_>],
        sides: &[Side],
        rolling_points: &[u32],
        side: Side,
    ) -> Vec<u32> {
        let partition: Vec<Option<GameId>> = shots
            .iter()
            .zip(sides)
            .map(|(s, row_side)| (*row_side == side).then_some(s.event.game_id))
            .collect();
        forward_fill(&shift_within(&partition, rolling_points), 0)
    }

    fn team_label(&self, side: Side) -> String {
        match side {
            Side::Tracked => self.team_name.clone(),
            Side::Opponent => "OPPONENT".to_string(),
        }
    }

    fn validate<'a>(&'a self, events: &'a [ShotEvent]) -> Result<Vec<CheckedShot<'a>>> {
        events
            .iter()
            .map(|event| {
                let defense = ShotDefense::from_label(&event.shot_defense).ok_or_else(|| {
                    HoopsError::DataShape(format!(
                        "unknown shot_defense '{}' in game {} play {}",
                        event.shot_defense, event.game_id.0, event.play_sequence
                    ))
                })?;
                let spot = self.catalog.get(&event.shot_spot).ok_or_else(|| {
                    HoopsError::DataShape(format!(
                        "unknown shot_spot '{}' in game {} play {}",
                        event.shot_spot, event.game_id.0, event.play_sequence
                    ))
                })?;
                if event.point_value != spot.point_value {
                    return Err(HoopsError::DataShape(format!(
                        "point_value {} does not match spot {} ({} points) in game {} play {}",
                        event.point_value,
                        spot.code,
                        spot.point_value,
                        event.game_id.0,
                        event.play_sequence
                    )));
                }
                Ok(CheckedShot {
                    event,
                    defense,
                    spot,
                })
            })
            .collect()
    }
}

fn count_games(rows: &[FeatureRow]) -> usize {
    let mut games: Vec<GameId> = rows.iter().map(|r| r.game_id).collect();
    games.dedup();
    games.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shot(game: i64, seq: i64, player: i64, spot: &str, made: bool) -> ShotEvent {
        let point_value = match spot {
            "FT" => 1,
            s if s.ends_with('3') => 3,
            _ => 2,
        };
        ShotEvent {
            game_id: GameId(game),
            player_id: PlayerId(player),
            play_sequence: seq,
            shot_spot: spot.to_string(),
            shot_defense: "OPEN".to_string(),
            made,
            point_value,
            location_flag: true,
            season: 2024,
            opponent_name: "Riverside".to_string(),
            game_date: NaiveDate::from_ymd_opt(2024, 1, game as u32).unwrap(),
        }
    }

    fn builder() -> FeatureBuilder {
        FeatureBuilder::new(SpotCatalog::standard(), "Eagles")
    }

    #[test]
    fn test_rolling_and_trailing_windows() {
        let pattern = [true, true, false, true, false, true];
        let events: Vec<_> = pattern
            .iter()
            .enumerate()
            .map(|(i, made)| shot(1, i as i64 + 1, 7, "PNT", *made))
            .collect();

        let rows = builder().build(&events).unwrap();
        let last = &rows[5];

        assert_eq!(last.game_rolling_makes, 4);
        assert_eq!(last.game_rolling_attempts, 6);
        // Rows 2-6 only
        assert_eq!(last.season_last_5, 3);
        assert_eq!(last.season_last_5_attempts, 5);
        assert!((last.season_last_5_percent - 0.6).abs() < 1e-12);
        assert!((last.rolling_percent - 4.0 / 6.0).abs() < 1e-12);
    }

    #[test]
    fn test_first_shot_has_only_its_own_history() {
        let rows = builder()
            .build(&[shot(1, 1, 7, "LW3", false), shot(1, 2, 7, "LW3", true)])
            .unwrap();
        let first = &rows[0];

        assert_eq!(first.game_rolling_makes, 0);
        assert_eq!(first.game_rolling_attempts, 1);
        assert_eq!(first.season_last_5, 0);
        assert_eq!(first.season_last_5_attempts, 1);
        assert_eq!(first.rolling_points_team, 0);
        assert_eq!(first.last_rolling_points_team_tracked, 0);
    }

    #[test]
    fn test_unknown_defense_is_rejected() {
        let mut bad = shot(1, 1, 7, "PNT", true);
        bad.shot_defense = "ZONE".to_string();
        let err = builder().build(&[bad]).unwrap_err();
        assert!(matches!(err, HoopsError::DataShape(_)));
    }

    #[test]
    fn test_unknown_spot_and_point_mismatch_are_rejected() {
        let unknown = shot(1, 1, 7, "HALFCOURT", true);
        assert!(matches!(
            builder().build(&[unknown]),
            Err(HoopsError::DataShape(_))
        ));

        let mut mismatch = shot(1, 1, 7, "LC3", true);
        mismatch.point_value = 2;
        assert!(matches!(
            builder().build(&[mismatch]),
            Err(HoopsError::DataShape(_))
        ));
    }

    #[test]
    fn test_duplicate_play_sequence_is_rejected() {
        let events = [shot(1, 4, 7, "PNT", true), shot(1, 4, 0, "PNT", false)];
        assert!(matches!(
            builder().build(&events),
            Err(HoopsError::DataShape(_))
        ));
    }

    #[test]
    fn test_deterministic_and_order_independent() {
        let events = vec![
            shot(1, 1, 7, "PNT", true),
            shot(1, 2, 0, "LC3", false),
            shot(1, 3, 8, "LE2", true),
            shot(2, 1, 7, "PNT", false),
            shot(2, 2, 0, "FT", true),
        ];
        let mut shuffled = events.clone();
        shuffled.reverse();

        let b = builder();
        let first = b.build(&events).unwrap();
        let second = b.build(&events).unwrap();
        let from_shuffled = b.build(&shuffled).unwrap();

        assert_eq!(first, second);
        assert_eq!(first, from_shuffled);
    }

    #[test]
    fn test_group_totals_span_history() {
        let events = vec![
            shot(1, 1, 7, "PNT", true),
            shot(1, 2, 7, "PNT", false),
            shot(2, 1, 7, "PNT", true),
        ];
        let rows = builder().build(&events).unwrap();

        // Career at spot: all three rows
        assert_eq!(rows[0].spot_total_attempts, 3);
        assert_eq!(rows[2].spot_total_makes, 2);
        // In-game at spot: split per game
        assert_eq!(rows[0].game_attempts, 2);
        assert_eq!(rows[2].game_attempts, 1);
        // Keyed by game as well, so this is also per game
        assert_eq!(rows[0].season_total_attempts, 2);
        assert_eq!(rows[2].season_total_attempts, 1);
    }

    fn guarded(mut event: ShotEvent) -> ShotEvent {
        event.shot_defense = "GUARDED".to_string();
        event
    }

    #[test]
    fn test_defense_splits_groups_and_rolling_totals() {
        let events = vec![
            shot(1, 1, 7, "PNT", true),
            guarded(shot(1, 2, 7, "PNT", false)),
            shot(1, 3, 7, "PNT", false),
            guarded(shot(1, 4, 7, "PNT", true)),
            shot(1, 5, 7, "PNT", true),
        ];
        let rows = builder().build(&events).unwrap();

        let rolling: Vec<_> = rows
            .iter()
            .map(|r| (r.game_rolling_makes, r.game_rolling_attempts))
            .collect();
        assert_eq!(rolling, vec![(1, 1), (0, 1), (1, 2), (1, 2), (2, 3)]);

        let spot: Vec<_> = rows
            .iter()
            .map(|r| (r.spot_total_makes, r.spot_total_attempts))
            .collect();
        assert_eq!(spot, vec![(2, 3), (1, 2), (2, 3), (1, 2), (2, 3)]);

        for row in &rows {
            assert_eq!(
                (row.game_makes, row.game_attempts),
                (row.spot_total_makes, row.spot_total_attempts)
            );
            assert_eq!(
                (row.game_team_makes, row.game_team_attempts),
                (row.spot_total_makes, row.spot_total_attempts)
            );
            // Not split by defense
            assert_eq!((row.season_total_makes, row.season_total_attempts), (3, 5));
        }
        assert_eq!(rows[1].shot_defense_coded, 1);
        assert_eq!((rows[4].season_last_5, rows[4].season_last_5_attempts), (3, 5));
    }

    #[test]
    fn test_team_totals_pool_players() {
        let events = vec![
            shot(1, 1, 7, "LE2", true),
            shot(1, 2, 8, "LE2", false),
            shot(1, 3, 0, "LE2", true),
            shot(1, 4, 8, "LE2", true),
            shot(1, 5, 7, "LE2", false),
            guarded(shot(1, 6, 0, "LE2", false)),
        ];
        let rows = builder().build(&events).unwrap();

        let per_player: Vec<_> = rows
            .iter()
            .map(|r| (r.game_makes, r.game_attempts))
            .collect();
        assert_eq!(per_player, vec![(1, 2), (1, 2), (1, 1), (1, 2), (1, 2), (0, 1)]);

        let per_team: Vec<_> = rows
            .iter()
            .map(|r| (r.game_team_makes, r.game_team_attempts))
            .collect();
        assert_eq!(per_team, vec![(2, 4), (2, 4), (1, 1), (2, 4), (2, 4), (0, 1)]);
        assert!((rows[0].game_team_percentage - 0.5).abs() < 1e-12);
        assert_eq!(rows[5].game_team_percentage, 0.0);

        let rolling: Vec<_> = rows
            .iter()
            .map(|r| (r.game_rolling_makes, r.game_rolling_attempts))
            .collect();
        assert_eq!(rolling, vec![(1, 1), (0, 1), (1, 1), (1, 2), (1, 2), (0, 1)]);
    }

    #[test]
    fn test_initial_percentage_priors() {
        let rows = builder()
            .build(&[shot(1, 1, 7, "RC3", true), shot(1, 2, 0, "RC3", true)])
            .unwrap();

        assert!((rows[0].initial_percentage - 0.33).abs() < 1e-12);
        assert!((rows[0].init_expected - 0.99).abs() < 1e-12);
        assert!((rows[1].initial_percentage - 0.38).abs() < 1e-12);
        assert!((rows[1].init_expected - 1.14).abs() < 1e-12);
        assert_eq!(rows[1].team, "OPPONENT");
        assert_eq!(rows[0].team, "Eagles");
    }

    #[test]
    fn test_running_score_and_spread() {
        let events = vec![
            shot(1, 1, 7, "PNT", true),  // us 2
            shot(1, 2, 0, "LC3", true),  // them 3
            shot(1, 3, 7, "PNT", false), // us 2
            shot(1, 4, 0, "LE2", true),  // them 5
            shot(1, 5, 8, "RW3", true),  // us 5
        ];
        let rows = builder().build(&events).unwrap();

        let points: Vec<_> = rows.iter().map(|r| r.rolling_points_team).collect();
        assert_eq!(points, vec![2, 3, 2, 5, 5]);

        let last_tracked: Vec<_> = rows
            .iter()
            .map(|r| r.last_rolling_points_team_tracked)
            .collect();
        assert_eq!(last_tracked, vec![0, 0, 2, 2, 2]);

        let last_opponent: Vec<_> = rows
            .iter()
            .map(|r| r.last_rolling_points_team_opponent)
            .collect();
        assert_eq!(last_opponent, vec![0, 0, 0, 3, 3]);

        let spread: Vec<_> = rows.iter().map(|r| r.team_spread).collect();
        assert_eq!(spread, vec![2, 3, 2, 2, 2]);
    }

    #[test]
    fn test_previous_score_carries_into_next_game() {
        let events = vec![
            shot(1, 1, 7, "PNT", true),
            shot(1, 2, 7, "PNT", true),
            shot(2, 1, 7, "PNT", true),
        ];
        let rows = builder().build(&events).unwrap();
        // First tracked row of game 2 has no in-game predecessor, so the
        // forward fill carries game 1's value
        assert_eq!(rows[2].last_rolling_points_team_tracked, 2);
        assert_eq!(rows[2].rolling_points_team, 2);
    }

    #[test]
    fn test_percentages_are_finite() {
        let events = vec![
            shot(1, 1, 7, "PNT", false),
            shot(1, 2, 0, "FT", false),
            shot(1, 3, 0, "FT", true),
        ];
        let rows = builder().build(&events).unwrap();
        for row in &rows {
            for value in [
                row.spot_total_percentage,
                row.game_percentage,
                row.season_total_percentage,
                row.rolling_percent,
                row.season_last_5_percent,
                row.game_team_percentage,
            ] {
                assert!(value.is_finite());
                assert!((0.0..=1.0).contains(&value));
            }
        }
    }

    #[test]
    fn test_config_rejects_empty_window() {
        let mut config = Config::default();
        config.features.last_n_window = 0;
        assert!(matches!(
            FeatureBuilder::from_config(&config),
            Err(HoopsError::Config(_))
        ));

        config.features.last_n_window = 3;
        config.features.default_initial_percentage = 1.5;
        assert!(matches!(
            FeatureBuilder::from_config(&config),
            Err(HoopsError::Config(_))
        ));

        config.features.default_initial_percentage = 0.4;
        let b = FeatureBuilder::from_config(&config).unwrap();
        let events: Vec<_> = (1..=4).map(|i| shot(1, i, 7, "PNT", true)).collect();
        let rows = b.build(&events).unwrap();
        assert_eq!(rows[3].season_last_5_attempts, 3);
        assert!((rows[0].initial_percentage - 0.4).abs() < 1e-12);
    }

    #[test]
    fn test_season_filter() {
        let mut old = shot(1, 1, 7, "PNT", true);
        old.season = 2023;
        let events = vec![old, shot(2, 1, 7, "PNT", true)];

        let rows = builder().build_season(&events, Some(2024)).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].game_id, GameId(2));
        assert!(builder().build(&[]).unwrap().is_empty());
    }
}
