//! SQLite event store
//!
//! Holds the logged shot events and box-score rows. The analytics pipeline
//! only reads from it; the insert helpers exist for seeding data.

use crate::{GameId, GameSummary, PlayerId, Result, ShotEvent};
use chrono::NaiveDate;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::path::Path;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Database connection and operations
pub struct EventStore {
    conn: Connection,
}

/// Bulk import payload
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImportFile {
    #[serde(default)]
    pub shots: Vec<ShotEvent>,
    #[serde(default)]
    pub summaries: Vec<GameSummary>,
}

impl EventStore {
    /// Open or create the store at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        let store = EventStore { conn };
        store.init_schema()?;
        Ok(store)
    }

    /// Create an in-memory store (for testing)
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = EventStore { conn };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS shot_events (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                game_id INTEGER NOT NULL,
                player_id INTEGER NOT NULL,
                play_sequence INTEGER NOT NULL,
                shot_spot TEXT NOT NULL,
                shot_defense TEXT NOT NULL,
                made INTEGER NOT NULL,
                point_value INTEGER NOT NULL,
                location_flag INTEGER NOT NULL,
                season INTEGER NOT NULL,
                opponent_name TEXT NOT NULL,
                game_date TEXT NOT NULL,
                UNIQUE(game_id, play_sequence)
            );

            CREATE TABLE IF NOT EXISTS game_summaries (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                game_id INTEGER NOT NULL,
                player_id INTEGER NOT NULL,
                season INTEGER NOT NULL,
                opponent_name TEXT NOT NULL,
                game_date TEXT NOT NULL,
                location_flag INTEGER NOT NULL,
                points INTEGER NOT NULL DEFAULT 0,
                fgm INTEGER NOT NULL DEFAULT 0,
                fga INTEGER NOT NULL DEFAULT 0,
                three_pm INTEGER NOT NULL DEFAULT 0,
                three_pa INTEGER NOT NULL DEFAULT 0,
                ftm INTEGER NOT NULL DEFAULT 0,
                fta INTEGER NOT NULL DEFAULT 0,
                offensive_rebounds INTEGER NOT NULL DEFAULT 0,
                defensive_rebounds INTEGER NOT NULL DEFAULT 0,
                assists INTEGER NOT NULL DEFAULT 0,
                steals INTEGER NOT NULL DEFAULT 0,
                blocks INTEGER NOT NULL DEFAULT 0,
                turnovers INTEGER NOT NULL DEFAULT 0,
                fouls INTEGER NOT NULL DEFAULT 0,
                UNIQUE(game_id, player_id)
            );

            CREATE INDEX IF NOT EXISTS idx_shots_season ON shot_events(season);
            CREATE INDEX IF NOT EXISTS idx_summaries_season ON game_summaries(season);
            "#,
        )?;
        Ok(())
    }

    // ==================== Shot Events ====================

    /// Insert or update shot events. A shot is keyed by
    /// `(game_id, play_sequence)`, so re-importing a file replaces rows.
    pub fn upsert_shot_events(&self, shots: &[ShotEvent]) -> Result<usize> {
        let tx = self.conn.unchecked_transaction()?;
        let count = write_shot_events(&tx, shots)?;
        tx.commit()?;
        Ok(count)
    }

    /// Read shot events, optionally restricted to one season.
    ///
    /// Rows come back in `(game_id, play_sequence)` order, but callers must
    /// not rely on it.
    pub fn get_shot_events(&self, season: Option<i32>) -> Result<Vec<ShotEvent>> {
        let mut stmt = self.conn.prepare(
            "SELECT game_id, player_id, play_sequence, shot_spot, shot_defense, made,
                    point_value, location_flag, season, opponent_name, game_date
             FROM shot_events
             WHERE ?1 IS NULL OR season = ?1
             ORDER BY game_id, play_sequence",
        )?;

        let shots = stmt
            .query_map(params![season], Self::row_to_shot)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(shots)
    }

    fn row_to_shot(row: &rusqlite::Row) -> rusqlite::Result<ShotEvent> {
        Ok(ShotEvent {
            game_id: GameId(row.get(0)?),
            player_id: PlayerId(row.get(1)?),
            play_sequence: row.get(2)?,
            shot_spot: row.get(3)?,
            shot_defense: row.get(4)?,
            made: row.get(5)?,
            point_value: row.get(6)?,
            location_flag: row.get(7)?,
            season: row.get(8)?,
            opponent_name: row.get(9)?,
            game_date: parse_date(row, 10)?,
        })
    }

    // ==================== Game Summaries ====================

    /// Insert or update box-score rows
    pub fn upsert_game_summaries(&self, summaries: &[GameSummary]) -> Result<usize> {
        let tx = self.conn.unchecked_transaction()?;
        let count = write_game_summaries(&tx, summaries)?;
        tx.commit()?;
        Ok(count)
    }

    /// Read box-score rows ordered by game date
    pub fn get_game_summaries(&self, season: Option<i32>) -> Result<Vec<GameSummary>> {
        let mut stmt = self.conn.prepare(
            "SELECT game_id, player_id, season, opponent_name, game_date, location_flag,
                    points, fgm, fga, three_pm, three_pa, ftm, fta, offensive_rebounds,
                    defensive_rebounds, assists, steals, blocks, turnovers, fouls
             FROM game_summaries
             WHERE ?1 IS NULL OR season = ?1
             ORDER BY game_date, game_id, player_id",
        )?;

        let summaries = stmt
            .query_map(params![season], |row| {
                Ok(GameSummary {
                    game_id: GameId(row.get(0)?),
                    player_id: PlayerId(row.get(1)?),
                    season: row.get(2)?,
                    opponent_name: row.get(3)?,
                    game_date: parse_date(row, 4)?,
                    location_flag: row.get(5)?,
                    points: row.get(6)?,
                    fgm: row.get(7)?,
                    fga: row.get(8)?,
                    three_pm: row.get(9)?,
                    three_pa: row.get(10)?,
                    ftm: row.get(11)?,
                    fta: row.get(12)?,
                    offensive_rebounds: row.get(13)?,
                    defensive_rebounds: row.get(14)?,
                    assists: row.get(15)?,
                    steals: row.get(16)?,
                    blocks: row.get(17)?,
                    turnovers: row.get(18)?,
                    fouls: row.get(19)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(summaries)
    }

    // ==================== Import ====================

    /// Load shots and summaries from a JSON file
    pub fn import_json<P: AsRef<Path>>(&self, path: P) -> Result<(usize, usize)> {
        let content = std::fs::read_to_string(path)?;
        let import: ImportFile = serde_json::from_str(&content)?;
        self.import(&import)
    }

    /// Write a payload in one transaction; a failure leaves the store as it was
    pub fn import(&self, import: &ImportFile) -> Result<(usize, usize)> {
        let tx = self.conn.unchecked_transaction()?;
        let shots = write_shot_events(&tx, &import.shots)?;
        let summaries = write_game_summaries(&tx, &import.summaries)?;
        tx.commit()?;
        log::info!("Imported {} shots and {} summary rows", shots, summaries);
        Ok((shots, summaries))
    }

    // ==================== Statistics ====================

    pub fn get_stats(&self) -> Result<StoreStats> {
        let shot_count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM shot_events", [], |row| row.get(0))?;

        let game_count: i64 = self.conn.query_row(
            "SELECT COUNT(DISTINCT game_id) FROM shot_events",
            [],
            |row| row.get(0),
        )?;

        let summary_count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM game_summaries", [], |row| row.get(0))?;

        let min_date: Option<String> = self
            .conn
            .query_row("SELECT MIN(game_date) FROM shot_events", [], |row| row.get(0))
            .optional()?
            .flatten();

        let max_date: Option<String> = self
            .conn
            .query_row("SELECT MAX(game_date) FROM shot_events", [], |row| row.get(0))
            .optional()?
            .flatten();

        Ok(StoreStats {
            shot_count: shot_count as usize,
            game_count: game_count as usize,
            summary_count: summary_count as usize,
            earliest_game: min_date.and_then(|s| NaiveDate::parse_from_str(&s, DATE_FORMAT).ok()),
            latest_game: max_date.and_then(|s| NaiveDate::parse_from_str(&s, DATE_FORMAT).ok()),
        })
    }
}

fn write_shot_events(conn: &Connection, shots: &[ShotEvent]) -> Result<usize> {
    let mut stmt = conn.prepare(
        r#"
        INSERT INTO shot_events (game_id, player_id, play_sequence, shot_spot,
                                 shot_defense, made, point_value, location_flag,
                                 season, opponent_name, game_date)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
        ON CONFLICT(game_id, play_sequence) DO UPDATE SET
            player_id = excluded.player_id,
            shot_spot = excluded.shot_spot,
            shot_defense = excluded.shot_defense,
            made = excluded.made,
            point_value = excluded.point_value,
            location_flag = excluded.location_flag,
            season = excluded.season,
            opponent_name = excluded.opponent_name,
            game_date = excluded.game_date
        "#,
    )?;
    for shot in shots {
        stmt.execute(params![
            shot.game_id.0,
            shot.player_id.0,
            shot.play_sequence,
            shot.shot_spot,
            shot.shot_defense,
            shot.made,
            shot.point_value,
            shot.location_flag,
            shot.season,
            shot.opponent_name,
            shot.game_date.format(DATE_FORMAT).to_string(),
        ])?;
    }
    Ok(shots.len())
}

fn write_game_summaries(conn: &Connection, summaries: &[GameSummary]) -> Result<usize> {
    let mut stmt = conn.prepare(
        r#"
        INSERT INTO game_summaries (game_id, player_id, season, opponent_name, game_date,
                                    location_flag, points, fgm, fga, three_pm, three_pa,
                                    ftm, fta, offensive_rebounds, defensive_rebounds,
                                    assists, steals, blocks, turnovers, fouls)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15,
                ?16, ?17, ?18, ?19, ?20)
        ON CONFLICT(game_id, player_id) DO UPDATE SET
            points = excluded.points,
            fgm = excluded.fgm,
            fga = excluded.fga,
            three_pm = excluded.three_pm,
            three_pa = excluded.three_pa,
            ftm = excluded.ftm,
            fta = excluded.fta,
            offensive_rebounds = excluded.offensive_rebounds,
            defensive_rebounds = excluded.defensive_rebounds,
            assists = excluded.assists,
            steals = excluded.steals,
            blocks = excluded.blocks,
            turnovers = excluded.turnovers,
            fouls = excluded.fouls
        "#,
    )?;
    for s in summaries {
        stmt.execute(params![
            s.game_id.0,
            s.player_id.0,
            s.season,
            s.opponent_name,
            s.game_date.format(DATE_FORMAT).to_string(),
            s.location_flag,
            s.points,
            s.fgm,
            s.fga,
            s.three_pm,
            s.three_pa,
            s.ftm,
            s.fta,
            s.offensive_rebounds,
            s.defensive_rebounds,
            s.assists,
            s.steals,
            s.blocks,
            s.turnovers,
            s.fouls,
        ])?;
    }
    Ok(summaries.len())
}

fn parse_date(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<NaiveDate> {
    let text: String = row.get(idx)?;
    NaiveDate::parse_from_str(&text, DATE_FORMAT)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Event store statistics
#[derive(Debug, Clone)]
pub struct StoreStats {
    pub shot_count: usize,
    pub game_count: usize,
    pub summary_count: usize,
    pub earliest_game: Option<NaiveDate>,
    pub latest_game: Option<NaiveDate>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shot(game: i64, seq: i64, season: i32) -> ShotEvent {
        ShotEvent {
            game_id: GameId(game),
            player_id: PlayerId(4),
            play_sequence: seq,
            shot_spot: "PNT".to_string(),
            shot_defense: "OPEN".to_string(),
            made: seq % 2 == 0,
            point_value: 2,
            location_flag: true,
            season,
            opponent_name: "Riverside".to_string(),
            game_date: NaiveDate::from_ymd_opt(2024, 1, game as u32).unwrap(),
        }
    }

    fn summary(game: i64, player: i64, points: u32) -> GameSummary {
        GameSummary {
            game_id: GameId(game),
            player_id: PlayerId(player),
            season: 2024,
            opponent_name: "Riverside".to_string(),
            game_date: NaiveDate::from_ymd_opt(2024, 1, game as u32).unwrap(),
            location_flag: true,
            points,
            fgm: 4,
            fga: 9,
            three_pm: 1,
            three_pa: 3,
            ftm: 2,
            fta: 2,
            offensive_rebounds: 1,
            defensive_rebounds: 3,
            assists: 2,
            steals: 1,
            blocks: 0,
            turnovers: 2,
            fouls: 3,
        }
    }

    #[test]
    fn test_create_store() {
        let store = EventStore::in_memory().unwrap();
        let stats = store.get_stats().unwrap();
        assert_eq!(stats.shot_count, 0);
        assert_eq!(stats.summary_count, 0);
        assert!(stats.earliest_game.is_none());
    }

    #[test]
    fn test_insert_and_read_shots() {
        let store = EventStore::in_memory().unwrap();
        let shots = vec![shot(2, 1, 2024), shot(1, 2, 2024), shot(1, 1, 2023)];
        assert_eq!(store.upsert_shot_events(&shots).unwrap(), 3);

        let all = store.get_shot_events(None).unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!((all[0].game_id, all[0].play_sequence), (GameId(1), 1));
        assert_eq!(all[2].game_id, GameId(2));

        let season = store.get_shot_events(Some(2024)).unwrap();
        assert_eq!(season.len(), 2);
        assert_eq!(season[0], shots[1]);

        let stats = store.get_stats().unwrap();
        assert_eq!(stats.game_count, 2);
        assert_eq!(stats.earliest_game, NaiveDate::from_ymd_opt(2024, 1, 1));
    }

    #[test]
    fn test_upsert_summaries() {
        let store = EventStore::in_memory().unwrap();
        store
            .upsert_game_summaries(&[summary(1, 4, 10), summary(1, 5, 8)])
            .unwrap();
        store.upsert_game_summaries(&[summary(1, 4, 14)]).unwrap();

        let rows = store.get_game_summaries(Some(2024)).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].points, 14);
        assert_eq!(rows[0].defensive_rebounds, 3);
        assert!(store.get_game_summaries(Some(2023)).unwrap().is_empty());
    }

    #[test]
    fn test_import_payload_parses() {
        let payload = ImportFile {
            shots: vec![shot(1, 1, 2024)],
            summaries: vec![summary(1, 4, 10)],
        };
        let json = serde_json::to_string(&payload).unwrap();
        let parsed: ImportFile = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.shots.len(), 1);
        assert_eq!(parsed.summaries[0].points, 10);
    }

    #[test]
    fn test_reimport_replaces_rows() {
        use crate::data::SpotCatalog;
        use crate::features::FeatureBuilder;

        let payload = ImportFile {
            shots: vec![shot(1, 1, 2024), shot(1, 2, 2024)],
            summaries: vec![summary(1, 4, 10)],
        };
        let path = std::env::temp_dir().join(format!("hoops-import-{}.json", std::process::id()));
        std::fs::write(&path, serde_json::to_string(&payload).unwrap()).unwrap();

        let store = EventStore::in_memory().unwrap();
        assert_eq!(store.import_json(&path).unwrap(), (2, 1));
        assert_eq!(store.import_json(&path).unwrap(), (2, 1));
        std::fs::remove_file(&path).unwrap();

        let shots = store.get_shot_events(None).unwrap();
        assert_eq!(shots.len(), 2);
        assert_eq!(store.get_game_summaries(None).unwrap().len(), 1);

        let rows = FeatureBuilder::new(SpotCatalog::standard(), "Eagles")
            .build(&shots)
            .unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn test_upsert_shot_updates_in_place() {
        let store = EventStore::in_memory().unwrap();
        store.upsert_shot_events(&[shot(1, 1, 2024)]).unwrap();

        let mut corrected = shot(1, 1, 2024);
        corrected.made = true;
        corrected.shot_defense = "GUARDED".to_string();
        store.upsert_shot_events(&[corrected.clone()]).unwrap();

        assert_eq!(store.get_shot_events(None).unwrap(), vec![corrected]);
    }

    #[test]
    fn test_failed_import_writes_nothing() {
        let store = EventStore::in_memory().unwrap();
        store.conn.execute_batch("DROP TABLE game_summaries").unwrap();

        let payload = ImportFile {
            shots: vec![shot(1, 1, 2024)],
            summaries: vec![summary(1, 4, 10)],
        };
        assert!(store.import(&payload).is_err());
        assert!(store.get_shot_events(None).unwrap().is_empty());
    }
}
