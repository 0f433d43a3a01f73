//! Hoops expected-points CLI
//!
//! Scores logged shots with a make-probability model and simulates game
//! outcomes from the scored shots.

use clap::{Parser, Subcommand};
use hoops::{Config, Result};

#[derive(Parser)]
#[command(name = "hoops")]
#[command(about = "Basketball expected points and game outcome simulation", long_about = None)]
struct Cli {
    /// Config file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Data management commands
    Data {
        #[command(subcommand)]
        action: DataCommands,
    },
    /// List known games and their labels
    Games {
        /// Only games from this season
        #[arg(long)]
        season: Option<i32>,
    },
    /// Build features and score every shot
    Score {
        /// Only shots from this season
        #[arg(long)]
        season: Option<i32>,
        /// Only print shots from this game (e.g. "Riverside 2024-01-05")
        #[arg(long)]
        game: Option<String>,
        /// Output format (table, json, csv)
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },
    /// Simulate the outcome of one game
    Simulate {
        /// Game label: opponent name and date
        #[arg(long)]
        game: String,
        /// Season whose history feeds the features
        #[arg(long)]
        season: Option<i32>,
        /// Number of trials (overrides config)
        #[arg(long)]
        trials: Option<usize>,
        /// Probability noise standard deviation (overrides config)
        #[arg(long = "std")]
        standard_deviation: Option<f64>,
        /// Base random seed for reproducible runs
        #[arg(long)]
        seed: Option<u64>,
        /// Output format (table, json, csv)
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },
    /// Season shooting efficiency per player
    Efficiency {
        #[arg(long)]
        season: Option<i32>,
        /// Output format (table, json, csv)
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },
    /// Per-spot shooting for one game
    Chart {
        /// Game label: opponent name and date
        #[arg(long)]
        game: String,
        #[arg(long)]
        season: Option<i32>,
        /// Show the opponent's shots instead of the tracked team's
        #[arg(long)]
        opponent: bool,
        /// Output format (table, json, csv)
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },
    /// List the shot spots in use
    Spots,
    /// Initialize configuration
    Init,
}

#[derive(Subcommand)]
enum DataCommands {
    /// Import shots and box scores from a JSON file
    Import {
        /// JSON file with "shots" and "summaries" arrays
        file: String,
    },
    /// Show event store status
    Status,
}

#[derive(Clone, Debug)]
enum OutputFormat {
    Table,
    Json,
    Csv,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" => Ok(OutputFormat::Table),
            "json" => Ok(OutputFormat::Json),
            "csv" => Ok(OutputFormat::Csv),
            _ => Err(format!("Unknown format: {}. Use table, json, or csv.", s)),
        }
    }
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    // Load or create config
    let config = if std::path::Path::new(&cli.config).exists() {
        match Config::load(&cli.config) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Error loading config: {}", e);
                std::process::exit(1);
            }
        }
    } else {
        Config::default()
    };

    let result = match cli.command {
        Commands::Data { action } => match action {
            DataCommands::Import { file } => commands::data_import(&config, &file),
            DataCommands::Status => commands::data_status(&config),
        },
        Commands::Games { season } => commands::games(&config, season),
        Commands::Score {
            season,
            game,
            format,
        } => commands::score(&config, season, game, format),
        Commands::Simulate {
            game,
            season,
            trials,
            standard_deviation,
            seed,
            format,
        } => commands::simulate(
            &config,
            &game,
            season,
            trials,
            standard_deviation,
            seed,
            format,
        ),
        Commands::Efficiency { season, format } => commands::efficiency(&config, season, format),
        Commands::Chart {
            game,
            season,
            opponent,
            format,
        } => commands::chart(&config, &game, season, opponent, format),
        Commands::Spots => commands::spots(&config),
        Commands::Init => commands::init(&cli.config),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

mod commands {
    use super::*;
    use hoops::data::{EventStore, SpotCatalog};
    use hoops::features::{player_efficiency, spot_breakdown, FeatureBuilder};
    use hoops::pipeline::{GameCatalog, Pipeline};
    use hoops::predict::{LogisticModel, ProbabilityScorer};
    use hoops::simulate::{SimulationParams, SimulationWarning};
    use hoops::Side;

    pub fn init(config_path: &str) -> Result<()> {
        let config = Config::default();
        config.save(config_path)?;
        println!("Created default config at {}", config_path);

        std::fs::create_dir_all("data")?;
        std::fs::create_dir_all("model")?;
        println!("Created data/ and model/ directories");

        println!("\nNext steps:");
        println!("  1. Edit {} to set your team name", config_path);
        println!("  2. Run 'hoops data import <file.json>' to load shots and box scores");
        println!("  3. Put logistic weights at {}", config.data.model_path);
        println!("  4. Run 'hoops simulate --game \"Opponent YYYY-MM-DD\"'");

        Ok(())
    }

    pub fn data_import(config: &Config, file: &str) -> Result<()> {
        if let Some(parent) = std::path::Path::new(&config.data.database_path).parent() {
            std::fs::create_dir_all(parent)?;
        }
        let store = EventStore::open(&config.data.database_path)?;
        let (shots, summaries) = store.import_json(file)?;
        println!("Imported {} shots and {} box score rows", shots, summaries);
        Ok(())
    }

    pub fn data_status(config: &Config) -> Result<()> {
        let store = EventStore::open(&config.data.database_path)?;
        let stats = store.get_stats()?;

        println!("Event Store Status");
        println!("───────────────────────────────");
        println!("  Path:       {}", config.data.database_path);
        println!("  Shots:      {}", stats.shot_count);
        println!("  Games:      {}", stats.game_count);
        println!("  Box scores: {}", stats.summary_count);
        if let (Some(earliest), Some(latest)) = (stats.earliest_game, stats.latest_game) {
            println!("  Range:      {} to {}", earliest, latest);
        }

        Ok(())
    }

    pub fn spots(config: &Config) -> Result<()> {
        let catalog = SpotCatalog::from_config(&config.spots)?;

        println!(
            "{:<5} {:<24} {:>3} {:>7} {:>7} {:>6}",
            "Code", "Name", "Pts", "X", "Y", "Opp/A"
        );
        println!("{}", "─".repeat(57));
        for spot in catalog.all() {
            println!(
                "{:<5} {:<24} {:>3} {:>7.1} {:>7.1} {:>6.2}",
                spot.code, spot.name, spot.point_value, spot.x, spot.y, spot.opponent_expected_rate
            );
        }
        Ok(())
    }

    pub fn games(config: &Config, season: Option<i32>) -> Result<()> {
        let store = EventStore::open(&config.data.database_path)?;
        let catalog = GameCatalog::from_summaries(&store.get_game_summaries(season)?);

        if catalog.is_empty() {
            println!("No games found. Run 'hoops data import' first.");
            return Ok(());
        }

        println!("{:<8} {:<12} {:<6} {}", "Season", "Date", "Venue", "Label");
        println!("{}", "─".repeat(56));
        for game in catalog.games() {
            println!(
                "{:<8} {:<12} {:<6} {}",
                game.season,
                game.game_date,
                if game.home { "home" } else { "away" },
                game.label
            );
        }
        Ok(())
    }

    fn load_pipeline(config: &Config) -> Result<Pipeline> {
        let builder = FeatureBuilder::from_config(config)?;
        let model = LogisticModel::load(&config.data.model_path)?;
        Ok(Pipeline::new(builder, ProbabilityScorer::with_model(model)))
    }

    pub fn score(
        config: &Config,
        season: Option<i32>,
        game: Option<String>,
        format: OutputFormat,
    ) -> Result<()> {
        let store = EventStore::open(&config.data.database_path)?;
        let events = store.get_shot_events(season)?;
        let pipeline = load_pipeline(config)?;
        let mut scored = pipeline.score(&events, season)?;

        if let Some(label) = game {
            let catalog = GameCatalog::from_summaries(&store.get_game_summaries(season)?);
            let shots = Pipeline::select_game(scored, &catalog, &label)?;
            scored = shots.tracked.into_iter().chain(shots.opponent).collect();
            scored.sort_by_key(|s| s.features.play_sequence);
        }

        match format {
            OutputFormat::Table => {
                println!(
                    "{:<24} {:>5} {:<10} {:<5} {:<16} {:>4} {:>6} {:>6}",
                    "Game", "Play", "Team", "Spot", "Defense", "Made", "P", "xPts"
                );
                println!("{}", "─".repeat(84));
                for s in &scored {
                    let f = &s.features;
                    println!(
                        "{:<24} {:>5} {:<10} {:<5} {:<16} {:>4} {:>6.3} {:>6.2}",
                        s.game_label,
                        f.play_sequence,
                        f.team,
                        f.shot_spot,
                        f.shot_defense.label(),
                        if f.made { "Y" } else { "N" },
                        s.probability_of_make,
                        s.expected_points
                    );
                }
            }
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(&scored)?);
            }
            OutputFormat::Csv => {
                println!(
                    "game_id,play_sequence,player_id,team,shot_spot,shot_defense,made,\
                     point_value,probability_of_make,expected_points,game_label"
                );
                for s in &scored {
                    let f = &s.features;
                    println!(
                        "{},{},{},{},{},{},{},{},{:.4},{:.4},{}",
                        f.game_id.0,
                        f.play_sequence,
                        f.player_id.0,
                        f.team,
                        f.shot_spot,
                        f.shot_defense.label(),
                        u8::from(f.made),
                        f.point_value,
                        s.probability_of_make,
                        s.expected_points,
                        s.game_label
                    );
                }
            }
        }
        Ok(())
    }

    pub fn simulate(
        config: &Config,
        game: &str,
        season: Option<i32>,
        trials: Option<usize>,
        standard_deviation: Option<f64>,
        seed: Option<u64>,
        format: OutputFormat,
    ) -> Result<()> {
        let mut params = SimulationParams::from_config(&config.simulation);
        if let Some(trials) = trials {
            params.trials = trials;
        }
        if let Some(sd) = standard_deviation {
            params.standard_deviation = sd;
        }
        if let Some(seed) = seed {
            params = params.with_seed(seed);
        }
        params.validate()?;

        let store = EventStore::open(&config.data.database_path)?;
        let catalog = GameCatalog::from_summaries(&store.get_game_summaries(season)?);
        let entry = catalog.resolve(game)?.clone();
        let events = store.get_shot_events(season)?;
        let pipeline = load_pipeline(config)?;

        let summary = pipeline.simulate(&events, &catalog, season, game, params)?;

        match format {
            OutputFormat::Table => {
                println!("\n{} vs {}", config.team.name, entry.label);
                println!("───────────────────────────────────────");
                println!("  Trials:       {}", summary.trials.len());
                println!("  Seed:         {}", summary.seed);
                println!("  Win rate:     {:.1}%", summary.win_rate * 100.0);
                println!(
                    "  {:<12}  mean {:>6.1}  p10 {:>6.1}  p90 {:>6.1}",
                    config.team.name,
                    summary.mean_tracked_total(),
                    summary.tracked_percentiles.p10,
                    summary.tracked_percentiles.p90
                );
                println!(
                    "  {:<12}  mean {:>6.1}  p10 {:>6.1}  p90 {:>6.1}",
                    entry.opponent_name,
                    summary.mean_opponent_total(),
                    summary.opponent_percentiles.p10,
                    summary.opponent_percentiles.p90
                );
                for warning in &summary.warnings {
                    match warning {
                        SimulationWarning::EmptyInput(Side::Tracked) => {
                            println!("  Warning: no {} shots logged", config.team.name)
                        }
                        SimulationWarning::EmptyInput(Side::Opponent) => {
                            println!("  Warning: no opponent shots logged")
                        }
                    }
                }
                println!();
            }
            OutputFormat::Json => {
                let json = serde_json::json!({
                    "game": entry.label,
                    "team": config.team.name,
                    "win_rate": summary.win_rate,
                    "seed": summary.seed,
                    "tracked_percentiles": summary.tracked_percentiles,
                    "opponent_percentiles": summary.opponent_percentiles,
                    "warnings": summary.warnings,
                    "trials": summary.trials,
                });
                println!("{}", serde_json::to_string_pretty(&json)?);
            }
            OutputFormat::Csv => {
                println!("trial,tracked_total,opponent_total,win");
                for (i, trial) in summary.trials.iter().enumerate() {
                    println!(
                        "{},{:.3},{:.3},{}",
                        i, trial.tracked_total, trial.opponent_total, trial.win
                    );
                }
            }
        }
        Ok(())
    }

    pub fn efficiency(config: &Config, season: Option<i32>, format: OutputFormat) -> Result<()> {
        let store = EventStore::open(&config.data.database_path)?;
        let lines = player_efficiency(&store.get_game_summaries(season)?);

        match format {
            OutputFormat::Table => {
                println!(
                    "{:<8} {:<12} {:>3} {:>6} {:>6} {:>6} {:>6} {:>6} {:>6} {:>6}",
                    "Season", "Player", "GP", "PPG", "FG%", "3P%", "FT%", "eFG%", "TS%", "PPS"
                );
                println!("{}", "─".repeat(76));
                for e in &lines {
                    println!(
                        "{:<8} {:<12} {:>3} {:>6.1} {:>6.1} {:>6.1} {:>6.1} {:>6.1} {:>6.1} {:>6.2}",
                        e.season,
                        e.player_id.to_string(),
                        e.games,
                        e.points_per_game(),
                        e.field_goal_pct() * 100.0,
                        e.three_point_pct() * 100.0,
                        e.free_throw_pct() * 100.0,
                        e.effective_fg_pct() * 100.0,
                        e.true_shooting_pct() * 100.0,
                        e.points_per_shot()
                    );
                }
            }
            OutputFormat::Json => {
                let rows: Vec<_> = lines
                    .iter()
                    .map(|e| {
                        serde_json::json!({
                            "player_id": e.player_id,
                            "season": e.season,
                            "games": e.games,
                            "points": e.points,
                            "fg_pct": e.field_goal_pct(),
                            "three_pct": e.three_point_pct(),
                            "ft_pct": e.free_throw_pct(),
                            "efg_pct": e.effective_fg_pct(),
                            "ts_pct": e.true_shooting_pct(),
                            "points_per_shot": e.points_per_shot(),
                        })
                    })
                    .collect();
                println!("{}", serde_json::to_string_pretty(&rows)?);
            }
            OutputFormat::Csv => {
                println!("season,player_id,games,points,fg_pct,three_pct,ft_pct,efg_pct,ts_pct,pps");
                for e in &lines {
                    println!(
                        "{},{},{},{},{:.4},{:.4},{:.4},{:.4},{:.4},{:.4}",
                        e.season,
                        e.player_id.0,
                        e.games,
                        e.points,
                        e.field_goal_pct(),
                        e.three_point_pct(),
                        e.free_throw_pct(),
                        e.effective_fg_pct(),
                        e.true_shooting_pct(),
                        e.points_per_shot()
                    );
                }
            }
        }
        Ok(())
    }

    pub fn chart(
        config: &Config,
        game: &str,
        season: Option<i32>,
        opponent: bool,
        format: OutputFormat,
    ) -> Result<()> {
        let store = EventStore::open(&config.data.database_path)?;
        let catalog = GameCatalog::from_summaries(&store.get_game_summaries(season)?);
        let events = store.get_shot_events(season)?;
        let pipeline = load_pipeline(config)?;

        let scored = pipeline.score(&events, season)?;
        let shots = Pipeline::select_game(scored, &catalog, game)?;
        let (side, side_shots) = if opponent {
            (Side::Opponent, &shots.opponent)
        } else {
            (Side::Tracked, &shots.tracked)
        };
        let spots = spot_breakdown(side_shots, side);

        match format {
            OutputFormat::Table => {
                println!("\n{} shots, {}", side, game);
                println!(
                    "{:<6} {:>5} {:>5} {:>7} {:>6} {:>7} {:>7}",
                    "Spot", "Made", "Att", "Pct", "Pts", "xPts", "+/-"
                );
                println!("{}", "─".repeat(50));
                for s in &spots {
                    println!(
                        "{:<6} {:>5} {:>5} {:>6.1}% {:>6} {:>7.2} {:>+7.2}",
                        s.shot_spot,
                        s.makes,
                        s.attempts,
                        s.percentage() * 100.0,
                        s.actual_points,
                        s.expected_points,
                        s.points_over_expected()
                    );
                }
                println!();
            }
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(&spots)?);
            }
            OutputFormat::Csv => {
                println!("shot_spot,makes,attempts,percentage,actual_points,expected_points");
                for s in &spots {
                    println!(
                        "{},{},{},{:.4},{},{:.4}",
                        s.shot_spot,
                        s.makes,
                        s.attempts,
                        s.percentage(),
                        s.actual_points,
                        s.expected_points
                    );
                }
            }
        }
        Ok(())
    }
}
