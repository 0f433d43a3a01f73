//! Monte Carlo game outcome simulation
//!
//! Each trial redraws every shot's make probability from a normal
//! distribution centred on the model's prediction, clamps it to [0, 1], and
//! credits `p' * point_value` to the shooting side. The tracked team wins a
//! trial only when its total is strictly higher.
//!
//! Trials run in parallel. Trial `i` uses its own generator seeded with
//! `base_seed + i`, so a fixed seed reproduces the same trials regardless of
//! how rayon schedules them.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, StandardNormal};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::predict::ScoredShot;
use crate::{HoopsError, Result, Side, SimulationConfig};

pub const MAX_TRIALS: usize = 10_000;
pub const MIN_STANDARD_DEVIATION: f64 = 0.01;
pub const MAX_STANDARD_DEVIATION: f64 = 1.0;

/// Simulation request parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationParams {
    /// Number of independent trials (1-10000)
    pub trials: usize,
    /// Noise scale applied to every shot probability (0.01-1.0)
    pub standard_deviation: f64,
    /// Base seed; `None` draws one from entropy
    pub seed: Option<u64>,
}

impl SimulationParams {
    pub fn new(trials: usize, standard_deviation: f64) -> Self {
        SimulationParams {
            trials,
            standard_deviation,
            seed: None,
        }
    }

    pub fn from_config(config: &SimulationConfig) -> Self {
        SimulationParams {
            trials: config.trials,
            standard_deviation: config.standard_deviation,
            seed: config.seed,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.trials == 0 || self.trials > MAX_TRIALS {
            return Err(HoopsError::Validation(format!(
                "trials must be between 1 and {}, got {}",
                MAX_TRIALS, self.trials
            )));
        }
        let sd = self.standard_deviation;
        if !sd.is_finite() || !(MIN_STANDARD_DEVIATION..=MAX_STANDARD_DEVIATION).contains(&sd) {
            return Err(HoopsError::Validation(format!(
                "standard deviation must be between {} and {}, got {}",
                MIN_STANDARD_DEVIATION, MAX_STANDARD_DEVIATION, sd
            )));
        }
        Ok(())
    }
}

/// One simulated replay of the game
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SimulationTrial {
    pub tracked_total: f64,
    pub opponent_total: f64,
    /// 1 when the tracked team outscored the opponent, else 0
    pub win: u8,
}

impl SimulationTrial {
    fn new(tracked_total: f64, opponent_total: f64) -> Self {
        SimulationTrial {
            tracked_total,
            opponent_total,
            win: u8::from(tracked_total > opponent_total),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Percentiles {
    pub p10: f64,
    pub p90: f64,
}

impl Percentiles {
    fn of(values: impl Iterator<Item = f64>) -> Self {
        let mut sorted: Vec<f64> = values.collect();
        sorted.sort_by(|a, b| a.total_cmp(b));
        Percentiles {
            p10: percentile(&sorted, 10.0),
            p90: percentile(&sorted, 90.0),
        }
    }
}

/// Non-fatal conditions noticed while simulating
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SimulationWarning {
    /// A side had no shots; its totals are zero in every trial
    EmptyInput(Side),
}

/// Aggregated simulation output
#[derive(Debug, Clone, Serialize)]
pub struct SimulationSummary {
    pub win_rate: f64,
    pub tracked_percentiles: Percentiles,
    pub opponent_percentiles: Percentiles,
    pub trials: Vec<SimulationTrial>,
    pub warnings: Vec<SimulationWarning>,
    /// Base seed the trials were drawn with
    pub seed: u64,
}

impl SimulationSummary {
    pub fn mean_tracked_total(&self) -> f64 {
        mean(self.trials.iter().map(|t| t.tracked_total))
    }

    pub fn mean_opponent_total(&self) -> f64 {
        mean(self.trials.iter().map(|t| t.opponent_total))
    }
}

/// Model probability and value of a shot
#[derive(Debug, Clone, Copy)]
struct ShotInput {
    probability: f64,
    point_value: f64,
}

/// Runs batches of game replays
#[derive(Debug, Clone)]
pub struct OutcomeSimulator {
    params: SimulationParams,
}

impl OutcomeSimulator {
    /// Create a simulator, rejecting invalid parameters up front
    pub fn new(params: SimulationParams) -> Result<Self> {
        params.validate()?;
        Ok(OutcomeSimulator { params })
    }

    pub fn run(
        &self,
        tracked: &[ScoredShot],
        opponent: &[ScoredShot],
    ) -> Result<SimulationSummary> {
        self.run_cancellable(tracked, opponent, &AtomicBool::new(false))
    }

    /// Run the batch, abandoning it once `cancel` is set.
    ///
    /// A cancelled batch returns `HoopsError::Cancelled` and no trials.
    pub fn run_cancellable(
        &self,
        tracked: &[ScoredShot],
        opponent: &[ScoredShot],
        cancel: &AtomicBool,
    ) -> Result<SimulationSummary> {
        let tracked_inputs = shot_inputs(tracked)?;
        let opponent_inputs = shot_inputs(opponent)?;
        check_disjoint(tracked, opponent)?;

        let mut warnings = Vec::new();
        if tracked.is_empty() {
            log::warn!("No tracked-team shots to simulate; tracked totals will be zero");
            warnings.push(SimulationWarning::EmptyInput(Side::Tracked));
        }
        if opponent.is_empty() {
            log::warn!("No opponent shots to simulate; opponent totals will be zero");
            warnings.push(SimulationWarning::EmptyInput(Side::Opponent));
        }

        let seed = self.params.seed.unwrap_or_else(rand::random);
        let sd = self.params.standard_deviation;
        let requested = self.params.trials;

        log::debug!(
            "Simulating {} trials ({} tracked shots, {} opponent shots, sd {}, seed {})",
            requested,
            tracked.len(),
            opponent.len(),
            sd,
            seed
        );

        let outcomes: Vec<Option<SimulationTrial>> = (0..requested)
            .into_par_iter()
            .map(|i| {
                if cancel.load(Ordering::Relaxed) {
                    return None;
                }
                let mut rng = StdRng::seed_from_u64(seed.wrapping_add(i as u64));
                Some(simulate_trial(&mut rng, &tracked_inputs, &opponent_inputs, sd))
            })
            .collect();

        let trials: Vec<SimulationTrial> = outcomes.iter().flatten().copied().collect();
        if trials.len() < requested {
            log::info!("Simulation abandoned after {} trials", trials.len());
            return Err(HoopsError::Cancelled {
                completed: trials.len(),
                requested,
            });
        }

        let wins = trials.iter().map(|t| t.win as f64);
        let summary = SimulationSummary {
            win_rate: mean(wins),
            tracked_percentiles: Percentiles::of(trials.iter().map(|t| t.tracked_total)),
            opponent_percentiles: Percentiles::of(trials.iter().map(|t| t.opponent_total)),
            trials,
            warnings,
            seed,
        };

        log::info!(
            "Simulated {} trials: win rate {:.3}",
            requested,
            summary.win_rate
        );
        Ok(summary)
    }
}

fn shot_inputs(shots: &[ScoredShot]) -> Result<Vec<ShotInput>> {
    shots
        .iter()
        .map(|s| {
            let p = s.probability_of_make;
            if !p.is_finite() || !(0.0..=1.0).contains(&p) {
                return Err(HoopsError::Validation(format!(
                    "shot {} in game {} has probability {}",
                    s.features.play_sequence, s.features.game_id.0, p
                )));
            }
            Ok(ShotInput {
                probability: p,
                point_value: s.point_value() as f64,
            })
        })
        .collect()
}

fn check_disjoint(tracked: &[ScoredShot], opponent: &[ScoredShot]) -> Result<()> {
    let keys: HashSet<_> = tracked
        .iter()
        .map(|s| (s.features.game_id, s.features.play_sequence))
        .collect();
    match opponent
        .iter()
        .find(|s| keys.contains(&(s.features.game_id, s.features.play_sequence)))
    {
        Some(s) => Err(HoopsError::Validation(format!(
            "shot {} in game {} is in both tracked and opponent sets",
            s.features.play_sequence, s.features.game_id.0
        ))),
        None => Ok(()),
    }
}

fn simulate_trial<R: Rng>(
    rng: &mut R,
    tracked: &[ShotInput],
    opponent: &[ShotInput],
    sd: f64,
) -> SimulationTrial {
    let tracked_total = simulate_side(rng, tracked, sd);
    let opponent_total = simulate_side(rng, opponent, sd);
    SimulationTrial::new(tracked_total, opponent_total)
}

/// Sum of simulated points over one side's shots
fn simulate_side<R: Rng>(rng: &mut R, shots: &[ShotInput], sd: f64) -> f64 {
    shots
        .iter()
        .map(|shot| {
            let p = perturbed_probability(rng, shot.probability, sd);
            // Every input row is an attempt
            let attempted = 1.0;
            (attempted * p * shot.point_value).max(0.0)
        })
        .sum()
}

/// Draw from N(mean, sd) and clamp to [0, 1]
pub fn perturbed_probability<R: Rng>(rng: &mut R, mean: f64, sd: f64) -> f64 {
    let z: f64 = StandardNormal.sample(rng);
    (mean + sd * z).clamp(0.0, 1.0)
}

/// Percentile of sorted values with linear interpolation between ranks
pub fn percentile(sorted: &[f64], q: f64) -> f64 {
    match sorted.len() {
        0 => 0.0,
        1 => sorted[0],
        n => {
            let rank = (q / 100.0).clamp(0.0, 1.0) * (n - 1) as f64;
            let lo = rank.floor() as usize;
            let hi = rank.ceil() as usize;
            sorted[lo] + (sorted[hi] - sorted[lo]) * (rank - lo as f64)
        }
    }
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}
