//! Game outcome simulation
//!
//! Monte Carlo replays of a game's scored shots.

pub mod monte_carlo;

pub use monte_carlo::{
    OutcomeSimulator, Percentiles, SimulationParams, SimulationSummary, SimulationTrial,
    SimulationWarning,
};
