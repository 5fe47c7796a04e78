//! Stochastic spatial simulation of two interacting species.
//!
//! Populations of species U and V live on the cells of an `N x M` lattice.
//! Births, deaths and migrations happen as a continuous-time Markov jump
//! process simulated exactly with the Gillespie algorithm; event rates are
//! driven by a per-cell payoff matrix. Each replicate records the grid at
//! fixed simulated-time intervals.
//!
//! The usual entry point is [`Orchestrator`], which validates the inputs,
//! runs `sim_time` independent replicates in parallel and returns a
//! [`SimulationResult`].

pub mod error;
pub mod grid;
pub mod ledger;
pub mod rates;
pub mod recorder;
pub mod runner;
pub mod simulation;
pub mod state;

pub use error::SimulationError;
pub use grid::{Direction, Topology};
pub use ledger::RateLedger;
pub use rates::{EventKind, PayoffDriven, Payoffs, RateModel};
pub use recorder::{Compressor, Fold, Recorder};
pub use runner::{derive_seeds, run_replicate, CancelToken, Orchestrator};
pub use simulation::{Event, RunState, SimClock, Simulation};
pub use state::{Cell, Grid, Species};

pub use spatial_game_common::{
    ConfigError, FoldPolicy, OverflowKind, Quantity, RecordedSeries, ReplicateResult, ReplicateStatus, SimParams,
    SimulationConfig, SimulationResult, Snapshot,
};
