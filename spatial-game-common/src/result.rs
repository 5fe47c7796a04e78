use serde::{Deserialize, Serialize};
use std::fmt;

use crate::sim_params::SimParams;
use crate::snapshot::RecordedSeries;

/// Which magnitude guard tripped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OverflowKind {
    /// A migration-weight exponent `w * payoff` exceeded the `exp` range.
    PayoffExponent { row: usize, col: usize, exponent: f64 },
    /// A cell population left the representable range.
    Population { row: usize, col: usize },
    /// A rate or payoff became infinite or NaN.
    NonFiniteRate { row: usize, col: usize },
    /// The grid-wide total rate became infinite or NaN.
    NonFiniteTotal,
}

impl fmt::Display for OverflowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OverflowKind::PayoffExponent { row, col, exponent } => {
                write!(f, "migration weight exponent {exponent:.3} overflows at ({row}, {col})")
            }
            OverflowKind::Population { row, col } => {
                write!(f, "population overflow at ({row}, {col})")
            }
            OverflowKind::NonFiniteRate { row, col } => {
                write!(f, "non-finite rate at ({row}, {col})")
            }
            OverflowKind::NonFiniteTotal => write!(f, "non-finite total rate"),
        }
    }
}

/// Terminal state of one replicate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ReplicateStatus {
    /// Simulated time reached `maxtime`.
    ReachedMaxtime,
    /// Total rate dropped to zero at `at`; no further events were possible.
    Absorbed { at: f64 },
    /// The overflow guard tripped at `at`. The series holds what was recorded before.
    Aborted { reason: OverflowKind, at: f64 },
    /// Skipped because the run was cancelled before it started.
    Cancelled,
}

impl ReplicateStatus {
    /// Normal completion, absorbing or not.
    pub fn is_complete(&self) -> bool {
        matches!(self, ReplicateStatus::ReachedMaxtime | ReplicateStatus::Absorbed { .. })
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self, ReplicateStatus::Aborted { .. })
    }
}

/// Outcome of one replicate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplicateResult {
    pub index: usize,
    pub seed: u64,
    pub status: ReplicateStatus,
    pub events: u64,
    /// Simulated time of the last applied event.
    pub final_time: f64,
    pub series: RecordedSeries,
}

/// All replicates of a run together with the inputs that produced them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    pub params: SimParams,
    /// Seed the replicate seeds were derived from; drawn from entropy if
    /// `params.seed` was unset.
    pub master_seed: u64,
    /// Raw snapshot count per replicate before compression.
    pub max_record: usize,
    pub compress_itv: usize,
    pub replicates: Vec<ReplicateResult>,
}

impl SimulationResult {
    pub fn new(params: SimParams, master_seed: u64) -> Self {
        SimulationResult {
            max_record: params.max_record(),
            compress_itv: params.compress_itv,
            replicates: Vec::with_capacity(params.sim_time),
            params,
            master_seed,
        }
    }

    /// Appends a finished replicate; entries are never revisited.
    pub fn push(&mut self, replicate: ReplicateResult) {
        self.replicates.push(replicate);
    }

    pub fn replicate(&self, index: usize) -> Option<&ReplicateResult> {
        self.replicates.iter().find(|r| r.index == index)
    }

    pub fn completed(&self) -> impl Iterator<Item = &ReplicateResult> {
        self.replicates.iter().filter(|r| r.status.is_complete())
    }

    pub fn aborted(&self) -> impl Iterator<Item = &ReplicateResult> {
        self.replicates.iter().filter(|r| r.status.is_aborted())
    }

    pub fn is_finished(&self) -> bool {
        self.replicates.len() == self.params.sim_time
    }
}
