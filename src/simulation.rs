use crate::ledger::RateLedger;
use crate::rates::{EventKind, RateModel, POPULATION_BOUND};
use crate::recorder::{Fold, Recorder};
use crate::state::{CountOverflow, Grid};
use log::{debug, trace};
use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Exp;
use spatial_game_common::{OverflowKind, RecordedSeries, ReplicateStatus, SimParams};

/// Simulated time and number of applied events.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SimClock {
    pub time: f64,
    pub events: u64,
}

/// State of the advance loop.
#[derive(Debug, Clone, PartialEq)]
pub enum RunState {
    Running,
    /// The next event would have landed past `maxtime`.
    ReachedMaxtime,
    /// Total rate is zero; nothing can happen any more.
    Absorbed { at: f64 },
    /// The overflow guard tripped.
    Aborted { reason: OverflowKind, at: f64 },
}

impl RunState {
    pub fn is_running(&self) -> bool {
        matches!(self, RunState::Running)
    }

    /// Terminal outcome, or `None` while still running.
    pub fn status(&self) -> Option<ReplicateStatus> {
        match self {
            RunState::Running => None,
            RunState::ReachedMaxtime => Some(ReplicateStatus::ReachedMaxtime),
            RunState::Absorbed { at } => Some(ReplicateStatus::Absorbed { at: *at }),
            RunState::Aborted { reason, at } => Some(ReplicateStatus::Aborted { reason: reason.clone(), at: *at }),
        }
    }
}

/// One applied event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Event {
    pub time: f64,
    pub cell: usize,
    pub kind: EventKind,
    /// Destination cell of a migration.
    pub target: Option<usize>,
}

/// Drives one replicate: a grid, its rate ledger, a random stream and a
/// recorder, advanced one Gillespie event at a time.
pub struct Simulation<'m, R: RateModel> {
    model: &'m R,
    grid: Grid,
    ledger: RateLedger,
    rng: StdRng,
    clock: SimClock,
    recorder: Recorder,
    state: RunState,
    maxtime: f64,
    check_overflow: bool,
}

impl<'m, R: RateModel> Simulation<'m, R> {
    /// Creates a replicate from validated parameters and its own seed.
    ///
    /// Fails if the initial state already trips the overflow guard.
    pub fn new(params: &SimParams, model: &'m R, seed: u64) -> Result<Self, OverflowKind> {
        Self::with_recorder(params, model, seed, Recorder::new(params))
    }

    /// As [`Simulation::new`], folding compressed snapshots with `fold`.
    pub fn with_fold(params: &SimParams, model: &'m R, seed: u64, fold: Box<dyn Fold>) -> Result<Self, OverflowKind> {
        Self::with_recorder(params, model, seed, Recorder::with_fold(params, fold))
    }

    fn with_recorder(params: &SimParams, model: &'m R, seed: u64, recorder: Recorder) -> Result<Self, OverflowKind> {
        let grid = Grid::from_params(params);
        let ledger = RateLedger::build(&grid, model, params.check_overflow, params.resum_interval)?;
        debug!(
            "Replicate initialised: {} cells, initial total rate {:.4}, seed {}",
            grid.len(),
            ledger.total(),
            seed
        );
        Ok(Simulation {
            model,
            grid,
            ledger,
            rng: StdRng::seed_from_u64(seed),
            clock: SimClock::default(),
            recorder,
            state: RunState::Running,
            maxtime: params.maxtime,
            check_overflow: params.check_overflow,
        })
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn ledger(&self) -> &RateLedger {
        &self.ledger
    }

    pub fn clock(&self) -> SimClock {
        self.clock
    }

    pub fn state(&self) -> &RunState {
        &self.state
    }

    /// Largest discrepancy between the ledger and a full recompute.
    pub fn verify(&self) -> f64 {
        self.ledger.verify(&self.grid, self.model)
    }

    /// Advances by one event. Returns `None` once the loop has reached a
    /// terminal state; remaining snapshots are filled on normal termination.
    pub fn step(&mut self) -> Option<Event> {
        if !self.state.is_running() {
            return None;
        }

        let total = self.ledger.total();
        if !total.is_finite() {
            self.abort(OverflowKind::NonFiniteTotal);
            return None;
        }
        if total <= 0.0 {
            debug!("Absorbing state reached at t = {:.4} after {} events", self.clock.time, self.clock.events);
            self.recorder.fill_remaining(&self.grid, &self.ledger);
            self.state = RunState::Absorbed { at: self.clock.time };
            return None;
        }

        let dt = match Exp::new(total) {
            Ok(dist) => dist.sample(&mut self.rng),
            Err(_) => {
                self.abort(OverflowKind::NonFiniteTotal);
                return None;
            }
        };
        let next_time = self.clock.time + dt;
        if next_time > self.maxtime {
            self.recorder.fill_remaining(&self.grid, &self.ledger);
            self.state = RunState::ReachedMaxtime;
            return None;
        }

        let draw = self.rng.random::<f64>() * total;
        let Some((cell, kind)) = self.ledger.select(draw) else {
            // Only reachable through summation residue. Both draws were made
            // against a stale total, so discard them and retry from the same time.
            self.ledger.resum();
            return self.step();
        };

        // Boundaries passed before this event see the state left by the previous one.
        self.recorder.capture_until(&self.grid, &self.ledger, next_time);
        self.clock.time = next_time;

        let target = match self.apply(cell, kind) {
            Ok(target) => target,
            Err(CountOverflow { idx }) => {
                let (row, col) = self.grid.topology().coords(idx);
                self.abort(OverflowKind::Population { row, col });
                return None;
            }
        };

        let refreshed = match target {
            Some(target) => self.ledger.refresh(&self.grid, self.model, &[cell, target]),
            None => self.ledger.refresh(&self.grid, self.model, &[cell]),
        };
        if let Err(reason) = refreshed {
            self.abort(reason);
            return None;
        }
        if self.check_overflow {
            for idx in std::iter::once(cell).chain(target) {
                let c = self.grid.cell(idx);
                if c.u() > POPULATION_BOUND || c.v() > POPULATION_BOUND {
                    let (row, col) = self.grid.topology().coords(idx);
                    self.abort(OverflowKind::Population { row, col });
                    return None;
                }
            }
        }

        self.clock.events += 1;
        trace!("t = {:.6}: {:?} at cell {} (target {:?})", self.clock.time, kind, cell, target);
        Some(Event { time: self.clock.time, cell, kind, target })
    }

    /// Steps until a terminal state and returns it.
    pub fn run(&mut self) -> &RunState {
        while self.step().is_some() {}
        &self.state
    }

    /// Recorded series so far; partial if the replicate was aborted.
    pub fn into_series(self) -> RecordedSeries {
        self.recorder.finish()
    }

    fn apply(&mut self, cell: usize, kind: EventKind) -> Result<Option<usize>, CountOverflow> {
        match kind {
            EventKind::Payoff(species) => {
                if self.ledger.payoffs(cell).of(species) > 0.0 {
                    self.grid.add_one(cell, species)?;
                } else {
                    self.grid.remove_one(cell, species);
                }
                Ok(None)
            }
            EventKind::Crowding(species) => {
                self.grid.remove_one(cell, species);
                Ok(None)
            }
            EventKind::Migrate(species, dir) => {
                let Some(target) = self.grid.topology().neighbor(cell, dir) else {
                    return Ok(None);
                };
                if self.grid.remove_one(cell, species) {
                    self.grid.add_one(target, species)?;
                }
                Ok(Some(target))
            }
        }
    }

    fn abort(&mut self, reason: OverflowKind) {
        log::warn!("Replicate aborted at t = {:.4}: {}", self.clock.time, reason);
        self.state = RunState::Aborted { reason, at: self.clock.time };
    }
}
