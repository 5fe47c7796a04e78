//! Per-cell event rates.
//!
//! Each cell exposes [`EVENTS_PER_CELL`] event slots in a fixed order:
//!
//! | slot  | event                  | effect                                   |
//! |-------|------------------------|------------------------------------------|
//! | 0     | `Payoff(U)`            | one U born if `u_pi > 0`, else one dies  |
//! | 1     | `Payoff(V)`            | same for V                               |
//! | 2     | `Crowding(U)`          | one U dies                               |
//! | 3     | `Crowding(V)`          | one V dies                               |
//! | 4..8  | `Migrate(U, dir)`      | one U moves to the neighbor in `dir`     |
//! | 8..12 | `Migrate(V, dir)`      | one V moves to the neighbor in `dir`     |
//!
//! The formula producing the rates sits behind [`RateModel`], so the engine
//! does not depend on a particular payoff or migration rule.

use crate::grid::{Direction, NeighborSlots};
use crate::state::{Cell, Species};

pub const EVENTS_PER_CELL: usize = 12;

/// Largest `exp` argument accepted by the overflow guard.
pub const EXP_OVERFLOW_BOUND: f64 = 700.0;

/// Largest cell population accepted by the overflow guard.
pub const POPULATION_BOUND: u32 = 1 << 31;

pub type CellRates = [f64; EVENTS_PER_CELL];

/// Per-individual payoffs of both species in one cell.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Payoffs {
    pub u: f64,
    pub v: f64,
}

impl Payoffs {
    #[inline(always)]
    pub fn of(&self, species: Species) -> f64 {
        match species {
            Species::U => self.u,
            Species::V => self.v,
        }
    }
}

/// An atomic state change in one cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Payoff-driven birth (positive payoff) or death (otherwise).
    Payoff(Species),
    /// Density-dependent death.
    Crowding(Species),
    /// Move one individual to the neighbor in the given direction.
    Migrate(Species, Direction),
}

impl EventKind {
    #[inline(always)]
    pub fn slot(self) -> usize {
        match self {
            EventKind::Payoff(Species::U) => 0,
            EventKind::Payoff(Species::V) => 1,
            EventKind::Crowding(Species::U) => 2,
            EventKind::Crowding(Species::V) => 3,
            EventKind::Migrate(Species::U, dir) => 4 + dir.slot(),
            EventKind::Migrate(Species::V, dir) => 8 + dir.slot(),
        }
    }

    pub fn from_slot(slot: usize) -> Option<Self> {
        let event = match slot {
            0 => EventKind::Payoff(Species::U),
            1 => EventKind::Payoff(Species::V),
            2 => EventKind::Crowding(Species::U),
            3 => EventKind::Crowding(Species::V),
            4..=7 => EventKind::Migrate(Species::U, Direction::ALL[slot - 4]),
            8..=11 => EventKind::Migrate(Species::V, Direction::ALL[slot - 8]),
            _ => return None,
        };
        Some(event)
    }
}

/// Why a rate computation could not produce usable values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RateFault {
    /// A weight exponent exceeded [`EXP_OVERFLOW_BOUND`] (guard only).
    Exponent(f64),
    /// A rate came out infinite or NaN.
    NonFinite,
}

/// Everything a rate model may look at for one cell.
#[derive(Debug, Clone, Copy)]
pub struct RateInput<'a> {
    pub cell: &'a Cell,
    pub payoffs: Payoffs,
    /// Payoffs of the neighbor in each direction slot.
    pub neighbors: [Option<Payoffs>; 4],
    pub check_overflow: bool,
}

impl<'a> RateInput<'a> {
    /// Gathers neighbor payoffs for `slots` through `lookup`.
    pub fn gather<F: Fn(usize) -> Payoffs>(
        cell: &'a Cell,
        payoffs: Payoffs,
        slots: &NeighborSlots,
        check_overflow: bool,
        lookup: F,
    ) -> Self {
        RateInput {
            cell,
            payoffs,
            neighbors: slots.map(|slot| slot.map(&lookup)),
            check_overflow,
        }
    }
}

/// Rate formula of the engine. Rates of a cell may depend on the cell and
/// on its neighbors' payoffs, nothing else.
pub trait RateModel: Send + Sync {
    /// Per-individual payoffs from the cell's own counts and payoff matrix.
    fn payoffs(&self, cell: &Cell) -> Payoffs;

    /// Rate of every event slot of the cell. Rates must be non-negative and
    /// zero for all events of a species absent from the cell.
    fn rates(&self, input: &RateInput<'_>) -> Result<CellRates, RateFault>;
}

/// Payoff-driven birth/death, quadratic crowding death and payoff-biased
/// migration.
#[derive(Debug, Clone, Copy, Default)]
pub struct PayoffDriven;

impl RateModel for PayoffDriven {
    fn payoffs(&self, cell: &Cell) -> Payoffs {
        let u = f64::from(cell.u());
        let v = f64::from(cell.v());
        let others = u + v - 1.0;
        if others <= 0.0 {
            return Payoffs::default();
        }
        let x = cell.payoff();
        let u_pi = if cell.u() > 0 {
            (u - 1.0) / others * x.uu() + v / others * x.uv()
        } else {
            0.0
        };
        let v_pi = if cell.v() > 0 {
            u / others * x.vu() + (v - 1.0) / others * x.vv()
        } else {
            0.0
        };
        Payoffs { u: u_pi, v: v_pi }
    }

    fn rates(&self, input: &RateInput<'_>) -> Result<CellRates, RateFault> {
        let cell = input.cell;
        let p = cell.params();
        let u = f64::from(cell.u());
        let v = f64::from(cell.v());
        let total = u + v;

        let mut rates: CellRates = [0.0; EVENTS_PER_CELL];
        rates[0] = (u * input.payoffs.u).abs();
        rates[1] = (v * input.payoffs.v).abs();
        rates[2] = p.kappa_u * u * total;
        rates[3] = p.kappa_v * v * total;

        // Weight toward each neighbor is 1 + exp(w * neighbor payoff).
        let mut weight_u = [0.0; 4];
        let mut weight_v = [0.0; 4];
        for (slot, nb) in input.neighbors.iter().enumerate() {
            let Some(nb) = nb else { continue };
            let exp_u = p.w_u * nb.u;
            let exp_v = p.w_v * nb.v;
            if input.check_overflow {
                let worst = exp_u.max(exp_v);
                if worst > EXP_OVERFLOW_BOUND {
                    return Err(RateFault::Exponent(worst));
                }
            }
            weight_u[slot] = 1.0 + exp_u.exp();
            weight_v[slot] = 1.0 + exp_v.exp();
        }
        spread(&mut rates[4..8], p.mu_u * u, &weight_u);
        spread(&mut rates[8..12], p.mu_v * v, &weight_v);

        if rates.iter().any(|r| !r.is_finite()) {
            return Err(RateFault::NonFinite);
        }
        Ok(rates)
    }
}

// Splits `total` across directions in proportion to `weights`.
fn spread(out: &mut [f64], total: f64, weights: &[f64; 4]) {
    let sum: f64 = weights.iter().sum();
    if total == 0.0 || sum <= 0.0 {
        out.fill(0.0);
        return;
    }
    let scale = total / sum;
    for (rate, w) in out.iter_mut().zip(weights) {
        *rate = scale * w;
    }
}
