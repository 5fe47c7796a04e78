//! Incrementally maintained event rates of the whole grid.
//!
//! The ledger caches per-cell payoffs and rate vectors together with
//! per-cell, per-row and grid-wide sums. After an event only the changed
//! cells and their neighbors are recomputed, so the cost of an update does
//! not grow with the grid.

use log::trace;
use spatial_game_common::OverflowKind;

use crate::grid::Topology;
use crate::rates::{CellRates, EventKind, Payoffs, RateFault, RateInput, RateModel, EVENTS_PER_CELL};
use crate::state::Grid;

#[derive(Debug, Clone)]
pub struct RateLedger {
    m: usize,
    check_overflow: bool,
    payoffs: Vec<Payoffs>,
    rates: Vec<CellRates>,
    cell_sums: Vec<f64>,
    row_sums: Vec<f64>,
    total: f64,
    // Cells with a positive rate sum; zero means no event is possible.
    active: usize,
    resum_interval: u64,
    since_resum: u64,
    // Scratch buffer for the cells touched by one update.
    touched: Vec<usize>,
}

impl RateLedger {
    /// Computes every cell from scratch.
    pub fn build<R: RateModel>(
        grid: &Grid,
        model: &R,
        check_overflow: bool,
        resum_interval: u64,
    ) -> Result<Self, OverflowKind> {
        let topo = grid.topology();
        let cells = grid.len();
        let mut ledger = RateLedger {
            m: topo.m(),
            check_overflow,
            payoffs: Vec::with_capacity(cells),
            rates: vec![[0.0; EVENTS_PER_CELL]; cells],
            cell_sums: vec![0.0; cells],
            row_sums: vec![0.0; topo.n()],
            total: 0.0,
            active: 0,
            resum_interval: resum_interval.max(1),
            since_resum: 0,
            touched: Vec::with_capacity(10),
        };
        for idx in 0..cells {
            let payoffs = model.payoffs(grid.cell(idx));
            check_payoffs(topo, idx, payoffs)?;
            ledger.payoffs.push(payoffs);
        }
        for idx in 0..cells {
            let rates = ledger.compute(grid, model, idx)?;
            ledger.cell_sums[idx] = rates.iter().sum();
            ledger.rates[idx] = rates;
            if ledger.cell_sums[idx] > 0.0 {
                ledger.active += 1;
            }
        }
        ledger.resum();
        Ok(ledger)
    }

    /// Sum of all event rates on the grid.
    #[inline(always)]
    pub fn total(&self) -> f64 {
        self.total
    }

    #[inline(always)]
    pub fn payoffs(&self, idx: usize) -> Payoffs {
        self.payoffs[idx]
    }

    #[inline(always)]
    pub fn cell_rates(&self, idx: usize) -> &CellRates {
        &self.rates[idx]
    }

    pub fn cell_sum(&self, idx: usize) -> f64 {
        self.cell_sums[idx]
    }

    /// Number of cells with at least one possible event.
    pub fn active_cells(&self) -> usize {
        self.active
    }

    /// Brings the ledger up to date after the counts of `changed` cells moved.
    ///
    /// Payoffs are recomputed for `changed`; rates for `changed` and all
    /// their neighbors. On error the ledger is left partially updated and
    /// must not be used further.
    pub fn refresh<R: RateModel>(&mut self, grid: &Grid, model: &R, changed: &[usize]) -> Result<(), OverflowKind> {
        let topo = grid.topology();
        self.touched.clear();
        for &idx in changed {
            let payoffs = model.payoffs(grid.cell(idx));
            check_payoffs(topo, idx, payoffs)?;
            self.payoffs[idx] = payoffs;
            push_unique(&mut self.touched, idx);
            topo.for_each_neighbor(idx, |nb| push_unique(&mut self.touched, nb));
        }

        for i in 0..self.touched.len() {
            let idx = self.touched[i];
            let rates = self.compute(grid, model, idx)?;
            let new_sum: f64 = rates.iter().sum();
            let old_sum = self.cell_sums[idx];
            let delta = new_sum - old_sum;
            match (old_sum > 0.0, new_sum > 0.0) {
                (false, true) => self.active += 1,
                (true, false) => self.active -= 1,
                _ => {}
            }
            self.rates[idx] = rates;
            self.cell_sums[idx] = new_sum;
            self.row_sums[idx / self.m] += delta;
            self.total += delta;
        }
        if self.active == 0 {
            self.row_sums.fill(0.0);
            self.total = 0.0;
        }
        trace!("Refreshed {} cells, total rate {:.6}", self.touched.len(), self.total);

        self.since_resum += 1;
        if self.since_resum >= self.resum_interval {
            self.resum();
        }
        Ok(())
    }

    /// Re-adds row and grid totals from the stored per-cell sums, removing
    /// drift accumulated by incremental updates. Cell rates are untouched.
    pub fn resum(&mut self) {
        for (row, sum) in self.row_sums.iter_mut().enumerate() {
            *sum = self.cell_sums[row * self.m..(row + 1) * self.m].iter().sum();
        }
        self.total = self.row_sums.iter().sum();
        if self.active == 0 {
            self.total = 0.0;
        }
        self.since_resum = 0;
    }

    /// Picks the event that `draw` (in `[0, total)`) falls on: the first
    /// event whose cumulative rate strictly exceeds the draw. Rows are
    /// walked first, then cells in the row, then events in the cell.
    pub fn select(&self, draw: f64) -> Option<(usize, EventKind)> {
        let (row, rest) = pick(self.row_sums.iter().copied(), draw)?;
        let start = row * self.m;
        let (col, rest) = pick(self.cell_sums[start..start + self.m].iter().copied(), rest)?;
        let idx = start + col;
        let (slot, _) = pick(self.rates[idx].iter().copied(), rest)?;
        EventKind::from_slot(slot).map(|event| (idx, event))
    }

    /// Recomputes every cell from the current grid and returns the largest
    /// absolute difference between cached and fresh values (rates, payoffs
    /// and the grid total).
    pub fn verify<R: RateModel>(&self, grid: &Grid, model: &R) -> f64 {
        let topo = grid.topology();
        let fresh_payoffs: Vec<Payoffs> = grid.cells().iter().map(|c| model.payoffs(c)).collect();
        let mut worst = 0.0_f64;
        let mut fresh_total = 0.0;
        for idx in 0..grid.len() {
            let cached = self.payoffs[idx];
            worst = worst.max((cached.u - fresh_payoffs[idx].u).abs());
            worst = worst.max((cached.v - fresh_payoffs[idx].v).abs());

            let input = RateInput::gather(
                grid.cell(idx),
                fresh_payoffs[idx],
                topo.slots(idx),
                false,
                |nb| fresh_payoffs[nb],
            );
            let Ok(rates) = model.rates(&input) else {
                return f64::INFINITY;
            };
            for (a, b) in rates.iter().zip(&self.rates[idx]) {
                worst = worst.max((a - b).abs());
            }
            fresh_total += rates.iter().sum::<f64>();
        }
        worst.max((fresh_total - self.total).abs())
    }

    #[cfg(test)]
    pub(crate) fn add_residue(&mut self, row: usize, amount: f64) {
        self.row_sums[row] += amount;
        self.total += amount;
    }

    fn compute<R: RateModel>(&self, grid: &Grid, model: &R, idx: usize) -> Result<CellRates, OverflowKind> {
        let topo = grid.topology();
        let input = RateInput::gather(
            grid.cell(idx),
            self.payoffs[idx],
            topo.slots(idx),
            self.check_overflow,
            |nb| self.payoffs[nb],
        );
        model.rates(&input).map_err(|fault| {
            let (row, col) = topo.coords(idx);
            match fault {
                RateFault::Exponent(exponent) => OverflowKind::PayoffExponent { row, col, exponent },
                RateFault::NonFinite => OverflowKind::NonFiniteRate { row, col },
            }
        })
    }
}

fn check_payoffs(topo: &Topology, idx: usize, payoffs: Payoffs) -> Result<(), OverflowKind> {
    if payoffs.u.is_finite() && payoffs.v.is_finite() {
        return Ok(());
    }
    let (row, col) = topo.coords(idx);
    Err(OverflowKind::NonFiniteRate { row, col })
}

#[inline(always)]
fn push_unique(list: &mut Vec<usize>, idx: usize) {
    if !list.contains(&idx) {
        list.push(idx);
    }
}

// Returns the first index whose running sum strictly exceeds `draw`, and the
// remainder of the draw inside that entry. If float drift leaves the draw
// past the end, falls back to the last positive entry.
fn pick<I: Iterator<Item = f64>>(weights: I, draw: f64) -> Option<(usize, f64)> {
    let mut cumulative = 0.0;
    let mut last_positive = None;
    for (i, w) in weights.enumerate() {
        if w <= 0.0 {
            continue;
        }
        if cumulative + w > draw {
            return Some((i, draw - cumulative));
        }
        last_positive = Some((i, w));
        cumulative += w;
    }
    // The remainder lands just inside the fallback entry.
    last_positive.map(|(i, w)| (i, w * (1.0 - f64::EPSILON)))
}
