//! Time-binned recording of grid state.
//!
//! The [`Recorder`] captures one raw [`Snapshot`] at every multiple of
//! `record_itv` and hands it to a [`Compressor`], which folds blocks of raw
//! snapshots before they are stored. The advance loop only ever talks to
//! the recorder; folding policy is invisible to it.

use spatial_game_common::{FoldPolicy, Quantity, RecordedSeries, SimParams, Snapshot};

use crate::ledger::RateLedger;
use crate::state::Grid;

/// Folds a non-empty block of raw snapshots into one.
pub trait Fold: Send + Sync {
    fn fold(&self, block: &[Snapshot]) -> Snapshot;
}

impl Fold for FoldPolicy {
    fn fold(&self, block: &[Snapshot]) -> Snapshot {
        let cells = block[0].num_cells();
        let mut out = Snapshot::with_cells(block[0].time, cells);
        match self {
            FoldPolicy::Last => {
                let last = &block[block.len() - 1];
                out.u.copy_from_slice(&last.u);
                out.v.copy_from_slice(&last.v);
                out.u_pi.copy_from_slice(&last.u_pi);
                out.v_pi.copy_from_slice(&last.v_pi);
            }
            FoldPolicy::Mean => {
                let scale = 1.0 / block.len() as f64;
                for q in Quantity::ALL {
                    let acc = out.get_mut(q);
                    for snap in block {
                        for (a, x) in acc.iter_mut().zip(snap.get(q)) {
                            *a += x;
                        }
                    }
                    acc.iter_mut().for_each(|a| *a *= scale);
                }
            }
            FoldPolicy::Max => {
                for q in Quantity::ALL {
                    let acc = out.get_mut(q);
                    acc.copy_from_slice(block[0].get(q));
                    for snap in &block[1..] {
                        for (a, x) in acc.iter_mut().zip(snap.get(q)) {
                            *a = a.max(*x);
                        }
                    }
                }
            }
        }
        out
    }
}

/// Buffers raw snapshots and emits one folded snapshot per `every` inputs.
pub struct Compressor {
    every: usize,
    fold: Box<dyn Fold>,
    pending: Vec<Snapshot>,
    out: Vec<Snapshot>,
}

impl Compressor {
    pub fn new(every: usize, fold: Box<dyn Fold>) -> Self {
        let every = every.max(1);
        Compressor { every, fold, pending: Vec::with_capacity(every), out: Vec::new() }
    }

    pub fn push(&mut self, raw: Snapshot) {
        if self.every == 1 {
            self.out.push(raw);
            return;
        }
        self.pending.push(raw);
        if self.pending.len() == self.every {
            self.flush();
        }
    }

    /// Number of stored (folded) snapshots so far.
    pub fn emitted(&self) -> usize {
        self.out.len()
    }

    /// Folds any trailing partial block and returns everything emitted.
    pub fn finish(mut self) -> Vec<Snapshot> {
        self.flush();
        self.out
    }

    fn flush(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        let folded = self.fold.fold(&self.pending);
        self.pending.clear();
        self.out.push(folded);
    }
}

/// Captures snapshots at `k * record_itv` for `k` in `0..max_record`.
pub struct Recorder {
    n: usize,
    m: usize,
    record_itv: f64,
    maxtime: f64,
    max_record: usize,
    compress_itv: usize,
    next: usize,
    compressor: Compressor,
}

impl Recorder {
    pub fn new(params: &SimParams) -> Self {
        Self::with_fold(params, Box::new(params.fold))
    }

    /// Recorder with a custom folding policy.
    pub fn with_fold(params: &SimParams, fold: Box<dyn Fold>) -> Self {
        Recorder {
            n: params.n,
            m: params.m,
            record_itv: params.record_itv,
            maxtime: params.maxtime,
            max_record: params.max_record(),
            compress_itv: params.compress_itv.max(1),
            next: 0,
            compressor: Compressor::new(params.compress_itv, fold),
        }
    }

    /// Simulated time of the next snapshot, if any remain.
    pub fn next_time(&self) -> Option<f64> {
        (self.next < self.max_record).then(|| self.boundary_time(self.next))
    }

    /// Raw snapshots captured so far.
    pub fn recorded(&self) -> usize {
        self.next
    }

    pub fn is_done(&self) -> bool {
        self.next >= self.max_record
    }

    /// Appends one snapshot of the current state for the next interval
    /// boundary. Past snapshots are never revisited.
    pub fn on_interval_boundary(&mut self, grid: &Grid, ledger: &RateLedger, time: f64) {
        if self.is_done() {
            return;
        }
        self.compressor.push(capture(grid, ledger, time));
        self.next += 1;
    }

    /// Records every boundary at or before `until` with the current state.
    pub fn capture_until(&mut self, grid: &Grid, ledger: &RateLedger, until: f64) {
        while let Some(time) = self.next_time() {
            if time > until {
                break;
            }
            self.on_interval_boundary(grid, ledger, time);
        }
    }

    /// Holds the current state for every remaining boundary.
    pub fn fill_remaining(&mut self, grid: &Grid, ledger: &RateLedger) {
        while let Some(time) = self.next_time() {
            self.on_interval_boundary(grid, ledger, time);
        }
    }

    pub fn finish(self) -> RecordedSeries {
        let mut series = RecordedSeries::new(self.n, self.m, self.compress_itv);
        series.snapshots = self.compressor.finish();
        series
    }

    fn boundary_time(&self, k: usize) -> f64 {
        (k as f64 * self.record_itv).min(self.maxtime)
    }
}

fn capture(grid: &Grid, ledger: &RateLedger, time: f64) -> Snapshot {
    let mut snap = Snapshot::with_cells(time, grid.len());
    for (idx, cell) in grid.cells().iter().enumerate() {
        let pi = ledger.payoffs(idx);
        snap.u[idx] = f64::from(cell.u());
        snap.v[idx] = f64::from(cell.v());
        snap.u_pi[idx] = pi.u;
        snap.v_pi[idx] = pi.v;
    }
    snap
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rates::PayoffDriven;

    fn raw(time: f64, u: f64) -> Snapshot {
        let mut s = Snapshot::with_cells(time, 2);
        s.u = vec![u, 2.0 * u];
        s.v_pi = vec![-u, u];
        s
    }

    #[test]
    fn mean_fold_averages_each_quantity() {
        let folded = FoldPolicy::Mean.fold(&[raw(0.0, 1.0), raw(1.0, 3.0)]);
        assert_eq!(folded.time, 0.0);
        assert_eq!(folded.u, vec![2.0, 4.0]);
        assert_eq!(folded.v_pi, vec![-2.0, 2.0]);
    }

    #[test]
    fn last_and_max_folds() {
        let block = [raw(0.0, 5.0), raw(1.0, 3.0)];
        assert_eq!(FoldPolicy::Last.fold(&block).u, vec![3.0, 6.0]);
        let max = FoldPolicy::Max.fold(&block);
        assert_eq!(max.u, vec![5.0, 10.0]);
        assert_eq!(max.v_pi, vec![-3.0, 5.0]);
    }

    #[test]
    fn compressor_folds_partial_tail() {
        let mut c = Compressor::new(3, Box::new(FoldPolicy::Mean));
        for t in 0..7 {
            c.push(raw(t as f64, t as f64));
        }
        assert_eq!(c.emitted(), 2);
        let out = c.finish();
        assert_eq!(out.len(), 3);
        assert_eq!(out.iter().map(|s| s.time).collect::<Vec<_>>(), vec![0.0, 3.0, 6.0]);
        assert_eq!(out[1].u[0], 4.0);
        assert_eq!(out[2].u[0], 6.0);
    }

    #[test]
    fn recorder_fills_every_boundary_once() {
        let params = SimParams::uniform(1, 2, 3.0, 1.0, 1, [2, 1], [0.0; 4], [0.0; 6]);
        let grid = Grid::from_params(&params);
        let ledger = RateLedger::build(&grid, &PayoffDriven, true, 100).unwrap();
        let mut rec = Recorder::new(&params);

        rec.capture_until(&grid, &ledger, 1.5);
        assert_eq!(rec.recorded(), 2);
        assert_eq!(rec.next_time(), Some(2.0));
        rec.capture_until(&grid, &ledger, 1.9);
        assert_eq!(rec.recorded(), 2);
        rec.fill_remaining(&grid, &ledger);
        assert!(rec.is_done());
        rec.on_interval_boundary(&grid, &ledger, 9.0);

        let series = rec.finish();
        assert_eq!(series.len(), params.max_record());
        assert_eq!(series.times(), vec![0.0, 1.0, 2.0, 3.0]);
        assert_eq!(series.snapshots[3].u, vec![2.0, 2.0]);
    }

    #[test]
    fn recorder_applies_compression() {
        let params = SimParams::uniform(1, 2, 9.0, 1.0, 1, [1, 1], [0.0; 4], [0.0; 6])
            .with_compression(4, FoldPolicy::Mean);
        let grid = Grid::from_params(&params);
        let ledger = RateLedger::build(&grid, &PayoffDriven, true, 100).unwrap();
        let mut rec = Recorder::new(&params);
        rec.fill_remaining(&grid, &ledger);
        let series = rec.finish();
        assert_eq!(series.len(), params.compressed_len());
        assert_eq!(series.compress_itv, 4);
        assert_eq!(series.times(), vec![0.0, 4.0, 8.0]);
    }
}
