use serde::{Serialize, Deserialize};

/// Full-grid state at one recorded time.
///
/// Vectors are indexed row-major by cell. Raw snapshots hold whole counts;
/// compressed snapshots may hold fractional values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Simulated time the snapshot stands for.
    pub time: f64,
    pub u: Vec<f64>,
    pub v: Vec<f64>,
    /// Per-individual payoff of U observed in each cell.
    pub u_pi: Vec<f64>,
    /// Per-individual payoff of V observed in each cell.
    pub v_pi: Vec<f64>,
}

/// The recorded quantities of a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Quantity {
    U,
    V,
    UPayoff,
    VPayoff,
}

impl Snapshot {
    pub fn with_cells(time: f64, cells: usize) -> Self {
        Snapshot {
            time,
            u: vec![0.0; cells],
            v: vec![0.0; cells],
            u_pi: vec![0.0; cells],
            v_pi: vec![0.0; cells],
        }
    }

    pub fn num_cells(&self) -> usize {
        self.u.len()
    }

    pub fn get(&self, quantity: Quantity) -> &[f64] {
        match quantity {
            Quantity::U => &self.u,
            Quantity::V => &self.v,
            Quantity::UPayoff => &self.u_pi,
            Quantity::VPayoff => &self.v_pi,
        }
    }

    pub fn get_mut(&mut self, quantity: Quantity) -> &mut [f64] {
        match quantity {
            Quantity::U => &mut self.u,
            Quantity::V => &mut self.v,
            Quantity::UPayoff => &mut self.u_pi,
            Quantity::VPayoff => &mut self.v_pi,
        }
    }

    pub fn total_u(&self) -> f64 {
        self.u.iter().sum()
    }

    pub fn total_v(&self) -> f64 {
        self.v.iter().sum()
    }
}

impl Quantity {
    pub const ALL: [Quantity; 4] = [Quantity::U, Quantity::V, Quantity::UPayoff, Quantity::VPayoff];
}

/// Time series of snapshots produced by one replicate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedSeries {
    pub n: usize,
    pub m: usize,
    /// Raw snapshots folded into each stored snapshot.
    pub compress_itv: usize,
    pub snapshots: Vec<Snapshot>,
}

impl RecordedSeries {
    pub fn new(n: usize, m: usize, compress_itv: usize) -> Self {
        RecordedSeries { n, m, compress_itv, snapshots: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn times(&self) -> Vec<f64> {
        self.snapshots.iter().map(|s| s.time).collect()
    }

    /// Value of `quantity` in cell `(row, col)` at snapshot `t`.
    pub fn at(&self, quantity: Quantity, row: usize, col: usize, t: usize) -> Option<f64> {
        if row >= self.n || col >= self.m {
            return None;
        }
        self.snapshots.get(t).map(|s| s.get(quantity)[row * self.m + col])
    }

    /// Time series of `quantity` for one cell, or `None` outside the grid.
    pub fn cell_series(&self, quantity: Quantity, row: usize, col: usize) -> Option<Vec<f64>> {
        if row >= self.n || col >= self.m {
            return None;
        }
        Some(self.series_of(quantity, row * self.m + col))
    }

    /// `quantity` as a grid-by-time array: `result[cell][t]`.
    pub fn grid_by_time(&self, quantity: Quantity) -> Vec<Vec<f64>> {
        (0..self.n * self.m).map(|idx| self.series_of(quantity, idx)).collect()
    }

    // Snapshots too short to hold `idx` contribute nothing.
    fn series_of(&self, quantity: Quantity, idx: usize) -> Vec<f64> {
        self.snapshots.iter().filter_map(|s| s.get(quantity).get(idx).copied()).collect()
    }

    pub fn last(&self) -> Option<&Snapshot> {
        self.snapshots.last()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series() -> RecordedSeries {
        let mut series = RecordedSeries::new(1, 2, 1);
        for t in 0..3 {
            let mut s = Snapshot::with_cells(t as f64, 2);
            s.u = vec![t as f64, 10.0 + t as f64];
            s.v_pi = vec![-1.0, 1.0];
            series.snapshots.push(s);
        }
        series
    }

    #[test]
    fn grid_by_time_transposes_snapshots() {
        let grid = series().grid_by_time(Quantity::U);
        assert_eq!(grid, vec![vec![0.0, 1.0, 2.0], vec![10.0, 11.0, 12.0]]);
    }

    #[test]
    fn at_rejects_cells_outside_grid() {
        let s = series();
        assert_eq!(s.at(Quantity::U, 0, 1, 2), Some(12.0));
        assert_eq!(s.at(Quantity::VPayoff, 0, 0, 1), Some(-1.0));
        assert_eq!(s.at(Quantity::U, 1, 0, 0), None);
        assert_eq!(s.at(Quantity::U, 0, 0, 3), None);
    }

    #[test]
    fn cell_series_rejects_cells_outside_grid() {
        let s = series();
        assert_eq!(s.cell_series(Quantity::U, 0, 1), Some(vec![10.0, 11.0, 12.0]));
        assert_eq!(s.cell_series(Quantity::U, 3, 0), None);
        // Would alias cell (1, 0) through the flat index if unchecked.
        assert_eq!(s.cell_series(Quantity::U, 0, 2), None);
    }

    #[test]
    fn grid_by_time_skips_short_snapshots() {
        let mut s = series();
        s.snapshots.push(Snapshot::with_cells(3.0, 1));
        let grid = s.grid_by_time(Quantity::U);
        assert_eq!(grid[0], vec![0.0, 1.0, 2.0, 0.0]);
        assert_eq!(grid[1], vec![10.0, 11.0, 12.0]);
    }
}
