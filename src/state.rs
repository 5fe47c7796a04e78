use spatial_game_common::SimParams;

use crate::grid::Topology;

/// Flattened 2x2 payoff matrix `[uu, uv, vu, vv]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PayoffMatrix(pub [f64; 4]);

impl PayoffMatrix {
    #[inline(always)]
    pub fn uu(&self) -> f64 {
        self.0[0]
    }
    #[inline(always)]
    pub fn uv(&self) -> f64 {
        self.0[1]
    }
    #[inline(always)]
    pub fn vu(&self) -> f64 {
        self.0[2]
    }
    #[inline(always)]
    pub fn vv(&self) -> f64 {
        self.0[3]
    }
}

/// Named view of the six per-cell coefficients.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellParams {
    /// Per-individual migration rate of U / V.
    pub mu_u: f64,
    pub mu_v: f64,
    /// Sensitivity of migration direction to neighbor payoff.
    pub w_u: f64,
    pub w_v: f64,
    /// Crowding (carrying-capacity) death coefficient.
    pub kappa_u: f64,
    pub kappa_v: f64,
}

impl From<[f64; 6]> for CellParams {
    fn from(p: [f64; 6]) -> Self {
        CellParams { mu_u: p[0], mu_v: p[1], w_u: p[2], w_v: p[3], kappa_u: p[4], kappa_v: p[5] }
    }
}

/// One lattice site. Counts change as events fire; payoff matrix and
/// parameters are fixed for the lifetime of a replicate.
#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    u: u32,
    v: u32,
    payoff: PayoffMatrix,
    params: CellParams,
}

impl Cell {
    pub fn new(counts: [u32; 2], payoff: [f64; 4], params: [f64; 6]) -> Self {
        Cell { u: counts[0], v: counts[1], payoff: PayoffMatrix(payoff), params: params.into() }
    }

    #[inline(always)]
    pub fn u(&self) -> u32 {
        self.u
    }

    #[inline(always)]
    pub fn v(&self) -> u32 {
        self.v
    }

    #[inline(always)]
    pub fn payoff(&self) -> &PayoffMatrix {
        &self.payoff
    }

    #[inline(always)]
    pub fn params(&self) -> &CellParams {
        &self.params
    }

    pub fn is_empty(&self) -> bool {
        self.u == 0 && self.v == 0
    }
}

/// Species of an individual.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Species {
    U,
    V,
}

/// Count changes fail only when a population would leave `u32`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CountOverflow {
    pub idx: usize,
}

/// The lattice of cells. Cells are stored contiguously and addressed by
/// index; adjacency comes from the topology, never from stored references.
#[derive(Debug, Clone)]
pub struct Grid {
    topology: Topology,
    cells: Vec<Cell>,
}

impl Grid {
    /// Builds the initial grid of a replicate. `params` must be validated.
    pub fn from_params(params: &SimParams) -> Self {
        let topology = Topology::new(params.n, params.m, params.boundary);
        let cells = (0..params.num_cells())
            .map(|idx| Cell::new(params.initial[idx], params.payoff[idx], params.params[idx]))
            .collect();
        Grid { topology, cells }
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    #[inline(always)]
    pub fn cell(&self, idx: usize) -> &Cell {
        &self.cells[idx]
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn total_population(&self) -> (u64, u64) {
        self.cells
            .iter()
            .fold((0, 0), |(u, v), c| (u + u64::from(c.u), v + u64::from(c.v)))
    }

    pub fn is_extinct(&self) -> bool {
        self.cells.iter().all(Cell::is_empty)
    }

    pub(crate) fn add_one(&mut self, idx: usize, species: Species) -> Result<(), CountOverflow> {
        let cell = &mut self.cells[idx];
        let count = match species {
            Species::U => &mut cell.u,
            Species::V => &mut cell.v,
        };
        *count = count.checked_add(1).ok_or(CountOverflow { idx })?;
        Ok(())
    }

    /// Removes one individual if any is present. Returns whether one was removed.
    pub(crate) fn remove_one(&mut self, idx: usize, species: Species) -> bool {
        let cell = &mut self.cells[idx];
        let count = match species {
            Species::U => &mut cell.u,
            Species::V => &mut cell.v,
        };
        if *count > 0 {
            *count -= 1;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_never_go_negative() {
        let params = SimParams::uniform(1, 2, 1.0, 1.0, 1, [1, 0], [0.0; 4], [0.0; 6]);
        let mut grid = Grid::from_params(&params);
        assert!(grid.remove_one(0, Species::U));
        assert!(!grid.remove_one(0, Species::U));
        assert!(!grid.remove_one(1, Species::V));
        assert_eq!(grid.cell(0).u(), 0);
        assert!(grid.is_extinct());
    }

    #[test]
    fn add_reports_overflow_instead_of_wrapping() {
        let params = SimParams::uniform(1, 2, 1.0, 1.0, 1, [u32::MAX, 0], [0.0; 4], [0.0; 6]);
        let mut grid = Grid::from_params(&params);
        assert!(grid.add_one(1, Species::U).is_ok());
        assert_eq!(grid.add_one(0, Species::U), Err(CountOverflow { idx: 0 }));
        assert_eq!(grid.cell(0).u(), u32::MAX);
    }

    #[test]
    fn parameters_map_by_position() {
        let cell = Cell::new([1, 2], [1.0, 2.0, 3.0, 4.0], [0.1, 0.2, 0.3, 0.4, 0.5, 0.6]);
        assert_eq!(cell.payoff().vu(), 3.0);
        assert_eq!(cell.params().w_v, 0.4);
        assert_eq!(cell.params().kappa_u, 0.5);
    }
}
