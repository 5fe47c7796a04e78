//! Lattice topology: flat row-major cell indices and precomputed neighbor
//! tables for bounded or periodic edges.

/// Migration directions, in neighbor-slot order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    pub const ALL: [Direction; 4] = [Direction::Up, Direction::Down, Direction::Left, Direction::Right];

    #[inline(always)]
    pub fn slot(self) -> usize {
        self as usize
    }
}

/// Neighbor cell per direction slot; `None` where there is no distinct neighbor.
pub type NeighborSlots = [Option<usize>; 4];

// Calculates the flat cell index for a (row, col) pair
#[inline(always)]
pub fn cell_idx(row: usize, col: usize, m: usize) -> usize {
    row * m + col
}

/// Static adjacency of an `n x m` lattice.
#[derive(Debug, Clone)]
pub struct Topology {
    n: usize,
    m: usize,
    boundary: bool,
    neighbors: Vec<NeighborSlots>,
}

impl Topology {
    pub fn new(n: usize, m: usize, boundary: bool) -> Self {
        let mut neighbors = Vec::with_capacity(n * m);
        for row in 0..n {
            for col in 0..m {
                neighbors.push(build_slots(row, col, n, m, boundary));
            }
        }
        Topology { n, m, boundary, neighbors }
    }

    pub fn n(&self) -> usize {
        self.n
    }

    pub fn m(&self) -> usize {
        self.m
    }

    pub fn boundary(&self) -> bool {
        self.boundary
    }

    pub fn len(&self) -> usize {
        self.neighbors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.neighbors.is_empty()
    }

    #[inline(always)]
    pub fn index(&self, row: usize, col: usize) -> usize {
        cell_idx(row, col, self.m)
    }

    #[inline(always)]
    pub fn coords(&self, idx: usize) -> (usize, usize) {
        (idx / self.m, idx % self.m)
    }

    #[inline(always)]
    pub fn slots(&self, idx: usize) -> &NeighborSlots {
        &self.neighbors[idx]
    }

    #[inline(always)]
    pub fn neighbor(&self, idx: usize, dir: Direction) -> Option<usize> {
        self.neighbors[idx][dir.slot()]
    }

    /// Distinct neighbor cells of `(row, col)`, in slot order.
    pub fn neighbors(&self, row: usize, col: usize) -> Vec<(usize, usize)> {
        self.slots(self.index(row, col))
            .iter()
            .flatten()
            .map(|&nb| self.coords(nb))
            .collect()
    }

    /// Calls `f` for every distinct neighbor index of `idx`.
    #[inline(always)]
    pub fn for_each_neighbor<F: FnMut(usize)>(&self, idx: usize, mut f: F) {
        for nb in self.neighbors[idx].iter().flatten() {
            f(*nb);
        }
    }
}

fn raw_neighbor(row: usize, col: usize, dir: Direction, n: usize, m: usize, boundary: bool) -> Option<(usize, usize)> {
    match dir {
        Direction::Up if row > 0 => Some((row - 1, col)),
        Direction::Up if !boundary => Some((n - 1, col)),
        Direction::Down if row + 1 < n => Some((row + 1, col)),
        Direction::Down if !boundary => Some((0, col)),
        Direction::Left if col > 0 => Some((row, col - 1)),
        Direction::Left if !boundary => Some((row, m - 1)),
        Direction::Right if col + 1 < m => Some((row, col + 1)),
        Direction::Right if !boundary => Some((row, 0)),
        _ => None,
    }
}

// Wrapping on a 1- or 2-wide axis points back at the cell itself or at a
// neighbor already claimed by another slot; both collapse to None.
fn build_slots(row: usize, col: usize, n: usize, m: usize, boundary: bool) -> NeighborSlots {
    let own = cell_idx(row, col, m);
    let mut slots: NeighborSlots = [None; 4];
    for dir in Direction::ALL {
        let Some((r, c)) = raw_neighbor(row, col, dir, n, m, boundary) else {
            continue;
        };
        let idx = cell_idx(r, c, m);
        if idx != own && !slots.contains(&Some(idx)) {
            slots[dir.slot()] = Some(idx);
        }
    }
    slots
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounded_corners_and_edges_have_fewer_neighbors() {
        let topo = Topology::new(3, 4, true);
        assert_eq!(topo.neighbors(0, 0), vec![(1, 0), (0, 1)]);
        assert_eq!(topo.neighbors(2, 3), vec![(1, 3), (2, 2)]);
        assert_eq!(topo.neighbors(0, 2).len(), 3);
        assert_eq!(topo.neighbors(1, 1), vec![(0, 1), (2, 1), (1, 0), (1, 2)]);
    }

    #[test]
    fn periodic_wraps_every_edge() {
        let topo = Topology::new(3, 4, false);
        assert_eq!(topo.neighbors(0, 0), vec![(2, 0), (1, 0), (0, 3), (0, 1)]);
        assert_eq!(topo.neighbor(topo.index(2, 3), Direction::Right), Some(topo.index(2, 0)));
        for idx in 0..topo.len() {
            assert_eq!(topo.slots(idx).iter().flatten().count(), 4);
        }
    }

    #[test]
    fn periodic_single_row_collapses_to_one_dimension() {
        let topo = Topology::new(1, 5, false);
        assert_eq!(topo.neighbors(0, 0), vec![(0, 4), (0, 1)]);
        assert_eq!(topo.neighbor(0, Direction::Up), None);
        assert_eq!(topo.neighbor(0, Direction::Down), None);
    }

    #[test]
    fn periodic_two_cells_share_a_single_link() {
        let topo = Topology::new(2, 1, false);
        assert_eq!(topo.slots(0), &[Some(1), None, None, None]);
        assert_eq!(topo.slots(1), &[Some(0), None, None, None]);

        let topo = Topology::new(1, 2, true);
        assert_eq!(topo.slots(0), &[None, None, None, Some(1)]);
        assert_eq!(topo.slots(1), &[None, None, Some(0), None]);
    }

    #[test]
    fn neighbor_relation_is_symmetric() {
        for boundary in [true, false] {
            let topo = Topology::new(4, 3, boundary);
            for idx in 0..topo.len() {
                topo.for_each_neighbor(idx, |nb| {
                    assert!(topo.slots(nb).contains(&Some(idx)));
                });
            }
        }
    }
}
