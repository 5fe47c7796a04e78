use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Position-to-role mapping of the six per-cell parameters.
pub const PARAM_NAMES: [&str; 6] = ["mu_u", "mu_v", "w_u", "w_v", "kappa_u", "kappa_v"];

/// Default number of events between full re-summations of the rate ledger.
pub const DEFAULT_RESUM_INTERVAL: u64 = 100_000;

/// How a block of raw snapshots is folded into one when compressing.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum FoldPolicy {
    #[default]
    Mean,
    Last,
    Max,
}

/// Validated, flattened inputs for one simulation run.
///
/// Per-cell arrays are stored row-major: cell `(row, col)` lives at
/// `row * m + col`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SimParams {
    pub n: usize,
    pub m: usize,
    /// `true` = bounded edges, `false` = periodic wrap-around.
    pub boundary: bool,

    pub maxtime: f64,
    pub record_itv: f64,
    pub sim_time: usize,

    /// Initial `[U, V]` counts per cell.
    pub initial: Vec<[u32; 2]>,
    /// Flattened 2x2 payoff matrix per cell: `[uu, uv, vu, vv]`.
    pub payoff: Vec<[f64; 4]>,
    /// `[mu_u, mu_v, w_u, w_v, kappa_u, kappa_v]` per cell.
    pub params: Vec<[f64; 6]>,

    pub seed: Option<u64>,
    pub check_overflow: bool,
    pub print_pct: Option<u32>,

    /// Raw snapshots folded into each stored snapshot; 1 disables compression.
    pub compress_itv: usize,
    pub fold: FoldPolicy,
    pub threads: Option<usize>,
    pub resum_interval: u64,
}

impl SimParams {
    /// Builds parameters with the same initial counts, payoff matrix and
    /// parameter vector in every cell. Not validated.
    pub fn uniform(
        n: usize,
        m: usize,
        maxtime: f64,
        record_itv: f64,
        sim_time: usize,
        initial: [u32; 2],
        payoff: [f64; 4],
        params: [f64; 6],
    ) -> Self {
        let cells = n * m;
        Self {
            n,
            m,
            boundary: true,
            maxtime,
            record_itv,
            sim_time,
            initial: vec![initial; cells],
            payoff: vec![payoff; cells],
            params: vec![params; cells],
            seed: None,
            check_overflow: true,
            print_pct: None,
            compress_itv: 1,
            fold: FoldPolicy::Mean,
            threads: None,
            resum_interval: DEFAULT_RESUM_INTERVAL,
        }
    }

    /// Builds parameters from nested `N x M` arrays, checking their shapes.
    pub fn from_grids(
        n: usize,
        m: usize,
        maxtime: f64,
        record_itv: f64,
        sim_time: usize,
        initial: &[Vec<[u32; 2]>],
        payoff: &[Vec<[f64; 4]>],
        params: &[Vec<[f64; 6]>],
    ) -> Result<Self, ConfigError> {
        let initial = flatten("I", initial, n, m)?;
        let payoff = flatten("X", payoff, n, m)?;
        let params = flatten("P", params, n, m)?;
        Ok(Self {
            initial,
            payoff,
            params,
            ..Self::uniform(n, m, maxtime, record_itv, sim_time, [0, 0], [0.0; 4], [0.0; 6])
        })
    }

    pub fn with_boundary(mut self, boundary: bool) -> Self {
        self.boundary = boundary;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_compression(mut self, compress_itv: usize, fold: FoldPolicy) -> Self {
        self.compress_itv = compress_itv;
        self.fold = fold;
        self
    }

    pub fn num_cells(&self) -> usize {
        self.n * self.m
    }

    /// Raw snapshot count, `floor(maxtime / record_itv) + 1`, including `t = 0`.
    pub fn max_record(&self) -> usize {
        // Small slack so that e.g. 1.0 / 0.1 does not floor to 9.
        ((self.maxtime / self.record_itv) + 1e-9).floor() as usize + 1
    }

    /// Snapshot count after compression.
    pub fn compressed_len(&self) -> usize {
        let every = self.compress_itv.max(1);
        self.max_record().div_ceil(every)
    }

    /// Checks every constraint on the inputs. Invalid inputs are reported,
    /// never corrected.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let (n, m) = (self.n, self.m);
        if n == 0 || m == 0 {
            return Err(ConfigError::EmptyGrid { n, m });
        }
        if n * m < 2 {
            return Err(ConfigError::GridTooSmall { n, m });
        }
        let cells = n * m;
        check_len("I", self.initial.len(), cells)?;
        check_len("X", self.payoff.len(), cells)?;
        check_len("P", self.params.len(), cells)?;

        for (field, value) in [("maxtime", self.maxtime), ("record_itv", self.record_itv)] {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigError::InvalidTime { field, value });
            }
        }
        if self.record_itv > self.maxtime {
            return Err(ConfigError::RecordIntervalExceedsMaxtime {
                record_itv: self.record_itv,
                maxtime: self.maxtime,
            });
        }
        if self.sim_time == 0 {
            return Err(ConfigError::NoReplicates);
        }
        if self.compress_itv == 0 {
            return Err(ConfigError::ZeroCompression);
        }
        if let Some(pct) = self.print_pct {
            if pct == 0 || pct > 100 {
                return Err(ConfigError::InvalidPrintPct(pct));
            }
        }
        if self.threads == Some(0) {
            return Err(ConfigError::ZeroThreads);
        }
        if self.resum_interval == 0 {
            return Err(ConfigError::ZeroResumInterval);
        }

        for idx in 0..cells {
            let (row, col) = (idx / m, idx % m);
            for (index, &value) in self.payoff[idx].iter().enumerate() {
                if !value.is_finite() {
                    return Err(ConfigError::NonFinitePayoff { row, col, index, value });
                }
            }
            for (pos, &value) in self.params[idx].iter().enumerate() {
                // w_* may be negative (migration away from high payoff); rates may not.
                let is_weight = pos == 2 || pos == 3;
                if !value.is_finite() || (!is_weight && value < 0.0) {
                    return Err(ConfigError::InvalidParameter {
                        row,
                        col,
                        name: PARAM_NAMES[pos],
                        value,
                    });
                }
            }
        }
        Ok(())
    }
}

fn check_len(field: &'static str, found: usize, expected: usize) -> Result<(), ConfigError> {
    if found != expected {
        return Err(ConfigError::ShapeMismatch { field, expected, found });
    }
    Ok(())
}

pub(crate) fn flatten<T: Copy>(
    field: &'static str,
    rows: &[Vec<T>],
    n: usize,
    m: usize,
) -> Result<Vec<T>, ConfigError> {
    check_len(field, rows.len(), n)?;
    let mut flat = Vec::with_capacity(n * m);
    for row in rows {
        check_len(field, row.len(), m)?;
        flat.extend_from_slice(row);
    }
    Ok(flat)
}
