use thiserror::Error;

/// Invalid simulation input. Raised before any replicate starts.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("grid dimensions must be positive (got {n}x{m})")]
    EmptyGrid { n: usize, m: usize },

    #[error("a {n}x{m} grid is unsupported; N x M must be at least 2")]
    GridTooSmall { n: usize, m: usize },

    #[error("{field} has shape mismatch: expected {expected}, found {found}")]
    ShapeMismatch {
        field: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("{field} must be positive and finite (got {value})")]
    InvalidTime { field: &'static str, value: f64 },

    #[error("record_itv ({record_itv}) exceeds maxtime ({maxtime})")]
    RecordIntervalExceedsMaxtime { record_itv: f64, maxtime: f64 },

    #[error("sim_time must be at least 1")]
    NoReplicates,

    #[error("compress_itv must be at least 1")]
    ZeroCompression,

    #[error("print_pct must be in 1..=100 (got {0})")]
    InvalidPrintPct(u32),

    #[error("threads must be at least 1")]
    ZeroThreads,

    #[error("resum_interval must be at least 1")]
    ZeroResumInterval,

    #[error("no value for {field}: give a [grids] table or a [defaults] entry")]
    MissingCellValues { field: &'static str },

    #[error("cell ({row}, {col}) is outside the {n}x{m} grid")]
    CellOutOfRange {
        row: usize,
        col: usize,
        n: usize,
        m: usize,
    },

    #[error("cell ({row}, {col}): payoff entry {index} is not finite ({value})")]
    NonFinitePayoff {
        row: usize,
        col: usize,
        index: usize,
        value: f64,
    },

    #[error("cell ({row}, {col}): parameter {name} is invalid ({value})")]
    InvalidParameter {
        row: usize,
        col: usize,
        name: &'static str,
        value: f64,
    },
}
