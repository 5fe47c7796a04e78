pub mod config;
pub mod error;
pub mod result;
pub mod sim_params;
pub mod snapshot;

// Re-export key types for easier use by dependent crates
pub use config::{SimulationConfig, GridConfig, TimingConfig, RunConfig, CellDefaults, CellOverride, OutputConfig};
pub use error::ConfigError;
pub use result::{OverflowKind, ReplicateResult, ReplicateStatus, SimulationResult};
pub use sim_params::{FoldPolicy, SimParams, PARAM_NAMES};
pub use snapshot::{Quantity, RecordedSeries, Snapshot};
