use spatial_game_common::ConfigError;
use thiserror::Error;

/// Errors that stop a whole run. Per-replicate overflow is not one of them;
/// it is reported in that replicate's status.
#[derive(Debug, Error)]
pub enum SimulationError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}
