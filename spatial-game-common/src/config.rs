use serde::{Deserialize, Serialize};
use anyhow::Result;
use crate::error::ConfigError;
use crate::sim_params::{flatten, FoldPolicy, SimParams, DEFAULT_RESUM_INTERVAL};
use std::path::Path;

// Grid dimensions and edge behaviour
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct GridConfig {
    pub n: usize,
    pub m: usize,
    /// `true` = bounded edges, `false` = periodic wrap-around.
    #[serde(default = "default_boundary")]
    pub boundary: bool,
}

// Simulated-time horizon and recording
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct TimingConfig {
    pub maxtime: f64,
    pub record_itv: f64,
    #[serde(default)]
    pub compress_itv: Option<usize>,
    #[serde(default)]
    pub fold: FoldPolicy,
}

// Replicate count, seeding and execution
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct RunConfig {
    pub sim_time: usize,
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default = "default_check_overflow")]
    pub check_overflow: bool,
    #[serde(default)]
    pub print_pct: Option<u32>,
    #[serde(default)]
    pub threads: Option<usize>,
    #[serde(default)]
    pub resum_interval: Option<u64>,
}

/// Values applied to every cell unless a `[grids]` table or a `[[cell]]`
/// entry says otherwise.
#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct CellDefaults {
    #[serde(default)]
    pub initial: Option<[u32; 2]>,
    #[serde(default)]
    pub payoff: Option<[f64; 4]>,
    #[serde(default)]
    pub params: Option<[f64; 6]>,
}

/// Full per-cell tables, `n` rows of `m` entries each.
#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct CellGrids {
    #[serde(default)]
    pub initial: Option<Vec<Vec<[u32; 2]>>>,
    #[serde(default)]
    pub payoff: Option<Vec<Vec<[f64; 4]>>>,
    #[serde(default)]
    pub params: Option<Vec<Vec<[f64; 6]>>>,
}

/// Per-cell override, e.g. a single patch with a different payoff matrix.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct CellOverride {
    pub row: usize,
    pub col: usize,
    #[serde(default)]
    pub initial: Option<[u32; 2]>,
    #[serde(default)]
    pub payoff: Option<[f64; 4]>,
    #[serde(default)]
    pub params: Option<[f64; 6]>,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct OutputConfig {
    pub base_filename: String,
    #[serde(default = "default_save_result")]
    pub save_result: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        OutputConfig {
            base_filename: "simulation".to_string(),
            save_result: true,
        }
    }
}

fn default_boundary() -> bool {
    true
}

fn default_check_overflow() -> bool {
    true
}

fn default_save_result() -> bool {
    true
}

// Main simulation configuration structure, loaded from config.toml.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct SimulationConfig {
    pub grid: GridConfig,
    pub timing: TimingConfig,
    pub run: RunConfig,
    #[serde(default)]
    pub defaults: CellDefaults,
    #[serde(default)]
    pub grids: CellGrids,
    #[serde(default, rename = "cell")]
    pub cells: Vec<CellOverride>,
    #[serde(default)]
    pub output: OutputConfig,
}

impl SimulationConfig {
    /// Loads the simulation configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();

        let config_str = std::fs::read_to_string(path_ref)
            .map_err(|e| anyhow::anyhow!("Failed to read config file '{}': {}", path_ref.display(), e))?;
        let config = Self::from_toml_str(&config_str)
            .map_err(|e| anyhow::anyhow!("Invalid config '{}': {}", path_ref.display(), e))?;
        Ok(config)
    }

    /// Parses and validates a configuration held in memory.
    pub fn from_toml_str(config_str: &str) -> Result<Self> {
        let config: SimulationConfig = toml::from_str(config_str)?;
        config.get_sim_params()?;
        Ok(config)
    }

    /// Resolves defaults and overrides into per-cell arrays and validates them.
    pub fn get_sim_params(&self) -> Result<SimParams, ConfigError> {
        let (n, m) = (self.grid.n, self.grid.m);
        if n == 0 || m == 0 {
            return Err(ConfigError::EmptyGrid { n, m });
        }

        let (maxtime, record_itv, sim_time) = (self.timing.maxtime, self.timing.record_itv, self.run.sim_time);
        let grids = &self.grids;
        let mut params = match (&grids.initial, &grids.payoff, &grids.params) {
            (Some(initial), Some(payoff), Some(p)) => {
                SimParams::from_grids(n, m, maxtime, record_itv, sim_time, initial, payoff, p)?
            }
            _ => {
                // Tables win over defaults; defaults are only needed for what is missing.
                let mut params = SimParams::uniform(n, m, maxtime, record_itv, sim_time, [0, 0], [0.0; 4], [0.0; 6]);
                params.initial = match &grids.initial {
                    Some(rows) => flatten("I", rows, n, m)?,
                    None => vec![required("initial", self.defaults.initial)?; n * m],
                };
                params.payoff = match &grids.payoff {
                    Some(rows) => flatten("X", rows, n, m)?,
                    None => vec![required("payoff", self.defaults.payoff)?; n * m],
                };
                params.params = match &grids.params {
                    Some(rows) => flatten("P", rows, n, m)?,
                    None => vec![required("params", self.defaults.params)?; n * m],
                };
                params
            }
        };
        params.boundary = self.grid.boundary;
        params.seed = self.run.seed;
        params.check_overflow = self.run.check_overflow;
        params.print_pct = self.run.print_pct;
        params.compress_itv = self.timing.compress_itv.unwrap_or(1);
        params.fold = self.timing.fold;
        params.threads = self.run.threads;
        params.resum_interval = self.run.resum_interval.unwrap_or(DEFAULT_RESUM_INTERVAL);

        for cell in &self.cells {
            if cell.row >= n || cell.col >= m {
                return Err(ConfigError::CellOutOfRange { row: cell.row, col: cell.col, n, m });
            }
            let idx = cell.row * m + cell.col;
            if let Some(initial) = cell.initial {
                params.initial[idx] = initial;
            }
            if let Some(payoff) = cell.payoff {
                params.payoff[idx] = payoff;
            }
            if let Some(p) = cell.params {
                params.params[idx] = p;
            }
        }

        params.validate()?;
        Ok(params)
    }
}

fn required<T>(field: &'static str, value: Option<T>) -> Result<T, ConfigError> {
    value.ok_or(ConfigError::MissingCellValues { field })
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = r#"
        [grid]
        n = 2
        m = 3
        boundary = false

        [timing]
        maxtime = 50
        record_itv = 0.5
        compress_itv = 5
        fold = "last"

        [run]
        sim_time = 4
        seed = 36
        print_pct = 25

        [defaults]
        initial = [40, 20]
        payoff = [-0.1, 0.4, 0, 0.2]
        params = [0.5, 0.5, 100, 100, 0.001, 0.001]

        [[cell]]
        row = 1
        col = 2
        payoff = [0.1, 0.6, 0.2, 0.4]
    "#;

    #[test]
    fn parses_defaults_and_overrides() {
        let config = SimulationConfig::from_toml_str(BASE).unwrap();
        let params = config.get_sim_params().unwrap();
        assert_eq!(params.num_cells(), 6);
        assert!(!params.boundary);
        assert!(params.check_overflow);
        assert_eq!(params.seed, Some(36));
        assert_eq!(params.compress_itv, 5);
        assert_eq!(params.fold, FoldPolicy::Last);
        assert_eq!(params.payoff[0], [-0.1, 0.4, 0.0, 0.2]);
        assert_eq!(params.payoff[5], [0.1, 0.6, 0.2, 0.4]);
        assert_eq!(params.initial[5], [40, 20]);
        assert_eq!(config.output.base_filename, "simulation");
    }

    #[test]
    fn rejects_override_outside_grid() {
        let text = BASE.replace("row = 1", "row = 7");
        let config: SimulationConfig = toml::from_str(&text).unwrap();
        assert_eq!(
            config.get_sim_params(),
            Err(ConfigError::CellOutOfRange { row: 7, col: 2, n: 2, m: 3 })
        );
    }

    #[test]
    fn validation_errors_surface_through_loading() {
        let text = BASE.replace("sim_time = 4", "sim_time = 0");
        let err = SimulationConfig::from_toml_str(&text).unwrap_err();
        assert_eq!(err.downcast_ref::<ConfigError>(), Some(&ConfigError::NoReplicates));
    }

    const TABLES: &str = r#"
        [grid]
        n = 2
        m = 2

        [timing]
        maxtime = 10
        record_itv = 1

        [run]
        sim_time = 1

        [grids]
        initial = [[[3, 3], [0, 0]], [[1, 2], [4, 0]]]
        payoff = [[[0, 0, 0, 0], [1, 0, 0, 1]], [[0, 0, 0, 0], [0, 0, 0, 0]]]
        params = [
            [[1, 1, 0, 0, 0, 0], [1, 1, 0, 0, 0, 0]],
            [[1, 1, 0, 0, 0, 0], [0.5, 0.5, 2, 2, 0.1, 0.1]],
        ]

        [[cell]]
        row = 0
        col = 1
        initial = [5, 5]
    "#;

    #[test]
    fn parses_full_tables_without_defaults() {
        let config = SimulationConfig::from_toml_str(TABLES).unwrap();
        let params = config.get_sim_params().unwrap();
        assert_eq!(params.initial, vec![[3, 3], [5, 5], [1, 2], [4, 0]]);
        assert_eq!(params.payoff[1], [1.0, 0.0, 0.0, 1.0]);
        assert_eq!(params.params[3], [0.5, 0.5, 2.0, 2.0, 0.1, 0.1]);
    }

    #[test]
    fn tables_and_defaults_mix() {
        let text = TABLES
            .replace("payoff = [[[0, 0, 0, 0], [1, 0, 0, 1]], [[0, 0, 0, 0], [0, 0, 0, 0]]]", "")
            .replace("[grids]", "[defaults]\npayoff = [0.5, 0.5, 0.5, 0.5]\n\n[grids]");
        let params = SimulationConfig::from_toml_str(&text).unwrap().get_sim_params().unwrap();
        assert_eq!(params.payoff, vec![[0.5; 4]; 4]);
        assert_eq!(params.initial[2], [1, 2]);
    }

    #[test]
    fn rejects_table_row_of_wrong_length() {
        let text = TABLES.replace("[[1, 2], [4, 0]]]", "[[1, 2]]]");
        let config: SimulationConfig = toml::from_str(&text).unwrap();
        assert_eq!(
            config.get_sim_params(),
            Err(ConfigError::ShapeMismatch { field: "I", expected: 2, found: 1 })
        );
    }

    #[test]
    fn rejects_table_with_wrong_row_count() {
        let text = TABLES.replace(
            "payoff = [[[0, 0, 0, 0], [1, 0, 0, 1]], [[0, 0, 0, 0], [0, 0, 0, 0]]]",
            "payoff = [[[0, 0, 0, 0], [1, 0, 0, 1]]]",
        );
        let config: SimulationConfig = toml::from_str(&text).unwrap();
        assert_eq!(
            config.get_sim_params(),
            Err(ConfigError::ShapeMismatch { field: "X", expected: 2, found: 1 })
        );
    }

    #[test]
    fn missing_values_without_table_or_default() {
        let text = TABLES.replace("[grids]", "[unused]");
        let config: SimulationConfig = toml::from_str(&text).unwrap();
        assert_eq!(config.get_sim_params(), Err(ConfigError::MissingCellValues { field: "initial" }));
    }
}
