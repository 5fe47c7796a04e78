use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, error, info, warn};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::time::Instant;

use spatial_game_sim::{Orchestrator, ReplicateStatus, SimulationConfig};

/// Run the two-species spatial game simulation described by a TOML config.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Path to the simulation config.
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Override the master seed from the config.
    #[arg(long)]
    seed: Option<u64>,

    /// Override the number of worker threads.
    #[arg(long)]
    threads: Option<usize>,
}

fn main() -> Result<()> {
    // Initialize the logger
    env_logger::init();
    let args = Args::parse();

    info!("Starting spatial game simulation...");

    // --- Load Configuration ---
    let config = SimulationConfig::load(&args.config)?;
    let mut params = config.get_sim_params()?;
    if let Some(seed) = args.seed {
        params.seed = Some(seed);
    }
    if let Some(threads) = args.threads {
        params.threads = Some(threads);
    }
    debug!("Simulation Parameters: {:#?}", params);
    info!(
        "{}x{} grid, maxtime {}, record_itv {} ({} snapshots per replicate), {} replicates.",
        params.n,
        params.m,
        params.maxtime,
        params.record_itv,
        params.compressed_len(),
        params.sim_time
    );

    // --- Run ---
    let start_time = Instant::now();
    let orchestrator = Orchestrator::new(params)?;
    let result = orchestrator.run()?;
    info!("Simulation finished in {:.3} seconds.", start_time.elapsed().as_secs_f64());

    for replicate in &result.replicates {
        match &replicate.status {
            ReplicateStatus::Aborted { reason, at } => {
                warn!("Replicate {} aborted at t = {:.4}: {}", replicate.index, at, reason);
            }
            ReplicateStatus::Absorbed { at } => {
                info!("Replicate {} reached an absorbing state at t = {:.4}.", replicate.index, at);
            }
            _ => {}
        }
    }

    // --- Save Result ---
    if config.output.save_result {
        let filename = format!("{}_result.json", config.output.base_filename);
        let file = File::create(&filename)
            .with_context(|| format!("Error creating result file '{}'", filename))?;
        let mut writer = BufWriter::new(file);
        if let Err(e) = serde_json::to_writer(&mut writer, &result) {
            error!("Error serializing result to JSON: {}", e);
            anyhow::bail!("Failed to save result.");
        }
        writer.flush()?;
        info!("Result saved to {}", filename);
    } else {
        info!("Skipping saving result as per config (save_result is false).");
    }

    info!("Simulation Complete.");
    Ok(())
}
