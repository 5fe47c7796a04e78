//! Replicate execution and fan-out over a rayon pool.

use crate::error::SimulationError;
use crate::rates::{PayoffDriven, RateModel};
use crate::simulation::Simulation;
use log::{debug, info, warn};
use rand::prelude::*;
use rand::rngs::StdRng;
use rayon::prelude::*;
use spatial_game_common::{RecordedSeries, ReplicateResult, ReplicateStatus, SimParams, SimulationResult};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Runs one replicate from fresh initial state to a terminal state.
pub fn run_replicate<R: RateModel>(params: &SimParams, model: &R, index: usize, seed: u64) -> ReplicateResult {
    let mut sim = match Simulation::new(params, model, seed) {
        Ok(sim) => sim,
        Err(reason) => {
            warn!("Replicate {} aborted during initialisation: {}", index, reason);
            return ReplicateResult {
                index,
                seed,
                status: ReplicateStatus::Aborted { reason, at: 0.0 },
                events: 0,
                final_time: 0.0,
                series: RecordedSeries::new(params.n, params.m, params.compress_itv),
            };
        }
    };

    let status = sim.run().status().unwrap_or(ReplicateStatus::ReachedMaxtime);
    let clock = sim.clock();
    debug!(
        "Replicate {} finished: {:?} after {} events (t = {:.4})",
        index, status, clock.events, clock.time
    );
    ReplicateResult {
        index,
        seed,
        status,
        events: clock.events,
        final_time: clock.time,
        series: sim.into_series(),
    }
}

/// Per-replicate seeds drawn in order from the master seed, so a replicate's
/// trajectory does not depend on which worker runs it or when.
pub fn derive_seeds(master_seed: u64, count: usize) -> Vec<u64> {
    let mut rng = StdRng::seed_from_u64(master_seed);
    (0..count).map(|_| rng.random::<u64>()).collect()
}

/// Shared flag for stopping a run early. Replicates already running finish;
/// those not yet started are reported as cancelled.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Runs `sim_time` independent replicates and collects their series.
pub struct Orchestrator<R: RateModel = PayoffDriven> {
    params: SimParams,
    model: R,
    cancel: CancelToken,
}

impl Orchestrator<PayoffDriven> {
    /// Validates `params`; nothing is run if they are invalid.
    pub fn new(params: SimParams) -> Result<Self, SimulationError> {
        Self::with_model(params, PayoffDriven)
    }
}

impl<R: RateModel> Orchestrator<R> {
    pub fn with_model(params: SimParams, model: R) -> Result<Self, SimulationError> {
        params.validate()?;
        Ok(Orchestrator { params, model, cancel: CancelToken::new() })
    }

    pub fn params(&self) -> &SimParams {
        &self.params
    }

    /// Shares an existing token, e.g. one held by a signal handler.
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    /// Handle that can cancel this orchestrator from another thread.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn run(&self) -> Result<SimulationResult, SimulationError> {
        let master_seed = self.params.seed.unwrap_or_else(|| {
            let seed = rand::rng().random::<u64>();
            info!("No seed configured; drew master seed {} from entropy.", seed);
            seed
        });
        let seeds = derive_seeds(master_seed, self.params.sim_time);

        let replicates = match self.params.threads {
            Some(threads) => {
                let pool = rayon::ThreadPoolBuilder::new().num_threads(threads).build()?;
                pool.install(|| self.run_all(&seeds))
            }
            None => self.run_all(&seeds),
        };

        let mut result = SimulationResult::new(self.params.clone(), master_seed);
        for replicate in replicates {
            result.push(replicate);
        }
        Ok(result)
    }

    fn run_all(&self, seeds: &[u64]) -> Vec<ReplicateResult> {
        let sim_time = self.params.sim_time;
        info!(
            "Running {} replicates on {} threads ({}x{} grid, maxtime {}).",
            sim_time,
            rayon::current_num_threads(),
            self.params.n,
            self.params.m,
            self.params.maxtime
        );
        let start_time = Instant::now();
        let progress = Progress::new(sim_time, self.params.print_pct);

        let replicates: Vec<ReplicateResult> = seeds
            .par_iter()
            .enumerate()
            .map(|(index, &seed)| {
                if self.cancel.is_cancelled() {
                    return cancelled(&self.params, index, seed);
                }
                let replicate = run_replicate(&self.params, &self.model, index, seed);
                progress.tick();
                replicate
            })
            .collect();

        let aborted = replicates.iter().filter(|r| r.status.is_aborted()).count();
        let skipped = replicates.iter().filter(|r| r.status == ReplicateStatus::Cancelled).count();
        info!(
            "Finished {} replicates in {:.3} seconds ({} aborted, {} cancelled).",
            sim_time - skipped,
            start_time.elapsed().as_secs_f64(),
            aborted,
            skipped
        );
        replicates
    }
}

fn cancelled(params: &SimParams, index: usize, seed: u64) -> ReplicateResult {
    ReplicateResult {
        index,
        seed,
        status: ReplicateStatus::Cancelled,
        events: 0,
        final_time: 0.0,
        series: RecordedSeries::new(params.n, params.m, params.compress_itv),
    }
}

// Logs completion each time another `pct` percent of replicates is done.
struct Progress {
    total: usize,
    pct: Option<u32>,
    done: AtomicUsize,
}

impl Progress {
    fn new(total: usize, pct: Option<u32>) -> Self {
        Progress { total, pct, done: AtomicUsize::new(0) }
    }

    fn tick(&self) {
        let done = self.done.fetch_add(1, Ordering::Relaxed) + 1;
        let Some(pct) = self.pct else { return };
        let step = pct as usize;
        let before = (done - 1) * 100 / self.total / step;
        let now = done * 100 / self.total / step;
        if now > before {
            info!("Progress: {}% ({}/{} replicates)", done * 100 / self.total, done, self.total);
        }
    }
}
