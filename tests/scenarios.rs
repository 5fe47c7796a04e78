use spatial_game_sim::{
    FoldPolicy, Orchestrator, OverflowKind, Quantity, ReplicateStatus, SimParams, SimulationResult,
};

fn run(params: SimParams) -> SimulationResult {
    Orchestrator::new(params).expect("valid params").run().expect("run completes")
}

fn minimal_grid() -> SimParams {
    let mut params = SimParams::uniform(2, 1, 10.0, 1.0, 1, [0, 0], [0.0; 4], [1.0, 1.0, 0.0, 0.0, 0.0, 0.0])
        .with_boundary(false)
        .with_seed(2024);
    params.initial[0] = [3, 3];
    params
}

#[test]
fn minimal_grid_only_redistributes_population() {
    let result = run(minimal_grid());
    assert_eq!(result.max_record, 11);
    let replicate = &result.replicates[0];
    assert_eq!(replicate.status, ReplicateStatus::ReachedMaxtime);
    assert!(replicate.events > 0);

    let series = &replicate.series;
    assert_eq!(series.len(), 11);
    let times = series.times();
    assert_eq!(times[0], 0.0);
    assert_eq!(&times[1..], &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0]);
    for snap in &series.snapshots {
        assert_eq!(snap.total_u(), 3.0);
        assert_eq!(snap.total_v(), 3.0);
        assert!(snap.u_pi.iter().chain(&snap.v_pi).all(|&pi| pi == 0.0));
    }
    // Migration actually moved someone into the empty cell at some point.
    let u1 = series.cell_series(Quantity::U, 1, 0).expect("cell inside grid");
    let v1 = series.cell_series(Quantity::V, 1, 0).expect("cell inside grid");
    let moved = u1.iter().chain(&v1).any(|&x| x > 0.0);
    assert!(moved);
}

#[test]
fn harsh_death_reaches_absorbing_state_before_maxtime() {
    let mut params = SimParams::uniform(1, 2, 50.0, 0.5, 3, [5, 5], [-1.0; 4], [0.0, 0.0, 0.0, 0.0, 2.0, 2.0])
        .with_seed(7);
    params.initial[1] = [4, 2];
    let result = run(params);

    for replicate in &result.replicates {
        let ReplicateStatus::Absorbed { at } = replicate.status else {
            panic!("replicate {} ended as {:?}", replicate.index, replicate.status);
        };
        assert!(at < 50.0);
        assert_eq!(replicate.series.len(), result.max_record);
        for snap in replicate.series.snapshots.iter().filter(|s| s.time > at) {
            assert!(snap.u.iter().chain(&snap.v).all(|&x| x == 0.0));
        }
        let last = replicate.series.last().expect("series filled to maxtime");
        assert_eq!(last.time, 50.0);
    }
}

fn runaway_growth(check_overflow: bool) -> SimParams {
    let mut params = SimParams::uniform(1, 2, 100.0, 0.1, 2, [2, 2], [1.0, 0.0, 0.0, -1.0], [0.1, 0.1, 800.0, 800.0, 0.0, 0.0])
        .with_seed(99);
    params.check_overflow = check_overflow;
    params
}

#[test]
fn overflow_guard_aborts_with_partial_series() {
    let params = runaway_growth(true);
    let max_record = params.max_record();
    let result = run(params);

    assert_eq!(result.aborted().count(), 2);
    for replicate in &result.replicates {
        let ReplicateStatus::Aborted { reason, at } = &replicate.status else {
            panic!("expected abort, got {:?}", replicate.status);
        };
        assert!(matches!(reason, OverflowKind::PayoffExponent { exponent, .. } if *exponent > 700.0));
        assert!(*at > 0.0 && *at < 100.0);
        assert!(!replicate.series.is_empty());
        assert!(replicate.series.len() < max_record);
        assert!(replicate.series.snapshots.iter().all(|s| s.u.iter().all(|x| x.is_finite())));
    }
}

#[test]
fn overflow_without_guard_is_still_reported() {
    let result = run(runaway_growth(false));
    for replicate in &result.replicates {
        assert!(replicate.status.is_aborted(), "got {:?}", replicate.status);
    }
}

#[test]
fn same_master_seed_reproduces_every_replicate() {
    let mut params = SimParams::uniform(3, 3, 20.0, 1.0, 4, [10, 10], [-0.1, 0.4, 0.0, 0.2], [0.5, 0.5, 2.0, 2.0, 0.01, 0.01])
        .with_seed(36);
    params.payoff[4] = [0.1, 0.6, 0.2, 0.4];

    let sequential = run(SimParams { threads: Some(1), ..params.clone() });
    let parallel = run(SimParams { threads: Some(4), ..params.clone() });
    assert_eq!(sequential.master_seed, parallel.master_seed);
    assert_eq!(sequential.replicates, parallel.replicates);

    let reseeded = run(params.with_seed(37));
    assert_ne!(sequential.replicates[0].series, reseeded.replicates[0].series);
}

#[test]
fn recorded_counts_are_non_negative_and_times_increase() {
    let params = SimParams::uniform(2, 3, 15.0, 0.5, 3, [8, 6], [0.3, -0.2, 0.5, -0.4], [0.4, 0.6, 1.0, -1.0, 0.05, 0.05])
        .with_seed(5);
    let result = run(params);
    for replicate in &result.replicates {
        let times = replicate.series.times();
        assert!(times.windows(2).all(|w| w[0] < w[1]));
        assert!(times.iter().all(|&t| t <= 15.0));
        for snap in &replicate.series.snapshots {
            assert!(snap.u.iter().chain(&snap.v).all(|&x| x >= 0.0));
        }
    }
}

#[test]
fn compression_folds_series_without_touching_dynamics() {
    let base = SimParams::uniform(2, 2, 12.0, 1.0, 2, [6, 6], [0.2, 0.1, 0.1, 0.2], [0.5, 0.5, 1.0, 1.0, 0.02, 0.02])
        .with_seed(11);
    let raw = run(base.clone());
    let folded = run(base.with_compression(4, FoldPolicy::Mean));

    assert_eq!(folded.compress_itv, 4);
    assert_eq!(folded.max_record, raw.max_record);
    for (r, f) in raw.replicates.iter().zip(&folded.replicates) {
        assert_eq!(r.events, f.events);
        assert_eq!(f.series.len(), 4);
        let block = &r.series.snapshots[4..8];
        let mean_u0 = block.iter().map(|s| s.u[0]).sum::<f64>() / 4.0;
        assert!((f.series.snapshots[1].u[0] - mean_u0).abs() < 1e-12);
        assert_eq!(f.series.snapshots[3].u, r.series.snapshots[12].u);
    }
}
