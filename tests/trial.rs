//! End-to-end trials through the public API

use ecdc_sim::erasure::{ChunkPlacement, ErasureCodeConfig};
use ecdc_sim::simulation::{Event, EventKind, FailureModel, Lifetime};
use ecdc_sim::storage::DeviceState;
use ecdc_sim::{BatchRunner, SimConfig, Simulator};

/// Lifetimes long enough that nothing happens on its own
fn quiet() -> FailureModel {
    FailureModel::constant(1.0e9)
}

/// 9 racks x 1 node x 1 disk with RS(9, 6): every stripe spans every disk
fn single_disk_racks() -> SimConfig {
    let mut config = SimConfig::default();
    config.datacenter.racks = 9;
    config.datacenter.nodes_per_rack = 1;
    config.datacenter.stripes = 4;
    config.datacenter.mission_time = 1000.0;
    config.failures = quiet();
    config
}

fn lrc_16_12() -> ErasureCodeConfig {
    ErasureCodeConfig::lrc(
        16,
        12,
        vec![(0..6).collect(), (6..12).collect()],
        vec![12, 13],
        vec![14, 15],
    )
}

#[test]
fn test_failures_within_tolerance_survive() {
    let mut simulator = Simulator::new(&single_disk_racks()).unwrap();
    simulator.reset(0).unwrap();
    simulator
        .engine_mut()
        .schedule(Event::new(1.0, EventKind::DiskFail, vec![0, 1, 2]));

    let result = simulator.run_reset_trial(0);
    assert!(!result.data_loss);
    assert_eq!(result.end_time, 1000.0);

    // every queued repair ran and gave its bandwidth back
    let ctx = simulator.context();
    assert_eq!(ctx.cluster.failed_disk_count(), 0);
    assert_eq!(ctx.network.avail_cross_rack(), 125.0);
    assert_eq!(simulator.engine().repairs().waiting(), 0);
}

#[test]
fn test_failure_beyond_tolerance_loses_data() {
    let mut simulator = Simulator::new(&single_disk_racks()).unwrap();
    simulator.reset(0).unwrap();
    simulator
        .engine_mut()
        .schedule(Event::new(1.0, EventKind::DiskFail, vec![0, 1, 2, 3]));

    let result = simulator.run_reset_trial(0);
    assert!(result.data_loss);
    assert_eq!(result.end_time, 1.0);
    assert_eq!(result.failed_stripes, 4);
    assert_eq!(result.lost_chunks, 16);
}

#[test]
fn test_repairs_restore_disks_one_at_a_time() {
    let mut simulator = Simulator::new(&single_disk_racks()).unwrap();
    simulator.reset(0).unwrap();
    simulator
        .engine_mut()
        .schedule(Event::new(1.0, EventKind::DiskFail, vec![4, 5]));

    let outcome = simulator.step(0.0);
    assert_eq!(outcome.kind, EventKind::DiskFail);
    let now = outcome.time;
    assert_eq!(simulator.engine().repairs().waiting(), 1);

    // 4 stripes x 6 cross-rack reads of 256 MB at 125 MB/s
    let expected = 4.0 * 6.0 * 256.0 / 125.0 / 3600.0;
    let outcome = simulator.step(now);
    assert_eq!(outcome.kind, EventKind::DiskRepair);
    assert!((outcome.time - (1.0 + expected)).abs() < 1e-9);

    let outcome = simulator.step(outcome.time);
    assert_eq!(outcome.kind, EventKind::DiskRepair);
    assert!((outcome.time - (1.0 + 2.0 * expected)).abs() < 1e-9);

    let ctx = simulator.context();
    assert_eq!(ctx.cluster.disk_state(4), Some(DeviceState::Normal));
    assert_eq!(ctx.cluster.disk_state(5), Some(DeviceState::Normal));
}

#[test]
fn test_disabled_network_repairs_in_parallel() {
    let mut config = single_disk_racks();
    config.network.enabled = false;
    let mut simulator = Simulator::new(&config).unwrap();
    simulator.reset(0).unwrap();
    simulator
        .engine_mut()
        .schedule(Event::new(1.0, EventKind::DiskFail, vec![4, 5]));

    let result = simulator.run_reset_trial(0);
    assert!(!result.data_loss);
    assert_eq!(simulator.engine().repairs().waiting(), 0);
    assert_eq!(simulator.engine().repair_stats().jobs, 2);
}

#[test]
fn test_transient_outages_set_blocked_ratio() {
    let mut config = single_disk_racks();
    config.running.enable_transient_failure = true;
    config.failures.node_transient_fail = Lifetime::constant(100.0);
    config.failures.node_transient_repair = Lifetime::constant(10.0);

    let mut simulator = Simulator::new(&config).unwrap();
    let result = simulator.run_trial(0).unwrap();

    // down for [100, 110], [210, 220], ... [980, 990]
    assert!(!result.data_loss);
    assert!((result.blocked_ratio - 0.09).abs() < 1e-9);
}

#[test]
fn test_reference_topology_trial() {
    let mut config = SimConfig::default();
    config.datacenter.stripes = 5_000;
    let mut simulator = Simulator::new(&config).unwrap();
    let result = simulator.run_trial(0).unwrap();

    assert!((0.0..=1.0).contains(&result.blocked_ratio));
    assert!((0.0..=1.0).contains(&result.single_chunk_repair_ratio));
    assert!(result.end_time <= 87_600.0);
    if !result.data_loss {
        assert_eq!(result.end_time, 87_600.0);
    }
}

#[test]
fn test_lrc_hierarchical_trial() {
    let mut config = SimConfig::default();
    config.datacenter.racks = 8;
    config.datacenter.nodes_per_rack = 4;
    config.datacenter.stripes = 500;
    config.erasure_code = lrc_16_12().with_placement(ChunkPlacement::Hierarchical);
    config.running.enable_transient_failure = true;

    let mut simulator = Simulator::new(&config).unwrap();
    let first = simulator.run_trial(7).unwrap();
    let again = simulator.run_trial(7).unwrap();
    assert_eq!(first, again);
    assert!((0.0..=1.0).contains(&first.blocked_ratio));
}

#[test]
fn test_config_file_drives_a_trial() {
    let config = SimConfig::parse(
        r#"
        [datacenter]
        racks = 12
        nodes_per_rack = 4
        stripes = 300
        mission_time = 20000.0

        [erasure_code]
        code_type = "rs"
        n = 9
        k = 6

        [failures.disk_fail]
        kind = "weibull"
        shape = 1.12
        scale = 87600.0

        [batch]
        trials = 3
        workers = 1
        seed = 7
        "#,
    )
    .unwrap();

    let mut simulator = Simulator::new(&config).unwrap();
    let result = simulator.run_trial(0).unwrap();
    assert!(result.end_time <= 20_000.0);
}

#[tokio::test]
async fn test_batch_is_reproducible_across_runs() {
    let mut config = SimConfig::default();
    config.datacenter.racks = 10;
    config.datacenter.nodes_per_rack = 3;
    config.datacenter.stripes = 200;
    config.batch.trials = 8;
    config.batch.workers = 3;
    config.batch.seed = 99;

    let (a, results_a) = BatchRunner::new(config.clone()).unwrap().run(None).await.unwrap();
    let (b, results_b) = BatchRunner::new(config).unwrap().run(None).await.unwrap();
    assert_eq!(a, b);
    assert_eq!(results_a, results_b);
    assert_eq!(a.trials, 8);
    assert!((0.0..=1.0).contains(&a.loss_probability()));
}
