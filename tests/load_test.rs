// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Load test driver against the fake configuration API.

mod harness;

use harness::fake_api::FakeApi;
use rate_limiter_simulator::config::LoadTestConfig;
use rate_limiter_simulator::metrics::Operation;
use rate_limiter_simulator::LoadTestDriver;
use std::time::Duration;

fn load_config(sessions: usize, workers: usize, rotations: u32) -> LoadTestConfig {
    LoadTestConfig {
        sessions_per_rotation: sessions,
        workers,
        rotation_timeout_secs: 10,
        rotations: Some(rotations),
        drain_timeout_secs: 10,
    }
}

/// Poll until `done` holds or five seconds pass.
async fn eventually(mut done: impl FnMut() -> bool) -> bool {
    for _ in 0..50 {
        if done() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    done()
}

#[tokio::test]
async fn test_rotations_complete_and_leave_no_rules() {
    let api = FakeApi::new();
    let server = harness::serve(&api).await;
    let driver = LoadTestDriver::new(harness::simulator_for(&server), load_config(3, 2, 2));

    driver.run_rotations().await;
    let report = driver.finish().await;

    assert_eq!(report.rotations, 2);
    assert_eq!(report.lifecycles_completed, 6);
    assert_eq!(report.lifecycles_failed, 0);
    assert_eq!(report.lifecycles_abandoned, 0);
    assert_eq!(report.failure_rate, 0.0);
    assert!(report
        .operations
        .contains(&(Operation::RevertRule, 6, 0)));

    assert!(api.rule_ids().is_empty());
    assert!(driver.simulator().registry().is_empty().await);
}

#[tokio::test]
async fn test_single_rotation_report() {
    let api = FakeApi::new();
    let server = harness::serve(&api).await;
    let driver = LoadTestDriver::new(harness::simulator_for(&server), load_config(4, 4, 1));

    let rotation = driver.run_rotation(7).await;

    assert_eq!(rotation.rotation, 7);
    assert_eq!(rotation.completed, 4);
    assert_eq!(rotation.abandoned, 0);
    assert_eq!(api.reorders().len(), 4);
}

#[tokio::test]
async fn test_failed_steps_still_clean_up_sessions() {
    let api = FakeApi::new().fail_deletes();
    let server = harness::serve(&api).await;
    let driver = LoadTestDriver::new(harness::simulator_for(&server), load_config(2, 2, 1));

    driver.run_rotations().await;
    let report = driver.finish().await;

    assert_eq!(report.lifecycles_failed, 2);
    assert!(report.operations.contains(&(Operation::Cleanup, 0, 2)));
    assert!(driver.simulator().registry().is_empty().await);
}

#[tokio::test]
async fn test_abandoned_workers_are_drained_before_sweep() {
    let api = FakeApi::new().with_create_delay(Duration::from_millis(2500));
    let server = harness::serve(&api).await;
    let config = LoadTestConfig {
        rotation_timeout_secs: 1,
        ..load_config(2, 2, 1)
    };
    let driver = LoadTestDriver::new(harness::simulator_for(&server), config);

    let started = std::time::Instant::now();
    driver.run_rotations().await;
    assert!(started.elapsed() < Duration::from_millis(2500));
    // Both rules already exist server side; their creates have not returned.
    assert_eq!(api.rule_ids().len(), 2);

    let report = driver.finish().await;
    assert_eq!(report.lifecycles_abandoned, 2);
    assert_eq!(report.lifecycles_completed, 0);
    assert!(report.operations.contains(&(Operation::Cleanup, 2, 0)));

    assert_eq!(driver.live_workers(), 0);
    assert!(api.rule_ids().is_empty());
    assert!(driver.simulator().registry().is_empty().await);
}

#[tokio::test]
async fn test_rules_created_after_drain_timeout_are_deleted() {
    let api = FakeApi::new().with_create_delay(Duration::from_millis(1500));
    let server = harness::serve(&api).await;
    let config = LoadTestConfig {
        rotation_timeout_secs: 1,
        drain_timeout_secs: 0,
        ..load_config(2, 2, 1)
    };
    let driver = LoadTestDriver::new(harness::simulator_for(&server), config);

    driver.run_rotations().await;
    let report = driver.finish().await;
    assert_eq!(report.lifecycles_abandoned, 2);
    // The sweep ran while both creates were still in flight.
    assert!(driver.simulator().registry().is_empty().await);

    assert!(eventually(|| driver.live_workers() == 0).await);
    assert!(api.rule_ids().is_empty());
    let deletes = api
        .requests()
        .iter()
        .filter(|r| r.method == "DELETE")
        .count();
    assert_eq!(deletes, 2);

    // Late workers do not change a report that has been taken.
    let later = driver.finish().await;
    assert_eq!(later.total_operations, report.total_operations);
}

#[tokio::test]
async fn test_interrupted_run_leaves_no_rules() {
    let api = FakeApi::new().with_create_delay(Duration::from_millis(1000));
    let server = harness::serve(&api).await;
    let config = LoadTestConfig {
        rotations: None,
        ..load_config(3, 2, 1)
    };
    let driver = LoadTestDriver::new(harness::simulator_for(&server), config);

    let interrupted =
        tokio::time::timeout(Duration::from_millis(300), driver.run_rotations()).await;
    assert!(interrupted.is_err());

    let report = driver.finish().await;
    assert_eq!(report.rotations, 0);
    // The third worker was still queued for a permit and never started.
    assert!(report.operations.contains(&(Operation::CreateRule, 2, 0)));
    assert!(report.operations.contains(&(Operation::Cleanup, 2, 0)));

    assert_eq!(driver.live_workers(), 0);
    assert!(api.rule_ids().is_empty());
    assert_eq!(api.requests().iter().filter(|r| r.method == "POST").count(), 2);
    assert!(driver.simulator().registry().is_empty().await);
}
