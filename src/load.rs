// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Rotating concurrent load test.
//!
//! Each rotation starts a batch of simulated session lifecycles on a fixed
//! worker pool and waits for them until the rotation deadline. Workers that
//! are still running at the deadline are abandoned: their tasks keep
//! running detached and are not counted again.
//!
//! Finishing closes the pool, waits (up to the drain timeout) for every
//! detached worker to wind down and only then sweeps the shared session
//! registry.

use crate::client::RuleVersion;
use crate::config::LoadTestConfig;
use crate::metrics::{LifecycleOutcome, MetricsRecorder, MetricsReport, Operation};
use crate::output;
use crate::rules;
use crate::simulator::Simulator;
use std::future::Future;
use std::pin::pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Notify, Semaphore};
use tracing::{debug, info, warn};

/// Outcome counts for one rotation.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RotationReport {
    pub rotation: u32,
    pub completed: usize,
    pub failed: usize,
    pub abandoned: usize,
}

impl RotationReport {
    fn add(&mut self, outcome: LifecycleOutcome) {
        match outcome {
            LifecycleOutcome::Completed => self.completed += 1,
            LifecycleOutcome::Failed => self.failed += 1,
            LifecycleOutcome::Abandoned => self.abandoned += 1,
        }
    }
}

/// Count of spawned workers whose task has not ended yet.
#[derive(Debug, Default)]
struct LiveWorkers {
    count: AtomicUsize,
    idle: Notify,
}

/// Held by a worker task for its whole life.
struct LiveGuard(Arc<LiveWorkers>);

impl LiveWorkers {
    fn enter(self: &Arc<Self>) -> LiveGuard {
        self.count.fetch_add(1, Ordering::SeqCst);
        LiveGuard(Arc::clone(self))
    }

    fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    /// Wait until no worker is live or the deadline passes. Returns whether
    /// the pool went idle.
    async fn wait_idle(&self, deadline: tokio::time::Instant) -> bool {
        loop {
            let mut notified = pin!(self.idle.notified());
            // Register before checking so a wake-up between the two is kept.
            notified.as_mut().enable();
            if self.count() == 0 {
                return true;
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return self.count() == 0;
            }
        }
    }
}

impl Drop for LiveGuard {
    fn drop(&mut self) {
        if self.0.count.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.0.idle.notify_waiters();
        }
    }
}

/// Drives rotations of concurrent session lifecycles.
pub struct LoadTestDriver {
    simulator: Simulator,
    config: LoadTestConfig,
    /// Shared by all rotations; abandoned workers keep their permit.
    pool: Arc<Semaphore>,
    live: Arc<LiveWorkers>,
    metrics: MetricsRecorder,
}

impl LoadTestDriver {
    pub fn new(simulator: Simulator, config: LoadTestConfig) -> Self {
        let pool = Arc::new(Semaphore::new(config.workers));
        Self {
            simulator,
            config,
            pool,
            live: Arc::new(LiveWorkers::default()),
            metrics: MetricsRecorder::new(),
        }
    }

    /// Worker tasks that have been spawned and not yet ended.
    pub fn live_workers(&self) -> usize {
        self.live.count()
    }

    pub fn simulator(&self) -> &Simulator {
        &self.simulator
    }

    /// Run the configured number of rotations, or forever when unbounded.
    pub async fn run_rotations(&self) {
        self.metrics.start().await;
        info!(
            sessions = self.config.sessions_per_rotation,
            workers = self.config.workers,
            rotation_timeout_secs = self.config.rotation_timeout_secs,
            rotations = ?self.config.rotations,
            "Starting load test"
        );

        let mut rotation = 0u32;
        loop {
            if let Some(max) = self.config.rotations {
                if rotation >= max {
                    break;
                }
            }
            rotation += 1;

            output::heading(format!(
                "\n=== Rotation {}: {} sessions on {} workers ===",
                rotation, self.config.sessions_per_rotation, self.config.workers
            ));
            let report = self.run_rotation(rotation).await;
            output::notice(format!(
                "Rotation {} finished: {} completed, {} failed, {} abandoned",
                report.rotation, report.completed, report.failed, report.abandoned
            ));
        }
    }

    /// Start one batch of lifecycles and wait for them until the deadline.
    pub async fn run_rotation(&self, rotation: u32) -> RotationReport {
        let deadline = tokio::time::Instant::now() + self.config.rotation_timeout();

        let handles: Vec<_> = (0..self.config.sessions_per_rotation)
            .map(|_| {
                let pool = Arc::clone(&self.pool);
                let worker = self.simulator.fork();
                let metrics = self.metrics.clone();
                let guard = self.live.enter();
                tokio::spawn(async move {
                    let _guard = guard;
                    let Ok(_permit) = pool.acquire_owned().await else {
                        return LifecycleOutcome::Failed;
                    };
                    run_lifecycle(worker, &metrics).await
                })
            })
            .collect();

        let mut report = RotationReport {
            rotation,
            ..Default::default()
        };
        for mut handle in handles {
            let outcome = match tokio::time::timeout_at(deadline, &mut handle).await {
                Ok(Ok(outcome)) => outcome,
                Ok(Err(e)) => {
                    warn!(rotation, error = %e, "Session worker did not finish cleanly");
                    LifecycleOutcome::Failed
                }
                // Dropping the handle detaches the task.
                Err(_) => LifecycleOutcome::Abandoned,
            };
            report.add(outcome);
            self.metrics.record_lifecycle(outcome).await;
        }
        self.metrics.record_rotation().await;

        info!(
            rotation,
            completed = report.completed,
            failed = report.failed,
            abandoned = report.abandoned,
            "Rotation finished"
        );
        report
    }

    /// Close the pool, let detached workers wind down, stop the clock,
    /// clean up every session still registered and return the final
    /// report.
    ///
    /// Workers still queued for a permit give up once the pool is closed.
    /// Running ones get up to the drain timeout to finish their own
    /// cleanup before the sweep.
    pub async fn finish(&self) -> MetricsReport {
        self.pool.close();

        let live = self.live.count();
        if live > 0 {
            output::notice(format!("\nWaiting for {} running workers...", live));
            let deadline = tokio::time::Instant::now() + self.config.drain_timeout();
            if !self.live.wait_idle(deadline).await {
                warn!(
                    live = self.live.count(),
                    drain_timeout_secs = self.config.drain_timeout_secs,
                    "Workers still running after drain timeout"
                );
            }
        }

        self.metrics.finish().await;

        let leftover = self.simulator.registry().len().await;
        if leftover > 0 {
            output::notice(format!("\nSweeping {} leftover sessions...", leftover));
            let mut sweeper = self.simulator.fork();
            sweeper.cleanup_all_sessions().await;
        }

        self.metrics.report().await
    }
}

/// One simulated client: create, mutate, revert, reorder, clean up.
async fn run_lifecycle(mut sim: Simulator, metrics: &MetricsRecorder) -> LifecycleOutcome {
    let session_id = sim.create_session().await;
    debug!(session = %session_id, "Lifecycle started");

    let steps_ok = lifecycle_steps(&sim, metrics).await;
    let cleaned = timed(
        metrics,
        Operation::Cleanup,
        sim.cleanup_session(Some(&session_id)),
        |ok| *ok,
    )
    .await;

    if steps_ok && cleaned {
        LifecycleOutcome::Completed
    } else {
        debug!(session = %session_id, steps_ok, cleaned, "Lifecycle failed");
        LifecycleOutcome::Failed
    }
}

async fn lifecycle_steps(sim: &Simulator, metrics: &MetricsRecorder) -> bool {
    let rule = rules::hostname_rate_limit_rule();
    let Some(rule_id) = timed(
        metrics,
        Operation::CreateRule,
        sim.create_rule(&rule),
        Option::is_some,
    )
    .await
    else {
        return false;
    };

    let update = rules::url_update_rule(&rule_id, rule.order);
    if !timed(metrics, Operation::UpdateRule, sim.update_rule(&rule_id, &update), |ok| *ok).await {
        return false;
    }

    let Some(versions) = timed(
        metrics,
        Operation::ListVersions,
        sim.rule_versions(&rule_id),
        Option::is_some,
    )
    .await
    else {
        return false;
    };

    let target = prior_version(&versions);
    if !timed(metrics, Operation::RevertRule, sim.revert_rule(&rule_id, target), |ok| *ok).await {
        return false;
    }

    timed(
        metrics,
        Operation::ReorderRules,
        async {
            let Some(current) = sim.get_rules().await else {
                return false;
            };
            let mut ids: Vec<String> = current.iter().map(|r| r.id().to_string()).collect();
            rules::promote_to_front(&mut ids, &[rule_id.as_str()]);
            sim.reorder_rules(&ids).await
        },
        |ok| *ok,
    )
    .await
}

async fn timed<T>(
    metrics: &MetricsRecorder,
    operation: Operation,
    fut: impl Future<Output = T>,
    succeeded: impl FnOnce(&T) -> bool,
) -> T {
    let start = Instant::now();
    let out = fut.await;
    metrics
        .record(operation, succeeded(&out), start.elapsed())
        .await;
    out
}

/// Version to revert to: the second-highest stored version, or the only
/// one there is. An empty history falls back to version 0.
fn prior_version(versions: &[RuleVersion]) -> u64 {
    let mut numbers: Vec<u64> = versions.iter().map(|v| v.version).collect();
    numbers.sort_unstable();
    numbers.dedup();
    match numbers.len() {
        0 => 0,
        1 => numbers[0],
        n => numbers[n - 2],
    }
}
