// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Metrics collection for load test runs.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Number of most recent latency samples kept for percentiles.
pub const LATENCY_WINDOW: usize = 10_000;

/// API operations timed during a session lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Operation {
    CreateRule,
    UpdateRule,
    ListVersions,
    RevertRule,
    ReorderRules,
    Cleanup,
}

impl Operation {
    pub const ALL: [Operation; 6] = [
        Operation::CreateRule,
        Operation::UpdateRule,
        Operation::ListVersions,
        Operation::RevertRule,
        Operation::ReorderRules,
        Operation::Cleanup,
    ];
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CreateRule => write!(f, "create rule"),
            Self::UpdateRule => write!(f, "update rule"),
            Self::ListVersions => write!(f, "list versions"),
            Self::RevertRule => write!(f, "revert rule"),
            Self::ReorderRules => write!(f, "reorder rules"),
            Self::Cleanup => write!(f, "cleanup"),
        }
    }
}

/// How a session lifecycle ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleOutcome {
    /// Every step succeeded
    Completed,
    /// A step failed; cleanup still ran
    Failed,
    /// Still running at the rotation deadline
    Abandoned,
}

#[derive(Debug, Default, Clone, Copy)]
struct OperationCounts {
    succeeded: usize,
    failed: usize,
}

/// Collects metrics during a load test.
///
/// Samples arriving after [`finish`](Self::finish) are ignored.
#[derive(Debug, Default)]
pub struct LoadMetrics {
    start_time: Option<Instant>,
    end_time: Option<Instant>,
    rotations: usize,
    operations: HashMap<Operation, OperationCounts>,
    lifecycles: HashMap<LifecycleOutcome, usize>,
    /// Most recent latency samples (microseconds), at most `LATENCY_WINDOW`
    latencies: VecDeque<u64>,
}

impl LoadMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&mut self) {
        self.start_time = Some(Instant::now());
    }

    /// Stop the clock. Later calls keep the first end time.
    pub fn finish(&mut self) {
        if self.end_time.is_none() {
            self.end_time = Some(Instant::now());
        }
    }

    pub fn is_finished(&self) -> bool {
        self.end_time.is_some()
    }

    pub fn record_rotation(&mut self) {
        if self.is_finished() {
            return;
        }
        self.rotations += 1;
    }

    /// Record one timed API operation.
    pub fn record(&mut self, operation: Operation, success: bool, latency: Duration) {
        if self.is_finished() {
            return;
        }
        let counts = self.operations.entry(operation).or_default();
        if success {
            counts.succeeded += 1;
        } else {
            counts.failed += 1;
        }
        if self.latencies.len() == LATENCY_WINDOW {
            self.latencies.pop_front();
        }
        self.latencies.push_back(latency.as_micros() as u64);
    }

    pub fn record_lifecycle(&mut self, outcome: LifecycleOutcome) {
        if self.is_finished() {
            return;
        }
        *self.lifecycles.entry(outcome).or_insert(0) += 1;
    }

    pub fn total_operations(&self) -> usize {
        self.operations.values().map(|c| c.succeeded + c.failed).sum()
    }

    pub fn failed_operations(&self) -> usize {
        self.operations.values().map(|c| c.failed).sum()
    }

    pub fn succeeded(&self, operation: Operation) -> usize {
        self.operations.get(&operation).map_or(0, |c| c.succeeded)
    }

    pub fn failed(&self, operation: Operation) -> usize {
        self.operations.get(&operation).map_or(0, |c| c.failed)
    }

    pub fn lifecycles(&self, outcome: LifecycleOutcome) -> usize {
        self.lifecycles.get(&outcome).copied().unwrap_or(0)
    }

    pub fn rotations(&self) -> usize {
        self.rotations
    }

    pub fn duration(&self) -> Duration {
        match (self.start_time, self.end_time) {
            (Some(start), Some(end)) => end.duration_since(start),
            (Some(start), None) => start.elapsed(),
            _ => Duration::ZERO,
        }
    }

    pub fn operations_per_second(&self) -> f64 {
        let secs = self.duration().as_secs_f64();
        if secs > 0.0 {
            self.total_operations() as f64 / secs
        } else {
            0.0
        }
    }

    pub fn failure_rate(&self) -> f64 {
        let total = self.total_operations();
        if total == 0 {
            return 0.0;
        }
        self.failed_operations() as f64 / total as f64
    }

    pub fn median_latency_us(&self) -> u64 {
        percentile(&self.latencies, 0.5)
    }

    pub fn p99_latency_us(&self) -> u64 {
        percentile(&self.latencies, 0.99)
    }

    /// Generate a summary report.
    pub fn report(&self) -> MetricsReport {
        MetricsReport {
            rotations: self.rotations,
            lifecycles_completed: self.lifecycles(LifecycleOutcome::Completed),
            lifecycles_failed: self.lifecycles(LifecycleOutcome::Failed),
            lifecycles_abandoned: self.lifecycles(LifecycleOutcome::Abandoned),
            operations: Operation::ALL
                .iter()
                .map(|op| (*op, self.succeeded(*op), self.failed(*op)))
                .filter(|(_, ok, err)| ok + err > 0)
                .collect(),
            total_operations: self.total_operations(),
            duration_ms: self.duration().as_millis() as u64,
            operations_per_second: self.operations_per_second(),
            failure_rate: self.failure_rate(),
            median_latency_us: self.median_latency_us(),
            p99_latency_us: self.p99_latency_us(),
        }
    }
}

fn percentile(samples: &VecDeque<u64>, quantile: f64) -> u64 {
    if samples.is_empty() {
        return 0;
    }
    let mut sorted: Vec<u64> = samples.iter().copied().collect();
    sorted.sort_unstable();
    let idx = (sorted.len() as f64 * quantile) as usize;
    sorted[idx.min(sorted.len() - 1)]
}

/// Shared handle to a [`LoadMetrics`] collector.
#[derive(Debug, Clone, Default)]
pub struct MetricsRecorder {
    inner: Arc<Mutex<LoadMetrics>>,
}

impl MetricsRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn start(&self) {
        self.inner.lock().await.start();
    }

    pub async fn finish(&self) {
        self.inner.lock().await.finish();
    }

    pub async fn record_rotation(&self) {
        self.inner.lock().await.record_rotation();
    }

    pub async fn record(&self, operation: Operation, success: bool, latency: Duration) {
        self.inner.lock().await.record(operation, success, latency);
    }

    pub async fn record_lifecycle(&self, outcome: LifecycleOutcome) {
        self.inner.lock().await.record_lifecycle(outcome);
    }

    pub async fn report(&self) -> MetricsReport {
        self.inner.lock().await.report()
    }
}

/// Summary report of a load test.
#[derive(Debug, Clone)]
pub struct MetricsReport {
    pub rotations: usize,
    pub lifecycles_completed: usize,
    pub lifecycles_failed: usize,
    pub lifecycles_abandoned: usize,
    /// (operation, succeeded, failed)
    pub operations: Vec<(Operation, usize, usize)>,
    pub total_operations: usize,
    pub duration_ms: u64,
    pub operations_per_second: f64,
    pub failure_rate: f64,
    pub median_latency_us: u64,
    pub p99_latency_us: u64,
}

impl std::fmt::Display for MetricsReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Load Test Report ===")?;
        writeln!(f, "Duration:          {} ms", self.duration_ms)?;
        writeln!(f, "Rotations:         {}", self.rotations)?;
        writeln!(f, "Operations:        {}", self.total_operations)?;
        writeln!(f, "Operations/sec:    {:.2}", self.operations_per_second)?;
        writeln!(f, "Failure Rate:      {:.1}%", self.failure_rate * 100.0)?;
        writeln!(f)?;
        writeln!(f, "--- Sessions ---")?;
        writeln!(f, "Completed:         {}", self.lifecycles_completed)?;
        writeln!(f, "Failed:            {}", self.lifecycles_failed)?;
        writeln!(f, "Abandoned:         {}", self.lifecycles_abandoned)?;
        writeln!(f)?;
        writeln!(f, "--- Operations (ok / failed) ---")?;
        for (op, ok, failed) in &self.operations {
            writeln!(f, "{:<18} {} / {}", format!("{}:", op), ok, failed)?;
        }
        writeln!(f)?;
        writeln!(f, "--- Latency ---")?;
        writeln!(f, "Median:            {} us", self.median_latency_us)?;
        writeln!(f, "P99:               {} us", self.p99_latency_us)?;
        Ok(())
    }
}
