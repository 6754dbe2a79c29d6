// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Batch coordinator.
//!
//! Starts one isolated worker per device, drains every progress channel on
//! a short tick, folds the messages into the [`StatusTable`] and redraws the
//! dashboard. Once all workers are gone it waits a short grace period for
//! stragglers and reconciles rows that never got a terminal status.
//!
//! An operator interrupt (the cancellation token) kills every worker and
//! marks all unfinished devices Failed, including when it arrives after the
//! workers already died or during the grace period.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use thiserror::Error;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::RefurbishOptions;
use crate::render::Dashboard;
use crate::runner::{RunnerError, WorkerExit, WorkerHandle, WorkerRequest, WorkerRunner};
use crate::status_table::{INTERRUPTED_MESSAGE, StatusTable};

/// Errors that abort a whole batch.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CoordinatorError {
    /// No devices were given.
    #[error("no devices to process")]
    EmptyBatch,

    /// A worker could not be started.
    #[error(transparent)]
    Spawn(#[from] RunnerError),

    /// The dashboard could not be drawn.
    #[error("dashboard error: {0}")]
    Dashboard(#[from] std::io::Error),
}

/// Result type for coordinator operations.
pub type Result<T> = std::result::Result<T, CoordinatorError>;

/// Coordinator tuning.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Monitor loop tick.
    pub tick: Duration,
    /// Maximum messages taken from one channel per tick.
    pub batch_per_channel: usize,
    /// Wait after the last worker exits before reconciling.
    pub grace_period: Duration,
    /// Maximum concurrent workers. `None` runs every device at once.
    pub max_workers: Option<usize>,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            tick: Duration::from_millis(150),
            batch_per_channel: 64,
            grace_period: Duration::from_secs(1),
            max_workers: None,
        }
    }
}

/// Result of a batch.
#[derive(Debug, Clone)]
pub struct BatchReport {
    /// Identifier used in logs for this batch.
    pub batch_id: Uuid,
    /// Devices whose final status is Failed.
    pub failure_count: usize,
    /// Whether the batch was interrupted.
    pub interrupted: bool,
    /// Final table; every row is Completed or Failed.
    pub table: StatusTable,
}

/// Runs the refurbishment workflow for many devices in parallel.
pub struct Coordinator {
    runner: Arc<dyn WorkerRunner>,
    config: CoordinatorConfig,
}

impl Coordinator {
    /// Create a coordinator.
    pub fn new(runner: Arc<dyn WorkerRunner>, config: CoordinatorConfig) -> Self {
        Self { runner, config }
    }

    /// Refurbish every device and return the final table.
    ///
    /// Device failures are recorded in the table, not returned as errors.
    /// Only an empty batch, a worker that cannot be spawned or a broken
    /// dashboard abort the run.
    pub async fn refurbish_many(
        &self,
        device_ids: &[String],
        options: RefurbishOptions,
        dashboard: &mut dyn Dashboard,
        cancel: CancellationToken,
    ) -> Result<BatchReport> {
        if device_ids.is_empty() {
            return Err(CoordinatorError::EmptyBatch);
        }

        let batch_id = Uuid::new_v4();
        let mut table = StatusTable::new(device_ids);
        let mut queue: VecDeque<String> =
            table.entries().iter().map(|e| e.device_id.clone()).collect();
        let cap = self.config.max_workers.unwrap_or(usize::MAX).max(1);
        let mut running: Vec<WorkerHandle> = Vec::new();
        let mut exited: Vec<WorkerHandle> = Vec::new();

        info!(
            batch_id = %batch_id,
            devices = table.len(),
            runner = self.runner.runner_type(),
            max_workers = ?self.config.max_workers,
            "Starting batch"
        );
        dashboard.draw(&table)?;

        let mut ticker = tokio::time::interval(self.config.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            while running.len() < cap && !cancel.is_cancelled() {
                let Some(device_id) = queue.pop_front() else {
                    break;
                };
                let request = WorkerRequest {
                    device_id,
                    options,
                };
                match self.runner.launch(&request).await {
                    Ok(handle) => running.push(handle),
                    Err(e) => {
                        warn!(batch_id = %batch_id, device_id = %request.device_id, error = %e, "Aborting batch");
                        shutdown(&mut running, &mut table, self.config.batch_per_channel).await;
                        table.fail_unfinished(&format!("Batch aborted: {}", e));
                        dashboard.draw(&table)?;
                        return Err(e.into());
                    }
                }
            }

            let mut changed = drain(&mut running, &mut table, self.config.batch_per_channel);

            let mut i = 0;
            while i < running.len() {
                if !running[i].is_finished() {
                    i += 1;
                    continue;
                }
                let mut handle = running.remove(i);
                changed |= drain_all(&mut handle, &mut table);
                let exit = handle.join().await;
                let elapsed = (Utc::now() - handle.started_at).num_seconds();
                match &exit {
                    WorkerExit::Crashed(reason) => {
                        warn!(device_id = %handle.device_id, reason = %reason, elapsed_secs = elapsed, "Worker crashed")
                    }
                    other => debug!(device_id = %handle.device_id, exit = ?other, elapsed_secs = elapsed, "Worker exited"),
                }
                table.record_exit(&handle.device_id, exit);
                exited.push(handle);
            }

            if changed {
                dashboard.draw(&table)?;
            }

            if running.is_empty() && queue.is_empty() && !cancel.is_cancelled() {
                break;
            }

            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    warn!(batch_id = %batch_id, running = running.len(), "Interrupted, killing workers");
                    return self.interrupt(batch_id, &mut running, &mut exited, table, dashboard).await;
                }

                _ = ticker.tick() => {}
            }
        }

        tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                warn!(batch_id = %batch_id, "Interrupted during grace period");
                return self.interrupt(batch_id, &mut running, &mut exited, table, dashboard).await;
            }

            _ = tokio::time::sleep(self.config.grace_period) => {}
        }

        let mut late = false;
        for handle in &mut exited {
            late |= drain_all(handle, &mut table);
        }
        if late {
            debug!(batch_id = %batch_id, "Late progress messages drained");
        }

        let verdicts = table.reconcile();
        if !verdicts.is_empty() {
            warn!(batch_id = %batch_id, reconciled = verdicts.len(), "Reconciled devices without a final status");
        }
        dashboard.draw(&table)?;

        let report = report(batch_id, false, table);
        info!(batch_id = %batch_id, failures = report.failure_count, "Batch finished");
        Ok(report)
    }

    /// Kill what is still running, keep every message already sent and
    /// fail the rest.
    async fn interrupt(
        &self,
        batch_id: Uuid,
        running: &mut Vec<WorkerHandle>,
        exited: &mut [WorkerHandle],
        mut table: StatusTable,
        dashboard: &mut dyn Dashboard,
    ) -> Result<BatchReport> {
        shutdown(running, &mut table, self.config.batch_per_channel).await;
        for handle in exited.iter_mut() {
            drain_all(handle, &mut table);
        }
        table.fail_unfinished(INTERRUPTED_MESSAGE);
        dashboard.draw(&table)?;

        let report = report(batch_id, true, table);
        info!(batch_id = %batch_id, failures = report.failure_count, "Batch interrupted");
        Ok(report)
    }
}

fn report(batch_id: Uuid, interrupted: bool, table: StatusTable) -> BatchReport {
    BatchReport {
        batch_id,
        failure_count: table.failure_count(),
        interrupted,
        table,
    }
}

/// Take a bounded batch from every running worker's channel.
fn drain(running: &mut [WorkerHandle], table: &mut StatusTable, max: usize) -> bool {
    let mut changed = false;
    for handle in running.iter_mut() {
        let (batch, _) = handle.progress.drain(max);
        for message in &batch {
            changed |= table.apply(&handle.device_id, message);
        }
    }
    changed
}

/// Take everything queued on one worker's channel.
fn drain_all(handle: &mut WorkerHandle, table: &mut StatusTable) -> bool {
    let mut changed = false;
    loop {
        let (batch, _) = handle.progress.drain(usize::MAX);
        if batch.is_empty() {
            return changed;
        }
        for message in &batch {
            changed |= table.apply(&handle.device_id, message);
        }
    }
}

/// Kill every running worker, wait for them and keep what they sent.
async fn shutdown(running: &mut Vec<WorkerHandle>, table: &mut StatusTable, max: usize) {
    for handle in running.iter() {
        debug!(device_id = %handle.device_id, pid = ?handle.spawned_pid, "Killing worker");
        handle.kill();
    }
    drain(running, table, max);
    for mut handle in running.drain(..) {
        let exit = handle.join().await;
        drain_all(&mut handle, table);
        table.record_exit(&handle.device_id, exit);
    }
}
