// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Worker runner trait definitions.
//!
//! A runner starts one isolated worker per device and hands back a handle
//! carrying the worker's progress channel and a way to kill it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::config::RefurbishOptions;
use crate::progress::ProgressReceiver;

/// Errors from runner operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RunnerError {
    /// The worker could not be started.
    #[error("Failed to spawn worker for {device_id}: {reason}")]
    SpawnFailed {
        /// Device the worker was meant for.
        device_id: String,
        /// Underlying cause.
        reason: String,
    },

    /// I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for runner operations.
pub type Result<T> = std::result::Result<T, RunnerError>;

/// What to run.
#[derive(Debug, Clone)]
pub struct WorkerRequest {
    /// Device serial number.
    pub device_id: String,
    /// Run options.
    pub options: RefurbishOptions,
}

/// How a worker ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerExit {
    /// Workflow reported Completed.
    Completed,
    /// Workflow reported Failed.
    Failed,
    /// Killed by the coordinator.
    Killed,
    /// Exited in an unexpected way (panic, signal, unknown exit code).
    Crashed(String),
}

/// Handle for a running worker.
#[derive(Debug)]
pub struct WorkerHandle {
    /// Device this worker runs for.
    pub device_id: String,
    /// PID of the spawned process, for process isolation.
    pub spawned_pid: Option<u32>,
    /// When the worker was started.
    pub started_at: DateTime<Utc>,
    /// Progress messages emitted by the worker.
    pub progress: ProgressReceiver,
    kill: CancellationToken,
    exit: Option<JoinHandle<WorkerExit>>,
    exited: Option<WorkerExit>,
}

impl WorkerHandle {
    /// Assemble a handle. `exit` must resolve once the worker is gone and,
    /// for killed workers, only after `kill` has been honoured.
    pub fn new(
        device_id: impl Into<String>,
        spawned_pid: Option<u32>,
        progress: ProgressReceiver,
        kill: CancellationToken,
        exit: JoinHandle<WorkerExit>,
    ) -> Self {
        Self {
            device_id: device_id.into(),
            spawned_pid,
            started_at: Utc::now(),
            progress,
            kill,
            exit: Some(exit),
            exited: None,
        }
    }

    /// Ask the worker to stop immediately. Does not wait.
    pub fn kill(&self) {
        self.kill.cancel();
    }

    /// Whether the worker has exited.
    pub fn is_finished(&self) -> bool {
        match &self.exit {
            Some(exit) => exit.is_finished(),
            None => true,
        }
    }

    /// Wait for the worker to exit.
    pub async fn join(&mut self) -> WorkerExit {
        if let Some(exit) = self.exit.take() {
            let result = match exit.await {
                Ok(exit) => exit,
                Err(e) if e.is_cancelled() => WorkerExit::Killed,
                Err(e) => {
                    warn!(device_id = %self.device_id, error = %e, "Worker task panicked");
                    WorkerExit::Crashed(e.to_string())
                }
            };
            self.exited = Some(result);
        }
        self.exited.clone().unwrap_or(WorkerExit::Killed)
    }
}

/// Trait for worker runners.
///
/// Runners only start and stop workers. The status table and dashboard are
/// the coordinator's business.
#[async_trait]
pub trait WorkerRunner: Send + Sync {
    /// Runner type identifier (e.g., "process", "task").
    fn runner_type(&self) -> &'static str;

    /// Start a worker for one device.
    async fn launch(&self, request: &WorkerRequest) -> Result<WorkerHandle>;
}
