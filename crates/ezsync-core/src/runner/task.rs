// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! In-process runner: one tokio task per device.
//!
//! Killing a worker drops its workflow future, abandoning any in-flight
//! gateway call.

use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use ezsync_gateway::DeviceGateway;

use super::traits::*;
use crate::config::{SpeedTestAggregation, WorkflowTimings};
use crate::progress;
use crate::workflow::RefurbishWorkflow;

/// Runs each workflow as a task on the current runtime.
pub struct TaskRunner {
    gateway: Arc<dyn DeviceGateway>,
    timings: WorkflowTimings,
}

impl TaskRunner {
    /// Create a task runner.
    pub fn new(gateway: Arc<dyn DeviceGateway>, timings: WorkflowTimings) -> Self {
        Self { gateway, timings }
    }
}

#[async_trait]
impl WorkerRunner for TaskRunner {
    fn runner_type(&self) -> &'static str {
        "task"
    }

    async fn launch(&self, request: &WorkerRequest) -> Result<WorkerHandle> {
        let workflow = RefurbishWorkflow::new(
            self.gateway.clone(),
            self.timings.clone(),
            request.options,
        )
        .with_aggregation(SpeedTestAggregation::Latest);

        let (tx, rx) = progress::channel();
        let kill = CancellationToken::new();
        let token = kill.clone();
        let device_id = request.device_id.clone();

        let exit = tokio::spawn(async move {
            tokio::select! {
                biased;

                _ = token.cancelled() => {
                    debug!(device_id = %device_id, "Worker task killed");
                    WorkerExit::Killed
                }

                outcome = workflow.run(&device_id, &tx) => {
                    if outcome.is_success() {
                        WorkerExit::Completed
                    } else {
                        WorkerExit::Failed
                    }
                }
            }
        });

        Ok(WorkerHandle::new(
            request.device_id.clone(),
            None,
            rx,
            kill,
            exit,
        ))
    }
}
