// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! ezSync Core - parallel radio refurbishment
//!
//! This crate runs the five-phase refurbishment workflow against many
//! radios at once and keeps an operator-facing view of every device.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │                        Coordinator                            │
//! │   monitor loop ── StatusTable ── Dashboard (render_dashboard) │
//! └──────────────┬───────────────────────────────┬────────────────┘
//!                │ WorkerRunner::launch          │ progress channels
//!      ┌─────────┴─────────┐           ┌─────────┴─────────┐
//!      │   ProcessRunner   │           │    TaskRunner     │
//!      │  (child process,  │           │  (tokio task per  │
//!      │   NDJSON stdout)  │           │      device)      │
//!      └─────────┬─────────┘           └─────────┬─────────┘
//!                └──────────────┬────────────────┘
//!                               ▼
//!                       RefurbishWorkflow
//!        Connect → Configure → Firmware → SpeedTest → Finalize
//!                               │
//!                               ▼
//!                 DeviceGateway (ezsync-gateway)
//! ```
//!
//! Workers never share state. Each one writes [`ProgressMessage`]s to its
//! own channel and the coordinator is the only writer of the
//! [`StatusTable`].
//!
//! # Guarantees
//!
//! - A workflow run emits exactly one terminal message.
//! - A device's phase never moves backwards in the table.
//! - When a batch returns, every device is Completed or Failed.
//! - An interrupt kills every worker and marks unfinished devices Failed.

#![deny(missing_docs)]

pub mod config;
pub mod coordinator;
pub mod phase;
pub mod polling;
pub mod progress;
pub mod render;
pub mod runner;
pub mod snapshot;
pub mod status_table;
pub mod workflow;

pub use config::{PollBudget, RefurbishOptions, SpeedTestAggregation, WorkflowTimings};
pub use coordinator::{BatchReport, Coordinator, CoordinatorConfig, CoordinatorError};
pub use phase::{Phase, Status};
pub use progress::{ProgressMessage, ProgressReceiver, ProgressSender};
pub use render::{Dashboard, RecordingDashboard, RenderOptions, TerminalDashboard, render_dashboard};
pub use runner::{
    ProcessRunner, RunnerError, TaskRunner, WorkerExit, WorkerHandle, WorkerRequest, WorkerRunner,
    run_worker,
};
pub use snapshot::{DeviceSnapshot, SpeedTestSummary};
pub use status_table::{DeviceEntry, StatusTable};
pub use workflow::{
    IN_REFURBISHMENT_HOSTNAME, REFURBISHED_HOSTNAME, RefurbishWorkflow, WorkflowOutcome,
};
