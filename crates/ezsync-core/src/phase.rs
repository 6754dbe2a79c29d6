// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Workflow phases and device status.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Position of a device in the refurbishment pipeline.
///
/// Ordered: a device only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Waiting for the radio to come online.
    Connect = 1,
    /// Applying the provisioning configuration.
    Configure = 2,
    /// Firmware upgrade, or a plain reboot when firmware is skipped.
    Firmware = 3,
    /// Speed test rounds.
    SpeedTest = 4,
    /// Final configuration.
    Finalize = 5,
}

impl Phase {
    /// All phases in pipeline order.
    pub const ALL: [Phase; 5] = [
        Phase::Connect,
        Phase::Configure,
        Phase::Firmware,
        Phase::SpeedTest,
        Phase::Finalize,
    ];

    /// Number of phases.
    pub const COUNT: u8 = 5;

    /// 1-based step number.
    pub fn number(self) -> u8 {
        self as u8
    }

    /// Short label for the dashboard.
    pub fn label(self) -> &'static str {
        match self {
            Phase::Connect => "connect",
            Phase::Configure => "configure",
            Phase::Firmware => "firmware",
            Phase::SpeedTest => "speedtest",
            Phase::Finalize => "finalize",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.number(), Phase::COUNT)
    }
}

/// Device status as shown on the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    /// Worker not started yet.
    #[default]
    Pending,
    /// A phase is executing.
    InProgress,
    /// Non-fatal caution; the workflow continues.
    Warning,
    /// Finished successfully. Terminal.
    Completed,
    /// Finished with an error. Terminal.
    Failed,
}

impl Status {
    /// Whether no further transitions are allowed.
    pub fn is_terminal(self) -> bool {
        matches!(self, Status::Completed | Status::Failed)
    }

    /// Upper-case status word.
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Pending => "PENDING",
            Status::InProgress => "IN_PROGRESS",
            Status::Warning => "WARNING",
            Status::Completed => "COMPLETED",
            Status::Failed => "FAILED",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
