// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Workflow timing budgets and run options.

use std::time::Duration;

use ezsync_gateway::ConfigError;
use ezsync_gateway::config::parse_env;
use serde::{Deserialize, Serialize};

/// A bounded polling budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollBudget {
    /// Wait between attempts.
    pub interval: Duration,
    /// Maximum number of attempts.
    pub attempts: u32,
}

impl PollBudget {
    /// Create a budget.
    pub const fn new(interval: Duration, attempts: u32) -> Self {
        Self { interval, attempts }
    }
}

/// Intervals and attempt budgets for every waiting step of the workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowTimings {
    /// Initial connection polling.
    pub connect: PollBudget,
    /// Settling wait after an accepted firmware upgrade.
    pub firmware_settle: Duration,
    /// Reconnection checks after a firmware upgrade.
    pub firmware_reconnect: PollBudget,
    /// Settling wait after an explicit reboot.
    pub reboot_settle: Duration,
    /// Reconnection polling after an explicit reboot.
    pub reboot_reconnect: PollBudget,
    /// Settling wait before the first speed test.
    pub speed_test_settle: Duration,
    /// Successful speed tests required.
    pub speed_test_required: u32,
    /// Speed test attempts allowed.
    pub speed_test_attempts: u32,
    /// Pause between speed test attempts.
    pub speed_test_pause: Duration,
    /// Result polling for one speed test. The first check happens after one interval.
    pub speed_test_poll: PollBudget,
}

impl Default for WorkflowTimings {
    fn default() -> Self {
        Self {
            connect: PollBudget::new(Duration::from_secs(20), 30),
            firmware_settle: Duration::from_secs(300),
            firmware_reconnect: PollBudget::new(Duration::from_secs(60), 10),
            reboot_settle: Duration::from_secs(180),
            reboot_reconnect: PollBudget::new(Duration::from_secs(20), 30),
            speed_test_settle: Duration::from_secs(60),
            speed_test_required: 3,
            speed_test_attempts: 10,
            speed_test_pause: Duration::from_secs(60),
            speed_test_poll: PollBudget::new(Duration::from_secs(20), 30),
        }
    }
}

impl WorkflowTimings {
    /// Load timings, overriding defaults with `EZSYNC_*` environment variables.
    ///
    /// Durations are whole seconds:
    /// - `EZSYNC_CONNECT_INTERVAL_SECS` / `EZSYNC_CONNECT_ATTEMPTS`
    /// - `EZSYNC_FIRMWARE_SETTLE_SECS`
    /// - `EZSYNC_FIRMWARE_CHECK_INTERVAL_SECS` / `EZSYNC_FIRMWARE_CHECKS`
    /// - `EZSYNC_REBOOT_SETTLE_SECS`
    /// - `EZSYNC_REBOOT_INTERVAL_SECS` / `EZSYNC_REBOOT_ATTEMPTS`
    /// - `EZSYNC_SPEEDTEST_SETTLE_SECS`
    /// - `EZSYNC_SPEEDTEST_REQUIRED` / `EZSYNC_SPEEDTEST_ATTEMPTS`
    /// - `EZSYNC_SPEEDTEST_PAUSE_SECS`
    /// - `EZSYNC_SPEEDTEST_POLL_INTERVAL_SECS` / `EZSYNC_SPEEDTEST_POLL_ATTEMPTS`
    pub fn from_env() -> Result<Self, ConfigError> {
        let d = Self::default();

        let secs = |name: &'static str, default: Duration| -> Result<Duration, ConfigError> {
            parse_env(name, default.as_secs()).map(Duration::from_secs)
        };
        let budget = |interval: &'static str,
                      attempts: &'static str,
                      default: PollBudget|
         -> Result<PollBudget, ConfigError> {
            Ok(PollBudget::new(
                secs(interval, default.interval)?,
                parse_env(attempts, default.attempts)?,
            ))
        };

        Ok(Self {
            connect: budget(
                "EZSYNC_CONNECT_INTERVAL_SECS",
                "EZSYNC_CONNECT_ATTEMPTS",
                d.connect,
            )?,
            firmware_settle: secs("EZSYNC_FIRMWARE_SETTLE_SECS", d.firmware_settle)?,
            firmware_reconnect: budget(
                "EZSYNC_FIRMWARE_CHECK_INTERVAL_SECS",
                "EZSYNC_FIRMWARE_CHECKS",
                d.firmware_reconnect,
            )?,
            reboot_settle: secs("EZSYNC_REBOOT_SETTLE_SECS", d.reboot_settle)?,
            reboot_reconnect: budget(
                "EZSYNC_REBOOT_INTERVAL_SECS",
                "EZSYNC_REBOOT_ATTEMPTS",
                d.reboot_reconnect,
            )?,
            speed_test_settle: secs("EZSYNC_SPEEDTEST_SETTLE_SECS", d.speed_test_settle)?,
            speed_test_required: parse_env("EZSYNC_SPEEDTEST_REQUIRED", d.speed_test_required)?,
            speed_test_attempts: parse_env("EZSYNC_SPEEDTEST_ATTEMPTS", d.speed_test_attempts)?,
            speed_test_pause: secs("EZSYNC_SPEEDTEST_PAUSE_SECS", d.speed_test_pause)?,
            speed_test_poll: budget(
                "EZSYNC_SPEEDTEST_POLL_INTERVAL_SECS",
                "EZSYNC_SPEEDTEST_POLL_ATTEMPTS",
                d.speed_test_poll,
            )?,
        })
    }
}

/// Which speed test figures end up in the snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpeedTestAggregation {
    /// Most recent successful test.
    #[default]
    Latest,
    /// Mean of all successful tests.
    Average,
}

/// Per-run switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefurbishOptions {
    /// Skip the speed test phase.
    pub skip_speedtest: bool,
    /// Skip the firmware upgrade and reboot instead.
    pub skip_firmware: bool,
    /// Verbose logging in workers.
    pub verbose: bool,
}
