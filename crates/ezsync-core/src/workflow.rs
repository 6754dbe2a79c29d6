// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! The per-device refurbishment workflow.
//!
//! Five strictly sequential phases:
//!
//! 1. **Connect**: poll until the radio reports `connected=true`.
//! 2. **Configure**: apply the provisioning configuration (`IN_REFURBISHMENT`).
//! 3. **Firmware**: upgrade to the latest stable firmware (best-effort
//!    reconnection check), or reboot and wait for the radio and its BN
//!    when firmware is skipped.
//! 4. **SpeedTest**: accumulate the required number of successful tests.
//! 5. **Finalize**: apply the final configuration (`REFURBISHED`).
//!
//! Every transition is reported on the device's progress channel. A run
//! emits exactly one terminal message (Completed or Failed) and then stops.

use std::sync::Arc;

use ezsync_gateway::{DeviceGateway, FirmwareOutcome, RadioConfiguration};
use tracing::{debug, info, warn};

use crate::config::{RefurbishOptions, SpeedTestAggregation, WorkflowTimings};
use crate::phase::{Phase, Status};
use crate::polling::{self, Probe, ProbeState, SpeedTestEvent};
use crate::progress::{ProgressMessage, ProgressSender};
use crate::snapshot::{DeviceSnapshot, SpeedTestSummary};

/// Hostname applied while a device is being refurbished.
pub const IN_REFURBISHMENT_HOSTNAME: &str = "IN_REFURBISHMENT";

/// Hostname applied once refurbishment succeeded.
pub const REFURBISHED_HOSTNAME: &str = "REFURBISHED";

/// Terminal verdict of one workflow run.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowOutcome {
    /// Completed or Failed.
    pub status: Status,
    /// Phase reached; for failures, the phase that failed.
    pub phase: Phase,
    /// Final message.
    pub message: String,
    /// Everything learned about the device.
    pub snapshot: DeviceSnapshot,
}

impl WorkflowOutcome {
    /// Whether the device was refurbished.
    pub fn is_success(&self) -> bool {
        self.status == Status::Completed
    }
}

/// Hard failure of a phase.
#[derive(Debug)]
struct PhaseFailure(String);

type PhaseResult = std::result::Result<(), PhaseFailure>;

/// Refurbishment workflow bound to a gateway and timing budget.
#[derive(Clone)]
pub struct RefurbishWorkflow {
    gateway: Arc<dyn DeviceGateway>,
    timings: WorkflowTimings,
    options: RefurbishOptions,
    aggregation: SpeedTestAggregation,
}

impl RefurbishWorkflow {
    /// Create a workflow. Speed test figures default to the latest result.
    pub fn new(
        gateway: Arc<dyn DeviceGateway>,
        timings: WorkflowTimings,
        options: RefurbishOptions,
    ) -> Self {
        Self {
            gateway,
            timings,
            options,
            aggregation: SpeedTestAggregation::Latest,
        }
    }

    /// Choose how speed test figures are summarised.
    pub fn with_aggregation(mut self, aggregation: SpeedTestAggregation) -> Self {
        self.aggregation = aggregation;
        self
    }

    /// Run options.
    pub fn options(&self) -> RefurbishOptions {
        self.options
    }

    /// Run all phases for one device.
    ///
    /// Never returns early without a terminal message on `progress`.
    pub async fn run(&self, serial: &str, progress: &ProgressSender) -> WorkflowOutcome {
        let mut run = Run {
            workflow: self,
            serial,
            progress,
            phase: Phase::Connect,
            snapshot: DeviceSnapshot::default(),
        };

        info!(device_id = %serial, "Starting refurbishment");
        run.emit("[1/5] Starting refurbishment");

        let (status, message) = match run.execute().await {
            Ok(()) => (
                Status::Completed,
                "Refurbishment completed successfully".to_string(),
            ),
            Err(PhaseFailure(message)) => (Status::Failed, message),
        };

        match status {
            Status::Completed => info!(device_id = %serial, "Refurbishment completed"),
            _ => warn!(device_id = %serial, phase = ?run.phase, message = %message, "Refurbishment failed"),
        }

        progress.send(ProgressMessage {
            status,
            message: message.clone(),
            phase: Some(run.phase),
            snapshot: run.snapshot.clone(),
        });

        WorkflowOutcome {
            status,
            phase: run.phase,
            message,
            snapshot: run.snapshot,
        }
    }
}

/// State of one in-flight run.
struct Run<'a> {
    workflow: &'a RefurbishWorkflow,
    serial: &'a str,
    progress: &'a ProgressSender,
    phase: Phase,
    snapshot: DeviceSnapshot,
}

impl Run<'_> {
    fn emit(&mut self, message: impl Into<String>) {
        self.emit_with(Status::InProgress, message, DeviceSnapshot::default());
    }

    fn emit_with(&mut self, status: Status, message: impl Into<String>, delta: DeviceSnapshot) {
        let message = message.into();
        debug!(device_id = %self.serial, phase = ?self.phase, status = %status, "{}", message);
        self.snapshot.merge(&delta);
        self.progress.send(ProgressMessage {
            status,
            message,
            phase: Some(self.phase),
            snapshot: delta,
        });
    }

    fn enter(&mut self, phase: Phase) {
        debug_assert!(phase >= self.phase);
        self.phase = phase;
    }

    async fn execute(&mut self) -> PhaseResult {
        self.connect().await?;
        self.configure().await?;
        self.firmware().await?;
        self.speed_test().await?;
        self.finalize().await
    }

    async fn connect(&mut self) -> PhaseResult {
        self.enter(Phase::Connect);
        self.emit("[1/5] Connecting to radio");

        let workflow = self.workflow;
        let budget = workflow.timings.connect;
        let info = polling::wait_for_connection(
            workflow.gateway.as_ref(),
            self.serial,
            budget,
            |probe| self.report_probe(probe, "Waiting for radio to connect"),
        )
        .await
        .ok_or_else(|| {
            PhaseFailure(format!(
                "Connection timed out after {} attempts",
                budget.attempts
            ))
        })?;

        self.emit_with(
            Status::InProgress,
            "[1/5] Connected to radio",
            DeviceSnapshot::from_device_info(&info),
        );
        Ok(())
    }

    fn report_probe(&mut self, probe: Probe, waiting: &str) {
        let Probe {
            attempt, attempts, ..
        } = probe;
        match probe.state {
            ProbeState::Checking => self.emit(format!("{} ({}/{})", waiting, attempt, attempts)),
            ProbeState::DeviceNotFound => self.emit(format!(
                "Waiting for connection ({}/{}): Device not found",
                attempt, attempts
            )),
            ProbeState::NotConnected => self.emit(format!(
                "Waiting for connection ({}/{}): Device not connected",
                attempt, attempts
            )),
        }
    }

    async fn configure(&mut self) -> PhaseResult {
        self.enter(Phase::Configure);
        self.emit("[2/5] Applying default configuration");

        self.workflow
            .gateway
            .apply_configuration(
                self.serial,
                &RadioConfiguration::defaults(IN_REFURBISHMENT_HOSTNAME),
            )
            .await
            .map_err(|e| PhaseFailure(format!("Failed to apply default configuration: {}", e)))
    }

    async fn firmware(&mut self) -> PhaseResult {
        self.enter(Phase::Firmware);
        self.emit("[3/5] Firmware management");

        if self.workflow.options.skip_firmware {
            return self.reboot_instead_of_upgrade().await;
        }

        self.emit("[3/5] Checking firmware and upgrading if needed");
        let outcome = self
            .workflow
            .gateway
            .request_firmware_upgrade(self.serial)
            .await
            .map_err(|e| PhaseFailure(format!("Failed to initiate firmware upgrade: {}", e)))?;

        match outcome {
            FirmwareOutcome::Skipped => {
                self.emit("[3/5] Firmware already up to date");
                Ok(())
            }
            FirmwareOutcome::Applied => {
                self.emit("[3/5] Firmware upgrade in progress");
                self.confirm_upgrade().await;
                Ok(())
            }
        }
    }

    /// Best-effort reconnection check after an upgrade. Never fails the run.
    async fn confirm_upgrade(&mut self) {
        let workflow = self.workflow;
        let timings = &workflow.timings;
        tokio::time::sleep(timings.firmware_settle).await;

        let checks = timings.firmware_reconnect;
        for check in 1..=checks.attempts {
            self.emit(format!(
                "[3/5] Post-upgrade reconnection check ({}/{})",
                check, checks.attempts
            ));
            match workflow.gateway.get_device_status(self.serial).await {
                Ok(info) if info.is_connected() => {
                    self.emit("[3/5] Radio reconnected after upgrade");
                    if let Some(version) = info.software_version {
                        self.emit_with(
                            Status::InProgress,
                            format!("[3/5] Updated firmware: {}", version),
                            DeviceSnapshot::with_firmware(version),
                        );
                    }
                    return;
                }
                Ok(_) => {}
                Err(e) => debug!(device_id = %self.serial, error = %e, "Post-upgrade status check failed"),
            }
            if check < checks.attempts {
                tokio::time::sleep(checks.interval).await;
            }
        }

        warn!(device_id = %self.serial, "Radio did not reconnect after firmware upgrade");
        self.emit_with(
            Status::Warning,
            "[3/5] Radio did not reconnect after upgrade",
            DeviceSnapshot::default(),
        );
    }

    async fn reboot_instead_of_upgrade(&mut self) -> PhaseResult {
        let workflow = self.workflow;
        self.emit("[3/5] Firmware upgrade skipped");
        self.emit("[3/5] Rebooting radio");
        workflow
            .gateway
            .reboot(self.serial)
            .await
            .map_err(|e| PhaseFailure(format!("Failed to reboot radio: {}", e)))?;

        let settle = workflow.timings.reboot_settle;
        self.emit(format!(
            "[3/5] Waiting for radio to reconnect (initial wait {}s)",
            settle.as_secs()
        ));
        tokio::time::sleep(settle).await;

        let info = polling::wait_for_connection(
            workflow.gateway.as_ref(),
            self.serial,
            workflow.timings.reboot_reconnect,
            |probe| self.report_probe(probe, "[3/5] Reconnection check"),
        )
        .await
        .ok_or_else(|| PhaseFailure("Radio did not reconnect after reboot".to_string()))?;

        self.emit_with(
            Status::InProgress,
            "[3/5] Radio reconnected after reboot",
            DeviceSnapshot::from_device_info(&info),
        );

        let bn = info
            .connected_bn
            .as_deref()
            .filter(|bn| !bn.is_empty())
            .ok_or_else(|| PhaseFailure("No connected BN found".to_string()))?;
        self.emit(format!("[3/5] Getting BN info: {}", bn));
        workflow
            .gateway
            .get_device_status(bn)
            .await
            .map_err(|e| {
                debug!(device_id = %self.serial, bn = %bn, error = %e, "BN lookup failed");
                PhaseFailure("Failed to get BN info".to_string())
            })?;
        Ok(())
    }

    async fn speed_test(&mut self) -> PhaseResult {
        self.enter(Phase::SpeedTest);
        let workflow = self.workflow;
        let timings = &workflow.timings;

        if workflow.options.skip_speedtest {
            self.emit("[4/5] Speed tests skipped");
            return Ok(());
        }

        self.emit("[4/5] Preparing for speed tests");
        tokio::time::sleep(timings.speed_test_settle).await;
        self.emit("[4/5] Running speed tests");

        let required = timings.speed_test_required;
        let attempts = timings.speed_test_attempts;
        let series = polling::run_speed_tests(
            workflow.gateway.as_ref(),
            self.serial,
            timings,
            |event| match event {
                SpeedTestEvent::Attempt { attempt, successes } => self.emit(format!(
                    "Speed test attempt {}/{} (Completed: {}/{})",
                    attempt, attempts, successes, required
                )),
                SpeedTestEvent::StartFailed { attempt, error } => {
                    debug!(device_id = %self.serial, attempt, error = %error, "Speed test start failed");
                    self.emit(format!("Failed to initiate test {}", attempt))
                }
                SpeedTestEvent::Waiting { attempt } => {
                    self.emit(format!("Waiting for test {} results", attempt))
                }
                SpeedTestEvent::NoResult { attempt } => {
                    self.emit(format!("Failed to get results for test {}", attempt))
                }
                SpeedTestEvent::Succeeded {
                    attempt,
                    result,
                    successes,
                } => {
                    let summary = SpeedTestSummary::from_result(result);
                    self.emit_with(
                        Status::InProgress,
                        format!(
                            "Test {} success: {} ({}/{})",
                            attempt, summary, successes, required
                        ),
                        DeviceSnapshot::with_speed_test(summary),
                    )
                }
                SpeedTestEvent::NoThroughput { .. } => {
                    self.emit("Test completed but no throughput data")
                }
                SpeedTestEvent::Failed { attempt, result } => self.emit(format!(
                    "Test {} failed: {}",
                    attempt,
                    result.failure_reason.as_deref().unwrap_or("Unknown reason")
                )),
                SpeedTestEvent::Pausing { .. } => self.emit(format!(
                    "Waiting {}s before next test",
                    timings.speed_test_pause.as_secs()
                )),
            },
        )
        .await;

        if series.success_count() < required {
            return Err(PhaseFailure(format!(
                "Speed tests failed: {}/{} successful after {} attempts",
                series.success_count(),
                required,
                series.attempts
            )));
        }

        let summary = match workflow.aggregation {
            SpeedTestAggregation::Latest => series.successes.last().map(SpeedTestSummary::from_result),
            SpeedTestAggregation::Average => SpeedTestSummary::average(&series.successes),
        };
        if let Some(summary) = summary {
            self.emit_with(
                Status::InProgress,
                format!("[4/5] Speed tests completed: {}", summary),
                DeviceSnapshot::with_speed_test(summary),
            );
        }
        Ok(())
    }

    async fn finalize(&mut self) -> PhaseResult {
        self.enter(Phase::Finalize);
        let workflow = self.workflow;
        self.emit("[5/5] Applying final configuration");

        workflow
            .gateway
            .apply_configuration(self.serial, &RadioConfiguration::defaults(REFURBISHED_HOSTNAME))
            .await
            .map_err(|e| PhaseFailure(format!("Failed to apply final configuration: {}", e)))?;

        let hostname = match workflow.gateway.get_device_status(self.serial).await {
            Ok(info) => info
                .host_name
                .unwrap_or_else(|| REFURBISHED_HOSTNAME.to_string()),
            Err(e) => {
                debug!(device_id = %self.serial, error = %e, "Could not re-read hostname");
                REFURBISHED_HOSTNAME.to_string()
            }
        };
        self.emit_with(
            Status::InProgress,
            format!("[5/5] Hostname set to {}", hostname),
            DeviceSnapshot::with_hostname(hostname),
        );
        Ok(())
    }
}
