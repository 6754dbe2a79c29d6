// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Mock gateway for testing.
//!
//! Simulates a fleet of radios in memory. Each device is scripted up front:
//! how many status polls it stays offline after a reboot, how a firmware
//! request is answered, which speed test results it produces.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::error::{GatewayError, Result};
use crate::traits::DeviceGateway;
use crate::types::{
    DeviceInfo, FirmwareOutcome, RadioConfiguration, SpeedTestResult, SpeedTestStatus,
};

/// Offline poll count that never runs out.
pub const NEVER: u32 = u32::MAX;

/// How a mock device answers a firmware upgrade request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockFirmware {
    /// Already on the latest stable version.
    UpToDate,
    /// Upgrade accepted; the device goes offline for `upgrade_offline_polls`.
    Upgrade,
    /// The platform rejects the upgrade.
    Reject,
}

/// Scripted behavior of one simulated radio.
#[derive(Debug, Clone)]
pub struct MockDevice {
    /// Information returned by status calls while online.
    pub info: DeviceInfo,
    /// Status polls reporting offline before the first connect succeeds.
    pub connect_offline_polls: u32,
    /// Status polls reporting offline after a reboot.
    pub reboot_offline_polls: u32,
    /// Status polls reporting offline after an accepted upgrade.
    pub upgrade_offline_polls: u32,
    /// Firmware upgrade behavior.
    pub firmware: MockFirmware,
    /// Hostnames whose configuration request is refused.
    pub reject_hostnames: Vec<String>,
    /// Reboot requests fail.
    pub reboot_fails: bool,
    /// Speed test start requests fail.
    pub start_speed_test_fails: bool,
    /// Results handed out to successive speed tests.
    pub speed_tests: VecDeque<SpeedTestResult>,
    /// Result used once `speed_tests` runs out. `None` keeps tests running forever.
    pub default_speed_test: Option<SpeedTestResult>,
}

impl MockDevice {
    /// A connected, healthy radio that passes every speed test at 50/12.5 Mbps.
    pub fn online(serial: &str) -> Self {
        Self {
            info: DeviceInfo {
                serial_number: Some(serial.to_string()),
                host_name: Some("CUSTOMER".to_string()),
                connected: Some(true),
                connected_bn: Some("BN-0001".to_string()),
                software_version: Some("3.622.005".to_string()),
                part_number: Some("RN-2000".to_string()),
                multi_carrier_mode_rn: Some("2".to_string()),
                ..Default::default()
            },
            connect_offline_polls: 0,
            reboot_offline_polls: 1,
            upgrade_offline_polls: 1,
            firmware: MockFirmware::UpToDate,
            reject_hostnames: Vec::new(),
            reboot_fails: false,
            start_speed_test_fails: false,
            speed_tests: VecDeque::new(),
            default_speed_test: Some(speed_test_completed(50_000.0, 12_500.0)),
        }
    }

    /// Set the number of offline polls before the first connection.
    pub fn with_connect_offline_polls(mut self, polls: u32) -> Self {
        self.connect_offline_polls = polls;
        self
    }

    /// Set the number of offline polls after a reboot.
    pub fn with_reboot_offline_polls(mut self, polls: u32) -> Self {
        self.reboot_offline_polls = polls;
        self
    }

    /// Set the firmware behavior and the offline polls after an accepted upgrade.
    pub fn with_firmware(mut self, firmware: MockFirmware, offline_polls: u32) -> Self {
        self.firmware = firmware;
        self.upgrade_offline_polls = offline_polls;
        self
    }

    /// Refuse configuration requests carrying this hostname.
    pub fn rejecting_hostname(mut self, host_name: &str) -> Self {
        self.reject_hostnames.push(host_name.to_string());
        self
    }

    /// Make reboot requests fail.
    pub fn with_failing_reboot(mut self) -> Self {
        self.reboot_fails = true;
        self
    }

    /// Make speed test start requests fail.
    pub fn with_failing_speed_test_start(mut self) -> Self {
        self.start_speed_test_fails = true;
        self
    }

    /// Queue speed test results, consumed in order.
    pub fn with_speed_tests(mut self, results: impl IntoIterator<Item = SpeedTestResult>) -> Self {
        self.speed_tests.extend(results);
        self
    }

    /// Set the fallback speed test result. `None` keeps tests running forever.
    pub fn with_default_speed_test(mut self, result: Option<SpeedTestResult>) -> Self {
        self.default_speed_test = result;
        self
    }

    /// Set the base node the radio reports as connected to.
    pub fn with_connected_bn(mut self, bn: Option<&str>) -> Self {
        self.info.connected_bn = bn.map(str::to_string);
        self
    }

    /// Set the device coordinates.
    pub fn with_location(mut self, latitude: f64, longitude: f64) -> Self {
        self.info.latitude = Some(latitude);
        self.info.longitude = Some(longitude);
        self
    }
}

/// A completed speed test with the given throughputs in kbps.
pub fn speed_test_completed(downlink_kbps: f64, uplink_kbps: f64) -> SpeedTestResult {
    SpeedTestResult {
        status: Some(SpeedTestStatus::Completed),
        downlink_throughput: Some(downlink_kbps),
        uplink_throughput: Some(uplink_kbps),
        downlink_snr: Some(30.0),
        uplink_snr: Some(28.0),
        pathloss: Some(110.0),
        latency_millis: Some(12.0),
        rf_link_distance: Some(1500.0),
        ..Default::default()
    }
}

/// A speed test the platform reports as failed.
pub fn speed_test_failed(reason: &str) -> SpeedTestResult {
    SpeedTestResult {
        status: Some(SpeedTestStatus::Failed),
        failure_reason: Some(reason.to_string()),
        ..Default::default()
    }
}

/// A gateway call recorded by the mock.
#[derive(Debug, Clone, PartialEq)]
pub enum MockCall {
    /// `get_device_status`
    Status(String),
    /// `apply_configuration` with the requested hostname.
    Configure {
        /// Target serial.
        serial: String,
        /// Requested hostname.
        host_name: String,
    },
    /// `reboot`
    Reboot(String),
    /// `reconnect`
    Reconnect(String),
    /// `request_firmware_upgrade`
    FirmwareUpgrade(String),
    /// `start_speed_test`
    StartSpeedTest(String),
    /// `poll_speed_test`
    PollSpeedTest(String),
    /// `delete_devices`
    Delete(Vec<String>),
}

#[derive(Debug)]
struct DeviceState {
    script: MockDevice,
    offline_remaining: u32,
}

#[derive(Debug, Default)]
struct MockState {
    devices: HashMap<String, DeviceState>,
    operations: HashMap<String, Option<SpeedTestResult>>,
    next_operation: u64,
    calls: Vec<MockCall>,
}

/// In-memory gateway for tests.
#[derive(Debug, Clone, Default)]
pub struct MockGateway {
    state: Arc<Mutex<MockState>>,
}

impl MockGateway {
    /// Create an empty mock gateway. Unknown serials answer HTTP 404.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock gateway with the given devices.
    pub fn with_devices(devices: impl IntoIterator<Item = MockDevice>) -> Self {
        let mut state = MockState::default();
        for device in devices {
            let serial = device.info.serial_number.clone().unwrap_or_default();
            state.devices.insert(
                serial,
                DeviceState {
                    offline_remaining: device.connect_offline_polls,
                    script: device,
                },
            );
        }
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// All calls made so far, in order.
    pub async fn calls(&self) -> Vec<MockCall> {
        self.state.lock().await.calls.clone()
    }

    /// Current hostname of a device.
    pub async fn host_name(&self, serial: &str) -> Option<String> {
        let state = self.state.lock().await;
        state
            .devices
            .get(serial)
            .and_then(|d| d.script.info.host_name.clone())
    }

    /// Whether a device is still registered.
    pub async fn contains(&self, serial: &str) -> bool {
        self.state.lock().await.devices.contains_key(serial)
    }
}

fn not_found(operation: &'static str, serial: &str) -> GatewayError {
    GatewayError::Http {
        operation,
        status: 404,
        body: format!("radio {} not found", serial),
    }
}

#[async_trait]
impl DeviceGateway for MockGateway {
    async fn get_device_status(&self, serial: &str) -> Result<DeviceInfo> {
        let mut state = self.state.lock().await;
        state.calls.push(MockCall::Status(serial.to_string()));
        let device = state
            .devices
            .get_mut(serial)
            .ok_or_else(|| not_found("get radio", serial))?;

        let mut info = device.script.info.clone();
        if device.offline_remaining > 0 {
            if device.offline_remaining != NEVER {
                device.offline_remaining -= 1;
            }
            info.connected = Some(false);
        }
        Ok(info)
    }

    async fn apply_configuration(&self, serial: &str, config: &RadioConfiguration) -> Result<()> {
        let mut state = self.state.lock().await;
        state.calls.push(MockCall::Configure {
            serial: serial.to_string(),
            host_name: config.host_name.clone(),
        });
        let device = state
            .devices
            .get_mut(serial)
            .ok_or_else(|| not_found("apply configuration", serial))?;

        if device.script.reject_hostnames.contains(&config.host_name) {
            return Err(GatewayError::Http {
                operation: "apply configuration",
                status: 400,
                body: "configuration rejected".to_string(),
            });
        }
        device.script.info.host_name = Some(config.host_name.clone());
        device.script.info.latitude = Some(config.latitude);
        device.script.info.longitude = Some(config.longitude);
        Ok(())
    }

    async fn reboot(&self, serial: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        state.calls.push(MockCall::Reboot(serial.to_string()));
        let device = state
            .devices
            .get_mut(serial)
            .ok_or_else(|| not_found("reboot", serial))?;

        if device.script.reboot_fails {
            return Err(GatewayError::Http {
                operation: "reboot",
                status: 500,
                body: "reboot failed".to_string(),
            });
        }
        device.offline_remaining = device.script.reboot_offline_polls;
        Ok(())
    }

    async fn reconnect(&self, serial: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        state.calls.push(MockCall::Reconnect(serial.to_string()));
        if !state.devices.contains_key(serial) {
            return Err(not_found("reconnect", serial));
        }
        Ok(())
    }

    async fn request_firmware_upgrade(&self, serial: &str) -> Result<FirmwareOutcome> {
        let mut state = self.state.lock().await;
        state.calls.push(MockCall::FirmwareUpgrade(serial.to_string()));
        let device = state
            .devices
            .get_mut(serial)
            .ok_or_else(|| not_found("firmware upgrade", serial))?;

        match device.script.firmware {
            MockFirmware::UpToDate => Ok(FirmwareOutcome::Skipped),
            MockFirmware::Upgrade => {
                device.offline_remaining = device.script.upgrade_offline_polls;
                Ok(FirmwareOutcome::Applied)
            }
            MockFirmware::Reject => Err(GatewayError::Rejected {
                operation: "firmware upgrade",
                message: "Package not compatible".to_string(),
            }),
        }
    }

    async fn start_speed_test(&self, serial: &str) -> Result<String> {
        let mut state = self.state.lock().await;
        state.calls.push(MockCall::StartSpeedTest(serial.to_string()));
        let device = state
            .devices
            .get_mut(serial)
            .ok_or_else(|| not_found("start speed test", serial))?;

        if device.script.start_speed_test_fails {
            return Err(GatewayError::Http {
                operation: "start speed test",
                status: 503,
                body: "speed test unavailable".to_string(),
            });
        }
        let result = device
            .script
            .speed_tests
            .pop_front()
            .or_else(|| device.script.default_speed_test.clone());

        state.next_operation += 1;
        let operation_id = format!("op-{}", state.next_operation);
        state.operations.insert(operation_id.clone(), result);
        Ok(operation_id)
    }

    async fn poll_speed_test(&self, operation_id: &str, serial: &str) -> Result<SpeedTestResult> {
        let mut state = self.state.lock().await;
        state.calls.push(MockCall::PollSpeedTest(serial.to_string()));
        let result = state.operations.get(operation_id).ok_or_else(|| GatewayError::Http {
            operation: "poll speed test",
            status: 404,
            body: format!("operation {} not found", operation_id),
        })?;

        let mut result = result.clone().unwrap_or(SpeedTestResult {
            status: Some(SpeedTestStatus::Running),
            ..Default::default()
        });
        result.operation_id = Some(operation_id.to_string());
        result.serial_number = Some(serial.to_string());
        Ok(result)
    }

    async fn delete_devices(&self, serials: &[String]) -> Result<()> {
        let mut state = self.state.lock().await;
        state.calls.push(MockCall::Delete(serials.to_vec()));
        for serial in serials {
            state.devices.remove(serial);
        }
        Ok(())
    }
}
