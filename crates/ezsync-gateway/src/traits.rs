// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Gateway trait definition.
//!
//! Defines the abstract interface the workflows use to talk to devices.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{DeviceInfo, FirmwareOutcome, RadioConfiguration, SpeedTestResult};

/// Trait for device API gateways.
///
/// Every method is a single request/response exchange. Gateways hold no
/// per-device state across calls; polling and retries belong to the caller.
#[async_trait]
pub trait DeviceGateway: Send + Sync {
    /// Fetch current information for a radio (RN or BN).
    async fn get_device_status(&self, serial: &str) -> Result<DeviceInfo>;

    /// Apply a configuration payload to a radio.
    async fn apply_configuration(&self, serial: &str, config: &RadioConfiguration) -> Result<()>;

    /// Reboot a radio.
    async fn reboot(&self, serial: &str) -> Result<()>;

    /// Force a radio to reconnect to the network.
    async fn reconnect(&self, serial: &str) -> Result<()>;

    /// Upgrade to the latest stable firmware, or report that the radio
    /// already runs it.
    async fn request_firmware_upgrade(&self, serial: &str) -> Result<FirmwareOutcome>;

    /// Start a speed test and return its operation ID.
    async fn start_speed_test(&self, serial: &str) -> Result<String>;

    /// Read the current state of a speed test operation.
    async fn poll_speed_test(&self, operation_id: &str, serial: &str) -> Result<SpeedTestResult>;

    /// Remove radios from the account.
    async fn delete_devices(&self, serials: &[String]) -> Result<()>;
}
