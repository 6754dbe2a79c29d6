// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Accumulated facts about a device.
//!
//! Every field is optional: `None` means "not known yet". Progress messages
//! carry partial snapshots (deltas) that are folded into the full snapshot
//! with [`DeviceSnapshot::merge`].

use ezsync_gateway::{DeviceInfo, SpeedTestResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Latest known operational facts for one device.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceSnapshot {
    /// Running firmware version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub firmware: Option<String>,
    /// Upstream base node serial, or `"None"` when the radio reports none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connected_bn: Option<String>,
    /// Hardware part number.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hardware: Option<String>,
    /// Carrier mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub carrier_mode: Option<String>,
    /// Carrier frequency/bandwidth pairs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequencies: Option<String>,
    /// Speed test figures.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed_test: Option<SpeedTestSummary>,
    /// Hostname confirmed after the final configuration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
}

impl DeviceSnapshot {
    /// Snapshot fields readable from a status response.
    pub fn from_device_info(info: &DeviceInfo) -> Self {
        Self {
            firmware: Some(
                info.software_version
                    .clone()
                    .unwrap_or_else(|| "Unknown".to_string()),
            ),
            connected_bn: Some(info.connected_bn.clone().unwrap_or_else(|| "None".to_string())),
            hardware: Some(info.part_number.clone().unwrap_or_else(|| "Unknown".to_string())),
            carrier_mode: Some(
                info.multi_carrier_mode_rn
                    .clone()
                    .unwrap_or_else(|| "Unknown".to_string()),
            ),
            frequencies: info.frequencies(),
            speed_test: None,
            hostname: None,
        }
    }

    /// Snapshot carrying only a speed test summary.
    pub fn with_speed_test(summary: SpeedTestSummary) -> Self {
        Self {
            speed_test: Some(summary),
            ..Default::default()
        }
    }

    /// Snapshot carrying only a firmware version.
    pub fn with_firmware(firmware: impl Into<String>) -> Self {
        Self {
            firmware: Some(firmware.into()),
            ..Default::default()
        }
    }

    /// Snapshot carrying only a hostname.
    pub fn with_hostname(hostname: impl Into<String>) -> Self {
        Self {
            hostname: Some(hostname.into()),
            ..Default::default()
        }
    }

    /// Fold a delta into this snapshot. Fields set in `delta` overwrite,
    /// fields absent from it are kept.
    pub fn merge(&mut self, delta: &DeviceSnapshot) {
        fn take<T: Clone>(slot: &mut Option<T>, value: &Option<T>) {
            if let Some(value) = value {
                *slot = Some(value.clone());
            }
        }

        take(&mut self.firmware, &delta.firmware);
        take(&mut self.connected_bn, &delta.connected_bn);
        take(&mut self.hardware, &delta.hardware);
        take(&mut self.carrier_mode, &delta.carrier_mode);
        take(&mut self.frequencies, &delta.frequencies);
        take(&mut self.speed_test, &delta.speed_test);
        take(&mut self.hostname, &delta.hostname);
    }

    /// Whether no field is known.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Speed test figures kept in the snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SpeedTestSummary {
    /// Downlink throughput (Mbps).
    pub downlink_mbps: f64,
    /// Uplink throughput (Mbps).
    pub uplink_mbps: f64,
    /// Latency (ms).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<f64>,
    /// Downlink SNR (dB).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub downlink_snr: Option<f64>,
    /// Uplink SNR (dB).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uplink_snr: Option<f64>,
}

impl SpeedTestSummary {
    /// Summary of a single result. Missing throughput counts as zero.
    pub fn from_result(result: &SpeedTestResult) -> Self {
        Self {
            downlink_mbps: result.downlink_mbps().unwrap_or(0.0),
            uplink_mbps: result.uplink_mbps().unwrap_or(0.0),
            latency_ms: result.latency_millis,
            downlink_snr: result.downlink_snr,
            uplink_snr: result.uplink_snr,
        }
    }

    /// Mean over several results, or `None` for an empty slice.
    pub fn average(results: &[SpeedTestResult]) -> Option<Self> {
        if results.is_empty() {
            return None;
        }

        fn mean(values: impl Iterator<Item = Option<f64>>) -> Option<f64> {
            let values: Vec<f64> = values.flatten().collect();
            if values.is_empty() {
                None
            } else {
                Some(values.iter().sum::<f64>() / values.len() as f64)
            }
        }

        Some(Self {
            downlink_mbps: mean(results.iter().map(|r| r.downlink_mbps())).unwrap_or(0.0),
            uplink_mbps: mean(results.iter().map(|r| r.uplink_mbps())).unwrap_or(0.0),
            latency_ms: mean(results.iter().map(|r| r.latency_millis)),
            downlink_snr: mean(results.iter().map(|r| r.downlink_snr)),
            uplink_snr: mean(results.iter().map(|r| r.uplink_snr)),
        })
    }
}

impl fmt::Display for SpeedTestSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1}/{:.1} Mbps", self.downlink_mbps, self.uplink_mbps)
    }
}
