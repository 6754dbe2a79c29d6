// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Request and response types for the vendor API.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Radio information as returned by `GET /v2/network/radios/{serial}`.
///
/// Works for both remote nodes (RN) and base nodes (BN). Only the fields
/// the workflows read are typed; everything else is kept in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    /// Device serial number.
    #[serde(default)]
    pub serial_number: Option<String>,
    /// Configured hostname.
    #[serde(default)]
    pub host_name: Option<String>,
    /// Whether the radio is currently connected to the network.
    #[serde(default)]
    pub connected: Option<bool>,
    /// Serial number of the base node the radio is connected through.
    #[serde(default, deserialize_with = "lenient_string")]
    pub connected_bn: Option<String>,
    /// Running software version.
    #[serde(default, deserialize_with = "lenient_string")]
    pub software_version: Option<String>,
    /// Hardware part number.
    #[serde(default, deserialize_with = "lenient_string")]
    pub part_number: Option<String>,
    /// Multi-carrier mode of the RN.
    #[serde(default, deserialize_with = "lenient_string")]
    pub multi_carrier_mode_rn: Option<String>,
    /// Carrier table keyed by carrier index ("0", "1").
    #[serde(default)]
    pub carriers: Option<BTreeMap<String, Carrier>>,
    /// Latitude in decimal degrees.
    #[serde(default, deserialize_with = "lenient_f64")]
    pub latitude: Option<f64>,
    /// Longitude in decimal degrees.
    #[serde(default, deserialize_with = "lenient_f64")]
    pub longitude: Option<f64>,
    /// Any other fields returned by the API.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl DeviceInfo {
    /// Whether the API reports the radio as connected.
    pub fn is_connected(&self) -> bool {
        self.connected == Some(true)
    }

    /// Format carriers `0` and `1` as `"<f0> MHz/<bw0> MHz, <f1> MHz/<bw1> MHz"`.
    ///
    /// Frequencies are reported by the API in kHz.
    pub fn frequencies(&self) -> Option<String> {
        let carriers = self.carriers.as_ref()?;
        let first = carriers.get("0")?;
        let second = carriers.get("1")?;
        Some(format!("{}, {}", first.describe(), second.describe()))
    }

    /// Look up a raw field by its wire (camelCase) name.
    pub fn field(&self, key: &str) -> Option<Value> {
        let value = serde_json::to_value(self).ok()?;
        value.get(key).filter(|v| !v.is_null()).cloned()
    }
}

/// A single carrier entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Carrier {
    /// Center frequency in kHz.
    #[serde(default, deserialize_with = "lenient_f64")]
    pub frequency: Option<f64>,
    /// Bandwidth in MHz.
    #[serde(default, deserialize_with = "lenient_f64")]
    pub bandwidth: Option<f64>,
}

impl Carrier {
    fn describe(&self) -> String {
        let frequency_mhz = self.frequency.unwrap_or(0.0) / 1000.0;
        let bandwidth = self.bandwidth.unwrap_or(0.0);
        format!("{} MHz/{} MHz", frequency_mhz, bandwidth)
    }
}

/// Configuration payload for `PATCH /v2/network/radios/{serial}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RadioConfiguration {
    /// Hostname to assign.
    pub host_name: String,
    /// Installation latitude.
    pub latitude: f64,
    /// Installation longitude.
    pub longitude: f64,
    /// Data VLAN. Omitted from the payload when `None`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_vlan: Option<String>,
    /// Primary base node serial number.
    pub primary_bn: String,
    /// Height above ground level in meters.
    pub height_agl: f64,
    /// Antenna tilt in degrees.
    pub tilt: f64,
    /// Antenna azimuth in degrees from true north.
    pub antenna_azimuth: f64,
    /// CPI identifier. Filled from the client configuration when empty.
    pub cpi_id: String,
}

impl RadioConfiguration {
    /// Default configuration with zeroed geo and antenna fields.
    pub fn defaults(host_name: impl Into<String>) -> Self {
        Self {
            host_name: host_name.into(),
            latitude: 0.0,
            longitude: 0.0,
            data_vlan: Some(String::new()),
            primary_bn: String::new(),
            height_agl: 0.0,
            tilt: 0.0,
            antenna_azimuth: 0.0,
            cpi_id: String::new(),
        }
    }

    /// Customer deployment configuration.
    pub fn deployment(
        host_name: impl Into<String>,
        latitude: f64,
        longitude: f64,
        antenna_azimuth: f64,
        primary_bn: impl Into<String>,
    ) -> Self {
        Self {
            host_name: host_name.into(),
            latitude,
            longitude,
            data_vlan: Some(String::new()),
            primary_bn: primary_bn.into(),
            height_agl: 9.0,
            tilt: 0.0,
            antenna_azimuth,
            cpi_id: String::new(),
        }
    }
}

/// Result of a firmware upgrade request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FirmwareOutcome {
    /// An upgrade was initiated; the radio will reboot.
    Applied,
    /// The radio already runs the target version; nothing to do.
    Skipped,
}

/// A firmware package from the software package catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FirmwarePackage {
    /// Package identifier (e.g. `SYS.A3.R10.XXX.3.622.005.00`).
    pub id: String,
    /// Package tags (e.g. `Stable`).
    #[serde(default)]
    pub tags: Vec<PackageTag>,
}

impl FirmwarePackage {
    /// Whether the package carries the `Stable` tag.
    pub fn is_stable(&self) -> bool {
        self.tags.iter().any(|t| t.name == "Stable")
    }
}

/// A tag attached to a firmware package.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageTag {
    /// Tag name.
    pub name: String,
}

/// Speed test operation status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SpeedTestStatus {
    /// Waiting to run.
    Queued,
    /// Running.
    Running,
    /// Finished successfully.
    Completed,
    /// Finished with an error.
    Failed,
    /// Cancelled by the platform.
    Cancelled,
    /// Timed out on the platform.
    Timeout,
    /// Platform error.
    Error,
    /// Any other status string.
    #[serde(other)]
    Unknown,
}

impl SpeedTestStatus {
    /// Whether the status is final.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed | Self::Cancelled | Self::Timeout | Self::Error
        )
    }
}

/// Result of a speed test operation.
///
/// Throughput figures are in kbps.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeedTestResult {
    /// Operation status.
    #[serde(default)]
    pub status: Option<SpeedTestStatus>,
    /// Operation identifier.
    #[serde(default)]
    pub operation_id: Option<String>,
    /// Serial number of the tested radio.
    #[serde(default)]
    pub serial_number: Option<String>,
    /// Serial number of the base node used for the test.
    #[serde(default)]
    pub bn_serial_number: Option<String>,
    /// Unix timestamp in milliseconds.
    #[serde(default)]
    pub timestamp: Option<i64>,
    /// Downlink throughput (kbps).
    #[serde(default, deserialize_with = "lenient_f64")]
    pub downlink_throughput: Option<f64>,
    /// Uplink throughput (kbps).
    #[serde(default, deserialize_with = "lenient_f64")]
    pub uplink_throughput: Option<f64>,
    /// Downlink SNR (dB).
    #[serde(default, deserialize_with = "lenient_f64")]
    pub downlink_snr: Option<f64>,
    /// Uplink SNR (dB).
    #[serde(default, deserialize_with = "lenient_f64")]
    pub uplink_snr: Option<f64>,
    /// Path loss (dB).
    #[serde(default, deserialize_with = "lenient_f64")]
    pub pathloss: Option<f64>,
    /// Round-trip latency (ms).
    #[serde(default, deserialize_with = "lenient_f64")]
    pub latency_millis: Option<f64>,
    /// RF link distance (m).
    #[serde(default, deserialize_with = "lenient_f64")]
    pub rf_link_distance: Option<f64>,
    /// Primary carrier frequency (kHz).
    #[serde(default, deserialize_with = "lenient_f64")]
    pub frequency0: Option<f64>,
    /// Secondary carrier frequency (kHz).
    #[serde(default, deserialize_with = "lenient_f64")]
    pub frequency1: Option<f64>,
    /// Primary carrier bandwidth (MHz).
    #[serde(default, deserialize_with = "lenient_f64")]
    pub bandwidth0: Option<f64>,
    /// Secondary carrier bandwidth (MHz).
    #[serde(default, deserialize_with = "lenient_f64")]
    pub bandwidth1: Option<f64>,
    /// Reason reported for a failed test.
    #[serde(default)]
    pub failure_reason: Option<String>,
}

impl SpeedTestResult {
    /// Whether polling can stop.
    ///
    /// A result without a status but with throughput figures is treated as
    /// finished.
    pub fn is_terminal(&self) -> bool {
        match self.status {
            Some(status) => status.is_terminal(),
            None => self.downlink_throughput.is_some() || self.uplink_throughput.is_some(),
        }
    }

    /// Whether this result counts as a successful test.
    pub fn is_success(&self) -> bool {
        self.status == Some(SpeedTestStatus::Completed) && self.downlink_throughput.is_some()
    }

    /// Downlink throughput in Mbps.
    pub fn downlink_mbps(&self) -> Option<f64> {
        self.downlink_throughput.map(|v| v / 1000.0)
    }

    /// Uplink throughput in Mbps.
    pub fn uplink_mbps(&self) -> Option<f64> {
        self.uplink_throughput.map(|v| v / 1000.0)
    }
}

/// `{"data": ...}` response envelope.
#[derive(Debug, Deserialize)]
pub(crate) struct Envelope<T> {
    pub data: T,
}

/// `{"items": [...]}` list payload.
#[derive(Debug, Deserialize)]
pub(crate) struct Items<T> {
    pub items: Vec<T>,
}

/// Accept strings, numbers and booleans as a string.
fn lenient_string<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(Value::Bool(b)) => Some(b.to_string()),
        _ => None,
    })
}

/// Accept numbers and numeric strings as `f64`.
fn lenient_f64<'de, D>(deserializer: D) -> std::result::Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_device_info_from_api_payload() {
        let info: DeviceInfo = serde_json::from_value(json!({
            "serialNumber": "S150F2224000123",
            "hostName": "IN_REFURBISHMENT",
            "connected": true,
            "connectedBn": "S130F2221000050",
            "softwareVersion": "SYS.A3.R10.XXX.3.622.005.00",
            "partNumber": "RN-2000",
            "multiCarrierModeRn": 2,
            "carriers": {
                "0": {"frequency": 3650000, "bandwidth": 40},
                "1": {"frequency": 3690000, "bandwidth": 40}
            },
            "latitude": "37.79",
            "longitude": -120.99,
            "tilt": 0
        }))
        .unwrap();

        assert!(info.is_connected());
        assert_eq!(info.connected_bn.as_deref(), Some("S130F2221000050"));
        assert_eq!(info.multi_carrier_mode_rn.as_deref(), Some("2"));
        assert_eq!(info.latitude, Some(37.79));
        assert_eq!(
            info.frequencies().as_deref(),
            Some("3650 MHz/40 MHz, 3690 MHz/40 MHz")
        );
        assert_eq!(info.field("tilt"), Some(json!(0)));
        assert_eq!(info.field("hostName"), Some(json!("IN_REFURBISHMENT")));
    }

    #[test]
    fn test_device_info_missing_fields() {
        let info: DeviceInfo = serde_json::from_value(json!({})).unwrap();
        assert!(!info.is_connected());
        assert!(info.frequencies().is_none());
        assert!(info.field("hostName").is_none());
    }

    #[test]
    fn test_frequencies_require_both_carriers() {
        let info: DeviceInfo = serde_json::from_value(json!({
            "carriers": {"0": {"frequency": 3650000, "bandwidth": 40}}
        }))
        .unwrap();
        assert!(info.frequencies().is_none());
    }

    #[test]
    fn test_default_configuration_payload() {
        let payload = serde_json::to_value(RadioConfiguration::defaults("IN_REFURBISHMENT")).unwrap();
        assert_eq!(payload["hostName"], "IN_REFURBISHMENT");
        assert_eq!(payload["latitude"], 0.0);
        assert_eq!(payload["dataVlan"], "");
        assert_eq!(payload["primaryBn"], "");
        assert_eq!(payload["antennaAzimuth"], 0.0);
    }

    #[test]
    fn test_deployment_configuration_payload() {
        let payload = serde_json::to_value(RadioConfiguration::deployment(
            "JANE DOE-42",
            37.5,
            -121.0,
            123.45,
            "BN1",
        ))
        .unwrap();
        assert_eq!(payload["heightAgl"], 9.0);
        assert_eq!(payload["primaryBn"], "BN1");
        assert_eq!(payload["antennaAzimuth"], 123.45);
    }

    #[test]
    fn test_speed_test_terminal_states() {
        for status in ["COMPLETED", "FAILED", "CANCELLED", "TIMEOUT", "ERROR"] {
            let result: SpeedTestResult =
                serde_json::from_value(json!({ "status": status })).unwrap();
            assert!(result.is_terminal(), "{status} should be terminal");
        }

        for status in ["QUEUED", "RUNNING", "SOMETHING_NEW"] {
            let result: SpeedTestResult =
                serde_json::from_value(json!({ "status": status })).unwrap();
            assert!(!result.is_terminal(), "{status} should not be terminal");
        }
    }

    #[test]
    fn test_speed_test_without_status_but_with_throughput() {
        let result: SpeedTestResult =
            serde_json::from_value(json!({ "downlinkThroughput": 50000 })).unwrap();
        assert!(result.is_terminal());
        assert!(!result.is_success());
    }

    #[test]
    fn test_speed_test_success_requires_downlink() {
        let result: SpeedTestResult = serde_json::from_value(json!({
            "status": "COMPLETED",
            "uplinkThroughput": 10000
        }))
        .unwrap();
        assert!(!result.is_success());

        let result: SpeedTestResult = serde_json::from_value(json!({
            "status": "COMPLETED",
            "downlinkThroughput": 50000,
            "uplinkThroughput": 12500
        }))
        .unwrap();
        assert!(result.is_success());
        assert_eq!(result.downlink_mbps(), Some(50.0));
        assert_eq!(result.uplink_mbps(), Some(12.5));
    }

    #[test]
    fn test_firmware_package_stable_tag() {
        let package: FirmwarePackage = serde_json::from_value(json!({
            "id": "SYS.A3.R10.XXX.3.622.005.00",
            "tags": [{"name": "Beta"}, {"name": "Stable"}]
        }))
        .unwrap();
        assert!(package.is_stable());
    }
}
