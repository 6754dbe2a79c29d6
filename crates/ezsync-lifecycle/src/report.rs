// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Operator-facing text reports.

use std::fmt::Write as _;

use chrono::DateTime;
use ezsync_gateway::{DeviceInfo, SpeedTestResult};
use serde_json::Value;

/// Placeholder for missing values.
pub const NOT_AVAILABLE: &str = "N/A";

const RULE: &str = "==================================================";

const STATUS_FIELDS: [(&str, &str); 12] = [
    ("Serial Number", "serialNumber"),
    ("Hostname", "hostName"),
    ("Online", "online"),
    ("Status", "status"),
    ("Last Seen", "lastSeen"),
    ("Latitude", "latitude"),
    ("Longitude", "longitude"),
    ("Primary BN", "primaryBn"),
    ("AGL Height", "heightAgl"),
    ("Antenna Azimuth", "antennaAzimuth"),
    ("Antenna Tilt", "tilt"),
    ("CPI ID", "cpiId"),
];

fn value_text(value: Option<Value>) -> String {
    match value {
        None | Some(Value::Null) => NOT_AVAILABLE.to_string(),
        Some(Value::String(s)) => s,
        Some(other) => other.to_string(),
    }
}

fn num(value: Option<f64>) -> String {
    value
        .map(|v| format!("{:.2}", v))
        .unwrap_or_else(|| NOT_AVAILABLE.to_string())
}

fn mean(values: impl Iterator<Item = Option<f64>>) -> Option<f64> {
    let values: Vec<f64> = values.flatten().collect();
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Status report for one radio.
pub fn format_status(info: &DeviceInfo) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", RULE);
    let _ = writeln!(
        out,
        "Radio Status: {}",
        info.serial_number.as_deref().unwrap_or("Unknown")
    );
    let _ = writeln!(out, "{}", RULE);
    for (label, key) in STATUS_FIELDS {
        let _ = writeln!(out, "{}: {}", label, value_text(info.field(key)));
    }
    out
}

/// Detailed view of a single speed test result.
pub fn format_speed_test(result: &SpeedTestResult) -> String {
    let text = |v: Option<&str>| v.unwrap_or(NOT_AVAILABLE).to_string();
    let mut out = String::new();
    let _ = writeln!(out, "Speed Test Results:");
    let _ = writeln!(out, "{}", RULE);
    let _ = writeln!(out, "Serial Number: {}", text(result.serial_number.as_deref()));
    let _ = writeln!(out, "Operation ID: {}", text(result.operation_id.as_deref()));
    let status = result
        .status
        .and_then(|s| serde_json::to_value(s).ok())
        .map(|v| value_text(Some(v)))
        .unwrap_or_else(|| NOT_AVAILABLE.to_string());
    let _ = writeln!(out, "Status: {}", status);
    if let Some(bn) = &result.bn_serial_number {
        let _ = writeln!(out, "Connected BN: {}", bn);
    }
    if let Some(ts) = result.timestamp.and_then(DateTime::from_timestamp_millis) {
        let _ = writeln!(out, "Timestamp: {}", ts.format("%Y-%m-%d %H:%M:%S UTC"));
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "Downlink Speed: {} Mbps", num(result.downlink_mbps()));
    let _ = writeln!(out, "Uplink Speed: {} Mbps", num(result.uplink_mbps()));
    let _ = writeln!(out, "Latency: {} ms", num(result.latency_millis));

    let _ = writeln!(out);
    let _ = writeln!(out, "Signal Information:");
    let _ = writeln!(out, "Downlink SNR: {} dB", num(result.downlink_snr));
    let _ = writeln!(out, "Uplink SNR: {} dB", num(result.uplink_snr));
    let _ = writeln!(out, "Path Loss: {} dB", num(result.pathloss));

    let _ = writeln!(out);
    let _ = writeln!(out, "Link Information:");
    let _ = writeln!(
        out,
        "Primary Frequency: {} MHz",
        num(result.frequency0.map(|f| f / 1000.0))
    );
    let _ = writeln!(
        out,
        "Secondary Frequency: {} MHz",
        num(result.frequency1.map(|f| f / 1000.0))
    );
    let _ = writeln!(out, "Primary Bandwidth: {} MHz", num(result.bandwidth0));
    let _ = writeln!(out, "Secondary Bandwidth: {} MHz", num(result.bandwidth1));
    let _ = writeln!(out, "RF Link Distance: {} meters", num(result.rf_link_distance));

    if let Some(reason) = &result.failure_reason {
        let _ = writeln!(out);
        let _ = writeln!(out, "Failure Reason: {}", reason);
    }
    let _ = writeln!(out, "{}", RULE);
    out
}

/// One row per successful test.
pub fn format_speed_test_table(results: &[SpeedTestResult]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "================== INDIVIDUAL TESTS =================");
    let _ = writeln!(
        out,
        "#  | DL (Mbps) | UL (Mbps) | Latency (ms) | DL SNR | UL SNR | Path Loss | RF Dist"
    );
    let _ = writeln!(out, "{}", "-".repeat(83));
    for (i, r) in results.iter().enumerate() {
        let _ = writeln!(
            out,
            "{:<3}| {:^10}| {:^10}| {:^13}| {:^7}| {:^7}| {:^10}| {:>5} m",
            i + 1,
            num(r.downlink_mbps()),
            num(r.uplink_mbps()),
            num(r.latency_millis),
            num(r.downlink_snr),
            num(r.uplink_snr),
            num(r.pathloss),
            num(r.rf_link_distance),
        );
    }
    let _ = writeln!(out, "=====================================================");
    out
}

/// Averaged figures over the successful tests.
pub fn format_speed_test_average(results: &[SpeedTestResult]) -> String {
    let avg = |f: fn(&SpeedTestResult) -> Option<f64>| num(mean(results.iter().map(f)));

    let mut out = String::new();
    let _ = writeln!(out, "Average Speed Test Results:");
    let _ = writeln!(out, "{}", RULE);
    let _ = writeln!(out, "Number of successful tests: {}", results.len());
    let _ = writeln!(out, "Average Downlink Speed: {} Mbps", avg(|r| r.downlink_mbps()));
    let _ = writeln!(out, "Average Uplink Speed: {} Mbps", avg(|r| r.uplink_mbps()));
    let _ = writeln!(out, "Average Latency: {} ms", avg(|r| r.latency_millis));
    let _ = writeln!(out);
    let _ = writeln!(out, "Signal Information:");
    let _ = writeln!(out, "Average Downlink SNR: {} dB", avg(|r| r.downlink_snr));
    let _ = writeln!(out, "Average Uplink SNR: {} dB", avg(|r| r.uplink_snr));
    let _ = writeln!(out, "Average Path Loss: {} dB", avg(|r| r.pathloss));
    let _ = writeln!(out, "Average RF Link Distance: {} meters", avg(|r| r.rf_link_distance));
    let _ = writeln!(out, "{}", RULE);
    out
}
