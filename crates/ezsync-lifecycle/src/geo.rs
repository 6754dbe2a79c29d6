// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Antenna pointing and hostname helpers for deployment.

/// Maximum hostname length accepted by the radio.
pub const MAX_HOSTNAME_LEN: usize = 50;

/// Bearing from the customer site to the base node, in degrees from true
/// north, in `[0, 360)` and rounded to two decimals.
///
/// Uses a flat-earth approximation on raw coordinate differences, which is
/// adequate over the few kilometres of a radio link.
pub fn azimuth(customer_lat: f64, customer_lon: f64, bn_lat: f64, bn_lon: f64) -> f64 {
    let bearing = (bn_lon - customer_lon)
        .atan2(bn_lat - customer_lat)
        .to_degrees();
    let normalised = bearing.rem_euclid(360.0);
    let rounded = (normalised * 100.0).round() / 100.0;
    if rounded >= 360.0 { 0.0 } else { rounded }
}

/// Hostname for a deployed radio: `"<NAME>-<id>"`.
///
/// The name is upper-cased, `/` becomes a space and anything other than
/// alphanumerics and whitespace is dropped. It is cut so the whole hostname
/// fits [`MAX_HOSTNAME_LEN`]. An empty name gives `"CUSTOMER-<id>"`.
pub fn customer_hostname(name: &str, id: &str) -> String {
    let name = name.trim();
    if name.is_empty() {
        return format!("CUSTOMER-{}", id);
    }

    let max_len = MAX_HOSTNAME_LEN.saturating_sub(id.chars().count() + 1);
    let sanitized: String = name
        .to_uppercase()
        .replace('/', " ")
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .take(max_len)
        .collect();

    format!("{}-{}", sanitized.trim_end(), id)
}
