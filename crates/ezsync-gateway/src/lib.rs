// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! ezSync Gateway
//!
//! Typed client for the Tarana cloud radio API.
//!
//! Every call is a single network round trip with a fixed timeout. Calls
//! fail closed: non-2xx responses, transport errors and undecodable bodies
//! all surface as [`GatewayError`], and callers treat them identically.
//!
//! # Example
//!
//! ```no_run
//! use ezsync_gateway::{DeviceGateway, GatewayConfig, TaranaClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = TaranaClient::new(GatewayConfig::from_env()?)?;
//!
//! let info = client.get_device_status("S150F2224000123").await?;
//! println!("connected: {}", info.is_connected());
//! # Ok(())
//! # }
//! ```
//!
//! # Modules
//!
//! - [`config`]: Gateway configuration from environment variables
//! - [`error`]: Error taxonomy for gateway calls
//! - [`types`]: Wire types (device info, configuration payloads, speed tests)
//! - [`client`]: The reqwest-backed [`TaranaClient`]
//! - [`mock`]: Scripted [`MockGateway`] for tests

#![deny(missing_docs)]

/// HTTP client for the vendor API.
pub mod client;

/// Gateway configuration loaded from environment variables.
pub mod config;

/// Error types for gateway calls.
pub mod error;

/// Scripted in-memory gateway for tests.
pub mod mock;

/// The `DeviceGateway` trait seam.
mod traits;

/// Request and response types.
pub mod types;

pub use client::TaranaClient;
pub use config::{ConfigError, GatewayConfig};
pub use error::{GatewayError, Result};
pub use mock::{
    MockCall, MockDevice, MockFirmware, MockGateway, NEVER, speed_test_completed, speed_test_failed,
};
pub use traits::DeviceGateway;
pub use types::{
    Carrier, DeviceInfo, FirmwareOutcome, FirmwarePackage, RadioConfiguration, SpeedTestResult,
    SpeedTestStatus,
};
