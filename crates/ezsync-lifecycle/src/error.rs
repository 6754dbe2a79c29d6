// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for ezsync-lifecycle.

use ezsync_gateway::GatewayError;
use thiserror::Error;

use crate::directory::DirectoryError;

/// Result type using LifecycleError.
pub type Result<T> = std::result::Result<T, LifecycleError>;

/// Errors from lifecycle operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LifecycleError {
    /// A device API call failed.
    #[error("{serial}: {source}")]
    Gateway {
        /// Device the call was for.
        serial: String,
        /// Underlying gateway error.
        #[source]
        source: GatewayError,
    },

    /// The radio never reported `connected=true`.
    #[error("radio {serial} did not connect after {attempts} attempts")]
    NotConnected {
        /// Device serial number.
        serial: String,
        /// Attempts used.
        attempts: u32,
    },

    /// The radio is connected but reports no base node.
    #[error("no connected BN found for radio {0}")]
    NoConnectedBn(String),

    /// No customer is assigned to the device.
    #[error("no customer information found for radio {0}")]
    CustomerNotFound(String),

    /// The customer record has no coordinates.
    #[error("customer coordinates are missing for radio {0}")]
    MissingCoordinates(String),

    /// Not a single speed test succeeded.
    #[error("no successful speed tests for radio {serial} after {attempts} attempts")]
    NoSuccessfulSpeedTests {
        /// Device serial number.
        serial: String,
        /// Attempts used.
        attempts: u32,
    },

    /// Customer directory failure.
    #[error(transparent)]
    Directory(#[from] DirectoryError),
}

impl LifecycleError {
    /// Wrap a gateway error with the device it concerns.
    pub fn gateway(serial: &str, source: GatewayError) -> Self {
        Self::Gateway {
            serial: serial.to_string(),
            source,
        }
    }
}
