// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for ezsync-gateway.

use thiserror::Error;

/// Result type using GatewayError.
pub type Result<T> = std::result::Result<T, GatewayError>;

/// Errors that can occur when calling the vendor API.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum GatewayError {
    /// Client configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Connection to the API failed.
    #[error("connection error: {0}")]
    Connection(String),

    /// Request timed out.
    #[error("request timed out: {0}")]
    Timeout(String),

    /// The API answered with a non-success status code.
    #[error("{operation} failed with HTTP {status}: {body}")]
    Http {
        /// Operation that was attempted.
        operation: &'static str,
        /// HTTP status code.
        status: u16,
        /// Response body, as text.
        body: String,
    },

    /// The API accepted the request but reported an error for the device.
    #[error("{operation} rejected: {message}")]
    Rejected {
        /// Operation that was attempted.
        operation: &'static str,
        /// Error message reported by the API.
        message: String,
    },

    /// Unexpected response shape.
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            GatewayError::Timeout(err.to_string())
        } else if err.is_decode() {
            GatewayError::Serialization(err.to_string())
        } else {
            GatewayError::Connection(err.to_string())
        }
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(err: serde_json::Error) -> Self {
        GatewayError::Serialization(err.to_string())
    }
}

impl From<crate::config::ConfigError> for GatewayError {
    fn from(err: crate::config::ConfigError) -> Self {
        GatewayError::Config(err.to_string())
    }
}
