// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! reqwest-backed client for the vendor API.

use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::{RequestBuilder, Response};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::GatewayConfig;
use crate::error::{GatewayError, Result};
use crate::traits::DeviceGateway;
use crate::types::{
    DeviceInfo, Envelope, FirmwareOutcome, FirmwarePackage, Items, RadioConfiguration,
    SpeedTestResult,
};

/// Client for the Tarana cloud radio API.
#[derive(Debug, Clone)]
pub struct TaranaClient {
    http: reqwest::Client,
    config: GatewayConfig,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SpeedTestStarted {
    operation_id: String,
}

#[derive(Debug, Deserialize)]
struct UpgradeItem {
    #[serde(default)]
    error: Option<UpgradeItemError>,
}

#[derive(Debug, Deserialize)]
struct UpgradeItemError {
    #[serde(default)]
    message: Option<String>,
}

impl TaranaClient {
    /// Create a client from configuration.
    pub fn new(config: GatewayConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let api_key = HeaderValue::from_str(&config.api_key)
            .map_err(|e| GatewayError::Config(format!("invalid API key: {}", e)))?;
        headers.insert("x-api-key", api_key);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout)
            .danger_accept_invalid_certs(config.skip_cert_verification)
            .build()
            .map_err(|e| GatewayError::Config(e.to_string()))?;

        Ok(Self { http, config })
    }

    /// Client configuration.
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    fn radio_url(&self, serial: &str) -> String {
        format!("{}/v2/network/radios/{}", self.config.base_url, serial)
    }

    fn v1_url(&self, path: &str) -> String {
        format!("{}/v1/{}", self.config.base_url, path)
    }

    /// Send a request and reject any non-2xx response.
    async fn execute(&self, operation: &'static str, request: RequestBuilder) -> Result<Response> {
        let response = request.send().await?;
        let status = response.status();
        debug!(operation, status = status.as_u16(), "API response");

        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        warn!(operation, status = status.as_u16(), body = %body, "API request failed");
        Err(GatewayError::Http {
            operation,
            status: status.as_u16(),
            body,
        })
    }

    async fn data<T: DeserializeOwned>(response: Response) -> Result<T> {
        let envelope: Envelope<T> = response.json().await?;
        Ok(envelope.data)
    }

    /// List RN-compatible firmware packages, newest first.
    pub async fn list_firmware_packages(&self) -> Result<Vec<FirmwarePackage>> {
        let request = self
            .http
            .get(self.v1_url("network/radios/software-packages"))
            .query(&[
                ("rnCompatible", "true"),
                ("bnCompatible", "false"),
                ("sortOrder", "DESC"),
                ("offset", "0"),
                ("limit", "10"),
            ]);
        let response = self.execute("list software packages", request).await?;
        let items: Items<FirmwarePackage> = Self::data(response).await?;
        Ok(items.items)
    }

    /// The newest package tagged `Stable`.
    pub async fn latest_stable_firmware(&self) -> Result<FirmwarePackage> {
        self.list_firmware_packages()
            .await?
            .into_iter()
            .find(FirmwarePackage::is_stable)
            .ok_or_else(|| {
                GatewayError::UnexpectedResponse("no stable firmware package found".to_string())
            })
    }
}

/// Whether an upgrade rejection means the target version is already active.
fn already_active(message: &str) -> bool {
    message.contains("Software could not be installed") && message.contains("it is currently active")
}

#[async_trait]
impl DeviceGateway for TaranaClient {
    async fn get_device_status(&self, serial: &str) -> Result<DeviceInfo> {
        let request = self.http.get(self.radio_url(serial));
        let response = self.execute("get radio", request).await?;
        Self::data(response).await
    }

    async fn apply_configuration(&self, serial: &str, config: &RadioConfiguration) -> Result<()> {
        let mut payload = config.clone();
        if payload.cpi_id.is_empty() {
            payload.cpi_id = self.config.cpi_id.clone();
        }

        debug!(serial, host_name = %payload.host_name, "Applying configuration");
        let request = self.http.patch(self.radio_url(serial)).json(&payload);
        self.execute("apply configuration", request).await?;
        Ok(())
    }

    async fn reboot(&self, serial: &str) -> Result<()> {
        let request = self
            .http
            .post(self.v1_url(&format!("network/radios/{}/reboot", serial)));
        self.execute("reboot", request).await?;
        Ok(())
    }

    async fn reconnect(&self, serial: &str) -> Result<()> {
        let request = self
            .http
            .post(self.v1_url(&format!("network/radios/{}/reconnect", serial)));
        self.execute("reconnect", request).await?;
        Ok(())
    }

    async fn request_firmware_upgrade(&self, serial: &str) -> Result<FirmwareOutcome> {
        let target = self.latest_stable_firmware().await?;

        // The package id embeds the version string, so containment means the
        // radio already runs the target.
        let current = match self.get_device_status(serial).await {
            Ok(info) => info.software_version,
            Err(e) => {
                warn!(serial, error = %e, "Could not read current firmware version");
                None
            }
        };
        if let Some(current) = current.as_deref()
            && !current.is_empty()
            && target.id.contains(current)
        {
            info!(serial, version = current, "Radio already runs target firmware");
            return Ok(FirmwareOutcome::Skipped);
        }

        let payload = serde_json::json!({
            "serialNumbers": [serial],
            "packageId": target.id,
            "activate": true,
            "factory": false,
        });
        let request = self
            .http
            .post(self.v1_url("network/radios/upgrade"))
            .json(&payload);
        let response = self.execute("firmware upgrade", request).await?;
        let body = response.text().await?;

        // A 2xx can still carry a per-radio error in data.items[0].error.
        let items = serde_json::from_str::<Envelope<Items<UpgradeItem>>>(&body)
            .map(|e| e.data.items)
            .unwrap_or_default();
        if let Some(message) = items
            .into_iter()
            .next()
            .and_then(|item| item.error)
            .map(|error| error.message.unwrap_or_else(|| "Unknown error".to_string()))
        {
            if already_active(&message) {
                info!(serial, "Target firmware is already active");
                return Ok(FirmwareOutcome::Skipped);
            }
            return Err(GatewayError::Rejected {
                operation: "firmware upgrade",
                message,
            });
        }

        info!(serial, package_id = %target.id, "Firmware upgrade initiated");
        Ok(FirmwareOutcome::Applied)
    }

    async fn start_speed_test(&self, serial: &str) -> Result<String> {
        let request = self
            .http
            .post(self.v1_url(&format!("network/radios/{}/speed-test", serial)));
        let response = self.execute("start speed test", request).await?;
        let started: SpeedTestStarted = Self::data(response).await?;
        debug!(serial, operation_id = %started.operation_id, "Speed test started");
        Ok(started.operation_id)
    }

    async fn poll_speed_test(&self, operation_id: &str, serial: &str) -> Result<SpeedTestResult> {
        let request = self
            .http
            .get(self.v1_url(&format!("operations/speed-test/id/{}", operation_id)))
            .query(&[("serialNumber", serial)]);
        let response = self.execute("poll speed test", request).await?;
        let body: Value = response.json().await?;

        // Results arrive either wrapped in "data" or as the root object.
        let result = match body.get("data") {
            Some(data) => data.clone(),
            None => body,
        };
        Ok(serde_json::from_value(result)?)
    }

    async fn delete_devices(&self, serials: &[String]) -> Result<()> {
        let payload = serde_json::json!({ "serialNumbers": serials });
        let request = self
            .http
            .post(self.v1_url("network/radios/delete"))
            .json(&payload);
        self.execute("delete radios", request).await?;
        Ok(())
    }
}
