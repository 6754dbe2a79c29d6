// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! HTTP-level tests for `TaranaClient` against a local mock server.

use ezsync_gateway::{
    DeviceGateway, FirmwareOutcome, GatewayConfig, GatewayError, RadioConfiguration,
    SpeedTestStatus, TaranaClient,
};
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer) -> TaranaClient {
    let config = GatewayConfig::new("test-key")
        .with_base_url(server.uri())
        .with_request_timeout(Duration::from_secs(2))
        .with_cpi_id("cpi-1");
    TaranaClient::new(config).unwrap()
}

async fn mount_packages(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/v1/network/radios/software-packages"))
        .and(query_param("rnCompatible", "true"))
        .and(query_param("sortOrder", "DESC"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"items": [
                {"id": "SYS.A3.R10.XXX.3.700.001.00", "tags": [{"name": "Beta"}]},
                {"id": "SYS.A3.R10.XXX.3.622.005.00", "tags": [{"name": "Stable"}]}
            ]}
        })))
        .mount(server)
        .await;
}

async fn mount_radio(server: &MockServer, serial: &str, software_version: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/v2/network/radios/{}", serial)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {
                "serialNumber": serial,
                "hostName": "CUSTOMER",
                "connected": true,
                "softwareVersion": software_version
            }
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_get_device_status_sends_api_key() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v2/network/radios/SN100"))
        .and(header("x-api-key", "test-key"))
        .and(header("accept", "application/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {
                "serialNumber": "SN100",
                "connected": true,
                "connectedBn": "BN7",
                "partNumber": "RN-2000"
            }
        })))
        .mount(&server)
        .await;

    let info = client_for(&server).get_device_status("SN100").await.unwrap();
    assert!(info.is_connected());
    assert_eq!(info.connected_bn.as_deref(), Some("BN7"));
    assert_eq!(info.part_number.as_deref(), Some("RN-2000"));
}

#[tokio::test]
async fn test_non_success_status_is_an_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v2/network/radios/SN404"))
        .respond_with(ResponseTemplate::new(404).set_body_string("not found"))
        .mount(&server)
        .await;

    let err = client_for(&server)
        .get_device_status("SN404")
        .await
        .unwrap_err();
    match err {
        GatewayError::Http { status, body, .. } => {
            assert_eq!(status, 404);
            assert_eq!(body, "not found");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_undecodable_body_is_an_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v2/network/radios/SN1"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
        .mount(&server)
        .await;

    let result = client_for(&server).get_device_status("SN1").await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_apply_configuration_fills_cpi_id() {
    let server = MockServer::start().await;

    Mock::given(method("PATCH"))
        .and(path("/v2/network/radios/SN1"))
        .and(body_json(json!({
            "hostName": "IN_REFURBISHMENT",
            "latitude": 0.0,
            "longitude": 0.0,
            "dataVlan": "",
            "primaryBn": "",
            "heightAgl": 0.0,
            "tilt": 0.0,
            "antennaAzimuth": 0.0,
            "cpiId": "cpi-1"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {}})))
        .expect(1)
        .mount(&server)
        .await;

    client_for(&server)
        .apply_configuration("SN1", &RadioConfiguration::defaults("IN_REFURBISHMENT"))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_reboot_and_reconnect_endpoints() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/network/radios/SN1/reboot"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/network/radios/SN1/reconnect"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let client = client_for(&server);
    client.reboot("SN1").await.unwrap();
    assert!(client.reconnect("SN1").await.is_err());
}

#[tokio::test]
async fn test_firmware_upgrade_applied() {
    let server = MockServer::start().await;
    mount_packages(&server).await;
    mount_radio(&server, "SN1", "3.600.001").await;

    Mock::given(method("POST"))
        .and(path("/v1/network/radios/upgrade"))
        .and(body_json(json!({
            "serialNumbers": ["SN1"],
            "packageId": "SYS.A3.R10.XXX.3.622.005.00",
            "activate": true,
            "factory": false
        })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"data": {"items": [{"serialNumber": "SN1"}]}})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let outcome = client_for(&server)
        .request_firmware_upgrade("SN1")
        .await
        .unwrap();
    assert_eq!(outcome, FirmwareOutcome::Applied);
}

#[tokio::test]
async fn test_firmware_upgrade_skipped_when_version_matches() {
    let server = MockServer::start().await;
    mount_packages(&server).await;
    mount_radio(&server, "SN1", "3.622.005").await;

    Mock::given(method("POST"))
        .and(path("/v1/network/radios/upgrade"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let outcome = client_for(&server)
        .request_firmware_upgrade("SN1")
        .await
        .unwrap();
    assert_eq!(outcome, FirmwareOutcome::Skipped);
}

#[tokio::test]
async fn test_firmware_upgrade_already_active_is_skipped() {
    let server = MockServer::start().await;
    mount_packages(&server).await;
    mount_radio(&server, "SN1", "3.600.001").await;

    Mock::given(method("POST"))
        .and(path("/v1/network/radios/upgrade"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"items": [{"error": {
                "message": "Software could not be installed because it is currently active"
            }}]}
        })))
        .mount(&server)
        .await;

    let outcome = client_for(&server)
        .request_firmware_upgrade("SN1")
        .await
        .unwrap();
    assert_eq!(outcome, FirmwareOutcome::Skipped);
}

#[tokio::test]
async fn test_firmware_upgrade_item_error_is_rejected() {
    let server = MockServer::start().await;
    mount_packages(&server).await;
    mount_radio(&server, "SN1", "3.600.001").await;

    Mock::given(method("POST"))
        .and(path("/v1/network/radios/upgrade"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"items": [{"error": {"message": "Radio offline"}}]}
        })))
        .mount(&server)
        .await;

    let err = client_for(&server)
        .request_firmware_upgrade("SN1")
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::Rejected { ref message, .. } if message == "Radio offline"));
}

#[tokio::test]
async fn test_speed_test_start_and_poll() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/network/radios/SN1/speed-test"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"data": {"operationId": "op-77"}})),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/operations/speed-test/id/op-77"))
        .and(query_param("serialNumber", "SN1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {
                "status": "COMPLETED",
                "downlinkThroughput": 50000,
                "uplinkThroughput": "12500",
                "latencyMillis": 11
            }
        })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let operation_id = client.start_speed_test("SN1").await.unwrap();
    assert_eq!(operation_id, "op-77");

    let result = client.poll_speed_test(&operation_id, "SN1").await.unwrap();
    assert!(result.is_success());
    assert_eq!(result.uplink_mbps(), Some(12.5));
    assert_eq!(result.latency_millis, Some(11.0));
}

#[tokio::test]
async fn test_speed_test_poll_without_envelope() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/operations/speed-test/id/op-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "RUNNING"})))
        .mount(&server)
        .await;

    let result = client_for(&server)
        .poll_speed_test("op-1", "SN1")
        .await
        .unwrap();
    assert_eq!(result.status, Some(SpeedTestStatus::Running));
    assert!(!result.is_terminal());
}

#[tokio::test]
async fn test_delete_devices() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/network/radios/delete"))
        .and(body_json(json!({"serialNumbers": ["SN1", "SN2"]})))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    client_for(&server)
        .delete_devices(&["SN1".to_string(), "SN2".to_string()])
        .await
        .unwrap();
}
