// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Sequential lifecycle operations.
//!
//! Each operation handles one device at a time and prints an operator
//! report on stdout. Diagnostics go through `tracing`.

use std::sync::Arc;
use std::time::Duration;

use ezsync_core::config::{PollBudget, RefurbishOptions, SpeedTestAggregation, WorkflowTimings};
use ezsync_core::polling::{self, ProbeState, SpeedTestEvent, SpeedTestSeries};
use ezsync_core::progress;
use ezsync_core::workflow::RefurbishWorkflow;
use ezsync_gateway::{DeviceGateway, DeviceInfo, RadioConfiguration};
use tracing::{debug, error, info, warn};

use crate::directory::CustomerDirectory;
use crate::error::{LifecycleError, Result};
use crate::geo::{azimuth, customer_hostname};
use crate::report;

/// Hostname applied when a radio is reclaimed.
pub const RECLAIMED_HOSTNAME: &str = "RECLAIMED";

/// Wait after forcing a reconnect during a reclaim.
pub const RECLAIM_SETTLE: Duration = Duration::from_secs(30);

/// Connection polling used before deploying a radio.
pub const DEPLOY_CONNECT: PollBudget = PollBudget::new(Duration::from_secs(30), 20);

/// Reset a radio to the default configuration and force it to reconnect.
pub async fn reclaim(gateway: &dyn DeviceGateway, serial: &str, hostname: &str) -> Result<()> {
    info!(device_id = %serial, hostname, "Reclaiming radio");
    println!("Applying default configuration to radio {} (hostname {})", serial, hostname);
    gateway
        .apply_configuration(serial, &RadioConfiguration::defaults(hostname))
        .await
        .map_err(|e| LifecycleError::gateway(serial, e))?;

    println!("Forcing reconnection for radio {}", serial);
    gateway
        .reconnect(serial)
        .await
        .map_err(|e| LifecycleError::gateway(serial, e))?;

    println!("Waiting {} seconds after reconnection...", RECLAIM_SETTLE.as_secs());
    tokio::time::sleep(RECLAIM_SETTLE).await;

    println!("Successfully reclaimed radio {}", serial);
    Ok(())
}

/// Remove radios from the account in one request.
///
/// With `force`, every radio is reclaimed first. Reclaim failures are
/// reported but do not stop the deletion.
pub async fn delete(gateway: &dyn DeviceGateway, serials: &[String], force: bool) -> Result<()> {
    if force {
        for serial in serials {
            if let Err(e) = reclaim(gateway, serial, RECLAIMED_HOSTNAME).await {
                warn!(device_id = %serial, error = %e, "Reclaim before delete failed");
                println!("Failed to reclaim radio {}: {}", serial, e);
            }
        }
    }

    info!(count = serials.len(), force, "Deleting radios");
    gateway
        .delete_devices(serials)
        .await
        .map_err(|e| LifecycleError::gateway(&serials.join(","), e))?;

    println!("Deleted {} radio(s): {}", serials.len(), serials.join(", "));
    Ok(())
}

/// Apply the default configuration, using the serial number as hostname.
pub async fn apply_default(gateway: &dyn DeviceGateway, serial: &str) -> Result<()> {
    info!(device_id = %serial, "Applying default configuration");
    gateway
        .apply_configuration(serial, &RadioConfiguration::defaults(serial))
        .await
        .map_err(|e| LifecycleError::gateway(serial, e))?;
    println!("Applied default configuration to radio {}", serial);
    Ok(())
}

/// Fetch a radio's status and print the report.
pub async fn status_report(gateway: &dyn DeviceGateway, serial: &str) -> Result<DeviceInfo> {
    let info = gateway
        .get_device_status(serial)
        .await
        .map_err(|e| LifecycleError::gateway(serial, e))?;
    print!("{}", report::format_status(&info));
    Ok(info)
}

/// Run a speed test series and print every result and the averages.
///
/// Fails only when no test succeeded. A shortfall below the required count
/// is reported as a warning.
pub async fn speed_test_report(
    gateway: &dyn DeviceGateway,
    serial: &str,
    timings: &WorkflowTimings,
) -> Result<SpeedTestSeries> {
    println!(
        "Running speed tests until {} succeed (maximum {} attempts, {}s between tests)",
        timings.speed_test_required,
        timings.speed_test_attempts,
        timings.speed_test_pause.as_secs()
    );

    let max = timings.speed_test_attempts;
    let required = timings.speed_test_required;
    let series = polling::run_speed_tests(gateway, serial, timings, |event| match event {
        SpeedTestEvent::Attempt { attempt, successes } => {
            println!(
                "Speed test attempt {}/{} (successful: {}/{})",
                attempt, max, successes, required
            );
        }
        SpeedTestEvent::StartFailed { attempt, error } => {
            warn!(device_id = %serial, attempt, error = %error, "Failed to start speed test");
            println!("Failed to initiate speed test attempt {}", attempt);
        }
        SpeedTestEvent::Waiting { attempt } => {
            debug!(device_id = %serial, attempt, "Waiting for speed test result");
        }
        SpeedTestEvent::NoResult { attempt } => {
            println!("Failed to get results for speed test attempt {}", attempt);
        }
        SpeedTestEvent::Succeeded { result, .. } | SpeedTestEvent::Failed { result, .. } => {
            print!("{}", report::format_speed_test(result));
        }
        SpeedTestEvent::NoThroughput { attempt } => {
            println!(
                "Speed test attempt {} completed without throughput data, not counted",
                attempt
            );
        }
        SpeedTestEvent::Pausing { .. } => {}
    })
    .await;

    if series.successes.is_empty() {
        return Err(LifecycleError::NoSuccessfulSpeedTests {
            serial: serial.to_string(),
            attempts: series.attempts,
        });
    }
    if series.success_count() < required {
        warn!(
            device_id = %serial,
            successes = series.success_count(),
            required,
            "Fewer successful speed tests than required"
        );
        println!(
            "Warning: only {}/{} successful speed tests",
            series.success_count(),
            required
        );
    }

    print!("{}", report::format_speed_test_table(&series.successes));
    print!("{}", report::format_speed_test_average(&series.successes));
    Ok(series)
}

/// Configuration applied by [`deploy`].
#[derive(Debug, Clone, PartialEq)]
pub struct Deployment {
    /// Hostname built from the customer record.
    pub hostname: String,
    /// Customer latitude.
    pub latitude: f64,
    /// Customer longitude.
    pub longitude: f64,
    /// Antenna azimuth towards the base node.
    pub azimuth: f64,
    /// Base node the radio is connected through.
    pub primary_bn: String,
}

/// Configure a radio for the customer it is assigned to.
pub async fn deploy(
    gateway: &dyn DeviceGateway,
    directory: &dyn CustomerDirectory,
    serial: &str,
) -> Result<Deployment> {
    deploy_with_budget(gateway, directory, serial, DEPLOY_CONNECT).await
}

/// [`deploy`] with an explicit connection budget.
pub async fn deploy_with_budget(
    gateway: &dyn DeviceGateway,
    directory: &dyn CustomerDirectory,
    serial: &str,
    connect: PollBudget,
) -> Result<Deployment> {
    println!("Waiting for radio {} to connect...", serial);
    let rn = polling::wait_for_connection(gateway, serial, connect, |probe| {
        if probe.state != ProbeState::Checking {
            debug!(device_id = %serial, attempt = probe.attempt, state = ?probe.state, "Not connected yet");
        }
    })
    .await
    .ok_or_else(|| LifecycleError::NotConnected {
        serial: serial.to_string(),
        attempts: connect.attempts,
    })?;

    let customer = directory
        .lookup_customer_by_device(serial)
        .await?
        .ok_or_else(|| LifecycleError::CustomerNotFound(serial.to_string()))?;
    let (latitude, longitude) = customer
        .coordinates()
        .ok_or_else(|| LifecycleError::MissingCoordinates(serial.to_string()))?;

    let bn_serial = rn
        .connected_bn
        .clone()
        .filter(|bn| !bn.is_empty())
        .ok_or_else(|| LifecycleError::NoConnectedBn(serial.to_string()))?;
    let bn = gateway
        .get_device_status(&bn_serial)
        .await
        .map_err(|e| LifecycleError::gateway(&bn_serial, e))?;

    let azimuth = azimuth(
        latitude,
        longitude,
        bn.latitude.unwrap_or(0.0),
        bn.longitude.unwrap_or(0.0),
    );
    let name = customer.name.as_deref().unwrap_or_default();
    let hostname = customer_hostname(name, &customer.id.to_string());
    let primary_bn = bn.serial_number.clone().unwrap_or(bn_serial);

    info!(
        device_id = %serial,
        customer_id = customer.id,
        hostname = %hostname,
        azimuth,
        primary_bn = %primary_bn,
        "Applying deployment configuration"
    );
    gateway
        .apply_configuration(
            serial,
            &RadioConfiguration::deployment(&hostname, latitude, longitude, azimuth, &primary_bn),
        )
        .await
        .map_err(|e| LifecycleError::gateway(serial, e))?;

    println!("Successfully configured radio {} for deployment", serial);
    println!("Hostname: {}", hostname);
    println!("Location: {}, {}", latitude, longitude);
    println!("Azimuth: {}° (pointing toward BN: {})", azimuth, primary_bn);

    Ok(Deployment {
        hostname,
        latitude,
        longitude,
        azimuth,
        primary_bn,
    })
}

/// Outcome of a sequential refurbishment run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SequentialSummary {
    /// Devices refurbished.
    pub succeeded: Vec<String>,
    /// Devices that failed, with the final message.
    pub failed: Vec<(String, String)>,
}

impl SequentialSummary {
    /// Whether every device succeeded.
    pub fn all_succeeded(&self) -> bool {
        self.failed.is_empty()
    }

    /// Total devices attempted.
    pub fn attempted(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }

    fn record(&mut self, serial: &str, result: std::result::Result<(), String>) {
        match result {
            Ok(()) => self.succeeded.push(serial.to_string()),
            Err(message) => self.failed.push((serial.to_string(), message)),
        }
    }

    /// Render the operator summary block, such as `RECLAIM SUMMARY`.
    pub fn render(&self, title: &str, done: &str, verb: &str) -> String {
        let mut out = format!("\n{0} {1} SUMMARY {0}\n", "=".repeat(20), title);
        out.push_str(&format!("Successfully {}: {}\n", done, self.succeeded.len()));
        out.push_str(&format!("Failed to {}: {}\n", verb, self.failed.len()));
        out.push_str(&format!("Total attempted: {}\n", self.attempted()));
        for serial in &self.succeeded {
            out.push_str(&format!("  ✓ {}\n", serial));
        }
        for (serial, message) in &self.failed {
            out.push_str(&format!("  ✗ {}: {}\n", serial, message));
        }
        out
    }
}

/// Reclaim radios one after another and print a summary.
pub async fn reclaim_many(
    gateway: &dyn DeviceGateway,
    serials: &[String],
    hostname: &str,
) -> SequentialSummary {
    let mut summary = SequentialSummary::default();
    for serial in serials {
        let result = reclaim(gateway, serial, hostname).await.map_err(|e| {
            error!(device_id = %serial, error = %e, "Reclaim failed");
            e.to_string()
        });
        summary.record(serial, result);
    }
    print!("{}", summary.render("RECLAIM", "reclaimed", "reclaim"));
    summary
}

/// Deploy radios one after another and print a summary.
pub async fn deploy_many(
    gateway: &dyn DeviceGateway,
    directory: &dyn CustomerDirectory,
    serials: &[String],
) -> SequentialSummary {
    let mut summary = SequentialSummary::default();
    for serial in serials {
        let result = deploy(gateway, directory, serial)
            .await
            .map(|_| ())
            .map_err(|e| {
                error!(device_id = %serial, error = %e, "Deployment failed");
                e.to_string()
            });
        summary.record(serial, result);
    }
    print!("{}", summary.render("DEPLOYMENT", "deployed", "deploy"));
    summary
}

/// Refurbish devices one after another, logging progress.
///
/// Speed test figures are averaged over all successful rounds.
pub async fn refurbish_sequential(
    gateway: Arc<dyn DeviceGateway>,
    timings: WorkflowTimings,
    serials: &[String],
    options: RefurbishOptions,
) -> SequentialSummary {
    let workflow = RefurbishWorkflow::new(gateway, timings, options)
        .with_aggregation(SpeedTestAggregation::Average);
    let mut summary = SequentialSummary::default();

    for serial in serials {
        let (tx, mut rx) = progress::channel();
        let device_id = serial.clone();
        let logger = tokio::spawn(async move {
            while let Some(message) = rx.recv().await {
                info!(
                    device_id = %device_id,
                    phase = ?message.phase,
                    status = %message.status,
                    "{}",
                    message.message
                );
            }
        });

        let outcome = workflow.run(serial, &tx).await;
        drop(tx);
        let _ = logger.await;

        let result = if outcome.is_success() {
            Ok(())
        } else {
            Err(outcome.message)
        };
        summary.record(serial, result);
    }

    print!("{}", summary.render("REFURBISHMENT", "refurbished", "refurbish"));
    summary
}
