// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Bounded polling against the device gateway.
//!
//! These loops are shared by the refurbishment workflow and the sequential
//! lifecycle commands. They never fail on a single bad response: a gateway
//! error counts as "not there yet" until the attempt budget runs out.
//! Progress is reported through a callback so each caller can present it its
//! own way.

use ezsync_gateway::{DeviceGateway, DeviceInfo, GatewayError, SpeedTestResult};
use tracing::debug;

use crate::config::{PollBudget, WorkflowTimings};

/// What a connection check observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeState {
    /// About to query the device.
    Checking,
    /// The gateway call failed.
    DeviceNotFound,
    /// The device answered but is not connected.
    NotConnected,
}

/// One step of a connection wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Probe {
    /// 1-based attempt number.
    pub attempt: u32,
    /// Attempt budget.
    pub attempts: u32,
    /// Observation.
    pub state: ProbeState,
}

/// Poll until the device reports `connected=true` or the budget runs out.
///
/// The first check happens immediately; `budget.interval` is slept between
/// checks, not after the last one.
pub async fn wait_for_connection<F>(
    gateway: &dyn DeviceGateway,
    serial: &str,
    budget: PollBudget,
    mut on_probe: F,
) -> Option<DeviceInfo>
where
    F: FnMut(Probe),
{
    for attempt in 1..=budget.attempts {
        let probe = |state| Probe {
            attempt,
            attempts: budget.attempts,
            state,
        };
        on_probe(probe(ProbeState::Checking));

        match gateway.get_device_status(serial).await {
            Ok(info) if info.is_connected() => return Some(info),
            Ok(_) => on_probe(probe(ProbeState::NotConnected)),
            Err(e) => {
                debug!(serial, attempt, error = %e, "Status check failed");
                on_probe(probe(ProbeState::DeviceNotFound));
            }
        }

        if attempt < budget.attempts {
            tokio::time::sleep(budget.interval).await;
        }
    }
    None
}

/// Poll a speed test until it reaches a terminal state.
///
/// Waits one interval before the first check so the test can leave the
/// queue. Returns `None` when the budget runs out.
pub async fn await_speed_test(
    gateway: &dyn DeviceGateway,
    operation_id: &str,
    serial: &str,
    budget: PollBudget,
) -> Option<SpeedTestResult> {
    tokio::time::sleep(budget.interval).await;

    for attempt in 1..=budget.attempts {
        match gateway.poll_speed_test(operation_id, serial).await {
            Ok(result) if result.is_terminal() => return Some(result),
            Ok(result) => {
                debug!(serial, operation_id, attempt, status = ?result.status, "Speed test still running");
            }
            Err(e) => {
                debug!(serial, operation_id, attempt, error = %e, "Speed test poll failed");
            }
        }

        if attempt < budget.attempts {
            tokio::time::sleep(budget.interval).await;
        }
    }
    None
}

/// Progress of a speed test series.
#[derive(Debug)]
pub enum SpeedTestEvent<'a> {
    /// A new attempt starts.
    Attempt {
        /// 1-based attempt number.
        attempt: u32,
        /// Successes so far.
        successes: u32,
    },
    /// The test could not be started.
    StartFailed {
        /// Attempt number.
        attempt: u32,
        /// Gateway error.
        error: &'a GatewayError,
    },
    /// Test started; waiting for its result.
    Waiting {
        /// Attempt number.
        attempt: u32,
    },
    /// The result never reached a terminal state.
    NoResult {
        /// Attempt number.
        attempt: u32,
    },
    /// Completed with throughput figures.
    Succeeded {
        /// Attempt number.
        attempt: u32,
        /// The result.
        result: &'a SpeedTestResult,
        /// Successes including this one.
        successes: u32,
    },
    /// Completed without a downlink figure; not counted.
    NoThroughput {
        /// Attempt number.
        attempt: u32,
    },
    /// Ended in a failure state.
    Failed {
        /// Attempt number.
        attempt: u32,
        /// The result.
        result: &'a SpeedTestResult,
    },
    /// Pausing before the next attempt.
    Pausing {
        /// Attempt number just finished.
        attempt: u32,
    },
}

/// Outcome of a speed test series.
#[derive(Debug, Clone, Default)]
pub struct SpeedTestSeries {
    /// Successful results, in order.
    pub successes: Vec<SpeedTestResult>,
    /// Every terminal result, successful or not.
    pub results: Vec<SpeedTestResult>,
    /// Attempts used.
    pub attempts: u32,
}

impl SpeedTestSeries {
    /// Number of successful tests.
    pub fn success_count(&self) -> u32 {
        self.successes.len() as u32
    }
}

/// Run speed tests until `timings.speed_test_required` succeed or
/// `timings.speed_test_attempts` are used.
///
/// A failed start consumes the attempt and moves straight to the next one.
pub async fn run_speed_tests<F>(
    gateway: &dyn DeviceGateway,
    serial: &str,
    timings: &WorkflowTimings,
    mut on_event: F,
) -> SpeedTestSeries
where
    F: FnMut(SpeedTestEvent<'_>),
{
    let required = timings.speed_test_required;
    let mut series = SpeedTestSeries::default();

    while series.success_count() < required && series.attempts < timings.speed_test_attempts {
        series.attempts += 1;
        let attempt = series.attempts;
        on_event(SpeedTestEvent::Attempt {
            attempt,
            successes: series.success_count(),
        });

        match gateway.start_speed_test(serial).await {
            Err(error) => {
                on_event(SpeedTestEvent::StartFailed {
                    attempt,
                    error: &error,
                });
                continue;
            }
            Ok(operation_id) => {
                on_event(SpeedTestEvent::Waiting { attempt });
                match await_speed_test(gateway, &operation_id, serial, timings.speed_test_poll).await
                {
                    None => on_event(SpeedTestEvent::NoResult { attempt }),
                    Some(result) if result.is_success() => {
                        series.successes.push(result.clone());
                        on_event(SpeedTestEvent::Succeeded {
                            attempt,
                            result: &result,
                            successes: series.success_count(),
                        });
                        series.results.push(result);
                    }
                    Some(result) => {
                        if result.status == Some(ezsync_gateway::SpeedTestStatus::Completed) {
                            on_event(SpeedTestEvent::NoThroughput { attempt });
                        } else {
                            on_event(SpeedTestEvent::Failed {
                                attempt,
                                result: &result,
                            });
                        }
                        series.results.push(result);
                    }
                }
            }
        }

        if series.success_count() < required && series.attempts < timings.speed_test_attempts {
            on_event(SpeedTestEvent::Pausing { attempt });
            tokio::time::sleep(timings.speed_test_pause).await;
        }
    }

    series
}

#[cfg(test)]
mod tests {
    use super::*;
    use ezsync_gateway::{MockDevice, MockGateway, speed_test_completed, speed_test_failed};
    use std::time::Duration;
    use tokio::time::Instant;

    fn fast_timings() -> WorkflowTimings {
        WorkflowTimings {
            speed_test_required: 3,
            speed_test_attempts: 5,
            speed_test_pause: Duration::from_secs(60),
            speed_test_poll: PollBudget::new(Duration::from_secs(20), 3),
            ..Default::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_connection_on_third_attempt() {
        let gateway =
            MockGateway::with_devices([MockDevice::online("SN1").with_connect_offline_polls(2)]);
        let start = Instant::now();
        let mut probes = Vec::new();

        let info = wait_for_connection(
            &gateway,
            "SN1",
            PollBudget::new(Duration::from_secs(20), 30),
            |p| probes.push(p),
        )
        .await;

        assert!(info.is_some());
        assert_eq!(start.elapsed(), Duration::from_secs(40));
        let checks: Vec<u32> = probes
            .iter()
            .filter(|p| p.state == ProbeState::Checking)
            .map(|p| p.attempt)
            .collect();
        assert_eq!(checks, [1, 2, 3]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_connection_budget_exhausted() {
        let gateway = MockGateway::with_devices([
            MockDevice::online("SN1").with_connect_offline_polls(ezsync_gateway::NEVER)
        ]);
        let start = Instant::now();

        let info = wait_for_connection(
            &gateway,
            "SN1",
            PollBudget::new(Duration::from_secs(20), 4),
            |_| {},
        )
        .await;

        assert!(info.is_none());
        assert_eq!(start.elapsed(), Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_device_counts_as_not_found() {
        let gateway = MockGateway::new();
        let mut states = Vec::new();
        let info = wait_for_connection(
            &gateway,
            "SN404",
            PollBudget::new(Duration::from_secs(1), 2),
            |p| states.push(p.state),
        )
        .await;
        assert!(info.is_none());
        assert!(states.contains(&ProbeState::DeviceNotFound));
    }

    #[tokio::test(start_paused = true)]
    async fn test_speed_tests_skip_failures() {
        let gateway = MockGateway::with_devices([MockDevice::online("SN1").with_speed_tests([
            speed_test_completed(40_000.0, 10_000.0),
            speed_test_failed("BN busy"),
            speed_test_completed(50_000.0, 12_500.0),
        ])]);

        let mut failed = 0;
        let series = run_speed_tests(&gateway, "SN1", &fast_timings(), |event| {
            if let SpeedTestEvent::Failed { .. } = event {
                failed += 1;
            }
        })
        .await;

        assert_eq!(series.success_count(), 3);
        assert_eq!(series.attempts, 4);
        assert_eq!(series.results.len(), 4);
        assert_eq!(failed, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_speed_test_budget_exhausted() {
        let gateway = MockGateway::with_devices([MockDevice::online("SN1")
            .with_speed_tests([speed_test_completed(50_000.0, 12_500.0)])
            .with_default_speed_test(Some(speed_test_failed("no BN")))]);

        let series = run_speed_tests(&gateway, "SN1", &fast_timings(), |_| {}).await;
        assert_eq!(series.success_count(), 1);
        assert_eq!(series.attempts, 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_start_consumes_attempt_without_pause() {
        let gateway =
            MockGateway::with_devices([MockDevice::online("SN1").with_failing_speed_test_start()]);
        let timings = WorkflowTimings {
            speed_test_attempts: 3,
            ..fast_timings()
        };
        let start = Instant::now();
        let mut start_failures = 0;

        let series = run_speed_tests(&gateway, "SN1", &timings, |event| {
            if let SpeedTestEvent::StartFailed { .. } = event {
                start_failures += 1;
            }
        })
        .await;

        assert_eq!(series.attempts, 3);
        assert_eq!(start_failures, 3);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_running_test_times_out() {
        let gateway = MockGateway::with_devices([
            MockDevice::online("SN1").with_default_speed_test(None)
        ]);
        let operation_id = gateway.start_speed_test("SN1").await.unwrap();

        let result = await_speed_test(
            &gateway,
            &operation_id,
            "SN1",
            PollBudget::new(Duration::from_secs(20), 3),
        )
        .await;
        assert!(result.is_none());
    }
}
