// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Batch runs through the public coordinator API.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ezsync_core::runner::Result as RunnerResult;
use ezsync_core::status_table::{INCOMPLETE_MESSAGE, INTERRUPTED_MESSAGE};
use ezsync_core::{
    Coordinator, CoordinatorConfig, DeviceSnapshot, Phase, ProgressMessage, RecordingDashboard,
    RefurbishOptions, SpeedTestSummary, Status, TaskRunner, WorkerExit, WorkerHandle,
    WorkerRequest, WorkerRunner, WorkflowTimings,
};
use ezsync_gateway::{MockDevice, MockGateway, NEVER};
use tokio_util::sync::CancellationToken;

fn serials(ids: &[&str]) -> Vec<String> {
    ids.iter().map(|s| s.to_string()).collect()
}

fn task_coordinator(gateway: MockGateway) -> Coordinator {
    let runner = TaskRunner::new(Arc::new(gateway), WorkflowTimings::default());
    Coordinator::new(Arc::new(runner), CoordinatorConfig::default())
}

#[tokio::test(start_paused = true)]
async fn test_sn100_end_to_end() {
    let gateway = MockGateway::with_devices([MockDevice::online("SN100").with_connect_offline_polls(2)]);
    let mut dashboard = RecordingDashboard::default();

    let report = task_coordinator(gateway)
        .refurbish_many(
            &serials(&["SN100"]),
            RefurbishOptions::default(),
            &mut dashboard,
            CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(report.failure_count, 0);
    let entry = report.table.get("SN100").unwrap();
    assert_eq!(entry.status, Status::Completed);
    assert_eq!(entry.phase, Some(Phase::Finalize));
    assert_eq!(entry.snapshot.hostname.as_deref(), Some("REFURBISHED"));
    assert_eq!(
        entry.snapshot.speed_test.map(|s| s.to_string()).as_deref(),
        Some("50.0/12.5 Mbps")
    );

    let frame = dashboard.last().unwrap();
    assert!(frame.contains("[✓✓✓✓✓]"));
    assert!(frame.contains("Speed 50.0/12.5 Mbps"));
    assert!(frame.contains("Host REFURBISHED"));
}

#[tokio::test(start_paused = true)]
async fn test_interrupt_keeps_completed_devices() {
    let gateway = MockGateway::with_devices([
        MockDevice::online("SN1"),
        MockDevice::online("SN2").with_connect_offline_polls(NEVER),
        MockDevice::online("SN3").with_connect_offline_polls(NEVER),
    ]);
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(60)).await;
        trigger.cancel();
    });
    let options = RefurbishOptions {
        skip_speedtest: true,
        ..Default::default()
    };
    let mut dashboard = RecordingDashboard::default();

    let report = task_coordinator(gateway)
        .refurbish_many(&serials(&["SN1", "SN2", "SN3"]), options, &mut dashboard, cancel)
        .await
        .unwrap();

    assert!(report.interrupted);
    assert_eq!(report.failure_count, 2);
    assert_eq!(report.table.get("SN1").unwrap().status, Status::Completed);
    for id in ["SN2", "SN3"] {
        let entry = report.table.get(id).unwrap();
        assert_eq!(entry.status, Status::Failed);
        assert_eq!(entry.message, INTERRUPTED_MESSAGE);
    }
}

/// Replays fixed progress messages, then exits without a verdict.
struct ReplayRunner {
    scripts: HashMap<String, Vec<ProgressMessage>>,
}

#[async_trait]
impl WorkerRunner for ReplayRunner {
    fn runner_type(&self) -> &'static str {
        "replay"
    }

    async fn launch(&self, request: &WorkerRequest) -> RunnerResult<WorkerHandle> {
        let (tx, rx) = ezsync_core::progress::channel();
        for message in self.scripts.get(&request.device_id).cloned().unwrap_or_default() {
            tx.send(message);
        }
        let exit = tokio::spawn(async move {
            drop(tx);
            WorkerExit::Crashed("terminated by signal".into())
        });
        Ok(WorkerHandle::new(
            request.device_id.clone(),
            None,
            rx,
            CancellationToken::new(),
            exit,
        ))
    }
}

#[tokio::test(start_paused = true)]
async fn test_reconciliation_after_lost_final_message() {
    let speed = DeviceSnapshot::with_speed_test(SpeedTestSummary {
        downlink_mbps: 48.0,
        uplink_mbps: 11.0,
        ..Default::default()
    });
    let scripts = HashMap::from([
        (
            "LATE".to_string(),
            vec![
                ProgressMessage::in_progress(Phase::SpeedTest, "[4/5] Speed test 3 ok")
                    .with_snapshot(speed),
                ProgressMessage::in_progress(Phase::Finalize, "[5/5] Applying final configuration"),
            ],
        ),
        (
            "EARLY".to_string(),
            vec![ProgressMessage::in_progress(Phase::Configure, "[2/5] Applying configuration")],
        ),
    ]);
    let coordinator = Coordinator::new(
        Arc::new(ReplayRunner { scripts }),
        CoordinatorConfig::default(),
    );
    let mut dashboard = RecordingDashboard::default();

    let report = coordinator
        .refurbish_many(
            &serials(&["LATE", "EARLY", "SILENT"]),
            RefurbishOptions::default(),
            &mut dashboard,
            CancellationToken::new(),
        )
        .await
        .unwrap();

    assert!(report.table.all_terminal());
    assert_eq!(report.failure_count, 2);

    let late = report.table.get("LATE").unwrap();
    assert_eq!(late.status, Status::Completed);
    assert_eq!(
        late.exit,
        Some(WorkerExit::Crashed("terminated by signal".into()))
    );

    for id in ["EARLY", "SILENT"] {
        let entry = report.table.get(id).unwrap();
        assert_eq!(entry.status, Status::Failed);
        assert_eq!(entry.message, INCOMPLETE_MESSAGE);
    }

    let frame = dashboard.last().unwrap();
    assert!(!frame.contains("IN_PROGRESS "));
    assert!(!frame.contains("PENDING "));
}

/// Workers that report progress and then die on a shared signal, the way
/// child processes die when the terminal interrupts the whole group.
struct SignalledRunner {
    signal: CancellationToken,
}

#[async_trait]
impl WorkerRunner for SignalledRunner {
    fn runner_type(&self) -> &'static str {
        "signalled"
    }

    async fn launch(&self, request: &WorkerRequest) -> RunnerResult<WorkerHandle> {
        let (tx, rx) = ezsync_core::progress::channel();
        tx.send(ProgressMessage::in_progress(Phase::Connect, "[1/5] Waiting for connection"));
        let signal = self.signal.clone();
        let exit = tokio::spawn(async move {
            signal.cancelled().await;
            drop(tx);
            WorkerExit::Crashed("terminated by signal".into())
        });
        Ok(WorkerHandle::new(
            request.device_id.clone(),
            Some(4242),
            rx,
            CancellationToken::new(),
            exit,
        ))
    }
}

#[tokio::test(start_paused = true)]
async fn test_interrupt_after_workers_already_died() {
    let signal = CancellationToken::new();
    let cancel = CancellationToken::new();
    let (group, operator) = (signal.clone(), cancel.clone());
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(10)).await;
        group.cancel();
        // The operator's token fires after the workers were reaped.
        tokio::time::sleep(Duration::from_millis(400)).await;
        operator.cancel();
    });
    let coordinator = Coordinator::new(
        Arc::new(SignalledRunner { signal }),
        CoordinatorConfig::default(),
    );
    let mut dashboard = RecordingDashboard::default();

    let report = coordinator
        .refurbish_many(
            &serials(&["SN1", "SN2"]),
            RefurbishOptions::default(),
            &mut dashboard,
            cancel,
        )
        .await
        .unwrap();

    assert!(report.interrupted);
    assert_eq!(report.failure_count, 2);
    for id in ["SN1", "SN2"] {
        let entry = report.table.get(id).unwrap();
        assert_eq!(entry.status, Status::Failed);
        assert_eq!(entry.message, INTERRUPTED_MESSAGE);
        assert_eq!(entry.phase, Some(Phase::Connect));
    }
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_before_start_launches_nothing() {
    let gateway = MockGateway::with_devices([MockDevice::online("SN1")]);
    let cancel = CancellationToken::new();
    cancel.cancel();
    let mut dashboard = RecordingDashboard::default();

    let report = task_coordinator(gateway.clone())
        .refurbish_many(&serials(&["SN1"]), RefurbishOptions::default(), &mut dashboard, cancel)
        .await
        .unwrap();

    assert!(report.interrupted);
    assert_eq!(report.table.get("SN1").unwrap().message, INTERRUPTED_MESSAGE);
    assert!(gateway.calls().await.is_empty());
}
