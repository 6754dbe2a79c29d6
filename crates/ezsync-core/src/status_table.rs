// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Aggregate status of a batch.
//!
//! Owned by the coordinator's monitor loop, which is its only writer.
//! Workers never touch it; they only write to their own progress channel.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::phase::{Phase, Status};
use crate::progress::ProgressMessage;
use crate::runner::WorkerExit;
use crate::snapshot::DeviceSnapshot;

/// Message recorded for devices left unfinished by an operator interrupt.
pub const INTERRUPTED_MESSAGE: &str = "Operation interrupted by user";

/// Message recorded for devices whose worker ended without a verdict.
pub const INCOMPLETE_MESSAGE: &str = "Process did not complete.";

/// One row of the status table.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceEntry {
    /// Device serial number.
    pub device_id: String,
    /// Current status.
    pub status: Status,
    /// Highest phase reported. `None` until the worker reports.
    pub phase: Option<Phase>,
    /// Latest human readable message.
    pub message: String,
    /// Merged snapshot.
    pub snapshot: DeviceSnapshot,
    /// A terminal message was observed; later messages are ignored.
    pub finished: bool,
    /// How the worker exited, once it has.
    pub exit: Option<WorkerExit>,
    /// Time of the last change.
    pub updated_at: DateTime<Utc>,
}

impl DeviceEntry {
    fn new(device_id: &str) -> Self {
        Self {
            device_id: device_id.to_string(),
            status: Status::Pending,
            phase: None,
            message: "Waiting to start".to_string(),
            snapshot: DeviceSnapshot::default(),
            finished: false,
            exit: None,
            updated_at: Utc::now(),
        }
    }

    fn settle(&mut self, status: Status, message: &str) {
        self.status = status;
        self.message = message.to_string();
        self.finished = true;
        self.updated_at = Utc::now();
    }
}

/// A verdict assigned by reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciled {
    /// Device serial number.
    pub device_id: String,
    /// Status before reconciliation.
    pub from: Status,
    /// Assigned terminal status.
    pub to: Status,
}

/// Per-device status for one batch, in request order.
#[derive(Debug, Clone)]
pub struct StatusTable {
    entries: Vec<DeviceEntry>,
    index: HashMap<String, usize>,
    started_at: DateTime<Utc>,
}

impl StatusTable {
    /// Create a table with every device Pending.
    pub fn new<I, S>(device_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut entries = Vec::new();
        let mut index = HashMap::new();
        for id in device_ids {
            let id = id.as_ref();
            if index.contains_key(id) {
                continue;
            }
            index.insert(id.to_string(), entries.len());
            entries.push(DeviceEntry::new(id));
        }
        Self {
            entries,
            index,
            started_at: Utc::now(),
        }
    }

    /// When the batch started.
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// All rows, in request order.
    pub fn entries(&self) -> &[DeviceEntry] {
        &self.entries
    }

    /// Row for one device.
    pub fn get(&self, device_id: &str) -> Option<&DeviceEntry> {
        self.index.get(device_id).map(|&i| &self.entries[i])
    }

    fn get_mut(&mut self, device_id: &str) -> Option<&mut DeviceEntry> {
        let i = *self.index.get(device_id)?;
        self.entries.get_mut(i)
    }

    /// Apply a progress message. Returns whether the row changed.
    ///
    /// Messages after a terminal one are ignored. The phase never moves
    /// backwards.
    pub fn apply(&mut self, device_id: &str, message: &ProgressMessage) -> bool {
        let Some(entry) = self.get_mut(device_id) else {
            warn!(device_id, "Progress for unknown device");
            return false;
        };
        if entry.finished {
            debug!(device_id, message = %message.message, "Ignoring message after terminal status");
            return false;
        }

        if let Some(phase) = message.phase {
            match entry.phase {
                Some(current) if phase < current => {
                    debug!(device_id, ?phase, ?current, "Ignoring phase regression");
                }
                _ => entry.phase = Some(phase),
            }
        }
        entry.status = message.status;
        entry.message = message.message.clone();
        entry.snapshot.merge(&message.snapshot);
        entry.finished = message.status.is_terminal();
        entry.updated_at = Utc::now();
        true
    }

    /// Record how a worker exited.
    pub fn record_exit(&mut self, device_id: &str, exit: WorkerExit) {
        if let Some(entry) = self.get_mut(device_id) {
            entry.exit = Some(exit);
        }
    }

    /// Mark every non-terminal device Failed. Returns how many changed.
    pub fn fail_unfinished(&mut self, message: &str) -> usize {
        let mut changed = 0;
        for entry in self.entries.iter_mut().filter(|e| !e.status.is_terminal()) {
            entry.settle(Status::Failed, message);
            changed += 1;
        }
        changed
    }

    /// Resolve every device left without a terminal status.
    ///
    /// A device that recorded a speed test result and reached Finalize is
    /// assumed Completed with its final acknowledgement lost. This is a
    /// guess, not a confirmation from the device. Everything else is Failed.
    pub fn reconcile(&mut self) -> Vec<Reconciled> {
        let mut verdicts = Vec::new();
        for entry in self.entries.iter_mut().filter(|e| !e.status.is_terminal()) {
            let from = entry.status;
            let late_stage =
                entry.snapshot.speed_test.is_some() && entry.phase >= Some(Phase::Finalize);

            if late_stage {
                warn!(device_id = %entry.device_id, "No final status received, assuming completed");
                let message = entry.message.clone();
                entry.settle(Status::Completed, &message);
            } else {
                warn!(device_id = %entry.device_id, status = %from, "No final status received, marking failed");
                entry.settle(Status::Failed, INCOMPLETE_MESSAGE);
            }

            verdicts.push(Reconciled {
                device_id: entry.device_id.clone(),
                from,
                to: entry.status,
            });
        }
        verdicts
    }

    /// Number of Failed devices.
    pub fn failure_count(&self) -> usize {
        self.count(Status::Failed)
    }

    /// Number of devices with the given status.
    pub fn count(&self, status: Status) -> usize {
        self.entries.iter().filter(|e| e.status == status).count()
    }

    /// Whether every device has a terminal status.
    pub fn all_terminal(&self) -> bool {
        self.entries.iter().all(|e| e.status.is_terminal())
    }

    /// Number of devices.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table has no devices.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::SpeedTestSummary;

    fn msg(status: Status, phase: Phase, text: &str) -> ProgressMessage {
        ProgressMessage::in_progress(phase, text).with_status(status)
    }

    #[test]
    fn test_new_table_is_pending() {
        let table = StatusTable::new(["SN1", "SN2", "SN1"]);
        assert_eq!(table.len(), 2);
        assert!(table.entries().iter().all(|e| e.status == Status::Pending));
        assert!(table.entries().iter().all(|e| e.phase.is_none()));
    }

    #[test]
    fn test_terminal_status_is_sticky() {
        let mut table = StatusTable::new(["SN1"]);
        assert!(table.apply("SN1", &msg(Status::Completed, Phase::Finalize, "done")));
        assert!(!table.apply("SN1", &msg(Status::Failed, Phase::Finalize, "late")));

        let entry = table.get("SN1").unwrap();
        assert_eq!(entry.status, Status::Completed);
        assert_eq!(entry.message, "done");
    }

    #[test]
    fn test_phase_never_regresses() {
        let mut table = StatusTable::new(["SN1"]);
        table.apply("SN1", &msg(Status::InProgress, Phase::SpeedTest, "a"));
        table.apply("SN1", &msg(Status::InProgress, Phase::Configure, "b"));
        let entry = table.get("SN1").unwrap();
        assert_eq!(entry.phase, Some(Phase::SpeedTest));
        assert_eq!(entry.message, "b");
    }

    #[test]
    fn test_snapshot_deltas_merge() {
        let mut table = StatusTable::new(["SN1"]);
        table.apply(
            "SN1",
            &msg(Status::InProgress, Phase::Connect, "a")
                .with_snapshot(DeviceSnapshot::with_firmware("3.6")),
        );
        table.apply(
            "SN1",
            &msg(Status::InProgress, Phase::Finalize, "b")
                .with_snapshot(DeviceSnapshot::with_hostname("REFURBISHED")),
        );
        let snapshot = &table.get("SN1").unwrap().snapshot;
        assert_eq!(snapshot.firmware.as_deref(), Some("3.6"));
        assert_eq!(snapshot.hostname.as_deref(), Some("REFURBISHED"));
    }

    #[test]
    fn test_reconcile() {
        let mut table = StatusTable::new(["LATE", "EARLY", "PENDING", "WARN", "DONE"]);
        table.apply(
            "LATE",
            &msg(Status::InProgress, Phase::Finalize, "[5/5] Applying final configuration")
                .with_snapshot(DeviceSnapshot::with_speed_test(SpeedTestSummary::default())),
        );
        table.apply(
            "EARLY",
            &msg(Status::InProgress, Phase::SpeedTest, "x")
                .with_snapshot(DeviceSnapshot::with_speed_test(SpeedTestSummary::default())),
        );
        table.apply("WARN", &msg(Status::Warning, Phase::Firmware, "w"));
        table.apply("DONE", &msg(Status::Completed, Phase::Finalize, "ok"));

        let verdicts = table.reconcile();
        assert_eq!(verdicts.len(), 4);
        assert!(table.all_terminal());
        assert_eq!(table.get("LATE").unwrap().status, Status::Completed);
        assert_eq!(table.get("EARLY").unwrap().status, Status::Failed);
        assert_eq!(table.get("EARLY").unwrap().message, INCOMPLETE_MESSAGE);
        assert_eq!(table.get("PENDING").unwrap().status, Status::Failed);
        assert_eq!(table.get("WARN").unwrap().status, Status::Failed);
        assert_eq!(table.failure_count(), 3);
    }

    #[test]
    fn test_finalize_without_speed_test_is_not_assumed_complete() {
        let mut table = StatusTable::new(["SN1"]);
        table.apply("SN1", &msg(Status::InProgress, Phase::Finalize, "x"));
        table.reconcile();
        assert_eq!(table.get("SN1").unwrap().status, Status::Failed);
    }

    #[test]
    fn test_fail_unfinished_keeps_completed() {
        let mut table = StatusTable::new(["SN1", "SN2", "SN3"]);
        table.apply("SN1", &msg(Status::Completed, Phase::Finalize, "ok"));
        table.apply("SN2", &msg(Status::InProgress, Phase::SpeedTest, "x"));

        assert_eq!(table.fail_unfinished(INTERRUPTED_MESSAGE), 2);
        assert_eq!(table.get("SN1").unwrap().status, Status::Completed);
        assert_eq!(table.get("SN2").unwrap().message, INTERRUPTED_MESSAGE);
        assert_eq!(table.get("SN3").unwrap().status, Status::Failed);
    }
}
