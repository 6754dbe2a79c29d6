// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Per-device progress channel.
//!
//! One channel per device. The workflow engine is the only producer; the
//! coordinator's monitor loop is the only consumer. The channel is unbounded
//! so emitting never blocks a workflow, and messages arrive in emission order.
//!
//! In process isolation the same messages cross the process boundary as
//! newline-delimited JSON on the worker's stdout (see [`write_ndjson`] and
//! [`parse_line`]).

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::debug;

use crate::phase::{Phase, Status};
use crate::snapshot::DeviceSnapshot;

/// One progress update from a workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressMessage {
    /// Device status after this update.
    pub status: Status,
    /// Human readable message.
    pub message: String,
    /// Current phase. `None` before the first phase starts.
    #[serde(default)]
    pub phase: Option<Phase>,
    /// Snapshot delta. Fields left unset keep their previous value.
    #[serde(default, skip_serializing_if = "DeviceSnapshot::is_empty")]
    pub snapshot: DeviceSnapshot,
}

impl ProgressMessage {
    /// An in-progress update.
    pub fn in_progress(phase: Phase, message: impl Into<String>) -> Self {
        Self {
            status: Status::InProgress,
            message: message.into(),
            phase: Some(phase),
            snapshot: DeviceSnapshot::default(),
        }
    }

    /// Attach a snapshot delta.
    pub fn with_snapshot(mut self, snapshot: DeviceSnapshot) -> Self {
        self.snapshot = snapshot;
        self
    }

    /// Override the status.
    pub fn with_status(mut self, status: Status) -> Self {
        self.status = status;
        self
    }

    /// Whether this message ends the workflow.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Producer half of a progress channel.
#[derive(Debug, Clone)]
pub struct ProgressSender {
    tx: mpsc::UnboundedSender<ProgressMessage>,
}

impl ProgressSender {
    /// Emit a message. A closed channel is not an error for the producer.
    pub fn send(&self, message: ProgressMessage) {
        if let Err(e) = self.tx.send(message) {
            debug!(message = %e.0.message, "Progress receiver closed, dropping message");
        }
    }
}

/// Consumer half of a progress channel.
#[derive(Debug)]
pub struct ProgressReceiver {
    rx: mpsc::UnboundedReceiver<ProgressMessage>,
}

impl ProgressReceiver {
    /// Take up to `max` queued messages without waiting.
    ///
    /// Returns the messages and whether every sender has gone away with the
    /// queue fully drained.
    pub fn drain(&mut self, max: usize) -> (Vec<ProgressMessage>, bool) {
        let mut batch = Vec::new();
        while batch.len() < max {
            match self.rx.try_recv() {
                Ok(message) => batch.push(message),
                Err(mpsc::error::TryRecvError::Empty) => return (batch, false),
                Err(mpsc::error::TryRecvError::Disconnected) => return (batch, true),
            }
        }
        (batch, false)
    }

    /// Wait for the next message. `None` once all senders are gone.
    pub async fn recv(&mut self) -> Option<ProgressMessage> {
        self.rx.recv().await
    }
}

/// Create a progress channel.
pub fn channel() -> (ProgressSender, ProgressReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ProgressSender { tx }, ProgressReceiver { rx })
}

/// Forward every message from `rx` to `writer` as one JSON object per line.
///
/// Flushes after each line so the reading side sees updates immediately.
pub async fn write_ndjson<W>(mut rx: ProgressReceiver, mut writer: W) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(message) = rx.recv().await {
        let mut line = serde_json::to_vec(&message)?;
        line.push(b'\n');
        writer.write_all(&line).await?;
        writer.flush().await?;
    }
    Ok(())
}

/// Parse one line of worker output. Blank and non-JSON lines yield `None`.
pub fn parse_line(line: &str) -> Option<ProgressMessage> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    match serde_json::from_str(line) {
        Ok(message) => Some(message),
        Err(e) => {
            debug!(error = %e, line, "Ignoring unparseable worker output");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_drain_preserves_order_and_respects_batch_size() {
        let (tx, mut rx) = channel();
        for i in 0..5 {
            tx.send(ProgressMessage::in_progress(Phase::Connect, format!("m{i}")));
        }

        let (batch, closed) = rx.drain(3);
        assert!(!closed);
        let messages: Vec<_> = batch.iter().map(|m| m.message.as_str()).collect();
        assert_eq!(messages, ["m0", "m1", "m2"]);

        drop(tx);
        let (batch, closed) = rx.drain(10);
        assert_eq!(batch.len(), 2);
        assert!(closed);
    }

    #[tokio::test]
    async fn test_send_after_receiver_dropped_is_harmless() {
        let (tx, rx) = channel();
        drop(rx);
        tx.send(ProgressMessage::in_progress(Phase::Connect, "lost"));
    }

    #[tokio::test]
    async fn test_ndjson_lines_parse_back() {
        let (tx, rx) = channel();
        tx.send(ProgressMessage::in_progress(Phase::Configure, "[2/5] Applying default configuration"));
        tx.send(
            ProgressMessage::in_progress(Phase::Finalize, "done")
                .with_status(Status::Completed)
                .with_snapshot(DeviceSnapshot::with_hostname("REFURBISHED")),
        );
        drop(tx);

        let mut out = Vec::new();
        write_ndjson(rx, &mut out).await.unwrap();
        let text = String::from_utf8(out).unwrap();

        let parsed: Vec<_> = text.lines().filter_map(parse_line).collect();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].phase, Some(Phase::Configure));
        assert!(parsed[1].is_terminal());
        assert_eq!(parsed[1].snapshot.hostname.as_deref(), Some("REFURBISHED"));
    }

    #[test]
    fn test_parse_line_ignores_noise() {
        assert!(parse_line("").is_none());
        assert!(parse_line("panic: something").is_none());
    }
}
