// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Dashboard rendering.
//!
//! [`render_dashboard`] is a pure function of the status table. The
//! [`Dashboard`] implementations decide where the frame goes.

use chrono::{DateTime, Utc};
use crossterm::style::Stylize;
use crossterm::{cursor, execute, terminal};
use std::fmt::Write as _;
use std::io::{self, Write};

use crate::phase::{Phase, Status};
use crate::status_table::{DeviceEntry, StatusTable};

/// Placeholder for snapshot fields that are not known yet.
pub const UNKNOWN: &str = "--";

const GLYPH_PENDING: char = '·';
const GLYPH_DONE: char = '✓';
const GLYPH_CURRENT: char = '▶';
const GLYPH_FAILED: char = '✗';

/// Rendering switches.
#[derive(Debug, Clone, Copy)]
pub struct RenderOptions {
    /// Emit ANSI colours.
    pub color: bool,
    /// Reference time for the elapsed clock.
    pub now: DateTime<Utc>,
}

impl RenderOptions {
    /// Plain text at the current time.
    pub fn plain() -> Self {
        Self {
            color: false,
            now: Utc::now(),
        }
    }
}

/// One glyph per phase for a row.
pub fn phase_glyphs(entry: &DeviceEntry) -> String {
    let reached = entry.phase.map(Phase::number).unwrap_or(0);
    Phase::ALL
        .iter()
        .map(|phase| {
            let n = phase.number();
            if n < reached {
                GLYPH_DONE
            } else if n > reached {
                GLYPH_PENDING
            } else {
                match entry.status {
                    Status::Failed => GLYPH_FAILED,
                    Status::Completed => GLYPH_DONE,
                    _ => GLYPH_CURRENT,
                }
            }
        })
        .collect()
}

fn status_word(status: Status, color: bool) -> String {
    let word = format!("{:<11}", status.as_str());
    if !color {
        return word;
    }
    match status {
        Status::Pending => word.dark_grey().to_string(),
        Status::InProgress => word.cyan().to_string(),
        Status::Warning => word.yellow().to_string(),
        Status::Completed => word.green().bold().to_string(),
        Status::Failed => word.red().bold().to_string(),
    }
}

fn field(value: Option<&str>) -> &str {
    value.filter(|v| !v.is_empty()).unwrap_or(UNKNOWN)
}

fn elapsed(from: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let secs = (now - from).num_seconds().max(0);
    format!("{:02}:{:02}:{:02}", secs / 3600, secs / 60 % 60, secs % 60)
}

/// Render the whole table as a text frame.
pub fn render_dashboard(table: &StatusTable, options: &RenderOptions) -> String {
    let mut out = String::new();
    let width = table
        .entries()
        .iter()
        .map(|e| e.device_id.len())
        .max()
        .unwrap_or(0)
        .max(6);

    let _ = writeln!(
        out,
        "ezSync parallel refurbishment  started {}  elapsed {}",
        table.started_at().format("%H:%M:%S"),
        elapsed(table.started_at(), options.now)
    );
    let _ = writeln!(
        out,
        "Devices {}  Completed {}  Failed {}  Warning {}  In progress {}  Pending {}",
        table.len(),
        table.count(Status::Completed),
        table.count(Status::Failed),
        table.count(Status::Warning),
        table.count(Status::InProgress),
        table.count(Status::Pending),
    );
    let _ = writeln!(out);

    for entry in table.entries() {
        let snapshot = &entry.snapshot;
        let speed = snapshot.speed_test.map(|s| s.to_string());
        let _ = writeln!(
            out,
            "{:<width$}  [{}]  {}  {}",
            entry.device_id,
            phase_glyphs(entry),
            status_word(entry.status, options.color),
            entry.message,
        );
        let _ = writeln!(
            out,
            "{:<width$}  FW {} | BN {} | HW {} | Mode {} | Freq {} | Speed {} | Host {}",
            "",
            field(snapshot.firmware.as_deref()),
            field(snapshot.connected_bn.as_deref()),
            field(snapshot.hardware.as_deref()),
            field(snapshot.carrier_mode.as_deref()),
            field(snapshot.frequencies.as_deref()),
            field(speed.as_deref()),
            field(snapshot.hostname.as_deref()),
        );
    }

    let legend: Vec<String> = Phase::ALL
        .iter()
        .map(|phase| format!("{} {}", phase.number(), phase.label()))
        .collect();
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "Phases: {}  ({} done, {} current, {} failed)",
        legend.join(", "),
        GLYPH_DONE,
        GLYPH_CURRENT,
        GLYPH_FAILED
    );
    out
}

/// Sink for dashboard frames.
pub trait Dashboard: Send {
    /// Redraw from the table. Replaces any previous frame.
    fn draw(&mut self, table: &StatusTable) -> io::Result<()>;
}

/// Full-screen dashboard on stdout.
#[derive(Debug)]
pub struct TerminalDashboard {
    color: bool,
}

impl TerminalDashboard {
    /// Create a terminal dashboard.
    pub fn new(color: bool) -> Self {
        Self { color }
    }
}

impl Dashboard for TerminalDashboard {
    fn draw(&mut self, table: &StatusTable) -> io::Result<()> {
        let frame = render_dashboard(
            table,
            &RenderOptions {
                color: self.color,
                now: Utc::now(),
            },
        );
        let mut stdout = io::stdout().lock();
        execute!(
            stdout,
            terminal::Clear(terminal::ClearType::All),
            cursor::MoveTo(0, 0)
        )?;
        stdout.write_all(frame.as_bytes())?;
        stdout.flush()
    }
}

/// Dashboard that keeps every frame in memory.
#[derive(Debug, Default)]
pub struct RecordingDashboard {
    /// Frames in draw order.
    pub frames: Vec<String>,
}

impl RecordingDashboard {
    /// Last frame drawn.
    pub fn last(&self) -> Option<&str> {
        self.frames.last().map(String::as_str)
    }
}

impl Dashboard for RecordingDashboard {
    fn draw(&mut self, table: &StatusTable) -> io::Result<()> {
        self.frames
            .push(render_dashboard(table, &RenderOptions::plain()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::ProgressMessage;
    use crate::snapshot::{DeviceSnapshot, SpeedTestSummary};

    fn entry_at(status: Status, phase: Option<Phase>) -> DeviceEntry {
        let mut table = StatusTable::new(["SN1"]);
        if let Some(phase) = phase {
            table.apply(
                "SN1",
                &ProgressMessage::in_progress(phase, "x").with_status(status),
            );
        }
        table.get("SN1").unwrap().clone()
    }

    #[test]
    fn test_glyphs() {
        assert_eq!(phase_glyphs(&entry_at(Status::Pending, None)), "·····");
        assert_eq!(
            phase_glyphs(&entry_at(Status::InProgress, Some(Phase::Firmware))),
            "✓✓▶··"
        );
        assert_eq!(
            phase_glyphs(&entry_at(Status::Failed, Some(Phase::Connect))),
            "✗····"
        );
        assert_eq!(
            phase_glyphs(&entry_at(Status::Completed, Some(Phase::Finalize))),
            "✓✓✓✓✓"
        );
    }

    #[test]
    fn test_unknown_fields_use_placeholder() {
        let table = StatusTable::new(["SN1"]);
        let frame = render_dashboard(&table, &RenderOptions::plain());
        assert!(frame.contains("FW -- | BN -- | HW -- | Mode -- | Freq -- | Speed -- | Host --"));
        assert!(frame.contains("PENDING"));
        assert!(frame.contains(
            "Phases: 1 connect, 2 configure, 3 firmware, 4 speedtest, 5 finalize"
        ));
    }

    #[test]
    fn test_known_fields_rendered() {
        let mut table = StatusTable::new(["SN100"]);
        table.apply(
            "SN100",
            &ProgressMessage::in_progress(Phase::Finalize, "Refurbishment completed successfully")
                .with_status(Status::Completed)
                .with_snapshot(DeviceSnapshot {
                    firmware: Some("3.622".into()),
                    speed_test: Some(SpeedTestSummary {
                        downlink_mbps: 50.0,
                        uplink_mbps: 12.5,
                        ..Default::default()
                    }),
                    hostname: Some("REFURBISHED".into()),
                    ..Default::default()
                }),
        );

        let frame = render_dashboard(&table, &RenderOptions::plain());
        assert!(frame.contains("SN100   [✓✓✓✓✓]  COMPLETED"));
        assert!(frame.contains("Speed 50.0/12.5 Mbps"));
        assert!(frame.contains("Host REFURBISHED"));
        assert!(frame.contains("Completed 1  Failed 0"));
    }

    #[test]
    fn test_render_is_repeatable() {
        let table = StatusTable::new(["SN1", "SN2"]);
        let options = RenderOptions::plain();
        assert_eq!(
            render_dashboard(&table, &options),
            render_dashboard(&table, &options)
        );
    }

    #[test]
    fn test_colour_output_contains_escape_codes() {
        let mut table = StatusTable::new(["SN1"]);
        table.apply(
            "SN1",
            &ProgressMessage::in_progress(Phase::Connect, "x").with_status(Status::Failed),
        );
        let frame = render_dashboard(
            &table,
            &RenderOptions {
                color: true,
                now: Utc::now(),
            },
        );
        assert!(frame.contains('\u{1b}'));
    }

    #[test]
    fn test_elapsed_format() {
        let start = Utc::now();
        assert_eq!(elapsed(start, start + chrono::Duration::seconds(3725)), "01:02:05");
        assert_eq!(elapsed(start, start - chrono::Duration::seconds(5)), "00:00:00");
    }
}
