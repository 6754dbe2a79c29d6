// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Process runner: one OS process per device.
//!
//! The coordinator re-executes its own binary with a hidden worker
//! subcommand. The worker runs the workflow for a single device and writes
//! progress messages to stdout as newline-delimited JSON. Worker logs go to
//! stderr, which is re-emitted here at debug level.
//!
//! Exit codes: [`EXIT_COMPLETED`] when the workflow completed,
//! [`EXIT_FAILED`] when it failed, [`EXIT_WORKER_ERROR`] when the worker
//! could not run the workflow at all. Anything else is a crash.

use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWrite, BufReader};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use ezsync_gateway::DeviceGateway;

use super::traits::*;
use crate::config::{RefurbishOptions, WorkflowTimings};
use crate::progress::{self, parse_line};
use crate::workflow::{RefurbishWorkflow, WorkflowOutcome};

/// Worker exit code for a completed workflow.
pub const EXIT_COMPLETED: i32 = 0;

/// Worker exit code for a failed workflow.
pub const EXIT_FAILED: i32 = 1;

/// Worker exit code when the worker itself failed (configuration, output).
pub const EXIT_WORKER_ERROR: i32 = 3;

/// Launches workers as child processes.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    program: PathBuf,
    args: Vec<String>,
}

impl ProcessRunner {
    /// Runner that invokes `program args... <device_id> [flags]`.
    pub fn new(program: impl Into<PathBuf>, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Runner that re-executes the current binary as `<exe> worker`.
    pub fn current_exe() -> Result<Self> {
        let program = std::env::current_exe()?;
        Ok(Self::new(program, ["worker"]))
    }

    fn command(&self, request: &WorkerRequest) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        cmd.arg(&request.device_id);
        if request.options.skip_speedtest {
            cmd.arg("--skip-speedtest");
        }
        if request.options.skip_firmware {
            cmd.arg("--skip-firmware");
        }
        if request.options.verbose {
            cmd.arg("--verbose");
        }
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl WorkerRunner for ProcessRunner {
    fn runner_type(&self) -> &'static str {
        "process"
    }

    async fn launch(&self, request: &WorkerRequest) -> Result<WorkerHandle> {
        let device_id = request.device_id.clone();
        let spawn_failed = |reason: String| RunnerError::SpawnFailed {
            device_id: device_id.clone(),
            reason,
        };

        let mut child = self
            .command(request)
            .spawn()
            .map_err(|e| spawn_failed(e.to_string()))?;
        let pid = child.id();
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| spawn_failed("stdout not captured".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| spawn_failed("stderr not captured".to_string()))?;

        info!(device_id = %device_id, pid = ?pid, "Worker process started");

        let (tx, rx) = progress::channel();
        let reader = tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if let Some(message) = parse_line(&line) {
                    tx.send(message);
                }
            }
        });

        let log_id = device_id.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                debug!(device_id = %log_id, "worker: {}", line);
            }
        });

        let kill = CancellationToken::new();
        let token = kill.clone();
        let exit_id = device_id.clone();
        let exit = tokio::spawn(async move {
            let waited = tokio::select! {
                biased;
                _ = token.cancelled() => None,
                status = child.wait() => Some(status),
            };

            let status = match waited {
                Some(status) => status,
                None => {
                    warn!(device_id = %exit_id, pid = ?pid, "Killing worker process");
                    let _ = child.start_kill();
                    let _ = child.wait().await;
                    reader.abort();
                    return WorkerExit::Killed;
                }
            };

            // Forward everything the worker wrote before reporting the exit.
            let _ = reader.await;

            match status {
                Ok(status) => match status.code() {
                    Some(EXIT_COMPLETED) => WorkerExit::Completed,
                    Some(EXIT_FAILED) => WorkerExit::Failed,
                    Some(EXIT_WORKER_ERROR) => WorkerExit::Crashed("worker error".to_string()),
                    Some(code) => WorkerExit::Crashed(format!("exit code {}", code)),
                    None => WorkerExit::Crashed("terminated by signal".to_string()),
                },
                Err(e) => WorkerExit::Crashed(e.to_string()),
            }
        });

        Ok(WorkerHandle::new(device_id, pid, rx, kill, exit))
    }
}

/// Worker side of process isolation: run one device's workflow and stream
/// its progress to `out` as NDJSON.
///
/// Returns the outcome so the caller can pick the exit code.
pub async fn run_worker<W>(
    gateway: Arc<dyn DeviceGateway>,
    timings: WorkflowTimings,
    device_id: &str,
    options: RefurbishOptions,
    out: W,
) -> std::io::Result<WorkflowOutcome>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, rx) = progress::channel();
    let writer = tokio::spawn(progress::write_ndjson(rx, out));

    let outcome = RefurbishWorkflow::new(gateway, timings, options)
        .run(device_id, &tx)
        .await;
    drop(tx);

    writer.await.map_err(std::io::Error::other)??;
    Ok(outcome)
}

/// Exit code for a workflow outcome.
pub fn exit_code(outcome: &WorkflowOutcome) -> i32 {
    if outcome.is_success() {
        EXIT_COMPLETED
    } else {
        EXIT_FAILED
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phase::Status;
    use ezsync_gateway::{MockDevice, MockGateway, NEVER};

    #[test]
    fn test_command_line() {
        let runner = ProcessRunner::new("/usr/bin/ezsync", ["worker"]);
        let cmd = runner.command(&WorkerRequest {
            device_id: "SN1".into(),
            options: RefurbishOptions {
                skip_speedtest: true,
                skip_firmware: false,
                verbose: true,
            },
        });
        let args: Vec<_> = cmd
            .as_std()
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(args, ["worker", "SN1", "--skip-speedtest", "--verbose"]);
    }

    #[tokio::test]
    async fn test_spawn_failure_is_reported() {
        let runner = ProcessRunner::new("/nonexistent/ezsync-worker", Vec::<String>::new());
        let err = runner
            .launch(&WorkerRequest {
                device_id: "SN1".into(),
                options: RefurbishOptions::default(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, RunnerError::SpawnFailed { ref device_id, .. } if device_id == "SN1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_worker_streams_ndjson() {
        let gateway = Arc::new(MockGateway::with_devices([
            MockDevice::online("SN200").with_connect_offline_polls(NEVER)
        ]));
        let (client, server) = tokio::io::duplex(1 << 20);

        let outcome = run_worker(
            gateway,
            WorkflowTimings::default(),
            "SN200",
            RefurbishOptions::default(),
            client,
        )
        .await
        .unwrap();
        assert_eq!(exit_code(&outcome), EXIT_FAILED);

        let mut lines = BufReader::new(server).lines();
        let mut last = None;
        while let Ok(Some(line)) = lines.next_line().await {
            if let Some(message) = parse_line(&line) {
                last = Some(message);
            }
        }
        let last = last.unwrap();
        assert_eq!(last.status, Status::Failed);
        assert!(last.message.contains("timed out"));
    }
}
