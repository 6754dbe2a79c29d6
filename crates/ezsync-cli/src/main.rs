// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! ezSync - radio refurbishment tool
//!
//! Entry point for every command. The hidden `worker` subcommand is what
//! the parallel coordinator runs in each child process.

mod cli;

use std::io::IsTerminal;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use ezsync_core::runner::process::{EXIT_WORKER_ERROR, exit_code};
use ezsync_core::{
    Coordinator, CoordinatorConfig, ProcessRunner, TaskRunner, TerminalDashboard, WorkerRunner,
    WorkflowTimings, run_worker,
};
use ezsync_gateway::{ConfigError, DeviceGateway, GatewayConfig, TaranaClient};
use ezsync_lifecycle::{DirectoryConfig, PgCustomerDirectory, RECLAIMED_HOSTNAME};

use cli::{Cli, Command, Isolation, RefurbArgs};

const API_KEY_HELP: &str = "\
TARANA_API_KEY is not set.

Create a .env file in the working directory (or export the variables):

    TARANA_API_KEY=<your API key>
    CPI_ID=<your CPI id>

API keys are issued from the Tarana cloud portal under account settings.";

fn init_tracing(cli: &Cli) {
    let default = if cli.verbose {
        "ezsync=debug"
    } else if matches!(&cli.command, Command::Refurb(args) if args.parallel) {
        "ezsync=warn"
    } else {
        "ezsync=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn gateway() -> Result<Option<Arc<TaranaClient>>> {
    let config = match GatewayConfig::from_env() {
        Ok(config) => config,
        Err(ConfigError::MissingEnvVar("TARANA_API_KEY")) => {
            eprintln!("{}", API_KEY_HELP);
            return Ok(None);
        }
        Err(e) => return Err(e).context("invalid gateway configuration"),
    };
    info!(base_url = %config.base_url, "Using Tarana API");
    Ok(Some(Arc::new(TaranaClient::new(config)?)))
}

fn status(ok: bool) -> ExitCode {
    if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE }
}

/// Exit code when a command cannot run. Workers use their own code so the
/// coordinator does not mistake the error for a failed workflow.
fn failure(command: &Command) -> ExitCode {
    match command {
        Command::Worker(_) => ExitCode::from(EXIT_WORKER_ERROR as u8),
        _ => ExitCode::FAILURE,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let dotenv = dotenvy::dotenv();
    let cli = Cli::parse();
    init_tracing(&cli);

    if let Err(e) = dotenv {
        warn!("No .env file loaded: {}", e);
    }

    let on_error = failure(&cli.command);
    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            on_error
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let Some(client) = gateway()? else {
        return Ok(failure(&cli.command));
    };
    let gateway: Arc<dyn DeviceGateway> = client;
    let verbose = cli.verbose;

    match cli.command {
        Command::Refurb(args) if args.parallel => refurb_parallel(gateway, args, verbose).await,

        Command::Refurb(args) => {
            let timings = WorkflowTimings::from_env()?;
            let summary = ezsync_lifecycle::refurbish_sequential(
                gateway,
                timings,
                &args.serials,
                args.options(verbose),
            )
            .await;
            Ok(status(summary.all_succeeded()))
        }

        Command::Reclaim { serials } => {
            let summary =
                ezsync_lifecycle::reclaim_many(gateway.as_ref(), &serials, RECLAIMED_HOSTNAME)
                    .await;
            Ok(status(summary.all_succeeded()))
        }

        Command::Delete { force, serials } => {
            ezsync_lifecycle::delete(gateway.as_ref(), &serials, force).await?;
            Ok(ExitCode::SUCCESS)
        }

        Command::ApplyDefault { serial } => {
            ezsync_lifecycle::apply_default(gateway.as_ref(), &serial).await?;
            Ok(ExitCode::SUCCESS)
        }

        Command::Status { serial } => {
            ezsync_lifecycle::status_report(gateway.as_ref(), &serial).await?;
            Ok(ExitCode::SUCCESS)
        }

        Command::Speedtest { serial } => {
            let timings = WorkflowTimings::from_env()?;
            ezsync_lifecycle::speed_test_report(gateway.as_ref(), &serial, &timings).await?;
            Ok(ExitCode::SUCCESS)
        }

        Command::Deploy { serials } => {
            let config = DirectoryConfig::from_env()?;
            let directory = PgCustomerDirectory::connect(&config).await?;
            let summary =
                ezsync_lifecycle::deploy_many(gateway.as_ref(), &directory, &serials).await;
            Ok(status(summary.all_succeeded()))
        }

        Command::Worker(args) => {
            let timings = WorkflowTimings::from_env()?;
            let outcome = run_worker(
                gateway,
                timings,
                &args.device_id,
                args.options(verbose),
                tokio::io::stdout(),
            )
            .await
            .context("failed to write progress")?;
            Ok(ExitCode::from(exit_code(&outcome) as u8))
        }
    }
}

async fn refurb_parallel(
    gateway: Arc<dyn DeviceGateway>,
    args: RefurbArgs,
    verbose: bool,
) -> Result<ExitCode> {
    let timings = WorkflowTimings::from_env()?;
    let runner: Arc<dyn WorkerRunner> = match args.isolation {
        Isolation::Process => Arc::new(ProcessRunner::current_exe()?),
        Isolation::Task => Arc::new(TaskRunner::new(gateway, timings)),
    };

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            interrupt.cancel();
        }
    });

    let coordinator = Coordinator::new(
        runner,
        CoordinatorConfig {
            max_workers: args.max_workers,
            ..Default::default()
        },
    );
    let mut dashboard = TerminalDashboard::new(std::io::stdout().is_terminal());
    let report = coordinator
        .refurbish_many(&args.serials, args.options(verbose), &mut dashboard, cancel)
        .await?;

    println!();
    if report.interrupted {
        println!("Interrupted. {} radio(s) marked as failed.", report.failure_count);
    }
    println!(
        "Refurbished {}/{} radio(s), {} failed.",
        report.table.len() - report.failure_count,
        report.table.len(),
        report.failure_count
    );

    Ok(status(report.failure_count == 0))
}
