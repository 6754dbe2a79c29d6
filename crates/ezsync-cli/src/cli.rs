// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Command line definition.

use clap::{Args, Parser, Subcommand, ValueEnum};
use ezsync_core::RefurbishOptions;

/// Radio refurbishment and lifecycle tool.
#[derive(Debug, Parser)]
#[command(name = "ezsync", version, about)]
pub struct Cli {
    /// Verbose logging.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Refurbish radios (connect, configure, firmware, speed test, finalize).
    Refurb(RefurbArgs),

    /// Reset radios to the default configuration with hostname RECLAIMED.
    Reclaim {
        /// Radio serial numbers.
        #[arg(required = true)]
        serials: Vec<String>,
    },

    /// Delete radios from the account.
    Delete {
        /// Reclaim every radio before deleting it.
        #[arg(long)]
        force: bool,

        /// Radio serial numbers.
        #[arg(required = true)]
        serials: Vec<String>,
    },

    /// Apply the default configuration, using the serial number as hostname.
    #[command(name = "default")]
    ApplyDefault {
        /// Radio serial number.
        serial: String,
    },

    /// Show the current status of a radio.
    Status {
        /// Radio serial number.
        serial: String,
    },

    /// Run speed tests and show averaged results.
    Speedtest {
        /// Radio serial number.
        serial: String,
    },

    /// Configure radios for the customer they are assigned to.
    Deploy {
        /// Radio serial numbers.
        #[arg(required = true)]
        serials: Vec<String>,
    },

    /// Run one device's workflow and stream progress on stdout.
    #[command(hide = true)]
    Worker(WorkerArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Isolation {
    /// One OS process per device.
    Process,
    /// One async task per device, in this process.
    Task,
}

#[derive(Debug, Args)]
pub struct RefurbArgs {
    /// Refurbish all radios at once with a live dashboard.
    #[arg(long)]
    pub parallel: bool,

    /// Maximum radios processed at the same time (parallel mode).
    #[arg(long, requires = "parallel")]
    pub max_workers: Option<usize>,

    /// How parallel workers are isolated.
    #[arg(long, value_enum, default_value_t = Isolation::Process, requires = "parallel")]
    pub isolation: Isolation,

    /// Skip speed tests.
    #[arg(long)]
    pub skip_speedtest: bool,

    /// Skip the firmware upgrade and reboot the radio instead.
    #[arg(long)]
    pub skip_firmware: bool,

    /// Radio serial numbers.
    #[arg(required = true)]
    pub serials: Vec<String>,
}

#[derive(Debug, Args)]
pub struct WorkerArgs {
    /// Radio serial number.
    pub device_id: String,

    #[arg(long)]
    pub skip_speedtest: bool,

    #[arg(long)]
    pub skip_firmware: bool,
}

impl RefurbArgs {
    pub fn options(&self, verbose: bool) -> RefurbishOptions {
        RefurbishOptions {
            skip_speedtest: self.skip_speedtest,
            skip_firmware: self.skip_firmware,
            verbose,
        }
    }
}

impl WorkerArgs {
    pub fn options(&self, verbose: bool) -> RefurbishOptions {
        RefurbishOptions {
            skip_speedtest: self.skip_speedtest,
            skip_firmware: self.skip_firmware,
            verbose,
        }
    }
}
