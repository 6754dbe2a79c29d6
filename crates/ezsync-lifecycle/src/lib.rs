// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! ezSync Lifecycle
//!
//! Single-device operations around refurbishment: reclaiming and deleting
//! radios, status and speed test reports, customer deployment, and the
//! sequential refurbishment run.
//!
//! Deployment reads the customer assigned to a radio from a
//! [`CustomerDirectory`]; [`PgCustomerDirectory`] is the PostgreSQL
//! implementation.

#![deny(missing_docs)]

pub mod directory;
pub mod error;
pub mod geo;
pub mod operations;
pub mod report;

pub use directory::{
    CustomerDirectory, CustomerRecord, DirectoryConfig, DirectoryError, PgCustomerDirectory,
};
pub use error::{LifecycleError, Result};
pub use geo::{azimuth, customer_hostname};
pub use operations::{
    DEPLOY_CONNECT, Deployment, RECLAIMED_HOSTNAME, SequentialSummary, apply_default, delete,
    deploy, deploy_many, deploy_with_budget, reclaim, reclaim_many, refurbish_sequential,
    speed_test_report, status_report,
};
