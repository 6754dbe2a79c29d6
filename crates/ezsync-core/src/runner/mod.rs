// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Runner module - worker isolation backends.

pub mod process;
pub mod task;
mod traits;

pub use process::{ProcessRunner, run_worker};
pub use task::TaskRunner;
pub use traits::*;
