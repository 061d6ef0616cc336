// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Reconciliation of ClusterInstallations and the policy around it.

pub mod backoff;
pub mod installation;
pub mod secret;
pub mod sequencer;

pub use installation::{Context, InstallationReconciler, Outcome};
pub use sequencer::{next_step, Snapshot, Step};
