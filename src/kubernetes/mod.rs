// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Kubernetes plumbing: CRD discovery, deadline-bounded API access and the
//! compare-and-write engine used for owned resources.

pub mod apply;
pub mod crd;
pub mod diff;
pub mod store;

pub use apply::{ensure, Applied};
pub use crd::wait_for_database_crd;
pub use store::Store;
