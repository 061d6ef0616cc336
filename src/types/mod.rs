// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Custom resources read or written by the operator.

pub mod installation;
pub mod mysql;

pub use installation::{
    ClusterInstallation, ClusterInstallationSpec, ClusterInstallationStatus, DatabaseSpec,
    InstallationState,
};
pub use mysql::{MysqlCluster, MysqlClusterSpec};
