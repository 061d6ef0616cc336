// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Builders for the resources owned by a ClusterInstallation.
//!
//! Every builder is a pure function of the installation: no cluster state is
//! read, and the same installation always yields the same object.

pub mod application;
pub mod database;
pub mod rbac;

use std::collections::BTreeMap;
use std::fmt;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::{Resource, ResourceExt};

use crate::constants::{labels, names, OPERATOR_NAME};
use crate::types::ClusterInstallation;

/// Kinds of resources created on behalf of an installation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OwnedKind {
    ServiceAccount,
    RoleBinding,
    DatabaseCluster,
    Service,
    Ingress,
    Deployment,
}

impl OwnedKind {
    pub const ALL: [OwnedKind; 6] = [
        OwnedKind::ServiceAccount,
        OwnedKind::RoleBinding,
        OwnedKind::DatabaseCluster,
        OwnedKind::Service,
        OwnedKind::Ingress,
        OwnedKind::Deployment,
    ];

    /// Name of the resource of this kind for the installation called `installation`
    pub fn resource_name(self, installation: &str) -> String {
        match self {
            OwnedKind::ServiceAccount | OwnedKind::RoleBinding => names::MYSQL_AGENT.to_string(),
            OwnedKind::DatabaseCluster => format!("{}{}", installation, names::DATABASE_SUFFIX),
            OwnedKind::Service | OwnedKind::Deployment => installation.to_string(),
            OwnedKind::Ingress => format!("{}{}", installation, names::INGRESS_SUFFIX),
        }
    }

    /// Shared kinds are co-owned by every installation of a namespace
    pub fn is_shared(self) -> bool {
        matches!(self, OwnedKind::ServiceAccount | OwnedKind::RoleBinding)
    }
}

impl fmt::Display for OwnedKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            OwnedKind::ServiceAccount => "ServiceAccount",
            OwnedKind::RoleBinding => "RoleBinding",
            OwnedKind::DatabaseCluster => "Cluster",
            OwnedKind::Service => "Service",
            OwnedKind::Ingress => "Ingress",
            OwnedKind::Deployment => "Deployment",
        };
        f.write_str(kind)
    }
}

/// Owner reference pointing back at the installation.
///
/// Shared resources get a plain reference so several installations can own
/// them at once; the others mark the installation as their controller.
pub fn owner_reference(instance: &ClusterInstallation, kind: OwnedKind) -> OwnerReference {
    let controller = !kind.is_shared();

    OwnerReference {
        api_version: ClusterInstallation::api_version(&()).to_string(),
        kind: ClusterInstallation::kind(&()).to_string(),
        name: instance.name_any(),
        uid: instance.uid().unwrap_or_default(),
        controller: controller.then_some(true),
        block_owner_deletion: Some(true),
    }
}

/// Labels selecting the pods of an installation
pub fn selector_labels(instance: &ClusterInstallation) -> BTreeMap<String, String> {
    BTreeMap::from([
        (labels::APP.to_string(), labels::APP_VALUE.to_string()),
        (labels::INSTALLATION.to_string(), instance.name_any()),
    ])
}

/// Labels set on every per-installation resource
pub fn instance_labels(instance: &ClusterInstallation) -> BTreeMap<String, String> {
    let mut labels = selector_labels(instance);
    labels.extend(shared_labels());
    labels
}

/// Labels set on resources shared between installations
pub fn shared_labels() -> BTreeMap<String, String> {
    BTreeMap::from([(labels::MANAGED_BY.to_string(), OPERATOR_NAME.to_string())])
}
