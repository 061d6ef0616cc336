// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Identity used by the MySQL operator's agent to manage the database cluster.

use k8s_openapi::api::core::v1::ServiceAccount;
use k8s_openapi::api::rbac::v1::{RoleBinding, RoleRef, Subject};
use kube::{api::ObjectMeta, ResourceExt};

use crate::constants::names;
use crate::resources::{owner_reference, shared_labels, OwnedKind};
use crate::types::ClusterInstallation;

/// ClusterRole installed alongside the MySQL operator
const AGENT_CLUSTER_ROLE: &str = "mysql-agent";

pub fn service_account(instance: &ClusterInstallation) -> ServiceAccount {
    ServiceAccount {
        metadata: ObjectMeta {
            name: Some(OwnedKind::ServiceAccount.resource_name(&instance.name_any())),
            namespace: instance.namespace(),
            labels: Some(shared_labels()),
            owner_references: Some(vec![owner_reference(instance, OwnedKind::ServiceAccount)]),
            ..Default::default()
        },
        ..Default::default()
    }
}

pub fn role_binding(instance: &ClusterInstallation) -> RoleBinding {
    RoleBinding {
        metadata: ObjectMeta {
            name: Some(OwnedKind::RoleBinding.resource_name(&instance.name_any())),
            namespace: instance.namespace(),
            labels: Some(shared_labels()),
            owner_references: Some(vec![owner_reference(instance, OwnedKind::RoleBinding)]),
            ..Default::default()
        },
        role_ref: RoleRef {
            api_group: "rbac.authorization.k8s.io".to_string(),
            kind: "ClusterRole".to_string(),
            name: AGENT_CLUSTER_ROLE.to_string(),
        },
        subjects: Some(vec![Subject {
            api_group: None,
            kind: "ServiceAccount".to_string(),
            name: names::MYSQL_AGENT.to_string(),
            namespace: instance.namespace(),
        }]),
    }
}
