// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! MySQL cluster backing an installation and the credentials it produces.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::Secret;
use kube::{api::ObjectMeta, ResourceExt};

use crate::constants::names;
use crate::resources::{instance_labels, owner_reference, OwnedKind};
use crate::types::mysql::{VolumeClaimSpec, VolumeClaimTemplate, VolumeResources};
use crate::types::{ClusterInstallation, MysqlCluster, MysqlClusterSpec};

/// Name of the secret the MySQL operator fills with the root password
pub fn root_password_secret_name(instance_name: &str) -> String {
    format!(
        "{}{}",
        OwnedKind::DatabaseCluster.resource_name(instance_name),
        names::ROOT_PASSWORD_SUFFIX
    )
}

/// Installation whose database owns the secret called `secret_name`, if any
pub fn installation_for_secret(secret_name: &str) -> Option<&str> {
    secret_name
        .strip_suffix(names::ROOT_PASSWORD_SUFFIX)
        .and_then(|db| db.strip_suffix(names::DATABASE_SUFFIX))
        .filter(|name| !name.is_empty())
}

pub fn cluster(instance: &ClusterInstallation) -> MysqlCluster {
    let database = &instance.spec.database;

    let volume_claim_template = database.storage_size.as_ref().map(|size| VolumeClaimTemplate {
        spec: VolumeClaimSpec {
            access_modes: vec!["ReadWriteOnce".to_string()],
            storage_class_name: database.storage_class.clone(),
            resources: VolumeResources {
                requests: BTreeMap::from([("storage".to_string(), size.clone())]),
            },
        },
    });

    MysqlCluster {
        metadata: ObjectMeta {
            name: Some(OwnedKind::DatabaseCluster.resource_name(&instance.name_any())),
            namespace: instance.namespace(),
            labels: Some(instance_labels(instance)),
            owner_references: Some(vec![owner_reference(instance, OwnedKind::DatabaseCluster)]),
            ..Default::default()
        },
        spec: MysqlClusterSpec {
            members: database.replicas,
            multi_master: None,
            volume_claim_template,
        },
        status: None,
    }
}

/// A secret is usable once it carries a non-empty root password
pub fn has_root_password(secret: &Secret) -> bool {
    let in_data = secret
        .data
        .as_ref()
        .and_then(|d| d.get(names::ROOT_PASSWORD_KEY))
        .is_some_and(|v| !v.0.is_empty());
    let in_string_data = secret
        .string_data
        .as_ref()
        .and_then(|d| d.get(names::ROOT_PASSWORD_KEY))
        .is_some_and(|v| !v.is_empty());

    in_data || in_string_data
}
