// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Ordering of the work needed to converge an installation.
//!
//! Nothing is remembered between cycles. Every cycle gathers a `Snapshot` of
//! the owned resources and `next_step` picks the first step whose resources do
//! not match what the builders produce.

use std::collections::HashMap;
use std::fmt;

use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{Secret, Service, ServiceAccount};
use k8s_openapi::api::networking::v1::Ingress;
use k8s_openapi::api::rbac::v1::RoleBinding;
use kube::ResourceExt;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::error::Result;
use crate::kubernetes::diff;
use crate::kubernetes::store::{Namespaced, Store};
use crate::resources::{application, database, rbac, OwnedKind};
use crate::types::{ClusterInstallation, MysqlCluster};

/// Owned resources of one installation as currently stored
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    objects: HashMap<OwnedKind, Value>,
    database_ready: bool,
    secret_ready: bool,
}

impl Snapshot {
    /// Read every resource derived from the installation `name`
    #[instrument(skip(store))]
    pub async fn gather(store: &Store, namespace: &str, name: &str) -> Result<Self> {
        let mut snapshot = Snapshot::default();

        for kind in OwnedKind::ALL {
            let resource_name = kind.resource_name(name);
            let object = match kind {
                OwnedKind::ServiceAccount => {
                    fetch::<ServiceAccount>(store, namespace, &resource_name).await?
                }
                OwnedKind::RoleBinding => fetch::<RoleBinding>(store, namespace, &resource_name).await?,
                OwnedKind::DatabaseCluster => {
                    fetch::<MysqlCluster>(store, namespace, &resource_name).await?
                }
                OwnedKind::Service => fetch::<Service>(store, namespace, &resource_name).await?,
                OwnedKind::Ingress => fetch::<Ingress>(store, namespace, &resource_name).await?,
                OwnedKind::Deployment => fetch::<Deployment>(store, namespace, &resource_name).await?,
            };
            if let Some(object) = object {
                snapshot.objects.insert(kind, object);
            }
        }

        snapshot.database_ready = snapshot
            .objects
            .get(&OwnedKind::DatabaseCluster)
            .and_then(|v| serde_json::from_value::<MysqlCluster>(v.clone()).ok())
            .is_some_and(|cluster| cluster.is_ready());

        let secret = store
            .get::<Secret>(namespace, &database::root_password_secret_name(name))
            .await?;
        snapshot.secret_ready = secret.as_ref().is_some_and(database::has_root_password);

        debug!(
            "Found {} of {} owned resources, credentials ready: {}",
            snapshot.objects.len(),
            OwnedKind::ALL.len(),
            snapshot.secret_ready
        );
        Ok(snapshot)
    }

    /// Kinds whose stored object names the installation `name` among its owners
    pub fn owned_by(&self, name: &str) -> Vec<OwnedKind> {
        OwnedKind::ALL
            .into_iter()
            .filter(|kind| {
                self.objects
                    .get(kind)
                    .and_then(|object| object.pointer("/metadata/ownerReferences"))
                    .and_then(Value::as_array)
                    .is_some_and(|owners| {
                        owners.iter().any(|owner| {
                            owner["kind"] == "ClusterInstallation" && owner["name"] == name
                        })
                    })
            })
            .collect()
    }

    /// Whether the stored object of `kind` already matches `desired`
    fn satisfies<K: Serialize>(&self, kind: OwnedKind, desired: &K) -> Result<bool> {
        let Some(current) = self.objects.get(&kind) else {
            return Ok(false);
        };
        let mut wanted = serde_json::to_value(desired)?;
        diff::union_owner_references(&mut wanted, current);
        Ok(diff::is_subset(&wanted, current))
    }
}

#[cfg(test)]
impl Snapshot {
    pub fn with_object<K: Serialize>(mut self, kind: OwnedKind, object: &K) -> Result<Self> {
        self.objects.insert(kind, serde_json::to_value(object)?);
        Ok(self)
    }

    pub fn with_secret_ready(mut self, ready: bool) -> Self {
        self.secret_ready = ready;
        self
    }
}

async fn fetch<K: Namespaced>(store: &Store, namespace: &str, name: &str) -> Result<Option<Value>> {
    match store.get_raw::<K>(namespace, name).await? {
        Some(object) => Ok(Some(serde_json::to_value(object)?)),
        None => Ok(None),
    }
}

/// The next thing to do for an installation
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// Agent identity used by the database operator
    Rbac {
        service_account: ServiceAccount,
        role_binding: RoleBinding,
    },
    Database(Box<MysqlCluster>),
    Networking {
        service: Box<Service>,
        ingress: Box<Ingress>,
    },
    /// Nothing to do until the database operator publishes credentials
    AwaitSecret { secret: String, database_ready: bool },
    Deployment(Box<Deployment>),
    Converged,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let step = match self {
            Step::Rbac { .. } => "rbac",
            Step::Database(_) => "database",
            Step::Networking { .. } => "networking",
            Step::AwaitSecret { .. } => "await-secret",
            Step::Deployment(_) => "deployment",
            Step::Converged => "converged",
        };
        f.write_str(step)
    }
}

/// First step, in dependency order, that the snapshot does not satisfy.
///
/// Earlier steps are checked again every cycle, so a resource deleted or
/// changed out of band is repaired before anything after it.
pub fn next_step(instance: &ClusterInstallation, snapshot: &Snapshot) -> Result<Step> {
    let service_account = rbac::service_account(instance);
    let role_binding = rbac::role_binding(instance);
    if !snapshot.satisfies(OwnedKind::ServiceAccount, &service_account)?
        || !snapshot.satisfies(OwnedKind::RoleBinding, &role_binding)?
    {
        return Ok(Step::Rbac {
            service_account,
            role_binding,
        });
    }

    let cluster = database::cluster(instance);
    if !snapshot.satisfies(OwnedKind::DatabaseCluster, &cluster)? {
        return Ok(Step::Database(Box::new(cluster)));
    }

    let service = application::service(instance);
    let ingress = application::ingress(instance);
    if !snapshot.satisfies(OwnedKind::Service, &service)?
        || !snapshot.satisfies(OwnedKind::Ingress, &ingress)?
    {
        return Ok(Step::Networking {
            service: Box::new(service),
            ingress: Box::new(ingress),
        });
    }

    if !snapshot.secret_ready {
        return Ok(Step::AwaitSecret {
            secret: database::root_password_secret_name(&instance.name_any()),
            database_ready: snapshot.database_ready,
        });
    }

    let deployment = application::deployment(instance);
    if !snapshot.satisfies(OwnedKind::Deployment, &deployment)? {
        return Ok(Step::Deployment(Box::new(deployment)));
    }

    Ok(Step::Converged)
}
