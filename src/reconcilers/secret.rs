// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Routes database credential secrets to the installation waiting for them.

use kube::runtime::reflector::ObjectRef;
use kube::{Resource, ResourceExt};
use tracing::debug;

use crate::resources::database::installation_for_secret;
use crate::types::ClusterInstallation;

/// Installation to reconcile when `secret` changes, if it holds database credentials.
///
/// Only the name and namespace are read, so a metadata-only secret works too.
pub fn installation_for<K: Resource>(secret: K) -> Option<ObjectRef<ClusterInstallation>> {
    let name = secret.name_any();
    let namespace = secret.namespace()?;
    let installation = installation_for_secret(&name)?;

    debug!(
        "Secret {}/{} holds credentials for installation {}",
        namespace, name, installation
    );
    Some(ObjectRef::new(installation).within(&namespace))
}
