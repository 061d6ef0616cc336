// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Create-or-update of owned resources

use kube::api::DynamicObject;
use kube::Resource;
use tracing::{debug, info, instrument};

use crate::error::{OperatorError, Result};
use crate::kubernetes::diff;
use crate::kubernetes::store::{Namespaced, Store};

/// What `ensure` had to do to make the cluster match
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Created,
    Updated,
    Unchanged,
}

/// Make the stored object match `desired` on the fields `desired` sets.
///
/// Missing objects are created. Drifted objects are merged and replaced with
/// the resourceVersion that was read, so a concurrent writer makes the update
/// fail with a conflict instead of being overwritten.
#[instrument(skip(store, desired), fields(kind = %K::kind(&()), name = ?desired.meta().name))]
pub async fn ensure<K: Namespaced>(store: &Store, desired: &K) -> Result<Applied> {
    let name = desired
        .meta()
        .name
        .clone()
        .ok_or_else(|| OperatorError::MissingMetadata(format!("{} has no name", K::kind(&()))))?;
    let namespace = desired.meta().namespace.clone().ok_or_else(|| {
        OperatorError::MissingMetadata(format!("{} {} has no namespace", K::kind(&()), name))
    })?;

    let Some(current) = store.get_raw::<K>(&namespace, &name).await? else {
        store.create(&namespace, desired).await?;
        info!("Created {} {}/{}", K::kind(&()), namespace, name);
        return Ok(Applied::Created);
    };

    let current = serde_json::to_value(&current)?;
    let mut wanted = serde_json::to_value(desired)?;
    diff::union_owner_references(&mut wanted, &current);

    if diff::is_subset(&wanted, &current) {
        debug!("{} {}/{} is up to date", K::kind(&()), namespace, name);
        return Ok(Applied::Unchanged);
    }

    let updated: DynamicObject = serde_json::from_value(diff::merge(&current, &wanted))?;
    store.replace_raw::<K>(&namespace, &name, &updated).await?;
    info!("Updated {} {}/{}", K::kind(&()), namespace, name);
    Ok(Applied::Updated)
}
