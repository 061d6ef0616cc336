// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Deadline-bounded access to the cluster store

use std::fmt::Debug;
use std::future::Future;
use std::time::Duration;

use k8s_openapi::NamespaceResourceScope;
use kube::api::{ApiResource, DynamicObject, Patch, PatchParams, PostParams};
use kube::{Api, Client, Resource};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, instrument};

use crate::constants::OPERATOR_NAME;
use crate::error::{OperatorError, Result};

/// Bounds on the resource kinds the store handles
pub trait Namespaced:
    Resource<Scope = NamespaceResourceScope, DynamicType = ()>
    + Clone
    + Debug
    + Serialize
    + DeserializeOwned
    + Send
    + Sync
    + 'static
{
}

impl<K> Namespaced for K where
    K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>
        + Clone
        + Debug
        + Serialize
        + DeserializeOwned
        + Send
        + Sync
        + 'static
{
}

/// Reads and writes namespaced objects, failing any call that outlives the deadline.
#[derive(Clone)]
pub struct Store {
    client: Client,
    timeout: Duration,
}

impl Store {
    pub fn new(client: Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    fn api<K: Namespaced>(&self, namespace: &str) -> Api<K> {
        Api::namespaced(self.client.clone(), namespace)
    }

    /// Untyped view of kind `K`, keeping fields the typed model does not know
    fn raw_api<K: Namespaced>(&self, namespace: &str) -> Api<DynamicObject> {
        Api::namespaced_with(self.client.clone(), namespace, &ApiResource::erase::<K>(&()))
    }

    fn post_params() -> PostParams {
        PostParams {
            field_manager: Some(OPERATOR_NAME.to_string()),
            ..Default::default()
        }
    }

    async fn bounded<T, F>(&self, call: F) -> Result<T>
    where
        F: Future<Output = kube::Result<T>>,
    {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(OperatorError::Timeout(self.timeout)),
        }
    }

    /// Fetch an object; a missing object is `None`, not an error
    #[instrument(skip(self), fields(kind = %K::kind(&())))]
    pub async fn get<K: Namespaced>(&self, namespace: &str, name: &str) -> Result<Option<K>> {
        self.bounded(self.api::<K>(namespace).get_opt(name)).await
    }

    /// Fetch an object of kind `K` with every field the server returned
    #[instrument(skip(self), fields(kind = %K::kind(&())))]
    pub async fn get_raw<K: Namespaced>(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<DynamicObject>> {
        self.bounded(self.raw_api::<K>(namespace).get_opt(name)).await
    }

    #[instrument(skip(self, object), fields(kind = %K::kind(&())))]
    pub async fn create<K: Namespaced>(&self, namespace: &str, object: &K) -> Result<K> {
        let created = self
            .bounded(self.api::<K>(namespace).create(&Self::post_params(), object))
            .await?;
        debug!("Created {}/{}", namespace, created.meta().name.as_deref().unwrap_or_default());
        Ok(created)
    }

    /// Replace an object of kind `K`; the server rejects it with 409 when
    /// `object` carries a resourceVersion that is no longer current.
    #[instrument(skip(self, object), fields(kind = %K::kind(&())))]
    pub async fn replace_raw<K: Namespaced>(
        &self,
        namespace: &str,
        name: &str,
        object: &DynamicObject,
    ) -> Result<DynamicObject> {
        self.bounded(
            self.raw_api::<K>(namespace)
                .replace(name, &Self::post_params(), object),
        )
        .await
    }

    /// Merge `status` into the status subresource
    #[instrument(skip(self, status), fields(kind = %K::kind(&())))]
    pub async fn patch_status<K: Namespaced, S: Serialize + Debug>(
        &self,
        namespace: &str,
        name: &str,
        status: &S,
    ) -> Result<K> {
        let patch = serde_json::json!({ "status": status });
        let params = PatchParams {
            field_manager: Some(OPERATOR_NAME.to_string()),
            ..Default::default()
        };
        self.bounded(
            self.api::<K>(namespace)
                .patch_status(name, &params, &Patch::Merge(&patch)),
        )
        .await
    }
}
