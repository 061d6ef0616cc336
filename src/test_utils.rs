// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! In-memory stand-in for the Kubernetes API server.
//!
//! `FakeApiServer` is a tower service backing a real `kube::Client`. It keeps
//! objects keyed by their item path and implements just enough of the API
//! server for the operator: create, get, replace with resourceVersion checks,
//! merge patches (including `/status`), delete with owner-reference garbage
//! collection, failure injection and a log of successful writes.

use http::{Request, Response};
use http_body_util::BodyExt;
use kube::client::Body;
use kube::{Client, Resource};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use tower::Service;

/// Path of the collection holding objects of kind `K` in `namespace`
pub fn collection_path<K: Resource<DynamicType = ()>>(namespace: &str) -> String {
    K::url_path(&(), Some(namespace))
}

/// Path of the object of kind `K` called `name` in `namespace`
pub fn item_path<K: Resource<DynamicType = ()>>(namespace: &str, name: &str) -> String {
    format!("{}/{}", collection_path::<K>(namespace), name)
}

struct Failure {
    method: String,
    path: String,
    code: u16,
    reason: String,
    remaining: usize,
}

#[derive(Default)]
struct State {
    objects: BTreeMap<String, Value>,
    next_uid: u64,
    next_version: u64,
    failures: Vec<Failure>,
    stalls: Vec<(String, String)>,
    writes: Vec<(String, String)>,
}

impl State {
    fn next_version(&mut self) -> String {
        self.next_version += 1;
        self.next_version.to_string()
    }

    fn next_uid(&mut self) -> String {
        self.next_uid += 1;
        format!("uid-{}", self.next_uid)
    }

    fn take_failure(&mut self, method: &str, path: &str) -> Option<(u16, String)> {
        let failure = self
            .failures
            .iter_mut()
            .find(|f| f.method == method && f.path == path && f.remaining > 0)?;
        failure.remaining -= 1;
        Some((failure.code, failure.reason.clone()))
    }

    /// Remove an object and everything left without owners because of it
    fn delete(&mut self, path: &str) -> Option<Value> {
        let removed = self.objects.remove(path)?;
        let mut orphaned_uids: Vec<String> = removed["metadata"]["uid"]
            .as_str()
            .map(|uid| vec![uid.to_string()])
            .unwrap_or_default();

        while let Some(uid) = orphaned_uids.pop() {
            let mut collect = Vec::new();
            for (path, object) in self.objects.iter_mut() {
                let Some(refs) = object["metadata"]["ownerReferences"].as_array_mut() else {
                    continue;
                };
                let before = refs.len();
                refs.retain(|r| r["uid"].as_str() != Some(uid.as_str()));
                if before > 0 && refs.is_empty() {
                    collect.push(path.clone());
                }
            }
            for path in collect {
                if let Some(object) = self.objects.remove(&path) {
                    if let Some(uid) = object["metadata"]["uid"].as_str() {
                        orphaned_uids.push(uid.to_string());
                    }
                }
            }
        }

        Some(removed)
    }

    fn handle(&mut self, method: &str, path: &str, body: Option<Value>) -> (u16, Value) {
        if let Some((code, reason)) = self.take_failure(method, path) {
            return status(code, &reason, "injected failure");
        }

        let result = match method {
            "GET" => match self.objects.get(path) {
                Some(object) => (200, object.clone()),
                None => not_found(path),
            },
            "POST" => self.create(path, body.unwrap_or(Value::Null)),
            "PUT" => self.replace(path, body.unwrap_or(Value::Null)),
            "PATCH" => self.patch(path, body.unwrap_or(Value::Null)),
            "DELETE" => match self.delete(path) {
                Some(object) => (200, object),
                None => not_found(path),
            },
            _ => status(405, "MethodNotAllowed", method),
        };

        if method != "GET" && result.0 < 300 {
            self.writes.push((method.to_string(), path.to_string()));
        }
        result
    }

    fn create(&mut self, collection: &str, mut object: Value) -> (u16, Value) {
        let Some(name) = object["metadata"]["name"].as_str().map(str::to_string) else {
            return status(422, "Invalid", "metadata.name is required");
        };
        let path = format!("{}/{}", collection, name);
        if self.objects.contains_key(&path) {
            return status(409, "AlreadyExists", &format!("{} already exists", path));
        }

        let uid = self.next_uid();
        let version = self.next_version();
        let metadata = &mut object["metadata"];
        if let Some(namespace) = namespace_of(collection) {
            metadata["namespace"] = json!(namespace);
        }
        metadata["uid"] = json!(uid);
        metadata["resourceVersion"] = json!(version);
        metadata["generation"] = json!(1);

        self.objects.insert(path, object.clone());
        (201, object)
    }

    fn replace(&mut self, path: &str, mut object: Value) -> (u16, Value) {
        let Some(current) = self.objects.get(path) else {
            return not_found(path);
        };
        let current_version = current["metadata"]["resourceVersion"].clone();
        if let Some(version) = object["metadata"]["resourceVersion"].as_str() {
            if Some(version) != current_version.as_str() {
                return status(409, "Conflict", "the object has been modified");
            }
        }

        let generation = current["metadata"]["generation"].as_i64().unwrap_or(1);
        let spec_changed = current.get("spec") != object.get("spec");
        let uid = current["metadata"]["uid"].clone();
        let current_status = current.get("status").cloned();

        let version = self.next_version();
        let metadata = &mut object["metadata"];
        metadata["uid"] = uid;
        metadata["resourceVersion"] = json!(version);
        metadata["generation"] = json!(if spec_changed { generation + 1 } else { generation });
        if let Some(current_status) = current_status {
            object["status"] = current_status;
        }

        self.objects.insert(path.to_string(), object.clone());
        (200, object)
    }

    fn patch(&mut self, path: &str, patch: Value) -> (u16, Value) {
        let item = path.strip_suffix("/status").unwrap_or(path);
        let version = self.next_version();
        let Some(object) = self.objects.get_mut(item) else {
            return not_found(item);
        };
        json_patch::merge(object, &patch);
        object["metadata"]["resourceVersion"] = json!(version);
        (200, object.clone())
    }
}

fn namespace_of(path: &str) -> Option<&str> {
    let mut segments = path.split('/');
    segments.find(|s| *s == "namespaces")?;
    segments.next()
}

fn status(code: u16, reason: &str, message: &str) -> (u16, Value) {
    (
        code,
        json!({
            "kind": "Status",
            "apiVersion": "v1",
            "status": "Failure",
            "message": message,
            "reason": reason,
            "code": code
        }),
    )
}

fn not_found(path: &str) -> (u16, Value) {
    status(404, "NotFound", &format!("{} not found", path))
}

/// In-memory API server; clones share the same object store.
#[derive(Clone, Default)]
pub struct FakeApiServer {
    state: Arc<Mutex<State>>,
}

impl FakeApiServer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a kube Client talking to this server
    pub fn client(&self) -> Client {
        Client::new(self.clone(), "default")
    }

    /// Store an object directly, bypassing the write log
    pub fn seed<K>(&self, object: &K) -> K
    where
        K: Resource<DynamicType = ()> + Serialize + DeserializeOwned,
    {
        let stored = self.seed_value::<K>(serde_json::to_value(object).unwrap());
        serde_json::from_value(stored).unwrap()
    }

    /// Store a raw object of kind `K`, including fields `K` does not model
    pub fn seed_value<K: Resource<DynamicType = ()>>(&self, mut value: Value) -> Value {
        let namespace = value["metadata"]["namespace"].as_str().unwrap_or_default().to_string();
        let name = value["metadata"]["name"].as_str().unwrap_or_default().to_string();
        let path = item_path::<K>(&namespace, &name);

        let mut state = self.state.lock().unwrap();
        if value["metadata"]["uid"].is_null() {
            value["metadata"]["uid"] = json!(state.next_uid());
        }
        if value["metadata"]["generation"].is_null() {
            value["metadata"]["generation"] = json!(1);
        }
        value["metadata"]["resourceVersion"] = json!(state.next_version());
        state.objects.insert(path, value.clone());
        value
    }

    /// Read an object the way the API server stores it
    pub fn get<K>(&self, namespace: &str, name: &str) -> Option<K>
    where
        K: Resource<DynamicType = ()> + DeserializeOwned,
    {
        let state = self.state.lock().unwrap();
        state
            .objects
            .get(&item_path::<K>(namespace, name))
            .map(|v| serde_json::from_value(v.clone()).unwrap())
    }

    pub fn contains<K: Resource<DynamicType = ()>>(&self, namespace: &str, name: &str) -> bool {
        let state = self.state.lock().unwrap();
        state.objects.contains_key(&item_path::<K>(namespace, name))
    }

    /// Delete an object out of band, garbage collecting its dependents
    pub fn remove<K: Resource<DynamicType = ()>>(&self, namespace: &str, name: &str) {
        let mut state = self.state.lock().unwrap();
        state.delete(&item_path::<K>(namespace, name));
    }

    /// Answer the next `times` requests for `method` on `path` with an error status
    pub fn fail(&self, method: &str, path: &str, code: u16, reason: &str, times: usize) {
        let mut state = self.state.lock().unwrap();
        state.failures.push(Failure {
            method: method.to_string(),
            path: path.to_string(),
            code,
            reason: reason.to_string(),
            remaining: times,
        });
    }

    /// Never answer requests for `method` on `path`
    pub fn stall(&self, method: &str, path: &str) {
        let mut state = self.state.lock().unwrap();
        state.stalls.push((method.to_string(), path.to_string()));
    }

    /// Successful mutating requests as (method, path), oldest first
    pub fn writes(&self) -> Vec<(String, String)> {
        self.state.lock().unwrap().writes.clone()
    }

    pub fn write_count(&self) -> usize {
        self.state.lock().unwrap().writes.len()
    }
}

impl Service<Request<Body>> for FakeApiServer {
    type Response = Response<Body>;
    type Error = tower::BoxError;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let state = self.state.clone();

        Box::pin(async move {
            let method = req.method().to_string();
            let path = req.uri().path().to_string();
            let bytes = req.into_body().collect().await?.to_bytes();
            let body = if bytes.is_empty() {
                None
            } else {
                Some(serde_json::from_slice::<Value>(&bytes)?)
            };

            let stalled = {
                let state = state.lock().unwrap();
                state.stalls.iter().any(|(m, p)| *m == method && *p == path)
            };
            if stalled {
                std::future::pending::<()>().await;
            }

            let (code, body) = state.lock().unwrap().handle(&method, &path, body);

            Ok(Response::builder()
                .status(code)
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_vec(&body)?))
                .unwrap())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::ConfigMap;
    use kube::api::{ObjectMeta, PostParams};
    use kube::Api;

    fn config_map(name: &str, owner_uid: Option<&str>) -> ConfigMap {
        ConfigMap {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some("default".to_string()),
                owner_references: owner_uid.map(|uid| {
                    vec![k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference {
                        api_version: "v1".to_string(),
                        kind: "ConfigMap".to_string(),
                        name: "owner".to_string(),
                        uid: uid.to_string(),
                        ..Default::default()
                    }]
                }),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_then_get_through_client() {
        let server = FakeApiServer::new();
        let api: Api<ConfigMap> = Api::namespaced(server.client(), "default");

        let created = api
            .create(&PostParams::default(), &config_map("a", None))
            .await
            .unwrap();
        assert!(created.metadata.uid.is_some());

        let fetched = api.get("a").await.unwrap();
        assert_eq!(fetched.metadata.uid, created.metadata.uid);
        assert_eq!(server.write_count(), 1);
    }

    #[tokio::test]
    async fn test_replace_with_stale_version_conflicts() {
        let server = FakeApiServer::new();
        let mut stored = server.seed(&config_map("a", None));
        let api: Api<ConfigMap> = Api::namespaced(server.client(), "default");

        stored.metadata.resource_version = Some("stale".to_string());
        let err = api
            .replace("a", &PostParams::default(), &stored)
            .await
            .unwrap_err();
        assert!(matches!(err, kube::Error::Api(ref e) if e.code == 409));
        assert_eq!(server.write_count(), 0);
    }

    #[tokio::test]
    async fn test_injected_failures_are_consumed() {
        let server = FakeApiServer::new();
        server.seed(&config_map("a", None));
        server.fail("GET", &item_path::<ConfigMap>("default", "a"), 500, "InternalError", 1);
        let api: Api<ConfigMap> = Api::namespaced(server.client(), "default");

        assert!(api.get("a").await.is_err());
        assert!(api.get("a").await.is_ok());
    }

    #[test]
    fn test_remove_collects_orphaned_dependents() {
        let server = FakeApiServer::new();
        let owner = server.seed(&config_map("owner", None));
        let uid = owner.metadata.uid.unwrap();
        let child = server.seed(&config_map("child", Some(&uid)));
        server.seed(&config_map(
            "grandchild",
            child.metadata.uid.as_deref(),
        ));
        server.seed(&config_map("unrelated", None));

        server.remove::<ConfigMap>("default", "owner");

        assert!(!server.contains::<ConfigMap>("default", "child"));
        assert!(!server.contains::<ConfigMap>("default", "grandchild"));
        assert!(server.contains::<ConfigMap>("default", "unrelated"));
    }
}
