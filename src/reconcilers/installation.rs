// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Installation reconciler - converges a ClusterInstallation one step per cycle.

use crate::config::Config;
use crate::error::{ErrorClass, OperatorError, Result};
use crate::kubernetes::{ensure, Store};
use crate::reconcilers::backoff::{backoff_delay, FailureTracker};
use crate::reconcilers::secret;
use crate::reconcilers::sequencer::{next_step, Snapshot, Step};
use crate::types::{ClusterInstallation, InstallationState, MysqlCluster};
use futures::StreamExt;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{Secret, Service};
use k8s_openapi::api::networking::v1::Ingress;
use k8s_openapi::NamespaceResourceScope;
use kube::{
    runtime::{
        controller::{self, Action},
        metadata_watcher,
        reflector::ObjectRef,
        watcher, Controller, WatchStreamExt,
    },
    Api, Client, Resource, ResourceExt,
};
use kube_runtime::controller::Config as ControllerConfig;
use kube_runtime::watcher::Config as WatcherConfig;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

/// Shared state handed to every reconciliation
pub struct Context {
    pub store: Store,
    pub config: Config,
    backoff: FailureTracker,
    structural: FailureTracker,
}

impl Context {
    pub fn new(client: Client, config: Config) -> Self {
        Self {
            store: Store::new(client, config.api_timeout),
            config,
            backoff: FailureTracker::default(),
            structural: FailureTracker::default(),
        }
    }

    /// Drop the failure counts of an installation that no longer exists
    fn forget(&self, key: &str) {
        self.backoff.reset(key);
        self.structural.reset(key);
    }
}

/// Result of one reconciliation cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Converged,
    RequeueAfter(Duration),
    RequeueNow,
    Fatal(String),
}

impl Outcome {
    pub fn into_action(self) -> Action {
        match self {
            Outcome::Converged | Outcome::Fatal(_) => Action::await_change(),
            Outcome::RequeueAfter(delay) => Action::requeue(delay),
            Outcome::RequeueNow => Action::requeue(Duration::ZERO),
        }
    }
}

pub struct InstallationReconciler {
    client: Client,
    config: Config,
}

impl InstallationReconciler {
    pub fn new(client: Client, config: Config) -> Self {
        Self { client, config }
    }

    /// Api for `K` limited to the watched namespace, if any
    fn scoped_api<K>(&self) -> Api<K>
    where
        K: Resource<Scope = NamespaceResourceScope>,
        <K as Resource>::DynamicType: Default,
    {
        match &self.config.watch_namespace {
            Some(namespace) => Api::namespaced(self.client.clone(), namespace),
            None => Api::all(self.client.clone()),
        }
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let installations: Api<ClusterInstallation> = self.scoped_api();
        let controller_config = ControllerConfig::default().concurrency(self.config.concurrency);

        match &self.config.watch_namespace {
            Some(namespace) => info!("Watching installations in namespace {}", namespace),
            None => info!("Watching installations in all namespaces"),
        }

        // Database clusters and secrets are only needed as triggers, so their
        // watches carry metadata alone.
        let clusters = metadata_watcher(self.scoped_api::<MysqlCluster>(), WatcherConfig::default())
            .touched_objects()
            .default_backoff();
        let secrets = metadata_watcher(self.scoped_api::<Secret>(), WatcherConfig::default())
            .touched_objects()
            .default_backoff();

        let controller = Controller::new(installations, WatcherConfig::default())
            .owns_stream(clusters)
            .owns(self.scoped_api::<Service>(), WatcherConfig::default())
            .owns(self.scoped_api::<Ingress>(), WatcherConfig::default())
            .owns(self.scoped_api::<Deployment>(), WatcherConfig::default())
            .watches_stream(secrets, secret::installation_for)
            .with_config(controller_config);

        let context = Arc::new(Context::new(self.client, self.config));
        let reporter = context.clone();

        controller
            .shutdown_on_signal()
            .run(reconcile, error_policy, context)
            .for_each(|res| {
                report(&reporter, res);
                futures::future::ready(())
            })
            .await;

        info!("Installation controller stopped");
        Ok(())
    }
}

fn instance_key(namespace: &str, name: &str) -> String {
    format!("{}/{}", namespace, name)
}

type ControllerResult = std::result::Result<
    (ObjectRef<ClusterInstallation>, Action),
    controller::Error<OperatorError, watcher::Error>,
>;

/// Log the result of a reconciliation run by the controller
fn report(ctx: &Context, result: ControllerResult) {
    match result {
        Ok((installation, action)) => {
            debug!("Reconciled installation {}: {:?}", installation, action)
        }
        // Queued retries of a deleted installation end up here instead of in `reconcile`.
        Err(controller::Error::ObjectNotFound(object)) => {
            let key = instance_key(object.namespace.as_deref().unwrap_or_default(), &object.name);
            debug!("Installation {} no longer exists", key);
            ctx.forget(&key);
        }
        Err(e) => warn!("Reconciliation error: {:?}", e),
    }
}

pub async fn reconcile(instance: Arc<ClusterInstallation>, ctx: Arc<Context>) -> Result<Action> {
    let name = instance.name_any();
    let namespace = instance.namespace().ok_or_else(|| {
        OperatorError::MissingMetadata(format!("installation {} has no namespace", name))
    })?;
    let key = instance_key(&namespace, &name);

    debug!("Reconciling installation: {}", key);

    let outcome = match converge(&ctx, &namespace, &name).await {
        Ok(outcome) => {
            ctx.backoff.reset(&key);
            ctx.structural.reset(&key);
            outcome
        }
        Err(e) => match e.class() {
            ErrorClass::Conflict => {
                debug!("Installation {} changed underneath us, retrying: {}", key, e);
                Outcome::RequeueNow
            }
            ErrorClass::Transient => return Err(e),
            ErrorClass::Structural => {
                let failures = ctx.structural.record(&key, instance.metadata.generation);
                if failures < ctx.config.structural_retry_limit {
                    warn!(
                        "Installation {} rejected ({} of {} attempts): {}",
                        key, failures, ctx.config.structural_retry_limit, e
                    );
                    return Err(e);
                }

                error!(
                    "Giving up on installation {} after {} rejected attempts: {}",
                    key, failures, e
                );
                let message = e.to_string();
                record_status(&ctx, &instance, InstallationState::Failed, Some(message.clone()))
                    .await?;
                Outcome::Fatal(message)
            }
        },
    };

    Ok(outcome.into_action())
}

pub fn error_policy(
    instance: Arc<ClusterInstallation>,
    error: &OperatorError,
    ctx: Arc<Context>,
) -> Action {
    let key = instance_key(&instance.namespace().unwrap_or_default(), &instance.name_any());
    let attempt = ctx.backoff.record(&key, instance.metadata.generation);
    let delay = backoff_delay(ctx.config.backoff_base, ctx.config.backoff_max, attempt);

    warn!(
        "Reconciliation of {} failed (attempt {}), retrying in {:?}: {}",
        key, attempt, delay, error
    );
    Action::requeue(delay)
}

/// Run one step towards the declared state of the installation
#[instrument(skip(ctx))]
async fn converge(ctx: &Context, namespace: &str, name: &str) -> Result<Outcome> {
    let Some(instance) = ctx.store.get::<ClusterInstallation>(namespace, name).await? else {
        let remaining = Snapshot::gather(&ctx.store, namespace, name)
            .await?
            .owned_by(name);
        if remaining.is_empty() {
            info!("Installation {}/{} is gone along with its resources", namespace, name);
        } else {
            info!(
                "Installation {}/{} is gone, waiting for garbage collection of {:?}",
                namespace, name, remaining
            );
        }
        return Ok(Outcome::Converged);
    };

    if instance.metadata.deletion_timestamp.is_some() {
        let remaining = Snapshot::gather(&ctx.store, namespace, name)
            .await?
            .owned_by(name);
        if remaining.is_empty() {
            return Ok(Outcome::Converged);
        }
        debug!(
            "Installation {}/{} is being deleted, {} owned resources remain",
            namespace,
            name,
            remaining.len()
        );
        return Ok(Outcome::RequeueAfter(ctx.config.dependency_poll_interval));
    }

    if let Err(e) = instance.spec.validate() {
        warn!("Installation {}/{} cannot be reconciled: {}", namespace, name, e);
        record_status(ctx, &instance, InstallationState::Reconciling, Some(e.to_string())).await?;
        return Ok(Outcome::RequeueAfter(ctx.config.invalid_spec_retry_interval));
    }

    let snapshot = Snapshot::gather(&ctx.store, namespace, name).await?;
    let step = next_step(&instance, &snapshot)?;
    debug!("Next step for installation {}/{}: {}", namespace, name, step);

    let (outcome, state, message) = match step {
        Step::Rbac {
            service_account,
            role_binding,
        } => {
            ensure(&ctx.store, &service_account).await?;
            ensure(&ctx.store, &role_binding).await?;
            (Outcome::RequeueNow, InstallationState::Reconciling, None)
        }
        Step::Database(cluster) => {
            ensure(&ctx.store, cluster.as_ref()).await?;
            (Outcome::RequeueNow, InstallationState::Reconciling, None)
        }
        Step::Networking { service, ingress } => {
            ensure(&ctx.store, service.as_ref()).await?;
            ensure(&ctx.store, ingress.as_ref()).await?;
            (Outcome::RequeueNow, InstallationState::Reconciling, None)
        }
        Step::AwaitSecret {
            secret,
            database_ready,
        } => {
            info!(
                "Installation {}/{} waiting for database credentials in secret {} (database ready: {})",
                namespace, name, secret, database_ready
            );
            (
                Outcome::RequeueAfter(ctx.config.dependency_poll_interval),
                InstallationState::Reconciling,
                Some(format!("Waiting for database credentials in secret {}", secret)),
            )
        }
        Step::Deployment(deployment) => {
            ensure(&ctx.store, deployment.as_ref()).await?;
            (Outcome::RequeueNow, InstallationState::Reconciling, None)
        }
        Step::Converged => (Outcome::Converged, InstallationState::Stable, None),
    };

    record_status(ctx, &instance, state, message).await?;
    Ok(outcome)
}

/// Write the installation status when it differs from what is stored
async fn record_status(
    ctx: &Context,
    instance: &ClusterInstallation,
    state: InstallationState,
    message: Option<String>,
) -> Result<()> {
    let status = instance.status_for(state, message);
    if !instance.status_differs(&status) {
        return Ok(());
    }

    // Explicit nulls clear fields left over from an earlier status.
    let patch = serde_json::json!({
        "state": status.state,
        "message": status.message,
        "observedGeneration": status.observed_generation,
    });
    let name = instance.name_any();
    let namespace = instance.namespace().unwrap_or_default();
    ctx.store
        .patch_status::<ClusterInstallation, _>(&namespace, &name, &patch)
        .await?;

    info!("Installation {}/{} is now {:?}", namespace, name, state);
    Ok(())
}
