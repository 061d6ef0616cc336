// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use std::collections::BTreeMap;

use kube::CustomResource;
use serde::{Deserialize, Serialize};

use crate::constants::defaults;
use crate::error::{OperatorError, Result};

/// Desired state of a hosted Mattermost installation
#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, PartialEq, schemars::JsonSchema)]
#[kube(group = "mattermost.com", version = "v1alpha1", kind = "ClusterInstallation")]
#[kube(namespaced)]
#[kube(derive = "PartialEq")]
#[kube(status = "ClusterInstallationStatus")]
#[kube(shortname = "ci")]
#[kube(printcolumn = r#"{"name":"State","type":"string","jsonPath":".status.state"}"#)]
#[kube(printcolumn = r#"{"name":"Ingress","type":"string","jsonPath":".spec.ingressName"}"#)]
#[serde(rename_all = "camelCase")]
pub struct ClusterInstallationSpec {
    /// Hostname routed to the application
    pub ingress_name: String,
    #[serde(default = "default_image")]
    pub image: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default = "default_replicas")]
    pub replicas: i32,
    #[serde(default)]
    pub database: DatabaseSpec,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseSpec {
    /// Members of the MySQL cluster
    #[serde(default = "default_database_replicas")]
    pub replicas: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_size: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_class: Option<String>,
    /// Extra query parameters of the connection string
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub connection_overrides: BTreeMap<String, String>,
}

impl Default for DatabaseSpec {
    fn default() -> Self {
        DatabaseSpec {
            replicas: defaults::DATABASE_REPLICAS,
            storage_size: None,
            storage_class: None,
            connection_overrides: BTreeMap::new(),
        }
    }
}

fn default_image() -> String {
    defaults::IMAGE.to_string()
}

fn default_version() -> String {
    defaults::VERSION.to_string()
}

fn default_replicas() -> i32 {
    defaults::REPLICAS
}

fn default_database_replicas() -> i32 {
    defaults::DATABASE_REPLICAS
}

impl ClusterInstallationSpec {
    /// Container image reference of the application
    pub fn image_reference(&self) -> String {
        if self.version.is_empty() {
            self.image.clone()
        } else {
            format!("{}:{}", self.image, self.version)
        }
    }

    /// Reject specs the API server accepts but the operator cannot act on.
    pub fn validate(&self) -> Result<()> {
        if self.ingress_name.trim().is_empty() {
            return Err(OperatorError::InvalidSpec(
                "ingressName must not be empty".to_string(),
            ));
        }
        if self.image.trim().is_empty() {
            return Err(OperatorError::InvalidSpec("image must not be empty".to_string()));
        }
        if self.replicas < 1 {
            return Err(OperatorError::InvalidSpec(format!(
                "replicas must be at least 1, got {}",
                self.replicas
            )));
        }
        if self.database.replicas < 1 {
            return Err(OperatorError::InvalidSpec(format!(
                "database.replicas must be at least 1, got {}",
                self.database.replicas
            )));
        }

        let overrides = &self.database.connection_overrides;
        if overrides.len() > defaults::MAX_CONNECTION_OVERRIDES {
            return Err(OperatorError::InvalidSpec(format!(
                "database.connectionOverrides allows at most {} entries, got {}",
                defaults::MAX_CONNECTION_OVERRIDES,
                overrides.len()
            )));
        }
        if let Some(key) = overrides
            .keys()
            .find(|k| k.is_empty() || k.contains(['&', '=', '?']))
        {
            return Err(OperatorError::InvalidSpec(format!(
                "database.connectionOverrides has an invalid key '{}'",
                key
            )));
        }
        if let Some((key, _)) = overrides.iter().find(|(_, v)| v.contains('&')) {
            return Err(OperatorError::InvalidSpec(format!(
                "database.connectionOverrides value of '{}' must not contain '&'",
                key
            )));
        }

        Ok(())
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, schemars::JsonSchema)]
pub enum InstallationState {
    Reconciling,
    Stable,
    Failed,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClusterInstallationStatus {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<InstallationState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
}

impl ClusterInstallation {
    /// Status to record for the given state, tagged with the current generation
    pub fn status_for(&self, state: InstallationState, message: Option<String>) -> ClusterInstallationStatus {
        ClusterInstallationStatus {
            state: Some(state),
            message,
            observed_generation: self.metadata.generation,
        }
    }

    /// Whether recording `desired` would change the stored status
    pub fn status_differs(&self, desired: &ClusterInstallationStatus) -> bool {
        self.status.as_ref() != Some(desired)
    }
}
