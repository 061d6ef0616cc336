// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

/// The operator name used as field manager and managed-by label value
pub const OPERATOR_NAME: &str = "mattermost-operator";

/// Names of owned resources
pub mod names {
    /// Service account and role binding used by the MySQL operator's agent.
    /// Shared by every installation of a namespace.
    pub const MYSQL_AGENT: &str = "mysql-agent";
    pub const INGRESS_SUFFIX: &str = "-ingress";
    pub const DATABASE_SUFFIX: &str = "-mysql";
    /// Appended to the database cluster name by the MySQL operator
    pub const ROOT_PASSWORD_SUFFIX: &str = "-root-password";
    pub const ROOT_PASSWORD_KEY: &str = "password";
    pub const CONTAINER: &str = "mattermost";
}

/// Kubernetes label keys and values used by the operator
pub mod labels {
    pub const APP: &str = "app";
    pub const APP_VALUE: &str = "mattermost";
    pub const INSTALLATION: &str = "v1alpha1.mattermost.com/installation";
    pub const MANAGED_BY: &str = "app.kubernetes.io/managed-by";
}

/// Defaults applied to fields omitted from a ClusterInstallation spec
pub mod defaults {
    pub const IMAGE: &str = "mattermost/mattermost-enterprise-edition";
    pub const VERSION: &str = "5.6.0";
    pub const REPLICAS: i32 = 1;
    pub const DATABASE_REPLICAS: i32 = 2;
    pub const MAX_CONNECTION_OVERRIDES: usize = 16;
}

/// Ports and endpoints of the application and its database
pub mod network {
    pub const APP_PORT: i32 = 8065;
    pub const APP_PORT_NAME: &str = "app";
    pub const MYSQL_PORT: i32 = 3306;
    pub const HEALTH_PATH: &str = "/api/v4/system/ping";
    pub const DATABASE: &str = "mysql";
    pub const INGRESS_CLASS: &str = "nginx";
}

/// CRD polling configuration
pub mod crd {
    /// API group of the MySQL operator's Cluster resource
    pub const MYSQL_GROUP: &str = "mysql.oracle.com";
    pub const MYSQL_VERSION: &str = "v1alpha1";
    pub const MYSQL_KIND: &str = "Cluster";
    /// Initial polling interval in seconds when waiting for CRD
    pub const POLL_INTERVAL_SECS: u64 = 10;
    /// Maximum polling interval in seconds (exponential backoff cap)
    pub const POLL_MAX_INTERVAL_SECS: u64 = 60;
}
