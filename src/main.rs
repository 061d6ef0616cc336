// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use anyhow::Result;
use kube::Client;
use tracing::info;
use tracing_subscriber::EnvFilter;

use mattermost_operator::config::Config;
use mattermost_operator::kubernetes::wait_for_database_crd;
use mattermost_operator::reconcilers::InstallationReconciler;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing, honouring RUST_LOG
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting Mattermost operator");

    // Load configuration
    let config = Config::from_env()?;
    info!(
        "Configuration loaded: watch_namespace={}, concurrency={}",
        config.watch_namespace.as_deref().unwrap_or("<all>"),
        config.concurrency
    );

    // Create Kubernetes client
    let client = Client::try_default().await?;
    info!("Connected to Kubernetes cluster");

    // Database clusters are delegated to the MySQL operator; wait until it is installed
    info!("Waiting for MySQL Cluster CRD to become available...");
    wait_for_database_crd(&client).await?;

    InstallationReconciler::new(client, config).run().await?;

    info!("Mattermost operator stopped");
    Ok(())
}
