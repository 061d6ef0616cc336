// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Startup check for the MySQL operator's CRD

use crate::constants::crd::{
    MYSQL_GROUP, MYSQL_KIND, MYSQL_VERSION, POLL_INTERVAL_SECS, POLL_MAX_INTERVAL_SECS,
};
use crate::error::Result;
use kube::{discovery::Discovery, Client};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

/// Wait until the database Cluster CRD is served by the API server.
/// Polls with exponential backoff starting at POLL_INTERVAL_SECS seconds.
pub async fn wait_for_database_crd(client: &Client) -> Result<()> {
    let mut interval = POLL_INTERVAL_SECS;

    loop {
        match database_crd_exists(client).await {
            Ok(true) => {
                info!(
                    "{} CRD ({}/{}) is available",
                    MYSQL_KIND, MYSQL_GROUP, MYSQL_VERSION
                );
                return Ok(());
            }
            Ok(false) => {
                info!(
                    "{} CRD ({}/{}) not yet available, is the MySQL operator installed? Waiting {} seconds...",
                    MYSQL_KIND, MYSQL_GROUP, MYSQL_VERSION, interval
                );
            }
            Err(e) => {
                warn!(
                    "Error checking for {} CRD: {}, retrying in {} seconds...",
                    MYSQL_KIND, e, interval
                );
            }
        }

        sleep(Duration::from_secs(interval)).await;

        interval = next_interval(interval);
    }
}

fn next_interval(interval: u64) -> u64 {
    (interval * 2).min(POLL_MAX_INTERVAL_SECS)
}

async fn database_crd_exists(client: &Client) -> Result<bool> {
    let discovery = Discovery::new(client.clone())
        .filter(&[MYSQL_GROUP])
        .run()
        .await?;

    let found = discovery
        .groups()
        .filter(|group| group.name() == MYSQL_GROUP)
        .flat_map(|group| group.recommended_resources())
        .any(|(ar, _)| ar.kind == MYSQL_KIND && ar.version == MYSQL_VERSION);

    Ok(found)
}
