// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Prints the ClusterInstallation CRD, e.g. `cargo run --bin crdgen | kubectl apply -f -`

use kube::CustomResourceExt;
use mattermost_operator::types::ClusterInstallation;

fn main() -> anyhow::Result<()> {
    print!("{}", serde_yaml::to_string(&ClusterInstallation::crd())?);
    Ok(())
}
