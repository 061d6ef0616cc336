// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use anyhow::{Context, Result};
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Operator configuration loaded from environment variables
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Only reconcile installations in this namespace; all namespaces when unset
    pub watch_namespace: Option<String>,
    /// Delay before looking again at a dependency owned by another actor
    /// (database credentials, garbage collection of owned resources)
    pub dependency_poll_interval: Duration,
    /// Delay before looking again at an installation whose spec is incomplete
    pub invalid_spec_retry_interval: Duration,
    /// First delay of the exponential backoff applied to failed reconciliations
    pub backoff_base: Duration,
    pub backoff_max: Duration,
    /// Consecutive rejections by the API server before an installation is marked failed
    pub structural_retry_limit: u32,
    /// Deadline of a single API call
    pub api_timeout: Duration,
    /// Installations reconciled in parallel
    pub concurrency: u16,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            watch_namespace: None,
            dependency_poll_interval: Duration::from_secs(10),
            invalid_spec_retry_interval: Duration::from_secs(60),
            backoff_base: Duration::from_millis(500),
            backoff_max: Duration::from_secs(300),
            structural_retry_limit: 5,
            api_timeout: Duration::from_secs(30),
            concurrency: 4,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup, falling back to defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();

        let watch_namespace = lookup("WATCH_NAMESPACE").filter(|ns| !ns.trim().is_empty());

        Ok(Config {
            watch_namespace,
            dependency_poll_interval: Duration::from_secs(parse_or(
                &lookup,
                "DEPENDENCY_POLL_INTERVAL_SECS",
                defaults.dependency_poll_interval.as_secs(),
            )?),
            invalid_spec_retry_interval: Duration::from_secs(parse_or(
                &lookup,
                "INVALID_SPEC_RETRY_INTERVAL_SECS",
                defaults.invalid_spec_retry_interval.as_secs(),
            )?),
            backoff_base: Duration::from_millis(parse_or(
                &lookup,
                "BACKOFF_BASE_MILLIS",
                defaults.backoff_base.as_millis() as u64,
            )?),
            backoff_max: Duration::from_secs(parse_or(
                &lookup,
                "BACKOFF_MAX_SECS",
                defaults.backoff_max.as_secs(),
            )?),
            structural_retry_limit: parse_or(
                &lookup,
                "STRUCTURAL_RETRY_LIMIT",
                defaults.structural_retry_limit,
            )?,
            api_timeout: Duration::from_secs(parse_or(
                &lookup,
                "API_TIMEOUT_SECS",
                defaults.api_timeout.as_secs(),
            )?),
            concurrency: parse_or(&lookup, "RECONCILE_CONCURRENCY", defaults.concurrency)?,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{} has an invalid value '{}'", key, raw)),
        None => Ok(default),
    }
}
