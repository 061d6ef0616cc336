// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum OperatorError {
    #[error("Kubernetes API error: {0}")]
    KubeError(#[from] kube::Error),

    #[error("Kubernetes API call did not complete within {0:?}")]
    Timeout(Duration),

    #[error("Failed to convert object: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Object is missing metadata: {0}")]
    MissingMetadata(String),

    #[error("Invalid installation spec: {0}")]
    InvalidSpec(String),
}

/// How the reconcile loop should react to a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Network, timeout or server-side trouble; retried with backoff.
    Transient,
    /// Optimistic concurrency violation; retried immediately.
    Conflict,
    /// The store rejected what we sent; retried a bounded number of times.
    Structural,
}

impl OperatorError {
    pub fn class(&self) -> ErrorClass {
        match self {
            OperatorError::KubeError(kube::Error::Api(response)) => match response.code {
                409 => ErrorClass::Conflict,
                400 | 422 => ErrorClass::Structural,
                _ => ErrorClass::Transient,
            },
            OperatorError::KubeError(kube::Error::SerdeError(_)) => ErrorClass::Structural,
            OperatorError::KubeError(_) | OperatorError::Timeout(_) => ErrorClass::Transient,
            OperatorError::SerializationError(_)
            | OperatorError::MissingMetadata(_)
            | OperatorError::InvalidSpec(_) => ErrorClass::Structural,
        }
    }
}

pub type Result<T> = std::result::Result<T, OperatorError>;
