//! Reconciliation error types.

use std::time::Duration;

use tenancy_core::{CoreError, ObjectKey};
use tenancy_store::{ErrorCategory, StoreError};

/// Errors that abort a reconciliation invocation.
#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Model(#[from] CoreError),

    /// The token secret exists but the store has not filled in its value yet.
    #[error("Token for {namespace}/{name} is not materialized yet")]
    TokenNotMaterialized { namespace: String, name: String },

    /// The shared policy document could not be found.
    #[error("Policy document {key} not found")]
    MissingPolicyDocument { key: String },

    #[error("{operation} gave up after {attempts} attempts: {last}")]
    RetryExhausted {
        operation: String,
        attempts: u32,
        last: Box<ReconcileError>,
    },

    #[error("Reconciliation cancelled")]
    Cancelled,

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ReconcileError {
    pub fn token_not_materialized(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self::TokenNotMaterialized {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    pub fn missing_policy_document(key: &ObjectKey) -> Self {
        Self::MissingPolicyDocument {
            key: key.to_string(),
        }
    }

    /// Optimistic-concurrency conflict reported by the store.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Store(e) if e.is_conflict())
    }

    /// Whether the request should be delivered again.
    ///
    /// Every failure except cancellation is redelivered; invalid writes and
    /// store faults may clear once the tenant or the store changes.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Cancelled)
    }

    /// Failures expected to clear within a few backoff steps.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Store(e) => !matches!(
                e.category(),
                ErrorCategory::Validation | ErrorCategory::Internal
            ),
            Self::TokenNotMaterialized { .. } | Self::MissingPolicyDocument { .. } => true,
            Self::RetryExhausted { last, .. } => last.is_transient(),
            Self::Model(_) | Self::Cancelled | Self::Serialization(_) => false,
        }
    }

    /// Category of the underlying store error, if the store reported one.
    pub fn store_category(&self) -> Option<ErrorCategory> {
        match self {
            Self::Store(e) => Some(e.category()),
            Self::RetryExhausted { last, .. } => last.store_category(),
            _ => None,
        }
    }
}

/// What the dispatcher should do with a tenant key after an invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Nothing to do until the tenant changes again.
    AwaitChange,
    /// Deliver the key again after the delay.
    Requeue(Duration),
}

pub type Result<T> = std::result::Result<T, ReconcileError>;
