//! Storage backend capability
//!
//! The walker only ever talks to storage through [`StorageBackend`]. Adapters
//! (Azure Blob Storage, the in-memory backend) own authentication, retries
//! and pagination.

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use thiserror::Error;

use crate::item::{BlobItem, Container, ListScope, ListedItem};
use crate::tier::AccessTier;

/// Lazy, forward-only listing of containers.
pub type ContainerStream<'a> = BoxStream<'a, Result<Container, BackendError>>;

/// Lazy, forward-only, single-level listing of a container or directory.
pub type ItemStream<'a> = BoxStream<'a, Result<ListedItem, BackendError>>;

/// Failure reported by a storage backend, after its own retries.
#[derive(Error, Debug, Clone)]
pub enum BackendError {
    #[error("storage service unreachable: {0}")]
    Unreachable(String),

    #[error("request rejected by storage service ({status}): {message}")]
    Unauthorized { status: u16, message: String },

    #[error("storage service returned {status} {code}: {message}")]
    Service {
        status: u16,
        code: String,
        message: String,
    },

    #[error("unexpected response from storage service: {0}")]
    Protocol(String),
}

impl BackendError {
    /// Whether retrying the same request may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            BackendError::Unreachable(_) => true,
            BackendError::Service { status, .. } => {
                matches!(status, 408 | 429) || (500..600).contains(status)
            }
            BackendError::Unauthorized { .. } | BackendError::Protocol(_) => false,
        }
    }

    /// Unreachable endpoint or rejected credentials.
    pub fn is_connectivity(&self) -> bool {
        matches!(
            self,
            BackendError::Unreachable(_) | BackendError::Unauthorized { .. }
        )
    }
}

/// Capability over one storage account.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// List the account's containers in service order.
    fn list_containers(&self) -> ContainerStream<'_>;

    /// List the direct children of a container or directory.
    fn list_items(&self, scope: &ListScope) -> ItemStream<'_>;

    /// Move a blob to the given tier.
    async fn set_tier(&self, blob: &BlobItem, tier: AccessTier) -> Result<(), BackendError>;
}
