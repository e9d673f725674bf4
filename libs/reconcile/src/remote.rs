//! Capabilities the reconciler consumes from a transport.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::RemoteError;
use crate::types::AccessPolicy;

/// Result of a successful read call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadStatus {
    /// The resource exists. The body is kept for diagnostics only.
    Found { body: Option<String> },

    /// A well-formed "not found" answer.
    NotFound,
}

/// Remote management API for one namespace of named resources.
///
/// Implementations classify failures as [`RemoteError::Transient`] or
/// [`RemoteError::Permanent`]; the reconciler never inspects transport details.
#[async_trait]
pub trait RemoteResource: Send + Sync {
    /// Read a resource by name.
    async fn read(&self, name: &str) -> Result<ReadStatus, RemoteError>;

    /// Create a new resource.
    async fn create(&self, name: &str, definition: &str) -> Result<(), RemoteError>;

    /// Overwrite an existing resource.
    async fn update(&self, name: &str, definition: &str) -> Result<(), RemoteError>;

    /// Replace the access-control policy of a resource.
    async fn set_policy(&self, name: &str, policy: &AccessPolicy) -> Result<(), RemoteError>;

    /// Ask the remote to reload any read cache after a create.
    async fn refresh(&self) -> Result<(), RemoteError> {
        Ok(())
    }
}

#[async_trait]
impl<T: RemoteResource + ?Sized> RemoteResource for Arc<T> {
    async fn read(&self, name: &str) -> Result<ReadStatus, RemoteError> {
        (**self).read(name).await
    }

    async fn create(&self, name: &str, definition: &str) -> Result<(), RemoteError> {
        (**self).create(name, definition).await
    }

    async fn update(&self, name: &str, definition: &str) -> Result<(), RemoteError> {
        (**self).update(name, definition).await
    }

    async fn set_policy(&self, name: &str, policy: &AccessPolicy) -> Result<(), RemoteError> {
        (**self).set_policy(name, policy).await
    }

    async fn refresh(&self) -> Result<(), RemoteError> {
        (**self).refresh().await
    }
}
