//! Remote collaborator seam
//!
//! The updater issues exactly three interactions against the distribution
//! service. Transport, auth and request signing live behind this trait.

use crate::error::RemoteError;
use crate::types::{ConfigResponse, DistributionConfig, DistributionPage, ListRequest, VersionToken};
use std::sync::Arc;

/// Distribution service operations consumed by the updater
///
/// Implement this trait to plug in a real client, a snapshot file or a test
/// fake.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait DistributionApi: Send + Sync {
    /// Fetch the current config and its version token
    async fn get_distribution_config(&self, id: &str) -> Result<ConfigResponse, RemoteError>;

    /// Fetch one page of the distribution listing
    async fn list_distributions(&self, request: ListRequest)
        -> Result<DistributionPage, RemoteError>;

    /// Commit a config under the version token it was fetched with
    ///
    /// # Errors
    /// - `RemoteError::PreconditionFailed` if `version` is stale
    async fn update_distribution(
        &self,
        id: &str,
        config: &DistributionConfig,
        version: &VersionToken,
    ) -> Result<(), RemoteError>;
}

#[async_trait::async_trait]
impl<T: DistributionApi + ?Sized> DistributionApi for Arc<T> {
    async fn get_distribution_config(&self, id: &str) -> Result<ConfigResponse, RemoteError> {
        (**self).get_distribution_config(id).await
    }

    async fn list_distributions(
        &self,
        request: ListRequest,
    ) -> Result<DistributionPage, RemoteError> {
        (**self).list_distributions(request).await
    }

    async fn update_distribution(
        &self,
        id: &str,
        config: &DistributionConfig,
        version: &VersionToken,
    ) -> Result<(), RemoteError> {
        (**self).update_distribution(id, config, version).await
    }
}
