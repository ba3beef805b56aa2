//! Throttling retry layer
//!
//! [`RetryingApi`] wraps any [`DistributionApi`] and re-issues a call when the
//! collaborator signals throttling, a bounded number of times with a fixed
//! delay. Anything else, including a stale version token, propagates as is.

use crate::error::RemoteError;
use crate::remote::DistributionApi;
use crate::types::{ConfigResponse, DistributionConfig, DistributionPage, ListRequest, VersionToken};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;

/// Retry policy for throttled requests
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Extra attempts after the first throttled one
    pub max_retries: u32,
    /// Fixed delay between attempts in milliseconds
    pub delay_ms: u64,
}

impl RetryPolicy {
    /// Create policy
    #[inline]
    #[must_use]
    pub fn new(max_retries: u32, delay: Duration) -> Self {
        Self {
            max_retries,
            delay_ms: u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
        }
    }

    /// Never retry
    #[inline]
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            max_retries: 0,
            delay_ms: 0,
        }
    }

    /// Delay between attempts
    #[inline]
    #[must_use]
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    /// True if the policy never retries
    #[inline]
    #[must_use]
    pub fn is_disabled(&self) -> bool {
        self.max_retries == 0
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            delay_ms: 2000,
        }
    }
}

/// Collaborator wrapper that retries throttled calls
#[derive(Debug, Clone)]
pub struct RetryingApi<A> {
    inner: A,
    policy: RetryPolicy,
}

impl<A: DistributionApi> RetryingApi<A> {
    /// Wrap a collaborator
    #[inline]
    #[must_use]
    pub fn new(inner: A, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    /// Retry policy in effect
    #[inline]
    #[must_use]
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    async fn with_retry<T, F, Fut>(&self, operation: &str, mut call: F) -> Result<T, RemoteError>
    where
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = Result<T, RemoteError>> + Send,
        T: Send,
    {
        let mut retry_count = 0;
        loop {
            match call().await {
                Err(e) if e.is_throttling() && retry_count < self.policy.max_retries => {
                    retry_count += 1;
                    tracing::warn!(
                        "{} was throttled, re-requesting it. retry count: {}",
                        operation,
                        retry_count
                    );
                    tokio::time::sleep(self.policy.delay()).await;
                }
                other => return other,
            }
        }
    }
}

#[async_trait::async_trait]
impl<A: DistributionApi> DistributionApi for RetryingApi<A> {
    async fn get_distribution_config(&self, id: &str) -> Result<ConfigResponse, RemoteError> {
        self.with_retry("get_distribution_config", || {
            self.inner.get_distribution_config(id)
        })
        .await
    }

    async fn list_distributions(
        &self,
        request: ListRequest,
    ) -> Result<DistributionPage, RemoteError> {
        self.with_retry("list_distributions", || {
            self.inner.list_distributions(request.clone())
        })
        .await
    }

    async fn update_distribution(
        &self,
        id: &str,
        config: &DistributionConfig,
        version: &VersionToken,
    ) -> Result<(), RemoteError> {
        self.with_retry("update_distribution", || {
            self.inner.update_distribution(id, config, version)
        })
        .await
    }
}
