//! Caller-supplied callbacks
//!
//! A [`Workers`] bundle carries the transform that mutates a configuration and
//! the optional predicate that selects distributions for bulk runs. Both may
//! be synchronous or asynchronous; internally each is a single boxed
//! function returning a future.

use crate::types::{DistributionConfig, DistributionSummary};
use futures::future::{self, BoxFuture, FutureExt};
use std::future::Future;
use std::sync::Arc;

/// Future produced by a transform: `Ok(None)` means "no change needed"
pub type TransformFuture = BoxFuture<'static, anyhow::Result<Option<DistributionConfig>>>;

/// Future produced by a selection predicate
pub type FilterFuture = BoxFuture<'static, anyhow::Result<bool>>;

type TransformFn = dyn Fn(DistributionConfig) -> TransformFuture + Send + Sync;
type FilterFn = dyn Fn(DistributionSummary) -> FilterFuture + Send + Sync;

/// Transform and selection predicate for an updater
#[derive(Clone)]
pub struct Workers {
    transform: Arc<TransformFn>,
    filter: Option<Arc<FilterFn>>,
}

impl Workers {
    /// Create from an async transform
    ///
    /// # Example
    ///
    /// ```rust
    /// use cdn_updater_core::Workers;
    ///
    /// let workers = Workers::new(|mut config| async move {
    ///     config.set("Comment", "managed");
    ///     Ok(Some(config))
    /// });
    /// ```
    pub fn new<F, Fut>(transform: F) -> Self
    where
        F: Fn(DistributionConfig) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Option<DistributionConfig>>> + Send + 'static,
    {
        let transform: Arc<TransformFn> =
            Arc::new(move |config: DistributionConfig| transform(config).boxed());
        Self {
            transform,
            filter: None,
        }
    }

    /// Create from a synchronous, infallible transform
    pub fn from_fn<F>(transform: F) -> Self
    where
        F: Fn(DistributionConfig) -> Option<DistributionConfig> + Send + Sync + 'static,
    {
        Self::new(move |config| future::ready(Ok::<_, anyhow::Error>(transform(config))))
    }

    /// With an async selection predicate
    #[must_use]
    pub fn with_filter<F, Fut>(mut self, filter: F) -> Self
    where
        F: Fn(DistributionSummary) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<bool>> + Send + 'static,
    {
        let filter: Arc<FilterFn> =
            Arc::new(move |summary: DistributionSummary| filter(summary).boxed());
        self.filter = Some(filter);
        self
    }

    /// With a synchronous, infallible selection predicate
    #[must_use]
    pub fn with_filter_fn<F>(self, filter: F) -> Self
    where
        F: Fn(&DistributionSummary) -> bool + Send + Sync + 'static,
    {
        self.with_filter(move |summary: DistributionSummary| {
            future::ready(Ok::<_, anyhow::Error>(filter(&summary)))
        })
    }

    /// True if a selection predicate is installed
    #[inline]
    #[must_use]
    pub fn has_filter(&self) -> bool {
        self.filter.is_some()
    }

    /// Run the transform
    pub async fn apply(&self, config: DistributionConfig) -> anyhow::Result<Option<DistributionConfig>> {
        (self.transform)(config).await
    }

    /// Evaluate the predicate; everything is selected without one
    pub async fn is_target(&self, summary: &DistributionSummary) -> anyhow::Result<bool> {
        match &self.filter {
            Some(filter) => filter(summary.clone()).await,
            None => Ok(true),
        }
    }
}

impl std::fmt::Debug for Workers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Workers")
            .field("has_filter", &self.has_filter())
            .finish_non_exhaustive()
    }
}
