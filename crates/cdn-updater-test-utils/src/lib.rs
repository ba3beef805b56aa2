//! Testing utilities for the CDN updater workspace
//!
//! Shared test helpers, fixtures, and an in-memory distribution service.

#![allow(missing_docs)]

use cdn_updater_core::{
    ConfigResponse, DistributionApi, DistributionConfig, DistributionPage, DistributionSummary,
    ListRequest, RemoteError, RetryPolicy, UpdaterConfig, VersionToken,
};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// A commit accepted by the fake
#[derive(Debug, Clone, PartialEq)]
pub struct CommitRecord {
    pub id: String,
    pub config: DistributionConfig,
    pub version: VersionToken,
}

#[derive(Debug, Clone)]
struct StoredDistribution {
    config: Option<DistributionConfig>,
    etag: Option<VersionToken>,
    revision: u64,
}

#[derive(Debug, Default)]
struct FakeState {
    listing: Vec<DistributionSummary>,
    pages: Option<Vec<Vec<DistributionSummary>>>,
    distributions: HashMap<String, StoredDistribution>,
    failing_updates: HashSet<String>,
    commits: Vec<CommitRecord>,
    fetched: Vec<String>,
    list_requests: Vec<ListRequest>,
}

/// In-memory distribution service
///
/// Enforces version tokens on update and counts every call. In-flight
/// tracking covers the span between a successful fetch and the matching
/// update, so it is only meaningful when every fetched distribution is
/// committed.
#[derive(Debug, Default)]
pub struct FakeDistributionApi {
    state: Mutex<FakeState>,
    latency: Duration,
    throttle_budget: AtomicUsize,
    fetches: AtomicUsize,
    lists: AtomicUsize,
    updates: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeDistributionApi {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a distribution; its listing summary mirrors `Comment` and `Enabled`
    #[must_use]
    pub fn with_distribution(self, id: &str, config: DistributionConfig) -> Self {
        let mut summary = DistributionSummary::new(id);
        for field in ["Comment", "Enabled"] {
            if let Some(value) = config.get(field) {
                summary.fields.insert(field.to_string(), value.clone());
            }
        }
        {
            let mut state = self.state.lock();
            state.listing.push(summary);
            state.distributions.insert(
                id.to_string(),
                StoredDistribution {
                    config: Some(config),
                    etag: Some(etag_for(id, 1)),
                    revision: 1,
                },
            );
        }
        self
    }

    /// Add a listing record with no stored config behind it
    #[must_use]
    pub fn with_listing_only(self, summary: DistributionSummary) -> Self {
        self.state.lock().listing.push(summary);
        self
    }

    /// Serve these pages verbatim instead of paging the listing
    ///
    /// Page `n` links to page `n + 1` with the marker `page-{n + 1}`.
    #[must_use]
    pub fn with_pages(self, pages: Vec<Vec<DistributionSummary>>) -> Self {
        self.state.lock().pages = Some(pages);
        self
    }

    /// Drop the version token of a stored distribution
    #[must_use]
    pub fn without_etag(self, id: &str) -> Self {
        if let Some(stored) = self.state.lock().distributions.get_mut(id) {
            stored.etag = None;
        }
        self
    }

    /// Drop the config of a stored distribution (token kept)
    #[must_use]
    pub fn without_config(self, id: &str) -> Self {
        if let Some(stored) = self.state.lock().distributions.get_mut(id) {
            stored.config = None;
        }
        self
    }

    /// Make updates of `id` fail with a transport error
    #[must_use]
    pub fn failing_update(self, id: &str) -> Self {
        self.state.lock().failing_updates.insert(id.to_string());
        self
    }

    /// Delay every call
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Throttle the next `calls` requests of any kind
    #[must_use]
    pub fn with_throttled_calls(self, calls: usize) -> Self {
        self.throttle_budget.store(calls, Ordering::SeqCst);
        self
    }

    /// Simulate a concurrent writer: bump the stored version token
    pub fn touch(&self, id: &str) {
        if let Some(stored) = self.state.lock().distributions.get_mut(id) {
            stored.revision += 1;
            stored.etag = Some(etag_for(id, stored.revision));
        }
    }

    /// Current stored config
    #[must_use]
    pub fn config(&self, id: &str) -> Option<DistributionConfig> {
        self.state
            .lock()
            .distributions
            .get(id)
            .and_then(|stored| stored.config.clone())
    }

    /// Current stored version token
    #[must_use]
    pub fn etag(&self, id: &str) -> Option<VersionToken> {
        self.state
            .lock()
            .distributions
            .get(id)
            .and_then(|stored| stored.etag.clone())
    }

    /// Accepted commits in order
    #[must_use]
    pub fn commits(&self) -> Vec<CommitRecord> {
        self.state.lock().commits.clone()
    }

    /// Ids of successful fetches in order
    #[must_use]
    pub fn fetched_ids(&self) -> Vec<String> {
        self.state.lock().fetched.clone()
    }

    /// Listing requests in order
    #[must_use]
    pub fn list_requests(&self) -> Vec<ListRequest> {
        self.state.lock().list_requests.clone()
    }

    #[must_use]
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn list_count(&self) -> usize {
        self.lists.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn update_count(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }

    /// Peak number of pipelines between fetch and update
    #[must_use]
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn take_throttle(&self) -> Result<(), RemoteError> {
        let throttled = self
            .throttle_budget
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if throttled {
            Err(RemoteError::Throttled("Rate exceeded".to_string()))
        } else {
            Ok(())
        }
    }

    async fn simulate_latency(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }

    fn enter(&self) {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
    }

    /// Updates issued without a preceding fetch leave the counter at zero
    fn leave(&self) {
        if self.in_flight.load(Ordering::SeqCst) > 0 {
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

#[async_trait::async_trait]
impl DistributionApi for FakeDistributionApi {
    async fn get_distribution_config(&self, id: &str) -> Result<ConfigResponse, RemoteError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.take_throttle()?;

        let stored = {
            let mut state = self.state.lock();
            let stored = state
                .distributions
                .get(id)
                .cloned()
                .ok_or_else(|| RemoteError::NoSuchDistribution(id.to_string()))?;
            state.fetched.push(id.to_string());
            stored
        };

        self.enter();
        self.simulate_latency().await;

        Ok(ConfigResponse {
            config: stored.config,
            etag: stored.etag,
        })
    }

    async fn list_distributions(
        &self,
        request: ListRequest,
    ) -> Result<DistributionPage, RemoteError> {
        self.lists.fetch_add(1, Ordering::SeqCst);
        self.take_throttle()?;
        self.simulate_latency().await;

        let mut state = self.state.lock();
        state.list_requests.push(request.clone());

        if let Some(pages) = &state.pages {
            let index = match request.marker.as_deref() {
                None => 0,
                Some(marker) => marker
                    .strip_prefix("page-")
                    .and_then(|n| n.parse::<usize>().ok())
                    .ok_or_else(|| RemoteError::Transport(format!("bad marker {marker}")))?,
            };
            let items = pages.get(index).cloned().unwrap_or_default();
            let next_marker = (index + 1 < pages.len()).then(|| format!("page-{}", index + 1));
            return Ok(DistributionPage { items, next_marker });
        }

        let offset = match request.marker.as_deref() {
            None => 0,
            Some(marker) => marker
                .parse::<usize>()
                .map_err(|_| RemoteError::Transport(format!("bad marker {marker}")))?,
        };
        let page_size = usize::try_from(request.max_items).unwrap_or(usize::MAX).max(1);
        let end = offset.saturating_add(page_size).min(state.listing.len());
        let items = state.listing.get(offset..end).map(<[_]>::to_vec).unwrap_or_default();
        let next_marker = (end < state.listing.len()).then(|| end.to_string());

        Ok(DistributionPage { items, next_marker })
    }

    async fn update_distribution(
        &self,
        id: &str,
        config: &DistributionConfig,
        version: &VersionToken,
    ) -> Result<(), RemoteError> {
        self.updates.fetch_add(1, Ordering::SeqCst);
        self.take_throttle()?;
        self.simulate_latency().await;
        self.leave();

        let mut state = self.state.lock();
        if state.failing_updates.contains(id) {
            return Err(RemoteError::Transport(format!("update of {id} failed")));
        }

        let stored = state
            .distributions
            .get_mut(id)
            .ok_or_else(|| RemoteError::NoSuchDistribution(id.to_string()))?;
        if stored.etag.as_ref() != Some(version) {
            return Err(RemoteError::PreconditionFailed { id: id.to_string() });
        }

        stored.revision += 1;
        stored.etag = Some(etag_for(id, stored.revision));
        stored.config = Some(config.clone());

        state.commits.push(CommitRecord {
            id: id.to_string(),
            config: config.clone(),
            version: version.clone(),
        });

        Ok(())
    }
}

fn etag_for(id: &str, revision: u64) -> VersionToken {
    VersionToken::new(format!("E{id}-{revision}"))
}

/// Config shaped like a minimal distribution
#[must_use]
pub fn sample_config(comment: &str, enabled: bool) -> DistributionConfig {
    DistributionConfig::new()
        .with("CallerReference", format!("ref-{comment}"))
        .with("Comment", comment)
        .with("Enabled", enabled)
}

/// Fake holding `count` enabled distributions `D0..D{count-1}`
#[must_use]
pub fn fake_with_distributions(count: usize) -> FakeDistributionApi {
    (0..count).fold(FakeDistributionApi::new(), |api, i| {
        api.with_distribution(&format!("D{i}"), sample_config(&format!("dist-{i}"), true))
    })
}

/// Updater config with retries disabled
#[must_use]
pub fn no_retry_config() -> UpdaterConfig {
    UpdaterConfig::new().with_retry(RetryPolicy::disabled())
}

/// Updater config that retries quickly
#[must_use]
pub fn fast_retry_config(max_retries: u32) -> UpdaterConfig {
    UpdaterConfig::new().with_retry(RetryPolicy::new(max_retries, Duration::from_millis(1)))
}
