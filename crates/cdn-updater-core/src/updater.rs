//! Distribution updater
//!
//! The central engine that:
//! - Fetches a distribution config under its version token
//! - Applies the caller's transform
//! - Records a diff instead of committing in dry-run mode
//! - Guards changes to `Enabled` behind an explicit opt-in
//! - Commits with the originally fetched token
//! - Drives the pipeline across the whole listing, sequentially or with a
//!   bounded number of pipelines in flight

use crate::config::{TaskType, UpdaterConfig};
use crate::diff::{calculate_diff, DiffResult};
use crate::enumerate::collect_pages;
use crate::error::UpdaterError;
use crate::remote::DistributionApi;
use crate::retry::RetryingApi;
use crate::types::{DistributionSummary, VersionedConfig};
use crate::workers::Workers;
use futures::stream::{FuturesUnordered, StreamExt};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Outcome of a single-distribution pipeline run
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateOutcome {
    /// Transform returned nothing; no write was issued
    Unchanged,
    /// Dry run; the diff was recorded and no write was issued
    DryRun(DiffResult),
    /// Config committed
    Committed,
}

/// Tally of a bulk run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkReport {
    /// Summaries returned by the listing
    pub listed: usize,
    /// Summaries skipped for lack of a usable identifier
    pub skipped_without_id: usize,
    /// Summaries accepted by the predicate
    pub selected: usize,
    /// Pipelines that committed
    pub committed: usize,
    /// Pipelines whose transform returned nothing
    pub unchanged: usize,
    /// Pipelines that recorded a dry-run diff
    pub dry_run: usize,
}

impl BulkReport {
    fn record(&mut self, outcome: Option<&UpdateOutcome>) {
        match outcome {
            Some(UpdateOutcome::Committed) => self.committed += 1,
            Some(UpdateOutcome::Unchanged) => self.unchanged += 1,
            Some(UpdateOutcome::DryRun(_)) => self.dry_run += 1,
            None => {}
        }
    }
}

/// Batch updater for distribution configs
pub struct DistributionUpdater {
    /// Remote collaborator (retry layer already composed)
    api: Arc<dyn DistributionApi>,
    /// Transform and predicate
    workers: Workers,
    /// Configuration
    config: UpdaterConfig,
    /// Most recent dry-run diff
    diff: Mutex<Option<DiffResult>>,
}

impl DistributionUpdater {
    /// Create new updater
    ///
    /// Wraps `api` in a [`RetryingApi`] unless the retry policy is disabled.
    ///
    /// # Errors
    /// - `UpdaterError::Config` if the configuration is out of range
    pub fn new(
        workers: Workers,
        config: UpdaterConfig,
        api: Arc<dyn DistributionApi>,
    ) -> Result<Self, UpdaterError> {
        config.validate()?;

        let api: Arc<dyn DistributionApi> = if config.retry.is_disabled() {
            api
        } else {
            Arc::new(RetryingApi::new(api, config.retry.clone()))
        };

        Ok(Self {
            api,
            workers,
            config,
            diff: Mutex::new(None),
        })
    }

    /// Fetch a config and its version token
    ///
    /// # Errors
    /// - `UpdaterError::NotFound` if the collaborator returned no config
    /// - `UpdaterError::MissingVersionToken` if it returned no token
    /// - `UpdaterError::Remote` for collaborator failures
    pub async fn get_distribution_config(&self, id: &str) -> Result<VersionedConfig, UpdaterError> {
        let response = self.api.get_distribution_config(id).await?;

        let config = response
            .config
            .ok_or_else(|| UpdaterError::NotFound { id: id.to_string() })?;
        let version = response
            .etag
            .ok_or_else(|| UpdaterError::MissingVersionToken { id: id.to_string() })?;

        Ok(VersionedConfig { config, version })
    }

    /// Run the update pipeline for one distribution
    ///
    /// # Workflow
    /// 1. Fetch config and version token
    /// 2. Snapshot the config
    /// 3. Apply the transform (`None` ends the run)
    /// 4. Dry run: record the diff and stop
    /// 5. Refuse an `Enabled` change without the override
    /// 6. Commit with the fetched token
    ///
    /// # Errors
    /// See [`UpdaterError`]; collaborator failures propagate unchanged.
    pub async fn update_distribution(&self, id: &str) -> Result<UpdateOutcome, UpdaterError> {
        tracing::info!("Update distribution: {}", id);

        let VersionedConfig { config, version } = self.get_distribution_config(id).await?;
        let before = config.clone();

        let updated = match self
            .workers
            .apply(config)
            .await
            .map_err(|e| UpdaterError::transform(id, e))?
        {
            Some(updated) => updated,
            None => {
                tracing::info!("{} has no update", id);
                return Ok(UpdateOutcome::Unchanged);
            }
        };

        if self.config.debug_mode {
            let diff = calculate_diff(&before, &updated);
            tracing::debug!("Dry run diff for {}: {:?}", id, diff);
            *self.diff.lock() = Some(diff.clone());
            return Ok(UpdateOutcome::DryRun(diff));
        }

        if !self.config.allow_sensitive_action && before.enabled() != updated.enabled() {
            let err = UpdaterError::SensitiveAction { id: id.to_string() };
            tracing::warn!("{}: {}", id, err);
            return Err(err);
        }

        self.api.update_distribution(id, &updated, &version).await?;
        tracing::info!("Update succeeded: {}", id);

        Ok(UpdateOutcome::Committed)
    }

    /// Enumerate every distribution across all listing pages
    ///
    /// # Errors
    /// Returns the first listing failure
    pub async fn list_all_distributions(&self) -> Result<Vec<DistributionSummary>, UpdaterError> {
        let distributions = collect_pages(self.api.as_ref(), self.config.page_size).await?;
        tracing::info!("Distribution count: {}", distributions.len());
        Ok(distributions)
    }

    /// Run the pipeline over every selected distribution
    ///
    /// Summaries without a usable identifier are skipped. In sequential mode
    /// the first failure aborts the run. In parallel mode nothing is cancelled:
    /// every selected item still runs, at most `concurrency_limit` at a time,
    /// and the first failure is returned once all of them have settled.
    ///
    /// # Errors
    /// The first listing, predicate or pipeline failure
    pub async fn update_all_distributions(&self) -> Result<BulkReport, UpdaterError> {
        let distributions = self.list_all_distributions().await?;

        let mut report = BulkReport {
            listed: distributions.len(),
            ..BulkReport::default()
        };

        let targets: Vec<(String, DistributionSummary)> = distributions
            .into_iter()
            .filter_map(|summary| match summary.id() {
                Some(id) => Some((id.to_string(), summary)),
                None => {
                    report.skipped_without_id += 1;
                    None
                }
            })
            .collect();

        let selected = AtomicUsize::new(0);

        match self.config.task_type {
            TaskType::Sequential => {
                for (id, summary) in targets {
                    let outcome = self.process(id, summary, &selected).await?;
                    report.record(outcome.as_ref());
                }
            }
            TaskType::Parallel => {
                let limit = self.config.concurrency_limit;
                let mut pending = targets.into_iter();
                let mut in_flight = FuturesUnordered::new();
                let mut first_error = None;

                loop {
                    while in_flight.len() < limit {
                        match pending.next() {
                            Some((id, summary)) => {
                                in_flight.push(self.process(id, summary, &selected));
                            }
                            None => break,
                        }
                    }

                    match in_flight.next().await {
                        Some(Ok(outcome)) => report.record(outcome.as_ref()),
                        Some(Err(e)) => {
                            tracing::error!("Bulk update failed: {}", e);
                            first_error.get_or_insert(e);
                        }
                        None => break,
                    }
                }

                if let Some(e) = first_error {
                    return Err(e);
                }
            }
        }

        report.selected = selected.load(Ordering::Relaxed);
        tracing::info!("Update target: {}", report.selected);

        Ok(report)
    }

    /// Predicate then pipeline for one listed distribution
    async fn process(
        &self,
        id: String,
        summary: DistributionSummary,
        selected: &AtomicUsize,
    ) -> Result<Option<UpdateOutcome>, UpdaterError> {
        let is_target = self
            .workers
            .is_target(&summary)
            .await
            .map_err(|e| UpdaterError::filter(&id, e))?;
        if !is_target {
            return Ok(None);
        }

        let number = selected.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::info!("No. {}: {}", number, id);

        self.update_distribution(&id).await.map(Some)
    }

    /// Most recent dry-run diff, if any dry run has happened
    #[must_use]
    pub fn diff(&self) -> Option<DiffResult> {
        self.diff.lock().clone()
    }

    /// Get configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &UpdaterConfig {
        &self.config
    }
}

impl std::fmt::Debug for DistributionUpdater {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DistributionUpdater")
            .field("workers", &self.workers)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
