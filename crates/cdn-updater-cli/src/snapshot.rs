//! File-backed distribution service
//!
//! Serves a JSON snapshot of distributions as if it were the remote service:
//! pages the listing, hands out ETags and rejects stale ones on update. Every
//! accepted update rewrites the file.

use anyhow::Context;
use async_trait::async_trait;
use cdn_updater_core::{
    ConfigResponse, DistributionApi, DistributionConfig, DistributionPage, DistributionSummary,
    ListRequest, RemoteError, VersionToken,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

/// On-disk snapshot document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub(crate) struct SnapshotFile {
    pub(crate) distributions: Vec<SnapshotEntry>,
}

/// One distribution in the snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct SnapshotEntry {
    pub(crate) id: String,
    pub(crate) etag: String,
    #[serde(default)]
    pub(crate) summary: Map<String, Value>,
    pub(crate) config: DistributionConfig,
}

impl SnapshotEntry {
    fn listing_summary(&self) -> DistributionSummary {
        DistributionSummary {
            id: Some(self.id.clone()),
            fields: self.summary.clone(),
        }
    }
}

/// Distribution service over a snapshot file
#[derive(Debug)]
pub(crate) struct SnapshotApi {
    path: PathBuf,
    state: Mutex<SnapshotFile>,
}

impl SnapshotApi {
    /// Load a snapshot file
    pub(crate) async fn open(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let raw = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("failed to read snapshot {}", path.display()))?;
        let file: SnapshotFile = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse snapshot {}", path.display()))?;

        tracing::debug!(
            "Loaded {} distributions from {}",
            file.distributions.len(),
            path.display()
        );

        Ok(Self {
            path,
            state: Mutex::new(file),
        })
    }

    async fn persist(&self, file: &SnapshotFile) -> Result<(), RemoteError> {
        let raw = serde_json::to_string_pretty(file)
            .map_err(|e| RemoteError::Transport(format!("failed to encode snapshot: {e}")))?;
        tokio::fs::write(&self.path, raw).await.map_err(|e| {
            RemoteError::Transport(format!("failed to write {}: {e}", self.path.display()))
        })
    }
}

#[async_trait]
impl DistributionApi for SnapshotApi {
    async fn get_distribution_config(&self, id: &str) -> Result<ConfigResponse, RemoteError> {
        let state = self.state.lock().await;
        let entry = state
            .distributions
            .iter()
            .find(|entry| entry.id == id)
            .ok_or_else(|| RemoteError::NoSuchDistribution(id.to_string()))?;

        Ok(ConfigResponse::new(entry.config.clone(), entry.etag.as_str()))
    }

    async fn list_distributions(
        &self,
        request: ListRequest,
    ) -> Result<DistributionPage, RemoteError> {
        let state = self.state.lock().await;
        let total = state.distributions.len();

        let offset = match request.marker.as_deref() {
            None => 0,
            Some(marker) => marker
                .parse::<usize>()
                .map_err(|_| RemoteError::Transport(format!("invalid marker {marker}")))?,
        };
        let page_size = usize::try_from(request.max_items).unwrap_or(usize::MAX).max(1);
        let end = offset.saturating_add(page_size).min(total);

        let items = state
            .distributions
            .get(offset..end)
            .unwrap_or_default()
            .iter()
            .map(SnapshotEntry::listing_summary)
            .collect();
        let next_marker = (end < total).then(|| end.to_string());

        Ok(DistributionPage { items, next_marker })
    }

    async fn update_distribution(
        &self,
        id: &str,
        config: &DistributionConfig,
        version: &VersionToken,
    ) -> Result<(), RemoteError> {
        let mut state = self.state.lock().await;
        let index = state
            .distributions
            .iter()
            .position(|entry| entry.id == id)
            .ok_or_else(|| RemoteError::NoSuchDistribution(id.to_string()))?;

        if state.distributions[index].etag != version.as_str() {
            return Err(RemoteError::PreconditionFailed { id: id.to_string() });
        }

        // Only swap the new state in once it is on disk.
        let mut next = SnapshotFile::clone(&state);
        let entry = &mut next.distributions[index];
        entry.config = config.clone();
        entry.etag = uuid::Uuid::new_v4().simple().to_string().to_uppercase();

        self.persist(&next).await?;
        *state = next;
        Ok(())
    }
}
