//! CDN Updater Core - batch mutation of versioned distribution configs
//!
//! The engine that:
//! - Fetches a distribution config under its optimistic-concurrency token
//! - Applies a caller-supplied transform
//! - Guards `Enabled` changes behind an explicit opt-in
//! - Commits the result, or records a flat diff in dry-run mode
//! - Enumerates the whole listing and fans the pipeline out over it
//!
//! # Example
//!
//! ```rust,ignore
//! use cdn_updater_core::prelude::*;
//! use std::sync::Arc;
//!
//! # async fn example(api: Arc<dyn DistributionApi>) -> Result<(), UpdaterError> {
//! let workers = Workers::from_fn(|config| Some(config.with("Comment", "managed")))
//!     .with_filter_fn(|summary| summary.field("Enabled") == Some(&true.into()));
//! let config = UpdaterConfig::new().with_debug_mode(true).parallel(4);
//!
//! let updater = DistributionUpdater::new(workers, config, api)?;
//! let report = updater.update_all_distributions().await?;
//!
//! println!("Selected {} distributions", report.selected);
//! println!("Last diff: {:?}", updater.diff());
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod config;
pub mod diff;
pub mod enumerate;
pub mod error;
pub mod remote;
pub mod retry;
pub mod types;
pub mod updater;
pub mod workers;

// Re-exports for convenience
pub use config::{TaskType, UpdaterConfig};
pub use diff::{calculate_diff, DiffResult};
pub use enumerate::collect_pages;
pub use error::{CallbackError, ConfigError, RemoteError, UpdaterError};
pub use remote::DistributionApi;
pub use retry::{RetryPolicy, RetryingApi};
pub use types::{
    ConfigResponse, DistributionConfig, DistributionPage, DistributionSummary, ListRequest,
    VersionToken, VersionedConfig, ENABLED_FIELD,
};
pub use updater::{BulkReport, DistributionUpdater, UpdateOutcome};
pub use workers::{FilterFuture, TransformFuture, Workers};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with the updater
    pub use crate::{
        BulkReport, DiffResult, DistributionApi, DistributionConfig, DistributionSummary,
        DistributionUpdater, RemoteError, TaskType, UpdateOutcome, UpdaterConfig, UpdaterError,
        Workers,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
