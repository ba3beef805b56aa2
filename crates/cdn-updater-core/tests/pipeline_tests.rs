//! Single-distribution pipeline against the in-memory service.
//!
//! Covers the write-path guarantees: no-op transforms, dry runs, the
//! sensitive-action guard, version tokens and throttling retries.

use cdn_updater_core::prelude::*;
use cdn_updater_core::VersionToken;
use cdn_updater_test_utils::{
    fast_retry_config, no_retry_config, sample_config, FakeDistributionApi,
};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;

fn example_config() -> DistributionConfig {
    DistributionConfig::new()
        .with("CallerReference", "r")
        .with("Comment", "test")
        .with("Enabled", true)
}

fn comment_and_disable() -> Workers {
    Workers::from_fn(|config| Some(config.with("Comment", "updated").with("Enabled", false)))
}

#[tokio::test]
async fn null_transform_performs_zero_writes() {
    let api = Arc::new(FakeDistributionApi::new().with_distribution("D1", example_config()));
    let updater =
        DistributionUpdater::new(Workers::from_fn(|_| None), no_retry_config(), api.clone()).unwrap();

    let outcome = updater.update_distribution("D1").await.unwrap();

    assert_eq!(outcome, UpdateOutcome::Unchanged);
    assert_eq!(api.fetch_count(), 1);
    assert_eq!(api.update_count(), 0);
}

#[tokio::test]
async fn dry_run_records_exactly_the_changed_fields() {
    let api = Arc::new(FakeDistributionApi::new().with_distribution("D1", example_config()));
    let workers = Workers::from_fn(|mut config| {
        config.remove("CallerReference");
        Some(config.with("Comment", "updated").with("PriceClass", "PriceClass_100"))
    });
    let config = no_retry_config().with_debug_mode(true);
    let updater = DistributionUpdater::new(workers, config, api.clone()).unwrap();

    assert!(updater.diff().is_none());
    updater.update_distribution("D1").await.unwrap();

    let diff = updater.diff().unwrap();
    assert_eq!(
        diff.added,
        BTreeMap::from([("PriceClass".to_string(), json!("PriceClass_100"))])
    );
    assert_eq!(
        diff.deleted,
        BTreeMap::from([("CallerReference".to_string(), json!("r"))])
    );
    assert_eq!(
        diff.updated,
        BTreeMap::from([("Comment".to_string(), json!("updated"))])
    );
    assert_eq!(api.update_count(), 0);
    assert_eq!(api.config("D1"), Some(example_config()));
}

#[tokio::test]
async fn dry_run_overwrites_previous_diff() {
    let api = Arc::new(
        FakeDistributionApi::new()
            .with_distribution("D1", sample_config("one", true))
            .with_distribution("D2", sample_config("two", true)),
    );
    let workers = Workers::from_fn(|config| {
        let first = config.get("Comment") == Some(&json!("one"));
        let config = config.with("Comment", "same");
        Some(if first { config.with("Extra", 1) } else { config })
    });
    let updater =
        DistributionUpdater::new(workers, no_retry_config().with_debug_mode(true), api).unwrap();

    updater.update_distribution("D1").await.unwrap();
    assert!(updater.diff().unwrap().added.contains_key("Extra"));
    updater.update_distribution("D2").await.unwrap();

    let diff = updater.diff().unwrap();
    assert_eq!(diff.updated.get("Comment"), Some(&json!("same")));
    assert_eq!(diff.len(), 1);
}

#[tokio::test]
async fn dry_run_ignores_sensitive_guard() {
    let api = Arc::new(FakeDistributionApi::new().with_distribution("D1", example_config()));
    let updater = DistributionUpdater::new(
        comment_and_disable(),
        no_retry_config().with_debug_mode(true),
        api.clone(),
    )
    .unwrap();

    let outcome = updater.update_distribution("D1").await.unwrap();

    assert!(matches!(outcome, UpdateOutcome::DryRun(_)));
    assert_eq!(api.update_count(), 0);
}

#[tokio::test]
async fn enabled_flip_without_override_fails_and_writes_nothing() {
    let api = Arc::new(FakeDistributionApi::new().with_distribution("D1", example_config()));
    let updater =
        DistributionUpdater::new(comment_and_disable(), no_retry_config(), api.clone()).unwrap();

    let err = updater.update_distribution("D1").await.unwrap_err();

    assert!(matches!(err, UpdaterError::SensitiveAction { .. }));
    assert_eq!(
        err.to_string(),
        "cannot change the Enabled field without opting in; set allow_sensitive_action in the updater config"
    );
    assert_eq!(api.update_count(), 0);
}

#[tokio::test]
async fn enabled_flip_with_override_commits_once_with_fetched_token() {
    let api = Arc::new(FakeDistributionApi::new().with_distribution("D1", example_config()));
    let fetched_etag = api.etag("D1").unwrap();
    let updater = DistributionUpdater::new(
        comment_and_disable(),
        no_retry_config().with_allow_sensitive_action(true),
        api.clone(),
    )
    .unwrap();

    let outcome = updater.update_distribution("D1").await.unwrap();

    assert_eq!(outcome, UpdateOutcome::Committed);
    let commits = api.commits();
    assert_eq!(commits.len(), 1);
    assert_eq!(commits[0].id, "D1");
    assert_eq!(commits[0].version, fetched_etag);
    assert_eq!(
        commits[0].config,
        example_config().with("Comment", "updated").with("Enabled", false)
    );
    assert_ne!(api.etag("D1"), Some(fetched_etag));
}

#[tokio::test]
async fn override_example_yields_updated_bucket_only() {
    let api = Arc::new(FakeDistributionApi::new().with_distribution("D1", example_config()));
    let config = no_retry_config()
        .with_allow_sensitive_action(true)
        .with_debug_mode(true);
    let updater = DistributionUpdater::new(comment_and_disable(), config, api).unwrap();

    updater.update_distribution("D1").await.unwrap();

    let diff = updater.diff().unwrap();
    assert_eq!(
        diff.updated,
        BTreeMap::from([
            ("Comment".to_string(), json!("updated")),
            ("Enabled".to_string(), json!(false)),
        ])
    );
    assert!(diff.added.is_empty());
    assert!(diff.deleted.is_empty());
}

#[tokio::test]
async fn async_transform_can_do_io_and_observes_conflict() {
    let api = Arc::new(FakeDistributionApi::new().with_distribution("D1", example_config()));
    let writer = api.clone();
    let workers = Workers::new(move |config| {
        let writer = writer.clone();
        async move {
            tokio::task::yield_now().await;
            writer.touch("D1");
            Ok(Some(config.with("Comment", "racing")))
        }
    });
    let updater = DistributionUpdater::new(workers, no_retry_config(), api.clone()).unwrap();

    let err = updater.update_distribution("D1").await.unwrap_err();

    assert!(err.is_conflict());
    assert!(api.commits().is_empty());
}

#[tokio::test]
async fn missing_config_and_token_are_distinguished() {
    let api = Arc::new(
        FakeDistributionApi::new()
            .with_distribution("NOCFG", example_config())
            .with_distribution("NOTAG", example_config())
            .without_config("NOCFG")
            .without_etag("NOTAG"),
    );
    let updater = DistributionUpdater::new(Workers::from_fn(Some), no_retry_config(), api).unwrap();

    assert!(matches!(
        updater.update_distribution("NOCFG").await,
        Err(UpdaterError::NotFound { .. })
    ));
    assert!(matches!(
        updater.update_distribution("NOTAG").await,
        Err(UpdaterError::MissingVersionToken { .. })
    ));
    assert!(matches!(
        updater.update_distribution("UNKNOWN").await,
        Err(UpdaterError::Remote(RemoteError::NoSuchDistribution(_)))
    ));
}

#[tokio::test]
async fn get_distribution_config_returns_token() {
    let api = Arc::new(FakeDistributionApi::new().with_distribution("D1", example_config()));
    let updater =
        DistributionUpdater::new(Workers::from_fn(Some), no_retry_config(), api.clone()).unwrap();

    let fetched = updater.get_distribution_config("D1").await.unwrap();

    assert_eq!(fetched.config, example_config());
    assert_eq!(Some(fetched.version), api.etag("D1"));
}

#[tokio::test]
async fn throttled_calls_are_retried() {
    let api = Arc::new(
        FakeDistributionApi::new()
            .with_distribution("D1", example_config())
            .with_throttled_calls(2),
    );
    let workers = Workers::from_fn(|config| Some(config.with("Comment", "after throttle")));
    let updater = DistributionUpdater::new(workers, fast_retry_config(2), api.clone()).unwrap();

    updater.update_distribution("D1").await.unwrap();

    assert_eq!(api.fetch_count(), 3);
    assert_eq!(api.commits().len(), 1);
}

#[tokio::test]
async fn exhausted_retries_propagate_throttling() {
    let api = Arc::new(
        FakeDistributionApi::new()
            .with_distribution("D1", example_config())
            .with_throttled_calls(3),
    );
    let updater = DistributionUpdater::new(Workers::from_fn(Some), fast_retry_config(2), api.clone())
        .unwrap();

    let err = updater.update_distribution("D1").await.unwrap_err();

    assert!(err.is_retryable());
    assert_eq!(api.fetch_count(), 3);
}

#[tokio::test]
async fn without_retry_layer_throttling_surfaces_immediately() {
    let api = Arc::new(
        FakeDistributionApi::new()
            .with_distribution("D1", example_config())
            .with_throttled_calls(1),
    );
    let updater =
        DistributionUpdater::new(Workers::from_fn(Some), no_retry_config(), api.clone()).unwrap();

    let err = updater.update_distribution("D1").await.unwrap_err();

    assert!(matches!(err, UpdaterError::Remote(RemoteError::Throttled(_))));
    assert_eq!(api.fetch_count(), 1);
    assert_eq!(api.etag("D1"), Some(VersionToken::new("ED1-1")));
}
