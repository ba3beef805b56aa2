//! Field edits and selectors given on the command line

use anyhow::{bail, Context};
use cdn_updater_core::{DistributionConfig, Workers};
use serde_json::Value;

/// A single top-level field edit
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum FieldEdit {
    Set(String, Value),
    Unset(String),
}

/// Parse `FIELD=VALUE`; VALUE is JSON, falling back to a plain string
pub(crate) fn parse_assignment(raw: &str) -> anyhow::Result<(String, Value)> {
    let (field, value) = raw
        .split_once('=')
        .with_context(|| format!("expected FIELD=VALUE, got `{raw}`"))?;
    let field = field.trim();
    if field.is_empty() {
        bail!("empty field name in `{raw}`");
    }

    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((field.to_string(), value))
}

/// Apply edits; `None` if they leave the config untouched
pub(crate) fn apply_edits(
    config: &DistributionConfig,
    edits: &[FieldEdit],
) -> Option<DistributionConfig> {
    let mut updated = config.clone();
    for edit in edits {
        match edit {
            FieldEdit::Set(field, value) => {
                updated.set(field.clone(), value.clone());
            }
            FieldEdit::Unset(field) => {
                updated.remove(field);
            }
        }
    }
    (updated != *config).then_some(updated)
}

/// Build workers from edits and optional `FIELD=VALUE` summary matches
pub(crate) fn build_workers(edits: Vec<FieldEdit>, matches: Vec<(String, Value)>) -> Workers {
    let workers = Workers::from_fn(move |config| apply_edits(&config, &edits));
    if matches.is_empty() {
        return workers;
    }
    workers.with_filter_fn(move |summary| {
        matches
            .iter()
            .all(|(field, value)| summary.field(field) == Some(value))
    })
}
