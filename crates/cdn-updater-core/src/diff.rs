//! Flat structural diff between two configuration snapshots
//!
//! One level only: each top-level field is classified as added, deleted or
//! updated. Nested values are compared by value, never merged.

use crate::types::DistributionConfig;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// Result of comparing two snapshots
///
/// # Invariants
/// - A field present only in `after` is in `added` (with its new value)
/// - A field present only in `before` is in `deleted` (with its old value)
/// - A field present in both with unequal values is in `updated` (new value)
/// - No field appears in more than one bucket
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiffResult {
    /// Fields introduced by the transform
    pub added: BTreeMap<String, Value>,
    /// Fields removed by the transform
    pub deleted: BTreeMap<String, Value>,
    /// Fields whose value changed
    pub updated: BTreeMap<String, Value>,
}

impl DiffResult {
    /// True if the snapshots are equal
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.deleted.is_empty() && self.updated.is_empty()
    }

    /// Total number of changed fields
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.added.len() + self.deleted.len() + self.updated.len()
    }

    /// Names of all changed fields
    pub fn changed_fields(&self) -> impl Iterator<Item = &str> {
        self.added
            .keys()
            .chain(self.deleted.keys())
            .chain(self.updated.keys())
            .map(String::as_str)
    }
}

/// Compare two snapshots field by field
#[must_use]
pub fn calculate_diff(before: &DistributionConfig, after: &DistributionConfig) -> DiffResult {
    let mut result = DiffResult::default();

    let all_fields: BTreeSet<&String> = before
        .as_map()
        .keys()
        .chain(after.as_map().keys())
        .collect();

    for field in all_fields {
        match (before.get(field), after.get(field)) {
            (None, Some(new)) => {
                result.added.insert(field.clone(), new.clone());
            }
            (Some(old), None) => {
                result.deleted.insert(field.clone(), old.clone());
            }
            (Some(old), Some(new)) if old != new => {
                result.updated.insert(field.clone(), new.clone());
            }
            _ => {}
        }
    }

    result
}
