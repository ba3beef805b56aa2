//! Core types for the updater
//!
//! Defines the values that flow through the pipeline:
//! - Distribution configurations (open-ended field maps)
//! - Listing summaries and pages
//! - Version tokens (ETags) for optimistic concurrency

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Field that toggles whether a distribution is serving traffic
pub const ENABLED_FIELD: &str = "Enabled";

/// Distribution configuration
///
/// An open-ended mapping from field name to value. No schema is enforced
/// beyond [`ENABLED_FIELD`], which the sensitive-action guard inspects.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DistributionConfig(Map<String, Value>);

impl DistributionConfig {
    /// Create an empty configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With a field set (builder style)
    #[inline]
    #[must_use]
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(field, value);
        self
    }

    /// Get a field value
    #[inline]
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// Set a field, returning the previous value
    #[inline]
    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(field.into(), value.into())
    }

    /// Remove a field, returning its value
    #[inline]
    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.0.remove(field)
    }

    /// Check whether a field is present
    #[inline]
    #[must_use]
    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    /// Raw value of the `Enabled` field, if present
    #[inline]
    #[must_use]
    pub fn enabled(&self) -> Option<&Value> {
        self.get(ENABLED_FIELD)
    }

    /// Iterate fields in name order
    pub fn fields(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Number of fields
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True if no fields are present
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Borrow the underlying map
    #[inline]
    #[must_use]
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Consume into the underlying map
    #[inline]
    #[must_use]
    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for DistributionConfig {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl TryFrom<Value> for DistributionConfig {
    type Error = serde_json::Error;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        serde_json::from_value(value)
    }
}

impl FromIterator<(String, Value)> for DistributionConfig {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Lightweight listing record
///
/// Used for identification and predicate evaluation only; never mutated by
/// the pipeline. The identifier may be missing in partial listings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DistributionSummary {
    /// Distribution identifier
    #[serde(rename = "Id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Descriptive fields (domain name, comment, status, ...)
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl DistributionSummary {
    /// Create summary for an identifier
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            fields: Map::new(),
        }
    }

    /// Create summary with no identifier
    #[inline]
    #[must_use]
    pub fn without_id() -> Self {
        Self::default()
    }

    /// With a descriptive field
    #[inline]
    #[must_use]
    pub fn with_field(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(field.into(), value.into());
        self
    }

    /// Usable identifier (absent or empty ids are not usable)
    #[inline]
    #[must_use]
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref().filter(|id| !id.is_empty())
    }

    /// Get a descriptive field
    #[inline]
    #[must_use]
    pub fn field(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }
}

/// Opaque optimistic-concurrency token (ETag)
///
/// Bound to one fetched configuration snapshot and passed back unchanged on
/// commit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionToken(String);

impl VersionToken {
    /// Wrap a raw token
    #[inline]
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Raw token
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for VersionToken {
    fn from(token: String) -> Self {
        Self(token)
    }
}

impl From<&str> for VersionToken {
    fn from(token: &str) -> Self {
        Self(token.to_string())
    }
}

impl std::fmt::Display for VersionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Raw collaborator response for a config fetch
///
/// Either part may be missing; the pipeline decides what that means.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigResponse {
    /// Current configuration
    pub config: Option<DistributionConfig>,
    /// Version token bound to `config`
    pub etag: Option<VersionToken>,
}

impl ConfigResponse {
    /// Complete response
    #[inline]
    #[must_use]
    pub fn new(config: DistributionConfig, etag: impl Into<VersionToken>) -> Self {
        Self {
            config: Some(config),
            etag: Some(etag.into()),
        }
    }
}

/// A fetched configuration together with its version token
#[derive(Debug, Clone, PartialEq)]
pub struct VersionedConfig {
    /// Configuration snapshot
    pub config: DistributionConfig,
    /// Token to pass back on commit
    pub version: VersionToken,
}

/// Listing request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListRequest {
    /// Continuation marker from the previous page
    pub marker: Option<String>,
    /// Maximum items per page
    pub max_items: u32,
}

impl ListRequest {
    /// Create request
    #[inline]
    #[must_use]
    pub fn new(marker: Option<String>, max_items: u32) -> Self {
        Self { marker, max_items }
    }
}

/// One page of the distribution listing
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DistributionPage {
    /// Summaries on this page
    pub items: Vec<DistributionSummary>,
    /// Continuation marker, absent on the last page
    pub next_marker: Option<String>,
}

impl DistributionPage {
    /// Final page
    #[inline]
    #[must_use]
    pub fn last(items: Vec<DistributionSummary>) -> Self {
        Self {
            items,
            next_marker: None,
        }
    }

    /// Page followed by more
    #[inline]
    #[must_use]
    pub fn with_next(items: Vec<DistributionSummary>, marker: impl Into<String>) -> Self {
        Self {
            items,
            next_marker: Some(marker.into()),
        }
    }
}
