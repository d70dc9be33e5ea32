//! Policy, repository and component structs.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::BrowseError;

/// Identity of a persisted component, detached from any transaction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// A named cleanup policy and the criteria it selects components with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupPolicy {
    pub name: String,
    /// Repository format the policy targets (display only).
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    /// Criterion key to criterion value.
    #[serde(default)]
    pub criteria: BTreeMap<String, String>,
}

impl CleanupPolicy {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            format: None,
            notes: None,
            criteria: BTreeMap::new(),
        }
    }

    pub fn with_criterion(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.criteria.insert(key.into(), value.into());
        self
    }

    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    pub name: String,
    pub format: String,
}

impl Repository {
    pub fn new(name: impl Into<String>, format: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            format: format.into(),
        }
    }
}

/// Authoritative component record as held by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Component {
    pub id: EntityId,
    pub repository: String,
    pub group: Option<String>,
    pub name: String,
    pub version: String,
    pub format: String,
    /// Unix millis of the most recent blob update.
    pub last_blob_updated: Option<i64>,
    /// Unix millis of the most recent download, if ever downloaded.
    pub last_downloaded: Option<i64>,
    pub prerelease: bool,
}

/// Paging, filtering and sorting requested by an interactive preview.
///
/// `start` and `limit` are nullable on the wire and validated before use.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryOptions {
    pub start: Option<u64>,
    pub limit: Option<u64>,
    #[serde(default)]
    pub filter: Option<String>,
    #[serde(default)]
    pub sort_property: Option<String>,
    #[serde(default)]
    pub sort_direction: Option<String>,
}

impl QueryOptions {
    pub fn page(start: u64, limit: u64) -> Self {
        Self {
            start: Some(start),
            limit: Some(limit),
            ..Self::default()
        }
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    pub fn sorted(mut self, property: impl Into<String>, direction: impl Into<String>) -> Self {
        self.sort_property = Some(property.into());
        self.sort_direction = Some(direction.into());
        self
    }

    /// Filter text when present and non-empty.
    pub fn filter_text(&self) -> Option<&str> {
        self.filter.as_deref().filter(|f| !f.is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl FromStr for SortDirection {
    type Err = BrowseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        if value.eq_ignore_ascii_case("asc") {
            Ok(Self::Asc)
        } else if value.eq_ignore_ascii_case("desc") {
            Ok(Self::Desc)
        } else {
            Err(BrowseError::InvalidSortDirection(value.to_string()))
        }
    }
}

/// One page of results plus the engine-reported total match count.
///
/// `total` counts index matches and is not reduced when stale hits are
/// dropped during resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PagedResponse<T> {
    pub total: u64,
    pub data: Vec<T>,
}

impl<T> PagedResponse<T> {
    pub fn new(total: u64, data: Vec<T>) -> Self {
        Self { total, data }
    }
}
