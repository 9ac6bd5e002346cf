//! Record storage effect trait
//!
//! Defines the persistent record store consumed by the routing and
//! coordination crates. Records are typed, carry a JSON value and a flat set
//! of string tags, and are looked up by id or by tag filter.
//!
//! # Effect Classification
//!
//! - **Category**: Infrastructure Effect
//! - **Implementation**: `mediation-effects` (`MemoryRecordStore`)
//! - **Usage**: route and mediation record stores
//!
//! `find_unique_record` distinguishes "nothing matched" from "more than one
//! matched"; callers rely on that distinction to detect duplicate records.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Tag filter used for record queries. Every entry must match exactly.
pub type TagFilter = BTreeMap<String, String>;

/// Build a tag filter from `(name, value)` pairs.
pub fn tag_filter<I, K, V>(pairs: I) -> TagFilter
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

fn describe_filter(filter: &TagFilter) -> String {
    if filter.is_empty() {
        return "{}".to_string();
    }
    let parts: Vec<String> = filter.iter().map(|(k, v)| format!("{k}={v}")).collect();
    format!("{{{}}}", parts.join(", "))
}

/// A single stored record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageRecord {
    /// Record category, e.g. `mediation_requests`
    pub record_type: String,
    /// Identifier, unique within `record_type`
    pub id: String,
    /// Serialized record body
    pub value: String,
    /// Indexed tags
    pub tags: BTreeMap<String, String>,
}

impl StorageRecord {
    /// Create a record without tags
    pub fn new(
        record_type: impl Into<String>,
        id: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            record_type: record_type.into(),
            id: id.into(),
            value: value.into(),
            tags: BTreeMap::new(),
        }
    }

    /// Attach a tag, replacing any previous value for the same name
    pub fn with_tag(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(name.into(), value.into());
        self
    }

    /// Check whether every entry of `filter` is present in this record's tags
    pub fn matches(&self, filter: &TagFilter) -> bool {
        filter
            .iter()
            .all(|(name, value)| self.tags.get(name) == Some(value))
    }
}

/// Record storage errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    /// No record matched the lookup
    #[error("Record not found: {record_type} matching {query}")]
    NotFound {
        /// Record category searched
        record_type: String,
        /// Id or tag filter used for the lookup
        query: String,
    },

    /// More than one record matched a lookup that expected a single record
    #[error("Duplicate records: {count} {record_type} records match {query}")]
    Duplicate {
        /// Record category searched
        record_type: String,
        /// Tag filter used for the lookup
        query: String,
        /// Number of matching records
        count: usize,
    },

    /// A record with the same id already exists
    #[error("Record already exists: {record_type}/{id}")]
    DuplicateId {
        /// Record category
        record_type: String,
        /// Conflicting id
        id: String,
    },

    /// Record body could not be encoded or decoded
    #[error("Record serialization failed: {0}")]
    Serialization(String),

    /// Underlying storage backend failed
    #[error("Storage backend failure: {0}")]
    Backend(String),
}

impl StorageError {
    /// Record lookup by id found nothing
    pub fn not_found_by_id(record_type: &str, id: &str) -> Self {
        Self::NotFound {
            record_type: record_type.to_string(),
            query: format!("id={id}"),
        }
    }

    /// Record lookup by tag filter found nothing
    pub fn not_found_by_filter(record_type: &str, filter: &TagFilter) -> Self {
        Self::NotFound {
            record_type: record_type.to_string(),
            query: describe_filter(filter),
        }
    }

    /// Record lookup by tag filter found more than one record
    pub fn duplicate(record_type: &str, filter: &TagFilter, count: usize) -> Self {
        Self::Duplicate {
            record_type: record_type.to_string(),
            query: describe_filter(filter),
            count,
        }
    }

    /// Whether this error reports a missing record
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Whether this error reports an ambiguous or conflicting record
    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::Duplicate { .. } | Self::DuplicateId { .. })
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Persistent record store
#[async_trait]
pub trait RecordStorageEffects: Send + Sync {
    /// Insert a new record. Fails with `DuplicateId` if the id is taken.
    async fn add_record(&self, record: StorageRecord) -> Result<(), StorageError>;

    /// Fetch a record by type and id
    async fn get_record(&self, record_type: &str, id: &str) -> Result<StorageRecord, StorageError>;

    /// Replace the value and tags of an existing record
    async fn update_record(&self, record: StorageRecord) -> Result<(), StorageError>;

    /// Delete a record by type and id
    async fn delete_record(&self, record_type: &str, id: &str) -> Result<(), StorageError>;

    /// Return every record of `record_type` whose tags match `filter`
    async fn find_records(
        &self,
        record_type: &str,
        filter: &TagFilter,
    ) -> Result<Vec<StorageRecord>, StorageError>;

    /// Return the single record matching `filter`.
    ///
    /// Fails with `NotFound` when nothing matches and `Duplicate` when more
    /// than one record matches.
    async fn find_unique_record(
        &self,
        record_type: &str,
        filter: &TagFilter,
    ) -> Result<StorageRecord, StorageError> {
        let mut records = self.find_records(record_type, filter).await?;
        match records.len() {
            0 => Err(StorageError::not_found_by_filter(record_type, filter)),
            1 => Ok(records.remove(0)),
            count => Err(StorageError::duplicate(record_type, filter, count)),
        }
    }
}
