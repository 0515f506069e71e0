//! CRM record storage.
//!
//! The assistant's tools operate on records through the [`RecordStore`] trait:
//! list with filters, fetch, insert, update, delete, and schema introspection,
//! all keyed by record type name (e.g. `"CRM Lead"`) and record `name`.
//! [`SqliteRecordStore`] is the bundled implementation.

pub mod filters;
pub mod schema;
mod sqlite;
mod validate;

use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use thiserror::Error;

pub use filters::{parse_filters, Filter, FilterOp};
pub use schema::{DocField, DocTypeMeta, FieldType};
pub use sqlite::SqliteRecordStore;

/// A stored record: a JSON object with `doctype`, `name`, `creation` and
/// `modified` plus its field values.
pub type Record = Map<String, Value>;

/// Fields maintained by the store and never taken from caller data.
pub const SYSTEM_FIELDS: &[&str] = &["name", "doctype", "creation", "modified"];

/// Default page size for list queries.
pub const DEFAULT_LIST_LIMIT: usize = 10;

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("DocType {0} not found")]
    UnknownDoctype(String),

    #[error("{doctype} {name} not found")]
    NotFound { doctype: String, name: String },

    #[error("{doctype} {name} already exists")]
    Duplicate { doctype: String, name: String },

    #[error("Value missing for {doctype}: {label}")]
    MissingField { doctype: String, label: String },

    #[error("{label} cannot be \"{value}\". It should be one of {options}")]
    InvalidOption {
        label: String,
        value: String,
        options: String,
    },

    #[error("Could not find {doctype}: {name}")]
    LinkNotFound { doctype: String, name: String },

    #[error("{0}")]
    Validation(String),

    #[error("Invalid filter: {0}")]
    InvalidFilter(String),

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Record store unavailable: {0}")]
    Unavailable(String),
}

/// Parameters of a list query.
#[derive(Debug, Clone)]
pub struct ListQuery {
    pub doctype: String,
    pub filters: Vec<Filter>,
    /// Fields to project; empty means `["name"]`.
    pub fields: Vec<String>,
    pub limit: usize,
}

impl ListQuery {
    pub fn new(doctype: impl Into<String>) -> Self {
        Self {
            doctype: doctype.into(),
            filters: Vec::new(),
            fields: Vec::new(),
            limit: DEFAULT_LIST_LIMIT,
        }
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }
}

/// The host data-management system as seen by the assistant's tools.
///
/// Implementations enforce schema validation but no per-caller access control;
/// callers decide which record types are reachable.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Field schema of a record type.
    async fn meta(&self, doctype: &str) -> Result<DocTypeMeta, RecordError>;

    /// Records matching all filters, newest `modified` first.
    async fn get_list(&self, query: &ListQuery) -> Result<Vec<Record>, RecordError>;

    async fn get(&self, doctype: &str, name: &str) -> Result<Record, RecordError>;

    /// Validate and insert a new record, returning it with its generated `name`.
    async fn insert(&self, doctype: &str, data: Record) -> Result<Record, RecordError>;

    /// Merge `patch` into an existing record and re-validate it.
    async fn update(&self, doctype: &str, name: &str, patch: Record) -> Result<Record, RecordError>;

    async fn delete(&self, doctype: &str, name: &str) -> Result<(), RecordError>;
}

static LAST_TIMESTAMP_MICROS: AtomicI64 = AtomicI64::new(0);

/// Timestamp in the sortable `YYYY-MM-DD HH:MM:SS.ffffff` format.
///
/// Strictly increasing within the process, so `modified` ordering never ties.
pub fn now_string() -> String {
    let now = Utc::now().timestamp_micros();
    let previous = LAST_TIMESTAMP_MICROS
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| Some(now.max(last + 1)))
        .unwrap_or(now);
    let micros = now.max(previous + 1);
    DateTime::<Utc>::from_timestamp_micros(micros)
        .unwrap_or_else(Utc::now)
        .format("%Y-%m-%d %H:%M:%S%.6f")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamps_strictly_increase() {
        let stamps: Vec<String> = (0..1000).map(|_| now_string()).collect();
        assert!(stamps.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(stamps[0].len(), "2026-01-01 00:00:00.000000".len());
    }
}
