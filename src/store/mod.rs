//! Document store layer
//!
//! This module provides:
//! - The `DocumentStore` abstraction used by every commit step
//! - A redis backed implementation (production)
//! - An in-memory implementation (demo mode, tests)
//!
//! Documents are opaque JSON objects. The store only looks at:
//! - the key field, for upserts
//! - the date field, for retention sweeps

pub mod memory;
pub mod redis;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::info;
use serde_json::Value;

use crate::config::StoreConfig;
use crate::util;

/// Persistence policy of a collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteMode {
    /// Append-only history: every commit adds rows
    Insert,

    /// Snapshot per key: replaces the row with the same key field
    Upsert { key: &'static str },
}

/// Write/read access to the document store.
///
/// CONTRACT:
/// - every call acquires its own connection and releases it
///   before returning, including on error
/// - `insert_many` with an empty slice is an error
/// - `delete_older_than` removes records whose date field is
///   strictly older than `cutoff`; records without a readable
///   date are kept
///
#[async_trait::async_trait]
pub trait DocumentStore: Send + Sync {
    async fn insert_one(&self, collection: &str, doc: Value) -> anyhow::Result<()>;

    async fn insert_many(&self, collection: &str, docs: Vec<Value>) -> anyhow::Result<usize>;

    async fn upsert_one(&self, collection: &str, key: &str, doc: Value) -> anyhow::Result<()>;

    async fn upsert_many(
        &self,
        collection: &str,
        key: &str,
        docs: Vec<Value>,
    ) -> anyhow::Result<usize>;

    async fn delete_older_than(
        &self,
        collection: &str,
        date_field: &str,
        cutoff: DateTime<Utc>,
    ) -> anyhow::Result<usize>;
}

/// Builds the configured store.
pub fn connect(cfg: &StoreConfig) -> anyhow::Result<Arc<dyn DocumentStore>> {
    if cfg.demo {
        info!("Document store running in DEMO mode (in-memory)");
        return Ok(Arc::new(memory::MemoryStore::new()));
    }

    info!("Document store: redis, namespace '{}'", cfg.namespace);
    Ok(Arc::new(redis::RedisStore::open(&cfg.url, &cfg.namespace)?))
}

/// String form of a document's key field.
pub(crate) fn key_of(doc: &Value, key: &str) -> anyhow::Result<String> {
    match doc.get(key) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        _ => anyhow::bail!("document has no usable '{}' key", key),
    }
}

/// True when the record's date field is strictly before `cutoff`.
pub(crate) fn is_expired(doc: &Value, date_field: &str, cutoff: DateTime<Utc>) -> bool {
    doc.get(date_field)
        .and_then(util::parse_record_date)
        .is_some_and(|date| date < cutoff)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;

    #[test]
    fn expiry_is_strict() {
        let cutoff = Utc::now();
        let older = json!({ "date": (cutoff - Duration::seconds(1)).to_rfc3339() });
        let exact = json!({ "date": cutoff.to_rfc3339() });
        let undated = json!({ "title": "x" });

        assert!(is_expired(&older, "date", cutoff));
        assert!(!is_expired(&exact, "date", cutoff));
        assert!(!is_expired(&undated, "date", cutoff));
    }

    #[test]
    fn key_accepts_strings_and_numbers() {
        assert_eq!(key_of(&json!({"symbol": "GSPC.INDX"}), "symbol").unwrap(), "GSPC.INDX");
        assert_eq!(key_of(&json!({"id": 7}), "id").unwrap(), "7");
        assert!(key_of(&json!({"symbol": null}), "symbol").is_err());
    }
}
