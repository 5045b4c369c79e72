use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::Mutex;

use super::{DocumentStore, is_expired, key_of};

/// In-memory `DocumentStore`.
///
/// Used in demo mode (nothing leaves the process) and by tests.
/// Collections are plain vectors in insertion order.
#[derive(Default)]
pub struct MemoryStore {
    collections: Mutex<HashMap<String, Vec<Value>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of one collection.
    pub async fn documents(&self, collection: &str) -> Vec<Value> {
        self.collections
            .lock()
            .await
            .get(collection)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl DocumentStore for MemoryStore {
    async fn insert_one(&self, collection: &str, doc: Value) -> anyhow::Result<()> {
        self.insert_many(collection, vec![doc]).await.map(|_| ())
    }

    async fn insert_many(&self, collection: &str, docs: Vec<Value>) -> anyhow::Result<usize> {
        if docs.is_empty() {
            anyhow::bail!("No documents inserted.");
        }

        let n = docs.len();
        self.collections
            .lock()
            .await
            .entry(collection.to_string())
            .or_default()
            .extend(docs);
        Ok(n)
    }

    async fn upsert_one(&self, collection: &str, key: &str, doc: Value) -> anyhow::Result<()> {
        self.upsert_many(collection, key, vec![doc]).await.map(|_| ())
    }

    async fn upsert_many(
        &self,
        collection: &str,
        key: &str,
        docs: Vec<Value>,
    ) -> anyhow::Result<usize> {
        // Every key is resolved before the collection is touched
        let keyed = docs
            .into_iter()
            .map(|doc| Ok((key_of(&doc, key)?, doc)))
            .collect::<anyhow::Result<Vec<_>>>()?;

        let mut guard = self.collections.lock().await;
        let rows = guard.entry(collection.to_string()).or_default();

        let n = keyed.len();
        for (id, doc) in keyed {
            match rows
                .iter_mut()
                .find(|row| key_of(row, key).is_ok_and(|existing| existing == id))
            {
                Some(row) => *row = doc,
                None => rows.push(doc),
            }
        }
        Ok(n)
    }

    async fn delete_older_than(
        &self,
        collection: &str,
        date_field: &str,
        cutoff: DateTime<Utc>,
    ) -> anyhow::Result<usize> {
        let mut guard = self.collections.lock().await;
        let Some(rows) = guard.get_mut(collection) else {
            return Ok(0);
        };

        let before = rows.len();
        rows.retain(|row| !is_expired(row, date_field, cutoff));
        Ok(before - rows.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;

    #[tokio::test]
    async fn upsert_replaces_by_key_and_insert_appends() {
        let store = MemoryStore::new();

        store.upsert_many("indices", "symbol", vec![json!({"symbol": "DJI", "v": 1})]).await.unwrap();
        store.upsert_one("indices", "symbol", json!({"symbol": "DJI", "v": 2})).await.unwrap();
        store.insert_many("crypto", vec![json!({"symbol": "BTC"}), json!({"symbol": "BTC"})]).await.unwrap();

        let indices = store.documents("indices").await;
        assert_eq!(indices.len(), 1);
        assert_eq!(indices[0]["v"], 2);
        assert_eq!(store.documents("crypto").await.len(), 2);
    }

    #[tokio::test]
    async fn upsert_without_key_writes_nothing() {
        let store = MemoryStore::new();

        let result = store
            .upsert_many(
                "commodities",
                "symbol",
                vec![json!({"symbol": "GCUSD"}), json!({"name": "no symbol"})],
            )
            .await;

        assert!(result.is_err());
        assert!(store.documents("commodities").await.is_empty());
    }

    #[tokio::test]
    async fn empty_insert_is_an_error() {
        let store = MemoryStore::new();
        assert!(store.insert_many("ticker", Vec::new()).await.is_err());
    }

    #[tokio::test]
    async fn delete_older_than_keeps_boundary_records() {
        let store = MemoryStore::new();
        let cutoff = Utc::now();

        store
            .insert_many(
                "articles",
                vec![
                    json!({"id": 1, "date": (cutoff - Duration::days(1)).to_rfc3339()}),
                    json!({"id": 2, "date": cutoff.to_rfc3339()}),
                    json!({"id": 3, "date": (cutoff + Duration::days(1)).to_rfc3339()}),
                    json!({"id": 4}),
                ],
            )
            .await
            .unwrap();

        let removed = store.delete_older_than("articles", "date", cutoff).await.unwrap();

        assert_eq!(removed, 1);
        let ids: Vec<_> = store.documents("articles").await.iter().map(|d| d["id"].clone()).collect();
        assert_eq!(ids, vec![json!(2), json!(3), json!(4)]);
        assert_eq!(store.delete_older_than("missing", "date", cutoff).await.unwrap(), 0);
    }
}
