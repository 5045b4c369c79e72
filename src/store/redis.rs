use std::collections::HashMap;

use chrono::{DateTime, Utc};
use log::debug;
use rand::random;
use redis::AsyncCommands;
use serde_json::Value;

use super::{DocumentStore, is_expired, key_of};
use crate::util;

/// Redis backed `DocumentStore`.
///
/// LAYOUT:
/// - one hash per collection: `<namespace>:<collection>`
/// - insert: field `<symbol|doc>:<epoch ms>:<random hex>`
/// - upsert: field = value of the key field
///
/// CONNECTIONS:
/// - `redis::Client` only holds the URL; every operation opens
///   its own connection and drops it on return (success or error)
///
pub struct RedisStore {
    client: redis::Client,
    namespace: String,
}

impl RedisStore {
    pub fn open(url: &str, namespace: &str) -> anyhow::Result<Self> {
        Ok(Self {
            client: redis::Client::open(url)?,
            namespace: namespace.to_string(),
        })
    }

    fn hash_key(&self, collection: &str) -> String {
        format!("{}:{}", self.namespace, collection)
    }

    async fn connection(&self) -> anyhow::Result<redis::aio::MultiplexedConnection> {
        Ok(self.client.get_multiplexed_async_connection().await?)
    }

    async fn write_fields(&self, collection: &str, fields: Vec<(String, String)>) -> anyhow::Result<()> {
        let mut conn = self.connection().await?;
        let _: () = conn.hset_multiple(self.hash_key(collection), &fields).await?;
        Ok(())
    }
}

/// Unique hash field for an appended document.
fn insert_field(doc: &Value) -> String {
    let prefix = doc.get("symbol").and_then(Value::as_str).unwrap_or("doc");
    format!("{}:{}:{:016x}", prefix, util::now_ms(), random::<u64>())
}

#[async_trait::async_trait]
impl DocumentStore for RedisStore {
    async fn insert_one(&self, collection: &str, doc: Value) -> anyhow::Result<()> {
        self.insert_many(collection, vec![doc]).await.map(|_| ())
    }

    async fn insert_many(&self, collection: &str, docs: Vec<Value>) -> anyhow::Result<usize> {
        if docs.is_empty() {
            anyhow::bail!("No documents inserted.");
        }

        let fields = docs
            .iter()
            .map(|doc| Ok((insert_field(doc), serde_json::to_string(doc)?)))
            .collect::<anyhow::Result<Vec<_>>>()?;

        let n = fields.len();
        self.write_fields(collection, fields).await?;
        debug!("[redis] inserted {} documents into {}", n, collection);
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
        if docs.is_empty() {
            return Ok(0);
        }

        let fields = docs
            .iter()
            .map(|doc| Ok((key_of(doc, key)?, serde_json::to_string(doc)?)))
            .collect::<anyhow::Result<Vec<_>>>()?;

        let n = fields.len();
        self.write_fields(collection, fields).await?;
        debug!("[redis] upserted {} documents into {}", n, collection);
        Ok(n)
    }

    async fn delete_older_than(
        &self,
        collection: &str,
        date_field: &str,
        cutoff: DateTime<Utc>,
    ) -> anyhow::Result<usize> {
        let hash = self.hash_key(collection);
        let mut conn = self.connection().await?;

        let rows: HashMap<String, String> = conn.hgetall(&hash).await?;

        let expired: Vec<String> = rows
            .into_iter()
            .filter(|(_, raw)| {
                serde_json::from_str::<Value>(raw)
                    .is_ok_and(|doc| is_expired(&doc, date_field, cutoff))
            })
            .map(|(field, _)| field)
            .collect();

        if expired.is_empty() {
            return Ok(0);
        }

        let removed: usize = conn.hdel(&hash, &expired).await?;
        Ok(removed)
    }
}
