use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::Ordering;

use futures_util::future::join_all;
use log::{error, info};
use serde_json::Value;

use crate::metrics::METRICS;
use crate::publish::Publisher;
use crate::schema::{Document, EventMessage, LogicalEntity};
use crate::store::{DocumentStore, WriteMode};

// ------------------------------------------------------------
// Commit sink
// ------------------------------------------------------------
//
// Where one collection's batches end up: persist every buffered
// document, then publish every buffered message.
//
// IMPORTANT:
// - Publishing only happens once persistence succeeded.
// - A failed commit is reported to the caller, never retried here.
//
#[derive(Clone)]
pub struct CommitSink {
    store: Arc<dyn DocumentStore>,
    publisher: Arc<dyn Publisher>,
    collection: String,
    mode: WriteMode,
}

impl CommitSink {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        publisher: Arc<dyn Publisher>,
        collection: impl Into<String>,
        mode: WriteMode,
    ) -> Self {
        Self {
            store,
            publisher,
            collection: collection.into(),
            mode,
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Persists `docs` according to the write mode, then publishes.
    ///
    /// Returns the number of documents written.
    pub async fn commit(&self, mut docs: Vec<Value>, messages: &[EventMessage]) -> anyhow::Result<usize> {
        let written = match (&self.mode, docs.len()) {
            (WriteMode::Insert, 1) => {
                let doc = docs.remove(0);
                self.store.insert_one(&self.collection, doc).await?;
                1
            }
            (WriteMode::Insert, _) => self.store.insert_many(&self.collection, docs).await?,
            (WriteMode::Upsert { key }, 1) => {
                let doc = docs.remove(0);
                self.store.upsert_one(&self.collection, key, doc).await?;
                1
            }
            (WriteMode::Upsert { key }, _) => {
                self.store.upsert_many(&self.collection, key, docs).await?
            }
        };

        self.publisher.publish(messages).await;
        Ok(written)
    }
}

/// Outcome counters of one `run_collection` call.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunReport {
    /// Chunks processed
    pub batches: usize,

    /// Commit attempts (empty batches are skipped)
    pub commits: usize,

    /// Documents written by successful commits
    pub committed: usize,

    pub failed_entities: usize,
    pub failed_commits: usize,
}

/// Collection Runner
///
/// Processes `entities` in consecutive chunks of `batch_size`.
///
/// PER CHUNK:
/// 1. run `per_entity` for every member concurrently, wait for all
/// 2. buffer successes, log and drop failures
/// 3. commit the buffers if not empty
/// 4. clear the buffers, whatever the commit outcome
///
/// GUARANTEES:
/// - chunk N+1 starts only after chunk N's commit settled
/// - an entity failure never affects its siblings
/// - a commit failure never stops the following chunks
///
/// NOTE:
/// Failed commits are not requeued (at-most-once).
///
pub async fn run_collection<F, Fut>(
    entities: &[LogicalEntity],
    batch_size: usize,
    sink: &CommitSink,
    per_entity: F,
) -> RunReport
where
    F: Fn(LogicalEntity) -> Fut,
    Fut: Future<Output = anyhow::Result<(Document, EventMessage)>>,
{
    let mut report = RunReport::default();

    if entities.is_empty() {
        info!("[{}] nothing to process", sink.collection());
        return report;
    }

    let batch_size = batch_size.max(1);
    let total = entities.len().div_ceil(batch_size);

    let mut docs: Vec<Value> = Vec::with_capacity(batch_size);
    let mut messages: Vec<EventMessage> = Vec::with_capacity(batch_size);

    for (i, chunk) in entities.chunks(batch_size).enumerate() {
        report.batches += 1;

        let settled = join_all(chunk.iter().cloned().map(&per_entity)).await;

        for (entity, outcome) in chunk.iter().zip(settled) {
            let built = outcome.and_then(|(doc, msg)| Ok((serde_json::to_value(&doc)?, msg)));

            match built {
                Ok((doc, msg)) => {
                    docs.push(doc);
                    messages.push(msg);
                }
                Err(e) => {
                    report.failed_entities += 1;
                    METRICS.entities_failed.fetch_add(1, Ordering::Relaxed);
                    error!("[{}] {} failed: {:#}", sink.collection(), entity.symbol, e);
                }
            }
        }

        if !docs.is_empty() {
            report.commits += 1;
            let size = docs.len();

            match sink.commit(std::mem::take(&mut docs), &messages).await {
                Ok(written) => {
                    report.committed += written;
                    METRICS.batches_committed.fetch_add(1, Ordering::Relaxed);
                    METRICS.entities_committed.fetch_add(written, Ordering::Relaxed);
                    info!(
                        "[{}] batch {}/{} committed ({} documents)",
                        sink.collection(),
                        i + 1,
                        total,
                        written
                    );
                }
                Err(e) => {
                    report.failed_commits += 1;
                    METRICS.batches_failed.fetch_add(1, Ordering::Relaxed);
                    error!(
                        "[{}] batch {}/{} commit failed, {} documents dropped: {:#}",
                        sink.collection(),
                        i + 1,
                        total,
                        size,
                        e
                    );
                }
            }
        }

        docs.clear();
        messages.clear();
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::publish::testing::RecordingPublisher;
    use crate::schema::FetchResult;
    use crate::store::memory::MemoryStore;
    use chrono::{DateTime, Utc};
    use std::sync::atomic::AtomicUsize;

    fn entities(n: usize) -> Vec<LogicalEntity> {
        (0..n)
            .map(|i| LogicalEntity::new(format!("S{}", i), format!("Symbol {}", i)))
            .collect()
    }

    async fn build(entity: LogicalEntity) -> anyhow::Result<(Document, EventMessage)> {
        let doc = Document::new(&entity, FetchResult::new())?;
        let msg = doc.event("ticker")?;
        Ok((doc, msg))
    }

    /// Store whose `insert_many` fails on the listed call indices.
    struct FlakyStore {
        inner: MemoryStore,
        calls: AtomicUsize,
        fail_on: Vec<usize>,
    }

    #[async_trait::async_trait]
    impl DocumentStore for FlakyStore {
        async fn insert_one(&self, c: &str, doc: Value) -> anyhow::Result<()> {
            self.inner.insert_one(c, doc).await
        }

        async fn insert_many(&self, c: &str, docs: Vec<Value>) -> anyhow::Result<usize> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_on.contains(&call) {
                anyhow::bail!("connection reset");
            }
            self.inner.insert_many(c, docs).await
        }

        async fn upsert_one(&self, c: &str, k: &str, doc: Value) -> anyhow::Result<()> {
            self.inner.upsert_one(c, k, doc).await
        }

        async fn upsert_many(&self, c: &str, k: &str, docs: Vec<Value>) -> anyhow::Result<usize> {
            self.inner.upsert_many(c, k, docs).await
        }

        async fn delete_older_than(
            &self,
            c: &str,
            f: &str,
            cutoff: DateTime<Utc>,
        ) -> anyhow::Result<usize> {
            self.inner.delete_older_than(c, f, cutoff).await
        }
    }

    fn sink(store: Arc<dyn DocumentStore>, publisher: Arc<RecordingPublisher>, mode: WriteMode) -> CommitSink {
        CommitSink::new(store, publisher, "ticker", mode)
    }

    #[tokio::test]
    async fn one_commit_per_chunk() {
        let store = Arc::new(MemoryStore::new());
        let publisher = Arc::new(RecordingPublisher::new());
        let sink = sink(store.clone(), publisher.clone(), WriteMode::Insert);

        let report = run_collection(&entities(7), 3, &sink, build).await;

        assert_eq!(report.batches, 3);
        assert_eq!(report.commits, 3);
        assert_eq!(report.committed, 7);
        assert_eq!(store.documents("ticker").await.len(), 7);

        let sizes: Vec<usize> = publisher.batches().iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![3, 3, 1]);
    }

    #[tokio::test]
    async fn failing_entity_does_not_block_siblings() {
        let store = Arc::new(MemoryStore::new());
        let publisher = Arc::new(RecordingPublisher::new());
        let sink = sink(store.clone(), publisher.clone(), WriteMode::Insert);

        let report = run_collection(&entities(3), 3, &sink, |e: LogicalEntity| async move {
            if e.symbol == "S1" {
                anyhow::bail!("upstream exploded");
            }
            build(e).await
        })
        .await;

        assert_eq!(report.failed_entities, 1);
        assert_eq!(report.commits, 1);

        let symbols: Vec<_> = store
            .documents("ticker")
            .await
            .iter()
            .map(|d| d["symbol"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(symbols, vec!["S0", "S2"]);
        assert_eq!(publisher.batches()[0].len(), 2);
    }

    #[tokio::test]
    async fn commit_failure_drops_batch_and_continues() {
        let store = Arc::new(FlakyStore {
            inner: MemoryStore::new(),
            calls: AtomicUsize::new(0),
            fail_on: vec![0],
        });
        let publisher = Arc::new(RecordingPublisher::new());
        let sink = sink(store.clone(), publisher.clone(), WriteMode::Insert);

        let report = run_collection(&entities(4), 2, &sink, build).await;

        assert_eq!(report.commits, 2);
        assert_eq!(report.failed_commits, 1);
        assert_eq!(report.committed, 2);

        // First batch lost, nothing carried into the second one
        let docs = store.inner.documents("ticker").await;
        let symbols: Vec<_> = docs.iter().map(|d| d["symbol"].as_str().unwrap()).collect();
        assert_eq!(symbols, vec!["S2", "S3"]);

        // No publish for the failed batch
        assert_eq!(publisher.batches().len(), 1);
        assert_eq!(publisher.batches()[0].len(), 2);
    }

    #[tokio::test]
    async fn empty_input_and_all_failed_batches_skip_commit() {
        let store = Arc::new(MemoryStore::new());
        let publisher = Arc::new(RecordingPublisher::new());
        let sink = sink(store.clone(), publisher.clone(), WriteMode::Insert);

        let report = run_collection(&[], 10, &sink, build).await;
        assert_eq!(report, RunReport::default());

        let report = run_collection(&entities(2), 10, &sink, |_e: LogicalEntity| async {
            Err::<(Document, EventMessage), _>(anyhow::anyhow!("down"))
        })
        .await;
        assert_eq!(report.batches, 1);
        assert_eq!(report.commits, 0);
        assert!(publisher.batches().is_empty());
    }

    /// Store whose writes take a while and leave a mark in `events`.
    struct SlowStore {
        inner: MemoryStore,
        events: Arc<std::sync::Mutex<Vec<String>>>,
    }

    impl SlowStore {
        async fn mark(&self, docs: &[Value]) {
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            let symbols: Vec<_> = docs.iter().filter_map(|d| d["symbol"].as_str()).collect();
            self.events.lock().unwrap().push(format!("commit:{}", symbols.join(",")));
        }
    }

    #[async_trait::async_trait]
    impl DocumentStore for SlowStore {
        async fn insert_one(&self, c: &str, doc: Value) -> anyhow::Result<()> {
            self.mark(std::slice::from_ref(&doc)).await;
            self.inner.insert_one(c, doc).await
        }

        async fn insert_many(&self, c: &str, docs: Vec<Value>) -> anyhow::Result<usize> {
            self.mark(&docs).await;
            self.inner.insert_many(c, docs).await
        }

        async fn upsert_one(&self, c: &str, k: &str, doc: Value) -> anyhow::Result<()> {
            self.inner.upsert_one(c, k, doc).await
        }

        async fn upsert_many(&self, c: &str, k: &str, docs: Vec<Value>) -> anyhow::Result<usize> {
            self.inner.upsert_many(c, k, docs).await
        }

        async fn delete_older_than(
            &self,
            c: &str,
            f: &str,
            cutoff: DateTime<Utc>,
        ) -> anyhow::Result<usize> {
            self.inner.delete_older_than(c, f, cutoff).await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn next_chunk_waits_for_previous_commit() {
        let events = Arc::new(std::sync::Mutex::new(Vec::new()));
        let store = Arc::new(SlowStore {
            inner: MemoryStore::new(),
            events: events.clone(),
        });
        let publisher = Arc::new(RecordingPublisher::new());
        let sink = sink(store, publisher, WriteMode::Insert);

        let log = &events;
        run_collection(&entities(5), 2, &sink, move |e: LogicalEntity| async move {
            log.lock().unwrap().push(format!("start:{}", e.symbol));
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            build(e).await
        })
        .await;

        assert_eq!(
            *events.lock().unwrap(),
            vec![
                "start:S0", "start:S1", "commit:S0,S1",
                "start:S2", "start:S3", "commit:S2,S3",
                "start:S4", "commit:S4",
            ]
        );
    }

    #[tokio::test]
    async fn upsert_mode_replaces_by_symbol() {
        let store = Arc::new(MemoryStore::new());
        let publisher = Arc::new(RecordingPublisher::new());
        let sink = sink(store.clone(), publisher.clone(), WriteMode::Upsert { key: "symbol" });

        run_collection(&entities(3), 2, &sink, build).await;
        run_collection(&entities(3), 2, &sink, build).await;

        assert_eq!(store.documents("ticker").await.len(), 3);
    }
}
