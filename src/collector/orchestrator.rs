use std::sync::Arc;
use std::sync::atomic::Ordering;

use chrono::{DateTime, Duration, Utc};
use futures_util::future::join_all;
use log::{error, info};

use super::retry::{self, Backoff};
use crate::config::{PipelineConfig, RetentionConfig};
use crate::metrics::METRICS;
use crate::store::DocumentStore;

/// A top-level unit of work ("sync stocks", "fetch forex news", ...).
///
/// CONTRACT:
/// - `run` may be called again after a failure (job retry), so it
///   must not keep state between calls
/// - jobs share nothing mutable with each other
///
#[async_trait::async_trait]
pub trait Job: Send + Sync {
    fn name(&self) -> &str;

    async fn run(&self) -> anyhow::Result<()>;
}

/// What `run_all` did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub succeeded: usize,
    pub failed: usize,
    pub swept: usize,
}

/// Top-Level Orchestrator
///
/// Runs `jobs` in sequential chunks of `pipeline.parallelism`.
/// Inside a chunk every job runs concurrently under the job retry
/// policy (fixed delay); every outcome is settled and logged.
///
/// Afterwards the retention sweep runs once.
///
/// ERRORS:
/// - only a bad pipeline configuration is returned as an error;
///   job failures are logged and counted
///
pub async fn run_all(
    jobs: &[Arc<dyn Job>],
    pipeline: &PipelineConfig,
    store: &dyn DocumentStore,
    retention: &RetentionConfig,
) -> anyhow::Result<RunSummary> {
    if pipeline.parallelism == 0 {
        anyhow::bail!("pipeline.parallelism must be greater than zero");
    }

    let policy = pipeline.job_retry.policy(Backoff::Fixed);
    let mut summary = RunSummary::default();

    info!(
        "Running {} jobs, {} at a time",
        jobs.len(),
        pipeline.parallelism
    );

    for (i, chunk) in jobs.chunks(pipeline.parallelism).enumerate() {
        let runs = chunk.iter().map(|job| {
            let policy = &policy;
            async move {
                let outcome = retry::with_retry(move || job.run(), policy).await;
                (job, outcome)
            }
        });

        for (job, outcome) in join_all(runs).await {
            match outcome {
                Ok(()) => {
                    summary.succeeded += 1;
                    METRICS.jobs_succeeded.fetch_add(1, Ordering::Relaxed);
                    info!("Batch {}: job {} fulfilled", i, job.name());
                }
                Err(e) => {
                    summary.failed += 1;
                    METRICS.jobs_failed.fetch_add(1, Ordering::Relaxed);
                    error!("Batch {}: job {} rejected: {:#}", i, job.name(), e.last);
                }
            }
        }
    }

    summary.swept = sweep(store, retention, Utc::now()).await;

    info!(
        "All jobs done: {} fulfilled, {} rejected, {} stale documents removed",
        summary.succeeded, summary.failed, summary.swept
    );

    Ok(summary)
}

/// Retention sweep
///
/// Deletes, in every retained collection, the records whose date
/// field is strictly older than `now - max_age_days`.
///
/// A failing collection is logged and skipped. A negative or
/// unrepresentable age skips the sweep entirely.
pub async fn sweep(store: &dyn DocumentStore, retention: &RetentionConfig, now: DateTime<Utc>) -> usize {
    let Some(cutoff) = cutoff(now, retention.max_age_days) else {
        error!(
            "Retention: invalid max_age_days {}, sweep skipped",
            retention.max_age_days
        );
        return 0;
    };
    let mut removed = 0;

    for collection in &retention.collections {
        match store
            .delete_older_than(collection, &retention.date_field, cutoff)
            .await
        {
            Ok(n) => {
                removed += n;
                info!("Retention: removed {} documents from {}", n, collection);
            }
            Err(e) => error!("Retention: sweep of {} failed: {:#}", collection, e),
        }
    }

    METRICS.documents_swept.fetch_add(removed, Ordering::Relaxed);
    removed
}

/// `now - max_age_days`, never later than `now`.
fn cutoff(now: DateTime<Utc>, max_age_days: i64) -> Option<DateTime<Utc>> {
    if max_age_days < 0 {
        return None;
    }
    Duration::try_days(max_age_days).and_then(|age| now.checked_sub_signed(age))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RetryConfig;
    use crate::store::memory::MemoryStore;
    use serde_json::json;
    use std::sync::atomic::AtomicU32;

    /// Fails its first `failures` runs.
    struct CountingJob {
        name: &'static str,
        failures: u32,
        runs: AtomicU32,
    }

    impl CountingJob {
        fn new(name: &'static str, failures: u32) -> Arc<Self> {
            Arc::new(Self {
                name,
                failures,
                runs: AtomicU32::new(0),
            })
        }

        fn runs(&self) -> u32 {
            self.runs.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl Job for CountingJob {
        fn name(&self) -> &str {
            self.name
        }

        async fn run(&self) -> anyhow::Result<()> {
            let n = self.runs.fetch_add(1, Ordering::SeqCst) + 1;
            if n <= self.failures {
                anyhow::bail!("{} attempt {} failed", self.name, n);
            }
            Ok(())
        }
    }

    fn pipeline(parallelism: usize) -> PipelineConfig {
        PipelineConfig {
            parallelism,
            job_retry: RetryConfig {
                attempts: 3,
                delay_ms: 1000,
            },
        }
    }

    #[tokio::test(start_paused = true)]
    async fn failing_job_is_retried_and_isolated() {
        let broken = CountingJob::new("forex", u32::MAX);
        let flaky = CountingJob::new("crypto", 2);
        let healthy = CountingJob::new("stocks", 0);

        let jobs: Vec<Arc<dyn Job>> = vec![broken.clone(), flaky.clone(), healthy.clone()];
        let store = MemoryStore::new();

        let summary = run_all(&jobs, &pipeline(2), &store, &RetentionConfig::default())
            .await
            .unwrap();

        assert_eq!(broken.runs(), 3);
        assert_eq!(flaky.runs(), 3);
        assert_eq!(healthy.runs(), 1);
        assert_eq!(summary.succeeded, 2);
        assert_eq!(summary.failed, 1);
    }

    /// Shared trace of job starts/ends and the peak number in flight.
    #[derive(Default)]
    struct Trace {
        in_flight: AtomicU32,
        peak: AtomicU32,
        events: std::sync::Mutex<Vec<String>>,
    }

    impl Trace {
        fn position(&self, event: &str) -> usize {
            let events = self.events.lock().unwrap();
            events.iter().position(|e| e == event).unwrap()
        }
    }

    struct TimedJob {
        name: &'static str,
        millis: u64,
        trace: Arc<Trace>,
    }

    #[async_trait::async_trait]
    impl Job for TimedJob {
        fn name(&self) -> &str {
            self.name
        }

        async fn run(&self) -> anyhow::Result<()> {
            self.trace.events.lock().unwrap().push(format!("start:{}", self.name));
            let now = self.trace.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.trace.peak.fetch_max(now, Ordering::SeqCst);

            tokio::time::sleep(std::time::Duration::from_millis(self.millis)).await;

            self.trace.in_flight.fetch_sub(1, Ordering::SeqCst);
            self.trace.events.lock().unwrap().push(format!("end:{}", self.name));
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn chunks_run_in_order_with_bounded_parallelism() {
        let trace = Arc::new(Trace::default());
        let durations = [("a", 30), ("b", 10), ("c", 5), ("d", 40), ("e", 1)];
        let jobs: Vec<Arc<dyn Job>> = durations
            .iter()
            .map(|&(name, millis)| {
                Arc::new(TimedJob { name, millis, trace: trace.clone() }) as Arc<dyn Job>
            })
            .collect();

        let store = MemoryStore::new();
        let summary = run_all(&jobs, &pipeline(2), &store, &RetentionConfig::default())
            .await
            .unwrap();

        assert_eq!(summary.succeeded, 5);
        assert_eq!(trace.peak.load(Ordering::SeqCst), 2);

        // Every job of chunk N has ended before any job of chunk N+1 starts
        let chunks = [vec!["a", "b"], vec!["c", "d"], vec!["e"]];
        for pair in chunks.windows(2) {
            for earlier in &pair[0] {
                for later in &pair[1] {
                    assert!(
                        trace.position(&format!("end:{}", earlier))
                            < trace.position(&format!("start:{}", later)),
                        "{} started before {} settled",
                        later,
                        earlier
                    );
                }
            }
        }
    }

    #[tokio::test]
    async fn zero_parallelism_is_fatal() {
        let store = MemoryStore::new();
        assert!(run_all(&[], &pipeline(0), &store, &RetentionConfig::default()).await.is_err());
    }

    #[tokio::test]
    async fn sweep_keeps_records_exactly_at_the_limit() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let retention = RetentionConfig::default();

        store
            .insert_many(
                "articles",
                vec![
                    json!({"id": "old", "date": (now - Duration::days(31)).to_rfc3339()}),
                    json!({"id": "edge", "date": (now - Duration::days(30)).to_rfc3339()}),
                    json!({"id": "new", "date": (now - Duration::days(1)).to_rfc3339()}),
                ],
            )
            .await
            .unwrap();
        store
            .insert_one(
                "marketSummary",
                json!({"symbol": "market", "date": "2000-01-01 00:00:00"}),
            )
            .await
            .unwrap();
        store
            .insert_one("ticker", json!({"symbol": "AAPL", "date": "2000-01-01"}))
            .await
            .unwrap();

        let removed = sweep(&store, &retention, now).await;

        assert_eq!(removed, 2);
        let ids: Vec<_> = store.documents("articles").await.iter().map(|d| d["id"].clone()).collect();
        assert_eq!(ids, vec![json!("edge"), json!("new")]);
        assert!(store.documents("marketSummary").await.is_empty());
        // Not a retained collection
        assert_eq!(store.documents("ticker").await.len(), 1);
    }

    #[tokio::test]
    async fn sweep_with_invalid_age_removes_nothing() {
        let store = MemoryStore::new();
        let now = Utc::now();
        store
            .insert_many(
                "articles",
                vec![
                    json!({"id": "fresh", "date": now.to_rfc3339()}),
                    json!({"id": "ancient", "date": "1990-01-01"}),
                ],
            )
            .await
            .unwrap();

        for days in [-1, 1_000_000_000, i64::MAX] {
            let retention = RetentionConfig {
                max_age_days: days,
                ..RetentionConfig::default()
            };
            assert_eq!(sweep(&store, &retention, now).await, 0);
        }

        assert_eq!(store.documents("articles").await.len(), 2);
    }
}
