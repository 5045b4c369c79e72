use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use once_cell::sync::Lazy;

/// Global runtime metrics for one collector run.
///
/// Purpose:
/// - Track what was fetched, committed and dropped
/// - Give a one-line summary at the end of the run
///
/// Design:
/// - Lock-free (Atomics)
/// - Cheap to update
/// - Safe in async + multithreaded contexts
#[derive(Default)]
pub struct RuntimeMetrics {
    // Upstream
    pub pages_fetched: AtomicUsize,

    // Collection runner
    pub entities_committed: AtomicUsize,
    pub entities_failed: AtomicUsize,
    pub batches_committed: AtomicUsize,
    pub batches_failed: AtomicUsize,

    // Orchestrator
    pub jobs_succeeded: AtomicUsize,
    pub jobs_failed: AtomicUsize,
    pub documents_swept: AtomicUsize,
}

impl RuntimeMetrics {
    pub fn summary(&self) -> String {
        format!(
            "[METRICS] jobs_ok={} jobs_err={} batches_ok={} batches_err={} entities_ok={} entities_err={} pages={} swept={}",
            self.jobs_succeeded.load(Ordering::Relaxed),
            self.jobs_failed.load(Ordering::Relaxed),
            self.batches_committed.load(Ordering::Relaxed),
            self.batches_failed.load(Ordering::Relaxed),
            self.entities_committed.load(Ordering::Relaxed),
            self.entities_failed.load(Ordering::Relaxed),
            self.pages_fetched.load(Ordering::Relaxed),
            self.documents_swept.load(Ordering::Relaxed),
        )
    }
}

/// Global metrics registry (singleton)
pub static METRICS: Lazy<Arc<RuntimeMetrics>> =
    Lazy::new(|| Arc::new(RuntimeMetrics::default()));
