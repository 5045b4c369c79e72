use std::sync::atomic::Ordering;

use chrono::Utc;
use log::{debug, error, info};
use serde_json::Value;

use crate::metrics::METRICS;
use crate::provider::{FetchError, FetchOutcome, Fetcher};
use crate::schema::EventMessage;

/// Why the page loop stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageStop {
    /// Short page, or the page index passed `max_pages`
    Exhausted,

    /// 429 from the provider
    RateLimited,

    /// Any other non-success answer
    HttpError(FetchError),

    /// Transport failure (after the request layer's own retries)
    NetworkError(FetchError),
}

/// Everything accumulated by one paginated read.
#[derive(Debug)]
pub struct Harvest {
    pub records: Vec<Value>,
    pub messages: Vec<EventMessage>,
    pub pages: usize,
    pub stop: PageStop,
}

/// Paginated feed reader.
///
/// Requests `?page=N&size=S` starting at page 0 and keeps going
/// while full pages come back and `N <= max_pages`.
///
/// STATE MACHINE:
///     FETCHING -> HAS_MORE     (full page, next index <= max_pages)
///              -> EXHAUSTED    (short page / ceiling reached)
///              -> RATE_LIMITED | HTTP_ERROR | NETWORK_ERROR
///
/// GUARANTEES:
/// - never fails; records accumulated before an error are returned
/// - one `EventMessage` per record, built once at the end
///
/// NOTE:
/// The credential is carried by the `Fetcher`.
///
pub struct Paginator<'a> {
    fetcher: &'a dyn Fetcher,
    kind: &'static str,
}

impl<'a> Paginator<'a> {
    pub fn new(fetcher: &'a dyn Fetcher) -> Self {
        Self {
            fetcher,
            kind: "article",
        }
    }

    pub async fn fetch_all(&self, endpoint: &str, page_size: usize, max_pages: usize) -> Harvest {
        let mut records: Vec<Value> = Vec::new();
        let mut page = 0usize;
        let mut pages = 0usize;

        let stop = loop {
            if page > max_pages {
                break PageStop::Exhausted;
            }

            let query = [
                ("page".to_string(), page.to_string()),
                ("size".to_string(), page_size.to_string()),
            ];

            let outcome = self.fetcher.fetch(endpoint, &[], &query).await;
            pages += 1;
            METRICS.pages_fetched.fetch_add(1, Ordering::Relaxed);

            let batch = match outcome {
                FetchOutcome::Data(body) => page_records(body),
                FetchOutcome::Empty => Vec::new(),
                FetchOutcome::Failed(FetchError::RateLimited) => {
                    error!("News > {} :: Rate limit exceeded on page {}", endpoint, page);
                    break PageStop::RateLimited;
                }
                FetchOutcome::Failed(e) if e.is_transport() => {
                    error!("News > {} :: Error fetching page {}: {}", endpoint, page, e);
                    break PageStop::NetworkError(e);
                }
                FetchOutcome::Failed(e) => {
                    error!("News > {} :: HTTP error on page {}: {}", endpoint, page, e);
                    break PageStop::HttpError(e);
                }
            };

            let full = batch.len() == page_size;
            debug!("News > {} :: page {} returned {} records", endpoint, page, batch.len());
            records.extend(batch);

            if !full {
                break PageStop::Exhausted;
            }
            page += 1;
        };

        let captured_at = Utc::now();
        let messages = records
            .iter()
            .enumerate()
            .filter_map(|(i, record)| {
                let identity = format!("{}-{}", self.kind, i);
                EventMessage::for_record(&identity, self.kind, captured_at, record).ok()
            })
            .collect();

        info!(
            "News > {} :: {} records from {} pages ({:?})",
            endpoint,
            records.len(),
            pages,
            stop
        );

        Harvest {
            records,
            messages,
            pages,
            stop,
        }
    }
}

/// Records of one page: a bare array, or `{"content": [...]}`.
fn page_records(body: Value) -> Vec<Value> {
    match body {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("content") {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}
