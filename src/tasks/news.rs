use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use log::{error, info};
use serde_json::Value;

use crate::collector::orchestrator::Job;
use crate::collector::paginator::Paginator;
use crate::collector::runner::CommitSink;
use crate::provider::Fetcher;
use crate::provider::resources as r;

pub const COLLECTION: &str = "articles";

/// Paginated feeds, by source name.
pub const SOURCES: [(&str, &str); 7] = [
    ("fmp", r::FMP_ARTICLES),
    ("general", r::GENERAL_NEWS),
    ("press", r::PRESS_RELEASES),
    ("stocks", r::STOCK_NEWS),
    ("crypto", r::CRYPTO_NEWS),
    ("forex", r::FOREX_NEWS),
    ("rss", r::STOCK_NEWS_RSS),
];

/// One news feed: read every page, append the records to `articles`.
///
/// Never fails. A partial read (rate limit, HTTP or network error)
/// still commits what was accumulated; a failed commit is logged.
///
/// Records get a `date` for the retention sweep: the feed's
/// `publishedDate` when present, otherwise the capture instant.
pub struct NewsJob {
    pub name: String,
    pub endpoint: &'static str,
    pub fetcher: Arc<dyn Fetcher>,
    pub page_size: usize,
    pub max_pages: usize,
    pub sink: CommitSink,
}

#[async_trait::async_trait]
impl Job for NewsJob {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self) -> anyhow::Result<()> {
        let harvest = Paginator::new(self.fetcher.as_ref())
            .fetch_all(self.endpoint, self.page_size, self.max_pages)
            .await;

        if harvest.records.is_empty() {
            info!("{}: no articles ({:?})", self.name, harvest.stop);
            return Ok(());
        }

        let captured_at = Utc::now();
        let records: Vec<Value> = harvest
            .records
            .into_iter()
            .map(|record| stamp_date(record, captured_at))
            .collect();

        match self.sink.commit(records, &harvest.messages).await {
            Ok(n) => info!("{}: inserted {} articles", self.name, n),
            Err(e) => error!("{}: error inserting articles or producing messages: {:#}", self.name, e),
        }

        Ok(())
    }
}

fn stamp_date(mut record: Value, captured_at: DateTime<Utc>) -> Value {
    let Some(map) = record.as_object_mut() else {
        return record;
    };

    if !map.contains_key("date") {
        let date = map
            .get("publishedDate")
            .cloned()
            .unwrap_or_else(|| Value::String(captured_at.to_rfc3339_opts(SecondsFormat::Millis, true)));
        map.insert("date".into(), date);
    }
    record
}
