use std::time::Duration;

use anyhow::bail;
use serde::Deserialize;

use crate::collector::retry::{Backoff, RetryPolicy};

// ------------------------------------------------------------
// Root configuration
// ------------------------------------------------------------
//
// This is the top-level configuration structure loaded from
// `config.json`.
//
// It defines:
// - Upstream provider endpoints and credentials
// - Document store and publisher settings
// - Pipeline parallelism and retry policy
// - Per-source collection settings
// - Retention sweep settings
//
// Every section has defaults, so a minimal file only needs
// the API keys (which may also come from the environment).
//
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub providers: ProvidersConfig,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub publisher: PublisherConfig,

    #[serde(default)]
    pub pipeline: PipelineConfig,

    #[serde(default)]
    pub collections: CollectionsConfig,

    #[serde(default)]
    pub news: NewsConfig,

    #[serde(default)]
    pub retention: RetentionConfig,

    /// Optional debug configuration
    pub debug: Option<DebugConfig>,
}

impl Config {
    /// Fills empty secrets from the environment.
    ///
    /// - `FMP_API_KEY`
    /// - `EOD_API_KEY`
    /// - `REDIS_URL`
    pub fn apply_env(&mut self) {
        if self.providers.fmp.api_key.is_empty() {
            if let Ok(key) = std::env::var("FMP_API_KEY") {
                self.providers.fmp.api_key = key;
            }
        }
        if self.providers.eod.api_key.is_empty() {
            if let Ok(key) = std::env::var("EOD_API_KEY") {
                self.providers.eod.api_key = key;
            }
        }
        if let Ok(url) = std::env::var("REDIS_URL") {
            self.store.url = url;
        }
    }

    /// Rejects values that would make the run loop meaningless.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.pipeline.parallelism == 0 {
            bail!("pipeline.parallelism must be greater than zero");
        }
        if self.pipeline.job_retry.attempts == 0 || self.providers.retry.attempts == 0 {
            bail!("retry attempts must be greater than zero");
        }
        if self.news.page_size == 0 {
            bail!("news.page_size must be greater than zero");
        }
        if !(0..=MAX_RETENTION_DAYS).contains(&self.retention.max_age_days) {
            bail!(
                "retention.max_age_days must be between 0 and {}",
                MAX_RETENTION_DAYS
            );
        }

        for (name, c) in self.collections.iter() {
            if c.batch_size == 0 {
                bail!("collections.{}.batch_size must be greater than zero", name);
            }
        }

        Ok(())
    }

    pub fn verbose(&self) -> bool {
        self.debug.as_ref().is_some_and(|d| d.log.unwrap_or(false))
    }
}

// ------------------------------------------------------------
// Provider configuration
// ------------------------------------------------------------
//
// Two upstream providers are used:
// - FMP for symbols, quotes, fundamentals, market data and news
// - EOD for world index history
//
// NOTE:
// API keys are security-sensitive and must never be committed.
//
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ProvidersConfig {
    pub fmp: ProviderConfig,
    pub eod: ProviderConfig,

    /// Per-request timeout in seconds
    pub timeout_secs: u64,

    /// Transport-level retry (exponential backoff)
    pub retry: RetryConfig,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            fmp: ProviderConfig {
                base_url: "https://financialmodelingprep.com/api/".into(),
                api_key: String::new(),
            },
            eod: ProviderConfig {
                base_url: "https://eodhistoricaldata.com/api/".into(),
                api_key: String::new(),
            },
            timeout_secs: 30,
            retry: RetryConfig::default(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ProviderConfig {
    /// Absolute base URL, must end with '/'
    pub base_url: String,

    #[serde(default)]
    pub api_key: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RetryConfig {
    pub attempts: u32,
    pub delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts: 3,
            delay_ms: 1000,
        }
    }
}

impl RetryConfig {
    pub fn policy(&self, backoff: Backoff) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.attempts,
            delay: Duration::from_millis(self.delay_ms),
            backoff,
        }
    }
}

// ------------------------------------------------------------
// Store configuration
// ------------------------------------------------------------
//
// `demo` keeps every document in memory (nothing is written,
// counts are logged at the end of the run).
//
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StoreConfig {
    pub url: String,

    /// Key prefix for every collection hash
    pub namespace: String,

    pub demo: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1/".into(),
            namespace: "collector".into(),
            demo: false,
        }
    }
}

// ------------------------------------------------------------
// Publisher configuration
// ------------------------------------------------------------
//
// Publishing is disabled unless explicitly switched on.
//
#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PublisherMode {
    #[default]
    Disabled,
    Redis,
    Master,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct PublisherConfig {
    pub mode: PublisherMode,

    /// Redis list used as queue (mode = redis)
    pub queue: QueueConfig,

    /// Ingestion master (mode = master)
    pub master: Option<MasterConfig>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct QueueConfig {
    /// Falls back to `store.url` when unset
    pub url: Option<String>,
    pub name: String,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            url: None,
            name: "collector:events".into(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct MasterConfig {
    /// WebSocket URL of the master service
    pub url: String,

    /// Authentication key used during login
    /// (sent as: key=XYZ&role=collector)
    pub key: String,

    /// Number of parallel WebSocket connections to the master
    #[serde(default = "default_master_connections")]
    pub connections: usize,
}

fn default_master_connections() -> usize {
    1
}

// ------------------------------------------------------------
// Pipeline configuration
// ------------------------------------------------------------
//
// `parallelism` is the number of jobs run together in one
// orchestrator batch (not the per-collection batch size).
//
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PipelineConfig {
    pub parallelism: usize,

    /// Fixed-delay retry applied to every job
    pub job_retry: RetryConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            parallelism: 2,
            job_retry: RetryConfig::default(),
        }
    }
}

// ------------------------------------------------------------
// Collection configuration
// ------------------------------------------------------------
//
// One block per entity-based source.
//
// - `symbols`: allow-list, empty = every catalog entry
// - `limit`:   cap applied after the allow-list
// - `window`:  number of most recent series points kept
//
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct CollectionsConfig {
    pub stocks: CollectionConfig,
    pub crypto: CollectionConfig,
    pub forex: CollectionConfig,
    pub indices: CollectionConfig,
    pub commodities: CollectionConfig,
    pub market: MarketConfig,
}

impl CollectionsConfig {
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &CollectionConfig)> {
        [
            ("stocks", &self.stocks),
            ("crypto", &self.crypto),
            ("forex", &self.forex),
            ("indices", &self.indices),
            ("commodities", &self.commodities),
        ]
        .into_iter()
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CollectionConfig {
    pub enabled: bool,
    pub batch_size: usize,
    pub symbols: Vec<String>,
    pub limit: Option<usize>,
    pub window: Option<usize>,
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            batch_size: 1000,
            symbols: Vec::new(),
            limit: None,
            window: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct MarketConfig {
    pub enabled: bool,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

// ------------------------------------------------------------
// News configuration
// ------------------------------------------------------------
//
// `max_pages` is the highest page index requested (pages start
// at 0), so the default of 1 means up to two pages.
//
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct NewsConfig {
    pub enabled: bool,
    pub page_size: usize,
    pub max_pages: usize,

    /// Source names to run, empty = all
    pub sources: Vec<String>,
}

impl Default for NewsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            page_size: 5,
            max_pages: 1,
            sources: Vec::new(),
        }
    }
}

// ------------------------------------------------------------
// Retention configuration
// ------------------------------------------------------------
//
// Append-only collections grow without bound; the sweep
// removes records older than `max_age_days`.
//
/// Upper bound accepted for `retention.max_age_days` (100 years)
pub const MAX_RETENTION_DAYS: i64 = 36_500;

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RetentionConfig {
    pub collections: Vec<String>,
    pub date_field: String,
    pub max_age_days: i64,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            collections: vec!["articles".into(), "marketSummary".into()],
            date_field: "date".into(),
            max_age_days: 30,
        }
    }
}

// ------------------------------------------------------------
// Debug configuration
// ------------------------------------------------------------
#[derive(Debug, Deserialize, Clone)]
pub struct DebugConfig {
    /// Enables debug level logging
    pub log: Option<bool>,
}
