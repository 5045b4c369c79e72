//! Job registry
//!
//! This module provides:
//! - One module per data source (plan, collection, message kind)
//! - The symbol catalogs
//! - `build_jobs`, turning the configuration into the job list
//!
//! Sources never talk to the store or the publisher directly;
//! they receive a `CommitSink` built here.

pub mod catalog;
pub mod collection;
pub mod commodities;
pub mod crypto;
pub mod forex;
pub mod indices;
pub mod market;
pub mod news;
pub mod stocks;

use std::sync::Arc;
use std::time::Duration;

use log::{info, warn};

use crate::collector::fetch::{ItemFetcher, ItemPlan};
use crate::collector::orchestrator::Job;
use crate::collector::retry::Backoff;
use crate::collector::runner::CommitSink;
use crate::config::{CollectionConfig, Config};
use crate::provider::Fetcher;
use crate::provider::http::HttpFetcher;
use crate::provider::resources as r;
use crate::publish::Publisher;
use crate::store::{DocumentStore, WriteMode};

use catalog::{Catalog, Selection};
use collection::CollectionJob;
use news::NewsJob;

/// Shared collaborators of every job.
#[derive(Clone)]
pub struct Services {
    pub fmp: Arc<dyn Fetcher>,
    pub eod: Arc<dyn Fetcher>,
    pub store: Arc<dyn DocumentStore>,
    pub publisher: Arc<dyn Publisher>,
}

impl Services {
    /// Builds the HTTP providers from configuration.
    pub fn connect(
        cfg: &Config,
        store: Arc<dyn DocumentStore>,
        publisher: Arc<dyn Publisher>,
    ) -> anyhow::Result<Self> {
        let timeout = Duration::from_secs(cfg.providers.timeout_secs);
        let retry = cfg.providers.retry.policy(Backoff::Exponential);

        let fmp = HttpFetcher::new("fmp", &cfg.providers.fmp, "apikey", timeout, retry)?;
        let eod = HttpFetcher::new("eod", &cfg.providers.eod, "api_token", timeout, retry)?;

        Ok(Self {
            fmp: Arc::new(fmp),
            eod: Arc::new(eod),
            store,
            publisher,
        })
    }

    fn sink(&self, collection: &str, mode: WriteMode) -> CommitSink {
        CommitSink::new(self.store.clone(), self.publisher.clone(), collection, mode)
    }
}

/// Builds the job list, market sources first, then news feeds.
///
/// CONTRACT:
/// - disabled sources are skipped
/// - unknown news source names are logged and ignored
///
pub fn build_jobs(cfg: &Config, services: &Services) -> Vec<Arc<dyn Job>> {
    let mut jobs: Vec<Arc<dyn Job>> = Vec::new();
    let c = &cfg.collections;

    let entity_sources: [(&'static str, &CollectionConfig, Source); 5] = [
        ("stocks", &c.stocks, Source::stocks()),
        ("crypto", &c.crypto, Source::crypto()),
        ("forex", &c.forex, Source::forex()),
        ("indices", &c.indices, Source::indices()),
        ("commodities", &c.commodities, Source::commodities()),
    ];

    for (name, source_cfg, source) in entity_sources {
        if !source_cfg.enabled {
            info!("{}: disabled", name);
            continue;
        }
        jobs.push(Arc::new(source.job(name, source_cfg, services)));
    }

    if c.market.enabled {
        jobs.push(Arc::new(CollectionJob {
            name: "market",
            kind: market::KIND,
            catalog: Catalog::Fixed(vec![market::entity()]),
            catalog_fetcher: services.fmp.clone(),
            selection: Selection::default(),
            items: ItemFetcher::new(services.fmp.clone(), market::plan()),
            sink: services.sink(market::COLLECTION, WriteMode::Insert),
            batch_size: 1,
        }));
    }

    if cfg.news.enabled {
        for wanted in &cfg.news.sources {
            if !news::SOURCES.iter().any(|&(name, _)| name == wanted.as_str()) {
                warn!("news: unknown source '{}' ignored", wanted);
            }
        }

        let selected = news::SOURCES.into_iter().filter(|&(name, _)| {
            cfg.news.sources.is_empty() || cfg.news.sources.iter().any(|s| s.as_str() == name)
        });

        for (name, endpoint) in selected {
            jobs.push(Arc::new(NewsJob {
                name: format!("news:{}", name),
                endpoint,
                fetcher: services.fmp.clone(),
                page_size: cfg.news.page_size,
                max_pages: cfg.news.max_pages,
                sink: services.sink(news::COLLECTION, WriteMode::Insert),
            }));
        }
    }

    info!("{} jobs registered", jobs.len());
    jobs
}

// ------------------------------------------------------------
// Entity-based sources
// ------------------------------------------------------------
//
// Static description of a source; the configuration only
// decides selection, batch size and window.
//
struct Source {
    collection: &'static str,
    kind: &'static str,
    catalog: Catalog,
    mode: WriteMode,
    plan: fn(Option<usize>) -> ItemPlan,

    /// Indices come from EOD, everything else from FMP
    eod: bool,
}

impl Source {
    fn stocks() -> Self {
        Self {
            collection: stocks::COLLECTION,
            kind: stocks::KIND,
            catalog: Catalog::Remote(r::STOCK_LIST),
            mode: WriteMode::Insert,
            plan: stocks::plan,
            eod: false,
        }
    }

    fn crypto() -> Self {
        Self {
            collection: crypto::COLLECTION,
            kind: crypto::KIND,
            catalog: Catalog::Remote(r::CRYPTO_LIST),
            mode: WriteMode::Insert,
            plan: crypto::plan,
            eod: false,
        }
    }

    fn forex() -> Self {
        Self {
            collection: forex::COLLECTION,
            kind: forex::KIND,
            catalog: Catalog::Remote(r::FOREX_LIST),
            mode: WriteMode::Insert,
            plan: forex::plan,
            eod: false,
        }
    }

    fn indices() -> Self {
        Self {
            collection: indices::COLLECTION,
            kind: indices::KIND,
            catalog: Catalog::Fixed(catalog::world_indices()),
            mode: WriteMode::Upsert { key: "symbol" },
            plan: indices::plan,
            eod: true,
        }
    }

    fn commodities() -> Self {
        Self {
            collection: commodities::COLLECTION,
            kind: commodities::KIND,
            catalog: Catalog::Remote(r::COMMODITY_LIST),
            mode: WriteMode::Upsert { key: "symbol" },
            plan: commodities::plan,
            eod: false,
        }
    }

    fn job(self, name: &'static str, cfg: &CollectionConfig, services: &Services) -> CollectionJob {
        let fetcher = if self.eod {
            services.eod.clone()
        } else {
            services.fmp.clone()
        };

        CollectionJob {
            name,
            kind: self.kind,
            catalog: self.catalog,
            catalog_fetcher: services.fmp.clone(),
            selection: Selection::from(cfg),
            items: ItemFetcher::new(fetcher, (self.plan)(cfg.window)),
            sink: services.sink(self.collection, self.mode),
            batch_size: cfg.batch_size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::testing::ScriptedFetcher;
    use crate::publish::testing::RecordingPublisher;
    use crate::store::memory::MemoryStore;

    fn services() -> Services {
        Services {
            fmp: Arc::new(ScriptedFetcher::new()),
            eod: Arc::new(ScriptedFetcher::new()),
            store: Arc::new(MemoryStore::new()),
            publisher: Arc::new(RecordingPublisher::new()),
        }
    }

    fn names(jobs: &[Arc<dyn Job>]) -> Vec<String> {
        jobs.iter().map(|j| j.name().to_string()).collect()
    }

    #[test]
    fn default_configuration_registers_every_source() {
        let jobs = build_jobs(&Config::default(), &services());

        assert_eq!(
            names(&jobs),
            vec![
                "stocks", "crypto", "forex", "indices", "commodities", "market",
                "news:fmp", "news:general", "news:press", "news:stocks",
                "news:crypto", "news:forex", "news:rss",
            ]
        );
    }

    #[test]
    fn disabled_sources_and_news_filter() {
        let mut cfg = Config::default();
        cfg.collections.stocks.enabled = false;
        cfg.collections.market.enabled = false;
        cfg.news.sources = vec!["forex".into(), "nope".into()];

        let jobs = build_jobs(&cfg, &services());

        assert_eq!(
            names(&jobs),
            vec!["crypto", "forex", "indices", "commodities", "news:forex"]
        );
    }

    #[test]
    fn http_providers_build_from_defaults() {
        let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
        let publisher: Arc<dyn Publisher> = Arc::new(RecordingPublisher::new());

        let services = Services::connect(&Config::default(), store, publisher).unwrap();
        assert_eq!(services.fmp.name(), "fmp");
        assert_eq!(services.eod.name(), "eod");
    }
}
