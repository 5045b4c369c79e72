// ------------------------------------------------------------
// Module declarations
// ------------------------------------------------------------
//
// Each module represents a well-defined responsibility:
//
// - config:    Configuration structs loaded from JSON
// - schema:    Entities, documents and queue messages
// - util:      Shared helper utilities (time, date parsing)
// - metrics:   Run counters
// - provider:  Upstream HTTP providers (FMP, EOD)
// - collector: Provider-agnostic core (retry, fetch, batches, jobs)
// - store:     Document persistence
// - publish:   Message publishing
// - tasks:     Concrete data sources and the job registry
//
mod collector;
mod config;
mod metrics;
mod provider;
mod publish;
mod schema;
mod store;
mod tasks;
mod util;

// ------------------------------------------------------------
// External dependencies
// ------------------------------------------------------------

use rustls::crypto::{CryptoProvider, ring};

use collector::orchestrator::run_all;
use config::Config;
use metrics::METRICS;
use tasks::{Services, build_jobs};

use chrono::Local;
use env_logger::{Builder, Env};
use log::{error, info};

use std::fs;
use std::io::Write;

const CONFIG_ENV: &str = "COLLECTOR_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config.json";

// ------------------------------------------------------------
// Application entry point
// ------------------------------------------------------------
//
// One run of the market data collector:
//
//   config -> store + publisher -> jobs -> run_all -> sweep -> exit
//
// All work is interleaved I/O on a single thread.
//
#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // --------------------------------------------------------
    // IMPORTANT:
    // rustls >= 0.23 requires an explicit CryptoProvider
    // installation, once, before any TLS connection.
    // --------------------------------------------------------
    CryptoProvider::install_default(ring::default_provider())
        .map_err(|_| anyhow::anyhow!("failed to install rustls CryptoProvider"))?;

    let config = load_config()?;
    init_logging(config.verbose());

    if let Err(e) = run(&config).await {
        error!("Failed to collect and build financial data: {:#}", e);
        return Err(e);
    }

    Ok(())
}

async fn run(config: &Config) -> anyhow::Result<()> {
    // --------------------------------------------------------
    // Collaborators
    //
    // The publisher has an explicit lifecycle: built here,
    // shut down once every job is done.
    // --------------------------------------------------------
    let store = store::connect(&config.store)?;
    let publisher = publish::connect(&config.publisher, &config.store.url).await?;
    let services = Services::connect(config, store.clone(), publisher.clone())?;

    let jobs = build_jobs(config, &services);

    let outcome = run_all(&jobs, &config.pipeline, store.as_ref(), &config.retention).await;

    publisher.shutdown().await;

    let summary = outcome?;
    info!("{}", METRICS.summary());
    info!(
        "Successfully collected and built financial data ({} jobs fulfilled, {} rejected)",
        summary.succeeded, summary.failed
    );

    Ok(())
}

// ------------------------------------------------------------
// Logging
// ------------------------------------------------------------
//
// RUST_LOG wins; otherwise `debug.log` selects debug vs info.
//
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };

    Builder::from_env(Env::default().default_filter_or(level))
        .format(|buf, record| {
            writeln!(
                buf,
                "{} {:5} [{}] {}",
                Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();
}

// ------------------------------------------------------------
// Configuration loader
// ------------------------------------------------------------
//
// Reads the JSON configuration (path from COLLECTOR_CONFIG,
// default ./config.json), fills secrets from the environment
// and validates it.
//
// NOTE:
// - The config file may contain API keys.
// - It must not be committed to version control.
//
fn load_config() -> anyhow::Result<Config> {
    let path = std::env::var(CONFIG_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());

    let data = fs::read_to_string(&path)
        .map_err(|e| anyhow::anyhow!("cannot read configuration {}: {}", path, e))?;
    let mut cfg: Config = serde_json::from_str(&data)?;

    cfg.apply_env();
    cfg.validate()?;
    Ok(cfg)
}
