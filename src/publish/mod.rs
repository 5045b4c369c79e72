//! Message publishing layer
//!
//! Every commit ends with `Publisher::publish`. Which backend sits
//! behind it is a deployment choice:
//! - `disabled`: messages are dropped (default)
//! - `redis`: RPUSH onto a redis list
//! - `master`: WebSocket master pool
//!
//! Publishing is best effort. A publisher never returns an error to
//! the commit step; it logs and moves on.

pub mod master;

use std::sync::Arc;

use log::{debug, error, info};
use redis::AsyncCommands;

use crate::config::{PublisherConfig, PublisherMode};
use crate::schema::EventMessage;

/// Write-only, best-effort message sink.
///
/// LIFECYCLE:
/// - built once in `main` before the first job runs
/// - `shutdown` is called once after the last job finished
///
#[async_trait::async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, messages: &[EventMessage]);

    async fn shutdown(&self) {}
}

/// Builds the configured publisher.
///
/// `store_url` is used by the redis queue when no dedicated URL is set.
pub async fn connect(cfg: &PublisherConfig, store_url: &str) -> anyhow::Result<Arc<dyn Publisher>> {
    match cfg.mode {
        PublisherMode::Disabled => {
            info!("Publisher disabled, messages will not be produced");
            Ok(Arc::new(DisabledPublisher))
        }
        PublisherMode::Redis => {
            let url = cfg.queue.url.as_deref().unwrap_or(store_url);
            info!("Publisher: redis list '{}'", cfg.queue.name);
            Ok(Arc::new(RedisQueuePublisher::open(url, &cfg.queue.name)?))
        }
        PublisherMode::Master => {
            let Some(master) = &cfg.master else {
                anyhow::bail!("publisher.mode is 'master' but publisher.master is missing");
            };
            info!(
                "Publisher: master {} ({} connections)",
                master.url, master.connections
            );
            Ok(Arc::new(master::MasterPool::new(
                master.url.clone(),
                master.key.clone(),
                master.connections,
            )))
        }
    }
}

// ------------------------------------------------------------
// Disabled
// ------------------------------------------------------------

pub struct DisabledPublisher;

#[async_trait::async_trait]
impl Publisher for DisabledPublisher {
    async fn publish(&self, messages: &[EventMessage]) {
        debug!("Skipping message production ({} messages)", messages.len());
    }
}

// ------------------------------------------------------------
// Redis list queue
// ------------------------------------------------------------
//
// One RPUSH per message, in order, on a connection opened for
// this publish call only.
//
pub struct RedisQueuePublisher {
    client: redis::Client,
    queue: String,
}

impl RedisQueuePublisher {
    pub fn open(url: &str, queue: &str) -> anyhow::Result<Self> {
        Ok(Self {
            client: redis::Client::open(url)?,
            queue: queue.to_string(),
        })
    }

    async fn push_all(&self, messages: &[EventMessage]) -> anyhow::Result<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        for msg in messages {
            let payload = serde_json::to_string(msg)?;
            let _: i64 = conn.rpush(&self.queue, payload).await?;
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl Publisher for RedisQueuePublisher {
    async fn publish(&self, messages: &[EventMessage]) {
        if messages.is_empty() {
            return;
        }

        match self.push_all(messages).await {
            Ok(()) => debug!("Produced {} messages to '{}'", messages.len(), self.queue),
            Err(e) => error!(
                "Failed to produce {} messages to '{}': {}",
                messages.len(),
                self.queue,
                e
            ),
        }
    }
}

#[cfg(test)]
pub mod testing {
    //! Recording publisher shared by collector tests.

    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    pub struct RecordingPublisher {
        published: Mutex<Vec<Vec<EventMessage>>>,
    }

    impl RecordingPublisher {
        pub fn new() -> Self {
            Self::default()
        }

        /// One entry per `publish` call.
        pub fn batches(&self) -> Vec<Vec<EventMessage>> {
            self.published.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl Publisher for RecordingPublisher {
        async fn publish(&self, messages: &[EventMessage]) {
            self.published.lock().unwrap().push(messages.to_vec());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PublisherConfig, PublisherMode};

    #[tokio::test]
    async fn master_mode_requires_master_section() {
        let cfg = PublisherConfig {
            mode: PublisherMode::Master,
            ..Default::default()
        };
        assert!(connect(&cfg, "redis://127.0.0.1/").await.is_err());
    }

    #[tokio::test]
    async fn disabled_publisher_accepts_anything() {
        let publisher = connect(&PublisherConfig::default(), "redis://127.0.0.1/")
            .await
            .unwrap();
        publisher.publish(&[]).await;
        publisher.shutdown().await;
    }
}
