use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::{connect_async, tungstenite::Message};

use std::sync::Arc;

use anyhow::Result;
use log::{debug, error, info, warn};
use serde_json::{Value, json};

use tokio::sync::{Mutex, Notify, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Duration, sleep, timeout};

use rand::random_range;

use super::Publisher;
use crate::schema::EventMessage;

const QUEUE_CAPACITY: usize = 10_000;
const PING_EVERY: Duration = Duration::from_secs(30);
const RECONNECT_AFTER: Duration = Duration::from_secs(30);
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// ============================================================
/// MasterSender
/// ============================================================
///
/// One persistent WebSocket connection to the ingestion master.
///
/// Responsibilities:
/// - Perform login handshake
/// - Send queued event frames
/// - Send periodic JSON pings
/// - Reconnect after a connection loss
///
/// The queue outlives connections: frames enqueued while the
/// master is down are sent after the next login.
#[derive(Clone)]
struct MasterSender {
    queue: mpsc::Sender<Value>,
}

impl MasterSender {
    /// Spawns the reconnect loop and returns the sender with its task.
    fn spawn(
        master_url: String,
        login_msg: String,
        mut shutdown: watch::Receiver<bool>,
    ) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::channel::<Value>(QUEUE_CAPACITY);

        let handle = tokio::spawn(async move {
            loop {
                let session = Self::try_connect(&master_url, &login_msg, &mut rx, shutdown.clone());

                tokio::select! {
                    res = session => match res {
                        Ok(()) => break,
                        Err(e) => warn!("Master connection lost: {}", e),
                    },
                    _ = shutdown.changed() => break,
                }

                // Backoff before reconnect
                tokio::select! {
                    _ = sleep(RECONNECT_AFTER) => {}
                    _ = shutdown.changed() => break,
                }
            }

            debug!("Master sender stopped ({} frames left in queue)", rx.len());
        });

        (Self { queue: tx }, handle)
    }

    /// Runs one connection until it drops (`Err`) or shutdown is
    /// requested (`Ok`, after flushing what is already queued).
    async fn try_connect(
        master_url: &str,
        login_msg: &str,
        rx: &mut mpsc::Receiver<Value>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<()> {
        let (ws, _) = connect_async(master_url).await?;
        let (mut write, mut read) = ws.split();

        // Used to notify the writer when the reader detects EOF
        let closed = Arc::new(Notify::new());

        // ------------------------------------------------------------
        // LOGIN HANDSHAKE
        // ------------------------------------------------------------
        write.send(Message::Text(login_msg.to_string().into())).await?;
        info!("Connected to master {}", master_url);

        let mut ping_interval = tokio::time::interval(PING_EVERY);

        // ------------------------------------------------------------
        // READER TASK
        // ------------------------------------------------------------
        let reader = tokio::spawn({
            let closed = closed.clone();

            async move {
                while let Some(Ok(msg)) = read.next().await {
                    if let Message::Text(text) = msg {
                        debug!("[Master RECV] {}", text);
                    }
                }

                debug!("Master reader ended (EOF)");
                closed.notify_one();
            }
        });

        // ------------------------------------------------------------
        // WRITER LOOP
        // ------------------------------------------------------------
        let outcome = loop {
            tokio::select! {
                Some(frame) = rx.recv() => {
                    let json = serde_json::to_string(&frame)?;
                    debug!("[Master SEND] {}", json);
                    write.send(Message::Text(json.into())).await?;
                }

                _ = ping_interval.tick() => {
                    write.send(Message::Text(r#"{"op":"ping"}"#.into())).await?;
                }

                _ = closed.notified() => {
                    break Err(anyhow::anyhow!("Master closed connection"));
                }

                _ = shutdown.changed() => {
                    while let Ok(frame) = rx.try_recv() {
                        write.send(Message::Text(serde_json::to_string(&frame)?.into())).await?;
                    }
                    let _ = write.send(Message::Close(None)).await;
                    break Ok(());
                }
            }
        };

        reader.abort();
        outcome
    }

    /// Enqueues a frame without blocking.
    ///
    /// A full queue drops the frame; a closed queue is an error so
    /// the pool can try another sender.
    fn send(&self, frame: Value) -> Result<()> {
        match self.queue.try_send(frame) {
            Ok(_) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("Master queue full, dropping frame");
                Ok(())
            }
            Err(e) => Err(anyhow::anyhow!("Send error: {}", e)),
        }
    }
}

/// ============================================================
/// MasterPool
/// ============================================================
///
/// Several `MasterSender` connections behind one `Publisher`.
///
/// LOGIN FORMAT:
/// - key=<API_KEY>&role=collector
///
/// FRAME FORMAT:
/// - {"op":"event","id":..,"type":..,"value":..}
///
pub struct MasterPool {
    senders: Vec<MasterSender>,
    shutdown: watch::Sender<bool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl MasterPool {
    /// Spawns `count` connections (at least one).
    ///
    /// Must be called from inside the tokio runtime.
    pub fn new(master_url: String, key: String, count: usize) -> Self {
        let (shutdown, watcher) = watch::channel(false);
        let login = format!("key={}&role=collector", key);

        let (senders, tasks): (Vec<MasterSender>, Vec<JoinHandle<()>>) = (0..count.max(1))
            .map(|_| MasterSender::spawn(master_url.clone(), login.clone(), watcher.clone()))
            .unzip();

        Self {
            senders,
            shutdown,
            tasks: Mutex::new(tasks),
        }
    }

    /// Sends a frame using a randomly selected sender.
    ///
    /// Behavior:
    /// - Up to 3 attempts
    /// - Short pause between attempts
    async fn send(&self, frame: Value) -> Result<()> {
        for _ in 0..3 {
            let idx = random_range(0..self.senders.len());
            if self.senders[idx].send(frame.clone()).is_ok() {
                return Ok(());
            }
            sleep(Duration::from_millis(100)).await;
        }

        Err(anyhow::anyhow!("All master connections closed"))
    }
}

/// Wire frame of one event.
fn frame(msg: &EventMessage) -> Value {
    json!({
        "op": "event",
        "id": msg.id,
        "type": msg.kind,
        "value": msg.value,
    })
}

#[async_trait::async_trait]
impl Publisher for MasterPool {
    async fn publish(&self, messages: &[EventMessage]) {
        for msg in messages {
            if let Err(e) = self.send(frame(msg)).await {
                error!("Failed to publish {}: {}", msg.id, e);
            }
        }
    }

    async fn shutdown(&self) {
        let _ = self.shutdown.send(true);

        let tasks: Vec<JoinHandle<()>> = self.tasks.lock().await.drain(..).collect();
        for task in tasks {
            match timeout(SHUTDOWN_GRACE, task).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!("Master sender task failed: {}", e),
                Err(_) => warn!("Master sender did not stop within {:?}", SHUTDOWN_GRACE),
            }
        }
        info!("Master pool closed");
    }
}
