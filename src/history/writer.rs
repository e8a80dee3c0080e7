//! Single-owner access to the interaction log
//!
//! The store is a read-modify-write JSON file, so concurrent analyses must
//! not touch it directly. [`HistoryWriter::spawn`] moves the store onto one
//! blocking task and hands out cloneable [`HistoryHandle`]s that queue
//! commands to it.

use super::{InteractionStore, LogSummary, NewInteraction, StoreData};
use crate::{Error, Result};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

const QUEUE_DEPTH: usize = 64;

enum Command {
    Record {
        interaction: NewInteraction,
        reply: oneshot::Sender<Result<()>>,
    },
    Prune {
        days_threshold: i64,
        reply: oneshot::Sender<Result<bool>>,
    },
    Snapshot {
        reply: oneshot::Sender<StoreData>,
    },
}

pub struct HistoryWriter;

impl HistoryWriter {
    /// Start the owner task. It exits once every handle has been dropped.
    pub fn spawn(store: InteractionStore) -> (HistoryHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(QUEUE_DEPTH);
        let task = tokio::task::spawn_blocking(move || run(store, rx));
        (HistoryHandle { tx }, task)
    }
}

fn run(store: InteractionStore, mut rx: mpsc::Receiver<Command>) {
    debug!(path = %store.path().display(), "History writer started");

    while let Some(command) = rx.blocking_recv() {
        match command {
            Command::Record { interaction, reply } => {
                let _ = reply.send(store.record(&interaction));
            }
            Command::Prune {
                days_threshold,
                reply,
            } => {
                let mut data = store.load();
                let _ = reply.send(store.prune(&mut data, days_threshold));
            }
            Command::Snapshot { reply } => {
                let _ = reply.send(store.load());
            }
        }
    }

    debug!("History writer stopped");
}

#[derive(Clone)]
pub struct HistoryHandle {
    tx: mpsc::Sender<Command>,
}

impl HistoryHandle {
    pub async fn record(&self, interaction: NewInteraction) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Record { interaction, reply }).await?;
        rx.await.map_err(|_| stopped())?
    }

    pub async fn prune(&self, days_threshold: i64) -> Result<bool> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Prune {
            days_threshold,
            reply,
        })
        .await?;
        rx.await.map_err(|_| stopped())?
    }

    pub async fn snapshot(&self) -> Result<StoreData> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Snapshot { reply }).await?;
        rx.await.map_err(|_| stopped())
    }

    pub async fn summary(&self) -> Result<LogSummary> {
        Ok(self.snapshot().await?.summary())
    }

    async fn send(&self, command: Command) -> Result<()> {
        self.tx.send(command).await.map_err(|_| {
            warn!("History writer is gone; dropping command");
            stopped()
        })
    }
}

fn stopped() -> Error {
    Error::Invariant("history writer has stopped".to_string())
}
