//! Write-behind persistence worker.
//!
//! Aggregation calls hand their fresh results to a single background worker
//! through a bounded channel and return immediately. Store failures are only
//! logged. A full queue drops the write. `shutdown` drains what is queued
//! and stops the worker.

use std::sync::Arc;

use log::{debug, warn};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use cryptofolio_market_data::{AssetDetail, GlobalSnapshot, HistoricalSeries, MarketItem};

use super::traits::MarketStore;
use crate::errors::Result;

/// Default capacity of the write queue.
pub const DEFAULT_PERSIST_CAPACITY: usize = 256;

/// One queued store write.
#[derive(Debug)]
pub enum PersistJob {
    Snapshot(Vec<MarketItem>),
    Detail(AssetDetail),
    History(HistoricalSeries),
    Global(GlobalSnapshot),
}

impl PersistJob {
    fn kind(&self) -> &'static str {
        match self {
            PersistJob::Snapshot(_) => "snapshot",
            PersistJob::Detail(_) => "detail",
            PersistJob::History(_) => "history",
            PersistJob::Global(_) => "global",
        }
    }
}

enum Command {
    Write(PersistJob),
    Flush(oneshot::Sender<()>),
    Shutdown(oneshot::Sender<()>),
}

/// Handle to the persistence worker.
///
/// The worker exits on `shutdown`, or once every handle is dropped and the
/// queue is drained.
#[derive(Clone)]
pub struct PersistQueue {
    tx: mpsc::Sender<Command>,
}

impl PersistQueue {
    /// Spawn the worker on the current tokio runtime.
    pub fn spawn(store: Arc<dyn MarketStore>, capacity: usize) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::channel::<Command>(capacity.max(1));

        let handle = tokio::spawn(async move {
            while let Some(command) = rx.recv().await {
                match command {
                    Command::Write(job) => {
                        let kind = job.kind();
                        if let Err(e) = apply(store.as_ref(), job).await {
                            warn!("Failed to persist {}: {}", kind, e);
                        }
                    }
                    Command::Flush(done) => {
                        let _ = done.send(());
                    }
                    Command::Shutdown(done) => {
                        rx.close();
                        let _ = done.send(());
                        break;
                    }
                }
            }
            debug!("Persistence worker stopped");
        });

        (Self { tx }, handle)
    }

    /// Queue a write without waiting. Returns `false` if it was dropped.
    pub fn enqueue(&self, job: PersistJob) -> bool {
        let kind = job.kind();
        match self.tx.try_send(Command::Write(job)) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("Persist queue full, dropping {} write", kind);
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!("Persist worker stopped, dropping {} write", kind);
                false
            }
        }
    }

    /// Wait until every write queued before this call has been applied.
    pub async fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.tx.send(Command::Flush(done_tx)).await.is_err() {
            return;
        }
        let _ = done_rx.await;
    }

    /// Apply every write queued before this call, then stop the worker.
    ///
    /// Later writes are dropped. Calling it again is a no-op.
    pub async fn shutdown(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.tx.send(Command::Shutdown(done_tx)).await.is_err() {
            return;
        }
        let _ = done_rx.await;
    }
}

async fn apply(store: &dyn MarketStore, job: PersistJob) -> Result<()> {
    match job {
        PersistJob::Snapshot(items) => {
            let written = store.save_snapshot(&items).await?;
            debug!("Persisted {} of {} snapshot rows", written, items.len());
        }
        PersistJob::Detail(detail) => {
            store.save_detail(&detail).await?;
        }
        PersistJob::History(series) => {
            store.save_history(&series).await?;
        }
        PersistJob::Global(global) => {
            store.save_global(&global).await?;
        }
    }
    Ok(())
}
