//! Match persistence.
//!
//! Session actors hand finished-match records to a persister task over an
//! unbounded channel and move on; the tick loop never waits for storage.

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use skyduel_protocol::MatchRecord;
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

use crate::PersistError;

/// Where finished matches go (a leaderboard service, a database).
pub trait MatchStore: Send + Sync + 'static {
    fn save(&self, record: MatchRecord) -> impl Future<Output = Result<(), PersistError>> + Send;
}

/// Keeps records in memory. Clones share the same list.
#[derive(Debug, Clone, Default)]
pub struct MemoryMatchStore {
    records: Arc<Mutex<Vec<MatchRecord>>>,
}

impl MemoryMatchStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<MatchRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl MatchStore for MemoryMatchStore {
    async fn save(&self, record: MatchRecord) -> Result<(), PersistError> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record);
        Ok(())
    }
}

/// Discards every record.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMatchStore;

impl MatchStore for NoopMatchStore {
    async fn save(&self, _record: MatchRecord) -> Result<(), PersistError> {
        Ok(())
    }
}

/// Spawns the persister task. It exits once every sender is dropped.
pub(crate) fn spawn_persister<M: MatchStore>(
    store: Arc<M>,
    retry_delay: Duration,
) -> mpsc::UnboundedSender<MatchRecord> {
    let (tx, mut rx) = mpsc::unbounded_channel::<MatchRecord>();
    tokio::spawn(async move {
        while let Some(record) = rx.recv().await {
            save_with_retry(store.as_ref(), record, retry_delay).await;
        }
        debug!("match persister stopped");
    });
    tx
}

/// Saves `record`, retrying once after `retry_delay`. Failures are logged
/// and the record is dropped.
pub(crate) async fn save_with_retry<M: MatchStore>(
    store: &M,
    record: MatchRecord,
    retry_delay: Duration,
) -> bool {
    let room_code = record.room_code.clone();
    let address = record.address.clone();
    match store.save(record.clone()).await {
        Ok(()) => {
            debug!(%room_code, %address, score = record.score, "match saved");
            return true;
        }
        Err(e) => warn!(%room_code, %address, error = %e, "match save failed, retrying"),
    }
    tokio::time::sleep(retry_delay).await;
    match store.save(record).await {
        Ok(()) => true,
        Err(e) => {
            error!(%room_code, %address, error = %e, "match save failed twice, dropping record");
            false
        }
    }
}
