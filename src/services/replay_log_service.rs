use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::SyncError;
use crate::models::LogEntry;
use crate::store::{KeySpace, Store, StoreError};

/// Per-room, per-key append-only history of edits.
///
/// Entries are stored as JSON in a store list and replayed in list order.
/// Every key that gets a log is also recorded in the room's key index so
/// that cleanup can find it.
#[derive(Clone)]
pub struct ReplayLog {
    store: Arc<dyn Store>,
    keys: KeySpace,
}

impl ReplayLog {
    pub fn new(store: Arc<dyn Store>, keys: KeySpace) -> Self {
        Self { store, keys }
    }

    /// Write `seed` to the log only if the log does not exist yet.
    ///
    /// Concurrent callers race on a single conditional write in the store:
    /// exactly one of them seeds, the others see the existing log and skip.
    /// Returns `true` for the caller that seeded.
    pub async fn ensure_seeded(&self, room_id: &str, key: &str, seed: &[LogEntry]) -> Result<bool, SyncError> {
        check_segments(room_id, key)?;
        if seed.is_empty() {
            return Ok(false);
        }
        let values = seed
            .iter()
            .map(serde_json::to_string)
            .collect::<Result<Vec<_>, _>>()?;

        let seeded = self
            .store
            .list_push_if_absent(&self.keys.log(room_id, key), &values)
            .await?;
        if seeded {
            self.store.set_add(&self.keys.key_index(room_id), key).await?;
            info!("Seeded log {} in room {} with {} entries", key, room_id, values.len());
        } else {
            debug!("Log {} in room {} already present, seeding skipped", key, room_id);
        }
        Ok(seeded)
    }

    /// Push one entry to the tail of the log, returning the new length.
    pub async fn append(&self, room_id: &str, key: &str, entry: &LogEntry) -> Result<usize, SyncError> {
        check_segments(room_id, key)?;
        let value = serde_json::to_string(entry)?;
        self.store.set_add(&self.keys.key_index(room_id), key).await?;
        let len = self.store.list_push(&self.keys.log(room_id, key), &value).await?;
        Ok(len)
    }

    /// Every entry of the log, oldest first. Undecodable entries are skipped.
    pub async fn read_all(&self, room_id: &str, key: &str) -> Result<Vec<LogEntry>, StoreError> {
        let values = self.store.list_range_all(&self.keys.log(room_id, key)).await?;
        let entries = values
            .iter()
            .filter_map(|value| match serde_json::from_str::<LogEntry>(value) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!("Skipping undecodable entry in log {} of room {}: {}", key, room_id, e);
                    None
                }
            })
            .collect();
        Ok(entries)
    }

    pub async fn clear(&self, room_id: &str, key: &str) -> Result<(), StoreError> {
        self.store.delete(&[self.keys.log(room_id, key)]).await
    }

    /// Keys that have a log under the room, sorted
    pub async fn indexed_keys(&self, room_id: &str) -> Result<Vec<String>, StoreError> {
        let mut keys = self.store.set_members(&self.keys.key_index(room_id)).await?;
        keys.sort();
        Ok(keys)
    }

    /// Clear the logs of `keys` and the room's key index.
    ///
    /// Every delete is attempted; the first failure is returned afterwards.
    pub(crate) async fn clear_room(&self, room_id: &str, keys: &[String]) -> Result<(), StoreError> {
        let mut first_error = None;
        for key in keys {
            if let Err(e) = self.clear(room_id, key).await {
                warn!("Failed to clear log {} of room {}: {}", key, room_id, e);
                first_error.get_or_insert(e);
            }
        }
        if let Err(e) = self.store.delete(&[self.keys.key_index(room_id)]).await {
            warn!("Failed to clear key index of room {}: {}", room_id, e);
            first_error.get_or_insert(e);
        }
        first_error.map_or(Ok(()), Err)
    }
}

fn check_segments(room_id: &str, key: &str) -> Result<(), SyncError> {
    if !KeySpace::is_valid_segment(room_id) {
        return Err(SyncError::InvalidInput(format!("invalid room id '{}'", room_id)));
    }
    if !KeySpace::is_valid_segment(key) {
        return Err(SyncError::InvalidInput(format!("invalid log key '{}'", key)));
    }
    Ok(())
}
