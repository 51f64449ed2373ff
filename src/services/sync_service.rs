use tracing::debug;

use crate::error::SyncError;
use crate::models::BroadcastMessage;
use crate::state::AppState;

/// Build the replay batch sent to a client right after it joins.
///
/// Each tracked key is seeded if its log is absent, then read in full.
/// Every message carries the membership list as of this call.
pub async fn initial_batch(state: &AppState, room_id: &str) -> Result<Vec<BroadcastMessage>, SyncError> {
    let indexed = state.replay_log.indexed_keys(room_id).await?;
    let keys = state.seed.tracked_keys(indexed);

    let mut logs = Vec::with_capacity(keys.len());
    for key in keys {
        if let Some(seed) = state.seed.entries(&key) {
            state.replay_log.ensure_seeded(room_id, &key, seed).await?;
        }
        let entries = state.replay_log.read_all(room_id, &key).await?;
        logs.push((key, entries));
    }

    let user_ids = state.membership.list(room_id).await?;
    let batch: Vec<BroadcastMessage> = logs
        .into_iter()
        .flat_map(|(key, entries)| {
            let user_ids = user_ids.clone();
            entries
                .into_iter()
                .map(move |entry| BroadcastMessage::from_log_entry(&key, entry, room_id, user_ids.clone()))
        })
        .collect();

    debug!("Initial batch for room {} has {} messages", room_id, batch.len());
    Ok(batch)
}
