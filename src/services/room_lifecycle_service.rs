use std::sync::Arc;
use tracing::{info, warn};

use super::{MembershipRegistry, ReplayLog};
use crate::models::SeedData;
use crate::store::StoreError;

/// Tears down a room's stored state once nobody is left in it.
///
/// This is best-effort garbage collection, not a transaction: a join that
/// races a collapse simply recreates the room, reseeding from the defaults.
#[derive(Clone)]
pub struct RoomLifecycle {
    membership: MembershipRegistry,
    replay_log: ReplayLog,
    seed: Arc<SeedData>,
}

impl RoomLifecycle {
    pub fn new(membership: MembershipRegistry, replay_log: ReplayLog, seed: Arc<SeedData>) -> Self {
        Self { membership, replay_log, seed }
    }

    /// Clear every log of the room and its membership container if the room is empty.
    ///
    /// Returns whether the room was collapsed. A failure to read the key
    /// index or clear a log does not stop the membership container from being
    /// removed; the first failure is returned once every step was attempted.
    pub async fn collapse_if_empty(&self, room_id: &str) -> Result<bool, StoreError> {
        if !self.membership.is_empty(room_id).await? {
            return Ok(false);
        }
        let mut first_error = None;
        let indexed = match self.replay_log.indexed_keys(room_id).await {
            Ok(indexed) => indexed,
            Err(e) => {
                warn!("Failed to read key index of room {}, clearing seeded logs only: {}", room_id, e);
                first_error.get_or_insert(e);
                Vec::new()
            }
        };
        let keys = self.seed.tracked_keys(indexed);
        if let Err(e) = self.replay_log.clear_room(room_id, &keys).await {
            first_error.get_or_insert(e);
        }
        if let Err(e) = self.membership.remove_room(room_id).await {
            warn!("Failed to remove membership of room {}: {}", room_id, e);
            first_error.get_or_insert(e);
        }
        if let Some(e) = first_error {
            return Err(e);
        }
        info!("Room {} is empty, cleared {} logs", room_id, keys.len());
        Ok(true)
    }
}
