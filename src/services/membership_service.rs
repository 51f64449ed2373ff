use std::sync::Arc;
use tracing::debug;

use crate::store::{KeySpace, Store, StoreError};

/// Per-room set of participants, kept entirely in the external store.
///
/// Join and leave are single set commands, so they are idempotent and
/// atomic on the store side. Failures are returned as-is, never retried.
#[derive(Clone)]
pub struct MembershipRegistry {
    store: Arc<dyn Store>,
    keys: KeySpace,
}

impl MembershipRegistry {
    pub fn new(store: Arc<dyn Store>, keys: KeySpace) -> Self {
        Self { store, keys }
    }

    pub async fn join(&self, room_id: &str, user_id: &str) -> Result<(), StoreError> {
        debug!("User {} joining room {}", user_id, room_id);
        self.store.set_add(&self.keys.membership(room_id), user_id).await
    }

    pub async fn leave(&self, room_id: &str, user_id: &str) -> Result<(), StoreError> {
        debug!("User {} leaving room {}", user_id, room_id);
        self.store.set_remove(&self.keys.membership(room_id), user_id).await
    }

    /// Current members, sorted
    pub async fn list(&self, room_id: &str) -> Result<Vec<String>, StoreError> {
        let mut members = self.store.set_members(&self.keys.membership(room_id)).await?;
        members.sort();
        Ok(members)
    }

    pub async fn is_empty(&self, room_id: &str) -> Result<bool, StoreError> {
        Ok(self.store.set_len(&self.keys.membership(room_id)).await? == 0)
    }

    /// Drop the membership container itself
    pub(crate) async fn remove_room(&self, room_id: &str) -> Result<(), StoreError> {
        self.store.delete(&[self.keys.membership(room_id)]).await
    }
}
