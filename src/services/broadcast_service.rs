use std::sync::Arc;
use tracing::debug;

use crate::store::{KeySpace, Store, StoreError, Subscription};

/// Per-room pub/sub topic carrying raw edit frames.
///
/// Delivery is at-most-once and reaches every current subscriber,
/// including the connection that published.
#[derive(Clone)]
pub struct BroadcastChannel {
    store: Arc<dyn Store>,
    keys: KeySpace,
}

impl BroadcastChannel {
    pub fn new(store: Arc<dyn Store>, keys: KeySpace) -> Self {
        Self { store, keys }
    }

    pub async fn publish(&self, room_id: &str, raw: &[u8]) -> Result<usize, StoreError> {
        let receivers = self.store.publish(&self.keys.topic(room_id), raw).await?;
        debug!("Published {} bytes to room {} ({} receivers)", raw.len(), room_id, receivers);
        Ok(receivers)
    }

    pub async fn subscribe(&self, room_id: &str) -> Result<Subscription, StoreError> {
        self.store.subscribe(&self.keys.topic(room_id)).await
    }
}
