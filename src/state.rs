use std::sync::Arc;

use crate::models::SeedData;
use crate::services::{BroadcastChannel, MembershipRegistry, ReplayLog, RoomLifecycle};
use crate::store::{KeySpace, Store};

/// Shared handles injected into every handler and session
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub membership: MembershipRegistry,
    pub replay_log: ReplayLog,
    pub broadcast: BroadcastChannel,
    pub lifecycle: RoomLifecycle,
    pub seed: Arc<SeedData>,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, keys: KeySpace, seed: SeedData) -> Self {
        let seed = Arc::new(seed);
        let membership = MembershipRegistry::new(store.clone(), keys.clone());
        let replay_log = ReplayLog::new(store.clone(), keys.clone());
        let broadcast = BroadcastChannel::new(store.clone(), keys);
        let lifecycle = RoomLifecycle::new(membership.clone(), replay_log.clone(), seed.clone());
        Self {
            store,
            membership,
            replay_log,
            broadcast,
            lifecycle,
            seed,
        }
    }

    #[cfg(test)]
    pub fn in_memory(seed: SeedData) -> Self {
        Self::new(Arc::new(crate::store::MemoryStore::new()), KeySpace::default(), seed)
    }
}
