#[cfg(test)]
pub mod failing;
pub mod keys;
pub mod memory;
pub mod redis_store;

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use thiserror::Error;

pub use keys::KeySpace;
pub use memory::MemoryStore;
pub use redis_store::RedisStore;

/// Raw messages delivered to one subscriber of a pub/sub topic.
///
/// Starts at the moment of subscription and never replays history.
pub type Subscription = BoxStream<'static, Vec<u8>>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Store backend error: {0}")]
    Backend(String),
}

/// The external key/value + publish/subscribe service.
///
/// Sets back room membership, lists back the replay logs and topics carry
/// the live edits. Nothing is cached locally: every call is a round trip.
#[async_trait]
pub trait Store: Send + Sync {
    /// Add `member` to the set at `key`. Adding an existing member is a no-op.
    async fn set_add(&self, key: &str, member: &str) -> Result<(), StoreError>;

    /// Remove `member` from the set at `key`. Removing a non-member is a no-op.
    async fn set_remove(&self, key: &str, member: &str) -> Result<(), StoreError>;

    async fn set_members(&self, key: &str) -> Result<Vec<String>, StoreError>;

    async fn set_len(&self, key: &str) -> Result<usize, StoreError>;

    /// Append `value` to the tail of the list at `key`, returning the new length.
    async fn list_push(&self, key: &str, value: &str) -> Result<usize, StoreError>;

    /// Atomically write `values` to the list at `key` only if the list does not exist.
    ///
    /// Returns `true` when this call performed the write.
    async fn list_push_if_absent(&self, key: &str, values: &[String]) -> Result<bool, StoreError>;

    async fn list_range_all(&self, key: &str) -> Result<Vec<String>, StoreError>;

    async fn delete(&self, keys: &[String]) -> Result<(), StoreError>;

    /// Publish to a topic, returning how many subscribers received it.
    async fn publish(&self, channel: &str, payload: &[u8]) -> Result<usize, StoreError>;

    async fn subscribe(&self, channel: &str) -> Result<Subscription, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;
}
