use async_trait::async_trait;
use std::sync::Mutex;

use super::{MemoryStore, Store, StoreError, Subscription};

/// `MemoryStore` wrapper that fails chosen calls.
///
/// A rule `(op, fragment)` fails every call of `op` whose store key contains
/// `fragment`; an empty fragment matches every key. All calls are recorded.
#[derive(Default)]
pub struct FailingStore {
    inner: MemoryStore,
    rules: Mutex<Vec<(&'static str, String)>>,
    calls: Mutex<Vec<(&'static str, String)>>,
}

impl FailingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail(&self, op: &'static str, fragment: &str) {
        self.rules.lock().unwrap().push((op, fragment.to_string()));
    }

    /// Operations called so far, in order
    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().iter().map(|(op, _)| *op).collect()
    }

    fn check(&self, op: &'static str, key: &str) -> Result<(), StoreError> {
        self.calls.lock().unwrap().push((op, key.to_string()));
        let failing = self
            .rules
            .lock()
            .unwrap()
            .iter()
            .any(|(rule_op, fragment)| *rule_op == op && key.contains(fragment.as_str()));
        if failing {
            Err(StoreError::Backend(format!("{} on {} failed", op, key)))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Store for FailingStore {
    async fn set_add(&self, key: &str, member: &str) -> Result<(), StoreError> {
        self.check("set_add", key)?;
        self.inner.set_add(key, member).await
    }

    async fn set_remove(&self, key: &str, member: &str) -> Result<(), StoreError> {
        self.check("set_remove", key)?;
        self.inner.set_remove(key, member).await
    }

    async fn set_members(&self, key: &str) -> Result<Vec<String>, StoreError> {
        self.check("set_members", key)?;
        self.inner.set_members(key).await
    }

    async fn set_len(&self, key: &str) -> Result<usize, StoreError> {
        self.check("set_len", key)?;
        self.inner.set_len(key).await
    }

    async fn list_push(&self, key: &str, value: &str) -> Result<usize, StoreError> {
        self.check("list_push", key)?;
        self.inner.list_push(key, value).await
    }

    async fn list_push_if_absent(&self, key: &str, values: &[String]) -> Result<bool, StoreError> {
        self.check("list_push_if_absent", key)?;
        self.inner.list_push_if_absent(key, values).await
    }

    async fn list_range_all(&self, key: &str) -> Result<Vec<String>, StoreError> {
        self.check("list_range_all", key)?;
        self.inner.list_range_all(key).await
    }

    async fn delete(&self, keys: &[String]) -> Result<(), StoreError> {
        // Deletes are checked key by key so a rule can fail part of a batch.
        for key in keys {
            self.check("delete", key)?;
        }
        self.inner.delete(keys).await
    }

    async fn publish(&self, channel: &str, payload: &[u8]) -> Result<usize, StoreError> {
        self.check("publish", channel)?;
        self.inner.publish(channel, payload).await
    }

    async fn subscribe(&self, channel: &str) -> Result<Subscription, StoreError> {
        self.check("subscribe", channel)?;
        self.inner.subscribe(channel).await
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.check("ping", "")?;
        self.inner.ping().await
    }
}
