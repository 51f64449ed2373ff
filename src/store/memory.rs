use async_trait::async_trait;
use futures_util::stream;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::{Store, StoreError, Subscription};

/// Capacity of each in-process topic. Subscribers that fall further behind skip messages.
const TOPIC_CAPACITY: usize = 256;

type Topics = Arc<StdMutex<HashMap<String, broadcast::Sender<Vec<u8>>>>>;

#[derive(Default)]
struct Collections {
    sets: HashMap<String, BTreeSet<String>>,
    lists: HashMap<String, Vec<String>>,
}

/// In-process store with the same contract as the Redis backend.
///
/// Used for single-node runs and tests. Empty sets and lists are removed so
/// that existence checks behave like Redis. A topic only exists while it has
/// subscribers.
#[derive(Default)]
pub struct MemoryStore {
    collections: Mutex<Collections>,
    topics: Topics,
}

/// Receiving end of a topic; unregisters the topic when its last subscriber goes away.
struct TopicReceiver {
    rx: broadcast::Receiver<Vec<u8>>,
    channel: String,
    topics: Topics,
}

impl Drop for TopicReceiver {
    fn drop(&mut self) {
        let Ok(mut topics) = self.topics.lock() else {
            return;
        };
        // `self.rx` is still alive here, so a count of one means it is the last receiver.
        if topics
            .get(&self.channel)
            .is_some_and(|tx| tx.receiver_count() <= 1)
        {
            topics.remove(&self.channel);
            debug!("Topic {} has no subscribers left, removed", self.channel);
        }
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_topics(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, broadcast::Sender<Vec<u8>>>>, StoreError> {
        self.topics
            .lock()
            .map_err(|e| StoreError::Backend(format!("topic registry poisoned: {}", e)))
    }

    #[cfg(test)]
    fn topic_count(&self) -> usize {
        self.topics.lock().map(|topics| topics.len()).unwrap_or_default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn set_add(&self, key: &str, member: &str) -> Result<(), StoreError> {
        let mut collections = self.collections.lock().await;
        collections
            .sets
            .entry(key.to_string())
            .or_default()
            .insert(member.to_string());
        Ok(())
    }

    async fn set_remove(&self, key: &str, member: &str) -> Result<(), StoreError> {
        let mut collections = self.collections.lock().await;
        if let Some(set) = collections.sets.get_mut(key) {
            set.remove(member);
            if set.is_empty() {
                collections.sets.remove(key);
            }
        }
        Ok(())
    }

    async fn set_members(&self, key: &str) -> Result<Vec<String>, StoreError> {
        let collections = self.collections.lock().await;
        Ok(collections
            .sets
            .get(key)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn set_len(&self, key: &str) -> Result<usize, StoreError> {
        let collections = self.collections.lock().await;
        Ok(collections.sets.get(key).map_or(0, BTreeSet::len))
    }

    async fn list_push(&self, key: &str, value: &str) -> Result<usize, StoreError> {
        let mut collections = self.collections.lock().await;
        let list = collections.lists.entry(key.to_string()).or_default();
        list.push(value.to_string());
        Ok(list.len())
    }

    async fn list_push_if_absent(&self, key: &str, values: &[String]) -> Result<bool, StoreError> {
        if values.is_empty() {
            return Ok(false);
        }
        // The check and the write happen under one lock acquisition.
        let mut collections = self.collections.lock().await;
        if collections.lists.contains_key(key) {
            return Ok(false);
        }
        collections.lists.insert(key.to_string(), values.to_vec());
        Ok(true)
    }

    async fn list_range_all(&self, key: &str) -> Result<Vec<String>, StoreError> {
        let collections = self.collections.lock().await;
        Ok(collections.lists.get(key).cloned().unwrap_or_default())
    }

    async fn delete(&self, keys: &[String]) -> Result<(), StoreError> {
        let mut collections = self.collections.lock().await;
        for key in keys {
            collections.sets.remove(key);
            collections.lists.remove(key);
        }
        Ok(())
    }

    async fn publish(&self, channel: &str, payload: &[u8]) -> Result<usize, StoreError> {
        let mut topics = self.lock_topics()?;
        let Some(sender) = topics.get(channel) else {
            debug!("No subscribers on topic {}", channel);
            return Ok(0);
        };
        match sender.send(payload.to_vec()) {
            Ok(receivers) => Ok(receivers),
            Err(_) => {
                topics.remove(channel);
                debug!("No subscribers on topic {}", channel);
                Ok(0)
            }
        }
    }

    async fn subscribe(&self, channel: &str) -> Result<Subscription, StoreError> {
        // Subscribing under the registry lock keeps it consistent with `TopicReceiver::drop`.
        let rx = self
            .lock_topics()?
            .entry(channel.to_string())
            .or_insert_with(|| broadcast::channel(TOPIC_CAPACITY).0)
            .subscribe();
        let receiver = TopicReceiver {
            rx,
            channel: channel.to_string(),
            topics: self.topics.clone(),
        };
        let messages = stream::unfold(receiver, |mut receiver| async move {
            loop {
                match receiver.rx.recv().await {
                    Ok(payload) => return Some((payload, receiver)),
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(
                            "Subscriber on topic {} lagged, {} messages dropped",
                            receiver.channel, skipped
                        );
                    }
                    Err(RecvError::Closed) => return None,
                }
            }
        });
        Ok(Box::pin(messages))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
