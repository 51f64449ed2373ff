use async_trait::async_trait;
use futures_util::StreamExt;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, Script};
use tracing::{debug, info};

use super::{Store, StoreError, Subscription};

/// Writes ARGV to the list at KEYS[1] only if it does not exist yet.
/// Redis runs the script atomically, so the existence check and the
/// bulk push cannot interleave with another seeding attempt.
/// Values are pushed in slices of 1000 to stay under Lua's `unpack` limit.
const PUSH_IF_ABSENT_SCRIPT: &str = r#"
if redis.call('EXISTS', KEYS[1]) == 1 then
    return 0
end
for i = 1, #ARGV, 1000 do
    redis.call('RPUSH', KEYS[1], unpack(ARGV, i, math.min(i + 999, #ARGV)))
end
return 1
"#;

/// Redis-backed store.
///
/// Commands share one auto-reconnecting `ConnectionManager`; every
/// subscription opens its own pub/sub connection that lives as long as
/// the returned stream.
pub struct RedisStore {
    client: Client,
    conn: ConnectionManager,
    push_if_absent: Script,
}

impl RedisStore {
    pub async fn connect(redis_url: &str) -> Result<Self, StoreError> {
        let client = Client::open(redis_url)?;
        let conn = ConnectionManager::new(client.clone()).await?;
        info!("Connected to Redis at {}", redis_url);
        Ok(Self {
            client,
            conn,
            push_if_absent: Script::new(PUSH_IF_ABSENT_SCRIPT),
        })
    }
}

#[async_trait]
impl Store for RedisStore {
    async fn set_add(&self, key: &str, member: &str) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let _: i64 = conn.sadd(key, member).await?;
        Ok(())
    }

    async fn set_remove(&self, key: &str, member: &str) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let _: i64 = conn.srem(key, member).await?;
        Ok(())
    }

    async fn set_members(&self, key: &str) -> Result<Vec<String>, StoreError> {
        let mut conn = self.conn.clone();
        Ok(conn.smembers(key).await?)
    }

    async fn set_len(&self, key: &str) -> Result<usize, StoreError> {
        let mut conn = self.conn.clone();
        Ok(conn.scard(key).await?)
    }

    async fn list_push(&self, key: &str, value: &str) -> Result<usize, StoreError> {
        let mut conn = self.conn.clone();
        Ok(conn.rpush(key, value).await?)
    }

    async fn list_push_if_absent(&self, key: &str, values: &[String]) -> Result<bool, StoreError> {
        if values.is_empty() {
            return Ok(false);
        }
        let mut conn = self.conn.clone();
        let mut invocation = self.push_if_absent.prepare_invoke();
        invocation.key(key);
        for value in values {
            invocation.arg(value);
        }
        let written: i64 = invocation.invoke_async(&mut conn).await?;
        debug!("Conditional push to {} wrote={}", key, written == 1);
        Ok(written == 1)
    }

    async fn list_range_all(&self, key: &str) -> Result<Vec<String>, StoreError> {
        let mut conn = self.conn.clone();
        Ok(conn.lrange(key, 0, -1).await?)
    }

    async fn delete(&self, keys: &[String]) -> Result<(), StoreError> {
        if keys.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn.clone();
        let _: i64 = conn.del(keys).await?;
        Ok(())
    }

    async fn publish(&self, channel: &str, payload: &[u8]) -> Result<usize, StoreError> {
        let mut conn = self.conn.clone();
        Ok(conn.publish(channel, payload).await?)
    }

    async fn subscribe(&self, channel: &str) -> Result<Subscription, StoreError> {
        let mut pubsub = self.client.get_async_pubsub().await?;
        pubsub.subscribe(channel).await?;
        debug!("Subscribed to Redis channel {}", channel);
        let messages = pubsub
            .into_on_message()
            .map(|msg| msg.get_payload_bytes().to_vec());
        Ok(Box::pin(messages))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}
