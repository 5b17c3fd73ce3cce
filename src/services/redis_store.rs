use crate::services::store::{KvStore, StoreError, StoreResult};
use redis::{aio::ConnectionManager, AsyncCommands, RedisResult, Script};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Atomic compare-and-swap. ARGV: has_expected, expected, has_new, new, ttl_ms.
const CAS_SCRIPT: &str = r#"
local cur = redis.call('GET', KEYS[1])
if ARGV[1] == '1' then
  if cur ~= ARGV[2] then return 0 end
else
  if cur then return 0 end
end
if ARGV[3] == '1' then
  if tonumber(ARGV[5]) > 0 then
    redis.call('SET', KEYS[1], ARGV[4], 'PX', ARGV[5])
  else
    redis.call('SET', KEYS[1], ARGV[4])
  end
else
  redis.call('DEL', KEYS[1])
end
return 1
"#;

/// Redis-backed store.
#[derive(Clone)]
pub struct RedisStore {
    conn: Arc<RwLock<Option<ConnectionManager>>>,
    cas: Arc<Script>,
}

impl RedisStore {
    /// Create a new RedisStore, connecting to Redis at the given URL.
    pub async fn new(redis_url: &str) -> Self {
        let conn = match Self::connect(redis_url).await {
            Ok(c) => {
                info!("Connected to Redis at {}", redis_url);
                Some(c)
            }
            Err(e) => {
                warn!("Failed to connect to Redis: {}", e);
                None
            }
        };

        Self {
            conn: Arc::new(RwLock::new(conn)),
            cas: Arc::new(Script::new(CAS_SCRIPT)),
        }
    }

    async fn connect(redis_url: &str) -> RedisResult<ConnectionManager> {
        let client = redis::Client::open(redis_url)?;
        ConnectionManager::new(client).await
    }

    /// Check if Redis is connected.
    pub async fn is_connected(&self) -> bool {
        self.conn.read().await.is_some()
    }

    async fn conn(&self) -> StoreResult<ConnectionManager> {
        self.conn
            .read()
            .await
            .as_ref()
            .cloned()
            .ok_or(StoreError::Unavailable)
    }
}

fn ttl_ms(ttl: Option<Duration>) -> u64 {
    ttl.map(|t| t.as_millis().max(1) as u64).unwrap_or(0)
}

impl KvStore for RedisStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let mut conn = self.conn().await?;
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> StoreResult<()> {
        let mut conn = self.conn().await?;
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value);
        if ttl.is_some() {
            cmd.arg("PX").arg(ttl_ms(ttl));
        }
        cmd.query_async::<_, ()>(&mut conn).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        let mut conn = self.conn().await?;
        conn.del::<_, ()>(key).await?;
        Ok(())
    }

    async fn take(&self, key: &str) -> StoreResult<Option<String>> {
        let mut conn = self.conn().await?;
        let value: Option<String> = redis::cmd("GETDEL")
            .arg(key)
            .query_async(&mut conn)
            .await?;
        Ok(value)
    }

    async fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> StoreResult<bool> {
        let mut conn = self.conn().await?;
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value).arg("NX");
        if ttl.is_some() {
            cmd.arg("PX").arg(ttl_ms(ttl));
        }
        let reply: Option<String> = cmd.query_async(&mut conn).await?;
        Ok(reply.is_some())
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&str>,
        new: Option<&str>,
        ttl: Option<Duration>,
    ) -> StoreResult<bool> {
        let mut conn = self.conn().await?;
        let swapped: i32 = self
            .cas
            .key(key)
            .arg(if expected.is_some() { "1" } else { "0" })
            .arg(expected.unwrap_or(""))
            .arg(if new.is_some() { "1" } else { "0" })
            .arg(new.unwrap_or(""))
            .arg(ttl_ms(ttl))
            .invoke_async(&mut conn)
            .await?;
        Ok(swapped == 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ttl_ms() {
        assert_eq!(ttl_ms(None), 0);
        assert_eq!(ttl_ms(Some(Duration::from_secs(2))), 2_000);
        assert_eq!(ttl_ms(Some(Duration::from_micros(10))), 1);
    }

    #[tokio::test]
    async fn test_unreachable_redis_reports_unavailable() {
        let store = RedisStore::new("redis://127.0.0.1:1").await;
        assert!(!store.is_connected().await);
        assert!(matches!(store.get("k").await, Err(StoreError::Unavailable)));
    }
}
