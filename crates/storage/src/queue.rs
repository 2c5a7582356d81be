//! Delayed work queue of ingestion requests.
//!
//! Redis stores the queue as a sorted set scored by the time (Unix
//! milliseconds) at which an item becomes ready.

use async_trait::async_trait;
use chrono::Utc;
use redis::{aio::MultiplexedConnection, Client};
use std::time::Duration;
use tracing::debug;

use wx_common::{IngestRequest, WxError, WxResult};

pub const DEFAULT_QUEUE_KEY: &str = "wx:ingest";

#[async_trait]
pub trait IngestQueue: Send + Sync {
    /// Enqueue `item`, ready after `delay`.
    async fn put(&self, item: &IngestRequest, delay: Duration) -> WxResult<()>;

    /// Take the earliest ready item; `None` when nothing is ready.
    async fn pop(&self) -> WxResult<Option<IngestRequest>>;
}

pub struct RedisQueue {
    conn: MultiplexedConnection,
    key: String,
}

impl RedisQueue {
    pub async fn connect(redis_url: &str, key: impl Into<String>) -> WxResult<Self> {
        let client = Client::open(redis_url)
            .map_err(|e| WxError::QueueError(format!("Redis connection failed: {}", e)))?;

        let conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| WxError::QueueError(format!("Redis connection failed: {}", e)))?;

        Ok(Self {
            conn,
            key: key.into(),
        })
    }

    pub async fn len(&self) -> WxResult<usize> {
        let mut conn = self.conn.clone();
        let len: usize = redis::cmd("ZCARD")
            .arg(&self.key)
            .query_async(&mut conn)
            .await
            .map_err(|e| WxError::QueueError(format!("ZCARD failed: {}", e)))?;
        Ok(len)
    }
}

#[async_trait]
impl IngestQueue for RedisQueue {
    async fn put(&self, item: &IngestRequest, delay: Duration) -> WxResult<()> {
        let payload = serde_json::to_string(item)?;
        let ready_at = ready_at_millis(Utc::now().timestamp_millis(), delay);

        let mut conn = self.conn.clone();
        let _: i64 = redis::cmd("ZADD")
            .arg(&self.key)
            .arg(ready_at)
            .arg(&payload)
            .query_async(&mut conn)
            .await
            .map_err(|e| WxError::QueueError(format!("Enqueue failed: {}", e)))?;

        debug!(url = %item.url, ready_at, "Queued ingest request");
        Ok(())
    }

    async fn pop(&self) -> WxResult<Option<IngestRequest>> {
        let mut conn = self.conn.clone();
        loop {
            let now = Utc::now().timestamp_millis();
            let ready: Vec<String> = redis::cmd("ZRANGEBYSCORE")
                .arg(&self.key)
                .arg("-inf")
                .arg(now)
                .arg("LIMIT")
                .arg(0)
                .arg(1)
                .query_async(&mut conn)
                .await
                .map_err(|e| WxError::QueueError(format!("Read failed: {}", e)))?;

            let Some(payload) = ready.into_iter().next() else {
                return Ok(None);
            };

            // Another consumer may have claimed it between the two calls
            let removed: i64 = redis::cmd("ZREM")
                .arg(&self.key)
                .arg(&payload)
                .query_async(&mut conn)
                .await
                .map_err(|e| WxError::QueueError(format!("Claim failed: {}", e)))?;
            if removed == 0 {
                continue;
            }

            let item: IngestRequest = serde_json::from_str(&payload)?;
            return Ok(Some(item));
        }
    }
}

fn ready_at_millis(now_millis: i64, delay: Duration) -> i64 {
    now_millis.saturating_add(i64::try_from(delay.as_millis()).unwrap_or(i64::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ready_at() {
        assert_eq!(ready_at_millis(1_000, Duration::from_secs(300)), 301_000);
        assert_eq!(ready_at_millis(1_000, Duration::ZERO), 1_000);
        assert_eq!(ready_at_millis(1, Duration::MAX), i64::MAX);
    }
}
