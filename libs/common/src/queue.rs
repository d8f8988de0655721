//! Redis-backed work queue
//!
//! Producers append serialized jobs to a Redis list and return immediately;
//! delivery workers drain the list on their own schedule.

use anyhow::Result;
use redis::{AsyncCommands, Client};
use tracing::{debug, info};

/// Configuration for Redis connection
#[derive(Debug, Clone)]
pub struct RedisConfig {
    /// Redis connection URL (e.g., "redis://localhost:6379")
    pub url: String,
}

impl RedisConfig {
    /// Create a new RedisConfig from environment variables
    ///
    /// # Environment Variables
    /// - `REDIS_URL`: Redis connection URL (default: "redis://localhost:6379")
    pub fn from_env() -> Result<Self> {
        let url =
            std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string());

        Ok(RedisConfig { url })
    }
}

/// FIFO queue stored in Redis lists
#[derive(Clone)]
pub struct RedisQueue {
    client: Client,
}

impl RedisQueue {
    /// Initialize a new Redis queue client
    pub async fn new(config: &RedisConfig) -> Result<Self> {
        let client = Client::open(config.url.clone())?;
        info!("Redis queue client initialized with URL: {}", config.url);
        Ok(RedisQueue { client })
    }

    async fn get_connection(&self) -> Result<redis::aio::MultiplexedConnection> {
        let conn = self.client.get_multiplexed_async_connection().await?;
        Ok(conn)
    }

    /// Append a payload to the tail of `queue`, returning the new queue length
    pub async fn push(&self, queue: &str, payload: &str) -> Result<u64> {
        let mut conn = self.get_connection().await?;
        let len: u64 = conn.rpush(queue, payload).await?;
        debug!(queue, len, "Enqueued payload");
        Ok(len)
    }

    /// Remove and return the payload at the head of `queue`
    pub async fn pop(&self, queue: &str) -> Result<Option<String>> {
        let mut conn = self.get_connection().await?;
        let payload: Option<String> = conn.lpop(queue, None).await?;
        Ok(payload)
    }

    /// Number of payloads waiting in `queue`
    pub async fn len(&self, queue: &str) -> Result<u64> {
        let mut conn = self.get_connection().await?;
        let len: u64 = conn.llen(queue).await?;
        Ok(len)
    }

    /// Drop every payload waiting in `queue`
    pub async fn clear(&self, queue: &str) -> Result<()> {
        let mut conn = self.get_connection().await?;
        let _: u64 = conn.del(queue).await?;
        Ok(())
    }

    /// Check if Redis is reachable
    pub async fn health_check(&self) -> Result<bool> {
        let mut conn = self.get_connection().await?;
        let pong: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(pong == "PONG")
    }
}
