//! Order audit log.
//!
//! Each successfully created order is written once, keyed by order id.
//! Records are never read back by the gateway. Connects and writes are
//! time-bounded; failures are logged and dropped.

use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands, RedisResult};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::types::OrderAuditRecord;

/// Destination for order audit records.
#[async_trait]
pub trait OrderAuditSink: Send + Sync {
    /// Persist `record`. Never fails; errors are logged by the sink.
    async fn put(&self, record: &OrderAuditRecord);
}

/// Sink used when no audit store is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledAuditSink;

#[async_trait]
impl OrderAuditSink for DisabledAuditSink {
    async fn put(&self, record: &OrderAuditRecord) {
        debug!("Audit disabled, skipping order {}", record.order_id);
    }
}

/// Bound on connecting to Redis and on each audit write.
pub const REDIS_TIMEOUT: Duration = Duration::from_secs(5);

/// Redis-backed audit store. Each record is a JSON string under
/// `{table}:{order_id}`.
#[derive(Clone)]
pub struct RedisAuditStore {
    conn: Arc<RwLock<Option<ConnectionManager>>>,
    table: String,
    timeout: Duration,
}

impl RedisAuditStore {
    /// Connect to Redis at `redis_url`. A failed or stalled connection
    /// leaves the store running without persistence.
    pub async fn new(redis_url: &str, table: impl Into<String>) -> Self {
        Self::with_timeout(redis_url, table, REDIS_TIMEOUT).await
    }

    /// Like [`RedisAuditStore::new`] with a custom bound on the connect and
    /// on every write.
    pub async fn with_timeout(
        redis_url: &str,
        table: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        let conn = match tokio::time::timeout(timeout, Self::connect(redis_url)).await {
            Ok(Ok(c)) => {
                info!("Connected to Redis audit store at {}", redis_url);
                Some(c)
            }
            Ok(Err(e)) => {
                warn!(
                    "Failed to connect to Redis: {}. Order audit records will be dropped.",
                    e
                );
                None
            }
            Err(_) => {
                warn!(
                    "Redis at {} did not answer within {:?}. Order audit records will be dropped.",
                    redis_url, timeout
                );
                None
            }
        };

        Self {
            conn: Arc::new(RwLock::new(conn)),
            table: table.into(),
            timeout,
        }
    }

    async fn connect(redis_url: &str) -> RedisResult<ConnectionManager> {
        let client = redis::Client::open(redis_url)?;
        ConnectionManager::new(client).await
    }

    pub async fn is_connected(&self) -> bool {
        self.conn.read().await.is_some()
    }

    pub fn key(&self, order_id: &str) -> String {
        audit_key(&self.table, order_id)
    }
}

#[async_trait]
impl OrderAuditSink for RedisAuditStore {
    async fn put(&self, record: &OrderAuditRecord) {
        let Some(mut conn) = self.conn.read().await.clone() else {
            warn!("Audit store unavailable, dropping order {}", record.order_id);
            return;
        };

        let value = match serde_json::to_string(record) {
            Ok(v) => v,
            Err(e) => {
                error!("Failed to serialize audit record {}: {}", record.order_id, e);
                return;
            }
        };

        let key = self.key(&record.order_id);
        match tokio::time::timeout(self.timeout, conn.set::<_, _, ()>(&key, value)).await {
            Ok(Ok(())) => debug!("Stored audit record {}", key),
            Ok(Err(e)) => error!("Failed to store audit record {}: {}", key, e),
            Err(_) => error!(
                "Timed out storing audit record {} after {:?}",
                key, self.timeout
            ),
        }
    }
}

/// Redis key for an order's audit record.
pub fn audit_key(table: &str, order_id: &str) -> String {
    format!("{}:{}", table, order_id)
}
