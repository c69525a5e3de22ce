//! Redis Session Store
//!
//! `SessionStore` backed by a remote keyed store with native per-key
//! expiry. Every write refreshes a fixed TTL; the defensive `cleanup`
//! sweep additionally removes entries whose application-level
//! `last_activity` has gone stale, because the native TTL measures
//! "stored since", not "used since".

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;

use agent_core::error::{AgentError, Result};
use agent_core::session::{SessionEntry, SessionStore};

const KEY_PREFIX: &str = "agent:session:";

/// Default native TTL applied on every write (30 minutes)
pub const DEFAULT_TTL: Duration = Duration::from_secs(30 * 60);

/// Session store fronted by Redis
pub struct RedisSessionStore {
    conn: ConnectionManager,
    ttl: Duration,
}

impl RedisSessionStore {
    /// Connect to the given Redis URL with the default TTL
    pub async fn connect(url: &str) -> Result<Self> {
        Self::connect_with_ttl(url, DEFAULT_TTL).await
    }

    /// Connect with an explicit native TTL
    pub async fn connect_with_ttl(url: &str, ttl: Duration) -> Result<Self> {
        let client = redis::Client::open(url)
            .map_err(|e| AgentError::Config(format!("invalid Redis URL: {}", e)))?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(|e| AgentError::Session(format!("Redis connection failed: {}", e)))?;

        Ok(Self { conn, ttl })
    }

    fn key(id: &str) -> String {
        format!("{}{}", KEY_PREFIX, id)
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn get(&self, id: &str) -> Result<Option<SessionEntry>> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn
            .get(Self::key(id))
            .await
            .map_err(|e| AgentError::Session(format!("Redis GET failed: {}", e)))?;

        match raw {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn set(&self, id: &str, entry: SessionEntry) -> Result<()> {
        let json = serde_json::to_string(&entry)?;
        let mut conn = self.conn.clone();
        let _: () = conn
            .set_ex(Self::key(id), json, self.ttl.as_secs())
            .await
            .map_err(|e| AgentError::Session(format!("Redis SET failed: {}", e)))?;
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn
            .del(Self::key(id))
            .await
            .map_err(|e| AgentError::Session(format!("Redis DEL failed: {}", e)))?;
        Ok(())
    }

    async fn cleanup(&self, max_age: Duration) -> Result<usize> {
        let pattern = format!("{}*", KEY_PREFIX);
        let keys: Vec<String> = {
            let mut scan_conn = self.conn.clone();
            let mut iter = scan_conn
                .scan_match::<_, String>(pattern)
                .await
                .map_err(|e| AgentError::Session(format!("Redis SCAN failed: {}", e)))?;

            let mut keys = Vec::new();
            while let Some(key) = iter.next_item().await {
                keys.push(key);
            }
            keys
        };

        let now = Utc::now();
        let mut conn = self.conn.clone();
        let mut evicted = 0usize;

        for key in keys {
            let raw: Option<String> = conn
                .get(&key)
                .await
                .map_err(|e| AgentError::Session(format!("Redis GET failed: {}", e)))?;

            // The backend may have expired the key between SCAN and GET;
            // an already-expired key is absent, not an error.
            let Some(json) = raw else { continue };

            let stale = match serde_json::from_str::<SessionEntry>(&json) {
                Ok(entry) => entry.is_stale(max_age, now),
                // An undecodable entry is dead weight either way
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "evicting undecodable session entry");
                    true
                }
            };

            if stale {
                let _: () = conn
                    .del(&key)
                    .await
                    .map_err(|e| AgentError::Session(format!("Redis DEL failed: {}", e)))?;
                evicted += 1;
            }
        }

        Ok(evicted)
    }
}
