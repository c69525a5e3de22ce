//! Session Management
//!
//! Conversation history keyed by an opaque session id, with explicit
//! TTL-based eviction. The store backend is injectable; the agent loop
//! only ever reads a snapshot and appends through the owning store.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::message::Message;

/// One session's conversation history
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionEntry {
    /// Ordered conversation so far
    pub messages: Vec<Message>,

    /// Last time this session served a request
    pub last_activity: DateTime<Utc>,
}

impl SessionEntry {
    pub fn new() -> Self {
        Self {
            messages: Vec::new(),
            last_activity: Utc::now(),
        }
    }

    /// Append a message and bump `last_activity`. Entries are only ever
    /// appended to, never edited in place.
    pub fn append(&mut self, message: Message) {
        self.messages.push(message);
        self.touch();
    }

    /// Update the activity timestamp
    pub fn touch(&mut self) {
        self.last_activity = Utc::now();
    }

    /// Whether the entry has been idle longer than `max_age`
    pub fn is_stale(&self, max_age: Duration, now: DateTime<Utc>) -> bool {
        let idle = now.signed_duration_since(self.last_activity);
        idle.num_milliseconds() >= 0 && idle.num_milliseconds() as u128 > max_age.as_millis()
    }
}

impl Default for SessionEntry {
    fn default() -> Self {
        Self::new()
    }
}

/// Session store trait for conversational memory backends
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Load a session by id
    async fn get(&self, id: &str) -> Result<Option<SessionEntry>>;

    /// Save a session
    async fn set(&self, id: &str, entry: SessionEntry) -> Result<()>;

    /// Delete a session
    async fn delete(&self, id: &str) -> Result<()>;

    /// Evict every entry whose `last_activity` is older than `max_age`.
    /// Returns the number of evicted entries.
    async fn cleanup(&self, max_age: Duration) -> Result<usize>;
}

/// In-memory session store (cleared only by `cleanup` or process exit)
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<String, SessionEntry>>,
}

impl Default for MemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get(&self, id: &str) -> Result<Option<SessionEntry>> {
        let sessions = self.sessions.read().unwrap();
        Ok(sessions.get(id).cloned())
    }

    async fn set(&self, id: &str, entry: SessionEntry) -> Result<()> {
        let mut sessions = self.sessions.write().unwrap();
        sessions.insert(id.to_string(), entry);
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let mut sessions = self.sessions.write().unwrap();
        sessions.remove(id);
        Ok(())
    }

    async fn cleanup(&self, max_age: Duration) -> Result<usize> {
        let now = Utc::now();
        let mut sessions = self.sessions.write().unwrap();
        let before = sessions.len();
        sessions.retain(|_, entry| !entry.is_stale(max_age, now));
        Ok(before - sessions.len())
    }
}

/// Spawn the periodic eviction sweep, decoupled from request lifetimes.
///
/// A request touching a session concurrently with a sweep is accepted
/// best-effort consistency; conversational memory is not
/// correctness-critical state.
pub fn spawn_cleanup_task(
    store: Arc<dyn SessionStore>,
    every: Duration,
    max_age: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match store.cleanup(max_age).await {
                Ok(0) => {}
                Ok(evicted) => tracing::debug!(evicted, "session sweep evicted stale entries"),
                Err(e) => tracing::warn!(error = %e, "session sweep failed"),
            }
        }
    })
}
