//! In-memory ephemeral stores.
//!
//! `DashMap::remove` is atomic per key, which gives the lookup-then-delete
//! guarantee single-use records need.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;

use super::{
    AuthorizationCode, CodeStore, Expiring, McpSession, PkceChallenge, PkceStore, SessionStore,
    StoreError,
};

/// In-memory expiring map keyed by the record's natural key.
pub struct MemoryStore<V> {
    entries: DashMap<String, V>,
}

impl<V: Expiring + Clone> MemoryStore<V> {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    fn put(&self, key: String, value: V) {
        self.entries.insert(key, value);
    }

    /// Remove and return a live entry. Expired entries are removed too.
    fn take(&self, key: &str, now: DateTime<Utc>) -> Option<V> {
        let (_, value) = self.entries.remove(key)?;
        if value.is_expired(now) {
            return None;
        }
        Some(value)
    }

    fn get(&self, key: &str, now: DateTime<Utc>) -> Option<V> {
        self.entries
            .get(key)
            .filter(|v| !v.is_expired(now))
            .map(|v| v.clone())
    }

    /// Evict expired entries.
    fn cleanup(&self, now: DateTime<Utc>) -> u64 {
        let mut removed = 0;
        self.entries.retain(|_, v| {
            let live = !v.is_expired(now);
            if !live {
                removed += 1;
            }
            live
        });
        removed
    }
}

impl<V: Expiring + Clone> Default for MemoryStore<V> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PkceStore for MemoryStore<PkceChallenge> {
    async fn store(&self, challenge: PkceChallenge) -> Result<(), StoreError> {
        self.put(challenge.state.clone(), challenge);
        Ok(())
    }

    async fn take(
        &self,
        state: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<PkceChallenge>, StoreError> {
        Ok(MemoryStore::take(self, state, now))
    }

    async fn sweep(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        Ok(self.cleanup(now))
    }
}

#[async_trait]
impl CodeStore for MemoryStore<AuthorizationCode> {
    async fn insert(&self, code: AuthorizationCode) -> Result<(), StoreError> {
        self.put(code.code.clone(), code);
        Ok(())
    }

    async fn take(
        &self,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<AuthorizationCode>, StoreError> {
        Ok(MemoryStore::take(self, code, now))
    }

    async fn sweep(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        Ok(self.cleanup(now))
    }
}

#[async_trait]
impl SessionStore for MemoryStore<McpSession> {
    async fn insert(&self, session: McpSession) -> Result<(), StoreError> {
        self.put(session.session_id.clone(), session);
        Ok(())
    }

    async fn get(
        &self,
        session_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<McpSession>, StoreError> {
        Ok(MemoryStore::get(self, session_id, now))
    }

    async fn sweep(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        Ok(self.cleanup(now))
    }
}
