//! Continuation-token correlation across turns.
//!
//! Gemini attaches an opaque `thoughtSignature` to some function-call parts and
//! rejects a replayed conversation whose calls lack it. Clients never see the
//! token: it is stored here keyed by the tool-call id we hand out, and attached
//! again when that call comes back in a later request.
//!
//! The store is best-effort. When it is unreachable, single-turn tool calling is
//! unaffected; only multi-turn replay may be rejected by the backend.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mini_moka::sync::Cache;
use serde::{Deserialize, Serialize};

use crate::error::Result;

pub const DEFAULT_TTL_SECS: u64 = 3600;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureRecord {
    pub call_id: String,
    pub signature: Vec<u8>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl SignatureRecord {
    pub fn new(call_id: impl Into<String>, signature: Vec<u8>, ttl_secs: u64) -> Self {
        let created_at = Utc::now();
        let ttl = chrono::Duration::seconds(i64::try_from(ttl_secs).unwrap_or(i64::MAX / 1000));
        Self {
            call_id: call_id.into(),
            signature,
            created_at,
            expires_at: created_at + ttl,
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}

/// A token produced by a backend response, waiting to be persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedSignature {
    pub call_id: String,
    pub signature: Vec<u8>,
}

/// Key-value store holding signature records with expiry.
#[async_trait]
pub trait SignatureStore: Send + Sync {
    /// Insert or overwrite the record for `record.call_id`.
    async fn put(&self, record: SignatureRecord) -> Result<()>;

    /// The live record for `call_id`, if any.
    async fn get(&self, call_id: &str) -> Result<Option<SignatureRecord>>;
}

/// In-process store backed by a TTL cache.
pub struct MemorySignatureStore {
    cache: Cache<String, SignatureRecord>,
}

impl MemorySignatureStore {
    pub fn new(ttl_secs: u64, max_entries: u64) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_entries)
            .time_to_live(Duration::from_secs(ttl_secs))
            .build();
        Self { cache }
    }

    pub fn len(&self) -> u64 {
        self.cache.entry_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl SignatureStore for MemorySignatureStore {
    async fn put(&self, record: SignatureRecord) -> Result<()> {
        self.cache.insert(record.call_id.clone(), record);
        Ok(())
    }

    async fn get(&self, call_id: &str) -> Result<Option<SignatureRecord>> {
        let key = call_id.to_string();
        match self.cache.get(&key) {
            Some(record) if record.is_expired() => {
                self.cache.invalidate(&key);
                Ok(None)
            }
            other => Ok(other),
        }
    }
}

/// Store used when caching is switched off: nothing is kept.
pub struct DisabledSignatureStore;

#[async_trait]
impl SignatureStore for DisabledSignatureStore {
    async fn put(&self, _record: SignatureRecord) -> Result<()> {
        Ok(())
    }

    async fn get(&self, _call_id: &str) -> Result<Option<SignatureRecord>> {
        Ok(None)
    }
}

/// Fail-safe facade over a [`SignatureStore`]: errors read as "no token".
#[derive(Clone)]
pub struct SignatureCorrelator {
    store: Arc<dyn SignatureStore>,
    ttl_secs: u64,
}

impl SignatureCorrelator {
    pub fn new(store: Arc<dyn SignatureStore>, ttl_secs: u64) -> Self {
        Self { store, ttl_secs }
    }

    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(MemorySignatureStore::new(DEFAULT_TTL_SECS, 100_000)),
            DEFAULT_TTL_SECS,
        )
    }

    pub fn disabled() -> Self {
        Self::new(Arc::new(DisabledSignatureStore), DEFAULT_TTL_SECS)
    }

    pub async fn put(&self, call_id: &str, signature: Vec<u8>) {
        if call_id.is_empty() || signature.is_empty() {
            return;
        }
        let record = SignatureRecord::new(call_id, signature, self.ttl_secs);
        if let Err(e) = self.store.put(record).await {
            tracing::warn!(call_id, error = %e, "failed to store thought signature");
        }
    }

    pub async fn get(&self, call_id: &str) -> Option<Vec<u8>> {
        if call_id.is_empty() {
            return None;
        }
        match self.store.get(call_id).await {
            Ok(Some(record)) if !record.is_expired() => Some(record.signature),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(call_id, error = %e, "thought signature lookup failed, continuing without");
                None
            }
        }
    }

    pub async fn persist(&self, captured: Vec<CapturedSignature>) {
        for c in captured {
            self.put(&c.call_id, c.signature).await;
        }
    }

    /// Tokens for every id that has one; ids without a token are simply absent.
    pub async fn lookup_all<I, S>(&self, call_ids: I) -> HashMap<String, Vec<u8>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut found = HashMap::new();
        for id in call_ids {
            let id = id.as_ref();
            if found.contains_key(id) {
                continue;
            }
            if let Some(signature) = self.get(id).await {
                found.insert(id.to_string(), signature);
            }
        }
        found
    }
}
