//! In-memory storage backend.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use super::StorageBackend;
use crate::error::{HostError, Result};

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| at > now)
    }
}

/// Process-local [`StorageBackend`] with lazy TTL expiry.
///
/// Expired entries are removed by the next read of that key, and swept
/// from the whole map on every write and `list`.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: RwLock<HashMap<String, Entry>>,
}

impl MemoryStorage {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live keys.
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .read()
            .await
            .values()
            .filter(|e| e.is_live(now))
            .count()
    }

    /// Returns true if no live keys are stored.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

fn sweep(entries: &mut HashMap<String, Entry>, now: Instant) {
    entries.retain(|_, e| e.is_live(now));
}

#[async_trait]
impl StorageBackend for MemoryStorage {
    async fn get_value(&self, key: &str) -> Result<Option<Value>> {
        let now = Instant::now();
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                None => return Ok(None),
                Some(e) if e.is_live(now) => return Ok(Some(e.value.clone())),
                Some(_) => {}
            }
        }
        let mut entries = self.entries.write().await;
        if entries.get(key).is_some_and(|e| !e.is_live(now)) {
            entries.remove(key);
        }
        Ok(None)
    }

    async fn set_value(&self, key: &str, value: Value, ttl: Option<Duration>) -> Result<()> {
        let now = Instant::now();
        let expires_at = ttl.map(|d| now + d);
        let mut entries = self.entries.write().await;
        sweep(&mut entries, now);
        entries.insert(key.to_string(), Entry { value, expires_at });
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        sweep(&mut entries, now);
        let mut keys: Vec<String> = entries
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn append_value(&self, key: &str, item: Value) -> Result<()> {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        sweep(&mut entries, now);
        let entry = entries.entry(key.to_string()).or_insert_with(|| Entry {
            value: Value::Array(Vec::new()),
            expires_at: None,
        });
        match &mut entry.value {
            Value::Array(items) => {
                items.push(item);
                Ok(())
            }
            _ => Err(HostError::Storage(format!("key '{}' does not hold a list", key))),
        }
    }

    async fn get_range_values(&self, key: &str, start: usize, count: usize) -> Result<Vec<Value>> {
        let now = Instant::now();
        let entries = self.entries.read().await;
        match entries.get(key).filter(|e| e.is_live(now)) {
            None => Ok(Vec::new()),
            Some(Entry {
                value: Value::Array(items),
                ..
            }) => Ok(items.iter().skip(start).take(count).cloned().collect()),
            Some(_) => Err(HostError::Storage(format!("key '{}' does not hold a list", key))),
        }
    }
}
