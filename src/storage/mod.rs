//! Storage backend contract.
//!
//! Key-value plus ordered-list semantics over JSON values. The allowed-tools
//! store and the history provider are the only consumers; concrete engines
//! (SQLite, Redis, ...) implement [`StorageBackend`] outside this crate.
//! [`MemoryStorage`] is the in-process implementation used by default and in tests.

mod memory;

pub use memory::MemoryStorage;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::time::Duration;

use crate::error::Result;

/// Object-safe storage contract.
///
/// Values are untyped JSON; the typed helpers on `dyn StorageBackend`
/// (`get`, `set`, `append`, `get_range`) do the serde conversion.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Get a value by key. Expired keys read as absent.
    async fn get_value(&self, key: &str) -> Result<Option<Value>>;

    /// Set a value with optional TTL.
    async fn set_value(&self, key: &str, value: Value, ttl: Option<Duration>) -> Result<()>;

    /// Delete a key. Deleting an absent key is not an error.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Keys starting with `prefix`, sorted.
    async fn list(&self, prefix: &str) -> Result<Vec<String>>;

    /// Push `item` onto the list stored at `key`, creating it if needed.
    async fn append_value(&self, key: &str, item: Value) -> Result<()>;

    /// Up to `count` list items starting at index `start`.
    async fn get_range_values(&self, key: &str, start: usize, count: usize) -> Result<Vec<Value>>;
}

impl dyn StorageBackend {
    /// Typed `get_value`.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.get_value(key).await? {
            Some(v) => Ok(Some(serde_json::from_value(v)?)),
            None => Ok(None),
        }
    }

    /// Typed `set_value`.
    pub async fn set<T: Serialize + Sync>(
        &self,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
    ) -> Result<()> {
        self.set_value(key, serde_json::to_value(value)?, ttl).await
    }

    /// Typed `append_value`.
    pub async fn append<T: Serialize + Sync>(&self, key: &str, item: &T) -> Result<()> {
        self.append_value(key, serde_json::to_value(item)?).await
    }

    /// Typed `get_range_values`.
    pub async fn get_range<T: DeserializeOwned>(
        &self,
        key: &str,
        start: usize,
        count: usize,
    ) -> Result<Vec<T>> {
        self.get_range_values(key, start, count)
            .await?
            .into_iter()
            .map(|v| serde_json::from_value(v).map_err(Into::into))
            .collect()
    }
}
