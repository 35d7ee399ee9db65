//! Persisted tool approvals.
//!
//! Each scope is one storage key holding a sorted JSON array of tool names:
//! `allowed_tools:session:<id>` for a session, `allowed_tools:global` otherwise.

use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::Result;
use crate::storage::StorageBackend;

const KEY_PREFIX: &str = "allowed_tools";

/// Session and global tool approvals over a [`StorageBackend`].
pub struct AllowedToolsStore {
    storage: Arc<dyn StorageBackend>,
    // Serialises read-modify-write cycles issued through this instance.
    write_lock: Mutex<()>,
}

impl AllowedToolsStore {
    pub fn new(storage: Arc<dyn StorageBackend>) -> Self {
        Self {
            storage,
            write_lock: Mutex::new(()),
        }
    }

    fn scope_key(session_id: Option<&str>) -> String {
        match session_id {
            Some(id) => format!("{}:session:{}", KEY_PREFIX, id),
            None => format!("{}:global", KEY_PREFIX),
        }
    }

    async fn read_scope(&self, session_id: Option<&str>) -> Result<BTreeSet<String>> {
        Ok(self
            .storage
            .get::<BTreeSet<String>>(&Self::scope_key(session_id))
            .await?
            .unwrap_or_default())
    }

    async fn write_scope(&self, session_id: Option<&str>, tools: &BTreeSet<String>) -> Result<()> {
        let key = Self::scope_key(session_id);
        if tools.is_empty() {
            self.storage.delete(&key).await
        } else {
            self.storage.set(&key, tools, None).await
        }
    }

    /// Approve `tool` in the session scope, or globally when `session_id` is `None`.
    pub async fn allow_tool(&self, tool: &str, session_id: Option<&str>) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut tools = self.read_scope(session_id).await?;
        if tools.insert(tool.to_string()) {
            self.write_scope(session_id, &tools).await?;
            debug!(tool = %tool, scope = %Self::scope_key(session_id), "Tool allowed");
        }
        Ok(())
    }

    /// Remove `tool` from exactly one scope. Other scopes are untouched.
    pub async fn disallow_tool(&self, tool: &str, session_id: Option<&str>) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut tools = self.read_scope(session_id).await?;
        if tools.remove(tool) {
            self.write_scope(session_id, &tools).await?;
            debug!(tool = %tool, scope = %Self::scope_key(session_id), "Tool disallowed");
        }
        Ok(())
    }

    /// Session scope first, then global.
    pub async fn is_tool_allowed(&self, tool: &str, session_id: Option<&str>) -> Result<bool> {
        if session_id.is_some() && self.read_scope(session_id).await?.contains(tool) {
            return Ok(true);
        }
        Ok(self.read_scope(None).await?.contains(tool))
    }

    /// Tools stored in one scope, sorted.
    pub async fn get_allowed_tools(&self, session_id: Option<&str>) -> Result<Vec<String>> {
        Ok(self.read_scope(session_id).await?.into_iter().collect())
    }
}
