//! Session module - conversation data model and durable history
//!
//! The context manager owns a session's conversation but persists it through
//! a [`HistoryProvider`]. [`StorageHistory`] keeps each session as an ordered
//! list under `history:<session_id>` in any [`StorageBackend`].

mod types;

pub use types::{BinarySource, ContentPart, Message, MessageContent, Role, ToolCall};

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use crate::error::Result;
use crate::storage::StorageBackend;

/// Durable, append-only store of a session's messages.
#[async_trait]
pub trait HistoryProvider: Send + Sync {
    /// All messages of the session, oldest first.
    async fn load(&self, session_id: &str) -> Result<Vec<Message>>;

    /// Append one message at the end.
    async fn append(&self, session_id: &str, message: &Message) -> Result<()>;

    /// Drop the whole session history.
    async fn clear(&self, session_id: &str) -> Result<()>;
}

/// [`HistoryProvider`] backed by the ordered-list half of a storage backend.
pub struct StorageHistory {
    storage: Arc<dyn StorageBackend>,
}

impl StorageHistory {
    pub fn new(storage: Arc<dyn StorageBackend>) -> Self {
        Self { storage }
    }

    fn key(session_id: &str) -> String {
        format!("history:{}", session_id)
    }
}

#[async_trait]
impl HistoryProvider for StorageHistory {
    async fn load(&self, session_id: &str) -> Result<Vec<Message>> {
        let messages: Vec<Message> = self
            .storage
            .get_range(&Self::key(session_id), 0, usize::MAX)
            .await?;
        debug!(session_id = %session_id, count = messages.len(), "Loaded history");
        Ok(messages)
    }

    async fn append(&self, session_id: &str, message: &Message) -> Result<()> {
        self.storage.append(&Self::key(session_id), message).await
    }

    async fn clear(&self, session_id: &str) -> Result<()> {
        self.storage.delete(&Self::key(session_id)).await
    }
}

/// Fresh random session identifier.
pub fn new_session_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
