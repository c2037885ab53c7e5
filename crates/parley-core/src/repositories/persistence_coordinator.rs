use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::conversation_repository::{
    ConversationRepository, decode_conversations, encode_conversations,
};
use super::error::RepositoryResult;
use crate::models::Conversation;

/// Mirrors the conversation store into a repository.
///
/// Saves are serialized and tagged with the store revision they were taken
/// at; a snapshot older than the last one written is skipped, so two saves
/// racing each other can never roll the stored blob back.
pub struct ConversationPersistenceCoordinator {
    repository: Arc<dyn ConversationRepository>,
    last_saved_revision: Mutex<Option<u64>>,
}

impl ConversationPersistenceCoordinator {
    pub fn new(repository: Arc<dyn ConversationRepository>) -> Self {
        Self {
            repository,
            last_saved_revision: Mutex::new(None),
        }
    }

    /// Load persisted conversations.
    ///
    /// Missing, unreadable or malformed data yields an empty set; the problem
    /// is logged and the next save overwrites it.
    pub async fn load_conversations(&self) -> Vec<Conversation> {
        let blob = match self.repository.load().await {
            Ok(Some(blob)) => blob,
            Ok(None) => {
                debug!("No stored conversations");
                return Vec::new();
            }
            Err(e) => {
                warn!(error = %e, "Failed to read stored conversations, starting empty");
                return Vec::new();
            }
        };

        match decode_conversations(&blob) {
            Ok(conversations) => {
                info!(count = conversations.len(), "Loaded conversations");
                conversations
            }
            Err(e) => {
                warn!(error = %e, "Stored conversations are malformed, starting empty");
                Vec::new()
            }
        }
    }

    /// Save a snapshot taken at `revision`.
    ///
    /// Returns `Ok(false)` when a newer snapshot was already written.
    pub async fn save_snapshot(
        &self,
        revision: u64,
        conversations: &[Conversation],
    ) -> RepositoryResult<bool> {
        let mut last_saved = self.last_saved_revision.lock().await;
        if last_saved.is_some_and(|last| last >= revision) {
            debug!(revision, "Skipping stale conversation snapshot");
            return Ok(false);
        }

        let blob = encode_conversations(conversations)?;
        self.repository.save(blob).await?;
        *last_saved = Some(revision);
        Ok(true)
    }
}
