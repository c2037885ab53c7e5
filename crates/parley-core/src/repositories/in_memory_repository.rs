use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use parking_lot::Mutex;

use super::conversation_repository::{BoxFuture, ConversationRepository};
use super::error::RepositoryResult;

/// In-memory repository for conversations
/// Useful for testing and development
#[derive(Clone, Default)]
pub struct InMemoryConversationRepository {
    blob: Arc<Mutex<Option<String>>>,
    save_count: Arc<AtomicUsize>,
    fail_saves: Arc<AtomicBool>,
}

impl InMemoryConversationRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with a pre-existing stored blob
    pub fn with_blob(blob: impl Into<String>) -> Self {
        let repo = Self::new();
        *repo.blob.lock() = Some(blob.into());
        repo
    }

    /// Currently stored blob
    pub fn blob(&self) -> Option<String> {
        self.blob.lock().clone()
    }

    /// Number of successful saves so far
    pub fn save_count(&self) -> usize {
        self.save_count.load(Ordering::SeqCst)
    }

    /// Make subsequent saves fail with an I/O error
    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }
}

impl ConversationRepository for InMemoryConversationRepository {
    fn load(&self) -> BoxFuture<'static, RepositoryResult<Option<String>>> {
        let blob = self.blob.clone();
        Box::pin(async move { Ok(blob.lock().clone()) })
    }

    fn save(&self, data: String) -> BoxFuture<'static, RepositoryResult<()>> {
        let blob = self.blob.clone();
        let save_count = self.save_count.clone();
        let fail = self.fail_saves.load(Ordering::SeqCst);

        Box::pin(async move {
            if fail {
                return Err(std::io::Error::other("storage unavailable").into());
            }
            *blob.lock() = Some(data);
            save_count.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_save_and_load() {
        let repo = InMemoryConversationRepository::new();
        assert!(repo.load().await.unwrap().is_none());

        repo.save("[]".to_string()).await.unwrap();
        assert_eq!(repo.load().await.unwrap().as_deref(), Some("[]"));
        assert_eq!(repo.save_count(), 1);
    }

    #[tokio::test]
    async fn test_failing_saves_keep_previous_blob() {
        let repo = InMemoryConversationRepository::with_blob("[]");
        repo.set_fail_saves(true);

        assert!(repo.save("[1]".to_string()).await.is_err());
        assert_eq!(repo.blob().as_deref(), Some("[]"));
        assert_eq!(repo.save_count(), 0);
    }
}
