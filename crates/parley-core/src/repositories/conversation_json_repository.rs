use std::path::PathBuf;

use super::conversation_repository::{BoxFuture, CONVERSATIONS_KEY, ConversationRepository};
use super::error::RepositoryResult;

/// JSON file-based repository for conversations.
/// Stores the whole collection in `<dir>/chats.json`.
pub struct ConversationJsonRepository {
    file_path: PathBuf,
}

impl ConversationJsonRepository {
    pub fn with_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            file_path: dir.into().join(format!("{}.json", CONVERSATIONS_KEY)),
        }
    }

    pub fn file_path(&self) -> &PathBuf {
        &self.file_path
    }
}

impl ConversationRepository for ConversationJsonRepository {
    fn load(&self) -> BoxFuture<'static, RepositoryResult<Option<String>>> {
        let path = self.file_path.clone();

        Box::pin(async move {
            match tokio::fs::read_to_string(&path).await {
                Ok(content) => Ok(Some(content)),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
    }

    fn save(&self, blob: String) -> BoxFuture<'static, RepositoryResult<()>> {
        let path = self.file_path.clone();

        Box::pin(async move {
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }

            // Write to file atomically (write to temp, then rename)
            let temp_path = path.with_extension("json.tmp");
            tokio::fs::write(&temp_path, blob).await?;
            tokio::fs::rename(&temp_path, &path).await?;

            Ok(())
        })
    }
}
