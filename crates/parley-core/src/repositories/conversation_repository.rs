use std::future::Future;
use std::pin::Pin;

use super::error::RepositoryResult;
use crate::models::Conversation;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Fixed key the conversation blob is stored under
pub const CONVERSATIONS_KEY: &str = "chats";

/// Key-value persistence for the serialized conversation set.
///
/// The whole collection is stored as one JSON blob; there is no per-record
/// access and no schema version.
pub trait ConversationRepository: Send + Sync + 'static {
    /// Load the stored blob, or `None` if nothing was saved yet
    fn load(&self) -> BoxFuture<'static, RepositoryResult<Option<String>>>;

    /// Replace the stored blob
    fn save(&self, blob: String) -> BoxFuture<'static, RepositoryResult<()>>;
}

/// Serialize conversations to the persisted blob format
pub fn encode_conversations(conversations: &[Conversation]) -> RepositoryResult<String> {
    Ok(serde_json::to_string(conversations)?)
}

/// Parse a persisted blob back into conversations
pub fn decode_conversations(blob: &str) -> RepositoryResult<Vec<Conversation>> {
    Ok(serde_json::from_str(blob)?)
}
