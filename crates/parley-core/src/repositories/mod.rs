pub mod conversation_json_repository;
pub mod conversation_repository;
pub mod error;
pub mod in_memory_repository;
pub mod persistence_coordinator;

pub use conversation_json_repository::ConversationJsonRepository;
pub use conversation_repository::{
    CONVERSATIONS_KEY, ConversationRepository, decode_conversations, encode_conversations,
};
pub use error::{RepositoryError, RepositoryResult};
pub use in_memory_repository::InMemoryConversationRepository;
pub use persistence_coordinator::ConversationPersistenceCoordinator;
