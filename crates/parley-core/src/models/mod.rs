pub mod attachment_validation;
pub mod chat_event;
pub mod composer;
pub mod conversation;
pub mod conversations_store;
pub mod error_store;
pub mod message;
pub mod stream_manager;

pub use chat_event::{ChatEvent, StreamStatus};
pub use composer::{Composer, OutboundMessage};
pub use conversation::Conversation;
pub use conversations_store::ConversationsStore;
pub use error_store::{ErrorEntry, ErrorLevel, ErrorStore};
pub use message::{Message, PromptMessage, Role};
pub use stream_manager::StreamManager;
