use serde::{Deserialize, Serialize};

/// Who authored a message
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// A committed chat message.
///
/// Messages are never edited after they are appended to a conversation; the
/// streaming assistant reply lives in a separate buffer until it is complete.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: u64,
    pub role: Role,
    pub content: String,
    /// Image reference: an http(s) URL or a base64 `data:` URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl Message {
    pub fn user(id: u64, content: impl Into<String>, image_url: Option<String>) -> Self {
        Self {
            id,
            role: Role::User,
            content: content.into(),
            image_url,
        }
    }

    pub fn assistant(id: u64, content: impl Into<String>) -> Self {
        Self {
            id,
            role: Role::Assistant,
            content: content.into(),
            image_url: None,
        }
    }
}

/// History entry handed to the remote generator as prompt context
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PromptMessage {
    pub role: Role,
    pub content: String,
    pub image_url: Option<String>,
}

impl From<&Message> for PromptMessage {
    fn from(message: &Message) -> Self {
        Self {
            role: message.role,
            content: message.content.clone(),
            image_url: message.image_url.clone(),
        }
    }
}
