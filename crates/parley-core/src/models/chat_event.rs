/// How a stream ended
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StreamStatus {
    Completed,
    Cancelled,
    Failed(String),
}

/// Events emitted by the chat controller for decoupled UI updates.
///
/// They carry no more than the id of what changed (plus the buffer snapshot
/// for streaming updates); subscribers re-read the controller for the rest.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChatEvent {
    ConversationListChanged,
    ActiveConversationChanged {
        conversation_id: Option<String>,
    },
    StreamingStarted {
        conversation_id: String,
    },
    StreamingBufferUpdated {
        conversation_id: String,
        buffer: String,
    },
    StreamingEnded {
        conversation_id: String,
        status: StreamStatus,
    },
}
