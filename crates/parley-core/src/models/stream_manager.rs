use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::chat_event::{ChatEvent, StreamStatus};

/// Default minimum interval between batched buffer events (~60fps).
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_millis(16);

/// Per-conversation stream state.
///
/// `buffer` is the streaming buffer: the full text received so far. It is
/// never a message; it becomes one only when the controller commits it.
struct StreamState {
    buffer: String,
    cancel: CancellationToken,
    /// Set once fragments arrived that have not been announced yet
    dirty: bool,
    last_flush: Instant,
}

/// Stream lifecycle manager.
///
/// Owns the streaming buffers keyed by conversation id, the cancellation
/// token of each in-flight stream, and the batching of
/// `StreamingBufferUpdated` events. The buffer itself is updated on every
/// fragment; only the events are coalesced.
pub struct StreamManager {
    streams: HashMap<String, StreamState>,
    flush_interval: Duration,
    events: broadcast::Sender<ChatEvent>,
}

impl StreamManager {
    pub fn new(flush_interval: Duration, events: broadcast::Sender<ChatEvent>) -> Self {
        Self {
            streams: HashMap::new(),
            flush_interval,
            events,
        }
    }

    fn emit(&self, event: ChatEvent) {
        // No subscribers is fine; the UI may not be listening yet.
        let _ = self.events.send(event);
    }

    /// Register a stream for a conversation with an empty buffer.
    /// If a stream already exists for this conversation, it is cancelled first.
    pub fn register_stream(&mut self, conv_id: &str, cancel: CancellationToken) {
        if let Some(existing) = self.streams.remove(conv_id) {
            existing.cancel.cancel();
            debug!(conv_id = %conv_id, "Cancelled existing stream before registering new one");
        }

        self.streams.insert(
            conv_id.to_string(),
            StreamState {
                buffer: String::new(),
                cancel,
                dirty: false,
                last_flush: Instant::now(),
            },
        );

        self.emit(ChatEvent::StreamingStarted {
            conversation_id: conv_id.to_string(),
        });
    }

    /// Append a fragment to the conversation's buffer.
    ///
    /// Returns false if the stream is no longer registered (it was stopped
    /// or its conversation deleted), in which case the fragment is dropped.
    pub fn push_fragment(&mut self, conv_id: &str, fragment: &str) -> bool {
        let flush_interval = self.flush_interval;
        let Some(state) = self.streams.get_mut(conv_id) else {
            return false;
        };

        state.buffer.push_str(fragment);
        state.dirty = true;
        if state.last_flush.elapsed() >= flush_interval {
            self.flush(conv_id);
        }
        true
    }

    /// Emit the current buffer if fragments arrived since the last event
    fn flush(&mut self, conv_id: &str) {
        let Some(state) = self.streams.get_mut(conv_id) else {
            return;
        };
        if !state.dirty {
            return;
        }
        state.dirty = false;
        state.last_flush = Instant::now();
        let buffer = state.buffer.clone();
        self.emit(ChatEvent::StreamingBufferUpdated {
            conversation_id: conv_id.to_string(),
            buffer,
        });
    }

    /// Current streaming buffer for a conversation, if a stream is in flight
    pub fn buffer(&self, conv_id: &str) -> Option<&str> {
        self.streams.get(conv_id).map(|s| s.buffer.as_str())
    }

    /// Close a stream that ran to completion and hand back its text.
    ///
    /// The caller commits the text in the same critical section, so no
    /// observer ever sees both the buffer and the committed message.
    pub fn finalize_stream(&mut self, conv_id: &str) -> Option<String> {
        self.flush(conv_id);
        let Some(state) = self.streams.remove(conv_id) else {
            warn!(conv_id = %conv_id, "finalize_stream called but no stream found");
            return None;
        };

        self.emit(ChatEvent::StreamingEnded {
            conversation_id: conv_id.to_string(),
            status: StreamStatus::Completed,
        });
        Some(state.buffer)
    }

    /// Close a stream after a transport failure, discarding the partial buffer
    pub fn fail_stream(&mut self, conv_id: &str, error: String) {
        if let Some(state) = self.streams.remove(conv_id) {
            debug!(conv_id = %conv_id, discarded = state.buffer.len(), "Discarding partial response");
            self.emit(ChatEvent::StreamingEnded {
                conversation_id: conv_id.to_string(),
                status: StreamStatus::Failed(error),
            });
        }
    }

    /// Gracefully stop a stream using its cancellation token.
    /// The partial buffer is discarded.
    pub fn stop_stream(&mut self, conv_id: &str) -> bool {
        let Some(state) = self.streams.remove(conv_id) else {
            return false;
        };

        state.cancel.cancel();
        debug!(conv_id = %conv_id, "Stream stopped");
        self.emit(ChatEvent::StreamingEnded {
            conversation_id: conv_id.to_string(),
            status: StreamStatus::Cancelled,
        });
        true
    }

    /// Stop all active streams (app shutdown).
    pub fn stop_all(&mut self) {
        let keys: Vec<String> = self.streams.keys().cloned().collect();
        for key in keys {
            self.stop_stream(&key);
        }
    }

    /// Check if a conversation has an active stream.
    pub fn is_streaming(&self, conv_id: &str) -> bool {
        self.streams.contains_key(conv_id)
    }

    /// Check if any stream is active.
    pub fn has_active_streams(&self) -> bool {
        !self.streams.is_empty()
    }
}
