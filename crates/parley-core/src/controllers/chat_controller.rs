use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::models::{
    ChatEvent, Conversation, ConversationsStore, Message, OutboundMessage, PromptMessage, Role,
    StreamManager,
};
use crate::repositories::{ConversationPersistenceCoordinator, ConversationRepository};
use crate::services::MessageGenerator;

const EVENT_CAPACITY: usize = 256;

/// Result of a [`ChatController::send_message`] call
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SendOutcome {
    /// Text was empty or whitespace only
    Ignored,
    /// A stream is already in flight
    Busy,
    /// The assistant reply was committed
    Completed(Message),
    /// Transport failure; the partial reply was discarded
    Failed(String),
    /// Stopped by the user, or the target conversation was deleted
    Cancelled,
}

/// Everything the session mutates, behind a single lock so that a stream's
/// buffer is taken and its message committed in one critical section
struct ChatState {
    store: ConversationsStore,
    streams: StreamManager,
}

enum StreamEnd {
    Exhausted,
    /// The stream was unregistered while fragments were still arriving
    Detached,
}

/// One chat session: the conversation store, the in-flight stream and the
/// persistence mirror.
///
/// Cheap to clone; clones share state. Locks are only taken between awaits.
#[derive(Clone)]
pub struct ChatController {
    state: Arc<Mutex<ChatState>>,
    generator: Arc<dyn MessageGenerator>,
    persistence: Arc<ConversationPersistenceCoordinator>,
    events: broadcast::Sender<ChatEvent>,
}

impl ChatController {
    /// Build a session from whatever the repository holds
    pub async fn load(
        repository: Arc<dyn ConversationRepository>,
        generator: Arc<dyn MessageGenerator>,
        flush_interval: Duration,
    ) -> Self {
        let persistence = Arc::new(ConversationPersistenceCoordinator::new(repository));
        let conversations = persistence.load_conversations().await;

        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let state = ChatState {
            store: ConversationsStore::from_conversations(conversations),
            streams: StreamManager::new(flush_interval, events.clone()),
        };

        Self {
            state: Arc::new(Mutex::new(state)),
            generator,
            persistence,
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChatEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: ChatEvent) {
        let _ = self.events.send(event);
    }

    /// Mirror the committed state to storage. Failures are logged and the
    /// in-memory state stays authoritative.
    async fn persist(&self) {
        let (revision, conversations) = self.state.lock().store.snapshot();
        match self.persistence.save_snapshot(revision, &conversations).await {
            Ok(true) => debug!(revision, "Conversations saved"),
            Ok(false) => {}
            Err(e) => error!(revision, error = ?e, "Failed to save conversations"),
        }
    }

    pub async fn create_conversation(&self) -> String {
        let id = {
            let mut state = self.state.lock();
            let id = state.store.create_conversation();
            self.emit(ChatEvent::ConversationListChanged);
            self.emit(ChatEvent::ActiveConversationChanged {
                conversation_id: Some(id.clone()),
            });
            id
        };
        info!(conv_id = %id, "Created conversation");
        self.persist().await;
        id
    }

    /// Rename a conversation. Blank names and unknown ids are ignored.
    pub async fn rename_conversation(&self, id: &str, new_name: &str) -> bool {
        let renamed = self.state.lock().store.rename_conversation(id, new_name);
        if renamed {
            self.emit(ChatEvent::ConversationListChanged);
            self.persist().await;
        }
        renamed
    }

    /// Delete a conversation, cancelling its stream if one is in flight
    pub async fn delete_conversation(&self, id: &str) -> bool {
        let (deleted, was_active) = {
            let mut state = self.state.lock();
            let was_active = state.store.active_id() == Some(id);
            if state.streams.stop_stream(id) {
                info!(conv_id = %id, "Cancelled stream of deleted conversation");
            }
            let deleted = state.store.delete_conversation(id);
            if deleted {
                self.emit(ChatEvent::ConversationListChanged);
                if was_active {
                    self.emit(ChatEvent::ActiveConversationChanged {
                        conversation_id: None,
                    });
                }
            }
            (deleted, was_active)
        };

        if deleted {
            info!(conv_id = %id, was_active, "Deleted conversation");
            self.persist().await;
        }
        deleted
    }

    /// Select a conversation, e.g. from the sidebar. Unknown ids are ignored.
    pub fn set_active(&self, id: &str) -> bool {
        let mut state = self.state.lock();
        if state.store.active_id() == Some(id) {
            return true;
        }
        let changed = state.store.set_active(id);
        if changed {
            self.emit(ChatEvent::ActiveConversationChanged {
                conversation_id: Some(id.to_string()),
            });
        } else {
            debug!(conv_id = %id, "Cannot activate unknown conversation");
        }
        changed
    }

    pub fn active_conversation_id(&self) -> Option<String> {
        self.state.lock().store.active_id().map(str::to_string)
    }

    pub fn active_conversation(&self) -> Option<Conversation> {
        self.state.lock().store.active_conversation().cloned()
    }

    pub fn conversation(&self, id: &str) -> Option<Conversation> {
        self.state.lock().store.get_conversation(id).cloned()
    }

    /// Conversations newest first
    pub fn sidebar(&self) -> Vec<Conversation> {
        self.state
            .lock()
            .store
            .list_for_sidebar()
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn conversation_count(&self) -> usize {
        self.state.lock().store.count()
    }

    /// Whether a stream is in flight; gates sending
    pub fn is_streaming(&self) -> bool {
        self.state.lock().streams.has_active_streams()
    }

    /// Live text of the in-flight response for a conversation
    pub fn streaming_buffer(&self, conv_id: &str) -> Option<String> {
        self.state.lock().streams.buffer(conv_id).map(str::to_string)
    }

    /// Stop the conversation's stream, discarding the partial reply
    pub fn stop_stream(&self, conv_id: &str) -> bool {
        self.state.lock().streams.stop_stream(conv_id)
    }

    /// Stop every in-flight stream, whichever conversation is active.
    /// Returns false when nothing was streaming.
    pub fn stop_all(&self) -> bool {
        let mut state = self.state.lock();
        let any = state.streams.has_active_streams();
        state.streams.stop_all();
        any
    }

    pub async fn send(&self, outbound: OutboundMessage) -> SendOutcome {
        self.send_message(&outbound.text, outbound.image_url).await
    }

    /// Append a user message to the active conversation (creating one when
    /// none is active), stream the assistant reply and commit it.
    pub async fn send_message(&self, text: &str, image_url: Option<String>) -> SendOutcome {
        if text.trim().is_empty() {
            debug!("Message is empty, not sending");
            return SendOutcome::Ignored;
        }

        let cancel = CancellationToken::new();
        let (conv_id, history) = {
            let mut state = self.state.lock();
            if state.streams.has_active_streams() {
                debug!("A response is still streaming, not sending");
                return SendOutcome::Busy;
            }

            let conv_id = match state.store.active_id().map(str::to_string) {
                Some(id) => id,
                None => {
                    let id = state.store.create_conversation();
                    self.emit(ChatEvent::ConversationListChanged);
                    self.emit(ChatEvent::ActiveConversationChanged {
                        conversation_id: Some(id.clone()),
                    });
                    id
                }
            };

            if state
                .store
                .push_new_message(&conv_id, Role::User, text.to_string(), image_url)
                .is_none()
            {
                return SendOutcome::Failed(format!("conversation {conv_id} is unavailable"));
            }
            self.emit(ChatEvent::ConversationListChanged);

            let history = state
                .store
                .get_conversation(&conv_id)
                .map(Conversation::prompt_history)
                .unwrap_or_default();
            state.streams.register_stream(&conv_id, cancel.clone());
            (conv_id, history)
        };
        self.persist().await;

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => Ok(StreamEnd::Detached),
            result = self.consume_stream(&conv_id, history) => result,
        };

        match result {
            Ok(StreamEnd::Exhausted) => self.commit_response(&conv_id).await,
            Ok(StreamEnd::Detached) => {
                info!(conv_id = %conv_id, "Stream cancelled, response discarded");
                SendOutcome::Cancelled
            }
            Err(e) => {
                let message = format!("{e:#}");
                let mut state = self.state.lock();
                if !state.streams.is_streaming(&conv_id) {
                    return SendOutcome::Cancelled;
                }
                warn!(conv_id = %conv_id, error = %message, "Stream failed, partial response discarded");
                state.streams.fail_stream(&conv_id, message.clone());
                SendOutcome::Failed(message)
            }
        }
    }

    async fn consume_stream(
        &self,
        conv_id: &str,
        history: Vec<PromptMessage>,
    ) -> anyhow::Result<StreamEnd> {
        let mut fragments = self.generator.generate(history).await?;

        while let Some(fragment) = fragments.next().await {
            let fragment = fragment?;
            let accepted = self.state.lock().streams.push_fragment(conv_id, &fragment);
            if !accepted {
                return Ok(StreamEnd::Detached);
            }
        }
        Ok(StreamEnd::Exhausted)
    }

    /// Turn the finished buffer into an assistant message
    async fn commit_response(&self, conv_id: &str) -> SendOutcome {
        let committed = {
            let mut guard = self.state.lock();
            let state = &mut *guard;
            let Some(text) = state.streams.finalize_stream(conv_id) else {
                return SendOutcome::Cancelled;
            };
            let message = state
                .store
                .push_new_message(conv_id, Role::Assistant, text, None);
            if message.is_some() {
                self.emit(ChatEvent::ConversationListChanged);
            }
            message
        };

        match committed {
            Some(message) => {
                info!(conv_id = %conv_id, message_id = message.id, "Committed assistant response");
                self.persist().await;
                SendOutcome::Completed(message)
            }
            // The conversation was deleted while streaming
            None => SendOutcome::Cancelled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::StreamStatus;
    use crate::repositories::InMemoryConversationRepository;
    use crate::repositories::conversation_repository::BoxFuture;
    use crate::services::openai_generator::fragments_from_body;
    use crate::services::{FragmentStream, GeneratorError, ScriptedGenerator};

    /// Replays a raw SSE response body
    struct SseBodyGenerator(Vec<&'static str>);

    impl MessageGenerator for SseBodyGenerator {
        fn generate(&self, _history: Vec<PromptMessage>) -> BoxFuture<'static, anyhow::Result<FragmentStream>> {
            let chunks: Vec<Result<Vec<u8>, GeneratorError>> =
                self.0.iter().map(|c| Ok(c.as_bytes().to_vec())).collect();
            Box::pin(async move { Ok(fragments_from_body(futures::stream::iter(chunks))) })
        }
    }

    async fn controller_with(
        generator: ScriptedGenerator,
    ) -> (ChatController, InMemoryConversationRepository) {
        let repo = InMemoryConversationRepository::new();
        let controller =
            ChatController::load(Arc::new(repo.clone()), Arc::new(generator), Duration::ZERO)
                .await;
        (controller, repo)
    }

    fn drain(rx: &mut broadcast::Receiver<ChatEvent>) -> Vec<ChatEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn test_event_sequence_for_first_send() {
        let (controller, _repo) = controller_with(ScriptedGenerator::new(["Hi", " there", "!"])).await;
        let mut rx = controller.subscribe();

        let outcome = controller.send_message("Hello", None).await;
        let id = controller.active_conversation_id().unwrap();
        let buffer = |s: &str| ChatEvent::StreamingBufferUpdated {
            conversation_id: id.clone(),
            buffer: s.to_string(),
        };

        assert!(matches!(outcome, SendOutcome::Completed(ref m) if m.content == "Hi there!"));
        assert_eq!(
            drain(&mut rx),
            vec![
                ChatEvent::ConversationListChanged,
                ChatEvent::ActiveConversationChanged {
                    conversation_id: Some(id.clone())
                },
                ChatEvent::ConversationListChanged,
                ChatEvent::StreamingStarted {
                    conversation_id: id.clone()
                },
                buffer("Hi"),
                buffer("Hi there"),
                buffer("Hi there!"),
                ChatEvent::StreamingEnded {
                    conversation_id: id.clone(),
                    status: StreamStatus::Completed
                },
                ChatEvent::ConversationListChanged,
            ]
        );
    }

    #[tokio::test]
    async fn test_history_includes_new_user_message() {
        let generator = ScriptedGenerator::new(["ok"]);
        let (controller, _repo) = controller_with(generator.clone()).await;

        controller.send_message("first", None).await;
        controller
            .send_message("second", Some("https://example.com/a.png".to_string()))
            .await;

        let history = generator.last_history().unwrap();
        let roles: Vec<Role> = history.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::User, Role::Assistant, Role::User]);
        assert_eq!(history[2].content, "second");
        assert_eq!(history[2].image_url.as_deref(), Some("https://example.com/a.png"));
    }

    #[tokio::test]
    async fn test_second_send_while_streaming_is_busy() {
        let (controller, _repo) = controller_with(ScriptedGenerator::new(["..."]).hold_open()).await;

        let first = tokio::spawn({
            let controller = controller.clone();
            async move { controller.send_message("long question", None).await }
        });
        while !controller.is_streaming() {
            tokio::task::yield_now().await;
        }

        assert_eq!(controller.send_message("another", None).await, SendOutcome::Busy);

        let id = controller.active_conversation_id().unwrap();
        assert!(controller.stop_stream(&id));
        assert_eq!(first.await.unwrap(), SendOutcome::Cancelled);
        assert!(!controller.is_streaming());
        assert_eq!(controller.conversation(&id).unwrap().message_count(), 1);
    }

    #[tokio::test]
    async fn test_request_rejection_fails_cleanly() {
        let (controller, _repo) =
            controller_with(ScriptedGenerator::new(Vec::<String>::new()).rejecting_with("HTTP 401")).await;

        let outcome = controller.send_message("Hello", None).await;
        assert_eq!(outcome, SendOutcome::Failed("HTTP 401".to_string()));
        assert!(!controller.is_streaming());
        assert_eq!(controller.active_conversation().unwrap().message_count(), 1);
    }

    #[tokio::test]
    async fn test_failed_saves_keep_memory_authoritative() {
        let (controller, repo) = controller_with(ScriptedGenerator::new(["fine"])).await;
        repo.set_fail_saves(true);

        let outcome = controller.send_message("Hello", None).await;
        assert!(matches!(outcome, SendOutcome::Completed(_)));
        assert_eq!(controller.active_conversation().unwrap().message_count(), 2);
        assert!(repo.blob().is_none());

        repo.set_fail_saves(false);
        controller.create_conversation().await;
        let saved = crate::repositories::decode_conversations(&repo.blob().unwrap()).unwrap();
        assert_eq!(saved.len(), 2);
        assert_eq!(saved[0].message_count(), 2);
    }

    #[tokio::test]
    async fn test_set_active_and_delete_events() {
        let (controller, _repo) = controller_with(ScriptedGenerator::default()).await;
        let first = controller.create_conversation().await;
        let second = controller.create_conversation().await;
        let mut rx = controller.subscribe();

        assert!(!controller.set_active("missing"));
        assert!(controller.set_active(&first));
        assert!(controller.delete_conversation(&first).await);
        assert!(!controller.delete_conversation(&first).await);

        assert_eq!(
            drain(&mut rx),
            vec![
                ChatEvent::ActiveConversationChanged {
                    conversation_id: Some(first.clone())
                },
                ChatEvent::ConversationListChanged,
                ChatEvent::ActiveConversationChanged {
                    conversation_id: None
                },
            ]
        );
        assert!(controller.active_conversation_id().is_none());
        assert_eq!(controller.sidebar()[0].id(), second);
    }

    #[tokio::test]
    async fn test_updates_coalesce_within_flush_interval() {
        let generator = ScriptedGenerator::new(["a", "b", "c", "d"])
            .with_fragment_delay(Duration::from_millis(1));
        let controller = ChatController::load(
            Arc::new(InMemoryConversationRepository::new()),
            Arc::new(generator),
            Duration::from_secs(30),
        )
        .await;
        let mut rx = controller.subscribe();

        let outcome = controller.send_message("go", None).await;
        assert!(matches!(outcome, SendOutcome::Completed(ref m) if m.content == "abcd"));

        let updates: Vec<String> = drain(&mut rx)
            .into_iter()
            .filter_map(|event| match event {
                ChatEvent::StreamingBufferUpdated { buffer, .. } => Some(buffer),
                _ => None,
            })
            .collect();
        assert_eq!(updates, vec!["abcd".to_string()]);
    }

    #[tokio::test]
    async fn test_reply_cut_off_before_done_is_not_committed() {
        let controller = ChatController::load(
            Arc::new(InMemoryConversationRepository::new()),
            Arc::new(SseBodyGenerator(vec![
                "data: {\"choices\":[{\"delta\":{\"content\":\"Half an\"}}]}\n\n",
            ])),
            Duration::ZERO,
        )
        .await;

        let outcome = controller.send_message("Explain", None).await;
        assert_eq!(outcome, SendOutcome::Failed(GeneratorError::Truncated.to_string()));
        assert_eq!(controller.active_conversation().unwrap().message_count(), 1);
        assert!(!controller.is_streaming());
    }

    #[tokio::test]
    async fn test_stop_all_reaches_stream_of_inactive_conversation() {
        let (controller, _repo) = controller_with(ScriptedGenerator::new(["..."]).hold_open()).await;

        let send = tokio::spawn({
            let controller = controller.clone();
            async move { controller.send_message("long question", None).await }
        });
        while !controller.is_streaming() {
            tokio::task::yield_now().await;
        }
        let streaming_id = controller.active_conversation_id().unwrap();
        controller.create_conversation().await;

        let active = controller.active_conversation_id().unwrap();
        assert!(!controller.stop_stream(&active));
        assert!(controller.stop_all());
        assert!(!controller.stop_all());

        assert_eq!(send.await.unwrap(), SendOutcome::Cancelled);
        assert!(!controller.is_streaming());
        assert_eq!(controller.conversation(&streaming_id).unwrap().message_count(), 1);
    }
}
