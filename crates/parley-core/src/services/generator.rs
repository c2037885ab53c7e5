use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, anyhow};
use futures::stream::BoxStream;
use parking_lot::Mutex;

use crate::models::{PromptMessage, Role};
use crate::repositories::conversation_repository::BoxFuture;

/// Type alias for fragment streams.
///
/// Finite and consumed once, front to back. Fragment boundaries carry no
/// meaning: a fragment may end mid-word or mid-codepoint-sequence of a
/// markdown construct.
pub type FragmentStream = BoxStream<'static, Result<String>>;

/// The remote assistant: turns a conversation history into a fragment stream.
///
/// The returned future resolves once the request is accepted; an `Err` there
/// (or any `Err` item inside the stream) is a transport failure.
pub trait MessageGenerator: Send + Sync + 'static {
    fn generate(&self, history: Vec<PromptMessage>) -> BoxFuture<'static, Result<FragmentStream>>;
}

/// Replays a fixed list of fragments. Used by tests and demos.
#[derive(Clone, Default)]
pub struct ScriptedGenerator {
    fragments: Vec<String>,
    stream_error: Option<String>,
    request_error: Option<String>,
    fragment_delay: Option<Duration>,
    hold_open: bool,
    last_history: Arc<Mutex<Option<Vec<PromptMessage>>>>,
}

impl ScriptedGenerator {
    pub fn new<I, S>(fragments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fragments: fragments.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// End the stream with an error after the fragments
    pub fn failing_with(mut self, error: impl Into<String>) -> Self {
        self.stream_error = Some(error.into());
        self
    }

    /// Reject the request before any fragment is produced
    pub fn rejecting_with(mut self, error: impl Into<String>) -> Self {
        self.request_error = Some(error.into());
        self
    }

    pub fn with_fragment_delay(mut self, delay: Duration) -> Self {
        self.fragment_delay = Some(delay);
        self
    }

    /// Never end the stream after the fragments; it stays pending until the
    /// consumer gives up on it
    pub fn hold_open(mut self) -> Self {
        self.hold_open = true;
        self
    }

    /// History received by the most recent `generate` call
    pub fn last_history(&self) -> Option<Vec<PromptMessage>> {
        self.last_history.lock().clone()
    }
}

impl MessageGenerator for ScriptedGenerator {
    fn generate(&self, history: Vec<PromptMessage>) -> BoxFuture<'static, Result<FragmentStream>> {
        *self.last_history.lock() = Some(history);
        let script = self.clone();

        Box::pin(async move {
            if let Some(error) = script.request_error {
                return Err(anyhow!(error));
            }

            let stream: FragmentStream = Box::pin(async_stream::stream! {
                for fragment in script.fragments {
                    if let Some(delay) = script.fragment_delay {
                        tokio::time::sleep(delay).await;
                    }
                    yield Ok(fragment);
                }
                if let Some(error) = script.stream_error {
                    yield Err(anyhow!(error));
                    return;
                }
                if script.hold_open {
                    futures::future::pending::<()>().await;
                }
            });
            Ok(stream)
        })
    }
}

/// Offline generator that answers by quoting the last user message back
#[derive(Clone)]
pub struct EchoGenerator {
    delay: Duration,
}

impl EchoGenerator {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl Default for EchoGenerator {
    fn default() -> Self {
        Self::new(Duration::from_millis(30))
    }
}

impl MessageGenerator for EchoGenerator {
    fn generate(&self, history: Vec<PromptMessage>) -> BoxFuture<'static, Result<FragmentStream>> {
        let delay = self.delay;
        let last_user = history
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .cloned();

        Box::pin(async move {
            let reply = match last_user {
                Some(message) => {
                    let mut reply = format!("You said:\n\n> {}\n", message.content.trim());
                    if let Some(url) = message.image_url {
                        let shown = if url.starts_with("data:") {
                            "an attached image"
                        } else {
                            url.as_str()
                        };
                        reply.push_str(&format!("\nwith image: {}\n", shown));
                    }
                    reply
                }
                None => "Nothing to echo.".to_string(),
            };

            let words: Vec<String> = reply
                .split_inclusive(' ')
                .map(str::to_string)
                .collect();
            let stream: FragmentStream = Box::pin(async_stream::stream! {
                for word in words {
                    tokio::time::sleep(delay).await;
                    yield Ok(word);
                }
            });
            Ok(stream)
        })
    }
}
