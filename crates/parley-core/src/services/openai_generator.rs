use anyhow::Result;
use futures::{Stream, StreamExt};
use serde::Deserialize;
use serde_json::{Value, json};
use thiserror::Error;
use tracing::{debug, warn};

use super::generator::{FragmentStream, MessageGenerator};
use super::sse::{SseEvent, SseLineParser};
use crate::models::PromptMessage;
use crate::repositories::conversation_repository::BoxFuture;

#[derive(Error, Debug)]
pub enum GeneratorError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("provider error: {0}")]
    Provider(String),

    #[error("malformed stream event: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("stream ended before the reply was complete")]
    Truncated,
}

/// Connection settings for an OpenAI-compatible `/chat/completions` endpoint
#[derive(Clone, Debug)]
pub struct OpenAiConfig {
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub system_prompt: Option<String>,
}

/// Streams assistant replies from an OpenAI-compatible server
#[derive(Clone)]
pub struct OpenAiGenerator {
    client: reqwest::Client,
    config: OpenAiConfig,
}

impl OpenAiGenerator {
    pub fn new(config: OpenAiConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        )
    }
}

/// Build the JSON request body; messages with an image use content parts
pub fn build_request_body(
    model: &str,
    system_prompt: Option<&str>,
    history: &[PromptMessage],
) -> Value {
    let mut messages = Vec::with_capacity(history.len() + 1);
    if let Some(prompt) = system_prompt.filter(|p| !p.trim().is_empty()) {
        messages.push(json!({ "role": "system", "content": prompt }));
    }

    for message in history {
        let content = match &message.image_url {
            Some(url) => json!([
                { "type": "text", "text": message.content },
                { "type": "image_url", "image_url": { "url": url } },
            ]),
            None => Value::String(message.content.clone()),
        };
        messages.push(json!({ "role": message.role.as_str(), "content": content }));
    }

    json!({
        "model": model,
        "stream": true,
        "messages": messages,
    })
}

#[derive(Deserialize)]
struct ChunkPayload {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
    error: Option<Value>,
}

#[derive(Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: ChunkDelta,
    finish_reason: Option<String>,
}

#[derive(Deserialize, Default)]
struct ChunkDelta {
    content: Option<String>,
}

/// What one stream event contributes to the reply
#[derive(Debug, Default, PartialEq, Eq)]
pub struct StreamDelta {
    pub text: Option<String>,
    /// The server reported a `finish_reason`; the reply is complete
    pub finished: bool,
}

/// Extract the text delta carried by one stream event.
///
/// Role announcements carry no text.
pub fn parse_stream_event(event: &SseEvent) -> Result<StreamDelta, GeneratorError> {
    let payload: ChunkPayload = serde_json::from_str(&event.data)?;
    if let Some(error) = payload.error {
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string());
        return Err(GeneratorError::Provider(message));
    }

    let mut delta = StreamDelta::default();
    let mut text = String::new();
    for choice in payload.choices {
        if let Some(content) = choice.delta.content {
            text.push_str(&content);
        }
        delta.finished |= choice.finish_reason.is_some();
    }
    delta.text = (!text.is_empty()).then_some(text);
    Ok(delta)
}

/// Turn a chunked SSE response body into text fragments.
///
/// The reply counts as complete once `[DONE]` or a `finish_reason` arrives.
/// A body that ends before either yields [`GeneratorError::Truncated`], so a
/// connection dropped mid-answer is never taken for a finished reply.
pub fn fragments_from_body<S, B, E>(body: S) -> FragmentStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Into<GeneratorError> + Send + 'static,
{
    Box::pin(async_stream::stream! {
        let mut body = Box::pin(body);
        let mut parser = SseLineParser::new();
        let mut finished = false;

        'body: while let Some(chunk) = body.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    let error: GeneratorError = e.into();
                    yield Err(anyhow::Error::from(error));
                    return;
                }
            };
            for event in parser.push(chunk.as_ref()) {
                if event.is_done() {
                    finished = true;
                    break 'body;
                }
                match parse_stream_event(&event) {
                    Ok(delta) => {
                        finished |= delta.finished;
                        if let Some(text) = delta.text {
                            yield Ok(text);
                        }
                    }
                    Err(e) => {
                        yield Err(anyhow::Error::from(e));
                        return;
                    }
                }
            }
        }

        if !finished {
            // A final event may lack its blank-line terminator
            match parser.finish() {
                Some(event) if event.is_done() => finished = true,
                Some(event) => match parse_stream_event(&event) {
                    Ok(delta) => {
                        finished = delta.finished;
                        if let Some(text) = delta.text {
                            yield Ok(text);
                        }
                    }
                    Err(e) => {
                        yield Err(anyhow::Error::from(e));
                        return;
                    }
                },
                None => {}
            }
        }

        if !finished {
            warn!("Stream ended without [DONE] marker or finish reason");
            yield Err(anyhow::Error::from(GeneratorError::Truncated));
        }
    })
}

impl MessageGenerator for OpenAiGenerator {
    fn generate(&self, history: Vec<PromptMessage>) -> BoxFuture<'static, Result<FragmentStream>> {
        let body = build_request_body(
            &self.config.model,
            self.config.system_prompt.as_deref(),
            &history,
        );
        let mut request = self.client.post(self.endpoint()).json(&body);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }
        let model = self.config.model.clone();

        Box::pin(async move {
            debug!(model = %model, messages = history.len(), "Sending chat completion request");
            let response = request.send().await.map_err(GeneratorError::from)?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(GeneratorError::Status {
                    status: status.as_u16(),
                    body,
                }
                .into());
            }

            Ok(fragments_from_body(response.bytes_stream()))
        })
    }
}
