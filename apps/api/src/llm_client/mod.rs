/// LLM client. Single point of entry for all completion calls in the intake engine.
///
/// ARCHITECTURAL RULE: No other module may call the Anthropic API directly.
/// Chains build a `CompletionRequest` and hand it to a `CompletionService`;
/// `LlmClient` is the production implementation, tests inject scripted ones.
///
/// Nothing here retries. A failed call fails the current turn and the caller re-issues it.
use std::pin::Pin;

use async_trait::async_trait;
use futures::stream::{Stream, StreamExt};
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::chains::ChainKind;

pub mod embeddings;
pub mod prompts;

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
/// The model used for every chain.
pub const MODEL: &str = "claude-sonnet-4-5";
const DEFAULT_MAX_TOKENS: u32 = 1024;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("LLM returned empty content")]
    EmptyContent,

    #[error("Stream error: {0}")]
    Stream(String),
}

/// A finite, non-restartable sequence of text chunks. Dropping it cancels generation.
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String, LlmError>> + Send>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// One call to the completion service, tagged with the chain that issued it.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub chain: ChainKind,
    pub system: String,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl CompletionRequest {
    pub fn new(chain: ChainKind, system: impl Into<String>) -> Self {
        Self {
            chain,
            system: system.into(),
            messages: Vec::new(),
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: 0.7,
        }
    }

    pub fn message(mut self, message: ChatMessage) -> Self {
        self.messages.push(message);
        self
    }

    pub fn messages(mut self, messages: impl IntoIterator<Item = ChatMessage>) -> Self {
        self.messages.extend(messages);
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

/// The completion service seam. Carried in `AppState` as `Arc<dyn CompletionService>`.
#[async_trait]
pub trait CompletionService: Send + Sync {
    /// Runs the request to completion and returns the full text.
    async fn complete(&self, request: CompletionRequest) -> Result<String, LlmError>;

    /// Starts a streamed completion. Status errors surface here, before any chunk;
    /// mid-stream failures arrive as an `Err` item and end the stream.
    async fn stream(&self, request: CompletionRequest) -> Result<TextStream, LlmError>;
}

/// Calls the service and deserializes the text response as JSON.
/// The prompt must instruct the model to return valid JSON.
pub async fn complete_json<T: DeserializeOwned>(
    service: &dyn CompletionService,
    request: CompletionRequest,
) -> Result<T, LlmError> {
    let text = service.complete(request).await?;
    serde_json::from_str(strip_json_fences(&text)).map_err(LlmError::Parse)
}

#[derive(Debug, Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    stream: bool,
}

#[derive(Debug, Deserialize)]
pub struct LlmResponse {
    pub content: Vec<ContentBlock>,
    pub usage: Usage,
}

#[derive(Debug, Deserialize)]
pub struct ContentBlock {
    #[serde(rename = "type")]
    pub block_type: String,
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl LlmResponse {
    /// Extracts the text content from the first text block.
    pub fn text(&self) -> Option<&str> {
        self.content
            .iter()
            .find(|b| b.block_type == "text")
            .and_then(|b| b.text.as_deref())
    }
}

#[derive(Debug, Deserialize)]
struct AnthropicError {
    error: AnthropicErrorBody,
}

#[derive(Debug, Deserialize)]
struct AnthropicErrorBody {
    message: String,
}

#[derive(Debug, Deserialize)]
struct StreamPayload {
    #[serde(rename = "type")]
    kind: String,
    delta: Option<StreamDelta>,
    error: Option<AnthropicErrorBody>,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    text: Option<String>,
}

#[derive(Debug, PartialEq)]
enum StreamEvent {
    Text(String),
    Stop,
    Skip,
}

/// Wraps the Anthropic Messages API, plain and server-sent-event streaming.
#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    api_key: String,
}

impl LlmClient {
    pub fn new(api_key: String) -> Result<Self, LlmError> {
        Ok(Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(120))
                .build()?,
            api_key,
        })
    }

    async fn send(
        &self,
        request: &CompletionRequest,
        stream: bool,
    ) -> Result<reqwest::Response, LlmError> {
        let messages = normalize_messages(&request.messages);
        let body = AnthropicRequest {
            model: MODEL,
            max_tokens: request.max_tokens,
            system: &request.system,
            messages: &messages,
            temperature: request.temperature,
            stream,
        };

        debug!(
            "Calling completion service: chain={} messages={} stream={}",
            request.chain.as_str(),
            messages.len(),
            stream
        );

        let response = self
            .client
            .post(ANTHROPIC_API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("LLM API returned {} for chain {}", status, request.chain.as_str());
            let message = serde_json::from_str::<AnthropicError>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(LlmError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response)
    }
}

#[async_trait]
impl CompletionService for LlmClient {
    async fn complete(&self, request: CompletionRequest) -> Result<String, LlmError> {
        let response = self.send(&request, false).await?;
        let llm_response: LlmResponse = response.json().await?;

        debug!(
            "LLM call succeeded: chain={} input_tokens={} output_tokens={}",
            request.chain.as_str(),
            llm_response.usage.input_tokens,
            llm_response.usage.output_tokens
        );

        llm_response
            .text()
            .filter(|t| !t.trim().is_empty())
            .map(str::to_string)
            .ok_or(LlmError::EmptyContent)
    }

    async fn stream(&self, request: CompletionRequest) -> Result<TextStream, LlmError> {
        let response = self.send(&request, true).await?;
        Ok(sse_text_stream(response.bytes_stream(), request.chain))
    }
}

/// Turns a server-sent-event byte stream into text deltas. Lines are split on
/// raw bytes so a code point spanning two network chunks decodes intact.
fn sse_text_stream<S, B, E>(body: S, chain: ChainKind) -> TextStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Into<LlmError> + Send + 'static,
{
    let mut body = Box::pin(body);
    let stream = async_stream::stream! {
        let mut buffer: Vec<u8> = Vec::new();
        while let Some(chunk) = body.next().await {
            let chunk = match chunk {
                Ok(bytes) => bytes,
                Err(e) => {
                    yield Err(e.into());
                    return;
                }
            };
            buffer.extend_from_slice(chunk.as_ref());

            while let Some(newline) = buffer.iter().position(|b| *b == b'\n') {
                let raw: Vec<u8> = buffer.drain(..=newline).collect();
                let line = match std::str::from_utf8(&raw) {
                    Ok(line) => line,
                    Err(e) => {
                        yield Err(LlmError::Stream(format!("invalid UTF-8 in event stream: {e}")));
                        return;
                    }
                };
                match parse_sse_line(line.trim()) {
                    Ok(StreamEvent::Text(text)) => yield Ok(text),
                    Ok(StreamEvent::Stop) => {
                        debug!("Stream finished: chain={}", chain.as_str());
                        return;
                    }
                    Ok(StreamEvent::Skip) => {}
                    Err(e) => {
                        yield Err(e);
                        return;
                    }
                }
            }
        }
        // No message_stop: the caller must not mistake this for a finished turn.
        yield Err(LlmError::Stream(format!(
            "{} stream ended before message_stop",
            chain.as_str()
        )));
    };

    Box::pin(stream)
}

/// Drops empty messages, merges consecutive same-role messages, and makes sure
/// the conversation opens with a user message as the Messages API requires.
fn normalize_messages(messages: &[ChatMessage]) -> Vec<ChatMessage> {
    let mut normalized: Vec<ChatMessage> = Vec::with_capacity(messages.len());

    for message in messages.iter().filter(|m| !m.content.trim().is_empty()) {
        match normalized.last_mut() {
            Some(last) if last.role == message.role => {
                last.content.push_str("\n\n");
                last.content.push_str(&message.content);
            }
            _ => normalized.push(message.clone()),
        }
    }

    if normalized.first().map(|m| m.role) == Some(Role::Assistant) {
        normalized.insert(0, ChatMessage::user("Hello"));
    }

    normalized
}

fn parse_sse_line(line: &str) -> Result<StreamEvent, LlmError> {
    let Some(data) = line.strip_prefix("data:") else {
        return Ok(StreamEvent::Skip);
    };

    let payload: StreamPayload = serde_json::from_str(data.trim())?;
    match payload.kind.as_str() {
        "content_block_delta" => Ok(payload
            .delta
            .and_then(|d| d.text)
            .map(StreamEvent::Text)
            .unwrap_or(StreamEvent::Skip)),
        "message_stop" => Ok(StreamEvent::Stop),
        "error" => Err(LlmError::Stream(
            payload
                .error
                .map(|e| e.message)
                .unwrap_or_else(|| "unknown stream error".to_string()),
        )),
        _ => Ok(StreamEvent::Skip),
    }
}

/// Strips ```json ... ``` or ``` ... ``` code fences from LLM output.
fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    if let Some(stripped) = text.strip_prefix("```json") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else if let Some(stripped) = text.strip_prefix("```") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else {
        text
    }
}
