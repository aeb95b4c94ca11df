//! OpenAI-compatible chat-completion client.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, error};

use super::{ChatMessage, ChatResponse, LlmClient, LlmError, ToolCall, ToolSchema, TokenUsage};

/// Client for any endpoint speaking the OpenAI `/chat/completions` dialect.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    api_key: String,
    base_url: String,
    client: Client,
}

impl OpenAiClient {
    pub fn new(api_key: String, base_url: impl Into<String>) -> Self {
        Self {
            api_key,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: Client::new(),
        }
    }

    /// Strip a `provider:` prefix (`openai:gpt-4.1` -> `gpt-4.1`).
    pub fn normalize_model_id(model: &str) -> &str {
        match model.split_once(':') {
            Some((provider, rest))
                if !provider.is_empty() && provider.chars().all(|c| c.is_ascii_alphanumeric()) =>
            {
                rest
            }
            _ => model,
        }
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn chat_completion(
        &self,
        model: &str,
        messages: &[ChatMessage],
        tools: Option<&[ToolSchema]>,
        temperature: Option<f32>,
    ) -> Result<ChatResponse, LlmError> {
        let model = Self::normalize_model_id(model);
        debug!(
            model,
            message_count = messages.len(),
            tool_count = tools.map_or(0, |t| t.len()),
            "Sending chat completion"
        );

        let request = WireRequest {
            model,
            messages: messages.iter().map(to_wire).collect(),
            tools: tools.filter(|t| !t.is_empty()),
            tool_choice: tools.filter(|t| !t.is_empty()).map(|_| "auto"),
            temperature,
        };

        let url = format!("{}/chat/completions", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to send chat completion request");
                LlmError::Network(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            error!(status = %status, body = %body, "Chat completion returned error status");

            return Err(match status.as_u16() {
                401 | 403 => LlmError::Auth(body),
                402 | 429 => LlmError::RateLimited(body),
                code => LlmError::Api { status: code, body },
            });
        }

        let parsed: WireResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Decode(e.to_string()))?;

        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::Decode("response has no choices".to_string()))?;

        Ok(ChatResponse {
            content: choice.message.content,
            tool_calls: choice.message.tool_calls.filter(|c| !c.is_empty()),
            usage: parsed.usage,
        })
    }
}

/// Convert a message into the wire shape. Messages with images use the
/// content-parts form; everything else sends plain text.
fn to_wire(message: &ChatMessage) -> Value {
    let mut wire = json!({ "role": message.role });

    if message.images.is_empty() {
        wire["content"] = match &message.content {
            Some(text) => Value::String(text.clone()),
            None => Value::Null,
        };
    } else {
        let mut parts = Vec::new();
        if let Some(text) = &message.content {
            parts.push(json!({ "type": "text", "text": text }));
        }
        for image in &message.images {
            parts.push(json!({
                "type": "image_url",
                "image_url": { "url": image.data_url(), "detail": "auto" }
            }));
        }
        wire["content"] = Value::Array(parts);
    }

    if let Some(calls) = &message.tool_calls {
        wire["tool_calls"] = json!(calls);
    }
    if let Some(id) = &message.tool_call_id {
        wire["tool_call_id"] = Value::String(id.clone());
    }

    wire
}

#[derive(Debug, Serialize)]
struct WireRequest<'a> {
    model: &'a str,
    messages: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<&'a [ToolSchema]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    choices: Vec<WireChoice>,
    usage: Option<TokenUsage>,
}

#[derive(Debug, Deserialize)]
struct WireChoice {
    message: WireMessage,
}

#[derive(Debug, Deserialize)]
struct WireMessage {
    content: Option<String>,
    tool_calls: Option<Vec<ToolCall>>,
}
