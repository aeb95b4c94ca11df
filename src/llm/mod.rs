//! LLM module - chat-completion types and the client seam.
//!
//! Everything the loops know about a model goes through [`LlmClient`]:
//! an ordered list of role-tagged messages goes in, and either text
//! content or a set of tool-call requests comes back.

mod error;
mod openai;

pub use error::LlmError;
pub use openai::OpenAiClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Message role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// An image sent alongside a user message (base64 encoded).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageAttachment {
    /// MIME type, e.g. `image/png`
    pub media_type: String,

    /// Base64 payload without the data-URL prefix
    pub data: String,
}

impl ImageAttachment {
    /// Render as a `data:` URL.
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.media_type, self.data)
    }
}

/// A single turn in a conversation.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: Option<String>,
    pub tool_calls: Option<Vec<ToolCall>>,
    pub tool_call_id: Option<String>,
    pub images: Vec<ImageAttachment>,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self::text(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::text(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::text(Role::Assistant, content)
    }

    /// Assistant turn that requested tool calls.
    pub fn assistant_tool_calls(content: Option<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            role: Role::Assistant,
            content,
            tool_calls: Some(tool_calls),
            tool_call_id: None,
            images: Vec::new(),
        }
    }

    /// Tool result turn answering the call with `tool_call_id`.
    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: Some(tool_call_id.into()),
            images: Vec::new(),
        }
    }

    pub fn with_image(mut self, image: ImageAttachment) -> Self {
        self.images.push(image);
        self
    }

    fn text(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
            images: Vec::new(),
        }
    }
}

/// A tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,

    #[serde(rename = "type", default = "default_call_type")]
    pub call_type: String,

    pub function: FunctionCall,
}

impl ToolCall {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            call_type: default_call_type(),
            function: FunctionCall {
                name: name.into(),
                arguments: arguments.into(),
            },
        }
    }
}

fn default_call_type() -> String {
    "function".to_string()
}

/// Function name plus its JSON-encoded arguments, as sent by the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    pub arguments: String,
}

/// Tool definition advertised to the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSchema {
    #[serde(rename = "type")]
    pub tool_type: String,
    pub function: FunctionSchema,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionSchema {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// Token accounting reported by the provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

/// The assistant message of a completion.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatResponse {
    pub content: Option<String>,
    pub tool_calls: Option<Vec<ToolCall>>,
    pub usage: Option<TokenUsage>,
}

impl ChatResponse {
    /// Text content, if present and not blank.
    pub fn text(&self) -> Option<&str> {
        self.content.as_deref().filter(|c| !c.trim().is_empty())
    }

    /// Requested tool calls, if any.
    pub fn requested_tools(&self) -> &[ToolCall] {
        self.tool_calls.as_deref().unwrap_or_default()
    }
}

/// A chat-completion backend.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Send one completion request.
    ///
    /// `tools` advertises callable functions; `temperature` is passed
    /// through when set.
    async fn chat_completion(
        &self,
        model: &str,
        messages: &[ChatMessage],
        tools: Option<&[ToolSchema]>,
        temperature: Option<f32>,
    ) -> Result<ChatResponse, LlmError>;
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted client used by the loop tests.

    use std::collections::VecDeque;
    use std::sync::Mutex;

    use super::*;

    /// A recorded request.
    #[derive(Debug, Clone)]
    pub struct RecordedCall {
        pub model: String,
        pub messages: Vec<ChatMessage>,
        pub tool_names: Vec<String>,
        pub temperature: Option<f32>,
    }

    /// Replays canned responses in order and records every request.
    #[derive(Default)]
    pub struct ScriptedClient {
        replies: Mutex<VecDeque<Result<ChatResponse, LlmError>>>,
        repeat: Option<ChatResponse>,
        calls: Mutex<Vec<RecordedCall>>,
    }

    impl ScriptedClient {
        pub fn new(replies: Vec<Result<ChatResponse, LlmError>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                ..Self::default()
            }
        }

        /// Answer every request with the same response.
        pub fn repeating(reply: ChatResponse) -> Self {
            Self {
                repeat: Some(reply),
                ..Self::default()
            }
        }

        pub fn calls(&self) -> Vec<RecordedCall> {
            self.calls.lock().unwrap().clone()
        }
    }

    pub fn text(content: &str) -> Result<ChatResponse, LlmError> {
        Ok(ChatResponse {
            content: Some(content.to_string()),
            ..ChatResponse::default()
        })
    }

    pub fn tools(calls: Vec<ToolCall>) -> Result<ChatResponse, LlmError> {
        Ok(ChatResponse {
            tool_calls: Some(calls),
            ..ChatResponse::default()
        })
    }

    #[async_trait]
    impl LlmClient for ScriptedClient {
        async fn chat_completion(
            &self,
            model: &str,
            messages: &[ChatMessage],
            tools: Option<&[ToolSchema]>,
            temperature: Option<f32>,
        ) -> Result<ChatResponse, LlmError> {
            self.calls.lock().unwrap().push(RecordedCall {
                model: model.to_string(),
                messages: messages.to_vec(),
                tool_names: tools
                    .unwrap_or_default()
                    .iter()
                    .map(|t| t.function.name.clone())
                    .collect(),
                temperature,
            });

            if let Some(reply) = &self.repeat {
                return Ok(reply.clone());
            }
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(LlmError::Network("script exhausted".to_string())))
        }
    }
}
