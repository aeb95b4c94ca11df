//! Tool-calling session loop.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::llm::{ChatMessage, ChatResponse, LlmClient, LlmError, ToolCall};
use crate::sink::{emit_quietly, EmitKind, Sink};
use crate::tools::ToolRegistry;

use super::conversation::Conversation;

/// Where a session currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchState {
    AwaitingModel,
    DispatchingTools,
    Done,
    Aborted,
}

impl fmt::Display for DispatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::AwaitingModel => "awaiting_model",
            Self::DispatchingTools => "dispatching_tools",
            Self::Done => "done",
            Self::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

/// Why a session stopped without an answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum AbortReason {
    /// The turn budget ran out while the model kept calling tools.
    BudgetExhausted { max_turns: usize },

    /// The model answered with neither content nor tool calls.
    UnexpectedShape { detail: String },
}

impl AbortReason {
    /// Text returned in place of an answer.
    pub fn sentinel(&self) -> String {
        match self {
            Self::BudgetExhausted { max_turns } => {
                format!("[Aborted: turn budget exhausted after {} turns]", max_turns)
            }
            Self::UnexpectedShape { detail } => {
                format!("[Aborted: unexpected model response: {}]", detail)
            }
        }
    }
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.sentinel())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum SessionOutcome {
    Done(String),
    Aborted(AbortReason),
}

impl SessionOutcome {
    /// The final answer, or the abort sentinel.
    pub fn text(&self) -> String {
        match self {
            Self::Done(content) => content.clone(),
            Self::Aborted(reason) => reason.sentinel(),
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done(_))
    }

    pub fn state(&self) -> DispatchState {
        match self {
            Self::Done(_) => DispatchState::Done,
            Self::Aborted(_) => DispatchState::Aborted,
        }
    }
}

/// One executed tool call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolResult {
    pub call_id: String,
    pub name: String,
    pub arguments: String,
    pub output: String,
    pub is_error: bool,
}

/// Everything a session produced.
#[derive(Debug, Clone)]
pub struct SessionReport {
    pub session_id: Uuid,
    pub outcome: SessionOutcome,
    pub conversation: Conversation,
    /// Model calls issued
    pub turns: usize,
    pub tool_results: Vec<ToolResult>,
}

/// Drives a model through tool calls until it answers or the budget runs out.
pub struct ToolDispatcher {
    llm: Arc<dyn LlmClient>,
    tools: ToolRegistry,
    sink: Arc<dyn Sink>,
    max_turns: usize,
    temperature: Option<f32>,
}

impl ToolDispatcher {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        tools: ToolRegistry,
        sink: Arc<dyn Sink>,
        max_turns: usize,
    ) -> Self {
        Self {
            llm,
            tools,
            sink,
            max_turns,
            temperature: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn max_turns(&self) -> usize {
        self.max_turns
    }

    /// Run a session starting from `task` as the only message.
    ///
    /// Tool failures are fed back to the model. Only transport errors from
    /// the model call are returned as `Err`.
    pub async fn run(&self, model: &str, task: &str) -> Result<SessionReport, LlmError> {
        let session_id = Uuid::new_v4();
        let schemas = self.tools.get_tool_schemas();
        let advertised = if schemas.is_empty() {
            None
        } else {
            Some(schemas.as_slice())
        };

        tracing::info!(%session_id, model, tools = schemas.len(), max_turns = self.max_turns, "Starting tool session");
        emit_quietly(self.sink.as_ref(), "Prompt", task, EmitKind::Text);

        let mut conversation = Conversation::new(task);
        let mut tool_results = Vec::new();
        let mut turns = 0;
        let mut state = DispatchState::AwaitingModel;

        let outcome = loop {
            debug_assert_eq!(state, DispatchState::AwaitingModel);

            if turns >= self.max_turns {
                tracing::warn!(%session_id, turns, "Turn budget exhausted");
                break SessionOutcome::Aborted(AbortReason::BudgetExhausted {
                    max_turns: self.max_turns,
                });
            }

            tracing::debug!(%session_id, turn = turns + 1, messages = conversation.len(), "Calling model");
            let response = self
                .llm
                .chat_completion(model, conversation.messages(), advertised, self.temperature)
                .await?;
            turns += 1;

            let calls = response.requested_tools();
            if !calls.is_empty() {
                state = DispatchState::DispatchingTools;
                tracing::debug!(%session_id, %state, count = calls.len(), "Dispatching tool calls");

                conversation = conversation.append(ChatMessage::assistant_tool_calls(
                    response.content.clone(),
                    calls.to_vec(),
                ));

                for call in calls {
                    let result = self.dispatch(call).await;
                    conversation = conversation
                        .append(ChatMessage::tool_result(&call.id, result.output.clone()));
                    tool_results.push(result);
                }

                state = DispatchState::AwaitingModel;
                continue;
            }

            if let Some(content) = response.text() {
                conversation = conversation.append(ChatMessage::assistant(content));
                break SessionOutcome::Done(content.to_string());
            }

            let detail = describe_empty_response(&response);
            tracing::warn!(%session_id, turn = turns, %detail, "Model returned neither content nor tool calls");
            break SessionOutcome::Aborted(AbortReason::UnexpectedShape { detail });
        };

        tracing::info!(%session_id, state = %outcome.state(), turns, tool_calls = tool_results.len(), "Tool session finished");
        let kind = if outcome.is_done() {
            EmitKind::Text
        } else {
            EmitKind::Warning
        };
        emit_quietly(self.sink.as_ref(), "Response", &outcome.text(), kind);

        Ok(SessionReport {
            session_id,
            outcome,
            conversation,
            turns,
            tool_results,
        })
    }

    /// Execute one call. Errors are rendered into the result text.
    async fn dispatch(&self, call: &ToolCall) -> ToolResult {
        let name = &call.function.name;
        emit_quietly(
            self.sink.as_ref(),
            &format!("Tool call: {}", name),
            &call.function.arguments,
            EmitKind::Json,
        );

        let outcome = match parse_arguments(&call.function.arguments) {
            Ok(args) => {
                self.tools
                    .execute(name, args, self.tools.workspace())
                    .await
            }
            Err(e) => Err(anyhow::anyhow!("Invalid arguments for {}: {}", name, e)),
        };

        let (output, is_error) = match outcome {
            Ok(output) => (output, false),
            Err(e) => {
                tracing::warn!(tool = %name, error = %e, "Tool call failed");
                (format!("Error: {}", e), true)
            }
        };

        emit_quietly(
            self.sink.as_ref(),
            &format!("Tool result: {}", name),
            &output,
            if is_error { EmitKind::Warning } else { EmitKind::Text },
        );

        ToolResult {
            call_id: call.id.clone(),
            name: name.clone(),
            arguments: call.function.arguments.clone(),
            output,
            is_error,
        }
    }
}

/// Decode tool arguments. A blank string means no arguments.
fn parse_arguments(raw: &str) -> Result<Value, serde_json::Error> {
    if raw.trim().is_empty() {
        return Ok(Value::Object(Default::default()));
    }
    serde_json::from_str(raw)
}

/// What an answer-less response actually carried.
fn describe_empty_response(response: &ChatResponse) -> String {
    let content = match response.content.as_deref() {
        None => "absent".to_string(),
        Some(text) if text.is_empty() => "empty (0 chars)".to_string(),
        Some(text) => format!("whitespace-only ({} chars)", text.chars().count()),
    };
    let usage = match response.usage {
        Some(u) => format!(
            "{} prompt + {} completion = {} tokens",
            u.prompt_tokens, u.completion_tokens, u.total_tokens
        ),
        None => "not reported".to_string(),
    };
    format!("no tool calls; content {}; usage {}", content, usage)
}
