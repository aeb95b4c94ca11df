//! Research sessions over the search tools.

use super::agent_loop::ToolDispatcher;
use super::prompt::build_research_prompt;

/// Tools a research session may use.
pub const RESEARCH_TOOLS: &[&str] = &["arxiv_search", "tavily_search", "wikipedia_search"];

/// Ask the model to find references for `task`.
///
/// Returns the answer text, an abort sentinel, or `[Model Error: ...]` when
/// the model could not be reached.
pub async fn find_references(dispatcher: &ToolDispatcher, model: &str, task: &str) -> String {
    let prompt = build_research_prompt(task, chrono::Local::now().date_naive());
    match dispatcher.run(model, &prompt).await {
        Ok(report) => report.outcome.text(),
        Err(e) => {
            tracing::warn!(error = %e, "Research session failed");
            format!("[Model Error: {}]", e)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::llm::testing::{text, ScriptedClient};
    use crate::llm::LlmError;
    use crate::sink::NoopSink;
    use crate::tools::ToolRegistry;

    #[tokio::test]
    async fn returns_model_answer() {
        let llm = Arc::new(ScriptedClient::new(vec![text(
            "1. https://arxiv.org/abs/2401.00001",
        )]));
        let dispatcher = ToolDispatcher::new(llm.clone(), ToolRegistry::new("."), Arc::new(NoopSink), 5);

        let answer = find_references(&dispatcher, "gpt-4o", "black holes").await;
        assert_eq!(answer, "1. https://arxiv.org/abs/2401.00001");

        let prompt = llm.calls()[0].messages[0].content.clone().unwrap();
        assert!(prompt.contains("Task:\nblack holes"));
        assert!(prompt.contains("Today is "));
    }

    #[tokio::test]
    async fn transport_failure_becomes_text() {
        let llm = Arc::new(ScriptedClient::new(vec![Err(LlmError::Auth(
            "bad key".to_string(),
        ))]));
        let dispatcher = ToolDispatcher::new(llm, ToolRegistry::new("."), Arc::new(NoopSink), 5);

        let answer = find_references(&dispatcher, "gpt-4o", "anything").await;
        assert!(answer.starts_with("[Model Error: "), "{answer}");
        assert!(answer.contains("bad key"));
    }
}
