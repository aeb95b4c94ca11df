use std::sync::Arc;

use crate::llm::{ChatMessage, LlmClient, LlmError};

use super::prompt::generation_prompt;
use super::types::{Artifact, ArtifactKind, Context, Task};

/// Produces the first draft of an artifact with a single model call.
pub struct Generator {
    llm: Arc<dyn LlmClient>,
    kind: ArtifactKind,
}

impl Generator {
    pub fn new(llm: Arc<dyn LlmClient>, kind: ArtifactKind) -> Self {
        Self { llm, kind }
    }

    /// Ask `model` for the artifact at temperature 0 and return it as v1.
    ///
    /// Transport failures are returned as-is; nothing is retried here.
    pub async fn generate(
        &self,
        task: &Task,
        context: &Context,
        model: &str,
    ) -> Result<Artifact, LlmError> {
        let prompt = generation_prompt(self.kind, task, context);
        tracing::debug!(model, kind = ?self.kind, "Generating artifact v1");

        let response = self
            .llm
            .chat_completion(model, &[ChatMessage::user(prompt)], None, Some(0.0))
            .await?;

        let text = response.content.unwrap_or_default().trim().to_string();
        Ok(Artifact::first(self.kind, text))
    }
}
