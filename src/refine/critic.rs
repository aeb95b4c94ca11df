use std::sync::Arc;

use base64::Engine;

use crate::extract::{ensure_tagged_code, extract_structured, RawText};
use crate::llm::{ChatMessage, ImageAttachment, LlmClient, LlmError};
use crate::runner::ExecutionResult;

use super::prompt::critique_prompt;
use super::types::{Artifact, ArtifactKind, Context, Feedback, Task};

/// Evaluates an executed artifact and proposes the next version.
pub struct Critic {
    llm: Arc<dyn LlmClient>,
    temperature: f32,
}

impl Critic {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self {
            llm,
            temperature: 0.0,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Critique `artifact` given what the executor observed and return the
    /// feedback plus version N+1.
    ///
    /// Malformed replies never fail: unusable JSON becomes raw feedback
    /// and a blank or missing refined field keeps the original text. The
    /// executor is not invoked here.
    pub async fn refine(
        &self,
        task: &Task,
        artifact: &Artifact,
        result: &ExecutionResult,
        context: &Context,
        model: &str,
    ) -> Result<(Feedback, Artifact), LlmError> {
        let prompt = critique_prompt(
            artifact.kind,
            task,
            &artifact.text,
            &result.render_for_prompt(),
            context,
        );

        let mut message = ChatMessage::user(prompt);
        if let Some(image) = load_image(result).await {
            message = message.with_image(image);
        }

        tracing::debug!(model, version = artifact.version, "Critiquing artifact");
        let response = self
            .llm
            .chat_completion(model, &[message], None, Some(self.temperature))
            .await?;
        let reply = response.content.unwrap_or_default();
        tracing::debug!(version = artifact.version, reply = %reply, "Critic reply");

        Ok(parse_critique(&reply, artifact))
    }
}

/// Turn a critic reply into feedback and the next artifact version.
pub fn parse_critique(reply: &str, artifact: &Artifact) -> (Feedback, Artifact) {
    let field = artifact.kind.refined_field();

    match extract_structured(reply, &["feedback", field]) {
        Ok(parsed) => {
            let refined = parsed
                .non_empty(field)
                .map(|text| normalize(artifact.kind, &text))
                .filter(|text| !text.is_empty())
                .unwrap_or_else(|| artifact.text.clone());

            let feedback = Feedback {
                evaluated_version: artifact.version,
                critique: parsed.text("feedback").unwrap_or_default(),
                degraded: false,
                raw_reply: reply.to_string(),
            };
            (feedback, artifact.derive(refined))
        }
        Err(RawText(raw)) => {
            tracing::warn!(
                version = artifact.version,
                "Critic reply was not JSON; keeping the artifact unchanged"
            );
            let feedback = Feedback {
                evaluated_version: artifact.version,
                critique: raw.trim().to_string(),
                degraded: true,
                raw_reply: raw,
            };
            (feedback, artifact.derive(artifact.text.clone()))
        }
    }
}

fn normalize(kind: ArtifactKind, text: &str) -> String {
    match kind {
        ArtifactKind::Sql => text.trim().to_string(),
        ArtifactKind::Code => ensure_tagged_code(text, ArtifactKind::CODE_TAG),
    }
}

async fn load_image(result: &ExecutionResult) -> Option<ImageAttachment> {
    let (path, media_type) = result.image()?;
    match tokio::fs::read(path).await {
        Ok(bytes) => Some(ImageAttachment {
            media_type: media_type.to_string(),
            data: base64::engine::general_purpose::STANDARD.encode(bytes),
        }),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Could not attach output image");
            None
        }
    }
}
