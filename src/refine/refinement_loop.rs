//! Generate, execute, critique, execute again.

use std::sync::Arc;

use serde::Serialize;

use crate::llm::LlmError;
use crate::runner::{ArtifactRunner, ExecutionResult};
use crate::sink::{emit_quietly, EmitKind, Sink};

use super::critic::Critic;
use super::generator::Generator;
use super::types::{Artifact, Context, Feedback, Task};

/// Everything one refinement round produced.
#[derive(Debug, Clone, Serialize)]
pub struct RefinementReport {
    pub artifact_v1: Artifact,
    pub result_v1: ExecutionResult,
    pub feedback: Feedback,
    pub artifact_v2: Artifact,
    pub result_v2: ExecutionResult,
}

impl RefinementReport {
    /// The critic kept the artifact text as it was.
    pub fn converged(&self) -> bool {
        self.artifact_v1.text == self.artifact_v2.text
    }
}

/// One round of generate → execute → critique → execute.
pub struct RefinementLoop {
    generator: Generator,
    critic: Critic,
    runner: Arc<dyn ArtifactRunner>,
    sink: Arc<dyn Sink>,
}

impl RefinementLoop {
    pub fn new(
        generator: Generator,
        critic: Critic,
        runner: Arc<dyn ArtifactRunner>,
        sink: Arc<dyn Sink>,
    ) -> Self {
        Self {
            generator,
            critic,
            runner,
            sink,
        }
    }

    /// Run exactly one refinement round.
    ///
    /// Both versions and both execution results are returned; picking the
    /// better one is left to the caller.
    pub async fn run(
        &self,
        task: &Task,
        context: &Context,
        model_gen: &str,
        model_eval: &str,
    ) -> Result<RefinementReport, LlmError> {
        let sink = self.sink.as_ref();
        emit_quietly(sink, "Task", task.as_str(), EmitKind::Text);
        emit_quietly(sink, "Context", &context.text, EmitKind::Text);

        let context_v1 = context.with_output_target(self.runner.output_target(1));
        let artifact_v1 = self.generator.generate(task, &context_v1, model_gen).await?;
        let label = artifact_v1.kind.label();
        emit_quietly(sink, &format!("{label} (v1)"), &artifact_v1.text, EmitKind::Code);

        let result_v1 = self.runner.run(&artifact_v1).await;
        emit_result(sink, &format!("Execute v1 ({label})"), &result_v1);

        let context_v2 = context.with_output_target(self.runner.output_target(2));
        let (feedback, artifact_v2) = self
            .critic
            .refine(task, &artifact_v1, &result_v1, &context_v2, model_eval)
            .await?;
        let (reply_kind, feedback_kind) = if feedback.degraded {
            (EmitKind::Warning, EmitKind::Warning)
        } else {
            (EmitKind::Json, EmitKind::Text)
        };
        emit_quietly(sink, "Critic reply (raw)", &feedback.raw_reply, reply_kind);
        emit_quietly(sink, "Feedback on v1", &feedback.critique, feedback_kind);
        emit_quietly(sink, &format!("{label} (v2)"), &artifact_v2.text, EmitKind::Code);

        let result_v2 = self.runner.run(&artifact_v2).await;
        emit_result(sink, &format!("Execute v2 ({label})"), &result_v2);

        tracing::info!(
            converged = artifact_v1.text == artifact_v2.text,
            v1_ok = result_v1.is_success(),
            v2_ok = result_v2.is_success(),
            "Refinement round finished"
        );

        Ok(RefinementReport {
            artifact_v1,
            result_v1,
            feedback,
            artifact_v2,
            result_v2,
        })
    }
}

fn emit_result(sink: &dyn Sink, title: &str, result: &ExecutionResult) {
    let kind = match result {
        ExecutionResult::Table(_) => EmitKind::Table,
        ExecutionResult::File { .. } if result.image().is_some() => EmitKind::Image,
        ExecutionResult::Failed(_) => EmitKind::Warning,
        _ => EmitKind::Text,
    };
    emit_quietly(sink, title, &result.render_for_prompt(), kind);
}
