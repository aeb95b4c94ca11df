//! Prompt templates for the generator and the critic.

use super::types::{ArtifactKind, Context, Task};

/// Prompt asking for a first-draft artifact and nothing else.
pub fn generation_prompt(kind: ArtifactKind, task: &Task, context: &Context) -> String {
    match kind {
        ArtifactKind::Sql => format!(
            r#"You are a SQL assistant. Given the schema and the user's question, write a SQL query for SQLite.

Schema:
{schema}

User question:
{task}

Respond with the SQL only."#,
            schema = context.text,
            task = task,
        ),
        ArtifactKind::Code => format!(
            r#"You are a data visualization expert.

Return your answer *strictly* in this format:

<execute_python>
# valid python code here
</execute_python>

Do not add explanations, only the tags and the code.

The code should create a visualization from a DataFrame 'df' with these columns:
{columns}

User instruction: {task}

Requirements for the code:
1. Assume the DataFrame is already loaded as 'df'.
2. Use matplotlib for plotting.
3. Add clear title, axis labels, and legend if needed.
{save_rule}
5. Do not call plt.show().
6. Close all plots with plt.close().

Return ONLY the code wrapped in <execute_python> tags."#,
            columns = context.text,
            task = task,
            save_rule = save_rule(context),
        ),
    }
}

/// Prompt asking for a critique plus a revised artifact as strict JSON.
pub fn critique_prompt(
    kind: ArtifactKind,
    task: &Task,
    artifact: &str,
    observed: &str,
    context: &Context,
) -> String {
    let field = kind.refined_field();
    match kind {
        ArtifactKind::Sql => format!(
            r#"You are a SQL reviewer and refiner.

User asked:
{task}

Original SQL:
{artifact}

SQL Output:
{observed}

Table Schema:
{schema}

Step 1: Briefly evaluate if the SQL output answers the user's question.
Step 2: If the SQL could be improved, provide a refined SQL query.
If the original SQL is already correct, return it unchanged.

Return a strict JSON object with two fields:
- "feedback": brief evaluation and suggestions
- "{field}": the final SQL to run"#,
            task = task,
            artifact = artifact,
            observed = observed,
            schema = context.text,
            field = field,
        ),
        ArtifactKind::Code => format!(
            r#"You are a data visualization expert. First, critique how well the chart produced by the code below communicates the instruction. Then return improved matplotlib code.

STRICT OUTPUT FORMAT (JSON only):
{{
  "feedback": "<brief, specific critique and suggestions>",
  "{field}": "<ONLY python code, wrapped in <execute_python> tags; assumes df exists; NO plt.show(); DO call plt.close() at end>"
}}

Constraints for the refined code:
- Use pandas/matplotlib only (no seaborn).
- Assume df exists; no file reads.
{save_rule}

Schema (columns you may reference):
{columns}

Original code:
{artifact}

Execution result:
{observed}

Instruction:
{task}"#,
            field = field,
            save_rule = save_rule(context).replace("4. ", "- "),
            columns = context.text,
            artifact = artifact,
            observed = observed,
            task = task,
        ),
    }
}

fn save_rule(context: &Context) -> String {
    match &context.output_target {
        Some(target) => format!("4. Save the figure as '{}' with dpi=300.", target),
        None => "4. Save the figure with dpi=300.".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sql_generation_embeds_schema_and_question() {
        let prompt = generation_prompt(
            ArtifactKind::Sql,
            &Task::new("Which color sells most?"),
            &Context::new("Table name: transactions\ncolor (TEXT)"),
        );
        assert!(prompt.contains("color (TEXT)"));
        assert!(prompt.contains("Which color sells most?"));
        assert!(prompt.ends_with("Respond with the SQL only."));
    }

    #[test]
    fn code_prompts_name_the_output_file() {
        let context = Context::new("- price (number)").with_output_target(Some("c_v2.png".into()));
        let prompt = critique_prompt(
            ArtifactKind::Code,
            &Task::new("Q1 sales by drink"),
            "<execute_python>pass</execute_python>",
            "Output saved to c_v1.png",
            &context,
        );
        assert!(prompt.contains("- Save the figure as 'c_v2.png' with dpi=300."));
        assert!(prompt.contains("\"refined_code\""));
    }

    #[test]
    fn sql_critique_names_the_refined_field() {
        let prompt = critique_prompt(
            ArtifactKind::Sql,
            &Task::new("q"),
            "SELECT 1",
            "| 1 |",
            &Context::default(),
        );
        assert!(prompt.contains("- \"refined_sql\": the final SQL to run"));
        assert!(prompt.contains("SQL Output:\n| 1 |"));
    }
}
