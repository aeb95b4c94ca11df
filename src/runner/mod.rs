//! Executors that run an artifact and report what happened.
//!
//! A runner never fails the loop: a broken query or crashing script is an
//! [`ExecutionResult::Failed`] that the critic gets to read.

mod script;
mod sqlite;

pub use script::{csv_columns, ScriptRunner};
pub use sqlite::{describe_schema, SqliteRunner};

#[cfg(test)]
pub(crate) use sqlite::fixtures;

use std::path::PathBuf;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tabled::builder::Builder;
use tabled::settings::Style;

use crate::refine::Artifact;

/// Rows returned by a query.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl Table {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Render as a GitHub-flavored markdown table.
    pub fn to_markdown(&self) -> String {
        let mut builder = Builder::default();
        builder.push_record(self.columns.iter().map(|c| escape_cell(c)));
        for row in &self.rows {
            builder.push_record(row.iter().map(render_cell));
        }
        let mut table = builder.build();
        table.with(Style::markdown());
        format!("{}\n", table)
    }
}

fn render_cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => escape_cell(s),
        other => other.to_string(),
    }
}

/// Cell text that cannot break the row: pipes escaped, line breaks flattened.
fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|").replace("\r\n", " ").replace('\n', " ")
}

/// Observable outcome of running an artifact.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum ExecutionResult {
    /// Tabular rows
    Table(Table),
    /// A file the artifact wrote
    File {
        path: PathBuf,
        media_type: Option<String>,
    },
    /// Plain textual output
    Output(String),
    /// The artifact could not run
    Failed(String),
}

impl ExecutionResult {
    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Failed(_))
    }

    /// Text shown to the critic.
    pub fn render_for_prompt(&self) -> String {
        match self {
            Self::Table(table) if table.is_empty() => {
                format!("(no rows)\n{}", table.to_markdown())
            }
            Self::Table(table) => table.to_markdown(),
            Self::File { path, .. } => format!("Output saved to {}", path.display()),
            Self::Output(text) => text.clone(),
            Self::Failed(reason) => format!("Execution failed: {}", reason),
        }
    }

    /// Path and media type when the result is an image file.
    pub fn image(&self) -> Option<(&PathBuf, &str)> {
        match self {
            Self::File {
                path,
                media_type: Some(media_type),
            } if media_type.starts_with("image/") => Some((path, media_type.as_str())),
            _ => None,
        }
    }
}

/// Runs artifacts against a concrete backing store or environment.
#[async_trait]
pub trait ArtifactRunner: Send + Sync {
    async fn run(&self, artifact: &Artifact) -> ExecutionResult;

    /// File the given artifact version should write, if this runner
    /// expects file output.
    fn output_target(&self, _version: u32) -> Option<String> {
        None
    }
}

/// Guess a media type from a file extension.
pub fn media_type_for(path: &std::path::Path) -> Option<String> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    let media_type = match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "csv" => "text/csv",
        "txt" | "md" => "text/plain",
        _ => return None,
    };
    Some(media_type.to_string())
}
