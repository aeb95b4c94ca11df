//! File writing tool.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{required_str, Tool};

/// Write a text file inside the workspace.
pub struct WriteTextFile;

#[async_trait]
impl Tool for WriteTextFile {
    fn name(&self) -> &str {
        "write_txt_file"
    }

    fn description(&self) -> &str {
        "Write text content to a file in the workspace, replacing it if it exists. Returns the path that was written."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "file_path": {
                    "type": "string",
                    "description": "Path of the file, relative to the workspace (e.g., 'reminders.txt')"
                },
                "content": {
                    "type": "string",
                    "description": "Text to write"
                }
            },
            "required": ["file_path", "content"]
        })
    }

    async fn execute(&self, args: Value, workspace: &Path) -> anyhow::Result<String> {
        let file_path = required_str(&args, "file_path")?;
        let content = required_str(&args, "content")?;

        let target = resolve_in_workspace(workspace, file_path)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&target, content).await?;

        tracing::info!(path = %target.display(), bytes = content.len(), "Wrote text file");
        Ok(file_path.to_string())
    }
}

/// Join `relative` onto `workspace`, refusing absolute paths and `..`.
fn resolve_in_workspace(workspace: &Path, relative: &str) -> anyhow::Result<PathBuf> {
    let path = Path::new(relative);
    let escapes = path
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if relative.trim().is_empty() || escapes {
        return Err(anyhow::anyhow!(
            "Path must be relative to the workspace: {}",
            relative
        ));
    }
    Ok(workspace.join(path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn writes_note_into_workspace() {
        let dir = tempfile::tempdir().unwrap();
        let result = WriteTextFile
            .execute(
                json!({"file_path": "notes/reminders.txt", "content": "Call Daniel at 7PM"}),
                dir.path(),
            )
            .await
            .unwrap();

        assert_eq!(result, "notes/reminders.txt");
        let written = std::fs::read_to_string(dir.path().join("notes/reminders.txt")).unwrap();
        assert_eq!(written, "Call Daniel at 7PM");
    }

    #[tokio::test]
    async fn rejects_escaping_paths() {
        let dir = tempfile::tempdir().unwrap();
        for path in ["../outside.txt", "/etc/passwd", ""] {
            let err = WriteTextFile
                .execute(json!({"file_path": path, "content": "x"}), dir.path())
                .await
                .unwrap_err();
            assert!(err.to_string().contains("relative to the workspace"), "{path}");
        }
    }

    #[tokio::test]
    async fn missing_content_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = WriteTextFile
            .execute(json!({"file_path": "a.txt"}), dir.path())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Missing 'content' argument");
    }
}
