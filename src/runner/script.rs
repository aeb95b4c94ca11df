//! Script executor for chart-code artifacts.
//!
//! Pulls the `<execute_python>` block out of the artifact, prepends an
//! optional prelude (typically loading the dataframe), and runs it with an
//! external interpreter. The code is not sandboxed.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use anyhow::Context as _;
use async_trait::async_trait;
use tokio::process::Command;

use super::{media_type_for, ArtifactRunner, ExecutionResult};
use crate::extract::extract_tagged_code;
use crate::refine::{Artifact, ArtifactKind};

/// Runs tagged code with an interpreter in a working directory.
pub struct ScriptRunner {
    interpreter: String,
    working_dir: PathBuf,
    prelude: Option<String>,
    output_basename: String,
    timeout: Duration,
    envs: Vec<(String, String)>,
}

impl ScriptRunner {
    pub fn new(interpreter: impl Into<String>, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            interpreter: interpreter.into(),
            working_dir: working_dir.into(),
            prelude: None,
            output_basename: "chart".to_string(),
            timeout: Duration::from_secs(60),
            envs: Vec::new(),
        }
    }

    /// Code run before every artifact, e.g. loading `df`.
    pub fn with_prelude(mut self, prelude: impl Into<String>) -> Self {
        self.prelude = Some(prelude.into());
        self
    }

    /// Output files are named `{basename}_v{version}.png`.
    pub fn with_output_basename(mut self, basename: impl Into<String>) -> Self {
        self.output_basename = basename.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Environment variable set for the interpreter.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    fn output_file(&self, version: u32) -> String {
        format!("{}_v{}.png", self.output_basename, version)
    }
}

#[async_trait]
impl ArtifactRunner for ScriptRunner {
    async fn run(&self, artifact: &Artifact) -> ExecutionResult {
        let Some(code) = extract_tagged_code(&artifact.text, ArtifactKind::CODE_TAG) else {
            return ExecutionResult::Failed(format!(
                "No <{}> block found in the artifact",
                ArtifactKind::CODE_TAG
            ));
        };

        let mut source = String::new();
        if let Some(prelude) = &self.prelude {
            source.push_str(prelude);
            source.push('\n');
        }
        source.push_str(&code);
        source.push('\n');

        let script_path = self
            .working_dir
            .join(format!(".{}_v{}.py", self.output_basename, artifact.version));
        if let Err(e) = tokio::fs::write(&script_path, source).await {
            return ExecutionResult::Failed(format!("Failed to write script: {}", e));
        }

        let output_path = self.working_dir.join(self.output_file(artifact.version));
        // A stale file from an earlier run would hide a failure to save.
        let _ = tokio::fs::remove_file(&output_path).await;

        tracing::info!(
            interpreter = %self.interpreter,
            script = %script_path.display(),
            "Executing code artifact"
        );

        let run = tokio::time::timeout(
            self.timeout,
            Command::new(&self.interpreter)
                .arg(&script_path)
                .current_dir(&self.working_dir)
                .envs(self.envs.iter().map(|(k, v)| (k, v)))
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .kill_on_drop(true)
                .output(),
        )
        .await;

        let output = match run {
            Err(_) => {
                return ExecutionResult::Failed(format!(
                    "Script timed out after {} seconds",
                    self.timeout.as_secs()
                ))
            }
            Ok(Err(e)) => {
                return ExecutionResult::Failed(format!("Failed to start interpreter: {}", e))
            }
            Ok(Ok(output)) => output,
        };

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if !output.status.success() {
            let exit_code = output.status.code().unwrap_or(-1);
            return ExecutionResult::Failed(truncate(
                &format!("Exit code: {}\n{}", exit_code, stderr.trim()),
                4000,
            ));
        }

        if tokio::fs::try_exists(&output_path).await.unwrap_or(false) {
            let media_type = media_type_for(&output_path);
            ExecutionResult::File {
                path: output_path,
                media_type,
            }
        } else if stdout.trim().is_empty() {
            ExecutionResult::Failed(format!(
                "Script finished but did not write {}",
                output_path.display()
            ))
        } else {
            ExecutionResult::Output(truncate(&stdout, 10000))
        }
    }

    fn output_target(&self, version: u32) -> Option<String> {
        Some(self.output_file(version))
    }
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_string();
    }
    let mut end = max_len;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}\n... [output truncated]", &s[..end])
}

/// Header names of a CSV file, for describing the dataframe to the model.
pub fn csv_columns(path: &Path) -> anyhow::Result<Vec<String>> {
    let mut reader = csv::ReaderBuilder::new()
        .from_path(path)
        .with_context(|| format!("cannot read CSV file {}", path.display()))?;
    let columns: Vec<String> = reader
        .headers()?
        .iter()
        .map(|name| name.trim().to_string())
        .collect();
    if columns.iter().all(String::is_empty) {
        anyhow::bail!("CSV file has no header row: {}", path.display());
    }
    Ok(columns)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn runner(dir: &std::path::Path) -> ScriptRunner {
        ScriptRunner::new("sh", dir).with_output_basename("drink_sales")
    }

    #[test]
    fn output_target_is_versioned() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(
            runner(dir.path()).output_target(2).as_deref(),
            Some("drink_sales_v2.png")
        );
    }

    #[tokio::test]
    async fn untagged_artifact_fails_without_running() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = Artifact::first(ArtifactKind::Code, "plt.plot([1, 2])");
        let result = runner(dir.path()).run(&artifact).await;
        assert!(matches!(result, ExecutionResult::Failed(ref e) if e.contains("execute_python")));
    }

    // The interpreter is pluggable, so a shell stands in for python here.
    #[cfg(unix)]
    #[tokio::test]
    async fn written_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = Artifact::first(
            ArtifactKind::Code,
            "<execute_python>\nprintf 'png' > drink_sales_v1.png\n</execute_python>",
        );
        let result = runner(dir.path()).run(&artifact).await;
        assert_eq!(
            result,
            ExecutionResult::File {
                path: dir.path().join("drink_sales_v1.png"),
                media_type: Some("image/png".to_string()),
            }
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn prelude_runs_first_and_stdout_is_kept() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = Artifact::first(
            ArtifactKind::Code,
            "<execute_python>echo \"rows=$ROWS\"</execute_python>",
        );
        let result = runner(dir.path())
            .with_prelude("ROWS=3")
            .run(&artifact)
            .await;
        assert_eq!(result, ExecutionResult::Output("rows=3\n".to_string()));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn non_zero_exit_is_failed() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = Artifact::first(
            ArtifactKind::Code,
            "<execute_python>echo boom >&2; exit 3</execute_python>",
        );
        let result = runner(dir.path()).run(&artifact).await;
        assert_eq!(
            result,
            ExecutionResult::Failed("Exit code: 3\nboom".to_string())
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn timeout_is_failed() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = Artifact::first(ArtifactKind::Code, "<execute_python>sleep 5</execute_python>");
        let result = runner(dir.path())
            .with_timeout(Duration::from_millis(100))
            .run(&artifact)
            .await;
        assert!(matches!(result, ExecutionResult::Failed(ref e) if e.contains("timed out")));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn env_values_reach_the_script_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let awkward = "/data/it's \"quoted\" \\ path.csv";
        let artifact = Artifact::first(
            ArtifactKind::Code,
            "<execute_python>printf '%s' \"$CHART_DATA_CSV\"</execute_python>",
        );
        let result = runner(dir.path())
            .with_env("CHART_DATA_CSV", awkward)
            .run(&artifact)
            .await;
        assert_eq!(result, ExecutionResult::Output(awkward.to_string()));
    }

    #[test]
    fn csv_header_with_quoted_comma() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("coffee_sales.csv");
        std::fs::write(&path, "\"price, usd\",coffee_name\n3.5,Latte\n").unwrap();

        assert_eq!(csv_columns(&path).unwrap(), vec!["price, usd", "coffee_name"]);
    }

    #[test]
    fn csv_without_header_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let empty = dir.path().join("empty.csv");
        std::fs::write(&empty, "").unwrap();

        assert!(csv_columns(&empty).is_err());
        assert!(csv_columns(&dir.path().join("missing.csv")).is_err());
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        let text = "ééé";
        assert_eq!(truncate(text, 3), "é\n... [output truncated]");
    }
}
