//! Observability sinks for human inspection of each stage.
//!
//! A sink receives a title, the stage's content and a [`EmitKind`] hint.
//! Emission is best effort: loops call [`emit_quietly`], which logs and
//! swallows failures.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use serde::Serialize;

use crate::config::Config;

/// How the emitted content should be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EmitKind {
    Text,
    Code,
    Table,
    Json,
    Image,
    Warning,
}

impl std::fmt::Display for EmitKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Text => "text",
            Self::Code => "code",
            Self::Table => "table",
            Self::Json => "json",
            Self::Image => "image",
            Self::Warning => "warning",
        };
        f.write_str(name)
    }
}

/// A single emitted stage.
#[derive(Debug, Clone, Serialize)]
pub struct SinkEntry {
    /// Timestamp (RFC 3339)
    pub timestamp: String,
    pub title: String,
    pub kind: EmitKind,
    pub content: String,
}

impl SinkEntry {
    fn now(title: &str, content: &str, kind: EmitKind) -> Self {
        Self {
            timestamp: chrono::Utc::now().to_rfc3339(),
            title: title.to_string(),
            kind,
            content: content.to_string(),
        }
    }
}

pub trait Sink: Send + Sync {
    fn emit(&self, title: &str, content: &str, kind: EmitKind) -> anyhow::Result<()>;
}

impl<T: Sink + ?Sized> Sink for Arc<T> {
    fn emit(&self, title: &str, content: &str, kind: EmitKind) -> anyhow::Result<()> {
        (**self).emit(title, content, kind)
    }
}

/// Emit to `sink`, logging instead of failing.
pub fn emit_quietly(sink: &dyn Sink, title: &str, content: &str, kind: EmitKind) {
    if let Err(e) = sink.emit(title, content, kind) {
        tracing::warn!(title, error = %e, "Failed to emit stage output");
    }
}

/// Sink assembled from `EMIT_TRACING` and `SINK_LOG_PATH`.
pub fn sink_from_config(config: &Config) -> Arc<dyn Sink> {
    let mut sinks: Vec<Box<dyn Sink>> = Vec::new();
    if config.emit_tracing {
        sinks.push(Box::new(TracingSink));
    }
    if let Some(path) = &config.sink_log_path {
        sinks.push(Box::new(JsonlSink::new(path.clone())));
    }
    match sinks.len() {
        0 => Arc::new(NoopSink),
        _ => Arc::new(FanoutSink::new(sinks)),
    }
}

/// Discards everything.
pub struct NoopSink;

impl Sink for NoopSink {
    fn emit(&self, _title: &str, _content: &str, _kind: EmitKind) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Writes each stage as a `tracing` event.
pub struct TracingSink;

impl Sink for TracingSink {
    fn emit(&self, title: &str, content: &str, kind: EmitKind) -> anyhow::Result<()> {
        match kind {
            EmitKind::Warning => tracing::warn!(title, %kind, "{}", content),
            _ => tracing::info!(title, %kind, "{}", content),
        }
        Ok(())
    }
}

/// Keeps entries in memory.
#[derive(Default)]
pub struct MemorySink {
    entries: Mutex<Vec<SinkEntry>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<SinkEntry> {
        self.entries
            .lock()
            .map(|entries| entries.clone())
            .unwrap_or_default()
    }

    pub fn titles(&self) -> Vec<String> {
        self.entries().into_iter().map(|e| e.title).collect()
    }
}

impl Sink for MemorySink {
    fn emit(&self, title: &str, content: &str, kind: EmitKind) -> anyhow::Result<()> {
        self.entries
            .lock()
            .map_err(|_| anyhow::anyhow!("memory sink lock poisoned"))?
            .push(SinkEntry::now(title, content, kind));
        Ok(())
    }
}

/// Appends one JSON object per line to a file.
pub struct JsonlSink {
    path: PathBuf,
}

impl JsonlSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Sink for JsonlSink {
    fn emit(&self, title: &str, content: &str, kind: EmitKind) -> anyhow::Result<()> {
        let line = serde_json::to_string(&SinkEntry::now(title, content, kind))?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{}", line)?;
        Ok(())
    }
}

/// Sends every entry to each inner sink, failing if any of them fails.
pub struct FanoutSink {
    sinks: Vec<Box<dyn Sink>>,
}

impl FanoutSink {
    pub fn new(sinks: Vec<Box<dyn Sink>>) -> Self {
        Self { sinks }
    }
}

impl Sink for FanoutSink {
    fn emit(&self, title: &str, content: &str, kind: EmitKind) -> anyhow::Result<()> {
        let mut first_error = None;
        for sink in &self.sinks {
            if let Err(e) = sink.emit(title, content, kind) {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

#[cfg(test)]
pub(crate) struct FailingSink;

#[cfg(test)]
impl Sink for FailingSink {
    fn emit(&self, _title: &str, _content: &str, _kind: EmitKind) -> anyhow::Result<()> {
        Err(anyhow::anyhow!("sink unavailable"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_sink_records_in_order() {
        let sink = MemorySink::new();
        sink.emit("first", "a", EmitKind::Text).unwrap();
        sink.emit("second", "b", EmitKind::Code).unwrap();
        let entries = sink.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].title, "second");
        assert_eq!(entries[1].kind, EmitKind::Code);
    }

    #[test]
    fn jsonl_sink_appends_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stages.jsonl");
        let sink = JsonlSink::new(&path);
        sink.emit("SQL v1", "SELECT 1", EmitKind::Code).unwrap();
        sink.emit("Feedback", "fine", EmitKind::Text).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<serde_json::Value> = text
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["kind"], "code");
        assert_eq!(lines[1]["title"], "Feedback");
    }

    #[test]
    fn jsonl_sink_reports_unwritable_path() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonlSink::new(dir.path().join("missing").join("stages.jsonl"));
        assert!(sink.emit("t", "c", EmitKind::Text).is_err());
    }

    #[test]
    fn fanout_keeps_emitting_after_failure() {
        let memory = Arc::new(MemorySink::new());
        let sink = FanoutSink::new(vec![Box::new(FailingSink), Box::new(memory.clone())]);
        assert!(sink.emit("t", "c", EmitKind::Text).is_err());
        emit_quietly(&sink, "u", "d", EmitKind::Text);
        assert_eq!(memory.titles(), vec!["t", "u"]);
    }

    #[test]
    fn config_selects_sinks() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::new("k".into(), "gpt-4.1".into(), dir.path().to_path_buf());
        config.emit_tracing = false;
        config.sink_log_path = Some(dir.path().join("stages.jsonl"));

        let sink = sink_from_config(&config);
        sink.emit("Task", "count rows", EmitKind::Text).unwrap();
        assert!(dir.path().join("stages.jsonl").exists());

        config.sink_log_path = None;
        assert!(sink_from_config(&config).emit("x", "y", EmitKind::Text).is_ok());
    }
}
