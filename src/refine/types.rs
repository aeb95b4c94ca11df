use std::fmt;

use serde::Serialize;

/// What kind of text an artifact is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    /// A SQLite query
    Sql,
    /// A Python plotting snippet wrapped in `<execute_python>` tags
    Code,
}

impl ArtifactKind {
    /// Tag wrapping runnable code for [`ArtifactKind::Code`].
    pub const CODE_TAG: &'static str = "execute_python";

    /// JSON field in which the critic returns the revised artifact.
    pub fn refined_field(self) -> &'static str {
        match self {
            Self::Sql => "refined_sql",
            Self::Code => "refined_code",
        }
    }

    /// Short label used in sink titles.
    pub fn label(self) -> &'static str {
        match self {
            Self::Sql => "SQL",
            Self::Code => "Chart code",
        }
    }
}

/// The natural-language objective of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Task(String);

impl Task {
    pub fn new(objective: impl Into<String>) -> Self {
        Self(objective.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Supporting text injected into prompts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Context {
    /// Schema description or column list
    pub text: String,

    /// Where the artifact must write its output, if it produces a file
    pub output_target: Option<String>,
}

impl Context {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            output_target: None,
        }
    }

    pub fn with_output_target(&self, target: Option<String>) -> Self {
        Self {
            text: self.text.clone(),
            output_target: target,
        }
    }
}

/// One immutable version of a model-produced artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Artifact {
    pub kind: ArtifactKind,
    pub version: u32,
    pub text: String,
}

impl Artifact {
    /// Version 1, as produced by the generator.
    pub fn first(kind: ArtifactKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            version: 1,
            text: text.into(),
        }
    }

    /// The next version, carrying `text`.
    pub fn derive(&self, text: impl Into<String>) -> Self {
        Self {
            kind: self.kind,
            version: self.version + 1,
            text: text.into(),
        }
    }
}

/// Critique of one artifact version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Feedback {
    /// The version this critique evaluates
    pub evaluated_version: u32,

    pub critique: String,

    /// The reply was not usable JSON and `critique` is the raw text
    pub degraded: bool,

    /// The critic's reply as received
    pub raw_reply: String,
}
