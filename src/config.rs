//! Configuration management.
//!
//! Configuration can be set via environment variables:
//! - `LLM_API_KEY` - Required (or `OPENAI_API_KEY`). Key for the chat-completions endpoint.
//! - `LLM_BASE_URL` - Optional. Defaults to `https://api.openai.com/v1`.
//! - `DEFAULT_MODEL` - Optional. Generation and agent model. Defaults to `gpt-4.1`.
//! - `EVALUATION_MODEL` - Optional. Critic model. Defaults to `DEFAULT_MODEL`.
//! - `EVALUATION_TEMPERATURE` - Optional. Critic temperature. Defaults to `0.0`.
//! - `MAX_TURNS` - Optional. Model calls per tool session. Defaults to `5`.
//! - `WORKSPACE_PATH` - Optional. Directory tools and scripts work in. Defaults to current directory.
//! - `DATABASE_PATH` - Optional. SQLite database for SQL refinement. Defaults to `products.db`.
//! - `PYTHON_BIN` - Optional. Interpreter for chart code. Defaults to `python3`.
//! - `SCRIPT_TIMEOUT_SECS` - Optional. Chart script timeout. Defaults to `60`.
//! - `TAVILY_API_KEY` - Optional. Enables the `tavily_search` tool.
//! - `SINK_LOG_PATH` - Optional. Append every emitted stage to this JSONL file.
//! - `EMIT_TRACING` - Optional. Emit stages through tracing. Defaults to `true`.

use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// API key for the chat-completions endpoint
    pub api_key: String,

    /// Base URL of the OpenAI-compatible API
    pub base_url: String,

    /// Model used for generation and agent sessions
    pub default_model: String,

    /// Model used by the critic
    pub evaluation_model: String,

    pub evaluation_temperature: f32,

    /// Maximum model calls per tool session
    pub max_turns: usize,

    /// Workspace directory for file operations
    pub workspace_path: PathBuf,

    pub database_path: PathBuf,

    pub python_bin: String,

    pub script_timeout_secs: u64,

    pub tavily_api_key: Option<String>,

    /// JSONL file receiving every emitted stage
    pub sink_log_path: Option<PathBuf>,

    pub emit_tracing: bool,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingEnvVar` if neither `LLM_API_KEY` nor
    /// `OPENAI_API_KEY` is set, and `ConfigError::InvalidValue` for
    /// unparsable numbers or booleans.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key = env_opt("LLM_API_KEY")
            .or_else(|| env_opt("OPENAI_API_KEY"))
            .ok_or_else(|| ConfigError::MissingEnvVar("LLM_API_KEY".to_string()))?;

        let base_url =
            env_opt("LLM_BASE_URL").unwrap_or_else(|| "https://api.openai.com/v1".to_string());

        let default_model = env_opt("DEFAULT_MODEL").unwrap_or_else(|| "gpt-4.1".to_string());

        let evaluation_model = env_opt("EVALUATION_MODEL").unwrap_or_else(|| default_model.clone());

        let workspace_path = env_opt("WORKSPACE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

        let emit_tracing = env_opt("EMIT_TRACING")
            .map(|v| {
                parse_bool(&v).map_err(|e| ConfigError::InvalidValue("EMIT_TRACING".to_string(), e))
            })
            .transpose()?
            .unwrap_or(true);

        Ok(Self {
            api_key,
            base_url,
            default_model,
            evaluation_model,
            evaluation_temperature: env_parse("EVALUATION_TEMPERATURE", 0.0)?,
            max_turns: env_parse("MAX_TURNS", 5)?,
            workspace_path,
            database_path: env_opt("DATABASE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("products.db")),
            python_bin: env_opt("PYTHON_BIN").unwrap_or_else(|| "python3".to_string()),
            script_timeout_secs: env_parse("SCRIPT_TIMEOUT_SECS", 60)?,
            tavily_api_key: env_opt("TAVILY_API_KEY"),
            sink_log_path: env_opt("SINK_LOG_PATH").map(PathBuf::from),
            emit_tracing,
        })
    }

    /// Create a config with custom values (useful for testing).
    pub fn new(api_key: String, default_model: String, workspace_path: PathBuf) -> Self {
        Self {
            api_key,
            base_url: "https://api.openai.com/v1".to_string(),
            evaluation_model: default_model.clone(),
            default_model,
            evaluation_temperature: 0.0,
            max_turns: 5,
            workspace_path,
            database_path: PathBuf::from("products.db"),
            python_bin: "python3".to_string(),
            script_timeout_secs: 60,
            tavily_api_key: None,
            sink_log_path: None,
            emit_tracing: true,
        }
    }
}

/// A set, non-blank environment variable.
fn env_opt(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T>(name: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env_opt(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e: T::Err| ConfigError::InvalidValue(name.to_string(), format!("{}", e))),
        None => Ok(default),
    }
}

fn parse_bool(value: &str) -> Result<bool, String> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "t" | "yes" | "y" | "on" => Ok(true),
        "0" | "false" | "f" | "no" | "n" | "off" => Ok(false),
        other => Err(format!("expected boolean-like value, got: {}", other)),
    }
}
