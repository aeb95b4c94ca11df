//! Tools module - functions the model may call during an agent session.
//!
//! Every tool exposes the same capability: a name, a description, a JSON
//! schema for its arguments and `execute(args) -> String`. The registry is
//! an explicit name → tool mapping assembled at startup.

mod file;
mod research;
mod time;
mod weather;

pub use file::WriteTextFile;
pub use research::{
    evaluate_preferred_domains, ArxivSearch, DomainReport, TavilySearch, WikipediaSearch,
    DEFAULT_PREFERRED_DOMAINS,
};
pub use time::GetCurrentTime;
pub use weather::GetWeatherFromIp;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::config::Config;
use crate::llm::{FunctionSchema, ToolSchema};

/// A callable tool.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON schema of the arguments object.
    fn parameters_schema(&self) -> Value;

    /// Run the tool. Errors are reported back to the model, not the caller.
    async fn execute(&self, args: Value, workspace: &Path) -> anyhow::Result<String>;
}

/// Name and description of a registered tool.
#[derive(Debug, Clone)]
pub struct ToolInfo {
    pub name: String,
    pub description: String,
}

/// Name → tool mapping plus the workspace tools operate in.
#[derive(Clone)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    order: Vec<String>,
    workspace: PathBuf,
}

impl ToolRegistry {
    /// An empty registry rooted at `workspace`.
    pub fn new(workspace: impl Into<PathBuf>) -> Self {
        Self {
            tools: HashMap::new(),
            order: Vec::new(),
            workspace: workspace.into(),
        }
    }

    /// Every built-in tool. `tavily_search` is included only when an API
    /// key is configured.
    pub fn builtin(config: &Config) -> Self {
        let mut registry = Self::new(config.workspace_path.clone());
        registry.register(GetCurrentTime);
        registry.register(GetWeatherFromIp::new());
        registry.register(WriteTextFile);
        registry.register(WikipediaSearch::new());
        registry.register(ArxivSearch::new());
        if let Some(key) = &config.tavily_api_key {
            registry.register(TavilySearch::new(key.clone()));
        }
        registry
    }

    /// Add a tool, replacing any tool with the same name.
    pub fn register(&mut self, tool: impl Tool + 'static) {
        let name = tool.name().to_string();
        if self.tools.insert(name.clone(), Arc::new(tool)).is_none() {
            self.order.push(name);
        }
    }

    /// A registry holding only the named tools, in the given order.
    /// Unknown names are skipped.
    pub fn select(&self, names: &[&str]) -> Self {
        let mut selected = Self::new(self.workspace.clone());
        for name in names {
            if let Some(tool) = self.tools.get(*name) {
                selected.tools.insert(name.to_string(), Arc::clone(tool));
                selected.order.push(name.to_string());
            }
        }
        selected
    }

    pub fn workspace(&self) -> &Path {
        &self.workspace
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Registered tools in registration order.
    pub fn list_tools(&self) -> Vec<ToolInfo> {
        self.ordered()
            .map(|t| ToolInfo {
                name: t.name().to_string(),
                description: t.description().to_string(),
            })
            .collect()
    }

    /// Schemas advertised to the model.
    pub fn get_tool_schemas(&self) -> Vec<ToolSchema> {
        self.ordered()
            .map(|t| ToolSchema {
                tool_type: "function".to_string(),
                function: FunctionSchema {
                    name: t.name().to_string(),
                    description: t.description().to_string(),
                    parameters: t.parameters_schema(),
                },
            })
            .collect()
    }

    /// Execute a tool by name.
    pub async fn execute(&self, name: &str, args: Value, workspace: &Path) -> anyhow::Result<String> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| anyhow::anyhow!("Unknown tool: {}", name))?;
        tool.execute(args, workspace).await
    }

    fn ordered(&self) -> impl Iterator<Item = &Arc<dyn Tool>> {
        self.order.iter().filter_map(|name| self.tools.get(name))
    }
}

/// Read a required string argument.
pub(crate) fn required_str<'a>(args: &'a Value, key: &str) -> anyhow::Result<&'a str> {
    args[key]
        .as_str()
        .ok_or_else(|| anyhow::anyhow!("Missing '{}' argument", key))
}
