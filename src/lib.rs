//! # Refinement Agent
//!
//! Self-refining generation loops and a bounded tool-calling agent on top
//! of chat-completion models.
//!
//! This library provides:
//! - A generate → execute → critique → execute loop for SQL queries and
//!   chart code, with SQLite and script executors
//! - A tool-calling dispatcher with a turn budget and an explicit tool registry
//! - An OpenAI-compatible chat-completions client
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use refinement_agent::{config::Config, llm::OpenAiClient, refine::*, runner::SqliteRunner, sink::TracingSink};
//!
//! let config = Config::from_env()?;
//! let llm = Arc::new(OpenAiClient::new(config.api_key.clone(), &config.base_url));
//! let refinement = RefinementLoop::new(
//!     Generator::new(llm.clone(), ArtifactKind::Sql),
//!     Critic::new(llm),
//!     Arc::new(SqliteRunner::new(&config.database_path)),
//!     Arc::new(TracingSink),
//! );
//! let report = refinement
//!     .run(&Task::new("Total revenue by color"), &Context::new(schema), "gpt-4.1", "gpt-4.1")
//!     .await?;
//! ```

pub mod agent;
pub mod config;
pub mod extract;
pub mod llm;
pub mod refine;
pub mod runner;
pub mod sink;
pub mod tools;

pub use config::Config;
