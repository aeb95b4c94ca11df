//! Refinement Agent - command line entry point.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use refinement_agent::agent::{build_assistant_prompt, find_references, ToolDispatcher, RESEARCH_TOOLS};
use refinement_agent::config::Config;
use refinement_agent::llm::{LlmClient, OpenAiClient};
use refinement_agent::refine::{
    ArtifactKind, Context, Critic, Generator, RefinementLoop, RefinementReport, Task,
};
use refinement_agent::runner::{
    csv_columns, describe_schema, ArtifactRunner, ScriptRunner, SqliteRunner,
};
use refinement_agent::sink::sink_from_config;
use refinement_agent::tools::{evaluate_preferred_domains, ToolRegistry, DEFAULT_PREFERRED_DOMAINS};

#[derive(Parser, Debug)]
#[command(
    name = "refinement-agent",
    version,
    about = "Generate, execute, critique and refine with chat-completion models"
)]
struct Args {
    /// Model override (defaults to DEFAULT_MODEL)
    #[arg(short, long, global = true)]
    model: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Answer a question with a refined SQL query against DATABASE_PATH
    Sql {
        question: String,
    },

    /// Produce a chart from a CSV file with refined plotting code
    Chart {
        instruction: String,

        /// CSV file loaded as `df` before the generated code runs
        #[arg(long)]
        csv: PathBuf,
    },

    /// Run a tool-calling session with the built-in tools
    Agent {
        prompt: String,

        /// Restrict the session to these tools (comma separated)
        #[arg(long, value_delimiter = ',')]
        tools: Vec<String>,

        /// Wrap the prompt in the personal-assistant preamble using this address
        #[arg(long)]
        assistant_email: Option<String>,
    },

    /// Find references for a research task and score their sources
    Research {
        task: String,

        /// Share of links that must come from preferred domains
        #[arg(long, default_value_t = 0.4)]
        min_ratio: f64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "refinement_agent=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let config = Config::from_env()?;
    let model = args.model.unwrap_or_else(|| config.default_model.clone());
    info!(
        "Loaded configuration: model={}, evaluation_model={}",
        model, config.evaluation_model
    );

    let llm: Arc<dyn LlmClient> = Arc::new(OpenAiClient::new(
        config.api_key.clone(),
        config.base_url.clone(),
    ));

    match args.command {
        Command::Sql { question } => {
            let schema = describe_schema(&config.database_path)?;
            let runner = SqliteRunner::new(config.database_path.clone());
            let report = refine(
                &config,
                llm,
                ArtifactKind::Sql,
                Arc::new(runner),
                &question,
                Context::new(schema),
                &model,
            )
            .await?;
            print_report(&report);
        }
        Command::Chart { instruction, csv } => {
            let columns = csv_columns(&csv)?;
            let csv_path = std::fs::canonicalize(&csv)?;
            let runner = ScriptRunner::new(config.python_bin.clone(), config.workspace_path.clone())
                .with_env("CHART_DATA_CSV", csv_path.display().to_string())
                .with_prelude(
                    "import os\nimport pandas as pd\ndf = pd.read_csv(os.environ[\"CHART_DATA_CSV\"])",
                )
                .with_timeout(Duration::from_secs(config.script_timeout_secs));
            let context = Context::new(columns.join(", "));
            let report = refine(
                &config,
                llm,
                ArtifactKind::Code,
                Arc::new(runner),
                &instruction,
                context,
                &model,
            )
            .await?;
            print_report(&report);
        }
        Command::Agent {
            prompt,
            tools,
            assistant_email,
        } => {
            let mut registry = ToolRegistry::builtin(&config);
            if !tools.is_empty() {
                let names: Vec<&str> = tools.iter().map(String::as_str).collect();
                registry = registry.select(&names);
            }
            let prompt = match assistant_email {
                Some(email) => build_assistant_prompt(&prompt, &email),
                None => prompt,
            };

            let dispatcher =
                ToolDispatcher::new(llm, registry, sink_from_config(&config), config.max_turns);
            let report = dispatcher.run(&model, &prompt).await?;
            info!(
                session_id = %report.session_id,
                turns = report.turns,
                tool_calls = report.tool_results.len(),
                "Session complete"
            );
            println!("{}", report.outcome.text());
        }
        Command::Research { task, min_ratio } => {
            let registry = ToolRegistry::builtin(&config).select(RESEARCH_TOOLS);
            let dispatcher =
                ToolDispatcher::new(llm, registry, sink_from_config(&config), config.max_turns);
            let answer = find_references(&dispatcher, &model, &task).await;
            println!("{}\n", answer);

            let evaluation = evaluate_preferred_domains(&answer, DEFAULT_PREFERRED_DOMAINS, min_ratio);
            println!("{}", evaluation.to_markdown());
        }
    }

    Ok(())
}

async fn refine(
    config: &Config,
    llm: Arc<dyn LlmClient>,
    kind: ArtifactKind,
    runner: Arc<dyn ArtifactRunner>,
    task: &str,
    context: Context,
    model: &str,
) -> anyhow::Result<RefinementReport> {
    let refinement = RefinementLoop::new(
        Generator::new(llm.clone(), kind),
        Critic::new(llm).with_temperature(config.evaluation_temperature),
        runner,
        sink_from_config(config),
    );
    let report = refinement
        .run(&Task::new(task), &context, model, &config.evaluation_model)
        .await?;
    Ok(report)
}

fn print_report(report: &RefinementReport) {
    let label = report.artifact_v1.kind.label();
    println!("## {} (v1)\n{}\n", label, report.artifact_v1.text);
    println!("## Result v1\n{}\n", report.result_v1.render_for_prompt());
    println!("## Feedback\n{}\n", report.feedback.critique);
    println!("## {} (v2)\n{}\n", label, report.artifact_v2.text);
    println!("## Result v2\n{}", report.result_v2.render_for_prompt());
    if report.converged() {
        println!("\nThe critic kept v1 unchanged.");
    }
}
