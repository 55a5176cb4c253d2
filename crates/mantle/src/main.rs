//! mantle: autonomous agent runtime for local LLMs
//!
//! Dispatches tool calls under a concurrency bound and drives a
//! think/act/reflect loop against an Ollama-compatible endpoint.

mod agent;
mod config;
mod events;
mod ledger;
mod mcp;
mod tools;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use model_client::{HttpModelClient, ModelConfig};

use agent::{AgentConfig, CognitiveLoop, LlmPlanner, LlmReflector, Phase};
use config::RuntimeConfig;
use events::EventBus;
use ledger::TaskLedger;
use mcp::McpManager;
use tools::dispatch::Dispatcher;
use tools::Tool;

#[derive(Debug, Parser)]
#[command(name = "mantle")]
#[command(about = "Autonomous agent runtime for local LLMs", version)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run a task through the agent loop
    Run {
        /// The task to perform
        task: Vec<String>,

        /// Model to use (overrides config)
        #[arg(short, long)]
        model: Option<String>,

        /// Iteration budget (overrides config)
        #[arg(long)]
        max_iterations: Option<usize>,

        /// Restrict file tools to this path (repeatable)
        #[arg(long = "allow-path")]
        allow_paths: Vec<PathBuf>,
    },

    /// List registered tools
    Tools {
        /// Start configured MCP servers and ping them
        #[arg(long)]
        check: bool,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Debug, Subcommand)]
enum ConfigAction {
    /// Create a default config file
    Init,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("mantle=debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("mantle=warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Run {
            task,
            model,
            max_iterations,
            allow_paths,
        } => run_task(task.join(" "), model, max_iterations, allow_paths).await,
        Commands::Tools { check } => list_tools(check).await,
        Commands::Config { action } => match action {
            ConfigAction::Init => {
                let path = RuntimeConfig::create_default()?;
                println!("Created {}", path.display());
                Ok(())
            }
        },
    }
}

async fn run_task(
    goal: String,
    model_override: Option<String>,
    max_iterations: Option<usize>,
    allow_paths: Vec<PathBuf>,
) -> Result<()> {
    if goal.trim().is_empty() {
        anyhow::bail!("No task given. Usage: mantle run <task>");
    }

    let runtime = RuntimeConfig::load()?;
    let model_config = ModelConfig::try_load().unwrap_or_else(ModelConfig::default_minimal);

    let model_name = model_override
        .or_else(|| runtime.agent.model.clone())
        .unwrap_or_else(|| model_config.models.default.clone());

    let model = Arc::new(HttpModelClient::new(
        model_config.endpoint_url(),
        model_name.clone(),
        Duration::from_secs(model_config.endpoint.request_timeout_secs),
    )?);

    if !model.health_check().await.unwrap_or(false) {
        warn!(
            endpoint = %model_config.endpoint_url(),
            "Model endpoint is not responding; the task will likely fail to plan"
        );
    }

    let mut registry = tools::builtin::create_default_registry()?;

    let mut manager = McpManager::new();
    let failures = manager.start_all(runtime.mcp.servers.clone()).await;
    for name in &failures {
        warn!(server = %name, "MCP server unavailable");
    }
    for tool in manager.discover_tools().await? {
        let name = tool.name().to_string();
        let server = tool.server_name().to_string();
        match registry.register(tool) {
            Ok(()) => debug!(server = %server, tool = %name, "Registered MCP tool"),
            Err(e) => warn!(server = %server, tool = %name, error = %e, "Skipping MCP tool"),
        }
    }

    let events = EventBus::default();
    let dispatcher = Arc::new(Dispatcher::new(
        Arc::new(registry),
        Arc::new(TaskLedger::new()),
        events.clone(),
        runtime.dispatch_config(),
    ));

    // Surface invocation lifecycle on stderr as it happens
    let mut event_rx = events.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = event_rx.recv().await {
            info!(tool = %event.tool, phase = %event.phase, invocation = %event.invocation_id, "Tool event");
        }
    });

    let mut agent_config = runtime
        .agent_config()
        .with_working_dir(std::env::current_dir().context("Cannot determine working directory")?);
    if let Some(max) = max_iterations {
        agent_config = agent_config.with_max_iterations(max);
    }
    if !allow_paths.is_empty() {
        agent_config = agent_config.with_allowed_paths(allow_paths);
    }

    let agent = CognitiveLoop::new(
        Arc::new(LlmPlanner::new(model.clone())),
        Arc::new(LlmReflector::new(model)),
        dispatcher.clone(),
        agent_config,
    );

    info!(model = %model_name, "Running task");
    let state = agent.run(&goal).await;

    manager.stop_all().await;

    match state.phase {
        Phase::Done => {
            if let Some(response) = &state.final_response {
                println!("{}", response);
            }
            info!(
                iterations = state.iteration,
                actions = dispatcher.ledger().len(state.task_id),
                "Task complete"
            );
            Ok(())
        }
        _ => {
            let reason = state.error.as_deref().unwrap_or("unknown failure");
            anyhow::bail!("Task failed after {} iterations: {}", state.iteration, reason)
        }
    }
}

async fn list_tools(check: bool) -> Result<()> {
    let runtime = RuntimeConfig::load()?;
    let registry = tools::builtin::create_default_registry()?;

    println!("Built-in tools:");
    for def in registry.definitions() {
        println!("  {:<12} [{}] {}", def.name, def.category, def.description);
    }

    if runtime.mcp.servers.is_empty() {
        return Ok(());
    }

    println!("\nConfigured MCP servers (tools discovered at run time):");
    for server in &runtime.mcp.servers {
        let status = if server.auto_start { "auto" } else { "manual" };
        println!("  {:<12} [{}] {}", server.name, status, server.command);
    }

    if check {
        let mut manager = McpManager::new();
        let failures = manager.start_all(runtime.mcp.servers.clone()).await;
        let health = manager.health_check().await;

        println!("\nServer health:");
        for server in &runtime.mcp.servers {
            let status = if health.get(&server.name).copied().unwrap_or(false) {
                "ok"
            } else if failures.contains(&server.name) {
                "failed to start"
            } else if !server.auto_start {
                "skipped (auto_start=false)"
            } else {
                "unresponsive"
            };
            println!("  {:<12} {}", server.name, status);
        }
        manager.stop_all().await;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_parses() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_run_command_flags() {
        let cli = Cli::parse_from([
            "mantle",
            "run",
            "summarize",
            "the",
            "readme",
            "--model",
            "llama3.1:8b",
            "--max-iterations",
            "5",
            "--allow-path",
            "/tmp/a",
            "--allow-path",
            "/tmp/b",
        ]);

        match cli.command {
            Commands::Run {
                task,
                model,
                max_iterations,
                allow_paths,
            } => {
                assert_eq!(task.join(" "), "summarize the readme");
                assert_eq!(model.as_deref(), Some("llama3.1:8b"));
                assert_eq!(max_iterations, Some(5));
                assert_eq!(allow_paths.len(), 2);
            }
            _ => panic!("expected run command"),
        }
    }

    #[test]
    fn test_tools_check_flag() {
        let cli = Cli::parse_from(["mantle", "tools", "--check"]);
        assert!(matches!(cli.command, Commands::Tools { check: true }));

        let cli = Cli::parse_from(["mantle", "tools"]);
        assert!(matches!(cli.command, Commands::Tools { check: false }));
    }

    #[test]
    fn test_default_registry_builds() {
        let registry = tools::builtin::create_default_registry().unwrap();
        assert!(!registry.is_empty());
    }
}
