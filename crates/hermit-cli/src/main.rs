//! Hermit - run bounded agent tasks from the terminal
//!
//! Thin shell over `hermit-core`: resolves configuration, assembles the
//! tool registry and agent library, runs one root agent loop, and prints
//! the final answer. Loop events stream to stderr as they happen.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;

use hermit_core::agent::{AgentEvent, AgentRunner, EventSink, Session};
use hermit_core::agents::{compose_system_prompt, AgentLibrary, InvokeAgentTool};
use hermit_core::ai::{HttpTransport, ModelGateway, TransportConfig};
use hermit_core::config::EngineConfig;
use hermit_core::tools::implementations::{CalculateTool, RecordNoteTool};
use hermit_core::tools::{ToolContext, ToolRegistry};
use hermit_core::EngineError;

const ROOT_PROMPT: &str = "You are Hermit, a careful assistant that solves tasks step by step. \
Use the available tools when they help; answer directly when they do not. \
When you have the final answer, state it plainly.";

/// Hermit - bounded agent execution
#[derive(Parser)]
#[command(name = "hermit")]
#[command(about = "Run a task through a bounded agent loop", long_about = None)]
struct Cli {
    /// The task to run
    task: String,

    /// Directory containing agent definitions (*.md with frontmatter)
    #[arg(long, default_value = "agents")]
    agents_dir: PathBuf,

    /// Workspace directory passed to tools
    #[arg(long, default_value = ".")]
    workspace: PathBuf,

    /// Model ID
    #[arg(long, default_value = "claude-sonnet-4-5")]
    model: String,

    /// OpenAI-compatible API base URL
    #[arg(long, default_value = "https://api.anthropic.com/v1")]
    base_url: String,

    /// Environment variable holding the API key
    #[arg(long, default_value = "HERMIT_API_KEY")]
    api_key_env: String,

    /// Maximum model calls per agent run
    #[arg(long, default_value_t = 10)]
    max_steps: usize,

    /// Token budget before summarization kicks in
    #[arg(long, default_value_t = 100_000)]
    context_budget: usize,

    /// Print loop events to stderr
    #[arg(long, short = 'v')]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let api_key = std::env::var(&cli.api_key_env)
        .with_context(|| format!("set the {} environment variable", cli.api_key_env))?;

    if cli.task.trim().is_empty() {
        bail!("task must not be empty");
    }

    let config = EngineConfig {
        max_steps: cli.max_steps,
        context_budget: cli.context_budget,
        ..EngineConfig::default()
    };

    let transport = HttpTransport::new(TransportConfig::new(
        &cli.base_url,
        api_key,
        &cli.model,
    ));
    let gateway = Arc::new(ModelGateway::new(Arc::new(transport), config.retry.clone()));

    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(CalculateTool));
    let registry = Arc::new(registry);

    let library = Arc::new(AgentLibrary::discover(&cli.agents_dir));

    let (events, mut event_rx) = EventSink::channel();
    let printer = cli.verbose.then(|| {
        tokio::spawn(async move {
            while let Some(event) = event_rx.recv().await {
                print_event(&event);
            }
        })
    });

    // Root tool set: registry tools, session notes, and sub-agent
    // invocation when any agents were discovered.
    let session_notes = hermit_core::agent::SessionNotes::default();
    let mut tools = registry.tool_set(None);
    tools.push(Arc::new(RecordNoteTool::new(session_notes.clone())));
    if !library.is_empty() {
        tools.push(Arc::new(
            InvokeAgentTool::new(
                library.clone(),
                registry.clone(),
                gateway.clone(),
                config.clone(),
            )
            .with_events(events.clone()),
        ));
    }

    let system_prompt = compose_system_prompt(
        ROOT_PROMPT,
        &cli.workspace,
        &tools.names(),
        &[],
        Some(&library),
    );

    let mut session = Session::new(system_prompt, &cli.task, 0);
    session.notes = session_notes;

    let mut runner = AgentRunner::new(gateway, tools, session, config.loop_config(None))
        .with_context(ToolContext::new(cli.workspace.clone()))
        .with_events(events);

    let outcome = runner.run().await;

    // Drop the runner (and with it every sink clone) so the printer's
    // channel closes and it can drain.
    drop(runner);
    if let Some(printer) = printer {
        let _ = printer.await;
    }

    match outcome {
        Ok(answer) => {
            println!("{answer}");
            Ok(())
        }
        Err(EngineError::Model(e)) => bail!("model call failed: {e}"),
        Err(e) => bail!("{e}"),
    }
}

fn print_event(event: &AgentEvent) {
    match event {
        AgentEvent::StepStarted { step } => eprintln!("· step {step}"),
        AgentEvent::ModelCallRetry {
            attempt,
            delay_ms,
            error,
        } => eprintln!("⟳ retry {attempt} in {delay_ms}ms ({error})"),
        AgentEvent::SummarizationTriggered {
            segments,
            tokens_before,
            tokens_after,
        } => eprintln!("≈ summarized {segments} segment(s): {tokens_before} → {tokens_after} tokens"),
        AgentEvent::ToolInvoked { name, .. } => eprintln!("→ {name}"),
        AgentEvent::ToolCompleted { name, success, .. } => {
            eprintln!("{} {name}", if *success { "✓" } else { "✗" })
        }
        AgentEvent::SubAgentInvoked { agent, .. } => eprintln!("◆ sub-agent {agent}"),
        AgentEvent::SubAgentCompleted { agent, success } => {
            eprintln!("◆ sub-agent {agent} {}", if *success { "done" } else { "failed" })
        }
        AgentEvent::Completed { steps, .. } => eprintln!("■ completed in {steps} step(s)"),
        AgentEvent::Failed { error } => eprintln!("■ failed: {error}"),
    }
}
