//! interlude - interruptible agent gateway and terminal chat

use anyhow::Context;
use clap::{Parser, Subcommand};
use interlude_core::{BindMode, InterludeConfig, ThreadId, DEFAULT_THREAD_ID};
use interlude_gateway::config::parse_provider;
use interlude_gateway::{build_executor, load_config, start_gateway};
use interlude_tools::AssistanceMode;
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "interlude", about = "Interruptible agent execution engine", version)]
struct Cli {
    /// TOML config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Also write logs to a daily-rolling file in this directory
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(clap::Args)]
struct AgentArgs {
    /// LLM provider: anthropic or scripted
    #[arg(long)]
    provider: Option<String>,
    /// Model to use
    #[arg(short, long)]
    model: Option<String>,
    #[arg(long)]
    system_prompt: Option<String>,
    #[arg(long)]
    max_steps: Option<usize>,
    /// Human-assistance flavour for chat and the gateway's root routes: review or query
    #[arg(long, default_value = "review")]
    assistance: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP gateway
    Serve {
        #[arg(short, long)]
        port: Option<u16>,
        /// loopback or lan
        #[arg(short, long)]
        bind: Option<String>,
        #[command(flatten)]
        agent: AgentArgs,
    },
    /// Chat with the agent in the terminal
    Chat {
        /// Thread to continue
        #[arg(short, long, default_value = DEFAULT_THREAD_ID)]
        thread: String,
        #[command(flatten)]
        agent: AgentArgs,
    },
    /// Show version
    Version,
}

impl AgentArgs {
    fn apply(&self, config: &mut InterludeConfig) -> anyhow::Result<AssistanceMode> {
        if let Some(provider) = &self.provider {
            config.provider.kind = parse_provider(provider)?;
        }
        if let Some(model) = &self.model {
            config.agent.model = model.clone();
        }
        if let Some(prompt) = &self.system_prompt {
            config.agent.system_prompt = Some(prompt.clone());
        }
        if let Some(steps) = self.max_steps {
            config.agent.max_steps = steps;
        }
        AssistanceMode::parse(&self.assistance)
            .with_context(|| format!("unknown assistance mode: {}", self.assistance))
    }
}

fn init_tracing(default_filter: &str, log_dir: Option<&Path>) -> Option<WorkerGuard> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "interlude.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_ansi(false).with_writer(writer)),
                Some(guard),
            )
        }
        None => (None, None),
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();
    guard
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Serve { port, bind, agent }) => {
            let _guard = init_tracing("interlude=info,tower_http=info", cli.log_dir.as_deref());
            let mut config = load_config(cli.config.as_deref())?;
            let mode = agent.apply(&mut config)?;
            if let Some(port) = port {
                config.gateway.port = port;
            }
            if let Some(bind) = bind {
                config.gateway.bind = BindMode::parse(&bind);
            }
            start_gateway(config, mode).await?;
        }

        Some(Commands::Chat { thread, agent }) => {
            let _guard = init_tracing("interlude=warn", cli.log_dir.as_deref());
            let mut config = load_config(cli.config.as_deref())?;
            let mode = agent.apply(&mut config)?;
            let executor = build_executor(&config, mode)?;
            interlude_gateway::repl::run_repl(executor, ThreadId::new(thread)).await?;
        }

        Some(Commands::Version) => {
            println!("interlude v{}", env!("CARGO_PKG_VERSION"));
        }

        None => {
            let _guard = init_tracing("interlude=warn", cli.log_dir.as_deref());
            let config = load_config(cli.config.as_deref())?;
            let executor = build_executor(&config, AssistanceMode::default())?;
            interlude_gateway::repl::run_repl(executor, ThreadId::default()).await?;
        }
    }

    Ok(())
}
