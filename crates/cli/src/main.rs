//! Veritas CLI
//!
//! Grounded question answering over a local knowledge store and live web
//! search, with validated, cited answers.

mod commands;

use clap::{Parser, Subcommand};
use commands::{AskCommand, ChatCommand};
use std::path::PathBuf;
use veritas_core::{config::AppConfig, logging, AppResult};

/// Veritas - grounded dual-source question answering
#[derive(Parser, Debug)]
#[command(name = "veritas")]
#[command(about = "Grounded dual-source question answering", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to workspace directory (default: current directory)
    #[arg(short, long, global = true, env = "VERITAS_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Path to config file
    #[arg(short, long, global = true, env = "VERITAS_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, env = "RUST_LOG")]
    log_level: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    no_color: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    /// LLM provider (ollama, openai, groq)
    #[arg(short, long, global = true, env = "VERITAS_PROVIDER")]
    provider: Option<String>,

    /// Model identifier
    #[arg(short, long, global = true, env = "VERITAS_MODEL")]
    model: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Answer one or more questions
    Ask(AskCommand),

    /// Interactive conversation with history
    Chat(ChatCommand),
}

#[tokio::main]
async fn main() -> AppResult<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load()?;

    // A different workspace or config file means a different YAML to merge
    if cli.workspace.is_some() || cli.config.is_some() {
        config = config
            .with_overrides(
                cli.workspace,
                cli.config,
                None,
                None,
                None,
                false,
                false,
                false,
            )
            .reload_file()?;
    }

    let config = config.with_overrides(
        None,
        None,
        cli.provider,
        cli.model,
        cli.log_level,
        cli.verbose,
        cli.no_color,
        cli.log_json,
    );

    logging::init_logging(config.log_level.as_deref(), config.no_color, config.log_json)?;

    tracing::info!("Veritas CLI starting");
    tracing::debug!("Workspace: {:?}", config.workspace);
    tracing::debug!("Provider: {}", config.provider);
    tracing::debug!("Model: {}", config.model);

    config.validate()?;

    let command_name = match &cli.command {
        Commands::Ask(_) => "ask",
        Commands::Chat(_) => "chat",
    };
    let _span = tracing::info_span!("command", name = command_name).entered();

    let result = match cli.command {
        Commands::Ask(cmd) => cmd.execute(&config).await,
        Commands::Chat(cmd) => cmd.execute(&config).await,
    };

    match &result {
        Ok(_) => tracing::info!("Command completed successfully"),
        Err(e) => tracing::error!("Command failed: {}", e),
    }

    result
}
