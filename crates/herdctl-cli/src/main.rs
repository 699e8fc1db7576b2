#![deny(unsafe_code)]

//! herdctl CLI: check, start, stop and restart the local model daemon.

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use herdctl_config::AppConfig;
use herdctl_core::{
    DaemonClient, LifecycleAction, LifecycleController, ModelSummary, OperationResult,
    ServerStatus, probe,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// herdctl: manage a local Ollama daemon.
#[derive(Parser)]
#[command(name = "herdctl", version = herdctl_core::build_info::VERSION, about, long_about = None)]
struct Cli {
    /// Path to configuration file.
    #[arg(short, long, default_value = "herdctl.toml")]
    config: PathBuf,

    /// Daemon base URL, overriding the config file.
    #[arg(long)]
    url: Option<String>,

    /// Increase log verbosity (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Without a subcommand, an interactive menu is shown.
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show daemon status and installed models.
    Status,

    /// Start the daemon in the background.
    Start,

    /// Stop the daemon.
    Stop,

    /// Stop, then start the daemon.
    Restart,

    /// Manage installed models.
    Models {
        #[command(subcommand)]
        action: ModelsCommand,
    },

    /// Validate and display configuration.
    Config {
        /// Show the resolved configuration.
        #[arg(long)]
        show: bool,
    },
}

#[derive(Subcommand)]
enum ModelsCommand {
    /// List installed models.
    List,
    /// Download a model (blocks until the daemon finishes).
    Pull { name: String },
    /// Remove an installed model.
    Delete { name: String },
    /// Show a model's metadata as JSON.
    Info { name: String },
}

struct Context {
    config: AppConfig,
    client: Arc<DaemonClient>,
    controller: LifecycleController,
}

impl Context {
    fn new(config: AppConfig) -> Self {
        let client = Arc::new(DaemonClient::from_config(&config.daemon));
        let controller = LifecycleController::from_config(&config.lifecycle);
        Self {
            config,
            client,
            controller,
        }
    }

    async fn probe(&self) -> ServerStatus {
        probe::probe(&self.client, self.config.daemon.cli_probe_timeout()).await
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let mut config = load_config(&cli.config).await?;
    if let Some(url) = cli.url {
        config.daemon.base_url = url;
        config.validate().context("invalid --url")?;
    }

    let filter = match cli.verbose {
        0 => config.logging.level.clone(),
        1 => "debug".to_string(),
        _ => "trace".to_string(),
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();
    debug!(base_url = %config.daemon.base_url, config = %cli.config.display(), "configuration loaded");

    let show_config = match &cli.command {
        Some(Commands::Config { show }) => Some(*show),
        _ => None,
    };
    if let Some(show) = show_config {
        cmd_config(&config, &cli.config, show)?;
        return Ok(ExitCode::SUCCESS);
    }

    let ctx = Context::new(config);
    let mut out = io::stdout();

    let code = match cli.command {
        None => {
            run_interactive(&ctx).await?;
            ExitCode::SUCCESS
        }
        Some(Commands::Status) => {
            writeln!(out, "Checking Ollama server status...")?;
            let status = ctx.probe().await;
            write_status(&mut out, &status, ctx.client.base_url())?;
            ExitCode::SUCCESS
        }
        Some(Commands::Start) => cmd_lifecycle(&ctx, &mut out, LifecycleAction::Start).await?,
        Some(Commands::Stop) => cmd_lifecycle(&ctx, &mut out, LifecycleAction::Stop).await?,
        Some(Commands::Restart) => cmd_lifecycle(&ctx, &mut out, LifecycleAction::Restart).await?,
        Some(Commands::Models { action }) => exit_code(cmd_models(&ctx, &mut out, action).await?),
        Some(Commands::Config { .. }) => ExitCode::SUCCESS,
    };

    Ok(code)
}

async fn load_config(path: &Path) -> Result<AppConfig> {
    AppConfig::load_or_default(path)
        .await
        .with_context(|| format!("failed to load config from {}", path.display()))
}

fn cmd_config(config: &AppConfig, path: &Path, show: bool) -> Result<()> {
    if show {
        let toml_str = toml::to_string_pretty(config).context("failed to render config")?;
        println!("{toml_str}");
    } else {
        println!("Configuration at '{}' is valid.", path.display());
    }
    Ok(())
}

async fn cmd_lifecycle(
    ctx: &Context,
    out: &mut impl Write,
    action: LifecycleAction,
) -> Result<ExitCode> {
    writeln!(out, "{}...", progress_label(action))?;
    out.flush()?;
    let result = ctx.controller.run(action).await;
    write_result(out, action, &result)?;
    Ok(exit_code(result.success()))
}

/// Returns whether the daemon call succeeded.
async fn cmd_models(ctx: &Context, out: &mut impl Write, action: ModelsCommand) -> Result<bool> {
    let client = &ctx.client;
    let outcome = match action {
        ModelsCommand::List => client.list_models().await.map(|models| {
            write_model_table(out, &models)
        }),
        ModelsCommand::Pull { name } => {
            writeln!(out, "Downloading {name}... this may take several minutes")?;
            client
                .pull_model(&name)
                .await
                .map(|()| writeln!(out, "✓ Downloaded {name}"))
        }
        ModelsCommand::Delete { name } => client
            .delete_model(&name)
            .await
            .map(|()| writeln!(out, "✓ Deleted {name}")),
        ModelsCommand::Info { name } => client.show_model(&name).await.map(|info| {
            let pretty = serde_json::to_string_pretty(&info).unwrap_or_else(|_| info.to_string());
            writeln!(out, "{pretty}")
        }),
    };

    match outcome {
        Ok(written) => {
            written?;
            Ok(true)
        }
        Err(e) => {
            writeln!(out, "✗ Failed: {e}")?;
            Ok(false)
        }
    }
}

const MENU: &str = "\nOptions:
1. Check server status
2. Start server
3. Stop server
4. Restart server
5. Exit";

async fn run_interactive(ctx: &Context) -> Result<()> {
    println!("herdctl {}", herdctl_core::build_info::version_string());
    println!("{}", "=".repeat(50));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        println!("{MENU}");
        print!("\nSelect option (1-5): ");
        io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            println!("\nGoodbye!");
            return Ok(());
        };

        let mut out = io::stdout();
        let action = match line.trim() {
            "1" => {
                writeln!(out, "Checking Ollama server status...")?;
                let status = ctx.probe().await;
                write_status(&mut out, &status, ctx.client.base_url())?;
                continue;
            }
            "2" => LifecycleAction::Start,
            "3" => LifecycleAction::Stop,
            "4" => LifecycleAction::Restart,
            "5" | "q" | "quit" | "exit" => {
                writeln!(out, "Goodbye!")?;
                return Ok(());
            }
            _ => {
                writeln!(out, "Invalid option. Please select 1-5.")?;
                continue;
            }
        };
        cmd_lifecycle(ctx, &mut out, action).await?;
    }
}

fn exit_code(success: bool) -> ExitCode {
    if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn progress_label(action: LifecycleAction) -> &'static str {
    match action {
        LifecycleAction::Start => "Starting Ollama server",
        LifecycleAction::Stop => "Stopping Ollama server",
        LifecycleAction::Restart => "Restarting Ollama server",
    }
}

fn write_result(out: &mut impl Write, action: LifecycleAction, result: &OperationResult) -> io::Result<()> {
    if result.success() {
        let verb = match action {
            LifecycleAction::Start => "Server start command executed",
            LifecycleAction::Stop => "Server stopped",
            LifecycleAction::Restart => "Server restarted",
        };
        match result.command() {
            Some(command) => writeln!(out, "✓ {verb} ({command})")?,
            None => writeln!(out, "✓ {verb}")?,
        }
        if action != LifecycleAction::Stop {
            writeln!(out, "Note: the server starts in the background")?;
        }
    } else {
        writeln!(
            out,
            "✗ Failed to {action} server: {}",
            result.error().unwrap_or("unknown error")
        )?;
    }
    Ok(())
}

fn write_status(out: &mut impl Write, status: &ServerStatus, host: &str) -> io::Result<()> {
    writeln!(out, "Status: {}", status.state())?;
    writeln!(out, "Host: {host}")?;
    if let Some(error) = status.error_message() {
        writeln!(out, "Error: {error}")?;
    }
    if let Some(rt) = status.response_time_secs() {
        writeln!(out, "Response time: {rt:.3}s")?;
    }
    if let Some(models) = status.models() {
        writeln!(out, "Available models: {}", models.len())?;
        if !models.is_empty() {
            writeln!(out, "Models:")?;
            for model in models {
                writeln!(out, "  • {} ({})", model.name, model.size_mb())?;
            }
        }
    }
    Ok(())
}

fn write_model_table(out: &mut impl Write, models: &[ModelSummary]) -> io::Result<()> {
    if models.is_empty() {
        return writeln!(out, "No models installed.");
    }

    let name_width = models
        .iter()
        .map(|m| m.name.len())
        .max()
        .unwrap_or(0)
        .max("NAME".len());
    writeln!(
        out,
        "{:<name_width$}  {:>10}  {:<16}  FAMILY",
        "NAME", "SIZE", "MODIFIED"
    )?;
    for model in models {
        writeln!(
            out,
            "{:<name_width$}  {:>10}  {:<16}  {}",
            model.name,
            model.display_size(),
            model.modified_at.display(),
            model.family
        )?;
    }
    Ok(())
}
