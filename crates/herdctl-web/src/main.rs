#![deny(unsafe_code)]

//! herdctl-web: browser front-end for a local Ollama daemon.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use herdctl_config::AppConfig;
use herdctl_web::WebState;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "herdctl-web", version = herdctl_core::build_info::VERSION, about, long_about = None)]
struct Args {
    /// Path to configuration file.
    #[arg(short, long, default_value = "herdctl.toml")]
    config: PathBuf,

    /// Daemon base URL, overriding the config file.
    #[arg(long)]
    url: Option<String>,

    /// Port to listen on, overriding `web.listen_port`.
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = AppConfig::load_or_default(&args.config)
        .await
        .with_context(|| format!("failed to load config from {}", args.config.display()))?;
    if let Some(url) = args.url {
        config.daemon.base_url = url;
    }
    if let Some(port) = args.port {
        config.web.listen_port = port;
    }
    config.validate().context("invalid command-line override")?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .init();
    info!(
        version = %herdctl_core::build_info::version_string(),
        base_url = %config.daemon.base_url,
        "starting herdctl-web"
    );

    let addr = format!("{}:{}", config.web.listen_addr, config.web.listen_port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    let state = Arc::new(WebState::from_config(&config));
    herdctl_web::serve(listener, state, async {
        let _ = tokio::signal::ctrl_c().await;
        info!("shutting down");
    })
    .await
    .context("web server failed")?;

    Ok(())
}
