use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

use graphite_relay::config::Config;
use graphite_relay::relay::Relay;

/// Aggregating relay for Graphite line-protocol metrics.
#[derive(Parser)]
#[command(name = "graphite-relay", about)]
struct Cli {
    /// Path to the YAML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Logging verbosity level (trace, debug, info, warn, error).
    /// Overrides the configured log_level.
    #[arg(long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Print version information and exit.
    Version,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(Command::Version) = &cli.command {
        println!("graphite-relay {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let config_path = cli
        .config
        .context("--config is required (use --help for usage)")?;

    let cfg = Config::load(&config_path)
        .with_context(|| format!("loading config from {}", config_path.display()))?;

    init_tracing(&cfg, cli.log_level.as_deref())?;

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting graphite-relay");

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("building tokio runtime")?;

    rt.block_on(async { run(cfg).await })
}

/// Initialize tracing to stdout or the configured log file. The CLI
/// verbosity, when given, wins over the configured one.
fn init_tracing(cfg: &Config, cli_level: Option<&str>) -> Result<()> {
    let level = cli_level.unwrap_or(&cfg.log_level);
    let filter =
        EnvFilter::try_new(level).with_context(|| format!("invalid log level: {level}"))?;

    match &cfg.log_file {
        Some(path) => {
            let file = std::fs::File::create(path)
                .with_context(|| format!("opening log file {}", path.display()))?;
            fmt()
                .with_env_filter(filter)
                .with_target(true)
                .with_ansi(false)
                .with_writer(std::sync::Mutex::new(file))
                .init();
        }
        None => {
            fmt().with_env_filter(filter).with_target(true).init();
        }
    }

    Ok(())
}

async fn run(cfg: Config) -> Result<()> {
    // Set up signal handling.
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to register SIGTERM handler");

        tokio::select! {
            _ = ctrl_c => {
                tracing::info!("received SIGINT, shutting down");
            }
            _ = sigterm.recv() => {
                tracing::info!("received SIGTERM, shutting down");
            }
        }

        let _ = shutdown_tx.send(());
    });

    let mut relay = Relay::new(cfg);
    relay.start().await?;

    let _ = shutdown_rx.await;

    relay.stop();

    tracing::info!("graphite-relay stopped");

    Ok(())
}
