//! vidmp3 daemon
//!
//! Telegram bot that turns video links into MP3 files.

mod dispatcher;
mod handlers;
mod progress;

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use vidmp3_core::{BotConfig, LogFormat, LoggingConfig};
use vidmp3_runtime::{setup_cookies, YtDlpConfig, YtDlpRuntime};
use vidmp3_telegram::BotClient;

use crate::dispatcher::Dispatcher;
use crate::handlers::{HandlerSettings, Handlers};

/// vidmp3d - Telegram bot converting video links to MP3
#[derive(Parser, Debug)]
#[command(name = "vidmp3d")]
#[command(version, about, long_about = None)]
struct Args {
    /// Optional TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log level, overrides the configuration and RUST_LOG
    #[arg(long)]
    log_level: Option<String>,
}

fn init_logging(config: &LoggingConfig, level_override: Option<&str>) {
    let filter = match level_override {
        Some(level) => EnvFilter::try_new(level),
        None => EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&config.level)),
    }
    .unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false);

    let result = match config.format {
        LogFormat::Json => tracing::subscriber::set_global_default(builder.json().finish()),
        LogFormat::Text => tracing::subscriber::set_global_default(builder.finish()),
    };
    if let Err(e) = result {
        eprintln!("Failed to set up logging: {}", e);
    }
}

/// Resolves on Ctrl-C, or SIGTERM when running as a container's main process
async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = BotConfig::load(args.config.as_deref())?;
    init_logging(&config.logging, args.log_level.as_deref());

    info!("Starting vidmp3 v{}", env!("CARGO_PKG_VERSION"));

    setup_cookies(
        &config.download.cookies_path,
        config.download.cookies_content.as_deref(),
    );

    let work_dir = config.download.work_dir();
    tokio::fs::create_dir_all(&work_dir)
        .await
        .with_context(|| format!("Failed to create work dir {}", work_dir.display()))?;

    let client = Arc::new(BotClient::new(&config.telegram)?);
    let me = client
        .get_me()
        .await
        .context("Failed to reach the Telegram Bot API")?;

    let runtime = Arc::new(YtDlpRuntime::new(YtDlpConfig::from(&config.download)));
    info!(
        work_dir = %runtime.work_dir().display(),
        max_jobs = config.bot.max_concurrent_jobs,
        "Downloader ready"
    );

    let handlers = Arc::new(Handlers::new(
        client.clone(),
        runtime,
        HandlerSettings::from(&config),
    ));

    info!(
        username = me.username.as_deref().unwrap_or(&me.first_name),
        "🚀 Video → MP3 bot started"
    );

    let dispatcher = Dispatcher::new(
        client,
        handlers,
        Duration::from_secs(config.telegram.retry_delay_secs),
    );
    dispatcher.run(shutdown_signal()).await;

    info!("vidmp3 stopped");
    Ok(())
}
