//! kumite: serial gesture telemetry bridge.
//!
//! Wires the core pieces together: configuration, logging, the supervised
//! serial reader task, the HTTP server, and Ctrl-C shutdown.

mod cli;

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::sync::watch;
use tracing::info;

use kumite_core::config::Config;
use kumite_core::logging::init_logging;
use kumite_core::publish::prediction_cell;
use kumite_core::reader::{ReaderMetrics, SerialReader, TtyConnector};
use kumite_core::web::{WebServerConfig, start_web_server};

use cli::{Cli, Command, ConfigCommand, RunArgs};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Run(args) => run(&cli.config, args).await,
        Command::Config(ConfigCommand::Init) => config_init(&cli.config),
        Command::Config(ConfigCommand::Show) => config_show(&cli.config),
    }
}

async fn run(config_path: &std::path::Path, args: RunArgs) -> anyhow::Result<()> {
    let mut config = Config::load_or_default(config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;

    if let Some(device) = args.device {
        config.serial.device = device;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(level) = args.log_level {
        config.log.level = level;
    }
    if let Some(format) = args.log_format {
        config.log.format = format.into();
    }
    config.validate().context("invalid configuration")?;

    init_logging(&config.log).context("initializing logging")?;
    info!(
        device = %config.serial.device,
        port = config.server.port,
        labels = ?config.aggregate.labels,
        "starting kumite"
    );

    let (publisher, prediction) = prediction_cell(&config.aggregate.placeholder);
    let metrics = Arc::new(ReaderMetrics::default());
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let reader = SerialReader::new(
        TtyConnector::new(&config.serial),
        config.serial.clone(),
        config.aggregate.labels.clone(),
        config.aggregate.publish_interval_ms,
        publisher,
        Arc::clone(&metrics),
    );
    let reader_task = tokio::spawn(reader.run(shutdown_rx.clone()));

    let server = start_web_server(
        WebServerConfig::from(&config.server),
        prediction,
        metrics,
        shutdown_rx,
    )
    .await
    .context("starting web server")?;
    info!(addr = %server.bound_addr(), "open the page in a browser");

    tokio::signal::ctrl_c()
        .await
        .context("waiting for Ctrl-C")?;
    info!("shutting down");
    shutdown_tx.send(true).ok();

    reader_task.await.context("joining serial reader")?;
    server.join().await;
    Ok(())
}

fn config_init(path: &std::path::Path) -> anyhow::Result<()> {
    anyhow::ensure!(
        !path.exists(),
        "refusing to overwrite existing {}",
        path.display()
    );
    let rendered = Config::default()
        .to_toml_string()
        .context("rendering default config")?;
    std::fs::write(path, rendered).with_context(|| format!("writing {}", path.display()))?;
    println!("wrote {}", path.display());
    Ok(())
}

fn config_show(path: &std::path::Path) -> anyhow::Result<()> {
    let config = Config::load_or_default(path)
        .with_context(|| format!("loading {}", path.display()))?;
    print!("{}", config.to_toml_string().context("rendering config")?);
    Ok(())
}
