// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use anyhow::Result;
use clap::Parser;
use dd_pubsupervisor::PublisherSupervisor;
use dd_pubsupervisor::config::{self, CONFIG_DIR_ENV, DEFAULT_CONFIG_DIR};
use log::{LevelFilter, info, warn};
use simple_logger::SimpleLogger;
use std::path::PathBuf;
use tokio::signal::unix::{SignalKind, signal};
use tokio::time::{Duration, timeout};

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Launch one publisher worker per config file and report what they publish.
#[derive(Debug, Parser)]
#[command(name = "pubsupervisor", version)]
struct Cli {
    /// Directory holding one `<name>.yaml` per worker.
    #[arg(long, env = CONFIG_DIR_ENV, default_value = DEFAULT_CONFIG_DIR)]
    config_dir: PathBuf,

    #[arg(long, default_value = "info")]
    log_level: LevelFilter,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    SimpleLogger::new()
        .with_level(cli.log_level)
        .with_utc_timestamps()
        .init()?;
    info!(
        "pubsupervisor starting (version {})",
        env!("CARGO_PKG_VERSION")
    );

    // Installed before any worker starts so a prompt SIGTERM still stops them.
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    if !cli.config_dir.exists() {
        warn!(
            "config directory {} does not exist, nothing to supervise",
            cli.config_dir.display()
        );
        return Ok(());
    }

    let configs = config::load_configs(&cli.config_dir)?;
    info!("loaded {} publisher config(s)", configs.len());

    let mut supervisors = Vec::with_capacity(configs.len());
    for (name, cfg) in configs {
        let supervisor = PublisherSupervisor::with_options(
            cfg.worker_config(),
            cfg.worker_command(),
            cfg.supervisor_options(),
        );
        let publisher_id = supervisor.publisher_id().to_string();
        supervisor.set_on_published(move |payload| info!("[{publisher_id}] published {payload}"));

        info!("[{}] starting worker '{name}'", supervisor.publisher_id());
        supervisor.start();
        supervisors.push(supervisor);
    }

    let all_finished = async {
        for supervisor in &supervisors {
            supervisor.wait_stopped().await;
        }
    };

    tokio::select! {
        _ = all_finished => {
            info!("all workers finished");
            return Ok(());
        }
        _ = sigterm.recv() => info!("received SIGTERM"),
        _ = sigint.recv() => info!("received SIGINT"),
    }

    for supervisor in &supervisors {
        supervisor.stop();
    }
    let all_stopped = async {
        for supervisor in &supervisors {
            supervisor.wait_stopped().await;
        }
    };
    if timeout(SHUTDOWN_TIMEOUT, all_stopped).await.is_err() {
        warn!(
            "shutdown timeout ({}s) reached with workers still running",
            SHUTDOWN_TIMEOUT.as_secs()
        );
    }

    info!("pubsupervisor shutting down");
    Ok(())
}
