//! Netradio - headless internet radio daemon.
//!
//! Connects to an MQTT broker, announces itself, and plays the internet
//! streams it is told to play. Runs until Ctrl+C/SIGTERM, or until a restart
//! command arrives, in which case it re-executes itself after a clean
//! shutdown.

mod config;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use netradio_core::{bootstrap_device, DeviceParts};
use tokio::signal;

use crate::config::DeviceConfig;

/// Netradio - MQTT-controlled internet radio.
#[derive(Parser, Debug)]
#[command(name = "netradio")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file (YAML).
    #[arg(short, long, value_name = "FILE", env = "NETRADIO_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(short, long, default_value = "info", env = "NETRADIO_LOG_LEVEL")]
    log_level: log::LevelFilter,

    /// Broker host (overrides config file).
    #[arg(short = 'b', long)]
    broker_host: Option<String>,

    /// Broker port (overrides config file).
    #[arg(short = 'p', long)]
    broker_port: Option<u16>,

    /// Device name (overrides config file).
    #[arg(short = 'n', long)]
    device_name: Option<String>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    env_logger::Builder::new()
        .filter_level(args.log_level)
        .format_timestamp_millis()
        .init();

    log::info!("Netradio v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let mut config =
        DeviceConfig::load(args.config.as_deref()).context("Failed to load configuration")?;

    // Apply CLI overrides
    if let Some(host) = args.broker_host {
        config.broker_host = host;
    }
    if let Some(port) = args.broker_port {
        config.broker_port = port;
    }
    if let Some(name) = args.device_name {
        config.device_name = name;
    }

    log::info!(
        "Configuration: device={}, broker={}:{}, matching={:?}",
        config.device_name,
        config.broker_host,
        config.broker_port,
        config.topic_matching
    );

    let device = bootstrap_device(&config.to_core_config(), DeviceParts::standard())
        .context("Failed to bootstrap device")?;

    // Both execution contexts own their threads; main only waits for a stop.
    let mut running = device
        .start()
        .context("Failed to start execution contexts")?;

    log::info!("Device started");

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to build signal runtime")?;

    let cancel_token = running.cancel_token.clone();
    runtime.block_on(async {
        tokio::select! {
            _ = shutdown_signal() => log::info!("Shutdown signal received, cleaning up..."),
            _ = cancel_token.cancelled() => log::info!("Device requested stop, cleaning up..."),
        }
    });

    // Graceful shutdown
    running.shutdown();

    if running.restart_requested() {
        restart_process()?;
    }

    log::info!("Shutdown complete");
    Ok(())
}

/// Waits for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Replaces the current process with a fresh instance using the same arguments.
#[cfg(unix)]
fn restart_process() -> Result<()> {
    use std::os::unix::process::CommandExt;

    let exe = std::env::current_exe().context("Failed to locate executable for restart")?;
    log::info!("Restarting {}", exe.display());

    // exec only returns on failure
    let err = std::process::Command::new(&exe)
        .args(std::env::args_os().skip(1))
        .exec();
    Err(err).context("Failed to re-execute for restart")
}

/// Starts a fresh instance with the same arguments and lets this one exit.
#[cfg(not(unix))]
fn restart_process() -> Result<()> {
    let exe = std::env::current_exe().context("Failed to locate executable for restart")?;
    log::info!("Restarting {}", exe.display());

    std::process::Command::new(&exe)
        .args(std::env::args_os().skip(1))
        .spawn()
        .context("Failed to spawn new instance for restart")?;
    Ok(())
}
