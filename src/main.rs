// MIT License
// INDI gateway monitor

use anyhow::{Context, Result};
use clap::Parser;
use serde::Deserialize;
use std::time::Duration;
use tracing::{info, warn};

use indi_bridge::{ClientConfig, ClientEvent, IndiClient, DEFAULT_PORT};

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

#[derive(Parser)]
#[command(name = "indi-monitor")]
#[command(about = "Watch devices and property updates on an INDI gateway")]
struct Cli {
    /// Gateway host (overrides the config file)
    #[arg(long)]
    host: Option<String>,

    /// Gateway port (overrides the config file)
    #[arg(long)]
    port: Option<u16>,

    /// Path to an optional TOML configuration file
    #[arg(long)]
    config: Option<String>,

    /// Device to connect after discovery (may be repeated)
    #[arg(long = "connect-device")]
    connect_devices: Vec<String>,
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    gateway: GatewayToml,
}

#[derive(Debug, Deserialize)]
struct GatewayToml {
    #[serde(default = "default_host")]
    host: String,
    #[serde(default = "default_port")]
    port: u16,
    #[serde(default = "default_connect_timeout")]
    connect_timeout_ms: u64,
    #[serde(default = "default_reconnect_delay")]
    reconnect_delay_ms: u64,
    #[serde(default = "default_reconnect_attempts")]
    reconnect_attempts: u32,
}

impl Default for GatewayToml {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            connect_timeout_ms: default_connect_timeout(),
            reconnect_delay_ms: default_reconnect_delay(),
            reconnect_attempts: default_reconnect_attempts(),
        }
    }
}

fn default_host() -> String {
    "localhost".to_string()
}
fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_connect_timeout() -> u64 {
    5000
}
fn default_reconnect_delay() -> u64 {
    2000
}
fn default_reconnect_attempts() -> u32 {
    5
}

fn build_client_config(cli: &Cli, file: &GatewayToml) -> ClientConfig {
    ClientConfig::builder()
        .host(cli.host.clone().unwrap_or_else(|| file.host.clone()))
        .port(cli.port.unwrap_or(file.port))
        .connect_timeout(Duration::from_millis(file.connect_timeout_ms))
        .base_reconnect_delay(Duration::from_millis(file.reconnect_delay_ms))
        .max_reconnect_attempts(file.reconnect_attempts)
        .build()
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    // RUST_LOG controls verbosity (e.g. RUST_LOG=debug or RUST_LOG=indi_bridge=trace).
    // Default: info.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    // systemd journal already adds timestamps, so omit them when running under systemd
    if std::env::var_os("JOURNAL_STREAM").is_some() {
        tracing_subscriber::fmt().without_time().with_env_filter(env_filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let cli = Cli::parse();

    let file_config = match &cli.config {
        Some(path) => {
            let text = std::fs::read_to_string(path).context("Failed to read config file")?;
            toml::from_str::<ConfigFile>(&text).context("Failed to parse config file")?
        }
        None => ConfigFile::default(),
    };

    let config = build_client_config(&cli, &file_config.gateway);
    info!("Connecting to INDI gateway at {}", config.address());

    let client = IndiClient::new(config);
    let mut events = client.subscribe();

    client.connect().await;

    for device in &cli.connect_devices {
        if let Err(e) = client.connect_device(device) {
            warn!("cannot connect {device:?}: {e}");
        }
    }

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(ClientEvent::Connection(up)) => {
                    info!("gateway link {}", if up { "up" } else { "down" });
                }
                Ok(ClientEvent::DevicesUpdated(devices)) => {
                    let names: Vec<&str> = devices.iter().map(|d| d.name.as_str()).collect();
                    info!("devices: {names:?}");
                }
                Ok(ClientEvent::PropertyUpdated { device, property, data }) => {
                    info!(
                        "{device}.{property} [{}] {} element(s)",
                        data.state.as_str(),
                        data.elements().len()
                    );
                }
                Ok(ClientEvent::Message { device, text, .. }) => {
                    info!("message from {}: {text}", device.as_deref().unwrap_or("gateway"));
                }
                Ok(ClientEvent::Error { kind, message }) => {
                    warn!("{kind} error: {message}");
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(missed)) => {
                    warn!("event stream lagged, {missed} event(s) missed");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            },
            _ = tokio::signal::ctrl_c() => {
                info!("shutting down");
                client.disconnect();
                break;
            }
        }
    }

    Ok(())
}
