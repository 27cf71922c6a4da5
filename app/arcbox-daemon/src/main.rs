use anyhow::{Context, Result};
use arcbox_core::{Config, Runtime};
use arcbox_docker::{DockerApiServer, ServerConfig};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "arcbox-daemon")]
#[command(author, version, about, long_about = None)]
pub struct DaemonArgs {
    /// Unix socket path for Docker API (default: from config, ~/.arcbox/docker.sock).
    #[arg(long)]
    pub socket: Option<PathBuf>,

    /// Data directory for ArcBox.
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Configuration file, instead of the system and user config files.
    #[arg(long)]
    pub config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = DaemonArgs::parse();
    let config = load_config(&args)?;
    init_logging(&config);

    run(args, config).await
}

fn load_config(args: &DaemonArgs) -> Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::load().context("Failed to load config")?,
    };
    if let Some(data_dir) = &args.data_dir {
        config.data_dir.clone_from(data_dir);
    }
    if let Some(socket) = &args.socket {
        config.docker.socket_path.clone_from(socket);
    }
    Ok(config)
}

/// `RUST_LOG` wins over the configured level.
fn init_logging(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    let fmt_layer = if config.logging.format == "json" {
        tracing_subscriber::fmt::layer()
            .json()
            .with_target(false)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer().with_target(false).boxed()
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}

async fn run(args: DaemonArgs, config: Config) -> Result<()> {
    info!("Starting ArcBox daemon...");

    let data_dir = config.data_dir.clone();
    let socket_path = config.docker.socket_path.clone();
    let docker_enabled = config.docker.enabled;
    let pid_file = data_dir.join("daemon.pid");

    let runtime = Arc::new(Runtime::new(config).context("Failed to create runtime")?);
    std::fs::write(&pid_file, format!("{}\n", std::process::id()))
        .context("Failed to write daemon PID file")?;

    info!(
        data_dir = %data_dir.display(),
        config = ?args.config,
        "Runtime initialized"
    );

    let docker_handle = if docker_enabled {
        let docker_server = DockerApiServer::new(
            ServerConfig {
                socket_path: socket_path.clone(),
            },
            Arc::clone(&runtime),
        );
        Some(tokio::spawn(async move {
            if let Err(e) = docker_server.run().await {
                tracing::error!("Docker API server error: {}", e);
            }
        }))
    } else {
        warn!("Docker API disabled by configuration");
        None
    };

    println!("ArcBox daemon started");
    if docker_enabled {
        println!("  Docker API: {}", socket_path.display());
    }
    println!("  Data:       {}", data_dir.display());
    println!();
    println!("Press Ctrl+C to stop.");

    shutdown_signal().await?;
    info!("Shutdown signal received");

    // Cancels in-flight requests and collections; the server stops accepting
    // and removes its socket.
    runtime.shutdown();
    if let Some(handle) = docker_handle {
        if let Err(e) = handle.await {
            warn!("Docker API server task failed: {}", e);
        }
    }

    if let Err(e) = std::fs::remove_file(&pid_file) {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!("Failed to remove PID file {}: {}", pid_file.display(), e);
        }
    }

    info!("ArcBox daemon stopped");
    Ok(())
}

async fn shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        let mut terminate = signal::unix::signal(signal::unix::SignalKind::terminate())
            .context("Failed to install SIGTERM handler")?;
        tokio::select! {
            res = signal::ctrl_c() => res.context("Failed to install Ctrl+C handler")?,
            _ = terminate.recv() => {},
        }
    }

    #[cfg(not(unix))]
    signal::ctrl_c()
        .await
        .context("Failed to install Ctrl+C handler")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_overrides_config_paths() {
        let args = DaemonArgs::parse_from([
            "arcbox-daemon",
            "--data-dir",
            "/tmp/arcbox-test-data",
            "--socket",
            "/tmp/arcbox-test.sock",
        ]);
        let config = load_config(&args).unwrap();

        assert_eq!(config.data_dir, PathBuf::from("/tmp/arcbox-test-data"));
        assert_eq!(
            config.docker.socket_path,
            PathBuf::from("/tmp/arcbox-test.sock")
        );
    }

    #[test]
    fn missing_config_file_falls_back_to_defaults() {
        let args = DaemonArgs::parse_from([
            "arcbox-daemon",
            "--config",
            "/nonexistent/arcbox/config.toml",
        ]);
        let config = load_config(&args).unwrap();
        assert_eq!(config.logging.level, "info");
    }
}
