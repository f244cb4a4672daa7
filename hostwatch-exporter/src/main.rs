//! hostwatch: host metrics agent.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::sync::watch;
use tracing::{error, info, warn};

use hostwatch_exporter::{ExporterConfig, HttpServer, NodeExporter};

/// How long to wait for blocking workers when the runtime stops. Workers
/// stuck in `statvfs` on a dead mount never return and are left behind.
const RUNTIME_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);

/// Host metrics agent.
#[derive(Parser, Debug)]
#[command(name = "hostwatch")]
#[command(about = "Expose host CPU, memory, network, disk and filesystem metrics")]
#[command(version)]
struct Args {
    /// Path to configuration file (JSON5 format).
    #[arg(short, long)]
    config: Option<String>,

    /// HTTP listen address (overrides config).
    #[arg(long)]
    listen: Option<String>,

    /// Log level (overrides config): trace, debug, info, warn, error.
    #[arg(long)]
    log_level: Option<String>,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = if let Some(config_path) = &args.config {
        ExporterConfig::load_from_file(config_path)?
    } else {
        ExporterConfig::default()
    };

    if let Some(listen) = args.listen {
        config.web.listen = listen;
    }
    if let Some(level) = args.log_level {
        config.logging.level = level;
    }
    config.validate()?;

    hostwatch_core::init_tracing(&config.logging)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    let result = runtime.block_on(run(config));
    runtime.shutdown_timeout(RUNTIME_SHUTDOWN_TIMEOUT);
    result
}

async fn run(config: ExporterConfig) -> anyhow::Result<()> {
    info!(version = env!("CARGO_PKG_VERSION"), "Starting hostwatch");

    let listen_addr: SocketAddr = config
        .web
        .listen
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid listen address: {}", e))?;

    let exporter = Arc::new(build_exporter(&config)?);
    info!(collectors = ?exporter.collector_names(), "Collectors enabled");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let http_server = HttpServer::new(exporter, listen_addr, config.web.path.clone());
    let mut http_task = tokio::spawn(async move { http_server.run(shutdown_rx).await });

    tokio::select! {
        _ = shutdown_signal() => {}
        result = &mut http_task => {
            // The server only returns on its own when it failed to start
            return result?;
        }
    }

    shutdown_tx.send(true)?;

    match tokio::time::timeout(Duration::from_secs(5), http_task).await {
        Ok(Ok(Ok(()))) => {}
        Ok(Ok(Err(e))) => error!("HTTP server error: {}", e),
        Ok(Err(e)) => error!("HTTP server task failed: {}", e),
        Err(_) => warn!("HTTP server did not stop within 5s"),
    }

    info!("hostwatch stopped");
    Ok(())
}

#[cfg(target_os = "linux")]
fn build_exporter(config: &ExporterConfig) -> anyhow::Result<NodeExporter> {
    use hostwatch_exporter::{ProcfsSource, StatvfsProbe};

    let source = Arc::new(ProcfsSource::new(&config.network.sysfs_path));
    Ok(NodeExporter::from_config(config, source, StatvfsProbe))
}

#[cfg(not(target_os = "linux"))]
fn build_exporter(_config: &ExporterConfig) -> anyhow::Result<NodeExporter> {
    anyhow::bail!("hostwatch reads /proc and /sys and only runs on Linux")
}

/// Resolve on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
        _ = terminate => info!("Received SIGTERM, shutting down..."),
    }
}
