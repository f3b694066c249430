//! fleetconn server entry point
//!
//! Bootstraps configuration, the database-backed registry, the SSH/SFTP
//! pools, the broadcast hub and the monitoring supervisor, then serves
//! the HTTP/WebSocket surface until shutdown is requested. Teardown runs
//! in dependency order: monitor pool, hub, SFTP pool, SSH pool.

mod http;
mod state;
mod ws;

use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Instant;

use tokio::net::TcpListener;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use fleetconn_core::config::AppConfig;
use fleetconn_core::hub::Hub;
use fleetconn_core::monitor::MonitorPool;
use fleetconn_core::registry::HostRegistry;
use fleetconn_core::sftp::SftpPool;
use fleetconn_core::ssh::SshPool;
use fleetconn_core::vault::CredentialVault;

use state::AppState;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(%e, "Startup failed");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let config = Arc::new(AppConfig::from_env());
    config.validate()?;

    let vault = Arc::new(CredentialVault::new(&config.encryption_key)?);

    let registry = HostRegistry::connect(&config.database_url()).await?;
    registry.migrate().await?;

    let ssh_pool = Arc::new(SshPool::new(config.ssh_timeout, config.ssh_keepalive));
    let sftp_pool = Arc::new(SftpPool::new(Arc::clone(&ssh_pool)));

    let (hub, dispatcher) = Hub::new();
    tokio::spawn(dispatcher.run());

    let monitor = Arc::new(MonitorPool::new(
        Arc::clone(&ssh_pool),
        Arc::clone(&sftp_pool),
        registry.clone(),
        Arc::clone(&vault),
        hub.clone(),
        config.metrics_interval,
    ));
    monitor.start_all().await?;

    let app_state = AppState {
        config: Arc::clone(&config),
        registry,
        vault,
        ssh_pool: Arc::clone(&ssh_pool),
        sftp_pool: Arc::clone(&sftp_pool),
        monitor: Arc::clone(&monitor),
        hub: hub.clone(),
        started_at: Instant::now(),
    };
    let app = http::build_router(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "fleetconn listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Shutting down");
    monitor.stop_all().await;
    hub.shutdown().await;
    sftp_pool.drain().await;
    ssh_pool.drain().await;
    tracing::info!("Shutdown complete");

    Ok(())
}

/// Completes on ctrl-c or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(_) => std::future::pending().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
