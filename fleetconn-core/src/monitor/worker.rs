//! The per-host sampling loop

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::hub::Hub;
use crate::models::{Server, ServerStatus};
use crate::monitoring::MetricCollector;
use crate::registry::HostRegistry;
use crate::ssh::SshPool;

/// Reconnect attempts per outage before the host is marked in error
const MAX_RECONNECT_ATTEMPTS: u32 = 3;

/// Cool-down after exhausting reconnect attempts
const RECONNECT_COOLDOWN: Duration = Duration::from_secs(30);

/// Everything a worker needs for the lifetime of its loop
pub(crate) struct WorkerContext {
    pub server: Server,
    pub password: String,
    pub ssh_pool: Arc<SshPool>,
    pub registry: HostRegistry,
    pub hub: Hub,
    pub interval: Duration,
}

impl WorkerContext {
    /// Acquires the host's pooled session and wraps a collector around it
    async fn connect(&self) -> crate::ssh::SshResult<MetricCollector> {
        let session = self.ssh_pool.acquire(&self.server, &self.password).await?;
        Ok(MetricCollector::new(session))
    }

    /// Persists a status change and pushes it to subscribers
    async fn set_status(&self, status: ServerStatus) {
        if let Err(e) = self.registry.set_status(self.server.id, status).await {
            tracing::error!(server_id = self.server.id, %e, "Failed to update server status");
        }
        self.hub.broadcast_status(self.server.id, status).await;
    }
}

/// Runs one host's sampling loop until cancelled
///
/// The running flag flips true on entry and false on exit, exactly once
/// per worker lifetime.
pub(crate) async fn run(
    context: WorkerContext,
    cancel: CancellationToken,
    running: Arc<AtomicBool>,
) {
    running.store(true, Ordering::SeqCst);
    let server_id = context.server.id;

    let mut collector = match context.connect().await {
        Ok(collector) => {
            context.set_status(ServerStatus::Online).await;
            Some(collector)
        }
        Err(e) => {
            tracing::error!(server_id, %e, "Initial connection failed");
            context.set_status(ServerStatus::Error).await;
            None
        }
    };

    let start = tokio::time::Instant::now() + context.interval;
    let mut ticker = tokio::time::interval_at(start, context.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut reconnect_attempts: u32 = 0;

    loop {
        tokio::select! {
            () = cancel.cancelled() => {
                tracing::info!(server_id, "Worker stopping");
                break;
            }
            _ = ticker.tick() => {
                let connected = match &collector {
                    Some(collector) => collector.session().is_connected().await,
                    None => false,
                };

                if !connected {
                    reconnect_attempts += 1;
                    if reconnect_attempts > MAX_RECONNECT_ATTEMPTS {
                        tracing::error!(server_id, "Max reconnect attempts reached");
                        context.set_status(ServerStatus::Error).await;
                        reconnect_attempts = 0;
                        tokio::select! {
                            () = cancel.cancelled() => {
                                tracing::info!(server_id, "Worker stopping");
                                break;
                            }
                            () = tokio::time::sleep(RECONNECT_COOLDOWN) => {}
                        }
                        continue;
                    }

                    tracing::warn!(
                        server_id,
                        attempt = reconnect_attempts,
                        max = MAX_RECONNECT_ATTEMPTS,
                        "Connection lost, reconnecting"
                    );
                    match context.connect().await {
                        Ok(fresh) => {
                            collector = Some(fresh);
                            reconnect_attempts = 0;
                            context.set_status(ServerStatus::Online).await;
                        }
                        Err(e) => {
                            tracing::error!(server_id, %e, "Reconnection failed");
                            context.set_status(ServerStatus::Error).await;
                            continue;
                        }
                    }
                }

                let Some(collector) = &collector else { continue };
                match collector.collect_all().await {
                    Ok(snapshot) => context.hub.broadcast_metrics(&snapshot).await,
                    Err(e) => {
                        tracing::error!(server_id, %e, "Failed to collect metrics");
                        continue;
                    }
                }
            }
        }
    }

    running.store(false, Ordering::SeqCst);
}
