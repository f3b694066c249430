//! Per-host monitoring supervisor
//!
//! Owns one sampling worker per registered host. Workers are rooted in a
//! shared cancellation token so [`MonitorPool::stop_all`] brings the whole
//! fleet down within a bounded grace period.

mod worker;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::hub::Hub;
use crate::models::Server;
use crate::registry::HostRegistry;
use crate::sftp::SftpPool;
use crate::ssh::SshPool;
use crate::vault::CredentialVault;
use worker::WorkerContext;

/// Supervisor state for one host's worker
struct WorkerHandle {
    cancel: CancellationToken,
    running: Arc<AtomicBool>,
    join: JoinHandle<()>,
}

/// Owns and supervises all monitoring workers, keyed by host id
pub struct MonitorPool {
    workers: RwLock<HashMap<u32, WorkerHandle>>,
    root: CancellationToken,
    ssh_pool: Arc<SshPool>,
    sftp_pool: Arc<SftpPool>,
    registry: HostRegistry,
    vault: Arc<CredentialVault>,
    hub: Hub,
    interval: Duration,
}

impl MonitorPool {
    /// Creates an empty supervisor
    #[must_use]
    pub fn new(
        ssh_pool: Arc<SshPool>,
        sftp_pool: Arc<SftpPool>,
        registry: HostRegistry,
        vault: Arc<CredentialVault>,
        hub: Hub,
        interval: Duration,
    ) -> Self {
        Self {
            workers: RwLock::new(HashMap::new()),
            root: CancellationToken::new(),
            ssh_pool,
            sftp_pool,
            registry,
            vault,
            hub,
            interval,
        }
    }

    /// Starts a worker for every registered host
    ///
    /// Hosts whose credentials cannot be decrypted are logged and
    /// skipped, never fatal.
    ///
    /// # Errors
    ///
    /// Returns an error only when the registry itself cannot be listed.
    pub async fn start_all(&self) -> crate::registry::RegistryResult<()> {
        let servers = self.registry.list().await?;

        for server in servers {
            let password = match self.vault.decrypt(&server.password) {
                Ok(password) => password,
                Err(e) => {
                    tracing::error!(server_id = server.id, %e, "Failed to decrypt password");
                    continue;
                }
            };
            self.add(&server, &password).await;
        }

        Ok(())
    }

    /// Launches a worker for a host; no-op when one already exists
    ///
    /// Returns immediately; connecting and sampling happen on the
    /// worker's own task.
    pub async fn add(&self, server: &Server, password: &str) {
        let mut workers = self.workers.write().await;
        if workers.contains_key(&server.id) {
            return;
        }

        let cancel = self.root.child_token();
        let running = Arc::new(AtomicBool::new(false));

        let context = WorkerContext {
            server: server.clone(),
            password: password.to_string(),
            ssh_pool: Arc::clone(&self.ssh_pool),
            registry: self.registry.clone(),
            hub: self.hub.clone(),
            interval: self.interval,
        };
        let join = tokio::spawn(worker::run(context, cancel.clone(), Arc::clone(&running)));

        workers.insert(
            server.id,
            WorkerHandle {
                cancel,
                running,
                join,
            },
        );
        tracing::info!(server_id = server.id, name = %server.name, "Started monitoring worker");
    }

    /// Stops a host's worker, waits for its loop to exit and drops the
    /// host's pooled SSH and SFTP entries; idempotent
    pub async fn remove(&self, server_id: u32) {
        let removed = self.workers.write().await.remove(&server_id);
        let Some(handle) = removed else {
            return;
        };

        handle.cancel.cancel();
        let _ = handle.join.await;

        self.sftp_pool.remove(server_id).await;
        self.ssh_pool.remove(server_id).await;
        tracing::info!(server_id, "Stopped monitoring worker");
    }

    /// Observes whether a host's worker loop is currently running
    pub async fn status(&self, server_id: u32) -> bool {
        self.workers
            .read()
            .await
            .get(&server_id)
            .is_some_and(|handle| handle.running.load(Ordering::SeqCst))
    }

    /// Cancels every worker and waits for all loops to exit
    pub async fn stop_all(&self) {
        self.root.cancel();

        let handles: Vec<_> = self.workers.write().await.drain().collect();
        for (_, handle) in handles {
            let _ = handle.join.await;
        }
        tracing::info!("Stopped all monitoring workers");
    }
}

impl std::fmt::Debug for MonitorPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MonitorPool").finish_non_exhaustive()
    }
}
