//! The per-host SFTP channel pool, layered on the SSH pool

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use super::channel::FileChannel;
use super::SftpResult;
use crate::models::Server;
use crate::ssh::SshPool;

/// Caches one [`FileChannel`] per host
///
/// Channels are created on demand from the SSH pool's transport; a host
/// removed here is also expected to be removed from the SSH pool by the
/// caller so both go away together.
#[derive(Debug)]
pub struct SftpPool {
    channels: RwLock<HashMap<u32, Arc<FileChannel>>>,
    ssh_pool: Arc<SshPool>,
}

impl SftpPool {
    /// Creates an empty pool over the given SSH pool
    #[must_use]
    pub fn new(ssh_pool: Arc<SshPool>) -> Self {
        Self {
            channels: RwLock::new(HashMap::new()),
            ssh_pool,
        }
    }

    /// Returns the file channel for a host, opening one when none exists
    /// or the cached one lost its transport
    ///
    /// # Errors
    ///
    /// Propagates SSH acquire and channel-open failures.
    pub async fn acquire(&self, server: &Server, password: &str) -> SftpResult<Arc<FileChannel>> {
        let existing = self.channels.read().await.get(&server.id).cloned();
        if let Some(existing) = existing
            && existing.is_usable().await
        {
            return Ok(existing);
        }

        let session = self.ssh_pool.acquire(server, password).await?;
        let sftp = session.open_sftp().await?;
        let channel = Arc::new(FileChannel::new(session, sftp));

        let stale = self
            .channels
            .write()
            .await
            .insert(server.id, Arc::clone(&channel));
        if let Some(stale) = stale {
            stale.close().await;
        }

        tracing::info!(server_id = server.id, "SFTP channel created");
        Ok(channel)
    }

    /// Closes and forgets the channel for a host; idempotent
    pub async fn remove(&self, server_id: u32) {
        let removed = self.channels.write().await.remove(&server_id);
        if let Some(channel) = removed {
            channel.close().await;
        }
    }

    /// Closes every channel in the pool
    pub async fn drain(&self) {
        let channels: Vec<_> = self.channels.write().await.drain().collect();
        for (_, channel) in channels {
            channel.close().await;
        }
        tracing::info!("SFTP pool drained");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_remove_missing_is_idempotent() {
        let ssh_pool = Arc::new(SshPool::new(
            Duration::from_millis(200),
            Duration::from_secs(60),
        ));
        let pool = SftpPool::new(ssh_pool);
        pool.remove(9).await;
        pool.drain().await;
    }
}
