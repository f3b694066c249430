//! The per-host SSH connection pool

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;

use super::session::SshSession;
use super::SshResult;
use crate::models::Server;

/// Multiplexes one [`SshSession`] per host across all callers
///
/// The map lock protects only the id-to-session mapping and is never held
/// across a dial; command execution happens entirely outside it.
#[derive(Debug)]
pub struct SshPool {
    sessions: RwLock<HashMap<u32, Arc<SshSession>>>,
    timeout: Duration,
    keepalive: Duration,
}

impl SshPool {
    /// Creates an empty pool with the given dial timeout and keepalive
    #[must_use]
    pub fn new(timeout: Duration, keepalive: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            timeout,
            keepalive,
        }
    }

    /// Returns the session for a host, dialing a fresh transport when none
    /// exists or the cached one has gone down
    ///
    /// # Errors
    ///
    /// Propagates the connect error when a fresh dial fails; the pool is
    /// left without an entry for the host in that case.
    pub async fn acquire(&self, server: &Server, password: &str) -> SshResult<Arc<SshSession>> {
        let existing = self.sessions.read().await.get(&server.id).cloned();
        if let Some(existing) = existing
            && existing.is_connected().await
        {
            existing.touch().await;
            return Ok(existing);
        }

        let session = Arc::new(SshSession::new(
            server,
            password,
            self.timeout,
            self.keepalive,
        ));
        session.connect().await?;

        let stale = self
            .sessions
            .write()
            .await
            .insert(server.id, Arc::clone(&session));
        if let Some(stale) = stale {
            stale.close().await;
        }

        Ok(session)
    }

    /// Closes and forgets the session for a host; idempotent
    pub async fn remove(&self, server_id: u32) {
        let removed = self.sessions.write().await.remove(&server_id);
        if let Some(session) = removed {
            session.close().await;
            tracing::info!(server_id, "SSH session removed from pool");
        }
    }

    /// Closes every session in the pool
    pub async fn drain(&self) {
        let sessions: Vec<_> = self.sessions.write().await.drain().collect();
        for (_, session) in sessions {
            session.close().await;
        }
        tracing::info!("SSH pool drained");
    }

    /// Number of pooled sessions (connected or not)
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Returns true when the pool holds no sessions
    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ConnectionKind, ServerStatus, ServerSys};
    use crate::ssh::SshError;
    use chrono::Utc;

    fn unreachable_server(id: u32) -> Server {
        Server {
            id,
            ip_address: "127.0.0.1".to_string(),
            password: String::new(),
            port: "4".to_string(),
            sys: ServerSys::Linux,
            connection: ConnectionKind::Ssh,
            username: "nobody".to_string(),
            name: format!("host-{id}"),
            status: ServerStatus::Offline,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            deleted_at: None,
        }
    }

    #[tokio::test]
    async fn test_failed_acquire_leaves_no_entry() {
        let pool = SshPool::new(Duration::from_millis(200), Duration::from_secs(60));
        let result = pool.acquire(&unreachable_server(1), "pw").await;
        assert!(matches!(result, Err(SshError::Dial(_))));
        assert!(pool.is_empty().await);
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let pool = SshPool::new(Duration::from_millis(200), Duration::from_secs(60));
        pool.remove(42).await;
        pool.remove(42).await;
        assert!(pool.is_empty().await);
    }

    #[tokio::test]
    async fn test_drain_empty_pool() {
        let pool = SshPool::new(Duration::from_millis(200), Duration::from_secs(60));
        pool.drain().await;
        assert_eq!(pool.len().await, 0);
    }
}
