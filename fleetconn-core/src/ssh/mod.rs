//! Pooled SSH transport to managed hosts
//!
//! One authenticated transport per host, shared by every caller (the
//! metric workers, the interactive exec endpoint and the SFTP layer).
//! Commands run as short-lived channels on the shared transport and are
//! serialized per session; all libssh2 calls happen on blocking worker
//! threads.

mod pool;
mod session;

pub use pool::SshPool;
pub use session::SshSession;

use std::time::Duration;

use thiserror::Error;

/// Errors produced by SSH transport operations
#[derive(Debug, Error)]
pub enum SshError {
    /// The session is marked down; callers retry via the pool
    #[error("Not connected")]
    NotConnected,

    /// TCP dial or address resolution failed
    #[error("SSH dial failed: {0}")]
    Dial(String),

    /// Protocol handshake failed
    #[error("SSH handshake failed: {0}")]
    Handshake(String),

    /// Password authentication was rejected
    #[error("SSH authentication failed: {0}")]
    Auth(String),

    /// A channel open or keepalive failed; the transport is gone
    #[error("Session lost: {0}")]
    SessionLost(String),

    /// The remote command exited non-zero; carries stderr when available
    #[error("Command failed: {0}")]
    CommandFailed(String),

    /// The command did not complete within the supplied deadline
    #[error("Command timeout after {0:?}")]
    Timeout(Duration),

    /// The blocking worker task died
    #[error("Blocking task failed: {0}")]
    Task(String),
}

/// Result type for SSH operations
pub type SshResult<T> = Result<T, SshError>;
