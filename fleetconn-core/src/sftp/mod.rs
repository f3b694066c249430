//! SFTP file management layered on pooled SSH transports
//!
//! Each host gets at most one [`FileChannel`], opened on the transport
//! held by the SSH pool. Operations are serialized per channel and run on
//! blocking worker threads. Remote paths always use forward slashes,
//! whatever the local OS.

mod channel;
mod path;
mod pool;

pub use channel::{FileChannel, MAX_SEARCH_RESULTS};
pub use path::{base_name, glob_match, join_remote, parent_dir};
pub use pool::SftpPool;

use thiserror::Error;

use crate::ssh::SshError;

/// Errors produced by SFTP operations
#[derive(Debug, Error)]
pub enum SftpError {
    /// The file channel has been closed or its transport is gone
    #[error("SFTP channel closed")]
    ChannelClosed,

    /// The remote path does not exist or is not accessible
    #[error("Remote path not found: {0}")]
    NotFound(String),

    /// A protocol-level SFTP operation failed
    #[error("SFTP operation failed: {0}")]
    Operation(String),

    /// Acquiring the underlying SSH transport failed
    #[error(transparent)]
    Ssh(#[from] SshError),

    /// The blocking worker task died
    #[error("Blocking task failed: {0}")]
    Task(String),
}

/// Result type for SFTP operations
pub type SftpResult<T> = Result<T, SftpError>;
