//! `fleetconn` Core Library
//!
//! This crate provides the core functionality for the `fleetconn` operations
//! console: pooled SSH sessions, SFTP file management, per-host metric
//! collection and the real-time broadcast hub.
//!
//! # Crate Structure
//!
//! - [`config`] - Environment-driven application configuration
//! - [`models`] - Core data structures (Server, snapshots, file entries)
//! - [`vault`] - Credential encryption at rest (AES-256-GCM)
//! - [`registry`] - MySQL-backed host inventory
//! - [`ssh`] - Per-host SSH sessions and the connection pool
//! - [`sftp`] - SFTP file channels layered on pooled sessions
//! - [`monitoring`] - Shell-probe metric collection and parsing
//! - [`monitor`] - Per-host monitoring workers and their supervisor
//! - [`hub`] - WebSocket broadcast hub with lossy per-client fan-out

// Enable missing_docs warning for public API documentation
#![warn(missing_docs)]

pub mod config;
pub mod hub;
pub mod models;
pub mod monitor;
pub mod monitoring;
pub mod registry;
pub mod sftp;
pub mod ssh;
pub mod vault;

pub use config::{AppConfig, ConfigError};
pub use hub::{Envelope, Hub, MessageType, PushClient};
pub use models::{
    ConnectionKind, CreateServerRequest, DirSizeSummary, FileEntry, MetricSnapshot, Server,
    ServerDto, ServerStatus, ServerSys, UpdateServerRequest,
};
pub use monitor::MonitorPool;
pub use monitoring::MetricCollector;
pub use registry::{HostRegistry, RegistryError, RegistryResult};
pub use sftp::{FileChannel, SftpError, SftpPool, SftpResult};
pub use ssh::{SshError, SshPool, SshResult, SshSession};
pub use vault::{CredentialVault, VaultError};
