//! Shared handler state
//!
//! Every long-lived service is constructed once at startup and injected
//! here; handlers never reach for globals.

use std::sync::Arc;
use std::time::Instant;

use fleetconn_core::config::AppConfig;
use fleetconn_core::hub::Hub;
use fleetconn_core::monitor::MonitorPool;
use fleetconn_core::registry::HostRegistry;
use fleetconn_core::sftp::SftpPool;
use fleetconn_core::ssh::SshPool;
use fleetconn_core::vault::CredentialVault;

/// State shared across all HTTP and WebSocket handlers
#[derive(Clone)]
pub struct AppState {
    /// Immutable service configuration
    pub config: Arc<AppConfig>,
    /// Fleet inventory
    pub registry: HostRegistry,
    /// Credential encryption
    pub vault: Arc<CredentialVault>,
    /// SSH transport pool
    pub ssh_pool: Arc<SshPool>,
    /// SFTP channel pool
    pub sftp_pool: Arc<SftpPool>,
    /// Monitoring supervisor
    pub monitor: Arc<MonitorPool>,
    /// Broadcast hub
    pub hub: Hub,
    /// Process start time, for the health endpoint
    pub started_at: Instant,
}
