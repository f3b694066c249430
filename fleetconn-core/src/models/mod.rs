//! Core data models for the fleet inventory and the metrics wire format
//!
//! The wire shapes here are load-bearing: `MetricSnapshot` and the file
//! types are serialized verbatim into WebSocket envelopes and HTTP
//! responses, so field names use the API's `snake_case` JSON form.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Operating system class of a managed host
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
pub enum ServerSys {
    /// Linux
    #[default]
    #[serde(rename = "L")]
    #[sqlx(rename = "L")]
    Linux,
    /// Windows
    #[serde(rename = "W")]
    #[sqlx(rename = "W")]
    Windows,
}

/// Transport used to reach a managed host
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
pub enum ConnectionKind {
    /// SSH remote shell
    #[default]
    #[serde(rename = "SSH")]
    #[sqlx(rename = "SSH")]
    Ssh,
    /// WinRM (registered but not driven by the monitor)
    #[serde(rename = "WinRM")]
    #[sqlx(rename = "WinRM")]
    WinRm,
    /// SFTP-only host
    #[serde(rename = "SFTP")]
    #[sqlx(rename = "SFTP")]
    Sftp,
}

/// Coarse host status as persisted in the registry
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum ServerStatus {
    /// Host is reachable and monitored
    Online,
    /// Host has never been reached or monitoring is stopped
    #[default]
    Offline,
    /// Host is unreachable after exhausting reconnect attempts
    Error,
}

impl std::fmt::Display for ServerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Online => write!(f, "online"),
            Self::Offline => write!(f, "offline"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// A managed host as stored in the `servers` table
///
/// The password column holds ciphertext (see [`crate::vault`]) and is
/// never serialized into API responses.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Server {
    /// Stable host id
    pub id: u32,
    /// Network address
    pub ip_address: String,
    /// Encrypted credential, never exposed over the API
    #[serde(skip_serializing)]
    pub password: String,
    /// SSH port, kept as text ("22" by default)
    pub port: String,
    /// Operating system class
    pub sys: ServerSys,
    /// Transport class
    pub connection: ConnectionKind,
    /// Login user
    pub username: String,
    /// Display name
    pub name: String,
    /// Last known status
    pub status: ServerStatus,
    /// Row creation time
    pub created_at: DateTime<Utc>,
    /// Last row update time
    pub updated_at: DateTime<Utc>,
    /// Soft-delete marker
    #[serde(skip_serializing)]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Server {
    /// Returns the API view of this host, without credentials
    #[must_use]
    pub fn to_dto(&self) -> ServerDto {
        ServerDto {
            id: self.id,
            ip_address: self.ip_address.clone(),
            port: self.port.clone(),
            sys: self.sys,
            connection: self.connection,
            username: self.username.clone(),
            name: self.name.clone(),
            status: self.status,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    /// Returns `host:port` for dialing
    #[must_use]
    pub fn dial_addr(&self) -> String {
        format!("{}:{}", self.ip_address, self.port)
    }
}

/// API view of a managed host
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerDto {
    /// Stable host id
    pub id: u32,
    /// Network address
    pub ip_address: String,
    /// SSH port
    pub port: String,
    /// Operating system class
    pub sys: ServerSys,
    /// Transport class
    pub connection: ConnectionKind,
    /// Login user
    pub username: String,
    /// Display name
    pub name: String,
    /// Last known status
    pub status: ServerStatus,
    /// Row creation time
    pub created_at: DateTime<Utc>,
    /// Last row update time
    pub updated_at: DateTime<Utc>,
}

/// Request body for registering a host
#[derive(Debug, Clone, Deserialize)]
pub struct CreateServerRequest {
    /// Network address (required)
    pub ip_address: String,
    /// Plaintext password, encrypted before storage (required)
    pub password: String,
    /// SSH port, defaults to "22"
    #[serde(default)]
    pub port: Option<String>,
    /// Operating system class, defaults to Linux
    #[serde(default)]
    pub sys: Option<ServerSys>,
    /// Transport class, defaults to SSH
    #[serde(default)]
    pub connection: Option<ConnectionKind>,
    /// Login user (required)
    pub username: String,
    /// Display name (required)
    pub name: String,
}

/// Request body for updating a host; absent fields are left unchanged
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateServerRequest {
    /// New network address
    pub ip_address: Option<String>,
    /// New plaintext password
    pub password: Option<String>,
    /// New port
    pub port: Option<String>,
    /// New operating system class
    pub sys: Option<ServerSys>,
    /// New transport class
    pub connection: Option<ConnectionKind>,
    /// New login user
    pub username: Option<String>,
    /// New display name
    pub name: Option<String>,
}

impl UpdateServerRequest {
    /// Returns true when a field affecting the live SSH session changed,
    /// which requires the monitoring worker to be restarted.
    #[must_use]
    pub const fn requires_worker_restart(&self) -> bool {
        self.password.is_some()
            || self.ip_address.is_some()
            || self.port.is_some()
            || self.username.is_some()
    }
}

/// One host sample, broadcast over WebSocket and never persisted
///
/// Memory values are MiB, disk values GiB (root filesystem), network
/// counters MiB on the primary interface, uptime seconds. A field stays
/// at zero when its probe failed; the snapshot is still emitted as long
/// as at least one probe succeeded.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricSnapshot {
    /// Host id
    pub server_id: u32,
    /// Host display name
    pub server_name: String,
    /// CPU busy percentage (0-100)
    pub cpu_usage: f64,
    /// Total memory (MiB)
    pub mem_total: u64,
    /// Used memory (MiB)
    pub mem_used: u64,
    /// Free memory (MiB)
    pub mem_free: u64,
    /// Used memory percentage, derived when the probe succeeded
    pub mem_percent: f64,
    /// Total disk (GiB, root filesystem)
    pub disk_total: u64,
    /// Used disk (GiB)
    pub disk_used: u64,
    /// Free disk (GiB)
    pub disk_free: u64,
    /// Used disk percentage, derived when the probe succeeded
    pub disk_percent: f64,
    /// Received bytes converted to MiB on the primary interface
    pub net_rx: u64,
    /// Transmitted bytes converted to MiB on the primary interface
    pub net_tx: u64,
    /// Uptime in seconds
    pub uptime: u64,
    /// Sample wall-clock time (unix seconds)
    pub timestamp: i64,
}

/// One entry of a remote directory listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileEntry {
    /// Base name
    pub name: String,
    /// Full remote path (forward-slash joined)
    pub path: String,
    /// Size in bytes
    pub size: u64,
    /// Whether the entry is a directory
    pub is_dir: bool,
    /// Permission bits
    pub permissions: u32,
    /// Modification time
    pub mod_time: DateTime<Utc>,
    /// Numeric uid rendered as text
    pub owner: String,
    /// Numeric gid rendered as text
    pub group: String,
}

/// Result of a recursive directory size walk
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirSizeSummary {
    /// Walked path
    pub path: String,
    /// Sum of file sizes in bytes
    pub size: u64,
    /// Number of files seen
    pub file_count: u64,
    /// Number of directories seen
    pub dir_count: u64,
}

/// Request body for creating a directory
#[derive(Debug, Deserialize)]
pub struct DirectoryRequest {
    /// Remote path to create (parents included)
    pub path: String,
}

/// Request body for renaming or moving an entry
#[derive(Debug, Deserialize)]
pub struct RenameRequest {
    /// Existing path
    pub old_path: String,
    /// Target path
    pub new_path: String,
}

/// Request body for deleting a file or directory
#[derive(Debug, Deserialize)]
pub struct DeleteRequest {
    /// Path to delete
    pub path: String,
    /// Whether to remove directory contents recursively
    #[serde(default)]
    pub recursive: bool,
}

/// Request body for writing text content to a remote file
#[derive(Debug, Deserialize)]
pub struct ContentRequest {
    /// Target path
    pub path: String,
    /// Full file content
    #[serde(default)]
    pub content: String,
}

/// Request body for changing permission bits
#[derive(Debug, Deserialize)]
pub struct ChmodRequest {
    /// Target path
    pub path: String,
    /// New permission bits
    pub permission: u32,
}

/// Request body for a server-local copy
#[derive(Debug, Deserialize)]
pub struct CopyRequest {
    /// Source path
    pub source: String,
    /// Destination path
    pub destination: String,
}

/// Request body for interactive command execution
#[derive(Debug, Deserialize)]
pub struct ExecRequest {
    /// Shell command to run on the host
    pub command: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&ServerStatus::Online).unwrap(),
            "\"online\""
        );
        assert_eq!(
            serde_json::to_string(&ServerStatus::Error).unwrap(),
            "\"error\""
        );
    }

    #[test]
    fn test_sys_serializes_letter_form() {
        assert_eq!(serde_json::to_string(&ServerSys::Linux).unwrap(), "\"L\"");
        assert_eq!(serde_json::to_string(&ServerSys::Windows).unwrap(), "\"W\"");
    }

    #[test]
    fn test_connection_kind_round_trip() {
        for kind in [ConnectionKind::Ssh, ConnectionKind::WinRm, ConnectionKind::Sftp] {
            let json = serde_json::to_string(&kind).unwrap();
            let back: ConnectionKind = serde_json::from_str(&json).unwrap();
            assert_eq!(kind, back);
        }
    }

    #[test]
    fn test_snapshot_wire_fields() {
        let snapshot = MetricSnapshot {
            server_id: 7,
            server_name: "web-1".to_string(),
            cpu_usage: 12.5,
            mem_total: 16000,
            mem_used: 8000,
            mem_free: 8000,
            mem_percent: 50.0,
            ..MetricSnapshot::default()
        };
        let value = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(value["server_id"], 7);
        assert_eq!(value["server_name"], "web-1");
        assert_eq!(value["cpu_usage"], 12.5);
        assert_eq!(value["mem_percent"], 50.0);
        assert_eq!(value["net_rx"], 0);
    }

    #[test]
    fn test_update_request_restart_detection() {
        let req = UpdateServerRequest {
            name: Some("renamed".to_string()),
            ..UpdateServerRequest::default()
        };
        assert!(!req.requires_worker_restart());

        let req = UpdateServerRequest {
            password: Some("hunter2".to_string()),
            ..UpdateServerRequest::default()
        };
        assert!(req.requires_worker_restart());
    }

    #[test]
    fn test_create_request_optional_fields() {
        let req: CreateServerRequest = serde_json::from_str(
            r#"{"ip_address":"10.0.0.2","password":"pw","username":"root","name":"db-1"}"#,
        )
        .unwrap();
        assert!(req.port.is_none());
        assert!(req.sys.is_none());
        assert!(req.connection.is_none());
    }
}
