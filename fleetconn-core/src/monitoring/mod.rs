//! Metric collection over pooled SSH sessions
//!
//! A fixed battery of small shell probes is issued per sampling tick and
//! assembled into a [`crate::models::MetricSnapshot`]. Probes are
//! independent: one failing leaves its fields at zero and the snapshot is
//! still emitted as long as any probe succeeded. Hosts need nothing
//! installed; every probe reads standard tools or `/proc`.

mod collector;
mod probes;

pub use collector::MetricCollector;
pub use probes::{
    parse_cpu_percent, parse_cpu_proc_stat, parse_disk, parse_load_average, parse_memory,
    parse_network, parse_os_release, parse_process_count, parse_uptime,
};

use thiserror::Error;

use crate::ssh::SshError;

/// Errors produced by a single metric probe
#[derive(Debug, Error)]
pub enum ProbeError {
    /// The probe command could not be executed
    #[error(transparent)]
    Ssh(#[from] SshError),

    /// The probe ran but its output was not parseable
    #[error("Unparseable probe output: {0}")]
    Parse(String),
}

/// Errors produced by a full collection pass
#[derive(Debug, Error)]
pub enum CollectError {
    /// Every probe failed; no snapshot is emitted for this tick
    #[error("All probes failed for server {0}")]
    AllProbesFailed(u32),
}
