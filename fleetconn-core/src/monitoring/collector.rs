//! Drives the probe battery over one host's session

use std::sync::Arc;

use chrono::Utc;

use super::probes::{
    parse_cpu_percent, parse_cpu_proc_stat, parse_disk, parse_load_average, parse_memory,
    parse_network, parse_os_release, parse_process_count, parse_uptime, CPU_COMMAND,
    CPU_FALLBACK_COMMAND, DISK_COMMAND, LOAD_AVERAGE_COMMAND, MEMORY_COMMAND, NETWORK_COMMAND,
    NETWORK_FALLBACK_COMMAND, OS_RELEASE_COMMAND, PROCESS_COUNT_COMMAND, UPTIME_COMMAND,
};
use super::{CollectError, ProbeError};
use crate::models::MetricSnapshot;
use crate::ssh::SshSession;

/// Issues the probe battery on a pooled session and assembles snapshots
pub struct MetricCollector {
    session: Arc<SshSession>,
}

impl MetricCollector {
    /// Creates a collector over a live session
    #[must_use]
    pub fn new(session: Arc<SshSession>) -> Self {
        Self { session }
    }

    /// The session this collector samples through
    #[must_use]
    pub const fn session(&self) -> &Arc<SshSession> {
        &self.session
    }

    /// Runs every probe and assembles one snapshot
    ///
    /// Individual probe failures are logged at warn level and leave their
    /// fields at zero.
    ///
    /// # Errors
    ///
    /// Returns [`CollectError::AllProbesFailed`] when not a single probe
    /// succeeded, in which case no snapshot should be emitted.
    pub async fn collect_all(&self) -> Result<MetricSnapshot, CollectError> {
        let server_id = self.session.server_id();
        let mut snapshot = MetricSnapshot {
            server_id,
            server_name: self.session.server_name().to_string(),
            timestamp: Utc::now().timestamp(),
            ..MetricSnapshot::default()
        };
        let mut succeeded = 0u32;

        match self.collect_cpu().await {
            Ok(cpu) => {
                snapshot.cpu_usage = cpu;
                succeeded += 1;
            }
            Err(e) => tracing::warn!(server_id, %e, "Failed to collect CPU"),
        }

        match self.collect_memory().await {
            Ok((total, used, free)) => {
                snapshot.mem_total = total;
                snapshot.mem_used = used;
                snapshot.mem_free = free;
                if total > 0 {
                    snapshot.mem_percent = used as f64 / total as f64 * 100.0;
                }
                succeeded += 1;
            }
            Err(e) => tracing::warn!(server_id, %e, "Failed to collect memory"),
        }

        match self.collect_disk().await {
            Ok((total, used, free)) => {
                snapshot.disk_total = total;
                snapshot.disk_used = used;
                snapshot.disk_free = free;
                if total > 0 {
                    snapshot.disk_percent = used as f64 / total as f64 * 100.0;
                }
                succeeded += 1;
            }
            Err(e) => tracing::warn!(server_id, %e, "Failed to collect disk"),
        }

        match self.collect_network().await {
            Ok((rx, tx)) => {
                snapshot.net_rx = rx;
                snapshot.net_tx = tx;
                succeeded += 1;
            }
            Err(e) => tracing::warn!(server_id, %e, "Failed to collect network"),
        }

        match self.collect_uptime().await {
            Ok(uptime) => {
                snapshot.uptime = uptime;
                succeeded += 1;
            }
            Err(e) => tracing::warn!(server_id, %e, "Failed to collect uptime"),
        }

        if succeeded == 0 {
            return Err(CollectError::AllProbesFailed(server_id));
        }
        Ok(snapshot)
    }

    /// CPU busy percentage, falling back to `/proc/stat` deltas when the
    /// `top` pipeline is unavailable or unparseable
    ///
    /// # Errors
    ///
    /// Returns an error when both probe forms fail.
    pub async fn collect_cpu(&self) -> Result<f64, ProbeError> {
        if let Ok(output) = self.session.execute(CPU_COMMAND).await
            && let Some(cpu) = parse_cpu_percent(&output)
        {
            return Ok(cpu);
        }

        let output = self.session.execute(CPU_FALLBACK_COMMAND).await?;
        parse_cpu_proc_stat(&output).ok_or_else(|| ProbeError::Parse(output))
    }

    /// Memory (total, used, free) in MiB
    ///
    /// # Errors
    ///
    /// Returns an error when the probe fails or its output is malformed.
    pub async fn collect_memory(&self) -> Result<(u64, u64, u64), ProbeError> {
        let output = self.session.execute(MEMORY_COMMAND).await?;
        parse_memory(&output).ok_or_else(|| ProbeError::Parse(output))
    }

    /// Root filesystem (total, used, free) in GiB
    ///
    /// # Errors
    ///
    /// Returns an error when the probe fails or its output is malformed.
    pub async fn collect_disk(&self) -> Result<(u64, u64, u64), ProbeError> {
        let output = self.session.execute(DISK_COMMAND).await?;
        parse_disk(&output).ok_or_else(|| ProbeError::Parse(output))
    }

    /// Primary interface (rx, tx) converted from bytes to MiB
    ///
    /// # Errors
    ///
    /// Returns an error when both the `/proc/net/dev` and `ip -s link`
    /// forms fail.
    pub async fn collect_network(&self) -> Result<(u64, u64), ProbeError> {
        let output = self.session.execute(NETWORK_COMMAND).await?;
        let counters = match parse_network(&output) {
            Some(counters) => counters,
            None => {
                let fallback = self.session.execute(NETWORK_FALLBACK_COMMAND).await?;
                parse_network(&fallback).ok_or_else(|| ProbeError::Parse(fallback))?
            }
        };

        let (rx_bytes, tx_bytes) = counters;
        Ok((rx_bytes / (1024 * 1024), tx_bytes / (1024 * 1024)))
    }

    /// Uptime in seconds
    ///
    /// # Errors
    ///
    /// Returns an error when the probe fails or its output is malformed.
    pub async fn collect_uptime(&self) -> Result<u64, ProbeError> {
        let output = self.session.execute(UPTIME_COMMAND).await?;
        parse_uptime(&output).ok_or_else(|| ProbeError::Parse(output))
    }

    /// Load averages over 1, 5 and 15 minutes
    ///
    /// # Errors
    ///
    /// Returns an error when the probe fails or its output is malformed.
    pub async fn collect_load_average(&self) -> Result<(f64, f64, f64), ProbeError> {
        let output = self.session.execute(LOAD_AVERAGE_COMMAND).await?;
        parse_load_average(&output).ok_or_else(|| ProbeError::Parse(output))
    }

    /// Number of running processes
    ///
    /// # Errors
    ///
    /// Returns an error when the probe fails or its output is malformed.
    pub async fn collect_process_count(&self) -> Result<u64, ProbeError> {
        let output = self.session.execute(PROCESS_COUNT_COMMAND).await?;
        parse_process_count(&output).ok_or_else(|| ProbeError::Parse(output))
    }

    /// Host name as reported by the host itself
    ///
    /// # Errors
    ///
    /// Returns an error when the probe fails.
    pub async fn collect_hostname(&self) -> Result<String, ProbeError> {
        let output = self.session.execute("hostname").await?;
        Ok(output.trim().to_string())
    }

    /// Distribution pretty name, falling back to `uname -a`
    ///
    /// # Errors
    ///
    /// Returns an error when both forms fail.
    pub async fn collect_os_info(&self) -> Result<String, ProbeError> {
        if let Ok(output) = self.session.execute(OS_RELEASE_COMMAND).await
            && let Some(name) = parse_os_release(&output)
        {
            return Ok(name);
        }

        let output = self.session.execute("uname -a").await?;
        Ok(output.trim().to_string())
    }
}

impl std::fmt::Debug for MetricCollector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricCollector")
            .field("server_id", &self.session.server_id())
            .finish()
    }
}
