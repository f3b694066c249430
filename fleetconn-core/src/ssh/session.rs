//! A single authenticated SSH session and its command execution rules

use std::io::Read;
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

use super::{SshError, SshResult};
use crate::models::Server;

/// Live transport state behind the session mutex
struct Transport {
    /// The libssh2 session; taken out while a blocking call runs on it
    session: Option<ssh2::Session>,
    /// True between a successful handshake and the first observed failure
    connected: bool,
    /// Stamp of the last successful command or pool hit
    last_used: Instant,
}

/// One authenticated SSH transport to one host
///
/// The transport mutex serializes command starts so stdout/stderr captures
/// never interleave; the lock is held for the whole channel lifetime.
/// Holds the decrypted credential for reconnects.
pub struct SshSession {
    server_id: u32,
    server_name: String,
    addr: String,
    username: String,
    password: String,
    timeout: Duration,
    keepalive: Duration,
    transport: Mutex<Transport>,
    /// Interactive working directory, mutated only by the exec endpoint
    cwd: Mutex<String>,
}

impl SshSession {
    /// Creates a disconnected session for a host; call [`Self::connect`]
    /// before executing anything.
    #[must_use]
    pub fn new(server: &Server, password: &str, timeout: Duration, keepalive: Duration) -> Self {
        Self {
            server_id: server.id,
            server_name: server.name.clone(),
            addr: server.dial_addr(),
            username: server.username.clone(),
            password: password.to_string(),
            timeout,
            keepalive,
            transport: Mutex::new(Transport {
                session: None,
                connected: false,
                last_used: Instant::now(),
            }),
            cwd: Mutex::new(String::new()),
        }
    }

    /// Returns the host id this session belongs to
    #[must_use]
    pub const fn server_id(&self) -> u32 {
        self.server_id
    }

    /// Returns the host display name
    #[must_use]
    pub fn server_name(&self) -> &str {
        &self.server_name
    }

    /// Dials and authenticates; no-op when already connected
    ///
    /// # Errors
    ///
    /// Returns [`SshError::Dial`], [`SshError::Handshake`] or
    /// [`SshError::Auth`] depending on where the attempt failed.
    pub async fn connect(&self) -> SshResult<()> {
        let mut transport = self.transport.lock().await;
        if transport.connected && transport.session.is_some() {
            return Ok(());
        }

        let addr = self.addr.clone();
        let username = self.username.clone();
        let password = self.password.clone();
        let timeout = self.timeout;
        let keepalive = self.keepalive;

        let session =
            tokio::task::spawn_blocking(move || dial(&addr, &username, &password, timeout, keepalive))
                .await
                .map_err(|e| SshError::Task(e.to_string()))??;

        transport.session = Some(session);
        transport.connected = true;
        transport.last_used = Instant::now();

        tracing::info!(server_id = self.server_id, addr = %self.addr, "SSH connected");
        Ok(())
    }

    /// Returns true when the transport is up and usable
    pub async fn is_connected(&self) -> bool {
        let transport = self.transport.lock().await;
        transport.connected && transport.session.is_some()
    }

    /// Refreshes the last-used stamp on a pool hit
    pub async fn touch(&self) {
        self.transport.lock().await.last_used = Instant::now();
    }

    /// Time since the session last served a command or pool hit
    pub async fn idle_for(&self) -> Duration {
        self.transport.lock().await.last_used.elapsed()
    }

    /// Runs a command on a fresh channel and returns its stdout
    ///
    /// # Errors
    ///
    /// Returns [`SshError::NotConnected`] when the session is down,
    /// [`SshError::SessionLost`] when the channel cannot be opened (this
    /// also marks the session down) and [`SshError::CommandFailed`] on a
    /// non-zero exit, carrying stderr text when the command produced any.
    pub async fn execute(&self, command: &str) -> SshResult<String> {
        let mut transport = self.transport.lock().await;
        if !transport.connected {
            return Err(SshError::NotConnected);
        }
        let Some(session) = transport.session.take() else {
            return Err(SshError::NotConnected);
        };

        let cmd = command.to_string();
        let joined = tokio::task::spawn_blocking(move || {
            let result = run_command(&session, &cmd);
            (session, result)
        })
        .await;

        let (session, result) = match joined {
            Ok(pair) => pair,
            Err(e) => {
                // Worker died with the session handle; force a reconnect.
                transport.connected = false;
                return Err(SshError::Task(e.to_string()));
            }
        };
        transport.session = Some(session);

        match result {
            Ok(output) => {
                transport.last_used = Instant::now();
                Ok(output)
            }
            Err(err) => {
                if matches!(err, SshError::SessionLost(_)) {
                    transport.connected = false;
                }
                Err(err)
            }
        }
    }

    /// As [`Self::execute`] with a deadline
    ///
    /// On expiry the command keeps running on a detached task (which also
    /// restores the transport when it finishes); its result is discarded.
    ///
    /// # Errors
    ///
    /// Returns [`SshError::Timeout`] when the deadline passes first.
    pub async fn execute_with_timeout(
        self: Arc<Self>,
        command: &str,
        timeout: Duration,
    ) -> SshResult<String> {
        let session = Arc::clone(&self);
        let cmd = command.to_string();
        let handle = tokio::spawn(async move { session.execute(&cmd).await });

        match tokio::time::timeout(timeout, handle).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => Err(SshError::Task(e.to_string())),
            Err(_) => Err(SshError::Timeout(timeout)),
        }
    }

    /// Sends a transport-level keepalive
    ///
    /// # Errors
    ///
    /// A failure marks the session down and returns
    /// [`SshError::SessionLost`].
    pub async fn keepalive_probe(&self) -> SshResult<()> {
        let mut transport = self.transport.lock().await;
        if !transport.connected {
            return Err(SshError::NotConnected);
        }
        let Some(session) = transport.session.take() else {
            return Err(SshError::NotConnected);
        };

        let (session, result) = tokio::task::spawn_blocking(move || {
            let result = session.keepalive_send();
            (session, result)
        })
        .await
        .map_err(|e| SshError::Task(e.to_string()))?;
        transport.session = Some(session);

        if let Err(e) = result {
            transport.connected = false;
            return Err(SshError::SessionLost(e.to_string()));
        }
        Ok(())
    }

    /// Opens an SFTP channel on this transport
    ///
    /// # Errors
    ///
    /// A failure to open the channel marks the session down and returns
    /// [`SshError::SessionLost`].
    pub async fn open_sftp(&self) -> SshResult<ssh2::Sftp> {
        let mut transport = self.transport.lock().await;
        if !transport.connected {
            return Err(SshError::NotConnected);
        }
        let Some(session) = transport.session.take() else {
            return Err(SshError::NotConnected);
        };

        let (session, result) = tokio::task::spawn_blocking(move || {
            let result = session.sftp();
            (session, result)
        })
        .await
        .map_err(|e| SshError::Task(e.to_string()))?;
        transport.session = Some(session);

        match result {
            Ok(sftp) => Ok(sftp),
            Err(e) => {
                transport.connected = false;
                Err(SshError::SessionLost(e.to_string()))
            }
        }
    }

    /// Closes the transport; safe to call when already closed
    pub async fn close(&self) {
        let mut transport = self.transport.lock().await;
        transport.connected = false;
        if let Some(session) = transport.session.take() {
            // libssh2 teardown does socket I/O; keep it off the runtime.
            let _ = tokio::task::spawn_blocking(move || {
                let _ = session.disconnect(None, "closing", None);
                drop(session);
            })
            .await;
        }
    }

    /// Closes and dials again with the stored credentials
    ///
    /// # Errors
    ///
    /// Propagates the connect error on failure.
    pub async fn reconnect(&self) -> SshResult<()> {
        self.close().await;
        self.connect().await
    }

    /// Returns the interactive working directory (empty until a `cd`)
    pub async fn current_dir(&self) -> String {
        self.cwd.lock().await.clone()
    }

    /// Replaces the interactive working directory
    pub async fn set_current_dir(&self, dir: String) {
        *self.cwd.lock().await = dir;
    }
}

impl std::fmt::Debug for SshSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SshSession")
            .field("server_id", &self.server_id)
            .field("addr", &self.addr)
            .finish_non_exhaustive()
    }
}

/// Dials, handshakes and authenticates a fresh transport (blocking)
fn dial(
    addr: &str,
    username: &str,
    password: &str,
    timeout: Duration,
    keepalive: Duration,
) -> SshResult<ssh2::Session> {
    let sock_addr = addr
        .to_socket_addrs()
        .map_err(|e| SshError::Dial(e.to_string()))?
        .next()
        .ok_or_else(|| SshError::Dial(format!("no address for {addr}")))?;

    let tcp = TcpStream::connect_timeout(&sock_addr, timeout)
        .map_err(|e| SshError::Dial(e.to_string()))?;

    let mut session = ssh2::Session::new().map_err(|e| SshError::Handshake(e.to_string()))?;
    session.set_tcp_stream(tcp);
    session.set_timeout(u32::try_from(timeout.as_millis()).unwrap_or(u32::MAX));
    session
        .handshake()
        .map_err(|e| SshError::Handshake(e.to_string()))?;

    session
        .userauth_password(username, password)
        .map_err(|e| SshError::Auth(e.to_string()))?;
    if !session.authenticated() {
        return Err(SshError::Auth("authentication incomplete".to_string()));
    }

    session.set_keepalive(true, u32::try_from(keepalive.as_secs()).unwrap_or(60));
    Ok(session)
}

/// Runs one command on a fresh channel (blocking)
fn run_command(session: &ssh2::Session, command: &str) -> SshResult<String> {
    let mut channel = session
        .channel_session()
        .map_err(|e| SshError::SessionLost(e.to_string()))?;

    channel
        .exec(command)
        .map_err(|e| SshError::CommandFailed(e.to_string()))?;

    let mut stdout = String::new();
    channel
        .read_to_string(&mut stdout)
        .map_err(|e| SshError::CommandFailed(e.to_string()))?;

    let mut stderr = String::new();
    channel
        .stderr()
        .read_to_string(&mut stderr)
        .map_err(|e| SshError::CommandFailed(e.to_string()))?;

    channel
        .wait_close()
        .map_err(|e| SshError::CommandFailed(e.to_string()))?;
    let status = channel.exit_status().unwrap_or(-1);

    if status != 0 {
        if stderr.trim().is_empty() {
            return Err(SshError::CommandFailed(format!("exit status {status}")));
        }
        return Err(SshError::CommandFailed(stderr.trim_end().to_string()));
    }

    Ok(stdout)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ConnectionKind, ServerStatus, ServerSys};
    use chrono::Utc;

    fn test_server() -> Server {
        Server {
            id: 1,
            ip_address: "127.0.0.1".to_string(),
            password: String::new(),
            port: "4".to_string(),
            sys: ServerSys::Linux,
            connection: ConnectionKind::Ssh,
            username: "nobody".to_string(),
            name: "test".to_string(),
            status: ServerStatus::Offline,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            deleted_at: None,
        }
    }

    #[tokio::test]
    async fn test_fresh_session_is_disconnected() {
        let session = SshSession::new(
            &test_server(),
            "pw",
            Duration::from_millis(100),
            Duration::from_secs(60),
        );
        assert!(!session.is_connected().await);
    }

    #[tokio::test]
    async fn test_execute_on_disconnected_session() {
        let session = SshSession::new(
            &test_server(),
            "pw",
            Duration::from_millis(100),
            Duration::from_secs(60),
        );
        assert!(matches!(
            session.execute("true").await,
            Err(SshError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn test_keepalive_on_disconnected_session() {
        let session = SshSession::new(
            &test_server(),
            "pw",
            Duration::from_millis(100),
            Duration::from_secs(60),
        );
        assert!(matches!(
            session.keepalive_probe().await,
            Err(SshError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn test_connect_to_closed_port_fails() {
        let session = SshSession::new(
            &test_server(),
            "pw",
            Duration::from_millis(200),
            Duration::from_secs(60),
        );
        assert!(matches!(session.connect().await, Err(SshError::Dial(_))));
        assert!(!session.is_connected().await);
    }

    #[tokio::test]
    async fn test_reconnect_to_closed_port_fails() {
        let session = SshSession::new(
            &test_server(),
            "pw",
            Duration::from_millis(200),
            Duration::from_secs(60),
        );
        // Close is safe on a never-connected session; the dial then fails.
        assert!(matches!(session.reconnect().await, Err(SshError::Dial(_))));
    }

    #[tokio::test]
    async fn test_execute_with_timeout_propagates_errors() {
        let session = Arc::new(SshSession::new(
            &test_server(),
            "pw",
            Duration::from_millis(100),
            Duration::from_secs(60),
        ));
        let result = session
            .execute_with_timeout("true", Duration::from_secs(1))
            .await;
        assert!(matches!(result, Err(SshError::NotConnected)));
    }

    #[tokio::test]
    async fn test_cwd_starts_empty() {
        let session = SshSession::new(
            &test_server(),
            "pw",
            Duration::from_millis(100),
            Duration::from_secs(60),
        );
        assert_eq!(session.current_dir().await, "");
        session.set_current_dir("/tmp".to_string()).await;
        assert_eq!(session.current_dir().await, "/tmp");
    }
}
