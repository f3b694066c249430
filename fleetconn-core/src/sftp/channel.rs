//! The per-host SFTP file channel and its operations

use std::io::{Read, Write};
use std::path::Path;
use std::sync::Arc;

use chrono::DateTime;
use tokio::sync::Mutex;

use super::path::{base_name, glob_match, join_remote, parent_dir};
use super::{SftpError, SftpResult};
use crate::models::{DirSizeSummary, FileEntry};
use crate::ssh::SshSession;

/// Search stops after this many matches
pub const MAX_SEARCH_RESULTS: usize = 100;

/// A file-system channel on one host's pooled SSH transport
///
/// The channel mutex serializes operations; walker operations (search,
/// directory size) hold it for the whole walk. Closing the underlying
/// session invalidates the channel.
pub struct FileChannel {
    server_id: u32,
    session: Arc<SshSession>,
    sftp: Mutex<Option<ssh2::Sftp>>,
}

impl FileChannel {
    /// Wraps an SFTP channel opened on the given session
    pub(crate) fn new(session: Arc<SshSession>, sftp: ssh2::Sftp) -> Self {
        Self {
            server_id: session.server_id(),
            session,
            sftp: Mutex::new(Some(sftp)),
        }
    }

    /// Returns the host id this channel belongs to
    #[must_use]
    pub const fn server_id(&self) -> u32 {
        self.server_id
    }

    /// Returns true while both the channel and its transport are live
    pub async fn is_usable(&self) -> bool {
        self.sftp.lock().await.is_some() && self.session.is_connected().await
    }

    /// Closes the channel; the transport stays with the SSH pool
    pub async fn close(&self) {
        if let Some(sftp) = self.sftp.lock().await.take() {
            let _ = tokio::task::spawn_blocking(move || drop(sftp)).await;
        }
    }

    /// Runs one blocking SFTP operation while holding the channel mutex
    async fn with_channel<T, F>(&self, op: F) -> SftpResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&ssh2::Sftp) -> SftpResult<T> + Send + 'static,
    {
        let mut guard = self.sftp.lock().await;
        let Some(sftp) = guard.take() else {
            return Err(SftpError::ChannelClosed);
        };

        let joined = tokio::task::spawn_blocking(move || {
            let result = op(&sftp);
            (sftp, result)
        })
        .await;

        match joined {
            Ok((sftp, result)) => {
                *guard = Some(sftp);
                result
            }
            Err(e) => Err(SftpError::Task(e.to_string())),
        }
    }

    /// Lists a remote directory
    ///
    /// # Errors
    ///
    /// Returns [`SftpError::NotFound`] when the directory cannot be read.
    pub async fn list(&self, path: &str) -> SftpResult<Vec<FileEntry>> {
        let dir = path.to_string();
        self.with_channel(move |sftp| {
            let entries = sftp
                .readdir(Path::new(&dir))
                .map_err(|_| SftpError::NotFound(dir.clone()))?;

            let mut files = Vec::with_capacity(entries.len());
            for (entry_path, stat) in entries {
                let name = entry_path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                let full = join_remote(&dir, &name);
                files.push(entry_from_stat(&full, &stat));
            }
            Ok(files)
        })
        .await
    }

    /// Creates a directory and all missing parents
    ///
    /// # Errors
    ///
    /// Returns [`SftpError::Operation`] when a component cannot be created.
    pub async fn mkdir_p(&self, path: &str) -> SftpResult<()> {
        let target = path.to_string();
        self.with_channel(move |sftp| ensure_dir_all(sftp, &target))
            .await
    }

    /// Removes a directory, depth-first when `recursive` is set
    ///
    /// # Errors
    ///
    /// Returns an error when any entry cannot be removed.
    pub async fn rmdir(&self, path: &str, recursive: bool) -> SftpResult<()> {
        let target = path.to_string();
        self.with_channel(move |sftp| {
            if recursive {
                remove_recursive(sftp, &target)
            } else {
                sftp.rmdir(Path::new(&target)).map_err(op_err)
            }
        })
        .await
    }

    /// Writes bytes to a remote file, creating missing parent directories
    ///
    /// # Errors
    ///
    /// Returns an error when the target cannot be created or written.
    pub async fn upload(&self, path: &str, data: Vec<u8>) -> SftpResult<()> {
        let target = path.to_string();
        self.with_channel(move |sftp| {
            ensure_dir_all(sftp, parent_dir(&target))?;
            let mut file = sftp.create(Path::new(&target)).map_err(op_err)?;
            file.write_all(&data)
                .map_err(|e| SftpError::Operation(e.to_string()))?;
            Ok(())
        })
        .await
    }

    /// Reads a remote file into memory
    ///
    /// # Errors
    ///
    /// Returns [`SftpError::NotFound`] when the file cannot be opened.
    pub async fn download(&self, path: &str) -> SftpResult<Vec<u8>> {
        let target = path.to_string();
        self.with_channel(move |sftp| {
            let mut file = sftp
                .open(Path::new(&target))
                .map_err(|_| SftpError::NotFound(target.clone()))?;
            let mut data = Vec::new();
            file.read_to_end(&mut data)
                .map_err(|e| SftpError::Operation(e.to_string()))?;
            Ok(data)
        })
        .await
    }

    /// Removes a file
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be removed.
    pub async fn delete(&self, path: &str) -> SftpResult<()> {
        let target = path.to_string();
        self.with_channel(move |sftp| sftp.unlink(Path::new(&target)).map_err(op_err))
            .await
    }

    /// Renames or moves an entry
    ///
    /// # Errors
    ///
    /// Returns an error when the rename is rejected (e.g. target exists).
    pub async fn rename(&self, old_path: &str, new_path: &str) -> SftpResult<()> {
        let old = old_path.to_string();
        let new = new_path.to_string();
        self.with_channel(move |sftp| {
            sftp.rename(Path::new(&old), Path::new(&new), None)
                .map_err(op_err)
        })
        .await
    }

    /// Reads a whole remote file as text; the caller enforces size limits
    ///
    /// # Errors
    ///
    /// Returns [`SftpError::NotFound`] when the file cannot be opened.
    pub async fn read_text(&self, path: &str) -> SftpResult<String> {
        let data = self.download(path).await?;
        Ok(String::from_utf8_lossy(&data).into_owned())
    }

    /// Creates or truncates a remote file with the given text
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be written.
    pub async fn write_text(&self, path: &str, content: String) -> SftpResult<()> {
        self.upload(path, content.into_bytes()).await
    }

    /// Sets permission bits on an entry
    ///
    /// # Errors
    ///
    /// Returns an error when the attributes cannot be set.
    pub async fn chmod(&self, path: &str, mode: u32) -> SftpResult<()> {
        let target = path.to_string();
        self.with_channel(move |sftp| {
            sftp.setstat(Path::new(&target), perm_stat(mode)).map_err(op_err)
        })
        .await
    }

    /// Returns file information for an entry
    ///
    /// # Errors
    ///
    /// Returns [`SftpError::NotFound`] when the entry does not exist.
    pub async fn stat(&self, path: &str) -> SftpResult<FileEntry> {
        let target = path.to_string();
        self.with_channel(move |sftp| {
            let stat = sftp
                .stat(Path::new(&target))
                .map_err(|_| SftpError::NotFound(target.clone()))?;
            Ok(entry_from_stat(&target, &stat))
        })
        .await
    }

    /// Returns true when `stat` succeeds for the path
    pub async fn exists(&self, path: &str) -> bool {
        self.stat(path).await.is_ok()
    }

    /// Walks from `base` collecting entries whose base name glob-matches
    /// `pattern` or contains it case-insensitively
    ///
    /// Stops after [`MAX_SEARCH_RESULTS`] matches; per-step walker errors
    /// are skipped, not propagated.
    ///
    /// # Errors
    ///
    /// Returns an error only when the channel itself is unusable.
    pub async fn search(&self, base: &str, pattern: &str) -> SftpResult<Vec<FileEntry>> {
        let base = base.to_string();
        let pattern = pattern.to_string();
        self.with_channel(move |sftp| {
            let needle = pattern.to_lowercase();
            let mut results = Vec::new();

            let mut visit = |path: &str, stat: &ssh2::FileStat| {
                let name = base_name(path);
                if glob_match(&pattern, name) || name.to_lowercase().contains(&needle) {
                    results.push(entry_from_stat(path, stat));
                }
                results.len() < MAX_SEARCH_RESULTS
            };

            if let Ok(stat) = sftp.stat(Path::new(&base)) {
                if visit(&base, &stat) && stat.is_dir() {
                    walk_dir(sftp, &base, &mut visit);
                }
            }
            Ok(results)
        })
        .await
    }

    /// Walks a directory summing file sizes and counting entries
    ///
    /// The base directory itself is not counted. Per-step walker errors
    /// are skipped.
    ///
    /// # Errors
    ///
    /// Returns an error only when the channel itself is unusable.
    pub async fn dir_size(&self, path: &str) -> SftpResult<DirSizeSummary> {
        let base = path.to_string();
        self.with_channel(move |sftp| {
            let mut summary = DirSizeSummary {
                path: base.clone(),
                ..DirSizeSummary::default()
            };

            let mut visit = |_path: &str, stat: &ssh2::FileStat| {
                if stat.is_dir() {
                    summary.dir_count += 1;
                } else {
                    summary.file_count += 1;
                    summary.size += stat.size.unwrap_or(0);
                }
                true
            };
            walk_dir(sftp, &base, &mut visit);

            Ok(summary)
        })
        .await
    }

    /// Copies a file within the host, preserving the source mode
    /// best-effort
    ///
    /// # Errors
    ///
    /// Returns an error when the source cannot be read or the destination
    /// cannot be written.
    pub async fn copy(&self, src: &str, dst: &str) -> SftpResult<()> {
        let src = src.to_string();
        let dst = dst.to_string();
        self.with_channel(move |sftp| {
            let mut source = sftp
                .open(Path::new(&src))
                .map_err(|_| SftpError::NotFound(src.clone()))?;
            let mut data = Vec::new();
            source
                .read_to_end(&mut data)
                .map_err(|e| SftpError::Operation(e.to_string()))?;

            ensure_dir_all(sftp, parent_dir(&dst))?;
            let mut target = sftp.create(Path::new(&dst)).map_err(op_err)?;
            target
                .write_all(&data)
                .map_err(|e| SftpError::Operation(e.to_string()))?;

            if let Ok(stat) = sftp.stat(Path::new(&src))
                && let Some(perm) = stat.perm
            {
                let _ = sftp.setstat(Path::new(&dst), perm_stat(perm));
            }
            Ok(())
        })
        .await
    }
}

impl std::fmt::Debug for FileChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileChannel")
            .field("server_id", &self.server_id)
            .finish_non_exhaustive()
    }
}

fn op_err(e: ssh2::Error) -> SftpError {
    SftpError::Operation(e.to_string())
}

/// A `FileStat` carrying only permission bits, for `setstat`
fn perm_stat(mode: u32) -> ssh2::FileStat {
    ssh2::FileStat {
        size: None,
        uid: None,
        gid: None,
        perm: Some(mode),
        atime: None,
        mtime: None,
    }
}

/// Converts an SFTP stat into the API file entry shape
fn entry_from_stat(path: &str, stat: &ssh2::FileStat) -> FileEntry {
    FileEntry {
        name: base_name(path).to_string(),
        path: path.to_string(),
        size: stat.size.unwrap_or(0),
        is_dir: stat.is_dir(),
        permissions: stat.perm.unwrap_or(0),
        mod_time: DateTime::from_timestamp(stat.mtime.unwrap_or(0).min(i64::MAX as u64) as i64, 0)
            .unwrap_or(DateTime::UNIX_EPOCH),
        owner: stat.uid.unwrap_or(0).to_string(),
        group: stat.gid.unwrap_or(0).to_string(),
    }
}

/// Creates a directory chain, tolerating components that already exist
fn ensure_dir_all(sftp: &ssh2::Sftp, path: &str) -> SftpResult<()> {
    if path.is_empty() || path == "/" {
        return Ok(());
    }

    let mut current = if path.starts_with('/') {
        String::from("/")
    } else {
        String::new()
    };

    for component in path.split('/').filter(|c| !c.is_empty()) {
        current = join_remote(&current, component);
        if sftp.stat(Path::new(&current)).is_ok() {
            continue;
        }
        if let Err(e) = sftp.mkdir(Path::new(&current), 0o755)
            && sftp.stat(Path::new(&current)).is_err()
        {
            return Err(op_err(e));
        }
    }
    Ok(())
}

/// Depth-first removal of a directory and everything under it
fn remove_recursive(sftp: &ssh2::Sftp, path: &str) -> SftpResult<()> {
    let entries = sftp.readdir(Path::new(path)).map_err(op_err)?;

    for (entry_path, stat) in entries {
        let name = entry_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let full = join_remote(path, &name);
        if stat.is_dir() {
            remove_recursive(sftp, &full)?;
        } else {
            sftp.unlink(Path::new(&full)).map_err(op_err)?;
        }
    }

    sftp.rmdir(Path::new(path)).map_err(op_err)
}

/// Pre-order walk below `path`; per-step errors are skipped. The visitor
/// returns false to stop the walk early.
fn walk_dir<F>(sftp: &ssh2::Sftp, path: &str, visit: &mut F) -> bool
where
    F: FnMut(&str, &ssh2::FileStat) -> bool,
{
    let Ok(entries) = sftp.readdir(Path::new(path)) else {
        return true;
    };

    for (entry_path, stat) in entries {
        let name = entry_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let full = join_remote(path, &name);
        if !visit(&full, &stat) {
            return false;
        }
        if stat.is_dir() && !walk_dir(sftp, &full, visit) {
            return false;
        }
    }
    true
}
