//! SMB2/3 adapter over libsmbclient (pavao).
//!
//! The client library is synchronous, so every operation runs on the
//! blocking pool with the connect timeout enforced from the async side.
//! Connections are scoped to one operation; no session persists between
//! calls.

use std::io::{Read, Write};
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use pavao::{SmbClient, SmbCredentials, SmbDirentType, SmbMode, SmbOpenOptions, SmbOptions};
use tracing::debug;

use dockhand_core::defaults::REMOTE_CONNECT_TIMEOUT_SECS;
use dockhand_core::{Error, Result};

use super::{is_pdf_name, RemoteFile, RemoteSource};

/// Time allowance for one whole SMB operation (connect + transfer).
const OPERATION_TIMEOUT_SECS: u64 = REMOTE_CONNECT_TIMEOUT_SECS * 4;

/// SMB share adapter. Credentials arrive already decrypted.
pub struct SmbSource {
    host: String,
    share: String,
    username: String,
    password: String,
}

impl SmbSource {
    pub fn new(host: &str, share: &str, username: &str, password: &str) -> Self {
        Self {
            host: host.to_string(),
            share: share.to_string(),
            username: username.to_string(),
            password: password.to_string(),
        }
    }

    /// One connection per operation, NTLM over TCP 445.
    fn connect(&self) -> Result<SmbClient> {
        let credentials = SmbCredentials::default()
            .server(format!("smb://{}", self.host))
            .share(&self.share)
            .username(&self.username)
            .password(&self.password);

        SmbClient::new(credentials, SmbOptions::default().one_share_per_server(true))
            .map_err(|e| Error::Request(format!("smb connect {}: {e}", self.host)))
    }

    /// Run a blocking client operation under the operation timeout.
    async fn with_client<T, F>(&self, op_name: &'static str, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&SmbClient) -> Result<T> + Send + 'static,
    {
        let source = self.clone_config();
        let task = tokio::task::spawn_blocking(move || {
            let client = source.connect()?;
            op(&client)
        });

        match tokio::time::timeout(Duration::from_secs(OPERATION_TIMEOUT_SECS), task).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => Err(Error::Internal(format!("smb task panicked: {e}"))),
            Err(_) => Err(Error::Request(format!(
                "smb {op_name} timed out after {OPERATION_TIMEOUT_SECS}s"
            ))),
        }
    }

    fn clone_config(&self) -> SmbSource {
        SmbSource {
            host: self.host.clone(),
            share: self.share.clone(),
            username: self.username.clone(),
            password: self.password.clone(),
        }
    }
}

/// Recursive walk collecting PDF files; listing errors on subdirectories
/// are skipped so one unreadable folder does not abort the sync.
fn walk_pdfs(client: &SmbClient, dir: &str, files: &mut Vec<RemoteFile>) {
    let entries = match client.list_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            debug!(dir, error = %e, "skipping unreadable smb directory");
            return;
        }
    };

    for entry in entries {
        let name = entry.name();
        if name == "." || name == ".." {
            continue;
        }
        let path = join_remote(dir, name);

        match entry.get_type() {
            SmbDirentType::Dir => walk_pdfs(client, &path, files),
            SmbDirentType::File if is_pdf_name(name) => {
                let size = client
                    .stat(path.as_str())
                    .map(|stat| stat.size as i64)
                    .unwrap_or(0);
                files.push(RemoteFile {
                    path,
                    name: name.to_string(),
                    size,
                });
            }
            _ => {}
        }
    }
}

fn join_remote(dir: &str, name: &str) -> String {
    if dir == "/" || dir.is_empty() {
        format!("/{name}")
    } else {
        format!("{dir}/{name}")
    }
}

fn parent_dir(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) | None => "/",
        Some(idx) => &path[..idx],
    }
}

#[async_trait]
impl RemoteSource for SmbSource {
    async fn test(&self) -> Result<()> {
        self.with_client("test", |client| {
            client
                .list_dir("/")
                .map(|_| ())
                .map_err(|e| Error::Request(format!("read share root: {e}")))
        })
        .await
    }

    async fn list_pdfs(&self) -> Result<Vec<RemoteFile>> {
        self.with_client("list", |client| {
            let mut files = Vec::new();
            walk_pdfs(client, "/", &mut files);
            Ok(files)
        })
        .await
    }

    async fn read_file(&self, remote_path: &str, dest: &Path) -> Result<()> {
        let remote_path = remote_path.to_string();
        let dest = dest.to_path_buf();

        self.with_client("read", move |client| {
            let mut remote = client
                .open_with(&remote_path, SmbOpenOptions::default().read(true))
                .map_err(|e| Error::Request(format!("open {remote_path}: {e}")))?;

            let mut local = std::fs::File::create(&dest)?;
            let mut buf = [0u8; 64 * 1024];
            loop {
                let n = remote
                    .read(&mut buf)
                    .map_err(|e| Error::Request(format!("read {remote_path}: {e}")))?;
                if n == 0 {
                    break;
                }
                local.write_all(&buf[..n])?;
            }
            local.sync_all()?;
            Ok(())
        })
        .await
    }

    async fn delete_file(&self, remote_path: &str) -> Result<()> {
        let remote_path = remote_path.to_string();
        self.with_client("delete", move |client| {
            client
                .unlink(&remote_path)
                .map_err(|e| Error::Request(format!("remove {remote_path}: {e}")))
        })
        .await
    }

    async fn move_file(&self, remote_path: &str, dest_path: &str) -> Result<()> {
        let remote_path = remote_path.to_string();
        let dest_path = dest_path.to_string();

        self.with_client("move", move |client| {
            let dest_dir = parent_dir(&dest_path).to_string();
            if dest_dir != "/" {
                // mkdir is shallow; tolerate directories that already exist.
                if let Err(e) = client.mkdir(&dest_dir, SmbMode::from(0o755)) {
                    debug!(dir = %dest_dir, error = %e, "smb mkdir (may already exist)");
                }
            }

            client
                .rename(&remote_path, &dest_path)
                .map_err(|e| Error::Request(format!("rename {remote_path} to {dest_path}: {e}")))
        })
        .await
    }

    async fn close(&self) {
        // Connections are per-operation; nothing is held between calls.
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_remote_root() {
        assert_eq!(join_remote("/", "a.pdf"), "/a.pdf");
        assert_eq!(join_remote("", "a.pdf"), "/a.pdf");
    }

    #[test]
    fn test_join_remote_nested() {
        assert_eq!(join_remote("/scans", "a.pdf"), "/scans/a.pdf");
        assert_eq!(join_remote("/scans/2024", "a.pdf"), "/scans/2024/a.pdf");
    }

    #[test]
    fn test_parent_dir() {
        assert_eq!(parent_dir("/a.pdf"), "/");
        assert_eq!(parent_dir("/scans/a.pdf"), "/scans");
        assert_eq!(parent_dir("/scans/2024/a.pdf"), "/scans/2024");
        assert_eq!(parent_dir("a.pdf"), "/");
    }
}
