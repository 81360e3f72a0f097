//! NFSv3 adapter with AUTH_UNIX.
//!
//! The protocol binding has no rename, so moves are emulated by copy +
//! delete, and `move_file` creates destination directory components one at
//! a time, tolerating "already exists" (NFS errors are not well-typed
//! across servers, so the check is by message).

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use nfs3_client::nfs3_types::nfs3::{
    self, diropargs3, nfs_fh3, sattr3, CREATE3args, LOOKUP3args, MKDIR3args, READ3args,
    READDIRPLUS3args, REMOVE3args, WRITE3args,
};
use nfs3_client::tokio::TokioConnector;
use nfs3_client::Nfs3ConnectionBuilder;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use dockhand_core::defaults::REMOTE_CONNECT_TIMEOUT_SECS;
use dockhand_core::{Error, Result};

use super::{is_pdf_name, RemoteFile, RemoteSource};

/// Chunk size for READ/WRITE transfers.
const TRANSFER_CHUNK: u32 = 64 * 1024;

type Connection = nfs3_client::Nfs3Connection<nfs3_client::tokio::TokioIo<tokio::net::TcpStream>>;

/// NFS export adapter. AUTH_UNIX carries no password; only host and export
/// path are needed.
pub struct NfsSource {
    host: String,
    export: String,
}

impl NfsSource {
    pub fn new(host: &str, export: &str) -> Self {
        Self {
            host: host.to_string(),
            export: export.to_string(),
        }
    }

    /// Mount the export with a connect timeout; one connection per
    /// operation, mirroring the SMB adapter's stance.
    async fn connect(&self) -> Result<Connection> {
        let connect = Nfs3ConnectionBuilder::new(
            TokioConnector,
            self.host.clone(),
            self.export.clone(),
        )
        .connect();

        tokio::time::timeout(Duration::from_secs(REMOTE_CONNECT_TIMEOUT_SECS), connect)
            .await
            .map_err(|_| {
                Error::Request(format!(
                    "nfs connect {} timed out after {REMOTE_CONNECT_TIMEOUT_SECS}s",
                    self.host
                ))
            })?
            .map_err(|e| Error::Request(format!("nfs mount {}:{}: {e}", self.host, self.export)))
    }

    /// Resolve a `/`-separated path to a file handle, starting at the root.
    async fn lookup_path(&self, conn: &mut Connection, path: &str) -> Result<nfs_fh3> {
        let mut handle = conn.root_nfs_fh3();

        for component in path.split('/').filter(|c| !c.is_empty()) {
            let response = conn
                .lookup(LOOKUP3args {
                    what: diropargs3 {
                        dir: handle,
                        name: component.as_bytes().into(),
                    },
                })
                .await
                .map_err(|e| Error::Request(format!("nfs lookup {path}: {e}")))?;
            handle = response.object;
        }

        Ok(handle)
    }

    /// Recursive walk collecting PDFs; unreadable directories are skipped.
    async fn walk_dir(
        &self,
        conn: &mut Connection,
        dir_handle: nfs_fh3,
        dir_path: &str,
        files: &mut Vec<RemoteFile>,
    ) -> Result<()> {
        let listing = match conn
            .readdirplus(READDIRPLUS3args {
                dir: dir_handle,
                cookie: 0,
                cookieverf: nfs3::cookieverf3::default(),
                dircount: TRANSFER_CHUNK,
                maxcount: TRANSFER_CHUNK * 4,
            })
            .await
        {
            Ok(listing) => listing,
            Err(e) => {
                debug!(dir = dir_path, error = %e, "skipping unreadable nfs directory");
                return Ok(());
            }
        };

        for entry in listing.reply.entries.into_inner() {
            let name = String::from_utf8_lossy(entry.name.as_ref()).into_owned();
            if name == "." || name == ".." {
                continue;
            }

            let path = if dir_path == "/" {
                format!("/{name}")
            } else {
                format!("{dir_path}/{name}")
            };

            let Some(attrs) = entry.name_attributes.into_option() else {
                continue;
            };
            let Some(handle) = entry.name_handle.into_option() else {
                continue;
            };

            match attrs.type_ {
                nfs3::ftype3::NF3DIR => {
                    Box::pin(self.walk_dir(conn, handle, &path, files)).await?;
                }
                nfs3::ftype3::NF3REG if is_pdf_name(&name) => {
                    files.push(RemoteFile {
                        path,
                        name,
                        size: attrs.size as i64,
                    });
                }
                _ => {}
            }
        }

        Ok(())
    }

    /// Stream a remote file into a local one.
    async fn download(&self, conn: &mut Connection, remote_path: &str, dest: &Path) -> Result<()> {
        let handle = self.lookup_path(conn, remote_path).await?;
        let mut local = tokio::fs::File::create(dest).await?;
        let mut offset = 0u64;

        loop {
            let response = conn
                .read(READ3args {
                    file: handle.clone(),
                    offset,
                    count: TRANSFER_CHUNK,
                })
                .await
                .map_err(|e| Error::Request(format!("nfs read {remote_path}: {e}")))?;

            let data = response.data.into_inner();
            local.write_all(&data).await?;
            offset += data.len() as u64;

            if response.eof || data.is_empty() {
                break;
            }
        }

        local.sync_all().await?;
        Ok(())
    }

    /// Copy the bytes of `src_path` into a newly created `dest_path`.
    async fn copy_remote(
        &self,
        conn: &mut Connection,
        src_path: &str,
        dest_dir: nfs_fh3,
        dest_name: &str,
    ) -> Result<()> {
        let src = self.lookup_path(conn, src_path).await?;

        let created = conn
            .create(CREATE3args {
                where_: diropargs3 {
                    dir: dest_dir,
                    name: dest_name.as_bytes().into(),
                },
                how: nfs3::createhow3::UNCHECKED(sattr3::default()),
            })
            .await
            .map_err(|e| Error::Request(format!("nfs create {dest_name}: {e}")))?;

        let dest = created
            .obj
            .into_option()
            .ok_or_else(|| Error::Request(format!("nfs create {dest_name}: no handle returned")))?;

        let mut offset = 0u64;
        loop {
            let response = conn
                .read(READ3args {
                    file: src.clone(),
                    offset,
                    count: TRANSFER_CHUNK,
                })
                .await
                .map_err(|e| Error::Request(format!("nfs read {src_path}: {e}")))?;

            let data = response.data.into_inner();
            if !data.is_empty() {
                conn.write(WRITE3args {
                    file: dest.clone(),
                    offset,
                    count: data.len() as u32,
                    stable: nfs3::stable_how::FILE_SYNC,
                    data: data.as_slice().into(),
                })
                .await
                .map_err(|e| Error::Request(format!("nfs write {dest_name}: {e}")))?;
            }
            offset += data.len() as u64;

            if response.eof || data.is_empty() {
                break;
            }
        }

        Ok(())
    }

    /// Create directory components one at a time, tolerating EEXIST.
    async fn ensure_dir(&self, conn: &mut Connection, dir: &str) -> Result<nfs_fh3> {
        let mut handle = conn.root_nfs_fh3();

        for component in dir.split('/').filter(|c| !c.is_empty()) {
            let result = conn
                .mkdir(MKDIR3args {
                    where_: diropargs3 {
                        dir: handle.clone(),
                        name: component.as_bytes().into(),
                    },
                    attributes: sattr3::default(),
                })
                .await;

            match result {
                Ok(created) => {
                    handle = created.obj.into_option().ok_or_else(|| {
                        Error::Request(format!("nfs mkdir {component}: no handle returned"))
                    })?;
                }
                Err(e) if e.to_string().contains("EXIST") => {
                    let response = conn
                        .lookup(LOOKUP3args {
                            what: diropargs3 {
                                dir: handle,
                                name: component.as_bytes().into(),
                            },
                        })
                        .await
                        .map_err(|e| Error::Request(format!("nfs lookup {component}: {e}")))?;
                    handle = response.object;
                }
                Err(e) => {
                    return Err(Error::Request(format!("nfs mkdir {component}: {e}")));
                }
            }
        }

        Ok(handle)
    }

    async fn remove(&self, conn: &mut Connection, remote_path: &str) -> Result<()> {
        let (dir, name) = split_path(remote_path);
        let dir_handle = self.lookup_path(conn, dir).await?;

        conn.remove(REMOVE3args {
            object: diropargs3 {
                dir: dir_handle,
                name: name.as_bytes().into(),
            },
        })
        .await
        .map_err(|e| Error::Request(format!("nfs remove {remote_path}: {e}")))?;
        Ok(())
    }
}

/// Split a share-root-relative path into (parent dir, filename).
fn split_path(path: &str) -> (&str, &str) {
    match path.rfind('/') {
        Some(0) => ("/", &path[1..]),
        Some(idx) => (&path[..idx], &path[idx + 1..]),
        None => ("/", path),
    }
}

#[async_trait]
impl RemoteSource for NfsSource {
    async fn test(&self) -> Result<()> {
        let mut conn = self.connect().await?;
        let root = conn.root_nfs_fh3();
        let result = conn
            .readdirplus(READDIRPLUS3args {
                dir: root,
                cookie: 0,
                cookieverf: nfs3::cookieverf3::default(),
                dircount: TRANSFER_CHUNK,
                maxcount: TRANSFER_CHUNK * 4,
            })
            .await
            .map(|_| ())
            .map_err(|e| Error::Request(format!("read export root: {e}")));
        let _ = conn.unmount().await;
        result
    }

    async fn list_pdfs(&self) -> Result<Vec<RemoteFile>> {
        let mut conn = self.connect().await?;
        let root = conn.root_nfs_fh3();

        let mut files = Vec::new();
        let result = self.walk_dir(&mut conn, root, "/", &mut files).await;
        let _ = conn.unmount().await;

        result.map(|_| files)
    }

    async fn read_file(&self, remote_path: &str, dest: &Path) -> Result<()> {
        let mut conn = self.connect().await?;
        let result = self.download(&mut conn, remote_path, dest).await;
        let _ = conn.unmount().await;
        result
    }

    async fn delete_file(&self, remote_path: &str) -> Result<()> {
        let mut conn = self.connect().await?;
        let result = self.remove(&mut conn, remote_path).await;
        let _ = conn.unmount().await;
        result
    }

    async fn move_file(&self, remote_path: &str, dest_path: &str) -> Result<()> {
        let mut conn = self.connect().await?;

        let result = async {
            let (dest_dir, dest_name) = split_path(dest_path);
            let dir_handle = if dest_dir == "/" {
                conn.root_nfs_fh3()
            } else {
                self.ensure_dir(&mut conn, dest_dir).await?
            };

            self.copy_remote(&mut conn, remote_path, dir_handle, dest_name)
                .await?;
            self.remove(&mut conn, remote_path).await
        }
        .await;

        let _ = conn.unmount().await;
        result
    }

    async fn close(&self) {
        // Connections are per-operation; nothing is held between calls.
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_path_nested() {
        assert_eq!(split_path("/scans/2024/a.pdf"), ("/scans/2024", "a.pdf"));
    }

    #[test]
    fn test_split_path_root() {
        assert_eq!(split_path("/a.pdf"), ("/", "a.pdf"));
        assert_eq!(split_path("a.pdf"), ("/", "a.pdf"));
    }
}
