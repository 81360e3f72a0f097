//! Remote share adapters.
//!
//! SMB and NFS conform to one protocol-agnostic [`RemoteSource`] trait; the
//! sync service never sees wire details. Adapters own their connection
//! lifecycle (both connect per operation, the conservative stance that keeps
//! every sync on a clean credential path).

pub mod nfs;
pub mod smb;

pub use nfs::NfsSource;
pub use smb::SmbSource;

use std::path::Path;

use async_trait::async_trait;

use dockhand_core::{Error, NetworkProtocol, NetworkSource, Result};
use dockhand_crypto::CredentialCrypto;

/// A file discovered on a remote share.
#[derive(Debug, Clone)]
pub struct RemoteFile {
    /// Path relative to the share root.
    pub path: String,
    /// Filename only.
    pub name: String,
    /// Size in bytes.
    pub size: i64,
}

/// Protocol adapter for a remote file source.
#[async_trait]
pub trait RemoteSource: Send + Sync {
    /// Validate that a connection can be established.
    async fn test(&self) -> Result<()>;

    /// All PDF files in the source, recursive, `.pdf` case-insensitive.
    /// No ordering is guaranteed.
    async fn list_pdfs(&self) -> Result<Vec<RemoteFile>>;

    /// Download a remote file into the given local path.
    async fn read_file(&self, remote_path: &str, dest: &Path) -> Result<()>;

    /// Remove a file from the source.
    async fn delete_file(&self, remote_path: &str) -> Result<()>;

    /// Move a file within the source; `dest_path` is share-root relative.
    /// Missing destination directories are created.
    async fn move_file(&self, remote_path: &str, dest_path: &str) -> Result<()>;

    /// Release any held resources.
    async fn close(&self);
}

/// Build the adapter matching a source row, decrypting stored credentials.
pub fn source_from_config(
    config: &NetworkSource,
    crypto: &CredentialCrypto,
) -> Result<Box<dyn RemoteSource>> {
    match config.protocol {
        NetworkProtocol::Smb => {
            let password = match config.password_encrypted.as_deref() {
                Some(encrypted) if !encrypted.is_empty() => crypto
                    .decrypt(encrypted)
                    .map_err(|e| Error::Crypto(format!("decrypt password: {e}")))?,
                _ => String::new(),
            };
            let username = config.username.clone().unwrap_or_default();

            Ok(Box::new(SmbSource::new(
                &config.host,
                &config.share_path,
                &username,
                &password,
            )))
        }
        NetworkProtocol::Nfs => Ok(Box::new(NfsSource::new(&config.host, &config.share_path))),
    }
}

/// Case-insensitive `.pdf` check for remote listings.
pub(crate) fn is_pdf_name(name: &str) -> bool {
    Path::new(name)
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use dockhand_core::{DuplicateAction, PostImportAction};
    use uuid::Uuid;

    fn source(protocol: NetworkProtocol, password_encrypted: Option<String>) -> NetworkSource {
        NetworkSource {
            id: Uuid::new_v4(),
            name: "share".into(),
            enabled: true,
            protocol,
            host: "files.local".into(),
            share_path: "scans".into(),
            username: Some("svc".into()),
            password_encrypted,
            continuous_sync: true,
            post_import_action: PostImportAction::Leave,
            move_subfolder: None,
            duplicate_action: DuplicateAction::Skip,
            batch_size: 100,
            consecutive_failures: 0,
            files_imported: 0,
            last_sync_at: None,
            last_error: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_is_pdf_name() {
        assert!(is_pdf_name("scan.pdf"));
        assert!(is_pdf_name("SCAN.PDF"));
        assert!(!is_pdf_name("scan.pdf.bak"));
        assert!(!is_pdf_name("notes.txt"));
    }

    #[test]
    fn test_factory_smb_with_encrypted_password() {
        let crypto = CredentialCrypto::new("secret");
        let encrypted = crypto.encrypt("hunter2").unwrap();

        let adapter = source_from_config(&source(NetworkProtocol::Smb, Some(encrypted)), &crypto);
        assert!(adapter.is_ok());
    }

    #[test]
    fn test_factory_smb_bad_ciphertext_fails() {
        let crypto = CredentialCrypto::new("secret");
        let result = source_from_config(
            &source(NetworkProtocol::Smb, Some("!!!not-base64".into())),
            &crypto,
        );
        assert!(matches!(result, Err(Error::Crypto(_))));
    }

    #[test]
    fn test_factory_nfs_ignores_credentials() {
        let crypto = CredentialCrypto::new("secret");
        let adapter = source_from_config(&source(NetworkProtocol::Nfs, None), &crypto);
        assert!(adapter.is_ok());
    }
}
