//! Network source sync: list, download, ingest, post-import disposition.

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use dockhand_core::defaults::{MAX_CONSECUTIVE_FAILURES, MOVE_SUBFOLDER_DEFAULT};
use dockhand_core::models::source_actions;
use dockhand_core::{Error, NetworkSource, PostImportAction, Result};
use dockhand_crypto::CredentialCrypto;
use dockhand_db::Database;
use dockhand_ingest::DocumentService;

use crate::remote::{source_from_config, RemoteFile, RemoteSource};

/// Temp-file prefix for downloads in flight.
const TEMP_PREFIX: &str = "network-sync-";

/// Builds protocol adapters for source rows. Swappable in tests.
pub trait AdapterFactory: Send + Sync {
    fn build(&self, config: &NetworkSource) -> Result<Box<dyn RemoteSource>>;
}

struct CryptoAdapterFactory {
    crypto: CredentialCrypto,
}

impl AdapterFactory for CryptoAdapterFactory {
    fn build(&self, config: &NetworkSource) -> Result<Box<dyn RemoteSource>> {
        source_from_config(config, &self.crypto)
    }
}

/// Coordinates sync operations across network sources.
pub struct NetworkService {
    db: Database,
    documents: DocumentService,
    factory: Box<dyn AdapterFactory>,
}

impl NetworkService {
    pub fn new(db: Database, documents: DocumentService, crypto: CredentialCrypto) -> Self {
        Self {
            db,
            documents,
            factory: Box::new(CryptoAdapterFactory { crypto }),
        }
    }

    /// Construct with a custom adapter factory (tests).
    pub fn with_factory(
        db: Database,
        documents: DocumentService,
        factory: Box<dyn AdapterFactory>,
    ) -> Self {
        Self {
            db,
            documents,
            factory,
        }
    }

    /// Admin "test connection": build the adapter and probe the share.
    pub async fn test_connection(&self, source_id: Uuid) -> Result<()> {
        let config = self.db.network_sources.get(source_id).await?;
        let adapter = self.factory.build(&config)?;
        let result = adapter.test().await;
        adapter.close().await;
        result
    }

    /// Synchronize one source. Returns the number of files imported.
    pub async fn sync_source(&self, cancel: &CancellationToken, source_id: Uuid) -> Result<usize> {
        let config = self.db.network_sources.get(source_id).await?;
        if !config.enabled {
            return Err(Error::InvalidInput("source is disabled".into()));
        }

        let adapter = match self.factory.build(&config) {
            Ok(adapter) => adapter,
            Err(e) => {
                self.record_failure(&config, &e).await;
                return Err(e);
            }
        };

        info!(source = %config.name, host = %config.host, "starting sync");

        let mut files = match adapter.list_pdfs().await {
            Ok(files) => files,
            Err(e) => {
                adapter.close().await;
                self.record_failure(&config, &e).await;
                return Err(e);
            }
        };

        info!(source = %config.name, count = files.len(), "found PDF files");

        // Cap the batch; the next sync catches the remainder.
        if files.len() > config.batch_size.max(0) as usize {
            files.truncate(config.batch_size as usize);
            info!(source = %config.name, batch_size = config.batch_size, "applying batch limit");
        }

        let mut imported = 0;
        for file in &files {
            if cancel.is_cancelled() {
                adapter.close().await;
                return Err(Error::Canceled("sync cancelled".into()));
            }

            match self.import_file(adapter.as_ref(), &config, file).await {
                Ok(was_new) => {
                    if was_new {
                        imported += 1;
                    }
                }
                Err(e) => {
                    warn!(file = %file.path, error = %e, "failed to import file");
                    self.db
                        .network_sources
                        .log_event(
                            config.id,
                            &file.name,
                            Some(&file.path),
                            source_actions::ERROR,
                            None,
                            Some(&e.to_string()),
                        )
                        .await;
                }
            }
        }

        adapter.close().await;

        // A completed sync clears the failure streak.
        if let Err(e) = self.db.network_sources.reset_failures(config.id).await {
            warn!(source_id = %config.id, error = %e, "failed to reset failure count");
        }
        self.db.network_sources.update_sync_status(config.id, None).await;

        info!(
            source = %config.name,
            imported,
            total = files.len(),
            "sync complete"
        );
        Ok(imported)
    }

    /// Synchronize every enabled source sequentially; one failure does not
    /// abort the others.
    pub async fn sync_all(&self, cancel: &CancellationToken) -> Result<()> {
        for source in self.db.network_sources.list_enabled().await? {
            if cancel.is_cancelled() {
                return Err(Error::Canceled("sync all cancelled".into()));
            }
            if let Err(e) = self.sync_source(cancel, source.id).await {
                warn!(source = %source.name, error = %e, "sync failed");
            }
        }
        Ok(())
    }

    /// Sources with continuous sync enabled, for the poller.
    pub async fn sync_continuous(&self, cancel: &CancellationToken) {
        let sources = match self.db.network_sources.list_continuous().await {
            Ok(sources) => sources,
            Err(e) => {
                warn!(error = %e, "failed to list continuous sync sources");
                return;
            }
        };

        if sources.is_empty() {
            return;
        }
        debug!(sources = sources.len(), "running scheduled sync");

        for source in sources {
            if cancel.is_cancelled() {
                return;
            }
            if let Err(e) = self.sync_source(cancel, source.id).await {
                warn!(source = %source.name, error = %e, "scheduled sync failed");
            }
        }
    }

    /// Download one remote file, ingest it, and apply the post-import
    /// action. Returns whether a new document was created.
    async fn import_file(
        &self,
        adapter: &dyn RemoteSource,
        config: &NetworkSource,
        file: &RemoteFile,
    ) -> Result<bool> {
        let temp = tempfile::Builder::new()
            .prefix(TEMP_PREFIX)
            .suffix(".pdf")
            .tempfile()?;
        let temp_path = temp.into_temp_path();

        adapter.read_file(&file.path, &temp_path).await?;

        let (document, is_duplicate) = self.documents.ingest(&temp_path, &file.name).await?;

        if is_duplicate {
            self.db
                .network_sources
                .log_event(
                    config.id,
                    &file.name,
                    Some(&file.path),
                    source_actions::DUPLICATE,
                    Some(document.id),
                    None,
                )
                .await;
            debug!(file = %file.name, existing_doc = %document.id, "duplicate file");
        } else {
            self.db
                .network_sources
                .log_event(
                    config.id,
                    &file.name,
                    Some(&file.path),
                    source_actions::IMPORTED,
                    Some(document.id),
                    None,
                )
                .await;
            if let Err(e) = self
                .db
                .network_sources
                .increment_files_imported(config.id)
                .await
            {
                warn!(source_id = %config.id, error = %e, "failed to increment import count");
            }
            info!(file = %file.name, document_id = %document.id, "imported file");
        }

        // Post-action failures only warn: the import itself succeeded.
        if let Err(e) = self.post_import(adapter, config, file).await {
            warn!(file = %file.path, error = %e, "post-import action failed");
        }

        Ok(!is_duplicate)
    }

    async fn post_import(
        &self,
        adapter: &dyn RemoteSource,
        config: &NetworkSource,
        file: &RemoteFile,
    ) -> Result<()> {
        match config.post_import_action {
            PostImportAction::Leave => Ok(()),
            PostImportAction::Delete => adapter.delete_file(&file.path).await,
            PostImportAction::Move => {
                let dest = move_destination(
                    &file.path,
                    &file.name,
                    config.move_subfolder.as_deref(),
                );
                adapter.move_file(&file.path, &dest).await
            }
        }
    }

    /// Record a sync-level failure; auto-disable after the streak limit.
    async fn record_failure(&self, config: &NetworkSource, error: &Error) {
        let message = error.to_string();
        self.db
            .network_sources
            .update_sync_status(config.id, Some(&message))
            .await;

        let failures = match self.db.network_sources.increment_failures(config.id).await {
            Ok(count) => count,
            Err(e) => {
                warn!(source_id = %config.id, error = %e, "failed to increment failure count");
                return;
            }
        };

        if failures >= MAX_CONSECUTIVE_FAILURES {
            if let Err(e) = self.db.network_sources.set_enabled(config.id, false).await {
                warn!(source_id = %config.id, error = %e, "failed to disable source");
                return;
            }
            warn!(
                source = %config.name,
                failures,
                "source auto-disabled after consecutive failures"
            );
        }
    }
}

/// Destination for the `move` post-import action:
/// `dirname(path)/<subfolder or "imported">/<name>`.
fn move_destination(remote_path: &str, name: &str, subfolder: Option<&str>) -> String {
    let subfolder = match subfolder {
        Some(s) if !s.is_empty() => s,
        _ => MOVE_SUBFOLDER_DEFAULT,
    };

    let dir = match remote_path.rfind('/') {
        Some(0) | None => "",
        Some(idx) => &remote_path[..idx],
    };

    format!("{dir}/{subfolder}/{name}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_move_destination_default_subfolder() {
        assert_eq!(
            move_destination("/scans/a.pdf", "a.pdf", None),
            "/scans/imported/a.pdf"
        );
    }

    #[test]
    fn test_move_destination_custom_subfolder() {
        assert_eq!(
            move_destination("/scans/a.pdf", "a.pdf", Some("done")),
            "/scans/done/a.pdf"
        );
        // Empty string falls back to the default.
        assert_eq!(
            move_destination("/scans/a.pdf", "a.pdf", Some("")),
            "/scans/imported/a.pdf"
        );
    }

    #[test]
    fn test_move_destination_root_file() {
        assert_eq!(
            move_destination("/a.pdf", "a.pdf", None),
            "/imported/a.pdf"
        );
    }

    #[test]
    fn test_move_destination_nested() {
        assert_eq!(
            move_destination("/scans/2024/q1/a.pdf", "a.pdf", None),
            "/scans/2024/q1/imported/a.pdf"
        );
    }
}
