//! Watched local inbox directories.
//!
//! Every enabled inbox row gets a filesystem watch; create/write events are
//! debounced per path and stable files flow into the ingest service under a
//! shared concurrency cap. Inbox CRUD reconciles the watched set at runtime.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex as StdMutex, RwLock};
use std::time::Duration;

use chrono::Local;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::fs;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use dockhand_core::defaults::{DEBOUNCE_DELAY_MS, ERROR_SUBDIR, SOURCE_MAX_CONCURRENT};
use dockhand_core::models::source_actions;
use dockhand_core::{DuplicateAction, Error, Inbox, Result};
use dockhand_db::Database;
use dockhand_ingest::validate::{has_pdf_extension, is_pdf_file};
use dockhand_ingest::DocumentService;

use crate::debounce::Debouncer;

/// Event channel depth between the notify thread and the async loop.
const EVENT_BUFFER: usize = 256;

/// Coordinates inbox watching and document ingestion.
#[derive(Clone)]
pub struct InboxService {
    db: Database,
    documents: DocumentService,
    default_inbox_path: Option<PathBuf>,
    watching: Arc<RwLock<HashMap<Uuid, PathBuf>>>,
    watcher: Arc<StdMutex<Option<RecommendedWatcher>>>,
    semaphore: Arc<Semaphore>,
}

impl InboxService {
    pub fn new(db: Database, documents: DocumentService, default_inbox_path: Option<PathBuf>) -> Self {
        Self {
            db,
            documents,
            default_inbox_path,
            watching: Arc::new(RwLock::new(HashMap::new())),
            watcher: Arc::new(StdMutex::new(None)),
            semaphore: Arc::new(Semaphore::new(SOURCE_MAX_CONCURRENT)),
        }
    }

    /// Create the default inbox, reconcile watches, scan for files already
    /// present, and start the event loop. The returned handle completes
    /// after the cancel token fires and the loop drains.
    pub async fn start(&self, cancel: CancellationToken) -> Result<JoinHandle<()>> {
        self.ensure_default_inbox().await?;

        let (raw_tx, raw_rx) = mpsc::channel::<Event>(EVENT_BUFFER);
        let watcher = RecommendedWatcher::new(
            move |result: notify::Result<Event>| match result {
                Ok(event) => {
                    let _ = raw_tx.blocking_send(event);
                }
                Err(e) => error!(error = %e, "watcher error"),
            },
            notify::Config::default(),
        )
        .map_err(|e| Error::Internal(format!("create watcher: {e}")))?;

        *self.watcher.lock().expect("watcher lock poisoned") = Some(watcher);

        self.refresh().await?;

        if let Err(e) = self.scan_all().await {
            warn!(error = %e, "error scanning inboxes on startup");
        }

        let service = self.clone();
        let handle = tokio::spawn(async move {
            service.event_loop(cancel, raw_rx).await;
        });

        info!(
            inboxes = self.watching.read().expect("watch lock poisoned").len(),
            "inbox service started"
        );
        Ok(handle)
    }

    async fn event_loop(&self, cancel: CancellationToken, mut raw_rx: mpsc::Receiver<Event>) {
        let (debouncer, mut stable_rx) =
            Debouncer::new(Duration::from_millis(DEBOUNCE_DELAY_MS), EVENT_BUFFER);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debouncer.cancel_all();
                    info!("inbox service stopped");
                    return;
                }
                event = raw_rx.recv() => {
                    let Some(event) = event else { return };
                    if !matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
                        continue;
                    }
                    for path in event.paths {
                        if has_pdf_extension(&path) {
                            debug!(path = %path.display(), "file event");
                            debouncer.debounce(path);
                        }
                    }
                }
                path = stable_rx.recv() => {
                    let Some(path) = path else { return };
                    debug!(path = %path.display(), "file stable, processing");
                    let service = self.clone();
                    tokio::spawn(async move {
                        service.handle_file(&path).await;
                    });
                }
            }
        }
    }

    /// Create the configured default inbox row on first start; idempotent
    /// across restarts.
    async fn ensure_default_inbox(&self) -> Result<()> {
        let Some(path) = &self.default_inbox_path else {
            return Ok(());
        };
        let path_str = path.display().to_string();

        if self.db.inboxes.get_by_path(&path_str).await?.is_some() {
            return Ok(());
        }

        self.db
            .inboxes
            .create("Default Inbox", &path_str, None, DuplicateAction::Delete, true)
            .await?;
        info!(path = %path_str, "created default inbox");
        Ok(())
    }

    /// Reconcile the watched set against the enabled inbox rows.
    pub async fn refresh(&self) -> Result<()> {
        let enabled = self.db.inboxes.list_enabled().await?;

        // Directory creation happens before the lock; watcher mutation under it.
        for inbox in &enabled {
            if let Err(e) = fs::create_dir_all(&inbox.path).await {
                warn!(path = %inbox.path, error = %e, "failed to create inbox directory");
            }
            if let Err(e) = fs::create_dir_all(error_dir(inbox)).await {
                warn!(path = %inbox.path, error = %e, "failed to create error directory");
            }
        }

        let enabled_map: HashMap<Uuid, PathBuf> = enabled
            .iter()
            .map(|i| (i.id, PathBuf::from(&i.path)))
            .collect();

        let mut watching = self.watching.write().expect("watch lock poisoned");
        let mut watcher_guard = self.watcher.lock().expect("watcher lock poisoned");
        let Some(watcher) = watcher_guard.as_mut() else {
            return Err(Error::Internal("inbox watcher not started".into()));
        };

        // Drop inboxes that were disabled or removed.
        let gone: Vec<Uuid> = watching
            .keys()
            .filter(|id| !enabled_map.contains_key(id))
            .copied()
            .collect();
        for id in gone {
            if let Some(path) = watching.remove(&id) {
                if let Err(e) = watcher.unwatch(&path) {
                    warn!(path = %path.display(), error = %e, "failed to unwatch inbox");
                }
                info!(path = %path.display(), "stopped watching directory");
            }
        }

        // Pick up newly enabled inboxes.
        for (id, path) in enabled_map {
            if watching.contains_key(&id) {
                continue;
            }
            match watcher.watch(&path, RecursiveMode::NonRecursive) {
                Ok(()) => {
                    info!(path = %path.display(), "watching directory");
                    watching.insert(id, path);
                }
                Err(e) => warn!(path = %path.display(), error = %e, "failed to watch inbox"),
            }
        }

        Ok(())
    }

    /// Process files already sitting in every enabled inbox.
    async fn scan_all(&self) -> Result<()> {
        for inbox in self.db.inboxes.list_enabled().await? {
            if let Err(e) = self.scan_directory(&inbox).await {
                warn!(path = %inbox.path, error = %e, "failed to scan inbox");
            }
        }
        Ok(())
    }

    async fn scan_directory(&self, inbox: &Inbox) -> Result<()> {
        let mut entries = fs::read_dir(&inbox.path).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if entry.file_type().await?.is_dir() || !has_pdf_extension(&path) {
                continue;
            }
            self.process_file(inbox, &path).await;
        }

        self.db.inboxes.update_status(inbox.id, None).await;
        Ok(())
    }

    /// Entry point for stable watcher events: resolve the owning inbox by
    /// parent directory, then process.
    async fn handle_file(&self, path: &Path) {
        let Some(parent) = path.parent() else { return };

        let inbox_id = {
            let watching = self.watching.read().expect("watch lock poisoned");
            watching
                .iter()
                .find(|(_, watched)| watched.as_path() == parent)
                .map(|(id, _)| *id)
        };

        let Some(inbox_id) = inbox_id else {
            warn!(path = %path.display(), "inbox not found for file");
            return;
        };

        match self.db.inboxes.get(inbox_id).await {
            Ok(inbox) => self.process_file(&inbox, path).await,
            Err(e) => warn!(inbox_id = %inbox_id, error = %e, "failed to load inbox"),
        }
    }

    /// Validate, ingest, and dispose of one file.
    async fn process_file(&self, inbox: &Inbox, path: &Path) {
        let _permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .expect("semaphore closed");

        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        debug!(path = %path.display(), inbox = %inbox.name, "processing file");

        match is_pdf_file(path).await {
            Ok(true) => {}
            Ok(false) => {
                info!(path = %path.display(), "file is not a valid PDF");
                self.handle_error(
                    inbox,
                    path,
                    &filename,
                    source_actions::INVALID,
                    "not a valid PDF file",
                )
                .await;
                return;
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to validate file");
                self.handle_error(
                    inbox,
                    path,
                    &filename,
                    source_actions::ERROR,
                    &format!("validation failed: {e}"),
                )
                .await;
                return;
            }
        }

        match self.documents.ingest(path, &filename).await {
            Ok((document, true)) => {
                self.handle_duplicate(inbox, path, &filename, document.id).await;
            }
            Ok((document, false)) => {
                // Imported: the inbox copy is no longer needed.
                if let Err(e) = fs::remove_file(path).await {
                    warn!(path = %path.display(), error = %e, "failed to delete imported file");
                }
                self.db
                    .inboxes
                    .log_event(
                        inbox.id,
                        &filename,
                        source_actions::IMPORTED,
                        Some(document.id),
                        None,
                    )
                    .await;
                self.db.inboxes.update_status(inbox.id, None).await;
                info!(
                    filename = %filename,
                    document_id = %document.id,
                    inbox = %inbox.name,
                    "file imported"
                );
            }
            Err(e) => {
                error!(path = %path.display(), error = %e, "failed to ingest document");
                self.handle_error(
                    inbox,
                    path,
                    &filename,
                    source_actions::ERROR,
                    &format!("ingestion failed: {e}"),
                )
                .await;
            }
        }
    }

    /// Honor the inbox's duplicate policy and log the occurrence.
    async fn handle_duplicate(
        &self,
        inbox: &Inbox,
        path: &Path,
        filename: &str,
        existing_id: Uuid,
    ) {
        match inbox.duplicate_action {
            DuplicateAction::Delete => {
                if let Err(e) = fs::remove_file(path).await {
                    warn!(path = %path.display(), error = %e, "failed to delete duplicate file");
                }
                self.db
                    .inboxes
                    .log_event(
                        inbox.id,
                        filename,
                        source_actions::DUPLICATE,
                        Some(existing_id),
                        None,
                    )
                    .await;
                info!(filename, existing_id = %existing_id, "duplicate file deleted");
            }
            DuplicateAction::Rename => {
                let renamed = timestamped_path(path);
                if let Err(e) = fs::rename(path, &renamed).await {
                    warn!(path = %path.display(), error = %e, "failed to rename duplicate file");
                    return;
                }
                self.db
                    .inboxes
                    .log_event(
                        inbox.id,
                        filename,
                        source_actions::DUPLICATE,
                        Some(existing_id),
                        Some("duplicate - renamed"),
                    )
                    .await;
                info!(filename, new_path = %renamed.display(), "duplicate file renamed");
            }
            DuplicateAction::Skip => {
                self.db
                    .inboxes
                    .log_event(
                        inbox.id,
                        filename,
                        source_actions::DUPLICATE,
                        Some(existing_id),
                        Some("duplicate - skipped"),
                    )
                    .await;
                info!(filename, "duplicate file skipped");
            }
        }
    }

    /// Move a failed file to the inbox's error directory and record it.
    async fn handle_error(
        &self,
        inbox: &Inbox,
        path: &Path,
        filename: &str,
        action: &str,
        message: &str,
    ) {
        let dest = unique_destination(&error_dir(inbox).join(filename)).await;

        if let Err(e) = fs::rename(path, &dest).await {
            error!(
                source = %path.display(),
                dest = %dest.display(),
                error = %e,
                "failed to move file to error directory"
            );
            return;
        }

        self.db
            .inboxes
            .log_event(inbox.id, filename, action, None, Some(message))
            .await;
        self.db.inboxes.update_status(inbox.id, Some(message)).await;

        info!(filename, dest = %dest.display(), error = message, "file moved to error directory");
    }
}

/// Error directory for an inbox: explicit override or `errors/` inside it.
fn error_dir(inbox: &Inbox) -> PathBuf {
    match inbox.error_path.as_deref() {
        Some(path) if !path.is_empty() => PathBuf::from(path),
        _ => Path::new(&inbox.path).join(ERROR_SUBDIR),
    }
}

/// Append a `_YYYYMMDD-HHMMSS` suffix before the extension.
fn timestamped_path(path: &Path) -> PathBuf {
    let dir = path.parent().unwrap_or_else(|| Path::new(""));
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    let timestamp = Local::now().format("%Y%m%d-%H%M%S");
    dir.join(format!("{stem}_{timestamp}{ext}"))
}

/// Use the path as-is when free; timestamp it on collision.
async fn unique_destination(path: &Path) -> PathBuf {
    if fs::metadata(path).await.is_err() {
        path.to_path_buf()
    } else {
        timestamped_path(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn inbox_with(error_path: Option<&str>) -> Inbox {
        Inbox {
            id: Uuid::new_v4(),
            name: "test".into(),
            path: "/inbox".into(),
            error_path: error_path.map(String::from),
            enabled: true,
            duplicate_action: DuplicateAction::Delete,
            last_scan_at: None,
            last_error: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_error_dir_default_subdir() {
        assert_eq!(error_dir(&inbox_with(None)), PathBuf::from("/inbox/errors"));
        assert_eq!(error_dir(&inbox_with(Some(""))), PathBuf::from("/inbox/errors"));
    }

    #[test]
    fn test_error_dir_override() {
        assert_eq!(
            error_dir(&inbox_with(Some("/quarantine"))),
            PathBuf::from("/quarantine")
        );
    }

    #[test]
    fn test_timestamped_path_keeps_extension() {
        let renamed = timestamped_path(Path::new("/inbox/x.pdf"));
        let name = renamed.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("x_"));
        assert!(name.ends_with(".pdf"));
        assert_eq!(renamed.parent(), Some(Path::new("/inbox")));
        // x_YYYYMMDD-HHMMSS.pdf
        assert_eq!(name.len(), "x_".len() + 15 + ".pdf".len());
    }

    #[test]
    fn test_timestamped_path_no_extension() {
        let renamed = timestamped_path(Path::new("/inbox/report"));
        let name = renamed.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("report_"));
        assert!(!name.contains('.'));
    }

    #[tokio::test]
    async fn test_unique_destination_prefers_original() {
        let dir = tempfile::TempDir::new().unwrap();
        let target = dir.path().join("a.pdf");
        assert_eq!(unique_destination(&target).await, target);

        fs::write(&target, b"x").await.unwrap();
        let collided = unique_destination(&target).await;
        assert_ne!(collided, target);
        assert_eq!(collided.extension().unwrap(), "pdf");
    }
}
