//! Thumbnail rendering: first PDF page → PNG → WebP.
//!
//! Rasterization failures mean a corrupt or encrypted PDF; those get the
//! placeholder image so the catalog shows a badge instead of a broken
//! image. An encoder failure with a good PNG on disk indicates environment
//! breakage and propagates.

use std::path::{Path, PathBuf};
use std::process::Output;
use std::time::{Duration, Instant};

use tokio::fs;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use dockhand_core::defaults::{THUMBNAIL_TIMEOUT_SECS, THUMBNAIL_WIDTH, WEBP_QUALITY};
use dockhand_core::{Error, Result};
use dockhand_storage::{Category, Storage};

/// Generates WebP thumbnails from the first page of a PDF.
pub struct ThumbnailGenerator {
    storage: Storage,
    placeholder_path: PathBuf,
}

impl ThumbnailGenerator {
    /// `placeholder_path` points at the fallback WebP used for unrenderable
    /// PDFs.
    pub fn new(storage: Storage, placeholder_path: impl Into<PathBuf>) -> Self {
        Self {
            storage,
            placeholder_path: placeholder_path.into(),
        }
    }

    /// Render a thumbnail to its derived storage path and return that path.
    pub async fn generate(
        &self,
        cancel: &CancellationToken,
        pdf_path: &Path,
        document_id: Uuid,
    ) -> Result<PathBuf> {
        let start = Instant::now();
        let deadline = start + Duration::from_secs(THUMBNAIL_TIMEOUT_SECS);

        let thumb_path = self
            .storage
            .path_for(Category::Thumbnails, document_id, ".webp");
        if let Some(parent) = thumb_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let tmp_dir = tempfile::tempdir()?;
        let png_prefix = tmp_dir.path().join("thumb");

        // Single-file output for page 1 only, scaled to the catalog width.
        let mut rasterize = Command::new("pdftoppm");
        rasterize
            .arg("-png")
            .arg("-f")
            .arg("1")
            .arg("-singlefile")
            .arg("-scale-to")
            .arg(THUMBNAIL_WIDTH.to_string())
            .arg(pdf_path)
            .arg(&png_prefix);

        let rasterized = run_command(cancel, deadline, rasterize).await;

        let png_path = png_prefix.with_extension("png");
        let rendered = match rasterized {
            Err(e @ Error::Canceled(_)) => return Err(e),
            Err(e) => {
                warn!(document_id = %document_id, error = %e, "pdftoppm failed, using placeholder");
                false
            }
            Ok(output) if !output.status.success() => {
                warn!(
                    document_id = %document_id,
                    stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                    "pdftoppm failed, using placeholder"
                );
                false
            }
            // A clean exit can still produce nothing for odd PDFs.
            Ok(_) => fs::metadata(&png_path).await.is_ok(),
        };

        if !rendered {
            self.use_placeholder(&thumb_path).await?;
            info!(
                document_id = %document_id,
                path = %thumb_path.display(),
                duration_ms = start.elapsed().as_millis() as u64,
                "thumbnail generated (placeholder)"
            );
            return Ok(thumb_path);
        }

        let mut encode = Command::new("cwebp");
        encode
            .arg("-q")
            .arg(WEBP_QUALITY.to_string())
            .arg(&png_path)
            .arg("-o")
            .arg(&thumb_path);

        let encoded = run_command(cancel, deadline, encode).await?;
        if !encoded.status.success() {
            // The PNG exists, so this is environment breakage, not bad input.
            return Err(Error::Internal(format!(
                "cwebp failed (exit {}): {}",
                encoded.status,
                String::from_utf8_lossy(&encoded.stderr).trim()
            )));
        }

        info!(
            document_id = %document_id,
            path = %thumb_path.display(),
            duration_ms = start.elapsed().as_millis() as u64,
            "thumbnail generated"
        );
        Ok(thumb_path)
    }

    /// Copy the configured placeholder into the thumbnail slot.
    async fn use_placeholder(&self, thumb_path: &Path) -> Result<()> {
        if self.placeholder_path.as_os_str().is_empty() {
            return Err(Error::Config("no placeholder path configured".into()));
        }

        fs::copy(&self.placeholder_path, thumb_path)
            .await
            .map_err(|e| {
                Error::Internal(format!(
                    "placeholder copy failed from {}: {e}",
                    self.placeholder_path.display()
                ))
            })?;
        Ok(())
    }
}

/// Run a subprocess bounded by the shared deadline and cancel signal.
async fn run_command(
    cancel: &CancellationToken,
    deadline: Instant,
    mut command: Command,
) -> Result<Output> {
    let remaining = deadline
        .checked_duration_since(Instant::now())
        .ok_or_else(|| Error::Internal("thumbnail deadline exceeded".into()))?;

    command.kill_on_drop(true);

    tokio::select! {
        _ = cancel.cancelled() => Err(Error::Canceled("thumbnail rendering cancelled".into())),
        result = tokio::time::timeout(remaining, command.output()) => match result {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(e)) => Err(Error::Internal(format!("failed to execute command: {e}"))),
            Err(_) => Err(Error::Internal(format!(
                "external command timed out after {remaining:?}"
            ))),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_placeholder_copy() {
        let dir = TempDir::new().unwrap();
        let storage = Storage::new(dir.path().join("store")).unwrap();

        let placeholder = dir.path().join("placeholder.webp");
        fs::write(&placeholder, b"RIFFwebp").await.unwrap();

        let generator = ThumbnailGenerator::new(storage, &placeholder);
        let target = dir.path().join("out.webp");
        generator.use_placeholder(&target).await.unwrap();

        assert_eq!(fs::read(&target).await.unwrap(), b"RIFFwebp");
    }

    #[tokio::test]
    async fn test_placeholder_missing_is_error() {
        let dir = TempDir::new().unwrap();
        let storage = Storage::new(dir.path().join("store")).unwrap();

        let generator = ThumbnailGenerator::new(storage, dir.path().join("missing.webp"));
        let target = dir.path().join("out.webp");
        assert!(generator.use_placeholder(&target).await.is_err());
    }

    #[tokio::test]
    async fn test_placeholder_unconfigured_is_error() {
        let dir = TempDir::new().unwrap();
        let storage = Storage::new(dir.path().join("store")).unwrap();

        let generator = ThumbnailGenerator::new(storage, "");
        let target = dir.path().join("out.webp");
        assert!(matches!(
            generator.use_placeholder(&target).await,
            Err(Error::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_run_command_respects_cancel() {
        let cancel = CancellationToken::new();
        cancel.cancel();

        let mut command = Command::new("sleep");
        command.arg("30");

        let deadline = Instant::now() + Duration::from_secs(60);
        let result = run_command(&cancel, deadline, command).await;
        assert!(matches!(result, Err(Error::Canceled(_))));
    }

    #[tokio::test]
    async fn test_run_command_expired_deadline() {
        let cancel = CancellationToken::new();
        let command = Command::new("true");

        let deadline = Instant::now() - Duration::from_secs(1);
        let result = run_command(&cancel, deadline, command).await;
        assert!(result.is_err());
    }
}
