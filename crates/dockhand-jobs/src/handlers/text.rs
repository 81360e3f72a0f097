//! Text extraction: embedded text first, OCR service fallback.
//!
//! The OCR fallback speaks a shared-directory protocol with an external
//! worker: drop `<job_id>.pdf` into the input directory, poll the output
//! directory for `<job_id>.txt`, clean up both sides. The input copy is
//! removed on every exit path so the OCR inbox never accumulates strays.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tokio::fs;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use dockhand_core::defaults::{MIN_TEXT_LENGTH, OCR_POLL_INTERVAL_MS, OCR_TIMEOUT_SECS};
use dockhand_core::{Error, Result};

/// How the text was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextMethod {
    Embedded,
    Ocr,
}

impl TextMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Embedded => "embedded",
            Self::Ocr => "ocr",
        }
    }
}

/// Extracts text from PDFs.
pub struct TextExtractor {
    min_text_length: usize,
    ocr_input_dir: PathBuf,
    ocr_output_dir: PathBuf,
    ocr_timeout: Duration,
}

impl TextExtractor {
    /// The OCR directories are the mount points shared with the OCR worker.
    pub fn new(ocr_input_dir: impl Into<PathBuf>, ocr_output_dir: impl Into<PathBuf>) -> Self {
        Self {
            min_text_length: MIN_TEXT_LENGTH,
            ocr_input_dir: ocr_input_dir.into(),
            ocr_output_dir: ocr_output_dir.into(),
            ocr_timeout: Duration::from_secs(OCR_TIMEOUT_SECS),
        }
    }

    pub fn with_ocr_timeout(mut self, timeout: Duration) -> Self {
        self.ocr_timeout = timeout;
        self
    }

    /// Extract text, returning the content and the method used.
    pub async fn extract(
        &self,
        cancel: &CancellationToken,
        pdf_path: &Path,
    ) -> Result<(String, TextMethod)> {
        let start = Instant::now();

        match self.extract_embedded(pdf_path).await {
            Ok(text) if trimmed_len(&text) >= self.min_text_length => {
                info!(
                    pdf_path = %pdf_path.display(),
                    text_length = text.len(),
                    duration_ms = start.elapsed().as_millis() as u64,
                    "extracted embedded text"
                );
                return Ok((text, TextMethod::Embedded));
            }
            Ok(text) => {
                info!(
                    pdf_path = %pdf_path.display(),
                    embedded_length = text.len(),
                    "insufficient embedded text, falling back to OCR"
                );
            }
            Err(e) => {
                warn!(
                    pdf_path = %pdf_path.display(),
                    error = %e,
                    "embedded text extraction failed, falling back to OCR"
                );
            }
        }

        let text = self.ocr_via_service(cancel, pdf_path).await?;
        info!(
            pdf_path = %pdf_path.display(),
            text_length = text.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "extracted text via OCR"
        );
        Ok((text, TextMethod::Ocr))
    }

    /// Parse the PDF and pull embedded text. CPU-bound, so it runs on the
    /// blocking pool.
    async fn extract_embedded(&self, pdf_path: &Path) -> Result<String> {
        let path = pdf_path.to_path_buf();
        tokio::task::spawn_blocking(move || {
            pdf_extract::extract_text(&path)
                .map_err(|e| Error::InvalidInput(format!("parse pdf: {e}")))
        })
        .await
        .map_err(|e| Error::Internal(format!("extraction task panicked: {e}")))?
    }

    /// Hand the PDF to the OCR worker and poll for its output.
    async fn ocr_via_service(&self, cancel: &CancellationToken, pdf_path: &Path) -> Result<String> {
        let job_id = Uuid::new_v4().to_string();

        let input_path = self.ocr_input_dir.join(format!("{job_id}.pdf"));
        let output_text_path = self.ocr_output_dir.join(format!("{job_id}.txt"));
        let output_pdf_path = self.ocr_output_dir.join(format!("{job_id}.pdf"));

        fs::create_dir_all(&self.ocr_input_dir).await?;
        fs::copy(pdf_path, &input_path).await?;

        let result = self
            .poll_for_output(cancel, &output_text_path, &output_pdf_path)
            .await;

        // The input copy must go regardless of outcome.
        let _ = fs::remove_file(&input_path).await;

        result
    }

    async fn poll_for_output(
        &self,
        cancel: &CancellationToken,
        output_text_path: &Path,
        output_pdf_path: &Path,
    ) -> Result<String> {
        let deadline = tokio::time::Instant::now() + self.ocr_timeout;
        let mut ticker = tokio::time::interval(Duration::from_millis(OCR_POLL_INTERVAL_MS));

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    return Err(Error::Canceled("ocr wait cancelled".into()));
                }
                _ = tokio::time::sleep_until(deadline) => {
                    return Err(Error::Internal(format!(
                        "OCR timeout waiting for output after {:?}",
                        self.ocr_timeout
                    )));
                }
                _ = ticker.tick() => {
                    if fs::metadata(output_text_path).await.is_ok() {
                        let text = fs::read_to_string(output_text_path).await?;
                        let _ = fs::remove_file(output_text_path).await;
                        let _ = fs::remove_file(output_pdf_path).await;
                        return Ok(text);
                    }
                }
            }
        }
    }
}

fn trimmed_len(text: &str) -> usize {
    text.trim().len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn extractor(dir: &TempDir) -> TextExtractor {
        TextExtractor::new(dir.path().join("ocr-input"), dir.path().join("ocr-output"))
    }

    #[test]
    fn test_method_strings() {
        assert_eq!(TextMethod::Embedded.as_str(), "embedded");
        assert_eq!(TextMethod::Ocr.as_str(), "ocr");
    }

    #[test]
    fn test_trimmed_len_ignores_whitespace() {
        assert_eq!(trimmed_len("  abc  \n"), 3);
        assert_eq!(trimmed_len("   \n\t"), 0);
    }

    #[tokio::test]
    async fn test_ocr_round_trip_via_shared_directories() {
        let dir = TempDir::new().unwrap();
        let extractor = extractor(&dir).with_ocr_timeout(Duration::from_secs(5));

        let pdf = dir.path().join("scan.pdf");
        fs::write(&pdf, b"%PDF-1.4 scanned").await.unwrap();

        let input_dir = dir.path().join("ocr-input");
        let output_dir = dir.path().join("ocr-output");
        fs::create_dir_all(&output_dir).await.unwrap();

        // Simulate the OCR worker: wait for the input drop, then write the
        // matching output text file.
        let worker_input = input_dir.clone();
        let worker_output = output_dir.clone();
        let worker = tokio::spawn(async move {
            loop {
                tokio::time::sleep(Duration::from_millis(50)).await;
                let Ok(mut entries) = fs::read_dir(&worker_input).await else {
                    continue;
                };
                if let Ok(Some(entry)) = entries.next_entry().await {
                    let name = entry.file_name();
                    let stem = Path::new(&name).file_stem().unwrap().to_owned();
                    let out = worker_output.join(format!("{}.txt", stem.to_string_lossy()));
                    fs::write(&out, "recognized text").await.unwrap();
                    return;
                }
            }
        });

        let cancel = CancellationToken::new();
        let text = extractor.ocr_via_service(&cancel, &pdf).await.unwrap();
        assert_eq!(text, "recognized text");
        worker.await.unwrap();

        // Both sides were cleaned up.
        let mut inputs = fs::read_dir(&input_dir).await.unwrap();
        assert!(inputs.next_entry().await.unwrap().is_none());
        let mut outputs = fs::read_dir(&output_dir).await.unwrap();
        assert!(outputs.next_entry().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_ocr_timeout_removes_input() {
        let dir = TempDir::new().unwrap();
        let extractor = extractor(&dir).with_ocr_timeout(Duration::from_millis(100));

        let pdf = dir.path().join("scan.pdf");
        fs::write(&pdf, b"%PDF-1.4 scanned").await.unwrap();

        let cancel = CancellationToken::new();
        let result = extractor.ocr_via_service(&cancel, &pdf).await;
        assert!(result.is_err());

        // No stray input left for the OCR worker.
        let mut inputs = fs::read_dir(dir.path().join("ocr-input")).await.unwrap();
        assert!(inputs.next_entry().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_ocr_cancel_returns_promptly() {
        let dir = TempDir::new().unwrap();
        let extractor = extractor(&dir).with_ocr_timeout(Duration::from_secs(60));

        let pdf = dir.path().join("scan.pdf");
        fs::write(&pdf, b"%PDF-1.4 scanned").await.unwrap();

        let cancel = CancellationToken::new();
        cancel.cancel();

        let start = Instant::now();
        let result = extractor.ocr_via_service(&cancel, &pdf).await;
        assert!(matches!(result, Err(Error::Canceled(_))));
        assert!(start.elapsed() < Duration::from_secs(5));
    }
}
