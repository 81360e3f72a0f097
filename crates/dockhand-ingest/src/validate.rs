//! PDF validation by magic bytes.
//!
//! Extensions are not trusted anywhere in the ingestion paths; every source
//! sniffs the first bytes before handing a file to the ingest service.

use std::path::Path;

use tokio::fs::File;
use tokio::io::AsyncReadExt;

use dockhand_core::defaults::MAGIC_SNIFF_LEN;
use dockhand_core::Result;

/// True when the buffer starts with a PDF signature.
pub fn is_pdf_bytes(head: &[u8]) -> bool {
    infer::is(head, "pdf")
}

/// Sniff a file's leading bytes and decide whether it is a PDF.
pub async fn is_pdf_file(path: &Path) -> Result<bool> {
    let mut file = File::open(path).await?;
    let mut head = vec![0u8; MAGIC_SNIFF_LEN];

    let mut filled = 0;
    while filled < head.len() {
        let n = file.read(&mut head[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }

    Ok(is_pdf_bytes(&head[..filled]))
}

/// Case-insensitive `.pdf` extension check, used to pre-filter directory
/// listings before the magic sniff.
pub fn has_pdf_extension(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_pdf_magic_bytes_accepted() {
        assert!(is_pdf_bytes(b"%PDF-1.7 rest of header"));
    }

    #[test]
    fn test_non_pdf_bytes_rejected() {
        assert!(!is_pdf_bytes(b"PK\x03\x04 this is a zip"));
        assert!(!is_pdf_bytes(b""));
    }

    #[test]
    fn test_extension_check_case_insensitive() {
        assert!(has_pdf_extension(Path::new("a.pdf")));
        assert!(has_pdf_extension(Path::new("b.PDF")));
        assert!(has_pdf_extension(Path::new("dir/c.Pdf")));
        assert!(!has_pdf_extension(Path::new("d.txt")));
        assert!(!has_pdf_extension(Path::new("pdf")));
    }

    #[tokio::test]
    async fn test_sniff_real_file() {
        let dir = TempDir::new().unwrap();

        let pdf = dir.path().join("x.pdf");
        tokio::fs::write(&pdf, b"%PDF-1.4 content").await.unwrap();
        assert!(is_pdf_file(&pdf).await.unwrap());

        // A renamed text file must not pass.
        let fake = dir.path().join("fake.pdf");
        tokio::fs::write(&fake, b"just text").await.unwrap();
        assert!(!is_pdf_file(&fake).await.unwrap());
    }

    #[tokio::test]
    async fn test_sniff_short_file() {
        let dir = TempDir::new().unwrap();
        let tiny = dir.path().join("tiny.pdf");
        tokio::fs::write(&tiny, b"%P").await.unwrap();
        assert!(!is_pdf_file(&tiny).await.unwrap());
    }
}
