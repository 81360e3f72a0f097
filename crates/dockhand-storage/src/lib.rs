//! # dockhand-storage
//!
//! Content-addressed file placement for originals, thumbnails, and extracted
//! text. Files shard into a two-level hex hierarchy derived from the owning
//! document UUID: `originals/ab/c1/abc12345-….pdf`. The database never
//! stores paths; they are always derived from `(category, uuid, ext)`.

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{debug, warn};
use uuid::Uuid;

use dockhand_core::{Error, Result};

/// Read/write buffer size for streaming copies.
const COPY_BUF_SIZE: usize = 64 * 1024;

/// Top-level object store category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Originals,
    Thumbnails,
    Text,
}

impl Category {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Originals => "originals",
            Self::Thumbnails => "thumbnails",
            Self::Text => "text",
        }
    }

    const ALL: [Category; 3] = [Self::Originals, Self::Thumbnails, Self::Text];
}

/// Filesystem object store rooted at a configured directory.
#[derive(Debug, Clone)]
pub struct Storage {
    root: PathBuf,
}

impl Storage {
    /// Create a storage handle. Call [`init`](Self::init) before first use.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        if root.as_os_str().is_empty() {
            return Err(Error::Config("storage root cannot be empty".into()));
        }
        Ok(Self { root })
    }

    /// Create the category directories and verify the root is writable with
    /// a write/read/delete round trip.
    pub async fn init(&self) -> Result<()> {
        for category in Category::ALL {
            fs::create_dir_all(self.root.join(category.as_str())).await?;
        }

        let probe = self.root.join(".health-check");
        fs::write(&probe, b"storage-health-check").await?;
        let read_back = fs::read(&probe).await?;
        if read_back != b"storage-health-check" {
            return Err(Error::Internal("storage read-back mismatch".into()));
        }
        let _ = fs::remove_file(&probe).await;

        Ok(())
    }

    /// Pure path derivation: `root/category/aa/bb/<uuid><ext>` where `aa`
    /// and `bb` are the first four hex characters of the UUID. `ext` must
    /// include its leading dot (or be empty).
    pub fn path_for(&self, category: Category, id: Uuid, ext: &str) -> PathBuf {
        let s = id.to_string();
        self.root
            .join(category.as_str())
            .join(&s[0..2])
            .join(&s[2..4])
            .join(format!("{s}{ext}"))
    }

    /// Stream `src` into `dst` while computing SHA-256.
    ///
    /// Creates parent directories and fsyncs before returning. On any
    /// failure the partial destination is removed. The returned hash is
    /// authoritative for deduplication; callers must place originals through
    /// this function before inserting a document row.
    pub async fn copy_and_hash(&self, dst: &Path, src: &Path) -> Result<(String, i64)> {
        if let Some(parent) = dst.parent() {
            fs::create_dir_all(parent).await?;
        }

        let result = self.copy_and_hash_inner(dst, src).await;
        if result.is_err() {
            let _ = fs::remove_file(dst).await;
        }
        result
    }

    async fn copy_and_hash_inner(&self, dst: &Path, src: &Path) -> Result<(String, i64)> {
        let mut input = fs::File::open(src).await?;
        let mut output = fs::File::create(dst).await?;

        let mut hasher = Sha256::new();
        let mut buf = vec![0u8; COPY_BUF_SIZE];
        let mut size: i64 = 0;

        loop {
            let n = input.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
            output.write_all(&buf[..n]).await?;
            size += n as i64;
        }

        output.sync_all().await?;

        let hash = hex_encode(&hasher.finalize());
        debug!(dst = %dst.display(), size, hash = %hash[..16], "stored object");
        Ok((hash, size))
    }

    /// SHA-256 of a file without copying it.
    pub async fn hash_file(&self, path: &Path) -> Result<String> {
        let mut input = fs::File::open(path).await?;
        let mut hasher = Sha256::new();
        let mut buf = vec![0u8; COPY_BUF_SIZE];

        loop {
            let n = input.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }

        Ok(hex_encode(&hasher.finalize()))
    }

    /// Idempotent best-effort removal.
    pub async fn delete(&self, path: &Path) {
        match fs::remove_file(path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %path.display(), error = %e, "failed to delete object"),
        }
    }

    /// Stat probe.
    pub async fn exists(&self, path: &Path) -> bool {
        fs::metadata(path).await.is_ok()
    }

    /// The configured storage root.
    pub fn root(&self) -> &Path {
        &self.root
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        s.push_str(&format!("{b:02x}"));
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn storage(dir: &TempDir) -> Storage {
        Storage::new(dir.path()).unwrap()
    }

    #[test]
    fn test_empty_root_rejected() {
        assert!(Storage::new("").is_err());
    }

    #[test]
    fn test_path_for_shards_by_uuid_prefix() {
        let dir = TempDir::new().unwrap();
        let s = storage(&dir);
        let id: Uuid = "abc12345-0000-4000-8000-000000000000".parse().unwrap();

        let path = s.path_for(Category::Originals, id, ".pdf");
        let expected = dir
            .path()
            .join("originals/ab/c1")
            .join(format!("{id}.pdf"));
        assert_eq!(path, expected);
    }

    #[test]
    fn test_path_for_is_pure() {
        let dir = TempDir::new().unwrap();
        let s = storage(&dir);
        let id = Uuid::new_v4();

        assert_eq!(
            s.path_for(Category::Thumbnails, id, ".webp"),
            s.path_for(Category::Thumbnails, id, ".webp")
        );
    }

    #[test]
    fn test_path_for_categories_do_not_collide() {
        let dir = TempDir::new().unwrap();
        let s = storage(&dir);
        let id = Uuid::new_v4();

        let a = s.path_for(Category::Originals, id, ".pdf");
        let b = s.path_for(Category::Text, id, ".txt");
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_init_creates_category_dirs() {
        let dir = TempDir::new().unwrap();
        let s = storage(&dir);
        s.init().await.unwrap();

        for cat in ["originals", "thumbnails", "text"] {
            assert!(dir.path().join(cat).is_dir());
        }
    }

    #[tokio::test]
    async fn test_copy_and_hash_known_digest() {
        let dir = TempDir::new().unwrap();
        let s = storage(&dir);

        let src = dir.path().join("src.bin");
        fs::write(&src, b"hello world").await.unwrap();

        let dst = s.path_for(Category::Originals, Uuid::new_v4(), ".pdf");
        let (hash, size) = s.copy_and_hash(&dst, &src).await.unwrap();

        assert_eq!(
            hash,
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
        assert_eq!(size, 11);
        assert!(s.exists(&dst).await);
        assert_eq!(fs::read(&dst).await.unwrap(), b"hello world");
    }

    #[tokio::test]
    async fn test_copy_and_hash_creates_parents() {
        let dir = TempDir::new().unwrap();
        let s = storage(&dir);

        let src = dir.path().join("src.bin");
        fs::write(&src, b"x").await.unwrap();

        let dst = s.path_for(Category::Originals, Uuid::new_v4(), ".pdf");
        assert!(!dst.parent().unwrap().exists());

        s.copy_and_hash(&dst, &src).await.unwrap();
        assert!(dst.parent().unwrap().is_dir());
    }

    #[tokio::test]
    async fn test_copy_and_hash_missing_source_leaves_no_partial() {
        let dir = TempDir::new().unwrap();
        let s = storage(&dir);

        let dst = s.path_for(Category::Originals, Uuid::new_v4(), ".pdf");
        let missing = dir.path().join("does-not-exist.pdf");

        assert!(s.copy_and_hash(&dst, &missing).await.is_err());
        assert!(!s.exists(&dst).await);
    }

    #[tokio::test]
    async fn test_hash_file_matches_copy_hash() {
        let dir = TempDir::new().unwrap();
        let s = storage(&dir);

        let src = dir.path().join("src.bin");
        fs::write(&src, b"identical bytes").await.unwrap();

        let dst = s.path_for(Category::Originals, Uuid::new_v4(), ".pdf");
        let (copied, _) = s.copy_and_hash(&dst, &src).await.unwrap();
        let direct = s.hash_file(&src).await.unwrap();

        assert_eq!(copied, direct);
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let s = storage(&dir);

        let path = dir.path().join("gone.bin");
        fs::write(&path, b"x").await.unwrap();

        s.delete(&path).await;
        assert!(!s.exists(&path).await);

        // Second delete of a missing file must not panic or warn loudly.
        s.delete(&path).await;
    }
}
