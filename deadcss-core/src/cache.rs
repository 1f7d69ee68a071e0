//! Read-once source cache with SHA-256 fingerprints.
//!
//! Every file is read from disk at most once per run; later lookups share
//! the same `Arc<str>`. The content hash taken at read time lets the fix
//! step refuse to overwrite a stylesheet that was modified by someone else
//! between reading and writing.
//!
//! The cache lives for a single run and is shared across Rayon workers
//! behind a mutex. File reads happen outside the lock.

use crate::error::{DeadcssError, DeadcssResult, IoResultExt};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

/// Maximum file size to read (10 MB).
/// Larger files are skipped rather than pruned.
const MAX_FILE_SIZE: u64 = 10_000_000;

/// A file's content as first read, plus its hash.
#[derive(Debug, Clone)]
pub struct CachedSource {
    pub text: Arc<str>,
    pub hash: String,
}

/// Compute SHA-256 hash from bytes (in-memory, no I/O).
#[inline]
pub fn hash_bytes(bytes: &[u8]) -> String {
    let mut sha = Sha256::new();
    sha.update(bytes);
    format!("{:x}", sha.finalize())
}

/// Compute SHA-256 hash of a file on disk.
pub fn file_hash(path: &Path) -> DeadcssResult<String> {
    let bytes = fs::read(path).with_path(path)?;
    Ok(hash_bytes(&bytes))
}

/// Memoizing reader shared by all workers of a run.
#[derive(Debug, Default)]
pub struct SourceCache {
    entries: Mutex<HashMap<PathBuf, CachedSource>>,
}

impl SourceCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<PathBuf, CachedSource>> {
        // A panicking worker cannot leave the map half-updated; keep using it.
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Returns the file's text, reading it on first access.
    pub fn read(&self, path: &Path) -> DeadcssResult<Arc<str>> {
        if let Some(hit) = self.lock().get(path) {
            return Ok(Arc::clone(&hit.text));
        }

        let size = fs::metadata(path).with_path(path)?.len();
        if size > MAX_FILE_SIZE {
            return Err(DeadcssError::parse(
                path,
                format!("file is {} bytes, above the {} byte limit", size, MAX_FILE_SIZE),
            ));
        }

        let text = fs::read_to_string(path).with_path(path)?;
        let entry = CachedSource {
            hash: hash_bytes(text.as_bytes()),
            text: Arc::from(text),
        };

        // Another worker may have raced us; the first insert wins.
        let mut entries = self.lock();
        let cached = entries.entry(path.to_path_buf()).or_insert(entry);
        Ok(Arc::clone(&cached.text))
    }

    /// Hash recorded when the file was first read.
    pub fn fingerprint(&self, path: &Path) -> Option<String> {
        self.lock().get(path).map(|entry| entry.hash.clone())
    }

    /// Whether the file on disk still matches what was read.
    ///
    /// Files never read through the cache are reported as changed.
    pub fn is_unchanged(&self, path: &Path) -> DeadcssResult<bool> {
        let Some(expected) = self.fingerprint(path) else {
            return Ok(false);
        };
        Ok(file_hash(path)? == expected)
    }

    /// Number of distinct files read so far.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    static TEST_COUNTER: AtomicU64 = AtomicU64::new(0);

    fn create_temp_dir(name: &str) -> PathBuf {
        let id = TEST_COUNTER.fetch_add(1, Ordering::SeqCst);
        let dir = std::env::temp_dir()
            .join("deadcss_cache_test")
            .join(format!("{}_{}_{}", name, std::process::id(), id));
        if dir.exists() {
            fs::remove_dir_all(&dir).ok();
        }
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_hash_bytes_deterministic() {
        let content = b".a { color: red }";
        let hash1 = hash_bytes(content);
        let hash2 = hash_bytes(content);
        assert_eq!(hash1, hash2);
        // SHA-256 produces 64 hex characters
        assert_eq!(hash1.len(), 64);
    }

    #[test]
    fn test_read_is_memoized() {
        let dir = create_temp_dir("memo");
        let file = dir.join("a.css");
        fs::write(&file, ".a{}").unwrap();

        let cache = SourceCache::new();
        let first = cache.read(&file).unwrap();

        // Later disk changes are not observed by read()
        fs::write(&file, ".b{}").unwrap();
        let second = cache.read(&file).unwrap();

        assert_eq!(&*first, ".a{}");
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_is_unchanged_detects_edits() {
        let dir = create_temp_dir("unchanged");
        let file = dir.join("a.css");
        fs::write(&file, ".a{}").unwrap();

        let cache = SourceCache::new();
        cache.read(&file).unwrap();
        assert!(cache.is_unchanged(&file).unwrap());
        assert_eq!(cache.fingerprint(&file), Some(hash_bytes(b".a{}")));

        fs::write(&file, ".a{} .b{}").unwrap();
        assert!(!cache.is_unchanged(&file).unwrap());

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_unread_file_counts_as_changed() {
        let dir = create_temp_dir("unread");
        let file = dir.join("a.css");
        fs::write(&file, "").unwrap();

        let cache = SourceCache::new();
        assert!(!cache.is_unchanged(&file).unwrap());
        assert!(cache.is_empty());

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_read_missing_file_is_io_error() {
        let dir = create_temp_dir("missing");
        let cache = SourceCache::new();
        let err = cache.read(&dir.join("nope.css")).unwrap_err();
        assert!(matches!(err, DeadcssError::Io { .. }));
    }
}
