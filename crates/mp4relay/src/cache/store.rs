//! # Cache Store
//!
//! File-based persistent store for complete videos. Size accounting and
//! recency both come straight from filesystem metadata: an entry's mtime
//! is its last-access timestamp and the only eviction signal.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use filetime::FileTime;
use tokio::fs;
use tokio::io;
use tracing::{debug, warn};

/// Suffix for committed entries.
const ENTRY_EXT: &str = "mp4";
/// Suffix for in-progress staging files, never mistaken for an entry.
const STAGING_EXT: &str = "part";

#[derive(Debug, Clone)]
pub struct CacheStore {
    cache_dir: PathBuf,
}

impl CacheStore {
    /// Open a store over the given directory, creating it if missing.
    pub async fn open(cache_dir: impl Into<PathBuf>) -> io::Result<Self> {
        let cache_dir = cache_dir.into();
        fs::create_dir_all(&cache_dir).await?;
        Ok(Self { cache_dir })
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Canonical path of the committed entry for a key.
    pub fn entry_path(&self, key: &str) -> PathBuf {
        self.cache_dir.join(format!("{key}.{ENTRY_EXT}"))
    }

    /// Path of the staging file for a key.
    pub fn staging_path(&self, key: &str) -> PathBuf {
        self.cache_dir.join(format!("{key}.{STAGING_EXT}"))
    }

    /// Whether a committed entry exists for the key.
    pub async fn exists(&self, key: &str) -> io::Result<bool> {
        fs::try_exists(self.entry_path(key)).await
    }

    /// Byte length of the committed entry. Only meaningful if it exists.
    pub async fn size_of(&self, key: &str) -> io::Result<u64> {
        let meta = fs::metadata(self.entry_path(key)).await?;
        Ok(meta.len())
    }

    /// Refresh the entry's last-access timestamp to now.
    ///
    /// The mtime is the sole recency signal; there is no access counter.
    /// Content and size are untouched.
    pub async fn touch(&self, key: &str) -> io::Result<()> {
        let path = self.entry_path(key);
        // Blocking syscall, keep it off the async threads
        tokio::task::spawn_blocking(move || {
            let now = FileTime::now();
            filetime::set_file_times(&path, now, now)
        })
        .await
        .map_err(io::Error::other)?
    }

    /// Sum of sizes of all committed entries, recomputed by full
    /// enumeration on each call.
    pub async fn total_size(&self) -> io::Result<u64> {
        let mut total = 0u64;
        for (_, size, _) in self.scan_entries().await? {
            total += size;
        }
        Ok(total)
    }

    /// Enumerate committed entries as `(path, size, mtime)` triples.
    async fn scan_entries(&self) -> io::Result<Vec<(PathBuf, u64, SystemTime)>> {
        let mut entries = Vec::new();
        let mut dir = fs::read_dir(&self.cache_dir).await?;
        while let Some(entry) = dir.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(ENTRY_EXT) {
                continue;
            }
            // Entries can vanish mid-scan; skip them
            let meta = match entry.metadata().await {
                Ok(meta) if meta.is_file() => meta,
                Ok(_) => continue,
                Err(_) => continue,
            };
            let mtime = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
            entries.push((path, meta.len(), mtime));
        }
        Ok(entries)
    }

    /// Delete least-recently-touched entries until the store fits in
    /// `max_bytes`. Best-effort: deletion failures are skipped, never
    /// fatal, and the pass continues with the next candidate.
    pub async fn evict_if_needed(&self, max_bytes: u64) -> io::Result<()> {
        let mut entries = self.scan_entries().await?;
        let mut total: u64 = entries.iter().map(|(_, size, _)| *size).sum();
        if total <= max_bytes {
            return Ok(());
        }

        entries.sort_by_key(|(_, _, mtime)| *mtime);

        for (path, size, _) in entries {
            match fs::remove_file(&path).await {
                Ok(()) => {
                    debug!(path = ?path, size, "Evicted cache entry");
                    total = total.saturating_sub(size);
                }
                Err(e) => {
                    warn!(path = ?path, error = %e, "Failed to evict cache entry, skipping");
                }
            }
            if total <= max_bytes {
                break;
            }
        }

        Ok(())
    }

    /// Promote or discard a finished staging file.
    ///
    /// The staging file becomes the canonical entry through a single
    /// atomic rename iff the byte count written matches the declared
    /// length and that length is positive; otherwise it is deleted.
    /// Returns whether the entry was committed.
    pub async fn commit_staging(
        &self,
        key: &str,
        expected_len: u64,
        written_len: u64,
    ) -> io::Result<bool> {
        let staging = self.staging_path(key);

        if written_len == expected_len && expected_len > 0 {
            fs::rename(&staging, self.entry_path(key)).await?;
            debug!(key, bytes = written_len, "Committed staging file to cache");
            return Ok(true);
        }

        debug!(
            key,
            expected = expected_len,
            written = written_len,
            "Discarding incomplete staging file"
        );
        match fs::remove_file(&staging).await {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
        Ok(false)
    }

    /// Remove the staging file for a key, tolerating its absence.
    pub async fn discard_staging(&self, key: &str) -> io::Result<()> {
        match fs::remove_file(self.staging_path(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}
