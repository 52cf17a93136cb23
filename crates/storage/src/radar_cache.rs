//! File-backed cache store with an atomically replaced "latest" record.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use radar_common::{RadarError, RadarResult};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

/// Rendered raster of the last successful render.
pub const LATEST_RASTER_FILE: &str = "latest.png";
/// UTC time of the last successful render.
pub const LATEST_TIMESTAMP_FILE: &str = "latest_meta.txt";
/// Format of the stored timestamp, e.g. "2025-06-01 12:04:31 UTC".
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S UTC";

#[derive(Debug, Default, Clone)]
pub struct CacheStats {
    /// Source lookups answered from disk.
    pub source_hits: u64,
    /// Source lookups that required a download.
    pub source_misses: u64,
    /// Successful "latest" commits.
    pub commits: u64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.source_hits + self.source_misses;
        if total == 0 {
            0.0
        } else {
            (self.source_hits as f64 / total as f64) * 100.0
        }
    }
}

/// Cache directory handle.
///
/// The raster and timestamp files are each replaced by rename, and the
/// `latest` lock makes the pair change together: readers never see a new
/// raster with an old timestamp or the reverse.
pub struct CacheStore {
    dir: PathBuf,
    latest: RwLock<()>,
    stats: Mutex<CacheStats>,
}

impl CacheStore {
    /// Open (creating if needed) a cache directory.
    pub async fn open(dir: impl Into<PathBuf>) -> RadarResult<Self> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await.map_err(|e| {
            RadarError::CacheIo(format!("cannot create cache dir {}: {}", dir.display(), e))
        })?;
        info!(cache_dir = %dir.display(), "Opened radar cache");
        Ok(Self {
            dir,
            latest: RwLock::new(()),
            stats: Mutex::new(CacheStats::default()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path for a compressed source file. Rejects names that would escape the directory.
    pub fn source_path(&self, basename: &str) -> RadarResult<PathBuf> {
        let valid = !basename.is_empty()
            && basename != "."
            && basename != ".."
            && !basename.contains(['/', '\\']);
        if !valid {
            return Err(RadarError::invalid_argument(format!(
                "invalid source file name {:?}",
                basename
            )));
        }
        Ok(self.dir.join(basename))
    }

    /// True when the compressed source is already on disk. Existence is the only check.
    pub async fn has_source(&self, basename: &str) -> RadarResult<bool> {
        let path = self.source_path(basename)?;
        let exists = tokio::fs::try_exists(&path).await?;

        let mut stats = self.stats.lock().await;
        if exists {
            stats.source_hits += 1;
        } else {
            stats.source_misses += 1;
        }
        Ok(exists)
    }

    /// Delete a compressed source, e.g. one that turned out to be corrupt.
    pub async fn remove_source(&self, basename: &str) -> RadarResult<()> {
        let path = self.source_path(basename)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                info!(path = %path.display(), "Removed cached source file");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// A temp file inside the cache directory, removed on drop unless persisted.
    ///
    /// Living in the same directory keeps the final rename atomic.
    pub fn staging_file(&self) -> RadarResult<NamedTempFile> {
        tempfile::Builder::new()
            .prefix(".staging-")
            .tempfile_in(&self.dir)
            .map_err(|e| RadarError::CacheIo(format!("cannot create staging file: {}", e)))
    }

    /// Move a fully written staging file to its final source path.
    pub fn persist_source(&self, staged: NamedTempFile, basename: &str) -> RadarResult<PathBuf> {
        let path = self.source_path(basename)?;
        staged
            .persist(&path)
            .map_err(|e| RadarError::CacheIo(format!("cannot persist {}: {}", path.display(), e)))?;
        Ok(path)
    }

    /// Bytes of the last successfully rendered raster, if any.
    pub async fn latest_raster(&self) -> RadarResult<Option<Bytes>> {
        let _guard = self.latest.read().await;
        read_optional(&self.dir.join(LATEST_RASTER_FILE))
            .await
            .map(|bytes| bytes.map(Bytes::from))
    }

    /// Formatted UTC time of the last successful render, if any.
    pub async fn last_updated(&self) -> RadarResult<Option<String>> {
        let _guard = self.latest.read().await;
        self.read_timestamp().await
    }

    /// Raster and timestamp read under one lock.
    pub async fn snapshot(&self) -> RadarResult<(Option<Bytes>, Option<String>)> {
        let _guard = self.latest.read().await;
        let raster = read_optional(&self.dir.join(LATEST_RASTER_FILE)).await?;
        let timestamp = self.read_timestamp().await?;
        Ok((raster.map(Bytes::from), timestamp))
    }

    /// Replace the "latest" record with a freshly rendered raster.
    ///
    /// Returns the stored timestamp string.
    pub async fn commit(&self, png: Bytes, rendered_at: DateTime<Utc>) -> RadarResult<String> {
        let timestamp = rendered_at.format(TIMESTAMP_FORMAT).to_string();

        let _guard = self.latest.write().await;

        let dir = self.dir.clone();
        let stamp = timestamp.clone();
        tokio::task::spawn_blocking(move || -> RadarResult<()> {
            // Stage both files before replacing either
            let raster = write_staged(&dir, &png)?;
            let meta = write_staged(&dir, stamp.as_bytes())?;
            persist(raster, &dir.join(LATEST_RASTER_FILE))?;
            persist(meta, &dir.join(LATEST_TIMESTAMP_FILE))?;
            Ok(())
        })
        .await
        .map_err(|e| RadarError::CacheIo(format!("cache writer task failed: {}", e)))??;

        self.stats.lock().await.commits += 1;
        debug!(timestamp = %timestamp, "Committed latest raster");
        Ok(timestamp)
    }

    pub async fn stats(&self) -> CacheStats {
        self.stats.lock().await.clone()
    }

    async fn read_timestamp(&self) -> RadarResult<Option<String>> {
        let bytes = read_optional(&self.dir.join(LATEST_TIMESTAMP_FILE)).await?;
        Ok(bytes
            .map(|b| String::from_utf8_lossy(&b).trim().to_string())
            .filter(|s| !s.is_empty()))
    }
}

async fn read_optional(path: &Path) -> RadarResult<Option<Vec<u8>>> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(RadarError::CacheIo(format!(
            "cannot read {}: {}",
            path.display(),
            e
        ))),
    }
}

fn write_staged(dir: &Path, data: &[u8]) -> RadarResult<NamedTempFile> {
    let mut file = tempfile::Builder::new()
        .prefix(".staging-")
        .tempfile_in(dir)?;
    file.write_all(data)?;
    file.as_file().sync_all()?;
    Ok(file)
}

fn persist(file: NamedTempFile, path: &Path) -> RadarResult<()> {
    file.persist(path)
        .map(|_| ())
        .map_err(|e| RadarError::CacheIo(format!("cannot replace {}: {}", path.display(), e)))
}
